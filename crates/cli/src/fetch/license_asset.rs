//! Marketplace license assets, classified into short license labels.

use vsxreport_recon::license::{classify_license_text, NO_LICENSE};
use vsxreport_recon::ReconConfig;

use crate::CliError;

use super::common::{FetchClient, FetchFailure};

const LICENSE_ASSET: &str = "Microsoft.VisualStudio.Services.Content.License";

pub struct LicenseAssetClient {
    client: FetchClient,
    asset_host: String,
    /// Replaces the per-publisher `https://{publisher}.{host}` root.
    fixed_root: Option<String>,
}

impl LicenseAssetClient {
    pub fn new(config: &ReconConfig) -> Result<Self, CliError> {
        Ok(Self {
            client: FetchClient::new("license asset", config.fetch.license_asset)?,
            asset_host: config.endpoints.marketplace_asset_host.clone(),
            fixed_root: None,
        })
    }

    pub fn with_root(config: &ReconConfig, root: String) -> Result<Self, CliError> {
        let mut client = Self::new(config)?;
        client.fixed_root = Some(root);
        Ok(client)
    }

    pub fn asset_url(&self, publisher: &str, name: &str) -> String {
        let root = match &self.fixed_root {
            Some(root) => root.clone(),
            None => format!("https://{publisher}.{}", self.asset_host),
        };
        format!(
            "{root}/_apis/public/gallery/publisher/{publisher}/extension/{name}/latest/assetbyname/{LICENSE_ASSET}"
        )
    }

    /// Resolve the license label of one extension.
    ///
    /// - `Ok(Some(label))`: classified text, or `None` when the asset is
    ///   refused (404 and other 4xx: the extension ships no license file)
    /// - `Ok(None)`: unreachable or 5xx after retries; left unresolved so a
    ///   later run tries again
    /// - `Err(_)`: rate limited after retries; further requests are pointless
    pub fn resolve(&self, publisher: &str, name: &str) -> Result<Option<String>, FetchFailure> {
        let url = self.asset_url(publisher, name);
        match self.client.get_text(|http| http.get(&url)) {
            Ok(text) => Ok(Some(classify_license_text(&text))),
            Err(FetchFailure::Rejected { .. } | FetchFailure::Auth { .. }) => {
                Ok(Some(NO_LICENSE.to_string()))
            }
            Err(e @ FetchFailure::RateLimited { .. }) => Err(e),
            Err(e) => {
                tracing::warn!(status = ?e.status(), "{publisher}.{name}: {e}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use vsxreport_recon::RetryPolicy;

    fn asset_path(publisher: &str, name: &str) -> String {
        format!(
            "/_apis/public/gallery/publisher/{publisher}/extension/{name}/latest/assetbyname/{LICENSE_ASSET}"
        )
    }

    fn client(server: &MockServer) -> LicenseAssetClient {
        let mut config = ReconConfig::default();
        config.fetch.license_asset = RetryPolicy::new(1, 0, 5);
        LicenseAssetClient::with_root(&config, server.base_url()).unwrap()
    }

    #[test]
    fn test_default_asset_url() {
        let client = LicenseAssetClient::new(&ReconConfig::default()).unwrap();
        assert_eq!(
            client.asset_url("ms-python", "python"),
            "https://ms-python.gallery.vsassets.io/_apis/public/gallery/publisher/ms-python/extension/python/latest/assetbyname/Microsoft.VisualStudio.Services.Content.License"
        );
    }

    #[test]
    fn test_license_text_is_classified() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(asset_path("acme", "linter"));
            then.status(200).body("The MIT License\n\nCopyright (c) Acme");
        });

        assert_eq!(client(&server).resolve("acme", "linter").unwrap().as_deref(), Some("MIT"));
    }

    #[test]
    fn test_missing_asset_is_none_label() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path(asset_path("acme", "nolicense"));
            then.status(404);
        });

        let label = client(&server).resolve("acme", "nolicense").unwrap();
        assert_eq!(label.as_deref(), Some("None"));
        mock.assert_calls(1);
    }

    #[test]
    fn test_server_error_stays_unresolved() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path(asset_path("acme", "flaky"));
            then.status(503);
        });

        assert_eq!(client(&server).resolve("acme", "flaky").unwrap(), None);
        mock.assert_calls(2);
    }

    #[test]
    fn test_rate_limit_is_fatal() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(asset_path("acme", "busy"));
            then.status(429);
        });

        let err = client(&server).resolve("acme", "busy").unwrap_err();
        assert!(matches!(err, FetchFailure::RateLimited { .. }));
    }
}
