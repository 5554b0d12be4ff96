//! Extension identity normalization.
//!
//! Both registries address an extension as `owner.name`: the Marketplace
//! uses the publisher name, Open VSX the namespace. Casing differs between
//! the two (and between entries of the allow-list), so every comparison goes
//! through [`normalize`] first.

/// Case-fold a string for identity comparison.
pub fn normalize(value: &str) -> String {
    value.to_lowercase()
}

/// Build the join key for an `owner` / `name` pair.
pub fn identity(owner: &str, name: &str) -> String {
    normalize(&format!("{owner}.{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_case_insensitive() {
        assert_eq!(identity("Foo", "Bar"), "foo.bar");
        assert_eq!(identity("foo", "bar"), identity("FOO", "BAR"));
    }

    #[test]
    fn identity_keeps_punctuation() {
        assert_eq!(identity("ms-python", "vscode-pylance"), "ms-python.vscode-pylance");
    }

    #[test]
    fn normalize_handles_non_ascii() {
        assert_eq!(normalize("ÄÖÜ"), "äöü");
    }
}
