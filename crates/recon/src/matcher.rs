use std::collections::BTreeMap;

use crate::model::{JoinedPair, PrimaryRecord, SecondaryRecord};

/// Index records by normalized identity. A later record with the same
/// identity replaces the earlier one (last-seen-wins); each replacement is
/// logged since it means the snapshot itself is inconsistent.
fn index_by_identity<'a, T>(
    records: &'a [T],
    identity: impl Fn(&T) -> String,
    registry: &str,
) -> BTreeMap<String, &'a T> {
    let mut map = BTreeMap::new();
    for record in records {
        let key = identity(record);
        if map.insert(key.clone(), record).is_some() {
            tracing::warn!("{registry}: duplicate entry for {key}, keeping the last one");
        }
    }
    map
}

/// Full outer join of both registries on normalized identity.
///
/// Every identity present in either input yields exactly one pair, in
/// ascending identity order.
pub fn outer_join<'a>(
    primary: &'a [PrimaryRecord],
    secondary: &'a [SecondaryRecord],
) -> Vec<JoinedPair<'a>> {
    let primary_map = index_by_identity(primary, PrimaryRecord::identity, "VS Code");
    let mut secondary_map = index_by_identity(secondary, SecondaryRecord::identity, "Open VSX");

    let mut joined = Vec::with_capacity(primary_map.len() + secondary_map.len());

    for (identity, p) in primary_map {
        let s = secondary_map.remove(&identity);
        joined.push(JoinedPair {
            identity,
            primary: Some(p),
            secondary: s,
        });
    }

    for (identity, s) in secondary_map {
        joined.push(JoinedPair {
            identity,
            primary: None,
            secondary: Some(s),
        });
    }

    joined.sort_by(|a, b| a.identity.cmp(&b.identity));
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary(publisher: &str, name: &str, installs: u64) -> PrimaryRecord {
        PrimaryRecord {
            publisher: publisher.into(),
            name: name.into(),
            version: None,
            last_updated: None,
            installs,
        }
    }

    fn secondary(namespace: &str, name: &str) -> SecondaryRecord {
        SecondaryRecord {
            namespace: namespace.into(),
            name: name.into(),
            publisher: None,
            version: None,
            last_updated: None,
            downloads: 0,
            verified: None,
            license: None,
        }
    }

    #[test]
    fn join_matches_across_casing() {
        let p = vec![primary("Foo", "Bar", 1)];
        let s = vec![secondary("foo", "bar")];
        let joined = outer_join(&p, &s);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].identity, "foo.bar");
        assert!(joined[0].primary.is_some());
        assert!(joined[0].secondary.is_some());
    }

    #[test]
    fn join_keeps_one_sided_rows() {
        let p = vec![primary("a", "x", 1), primary("b", "y", 2)];
        let s = vec![secondary("b", "y"), secondary("c", "z")];
        let joined = outer_join(&p, &s);
        let ids: Vec<_> = joined.iter().map(|j| j.identity.as_str()).collect();
        assert_eq!(ids, vec!["a.x", "b.y", "c.z"]);
        assert!(joined[0].secondary.is_none());
        assert!(joined[2].primary.is_none());
    }

    #[test]
    fn duplicate_identity_last_seen_wins() {
        let p = vec![primary("acme", "linter", 10), primary("ACME", "Linter", 20)];
        let joined = outer_join(&p, &[]);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].primary.unwrap().installs, 20);
    }

    #[test]
    fn empty_inputs_join_to_nothing() {
        assert!(outer_join(&[], &[]).is_empty());
    }
}
