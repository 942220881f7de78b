//! Small collection helpers.

use std::collections::BTreeSet;

/// Collect the keys of a key/value map into an ordered set.
///
/// Accepts anything that iterates `(&K, &V)` pairs, so `&HashMap`,
/// `&BTreeMap` and `VersionMap::iter()` all work. The ordered output is what
/// storage queries use as their id list.
pub fn extract_keys<'a, K, V, I>(map: I) -> BTreeSet<K>
where
    K: Ord + Clone + 'a,
    V: 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    map.into_iter().map(|(k, _)| k.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_extract_keys_from_hash_map() {
        let mut map = HashMap::new();
        map.insert(30_i64, true);
        map.insert(10_i64, false);
        map.insert(20_i64, true);

        let keys: Vec<_> = extract_keys(&map).into_iter().collect();
        assert_eq!(keys, vec![10, 20, 30]);
    }

    #[test]
    fn test_extract_keys_from_btree_map() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), 1);
        map.insert("a".to_string(), 2);

        let keys: Vec<_> = extract_keys(&map).into_iter().collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_extract_keys_empty() {
        let map: HashMap<i64, bool> = HashMap::new();
        assert!(extract_keys(&map).is_empty());
    }
}
