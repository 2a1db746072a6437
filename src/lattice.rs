use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Access intensity for a permission scope, totally ordered none < read < write.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    None,
    Read,
    Write,
}

impl AccessLevel {
    /// Lattice join: the higher of the two levels.
    pub fn merge(self, other: AccessLevel) -> AccessLevel {
        self.max(other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::None => "none",
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope → level mapping describing the minimal requirement observed so far.
///
/// Invariant: no scope is ever stored at `none`; absence means none. The
/// backing map is ordered only so rendering is deterministic.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct PermissionMap(BTreeMap<String, AccessLevel>);

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, scope: &str) -> AccessLevel {
        self.0.get(scope).copied().unwrap_or(AccessLevel::None)
    }

    /// Raise `scope` to at least `level`. Recording `none` is a no-op.
    pub fn record(&mut self, scope: &str, level: AccessLevel) {
        if level == AccessLevel::None {
            return;
        }
        let merged = self.get(scope).merge(level);
        self.0.insert(scope.to_string(), merged);
    }

    /// Fold another map in, taking the per-scope maximum. Monotone: no
    /// scope's level ever decreases.
    pub fn merge_from(&mut self, other: &PermissionMap) {
        for (scope, level) in &other.0 {
            self.record(scope, *level);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, AccessLevel)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, AccessLevel)> for PermissionMap {
    fn from_iter<I: IntoIterator<Item = (String, AccessLevel)>>(iter: I) -> Self {
        let mut map = PermissionMap::new();
        for (scope, level) in iter {
            map.record(&scope, level);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessLevel, PermissionMap};
    use AccessLevel::{None, Read, Write};

    const LEVELS: [AccessLevel; 3] = [None, Read, Write];

    #[test]
    fn merge_none_is_identity() {
        for a in LEVELS {
            assert_eq!(a.merge(None), a);
            assert_eq!(None.merge(a), a);
        }
    }

    #[test]
    fn merge_is_idempotent_commutative_associative() {
        for a in LEVELS {
            assert_eq!(a.merge(a), a);
            for b in LEVELS {
                assert_eq!(a.merge(b), b.merge(a));
                for c in LEVELS {
                    assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
                }
            }
        }
    }

    #[test]
    fn merge_is_monotone() {
        for a in LEVELS {
            for b in LEVELS {
                assert!(a.merge(b) >= a);
                assert!(a.merge(b) >= b);
            }
        }
    }

    #[test]
    fn map_merge_takes_per_scope_max() {
        let mut left: PermissionMap = [("contents".to_string(), Read)].into_iter().collect();
        let right: PermissionMap = [("contents".to_string(), Write)].into_iter().collect();
        left.merge_from(&right);
        assert_eq!(left.get("contents"), Write);
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn map_merge_unions_disjoint_scopes() {
        let mut left: PermissionMap = [("contents".to_string(), Read)].into_iter().collect();
        let right: PermissionMap = [("issues".to_string(), Write)].into_iter().collect();
        left.merge_from(&right);
        assert_eq!(left.get("contents"), Read);
        assert_eq!(left.get("issues"), Write);
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn recording_none_leaves_no_entry() {
        let mut map = PermissionMap::new();
        map.record("actions", None);
        assert!(map.is_empty());
        map.record("actions", Read);
        map.record("actions", None);
        assert_eq!(map.get("actions"), Read);
        assert_eq!(map.len(), 1);
    }
}
