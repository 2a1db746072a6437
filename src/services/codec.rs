use crate::lattice::{AccessLevel, PermissionMap};
use std::collections::BTreeMap;

/// Serialize a permission map to the artifact payload form: a single JSON
/// object mapping scope to level, `{}` when empty.
pub fn encode(map: &PermissionMap) -> anyhow::Result<Vec<u8>> {
    Ok(serde_json::to_vec(map)?)
}

/// Decode an artifact payload back into a permission map.
///
/// Rebuilds through `record` so a payload carrying a `none` level cannot
/// violate the no-none-entries invariant.
pub fn decode(bytes: &[u8]) -> anyhow::Result<PermissionMap> {
    let raw: BTreeMap<String, AccessLevel> = serde_json::from_slice(bytes)?;
    Ok(raw.into_iter().collect())
}
