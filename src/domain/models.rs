use crate::lattice::PermissionMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One privileged call captured by the interception mechanism, one JSON
/// object per line of the result-data file. Extra fields (timestamps,
/// diagnostics) are ignored; the listed ones are required.
#[derive(Debug, Deserialize, Clone)]
pub struct CallRecord {
    pub host: String,
    pub method: String,
    pub path: String,
    /// Single-key maps, scope → level string, as emitted by the classifier
    /// rule table inside the capture mechanism.
    pub permissions: Vec<BTreeMap<String, String>>,
}

/// Outcome of classifying one observation at the capture boundary.
///
/// `Unknown` is a first-class variant, not a magic scope string: a call the
/// rule table could not map, or a record that failed schema validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Known {
        scope: String,
        level: crate::lattice::AccessLevel,
    },
    Unknown {
        detail: String,
    },
}

/// The published minimal permission set for one job execution. Immutable
/// once finalize builds it.
#[derive(Debug, Serialize, Clone)]
pub struct JobReport {
    pub job: String,
    pub permissions: PermissionMap,
    pub had_unknown: bool,
}

/// Per-job aggregate accumulated by one miner invocation across every
/// sampled run. Grows monotonically under the lattice join.
#[derive(Debug, Serialize, Default)]
pub struct RunAggregate {
    pub jobs: BTreeMap<String, PermissionMap>,
}

impl RunAggregate {
    pub fn fold(&mut self, job: &str, permissions: &PermissionMap) {
        self.jobs
            .entry(job.to_string())
            .or_default()
            .merge_from(permissions);
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

fn default_true() -> bool {
    true
}

/// Observer configuration, a JSON blob from `--config` or `TOKENLENS_CONFIG`.
#[derive(Debug, Deserialize, Clone)]
pub struct ObserverConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub create_artifact: bool,
    #[serde(default)]
    pub debug: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        ObserverConfig {
            enabled: true,
            create_artifact: true,
            debug: false,
        }
    }
}

impl ObserverConfig {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(ObserverConfig::default());
        }
        Ok(serde_json::from_str(raw)?)
    }
}
