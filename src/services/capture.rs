use crate::domain::models::{CallRecord, Classification};
use crate::lattice::AccessLevel;
use std::collections::BTreeSet;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Printed by the capture mechanism once the job body has finished and the
/// interception results are on disk.
pub const HANDOFF_SENTINEL: &str = "--all done--";

/// Where the capture mechanism leaves its output files.
pub struct CaptureLayout {
    root: PathBuf,
}

impl CaptureLayout {
    pub fn from_env() -> Self {
        let root = std::env::var("TOKENLENS_CAPTURE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                if cfg!(target_os = "macos") {
                    PathBuf::from("/Users/mitmproxyuser")
                } else {
                    PathBuf::from("/home/mitmproxyuser")
                }
            });
        CaptureLayout { root }
    }

    /// Newline-delimited JSON call records.
    pub fn result_file(&self) -> PathBuf {
        self.root.join("out.txt")
    }

    pub fn debug_log(&self) -> PathBuf {
        self.root.join("debug.log")
    }

    /// Presence of this file means the capture mechanism failed
    /// irrecoverably; its text is the reason.
    pub fn error_log(&self) -> PathBuf {
        self.root.join("error.log")
    }
}

/// How the capture handoff ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    /// The sentinel appeared on stdout; the capture process keeps running
    /// for the remainder of the job.
    Sentinel,
    Exited(i32),
}

/// Trusted hosts for this execution context: the control-plane host, the
/// API host and, when present, the identity-token host.
pub fn trusted_hosts() -> anyhow::Result<BTreeSet<String>> {
    let mut hosts = BTreeSet::new();
    for var in ["GITHUB_SERVER_URL", "GITHUB_API_URL"] {
        let url = std::env::var(var).map_err(|_| anyhow::anyhow!("{} is not set", var))?;
        hosts.insert(url_host(&url)?);
    }
    if let Ok(url) = std::env::var("ACTIONS_ID_TOKEN_REQUEST_URL") {
        hosts.insert(url_host(&url)?);
    }
    Ok(hosts)
}

fn url_host(url: &str) -> anyhow::Result<String> {
    url.split('/')
        .nth(2)
        .filter(|h| !h.is_empty())
        .map(|h| h.to_ascii_lowercase())
        .ok_or_else(|| anyhow::anyhow!("no host in url: {}", url))
}

/// Start the capture mechanism and block until it signals handoff.
///
/// Stdout lines are echoed; stderr is drained on a helper thread (the pipe
/// must not back up while we block on stdout) and surfaced as warnings,
/// never as failures.
pub fn start_and_wait(hosts: &BTreeSet<String>, debug: bool) -> anyhow::Result<Handoff> {
    let script = std::env::var("TOKENLENS_CAPTURE_SCRIPT").unwrap_or_else(|_| "setup.sh".into());
    let joined = hosts.iter().cloned().collect::<Vec<_>>().join(",");

    let mut cmd = Command::new("bash");
    if debug {
        cmd.arg("-v");
    }
    cmd.arg("-e").arg(&script).arg(&joined);
    if debug {
        cmd.env("RUNNER_DEBUG", "1");
    }
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow::anyhow!("failed to start capture mechanism {}: {}", script, e))?;

    if let Some(stderr) = child.stderr.take() {
        std::thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                tracing::warn!("capture: {}", line);
            }
        });
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("capture stdout unavailable"))?;
    for line in BufReader::new(stdout).lines() {
        let line = line?;
        println!("{}", line);
        if line.contains(HANDOFF_SENTINEL) {
            return Ok(Handoff::Sentinel);
        }
    }

    let status = child.wait()?;
    Ok(Handoff::Exited(status.code().unwrap_or(1)))
}

/// Classify one result-file line at the capture boundary.
///
/// Strict schema: a malformed line degrades to a single `Unknown`
/// classification rather than aborting the merge. Records from hosts
/// outside the trusted set are discarded entirely.
pub fn classify_line(line: &str, trusted: &BTreeSet<String>) -> Vec<Classification> {
    let record: CallRecord = match serde_json::from_str(line) {
        Ok(record) => record,
        Err(err) => {
            return vec![Classification::Unknown {
                detail: format!("malformed call record ({}): {}", err, line),
            }]
        }
    };
    if !trusted.contains(&record.host.to_ascii_lowercase()) {
        return Vec::new();
    }
    record
        .permissions
        .iter()
        .map(|entry| classify_entry(entry, &record))
        .collect()
}

fn classify_entry(
    entry: &std::collections::BTreeMap<String, String>,
    record: &CallRecord,
) -> Classification {
    let call = format!("{} {}{}", record.method, record.host, record.path);
    let mut pairs = entry.iter();
    let (Some((scope, level)), None) = (pairs.next(), pairs.next()) else {
        return Classification::Unknown {
            detail: format!("call {} carried a malformed permission entry", call),
        };
    };
    if scope == "unknown" {
        return Classification::Unknown {
            detail: format!(
                "the token was used to call {} but the permission is unknown; \
                 please report this so the classifier can be extended",
                call
            ),
        };
    }
    let level = match level.as_str() {
        "none" => AccessLevel::None,
        "read" => AccessLevel::Read,
        "write" => AccessLevel::Write,
        other => {
            return Classification::Unknown {
                detail: format!("call {} carried an unrecognized level {:?}", call, other),
            }
        }
    };
    Classification::Known {
        scope: scope.clone(),
        level,
    }
}
