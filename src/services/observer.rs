use crate::domain::models::{Classification, JobReport, ObserverConfig};
use crate::lattice::PermissionMap;
use crate::services::github::ArtifactStore;
use crate::services::state::PhaseMarker;
use crate::services::{capture, codec, summary};
use rand::RngCore;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Fatal-to-job conditions of the observer lifecycle. Everything else is
/// absorbed as a data-quality warning.
#[derive(thiserror::Error, Debug)]
pub enum ObserveError {
    /// The capture mechanism left an error log; its text is authoritative.
    #[error("{0}")]
    CaptureFailed(String),
    #[error("capture result data missing: {}", .0.display())]
    MissingResults(PathBuf),
}

/// Identity of the surrounding job invocation.
pub struct JobContext {
    pub job: String,
    pub run_id: String,
}

impl JobContext {
    pub fn from_env() -> anyhow::Result<Self> {
        let job = std::env::var("GITHUB_JOB")
            .map_err(|_| anyhow::anyhow!("GITHUB_JOB is not set"))?;
        let run_id = std::env::var("GITHUB_RUN_ID").unwrap_or_else(|_| "local".to_string());
        Ok(JobContext { job, run_id })
    }

    pub fn marker(&self) -> anyhow::Result<PhaseMarker> {
        PhaseMarker::for_job(&self.run_id, &self.job)
    }
}

/// Setup phase: persist the post marker, start the capture mechanism and
/// block until it signals handoff. Returns the process exit code to
/// mirror.
pub fn setup(config: &ObserverConfig, ctx: &JobContext) -> anyhow::Result<i32> {
    let hosts = capture::trusted_hosts()?;
    ctx.marker()?.set()?;

    if config.debug {
        // the capture script keys its own verbosity off this variable
        std::env::set_var("RUNNER_DEBUG", "1");
    }

    match capture::start_and_wait(&hosts, config.debug)? {
        capture::Handoff::Sentinel => Ok(0),
        capture::Handoff::Exited(0) => Ok(0),
        capture::Handoff::Exited(code) => {
            eprintln!("capture mechanism exited with code {}", code);
            Ok(code)
        }
    }
}

/// Fold every trusted observation from the capture result lines into one
/// permission map. Unknown classifications are warned about and flagged,
/// never merged and never fatal.
pub fn fold_results<'a>(
    lines: impl Iterator<Item = &'a str>,
    trusted: &BTreeSet<String>,
) -> (PermissionMap, bool) {
    let mut permissions = PermissionMap::new();
    let mut had_unknown = false;
    for line in lines.filter(|l| !l.trim().is_empty()) {
        for classification in capture::classify_line(line, trusted) {
            match classification {
                Classification::Known { scope, level } => permissions.record(&scope, level),
                Classification::Unknown { detail } => {
                    had_unknown = true;
                    tracing::warn!("{}", detail);
                }
            }
        }
    }
    (permissions, had_unknown)
}

/// Finalize phase: read the capture output, merge, publish the summary,
/// then publish the report artifact.
///
/// The summary goes out as soon as the merged map exists, so no later
/// failure (artifact encoding, upload) can suppress it. An upload failure
/// is still fatal to the job; the report is either fully published or not
/// at all.
pub fn finalize(
    config: &ObserverConfig,
    ctx: &JobContext,
    store: Option<&dyn ArtifactStore>,
) -> anyhow::Result<JobReport> {
    let layout = capture::CaptureLayout::from_env();

    let debug_log = layout.debug_log();
    if debug_log.exists() {
        // surfaced verbatim, even when the runner is not in debug mode
        println!("{}", std::fs::read_to_string(&debug_log)?);
    }

    let error_log = layout.error_log();
    if error_log.exists() {
        let reason = std::fs::read_to_string(&error_log)?;
        return Err(ObserveError::CaptureFailed(reason.trim().to_string()).into());
    }

    let result_file = layout.result_file();
    let raw = std::fs::read_to_string(&result_file)
        .map_err(|_| ObserveError::MissingResults(result_file.clone()))?;
    if config.debug {
        println!("logged: {}", raw);
    }

    let trusted = capture::trusted_hosts()?;
    let (permissions, had_unknown) = fold_results(raw.lines(), &trusted);

    summary::publish(&summary::job_summary_markdown(&permissions))?;

    let report = JobReport {
        job: ctx.job.clone(),
        permissions,
        had_unknown,
    };

    if config.create_artifact {
        let store =
            store.ok_or_else(|| anyhow::anyhow!("artifact creation enabled but no store"))?;
        let name = artifact_name(&report.job);
        let payload = codec::encode(&report.permissions)?;
        // this line is the correlation marker the miner scans job logs for
        println!("uploading permissions artifact {}", name);
        store.upload(&name, &payload)?;
    }

    let _ = ctx.marker()?.clear();
    Ok(report)
}

/// `<job>-permissions-<random 16-byte hex>`; random so the artifact store
/// never sees the same name twice.
fn artifact_name(job: &str) -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}-permissions-{}", job, hex::encode(bytes))
}
