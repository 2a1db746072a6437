use crate::domain::models::RunAggregate;
use crate::services::codec;
use crate::services::github::WorkflowHost;
use regex::Regex;
use std::io::Read;
use std::sync::OnceLock;

/// Bare artifact-name token: `<job>-permissions-<32 lowercase hex>`.
/// The hex length is validated separately because the surrounding log text
/// may butt hex-like characters up against the token.
fn token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[^\s"]+-permissions-[0-9a-f]+"#).expect("token pattern"))
}

/// Legacy upload-log sentence emitted by older report producers.
fn sentence_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"Container for artifact "([^\s"]+-permissions-[0-9a-f]+)" successfully created\. Starting upload of file\(s\)"#,
        )
        .expect("sentence pattern")
    })
}

fn hex_suffix_is_valid(name: &str) -> bool {
    name.rsplit('-')
        .next()
        .map(|hex| hex.len() == 32)
        .unwrap_or(false)
}

/// Locate the correlation marker in a job log: the artifact name holding
/// that job's permission report. The bare token form wins over the legacy
/// sentence form when both are present.
pub fn correlation_marker(log: &str) -> Option<String> {
    for m in token_pattern().find_iter(log) {
        if hex_suffix_is_valid(m.as_str()) {
            return Some(m.as_str().to_string());
        }
    }
    for caps in sentence_pattern().captures_iter(log) {
        let name = &caps[1];
        if hex_suffix_is_valid(name) {
            return Some(name.to_string());
        }
    }
    None
}

/// Recover the job identifier from an artifact name by stripping the
/// trailing `permissions` and hex segments. Hyphens inside the job name
/// survive.
pub fn job_identifier(artifact_name: &str) -> String {
    let parts: Vec<&str> = artifact_name.split('-').collect();
    parts[..parts.len().saturating_sub(2)].join("-")
}

/// Extract the single payload entry from a report archive.
pub fn extract_payload(archive: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive))?;
    if zip.len() == 0 {
        anyhow::bail!("report archive has no entries");
    }
    let mut entry = zip.by_index(0)?;
    let mut payload = Vec::new();
    entry.read_to_end(&mut payload)?;
    Ok(payload)
}

/// Mine the last `count` successful runs of `workflow` on `branch` and fold
/// every located job report into one aggregate.
///
/// Transport problems on a single run or job (expired logs, missing
/// artifacts, undecodable archives) skip that item and keep mining; only
/// the initial run listing is fatal.
pub fn mine(
    host: &dyn WorkflowHost,
    workflow: &str,
    count: u32,
    branch: &str,
) -> anyhow::Result<RunAggregate> {
    let runs = host.list_successful_runs(workflow, branch, count)?;
    let mut aggregate = RunAggregate::default();

    for run in &runs {
        tracing::debug!("analyzing run {}", run.id);
        let jobs = match host.list_jobs(run.id) {
            Ok(jobs) => jobs,
            Err(err) => {
                tracing::debug!("jobs for run {} unavailable: {}", run.id, err);
                continue;
            }
        };
        let artifacts = match host.list_artifacts(run.id) {
            Ok(artifacts) => artifacts,
            Err(err) => {
                tracing::debug!("artifacts for run {} unavailable: {}", run.id, err);
                continue;
            }
        };
        tracing::debug!(
            "run {}: {} jobs, {} artifacts",
            run.id,
            jobs.len(),
            artifacts.len()
        );

        for job in &jobs {
            if !job.succeeded() {
                continue;
            }
            let log = match host.download_job_log(job.id) {
                Ok(log) => log,
                Err(err) => {
                    tracing::debug!("logs for job {} unavailable: {}", job.id, err);
                    continue;
                }
            };
            let Some(artifact_name) = correlation_marker(&log) else {
                tracing::debug!("job {} ({}) produced no report", job.id, job.name);
                continue;
            };
            let job_name = job_identifier(&artifact_name);
            let Some(artifact) = artifacts.iter().find(|a| a.name == artifact_name) else {
                tracing::debug!("artifact {} not found for run {}", artifact_name, run.id);
                continue;
            };
            let permissions = match host
                .download_artifact(artifact.id)
                .and_then(|archive| extract_payload(&archive))
                .and_then(|payload| codec::decode(&payload))
            {
                Ok(permissions) => permissions,
                Err(err) => {
                    tracing::debug!("report {} undecodable: {}", artifact_name, err);
                    continue;
                }
            };
            aggregate.fold(&job_name, &permissions);
        }
    }

    Ok(aggregate)
}
