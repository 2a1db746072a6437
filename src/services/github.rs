use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::time::Duration;

const USER_AGENT: &str = concat!("tokenlens/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowRun {
    pub id: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowJob {
    pub id: u64,
    pub name: String,
    pub conclusion: Option<String>,
}

impl WorkflowJob {
    pub fn succeeded(&self) -> bool {
        self.conclusion.as_deref() == Some("success")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Artifact {
    pub id: u64,
    pub name: String,
}

/// Transport boundary for the miner: listing runs/jobs/artifacts and
/// downloading logs and archives. The miner never talks HTTP directly.
pub trait WorkflowHost {
    fn list_successful_runs(
        &self,
        workflow: &str,
        branch: &str,
        count: u32,
    ) -> anyhow::Result<Vec<WorkflowRun>>;
    fn list_jobs(&self, run_id: u64) -> anyhow::Result<Vec<WorkflowJob>>;
    fn list_artifacts(&self, run_id: u64) -> anyhow::Result<Vec<Artifact>>;
    fn download_job_log(&self, job_id: u64) -> anyhow::Result<String>;
    fn download_artifact(&self, artifact_id: u64) -> anyhow::Result<Vec<u8>>;
}

#[derive(Deserialize)]
struct RunsPage {
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Deserialize)]
struct JobsPage {
    jobs: Vec<WorkflowJob>,
}

#[derive(Deserialize)]
struct ArtifactsPage {
    artifacts: Vec<Artifact>,
}

/// Workflow host backed by the GitHub REST API over blocking HTTP.
pub struct HttpWorkflowHost {
    client: reqwest::blocking::Client,
    api_base: String,
    owner: String,
    repo: String,
    token: String,
}

impl HttpWorkflowHost {
    pub fn new(owner: &str, repo: &str, token: &str) -> anyhow::Result<Self> {
        let api_base = std::env::var("GITHUB_API_URL")
            .unwrap_or_else(|_| "https://api.github.com".to_string());
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(HttpWorkflowHost {
            client,
            api_base,
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
        })
    }

    fn get(&self, path: &str) -> reqwest::blocking::RequestBuilder {
        self.client
            .get(format!(
                "{}/repos/{}/{}/{}",
                self.api_base, self.owner, self.repo, path
            ))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
    }
}

impl WorkflowHost for HttpWorkflowHost {
    fn list_successful_runs(
        &self,
        workflow: &str,
        branch: &str,
        count: u32,
    ) -> anyhow::Result<Vec<WorkflowRun>> {
        let page: RunsPage = self
            .get(&format!("actions/workflows/{}/runs", workflow))
            .query(&[
                ("status", "success"),
                ("branch", branch),
                ("per_page", &count.to_string()),
                ("page", "1"),
            ])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(page.workflow_runs)
    }

    fn list_jobs(&self, run_id: u64) -> anyhow::Result<Vec<WorkflowJob>> {
        let page: JobsPage = self
            .get(&format!("actions/runs/{}/jobs", run_id))
            .query(&[("per_page", "100")])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(page.jobs)
    }

    fn list_artifacts(&self, run_id: u64) -> anyhow::Result<Vec<Artifact>> {
        let page: ArtifactsPage = self
            .get(&format!("actions/runs/{}/artifacts", run_id))
            .query(&[("per_page", "100")])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(page.artifacts)
    }

    fn download_job_log(&self, job_id: u64) -> anyhow::Result<String> {
        let text = self
            .get(&format!("actions/jobs/{}/logs", job_id))
            .send()?
            .error_for_status()?
            .text()?;
        Ok(text)
    }

    fn download_artifact(&self, artifact_id: u64) -> anyhow::Result<Vec<u8>> {
        let bytes = self
            .get(&format!("actions/artifacts/{}/zip", artifact_id))
            .send()?
            .error_for_status()?
            .bytes()?;
        Ok(bytes.to_vec())
    }
}

/// Append-only store for published job reports. Names embed random hex, so
/// an existing name is never overwritten.
pub trait ArtifactStore {
    fn upload(&self, name: &str, payload: &[u8]) -> anyhow::Result<()>;
}

#[derive(Serialize)]
struct CreateArtifactRequest<'a> {
    workflow_run_backend_id: &'a str,
    workflow_job_run_backend_id: &'a str,
    name: &'a str,
    version: u32,
}

#[derive(Deserialize)]
struct CreateArtifactResponse {
    ok: bool,
    signed_upload_url: String,
}

#[derive(Serialize)]
struct FinalizeArtifactRequest<'a> {
    workflow_run_backend_id: &'a str,
    workflow_job_run_backend_id: &'a str,
    name: &'a str,
    size: u64,
    hash: String,
}

#[derive(Deserialize)]
struct FinalizeArtifactResponse {
    ok: bool,
}

/// Artifact store backed by the runner's results service: create (returns a
/// signed blob URL), upload the archive, finalize with size and digest.
pub struct ActionsArtifactStore {
    client: reqwest::blocking::Client,
    results_url: String,
    runtime_token: String,
    run_backend_id: String,
    job_backend_id: String,
}

impl ActionsArtifactStore {
    pub fn from_env() -> anyhow::Result<Self> {
        let results_url = std::env::var("ACTIONS_RESULTS_URL")
            .map_err(|_| anyhow::anyhow!("ACTIONS_RESULTS_URL is not set"))?;
        let runtime_token = std::env::var("ACTIONS_RUNTIME_TOKEN")
            .map_err(|_| anyhow::anyhow!("ACTIONS_RUNTIME_TOKEN is not set"))?;
        let (run_backend_id, job_backend_id) = backend_ids(&runtime_token)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(ActionsArtifactStore {
            client,
            results_url,
            runtime_token,
            run_backend_id,
            job_backend_id,
        })
    }

    fn twirp(&self, method: &str) -> String {
        format!(
            "{}/twirp/github.actions.results.api.v1.ArtifactService/{}",
            self.results_url.trim_end_matches('/'),
            method
        )
    }
}

impl ArtifactStore for ActionsArtifactStore {
    fn upload(&self, name: &str, payload: &[u8]) -> anyhow::Result<()> {
        let archive = zip_single_entry("permissions", payload)?;

        let created: CreateArtifactResponse = self
            .client
            .post(self.twirp("CreateArtifact"))
            .bearer_auth(&self.runtime_token)
            .json(&CreateArtifactRequest {
                workflow_run_backend_id: &self.run_backend_id,
                workflow_job_run_backend_id: &self.job_backend_id,
                name,
                version: 4,
            })
            .send()?
            .error_for_status()?
            .json()?;
        if !created.ok {
            anyhow::bail!("artifact service refused to create {}", name);
        }

        self.client
            .put(&created.signed_upload_url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", "application/zip")
            .body(archive.clone())
            .send()?
            .error_for_status()?;

        let digest = hex::encode(Sha256::digest(&archive));
        let finalized: FinalizeArtifactResponse = self
            .client
            .post(self.twirp("FinalizeArtifact"))
            .bearer_auth(&self.runtime_token)
            .json(&FinalizeArtifactRequest {
                workflow_run_backend_id: &self.run_backend_id,
                workflow_job_run_backend_id: &self.job_backend_id,
                name,
                size: archive.len() as u64,
                hash: format!("sha256:{}", digest),
            })
            .send()?
            .error_for_status()?
            .json()?;
        if !finalized.ok {
            anyhow::bail!("artifact service refused to finalize {}", name);
        }
        Ok(())
    }
}

/// Backend identities from the runtime token's `scp` claim, entry
/// `Actions.Results:<run>:<job>`.
fn backend_ids(runtime_token: &str) -> anyhow::Result<(String, String)> {
    use base64::Engine;

    let payload = runtime_token
        .split('.')
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("runtime token is not a JWT"))?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| anyhow::anyhow!("runtime token payload is not base64: {}", e))?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded)?;
    let scopes = claims
        .get("scp")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("runtime token has no scp claim"))?;
    for scope in scopes.split(' ') {
        let mut parts = scope.split(':');
        if parts.next() == Some("Actions.Results") {
            if let (Some(run), Some(job)) = (parts.next(), parts.next()) {
                return Ok((run.to_string(), job.to_string()));
            }
        }
    }
    anyhow::bail!("runtime token carries no Actions.Results scope")
}

/// Pack a single payload entry into a zip archive, the transport form of a
/// job report.
pub fn zip_single_entry(entry_name: &str, payload: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer.start_file(entry_name, zip::write::FileOptions::default())?;
    writer.write_all(payload)?;
    Ok(writer.finish()?.into_inner())
}
