use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Isolated observer environment: its own capture directory, runner temp
/// and step-summary file, with ambient CI variables scrubbed.
pub struct TestEnv {
    _tmp: TempDir,
    pub capture: PathBuf,
    pub runner_temp: PathBuf,
    pub summary_file: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let capture = tmp.path().join("capture");
        let runner_temp = tmp.path().join("runner-temp");
        fs::create_dir_all(&capture).expect("create capture dir");
        fs::create_dir_all(&runner_temp).expect("create runner temp");
        let summary_file = tmp.path().join("step-summary.md");

        Self {
            _tmp: tmp,
            capture,
            runner_temp,
            summary_file,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("tokenlens").expect("binary built");
        cmd.env("GITHUB_SERVER_URL", "https://github.example.com")
            .env("GITHUB_API_URL", "https://api.github.example.com")
            .env("GITHUB_JOB", "build")
            .env("GITHUB_RUN_ID", "42")
            .env("RUNNER_TEMP", &self.runner_temp)
            .env("TOKENLENS_CAPTURE_DIR", &self.capture)
            .env_remove("ACTIONS_ID_TOKEN_REQUEST_URL")
            .env_remove("GITHUB_STEP_SUMMARY")
            .env_remove("TOKENLENS_CONFIG")
            .env_remove("TOKENLENS_CAPTURE_SCRIPT")
            .env_remove("RUNNER_DEBUG")
            .env_remove("GITHUB_TOKEN");
        cmd
    }

    /// Pretend setup already ran for job `build` of run `42`.
    pub fn mark_post(&self) {
        fs::write(self.runner_temp.join(".tokenlens-post-42-build"), "1")
            .expect("write phase marker");
    }

    pub fn marker_exists(&self) -> bool {
        self.runner_temp.join(".tokenlens-post-42-build").exists()
    }

    pub fn write_results(&self, lines: &[&str]) {
        fs::write(self.capture.join("out.txt"), lines.join("\n")).expect("write results");
    }

    pub fn write_error_log(&self, reason: &str) {
        fs::write(self.capture.join("error.log"), reason).expect("write error log");
    }

    pub fn write_debug_log(&self, text: &str) {
        fs::write(self.capture.join("debug.log"), text).expect("write debug log");
    }

    /// A capture stand-in that records its host argument, then signals
    /// handoff.
    pub fn write_capture_script(&self) -> PathBuf {
        let script = self.capture.join("setup.sh");
        fs::write(
            &script,
            "#!/usr/bin/env bash\necho \"capture hosts: $1\"\necho '--all done--'\n",
        )
        .expect("write capture script");
        script
    }
}
