use predicates::str::contains;

mod common;
use common::TestEnv;

const NO_ARTIFACT: &str = r#"{"create_artifact": false}"#;

#[test]
fn finalize_merges_trusted_observations_into_a_summary() {
    let env = TestEnv::new();
    env.mark_post();
    env.write_results(&[
        r#"{"host":"api.github.example.com","method":"GET","path":"/repos/x/y","permissions":[{"contents":"read"}]}"#,
        r#"{"host":"api.github.example.com","method":"POST","path":"/repos/x/y/issues","permissions":[{"issues":"write"}]}"#,
    ]);

    env.cmd()
        .args(["observe", "--config", NO_ARTIFACT])
        .assert()
        .success()
        .stdout(contains("#### Minimal required permissions:"))
        .stdout(contains("contents: read"))
        .stdout(contains("issues: write"));
}

#[test]
fn finalize_reports_empty_object_when_nothing_observed() {
    let env = TestEnv::new();
    env.mark_post();
    env.write_results(&[]);

    env.cmd()
        .args(["observe", "--config", NO_ARTIFACT])
        .assert()
        .success()
        .stdout(contains("permissions: {}"));
}

#[test]
fn finalize_discards_untrusted_hosts() {
    let env = TestEnv::new();
    env.mark_post();
    env.write_results(&[
        r#"{"host":"untrusted.example.com","method":"GET","path":"/x","permissions":[{"contents":"write"}]}"#,
    ]);

    env.cmd()
        .args(["observe", "--config", NO_ARTIFACT])
        .assert()
        .success()
        .stdout(contains("permissions: {}"));
}

#[test]
fn finalize_surfaces_unknown_calls_without_failing() {
    let env = TestEnv::new();
    env.mark_post();
    env.write_results(&[
        r#"{"host":"api.github.example.com","method":"GET","path":"/a","permissions":[{"contents":"read"}]}"#,
        r#"{"host":"api.github.example.com","method":"POST","path":"/odd","permissions":[{"unknown":"read"}]}"#,
    ]);

    env.cmd()
        .args(["observe", "--config", NO_ARTIFACT])
        .assert()
        .success()
        .stdout(contains("contents: read"))
        .stderr(contains("POST api.github.example.com/odd"));
}

#[test]
fn finalize_fails_when_capture_left_an_error_log() {
    let env = TestEnv::new();
    env.mark_post();
    env.write_results(&[]);
    env.write_error_log("proxy could not bind to port 8080");

    env.cmd()
        .args(["observe", "--config", NO_ARTIFACT])
        .assert()
        .failure()
        .stderr(contains("proxy could not bind to port 8080"));
}

#[test]
fn finalize_fails_when_results_are_missing() {
    let env = TestEnv::new();
    env.mark_post();

    env.cmd()
        .args(["observe", "--config", NO_ARTIFACT])
        .assert()
        .failure()
        .stderr(contains("capture result data missing"));
}

#[test]
fn finalize_echoes_the_capture_debug_log() {
    let env = TestEnv::new();
    env.mark_post();
    env.write_results(&[]);
    env.write_debug_log("interception table loaded");

    env.cmd()
        .args(["observe", "--config", NO_ARTIFACT])
        .assert()
        .success()
        .stdout(contains("interception table loaded"));
}

#[test]
fn finalize_appends_to_the_step_summary_file_when_present() {
    let env = TestEnv::new();
    env.mark_post();
    env.write_results(&[
        r#"{"host":"api.github.example.com","method":"GET","path":"/a","permissions":[{"contents":"read"}]}"#,
    ]);

    env.cmd()
        .args(["observe", "--config", NO_ARTIFACT])
        .env("GITHUB_STEP_SUMMARY", &env.summary_file)
        .assert()
        .success();

    let summary = std::fs::read_to_string(&env.summary_file).expect("summary written");
    assert!(summary.contains("#### Minimal required permissions:"));
    assert!(summary.contains("contents: read"));
}

#[test]
fn disabled_config_short_circuits_both_phases() {
    let env = TestEnv::new();
    // no marker, no capture script, no results: nothing may be touched
    env.cmd()
        .args(["observe", "--config", r#"{"enabled": false}"#])
        .assert()
        .success();
    assert!(!env.marker_exists());
}

#[test]
fn setup_persists_the_marker_and_mirrors_the_handoff() {
    let env = TestEnv::new();
    let script = env.write_capture_script();
    env.write_results(&[]);

    env.cmd()
        .args(["observe", "--config", NO_ARTIFACT])
        .env("TOKENLENS_CAPTURE_SCRIPT", &script)
        .assert()
        .success()
        .stdout(contains("capture hosts:"))
        .stdout(contains("api.github.example.com"));
    assert!(env.marker_exists());

    // second invocation of the same lifecycle enters finalize
    env.cmd()
        .args(["observe", "--config", NO_ARTIFACT])
        .assert()
        .success()
        .stdout(contains("permissions: {}"));
    assert!(!env.marker_exists());
}

#[test]
fn setup_fails_the_job_on_nonzero_capture_exit() {
    let env = TestEnv::new();
    let script = env.capture.join("setup.sh");
    std::fs::write(&script, "#!/usr/bin/env bash\necho 'starting'\nexit 7\n")
        .expect("write failing capture script");

    env.cmd()
        .args(["observe", "--config", NO_ARTIFACT])
        .env("TOKENLENS_CAPTURE_SCRIPT", &script)
        .assert()
        .failure()
        .code(7);
}
