use assert_cmd::Command;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

// Minimal valid TOML config for the simulated backend
fn write_config(dir: &Path, history: bool) -> PathBuf {
    let mut toml = String::from(
        r#"
[pins]
# pins are unused in sim backend but must be present
rotation_sensor = 23
motor_power = 22

[sensor]
active_low = true
debounce_ms = 125

[rotation]
expected_rotation_ms = 9900
pause_between_rotations_ms = 100
max_rotations_per_feed = 20

[runner]
tick_hz = 100
"#,
    );
    if history {
        let path = dir.join("var").join("feedings.toml");
        toml.push_str(&format!(
            "\n[history]\ncapacity = 16\npath = {:?}\n",
            path.display().to_string()
        ));
    }
    let path = dir.join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn feeder(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("feeder").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("FEEDER_TEST_SIM_STUCK");
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["feed", "--rotations", "2"], 0, "Feed complete: 2 rotation(s), 0 forced", "stdout")]
#[case(&["feed"], 2, "required", "stderr")]
#[case(&["feed", "--rotations", "0"], 5, "Invalid rotation count (0)", "stderr")]
#[case(&["feed", "--rotations", "21"], 5, "Invalid rotation count (21)", "stderr")]
#[case(&["self-check"], 0, "self-check ok (backend: simulated, sensor: idle)", "stdout")]
#[case(&["health"], 0, "ok", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), false);

    let assert = feeder(&cfg).args(args).assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn stuck_sensor_feed_completes_by_timeout() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), false);
    feeder(&cfg)
        .env("FEEDER_TEST_SIM_STUCK", "1")
        .args(["feed", "--rotations", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 forced"))
        .stderr(predicate::str::contains("ended by timeout"));
}

#[rstest]
fn json_feed_reports_summary() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), false);
    let out = feeder(&cfg)
        .args(["--json", "--log-level", "warn", "feed", "--rotations", "3"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let line = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(v["status"], "complete");
    assert_eq!(v["rotations"], 3);
    assert_eq!(v["forced_rotations"], 0);
    assert!(v["duration_ms"].as_u64().unwrap() > 3 * 9_000);
}

#[rstest]
fn json_rejection_has_reason_and_exit_code() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), false);
    let out = feeder(&cfg)
        .args(["--json", "feed", "--rotations", "0"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(5));
    let v: serde_json::Value =
        serde_json::from_str(String::from_utf8(out.stdout).unwrap().trim()).unwrap();
    assert_eq!(v["reason"], "InvalidRotationCount");
}

#[rstest]
fn history_lists_persisted_feeds() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), true);

    feeder(&cfg)
        .args(["history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No feedings recorded."));

    for n in ["1", "2"] {
        feeder(&cfg).args(["feed", "--rotations", n]).assert().success();
    }

    let out = feeder(&cfg).args(["--json", "history"]).output().unwrap();
    assert!(out.status.success());
    let lines: Vec<serde_json::Value> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    let mut rotations: Vec<u64> = lines.iter().map(|v| v["rotations"].as_u64().unwrap()).collect();
    rotations.sort_unstable();
    assert_eq!(rotations, vec![1, 2]);
    assert!(lines[0]["as_of_adjusted_sec"].as_u64().unwrap() >= lines[1]["as_of_adjusted_sec"].as_u64().unwrap());
    assert!(lines[0]["at"].as_str().unwrap().ends_with("UTC"));
}

#[rstest]
fn history_needs_a_path() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), false);
    feeder(&cfg)
        .args(["history"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("history.path"));
}

#[rstest]
fn serve_answers_each_stdin_trigger() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), false);
    let stdin = [
        r#"{"rotations": 50}"#,
        "not json",
        r#"{"rotations": 1, "asOf": 1000}"#,
        r#"{"rotations": 1, "asOf": 999}"#,
        r#"{"rotations": 1, "asOf": 1001}"#,
    ]
    .join("\n");

    let out = feeder(&cfg)
        .args(["--json", "--log-level", "info", "serve"])
        .write_stdin(stdin)
        .output()
        .unwrap();
    assert!(out.status.success());
    // End of stdin does not cut the admitted feed short.
    assert_eq!(serve_finished(&out.stderr)["feeds"], 1);

    let replies: Vec<serde_json::Value> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(replies.len(), 5);
    assert_eq!(replies[0]["reason"], "InvalidRotationCount");
    assert_eq!(replies[1]["reason"], "Payload");
    assert_eq!(replies[2]["accepted"], true);
    assert_eq!(replies[2]["rotations"], 1);
    assert_eq!(replies[3]["reason"], "Stale");
    assert_eq!(replies[4]["reason"], "FeedInProgress");
}

/// Fields of the "serve finished" JSON log line.
fn serve_finished(stderr: &[u8]) -> serde_json::Value {
    String::from_utf8_lossy(stderr)
        .lines()
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .find(|v| v["fields"]["message"] == "serve finished")
        .map(|v| v["fields"].clone())
        .expect("serve finished log line")
}

#[rstest]
fn serve_finishes_admitted_feed_after_stdin_ends() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), true);

    let out = feeder(&cfg)
        .args(["--json", "--log-level", "info", "serve"])
        .write_stdin("{\"rotations\": 1, \"asOf\": 1000}\n")
        .output()
        .unwrap();
    assert!(out.status.success());

    let reply: serde_json::Value =
        serde_json::from_str(String::from_utf8(out.stdout).unwrap().trim()).unwrap();
    assert_eq!(reply["accepted"], true);

    let fields = serve_finished(&out.stderr);
    assert_eq!(fields["feeds"], 1);
    assert_eq!(fields["tick_errors"], 0);

    // The simulated wheel turned one full rotation, so no timeout fired.
    let log = String::from_utf8_lossy(&out.stderr);
    assert!(!log.contains("rotation timed out"), "{log}");

    feeder(&cfg)
        .args(["history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 rotation(s)"));
}

#[rstest]
fn serve_with_empty_stdin_exits_idle() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), false);
    let out = feeder(&cfg)
        .args(["--json", "--log-level", "info", "serve"])
        .write_stdin("")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(out.stdout.is_empty());
    assert_eq!(serve_finished(&out.stderr)["feeds"], 0);
}

#[rstest]
fn cli_reports_bad_calibration_header() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), false);

    let bad_csv = dir.path().join("rotations.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "ms").unwrap();
    writeln!(f, "9500").unwrap();

    feeder(&cfg)
        .arg("--calibration")
        .arg(&bad_csv)
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn missing_config_fails() {
    let dir = tempdir().unwrap();
    feeder(&dir.path().join("nope.toml"))
        .arg("health")
        .assert()
        .code(1);
}
