//! Integration tests for the `ventlink` binary.
//!
//! Argument parsing, help, completions and error exit codes run without a
//! device. The end-to-end tests talk to a small fake unit on a loopback
//! socket.
#![allow(clippy::unwrap_used)]

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use secrecy::SecretString;
use serde_json::{Value, json};
use tempfile::TempDir;

use ventlink_api::auth::SignedHeader;
use ventlink_api::frame::{Method, RequestFrame};
use ventlink_api::PskSigner;

const DEVICE_ID: &str = "VA-0042";
const KEY: &str = "correct horse";

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `ventlink` binary with env isolation.
///
/// Clears `VENTLINK_*` variables and points the config file into `dir` so
/// tests never touch the user's real configuration.
fn ventlink_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ventlink");
    cmd.env("VENTLINK_CONFIG", config_file(dir))
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir)
        .env_remove("VENTLINK_DEVICE")
        .env_remove("VENTLINK_OUTPUT")
        .env_remove("VENTLINK_TIMEOUT")
        .env_remove("VENTLINK_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn config_file(dir: &Path) -> PathBuf {
    dir.join("config.toml")
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Fake device ─────────────────────────────────────────────────────

/// A loopback unit that checks signatures, answers `get` with a fixed
/// report and remembers the last airflow mode it was `set` to.
struct FakeDevice {
    addr: SocketAddr,
}

impl FakeDevice {
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mode = Arc::new(AtomicU8::new(2));
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { return };
                let mode = Arc::clone(&mode);
                std::thread::spawn(move || serve(stream, &mode));
            }
        });
        Self { addr }
    }

    fn port(&self) -> String {
        self.addr.port().to_string()
    }
}

fn serve(stream: std::net::TcpStream, mode: &AtomicU8) {
    let mut write = stream.try_clone().unwrap();
    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else { return };
        let request: RequestFrame = serde_json::from_str(&line).unwrap();
        let reply = if !signature_ok(&request) {
            json!({"m": "err", "r": request.r, "c": "auth", "e": "signature mismatch"})
        } else {
            match (request.m, request.p) {
                (Method::Set, Some(payload)) => {
                    mode.store(payload.ar_af, Ordering::SeqCst);
                    json!({"m": "ack", "r": request.r})
                }
                _ => json!({"m": "rsp", "r": request.r, "p": report(mode.load(Ordering::SeqCst))}),
            }
        };
        if writeln!(write, "{reply}").is_err() {
            return;
        }
    }
}

fn report(mode: u8) -> Value {
    json!({
        "dname": "Loft MVHR",
        "sup_rpm": 1450,
        "exh_rpm": 1380,
        "pwr": 18,
        "exr_t": 214,
        "oda_t": 62,
        "cm_af_sup": 42,
        "cm_af_exh": 40,
        "exr_rh": 55,
        "itk_rh": 61,
        "as_af": mode,
        "ar_min": 0,
        "as_rsec": 0,
        "flt_mo": 9,
        "svc_mo": 21,
        "sb_m": 1,
        "sb_af": 3,
        "sb_it": 240,
        "sb_ot": 140
    })
}

fn signature_ok(request: &RequestFrame) -> bool {
    let signer = PskSigner::new(request.i.clone(), SecretString::from(KEY.to_string()));
    signer.verify(
        &SignedHeader {
            method: request.m.as_str(),
            request_id: request.r,
            device_id: &request.d,
            timestamp: request.t,
        },
        &request.s,
    )
}

/// Run `setup` against `device` under profile `name`.
fn setup(dir: &Path, device: &FakeDevice, name: &str, key: &str) -> assert_cmd::assert::Assert {
    ventlink_cmd(dir)
        .args(["setup", "--name", name, "--host", "127.0.0.1", "--port"])
        .arg(device.port())
        .args(["--device-id", DEVICE_ID, "--key", key, "--timeout", "2s"])
        .assert()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = TempDir::new().unwrap();
    let output = ventlink_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    ventlink_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("ventilation")
            .and(predicate::str::contains("setup"))
            .and(predicate::str::contains("status"))
            .and(predicate::str::contains("airflow")),
    );
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    ventlink_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ventlink"));
}

#[test]
fn test_completions() {
    let dir = TempDir::new().unwrap();
    for shell in ["bash", "zsh", "fish"] {
        ventlink_cmd(dir.path())
            .args(["completions", shell])
            .assert()
            .success()
            .stdout(predicate::str::contains("ventlink"));
    }
}

// ── Without configuration ───────────────────────────────────────────

#[test]
fn test_status_without_devices() {
    let dir = TempDir::new().unwrap();
    ventlink_cmd(dir.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No devices configured"));
}

#[test]
fn test_devices_list_empty_json() {
    let dir = TempDir::new().unwrap();
    ventlink_cmd(dir.path())
        .args(["devices", "list", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn test_setup_without_host_is_usage_error() {
    let dir = TempDir::new().unwrap();
    ventlink_cmd(dir.path())
        .args(["setup", "--name", "loft", "--device-id", DEVICE_ID, "--key", KEY])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("host"));
    assert!(!config_file(dir.path()).exists());
}

#[test]
fn test_setup_rejects_bad_host() {
    let dir = TempDir::new().unwrap();
    ventlink_cmd(dir.path())
        .args(["setup", "--name", "loft", "--host", "not a host!", "--device-id", DEVICE_ID])
        .args(["--key", KEY, "--skip-check"])
        .assert()
        .code(2);
    assert!(!config_file(dir.path()).exists());
}

#[test]
fn test_airflow_rejects_odd_duration() {
    let dir = TempDir::new().unwrap();
    ventlink_cmd(dir.path())
        .args(["airflow", "boost", "-m", "25"])
        .assert()
        .code(2);
}

#[test]
fn test_unknown_device_is_not_found() {
    let dir = TempDir::new().unwrap();
    ventlink_cmd(dir.path())
        .args(["devices", "use", "attic"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("attic"));
}

// ── Against a fake device ───────────────────────────────────────────

#[test]
fn test_setup_then_status() {
    let dir = TempDir::new().unwrap();
    let device = FakeDevice::start();

    setup(dir.path(), &device, "loft", KEY)
        .success()
        .stdout(predicate::str::contains("Loft MVHR"));

    let saved = std::fs::read_to_string(config_file(dir.path())).unwrap();
    assert!(saved.contains("[devices.loft]"));
    assert!(saved.contains("default_device = \"loft\""));

    let output = ventlink_cmd(dir.path())
        .args(["status", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let status: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["available"], true);
    assert_eq!(status["device_name"], "Loft MVHR");
    let indoor = status["entities"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["key"] == "indoor_temp")
        .unwrap();
    assert_eq!(indoor["value"], 21.4);
}

#[test]
fn test_status_plain_lines() {
    let dir = TempDir::new().unwrap();
    let device = FakeDevice::start();
    setup(dir.path(), &device, "loft", KEY).success();

    ventlink_cmd(dir.path())
        .args(["status", "-o", "plain"])
        .assert()
        .success()
        .stdout(
            predicate::str::starts_with("loft ")
                .and(predicate::str::contains("airflow_mode=normal")),
        );
}

#[test]
fn test_airflow_switches_mode() {
    let dir = TempDir::new().unwrap();
    let device = FakeDevice::start();
    setup(dir.path(), &device, "loft", KEY).success();

    ventlink_cmd(dir.path())
        .args(["airflow", "boost", "-m", "30", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reported_mode\": \"boost\""));
}

#[test]
fn test_watch_stops_after_count() {
    let dir = TempDir::new().unwrap();
    let device = FakeDevice::start();
    setup(dir.path(), &device, "loft", KEY).success();

    let output = ventlink_cmd(dir.path())
        .args(["watch", "--count", "1", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1);
    let update: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(update["name"], "loft");
}

#[test]
fn test_setup_with_wrong_key_is_auth_error() {
    let dir = TempDir::new().unwrap();
    let device = FakeDevice::start();

    setup(dir.path(), &device, "loft", "wrong key").code(3);
    assert!(!config_file(dir.path()).exists());
}

#[test]
fn test_setup_with_nothing_listening_is_connection_error() {
    let dir = TempDir::new().unwrap();
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    ventlink_cmd(dir.path())
        .args(["setup", "--name", "loft", "--host", "127.0.0.1", "--port"])
        .arg(port.to_string())
        .args(["--device-id", DEVICE_ID, "--key", KEY, "--timeout", "2s"])
        .assert()
        .code(7);
    assert!(!config_file(dir.path()).exists());
}

#[test]
fn test_same_device_under_second_name_conflicts() {
    let dir = TempDir::new().unwrap();
    let device = FakeDevice::start();
    setup(dir.path(), &device, "loft", KEY).success();

    setup(dir.path(), &device, "attic", KEY)
        .code(6)
        .stderr(predicate::str::contains("loft"));
}

#[test]
fn test_devices_list_and_remove() {
    let dir = TempDir::new().unwrap();
    let device = FakeDevice::start();
    setup(dir.path(), &device, "loft", KEY).success();

    let output = ventlink_cmd(dir.path())
        .args(["devices", "list", "-o", "json"])
        .output()
        .unwrap();
    let devices: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(devices[0]["name"], "loft");
    assert_eq!(devices[0]["key"], "plaintext");
    assert_eq!(devices[0]["default"], true);

    ventlink_cmd(dir.path())
        .args(["devices", "remove", "loft", "--yes"])
        .assert()
        .success();
    ventlink_cmd(dir.path())
        .args(["devices", "list", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn test_remove_without_yes_needs_a_terminal() {
    let dir = TempDir::new().unwrap();
    let device = FakeDevice::start();
    setup(dir.path(), &device, "loft", KEY).success();

    ventlink_cmd(dir.path())
        .args(["devices", "remove", "loft"])
        .assert()
        .code(2);
}
