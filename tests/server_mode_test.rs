#![cfg(unix)]

mod common;

use blocksync::{sync_push, Endpoint, PushRequest, SyncConfig, SyncError};
use common::pattern;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_blocksync");

fn local_config(block_size: u64) -> SyncConfig {
    SyncConfig {
        block_size,
        remote_program: BIN.to_string(),
        ..SyncConfig::default()
    }
}

/// Write an executable shell script standing in for the serving role.
fn write_script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

fn assert_terminated_with_status(err: SyncError, status: &str) {
    match err {
        SyncError::Transport(msg) => assert!(msg.contains(status), "{}", msg),
        other => panic!("expected transport failure, got {:?}", other),
    }
}

fn request(source: &Path, dest: &Path) -> PushRequest {
    PushRequest {
        source: source.to_path_buf(),
        endpoint: Endpoint::Local,
        dest: dest.to_string_lossy().into_owned(),
        show_progress: false,
    }
}

#[tokio::test]
async fn test_push_through_local_server_process() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let source = temp.path().join("src.img");
    let dest = temp.path().join("dest.img");
    let data = pattern(5 * 4096 + 123, 21);
    fs::write(&source, &data)?;

    let config = local_config(4096);

    let report = sync_push(&request(&source, &dest), &config).await?;
    assert_eq!(report.diff_blocks, 6);
    assert_eq!(fs::read(&dest)?, data);

    let report = sync_push(&request(&source, &dest), &config).await?;
    assert_eq!(report.same_blocks, 6);
    assert_eq!(report.diff_blocks, 0);
    assert_eq!(report.bytes_sent, 0);

    Ok(())
}

#[tokio::test]
async fn test_push_to_path_with_spaces() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let source = temp.path().join("src.img");
    let dest = temp.path().join("my backup.img");
    fs::write(&source, pattern(3000, 22))?;

    let report = sync_push(&request(&source, &dest), &local_config(1024)).await?;
    assert_eq!(report.block_count, 3);
    assert_eq!(fs::read(&dest)?, fs::read(&source)?);

    Ok(())
}

#[tokio::test]
async fn test_peer_exiting_early_is_transport_failure() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src.img");
    fs::write(&source, b"data").unwrap();

    // `false` ignores its arguments and exits 1 without a handshake.
    let config = SyncConfig {
        remote_program: "false".to_string(),
        ..SyncConfig::default()
    };
    let err = sync_push(&request(&source, &temp.path().join("dest.img")), &config)
        .await
        .unwrap_err();

    match err {
        SyncError::Transport(msg) => assert!(msg.contains("exit"), "{}", msg),
        other => panic!("expected transport failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_exiting_server_is_not_cut_short() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let source = temp.path().join("src.img");
    let dest = temp.path().join("dest.img");
    let data = pattern(3 * 4096, 24);
    fs::write(&source, &data)?;

    // Serves the session normally, then lingers past the failure wait.
    let slow = write_script(
        temp.path(),
        "slow-server.sh",
        &format!("\"{}\" \"$@\"\nstatus=$?\nsleep 11\nexit $status\n", BIN),
    );
    let config = SyncConfig {
        block_size: 4096,
        remote_program: slow,
        ..SyncConfig::default()
    };

    let report = sync_push(&request(&source, &dest), &config).await?;
    assert_eq!(report.diff_blocks, 3);
    assert_eq!(fs::read(&dest)?, data);
    assert_eq!(
        fs::metadata(temp.path().join("dest.img.4096.csum.cache"))?.len(),
        3 * 40
    );

    Ok(())
}

#[tokio::test]
async fn test_peer_exiting_after_handshake_is_transport_failure() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src.img");
    fs::write(&source, pattern(4096, 25)).unwrap();

    // Completes the handshake, takes the source size, then goes away.
    let server = write_script(
        temp.path(),
        "handshake-only.sh",
        "printf '%s %s\\n0\\n' \"$2\" \"$4\"\nread size\nexit 7\n",
    );
    let config = SyncConfig {
        block_size: 4096,
        remote_program: server,
        ..SyncConfig::default()
    };

    let err = sync_push(&request(&source, &temp.path().join("dest.img")), &config)
        .await
        .unwrap_err();
    assert_terminated_with_status(err, "exit status: 7");
}

#[tokio::test]
async fn test_peer_exiting_during_payload_is_transport_failure() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src.img");
    fs::write(&source, pattern(2 * 4096, 26)).unwrap();

    // Asks for the first block, takes the verdict, exits before the payload.
    let server = write_script(
        temp.path(),
        "no-payload.sh",
        "printf '%s %s\\n0\\n' \"$2\" \"$4\"\nread size\nprintf '%s\\n' -1\nread verdict\nexit 7\n",
    );
    let config = SyncConfig {
        block_size: 4096,
        remote_program: server,
        ..SyncConfig::default()
    };

    let err = sync_push(&request(&source, &temp.path().join("dest.img")), &config)
        .await
        .unwrap_err();
    assert_terminated_with_status(err, "exit status: 7");
}

#[tokio::test]
async fn test_push_refuses_device_destination() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src.img");
    fs::write(&source, b"data").unwrap();

    let err = sync_push(
        &request(&source, Path::new("/dev/sdz")),
        &local_config(4096),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SyncError::DeviceDestination(_)));
}

#[test]
fn test_server_mode_over_stdio() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("dest.img");
    let dest_str = dest.to_string_lossy().into_owned();

    let mut child = Command::new(BIN)
        .args(["--server", &dest_str, "--block-size", "4"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"6\ndiff\nabcddiff\nef")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout, format!("{} 4\n0\n-1\n-1\n", dest_str));
    assert_eq!(fs::read(&dest).unwrap(), b"abcdef");
}

#[test]
fn test_device_destination_refused() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src.img");
    fs::write(&source, b"data").unwrap();

    let output = Command::new(BIN)
        .arg(&source)
        .args(["local", "/dev/sdz"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("device destination is not allowed"), "{}", stderr);
}

#[test]
fn test_json_report() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src.img");
    let dest = temp.path().join("dest.img");
    fs::write(&source, pattern(8192, 23)).unwrap();

    let output = Command::new(BIN)
        .arg(&source)
        .arg("local")
        .arg(&dest)
        .args(["--block-size", "4096", "--json", "--remote-program", BIN])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["diff_blocks"], 2);
    assert_eq!(report["same_blocks"], 0);
    assert_eq!(report["source_size"], 8192);
}
