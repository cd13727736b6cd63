use std::process::Command;
use tempfile::TempDir;

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let output = Command::new(env!("CARGO_BIN_EXE_treesync"))
        .arg("init")
        .current_dir(temp_path)
        .output()
        .expect("Failed to run init command");

    assert!(output.status.success());

    // Check that config file was created
    let config_path = temp_path.join(".treesync/settings.toml");
    assert!(config_path.exists());

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("version = 1"));
    assert!(content.contains("[monitor]"));
    assert!(content.contains("[sync]"));

    // A second init without --force refuses to overwrite
    let output = Command::new(env!("CARGO_BIN_EXE_treesync"))
        .arg("init")
        .current_dir(temp_path)
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_config_command() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let config_dir = temp_path.join(".treesync");
    std::fs::create_dir_all(&config_dir).unwrap();

    let config_content = r#"
version = 2
[sync]
batch_size = 99
"#;
    std::fs::write(config_dir.join("settings.toml"), config_content).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_treesync"))
        .arg("config")
        .current_dir(temp_path)
        .output()
        .expect("Failed to run config command");

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("version = 2"));
    assert!(stdout.contains("batch_size = 99"));
}

#[test]
fn test_scan_and_status_commands() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();
    let watched = temp_path.join("watched");
    std::fs::create_dir_all(&watched).unwrap();
    std::fs::write(watched.join("a.txt"), "a").unwrap();

    let run = |args: &[&str]| {
        Command::new(env!("CARGO_BIN_EXE_treesync"))
            .args(args)
            .current_dir(temp_path)
            .output()
            .unwrap()
    };

    assert!(run(&["init"]).status.success());

    let first = run(&["scan", "watched"]);
    assert!(first.status.success());
    let stdout = String::from_utf8(first.stdout).unwrap();
    assert!(stdout.contains("No baseline recorded"));
    assert!(stdout.contains("+ a.txt"));

    // Scanning does not record a baseline, so the diff is still pending
    let second = run(&["scan", "watched"]);
    let stdout = String::from_utf8(second.stdout).unwrap();
    assert!(stdout.contains("+ a.txt"));
    assert!(!stdout.contains("No changes."));

    let status = run(&["status", "--json"]);
    assert!(status.status.success());
    assert_eq!(String::from_utf8(status.stdout).unwrap().trim(), "[]");
}

fn write_watch_settings(temp_path: &std::path::Path) {
    std::fs::create_dir_all(temp_path.join("watched")).unwrap();
    std::fs::create_dir_all(temp_path.join(".treesync")).unwrap();
    let config_content = r#"
[[monitor.paths]]
path = "watched"
"#;
    std::fs::write(temp_path.join(".treesync/settings.toml"), config_content).unwrap();
}

#[test]
fn test_watch_stops_after_duration() {
    let temp_dir = TempDir::new().unwrap();
    write_watch_settings(temp_dir.path());

    let output = Command::new(env!("CARGO_BIN_EXE_treesync"))
        .args(["watch", "--for-secs", "1"])
        .current_dir(temp_dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Stopped. 0 synced files on record."));
}

#[cfg(unix)]
#[test]
fn test_watch_drains_on_interrupt() {
    let temp_dir = TempDir::new().unwrap();
    write_watch_settings(temp_dir.path());

    let child = Command::new(env!("CARGO_BIN_EXE_treesync"))
        .arg("watch")
        .current_dir(temp_dir.path())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .unwrap();

    // Give the runtime time to install its signal handler
    std::thread::sleep(std::time::Duration::from_millis(1500));
    let status = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Received shutdown signal"));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Stopped."));
}
