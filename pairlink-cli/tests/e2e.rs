//! End-to-end tests for the pairlink binary

use std::process::Command;

fn pairlink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pairlink"));
    // Keep user-level config out of the picture
    let home = std::env::temp_dir().join("pairlink-e2e-home");
    cmd.env("XDG_CONFIG_HOME", &home)
        .env("PAIRLINK_PROJECT_CONFIG_DIR", home.join("project"))
        .env_remove("PORT")
        .env_remove("PAIRLINK_HOST")
        .env_remove("SUPABASE_URL")
        .env_remove("SUPABASE_KEY");
    cmd
}

#[test]
fn pairlink_help_lists_commands() {
    let output = pairlink().arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("config"));
}

#[test]
fn config_show_prints_defaults() {
    let output = pairlink().args(["config", "show"]).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[server]"));
    assert!(stdout.contains("port = 5001"));
    assert!(stdout.contains("backend = \"local\""));
}

#[test]
fn config_show_honors_port_env() {
    let output = pairlink()
        .args(["config", "show"])
        .env("PORT", "6100")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("port = 6100"));
}

#[test]
fn invalid_port_env_fails() {
    let output = pairlink()
        .args(["config", "show"])
        .env("PORT", "not-a-port")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("PORT"));
}

#[test]
fn config_path_mentions_project_file() {
    let output = pairlink().args(["config", "path"]).output().unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("config.toml"));
}
