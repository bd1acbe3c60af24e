use std::fs;
use std::process::Command;

use assert_cmd::cargo;
use tempfile::tempdir;

#[test]
fn print_config_reports_the_env_override_and_exits_cleanly() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("config.xml");
    fs::write(&cfg_path, "<config><log_level>quiet</log_level></config>").unwrap();

    let me = cargo::cargo_bin!("shutterbatch");
    let out = Command::new(me)
        .env("SHUTTERBATCH_CONFIG", &cfg_path)
        .arg("--print-config")
        .output()
        .expect("spawn binary");

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.contains("SHUTTERBATCH_CONFIG"),
        "stdout did not mention the env override: {stdout}"
    );
    assert!(stdout.contains(&cfg_path.display().to_string()));
}

#[test]
fn bad_config_cap_is_a_startup_error() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("config.xml");
    fs::write(
        &cfg_path,
        "<config><log_level>quiet</log_level><batch_cap>0</batch_cap></config>",
    )
    .unwrap();

    let me = cargo::cargo_bin!("shutterbatch");
    let out = Command::new(me)
        .env("SHUTTERBATCH_CONFIG", &cfg_path)
        .args(["--data-dir"])
        .arg(td.path().join("data"))
        .arg("history")
        .output()
        .expect("spawn binary");

    assert!(!out.status.success(), "a zero cap must be rejected");
}

#[test]
fn malformed_config_is_a_startup_error() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("config.xml");
    fs::write(&cfg_path, "<config><batch_cap>").unwrap();

    let me = cargo::cargo_bin!("shutterbatch");
    let out = Command::new(me)
        .env("SHUTTERBATCH_CONFIG", &cfg_path)
        .arg("history")
        .output()
        .expect("spawn binary");

    assert!(!out.status.success());
}
