use assert_cmd::Command;

#[test]
fn fails_fast_without_ssh_user() {
    Command::cargo_bin("orchestrator-master")
        .unwrap()
        .env_remove("SSH_USER")
        .env_remove("CONFIG_MASTER")
        .arg("--config")
        .arg("/nonexistent/config.json")
        .assert()
        .failure();
}

#[test]
fn fails_fast_on_missing_config_file() {
    Command::cargo_bin("orchestrator-master")
        .unwrap()
        .env("SSH_USER", "deployer")
        .arg("--config")
        .arg("/nonexistent/config.json")
        .assert()
        .failure();
}
