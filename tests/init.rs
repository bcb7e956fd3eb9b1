use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_sharelens"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "sharelens init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".sharelens.toml");
    assert!(config_path.exists(), ".sharelens.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[analysis]"));
    assert!(content.contains("[languages]"));

    // Every option is commented out, so the template parses to the defaults
    let config = sharelens_core::ShareLensConfig::from_toml(&content).unwrap();
    assert_eq!(config.analysis.logit.max_iterations, 35);
    let _raw: toml::Value = toml::from_str(&content).unwrap();
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".sharelens.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_sharelens"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".sharelens.toml")).unwrap();
    assert_eq!(content, "# existing");
}
