use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use blockbot::config::{ConfigFile, load_and_validate, load_or_default};
use blockbot::errors::BlockbotError;
use blockbot::types::Language;
use blockbot_test_utils::ConfigBuilder;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let file = write_config(
        r#"
[execution]
python = "/opt/venv/bin/python"

[robot]
move_power = 75
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.listen_addr().to_string(), "127.0.0.1:3001");
    assert_eq!(cfg.execution.default_timeout_ms, 30_000);
    assert_eq!(
        cfg.execution.interpreter_for(Language::Python),
        "/opt/venv/bin/python"
    );
    assert_eq!(cfg.execution.interpreter_for(Language::JavaScript), "node");
    assert_eq!(cfg.packages.timeout_ms, 300_000);
    assert_eq!(cfg.packages.requirements_file, Path::new("requirements.txt"));
    assert_eq!(cfg.robot.move_power, 75);
}

#[test]
fn no_config_path_means_defaults() {
    let cfg = load_or_default(None).unwrap();
    assert_eq!(cfg.listen_addr(), ConfigFile::default().listen_addr());
    assert_eq!(cfg.robot.move_power, 50);
}

#[test]
fn zero_timeout_is_a_config_error() {
    let file = write_config("[terminal]\ndefault_timeout_ms = 0\n");

    match load_and_validate(file.path()) {
        Err(BlockbotError::ConfigError(msg)) => {
            assert!(msg.contains("[terminal].default_timeout_ms"));
        }
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn move_power_must_be_a_percentage() {
    for power in [0u8, 101, 255] {
        let result = ConfigFile::try_from(ConfigBuilder::new().move_power(power).raw());
        assert!(
            matches!(result, Err(BlockbotError::ConfigError(ref msg)) if msg.contains("move_power")),
            "move_power = {power} should be rejected"
        );
    }
}

#[test]
fn malformed_listen_address_is_rejected() {
    let file = write_config("[server]\nlisten = \"localhost\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(BlockbotError::ConfigError(_))
    ));
}

#[test]
fn syntax_errors_and_missing_files_keep_their_kind() {
    let file = write_config("[execution\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(BlockbotError::TomlError(_))
    ));

    assert!(matches!(
        load_and_validate("/definitely/not/here/blockbot.toml"),
        Err(BlockbotError::IoError(_))
    ));
}

#[test]
fn listen_override_replaces_configured_address() {
    let cfg = ConfigBuilder::new()
        .listen("0.0.0.0:8080")
        .build()
        .with_listen("127.0.0.1:9000".parse().unwrap());

    assert_eq!(cfg.listen_addr().port(), 9000);
    assert_eq!(cfg.server.listen, "127.0.0.1:9000");
}
