use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use bridge_host::{
    load_bridge_config, BridgeConfig, BridgeError, Generation, GenerationTag, ENV_CALL_TIMEOUT_MS,
    ENV_DEFAULT_QUEUE,
};
use tempfile::tempdir;

#[test]
fn loads_settings_from_toml() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("bridge.toml");
    fs::write(
        &path,
        "call_timeout_ms = 2500\ndefault_queue = \"main\"\nqueue_stack_kib = 256\n",
    )
    .expect("write config");

    let config = load_bridge_config(&path).expect("load");
    assert_eq!(config.call_timeout(), Some(Duration::from_millis(2500)));
    assert_eq!(config.default_queue, "main");
    assert_eq!(config.queue_stack_size(), Some(256 * 1024));
}

#[test]
fn missing_keys_fall_back_to_defaults() {
    let config = BridgeConfig::from_toml_str("").expect("empty config");
    assert_eq!(config, BridgeConfig::default());
    assert_eq!(config.call_timeout(), None);
    assert_eq!(config.default_queue, "default");
}

#[test]
fn unreadable_and_malformed_files_report_the_path() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("absent.toml");
    let err = load_bridge_config(&missing).expect_err("missing file");
    assert_eq!(err.code(), "bridge.config.read");
    assert_eq!(
        err.info().context.get("path").map(String::as_str),
        Some(missing.display().to_string().as_str())
    );

    let malformed = dir.path().join("broken.toml");
    fs::write(&malformed, "call_timeout_ms = \"soon\"").expect("write config");
    let err = load_bridge_config(&malformed).expect_err("malformed");
    assert!(matches!(err, BridgeError::Config(_)), "{err:?}");
    assert_eq!(err.code(), "bridge.config.parse");
    assert!(err.info().context.contains_key("path"));
}

#[test]
fn invalid_values_are_rejected() {
    let err = BridgeConfig::from_toml_str("call_timeout_ms = 0").expect_err("zero timeout");
    assert_eq!(err.code(), "bridge.config.call_timeout");
    assert!(err.info().hint.is_some());

    let err = BridgeConfig::from_toml_str("default_queue = \"  \"").expect_err("blank queue");
    assert_eq!(err.code(), "bridge.config.default_queue");

    let err = BridgeConfig::from_toml_str("queue_stack_kib = 0").expect_err("zero stack");
    assert_eq!(err.code(), "bridge.config.queue_stack");

    let err = BridgeConfig::from_toml_str("default_queue = \"js\\u0000x\"")
        .expect_err("nul in queue name");
    assert_eq!(err.code(), "bridge.config.default_queue");
}

#[test]
fn oversized_stack_is_rejected_instead_of_overflowing() {
    let config = BridgeConfig {
        queue_stack_kib: Some(usize::MAX),
        ..BridgeConfig::default()
    };
    let err = config.validate().expect_err("stack overflows");
    assert_eq!(err.code(), "bridge.config.queue_stack");
    assert_eq!(config.queue_stack_size(), None);
    assert!(matches!(
        Generation::new(GenerationTag::new("huge-stack").expect("tag"), &config),
        Err(BridgeError::Config(_))
    ));
}

#[test]
fn overrides_take_precedence_over_file_values() {
    let vars: HashMap<&str, &str> = [(ENV_CALL_TIMEOUT_MS, " 750 "), (ENV_DEFAULT_QUEUE, "ui")]
        .into_iter()
        .collect();
    let config = BridgeConfig::from_toml_str("call_timeout_ms = 10\ndefault_queue = \"main\"")
        .expect("parse")
        .apply_overrides(|key| vars.get(key).map(|value| value.to_string()))
        .expect("overrides");
    assert_eq!(config.call_timeout_ms, Some(750));
    assert_eq!(config.default_queue, "ui");
}

#[test]
fn malformed_override_names_the_variable() {
    let err = BridgeConfig::default()
        .apply_overrides(|key| (key == ENV_CALL_TIMEOUT_MS).then(|| "fast".to_string()))
        .expect_err("not a number");
    assert_eq!(err.code(), "bridge.config.call_timeout");
    assert_eq!(
        err.info().context.get("variable").map(String::as_str),
        Some(ENV_CALL_TIMEOUT_MS)
    );
    assert_eq!(err.info().context.get("value").map(String::as_str), Some("fast"));

    let err = BridgeConfig::default()
        .apply_overrides(|key| (key == ENV_DEFAULT_QUEUE).then(String::new))
        .expect_err("blank queue");
    assert_eq!(err.code(), "bridge.config.default_queue");
}

#[test]
fn configured_default_queue_names_the_worker_thread() {
    let config = BridgeConfig::from_toml_str("default_queue = \"js\"").expect("config");
    let generation =
        Generation::new(GenerationTag::new("cfg").expect("tag"), &config).expect("generation");
    assert_eq!(generation.queue_names(), vec!["js".to_string()]);
}
