//! Integration tests for the lazyinit configuration system
//!
//! These tests verify:
//! - Loading configuration from TOML, YAML, and JSON files
//! - Environment variable overrides
//! - Default values for all configuration sections
//! - Policy table construction and validation
//! - Applying a configuration to the dispatcher

use std::sync::Arc;
use std::time::Duration;

use lazyinit::config::{read_document, Config, DiagnosticsConfig, LoggingConfig, ReporterConfig};
use lazyinit::diagnostics::MemorySink;
use lazyinit::dispatch::{ClassificationMode, DispatchResult, LazyInit};
use lazyinit::error::Error;
use lazyinit::policy::Classification;
use lazyinit::registry::Registrar;
use serial_test::serial;
use tempfile::tempdir;

const ENV_VARS: &[&str] = &[
    "LAZYINIT_CONFIG",
    "LAZYINIT_STRICT",
    "LAZYINIT_GRACE_SECS",
    "LAZYINIT_INTERVAL_SECS",
    "LAZYINIT_LOG_LEVEL",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

// ============================================================================
// Default Configuration Tests
// ============================================================================

#[test]
fn test_default_sections() {
    let reporter = ReporterConfig::default();
    assert!(reporter.enabled);
    assert_eq!(reporter.grace_period, Duration::from_secs(30));
    assert_eq!(reporter.interval, Duration::from_secs(5));

    assert_eq!(DiagnosticsConfig::default().buffer_capacity, 16 * 1024);
    assert_eq!(LoggingConfig::default().log_level, "warn");
    assert_eq!(Config::default().mode(), ClassificationMode::Strict);
}

// ============================================================================
// File Format Tests
// ============================================================================

#[test]
#[serial]
fn test_load_toml_file() {
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("lazyinit.toml");
    std::fs::write(
        &path,
        r#"
[mode]
strict = false

[reporter]
grace_period = "10s"
interval = "500ms"

[policy]
eligible = ["camera", "cnss2"]
deferred = ["sec_debug"]
ignored = ["zram"]
builtin = ["usb"]
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.mode(), ClassificationMode::Permissive);
    assert_eq!(config.reporter.grace_period, Duration::from_secs(10));
    assert_eq!(config.reporter.interval, Duration::from_millis(500));

    let policy = config.to_policy();
    assert_eq!(policy.classify("camera"), Classification::Eligible);
    assert_eq!(policy.classify("sec_debug"), Classification::DeferredToEnd);
    assert_eq!(policy.classify("zram"), Classification::Ignored);
    assert!(policy.is_builtin("usb"));
    assert_eq!(policy.capacity(), 3);
}

#[test]
#[serial]
fn test_load_yaml_file() {
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("lazyinit.yaml");
    std::fs::write(
        &path,
        "diagnostics:\n  buffer_capacity: 256\npolicy:\n  eligible: [a, b]\n",
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.diagnostics.buffer_capacity, 256);
    assert_eq!(config.policy.eligible, vec!["a", "b"]);
    assert!(config.mode.strict);
}

#[test]
#[serial]
fn test_load_json_file() {
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("lazyinit.json");
    std::fs::write(&path, r#"{"reporter": {"enabled": false}, "logging": {"log_level": "debug"}}"#)
        .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert!(!config.reporter.enabled);
    assert_eq!(config.reporter.interval, Duration::from_secs(5));
    assert_eq!(config.logging.log_level, "debug");
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("lazyinit.toml");
    std::fs::write(&path, "[mode\nstrict = ").unwrap();

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config file"));
}

#[test]
#[serial]
fn test_missing_explicit_file_falls_back_to_defaults() {
    clear_env();
    let dir = tempdir().unwrap();
    let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_later_layer_keeps_keys_it_leaves_out() {
    let dir = tempdir().unwrap();
    let system = dir.path().join("system.toml");
    let project = dir.path().join("project.toml");
    std::fs::write(
        &system,
        "[mode]\nstrict = false\n\n[reporter]\ngrace_period = \"90s\"\n\n[policy]\nignored = [\"zram\"]\n",
    )
    .unwrap();
    std::fs::write(&project, "[policy]\neligible = [\"camera\"]\n").unwrap();

    let config = Config::from_layers(&[system, project]).unwrap();
    assert_eq!(config.mode(), ClassificationMode::Permissive);
    assert_eq!(config.reporter.grace_period, Duration::from_secs(90));
    assert_eq!(config.reporter.interval, Duration::from_secs(5));
    assert_eq!(config.policy.eligible, vec!["camera"]);
    assert_eq!(config.policy.ignored, vec!["zram"]);
}

#[test]
fn test_later_layer_overrides_keys_it_sets() {
    let dir = tempdir().unwrap();
    let system = dir.path().join("system.toml");
    let user = dir.path().join("user.yaml");
    std::fs::write(&system, "[mode]\nstrict = false\n[logging]\nlog_level = \"info\"\n").unwrap();
    std::fs::write(&user, "mode:\n  strict: true\n").unwrap();

    let config = Config::from_layers(&[system, user, dir.path().join("absent.toml")]).unwrap();
    assert_eq!(config.mode(), ClassificationMode::Strict);
    assert_eq!(config.logging.log_level, "info");
}

#[test]
fn test_read_document_reports_format_errors() {
    let dir = tempdir().unwrap();
    let cases = [
        ("bad.toml", "[mode\n"),
        ("bad.yaml", "mode: [\n"),
        ("bad.json", "{\"mode\": "),
    ];

    for (file, body) in cases {
        let path = dir.path().join(file);
        std::fs::write(&path, body).unwrap();
        let err = read_document::<Config>(&path).unwrap_err();
        match (file, err) {
            ("bad.toml", Error::TomlParse(_))
            | ("bad.yaml", Error::YamlParse(_))
            | ("bad.json", Error::JsonParse(_)) => {}
            (file, other) => panic!("unexpected error for {}: {:?}", file, other),
        }
    }

    assert!(matches!(
        read_document::<Config>(&dir.path().join("absent.toml")),
        Err(Error::FileNotFound(_))
    ));
}

// ============================================================================
// Environment Override Tests
// ============================================================================

#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("lazyinit.toml");
    std::fs::write(&path, "[mode]\nstrict = true\n").unwrap();

    std::env::set_var("LAZYINIT_STRICT", "0");
    std::env::set_var("LAZYINIT_GRACE_SECS", "3");
    std::env::set_var("LAZYINIT_INTERVAL_SECS", "1");
    std::env::set_var("LAZYINIT_LOG_LEVEL", "trace");

    let config = Config::load(Some(&path)).unwrap();
    clear_env();

    assert_eq!(config.mode(), ClassificationMode::Permissive);
    assert_eq!(config.reporter.grace_period, Duration::from_secs(3));
    assert_eq!(config.reporter.interval, Duration::from_secs(1));
    assert_eq!(config.logging.log_level, "trace");
}

#[test]
#[serial]
fn test_config_env_var_takes_priority() {
    clear_env();
    let dir = tempdir().unwrap();
    let explicit = dir.path().join("explicit.toml");
    let from_env = dir.path().join("env.toml");
    std::fs::write(&explicit, "[diagnostics]\nbuffer_capacity = 1\n").unwrap();
    std::fs::write(&from_env, "[diagnostics]\nbuffer_capacity = 2\n").unwrap();

    std::env::set_var("LAZYINIT_CONFIG", &from_env);
    let config = Config::load(Some(&explicit)).unwrap();
    clear_env();

    assert_eq!(config.diagnostics.buffer_capacity, 2);
}

#[test]
#[serial]
fn test_invalid_strict_value_is_ignored() {
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("lazyinit.toml");
    std::fs::write(&path, "").unwrap();

    std::env::set_var("LAZYINIT_STRICT", "maybe");
    let config = Config::load(Some(&path)).unwrap();
    clear_env();

    assert!(config.mode.strict);
}

// ============================================================================
// Validation and Use
// ============================================================================

#[test]
fn test_validate_reports_conflicting_name() {
    let mut config = Config::default();
    config.policy.eligible = vec!["camera".into(), "cnss2".into()];
    config.policy.ignored = vec!["cnss2".into()];

    match config.validate() {
        Err(Error::PolicyConflict { name }) => assert_eq!(name, "cnss2"),
        other => panic!("expected a policy conflict, got {:?}", other),
    }
}

#[test]
fn test_config_drives_dispatcher() {
    let mut config = Config::default();
    config.mode.strict = false;
    config.reporter.enabled = false;
    config.diagnostics.buffer_capacity = 32;
    config.policy.eligible = vec!["a".into()];

    let registrar = Registrar::new(config.to_policy());
    registrar.register("a", || 0);

    let sink = MemorySink::new();
    let core = LazyInit::builder(registrar)
        .config(&config)
        .sink(Arc::new(sink.clone()))
        .build();

    assert_eq!(core.mode(), ClassificationMode::Permissive);
    assert_eq!(core.dispatch("nobody-knows-this-name", None), DispatchResult::Success);
    assert!(!core.is_reporter_started());

    // The buffered copy is cut at 32 bytes, the sink still got the full line.
    let buffered = core.diagnostics();
    assert_eq!(buffered.len(), 1);
    assert_eq!(buffered[0].len(), 32);
    assert!(sink.lines()[0].len() > 32);
}
