use secops_app::config::{Config, LogFormat, DEFAULT_CONFIG_FILE};
use secops_tools::builtin_registry;
use std::time::Duration;

#[test]
fn test_empty_config_uses_defaults() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.max_timeout_secs, 3600);
    assert_eq!(config.max_output_bytes, 4 * 1024 * 1024);
    assert_eq!(config.log_format, LogFormat::Text);
}

#[test]
fn test_full_config_parses() {
    let yaml = r#"
default_timeout_secs: 120
max_timeout_secs: 900
max_output_bytes: 1048576
excerpt_bytes: 512
log_level: debug
log_format: json
audit_log: /var/log/secops/audit.jsonl
limits:
  cpu_seconds: 600
  max_open_files: 1024
tools:
  httpx_wrapper:
    binary: /opt/pd/bin/httpx
    timeout_secs: 45
  nmap_wrapper:
    timeout_secs: 600
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.default_timeout_secs, Some(120));
    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(config.limits.cpu_seconds, Some(600));
    // Unset limit fields keep their defaults.
    assert_eq!(config.limits.max_file_size_bytes, Some(1024 * 1024 * 1024));
    assert_eq!(
        config.tools["httpx_wrapper"].binary.as_deref(),
        Some("/opt/pd/bin/httpx")
    );
}

#[test]
fn test_zero_values_rejected() {
    assert!(Config::from_yaml("max_timeout_secs: 0").is_err());
    assert!(Config::from_yaml("default_timeout_secs: 0").is_err());
    assert!(Config::from_yaml("excerpt_bytes: 0").is_err());
    assert!(Config::from_yaml("tools:\n  httpx_wrapper:\n    timeout_secs: 0\n").is_err());
}

#[test]
fn test_unknown_keys_rejected() {
    assert!(Config::from_yaml("max_timeout: 10").is_err());
    assert!(Config::from_yaml("tools:\n  httpx_wrapper:\n    path: /bin/x\n").is_err());
}

#[test]
fn test_apply_overrides() {
    let config = Config::from_yaml(
        "default_timeout_secs: 60\nmax_timeout_secs: 300\ntools:\n  httpx_wrapper:\n    binary: /opt/pd/bin/httpx\n    timeout_secs: 45\n",
    )
    .unwrap();
    let mut registry = builtin_registry().unwrap();

    let settings = config.apply(&mut registry).unwrap();

    assert_eq!(registry.get("httpx_wrapper").unwrap().binary, "/opt/pd/bin/httpx");
    assert_eq!(settings.default_timeout, Some(Duration::from_secs(60)));
    assert_eq!(settings.max_timeout, Duration::from_secs(300));
    assert_eq!(
        settings.timeout_overrides.get("httpx_wrapper"),
        Some(&Duration::from_secs(45))
    );
}

#[test]
fn test_override_for_unknown_tool_is_fatal() {
    let config = Config::from_yaml("tools:\n  ipinfo_wrapper:\n    timeout_secs: 5\n").unwrap();
    let mut registry = builtin_registry().unwrap();
    let err = config.apply(&mut registry).unwrap_err();
    assert!(err.to_string().contains("ipinfo_wrapper"));
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DEFAULT_CONFIG_FILE);
    std::fs::write(&path, "log_level: warn\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.log_level, "warn");

    assert!(Config::load(Some(&dir.path().join("missing.yaml"))).is_err());
}
