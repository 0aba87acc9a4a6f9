//! Unit tests for `GlobalConfig` parsing, overrides and validation.

use std::collections::HashMap;
use std::io::Write;

use trio_monitor::config::GlobalConfig;
use trio_monitor::upstream::auth::Credentials;
use trio_monitor::AppError;

const MINIMAL: &str = r#"
[upstream]
base_url = "https://api.trio.example"
"#;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn minimal_config_uses_defaults() {
    let config = GlobalConfig::from_toml_str(MINIMAL).expect("valid");

    assert_eq!(config.upstream.contact_center_id, "default");
    assert_eq!(config.upstream.request_timeout_seconds, 10);
    assert_eq!(config.poller.interval_seconds, 10);
    assert_eq!(config.poller.max_attempts, 3);
    assert_eq!(config.poller.max_consecutive_failures, 5);
    assert_eq!(config.thresholds.warning_seconds, 15);
    assert_eq!(config.thresholds.critical_seconds, 20);
    assert_eq!(config.thresholds.service_level_target_seconds, 20);
    assert!((config.thresholds.service_level_target_percent - 80.0).abs() < f64::EPSILON);
    assert_eq!(config.thresholds.daily_queue_time_limit_seconds, 3600);
    assert_eq!(config.retention.history_days, 30);
    assert_eq!(config.retention.acknowledged_alert_days, 7);
    assert_eq!(config.http_port, 8000);
    assert_eq!(config.frontend_url, "http://localhost:3000");
    assert_eq!(config.http_bind(), "127.0.0.1:8000");
}

#[test]
fn full_config_parses_every_section() {
    let toml = r#"
database_path = "/var/lib/trio/monitor.db"
http_host = "0.0.0.0"
http_port = 9100
frontend_url = "https://dash.example"

[upstream]
base_url = "https://api.trio.example"
contact_center_id = "cc-7"
username = "ops"
request_timeout_seconds = 5

[thresholds]
warning_seconds = 30
critical_seconds = 60
service_level_target_seconds = 25
service_level_target_percent = 90.0
daily_queue_time_limit_seconds = 7200

[poller]
interval_seconds = 15
max_attempts = 4

[retention]
history_days = 14
max_alerts = 50
"#;
    let config = GlobalConfig::from_toml_str(toml).expect("valid");

    assert_eq!(config.upstream.contact_center_id, "cc-7");
    assert_eq!(config.upstream.username.as_deref(), Some("ops"));
    assert_eq!(config.thresholds.critical_seconds, 60);
    assert_eq!(config.poller.interval_seconds, 15);
    assert_eq!(config.poller.max_attempts, 4);
    assert_eq!(config.retention.history_days, 14);
    assert_eq!(config.retention.max_alerts, 50);
    assert_eq!(config.http_bind(), "0.0.0.0:9100");
}

#[test]
fn missing_base_url_is_rejected() {
    let err = GlobalConfig::from_toml_str("").expect_err("base url required");
    assert!(matches!(err, AppError::Config(_)));
    assert!(err.to_string().contains("TRIO_API_BASE_URL"));
}

#[test]
fn unparseable_base_url_is_rejected() {
    let err = GlobalConfig::from_toml_str("[upstream]\nbase_url = \"not a url\"")
        .expect_err("invalid url");
    assert!(err.to_string().contains("base_url"));
}

#[test]
fn warning_must_be_below_critical() {
    let toml = format!("{MINIMAL}\n[thresholds]\nwarning_seconds = 20\ncritical_seconds = 20\n");
    let err = GlobalConfig::from_toml_str(&toml).expect_err("warning == critical");
    assert!(err.to_string().contains("warning threshold"));
}

#[test]
fn interval_out_of_range_is_rejected() {
    for interval in [4, 61] {
        let toml = format!("{MINIMAL}\n[poller]\ninterval_seconds = {interval}\n");
        assert!(
            GlobalConfig::from_toml_str(&toml).is_err(),
            "interval {interval} should be rejected"
        );
    }
}

#[test]
fn service_level_target_bounds() {
    for bad in ["0.0", "100.5"] {
        let toml =
            format!("{MINIMAL}\n[thresholds]\nservice_level_target_percent = {bad}\n");
        assert!(GlobalConfig::from_toml_str(&toml).is_err(), "{bad} should fail");
    }
    let toml = format!("{MINIMAL}\n[thresholds]\nservice_level_target_percent = 100.0\n");
    assert!(GlobalConfig::from_toml_str(&toml).is_ok());
}

#[test]
fn invalid_toml_maps_to_config_error() {
    let err = GlobalConfig::from_toml_str("[upstream\nbase_url=").expect_err("bad toml");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn env_overrides_replace_file_values() {
    let mut config = GlobalConfig::from_toml_str(MINIMAL).expect("valid");
    config
        .apply_overrides(lookup(&[
            ("TRIO_API_BASE_URL", "https://failover.trio.example"),
            ("TRIO_CONTACT_CENTER_ID", "cc-42"),
            ("TRIO_API_USERNAME", "supervisor"),
            ("POLLING_INTERVAL", "30"),
            ("QUEUE_TIME_LIMIT", "45"),
            ("WARNING_THRESHOLD", "30"),
            ("SERVICE_LEVEL_TARGET", "85.5"),
            ("SERVICE_LEVEL_WINDOW", "40"),
            ("DAILY_QUEUE_TIME_LIMIT", "1800"),
            ("DATABASE_PATH", "/tmp/trio.db"),
            ("HTTP_PORT", "8081"),
            ("FRONTEND_URL", "https://wallboard.example"),
        ]))
        .expect("overrides parse");
    config.validate().expect("still valid");

    assert_eq!(config.upstream.base_url, "https://failover.trio.example");
    assert_eq!(config.upstream.contact_center_id, "cc-42");
    assert_eq!(config.upstream.username.as_deref(), Some("supervisor"));
    assert_eq!(config.poller.interval_seconds, 30);
    assert_eq!(config.thresholds.critical_seconds, 45);
    assert_eq!(config.thresholds.warning_seconds, 30);
    assert!((config.thresholds.service_level_target_percent - 85.5).abs() < f64::EPSILON);
    assert_eq!(config.thresholds.service_level_target_seconds, 40);
    assert_eq!(config.thresholds.daily_queue_time_limit_seconds, 1800);
    assert_eq!(config.database_path.to_str(), Some("/tmp/trio.db"));
    assert_eq!(config.http_port, 8081);
    assert_eq!(config.frontend_url, "https://wallboard.example");
}

#[test]
fn non_numeric_override_names_the_variable() {
    let mut config = GlobalConfig::from_toml_str(MINIMAL).expect("valid");
    let err = config
        .apply_overrides(lookup(&[("POLLING_INTERVAL", "ten")]))
        .expect_err("not a number");
    assert!(err.to_string().contains("POLLING_INTERVAL"));
}

#[test]
#[serial_test::serial]
fn load_reads_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(MINIMAL.as_bytes()).expect("write");

    let config = GlobalConfig::load(Some(file.path())).expect("valid");
    assert!(!config.upstream.base_url.is_empty());
}

#[test]
fn load_missing_file_is_config_error() {
    let err = GlobalConfig::load(Some(std::path::Path::new("/nonexistent/trio.toml")))
        .expect_err("missing file");
    assert!(err.to_string().contains("failed to read config"));
}

#[test]
fn token_wins_over_password() {
    let mut config = GlobalConfig::from_toml_str(MINIMAL).expect("valid");
    config.upstream.username = Some("ops".into());
    config.upstream.password = Some("secret".into());
    config.upstream.token = Some("tok".into());

    assert_eq!(config.credentials().expect("creds"), Credentials::Token("tok".into()));
}

#[test]
fn password_credentials_need_both_halves() {
    let mut config = GlobalConfig::from_toml_str(MINIMAL).expect("valid");
    config.upstream.username = Some("ops".into());
    assert!(config.credentials().is_err());

    config.upstream.password = Some("secret".into());
    assert_eq!(
        config.credentials().expect("creds"),
        Credentials::Password {
            username: "ops".into(),
            password: "secret".into(),
        }
    );
}

#[test]
fn no_credentials_error_names_env_vars() {
    let config = GlobalConfig::from_toml_str(MINIMAL).expect("valid");
    let err = config.credentials().expect_err("none configured");
    assert!(err.to_string().contains("TRIO_API_TOKEN"));
}
