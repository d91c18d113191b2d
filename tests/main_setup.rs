use medgate::{
    AppConfig, AppState,
    config::{Env, SmtpConfig},
    error::ConfigError,
};
use serial_test::serial;
use std::{env, panic};

// --- Setup/Teardown Utilities ---

const CONFIG_VARS: [&str; 10] = [
    "APP_ENV",
    "JWT_SECRET",
    "BIND_ADDR",
    "ROUTE_RULES_PATH",
    "EMAIL_TEMPLATE_DIR",
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_USER",
    "SMTP_PASS",
    "SMTP_FROM",
];

/// Runs `test` with the given variables set (and every other config variable
/// cleared), then restores the original environment.
fn run_with_env<T, R>(vars: &[(&str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = CONFIG_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original_value) in originals {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_missing_secret_fails_fast_in_local() {
    let result = run_with_env(&[("APP_ENV", "local")], AppConfig::load);

    assert!(matches!(result, Err(ConfigError::MissingSecret)));
}

#[test]
#[serial]
fn test_missing_secret_fails_fast_in_production() {
    let result = run_with_env(&[("APP_ENV", "production")], AppConfig::load);

    assert!(matches!(result, Err(ConfigError::MissingSecret)));
}

#[test]
#[serial]
fn test_blank_secret_is_rejected() {
    let result = run_with_env(&[("JWT_SECRET", "   ")], AppConfig::load);

    assert!(matches!(result, Err(ConfigError::MissingSecret)));
}

#[test]
#[serial]
fn test_local_defaults() {
    let config = run_with_env(&[("JWT_SECRET", "s3cret")], AppConfig::load)
        .expect("config should load with a secret");

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.jwt_secret, "s3cret");
    assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
    assert!(config.route_rules_path.is_none());
    assert_eq!(config.email_template_dir.to_str(), Some("templates/email"));
    assert_eq!(config.smtp, SmtpConfig::default());
    assert_eq!(config.smtp.host, "smtp.gmail.com");
    assert_eq!(config.smtp.port, 587);
}

#[test]
#[serial]
fn test_smtp_settings_are_read() {
    let config = run_with_env(
        &[
            ("JWT_SECRET", "s3cret"),
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_PORT", "2525"),
            ("SMTP_USER", "mailer"),
            ("SMTP_PASS", "hunter2"),
            ("SMTP_FROM", "Clinic <clinic@example.com>"),
        ],
        AppConfig::load,
    )
    .expect("config should load");

    assert_eq!(
        config.smtp,
        SmtpConfig {
            host: "mail.example.com".to_string(),
            port: 2525,
            username: Some("mailer".to_string()),
            password: Some("hunter2".to_string()),
            from: "Clinic <clinic@example.com>".to_string(),
        }
    );
}

#[test]
#[serial]
fn test_invalid_smtp_port() {
    let result = run_with_env(
        &[("JWT_SECRET", "s3cret"), ("SMTP_PORT", "smtp")],
        AppConfig::load,
    );

    assert!(matches!(result, Err(ConfigError::Smtp(_))));
}

#[test]
#[serial]
fn test_production_env_is_detected() {
    let config = run_with_env(
        &[("APP_ENV", "production"), ("JWT_SECRET", "prod-secret")],
        AppConfig::load,
    )
    .expect("config should load");

    assert_eq!(config.env, Env::Production);
    assert!(config.env.is_production());
}

#[test]
#[serial]
fn test_invalid_bind_addr() {
    let result = run_with_env(
        &[("JWT_SECRET", "s3cret"), ("BIND_ADDR", "not-an-address")],
        AppConfig::load,
    );

    assert!(matches!(result, Err(ConfigError::InvalidBindAddr(addr)) if addr == "not-an-address"));
}

#[test]
fn test_unreadable_rule_file_fails_state_construction() {
    let config = AppConfig {
        route_rules_path: Some("/definitely/not/here/rules.json".into()),
        ..AppConfig::default()
    };

    let result = AppState::from_config(config);

    assert!(matches!(result, Err(ConfigError::RuleTable { .. })));
}

#[test]
fn test_empty_secret_rejected_by_state_construction() {
    let config = AppConfig {
        jwt_secret: String::new(),
        ..AppConfig::default()
    };

    assert!(matches!(
        AppState::from_config(config),
        Err(ConfigError::MissingSecret)
    ));
}
