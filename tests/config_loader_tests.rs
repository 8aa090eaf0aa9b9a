use invoicing::config::{ConfigError, ConfigLoader};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

const VARS: &[&str] = &[
    "INVOICING_PROFILE",
    "INVOICING_API_BIND_ADDR",
    "INVOICING_LOG_LEVEL",
    "INVOICING_JWT_SECRET",
    "INVOICING_MAX_PAGE_SIZE",
    "INVOICING_DATABASE_URL",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    for var in VARS {
        unsafe { env::remove_var(var) };
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(name), contents).unwrap();
}

fn loader(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_base_dir(PathBuf::from(dir.path()))
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    let cfg = loader(&temp_dir).load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.access_token_ttl_seconds, 900);
    assert_eq!(cfg.refresh_token_ttl_seconds, 604_800);
    assert_eq!((cfg.default_page_size, cfg.max_page_size), (20, 100));
    assert!(cfg.jwt_secret.is_none());
    cfg.bind_addr().expect("default bind addr parses");
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "INVOICING_API_BIND_ADDR=127.0.0.1:3000\n");
    write_env_file(
        &temp_dir,
        ".env.test",
        "INVOICING_API_BIND_ADDR=192.168.0.10:5000\nINVOICING_LOG_LEVEL=debug\n",
    );
    write_env_file(
        &temp_dir,
        ".env.test.local",
        "INVOICING_API_BIND_ADDR=10.0.0.5:6000\n",
    );
    // Selects the profile before the profile-specific files load
    write_env_file(
        &temp_dir,
        ".env.local",
        "INVOICING_PROFILE=test\nINVOICING_API_BIND_ADDR=127.0.0.1:4000\n",
    );

    let cfg = loader(&temp_dir)
        .load()
        .expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.api_bind_addr, "10.0.0.5:6000");
    assert_eq!(cfg.log_level, "debug");
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "INVOICING_API_BIND_ADDR=127.0.0.1:3000\n");
    unsafe { env::set_var("INVOICING_API_BIND_ADDR", "0.0.0.0:9090") };

    let cfg = loader(&temp_dir).load().expect("config loads with env override");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:9090");

    clear_env();
}

#[test]
fn invalid_bind_addr_returns_error() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    unsafe { env::set_var("INVOICING_API_BIND_ADDR", "not-an-addr") };
    let err = loader(&temp_dir)
        .load()
        .expect_err("invalid bind addr should fail");
    assert!(format!("{}", err).contains("invalid api bind address"));

    clear_env();
}

#[test]
fn production_profile_requires_a_long_jwt_secret() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    unsafe { env::set_var("INVOICING_PROFILE", "prod") };
    let err = loader(&temp_dir).load().unwrap_err();
    assert!(matches!(err, ConfigError::MissingJwtSecret));

    unsafe { env::set_var("INVOICING_JWT_SECRET", "too-short") };
    let err = loader(&temp_dir).load().unwrap_err();
    assert!(matches!(err, ConfigError::JwtSecretTooShort { length: 9 }));

    unsafe { env::set_var("INVOICING_JWT_SECRET", "a-production-secret-of-at-least-32-bytes") };
    let cfg = loader(&temp_dir).load().expect("long secret is accepted");
    let redacted = cfg.redacted_json().unwrap();
    assert!(!redacted.contains("a-production-secret"));

    clear_env();
}

#[test]
fn non_numeric_page_size_is_rejected() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    write_env_file(&temp_dir, ".env", "INVOICING_MAX_PAGE_SIZE=lots\n");
    let err = loader(&temp_dir).load().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidNumber { .. }));
}
