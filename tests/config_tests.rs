use std::env;
use std::io::Write;

use pizzeria::config::{load_env_file, PizzeriaConfig};
use serial_test::serial;
use tempfile::NamedTempFile;

#[test]
#[serial]
fn env_overrides_defaults() {
    env::set_var("SERVER_PORT", "9191");
    env::set_var("DB_TYPE", "postgres");
    env::set_var("JWT_EXPIRATION", "120");
    env::set_var("CORS_ALLOW_ORIGIN", "https://pizzeria.test");

    let config = PizzeriaConfig::load().unwrap();

    assert_eq!(config.server.port, 9191);
    assert_eq!(config.database.db_type, "postgres");
    assert_eq!(config.auth.token_expiration_secs, 120);
    assert_eq!(config.cors.allow_origin, "https://pizzeria.test");

    for key in ["SERVER_PORT", "DB_TYPE", "JWT_EXPIRATION", "CORS_ALLOW_ORIGIN"] {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn unparsable_numbers_fall_back_to_defaults() {
    env::set_var("SERVER_PORT", "eighty");

    let config = PizzeriaConfig::load().unwrap();
    assert_eq!(config.server.port, 8080);

    env::remove_var("SERVER_PORT");
}

#[test]
#[serial]
fn env_file_fills_missing_variables_only() {
    env::set_var("DB_NAME", "from_process");
    env::remove_var("JWT_SECRET");

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "# pizzeria settings").unwrap();
    writeln!(file, "DB_NAME=from_file").unwrap();
    writeln!(file, "JWT_SECRET=\"file secret\"").unwrap();

    assert!(load_env_file(Some(file.path())).unwrap());

    let config = PizzeriaConfig::load().unwrap();
    assert_eq!(config.database.name, "from_process");
    assert_eq!(config.auth.jwt_secret, "file secret");

    env::remove_var("DB_NAME");
    env::remove_var("JWT_SECRET");
}

#[test]
#[serial]
fn missing_env_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = load_env_file(Some(&dir.path().join("absent.env"))).unwrap();
    assert!(!loaded);
}
