//! Tests for config loading

use std::path::Path;

use serial_test::serial;
use sinmun::config::{Config, DedupScope};
use sinmun::models::NewsCategory;

const ENV_KEYS: &[&str] = &[
    "SINMUN_CATEGORIES",
    "SINMUN_WINDOW_SIZE",
    "SINMUN_MAX_PAGES",
    "SINMUN_DEDUP_SCOPE",
    "SINMUN_SQLITE_PATH",
    "SINMUN_TABLE",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[test]
fn test_config_file_exists() {
    let config_path = Path::new("config.toml");
    assert!(
        config_path.exists(),
        "config.toml should exist in project root"
    );
}

#[test]
fn test_sample_config_parses_to_defaults() {
    let config = Config::from_file(Path::new("config.toml")).unwrap();
    config.validate().unwrap();

    let crawler = &config.crawler;
    assert_eq!(crawler.window_size, 10);
    assert_eq!(crawler.max_attempts, 3);
    assert_eq!(crawler.exhaustion_threshold, 1);
    assert_eq!(crawler.dedup_scope, DedupScope::Window);
    assert_eq!(crawler.categories, NewsCategory::all());
    assert_eq!(config.database.table, "newses");
}

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.toml");
    std::fs::write(
        &path,
        "[crawler]\ncategories = [\"world\"]\nmax_pages = 20\n",
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.crawler.categories, vec![NewsCategory::World]);
    assert_eq!(config.crawler.max_pages, 20);
    assert_eq!(config.crawler.window_size, 10);
    assert_eq!(config.database.table, "newses");
}

#[test]
fn test_invalid_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[crawler]\nwindow_size = \"ten\"\n").unwrap();

    assert!(Config::from_file(&path).is_err());
}

#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    std::env::set_var("SINMUN_CATEGORIES", "경제,104");
    std::env::set_var("SINMUN_WINDOW_SIZE", "5");
    std::env::set_var("SINMUN_DEDUP_SCOPE", "session");
    std::env::set_var("SINMUN_TABLE", "articles");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(
        config.crawler.categories,
        vec![NewsCategory::Economy, NewsCategory::World]
    );
    assert_eq!(config.crawler.window_size, 5);
    assert_eq!(config.crawler.dedup_scope, DedupScope::Session);
    assert_eq!(config.database.table, "articles");
    config.validate().unwrap();
}

#[test]
#[serial]
fn test_env_unparsable_value_is_error() {
    clear_env();
    std::env::set_var("SINMUN_MAX_PAGES", "many");

    let result = Config::from_env();
    clear_env();

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_env_unknown_category_is_error() {
    clear_env();
    std::env::set_var("SINMUN_CATEGORIES", "sports");

    let result = Config::from_env();
    clear_env();

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_invalid_table_fails_validation() {
    clear_env();
    std::env::set_var("SINMUN_TABLE", "newses; DROP TABLE x");

    let config = Config::from_env().unwrap();
    clear_env();

    assert!(config.validate().is_err());
}
