//! CLI integration tests for dbinspect.
//!
//! These tests verify argument parsing, exit codes, and the files the
//! binary writes for a SQLite database.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("dbinspect").unwrap();
    for var in [
        "DB_HOST",
        "DB_PORT",
        "DB_NAME",
        "DB_USER",
        "DB_PASSWORD",
        "DB_SCHEMA",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_options() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--schema"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("sqlite"))
        .stdout(predicate::str::contains("mssql"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dbinspect"));
}

#[test]
fn test_unknown_dialect_is_rejected() {
    cmd()
        .arg("oracle")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_missing_db_name_fails() {
    let dir = TempDir::new().unwrap();

    cmd()
        .arg("postgres")
        .arg("--env-file")
        .arg(dir.path().join("absent.env"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("DB_NAME"));
}

#[test]
fn test_dialect_aliases_are_accepted() {
    let dir = TempDir::new().unwrap();

    for alias in ["pg", "PostgreSQL", "mariadb", "sqlserver"] {
        cmd()
            .arg(alias)
            .arg("--env-file")
            .arg(dir.path().join("absent.env"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("DB_NAME"))
            .stderr(predicate::str::contains("invalid value").not());
    }
}

#[test]
fn test_rust_log_overrides_default_level() {
    let dir = TempDir::new().unwrap();
    let absent = dir.path().join("absent.env");

    cmd()
        .arg("postgres")
        .arg("--env-file")
        .arg(&absent)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Loading database configuration").not());

    cmd()
        .arg("postgres")
        .arg("--env-file")
        .arg(&absent)
        .env("RUST_LOG", "debug")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Loading database configuration"));
}

#[test]
fn test_verbose_flag_enables_debug() {
    let dir = TempDir::new().unwrap();

    cmd()
        .arg("-v")
        .arg("postgres")
        .arg("--env-file")
        .arg(dir.path().join("absent.env"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Loading database configuration"));
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use rusqlite::Connection;
    use std::path::PathBuf;

    fn fixture(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("shop.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
                 CREATE TABLE orders (
                     id INTEGER PRIMARY KEY,
                     customer_id INTEGER NOT NULL REFERENCES customers (id),
                     placed_at DATETIME
                 );",
            )
            .unwrap();
        path
    }

    #[test]
    fn test_missing_sqlite_file_fails() {
        let dir = TempDir::new().unwrap();
        let absent = dir.path().join("absent.db");

        cmd()
            .arg("sqlite")
            .arg("--env-file")
            .arg(dir.path().join("absent.env"))
            .env("DB_NAME", &absent)
            .assert()
            .failure();

        assert!(!absent.exists());
    }

    #[test]
    fn test_writes_package() {
        let dir = TempDir::new().unwrap();
        let db = fixture(&dir);
        let out = dir.path().join("models");

        cmd()
            .arg("sqlite")
            .arg("--output")
            .arg(&out)
            .arg("--env-file")
            .arg(dir.path().join("absent.env"))
            .env("DB_NAME", &db)
            .assert()
            .success();

        let customer = std::fs::read_to_string(out.join("Customer.py")).unwrap();
        let order = std::fs::read_to_string(out.join("Order.py")).unwrap();
        let index = std::fs::read_to_string(out.join("__init__.py")).unwrap();

        assert!(customer.contains("class Customer:"));
        assert!(order.contains("    placed_at: datetime | None\n"));
        assert!(order.contains(r#""references": "Customer""#));
        assert!(index.contains(r#"__all__ = ["Customer", "Order"]"#));
    }

    #[test]
    fn test_dry_run_prints_instead_of_writing() {
        let dir = TempDir::new().unwrap();
        let db = fixture(&dir);
        let out = dir.path().join("models");

        cmd()
            .arg("sqlite")
            .arg("--dry-run")
            .arg("--output")
            .arg(&out)
            .arg("--env-file")
            .arg(dir.path().join("absent.env"))
            .env("DB_NAME", &db)
            .assert()
            .success()
            .stdout(predicate::str::contains("# --- Order.py ---"))
            .stdout(predicate::str::contains("class Order:"));

        assert!(!out.exists());
    }

    #[test]
    fn test_exclude_filter() {
        let dir = TempDir::new().unwrap();
        let db = fixture(&dir);

        cmd()
            .arg("sqlite")
            .arg("--dry-run")
            .arg("--exclude")
            .arg("customers")
            .arg("--env-file")
            .arg(dir.path().join("absent.env"))
            .env("DB_NAME", &db)
            .assert()
            .success()
            .stdout(predicate::str::contains("class Order:"))
            .stdout(predicate::str::contains("class Customer:").not())
            .stdout(predicate::str::contains(r#""dangling": True"#));
    }
}
