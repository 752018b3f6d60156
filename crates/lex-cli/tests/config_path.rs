//! Tests for config path resolution.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn config_path_honors_lex_home() {
    let lex_home = TempDir::new().expect("create temp lex home");

    cargo_bin_cmd!("lex")
        .env("LEX_HOME", lex_home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains(
            lex_home.path().to_str().expect("utf-8 temp path"),
        ));
}
