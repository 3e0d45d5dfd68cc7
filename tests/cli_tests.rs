use std::{error::Error, fs, path::Path};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn tally(root: &Path, backend: &str) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("tally_core_cli")?;
    cmd.env_remove("RUST_LOG")
        .arg("--config")
        .arg(root.join("config").join("config.json"))
        .arg("--data-dir")
        .arg(root.join("data"))
        .arg("--backend")
        .arg(backend);
    Ok(cmd)
}

fn last_word(output: &[u8]) -> String {
    String::from_utf8_lossy(output)
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .to_string()
}

fn seed_definition(root: &Path, backend: &str) -> Result<String, Box<dyn Error>> {
    let category = tally(root, backend)?
        .args(["category", "add", "Utilities"])
        .output()?;
    assert!(category.status.success());
    let category_id = last_word(&category.stdout);

    let definition = tally(root, backend)?
        .args([
            "definition",
            "add",
            "--title",
            "Internet",
            "--amount",
            "45.50",
            "--start",
            "2026-01-01",
            "--category",
            &category_id,
        ])
        .output()?;
    assert!(definition.status.success());
    Ok(category_id)
}

fn generation_is_idempotent_end_to_end(backend: &str) -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    seed_definition(dir.path(), backend)?;

    tally(dir.path(), backend)?
        .args(["generate", "--as-of", "2026-04-01", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"created\": 4"));

    tally(dir.path(), backend)?
        .args(["generate", "--as-of", "2026-04-01", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"created\": 0"));

    tally(dir.path(), backend)?
        .args(["invoice", "list"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("EXP-2026-0004")
                .and(predicate::str::contains("EXP-2026-0005").not()),
        );
    Ok(())
}

#[test]
fn sqlite_generation_is_idempotent() -> Result<(), Box<dyn Error>> {
    generation_is_idempotent_end_to_end("sqlite")
}

#[test]
fn json_generation_is_idempotent() -> Result<(), Box<dyn Error>> {
    generation_is_idempotent_end_to_end("json")
}

#[test]
fn paused_definition_generates_nothing() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    seed_definition(dir.path(), "sqlite")?;
    let listing = tally(dir.path(), "sqlite")?
        .args(["definition", "list"])
        .output()?;
    let id = String::from_utf8_lossy(&listing.stdout)
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();

    tally(dir.path(), "sqlite")?
        .args(["definition", "pause", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("paused"));

    tally(dir.path(), "sqlite")?
        .args(["generate", "--as-of", "2026-04-01"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Generated 0 charge(s)"));
    Ok(())
}

#[test]
fn roles_without_generation_rights_are_refused() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let config_dir = dir.path().join("config");
    fs::create_dir_all(&config_dir)?;
    fs::write(
        config_dir.join("config.json"),
        r#"{ "operator_role": "client" }"#,
    )?;

    tally(dir.path(), "sqlite")?
        .args(["generate", "--as-of", "2026-04-01"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error: Forbidden"));
    Ok(())
}

#[test]
fn config_backup_is_listed() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;

    tally(dir.path(), "sqlite")?
        .args(["config", "backup", "--note", "first run"])
        .assert()
        .success();

    tally(dir.path(), "sqlite")?
        .args(["config", "backups"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_first-run.json"));
    Ok(())
}

#[test]
fn version_prints_build_metadata() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("tally_core_cli")?;
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tally_core_cli").and(predicate::str::contains("commit:")));
    Ok(())
}
