//! Integration tests for the statwatch binary

#[macro_use]
mod common;

use anyhow::Result;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_help_lists_subcommands() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let result = statwatch!(temp_dir.path(), "--help").assert_success()?;

    assert!(result.contains_stdout("watch"));
    assert!(result.contains_stdout("snapshot"));
    Ok(())
}

#[test]
fn test_snapshot_json_recursive() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("a.txt"), "hello")?;
    fs::create_dir(temp_dir.path().join("sub"))?;
    fs::write(temp_dir.path().join("sub").join("b.txt"), "")?;

    let result = statwatch!(temp_dir.path(), "snapshot", ".", "--recursive", "--json")
        .assert_success()?;
    let root = result.json()?;

    assert_eq!(root["kind"], "folder");
    let children = root["children"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert!(children[0]["path"].as_str().unwrap().ends_with("a.txt"));
    assert_eq!(children[0]["size"], 5);
    assert_eq!(children[1]["kind"], "folder");
    assert_eq!(children[1]["children"].as_array().unwrap().len(), 1);
    Ok(())
}

#[test]
fn test_snapshot_non_recursive_has_no_children() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("a.txt"), "hello")?;

    let result = statwatch!(temp_dir.path(), "snapshot", ".", "--json").assert_success()?;
    let root = result.json()?;

    assert!(root.get("children").is_none());
    Ok(())
}

#[test]
fn test_snapshot_text_output() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("a.txt"), "hello")?;

    let result = statwatch!(temp_dir.path(), "snapshot", ".", "-r").assert_success()?;

    assert!(result.contains_stdout("a.txt"));
    assert!(result.contains_stdout("5 B"));
    assert!(result.contains_stdout("2 path(s)"));
    Ok(())
}

#[test]
fn test_snapshot_missing_path_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let result = statwatch!(temp_dir.path(), "snapshot", "absent").assert_failure()?;

    assert!(result.contains_stderr("No such file or directory"));
    Ok(())
}

#[test]
fn test_watch_rejects_bad_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("statwatch.toml"), "delay_ms = 100\nbogus = 1\n")?;

    let result = statwatch!(temp_dir.path(), "watch", ".", "--config", "statwatch.toml")
        .assert_failure()?;

    assert!(result.contains_stderr("Failed to load config"));
    Ok(())
}

#[test]
fn test_watch_requires_a_path() -> Result<()> {
    let temp_dir = TempDir::new()?;
    statwatch!(temp_dir.path(), "watch").assert_failure()?;
    Ok(())
}
