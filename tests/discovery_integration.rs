use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "implementor_discovery_it_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ))
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

fn discovery(base: &Path, args: &[&str]) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_implementor-discovery");
    let output = Command::new(exe)
        .arg("--base")
        .arg(base)
        .args(args)
        .env_remove("DISCOVERY_CACHE_PATH")
        .env("RUST_LOG", "warn")
        .output()?;
    Ok(output)
}

fn seed_project(base: &Path) -> anyhow::Result<()> {
    write_file(
        &base.join("app/Jobs/SendMail.php"),
        "<?php\nnamespace App\\Jobs;\n\nuse Queue\\ShouldQueue;\n\nclass SendMail implements ShouldQueue {}\n",
    )?;
    write_file(
        &base.join("app/Jobs/Prune.php"),
        "<?php\nnamespace App\\Jobs;\n\nfinal class Prune implements \\Queue\\ShouldQueue, \\Countable {}\n",
    )?;
    write_file(
        &base.join("app/database/migrations/CreateUsers.php"),
        "<?php\nclass CreateUsers implements ShouldQueue {}\n",
    )?;
    write_file(
        &base.join("app-modules/billing/src/Charge.php"),
        "<?php\nnamespace Billing;\n\nclass Charge implements ShouldQueue {}\n",
    )?;
    write_file(&base.join("app/Half.php"), "<?php\nclass Half implements {\n")?;
    Ok(())
}

#[test]
fn run_writes_artifacts_and_show_reads_them_back() -> anyhow::Result<()> {
    let base = temp_dir("run_show");
    seed_project(&base)?;

    let output = discovery(&base, &["run", "-i", "ShouldQueue", "-i", "Countable"])?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["status"], "completed");
    assert_eq!(report["files_found"], 4);
    assert_eq!(report["stats"]["skipped"], 1);

    let summaries = report["interfaces"].as_array().unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0]["interface"], "ShouldQueue");
    assert_eq!(summaries[0]["implementors"], 3);
    assert_eq!(summaries[1]["implementors"], 1);

    let artifact = base.join("bootstrap/cache/discovery/ShouldQueue.php");
    assert!(artifact.exists());
    assert!(std::fs::read_to_string(&artifact)?.starts_with("<?php\n\nreturn array (\n"));

    let shown = discovery(&base, &["show", "ShouldQueue"])?;
    assert!(shown.status.success());
    let mut classes: Vec<String> = serde_json::from_slice(&shown.stdout)?;
    classes.sort();
    assert_eq!(
        classes,
        vec!["App\\Jobs\\Prune", "App\\Jobs\\SendMail", "Billing\\Charge"]
    );

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn config_file_and_json_artifacts() -> anyhow::Result<()> {
    let base = temp_dir("config_file");
    seed_project(&base)?;
    write_file(
        &base.join("discovery.json"),
        r#"{ "interfaces": ["Countable"], "artifact_format": "json", "cache_path": "var/discovery" }"#,
    )?;

    let output = discovery(&base, &["run"])?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let artifact = base.join("var/discovery/Countable.json");
    let classes: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&artifact)?)?;
    assert_eq!(classes, vec!["App\\Jobs\\Prune"]);

    let cleared = discovery(&base, &["clear"])?;
    assert!(cleared.status.success());
    assert!(!base.join("var/discovery").exists());

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn run_without_interfaces_is_a_no_op() -> anyhow::Result<()> {
    let base = temp_dir("no_interfaces");
    seed_project(&base)?;

    let output = discovery(&base, &["run"])?;
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["status"], "no_interfaces");
    assert!(!base.join("bootstrap/cache/discovery").exists());

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn empty_interface_name_fails() -> anyhow::Result<()> {
    let base = temp_dir("empty_name");
    seed_project(&base)?;

    let output = discovery(&base, &["run", "-i", ""])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Interface Name Cannot Be Empty String"));

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn profile_prints_scores() -> anyhow::Result<()> {
    let base = temp_dir("profile");
    std::fs::create_dir_all(&base)?;

    let output = discovery(&base, &["profile", "--cache-dir", "/nonexistent"])?;
    assert!(output.status.success());
    let profile: Value = serde_json::from_slice(&output.stdout)?;
    let cpu = profile["cpu_score"].as_f64().unwrap();
    assert!((0.3..=1.0).contains(&cpu));
    assert!(profile["cpu_cores"].as_u64().unwrap() >= 1);

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn profile_honours_memory_limit_flag() -> anyhow::Result<()> {
    let base = temp_dir("profile_limit");
    std::fs::create_dir_all(&base)?;

    let output = discovery(&base, &["profile", "--memory-limit", "256M"])?;
    assert!(output.status.success());
    let profile: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(profile["memory_available"], 256 * 1024 * 1024);
    assert_eq!(profile["memory_score"], 0.4);

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}
