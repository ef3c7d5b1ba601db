use docbench::bench::CoordinatorRunner;
use docbench::config::SweepConfig;
use docbench::models::SweepEntry;
use docbench::pool::{ProcessWorkerPool, WorkerEntry, WorkerPool};
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;

fn worker_entry(store: &std::path::Path) -> WorkerEntry {
    WorkerEntry::new(
        env!("CARGO_BIN_EXE_docbench"),
        vec![
            "worker".to_string(),
            "--store".to_string(),
            store.display().to_string(),
            "--collection".to_string(),
            "proc".to_string(),
            "--document-size".to_string(),
            "256".to_string(),
            "--warm-up".to_string(),
            "20ms".to_string(),
            "--measurement".to_string(),
            "200ms".to_string(),
        ],
    )
}

#[tokio::test]
async fn test_worker_processes_end_to_end() {
    let dir = TempDir::new().unwrap();
    let pool = ProcessWorkerPool::new(worker_entry(dir.path()), Duration::from_secs(30));
    let mut coordinator = CoordinatorRunner::new(pool, 2);

    let total = coordinator.run(2).await.unwrap();
    assert_eq!(total.write().concurrency_level(), 2);
    assert!(total.write().average_throughput() > 0.0);
    assert!(total.read().average_throughput() > 0.0);
    assert_eq!(coordinator.pool().size(), 0);

    assert!(dir.path().join("proc-0.jsonl").exists());
    assert!(dir.path().join("proc-1.jsonl").exists());
}

#[tokio::test]
async fn test_worker_with_unusable_store_reports_error() {
    let dir = TempDir::new().unwrap();
    // A regular file where the store directory should be
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let pool = ProcessWorkerPool::new(worker_entry(&blocker), Duration::from_secs(30));
    let mut coordinator = CoordinatorRunner::new(pool, 1);

    let err = coordinator.run(1).await.unwrap_err();
    assert!(err.to_string().contains("Setup failed"), "unexpected error: {}", err);
}

#[test]
fn test_cli_sweep_json_report() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("docbench.toml");
    SweepConfig::default()
        .with_store_path(dir.path().join("store"))
        .save_to(&config_path)
        .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_docbench"))
        .args(["run", "--config"])
        .arg(&config_path)
        .args([
            "--processes",
            "1,2",
            "--concurrency",
            "2",
            "--warm-up",
            "20ms",
            "--measurement",
            "150ms",
            "--format",
            "json",
        ])
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "docbench failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let entries: Vec<SweepEntry> = serde_json::from_slice(&output.stdout).unwrap();
    let counts: Vec<usize> = entries.iter().map(|e| e.process_count).collect();
    assert_eq!(counts, vec![1, 2]);
    assert!(entries.iter().all(|e| e.total_throughput() > 0.0));
}

#[test]
fn test_cli_rejects_zero_concurrency() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("docbench.toml");
    SweepConfig::default().save_to(&config_path).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_docbench"))
        .args(["run", "--config"])
        .arg(&config_path)
        .args(["--concurrency", "0"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Configuration error"));
}

#[test]
fn test_cli_rejects_reply_timeout_shorter_than_runs() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("docbench.toml");
    SweepConfig::default().save_to(&config_path).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_docbench"))
        .args(["run", "--config"])
        .arg(&config_path)
        .args(["--warm-up", "1s", "--measurement", "30s", "--reply-timeout", "10s"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Reply timeout"));
}
