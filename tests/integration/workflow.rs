//! End-to-end workflow tests: YAML configuration to shell script execution.

use mirrorsync::{Config, Exporter, FileCheckpointStore, Manager};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::common::wait_until;

fn config_yaml(dir: &TempDir) -> String {
    format!(
        r#"
interval: 1
concurrent_limit: 2
checkpoint: {checkpoint}
loglevel: debug
repos:
  - name: mirror
    type: shell_script
    interval: 3600
    target: {target}
    script: echo "$LUG_name" >> "$LUG_target"
  - name: broken
    type: shell_script
    interval: 3600
    retry: 2
    retry_interval: 0
    script: echo nope >&2; exit 3
  - name: upstream
    type: external
  - name: retired
    type: shell_script
    disabled: true
"#,
        checkpoint = dir.path().join("checkpoint.json").display(),
        target = dir.path().join("synced.txt").display(),
    )
}

/// Test: A YAML config drives real shell script syncs.
#[tokio::test]
async fn test_yaml_config_runs_shell_scripts() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_yaml(&config_yaml(&dir)).unwrap();
    assert_eq!(config.log_level.as_deref(), Some("debug"));

    let exporter = Exporter::new().unwrap();
    let manager = Manager::new(
        config.manager_config(),
        config.repos.clone(),
        Arc::new(FileCheckpointStore::new(&config.checkpoint)),
        Arc::new(exporter.clone()),
    )
    .await
    .unwrap();
    assert_eq!(manager.jobs().count(), 3);

    let (handle, task) = manager.start().await;
    let counts = exporter.clone();
    wait_until("both scripts to finish", Duration::from_secs(10), || {
        counts.success_count("mirror") >= 1 && counts.fail_count("broken") >= 1
    })
    .await;

    let status = handle.status().await;
    handle.exit().await.unwrap();
    task.await.unwrap();

    let written = std::fs::read_to_string(dir.path().join("synced.txt")).unwrap();
    assert_eq!(written, "mirror\n");

    let broken = &status.workers["broken"];
    assert!(!broken.result);
    assert_eq!(broken.stderr.last().map(String::as_str), Some("nope\n"));

    let upstream = &status.workers["upstream"];
    assert!(upstream.idle);
    assert!(upstream.result);

    assert!(!status.workers.contains_key("retired"));
    assert!(config.checkpoint.exists());
}
