//! Sync metrics.
//!
//! Workers report every finished execution to a [`SyncMetrics`] collaborator.
//! Reporting is observational only: nothing a collaborator does can affect
//! scheduling. [`Exporter`] keeps the counters in a Prometheus registry and
//! renders them in the text exposition format for the HTTP API.

mod disk;

pub use disk::disk_usage;

use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Minimum time between two disk usage scans of the same worker.
pub const DISK_USAGE_THROTTLE: Duration = Duration::from_secs(60);

/// Label partitioning every metric.
const WORKER_LABEL: &str = "worker";

/// Receiver of per-job sync outcomes.
pub trait SyncMetrics: Send + Sync {
    /// Report a successful synchronization.
    fn sync_success(&self, worker: &str);

    /// Report a failed synchronization.
    fn sync_fail(&self, worker: &str);

    /// Refresh the disk usage of a worker's mirror directory.
    ///
    /// Implementations must return immediately and may drop the request.
    fn update_disk_usage(&self, worker: &str, path: &Path);
}

/// Metrics collaborator that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl SyncMetrics for NoopMetrics {
    fn sync_success(&self, _worker: &str) {}

    fn sync_fail(&self, _worker: &str) {}

    fn update_disk_usage(&self, _worker: &str, _path: &Path) {}
}

#[derive(Debug, Clone, Copy)]
enum DiskScan {
    InProgress,
    Finished(Instant),
}

#[derive(Debug, Default)]
struct DiskScans {
    scans: HashMap<String, DiskScan>,
    measured: HashSet<String>,
}

struct ExporterInner {
    registry: Registry,
    success: IntCounterVec,
    fail: IntCounterVec,
    disk_usage: IntGaugeVec,
    disk_scans: Mutex<DiskScans>,
}

/// Prometheus metrics exporter.
///
/// Each exporter owns its registry. Cheap to clone; clones share the same
/// counters.
#[derive(Clone)]
pub struct Exporter {
    inner: Arc<ExporterInner>,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter").finish_non_exhaustive()
    }
}

impl Exporter {
    /// Create an exporter with its metrics registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let success = IntCounterVec::new(
            Opts::new(
                "success_sync",
                "How many successful synchronizations processed, partitioned by workers.",
            ),
            &[WORKER_LABEL],
        )?;
        let fail = IntCounterVec::new(
            Opts::new(
                "fail_sync",
                "How many failed synchronizations processed, partitioned by workers.",
            ),
            &[WORKER_LABEL],
        )?;
        let disk_usage = IntGaugeVec::new(
            Opts::new(
                "lug_storage_disk_usage",
                "Disk usage in bytes, partitioned by workers.",
            ),
            &[WORKER_LABEL],
        )?;

        registry.register(Box::new(success.clone()))?;
        registry.register(Box::new(fail.clone()))?;
        registry.register(Box::new(disk_usage.clone()))?;

        Ok(Self {
            inner: Arc::new(ExporterInner {
                registry,
                success,
                fail,
                disk_usage,
                disk_scans: Mutex::new(DiskScans::default()),
            }),
        })
    }

    fn scans(&self) -> MutexGuard<'_, DiskScans> {
        self.inner
            .disk_scans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Successful syncs recorded for a worker.
    ///
    /// Reading creates the worker's series at zero.
    pub fn success_count(&self, worker: &str) -> u64 {
        self.inner.success.with_label_values(&[worker]).get()
    }

    /// Failed syncs recorded for a worker.
    ///
    /// Reading creates the worker's series at zero.
    pub fn fail_count(&self, worker: &str) -> u64 {
        self.inner.fail.with_label_values(&[worker]).get()
    }

    /// Last measured disk usage of a worker, in bytes.
    pub fn disk_usage(&self, worker: &str) -> Option<u64> {
        if !self.scans().measured.contains(worker) {
            return None;
        }
        let bytes = self.inner.disk_usage.with_label_values(&[worker]).get();
        u64::try_from(bytes).ok()
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render_prometheus(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.inner.registry.gather();
        TextEncoder::new().encode_to_string(&metric_families)
    }

    fn record_disk_usage(&self, worker: &str, size: Option<u64>) {
        let mut scans = self.scans();
        if let Some(size) = size {
            self.inner
                .disk_usage
                .with_label_values(&[worker])
                .set(i64::try_from(size).unwrap_or(i64::MAX));
            scans.measured.insert(worker.to_string());
        }
        scans
            .scans
            .insert(worker.to_string(), DiskScan::Finished(Instant::now()));
    }
}

impl SyncMetrics for Exporter {
    fn sync_success(&self, worker: &str) {
        self.inner.success.with_label_values(&[worker]).inc();
    }

    fn sync_fail(&self, worker: &str) {
        self.inner.fail.with_label_values(&[worker]).inc();
    }

    fn update_disk_usage(&self, worker: &str, path: &Path) {
        {
            let mut scans = self.scans();
            let due = match scans.scans.get(worker) {
                None => true,
                Some(DiskScan::InProgress) => false,
                Some(DiskScan::Finished(at)) => at.elapsed() > DISK_USAGE_THROTTLE,
            };
            if !due {
                tracing::debug!(worker, "Disk usage scan throttled");
                return;
            }
            scans.scans.insert(worker.to_string(), DiskScan::InProgress);
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(worker, "No runtime available for disk usage scan");
            self.record_disk_usage(worker, None);
            return;
        };

        let exporter = self.clone();
        let worker = worker.to_string();
        let path: PathBuf = path.to_path_buf();
        tracing::info!(worker = %worker, path = %path.display(), "Disk usage scan launched");
        runtime.spawn(async move {
            let scan_path = path.clone();
            let size = match tokio::task::spawn_blocking(move || disk_usage(&scan_path)).await {
                Ok(Ok(size)) => Some(size),
                Ok(Err(e)) => {
                    tracing::warn!(worker = %worker, path = %path.display(), error = %e, "Disk usage scan failed");
                    None
                }
                Err(e) => {
                    tracing::warn!(worker = %worker, error = %e, "Disk usage scan aborted");
                    None
                }
            };
            exporter.record_disk_usage(&worker, size);
            tracing::info!(worker = %worker, size = ?size, "Disk usage updated");
        });
    }
}
