//! Disk-space janitor for the segment buffer.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use camserve_common::config::RecorderConfig;
use sysinfo::Disks;
use tracing::{debug, info, warn};

/// Percentage of the filesystem in use.
pub fn usage_percent(total: u64, available: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    total.saturating_sub(available) as f64 / total as f64 * 100.0
}

/// Pick the entry with the oldest modification time.
pub fn oldest_entry(entries: &[(PathBuf, SystemTime)]) -> Option<&PathBuf> {
    entries
        .iter()
        .min_by_key(|(_, mtime)| *mtime)
        .map(|(path, _)| path)
}

/// Total and available space of the filesystem holding `path`, matched by
/// the longest mount-point prefix.
fn disk_space_for(path: &Path) -> Option<(u64, u64)> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| (disk.total_space(), disk.available_space()))
}

fn list_segments(dir: &Path) -> Vec<(PathBuf, SystemTime)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("h264") {
                return None;
            }
            let mtime = entry.metadata().ok()?.modified().ok()?;
            Some((path, mtime))
        })
        .collect()
}

/// Delete the oldest segment once disk usage crosses the threshold. One file
/// per call; the poll interval bounds the deletion rate. Errors are logged
/// and never fatal.
pub fn enforce_disk_budget(config: &RecorderConfig) {
    let dir = Path::new(&config.buffer_dir);
    let Some((total, available)) = disk_space_for(dir) else {
        warn!(
            dir = config.buffer_dir,
            "could not determine disk usage for buffer directory"
        );
        return;
    };

    let usage = usage_percent(total, available);
    debug!(
        usage_pct = format!("{usage:.1}"),
        threshold_pct = config.disk_threshold_percent,
        "disk usage check"
    );
    if usage < config.disk_threshold_percent {
        return;
    }

    let segments = list_segments(dir);
    let Some(oldest) = oldest_entry(&segments) else {
        warn!(
            usage_pct = format!("{usage:.1}"),
            dir = config.buffer_dir,
            "disk over threshold but no segments to delete"
        );
        return;
    };

    match std::fs::remove_file(oldest) {
        Ok(()) => info!(
            file = %oldest.display(),
            usage_pct = format!("{usage:.1}"),
            "deleted oldest segment to reclaim space"
        ),
        Err(e) => warn!(
            error = %e,
            file = %oldest.display(),
            "failed to delete oldest segment"
        ),
    }
}
