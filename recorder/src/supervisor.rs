//! Supervision of the external segmented-video recorder process.

use std::time::Duration;

use camserve_common::config::RecorderConfig;
use chrono::{Local, Timelike};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("failed to create buffer directory {0}: {1}")]
    BufferDir(String, std::io::Error),
    #[error("failed to spawn {0}: {1}")]
    Spawn(String, std::io::Error),
}

/// Record while `start_hour <= hour <= end_hour` (local time, both ends
/// inclusive).
pub fn within_window(hour: u32, start_hour: u32, end_hour: u32) -> bool {
    start_hour <= hour && hour <= end_hour
}

/// Argument list for the external recorder command.
pub fn build_args(config: &RecorderConfig, output: &str) -> Vec<String> {
    vec![
        "-n".into(),
        "-t".into(),
        "0".into(),
        "--segment".into(),
        config.segment_ms.to_string(),
        "--inline".into(),
        "--width".into(),
        config.width.to_string(),
        "--height".into(),
        config.height.to_string(),
        "--framerate".into(),
        config.framerate.to_string(),
        "--bitrate".into(),
        config.bitrate.to_string(),
        "--profile".into(),
        "high".into(),
        "-o".into(),
        output.into(),
    ]
}

fn hostname() -> String {
    std::fs::read_to_string("/etc/hostname")
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "camserve".into())
}

pub struct Supervisor {
    config: RecorderConfig,
    child: Option<Child>,
}

impl Supervisor {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            child: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.child.is_some()
    }

    fn output_pattern(&self) -> String {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        format!(
            "{}/{}_{}_%04d.h264",
            self.config.buffer_dir.trim_end_matches('/'),
            hostname(),
            stamp
        )
    }

    async fn start(&mut self) -> Result<(), RecorderError> {
        std::fs::create_dir_all(&self.config.buffer_dir)
            .map_err(|e| RecorderError::BufferDir(self.config.buffer_dir.clone(), e))?;

        let output = self.output_pattern();
        let child = Command::new(&self.config.command)
            .args(build_args(&self.config, &output))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| RecorderError::Spawn(self.config.command.clone(), e))?;

        info!(
            command = self.config.command,
            output,
            bitrate = self.config.bitrate,
            "recording started"
        );
        self.child = Some(child);
        Ok(())
    }

    /// Graceful stop: SIGTERM, a 5 second grace period, then SIGKILL.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        info!("stopping recording");

        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }
        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "recorder process exited"),
            Ok(Err(e)) => warn!(error = %e, "failed waiting for recorder process"),
            Err(_elapsed) => {
                warn!("recorder process ignored SIGTERM, killing");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill recorder process");
                }
            }
        }
    }

    /// One poll tick: reconcile the process with the recording window.
    pub async fn tick(&mut self) {
        let hour = Local::now().hour();
        if !within_window(hour, self.config.start_hour, self.config.end_hour) {
            if self.child.is_some() {
                info!(hour, "outside recording window, stopping");
                self.stop().await;
            }
            return;
        }

        // Reap a dead process so the next check restarts it.
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    warn!(%status, "recorder process exited unexpectedly, restarting");
                    self.child = None;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "failed to poll recorder process"),
            }
        }

        if self.child.is_none() {
            if let Err(e) = self.start().await {
                error!(error = %e, "failed to start recording");
            }
        }
    }
}
