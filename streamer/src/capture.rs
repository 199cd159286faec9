//! Capture loop: camera -> encoder -> hub, on a dedicated thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use camserve_common::frame::Frame;
use chrono::Utc;
use tracing::{info, warn};

use crate::camera::FrameSource;
use crate::encoder::FrameEncoder;
use crate::hub::FrameHub;

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Pause after each published frame; caps the capture rate independently
    /// of the camera's native rate. Zero disables pacing.
    pub interval: Duration,
    /// Pause after a failed capture before retrying.
    pub retry_backoff: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            interval: Duration::ZERO,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

impl CaptureSettings {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }
}

/// Handle to the running capture thread.
pub struct CaptureHandle {
    stop: StopSignal,
    thread: Option<JoinHandle<()>>,
}

/// Cloneable stop flag, so shutdown wiring can request a stop without owning
/// the handle.
#[derive(Clone)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl CaptureHandle {
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.trigger();
    }

    /// Request a stop and wait for the thread to finish its current cycle.
    pub fn join(mut self) {
        self.stop.trigger();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("capture thread panicked");
            }
        }
    }
}

pub struct CaptureLoop;

impl CaptureLoop {
    /// Spawn the producer thread. The camera call blocks, so this is the one
    /// place a real OS thread is required; consumers never share it.
    pub fn spawn<E>(
        source: Box<dyn FrameSource>,
        encoder: E,
        hub: Arc<FrameHub>,
        settings: CaptureSettings,
    ) -> CaptureHandle
    where
        E: FrameEncoder + 'static,
    {
        let stop = StopSignal(Arc::new(AtomicBool::new(false)));
        let thread_stop = stop.clone();
        let thread = std::thread::spawn(move || {
            run(source, encoder, hub, settings, thread_stop);
        });
        CaptureHandle {
            stop,
            thread: Some(thread),
        }
    }
}

fn run<E: FrameEncoder>(
    mut source: Box<dyn FrameSource>,
    encoder: E,
    hub: Arc<FrameHub>,
    settings: CaptureSettings,
    stop: StopSignal,
) {
    info!(source = source.name(), "capture loop started");
    let mut seq: u64 = 0;

    while !stop.is_set() {
        let raw = match source.capture_next() {
            Ok(raw) => raw,
            Err(e) => {
                // Transient camera errors must not kill the stream; the last
                // published frame stays current while we retry.
                warn!(error = %e, "camera capture failed, retrying");
                std::thread::sleep(settings.retry_backoff);
                continue;
            }
        };

        let data = match encoder.encode(&raw) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "frame encoding failed, skipping frame");
                continue;
            }
        };

        seq += 1;
        hub.publish(Frame::new(data, Utc::now().timestamp_millis(), seq));

        if !settings.interval.is_zero() {
            std::thread::sleep(settings.interval);
        }
    }

    source.close();
    hub.stop();
    info!(frames = seq, "capture loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CaptureError, RawFrame, TestPatternSource};
    use crate::encoder::JpegEncoder;
    use std::time::Instant;

    /// Fails `failures` times, succeeds once, then fails forever.
    struct FlakySource {
        failures: u32,
        delivered: bool,
    }

    impl FrameSource for FlakySource {
        fn capture_next(&mut self) -> Result<RawFrame, CaptureError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(CaptureError::Device("usb timeout".into()));
            }
            if self.delivered {
                return Err(CaptureError::Empty);
            }
            self.delivered = true;
            Ok(RawFrame {
                width: 2,
                height: 2,
                pixels: vec![0; 12],
            })
        }

        fn close(&mut self) {}
    }

    /// Always succeeds but with a pixel buffer the encoder must reject.
    struct TornSource;

    impl FrameSource for TornSource {
        fn capture_next(&mut self) -> Result<RawFrame, CaptureError> {
            Ok(RawFrame {
                width: 10,
                height: 10,
                pixels: vec![0; 7],
            })
        }

        fn close(&mut self) {}
    }

    fn fast_settings() -> CaptureSettings {
        CaptureSettings {
            interval: Duration::ZERO,
            retry_backoff: Duration::from_millis(1),
        }
    }

    fn wait_for_version(hub: &FrameHub, version: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while hub.version() < version {
            assert!(Instant::now() < deadline, "hub never reached version {version}");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn capture_failures_retry_without_publishing() {
        let hub = Arc::new(FrameHub::new());
        let source = FlakySource {
            failures: 3,
            delivered: false,
        };
        let handle = CaptureLoop::spawn(
            Box::new(source),
            JpegEncoder::new(80),
            Arc::clone(&hub),
            fast_settings(),
        );

        // Three failures then one success: the version moves exactly once.
        wait_for_version(&hub, 1);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(hub.version(), 1);
        let (frame, _) = hub.latest().unwrap();
        assert!(frame.is_jpeg());

        handle.join();
        assert!(hub.is_stopped());
    }

    #[test]
    fn encode_failure_skips_cycle() {
        let hub = Arc::new(FrameHub::new());
        let handle = CaptureLoop::spawn(
            Box::new(TornSource),
            JpegEncoder::new(80),
            Arc::clone(&hub),
            CaptureSettings {
                interval: Duration::from_millis(1),
                retry_backoff: Duration::from_millis(1),
            },
        );

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(hub.version(), 0);
        assert!(hub.latest().is_none());

        handle.join();
        assert!(hub.is_stopped());
    }

    #[test]
    fn stop_terminates_loop_and_stops_hub() {
        let hub = Arc::new(FrameHub::new());
        let handle = CaptureLoop::spawn(
            Box::new(TestPatternSource::new(4, 4)),
            JpegEncoder::new(80),
            Arc::clone(&hub),
            CaptureSettings {
                interval: Duration::from_millis(1),
                retry_backoff: Duration::from_millis(1),
            },
        );

        wait_for_version(&hub, 2);
        handle.join();
        assert!(hub.is_stopped());

        // Stopped means stopped: the version no longer moves.
        let version = hub.version();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(hub.version(), version);
    }
}
