//! Latest-frame slot with change notification.
//!
//! One producer publishes into a single shared slot; any number of consumers
//! wait for "a frame newer than the one I last saw". Slow consumers skip
//! intermediate frames instead of queueing them, so memory stays O(1) no
//! matter how many viewers are connected or how far behind they fall.

use std::time::Duration;

use camserve_common::frame::Frame;
use tokio::sync::watch;

/// Default bound on a single wait, so blocked consumers periodically come up
/// for air even when the camera is quiet.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
struct HubState {
    /// Strictly increasing, bumped by exactly 1 per publish. 0 = no frame yet.
    version: u64,
    frame: Option<Frame>,
    stopped: bool,
}

/// The shared slot. Construct once, share via `Arc`, hand `subscribe()`
/// cursors to consumers.
pub struct FrameHub {
    tx: watch::Sender<HubState>,
}

/// Outcome of one `FrameCursor::wait_newer` call.
#[derive(Debug)]
pub enum WaitOutcome {
    /// A frame newer than the cursor's last-seen version.
    Frame { frame: Frame, version: u64 },
    /// Nothing new within the timeout; retry.
    TimedOut,
    /// The hub stopped; no more frames will ever arrive.
    Stopped,
}

impl FrameHub {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(HubState::default());
        Self { tx }
    }

    /// Store `frame` as current and wake every waiter. Called from the single
    /// producer thread; O(1), no I/O while the slot is locked.
    pub fn publish(&self, frame: Frame) {
        self.tx.send_modify(|state| {
            state.version += 1;
            state.frame = Some(frame);
        });
    }

    /// Mark the hub stopped and wake every current and future waiter.
    /// Idempotent; never reverts.
    pub fn stop(&self) {
        self.tx.send_modify(|state| state.stopped = true);
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.borrow().stopped
    }

    pub fn version(&self) -> u64 {
        self.tx.borrow().version
    }

    /// Snapshot of the current frame, if one has been published.
    pub fn latest(&self) -> Option<(Frame, u64)> {
        let state = self.tx.borrow();
        state.frame.clone().map(|frame| (frame, state.version))
    }

    /// New cursor starting at the sentinel version 0, so its first successful
    /// wait returns the frame current at subscribe time if one exists.
    pub fn subscribe(&self) -> FrameCursor {
        FrameCursor {
            rx: self.tx.subscribe(),
            last_seen: 0,
        }
    }
}

impl Default for FrameHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One consumer's view of the hub. Tracks the last version delivered to this
/// consumer; versions observed through a cursor never decrease.
pub struct FrameCursor {
    rx: watch::Receiver<HubState>,
    last_seen: u64,
}

impl FrameCursor {
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    /// Wait until the hub holds a frame newer than this cursor's last-seen
    /// version, the hub stops, or `timeout` elapses.
    pub async fn wait_newer(&mut self, timeout: Duration) -> WaitOutcome {
        let last_seen = self.last_seen;
        let waited = tokio::time::timeout(
            timeout,
            self.rx
                .wait_for(|state| state.stopped || state.version > last_seen),
        )
        .await;

        match waited {
            Err(_elapsed) => WaitOutcome::TimedOut,
            // Sender dropped: treat the hub as stopped.
            Ok(Err(_)) => WaitOutcome::Stopped,
            Ok(Ok(state)) => {
                if state.stopped {
                    return WaitOutcome::Stopped;
                }
                let version = state.version;
                let frame = state.frame.clone().expect("version > 0 implies a frame");
                drop(state);
                self.last_seen = version;
                WaitOutcome::Frame { frame, version }
            }
        }
    }
}
