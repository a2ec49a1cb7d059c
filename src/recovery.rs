//! Recovery after an unexpected remote reset
//!
//! When the matrix controller reboots (power sag, brown-out) it loses its
//! brightness and timing configuration, and whatever frame it was showing.
//! The host framebuffer survives, so recovery is a resync followed by a
//! full repaint.

use log::{info, warn};

use crate::dirty::DirtyChunkMap;
use crate::link::DeviceLink;

/// Polls the link once per update cycle for a remote reset
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResetRecoveryMonitor {
    recoveries: u32,
    last_epoch: Option<u32>,
    resync_pending: bool,
    failed_resyncs: u32,
}

impl ResetRecoveryMonitor {
    /// Create a monitor that has not seen any reset
    pub const fn new() -> Self {
        Self {
            recoveries: 0,
            last_epoch: None,
            resync_pending: false,
            failed_resyncs: 0,
        }
    }

    /// Handle a remote reset if the link reported one
    ///
    /// Consumes the link's edge-triggered reset flag. When set, every chunk
    /// of `dirty` is marked so the stale remote frame is fully repainted,
    /// and a resync restoring `brightness` is scheduled. A scheduled resync
    /// is attempted on every call until the link accepts it; failures are
    /// logged, not returned. Returns whether a new reset was observed.
    pub fn check<L: DeviceLink>(
        &mut self,
        link: &mut L,
        brightness: u8,
        dirty: Option<&mut DirtyChunkMap>,
    ) -> bool {
        let observed = link.consume_reset_flag();
        if observed {
            let epoch = link.reset_epoch();
            warn!("Matrix controller reset detected (epoch {epoch}), resynchronizing");
            self.recoveries = self.recoveries.saturating_add(1);
            self.last_epoch = Some(epoch);
            self.resync_pending = true;
            if let Some(dirty) = dirty {
                dirty.mark_all();
            }
        }

        if self.resync_pending {
            match link.resync_after_reset(brightness) {
                Ok(()) => {
                    if self.failed_resyncs > 0 {
                        info!(
                            "Matrix controller resynchronized after {} retries",
                            self.failed_resyncs
                        );
                    }
                    self.resync_pending = false;
                    self.failed_resyncs = 0;
                }
                Err(err) => {
                    self.failed_resyncs = self.failed_resyncs.saturating_add(1);
                    warn!("Matrix controller resync failed, retrying next cycle: {err:?}");
                }
            }
        }
        observed
    }

    /// Whether a resync is still waiting to succeed
    pub fn resync_pending(&self) -> bool {
        self.resync_pending
    }

    /// Number of resets handled
    pub fn recoveries(&self) -> u32 {
        self.recoveries
    }

    /// Reset epoch reported by the link at the last recovery
    pub fn last_epoch(&self) -> Option<u32> {
        self.last_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, MockLink};

    #[test]
    fn test_no_reset_is_noop() {
        let mut monitor = ResetRecoveryMonitor::new();
        let mut link = MockLink::new();
        let mut dirty = DirtyChunkMap::new(64, 32).unwrap();

        assert!(!monitor.check(&mut link, 100, Some(&mut dirty)));
        assert!(link.calls.is_empty());
        assert!(!dirty.any_dirty());
        assert_eq!(monitor.recoveries(), 0);
    }

    #[test]
    fn test_reset_resyncs_with_brightness_and_repaints() {
        let mut monitor = ResetRecoveryMonitor::new();
        let mut link = MockLink::new();
        let mut dirty = DirtyChunkMap::new(64, 32).unwrap();
        link.trigger_reset();

        assert!(monitor.check(&mut link, 77, Some(&mut dirty)));
        assert_eq!(link.calls, [Call::Resync(77)]);
        assert_eq!(dirty.dirty_count(), 2);
        assert_eq!(monitor.recoveries(), 1);
        assert_eq!(monitor.last_epoch(), Some(1));
    }

    #[test]
    fn test_reset_flag_is_edge_triggered() {
        let mut monitor = ResetRecoveryMonitor::new();
        let mut link = MockLink::new();
        link.trigger_reset();

        assert!(monitor.check(&mut link, 10, None));
        assert!(!monitor.check(&mut link, 10, None));
        assert_eq!(link.count(&Call::Resync(10)), 1);

        link.trigger_reset();
        assert!(monitor.check(&mut link, 10, None));
        assert_eq!(monitor.recoveries(), 2);
        assert_eq!(monitor.last_epoch(), Some(2));
    }

    #[test]
    fn test_failed_resync_is_retried() {
        let mut monitor = ResetRecoveryMonitor::new();
        let mut link = MockLink::new();
        let mut dirty = DirtyChunkMap::new(64, 32).unwrap();
        link.fail_resyncs = 1;
        link.trigger_reset();

        assert!(monitor.check(&mut link, 90, Some(&mut dirty)));
        assert!(monitor.resync_pending());
        assert!(link.calls.is_empty());
        assert_eq!(dirty.dirty_count(), 2);

        // No new reset, but the resync is attempted again
        assert!(!monitor.check(&mut link, 95, Some(&mut dirty)));
        assert!(!monitor.resync_pending());
        assert_eq!(link.calls, [Call::Resync(95)]);
        assert_eq!(monitor.recoveries(), 1);

        assert!(!monitor.check(&mut link, 95, Some(&mut dirty)));
        assert_eq!(link.count(&Call::Resync(95)), 1);
    }
}
