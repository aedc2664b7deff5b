//! Typed accessors over the cross-process control block.
//!
//! One `ControlBlock` lives in the `control` shared-memory segment per
//! session and is the only state shared between the traced process and an
//! out-of-process drain agent. All fields are plain atomics: every accessor
//! here is a direct release/acquire (or relaxed, for the monotonic counters)
//! load/store — no locks, no other synchronization.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Cross-process control block, mapped onto the `control` shared-memory
/// segment. `#[repr(C)]` so its layout is stable across the processes that
/// map it.
#[repr(C)]
pub struct ControlBlock {
    registry_ready: AtomicU32,
    registry_version: AtomicU32,
    registry_epoch: AtomicU32,
    registry_mode: AtomicU32,
    hooks_ready: AtomicU32,
    index_lane_enabled: AtomicU32,
    detail_lane_enabled: AtomicU32,
    drain_heartbeat_ns: AtomicU64,
    mode_transitions: AtomicU64,
    fallback_events: AtomicU64,
}

impl ControlBlock {
    /// Zero-initialized control block, as it appears in a freshly-created
    /// shared-memory segment.
    pub const fn zeroed() -> Self {
        Self {
            registry_ready: AtomicU32::new(0),
            registry_version: AtomicU32::new(0),
            registry_epoch: AtomicU32::new(0),
            registry_mode: AtomicU32::new(0),
            hooks_ready: AtomicU32::new(0),
            index_lane_enabled: AtomicU32::new(0),
            detail_lane_enabled: AtomicU32::new(0),
            drain_heartbeat_ns: AtomicU64::new(0),
            mode_transitions: AtomicU64::new(0),
            fallback_events: AtomicU64::new(0),
        }
    }

    pub fn set_registry_ready(&self, ready: bool) {
        self.registry_ready.store(u32::from(ready), Ordering::Release);
    }

    pub fn registry_ready(&self) -> bool {
        self.registry_ready.load(Ordering::Acquire) != 0
    }

    pub fn set_registry_version(&self, version: u32) {
        self.registry_version.store(version, Ordering::Release);
    }

    pub fn registry_version(&self) -> u32 {
        self.registry_version.load(Ordering::Acquire)
    }

    pub fn set_registry_epoch(&self, epoch: u32) {
        self.registry_epoch.store(epoch, Ordering::Release);
    }

    pub fn registry_epoch(&self) -> u32 {
        self.registry_epoch.load(Ordering::Acquire)
    }

    pub fn set_registry_mode(&self, mode: u32) {
        self.registry_mode.store(mode, Ordering::Release);
    }

    pub fn registry_mode(&self) -> u32 {
        self.registry_mode.load(Ordering::Acquire)
    }

    /// Set by the agent once its hook trampolines are installed and able to
    /// emit events; the drain side treats `hooks_ready == false` the same as
    /// "no producer has attached yet."
    pub fn set_hooks_ready(&self, ready: bool) {
        self.hooks_ready.store(u32::from(ready), Ordering::Release);
    }

    pub fn hooks_ready(&self) -> bool {
        self.hooks_ready.load(Ordering::Acquire) != 0
    }

    pub fn set_index_lane_enabled(&self, enabled: bool) {
        self.index_lane_enabled.store(u32::from(enabled), Ordering::Release);
    }

    pub fn index_lane_enabled(&self) -> bool {
        self.index_lane_enabled.load(Ordering::Acquire) != 0
    }

    pub fn set_detail_lane_enabled(&self, enabled: bool) {
        self.detail_lane_enabled.store(u32::from(enabled), Ordering::Release);
    }

    pub fn detail_lane_enabled(&self) -> bool {
        self.detail_lane_enabled.load(Ordering::Acquire) != 0
    }

    pub fn set_heartbeat_ns(&self, now_ns: u64) {
        self.drain_heartbeat_ns.store(now_ns, Ordering::Release);
    }

    pub fn heartbeat_ns(&self) -> u64 {
        self.drain_heartbeat_ns.load(Ordering::Acquire)
    }

    /// Relaxed monotonic counter: incremented once per mode transition.
    pub fn inc_mode_transitions(&self) {
        self.mode_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mode_transitions(&self) -> u64 {
        self.mode_transitions.load(Ordering::Acquire)
    }

    /// Relaxed monotonic counter: incremented once per per-thread-write
    /// fallback to the global ring.
    pub fn inc_fallback_events(&self) {
        self.fallback_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fallback_events(&self) -> u64 {
        self.fallback_events.load(Ordering::Acquire)
    }
}

impl Default for ControlBlock {
    fn default() -> Self {
        Self::zeroed()
    }
}
