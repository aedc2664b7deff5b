//! Debug assertion macros for shutdown and timer invariants.
//!
//! Active only in debug builds (`#[cfg(debug_assertions)]`) — zero overhead
//! in release builds.

// =============================================================================
// INV-SHUT-01: Idempotent Shutdown Request
// =============================================================================

/// Assert that a second `request_shutdown` call never re-advances the phase.
///
/// **Invariant**: `already_requested → phase unchanged by this call`
macro_rules! debug_assert_idempotent_request {
    ($already_requested:expr, $phase_before:expr, $phase_after:expr) => {
        debug_assert!(
            !$already_requested || $phase_before == $phase_after,
            "INV-SHUT-01 violated: request_shutdown called again but phase moved from {:?} to {:?}",
            $phase_before,
            $phase_after
        )
    };
}

// =============================================================================
// INV-SHUT-02: Phase Monotonicity
// =============================================================================

/// Assert that the shutdown phase only ever moves forward.
///
/// **Invariant**: `phase_after as u32 >= phase_before as u32`
macro_rules! debug_assert_phase_monotonic {
    ($phase_before:expr, $phase_after:expr) => {
        debug_assert!(
            ($phase_after as u32) >= ($phase_before as u32),
            "INV-SHUT-02 violated: shutdown phase regressed from {:?} to {:?}",
            $phase_before,
            $phase_after
        )
    };
}

// =============================================================================
// INV-SHUT-03: Completion Requires Draining
// =============================================================================

/// Assert that `Completed` is only reached after every registered thread has
/// been both stopped and flushed.
macro_rules! debug_assert_completion_drained {
    ($threads_stopped:expr, $threads_flushed:expr, $active_threads:expr) => {
        debug_assert!(
            $threads_stopped >= $active_threads && $threads_flushed >= $active_threads,
            "INV-SHUT-03 violated: reached Completed with {} stopped / {} flushed out of {} active",
            $threads_stopped,
            $threads_flushed,
            $active_threads
        )
    };
}

// =============================================================================
// INV-TIMER-01: At-Most-Once Callback Invocation
// =============================================================================

/// Assert that a timer's callback fires at most once per `start`.
macro_rules! debug_assert_callback_once {
    ($fire_count:expr) => {
        debug_assert!(
            $fire_count <= 1,
            "INV-TIMER-01 violated: timer callback fired {} times for one start()",
            $fire_count
        )
    };
}

pub(crate) use debug_assert_callback_once;
pub(crate) use debug_assert_completion_drained;
pub(crate) use debug_assert_idempotent_request;
pub(crate) use debug_assert_phase_monotonic;
