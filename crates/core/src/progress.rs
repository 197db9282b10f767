// crates/core/src/progress.rs
//! Banded progress estimation shared by every job kind.
//!
//! Clients render one progress-bar semantics regardless of job type:
//! 10 means "work has started", 90 is the ceiling while per-unit work
//! is still running, 95/100 are set by the finalization and archive
//! steps. The band keeps a monitor that counts output files from ever
//! claiming a task is finished before the runner says so.

/// Floor reported once a task enters processing.
pub const FLOOR: u8 = 10;

/// Ceiling while per-unit work is in flight; headroom for finalization.
pub const CEILING: u8 = 90;

/// Map completed/total work units to a percentage in [10, 90].
///
/// `prior` is returned unchanged when `total` is zero, so a poll that
/// races task setup can neither divide by zero nor regress progress.
pub fn estimate(completed: u64, total: u64, prior: u8) -> u8 {
    if total == 0 {
        return prior;
    }
    let banded = FLOOR as u64 + completed.saturating_mul(80) / total;
    banded.min(CEILING as u64) as u8
}
