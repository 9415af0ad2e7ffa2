pub mod movement;

// ============================================================================
// Profiling Macros
// ============================================================================

/// Log a message every 100 movement ticks when the `perf_stats` feature is enabled.
///
/// Without `perf_stats` only the tick is touched; the message arguments are
/// never evaluated, so it is safe to pass expensive expressions.
///
/// # Example
/// ```ignore
/// profile_log!(tick, "Live flow fields: {}", engine.0.path_finder().len());
/// ```
#[macro_export]
#[cfg(feature = "perf_stats")]
macro_rules! profile_log {
    ($tick:expr, $($arg:tt)*) => {
        if $tick.0 % 100 == 0 {
            bevy::prelude::info!($($arg)*);
        }
    };
}

#[macro_export]
#[cfg(not(feature = "perf_stats"))]
macro_rules! profile_log {
    ($tick:expr, $($arg:tt)*) => {
        let _ = &$tick;
    };
}
