//! Optional wall-clock accounting for the graph stages.
//!
//! Each stage wraps its work in a [`Timer`]; with the `profiling` feature on,
//! dropped timers add to a process-wide table that [`stage_profile`] reads
//! back. With the feature off, [`Timer`] is a zero-sized no-op and the table
//! is always empty.

use std::time::Duration;

use serde::Serialize;

/// Accumulated time spent in one stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageSample {
    pub stage: &'static str,
    pub calls: u64,
    pub total: Duration,
}

impl StageSample {
    /// Mean time per call.
    #[must_use]
    pub fn mean(&self) -> Duration {
        u32::try_from(self.calls)
            .ok()
            .filter(|&calls| calls > 0)
            .map_or(Duration::ZERO, |calls| self.total / calls)
    }
}

/// Emits one `info!` line per recorded stage, slowest first.
pub fn log_profile() {
    for sample in stage_profile() {
        tracing::info!(
            "stage {:<24} calls={:<8} total={:?} mean={:?}",
            sample.stage,
            sample.calls,
            sample.total,
            sample.mean()
        );
    }
}

#[cfg(feature = "profiling")]
mod enabled {
    use std::sync::OnceLock;
    use std::time::{Duration, Instant};

    use dashmap::DashMap;

    use super::StageSample;

    static STAGES: OnceLock<DashMap<&'static str, (u64, Duration)>> = OnceLock::new();

    fn stages() -> &'static DashMap<&'static str, (u64, Duration)> {
        STAGES.get_or_init(DashMap::new)
    }

    /// Adds the time between construction and drop to `stage`.
    pub struct Timer {
        stage: &'static str,
        start: Instant,
    }

    impl Timer {
        #[inline]
        pub fn new(stage: &'static str) -> Self {
            Self {
                stage,
                start: Instant::now(),
            }
        }
    }

    impl Drop for Timer {
        fn drop(&mut self) {
            let mut entry = stages().entry(self.stage).or_insert((0, Duration::ZERO));
            entry.0 += 1;
            entry.1 += self.start.elapsed();
        }
    }

    /// Recorded stages, slowest first.
    pub fn stage_profile() -> Vec<StageSample> {
        let mut samples: Vec<StageSample> = stages()
            .iter()
            .map(|kv| StageSample {
                stage: *kv.key(),
                calls: kv.value().0,
                total: kv.value().1,
            })
            .collect();
        samples.sort_by(|a, b| b.total.cmp(&a.total).then(a.stage.cmp(b.stage)));
        samples
    }

    /// Forgets everything recorded so far.
    pub fn reset_profile() {
        stages().clear();
    }
}

#[cfg(not(feature = "profiling"))]
mod disabled {
    use super::StageSample;

    /// No-op timer.
    #[derive(Clone, Copy)]
    pub struct Timer;

    impl Timer {
        #[inline]
        pub const fn new(_: &'static str) -> Self {
            Self
        }
    }

    pub const fn stage_profile() -> Vec<StageSample> {
        Vec::new()
    }

    pub const fn reset_profile() {}
}

#[cfg(feature = "profiling")]
pub use enabled::*;

#[cfg(not(feature = "profiling"))]
pub use disabled::*;
