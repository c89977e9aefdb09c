//! Schedule/app timing diagnostics (component table, spec.md "Misc
//! (profiler, labels for built-in schedules)").
//!
//! Grounded on `original_source/epix_engine/app/include/epix/app/profiler.h`'s
//! `ScheduleProfiler`/`AppProfiler`: an exponentially-smoothed moving
//! average of per-phase timings plus raw set/system counts, kept per
//! schedule label and aggregated across all of them. Pure instrumentation;
//! `App::update` pushes samples into it but nothing reads it to make
//! scheduling decisions.

use std::collections::HashMap;
use std::time::Duration;

use ecs_core::label::InternedScheduleLabel;

/// Per-schedule timing history, updated once per `Schedule::run` call.
#[derive(Debug, Clone)]
pub struct ScheduleProfiler {
    count: u64,
    set_count: usize,
    system_count: usize,
    build_time_last: Duration,
    build_time_avg: f64,
    run_time_last: Duration,
    run_time_avg: f64,
    flush_time_last: Duration,
    flush_time_avg: f64,
    factor: f64,
}

impl Default for ScheduleProfiler {
    fn default() -> Self {
        ScheduleProfiler {
            count: 0,
            set_count: 0,
            system_count: 0,
            build_time_last: Duration::ZERO,
            build_time_avg: 0.0,
            run_time_last: Duration::ZERO,
            run_time_avg: 0.0,
            flush_time_last: Duration::ZERO,
            flush_time_avg: 0.0,
            factor: 0.1,
        }
    }
}

impl ScheduleProfiler {
    pub fn reset(&mut self) {
        *self = ScheduleProfiler { factor: self.factor, ..ScheduleProfiler::default() };
    }

    pub fn set_factor(&mut self, factor: f64) {
        self.factor = factor;
    }

    pub fn build_time_last(&self) -> Duration {
        self.build_time_last
    }

    pub fn build_time_avg(&self) -> f64 {
        self.build_time_avg
    }

    pub fn run_time_last(&self) -> Duration {
        self.run_time_last
    }

    pub fn run_time_avg(&self) -> f64 {
        self.run_time_avg
    }

    pub fn flush_time_last(&self) -> Duration {
        self.flush_time_last
    }

    pub fn flush_time_avg(&self) -> f64 {
        self.flush_time_avg
    }

    pub fn set_count(&self) -> usize {
        self.set_count
    }

    pub fn system_count(&self) -> usize {
        self.system_count
    }

    fn smooth(avg: f64, sample: Duration, factor: f64) -> f64 {
        let sample = sample.as_secs_f64();
        if avg == 0.0 {
            sample
        } else {
            avg * (1.0 - factor) + sample * factor
        }
    }

    /// Records one `Schedule::run` call's phase timings.
    pub fn push_time(&mut self, build_time: Duration, run_time: Duration, flush_time: Duration) {
        self.count += 1;
        self.build_time_last = build_time;
        self.build_time_avg = Self::smooth(self.build_time_avg, build_time, self.factor);
        self.run_time_last = run_time;
        self.run_time_avg = Self::smooth(self.run_time_avg, run_time, self.factor);
        self.flush_time_last = flush_time;
        self.flush_time_avg = Self::smooth(self.flush_time_avg, flush_time, self.factor);
    }

    pub fn push_counts(&mut self, set_count: usize, system_count: usize) {
        self.set_count = set_count;
        self.system_count = system_count;
    }
}

/// Aggregate timing across every schedule `App::update()` has run, plus the
/// per-label breakdown (spec.md's "Misc (profiler...)").
#[derive(Debug, Clone, Default)]
pub struct AppProfiler {
    count: u64,
    time_last: Duration,
    time_avg: f64,
    factor: f64,
    schedule_profilers: HashMap<InternedScheduleLabel, ScheduleProfiler>,
}

impl AppProfiler {
    pub fn reset(&mut self) {
        self.count = 0;
        self.time_last = Duration::ZERO;
        self.time_avg = 0.0;
        self.schedule_profilers.clear();
    }

    pub fn set_factor(&mut self, factor: f64) {
        self.factor = factor;
    }

    pub fn time_last(&self) -> Duration {
        self.time_last
    }

    pub fn time_avg(&self) -> f64 {
        self.time_avg
    }

    /// Records one `App::update()` call's total wall time.
    pub fn push_time(&mut self, time: Duration) {
        self.count += 1;
        self.time_last = time;
        self.time_avg = ScheduleProfiler::smooth(self.time_avg, time, self.factor);
    }

    pub fn schedule_profilers(&self) -> &HashMap<InternedScheduleLabel, ScheduleProfiler> {
        &self.schedule_profilers
    }

    pub fn schedule_profiler(&mut self, label: InternedScheduleLabel) -> &mut ScheduleProfiler {
        self.schedule_profilers.entry(label).or_default()
    }

    pub fn get_schedule_profiler(&self, label: &InternedScheduleLabel) -> Option<&ScheduleProfiler> {
        self.schedule_profilers.get(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_time_tracks_last_and_smooths_average() {
        let mut profiler = ScheduleProfiler::default();
        profiler.push_time(Duration::from_millis(1), Duration::from_millis(10), Duration::from_millis(1));
        assert_eq!(profiler.run_time_last(), Duration::from_millis(10));
        assert!((profiler.run_time_avg() - 0.010).abs() < 1e-9);

        profiler.push_time(Duration::from_millis(1), Duration::from_millis(20), Duration::from_millis(1));
        assert_eq!(profiler.run_time_last(), Duration::from_millis(20));
        assert!(profiler.run_time_avg() > 0.010 && profiler.run_time_avg() < 0.020);
    }

    #[test]
    fn app_profiler_tracks_schedules_by_label() {
        use ecs_core::label::ScheduleLabel;

        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
        struct MySchedule;

        let mut app_profiler = AppProfiler::default();
        app_profiler.schedule_profiler(MySchedule.intern()).push_counts(3, 10);

        let profiler = app_profiler.get_schedule_profiler(&MySchedule.intern()).unwrap();
        assert_eq!(profiler.set_count(), 3);
        assert_eq!(profiler.system_count(), 10);
    }
}
