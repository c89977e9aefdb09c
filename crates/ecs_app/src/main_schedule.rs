//! Built-in schedule labels and the ordered lists that drive them (spec
//! §4.7, §6).
//!
//! Grounded on `bevy_app::main_schedule`'s `MainScheduleOrder`
//! (`insert_after`/`insert_before` over a `Vec<InternedScheduleLabel>`), but
//! trimmed to exactly the labels spec §6 names — no fixed-timestep
//! (`FixedFirst`/`FixedUpdate`/...) or scene-spawning labels, since this
//! spec has no fixed-timestep concept. Unlike the teacher, there is no
//! facilitator `Main` schedule running as a system inside itself:
//! `App::update()` walks `MainScheduleOrder` directly (see `app.rs`), since
//! spec §4.7 already describes that walk as `App::update()`'s own job.

use ecs_core::label::{InternedScheduleLabel, ScheduleLabel};

macro_rules! schedule_label {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
        pub struct $name;
    };
}

schedule_label!(
    /// Runs first every `App::update()`.
    First
);
schedule_label!(
    /// Engine/plugin preparation work that must land before `Update`.
    PreUpdate
);
schedule_label!(
    /// Copies each registered state's `NextState` into `State` (spec §4.9).
    StateTransition
);
schedule_label!(
    /// Where user gameplay systems live by default.
    Update
);
schedule_label!(
    /// Runs after `Update`, before `Last`.
    PostUpdate
);
schedule_label!(
    /// Runs last every `App::update()`; ages out event buffers.
    Last
);
schedule_label!(
    /// Runs once, before `Startup`.
    PreStartup
);
schedule_label!(
    /// Runs once when the app starts.
    Startup
);
schedule_label!(
    /// Runs once, after `Startup`.
    PostStartup
);
schedule_label!(
    /// A sub-app's equivalent of `PreUpdate`, for render-style sub-apps.
    PreRender
);
schedule_label!(
    /// A sub-app's equivalent of `Update`.
    Render
);
schedule_label!(
    /// A sub-app's equivalent of `PostUpdate`.
    PostRender
);
schedule_label!(
    /// Runs once, before `Exit`.
    PreExit
);
schedule_label!(
    /// Runs once as part of `App::exit()`.
    Exit
);
schedule_label!(
    /// Runs once, after `Exit`.
    PostExit
);
schedule_label!(
    /// `App::extract(target)`'s default schedule (spec §4.7).
    ExtractSchedule
);

/// An ordered, mutable list of schedule labels (spec §6
/// `main_schedule_order`/`extract_schedule_order`/`exit_schedule_order`).
/// `insert_before`/`insert_after` mirror `bevy_app::MainScheduleOrder`'s
/// panic-on-missing-anchor behavior.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOrder {
    labels: Vec<InternedScheduleLabel>,
}

impl ScheduleOrder {
    pub fn new(labels: Vec<InternedScheduleLabel>) -> Self {
        ScheduleOrder { labels }
    }

    pub fn labels(&self) -> &[InternedScheduleLabel] {
        &self.labels
    }

    pub fn push(&mut self, label: impl ScheduleLabel + Clone + 'static) {
        self.labels.push(label.intern());
    }

    pub fn insert_after(&mut self, after: impl ScheduleLabel, schedule: impl ScheduleLabel + Clone + 'static) {
        let index = self
            .labels
            .iter()
            .position(|current| (*current.as_label()).eq(&after))
            .unwrap_or_else(|| panic!("expected {after:?} to already be in the schedule order"));
        self.labels.insert(index + 1, schedule.intern());
    }

    pub fn insert_before(&mut self, before: impl ScheduleLabel, schedule: impl ScheduleLabel + Clone + 'static) {
        let index = self
            .labels
            .iter()
            .position(|current| (*current.as_label()).eq(&before))
            .unwrap_or_else(|| panic!("expected {before:?} to already be in the schedule order"));
        self.labels.insert(index, schedule.intern());
    }

    /// `left`'s position per spec §6's optional `right` argument: inserted
    /// immediately before `right` when given, appended otherwise.
    pub fn insert(&mut self, left: impl ScheduleLabel + Clone + 'static, right: Option<impl ScheduleLabel>) {
        match right {
            Some(right) => self.insert_before(right, left),
            None => self.push(left),
        }
    }
}

/// Defines the schedules `App::update()` runs each call, and once at
/// startup (spec §4.7's `main_order`).
#[derive(Debug, Clone)]
pub struct MainScheduleOrder {
    pub labels: ScheduleOrder,
    pub startup_labels: ScheduleOrder,
}

impl Default for MainScheduleOrder {
    fn default() -> Self {
        MainScheduleOrder {
            labels: ScheduleOrder::new(vec![
                First.intern(),
                PreUpdate.intern(),
                StateTransition.intern(),
                Update.intern(),
                PostUpdate.intern(),
                Last.intern(),
            ]),
            startup_labels: ScheduleOrder::new(vec![
                PreStartup.intern(),
                Startup.intern(),
                PostStartup.intern(),
            ]),
        }
    }
}
