//! `SubApp`: a secondary, independently-scheduled world (spec §2 "App /
//! SubApp").
//!
//! Grounded on `bevy_app::sub_app::SubApp`'s struct shape (its own world,
//! schedule registry, update order), generalizing `update_schedule: Option<
//! InternedScheduleLabel>` to an ordered `Vec` to match `MainScheduleOrder`.
//! Unlike the teacher's closure-based `set_extract`, extraction here goes
//! through `ecs_core`'s own `Extract<P>`/`World::set_extract_source`
//! plumbing directly (see `App::extract` in `app.rs`) rather than a
//! user-supplied copy function, since that plumbing already exists and the
//! spec describes extraction in exactly those terms (spec §4.7, §4.1).

use std::collections::HashMap;

use ecs_core::error::{RunError, RunScheduleError};
use ecs_core::executors::Executors;
use ecs_core::label::{InternedScheduleLabel, ScheduleLabel};
use ecs_core::schedule::{Schedule, SetConfig};
use ecs_core::world::{FromWorld, Resource, World};

use crate::main_schedule::ScheduleOrder;

/// A secondary application with its own [`World`] (spec §2). Runs
/// independently of the main app's; `App::extract` is the sole bridge
/// between the two.
pub struct SubApp {
    world: World,
    schedules: HashMap<InternedScheduleLabel, Schedule>,
    executors: Executors,
    /// Schedules `update` runs, in order. Empty by default: a fresh
    /// `SubApp` does nothing until given an order (e.g.
    /// `[PreRender, Render, PostRender]` for a render sub-app).
    pub update_order: ScheduleOrder,
}

impl Default for SubApp {
    fn default() -> Self {
        SubApp {
            world: World::new(),
            schedules: HashMap::new(),
            executors: Executors::new_default(),
            update_order: ScheduleOrder::default(),
        }
    }
}

impl SubApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn insert_resource<T: Resource>(&mut self, value: T) -> &mut Self {
        self.world.insert_resource(value);
        self
    }

    pub fn init_resource<T: Resource + FromWorld>(&mut self) -> &mut Self {
        self.world.init_resource::<T>();
        self
    }

    fn schedule_mut(&mut self, label: impl ScheduleLabel + Clone + 'static) -> &mut Schedule {
        let interned = label.intern();
        self.schedules.entry(interned).or_insert_with(|| Schedule::new(label))
    }

    pub fn add_systems(
        &mut self,
        schedule: impl ScheduleLabel + Clone + 'static,
        config: SetConfig,
    ) -> &mut Self {
        self.schedule_mut(schedule).add_systems(config);
        self
    }

    pub fn configure_sets(
        &mut self,
        schedule: impl ScheduleLabel + Clone + 'static,
        config: SetConfig,
    ) -> &mut Self {
        self.schedule_mut(schedule).configure_sets(config);
        self
    }

    /// Runs a single labeled schedule, if one has been registered for it.
    pub fn run_schedule(
        &mut self,
        label: impl ScheduleLabel + Clone + 'static,
    ) -> Result<Vec<(String, RunError)>, RunScheduleError> {
        self.run_schedule_interned(&label.intern())
    }

    /// Same as [`run_schedule`](Self::run_schedule), taking an already
    /// interned label (e.g. from `App::extract`'s `extract_order` walk).
    pub fn run_schedule_interned(
        &mut self,
        label: &InternedScheduleLabel,
    ) -> Result<Vec<(String, RunError)>, RunScheduleError> {
        match self.schedules.get_mut(label) {
            Some(schedule) => schedule.run(&mut self.world, &self.executors),
            None => Ok(Vec::new()),
        }
    }

    /// Runs every schedule in `update_order`, in order (spec §4.7's
    /// `main_order` walk, applied to this sub-app's own order).
    pub fn update(&mut self) -> Result<Vec<(String, RunError)>, RunScheduleError> {
        let mut errors = Vec::new();
        for label in self.update_order.labels().to_vec() {
            if let Some(schedule) = self.schedules.get_mut(&label) {
                errors.extend(schedule.run(&mut self.world, &self.executors)?);
            }
        }
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecs_core::system::function_system::IntoSystem;
    use ecs_core::system::param::ResMut;

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    struct RenderSchedule;

    struct Frames(u32);

    #[test]
    fn update_runs_registered_schedules_in_order() {
        let mut sub_app = SubApp::new();
        sub_app.insert_resource(Frames(0));
        sub_app.update_order.push(RenderSchedule);
        sub_app.add_systems(
            RenderSchedule,
            SetConfig::system((|mut f: ResMut<Frames>| f.get_mut().0 += 1).into_system("tick")),
        );

        sub_app.update().unwrap();
        sub_app.update().unwrap();
        assert_eq!(sub_app.world().get_resource::<Frames>().unwrap().0, 2);
    }

    #[test]
    fn schedule_not_in_order_never_runs() {
        let mut sub_app = SubApp::new();
        sub_app.insert_resource(Frames(0));
        sub_app.add_systems(
            RenderSchedule,
            SetConfig::system((|mut f: ResMut<Frames>| f.get_mut().0 += 1).into_system("tick")),
        );

        sub_app.update().unwrap();
        assert_eq!(sub_app.world().get_resource::<Frames>().unwrap().0, 0);
    }
}
