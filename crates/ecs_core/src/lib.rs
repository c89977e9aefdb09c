//! The scheduling and parameter-access core of an entity-component-system
//! framework: systems, schedules, the dependency/conflict-gated runner, and
//! the built-in event/state hooks built on top of them.
//!
//! `ecs_app` composes this crate's [`schedule::Schedule`]/[`executors::Executors`]
//! into a full application loop; this crate has no notion of an "app" or a
//! frame, only a [`world::World`] and the systems run against it.

pub mod access;
pub mod entity;
pub mod error;
pub mod event;
pub mod executors;
pub mod label;
pub mod schedule;
pub mod state;
pub mod system;
pub mod world;

pub mod prelude {
    pub use crate::entity::Entity;
    pub use crate::error::{BuildError, RunError, RunScheduleError, RunScheduleErrorKind};
    pub use crate::event::{EventReader, EventWriter, Events};
    pub use crate::executors::{ComputePool, Executors, IoPool};
    pub use crate::label::{ExecutorLabel, ScheduleLabel, SystemSetLabel, WorldLabel};
    pub use crate::schedule::{chain, Schedule, ScheduleBuildSettings, SetConfig};
    pub use crate::state::{on_change, on_enter, on_exit, NextState, State, StateTransitionSet};
    pub use crate::system::commands::{Commands, EntityCommands};
    pub use crate::system::function_system::IntoSystem;
    pub use crate::system::param::{Extract, Local, Res, ResMut};
    pub use crate::system::query_param::{Has, Mut, Opt, Or, Query, With, Without};
    pub use crate::system::{BoxedCondition, BoxedSystem, System};
    pub use crate::world::{Component, FromWorld, Resource, World};
}
