//! Application-loop layer built on `ecs_core`: [`App`]/[`SubApp`], plugins,
//! the built-in schedule order, and the pluggable runner that drives the
//! steady-state loop (spec §2 "App / SubApp", §4.7, §6).
//!
//! Grounded on `bevy_app`'s module layout (`app`, `sub_app`, `plugin`,
//! `main_schedule`, `schedule_runner`), trimmed to the labels and lifecycle
//! this crate's scheduler core actually needs — see `DESIGN.md`.

mod app;
mod diagnostics;
mod main_schedule;
mod plugin;
mod runner;
mod sub_app;

pub use app::{App, AppExit};
pub use diagnostics::{AppProfiler, ScheduleProfiler};
pub use main_schedule::{
    Exit, ExtractSchedule, First, Last, MainScheduleOrder, PostExit, PostRender, PostStartup, PostUpdate, PreExit,
    PreRender, PreStartup, PreUpdate, Render, ScheduleOrder, StateTransition, Startup, Update,
};
pub use plugin::{Plugin, PluginGroup, PluginGroupBuilder};
pub use runner::{AppRunner, ControlFlow, RunMode, ScheduleRunner};
pub use sub_app::SubApp;

#[cfg(feature = "ctrlc_handler")]
#[cfg(any(all(unix, not(target_os = "horizon")), windows))]
pub use runner::ctrlc_handler::TerminalCtrlCHandlerPlugin;

/// The app prelude: the most common types re-exported for convenience
/// (mirrors `bevy_app::prelude`).
pub mod prelude {
    pub use crate::app::{App, AppExit};
    pub use crate::main_schedule::{
        Exit, ExtractSchedule, First, Last, PostExit, PostRender, PostStartup, PostUpdate, PreExit, PreRender,
        PreStartup, PreUpdate, Render, StateTransition, Startup, Update,
    };
    pub use crate::plugin::{Plugin, PluginGroup};
    pub use crate::runner::{AppRunner, RunMode, ScheduleRunner};
    pub use crate::sub_app::SubApp;
}
