//! Pluggable steady-state drivers for [`App::run`](crate::app::App::run)
//! (spec §4.7 "App::run() delegates the steady-state driving to a pluggable
//! AppRunner::step/exit").
//!
//! Grounded on `bevy_app::schedule_runner::ScheduleRunnerPlugin`'s
//! `RunMode::{Loop,Once}` frame-pacing logic, but reshaped from a single
//! `Box<dyn Fn(App)>` runner closure into a `step`/`exit` trait: the spec
//! names exactly that pair, rather than one opaque driving function, so
//! `App::run()` can call `step` in a plain loop and hand control back to
//! the caller between iterations instead of the runner owning the whole
//! loop itself (see DESIGN.md).

use std::time::{Duration, Instant};

use crate::app::{App, AppExit};

/// Whether [`AppRunner::step`] wants another iteration or is done.
pub enum ControlFlow {
    Continue,
    Break(AppExit),
}

/// Drives an [`App`]'s steady state once `App::run()` has built it (spec
/// §4.7). `step` is called repeatedly until it returns `Break`; `exit` then
/// runs once, for any final cleanup (e.g. flushing a render sub-app).
pub trait AppRunner: Send + Sync {
    fn step(&mut self, app: &mut App) -> ControlFlow;

    fn exit(&mut self, _app: &mut App) {}
}

/// How often [`ScheduleRunner`] calls `App::update()` (spec §4.7's default
/// runner). Mirrors `bevy_app::schedule_runner::RunMode`.
#[derive(Debug, Clone, Copy)]
pub enum RunMode {
    /// Calls `update()` once, then reports `AppExit::Success` immediately.
    Once,
    /// Calls `update()` repeatedly, pacing iterations to at least `wait`
    /// apart when set, until an `AppExit` is observed.
    Loop { wait: Option<Duration> },
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Loop { wait: None }
    }
}

/// The runner installed by default when `App::run()` finds none set:
/// `update()` in a loop, observing `App::should_exit()` between (and, for
/// `Loop`, after sleeping for) every iteration.
pub struct ScheduleRunner {
    pub mode: RunMode,
}

impl Default for ScheduleRunner {
    fn default() -> Self {
        ScheduleRunner { mode: RunMode::default() }
    }
}

impl ScheduleRunner {
    pub fn run_once() -> Self {
        ScheduleRunner { mode: RunMode::Once }
    }

    pub fn run_loop(wait: Duration) -> Self {
        ScheduleRunner { mode: RunMode::Loop { wait: Some(wait) } }
    }
}

impl AppRunner for ScheduleRunner {
    fn step(&mut self, app: &mut App) -> ControlFlow {
        if let Some(exit) = app.should_exit() {
            return ControlFlow::Break(exit);
        }

        let start = Instant::now();
        if let Err(run_errors) = app.update() {
            log::error!("schedule run failed: {run_errors}");
            return ControlFlow::Break(AppExit::error());
        }

        if let Some(exit) = app.should_exit() {
            return ControlFlow::Break(exit);
        }

        match self.mode {
            RunMode::Once => ControlFlow::Break(AppExit::Success),
            RunMode::Loop { wait } => {
                if let Some(wait) = wait {
                    let elapsed = start.elapsed();
                    if elapsed < wait {
                        std::thread::sleep(wait - elapsed);
                    }
                }
                ControlFlow::Continue
            }
        }
    }

    fn exit(&mut self, app: &mut App) {
        app.exit();
    }
}

/// Installs a `Ctrl+C` handler that pushes `AppExit::from_code(130)`
/// instead of leaving the process to the default signal disposition
/// (spec §4.7's runner discussion; enabled by `ecs_app`'s `ctrlc_handler`
/// feature). Grounded on
/// `bevy_app::terminal_ctrl_c_handler::TerminalCtrlCHandlerPlugin`,
/// adapted from its `EventWriter`-polling `Update` system to a flag this
/// crate's own default runner checks directly, since that avoids needing
/// the handler to run as a scheduled system at all.
#[cfg(feature = "ctrlc_handler")]
#[cfg(any(all(unix, not(target_os = "horizon")), windows))]
pub mod ctrlc_handler {
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::app::{App, AppExit};
    use crate::plugin::Plugin;

    static SHOULD_EXIT: AtomicBool = AtomicBool::new(false);

    /// Installs the process-wide `Ctrl+C` handler and, via `build`, makes
    /// `App::should_exit` observe it.
    #[derive(Default)]
    pub struct TerminalCtrlCHandlerPlugin;

    impl TerminalCtrlCHandlerPlugin {
        /// Lets a caller with their own `ctrlc::set_handler` still trigger
        /// this crate's graceful exit path.
        pub fn gracefully_exit() {
            SHOULD_EXIT.store(true, Ordering::Relaxed);
        }

        pub fn exit_on_flag(app: &mut App) {
            if SHOULD_EXIT.swap(false, Ordering::Relaxed) {
                app.send_exit(AppExit::from_code(130));
            }
        }
    }

    impl Plugin for TerminalCtrlCHandlerPlugin {
        fn build(&self, _app: &mut App) {
            let result = ctrlc::try_set_handler(move || {
                Self::gracefully_exit();
            });
            match result {
                Ok(()) => {}
                Err(ctrlc::Error::MultipleHandlers) => {
                    log::info!(
                        "skipping Ctrl+C handler install; one is already set. Call \
                         TerminalCtrlCHandlerPlugin::gracefully_exit from your own handler instead"
                    );
                }
                Err(err) => log::warn!("failed to set Ctrl+C handler: {err}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;

    #[test]
    fn run_once_executes_a_single_update_then_exits() {
        let mut app = App::new();
        app.set_runner(ScheduleRunner::run_once());
        let exit = app.run();
        assert!(exit.is_success());
    }

    #[test]
    fn loop_runner_stops_once_app_requests_exit() {
        struct ExitAfterOneUpdate;
        impl AppRunner for ExitAfterOneUpdate {
            fn step(&mut self, app: &mut App) -> ControlFlow {
                app.update().unwrap();
                app.send_exit(AppExit::Success);
                ControlFlow::Break(AppExit::Success)
            }
        }

        let mut app = App::new();
        app.set_runner(ExitAfterOneUpdate);
        let exit = app.run();
        assert!(exit.is_success());
    }
}
