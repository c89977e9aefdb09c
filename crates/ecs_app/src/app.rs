//! `App`: the fluent builder that owns the main world, the app's schedules,
//! and drives the frame loop (spec §4.7, §6).
//!
//! Grounded on `bevy_app::app::App`'s fluent surface (`insert_resource`,
//! `init_resource`, `add_plugin(s)`, `set_runner`, `add_sub_app`/`sub_app`),
//! generalized from bevy's stage-based scheduling to this crate's
//! schedule-label-based one. `App::update()`'s schedule walk and
//! `App::run()`'s runner delegation are grounded directly on spec §4.7's
//! prose rather than any one bevy snapshot, since the retrieved `app.rs`
//! predates `MainScheduleOrder`/`SubApp` (see `DESIGN.md`).

use std::collections::{HashMap, HashSet};
use std::time::Duration;

#[cfg(feature = "trace")]
use tracing::info_span;

use ecs_core::error::{RunError, RunScheduleError};
use ecs_core::event::{update_events_system, Events};
use ecs_core::executors::Executors;
use ecs_core::label::{InternedScheduleLabel, InternedWorldLabel, ScheduleLabel, WorldLabel};
use ecs_core::schedule::{Schedule, SetConfig};
use ecs_core::state::{transition_system, NextState, State, StateTransitionSet};
use ecs_core::system::function_system::IntoSystem;
use ecs_core::system::{BoxedSystem, System};
use ecs_core::world::{Component, FromWorld, Resource, World};

use crate::diagnostics::AppProfiler;
use crate::main_schedule::{Last, MainScheduleOrder, ScheduleOrder, StateTransition};
use crate::plugin::{Plugin, PluginGroup};
use crate::runner::{AppRunner, ControlFlow, ScheduleRunner};
use crate::sub_app::SubApp;

/// The canonical exit signal (spec §6, §7 "App-level"). Any value
/// propagates as the process exit code once a runner observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppExit {
    Success,
    Error(std::num::NonZeroU8),
}

impl AppExit {
    pub fn error() -> Self {
        AppExit::Error(std::num::NonZeroU8::new(1).unwrap())
    }

    pub fn from_code(code: u8) -> Self {
        match std::num::NonZeroU8::new(code) {
            Some(code) => AppExit::Error(code),
            None => AppExit::Success,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AppExit::Success)
    }

    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    pub fn code(&self) -> u8 {
        match self {
            AppExit::Success => 0,
            AppExit::Error(code) => code.get(),
        }
    }
}

impl Default for AppExit {
    fn default() -> Self {
        AppExit::Success
    }
}

/// Containers of app logic and data: the main [`World`], its registered
/// schedules and executors, any sub-apps, and the fluent configuration
/// surface used to build all of it (spec §2 "App / SubApp").
pub struct App {
    world: World,
    schedules: HashMap<InternedScheduleLabel, Schedule>,
    executors: Executors,
    main_order: MainScheduleOrder,
    extract_order: ScheduleOrder,
    exit_order: ScheduleOrder,
    sub_apps: HashMap<InternedWorldLabel, SubApp>,
    plugin_registry: Vec<Box<dyn Plugin>>,
    plugin_names: HashSet<String>,
    runner: Option<Box<dyn AppRunner>>,
    ran_startup: bool,
    exit_cursor: u64,
    built: bool,
}

impl Default for App {
    fn default() -> Self {
        let mut app = App::empty();
        app.world.insert_resource(Events::<AppExit>::default());
        app.world.insert_resource(AppProfiler::default());
        app.extract_order.push(crate::main_schedule::ExtractSchedule);
        app.exit_order.push(crate::main_schedule::PreExit);
        app.exit_order.push(crate::main_schedule::Exit);
        app.exit_order.push(crate::main_schedule::PostExit);
        app
    }
}

impl App {
    pub fn new() -> Self {
        App::default()
    }

    /// An `App` with none of `new()`'s default wiring (no `AppExit` events
    /// resource, empty extract/exit orders). Mostly useful for tests that
    /// don't need the default schedule order (mirrors `bevy_app::App::empty`).
    pub fn empty() -> Self {
        App {
            world: World::new(),
            schedules: HashMap::new(),
            executors: Executors::new_default(),
            main_order: MainScheduleOrder::default(),
            extract_order: ScheduleOrder::default(),
            exit_order: ScheduleOrder::default(),
            sub_apps: HashMap::new(),
            plugin_registry: Vec::new(),
            plugin_names: HashSet::new(),
            runner: None,
            ran_startup: false,
            exit_cursor: 0,
            built: false,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    // -- plugins -----------------------------------------------------

    pub fn add_plugin<T: Plugin>(&mut self, plugin: T) -> &mut Self {
        self.add_boxed_plugin(Box::new(plugin));
        self
    }

    pub(crate) fn add_boxed_plugin(&mut self, plugin: Box<dyn Plugin>) -> &mut Self {
        let name = plugin.name().to_string();
        if plugin.is_unique() && self.plugin_names.contains(&name) {
            panic!("plugin {name} was already added");
        }
        log::debug!("added plugin: {name}");
        plugin.build(self);
        self.plugin_names.insert(name);
        self.plugin_registry.push(plugin);
        self
    }

    pub fn add_plugins<T: PluginGroup>(&mut self, group: T) -> &mut Self {
        group.build().finish(self);
        self
    }

    pub fn is_plugin_added<T: Plugin>(&self) -> bool {
        self.plugin_names.contains(std::any::type_name::<T>())
    }

    // -- schedules -----------------------------------------------------

    fn schedule_mut(&mut self, label: impl ScheduleLabel + Clone + 'static) -> &mut Schedule {
        let interned = label.intern();
        self.schedules.entry(interned).or_insert_with(|| Schedule::new(label))
    }

    pub fn add_systems(&mut self, schedule: impl ScheduleLabel + Clone + 'static, config: SetConfig) -> &mut Self {
        self.schedule_mut(schedule).add_systems(config);
        self
    }

    pub fn configure_sets(&mut self, schedule: impl ScheduleLabel + Clone + 'static, config: SetConfig) -> &mut Self {
        self.schedule_mut(schedule).configure_sets(config);
        self
    }

    pub fn main_schedule_order(
        &mut self,
        left: impl ScheduleLabel + Clone + 'static,
        right: Option<impl ScheduleLabel>,
    ) -> &mut Self {
        self.main_order.labels.insert(left, right);
        self
    }

    pub fn extract_schedule_order(
        &mut self,
        left: impl ScheduleLabel + Clone + 'static,
        right: Option<impl ScheduleLabel>,
    ) -> &mut Self {
        self.extract_order.insert(left, right);
        self
    }

    pub fn exit_schedule_order(
        &mut self,
        left: impl ScheduleLabel + Clone + 'static,
        right: Option<impl ScheduleLabel>,
    ) -> &mut Self {
        self.exit_order.insert(left, right);
        self
    }

    // -- resources -----------------------------------------------------

    pub fn insert_resource<T: Resource>(&mut self, value: T) -> &mut Self {
        self.world.insert_resource(value);
        self
    }

    pub fn init_resource<T: Resource + FromWorld>(&mut self) -> &mut Self {
        if !self.world.contains_resource::<T>() {
            let value = T::from_world(&mut self.world);
            self.world.insert_resource(value);
        }
        self
    }

    pub fn register_component<C: Component>(&mut self) -> &mut Self {
        // Components in this crate need no separate registration step
        // beyond the world's type-keyed storage; kept for parity with
        // `bevy_app::App::register_component`'s call sites.
        let _ = std::marker::PhantomData::<C>;
        self
    }

    /// Installs `Events<T>` and the system that ages it out at `Last`
    /// (spec §4.8).
    pub fn add_events<T: Send + Sync + 'static>(&mut self) -> &mut Self {
        if !self.world.contains_resource::<Events<T>>() {
            self.world.insert_resource(Events::<T>::default());
            self.add_systems(Last, SetConfig::system(update_events_system::<T>()));
        }
        self
    }

    /// Installs `State<E>`/`NextState<E>` and the transition system at
    /// `StateTransition` (spec §4.9).
    pub fn insert_state<E: Clone + PartialEq + Send + Sync + 'static>(&mut self, initial: E) -> &mut Self {
        self.world.insert_resource(State::new(initial));
        self.world.insert_resource(NextState::<E>::default());
        self.add_systems(
            StateTransition,
            SetConfig::system(transition_system::<E>()).in_set(StateTransitionSet::Transit),
        );
        self.configure_sets(
            StateTransition,
            SetConfig::group(StateTransitionSet::Transit).after(StateTransitionSet::Callback),
        );
        self
    }

    // -- sub-apps -----------------------------------------------------

    pub fn add_sub_app(&mut self, label: impl WorldLabel + Clone + 'static, sub_app: SubApp) -> &mut Self {
        self.sub_apps.insert(label.intern(), sub_app);
        self
    }

    pub fn sub_app(&mut self, label: impl WorldLabel + Clone + 'static) -> &mut SubApp {
        let interned = label.intern();
        match self.sub_apps.get_mut(&interned) {
            Some(app) => app,
            None => panic!("sub-app {interned:?} does not exist"),
        }
    }

    pub fn get_sub_app(&mut self, label: impl WorldLabel + Clone + 'static) -> Option<&mut SubApp> {
        self.sub_apps.get_mut(&label.intern())
    }

    /// Runs `extract_order`'s schedules on the sub-app labeled `label`,
    /// with its world's extract source pointed at `self`'s world so that
    /// any `Extract<P>` parameter reads `self` while the sub-app's own
    /// params write the sub-app's world (spec §4.7, §4.1). Grounded on
    /// `ecs_core::world::World::set_extract_source`, which already
    /// implements the pointer half of this; no closure-based copy
    /// function is needed (see `sub_app.rs`'s module doc comment).
    pub fn extract(&mut self, label: impl WorldLabel + Clone + 'static) {
        let interned = label.intern();
        let Some(sub_app) = self.sub_apps.get_mut(&interned) else { return };

        let source: *const World = &self.world;
        // SAFETY: `sub_app`'s extract schedules run to completion, below,
        // before `self.world` (which outlives this call) goes out of scope.
        unsafe { sub_app.world_mut().set_extract_source(Some(source)) };
        for extract_label in self.extract_order.labels().to_vec() {
            let _ = sub_app.run_schedule_interned(&extract_label);
        }
        // SAFETY: clears the pointer installed above before it could
        // dangle.
        unsafe { sub_app.world_mut().set_extract_source(None) };
    }

    // -- build / run -----------------------------------------------------

    /// Finalizes plugin registration and initializes every registered
    /// system (including sub-apps') against its target world (spec §4.7).
    /// Idempotent once run.
    pub fn build(&mut self) -> &mut Self {
        if self.built {
            return self;
        }

        for plugin in std::mem::take(&mut self.plugin_registry) {
            #[cfg(feature = "trace")]
            let _finish_span = info_span!("plugin finish", plugin = plugin.name()).entered();
            plugin.finish(self);
            self.plugin_registry.push(plugin);
        }
        for plugin in std::mem::take(&mut self.plugin_registry) {
            #[cfg(feature = "trace")]
            let _cleanup_span = info_span!("plugin cleanup", plugin = plugin.name()).entered();
            plugin.cleanup(self);
            self.plugin_registry.push(plugin);
        }

        for schedule in self.schedules.values_mut() {
            let _ = schedule.build(&mut self.world);
        }
        self.built = true;
        self
    }

    fn run_order(&mut self, order: &[InternedScheduleLabel]) -> Result<Vec<(String, RunError)>, RunScheduleError> {
        let mut errors = Vec::new();
        for label in order {
            if let Some(schedule) = self.schedules.get_mut(label) {
                let start = std::time::Instant::now();
                let result = schedule.run(&mut self.world, &self.executors)?;
                let run_time = start.elapsed();
                if let Some(profiler) = self.world.get_resource_mut::<AppProfiler>() {
                    profiler
                        .schedule_profiler(label.clone())
                        .push_time(Duration::ZERO, run_time, Duration::ZERO);
                }
                errors.extend(result);
            }
        }
        Ok(errors)
    }

    /// Runs `main_order`'s startup schedules once, then its main schedules
    /// every call (spec §4.7). Each `Schedule::run` already flushes its own
    /// commands before returning, satisfying "between each schedule, any
    /// pending ... mutations ... are flushed".
    pub fn update(&mut self) -> Result<Vec<(String, RunError)>, RunScheduleError> {
        #[cfg(feature = "trace")]
        let _frame_span = info_span!("frame").entered();

        self.build();
        let update_start = std::time::Instant::now();
        let mut errors = Vec::new();

        if !self.ran_startup {
            let startup = self.main_order.startup_labels.labels().to_vec();
            errors.extend(self.run_order(&startup)?);
            self.ran_startup = true;
        }

        let labels = self.main_order.labels.labels().to_vec();
        errors.extend(self.run_order(&labels)?);

        for sub_app in self.sub_apps.values_mut() {
            errors.extend(sub_app.update()?);
        }

        if let Some(profiler) = self.world.get_resource_mut::<AppProfiler>() {
            profiler.push_time(update_start.elapsed());
        }

        Ok(errors)
    }

    /// Runs `exit_order`'s schedules, then pushes the canonical `AppExit`
    /// (spec §4.7 `App::exit()`).
    pub fn exit(&mut self) -> &mut Self {
        let exit_order = self.exit_order.labels().to_vec();
        let _ = self.run_order(&exit_order);
        self.send_exit(AppExit::Success);
        self
    }

    pub fn send_exit(&mut self, exit: AppExit) {
        self.world.insert_resource_exit_event(exit);
    }

    /// Polls for an unconsumed `AppExit` pushed since the last call (spec
    /// §4.7, §7 "runners poll it between schedule runs"). Returns the
    /// first one seen; advances the cursor past every record seen so far.
    pub fn should_exit(&mut self) -> Option<AppExit> {
        let events = self.world.get_resource::<Events<AppExit>>()?;
        let mut seen = None;
        for exit in events.iter_since(self.exit_cursor) {
            seen.get_or_insert(*exit);
        }
        self.exit_cursor = events.next_id();
        seen
    }

    pub fn set_runner(&mut self, runner: impl AppRunner + 'static) -> &mut Self {
        self.runner = Some(Box::new(runner));
        self
    }

    /// Starts the application: builds it, then delegates the steady-state
    /// drive to the installed `AppRunner` (spec §4.7 `App::run()`), falling
    /// back to a single-shot [`ScheduleRunner`] if none was set.
    pub fn run(&mut self) -> AppExit {
        #[cfg(feature = "trace")]
        let _run_span = info_span!("app run").entered();

        self.build();
        let mut runner = self.runner.take().unwrap_or_else(|| Box::new(ScheduleRunner::default()));
        let exit = loop {
            match runner.step(self) {
                ControlFlow::Continue => continue,
                ControlFlow::Break(exit) => break exit,
            }
        };
        runner.exit(self);
        exit
    }

    /// Runs a single, ad-hoc system once against the app's world and
    /// returns its output (spec §6 `run_system`).
    pub fn run_system<Marker, Out, F>(&mut self, system: F) -> Result<Out, RunError>
    where
        Out: 'static,
        F: IntoSystem<Marker, Out = Out>,
    {
        let mut system: BoxedSystem<Out> = system.into_system(std::any::type_name::<F>());
        system.initialize(&mut self.world);
        let result = system.run(&self.world);
        self.world.apply_commands();
        result
    }
}

// `Events<AppExit>` is always present once `App::new()`/`App::default()`
// has run; `send_exit` is the one write site, kept as a small extension
// trait rather than a public `World` method since `AppExit` is an
// `ecs_app` concept `ecs_core` has no reason to know about.
trait ExitEventsExt {
    fn insert_resource_exit_event(&mut self, exit: AppExit);
}

impl ExitEventsExt for World {
    fn insert_resource_exit_event(&mut self, exit: AppExit) {
        if let Some(events) = self.get_resource_mut::<Events<AppExit>>() {
            events.send(exit);
        } else {
            let mut events = Events::<AppExit>::default();
            events.send(exit);
            self.insert_resource(events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecs_core::system::param::{Commands, Res, ResMut};

    struct Seen(i32);

    #[test]
    fn commands_are_flushed_before_the_next_schedule_runs() {
        struct X(i32);

        let mut app = App::new();
        app.world.insert_resource(Seen(0));

        // `PreUpdate` queues an `X` insertion; by the time `Update` runs,
        // the schedule boundary between them must have flushed it.
        app.add_systems(
            crate::main_schedule::PreUpdate,
            SetConfig::system((|cmd: Commands| cmd.insert_resource(X(42))).into_system("insert_x")),
        );
        app.add_systems(
            crate::main_schedule::Update,
            SetConfig::system(
                (|x: Res<X>, mut seen: ResMut<Seen>| seen.get_mut().0 = x.get().0).into_system("read_x"),
            ),
        );

        app.update().unwrap();
        assert_eq!(app.world().get_resource::<Seen>().unwrap().0, 42);
    }

    #[test]
    fn run_system_executes_immediately_and_applies_commands() {
        let mut app = App::new();
        app.world.insert_resource(0i32);
        let entity = app
            .run_system(|cmd: Commands| {
                let e = cmd.spawn().id();
                e
            })
            .unwrap();
        assert!(!app.world().is_alive(entity));
        app.world_mut().apply_commands();
        assert!(app.world().is_alive(entity));
    }

    #[test]
    fn exit_is_observed_once_by_should_exit() {
        let mut app = App::new();
        assert!(app.should_exit().is_none());
        app.send_exit(AppExit::Success);
        assert_eq!(app.should_exit(), Some(AppExit::Success));
        assert!(app.should_exit().is_none());
    }
}
