//! `Schedule`: a label, the set of registered nodes, and the cached graph
//! built from them (spec §3, §4.4).

#[cfg(feature = "trace")]
use tracing::info_span;

use crate::error::{BuildError, RunScheduleError};
use crate::executors::Executors;
use crate::label::InternedScheduleLabel;
use crate::world::World;

use super::graph::{self, Graph};
use super::runner;
use super::set::SetConfig;

/// Per-schedule knobs distinct from the graph itself.
#[derive(Debug, Clone, Default)]
pub struct ScheduleBuildSettings {
    /// After a successful `run`, subsequent `run` calls are no-ops (spec §3
    /// "Schedule ... run_once").
    pub run_once: bool,
}

/// A named, buildable, runnable collection of systems and sets.
pub struct Schedule {
    label: InternedScheduleLabel,
    /// Committed nodes from the last successful `build`.
    committed: Vec<super::set::SetNode>,
    /// Structural mutations queued by `add_systems`/`configure_sets` since
    /// the last `build` (spec §4.4 step 1, "apply pending mutation
    /// commands to the schedule's set map").
    pending: Vec<SetConfig>,
    graph: Option<Graph>,
    pub config: ScheduleBuildSettings,
    has_run: bool,
}

impl Schedule {
    pub fn new(label: impl crate::label::ScheduleLabel + Clone + 'static) -> Self {
        Schedule {
            label: label.intern(),
            committed: Vec::new(),
            pending: Vec::new(),
            graph: None,
            config: ScheduleBuildSettings::default(),
            has_run: false,
        }
    }

    pub fn label(&self) -> &InternedScheduleLabel {
        &self.label
    }

    /// Queues a system or set config for inclusion on the next `build`.
    pub fn add_systems(&mut self, config: SetConfig) -> &mut Self {
        self.pending.push(config);
        self
    }

    /// Alias for `add_systems`: pure `SetConfig::group` configs read the
    /// same either way, this just documents intent at the call site.
    pub fn configure_sets(&mut self, config: SetConfig) -> &mut Self {
        self.pending.push(config);
        self
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty() || self.graph.is_none()
    }

    /// Merges pending mutations into the committed node list, initializes
    /// every system and run-condition against `world`, and rebuilds the
    /// graph (spec §4.4). Idempotent when nothing is pending.
    pub fn build(&mut self, world: &mut World) -> Result<(), BuildError> {
        if !self.is_dirty() {
            return Ok(());
        }

        if let Some(graph) = self.graph.take() {
            self.committed = graph.nodes;
        }

        for config in self.pending.drain(..) {
            self.committed.push(config.node);
        }

        for node in &mut self.committed {
            if let Some(system) = node.system.as_mut() {
                system.initialize(world);
            }
            for condition in &mut node.run_conditions {
                condition.initialize(world);
            }
        }

        let nodes = std::mem::take(&mut self.committed);
        let graph = graph::build(nodes)?;
        self.graph = Some(graph);
        Ok(())
    }

    /// Runs the built graph once against `world`, applying queued commands
    /// afterward (spec §4.5). Returns the per-system errors collected along
    /// the way; building is attempted first if the schedule is dirty.
    pub fn run(
        &mut self,
        world: &mut World,
        executors: &Executors,
    ) -> Result<Vec<(String, crate::error::RunError)>, RunScheduleError> {
        #[cfg(feature = "trace")]
        let _run_span = info_span!("schedule run", schedule = ?self.label).entered();

        if self.config.run_once && self.has_run {
            return Ok(Vec::new());
        }

        if self.is_dirty() {
            self.build(world).map_err(|_| RunScheduleError::worlds_not_set())?;
        }

        let graph = self.graph.as_mut().ok_or_else(RunScheduleError::worlds_not_set)?;
        let errors = runner::run(graph, world, executors)?;
        world.apply_commands();
        self.has_run = true;
        Ok(errors)
    }

    /// Hands the committed nodes back after a run, e.g. for introspection;
    /// mirrors the pattern `build` uses to take them before rebuilding.
    pub fn nodes(&self) -> &[super::set::SetNode] {
        self.graph.as_ref().map(|g| g.nodes.as_slice()).unwrap_or(&self.committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::function_system::IntoSystem;

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    struct MySchedule;

    struct Counter(u32);

    #[test]
    fn check_schedule_and_executors_traits() {
        static_assertions::assert_impl_all!(Schedule: Send, Sync);
        static_assertions::assert_impl_all!(Executors: Send, Sync);
    }

    #[test]
    fn schedule_runs_added_system_and_applies_commands() {
        let mut world = World::new();
        world.insert_resource(Counter(0));
        let mut schedule = Schedule::new(MySchedule);

        let system = (|mut c: crate::system::param::ResMut<Counter>| {
            c.get_mut().0 += 1;
        })
        .into_system("increment");

        schedule.add_systems(SetConfig::system(system));
        let errors = schedule.run(&mut world, &Executors::new_default()).unwrap();
        assert!(errors.is_empty());
        assert_eq!(world.get_resource::<Counter>().unwrap().0, 1);
    }

    #[test]
    fn rebuilding_after_a_run_keeps_previously_committed_systems() {
        let mut world = World::new();
        world.insert_resource(Counter(0));
        let mut schedule = Schedule::new(MySchedule);

        let first = (|mut c: crate::system::param::ResMut<Counter>| {
            c.get_mut().0 += 1;
        })
        .into_system("first");
        schedule.add_systems(SetConfig::system(first));

        let executors = Executors::new_default();
        schedule.run(&mut world, &executors).unwrap();
        assert_eq!(world.get_resource::<Counter>().unwrap().0, 1);

        let second = (|mut c: crate::system::param::ResMut<Counter>| {
            c.get_mut().0 += 10;
        })
        .into_system("second");
        schedule.add_systems(SetConfig::system(second));

        schedule.run(&mut world, &executors).unwrap();
        // Both `first` and `second` must have run on this second pass: if
        // rebuilding dropped the previously-committed node, this would be 11
        // instead of 12.
        assert_eq!(world.get_resource::<Counter>().unwrap().0, 12);
    }

    #[test]
    fn run_once_schedule_only_executes_a_single_time() {
        let mut world = World::new();
        world.insert_resource(Counter(0));
        let mut schedule = Schedule::new(MySchedule);
        schedule.config.run_once = true;

        let system = (|mut c: crate::system::param::ResMut<Counter>| {
            c.get_mut().0 += 1;
        })
        .into_system("increment");
        schedule.add_systems(SetConfig::system(system));

        let executors = Executors::new_default();
        schedule.run(&mut world, &executors).unwrap();
        schedule.run(&mut world, &executors).unwrap();
        assert_eq!(world.get_resource::<Counter>().unwrap().0, 1);
    }
}
