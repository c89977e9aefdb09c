//! `SystemSet` / `SetConfig`: grouping nodes with ordering edges and
//! run-conditions (spec §3, §4.4).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::label::{InternedExecutorLabel, InternedSystemSetLabel, SystemSetLabel};
use crate::system::{BoxedCondition, BoxedSystem};

/// Auto-generated label for a system added without an explicit set label
/// (e.g. a bare `add_systems(Update, my_system)`); every system is a node
/// in the schedule graph, labeled or not (spec §3 "SystemSet ... optional
/// backing System").
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct AnonSetLabel(u64);

impl AnonSetLabel {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        AnonSetLabel(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A grouping node: a label, an optional backing system, membership and
/// ordering edges, and run-conditions (spec §3).
pub struct SetNode {
    pub label: InternedSystemSetLabel,
    pub system: Option<BoxedSystem<()>>,
    pub in_sets: Vec<InternedSystemSetLabel>,
    pub depends_on: Vec<InternedSystemSetLabel>,
    pub precedes: Vec<InternedSystemSetLabel>,
    pub run_conditions: Vec<BoxedCondition>,
    pub executor: Option<InternedExecutorLabel>,
    pub name: Option<String>,
}

impl SetNode {
    pub fn group(label: impl SystemSetLabel + Clone + 'static) -> Self {
        SetNode {
            label: label.intern(),
            system: None,
            in_sets: Vec::new(),
            depends_on: Vec::new(),
            precedes: Vec::new(),
            run_conditions: Vec::new(),
            executor: None,
            name: None,
        }
    }

    pub fn leaf(system: BoxedSystem<()>) -> Self {
        SetNode {
            label: AnonSetLabel::next().intern(),
            system: Some(system),
            in_sets: Vec::new(),
            depends_on: Vec::new(),
            precedes: Vec::new(),
            run_conditions: Vec::new(),
            executor: None,
            name: None,
        }
    }
}

/// Builder accumulated by `App::add_systems`/`configure_sets` and drained
/// into the schedule's set map at `build()` (spec §4.4).
pub struct SetConfig {
    pub(crate) node: SetNode,
}

impl SetConfig {
    pub fn group(label: impl SystemSetLabel + Clone + 'static) -> Self {
        SetConfig { node: SetNode::group(label) }
    }

    pub fn system(system: BoxedSystem<()>) -> Self {
        SetConfig { node: SetNode::leaf(system) }
    }

    pub fn after(mut self, label: impl SystemSetLabel + Clone + 'static) -> Self {
        self.node.depends_on.push(label.intern());
        self
    }

    pub fn before(mut self, label: impl SystemSetLabel + Clone + 'static) -> Self {
        self.node.precedes.push(label.intern());
        self
    }

    pub fn in_set(mut self, label: impl SystemSetLabel + Clone + 'static) -> Self {
        self.node.in_sets.push(label.intern());
        self
    }

    pub fn run_if(mut self, condition: BoxedCondition) -> Self {
        self.node.run_conditions.push(condition);
        self
    }

    pub fn set_executor(mut self, label: impl crate::label::ExecutorLabel + Clone + 'static) -> Self {
        self.node.executor = Some(label.intern());
        self
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.node.name = Some(name.into());
        self
    }

    pub fn label(&self) -> InternedSystemSetLabel {
        self.node.label.clone()
    }
}

/// Sugar: links consecutive configs with `after` edges (spec §4.4
/// `chain()`, "producing `after` edges between successive siblings").
pub fn chain(configs: Vec<SetConfig>) -> Vec<SetConfig> {
    let mut out = Vec::with_capacity(configs.len());
    let mut previous: Option<InternedSystemSetLabel> = None;
    for config in configs {
        let label = config.label();
        let config = match previous {
            Some(prev) => config.after(prev),
            None => config,
        };
        previous = Some(label);
        out.push(config);
    }
    out
}
