//! Systems: type-erased runnables built from ordinary functions whose
//! parameters are all valid [`SystemParam`](param::SystemParam)s.

pub mod commands;
pub mod function_system;
pub mod param;
pub mod query_param;

use std::any::TypeId;

use crate::access::AccessSet;
use crate::error::RunError;
use crate::label::InternedExecutorLabel;
use crate::world::World;

/// Per-system cache of its access set and initialization state (spec §3).
#[derive(Debug, Clone, Default)]
pub struct SystemMeta {
    pub(crate) name: String,
    pub(crate) access: AccessSet,
    pub(crate) executor: Option<InternedExecutorLabel>,
    initialized: bool,
}

impl SystemMeta {
    pub fn new(name: impl Into<String>) -> Self {
        SystemMeta { name: name.into(), ..Default::default() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> &AccessSet {
        &self.access
    }

    pub fn access_mut(&mut self) -> &mut AccessSet {
        &mut self.access
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_executor(&mut self, label: InternedExecutorLabel) {
        self.executor = Some(label);
    }

    pub fn executor(&self) -> Option<&InternedExecutorLabel> {
        self.executor.as_ref()
    }
}

/// A type-erased runnable: `init`, `run`, `meta`, `clone` (spec §4.2). The
/// scheduler never sees the concrete function or its parameter types.
pub trait System: Send + Sync {
    /// Output type, used by run-conditions (`System<bool>`) and `run_system`.
    type Out: 'static;

    /// Registers this system's access into its own `SystemMeta` and
    /// materializes per-param state. Idempotent.
    fn initialize(&mut self, world: &mut World);

    /// Re-validates param state and, if all required params resolve,
    /// invokes the underlying function.
    fn run(&mut self, world: &World) -> Result<Self::Out, RunError>;

    fn meta(&self) -> &SystemMeta;

    /// Identifies the concrete state layout; used only to compare re-uses
    /// for equality, never for dispatch.
    fn data_type(&self) -> TypeId;

    fn clone_system(&self) -> BoxedSystem<Self::Out>;
}

pub type BoxedSystem<Out = ()> = Box<dyn System<Out = Out>>;

/// A system returning `bool`: the shape run-conditions must have (spec
/// §4.4 `run_if`, §4.6 "each is a `System<bool>`").
pub type BoxedCondition = BoxedSystem<bool>;
