//! Error taxonomy (spec §6 "Error kinds", §7 "Error Handling Design").
//!
//! Individual system failures never abort a schedule run; they are
//! collected and returned alongside the run's otherwise-successful result.
//! Only structural/build errors and a poisoned world lock are fatal.

use std::any::TypeId;

use thiserror::Error;

use crate::label::InternedExecutorLabel;

/// The result of running a single [`System`](crate::system::System).
#[derive(Debug, Error)]
pub enum RunError {
    #[error("system was run before `initialize` was called")]
    NotInitialized,

    #[error("parameter state could not be updated for types: {0:?}")]
    UpdateStateFailed(Vec<TypeId>),

    #[error("system panicked: {0}")]
    Panicked(String),

    #[error("no executor registered for label {0:?}")]
    MissingExecutor(InternedExecutorLabel),
}

/// Why a schedule failed to fully run, per spec §6's `RunScheduleError`.
#[derive(Debug, Error)]
pub enum RunScheduleErrorKind {
    #[error("{0} node(s) remained unresolved or part of an ordering cycle")]
    SetsRemaining(usize),

    #[error("schedule was run without a world set")]
    WorldsNotSet,
}

#[derive(Debug, Error)]
#[error("schedule run failed: {kind}")]
pub struct RunScheduleError {
    pub kind: RunScheduleErrorKind,
}

impl RunScheduleError {
    pub fn sets_remaining(count: usize) -> Self {
        Self { kind: RunScheduleErrorKind::SetsRemaining(count) }
    }

    pub fn worlds_not_set() -> Self {
        Self { kind: RunScheduleErrorKind::WorldsNotSet }
    }
}

/// Configuration-time errors surfaced during [`Schedule::build`](crate::schedule::Schedule::build).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("ordering edge referenced unknown label, dropped pending later registration")]
    UnknownLabel,

    #[error("ordering graph contains a cycle among {0} node(s)")]
    Cycle(usize),
}
