//! Paired `State<E>` / `NextState<E>` resources and the `OnEnter`/`OnExit`/
//! `OnChange` run-condition sugar (spec §4.9).
//!
//! Wiring these into an app (inserting the resources, installing
//! [`transition_system`] at `StateTransitionSet::Transit`) is
//! `App::insert_state`'s job; this module only owns the data and the
//! condition logic, grounded directly on spec §4.9's description.

use crate::schedule::set::SetConfig;
use crate::system::function_system::IntoSystem;
use crate::system::param::{Res, ResMut};
use crate::system::BoxedSystem;

/// Sub-sets every state transition's generated systems are ordered within
/// (spec §4.9): `Callback` (the user's `OnEnter`/`OnExit`/`OnChange`
/// systems) runs before `Transit` (the `NextState` -> `State` copy).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StateTransitionSet {
    Callback,
    Transit,
}

/// Current value of state `E`, plus whether it has never transitioned
/// (spec §4.9 "just created"): lets `OnEnter(initial_value)` fire once at
/// startup, before any real transition has happened.
pub struct State<E> {
    value: E,
    just_created: bool,
}

impl<E: Clone + PartialEq + Send + Sync + 'static> State<E> {
    pub fn new(value: E) -> Self {
        State { value, just_created: true }
    }

    pub fn get(&self) -> &E {
        &self.value
    }

    fn entering(&self, next: &NextState<E>, target: &E) -> bool {
        (self.value == *target && self.just_created) || (&self.value != target && next.pending() == Some(target))
    }

    fn exiting(&self, next: &NextState<E>, target: &E) -> bool {
        &self.value == target && next.pending().is_some_and(|p| p != target)
    }

    fn changing_to(&self, next: &NextState<E>, target: &E) -> bool {
        next.pending() == Some(target) && &self.value != target
    }
}

/// Pending transition target for state `E` (spec §4.9). `set` overwrites
/// any earlier, not-yet-applied target.
pub struct NextState<E> {
    pending: Option<E>,
}

impl<E> NextState<E> {
    pub fn set(&mut self, value: E) {
        self.pending = Some(value);
    }

    pub fn pending(&self) -> Option<&E> {
        self.pending.as_ref()
    }
}

impl<E> Default for NextState<E> {
    fn default() -> Self {
        NextState { pending: None }
    }
}

/// The system `App::insert_state` installs at `StateTransitionSet::Transit`:
/// copies a pending `NextState<E>` into `State<E>` (spec §4.9 "copies
/// `NextState` into `State`").
pub fn transition_system<E: Clone + PartialEq + Send + Sync + 'static>() -> BoxedSystem<()> {
    (move |mut state: ResMut<State<E>>, mut next: ResMut<NextState<E>>| {
        let Some(target) = next.get_mut().pending.take() else { return };
        let current = state.get_mut();
        if target != current.value || current.just_created {
            current.value = target;
            current.just_created = false;
        }
    })
    .into_system("state_transition")
}

/// Wraps `system` to run only while transitioning *into* `target`, including
/// the initial frame (spec §4.9 `OnEnter`). Adds `in_set(Callback)`; ordering
/// it before `Transit` is `insert_state`'s responsibility so the guard still
/// observes the pre-swap `State`/`NextState` pair.
pub fn on_enter<E>(target: E, system: BoxedSystem<()>) -> SetConfig
where
    E: Clone + PartialEq + Send + Sync + 'static,
{
    let guard_target = target;
    let condition = (move |state: Res<State<E>>, next: Res<NextState<E>>| {
        state.entering(&next, &guard_target)
    })
    .into_system("on_enter_guard");
    SetConfig::system(system).run_if(condition).in_set(StateTransitionSet::Callback)
}

/// Wraps `system` to run only while transitioning *out of* `target` (spec
/// §4.9 `OnExit`).
pub fn on_exit<E>(target: E, system: BoxedSystem<()>) -> SetConfig
where
    E: Clone + PartialEq + Send + Sync + 'static,
{
    let guard_target = target;
    let condition = (move |state: Res<State<E>>, next: Res<NextState<E>>| {
        state.exiting(&next, &guard_target)
    })
    .into_system("on_exit_guard");
    SetConfig::system(system).run_if(condition).in_set(StateTransitionSet::Callback)
}

/// Wraps `system` to run whenever the pending transition's target is
/// `target` and differs from the current value (spec §4.9 `OnChange`).
/// Unlike `on_enter`, does not also fire on the state's initial value.
pub fn on_change<E>(target: E, system: BoxedSystem<()>) -> SetConfig
where
    E: Clone + PartialEq + Send + Sync + 'static,
{
    let guard_target = target;
    let condition = (move |state: Res<State<E>>, next: Res<NextState<E>>| {
        state.changing_to(&next, &guard_target)
    })
    .into_system("on_change_guard");
    SetConfig::system(system).run_if(condition).in_set(StateTransitionSet::Callback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::System;
    use crate::world::World;

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    enum Phase {
        Off,
        On,
    }

    #[test]
    fn transition_system_applies_pending_and_clears_it() {
        let mut world = World::new();
        world.insert_resource(State::new(Phase::Off));
        world.insert_resource(NextState::<Phase>::default());
        world.get_resource_mut::<NextState<Phase>>().unwrap().set(Phase::On);

        let mut system = transition_system::<Phase>();
        system.initialize(&mut world);
        system.run(&world).unwrap();

        assert_eq!(*world.get_resource::<State<Phase>>().unwrap().get(), Phase::On);
        assert!(world.get_resource::<NextState<Phase>>().unwrap().pending().is_none());
    }

    #[test]
    fn on_enter_guard_fires_once_then_stops() {
        let mut world = World::new();
        world.insert_resource(State::new(Phase::Off));
        world.insert_resource(NextState::<Phase>::default());
        world.insert_resource(0u32);

        let hits = (|mut c: ResMut<u32>| *c.get_mut() += 1).into_system("hits");
        let config = on_enter(Phase::On, hits);
        // Pull the guarded system and condition back out of the `SetConfig`
        // to drive them directly without a full schedule build.
        let mut node = config.node;
        for condition in &mut node.run_conditions {
            condition.initialize(&mut world);
        }
        node.system.as_mut().unwrap().initialize(&mut world);

        // Not yet transitioning into On: guard is false.
        assert!(!node.run_conditions[0].run(&world).unwrap());

        world.get_resource_mut::<NextState<Phase>>().unwrap().set(Phase::On);
        assert!(node.run_conditions[0].run(&world).unwrap());
    }

    #[test]
    fn on_enter_guard_fires_at_startup_with_no_explicit_next_state_set() {
        // Mirrors `App::insert_state`: only `State::new` and a default,
        // untouched `NextState` are inserted, as at app startup.
        let mut world = World::new();
        world.insert_resource(State::new(Phase::Off));
        world.insert_resource(NextState::<Phase>::default());

        let hits = (|mut c: ResMut<u32>| *c.get_mut() += 1).into_system("hits");
        world.insert_resource(0u32);
        let config = on_enter(Phase::Off, hits);
        let mut node = config.node;
        for condition in &mut node.run_conditions {
            condition.initialize(&mut world);
        }

        assert!(node.run_conditions[0].run(&world).unwrap());
    }
}
