//! Built-in parameter types and the `SystemParam` contract (spec §4.1).
//!
//! Every `Res`/`ResMut`/`Commands`/`World`/`Local` handle below is a
//! pointer into the world, never an owned copy (spec §9 "Shared resource
//! handles"): there is no borrow-checked lifetime tying the handle to the
//! world it reads, because the scheduler's conflict gate — not the
//! compiler — is what makes holding one sound. Constructing one outside of
//! `SystemParam::get` during system resolution is undefined behavior.

use std::any::TypeId;
use std::ops::{Deref, DerefMut};

use crate::system::commands::Commands as CommandsHandle;
use crate::system::SystemMeta;
use crate::world::{Component, FromWorld, Resource, World};

/// Shared raw pointer wrapper: lets pointer-like handles satisfy the
/// `Send + Sync + 'static` bound every `SystemParam::State` carries.
pub(crate) struct SendPtr<T: ?Sized>(pub(crate) *const T);
unsafe impl<T: ?Sized> Send for SendPtr<T> {}
unsafe impl<T: ?Sized> Sync for SendPtr<T> {}
impl<T: ?Sized> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: ?Sized> Copy for SendPtr<T> {}

pub(crate) struct SendMutPtr<T: ?Sized>(pub(crate) *mut T);
unsafe impl<T: ?Sized> Send for SendMutPtr<T> {}
unsafe impl<T: ?Sized> Sync for SendMutPtr<T> {}
impl<T: ?Sized> Clone for SendMutPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: ?Sized> Copy for SendMutPtr<T> {}

/// Per-parameter-type contract (spec §4.1): a `State`, `init`, `update`,
/// `get`. The descriptor (this trait's impl) carries no state of its own —
/// all of it lives in `Self::State`, owned by the system.
pub trait SystemParam: Sized + 'static {
    type State: Send + Sync + 'static;

    /// Registers this parameter's access into `meta` and materializes its
    /// initial state.
    fn init(world: &mut World, meta: &mut SystemMeta) -> Self::State;

    /// Refreshes cached pointers/handles before a run. Returns `false` if
    /// the parameter cannot currently be produced (e.g. a missing
    /// resource for non-`Option` `Res<T>`).
    fn update(state: &mut Self::State, world: &World, meta: &SystemMeta) -> bool;

    /// Produces the value handed to the system function this run.
    fn get(state: &mut Self::State) -> Self;
}

// ---------------------------------------------------------------------
// Res / ResMut
// ---------------------------------------------------------------------

/// Shared resource handle (spec §4.1).
pub struct Res<T: Resource> {
    ptr: SendPtr<T>,
}

impl<T: Resource> Res<T> {
    pub fn get(&self) -> &T {
        // SAFETY: valid only while the scheduler holds this system's
        // registered read access to `T`.
        unsafe { &*self.ptr.0 }
    }
}

impl<T: Resource> Deref for Res<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T: Resource> SystemParam for Res<T> {
    type State = Option<SendPtr<T>>;

    fn init(_world: &mut World, meta: &mut SystemMeta) -> Self::State {
        meta.access_mut().add_resource_read(TypeId::of::<T>());
        None
    }

    fn update(state: &mut Self::State, world: &World, _meta: &SystemMeta) -> bool {
        // SAFETY: pointer is only read back through `get`, gated by meta's
        // registered resource-read access.
        *state = unsafe { world.get_resource_ptr::<T>() }.map(SendPtr);
        state.is_some()
    }

    fn get(state: &mut Self::State) -> Self {
        Res { ptr: state.expect("Res<T>::get called without a successful update") }
    }
}

/// Exclusive resource handle (spec §4.1).
pub struct ResMut<T: Resource> {
    ptr: SendMutPtr<T>,
}

impl<T: Resource> ResMut<T> {
    pub fn get(&self) -> &T {
        // SAFETY: see `Res::get`.
        unsafe { &*self.ptr.0 }
    }

    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: valid only while the scheduler holds this system's
        // registered write access to `T`.
        unsafe { &mut *self.ptr.0 }
    }
}

impl<T: Resource> Deref for ResMut<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T: Resource> DerefMut for ResMut<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.get_mut()
    }
}

impl<T: Resource> SystemParam for ResMut<T> {
    type State = Option<SendMutPtr<T>>;

    fn init(_world: &mut World, meta: &mut SystemMeta) -> Self::State {
        meta.access_mut().add_resource_write(TypeId::of::<T>());
        None
    }

    fn update(state: &mut Self::State, world: &World, _meta: &SystemMeta) -> bool {
        // SAFETY: see `Res::update`; exclusivity is `meta`'s registered write.
        *state = unsafe { world.get_resource_mut_ptr::<T>() }.map(SendMutPtr);
        state.is_some()
    }

    fn get(state: &mut Self::State) -> Self {
        ResMut { ptr: state.expect("ResMut<T>::get called without a successful update") }
    }
}

/// `Option<P>` is always valid; absence is reported via `None` rather than
/// failing `update` (spec §4.1).
impl<P: SystemParam> SystemParam for Option<P> {
    type State = (P::State, bool);

    fn init(world: &mut World, meta: &mut SystemMeta) -> Self::State {
        (P::init(world, meta), false)
    }

    fn update(state: &mut Self::State, world: &World, meta: &SystemMeta) -> bool {
        state.1 = P::update(&mut state.0, world, meta);
        true
    }

    fn get(state: &mut Self::State) -> Self {
        state.1.then(|| P::get(&mut state.0))
    }
}

// ---------------------------------------------------------------------
// Local<T>
// ---------------------------------------------------------------------

/// Per-system private value, created once at `initialize` and stable
/// across runs (spec §4.1, §3 "System per-param state"). Like the other
/// param handles, carries no real borrow-checked lifetime — see the
/// module doc comment.
pub struct Local<T: Send + Sync + 'static> {
    ptr: SendMutPtr<T>,
}

impl<T: Send + Sync + 'static> Deref for Local<T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: `Local<T>` is owned by exactly one system; no other
        // handle to this state exists (spec §5 "`Local<T>` is owned by a
        // single system; no synchronization needed").
        unsafe { &*self.ptr.0 }
    }
}

impl<T: Send + Sync + 'static> DerefMut for Local<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see `Deref` impl above.
        unsafe { &mut *self.ptr.0 }
    }
}

impl<T: FromWorld + Send + Sync + 'static> SystemParam for Local<T> {
    type State = T;

    fn init(world: &mut World, _meta: &mut SystemMeta) -> Self::State {
        // Open Question decision (DESIGN.md #1): eager init at `initialize`.
        T::from_world(world)
    }

    fn update(_state: &mut Self::State, _world: &World, _meta: &SystemMeta) -> bool {
        true
    }

    fn get(state: &mut Self::State) -> Self {
        Local { ptr: SendMutPtr(state as *mut T) }
    }
}

// ---------------------------------------------------------------------
// World (escape hatch)
// ---------------------------------------------------------------------

/// Full, untyped world handle; registers `reads_all = writes_all = true`
/// (spec §4.1).
pub struct WorldParam {
    ptr: SendMutPtr<World>,
}

impl Deref for WorldParam {
    type Target = World;
    fn deref(&self) -> &World {
        // SAFETY: a system taking `WorldParam` registers `writes_all`,
        // which the conflict gate treats as exclusive of everything else.
        unsafe { &*self.ptr.0 }
    }
}

impl DerefMut for WorldParam {
    fn deref_mut(&mut self) -> &mut World {
        // SAFETY: see `Deref` impl above.
        unsafe { &mut *self.ptr.0 }
    }
}

impl SystemParam for WorldParam {
    type State = SendMutPtr<World>;

    fn init(world: &mut World, meta: &mut SystemMeta) -> Self::State {
        meta.access_mut().reads_all = true;
        meta.access_mut().writes_all = true;
        SendMutPtr(world as *mut World)
    }

    fn update(_state: &mut Self::State, _world: &World, _meta: &SystemMeta) -> bool {
        true
    }

    fn get(state: &mut Self::State) -> Self {
        WorldParam { ptr: *state }
    }
}

// ---------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------

impl SystemParam for CommandsHandle {
    type State = SendPtr<World>;

    fn init(world: &mut World, meta: &mut SystemMeta) -> Self::State {
        meta.access_mut().commands = true;
        SendPtr(world as *const World)
    }

    fn update(_state: &mut Self::State, _world: &World, _meta: &SystemMeta) -> bool {
        true
    }

    fn get(state: &mut Self::State) -> Self {
        // SAFETY: the pointer was captured from the world this system was
        // initialized against, which outlives the system (spec §3 System
        // lifecycle).
        unsafe { CommandsHandle::new(&*state.0) }
    }
}

// ---------------------------------------------------------------------
// Extract<P>
// ---------------------------------------------------------------------

/// Cross-world adapter: initializes/updates `P` against the "extract
/// source" world exposed by `World::extract_source` instead of the world
/// the owning system runs against (spec §4.1, §4.7).
pub struct Extract<P: SystemParam> {
    inner: P,
}

impl<P: SystemParam> Deref for Extract<P> {
    type Target = P;
    fn deref(&self) -> &P {
        &self.inner
    }
}

impl<P: SystemParam> SystemParam for Extract<P> {
    type State = P::State;

    fn init(_world: &mut World, meta: &mut SystemMeta) -> Self::State {
        // Access is registered against a scratch world: `P::init`'s access
        // bookkeeping only needs type information, not real data, and the
        // extract source itself is not known until `App::extract` runs.
        let mut scratch = World::new();
        P::init(&mut scratch, meta)
    }

    fn update(state: &mut Self::State, world: &World, meta: &SystemMeta) -> bool {
        match world.extract_source() {
            Some(source) => P::update(state, source, meta),
            None => false,
        }
    }

    fn get(state: &mut Self::State) -> Self {
        Extract { inner: P::get(state) }
    }
}

// ---------------------------------------------------------------------
// FromParam: user-defined composite params (spec §4.1)
// ---------------------------------------------------------------------

/// A type is a `FromParam` if it can be constructed from a tuple of child
/// params each run, returning `None` when those children are individually
/// ready but still don't add up to a valid `Self` (spec §4.1: a `FromParam`
/// "has a static `from_param(args…) → T | Option<T>`"). The blanket
/// `SystemParam` impl below composes the children's state, probes
/// constructibility during `update`, and caches the result for `get`.
pub trait FromParam: Sized + 'static {
    type Param: SystemParam;

    fn from_param(param: Self::Param) -> Option<Self>;
}

/// State for the blanket `SystemParam for F: FromParam` impl: the child
/// param's own state, plus a slot for the value `update` constructs so
/// `get` doesn't have to (and can't fallibly) build it again.
pub struct FromParamState<F: FromParam> {
    inner: <F::Param as SystemParam>::State,
    built: Option<F>,
}

impl<F: FromParam> SystemParam for F {
    type State = FromParamState<F>;

    fn init(world: &mut World, meta: &mut SystemMeta) -> Self::State {
        FromParamState { inner: F::Param::init(world, meta), built: None }
    }

    fn update(state: &mut Self::State, world: &World, meta: &SystemMeta) -> bool {
        if !F::Param::update(&mut state.inner, world, meta) {
            state.built = None;
            return false;
        }
        state.built = F::from_param(F::Param::get(&mut state.inner));
        state.built.is_some()
    }

    fn get(state: &mut Self::State) -> Self {
        state.built.take().expect("FromParam::get called without a prior successful update")
    }
}

macro_rules! impl_system_param_tuple {
    ($($param: ident),*) => {
        #[allow(non_snake_case, unused_variables, clippy::unused_unit)]
        impl<$($param: SystemParam),*> SystemParam for ($($param,)*) {
            type State = ($($param::State,)*);

            fn init(_world: &mut World, _meta: &mut SystemMeta) -> Self::State {
                ($($param::init(_world, _meta),)*)
            }

            fn update(_state: &mut Self::State, _world: &World, _meta: &SystemMeta) -> bool {
                let ($($param,)*) = _state;
                let mut all_ready = true;
                $(all_ready &= $param::update($param, _world, _meta);)*
                all_ready
            }

            fn get(_state: &mut Self::State) -> Self {
                let ($($param,)*) = _state;
                ($($param::get($param),)*)
            }
        }
    };
}

variadics_please::all_tuples!(impl_system_param_tuple, 0, 16, P);

#[cfg(test)]
mod tests {
    use super::*;

    struct Score(u32);

    #[test]
    fn res_update_fails_when_resource_absent() {
        let mut world = World::new();
        let mut meta = SystemMeta::new("sys");
        let mut state = Res::<Score>::init(&mut world, &mut meta);
        assert!(!Res::<Score>::update(&mut state, &world, &meta));

        world.insert_resource(Score(7));
        assert!(Res::<Score>::update(&mut state, &world, &meta));
        assert_eq!(Res::<Score>::get(&mut state).get().0, 7);
    }

    #[test]
    fn option_res_is_always_ready() {
        let mut world = World::new();
        let mut meta = SystemMeta::new("sys");
        let mut state = <Option<Res<Score>>>::init(&mut world, &mut meta);
        assert!(<Option<Res<Score>>>::update(&mut state, &world, &meta));
        assert!(<Option<Res<Score>>>::get(&mut state).is_none());
    }

    #[test]
    fn resmut_allows_mutation_observed_next_run() {
        let mut world = World::new();
        world.insert_resource(Score(0));
        let mut meta = SystemMeta::new("sys");
        let mut state = ResMut::<Score>::init(&mut world, &mut meta);

        assert!(ResMut::<Score>::update(&mut state, &world, &meta));
        ResMut::<Score>::get(&mut state).get_mut().0 = 9;
        assert_eq!(world.get_resource::<Score>().unwrap().0, 9);
    }

    #[test]
    fn tuple_param_requires_every_member_ready() {
        let mut world = World::new();
        let mut meta = SystemMeta::new("sys");
        let mut state = <(Res<Score>,)>::init(&mut world, &mut meta);
        assert!(!<(Res<Score>,)>::update(&mut state, &world, &meta));
        world.insert_resource(Score(1));
        assert!(<(Res<Score>,)>::update(&mut state, &world, &meta));
    }

    struct EvenScore(u32);

    impl FromParam for EvenScore {
        type Param = Res<Score>;

        fn from_param(score: Self::Param) -> Option<Self> {
            (score.get().0 % 2 == 0).then(|| EvenScore(score.get().0))
        }
    }

    #[test]
    fn from_param_can_refuse_to_construct_even_when_its_child_param_is_ready() {
        let mut world = World::new();
        world.insert_resource(Score(3));
        let mut meta = SystemMeta::new("sys");
        let mut state = EvenScore::init(&mut world, &mut meta);

        // `Res<Score>` is ready, but an odd score means `from_param` itself
        // refuses to build an `EvenScore`.
        assert!(!EvenScore::update(&mut state, &world, &meta));

        world.get_resource_mut::<Score>().unwrap().0 = 4;
        assert!(EvenScore::update(&mut state, &world, &meta));
        assert_eq!(EvenScore::get(&mut state).0, 4);
    }
}
