//! Building a [`System`] from an ordinary function (spec §4.2).
//!
//! Because every built-in parameter in [`param`](super::param) is a
//! pointer-like handle with no borrow-checked lifetime of its own (see that
//! module's doc comment), a system function's parameter list is already
//! `'static` — unlike a reference-based design, no higher-ranked trait
//! bound gymnastics are needed to bridge an elided-lifetime signature to a
//! world-lifetime call; `FnMut(P) -> Out` is the whole bridge.

use std::any::TypeId;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::RunError;
use crate::system::param::SystemParam;
use crate::system::{BoxedSystem, System, SystemMeta};
use crate::world::World;

/// Implemented for any callable whose argument list is a tuple of valid
/// params (spec §4.2 "a single static entry point takes any callable
/// whose argument list passes the valid-param check").
pub trait SystemParamFunction<Marker>: Send + Sync + 'static {
    type Param: SystemParam;
    type Out: 'static;

    fn run(&mut self, param: Self::Param) -> Self::Out;
}

/// Marker type distinguishing the blanket impls below by arity.
pub struct FunctionMarker<P>(PhantomData<fn(P)>);

macro_rules! impl_system_param_function {
    ($($param: ident),*) => {
        #[allow(non_snake_case, unused_variables)]
        impl<Func, Out, $($param: SystemParam),*> SystemParamFunction<FunctionMarker<($($param,)*)>> for Func
        where
            Func: FnMut($($param),*) -> Out + Send + Sync + 'static,
            Out: 'static,
        {
            type Param = ($($param,)*);
            type Out = Out;

            fn run(&mut self, param: Self::Param) -> Out {
                let ($($param,)*) = param;
                self($($param),*)
            }
        }
    };
}

variadics_please::all_tuples!(impl_system_param_function, 0, 16, P);

/// A [`System`] built from a user function and its parameter descriptors.
pub struct FunctionSystem<Marker, F: SystemParamFunction<Marker>> {
    func: F,
    state: Option<<F::Param as SystemParam>::State>,
    meta: SystemMeta,
    _marker: PhantomData<fn() -> Marker>,
}

impl<Marker, F> FunctionSystem<Marker, F>
where
    Marker: Send + Sync + 'static,
    F: SystemParamFunction<Marker> + Clone,
{
    pub fn new(func: F, name: impl Into<String>) -> Self {
        FunctionSystem { func, state: None, meta: SystemMeta::new(name), _marker: PhantomData }
    }
}

impl<Marker, F> System for FunctionSystem<Marker, F>
where
    Marker: Send + Sync + 'static,
    F: SystemParamFunction<Marker> + Clone,
{
    type Out = F::Out;

    fn initialize(&mut self, world: &mut World) {
        if self.state.is_none() {
            self.state = Some(F::Param::init(world, &mut self.meta));
        }
    }

    fn run(&mut self, world: &World) -> Result<Self::Out, RunError> {
        let meta = &self.meta;
        let state = self.state.as_mut().ok_or(RunError::NotInitialized)?;
        if !F::Param::update(state, world, meta) {
            return Err(RunError::UpdateStateFailed(vec![TypeId::of::<F::Param>()]));
        }
        let param = F::Param::get(state);
        let func = &mut self.func;
        catch_unwind(AssertUnwindSafe(|| func.run(param))).map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "system panicked with a non-string payload".to_string());
            RunError::Panicked(message)
        })
    }

    fn meta(&self) -> &SystemMeta {
        &self.meta
    }

    fn data_type(&self) -> TypeId {
        TypeId::of::<F>()
    }

    fn clone_system(&self) -> BoxedSystem<Self::Out> {
        Box::new(FunctionSystem {
            func: self.func.clone(),
            state: None,
            meta: SystemMeta::new(self.meta.name().to_string()),
            _marker: PhantomData,
        })
    }
}

/// Converts any valid function into a boxed [`System`] (spec §4.2's "single
/// static entry point").
pub trait IntoSystem<Marker> {
    type Out: 'static;

    fn into_system(self, name: impl Into<String>) -> BoxedSystem<Self::Out>;
}

impl<Marker, F> IntoSystem<Marker> for F
where
    Marker: Send + Sync + 'static,
    F: SystemParamFunction<Marker> + Clone,
{
    type Out = F::Out;

    fn into_system(self, name: impl Into<String>) -> BoxedSystem<Self::Out> {
        Box::new(FunctionSystem::new(self, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::param::{Res, ResMut};

    struct Hits(u32);

    #[test]
    fn zero_arg_system_runs() {
        let mut world = World::new();
        let mut system = (|| {}).into_system("noop");
        system.initialize(&mut world);
        assert!(system.run(&world).is_ok());
    }

    #[test]
    fn system_reads_and_writes_resources() {
        let mut world = World::new();
        world.insert_resource(Hits(0));

        let mut system = (|mut hits: ResMut<Hits>| {
            hits.get_mut().0 += 1;
        })
        .into_system("increment");

        system.initialize(&mut world);
        system.run(&world).unwrap();
        system.run(&world).unwrap();
        assert_eq!(world.get_resource::<Hits>().unwrap().0, 2);
    }

    #[test]
    fn missing_required_resource_fails_update() {
        let mut world = World::new();
        let mut system = (|_hits: Res<Hits>| {}).into_system("reader");
        system.initialize(&mut world);
        assert!(matches!(system.run(&world), Err(RunError::UpdateStateFailed(_))));
    }

    #[test]
    fn panicking_system_is_caught() {
        let mut world = World::new();
        let mut system = (|| panic!("boom")).into_system("panics");
        system.initialize(&mut world);
        assert!(matches!(system.run(&world), Err(RunError::Panicked(_))));
    }
}
