//! `Query<Get<...>, Filter<...>>` (spec §4.1): the component-iteration
//! parameter. `Get` elements (`&C`, `Mut<C>`, `Opt<C>`, `Has<C>`, `Entity`)
//! and filters (`With<C>`, `Without<C>`, `Or<(...)>`) compose into a single
//! `QueryAccess` entry on the owning system's `AccessSet`.

use std::any::TypeId;
use std::marker::PhantomData;

use crate::access::QueryAccess;
use crate::entity::Entity;
use crate::system::param::{SendMutPtr, SystemParam};
use crate::system::SystemMeta;
use crate::world::{Component, World};

/// One element of a `Get<...>` list.
pub trait GetItem {
    type Item<'w>;

    fn register(access: &mut QueryAccess);

    /// Whether this element's data exists for `entity`. Always `true` for
    /// elements that carry no access (`Has`, `Entity`) or accept absence
    /// (`Opt`).
    fn present(world: &World, entity: Entity) -> bool;

    /// # Safety
    /// `entity` must satisfy `present` and the caller must hold whatever
    /// access this element registered (shared for `&C`, exclusive for
    /// `Mut<C>`) for the lifetime `'w`.
    unsafe fn fetch<'w>(world: &'w World, entity: Entity) -> Self::Item<'w>;
}

impl<C: Component> GetItem for &C {
    type Item<'w> = &'w C;

    fn register(access: &mut QueryAccess) {
        access.reads.push(TypeId::of::<C>());
    }

    fn present(world: &World, entity: Entity) -> bool {
        world.get_component::<C>(entity).is_some()
    }

    unsafe fn fetch<'w>(world: &'w World, entity: Entity) -> &'w C {
        world.get_component::<C>(entity).expect("entity matched by query lost its component")
    }
}

/// `&mut C` `Get` element.
pub struct Mut<C>(PhantomData<C>);

impl<C: Component> GetItem for Mut<C> {
    type Item<'w> = &'w mut C;

    fn register(access: &mut QueryAccess) {
        access.writes.push(TypeId::of::<C>());
    }

    fn present(world: &World, entity: Entity) -> bool {
        world.get_component::<C>(entity).is_some()
    }

    unsafe fn fetch<'w>(world: &'w World, entity: Entity) -> &'w mut C {
        // SAFETY: caller holds this system's registered write access to `C`.
        let ptr = unsafe { world.get_component_mut_ptr::<C>(entity) }
            .expect("entity matched by query lost its component");
        unsafe { &mut *ptr }
    }
}

/// `Option<&C>` / `Option<&mut C>` `Get` element.
pub struct Opt<G>(PhantomData<G>);

impl<G: GetItem> GetItem for Opt<G> {
    type Item<'w> = Option<G::Item<'w>>;

    fn register(access: &mut QueryAccess) {
        G::register(access);
    }

    fn present(_world: &World, _entity: Entity) -> bool {
        true
    }

    unsafe fn fetch<'w>(world: &'w World, entity: Entity) -> Self::Item<'w> {
        if G::present(world, entity) {
            // SAFETY: presence just checked; access requirements forwarded from `G`.
            Some(unsafe { G::fetch(world, entity) })
        } else {
            None
        }
    }
}

/// `bool`, true iff `C` is present. Registers no access (spec §4.1).
pub struct Has<C>(PhantomData<C>);

impl<C: Component> GetItem for Has<C> {
    type Item<'w> = bool;

    fn register(_access: &mut QueryAccess) {}

    fn present(_world: &World, _entity: Entity) -> bool {
        true
    }

    unsafe fn fetch<'w>(world: &'w World, entity: Entity) -> bool {
        world.get_component::<C>(entity).is_some()
    }
}

impl GetItem for Entity {
    type Item<'w> = Entity;

    fn register(_access: &mut QueryAccess) {}

    fn present(_world: &World, _entity: Entity) -> bool {
        true
    }

    unsafe fn fetch<'w>(_world: &'w World, entity: Entity) -> Entity {
        entity
    }
}

macro_rules! impl_get_item_tuple {
    ($($param: ident),*) => {
        #[allow(non_snake_case, unused_variables, clippy::unused_unit)]
        impl<$($param: GetItem),*> GetItem for ($($param,)*) {
            type Item<'w> = ($($param::Item<'w>,)*);

            fn register(_access: &mut QueryAccess) {
                $($param::register(_access);)*
            }

            fn present(_world: &World, _entity: Entity) -> bool {
                true $(&& $param::present(_world, _entity))*
            }

            unsafe fn fetch<'w>(_world: &'w World, _entity: Entity) -> Self::Item<'w> {
                ($(unsafe { $param::fetch(_world, _entity) },)*)
            }
        }
    };
}

variadics_please::all_tuples!(impl_get_item_tuple, 0, 12, P);

/// A query's filter clause: affects which entities are matched without
/// contributing a fetched value.
pub trait QueryFilter: 'static {
    fn register(access: &mut QueryAccess);
    fn matches(world: &World, entity: Entity) -> bool;
}

impl QueryFilter for () {
    fn register(_access: &mut QueryAccess) {}
    fn matches(_world: &World, _entity: Entity) -> bool {
        true
    }
}

/// Requires `C` present; contributes `C` to `reads` (spec §4.1).
pub struct With<C>(PhantomData<C>);

impl<C: Component> QueryFilter for With<C> {
    fn register(access: &mut QueryAccess) {
        access.reads.push(TypeId::of::<C>());
    }

    fn matches(world: &World, entity: Entity) -> bool {
        world.get_component::<C>(entity).is_some()
    }
}

/// Requires `C` absent; contributes `C` to `excludes`.
pub struct Without<C>(PhantomData<C>);

impl<C: Component> QueryFilter for Without<C> {
    fn register(access: &mut QueryAccess) {
        access.excludes.push(TypeId::of::<C>());
    }

    fn matches(world: &World, entity: Entity) -> bool {
        world.get_component::<C>(entity).is_none()
    }
}

/// Helper trait for the members of an `Or<(...)>`: disjunction over
/// `matches`, union over `register` (spec §4.1 "accumulates access as
/// union"). Distinct from [`QueryFilter`] because a bare tuple used
/// directly as a schedule's `Filter` type parameter combines its members
/// with AND, not OR.
pub trait OrFilterList {
    fn register_each(access: &mut QueryAccess);
    fn any_matches(world: &World, entity: Entity) -> bool;
}

macro_rules! impl_or_filter_list_tuple {
    ($($param: ident),*) => {
        #[allow(non_snake_case, unused_variables)]
        impl<$($param: QueryFilter),*> OrFilterList for ($($param,)*) {
            fn register_each(_access: &mut QueryAccess) {
                $($param::register(_access);)*
            }

            fn any_matches(_world: &World, _entity: Entity) -> bool {
                false $(|| $param::matches(_world, _entity))*
            }
        }
    };
}

variadics_please::all_tuples!(impl_or_filter_list_tuple, 0, 12, P);

/// Disjunction of filters (spec §4.1): matches if any member matches.
pub struct Or<T>(PhantomData<T>);

impl<T: OrFilterList + 'static> QueryFilter for Or<T> {
    fn register(access: &mut QueryAccess) {
        T::register_each(access);
    }

    fn matches(world: &World, entity: Entity) -> bool {
        T::any_matches(world, entity)
    }
}

macro_rules! impl_query_filter_tuple {
    ($($param: ident),*) => {
        #[allow(non_snake_case, unused_variables)]
        impl<$($param: QueryFilter),*> QueryFilter for ($($param,)*) {
            fn register(_access: &mut QueryAccess) {
                $($param::register(_access);)*
            }

            fn matches(_world: &World, _entity: Entity) -> bool {
                true $(&& $param::matches(_world, _entity))*
            }
        }
    };
}

variadics_please::all_tuples!(impl_query_filter_tuple, 0, 12, P);

/// Iteration handle over entities matching `Get` and `Filter` (spec §4.1).
pub struct Query<G: GetItem, F: QueryFilter = ()> {
    world: SendMutPtr<World>,
    _marker: PhantomData<(G, F)>,
}

impl<G: GetItem, F: QueryFilter> Query<G, F> {
    fn world(&self) -> &World {
        // SAFETY: valid for the duration of the system run that produced
        // this handle, per this module's pointer-handle contract.
        unsafe { &*self.world.0 }
    }

    fn matching_entities(&self) -> Vec<Entity> {
        let mut access = QueryAccess::default();
        G::register(&mut access);
        F::register(&mut access);
        let includes: Vec<TypeId> = access.reads.iter().chain(access.writes.iter()).copied().collect();
        let world = self.world();
        world
            .entities_matching(&includes, &access.excludes)
            .into_iter()
            .filter(|&e| G::present(world, e) && F::matches(world, e))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = G::Item<'_>> + '_ {
        let world = self.world();
        self.matching_entities()
            .into_iter()
            .map(move |e| unsafe { G::fetch(world, e) })
    }

    /// Identical to [`iter`](Query::iter): the `Mut<C>` element already
    /// resolves through a raw pointer, so there is no separate borrowed
    /// mutable path to thread through `&mut self` here.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = G::Item<'_>> + '_ {
        self.iter()
    }

    pub fn get(&self, entity: Entity) -> Option<G::Item<'_>> {
        let world = self.world();
        if !world.is_alive(entity) || !G::present(world, entity) || !F::matches(world, entity) {
            return None;
        }
        Some(unsafe { G::fetch(world, entity) })
    }

    pub fn iter_entities(&self) -> impl Iterator<Item = Entity> {
        self.matching_entities().into_iter()
    }
}

impl<G: GetItem + 'static, F: QueryFilter + 'static> SystemParam for Query<G, F> {
    type State = SendMutPtr<World>;

    fn init(world: &mut World, meta: &mut SystemMeta) -> Self::State {
        let mut access = QueryAccess::default();
        G::register(&mut access);
        F::register(&mut access);
        meta.access_mut().add_query(access);
        SendMutPtr(world as *mut World)
    }

    fn update(_state: &mut Self::State, _world: &World, _meta: &SystemMeta) -> bool {
        true
    }

    fn get(state: &mut Self::State) -> Self {
        Query { world: *state, _marker: PhantomData }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;

    struct Pos(i32);
    struct Vel(i32);
    struct Dead;

    #[test]
    fn query_iterates_matching_entities_only() {
        let mut world = World::new();
        let a = world.spawn();
        world.insert_component(a, Pos(0));
        world.insert_component(a, Vel(1));

        let b = world.spawn();
        world.insert_component(b, Pos(10));

        let state = SendMutPtr(&mut world as *mut World);
        let query: Query<&Pos, With<Vel>> = Query { world: state, _marker: PhantomData };
        let positions: Vec<i32> = query.iter().map(|p| p.0).collect();
        assert_eq!(positions, vec![0]);
    }

    #[test]
    fn without_filter_excludes_marked_entities() {
        let mut world = World::new();
        let a = world.spawn();
        world.insert_component(a, Pos(1));
        let b = world.spawn();
        world.insert_component(b, Pos(2));
        world.insert_component(b, Dead);

        let state = SendMutPtr(&mut world as *mut World);
        let query: Query<&Pos, Without<Dead>> = Query { world: state, _marker: PhantomData };
        let positions: Vec<i32> = query.iter().map(|p| p.0).collect();
        assert_eq!(positions, vec![1]);
    }

    #[test]
    fn mut_get_item_mutates_component_in_place() {
        let mut world = World::new();
        let a = world.spawn();
        world.insert_component(a, Pos(1));

        let state = SendMutPtr(&mut world as *mut World);
        let mut query: Query<Mut<Pos>> = Query { world: state, _marker: PhantomData };
        for pos in query.iter_mut() {
            pos.0 += 41;
        }
        assert_eq!(world.get_component::<Pos>(a).unwrap().0, 42);
    }
}
