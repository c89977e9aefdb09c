//! The external-collaborator World (spec §3): a resource table keyed by
//! type, a minimal component store, and the app's single owned
//! [`CommandQueue`].
//!
//! Storage performance is explicitly out of scope (spec §1) — this is a
//! `HashMap`-backed store, not an archetype/sparse-set. What *is* in scope
//! is the handle shape the scheduler and params rely on: raw,
//! pointer-like access whose safety is the scheduler's conflict gate, not
//! the borrow checker (spec §9 "Shared resource handles").

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::entity::{Entities, Entity};
use crate::system::commands::CommandQueue;

/// Marker for types usable as resources. Blanket-implemented: any
/// `Send + Sync + 'static` value qualifies, matching spec §3's "resources
/// of a given type exist at most once" with no further ceremony required.
pub trait Resource: Any + Send + Sync {}
impl<T: Any + Send + Sync> Resource for T {}

/// Marker for types usable as components, attached to entities.
pub trait Component: Any + Send + Sync {}
impl<T: Any + Send + Sync> Component for T {}

/// Constructs a value from a [`World`] reference, used by [`Local<T>`](crate::system::param::Local)
/// when `T` needs world context instead of `Default`.
pub trait FromWorld {
    fn from_world(world: &mut World) -> Self;
}

impl<T: Default> FromWorld for T {
    fn from_world(_world: &mut World) -> Self {
        T::default()
    }
}

type ComponentColumn = HashMap<Entity, Box<dyn Any + Send + Sync>>;

/// The single in-memory data store a schedule runs against.
pub struct World {
    pub(crate) entities: Entities,
    reserved_entities: AtomicU32,
    resources: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    components: HashMap<TypeId, ComponentColumn>,
    pub(crate) commands: CommandQueue,
    /// Installed by `Extract<P>` resolution: points at the "source" world
    /// a system in an extract schedule should read from (spec §4.1, §4.7).
    extract_source: Option<*const World>,
}

// SAFETY: `World` is only ever accessed behind the app's world RW-lock and
// the scheduler's conflict gate (spec §5); raw pointers inside it (entity
// reservation aside, which is its own atomic) are never dereferenced
// without that external synchronization.
unsafe impl Send for World {}
unsafe impl Sync for World {}

impl Default for World {
    fn default() -> Self {
        World {
            entities: Entities::default(),
            reserved_entities: AtomicU32::new(0),
            resources: HashMap::new(),
            components: HashMap::new(),
            commands: CommandQueue::default(),
            extract_source: None,
        }
    }
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    // -- entities --------------------------------------------------------

    pub fn spawn(&mut self) -> Entity {
        self.flush_reserved();
        self.entities.spawn()
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        for column in self.components.values_mut() {
            column.remove(&entity);
        }
        self.entities.despawn(entity)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Hands out an `Entity` id usable immediately by `Commands::spawn`
    /// before the underlying slot exists; `flush_reserved` materializes it.
    ///
    /// Accounts for the entity table's free list: a reservation made while
    /// a despawned slot is available predicts that slot (and its current
    /// generation), not a fresh sequential index, so the handle matches
    /// what `flush_reserved`'s real `spawn()` calls go on to produce.
    pub(crate) fn reserve_entity(&self) -> Entity {
        let n = self.reserved_entities.fetch_add(1, Ordering::Relaxed) as usize;
        self.entities.predict_spawn(n)
    }

    pub(crate) fn flush_reserved(&mut self) {
        let pending = self.reserved_entities.swap(0, Ordering::Relaxed);
        for _ in 0..pending {
            self.entities.spawn();
        }
    }

    // -- resources --------------------------------------------------------

    pub fn insert_resource<T: Resource>(&mut self, value: T) {
        self.resources.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn init_resource<T: Resource + FromWorld>(&mut self) {
        if !self.contains_resource::<T>() {
            let value = T::from_world(self);
            self.insert_resource(value);
        }
    }

    pub fn remove_resource<T: Resource>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .map(|boxed| *boxed.downcast::<T>().expect("resource type mismatch"))
    }

    pub fn contains_resource<T: Resource>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    pub fn get_resource<T: Resource>(&self) -> Option<&T> {
        self.resources.get(&TypeId::of::<T>()).map(|b| b.downcast_ref::<T>().unwrap())
    }

    pub fn get_resource_mut<T: Resource>(&mut self) -> Option<&mut T> {
        self.resources.get_mut(&TypeId::of::<T>()).map(|b| b.downcast_mut::<T>().unwrap())
    }

    /// # Safety
    /// The caller must hold whatever access the schedule runner's conflict
    /// gate granted for `T` (shared read) for the lifetime of the pointer's
    /// use; no other thread may be writing `T` concurrently.
    pub unsafe fn get_resource_ptr<T: Resource>(&self) -> Option<*const T> {
        self.get_resource::<T>().map(|r| r as *const T)
    }

    /// # Safety
    /// Same contract as [`get_resource_ptr`](World::get_resource_ptr), but
    /// the caller must additionally hold exclusive access — no other live
    /// reader or writer handle to `T` may exist.
    pub unsafe fn get_resource_mut_ptr<T: Resource>(&self) -> Option<*mut T> {
        self.resources
            .get(&TypeId::of::<T>())
            .map(|b| b.downcast_ref::<T>().unwrap() as *const T as *mut T)
    }

    // -- components --------------------------------------------------------

    pub fn insert_component<C: Component>(&mut self, entity: Entity, component: C) {
        self.components
            .entry(TypeId::of::<C>())
            .or_default()
            .insert(entity, Box::new(component));
    }

    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> Option<C> {
        self.components
            .get_mut(&TypeId::of::<C>())
            .and_then(|column| column.remove(&entity))
            .map(|boxed| *boxed.downcast::<C>().expect("component type mismatch"))
    }

    pub fn get_component<C: Component>(&self, entity: Entity) -> Option<&C> {
        self.components
            .get(&TypeId::of::<C>())
            .and_then(|column| column.get(&entity))
            .map(|b| b.downcast_ref::<C>().unwrap())
    }

    /// # Safety: see [`get_resource_ptr`](World::get_resource_ptr).
    pub unsafe fn get_component_ptr<C: Component>(&self, entity: Entity) -> Option<*const C> {
        self.get_component::<C>(entity).map(|r| r as *const C)
    }

    /// # Safety: see [`get_resource_mut_ptr`](World::get_resource_mut_ptr).
    pub unsafe fn get_component_mut_ptr<C: Component>(&self, entity: Entity) -> Option<*mut C> {
        self.components
            .get(&TypeId::of::<C>())
            .and_then(|column| column.get(&entity))
            .map(|b| b.downcast_ref::<C>().unwrap() as *const C as *mut C)
    }

    /// Entities carrying every `includes` component type and none of the
    /// `excludes` types. Backs `Query` iteration (spec §4.1). An empty
    /// `includes` set (e.g. a `Query<Entity>` with no `With`/`Get`
    /// component) falls back to scanning every live entity.
    pub fn entities_matching(&self, includes: &[TypeId], excludes: &[TypeId]) -> Vec<Entity> {
        let smallest = includes.iter().filter_map(|ty| self.components.get(ty)).min_by_key(|column| column.len());

        let candidates: Vec<Entity> = match smallest {
            Some(column) => column.keys().copied().collect(),
            None => self.entities.iter_alive().collect(),
        };

        candidates
            .into_iter()
            .filter(|&e| {
                includes.iter().all(|ty| {
                    self.components.get(ty).is_some_and(|column| column.contains_key(&e))
                }) && excludes.iter().all(|ty| {
                    !self.components.get(ty).is_some_and(|column| column.contains_key(&e))
                })
            })
            .collect()
    }

    // -- commands --------------------------------------------------------

    pub fn commands_queue(&self) -> &CommandQueue {
        &self.commands
    }

    /// Applies and clears the world's owned command queue (spec §4.5).
    /// Must run with exclusive world access, between schedule steps.
    pub fn apply_commands(&mut self) {
        self.flush_reserved();
        let queue = std::mem::take(&mut self.commands);
        queue.apply(self);
        self.commands = queue;
    }

    // -- extract source (spec §4.1 `Extract<P>`, §4.7 `App::extract`) ----

    /// # Safety
    /// `source` must outlive every use of the extract-source pointer for
    /// the duration of the schedule run installing it (guaranteed by
    /// `App::extract`, which joins the extract schedule before returning).
    pub unsafe fn set_extract_source(&mut self, source: Option<*const World>) {
        self.extract_source = source;
    }

    pub fn extract_source(&self) -> Option<&World> {
        // SAFETY: contract upheld by `set_extract_source`'s caller.
        self.extract_source.map(|ptr| unsafe { &*ptr })
    }
}
