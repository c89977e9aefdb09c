//! Deferred mutations (spec §4.5).
//!
//! `CommandQueue` is a single dense `Vec<u8>` blob plus a per-type vtable
//! slot table, exactly as spec §9's design notes prescribe: no per-command
//! heap allocation or dynamic dispatch beyond the buffer's own growth.
//! `Commands`/`EntityCommands` are the pointer-like, cheaply-`Clone`able
//! façades systems actually see (spec §9 "Shared resource handles").

use std::any::TypeId;
use std::collections::HashMap;
use std::mem::{align_of, size_of};

use parking_lot::Mutex;

use crate::entity::Entity;
use crate::world::{Component, Resource, World};

/// A deferred world mutation. Implemented by closures automatically.
pub trait Command: Send + 'static {
    fn apply(self, world: &mut World);
}

impl<F: FnOnce(&mut World) + Send + 'static> Command for F {
    fn apply(self, world: &mut World) {
        self(world)
    }
}

struct CommandMeta {
    apply: unsafe fn(*mut u8, &mut World),
    drop_in_place: unsafe fn(*mut u8),
    size: usize,
    align: usize,
}

unsafe fn apply_fn<C: Command>(ptr: *mut u8, world: &mut World) {
    // SAFETY: `ptr` points at a live, correctly-aligned `C` written by `push`.
    let command = unsafe { ptr.cast::<C>().read() };
    command.apply(world);
}

unsafe fn drop_fn<C: Command>(ptr: *mut u8) {
    // SAFETY: same as `apply_fn`; used only when the queue is dropped
    // without being applied, so the payload still needs destructing.
    unsafe { ptr.cast::<C>().drop_in_place() };
}

#[derive(Default)]
struct QueueInner {
    bytes: Vec<u8>,
    metas: Vec<CommandMeta>,
    slot_of: HashMap<TypeId, u16>,
}

/// Thread-safe FIFO of type-erased deferred mutations. The world owns
/// exactly one (spec §3 "one owned `CommandQueue`"); `Commands` handles
/// are cheap pointers into it.
#[derive(Default)]
pub struct CommandQueue {
    inner: Mutex<QueueInner>,
}

impl CommandQueue {
    pub fn push<C: Command>(&self, command: C) {
        let mut inner = self.inner.lock();
        let ty = TypeId::of::<C>();
        let slot = match inner.slot_of.get(&ty) {
            Some(&slot) => slot,
            None => {
                let slot = inner.metas.len() as u16;
                inner.metas.push(CommandMeta {
                    apply: apply_fn::<C>,
                    drop_in_place: drop_fn::<C>,
                    size: size_of::<C>(),
                    align: align_of::<C>(),
                });
                inner.slot_of.insert(ty, slot);
                slot
            }
        };

        let align = inner.metas[slot as usize].align;
        let QueueInner { bytes, .. } = &mut *inner;
        bytes.extend_from_slice(&slot.to_ne_bytes());
        let pad = (align - (bytes.len() % align.max(1))) % align.max(1);
        bytes.resize(bytes.len() + pad, 0);
        let start = bytes.len();
        bytes.resize(start + size_of::<C>(), 0);
        // SAFETY: `start` is aligned to `C`'s alignment and the buffer has
        // exactly `size_of::<C>()` fresh bytes reserved for it.
        unsafe { bytes.as_mut_ptr().add(start).cast::<C>().write(command) };
    }

    /// Applies every queued command in FIFO order, then clears the buffer.
    /// Must run with exclusive world access (spec §4.5 flushing policy).
    pub fn apply(&self, world: &mut World) {
        let mut inner = self.inner.lock();
        let mut cursor = 0usize;
        while cursor < inner.bytes.len() {
            let slot = u16::from_ne_bytes([inner.bytes[cursor], inner.bytes[cursor + 1]]);
            cursor += 2;
            let (apply, size, align) = {
                let meta = &inner.metas[slot as usize];
                (meta.apply, meta.size, meta.align)
            };
            let pad = (align - (cursor % align.max(1))) % align.max(1);
            cursor += pad;
            // SAFETY: layout matches exactly what `push` wrote for this slot.
            let ptr = unsafe { inner.bytes.as_mut_ptr().add(cursor) };
            unsafe { apply(ptr, world) };
            cursor += size;
        }
        inner.bytes.clear();
    }
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        let mut cursor = 0usize;
        while cursor < self.bytes.len() {
            let slot = u16::from_ne_bytes([self.bytes[cursor], self.bytes[cursor + 1]]);
            cursor += 2;
            let (drop_in_place, size, align) = {
                let meta = &self.metas[slot as usize];
                (meta.drop_in_place, meta.size, meta.align)
            };
            let pad = (align - (cursor % align.max(1))) % align.max(1);
            cursor += pad;
            let ptr = unsafe { self.bytes.as_mut_ptr().add(cursor) };
            unsafe { drop_in_place(ptr) };
            cursor += size;
        }
    }
}

/// The deferred-mutation façade systems take as a parameter (spec §4.1,
/// §4.5). A pointer-like handle: cheap to copy, valid only for the
/// duration of the system run that produced it.
pub struct Commands {
    world: *const World,
    queue: *const CommandQueue,
}

// SAFETY: both pointers reference data behind the app's world RW-lock;
// `CommandQueue`'s own mutex makes concurrent pushes from worker threads
// sound.
unsafe impl Send for Commands {}
unsafe impl Sync for Commands {}

impl Commands {
    /// # Safety
    /// `world` and its command queue must outlive this handle, i.e. live at
    /// least until the schedule run that created it finishes.
    pub unsafe fn new(world: &World) -> Self {
        Commands { world: world as *const World, queue: world.commands_queue() as *const CommandQueue }
    }

    fn queue(&self) -> &CommandQueue {
        // SAFETY: see `Commands::new`.
        unsafe { &*self.queue }
    }

    fn world(&self) -> &World {
        // SAFETY: see `Commands::new`.
        unsafe { &*self.world }
    }

    pub fn add(&self, command: impl Command) {
        self.queue().push(command);
    }

    pub fn spawn(&self) -> EntityCommands<'_> {
        let entity = self.world().reserve_entity();
        self.queue().push(move |world: &mut World| {
            world.flush_reserved();
        });
        EntityCommands { commands: self, entity }
    }

    pub fn entity(&self, entity: Entity) -> EntityCommands<'_> {
        EntityCommands { commands: self, entity }
    }

    pub fn despawn(&self, entity: Entity) {
        self.add(move |world: &mut World| {
            world.despawn(entity);
        });
    }

    /// Despawns `entity` and, transitively, every entity in its `Children`
    /// component tree. Generic over the child-list accessor so this module
    /// does not need to know the concrete `Children` component type.
    pub fn despawn_recursive<C: Component, F: Fn(&C) -> Vec<Entity> + Send + 'static>(
        &self,
        entity: Entity,
        children_of: F,
    ) {
        self.add(move |world: &mut World| {
            let mut stack = vec![entity];
            while let Some(e) = stack.pop() {
                if let Some(children) = world.get_component::<C>(e) {
                    stack.extend(children_of(children));
                }
                world.despawn(e);
            }
        });
    }

    pub fn insert_resource<T: Resource>(&self, value: T) {
        self.add(move |world: &mut World| world.insert_resource(value));
    }

    pub fn remove_resource<T: Resource>(&self) {
        self.add(move |world: &mut World| {
            world.remove_resource::<T>();
        });
    }
}

/// Builder for deferred operations scoped to a single entity.
pub struct EntityCommands<'a> {
    commands: &'a Commands,
    entity: Entity,
}

impl<'a> EntityCommands<'a> {
    pub fn id(&self) -> Entity {
        self.entity
    }

    pub fn insert<C: Component>(&self, component: C) -> &Self {
        let entity = self.entity;
        self.commands.add(move |world: &mut World| {
            if world.is_alive(entity) {
                world.insert_component(entity, component);
            }
        });
        self
    }

    pub fn remove<C: Component>(&self) -> &Self {
        let entity = self.entity;
        self.commands.add(move |world: &mut World| {
            world.remove_component::<C>(entity);
        });
        self
    }

    pub fn despawn(&self) {
        self.commands.despawn(self.entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_command_mutates_on_apply() {
        struct Counter(u32);
        let mut world = World::new();
        world.insert_resource(Counter(0));

        let queue = CommandQueue::default();
        queue.push(|world: &mut World| {
            world.get_resource_mut::<Counter>().unwrap().0 += 1;
        });
        queue.push(|world: &mut World| {
            world.get_resource_mut::<Counter>().unwrap().0 += 41;
        });

        queue.apply(&mut world);
        assert_eq!(world.get_resource::<Counter>().unwrap().0, 42);
    }

    #[test]
    fn commands_spawn_and_insert_is_visible_after_apply() {
        struct Marker;
        let mut world = World::new();
        // SAFETY: `commands` does not outlive this scope's `world`.
        let commands = unsafe { Commands::new(&world) };
        let entity = commands.spawn().insert(Marker).id();
        world.apply_commands();
        assert!(world.is_alive(entity));
        assert!(world.get_component::<Marker>(entity).is_some());
    }
}
