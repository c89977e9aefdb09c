//! Generic rolling event buffer (spec §4.8), grounded on the teacher's own
//! double-buffered `Events<T>` (`crates/bevy_app/src/event.rs`) but
//! expressed with spec §4.8's literal age-counted record shape rather than
//! bevy's two-`Vec` swap.

use std::collections::VecDeque;
use std::marker::PhantomData;

use crate::system::function_system::IntoSystem;
use crate::system::param::{FromParam, Local, Res, ResMut};
use crate::system::BoxedSystem;
use crate::world::FromWorld;

struct Record<T> {
    id: u64,
    value: T,
    /// Number of further `Events::update` calls this record survives.
    /// Starts at 2: visible the frame it's sent and the following one
    /// (spec §4.8, §8 scenario 5 "push at frame N ... gone at frame N+2").
    age: u32,
}

/// Resource holding every event of type `T` sent since the oldest one
/// still within its 2-update visibility window.
pub struct Events<T> {
    records: VecDeque<Record<T>>,
    next_id: u64,
}

impl<T> Default for Events<T> {
    fn default() -> Self {
        Events { records: VecDeque::new(), next_id: 0 }
    }
}

impl<T: Send + Sync + 'static> Events<T> {
    pub fn send(&mut self, value: T) {
        self.records.push_back(Record { id: self.next_id, value, age: 2 });
        self.next_id += 1;
    }

    /// Ages every record down by one update, dropping any that reach zero.
    /// Auto-installed at `Last` once per `App::update()` (spec §4.8).
    pub fn update(&mut self) {
        for record in &mut self.records {
            record.age = record.age.saturating_sub(1);
        }
        while matches!(self.records.front(), Some(r) if r.age == 0) {
            self.records.pop_front();
        }
    }

    fn unread_since(&self, last_seen_id: u64) -> impl Iterator<Item = &T> {
        self.records.iter().filter(move |r| r.id >= last_seen_id).map(|r| &r.value)
    }

    /// Manual-reader variant of [`EventReader::read`], for callers outside a
    /// system run (e.g. `ecs_app`'s `App::should_exit` polling
    /// `Events<AppExit>` between schedule runs).
    pub fn iter_since(&self, last_seen_id: u64) -> impl Iterator<Item = &T> {
        self.unread_since(last_seen_id)
    }

    /// The id the next `send`ed event will receive; pair with
    /// [`iter_since`](Events::iter_since) to track a manual reader's cursor.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }
}

/// `Local<EventPointer<T>>`'s backing state: remembers the id of the next
/// event an `EventReader<T>` hasn't seen yet (spec §4.8).
pub struct EventPointer<T> {
    next_unseen: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FromWorld for EventPointer<T> {
    fn from_world(_world: &mut crate::world::World) -> Self {
        EventPointer { next_unseen: 0, _marker: PhantomData }
    }
}

/// Reads events of type `T` sent since this reader's own last `read` call.
/// A `FromParam` composing `Local<EventPointer<T>>` + `Res<Events<T>>`
/// (spec §4.8) so each reader carries its own, independent cursor.
pub struct EventReader<T: Send + Sync + 'static> {
    pointer: Local<EventPointer<T>>,
    events: Res<Events<T>>,
}

impl<T: Send + Sync + 'static> EventReader<T> {
    pub fn read(&mut self) -> impl Iterator<Item = &T> + '_ {
        let last_seen = self.pointer.next_unseen;
        self.pointer.next_unseen = self.events.next_id;
        self.events.unread_since(last_seen)
    }
}

impl<T: Send + Sync + 'static> FromParam for EventReader<T> {
    type Param = (Local<EventPointer<T>>, Res<Events<T>>);

    fn from_param((pointer, events): Self::Param) -> Option<Self> {
        Some(EventReader { pointer, events })
    }
}

/// Sends events of type `T`. A `FromParam` composing `ResMut<Events<T>>`
/// (spec §4.8).
pub struct EventWriter<T: Send + Sync + 'static> {
    events: ResMut<Events<T>>,
}

impl<T: Send + Sync + 'static> EventWriter<T> {
    pub fn send(&mut self, value: T) {
        self.events.get_mut().send(value);
    }
}

impl<T: Send + Sync + 'static> FromParam for EventWriter<T> {
    type Param = ResMut<Events<T>>;

    fn from_param(events: Self::Param) -> Option<Self> {
        Some(EventWriter { events })
    }
}

/// The system `App::add_events::<T>()` installs at `Last`: ages out expired
/// records from the `Events<T>` resource (spec §4.8).
pub fn update_events_system<T: Send + Sync + 'static>() -> BoxedSystem<()> {
    (move |mut events: ResMut<Events<T>>| events.get_mut().update()).into_system("update_events")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::System;
    use crate::world::World;

    #[derive(Debug, PartialEq)]
    struct Hit(u32);

    #[test]
    fn reader_sees_event_for_two_updates_then_not() {
        let mut world = World::new();
        world.insert_resource(Events::<Hit>::default());
        world.get_resource_mut::<Events<Hit>>().unwrap().send(Hit(1));

        let mut read_count = (|mut reader: EventReader<Hit>| reader.read().count()).into_system("count");
        read_count.initialize(&mut world);

        assert_eq!(read_count.run(&world).unwrap(), 1);
        // Same reader already advanced its cursor past the one event.
        assert_eq!(read_count.run(&world).unwrap(), 0);
    }

    #[test]
    fn update_ages_out_old_events() {
        let mut world = World::new();
        world.insert_resource(Events::<Hit>::default());
        world.get_resource_mut::<Events<Hit>>().unwrap().send(Hit(1));

        let mut update_system = update_events_system::<Hit>();
        update_system.initialize(&mut world);
        update_system.run(&world).unwrap();
        update_system.run(&world).unwrap();

        assert!(world.get_resource::<Events<Hit>>().unwrap().records.is_empty());
    }

    #[test]
    fn writer_send_is_visible_to_later_reader() {
        let mut world = World::new();
        world.insert_resource(Events::<Hit>::default());

        let mut writer_system = (|mut w: EventWriter<Hit>| w.send(Hit(42))).into_system("write");
        writer_system.initialize(&mut world);
        writer_system.run(&world).unwrap();

        let mut reader_system =
            (|mut reader: EventReader<Hit>| reader.read().map(|h| h.0).sum::<u32>()).into_system("sum");
        reader_system.initialize(&mut world);
        assert_eq!(reader_system.run(&world).unwrap(), 42);
    }
}
