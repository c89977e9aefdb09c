//! End-to-end scenarios from §8 that fit entirely within `ecs_core` (no
//! app/plugin layer involved): commands visibility, the conflict gate, and
//! the event lifecycle.

use ecs_core::event::{EventReader, EventWriter, Events};
use ecs_core::executors::Executors;
use ecs_core::schedule::{Schedule, SetConfig};
use ecs_core::system::commands::Commands;
use ecs_core::system::function_system::IntoSystem;
use ecs_core::system::param::{Local, Res, ResMut};
use ecs_core::world::World;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct TestSchedule;

struct X(i32);
struct Seen(i32);

/// Scenario 1: `A: insert_resource(X=42)`, `B: reads Res<X> -> writes
/// Local<Seen>`, `B.after(A)`. After one run, `Seen == 42`.
#[test]
fn commands_visible_to_a_system_ordered_after() {
    let mut world = World::new();
    world.insert_resource(Seen(0));
    let mut schedule = Schedule::new(TestSchedule);

    let a = (|cmd: Commands| cmd.insert_resource(X(42))).into_system("a");
    let b = (|x: Res<X>, mut seen: ResMut<Seen>| seen.get_mut().0 = x.get().0).into_system("b");

    let a_config = SetConfig::system(a);
    let a_label = a_config.label();
    schedule.add_systems(a_config);
    schedule.add_systems(SetConfig::system(b).after(a_label));

    let executors = Executors::new_default();
    let errors = schedule.run(&mut world, &executors).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(world.get_resource::<Seen>().unwrap().0, 42);
}

/// Scenario 3: `A: ResMut<X>`, `B: Res<X>`, no explicit ordering between
/// them. They must never overlap (the conflict gate serializes them), and
/// exactly one of the two valid orderings happens each run.
#[test]
fn conflicting_systems_never_run_concurrently() {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    let mut world = World::new();
    world.insert_resource(0i32);

    let overlap_detected = Arc::new(AtomicBool::new(false));
    let active = Arc::new(AtomicU32::new(0));

    let overlap_a = overlap_detected.clone();
    let active_a = active.clone();
    let a = (move |mut x: ResMut<i32>| {
        if active_a.fetch_add(1, Ordering::SeqCst) != 0 {
            overlap_a.store(true, Ordering::SeqCst);
        }
        *x.get_mut() += 1;
        active_a.fetch_sub(1, Ordering::SeqCst);
    })
    .into_system("writer");

    let overlap_b = overlap_detected.clone();
    let active_b = active.clone();
    let b = (move |x: Res<i32>| {
        if active_b.fetch_add(1, Ordering::SeqCst) != 0 {
            overlap_b.store(true, Ordering::SeqCst);
        }
        let _ = x.get();
        active_b.fetch_sub(1, Ordering::SeqCst);
    })
    .into_system("reader");

    let mut schedule = Schedule::new(TestSchedule);
    schedule.add_systems(SetConfig::system(a));
    schedule.add_systems(SetConfig::system(b));

    let executors = Executors::new_default();
    for _ in 0..50 {
        let errors = schedule.run(&mut world, &executors).unwrap();
        assert!(errors.is_empty(), "{errors:?}");
    }
    assert!(!overlap_detected.load(Ordering::SeqCst));
}

/// Scenario 5: an event pushed at frame N is visible at N and N+1, gone by
/// N+2 — exercised through the same `update_events_system` `App::add_events`
/// installs, driven here directly against a schedule.
#[test]
fn event_is_visible_for_two_updates_then_expires() {
    use ecs_core::event::update_events_system;

    #[derive(Debug, PartialEq)]
    struct Hit(u32);

    let mut world = World::new();
    world.insert_resource(Events::<Hit>::default());

    let mut writer = (|mut w: EventWriter<Hit>| w.send(Hit(7))).into_system("write");
    writer.initialize(&mut world);
    writer.run(&world).unwrap();

    let mut age_out = update_events_system::<Hit>();
    age_out.initialize(&mut world);

    let mut reader = (|mut r: EventReader<Hit>| r.read().count()).into_system("read");
    reader.initialize(&mut world);

    // Frame N: reader sees it.
    assert_eq!(reader.run(&world).unwrap(), 1);

    // Frame N (end): ages to 1.
    age_out.run(&world).unwrap();
    // Frame N+1: a *fresh* reader (new Local cursor) still sees it.
    let mut late_reader = (|mut r: EventReader<Hit>| r.read().count()).into_system("late_read");
    late_reader.initialize(&mut world);
    assert_eq!(late_reader.run(&world).unwrap(), 1);

    // Frame N+1 (end): ages to 0, dropped.
    age_out.run(&world).unwrap();
    let mut latest_reader = (|mut r: EventReader<Hit>| r.read().count()).into_system("latest_read");
    latest_reader.initialize(&mut world);
    assert_eq!(latest_reader.run(&world).unwrap(), 0);
}

/// `Local<T>` state persists across successive runs of the same system
/// instance (spec §8 invariant).
#[test]
fn local_state_persists_across_runs() {
    struct Counter(u32);
    impl ecs_core::world::FromWorld for Counter {
        fn from_world(_world: &mut World) -> Self {
            Counter(0)
        }
    }

    let mut world = World::new();
    let mut system = (|mut local: Local<Counter>| {
        local.0 += 1;
        local.0
    })
    .into_system("increment_local");
    system.initialize(&mut world);

    assert_eq!(system.run(&world).unwrap(), 1);
    assert_eq!(system.run(&world).unwrap(), 2);
    assert_eq!(system.run(&world).unwrap(), 3);
}
