//! End-to-end scenarios spanning `App`/`SubApp` (the part of §8's scenario
//! list that lives above `ecs_core` alone): sub-app extraction, state
//! transitions driven through the full `App`, and the default plugin/runner
//! wiring.

use ecs_app::{App, AppExit, ExtractSchedule, PreExit, ScheduleRunner, StateTransition, SubApp, Update};
use ecs_core::schedule::SetConfig;
use ecs_core::state::{on_enter, NextState};
use ecs_core::system::function_system::IntoSystem;
use ecs_core::system::param::{Extract, Res, ResMut};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
struct RenderWorld;

#[derive(Clone, Copy, Debug)]
struct Positions(u32);

/// Scenario 6: main app has `Positions`, render sub-app starts with a
/// different value; after `extract(RenderWorld)` the sub-app's copy matches
/// the main world's, and the main world is left untouched.
#[test]
fn sub_app_extract_copies_main_world_into_render_world() {
    let mut app = App::new();
    app.insert_resource(Positions(42));

    let mut render = SubApp::new();
    render.insert_resource(Positions(0));
    render.add_systems(
        ExtractSchedule,
        SetConfig::system(
            (|source: Extract<Res<Positions>>, mut target: ResMut<Positions>| {
                target.get_mut().0 = source.get().0;
            })
            .into_system("copy_positions"),
        ),
    );
    app.add_sub_app(RenderWorld, render);

    app.extract(RenderWorld);

    assert_eq!(app.sub_app(RenderWorld).world().get_resource::<Positions>().unwrap().0, 42);
    assert_eq!(app.world().get_resource::<Positions>().unwrap().0, 42);
}

/// Same scenario, but the main world changes again after extraction: the
/// render sub-app must not see it until the next explicit `extract` call.
#[test]
fn sub_app_extract_does_not_see_later_main_world_changes_until_next_call() {
    let mut app = App::new();
    app.insert_resource(Positions(1));

    let mut render = SubApp::new();
    render.insert_resource(Positions(0));
    render.add_systems(
        ExtractSchedule,
        SetConfig::system(
            (|source: Extract<Res<Positions>>, mut target: ResMut<Positions>| {
                target.get_mut().0 = source.get().0;
            })
            .into_system("copy_positions"),
        ),
    );
    app.add_sub_app(RenderWorld, render);

    app.extract(RenderWorld);
    assert_eq!(app.sub_app(RenderWorld).world().get_resource::<Positions>().unwrap().0, 1);

    app.insert_resource(Positions(99));
    assert_eq!(app.sub_app(RenderWorld).world().get_resource::<Positions>().unwrap().0, 1);

    app.extract(RenderWorld);
    assert_eq!(app.sub_app(RenderWorld).world().get_resource::<Positions>().unwrap().0, 99);
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Power {
    Off,
    On,
}

/// Scenario 4, driven through the full `App`: pushing `NextState(On)`
/// during `Update` is picked up by `StateTransition` on the *next* frame,
/// and the `OnEnter(On)` system fires exactly once.
#[test]
fn state_transition_runs_on_enter_exactly_once_the_frame_after() {
    let mut app = App::new();
    app.insert_state(Power::Off);
    app.insert_resource(0u32);

    app.add_systems(
        Update,
        SetConfig::system(
            (|mut next: ResMut<NextState<Power>>| next.get_mut().set(Power::On)).into_system("request_on"),
        ),
    );
    app.add_systems(StateTransition, on_enter(Power::On, (|mut hits: ResMut<u32>| *hits.get_mut() += 1).into_system("on_enter_on")));

    app.update().unwrap();
    assert_eq!(*app.world().get_resource::<u32>().unwrap(), 0);

    app.update().unwrap();
    assert_eq!(*app.world().get_resource::<u32>().unwrap(), 1);

    app.update().unwrap();
    assert_eq!(*app.world().get_resource::<u32>().unwrap(), 1);
}

/// `App::run()` with the default `ScheduleRunner::run_once()` performs
/// exactly one `update()` then returns success, and `App::exit()`'s
/// `exit_order` schedules are reachable by a custom runner's `exit` hook.
#[test]
fn run_once_runner_updates_once_and_exit_order_runs_on_exit() {
    let mut app = App::new();
    app.insert_resource(0u32);
    app.add_systems(Update, SetConfig::system((|mut n: ResMut<u32>| *n.get_mut() += 1).into_system("tick")));
    app.add_systems(PreExit, SetConfig::system((|mut n: ResMut<u32>| *n.get_mut() += 100).into_system("on_exit_tick")));

    app.set_runner(ScheduleRunner::run_once());
    let exit = app.run();

    assert!(exit.is_success());
    assert_eq!(*app.world().get_resource::<u32>().unwrap(), 101);
}

#[test]
fn app_exit_carries_its_code_through_send_exit_and_should_exit() {
    let mut app = App::new();
    app.send_exit(AppExit::from_code(7));
    let exit = app.should_exit().unwrap();
    assert!(exit.is_error());
    assert_eq!(exit.code(), 7);
}
