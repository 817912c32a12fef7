//! End-to-end runs of the demo cast on a headless stage.

use couchette_cast::characters::{CAUGHT_CUTSCENE, DINNER_LINE};
use couchette_cast::generic::ALARM_LINE;
use couchette_cast::{actors, begin_chapter, build_engine, build_registry, chapter_of, flags, places, start_scenario, Handler};
use couchette_scripting::{
    persist, Engine, EngineConfig, HeadlessStage, SavePoint, StageEvent, World, MAX_DEPTH,
};
use proptest::prelude::*;

const WORLD_SEED: u64 = 0x00C0_FFEE;

fn boot() -> (Engine, World, HeadlessStage) {
    let engine = build_engine(EngineConfig::default()).unwrap();
    let mut world = World::new(WORLD_SEED);
    let mut stage = HeadlessStage::default();
    start_scenario(&engine, &mut world, &mut stage).unwrap();
    (engine, world, stage)
}

fn run(engine: &Engine, world: &mut World, stage: &mut HeadlessStage, ticks: usize) {
    for _ in 0..ticks {
        engine.tick(world, stage);
        for actor in world.actors() {
            assert!(actor.depth() <= MAX_DEPTH);
        }
    }
}

#[test]
fn registry_covers_every_handler() {
    let registry = build_registry().unwrap();
    assert_eq!(registry.len(), Handler::ALL.len());
    for handler in Handler::ALL {
        assert!(registry.contains(handler.id()), "{handler:?} missing");
    }
    assert_eq!(registry.id_of("walk"), Some(Handler::Walk.id()));
}

#[test]
fn evening_plays_out() {
    let (engine, mut world, mut stage) = boot();

    run(&engine, &mut world, &mut stage, 300);

    assert_eq!(chapter_of(&world), 1);
    assert_eq!(world.story(flags::DINNER_SERVED), 1);
    assert!(world.story(flags::TICKETS_CHECKED) >= 1);
    assert_eq!(world.story(flags::STOWAWAY_CAUGHT), 1);
    assert!(!world.actor(actors::STOWAWAY).unwrap().is_live());
    assert_eq!(world.actor(actors::PASSENGER).unwrap().position, places::COMPARTMENT3);

    let saves: Vec<SavePoint> = stage.save_requests().collect();
    assert_eq!(
        saves,
        vec![SavePoint {
            actor: actors::PASSENGER,
            kind: 1,
            event: 30
        }]
    );
    let events = stage.events();
    assert!(events.contains(&StageEvent::Dialog {
        actor: actors::PASSENGER,
        line: DINNER_LINE
    }));
    assert!(events.contains(&StageEvent::Dialog {
        actor: actors::CONDUCTOR,
        line: ALARM_LINE
    }));
    assert!(events.contains(&StageEvent::Cutscene(CAUGHT_CUTSCENE)));
}

#[test]
fn identical_seeds_give_identical_saves() {
    let (engine, mut a, mut stage_a) = boot();
    let (_, mut b, mut stage_b) = boot();

    run(&engine, &mut a, &mut stage_a, 200);
    run(&engine, &mut b, &mut stage_b, 200);

    let registry = engine.registry();
    assert_eq!(
        persist::to_bytes(&a, registry).unwrap(),
        persist::to_bytes(&b, registry).unwrap()
    );
}

#[test]
fn night_chapter_resets_the_cast() {
    let (engine, mut world, mut stage) = boot();
    run(&engine, &mut world, &mut stage, 200);

    let reset = begin_chapter(&engine, &mut world, &mut stage, 2).unwrap();

    assert_eq!(reset, 3);
    assert_eq!(chapter_of(&world), 2);
    let conductor = world.actor(actors::CONDUCTOR).unwrap();
    assert_eq!(conductor.active_handler(), Handler::ConductorNight.id());
    assert_eq!(conductor.position, places::CONDUCTOR_SEAT);
    assert!(!world.actor(actors::STOWAWAY).unwrap().is_live());

    run(&engine, &mut world, &mut stage, 200);

    assert!(!world.actor(actors::WAITER).unwrap().is_live());
    assert!(stage.events().contains(&StageEvent::Animation {
        actor: actors::PASSENGER,
        sequence: 411
    }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Property: saving at any tick and resuming (with the same stage state)
    /// continues exactly like the uninterrupted run.
    #[test]
    fn resume_matches_uninterrupted_run(save_at in 0usize..260, seed in any::<u64>()) {
        let engine = build_engine(EngineConfig::default()).unwrap();
        let mut world = World::new(seed);
        let mut stage = HeadlessStage::default();
        start_scenario(&engine, &mut world, &mut stage).unwrap();
        run(&engine, &mut world, &mut stage, save_at);

        let registry = engine.registry();
        let bytes = persist::to_bytes(&world, registry).unwrap();
        let mut resumed = persist::from_bytes(&bytes, registry).unwrap();
        let mut resumed_stage = stage.clone();

        run(&engine, &mut world, &mut stage, 60);
        run(&engine, &mut resumed, &mut resumed_stage, 60);

        prop_assert_eq!(
            persist::to_bytes(&world, registry).unwrap(),
            persist::to_bytes(&resumed, registry).unwrap()
        );
    }
}
