//! Dispatcher and call/return contract.
//!
//! Covers the observable guarantees routines rely on: synchronous START and
//! RESUME, continuation tags, bounded depth, fault recovery, tick order and
//! strictly sequential delivery.

mod common;

use common::*;
use couchette_scripting::{
    Action, ActorId, ActorStatus, CallArgs, ContinuationTag, Delivery, EngineConfig, Frame,
    InterruptPolicy, Letter, Message, Phase, ScriptError, Signal, Subscription, Token, MAX_DEPTH,
};

#[test]
fn noop_call_and_return_leaves_idle_state_untouched() {
    let mut scene = Scene::new();
    let actor = scene.spawn(1, HOLD);
    scene.tick(2);
    let before = scene.world.actor(actor).unwrap().clone();

    scene.call(actor, 7, NOOP, [1, 2]).unwrap();

    assert_eq!(scene.world.actor(actor).unwrap(), &before);
}

#[test]
fn resume_carries_the_tag_chosen_by_the_caller() {
    let mut scene = Scene::new();
    let actor = scene.spawn(1, IDLE);
    scene.call(actor, 0, ERRAND, [0, 0]).unwrap();

    // START of the errand synchronously started the walk underneath it.
    assert_eq!(scene.depth(actor), 2);
    assert_eq!(scene.world.actor(actor).unwrap().active_handler(), WALK);
    let walk = scene.world.actor(actor).unwrap().stack().top();
    assert_eq!(walk.tag, ContinuationTag(2));
    assert_eq!(walk.params[0], 8200);

    scene.tick(40);

    assert_eq!(scene.world.actor(actor).unwrap().position.offset, 8200);
    assert_eq!(scene.memory(actor, LAST_TAG), 5);
    assert_eq!(scene.depth(actor), 0);
}

#[test]
fn resume_after_walk_branches_on_tag_two() {
    let mut scene = Scene::new();
    let actor = scene.spawn(1, IDLE);
    scene.call(actor, 0, ERRAND, [0, 0]).unwrap();

    let mut saw_tag_two = false;
    for _ in 0..40 {
        scene.tick(1);
        if scene.memory(actor, LAST_TAG) == 2 {
            saw_tag_two = true;
            assert_eq!(scene.world.actor(actor).unwrap().active_handler(), WAIT);
            break;
        }
    }
    assert!(saw_tag_two, "errand never resumed from its walk");
}

#[test]
fn call_at_max_depth_overflows_and_keeps_frames() {
    let mut scene = Scene::new();
    let actor = scene.spawn(1, IDLE);
    for level in 1..=MAX_DEPTH {
        scene.call(actor, i32::from(level), HOLD, [i32::from(level), 0]).unwrap();
    }
    assert_eq!(scene.depth(actor), MAX_DEPTH);
    let before = scene.world.actor(actor).unwrap().stack().clone();

    let err = scene.call(actor, 99, HOLD, [0, 0]).unwrap_err();

    assert_eq!(
        err,
        ScriptError::StackOverflow {
            actor,
            depth: MAX_DEPTH
        }
    );
    assert_eq!(scene.world.actor(actor).unwrap().stack(), &before);
}

#[test]
fn overflow_inside_a_nested_chain_resets_only_that_actor() {
    let mut scene = Scene::new();
    let diver = scene.spawn(1, IDLE);
    let bystander = scene.spawn(2, IDLE);
    scene.call(bystander, 4, HOLD, [0, 0]).unwrap();

    scene.call(diver, 0, DIVE, [0, 0]).unwrap();

    assert_eq!(scene.depth(diver), 0);
    assert_eq!(scene.world.actor(diver).unwrap().active_handler(), IDLE);
    assert_eq!(scene.depth(bystander), 1);
    scene.tick(1);
    assert_eq!(scene.memory(diver, TICKS_SEEN), 1);
}

#[test]
fn return_at_idle_level_never_underflows() {
    let mut scene = Scene::new();
    let actor = scene.spawn(1, IDLE);

    let err = scene
        .engine
        .ret(&mut scene.world, &mut scene.stage, actor)
        .unwrap_err();
    assert_eq!(err, ScriptError::MissingContinuation { actor });
    assert_eq!(scene.depth(actor), 0);

    // Same fault raised by a routine is recovered and logged.
    let early = scene.spawn(2, RETURN_EARLY);
    assert_eq!(scene.depth(early), 0);
    scene.tick(1);
    assert_eq!(scene.depth(early), 0);
}

#[test]
fn calling_an_unregistered_routine_is_rejected_before_pushing() {
    let mut scene = Scene::new();
    let actor = scene.spawn(1, IDLE);

    let err = scene.call(actor, 1, GHOST, [0, 0]).unwrap_err();
    assert_eq!(
        err,
        ScriptError::UnknownHandler {
            actor,
            handler: GHOST
        }
    );
    assert_eq!(scene.depth(actor), 0);

    let faulty = scene.spawn(2, IDLE);
    scene.call(faulty, 3, CALLS_GHOST, [0, 0]).unwrap();
    assert_eq!(scene.depth(faulty), 0);
}

#[test]
fn messages_to_missing_or_vanished_actors_are_dropped() {
    let mut scene = Scene::new();
    let actor = scene.spawn(1, IDLE);
    let knock = |to| Message::new(actor, to, Signal::Knock.into(), 0);

    let delivery = scene
        .engine
        .dispatch(&mut scene.world, &mut scene.stage, knock(ActorId(77)));
    assert_eq!(delivery, Delivery::Dropped);

    scene.engine.vanish(&mut scene.world, actor);
    let delivery = scene
        .engine
        .dispatch(&mut scene.world, &mut scene.stage, knock(actor));
    assert_eq!(delivery, Delivery::Dropped);
    scene.tick(3);
    assert_eq!(scene.memory(actor, KNOCKS), 0);
    assert_eq!(scene.memory(actor, TICKS_SEEN), 0);
}

#[test]
fn live_actors_tick_in_ascending_id_order() {
    let mut scene = Scene::new();
    for id in [9, 2, 5] {
        scene.spawn(id, IDLE);
    }
    scene.world.journal_mut().unwrap().drain();

    scene.tick(1);

    let order: Vec<u16> = scene
        .world
        .journal()
        .unwrap()
        .entries()
        .iter()
        .filter(|e| e.phase == Phase::Begin && e.action == Action::TICK_CODE)
        .map(|e| e.recipient.0)
        .collect();
    assert_eq!(order, vec![2, 5, 9]);
}

#[test]
fn two_narrative_messages_in_one_tick_never_interleave() {
    let mut scene = Scene::new();
    let greeter = scene.spawn(1, GREETER);
    let doorman = scene.spawn(2, DOORMAN);
    let knock = Letter {
        sender: greeter,
        recipient: doorman,
        signal: Signal::Knock,
        param: 0,
    };
    assert!(scene.engine.send(&mut scene.world, knock));
    assert!(scene.engine.send(&mut scene.world, knock));
    scene.world.journal_mut().unwrap().drain();

    scene.tick(1);

    let journal = scene.world.journal().unwrap();
    assert!(journal.is_well_nested_for(doorman));
    let doorman_phases: Vec<(Phase, u32)> = journal
        .entries()
        .iter()
        .filter(|e| e.recipient == doorman && e.action == Signal::Knock.code())
        .map(|e| (e.phase, e.action))
        .collect();
    assert_eq!(
        doorman_phases,
        vec![
            (Phase::Begin, Signal::Knock.code()),
            (Phase::End, Signal::Knock.code()),
            (Phase::Begin, Signal::Knock.code()),
            (Phase::End, Signal::Knock.code()),
        ]
    );
    // Each answer was delivered before the second knock began.
    let answers: Vec<i32> = journal
        .entries()
        .iter()
        .filter(|e| e.recipient == greeter && e.phase == Phase::Begin && e.action == Signal::OpenDoor.code())
        .map(|e| e.param)
        .collect();
    assert_eq!(answers, vec![1, 2]);
    assert_eq!(scene.memory(greeter, GREETINGS), 2);
}

#[test]
fn interrupt_at_depth_three_returns_to_the_same_frame() {
    let mut scene = Scene::new();
    let actor = scene.spawn(1, IDLE);
    for level in 1..=3 {
        scene.call(actor, level, HOLD, [level * 10, 0]).unwrap();
    }
    scene.tick(2);
    let buried: Frame = *scene.world.actor(actor).unwrap().stack().top();

    let accepted = scene
        .engine
        .interrupt(&mut scene.world, &mut scene.stage, actor, ALARM, CallArgs::NONE)
        .unwrap();
    assert!(accepted);
    assert_eq!(scene.depth(actor), 4);
    assert_eq!(scene.memory(actor, ALARMS), 1);

    // The alarm returns on its first TICK. The held frame gets
    // Resume(INTERRUPT), which `hold` ignores.
    scene.tick(1);
    assert_eq!(scene.depth(actor), 3);
    assert_eq!(scene.world.actor(actor).unwrap().stack().top(), &buried);
    assert!(scene.world.journal().unwrap().entries().iter().any(|e| {
        e.recipient == actor
            && e.phase == Phase::Begin
            && e.action == Action::RESUME_CODE
    }));

    // The buried routine simply carries on.
    scene.tick(1);
    assert_eq!(
        scene.world.actor(actor).unwrap().stack().top().params[7],
        buried.params[7] + 1
    );
}

#[test]
fn every_return_resumes_the_caller() {
    let mut scene = Scene::new();
    let actor = scene.spawn(1, IDLE);

    scene.call(actor, 7, NOOP, [0, 0]).unwrap();
    assert_eq!(scene.memory(actor, RESUMES), 1);
    assert_eq!(scene.memory(actor, RESUMED_TAG), 7);

    scene
        .engine
        .interrupt(&mut scene.world, &mut scene.stage, actor, ALARM, CallArgs::NONE)
        .unwrap();
    scene.tick(1);
    assert_eq!(scene.depth(actor), 0);
    assert_eq!(scene.memory(actor, RESUMES), 2);
    assert_eq!(scene.memory(actor, RESUMED_TAG), i32::MIN);
}

#[test]
fn ordinary_calls_cannot_use_the_interrupt_tag() {
    let mut scene = Scene::new();
    let actor = scene.spawn(1, IDLE);
    scene.call(actor, 3, HOLD, [0, 0]).unwrap();
    let before = scene.world.actor(actor).unwrap().clone();

    let err = scene.call(actor, i32::MIN, NOOP, [0, 0]).unwrap_err();

    assert_eq!(
        err,
        ScriptError::ReservedTag {
            actor,
            tag: ContinuationTag::INTERRUPT
        }
    );
    assert_eq!(scene.world.actor(actor).unwrap(), &before);
    assert!(!scene.world.actor(actor).unwrap().stack().has_pending_interrupt());
}

#[test]
fn interrupting_a_full_stack_is_refused_to_the_sender() {
    let mut scene = Scene::new();
    let target = scene.spawn(1, IDLE);
    let siren = scene.spawn(2, SIREN);
    for level in 1..=MAX_DEPTH {
        scene.call(target, i32::from(level), HOLD, [0, 0]).unwrap();
    }
    let before = scene.world.actor(target).unwrap().stack().clone();

    let accepted = scene
        .engine
        .interrupt(&mut scene.world, &mut scene.stage, target, ALARM, CallArgs::NONE)
        .unwrap();
    assert!(!accepted);

    let knock = Message::new(siren, siren, Signal::Knock.into(), i32::from(target.0));
    let delivery = scene.engine.dispatch(&mut scene.world, &mut scene.stage, knock);

    assert_eq!(delivery, Delivery::Delivered);
    assert_eq!(scene.memory(siren, SIREN_ANSWER), -1);
    assert_eq!(scene.world.actor(target).unwrap().stack(), &before);
    assert_eq!(scene.memory(target, ALARMS), 0);
}

#[test]
fn nested_interrupts_follow_the_configured_policy() {
    let mut nest = Scene::new();
    let actor = nest.spawn(1, IDLE);
    for _ in 0..2 {
        let accepted = nest
            .engine
            .interrupt(&mut nest.world, &mut nest.stage, actor, ALARM, CallArgs::NONE)
            .unwrap();
        assert!(accepted);
    }
    assert_eq!(nest.depth(actor), 2);

    let mut refuse = Scene::with_engine(engine_with(EngineConfig {
        interrupt_policy: InterruptPolicy::Refuse,
        ..EngineConfig::default()
    }));
    let actor = refuse.spawn(1, IDLE);
    let first = refuse
        .engine
        .interrupt(&mut refuse.world, &mut refuse.stage, actor, ALARM, CallArgs::NONE)
        .unwrap();
    let second = refuse
        .engine
        .interrupt(&mut refuse.world, &mut refuse.stage, actor, ALARM, CallArgs::NONE)
        .unwrap();
    assert!(first);
    assert!(!second);
    assert_eq!(refuse.depth(actor), 1);
    assert_eq!(refuse.memory(actor, ALARMS), 1);
}

#[test]
fn transfer_keeps_depth_and_tag() {
    let mut scene = Scene::new();
    let actor = scene.spawn(1, IDLE);
    scene.call(actor, 6, HOLD, [0, 0]).unwrap();

    scene
        .engine
        .transfer(&mut scene.world, &mut scene.stage, actor, WAIT, [9].into())
        .unwrap();

    let top = *scene.world.actor(actor).unwrap().stack().top();
    assert_eq!(scene.depth(actor), 1);
    assert_eq!(top.handler, WAIT);
    assert_eq!(top.tag, ContinuationTag(6));
    assert_eq!(top.params[0], 9);
}

#[test]
fn force_jump_resets_the_stack_and_revives() {
    let mut scene = Scene::new();
    let actor = scene.spawn(1, HOLD);
    scene.call(actor, 1, HOLD, [0, 0]).unwrap();
    scene.call(actor, 2, HOLD, [0, 0]).unwrap();
    scene.world.actor_mut(actor).unwrap().token = Token::new(4);
    scene.engine.vanish(&mut scene.world, actor);

    scene
        .engine
        .force_jump(&mut scene.world, &mut scene.stage, actor, IDLE)
        .unwrap();

    let body = scene.world.actor(actor).unwrap();
    assert!(body.is_live());
    assert!(!body.status.contains(ActorStatus::VANISHED));
    assert_eq!(body.depth(), 0);
    assert_eq!(body.active_handler(), IDLE);
    assert_eq!(body.token, None);
    assert_eq!(body.memory[STARTS], 1);
}

#[test]
fn queued_letters_respect_subscriptions_and_capacity() {
    let mut scene = Scene::with_engine(engine_with(EngineConfig {
        max_queued_messages: 2,
        ..EngineConfig::default()
    }));
    let a = scene.spawn(1, IDLE);
    let b = scene.spawn(2, IDLE);
    let c = scene.spawn(3, IDLE);
    assert!(scene.world.subscribe(Subscription {
        recipient: c,
        signal: Signal::Knock,
        slot: 9,
    }));

    let queued = scene.engine.broadcast(&mut scene.world, a, Signal::Knock, 0);
    assert_eq!(queued, 2);
    assert_eq!(scene.engine.broadcast(&mut scene.world, a, Signal::Knock, 0), 0);

    // Nothing is delivered until the next tick.
    assert_eq!(scene.memory(b, KNOCKS), 0);
    let report = scene.engine.tick(&mut scene.world, &mut scene.stage);

    assert_eq!(report.absorbed, 1);
    assert_eq!(scene.memory(b, KNOCKS), 1);
    assert_eq!(scene.memory(c, KNOCKS), 0);
    assert_eq!(scene.memory(c, 9), 1);
    assert_eq!(scene.memory(a, KNOCKS), 0);
}

#[test]
fn cutscene_halts_ticks_until_it_finishes() {
    let mut scene = Scene::new();
    let owner = scene.spawn(1, IDLE);
    let other = scene.spawn(2, IDLE);

    scene
        .engine
        .begin_cutscene(&mut scene.world, &mut scene.stage, owner, 40);
    let time_before = scene.world.game_time();

    let first = scene.engine.tick(&mut scene.world, &mut scene.stage);
    let second = scene.engine.tick(&mut scene.world, &mut scene.stage);
    assert!(first.halted && second.halted);
    assert_eq!(scene.memory(other, TICKS_SEEN), 0);
    assert_eq!(scene.world.game_time(), time_before);
    assert!(scene
        .world
        .actor(owner)
        .unwrap()
        .status
        .contains(ActorStatus::IN_CUTSCENE));

    let third = scene.engine.tick(&mut scene.world, &mut scene.stage);
    assert!(!third.halted);
    assert!(scene.world.cutscene().is_none());
    assert_eq!(scene.memory(other, TICKS_SEEN), 1);
    assert!(scene.world.journal().unwrap().entries().iter().any(|e| {
        e.recipient == owner && e.action == Signal::CutsceneFinished.code() && e.param == 40
    }));
}

#[test]
fn cutscene_started_by_a_letter_holds_the_rest_of_the_queue() {
    let mut scene = Scene::new();
    let director = scene.spawn(1, DIRECTOR);
    let bystander = scene.spawn(2, IDLE);
    let cue = Letter {
        sender: bystander,
        recipient: director,
        signal: Signal::Knock,
        param: 40,
    };
    let late = Letter {
        sender: director,
        recipient: bystander,
        signal: Signal::Knock,
        param: 0,
    };
    assert!(scene.engine.send(&mut scene.world, cue));
    assert!(scene.engine.send(&mut scene.world, late));

    let report = scene.engine.tick(&mut scene.world, &mut scene.stage);

    assert!(report.halted);
    assert_eq!(report.delivered, 1);
    assert!(scene.world.cutscene().is_some());
    assert_eq!(scene.memory(bystander, KNOCKS), 0);
    assert_eq!(scene.memory(bystander, TICKS_SEEN), 0);
    assert_eq!(scene.world.queued().copied().collect::<Vec<_>>(), vec![late]);

    for _ in 0..8 {
        if scene.world.cutscene().is_none() {
            break;
        }
        scene.tick(1);
    }
    assert!(scene.world.cutscene().is_none());
    assert_eq!(scene.memory(bystander, KNOCKS), 1);
    assert_eq!(scene.world.queued().count(), 0);
}
