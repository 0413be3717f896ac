//! Operation laws: idempotence, pause round-trips, gain composition,
//! handle safety, and the degraded paths.

use glam::Vec3;

use cuedeck_core::{CategoryOption, SoundCategory, SoundOption};

use crate::config::MAX_SOURCES;
use crate::cue::{CueElement, CueState};
use crate::tests::harness::{assert_engine_invariants, engine, load_short, load_streamed};

#[test]
fn stop_is_idempotent() {
    let (mut engine, _backend) = engine();
    let a = load_short(&mut engine, "a", 8820);
    let cue = engine
        .create_cue(&[CueElement::once(a)], SoundCategory::Sfx, 10, None)
        .expect("cue creation failed");
    let handle = engine.play(cue).expect("play rejected");

    assert!(engine.stop(handle));
    let info_after_first = serde_json::to_string(&engine.info()).expect("serialize failed");
    assert!(!engine.stop(handle));
    let info_after_second = serde_json::to_string(&engine.info()).expect("serialize failed");
    assert_eq!(info_after_first, info_after_second);
    assert_engine_invariants(&engine);
}

#[test]
fn pause_and_start_are_idempotent() {
    let (mut engine, backend) = engine();
    let a = load_short(&mut engine, "a", 44_100);
    let cue = engine
        .create_cue(
            &[CueElement { sound: a, loops: 10 }],
            SoundCategory::Sfx,
            10,
            None,
        )
        .expect("cue creation failed");
    let handle = engine.play(cue).expect("play rejected");
    let voice = engine.info().playing[0].voice;

    assert!(engine.pause(handle));
    assert!(engine.pause(handle));
    assert_eq!(
        backend.voice_state_of(voice),
        crate::backend::VoiceState::Paused
    );

    assert!(engine.start(handle));
    assert!(engine.start(handle));
    assert_eq!(
        backend.voice_state_of(voice),
        crate::backend::VoiceState::Playing
    );
    assert_engine_invariants(&engine);
}

#[test]
fn bulk_pause_round_trip_leaves_user_paused_cues_alone() {
    let (mut engine, _backend) = engine();
    let a = load_short(&mut engine, "a", 44_100);
    let make = |engine: &mut crate::engine::SoundEngine| {
        let cue = engine
            .create_cue(
                &[CueElement { sound: a, loops: 10 }],
                SoundCategory::Sfx,
                10,
                None,
            )
            .expect("cue creation failed");
        engine.play(cue).expect("play rejected")
    };
    let running = make(&mut engine);
    let user_paused = make(&mut engine);
    assert!(engine.pause(user_paused));

    let suspended = engine.pause_all();
    assert_eq!(suspended, vec![running], "only the running cue is affected");

    let resumed = engine.start_all();
    assert_eq!(resumed, vec![running]);

    let info = engine.info();
    let paused_flags: Vec<(u32, bool)> = info
        .playing
        .iter()
        .map(|cue| (cue.slot, cue.paused))
        .collect();
    assert!(
        paused_flags.contains(&(user_paused.slot(), true)),
        "user-paused cue must stay paused"
    );
    assert!(paused_flags.contains(&(running.slot(), false)));
    assert_engine_invariants(&engine);
}

#[test]
fn category_ops_only_touch_their_category() {
    let (mut engine, _backend) = engine();
    let a = load_short(&mut engine, "a", 44_100);
    let sfx = engine
        .create_cue(
            &[CueElement { sound: a, loops: 10 }],
            SoundCategory::Sfx,
            10,
            None,
        )
        .expect("cue creation failed");
    let music = engine
        .create_cue(
            &[CueElement { sound: a, loops: 10 }],
            SoundCategory::Music,
            10,
            None,
        )
        .expect("cue creation failed");
    let sfx_handle = engine.play(sfx).expect("play rejected");
    let music_handle = engine.play(music).expect("play rejected");

    let paused = engine.pause_category(SoundCategory::Music);
    assert_eq!(paused, vec![music_handle]);

    engine.stop_category(SoundCategory::Sfx);
    assert_eq!(engine.cue_state(sfx_handle), None);
    assert_eq!(engine.cue_state(music_handle), Some(CueState::Playing));

    let resumed = engine.start_category(SoundCategory::Music);
    assert_eq!(resumed, vec![music_handle]);
    assert_engine_invariants(&engine);
}

#[test]
fn composed_gain_reaches_the_voice_exactly() {
    let (mut engine, backend) = engine();
    let a = load_short(&mut engine, "a", 44_100);
    let cue = engine
        .create_cue(
            &[CueElement { sound: a, loops: 10 }],
            SoundCategory::Sfx,
            10,
            None,
        )
        .expect("cue creation failed");
    let handle = engine.play(cue).expect("play rejected");
    let voice = engine.info().playing[0].voice;

    engine.set_category_gain(
        SoundCategory::Sfx,
        CategoryOption {
            user_gain: 0.5,
            game_gain: 0.8,
        },
    );
    engine.set_master_gain(CategoryOption {
        user_gain: 0.9,
        game_gain: 0.7,
    });
    engine.set_option(
        handle,
        SoundOption {
            gain: 0.6,
            position: Vec3::new(1.0, 2.0, 3.0),
            velocity: Vec3::ZERO,
        },
    );
    engine.update();

    let expected = 0.6f32 * 0.5 * 0.8 * 0.9 * 0.7;
    assert_eq!(backend.voice_gain(voice), expected);
    assert_eq!(backend.voice_position(voice), Vec3::new(1.0, 2.0, 3.0));
    assert_engine_invariants(&engine);
}

#[test]
fn relative_mode_is_set_at_instantiation() {
    let (mut engine, backend) = engine();
    let a = load_short(&mut engine, "a", 8820);
    let cue = engine
        .create_cue(&[CueElement::once(a)], SoundCategory::Ui, 10, None)
        .expect("cue creation failed");
    engine.play(cue).expect("play rejected");
    let voice = engine.info().playing[0].voice;
    assert!(backend.voice_is_relative(voice));
}

#[test]
fn stale_handle_never_aliases_a_reused_slot() {
    let (mut engine, _backend) = engine();
    let a = load_short(&mut engine, "a", 44_100);
    let cue = engine
        .create_cue(
            &[CueElement { sound: a, loops: 10 }],
            SoundCategory::Sfx,
            10,
            None,
        )
        .expect("cue creation failed");

    let first = engine.play(cue).expect("play rejected");
    assert!(engine.stop(first));

    // The next instance reuses the freed slot; the old handle stays dead.
    let second = engine.play(cue).expect("play rejected");
    assert_eq!(second.slot(), first.slot());
    assert_eq!(engine.cue_state(first), None);
    assert!(engine.cue_state(second).is_some());
    assert!(!engine.pause(first));
    assert!(!engine.start(first));
    assert!(!engine.interrupt(first));
    assert!(!engine.set_option(first, SoundOption::default()));
}

#[test]
fn cue_creation_omits_mismatched_and_unknown_sounds() {
    let (mut engine, _backend) = engine();
    let mono = load_short(&mut engine, "mono", 8820);
    let stereo = load_streamed(&mut engine, "stereo", 8820, 2);
    let ghost = cuedeck_core::SoundId::new("never-loaded");

    let cue = engine
        .create_cue(
            &[
                CueElement::once(mono),
                CueElement::once(stereo),
                CueElement::once(ghost),
            ],
            SoundCategory::Sfx,
            10,
            None,
        )
        .expect("cue creation failed");
    engine.play(cue).expect("play rejected");
    assert_eq!(engine.info().playing[0].sounds.len(), 1);

    // A cue of nothing usable is not created at all.
    assert!(
        engine
            .create_cue(&[CueElement::once(ghost)], SoundCategory::Sfx, 10, None)
            .is_none()
    );
}

#[test]
fn mismatched_interrupt_sound_is_dropped_at_creation() {
    let (mut engine, _backend) = engine();
    let mono = load_short(&mut engine, "mono", 8820);
    let stereo = load_streamed(&mut engine, "stereo", 8820, 2);

    let cue = engine
        .create_cue(&[CueElement::once(mono)], SoundCategory::Sfx, 10, Some(stereo))
        .expect("cue creation failed");
    let handle = engine.play(cue).expect("play rejected");

    // With the interrupt sound dropped, interrupt degenerates to stop.
    assert!(engine.interrupt(handle));
    assert_eq!(engine.cue_state(handle), None);
}

#[test]
fn backend_refusal_during_play_unwinds_cleanly() {
    let (mut engine, backend) = engine();
    let a = load_short(&mut engine, "a", 8820);
    let cue = engine
        .create_cue(&[CueElement::once(a)], SoundCategory::Sfx, 10, None)
        .expect("cue creation failed");

    backend.fail_next_gen_buffers();
    assert!(engine.play(cue).is_none());
    assert_eq!(engine.info().free_voices.len(), MAX_SOURCES);
    assert_eq!(backend.live_buffer_count(), 0);
    assert_engine_invariants(&engine);

    // The engine keeps working afterwards.
    assert!(engine.play(cue).is_some());
}

#[test]
fn info_snapshot_serializes() {
    let (mut engine, _backend) = engine();
    let a = load_short(&mut engine, "a", 8820);
    let s = load_streamed(&mut engine, "s", 44_100, 1);
    let cue = engine
        .create_cue(
            &[CueElement::once(a), CueElement::once(s)],
            SoundCategory::Dialog,
            3,
            None,
        )
        .expect("cue creation failed");
    engine.play(cue).expect("play rejected");

    let json = serde_json::to_value(engine.info()).expect("serialize failed");
    assert_eq!(json["voices"].as_array().map(Vec::len), Some(MAX_SOURCES));
    assert_eq!(json["playing"].as_array().map(Vec::len), Some(1));
    assert_eq!(json["sounds"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["playing"][0]["sounds"].as_array().map(Vec::len), Some(2));
}
