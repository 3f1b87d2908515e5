//! Restart tests against on-disk storage.
//!
//! A first coordinator creates and edits instances, shuts down, and a second
//! one restores from the same directory.

use std::fs;
use std::path::Path;
use std::time::Duration;

use flotilla_core::{FeatureType, InstanceKey, InstanceState, Point, PointerEvent, Rect, Size};
use flotilla_runtime::{Coordinator, FlotillaConfig, HeadlessContainer};
use pretty_assertions::assert_eq;
use web_time::Instant;

const BOUNDS: Size = Size::new(1080.0, 1920.0);

fn config(dir: &Path) -> FlotillaConfig {
    let mut config = FlotillaConfig::default();
    config.storage.directory = Some(dir.to_path_buf());
    config
}

fn coordinator(dir: &Path) -> Coordinator<HeadlessContainer> {
    Coordinator::from_config(&config(dir), HeadlessContainer::new(BOUNDS)).expect("coordinator")
}

fn drag(coordinator: &mut Coordinator<HeadlessContainer>, from: (f32, f32), to: (f32, f32)) {
    let t = Instant::now();
    let ms = Duration::from_millis;
    for event in [
        PointerEvent::down(1, from.0, from.1, t),
        PointerEvent::moved(1, from.0 + 10.0, from.1, t + ms(16)),
        PointerEvent::moved(1, to.0, to.1, t + ms(32)),
        PointerEvent::up(1, to.0, to.1, t + ms(48)),
    ] {
        coordinator.dispatch_pointer(&event).expect("dispatch");
    }
}

#[test]
fn restart_restores_identical_instances() {
    let dir = tempfile::tempdir().expect("tempdir");

    let (keys, states, frames) = {
        let mut first = coordinator(dir.path());
        let mask = first.add_instance(FeatureType::Mask).expect("add");
        let spotlight = first.add_instance(FeatureType::Spotlight).expect("add");
        let light = first.add_instance(FeatureType::SignalLight).expect("add");

        // (200, 200) is covered by the spotlight but not by the signal light.
        drag(&mut first, (200.0, 200.0), (400.0, 500.0));
        first
            .store()
            .update(light, |state| {
                state.highlighted = true;
                state.locked = true;
            })
            .expect("update");
        first.sync_state_changes();
        first.shutdown();

        let keys = vec![mask, spotlight, light];
        let states: Vec<InstanceState> = keys
            .iter()
            .map(|key| first.store().peek(*key).expect("state"))
            .collect();
        let frames: Vec<Rect> = keys
            .iter()
            .map(|key| first.host().frame_of(*key).expect("frame"))
            .collect();
        (keys, states, frames)
    };
    assert_eq!(states[1].position, Point::new(248.0, 396.0));

    let mut second = coordinator(dir.path());
    let report = second.restore();
    assert_eq!(report.restored, keys);
    assert!(report.skipped.is_empty(), "{:?}", report.skipped);

    for ((key, state), frame) in keys.iter().zip(&states).zip(&frames) {
        assert_eq!(second.store().peek(*key).as_ref(), Some(state));
        assert_eq!(second.host().frame_of(*key), Some(*frame));
    }

    // Restored ids are taken; the next allocation continues after them.
    assert_eq!(
        second
            .add_instance(FeatureType::Spotlight)
            .expect("add")
            .id
            .get(),
        2
    );
}

#[test]
fn restore_does_not_rewrite_records() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let mut first = coordinator(dir.path());
        first.add_instance(FeatureType::Spotlight).expect("add");
        first.shutdown();
    }
    let record = dir.path().join("spotlight").join("1.json");
    let before = fs::read_to_string(&record).expect("record");

    let mut second = coordinator(dir.path());
    second.restore();
    second.shutdown();
    assert_eq!(fs::read_to_string(&record).expect("record"), before);
}

#[test]
fn malformed_records_are_skipped_and_freed() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let mut first = coordinator(dir.path());
        first.add_instance(FeatureType::Spotlight).expect("add");
        first.add_instance(FeatureType::Spotlight).expect("add");
        first.shutdown();
    }
    let corrupt = dir.path().join("spotlight").join("2.json");
    fs::write(&corrupt, "{ not json").expect("corrupt");
    fs::write(dir.path().join("spotlight").join("notes.json"), "{}").expect("stray");

    let mut second = coordinator(dir.path());
    let report = second.restore();
    let restored: Vec<u32> = report.restored.iter().map(|key| key.id.get()).collect();
    assert_eq!(restored, vec![1]);

    let skipped: Vec<Option<u32>> = report
        .skipped
        .iter()
        .map(|skip| skip.id.map(|id| id.get()))
        .collect();
    assert_eq!(skipped, vec![None, Some(2)]);
    assert!(report.skipped.iter().all(|skip| skip.feature == FeatureType::Spotlight));

    // The bad slot is free again and its record is gone once flushed.
    let key = second.add_instance(FeatureType::Spotlight).expect("add");
    assert_eq!(key.id.get(), 2);
    second.shutdown();
    let text = fs::read_to_string(&corrupt).expect("rewritten");
    let state: InstanceState = serde_json::from_str(&text).expect("valid record");
    assert_eq!(state, InstanceState::seeded(key));
}

#[test]
fn out_of_range_records_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let mut first = coordinator(dir.path());
        for _ in 0..5 {
            first.add_instance(FeatureType::SignalLight).expect("add");
        }
        first.shutdown();
    }

    let mut config = config(dir.path());
    config.capacity.signal_light = 3;
    let mut second =
        Coordinator::from_config(&config, HeadlessContainer::new(BOUNDS)).expect("coordinator");
    let report = second.restore();

    assert_eq!(report.restored.len(), 3);
    let rejected: Vec<u32> = report
        .skipped
        .iter()
        .filter_map(|skip| skip.id.map(|id| id.get()))
        .collect();
    assert_eq!(rejected, vec![4, 5]);
    second.shutdown();
    assert!(!dir.path().join("signal_light").join("4.json").exists());
}

#[test]
fn ledger_entries_without_records_are_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let mut first = coordinator(dir.path());
        first.add_instance(FeatureType::Mask).expect("add");
        first.add_instance(FeatureType::Mask).expect("add");
        first.shutdown();
    }
    fs::remove_file(dir.path().join("mask").join("2.json")).expect("remove");

    let mut second = coordinator(dir.path());
    let report = second.restore();
    let restored: Vec<InstanceKey> = report.restored.clone();
    assert_eq!(restored.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, "missing record");
    assert_eq!(second.live(FeatureType::Mask), restored);
}

#[test]
fn refused_surface_keeps_the_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let mut first = coordinator(dir.path());
        first.add_instance(FeatureType::Spotlight).expect("add");
        first.shutdown();
    }
    let record = dir.path().join("spotlight").join("1.json");

    let mut second = coordinator(dir.path());
    second.host_mut().container_mut().refuse_next(1);
    let report = second.restore();
    assert!(report.restored.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(second.live(FeatureType::Spotlight).is_empty());
    second.store().flush();
    assert!(record.exists());

    let retry = second.restore();
    assert_eq!(retry.restored.len(), 1);
    assert!(retry.skipped.is_empty(), "{:?}", retry.skipped);
    assert!(second.host().contains(retry.restored[0]));
}
