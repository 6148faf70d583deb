//! Watch mode tests: change detection drives targeted re-syncs

use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use ksync_core::{ChangeReason, SyncEngine, SyncOptions, WatchLoop, WatchSnapshot, detect_changes};
use ksync_test_utils::{FakeRemote, KnowledgeFixture};
use pretty_assertions::assert_eq;

fn reference(path: &Path) -> String {
    path.display().to_string()
}

fn synced_engine(fixture: &KnowledgeFixture, remote: &FakeRemote) -> SyncEngine {
    let mut engine =
        SyncEngine::new(fixture.settings(), Box::new(remote.clone())).expect("engine should build");
    engine.sync_all(SyncOptions::default()).unwrap();
    engine
}

#[test]
fn test_source_edit_resyncs_only_its_collection() {
    let fixture = KnowledgeFixture::new();
    let a = fixture.source("a.md", "alpha");
    let b = fixture.source("b.md", "beta");
    fixture.define("first", &[&reference(&a)]);
    fixture.define("second", &[&reference(&b)]);
    let remote = FakeRemote::new();
    let mut engine = synced_engine(&fixture, &remote);
    let baseline = WatchSnapshot::capture(&engine).unwrap();
    remote.clear_calls();

    fixture.source("b.md", "beta, revised");
    let mut watch = WatchLoop::new(&mut engine, Duration::from_secs(1), SyncOptions::default());
    let (next, report) = watch.poll_once(&baseline).unwrap();

    assert_eq!(report.collections.len(), 1);
    assert_eq!(report.collections[0].collection, "second");
    assert_eq!(report.totals().updated, 1);
    assert_eq!(remote.uploads_of("a.md"), 0);

    let (_, quiet) = watch.poll_once(&next).unwrap();
    assert!(quiet.collections.is_empty());
}

#[test]
fn test_settled_state_detects_nothing() {
    let fixture = KnowledgeFixture::new();
    let a = fixture.source("a.md", "alpha");
    fixture.define("handbook", &[&reference(&a)]);
    let remote = FakeRemote::new();
    let engine = synced_engine(&fixture, &remote);

    let snapshot = WatchSnapshot::capture(&engine).unwrap();

    assert!(detect_changes(&snapshot, &snapshot, engine.cache()).is_empty());
}

#[test]
fn test_new_definition_is_synced() {
    let fixture = KnowledgeFixture::new();
    let a = fixture.source("a.md", "alpha");
    fixture.define("handbook", &[&reference(&a)]);
    let remote = FakeRemote::new();
    let mut engine = synced_engine(&fixture, &remote);
    let baseline = WatchSnapshot::capture(&engine).unwrap();

    let b = fixture.source("b.md", "beta");
    fixture.define("runbooks", &[&reference(&b)]);
    let current = WatchSnapshot::capture(&engine).unwrap();
    let changes = detect_changes(&baseline, &current, engine.cache());
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].reason, ChangeReason::NewDefinition);

    let (_, report) = WatchLoop::new(&mut engine, Duration::from_secs(1), SyncOptions::default())
        .poll_once(&baseline)
        .unwrap();
    assert_eq!(report.collection("runbooks").unwrap().counts().added, 1);
    assert!(remote.attached("runbooks").contains_key("b.md"));
}

#[test]
fn test_dropped_reference_triggers_removal() {
    let fixture = KnowledgeFixture::new();
    let a = fixture.source("a.md", "alpha");
    let b = fixture.source("b.md", "beta");
    fixture.define("handbook", &[&reference(&a), &reference(&b)]);
    let remote = FakeRemote::new();
    let mut engine = synced_engine(&fixture, &remote);
    let baseline = WatchSnapshot::capture(&engine).unwrap();

    fixture.remove_source("b.md");
    let (_, report) = WatchLoop::new(&mut engine, Duration::from_secs(1), SyncOptions::default())
        .poll_once(&baseline)
        .unwrap();

    assert_eq!(report.totals().removed, 1);
    assert!(!remote.attached("handbook").contains_key("b.md"));
}

#[test]
fn test_emptied_definition_detaches_its_last_file() {
    let fixture = KnowledgeFixture::new();
    let a = fixture.source("a.md", "alpha");
    fixture.define("handbook", &[&reference(&a)]);
    let remote = FakeRemote::new();
    let mut engine = synced_engine(&fixture, &remote);
    let baseline = WatchSnapshot::capture(&engine).unwrap();

    fixture.define("handbook", &[]);
    let (_, report) = WatchLoop::new(&mut engine, Duration::from_secs(1), SyncOptions::default())
        .poll_once(&baseline)
        .unwrap();

    assert_eq!(report.totals().removed, 1);
    assert!(remote.attached("handbook").is_empty());
    assert!(engine.cache().collection("handbook").is_none());
}

#[test]
fn test_missing_source_mount_is_not_a_change() {
    let fixture = KnowledgeFixture::new();
    let a = fixture.source("a.md", "alpha");
    fixture.define("handbook", &[&reference(&a)]);
    let remote = FakeRemote::new();
    let engine = synced_engine(&fixture, &remote);
    let baseline = WatchSnapshot::capture(&engine).unwrap();

    fixture.remove_source("a.md");
    let current = WatchSnapshot::capture(&engine).unwrap();

    assert!(current.definitions["handbook"].unavailable);
    assert!(detect_changes(&baseline, &current, engine.cache()).is_empty());
}

#[test]
fn test_dry_run_watch_does_not_mutate() {
    let fixture = KnowledgeFixture::new();
    let a = fixture.source("a.md", "alpha");
    fixture.define("handbook", &[&reference(&a)]);
    let remote = FakeRemote::new();
    let mut engine = synced_engine(&fixture, &remote);
    let baseline = WatchSnapshot::capture(&engine).unwrap();
    let cache_before = fixture.cache_bytes();
    remote.clear_calls();

    fixture.source("a.md", "alpha, revised");
    let options = SyncOptions {
        dry_run: true,
        ..SyncOptions::default()
    };
    let (_, report) = WatchLoop::new(&mut engine, Duration::from_secs(1), options)
        .poll_once(&baseline)
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.totals().updated, 1);
    assert_eq!(remote.mutation_count(), 0);
    assert_eq!(fixture.cache_bytes(), cache_before);
}

#[test]
fn test_stop_flag_ends_the_loop() {
    let fixture = KnowledgeFixture::new();
    let a = fixture.source("a.md", "alpha");
    fixture.define("handbook", &[&reference(&a)]);
    let remote = FakeRemote::new();
    let mut engine = synced_engine(&fixture, &remote);

    let mut watch = WatchLoop::new(&mut engine, Duration::from_secs(3600), SyncOptions::default());
    let stop = watch.stop_handle();
    let started = Instant::now();
    std::thread::scope(|scope| {
        scope.spawn(|| {
            std::thread::sleep(Duration::from_millis(100));
            stop.store(true, Ordering::SeqCst);
        });
        watch.run(|_| panic!("no pass should run")).unwrap();
    });

    assert!(started.elapsed() < Duration::from_secs(5));
}
