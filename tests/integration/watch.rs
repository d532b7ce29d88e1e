//! Config watch bridge tests: file events driving re-parses, failure
//! tolerance, and bridge shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tplbuild::{BuildPipeline, ConfigWatchBridge, WatchEvent, WatchHandle, WatchKind};

use crate::common::{config_file, init_tracing, set_of};

/// Poll `check` until it passes or a 2s deadline expires.
async fn wait_for(check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn change_event_triggers_a_reparse() {
    init_tracing();
    let (_dir, path) = config_file(r#"{"config": {"paths": {"front": "./front2"}}}"#);
    let set = set_of([]);
    let pipeline = Arc::new(
        BuildPipeline::new(&path, Vec::<String>::new(), &set)
            .await
            .expect("pipeline construction"),
    );

    let (tx, rx) = mpsc::channel(8);
    let bridge = ConfigWatchBridge::spawn(Arc::clone(&pipeline), rx);

    tx.send(WatchEvent::new(WatchKind::Change, &path))
        .await
        .expect("send event");
    wait_for(|| pipeline.tpl_info().is_some()).await;
    assert_eq!(pipeline.paths().front(), "./front2");

    drop(tx);
    bridge.join().await;
}

#[tokio::test]
async fn add_and_unlink_events_also_trigger_a_reparse() {
    let (_dir, path) = config_file("{}");
    let set = set_of([]);
    let pipeline = Arc::new(
        BuildPipeline::new(&path, Vec::<String>::new(), &set)
            .await
            .expect("pipeline construction"),
    );

    let (tx, rx) = mpsc::channel(8);
    let bridge = ConfigWatchBridge::spawn(Arc::clone(&pipeline), rx);

    tx.send(WatchEvent::new(WatchKind::Add, &path))
        .await
        .expect("send add");
    wait_for(|| pipeline.tpl_info().is_some()).await;

    // An unlink re-parses too; with the file gone the cycle fails but the
    // bridge keeps running.
    std::fs::remove_file(&path).expect("remove config");
    tx.send(WatchEvent::new(WatchKind::Unlink, &path))
        .await
        .expect("send unlink");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(bridge.is_running());

    drop(tx);
    bridge.join().await;
}

#[tokio::test]
async fn bridge_survives_parse_failures() {
    let (_dir, path) = config_file("{ not json");
    let set = set_of([]);
    let pipeline = Arc::new(
        BuildPipeline::new(&path, Vec::<String>::new(), &set)
            .await
            .expect("pipeline construction"),
    );

    let (tx, rx) = mpsc::channel(8);
    let bridge = ConfigWatchBridge::spawn(Arc::clone(&pipeline), rx);

    tx.send(WatchEvent::new(WatchKind::Change, &path))
        .await
        .expect("send bad event");

    // Repair the file; the next event parses cleanly.
    std::fs::write(&path, r#"{"config": {"paths": {"back": "./back2"}}}"#)
        .expect("rewrite config");
    tx.send(WatchEvent::new(WatchKind::Change, &path))
        .await
        .expect("send good event");

    wait_for(|| pipeline.tpl_info().is_some()).await;
    assert_eq!(pipeline.paths().back(), "./back2");
    assert!(bridge.is_running());

    drop(tx);
    bridge.join().await;
}

#[tokio::test]
async fn bridge_stops_when_the_event_channel_closes() {
    let (_dir, path) = config_file("{}");
    let set = set_of([]);
    let pipeline = Arc::new(
        BuildPipeline::new(&path, Vec::<String>::new(), &set)
            .await
            .expect("pipeline construction"),
    );

    let (tx, rx) = mpsc::channel::<WatchEvent>(1);
    let bridge = ConfigWatchBridge::spawn(pipeline, rx);
    assert!(bridge.is_running());

    drop(tx);
    bridge.join().await;
}

#[derive(Default)]
struct FakeWatcher {
    target: Option<PathBuf>,
}

impl WatchHandle for FakeWatcher {
    fn update(&mut self, path: &Path) {
        self.target = Some(path.to_path_buf());
    }
}

#[tokio::test]
async fn watch_retargets_the_handle_at_the_config_path() {
    let (_dir, path) = config_file("{}");
    let set = set_of([]);
    let pipeline = BuildPipeline::new(&path, Vec::<String>::new(), &set)
        .await
        .expect("pipeline construction");

    let mut watcher = FakeWatcher::default();
    pipeline.watch(&mut watcher);
    assert_eq!(watcher.target.as_deref(), Some(path.as_path()));
}
