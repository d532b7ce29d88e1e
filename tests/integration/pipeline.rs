//! End-to-end build pipeline tests: full cycles over on-disk config files,
//! hook ordering across extensions, header lifecycle, and config errors.

use std::time::Duration;

use tplbuild::{BuildPipeline, Capabilities, Error};

use crate::common::{config_file, cycle_caps, init_tracing, set_of, ProbeExtension, Recorder};

#[tokio::test]
async fn full_cycle_runs_hooks_in_registration_order() {
    init_tracing();
    let (_dir, path) = config_file("{}");
    let recorder = Recorder::default();
    let set = set_of(["a", "b", "c"].map(|tag| ProbeExtension::new(tag, cycle_caps(), &recorder)));

    let pipeline = BuildPipeline::new(&path, ["a", "b", "c"], &set)
        .await
        .expect("pipeline construction");
    pipeline.parse_tpl_info().await.expect("build cycle");

    // Creation hooks first, then per stage in registration order, and every
    // build hook strictly after every header hook.
    assert_eq!(
        recorder.snapshot(),
        vec![
            "a.on_create",
            "b.on_create",
            "c.on_create",
            "a.on_tpl_changed",
            "b.on_tpl_changed",
            "c.on_tpl_changed",
            "a.on_build_header",
            "b.on_build_header",
            "c.on_build_header",
            "a.on_build",
            "b.on_build",
            "c.on_build",
        ]
    );
}

#[tokio::test]
async fn config_paths_override_only_named_keys() {
    let (_dir, path) = config_file(r#"{"config": {"paths": {"front": "./front2"}}}"#);
    let set = set_of([]);

    let pipeline = BuildPipeline::new(&path, Vec::<String>::new(), &set)
        .await
        .expect("pipeline construction");
    pipeline.parse_tpl_info().await.expect("build cycle");

    let paths = pipeline.paths();
    assert_eq!(paths.front(), "./front2");
    assert_eq!(paths.index(), "./");
    assert_eq!(paths.back(), "./");
}

#[tokio::test]
async fn malformed_config_leaves_state_unchanged() {
    let (_dir, path) = config_file(r#"{"config": {"paths": {"front": "./front2"}}}"#);
    let set = set_of([]);

    let pipeline = BuildPipeline::new(&path, Vec::<String>::new(), &set)
        .await
        .expect("pipeline construction");
    pipeline.parse_tpl_info().await.expect("first cycle");
    let before = pipeline.tpl_info().expect("parsed config");

    std::fs::write(&path, "{ not json").expect("overwrite config");
    let err = pipeline.parse_tpl_info().await.expect_err("parse failure");
    assert!(matches!(err, Error::ConfigParse { .. }), "got {err:?}");

    // Previous parse results survive the failed cycle.
    assert_eq!(pipeline.paths().front(), "./front2");
    let after = pipeline.tpl_info().expect("still present");
    assert!(std::sync::Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn missing_config_is_a_read_error() {
    let (dir, path) = config_file("{}");
    std::fs::remove_file(&path).expect("remove config");
    let set = set_of([]);

    let pipeline = BuildPipeline::new(dir.path().join("tpl.json"), Vec::<String>::new(), &set)
        .await
        .expect("pipeline construction");
    let err = pipeline.parse_tpl_info().await.expect_err("read failure");
    assert!(matches!(err, Error::ConfigRead { .. }), "got {err:?}");
    assert!(pipeline.tpl_info().is_none());
}

#[tokio::test]
async fn each_header_stage_starts_from_a_fresh_header() {
    let (_dir, path) = config_file("{}");
    let recorder = Recorder::default();
    let set = set_of([ProbeExtension::new(
        "css",
        Capabilities {
            on_build_header: true,
            ..Capabilities::NONE
        },
        &recorder,
    )
    .with_header_field("stylesheet", "main.css")]);

    let pipeline = BuildPipeline::new(&path, ["css"], &set)
        .await
        .expect("pipeline construction");

    pipeline.build_header().await.expect("first header stage");
    let first = pipeline.header().expect("header present").lock().await.id();

    pipeline.build_header().await.expect("second header stage");
    let header = pipeline.header().expect("header present");
    let header = header.lock().await;
    assert_ne!(first, header.id());
    assert_eq!(header.get_str("stylesheet"), Some("main.css"));
}

#[tokio::test]
async fn header_contributions_are_visible_during_build() {
    let (_dir, path) = config_file("{}");
    let recorder = Recorder::default();
    let set = set_of([
        ProbeExtension::new("css", cycle_caps(), &recorder).with_header_field("title", "Home"),
        ProbeExtension::new("js", cycle_caps(), &recorder).with_read_field("title"),
    ]);

    let pipeline = BuildPipeline::new(&path, ["css", "js"], &set)
        .await
        .expect("pipeline construction");
    pipeline.build().await.expect("build cycle");

    assert!(
        recorder.snapshot().contains(&"js.on_build title=Home".to_string()),
        "got {:?}",
        recorder.snapshot()
    );
}

#[tokio::test]
async fn failed_header_hook_skips_the_build_stage() {
    let (_dir, path) = config_file("{}");
    let recorder = Recorder::default();
    let set = set_of([
        ProbeExtension::new("a", cycle_caps(), &recorder),
        ProbeExtension::new("b", cycle_caps(), &recorder).failing_in("on_build_header"),
    ]);

    let pipeline = BuildPipeline::new(&path, ["a", "b"], &set)
        .await
        .expect("pipeline construction");
    let err = pipeline.build().await.expect_err("hook failure");
    match err {
        Error::ExtensionHook { extension, hook, .. } => {
            assert_eq!(extension, "b");
            assert_eq!(hook, "on_build_header");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let events = recorder.snapshot();
    assert!(!events.iter().any(|event| event.contains("on_build")
        && !event.contains("on_build_header")));
}

#[tokio::test]
async fn unresolvable_extension_fails_construction() {
    let (_dir, path) = config_file("{}");
    let recorder = Recorder::default();
    let set = set_of([ProbeExtension::new("css", cycle_caps(), &recorder)]);

    let err = BuildPipeline::new(&path, ["css", "markdown"], &set)
        .await
        .expect_err("unknown extension");
    match err {
        Error::ExtensionResolution { name } => assert_eq!(name, "markdown"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn requested_extension_list_is_authoritative() {
    let (_dir, path) = config_file("{}");
    let recorder = Recorder::default();
    let set = set_of([
        ProbeExtension::new("css", cycle_caps(), &recorder),
        ProbeExtension::new("js", cycle_caps(), &recorder),
    ]);

    let pipeline = BuildPipeline::new(&path, ["js"], &set)
        .await
        .expect("pipeline construction");

    let tags: Vec<&str> = pipeline.extensions().iter().map(|e| e.tag()).collect();
    assert_eq!(tags, vec!["js"]);
    assert!(!pipeline.tasks().contains("ext.css.buildHeader"));
}

#[tokio::test]
async fn extension_self_identification_overrides_requested_name() {
    let (_dir, path) = config_file("{}");
    let recorder = Recorder::default();
    let set = set_of([
        ProbeExtension::new("css", cycle_caps(), &recorder).with_self_name("styles")
    ]);

    let pipeline = BuildPipeline::new(&path, ["css"], &set)
        .await
        .expect("pipeline construction");

    assert!(pipeline.extensions().get("styles").is_some());
    assert!(pipeline.extensions().get("css").is_none());
    assert!(pipeline.tasks().contains("ext.styles.buildHeader"));
    assert!(!pipeline.tasks().contains("ext.css.buildHeader"));
}

#[tokio::test]
async fn clean_runs_cleanup_hooks_in_registration_order() {
    let (_dir, path) = config_file("{}");
    let recorder = Recorder::default();
    let clean_caps = Capabilities {
        on_clean: true,
        ..Capabilities::NONE
    };
    let set = set_of([
        ProbeExtension::new("a", clean_caps, &recorder),
        ProbeExtension::new("b", clean_caps, &recorder),
    ]);

    let pipeline = BuildPipeline::new(&path, ["a", "b"], &set)
        .await
        .expect("pipeline construction");
    pipeline.clean().await.expect("clean");

    assert_eq!(recorder.snapshot(), vec!["a.on_clean", "b.on_clean"]);
}

#[tokio::test]
async fn build_stage_is_usable_without_a_prior_parse() {
    let (_dir, path) = config_file("{}");
    let recorder = Recorder::default();
    let set = set_of([ProbeExtension::new("css", cycle_caps(), &recorder)]);

    let pipeline = BuildPipeline::new(&path, ["css"], &set)
        .await
        .expect("pipeline construction");
    pipeline.build().await.expect("build without parse");

    let events = recorder.snapshot();
    assert!(events.contains(&"css.on_build_header".to_string()));
    assert!(events.contains(&"css.on_build".to_string()));
    // No config was parsed, so no change notification fires.
    assert!(!events.contains(&"css.on_tpl_changed".to_string()));
}

#[tokio::test]
async fn overlapping_cycles_are_serialized() {
    let (_dir, path) = config_file("{}");
    let recorder = Recorder::default();
    let set = set_of([ProbeExtension::new("slow", cycle_caps(), &recorder)
        .with_delay(Duration::from_millis(50))]);

    let pipeline = BuildPipeline::new(&path, ["slow"], &set)
        .await
        .expect("pipeline construction");

    let (first, second) = tokio::join!(pipeline.parse_tpl_info(), pipeline.parse_tpl_info());
    first.expect("first cycle");
    second.expect("second cycle");

    // One complete cycle after the other; no interleaving despite the slow
    // header hook.
    let cycle = [
        "slow.on_tpl_changed",
        "slow.on_build_header",
        "slow.on_build",
    ];
    let expected: Vec<&str> = std::iter::once("slow.on_create")
        .chain(cycle)
        .chain(cycle)
        .collect();
    assert_eq!(recorder.snapshot(), expected);
}

#[tokio::test]
async fn header_hooks_run_once_per_cycle() {
    // `build` depends on both the header stage and every per-extension header
    // task; the shared results must not re-run the hooks.
    let (_dir, path) = config_file("{}");
    let recorder = Recorder::default();
    let set = set_of([ProbeExtension::new("css", cycle_caps(), &recorder)]);

    let pipeline = BuildPipeline::new(&path, ["css"], &set)
        .await
        .expect("pipeline construction");
    pipeline.build().await.expect("build cycle");

    let header_runs = recorder
        .snapshot()
        .iter()
        .filter(|event| *event == "css.on_build_header")
        .count();
    assert_eq!(header_runs, 1);
}
