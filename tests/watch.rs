mod common;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::Utf8PathBuf;
use common::{BrokenScripts, FakeScripts, Fixture, noop_start_watch, tree_hash};
use frontkit::engine;
use frontkit::watch::{EventSource, Reload, WatchController, WatchState};
use frontkit::WatchError;

#[derive(Default)]
struct CountingReload(AtomicUsize);

impl CountingReload {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Reload for CountingReload {
    fn reload(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Replays a fixed list of change batches.
struct Scripted(VecDeque<Vec<Utf8PathBuf>>);

impl EventSource for Scripted {
    fn next_batch(&mut self) -> Option<Result<Vec<Utf8PathBuf>, WatchError>> {
        self.0.pop_front().map(Ok)
    }
}

fn without_prefix(
    tree: &std::collections::BTreeMap<String, String>,
    prefix: &str,
) -> Vec<(String, String)> {
    tree.iter()
        .filter(|(path, _)| !path.starts_with(prefix))
        .map(|(path, hash)| (path.clone(), hash.clone()))
        .collect()
}

#[test]
fn style_change_reruns_only_styles() {
    let fx = Fixture::new();
    let composer = fx.composer(Arc::new(FakeScripts));
    engine::run(&composer.dev(noop_start_watch())).unwrap();

    let before = tree_hash(&fx.path("dist"));
    let script_mtime = std::fs::metadata(fx.path("dist/js/js.js"))
        .unwrap()
        .modified()
        .unwrap();

    fx.write("src/styles/base/_colors.scss", "$accent: #993366;\n");

    let reload = Arc::new(CountingReload::default());
    let controller = WatchController::new(
        composer.watch_bindings().unwrap(),
        Scripted(VecDeque::new()),
        reload.clone(),
    );

    let outcome = controller.handle(&[fx.path("src/styles/base/_colors.scss")]);

    assert_eq!(outcome.rerun, vec!["styles"]);
    assert!(outcome.failed.is_empty());
    assert!(outcome.reloaded);
    assert_eq!(reload.count(), 1);

    let after = tree_hash(&fx.path("dist"));
    assert_ne!(before["styles/main.css"], after["styles/main.css"]);
    assert!(fx.read("dist/styles/main.css").contains("#993366"));
    assert_eq!(without_prefix(&before, "styles/"), without_prefix(&after, "styles/"));

    let script_mtime_after = std::fs::metadata(fx.path("dist/js/js.js"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(script_mtime, script_mtime_after);
}

#[test]
fn image_change_reruns_copy_then_webp() {
    let fx = Fixture::new();
    let composer = fx.composer(Arc::new(FakeScripts));
    engine::run(&composer.dev(noop_start_watch())).unwrap();

    std::fs::copy(fx.path("src/images/logo.png"), fx.path("src/images/second.png")).unwrap();

    let reload = Arc::new(CountingReload::default());
    let controller = WatchController::new(
        composer.watch_bindings().unwrap(),
        Scripted(VecDeque::new()),
        reload.clone(),
    );

    let outcome = controller.handle(&[fx.path("src/images/second.png")]);

    assert_eq!(outcome.rerun, vec!["images"]);
    assert!(fx.path("dist/images/second.png").is_file());
    assert!(fx.path("dist/images/second.webp").is_file());
    assert_eq!(reload.count(), 1);
}

#[test]
fn failed_rerun_does_not_reload_or_stop_the_loop() {
    let fx = Fixture::new();
    let composer = fx.composer(Arc::new(BrokenScripts));

    let reload = Arc::new(CountingReload::default());
    let batches = Scripted(VecDeque::from([
        vec![fx.path("src/js/modules/menu.js")],
        vec![fx.path("src/fonts/inter.woff2")],
    ]));

    let mut controller =
        WatchController::new(composer.watch_bindings().unwrap(), batches, reload.clone());
    controller.run();

    assert_eq!(controller.state(), WatchState::Idle);
    // the scripts batch failed, the fonts batch still ran and reloaded once
    assert_eq!(reload.count(), 1);
    assert!(fx.path("dist/fonts/inter.woff2").is_file());
    assert!(!fx.path("dist/js").exists());
}

#[test]
fn broken_stylesheet_still_reloads_in_dev() {
    let fx = Fixture::new();
    let composer = fx.composer(Arc::new(FakeScripts));
    engine::run(&composer.dev(noop_start_watch())).unwrap();

    fx.write("src/styles/main.scss", "body { color: ");

    let reload = Arc::new(CountingReload::default());
    let controller = WatchController::new(
        composer.watch_bindings().unwrap(),
        Scripted(VecDeque::new()),
        reload.clone(),
    );

    let outcome = controller.handle(&[fx.path("src/styles/main.scss")]);

    assert!(outcome.failed.is_empty());
    assert_eq!(reload.count(), 1);
}
