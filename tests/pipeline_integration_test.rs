//! Full-pipeline classification: analyze() over one fixture per catalog kind.

use encap::analyzers::SourceUnit;
use encap::config::EncapConfig;
use encap::core::types::{Language, PatternKind};
use encap::engine;
use indoc::indoc;
use std::path::PathBuf;

fn analyze(source: &str) -> engine::AnalysisReport {
    let unit = SourceUnit::new(
        PathBuf::from("fixture.js"),
        Language::JavaScript,
        source.to_string(),
    );
    engine::analyze(&unit, &EncapConfig::default()).expect("analysis should succeed")
}

fn single_kind(report: &engine::AnalysisReport) -> PatternKind {
    assert_eq!(
        report.matches.len(),
        1,
        "expected exactly one match, got {:?}",
        report
            .matches
            .iter()
            .map(|m| m.kind)
            .collect::<Vec<_>>()
    );
    report.matches[0].kind
}

#[test]
fn guard_once_is_detected() {
    let report = analyze(indoc! {r#"
        let greeted = false;

        function greetOnce(name) {
          if (greeted) {
            return;
          }
          greeted = true;
          console.log("hello " + name);
        }

        greetOnce("ada");
        greetOnce("grace");
    "#});
    assert_eq!(single_kind(&report), PatternKind::GuardOnce);
}

#[test]
fn memoized_cache_is_detected() {
    let report = analyze(indoc! {r#"
        const userCache = new Map();

        function fetchUser(id) {
          if (userCache.has(id)) {
            return userCache.get(id);
          }
          const promise = fetch("/users/" + id);
          userCache.set(id, promise);
          return promise;
        }

        fetchUser(1);
        fetchUser(1);
    "#});
    assert_eq!(single_kind(&report), PatternKind::MemoizedCache);
}

#[test]
fn timer_debounce_is_detected() {
    let report = analyze(indoc! {r#"
        let flushTimer = null;

        function scheduleFlush() {
          if (flushTimer !== null) {
            clearTimeout(flushTimer);
          }
          flushTimer = setTimeout(() => {
            flushTimer = null;
            console.log("flushed");
          }, 100);
        }

        scheduleFlush();
        scheduleFlush();
    "#});
    assert_eq!(single_kind(&report), PatternKind::TimerDebounceThrottle);
}

#[test]
fn resource_lifecycle_is_detected_for_unreleased_handle() {
    let report = analyze(indoc! {r#"
        let socket = null;

        function ensureSocket() {
          if (socket === null) {
            socket = connect("wss://hub.example");
          }
          return socket;
        }

        function send(message) {
          ensureSocket().send(message);
        }

        send("ping");
        send("pong");
    "#});
    assert_eq!(single_kind(&report), PatternKind::ResourceLifecycle);
}

#[test]
fn retry_backoff_is_detected() {
    let report = analyze(indoc! {r#"
        let attempts = 0;

        async function fetchWithRetry(url) {
          while (attempts < 3) {
            try {
              return await fetch(url);
            } catch (err) {
              attempts += 1;
              await sleep(100 * attempts);
            }
          }
          throw new Error("retries exhausted");
        }

        async function handler(request) {
          return fetchWithRetry(request.url);
        }
    "#});
    assert_eq!(single_kind(&report), PatternKind::RetryBackoff);
}

#[test]
fn serialized_queue_is_detected() {
    let report = analyze(indoc! {r#"
        const taskQueue = [];
        let draining = false;

        function enqueue(task) {
          taskQueue.push(task);
          if (!draining) {
            drain();
          }
        }

        function drain() {
          draining = true;
          while (taskQueue.length > 0) {
            const task = taskQueue.shift();
            task();
          }
          draining = false;
        }

        enqueue(() => console.log("a"));
        enqueue(() => console.log("b"));
    "#});
    let report_kind = single_kind(&report);
    assert_eq!(report_kind, PatternKind::SerializedQueue);
    // both kinds matched structurally; serialized-queue outranks the bag
    assert!(report.matches[0]
        .candidates
        .contains(&PatternKind::MutableStateBag));
}

#[test]
fn lazy_init_is_detected() {
    let report = analyze(indoc! {r#"
        let configLoaded = false;
        let config = null;

        function getConfig() {
          if (!configLoaded) {
            config = parseConfig(readSettings());
            configLoaded = true;
          }
          return config;
        }

        getConfig();
        getConfig();
    "#});
    assert_eq!(single_kind(&report), PatternKind::LazyInit);
}

#[test]
fn request_context_is_detected() {
    let report = analyze(indoc! {r#"
        const sessions = {};

        function beginSession(sessionId, user) {
          sessions[sessionId] = { user: user, startedAt: Date.now() };
        }

        function currentUser(sessionId) {
          const session = sessions[sessionId];
          return session ? session.user : null;
        }

        function handleRequest(request) {
          beginSession(request.sessionId, request.user);
          return currentUser(request.sessionId);
        }
    "#});
    assert_eq!(single_kind(&report), PatternKind::RequestContext);
}

#[test]
fn unstable_callback_identity_is_detected() {
    let report = analyze(indoc! {r#"
        let resizeHandler = null;

        function attach(element) {
          resizeHandler = () => {
            element.dataset.width = String(element.clientWidth);
          };
          window.addEventListener("resize", resizeHandler);
        }

        attach(document.body);
        attach(document.body);
    "#});
    assert_eq!(single_kind(&report), PatternKind::UnstableCallbackIdentity);
}

#[test]
fn mutable_state_bag_is_the_fallback() {
    let report = analyze(indoc! {r#"
        let currentView = "list";
        let selectedId = null;

        function selectItem(id) {
          selectedId = id;
          currentView = "detail";
          console.log("view", currentView);
        }

        function goBack() {
          selectedId = null;
          currentView = "list";
          console.log("view", currentView);
        }

        selectItem(1);
        goBack();
    "#});
    assert_eq!(single_kind(&report), PatternKind::MutableStateBag);
    assert_eq!(report.matches[0].group.bindings.len(), 2);
    assert_eq!(report.matches[0].group.accessors.len(), 2);
}

#[test]
fn unrelated_groups_are_reported_independently() {
    let report = analyze(indoc! {r#"
        let greeted = false;
        const results = new Map();

        function greetOnce(name) {
          if (greeted) {
            return;
          }
          greeted = true;
          console.log("hello " + name);
        }

        function compute(key) {
          if (results.has(key)) {
            return results.get(key);
          }
          const value = expensive(key);
          results.set(key, value);
          return value;
        }

        greetOnce("x");
        greetOnce("y");
        compute("a");
        compute("a");
    "#});

    let mut kinds: Vec<PatternKind> = report.matches.iter().map(|m| m.kind).collect();
    kinds.sort_by_key(|k| k.as_str().to_string());
    assert_eq!(
        kinds,
        vec![PatternKind::GuardOnce, PatternKind::MemoizedCache]
    );
}
