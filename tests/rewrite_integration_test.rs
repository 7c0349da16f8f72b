//! Plan + apply end to end: factories replace module state, call sites go
//! through the returned capabilities, and re-analysis reaches a fixpoint.

use encap::analyzers::SourceUnit;
use encap::config::EncapConfig;
use encap::core::types::{
    BlockedReason, CreationScope, Language, PatternKind, PlanOutcome,
};
use encap::engine;
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn unit(source: &str) -> SourceUnit {
    SourceUnit::new(
        PathBuf::from("fixture.js"),
        Language::JavaScript,
        source.to_string(),
    )
}

fn rewrite(source: &str) -> (String, engine::ApplyReport) {
    let unit = unit(source);
    let config = EncapConfig::default();
    let analysis = engine::analyze(&unit, &config).unwrap();
    let outcomes = engine::plan(&unit, &analysis.matches, &config).unwrap();
    let plans: Vec<_> = outcomes
        .into_iter()
        .filter_map(|o| match o {
            PlanOutcome::Planned(p) => Some(p),
            PlanOutcome::Blocked(_) => None,
        })
        .collect();
    let report = engine::apply(&unit, &analysis.matches, &plans, &config).unwrap();
    let rewritten = report
        .result
        .as_ref()
        .map(|r| r.source.clone())
        .unwrap_or_else(|| source.to_string());
    (rewritten, report)
}

const GUARD_ONCE: &str = indoc! {r#"
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
"#};

#[test]
fn guard_once_rewrite_moves_state_into_a_factory() {
    let (rewritten, report) = rewrite(GUARD_ONCE);
    assert!(report.rejected.is_empty(), "{:?}", report.rejected);

    assert!(rewritten.contains("function createGreeted()"));
    assert!(rewritten.contains("const greetedState = createGreeted();"));
    assert!(rewritten.contains("greetedState.greetOnce(\"ada\");"));
    assert!(rewritten.contains("greetedState.greetOnce(\"grace\");"));
    assert!(rewritten.contains("return { greetOnce };"));

    // the module-scope declaration is gone; the factory-local one remains
    let module_decls = rewritten
        .lines()
        .filter(|l| l.trim_start().starts_with("let greeted"))
        .count();
    assert_eq!(module_decls, 1);
}

#[test]
fn guard_once_rewrite_reaches_a_fixpoint() {
    let (rewritten, _) = rewrite(GUARD_ONCE);
    let report = engine::analyze(&unit(&rewritten), &EncapConfig::default()).unwrap();
    assert!(
        report.matches.is_empty(),
        "re-analysis found {:?}",
        report.matches.iter().map(|m| m.kind).collect::<Vec<_>>()
    );
}

#[test]
fn memoized_cache_rewrite_reaches_a_fixpoint() {
    let source = indoc! {r#"
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
        fetchUser(2);
    "#};

    let (rewritten, report) = rewrite(source);
    assert!(report.rejected.is_empty(), "{:?}", report.rejected);
    assert!(rewritten.contains("function createUserCache()"));
    assert!(rewritten.contains("userCacheState.fetchUser(1);"));

    let again = engine::analyze(&unit(&rewritten), &EncapConfig::default()).unwrap();
    assert!(again.matches.is_empty());
}

#[test]
fn exported_accessor_blocks_the_plan() {
    let source = indoc! {r#"
        let greeted = false;

        export function greetOnce(name) {
          if (greeted) {
            return;
          }
          greeted = true;
          console.log("hello " + name);
        }

        greetOnce("ada");
        greetOnce("grace");
    "#};

    let u = unit(source);
    let config = EncapConfig::default();
    let analysis = engine::analyze(&u, &config).unwrap();
    assert_eq!(analysis.matches.len(), 1);

    let outcomes = engine::plan(&u, &analysis.matches, &config).unwrap();
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        PlanOutcome::Blocked(blocked) => {
            assert_eq!(
                blocked.reason,
                BlockedReason::ExportedAccessor {
                    name: "greetOnce".to_string()
                }
            );
        }
        PlanOutcome::Planned(_) => panic!("expected blocked outcome"),
    }
}

#[test]
fn module_level_observation_blocks_the_plan() {
    let source = indoc! {r#"
        let counter = 0;

        function bump() {
          counter += 1;
        }

        function reset() {
          counter = 0;
        }

        bump();
        reset();
        console.log(counter);
    "#};

    let u = unit(source);
    let config = EncapConfig::default();
    let analysis = engine::analyze(&u, &config).unwrap();
    let outcomes = engine::plan(&u, &analysis.matches, &config).unwrap();
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, PlanOutcome::Blocked(_))));
}

#[test]
fn request_context_plans_per_logical_scope() {
    let source = indoc! {r#"
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
    "#};

    let u = unit(source);
    let config = EncapConfig::default();
    let analysis = engine::analyze(&u, &config).unwrap();
    let outcomes = engine::plan(&u, &analysis.matches, &config).unwrap();
    match &outcomes[0] {
        PlanOutcome::Planned(plan) => {
            assert_eq!(plan.kind, PatternKind::RequestContext);
            assert_eq!(plan.scope, CreationScope::PerLogicalScope);
            assert!(!plan.insertion.module_level);
        }
        PlanOutcome::Blocked(b) => panic!("unexpected block: {:?}", b),
    }

    // the factory is instantiated inside the handler, once per request
    let (rewritten, report) = rewrite(source);
    assert!(report.rejected.is_empty(), "{:?}", report.rejected);
    let handler_pos = rewritten.find("function handleRequest").unwrap();
    let instance_pos = rewritten
        .find("const sessionsState = createSessions();")
        .unwrap();
    assert!(instance_pos > handler_pos);
}

#[test]
fn resource_lifecycle_rewrite_releases_on_exit() {
    let source = indoc! {r#"
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
    "#};

    let (rewritten, report) = rewrite(source);
    assert!(report.rejected.is_empty(), "{:?}", report.rejected);
    assert!(rewritten.contains("function release()"));
    assert!(rewritten.contains("socketState.release();"));
    assert!(rewritten.contains("return { ensureSocket, release };"));
}

#[test]
fn rewrite_summary_counts_the_work() {
    let (_, report) = rewrite(GUARD_ONCE);
    let summary = &report.result.as_ref().unwrap().summary;
    assert_eq!(summary.groups_rewritten, 1);
    assert_eq!(summary.call_sites_patched, 2);
    assert!(summary.declarations_moved >= 1);
}

#[test]
fn two_groups_rewrite_independently() {
    let source = indoc! {r#"
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
        compute("a");
        compute("b");
        greetOnce("y");
    "#};

    let (rewritten, report) = rewrite(source);
    assert!(report.rejected.is_empty(), "{:?}", report.rejected);
    assert!(rewritten.contains("function createGreeted()"));
    assert!(rewritten.contains("function createResults()"));

    let again = engine::analyze(&unit(&rewritten), &EncapConfig::default()).unwrap();
    assert!(again.matches.is_empty());
}
