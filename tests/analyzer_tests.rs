use encap::analyzers::{analyze_unit, SourceUnit};
use encap::config::AnalyzerConfig;
use encap::core::types::{AccessShape, BindingKind, Direction, Language};
use indoc::indoc;
use std::path::PathBuf;

fn js_unit(source: &str) -> SourceUnit {
    SourceUnit::new(
        PathBuf::from("test.js"),
        Language::JavaScript,
        source.to_string(),
    )
}

fn analyze(source: &str) -> encap::ModuleMap {
    analyze_unit(&js_unit(source), &AnalyzerConfig::default()).expect("analysis should succeed")
}

#[test]
fn extracts_module_bindings_with_kinds() {
    let map = analyze(indoc! {r#"
        let sent = false;
        let attempts = 0;
        const cache = new Map();
        const queue = [];
        let timer = null;
        let settings = { theme: "dark" };
    "#});

    let kind_of = |name: &str| map.binding(name).unwrap().kind;
    assert_eq!(kind_of("sent"), BindingKind::Guard);
    assert_eq!(kind_of("attempts"), BindingKind::Counter);
    assert_eq!(kind_of("cache"), BindingKind::Container);
    assert_eq!(kind_of("queue"), BindingKind::Container);
    assert_eq!(kind_of("timer"), BindingKind::Handle);
    assert_eq!(kind_of("settings"), BindingKind::Record);
}

#[test]
fn accessor_directions_reflect_reads_and_writes() {
    let map = analyze(indoc! {r#"
        let count = 0;

        function bump() {
          count += 1;
        }

        function show() {
          console.log(count);
        }
    "#});

    let bump = map.accessor("bump").unwrap();
    assert_eq!(bump.access("count").unwrap().direction, Direction::ReadWrite);

    let show = map.accessor("show").unwrap();
    assert_eq!(show.access("count").unwrap().direction, Direction::Read);
}

#[test]
fn guard_shapes_are_detected() {
    let map = analyze(indoc! {r#"
        let greeted = false;

        function greetOnce(name) {
          if (greeted) {
            return;
          }
          greeted = true;
          console.log("hello " + name);
        }
    "#});

    let access = map
        .accessor("greetOnce")
        .unwrap()
        .access("greeted")
        .unwrap();
    assert!(access.has_shape(AccessShape::GuardBranch));
    assert!(access.has_shape(AccessShape::GuardSet));
}

#[test]
fn cache_shapes_are_detected_with_keyed_access() {
    let map = analyze(indoc! {r#"
        const userCache = new Map();

        function fetchUser(id) {
          if (userCache.has(id)) {
            return userCache.get(id);
          }
          const promise = fetch("/users/" + id);
          userCache.set(id, promise);
          return promise;
        }
    "#});

    let access = map
        .accessor("fetchUser")
        .unwrap()
        .access("userCache")
        .unwrap();
    assert!(access.has_shape(AccessShape::CacheProbe));
    assert!(access.has_shape(AccessShape::CacheInsert));
    assert!(access.has_shape(AccessShape::KeyedRead));
    assert!(access.has_shape(AccessShape::KeyedWrite));
    assert!(map.accessor("fetchUser").unwrap().has_external_calls);
}

#[test]
fn timer_shapes_are_detected() {
    let map = analyze(indoc! {r#"
        let flushTimer = null;

        function scheduleFlush() {
          if (flushTimer !== null) {
            clearTimeout(flushTimer);
          }
          flushTimer = setTimeout(() => {
            flushTimer = null;
          }, 50);
        }
    "#});

    let access = map
        .accessor("scheduleFlush")
        .unwrap()
        .access("flushTimer")
        .unwrap();
    assert!(access.has_shape(AccessShape::TimerSchedule));
    assert!(access.has_shape(AccessShape::TimerClear));
}

#[test]
fn nested_closures_reach_the_enclosing_accessor() {
    let map = analyze(indoc! {r#"
        let total = 0;

        function addAll(values) {
          values.forEach(function (v) {
            total += v;
          });
        }
    "#});

    let access = map.accessor("addAll").unwrap().access("total").unwrap();
    assert!(access.direction.writes());
}

#[test]
fn shadowed_names_do_not_count_as_accesses() {
    let map = analyze(indoc! {r#"
        let state = 0;

        function local() {
          let state = 10;
          state += 1;
          return state;
        }
    "#});

    // `local` only touches its own `state`
    assert!(map.accessor("local").is_none());
    assert!(!map.binding("state").unwrap().reassigned);
}

#[test]
fn const_alias_resolves_to_the_same_storage() {
    let map = analyze(indoc! {r#"
        const registry = new Map();
        const store = registry;

        function register(key, value) {
          store.set(key, value);
        }
    "#});

    assert_eq!(map.aliases.get("store"), Some(&"registry".to_string()));
    let access = map.accessor("register").unwrap().access("registry");
    assert!(access.is_some(), "alias access lands on the aliased binding");
}

#[test]
fn exported_symbols_are_flagged() {
    let map = analyze(indoc! {r#"
        export let counter = 0;

        export function bump() {
          counter += 1;
        }

        function peek() {
          return counter;
        }
    "#});

    assert!(map.binding("counter").unwrap().exported);
    assert!(map.accessor("bump").unwrap().exported);
    assert!(!map.accessor("peek").unwrap().exported);
}

#[test]
fn commonjs_exports_are_flagged() {
    let map = analyze(indoc! {r#"
        let counter = 0;

        function bump() {
          counter += 1;
        }

        module.exports = { bump };
    "#});

    assert!(map.accessor("bump").unwrap().exported);
}

#[test]
fn call_sites_record_enclosing_functions() {
    let map = analyze(indoc! {r#"
        let n = 0;

        function bump() {
          n += 1;
        }

        function handler() {
          bump();
        }

        bump();
    "#});

    let sites = &map.accessor("bump").unwrap().call_sites;
    assert_eq!(sites.len(), 2);
    assert!(sites.iter().any(|s| s.enclosing.is_empty()));
    assert!(sites.iter().any(|s| !s.enclosing.is_empty()));
}

#[test]
fn module_level_reads_mark_the_binding_observed() {
    let map = analyze(indoc! {r#"
        let counter = 0;

        function bump() {
          counter += 1;
        }

        console.log(counter);
    "#});

    assert!(map.binding("counter").unwrap().observed_outside);
}

#[test]
fn eval_excludes_bindings_from_matching() {
    let map = analyze(indoc! {r#"
        let state = 0;

        function poke(code) {
          state += 1;
          eval(code);
        }
    "#});

    assert!(map.binding("state").is_none());
    assert_eq!(map.skipped.len(), 1);
    assert_eq!(map.skipped[0].name, "state");
}

#[test]
fn destructured_declarations_are_reported_not_guessed() {
    let map = analyze(indoc! {r#"
        let { host, port } = loadConfig();
        let plain = 0;
    "#});

    assert!(map.binding("plain").is_some());
    assert!(!map.skipped.is_empty());
}

#[test]
fn syntax_errors_fail_parsing() {
    let result = analyze_unit(&js_unit("function {{{"), &AnalyzerConfig::default());
    assert!(result.is_err());
}

#[test]
fn oversized_units_are_rejected() {
    let config = AnalyzerConfig {
        max_unit_bytes: 16,
        ..AnalyzerConfig::default()
    };
    let result = analyze_unit(&js_unit("let aLongEnoughSource = 1;\n"), &config);
    assert!(result.is_err());
}

#[test]
fn typescript_units_parse_too() {
    let unit = SourceUnit::new(
        PathBuf::from("test.ts"),
        Language::TypeScript,
        indoc! {r#"
            let loaded: boolean = false;

            function loadOnce(): void {
              if (loaded) {
                return;
              }
              loaded = true;
              console.log("loading");
            }
        "#}
        .to_string(),
    );
    let map = analyze_unit(&unit, &AnalyzerConfig::default()).unwrap();
    assert!(map.binding("loaded").is_some());
    assert!(map.accessor("loadOnce").is_some());
}
