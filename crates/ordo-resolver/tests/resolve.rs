use std::rc::Rc;

use ordo_core::config::{ResolverConfig, UpgradeStrategy};
use ordo_core::index::IndexFile;
use ordo_core::requirement::RequirementSpec;
use ordo_resolver::cache::ValueCache;
use ordo_resolver::factory::IndexFactory;
use ordo_resolver::resolve::{Resolution, Resolver};
use ordo_util::errors::OrdoError;

const CYCLE_INDEX: &str = r#"
[[package]]
name = "complex-pkg"
version = "1.0"
dependencies = ["dep-a", "dep-b"]

[[package]]
name = "dep-a"
version = "1.0"
dependencies = ["dep-b"]

[[package]]
name = "dep-b"
version = "1.0"
dependencies = ["dep-a"]
"#;

fn resolver(index: &str, config: ResolverConfig) -> Resolver<IndexFactory> {
    let cache = Rc::new(ValueCache::new());
    let index = IndexFile::parse_toml(index).unwrap();
    let factory = IndexFactory::from_index(&index, &config, cache.clone()).unwrap();
    Resolver::new(factory, config, cache)
}

fn reqs(texts: &[&str]) -> Vec<RequirementSpec> {
    texts
        .iter()
        .map(|t| RequirementSpec::parse(t).unwrap())
        .collect()
}

fn pinned(resolution: &Resolution) -> Vec<String> {
    resolution
        .pins()
        .values()
        .map(|c| format!("{}=={}", c.project_name(), c.version()))
        .collect()
}

fn order(resolution: &Resolution) -> Vec<String> {
    resolution
        .installation_order()
        .iter()
        .map(|c| c.project_name().to_string())
        .collect()
}

fn error_of(err: miette::Report) -> OrdoError {
    err.downcast::<OrdoError>().unwrap()
}

#[test]
fn cycle_under_tiny_budget_is_too_deep() {
    let config = ResolverConfig {
        max_rounds: 1,
        ..ResolverConfig::default()
    };
    let err = resolver(CYCLE_INDEX, config)
        .resolve(&reqs(&["complex-pkg"]))
        .unwrap_err();
    assert!(matches!(error_of(err), OrdoError::ResolutionTooDeep { rounds: 1 }));
}

#[test]
fn cycle_under_default_budget_resolves() {
    let resolution = resolver(CYCLE_INDEX, ResolverConfig::default())
        .resolve(&reqs(&["complex-pkg"]))
        .unwrap();
    assert_eq!(
        pinned(&resolution),
        vec!["complex-pkg==1.0", "dep-a==1.0", "dep-b==1.0"]
    );
    let order = order(&resolution);
    assert_eq!(order.len(), 3);
    assert_eq!(order.last().map(String::as_str), Some("complex-pkg"));
}

#[test]
fn backjumps_to_older_release() {
    let index = r#"
[[package]]
name = "a"
version = "1.0"
dependencies = ["c>=2"]

[[package]]
name = "a"
version = "0.9"
dependencies = ["c"]

[[package]]
name = "b"
version = "1.0"
dependencies = ["c<2"]

[[package]]
name = "c"
version = "2.0"

[[package]]
name = "c"
version = "1.0"
"#;
    let resolution = resolver(index, ResolverConfig::default())
        .resolve(&reqs(&["a", "b"]))
        .unwrap();
    assert_eq!(pinned(&resolution), vec!["a==0.9", "b==1.0", "c==1.0"]);
    assert_eq!(order(&resolution).first().map(String::as_str), Some("c"));
}

#[test]
fn walks_down_every_release_before_giving_up() {
    let index = r#"
[[package]]
name = "a"
version = "3.0"
dependencies = ["c>=3,<4"]

[[package]]
name = "a"
version = "2.0"
dependencies = ["c>=2,<3"]

[[package]]
name = "a"
version = "1.0"
dependencies = ["c>=1,<2"]

[[package]]
name = "b"
version = "1.0"
dependencies = ["c>=1,<2"]

[[package]]
name = "c"
version = "1.0"

[[package]]
name = "c"
version = "2.0"

[[package]]
name = "c"
version = "3.0"
"#;
    let config = ResolverConfig {
        max_rounds: 2000,
        ..ResolverConfig::default()
    };
    let resolution = resolver(index, config)
        .resolve(&reqs(&["a", "b"]))
        .unwrap();
    assert_eq!(pinned(&resolution), vec!["a==1.0", "b==1.0", "c==1.0"]);
}

#[test]
fn revisits_pins_invalidated_by_later_dependencies() {
    let index = r#"
[[package]]
name = "a"
version = "1.0"

[[package]]
name = "a"
version = "0.9"

[[package]]
name = "b"
version = "2.0"
dependencies = ["a<1.0"]
"#;
    let resolution = resolver(index, ResolverConfig::default())
        .resolve(&reqs(&["a", "b"]))
        .unwrap();
    assert_eq!(pinned(&resolution), vec!["a==0.9", "b==2.0"]);
}

#[test]
fn impossible_resolution_names_conflicts() {
    let index = r#"
[[package]]
name = "dep-a"
version = "0.1"
dependencies = ["dep-b<0.1"]

[[package]]
name = "dep-b"
version = "0.2"
"#;
    let err = resolver(index, ResolverConfig::default())
        .resolve(&reqs(&["dep-a"]))
        .unwrap_err();
    match error_of(err) {
        OrdoError::ResolutionImpossible { message } => {
            assert!(message.contains("dep-b<0.1"), "{message}");
            assert!(message.contains("dep-a 0.1"), "{message}");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn unknown_project_is_impossible() {
    let err = resolver(CYCLE_INDEX, ResolverConfig::default())
        .resolve(&reqs(&["missing"]))
        .unwrap_err();
    assert!(matches!(
        error_of(err),
        OrdoError::ResolutionImpossible { .. }
    ));
}

const UPGRADE_INDEX: &str = r#"
[[package]]
name = "dep"
version = "1.0"

[[package]]
name = "dep"
version = "2.0"

[[package]]
name = "lib"
version = "1.0"

[[package]]
name = "lib"
version = "2.0"

[[package]]
name = "app"
version = "1.0"
dependencies = ["lib"]

[[installed]]
name = "dep"
version = "1.0"

[[installed]]
name = "lib"
version = "1.0"
"#;

fn with_strategy(strategy: UpgradeStrategy) -> Vec<String> {
    let config = ResolverConfig {
        upgrade_strategy: strategy,
        ..ResolverConfig::default()
    };
    let resolution = resolver(UPGRADE_INDEX, config)
        .resolve(&reqs(&["dep", "app"]))
        .unwrap();
    pinned(&resolution)
}

#[test]
fn upgrade_strategies() {
    assert_eq!(
        with_strategy(UpgradeStrategy::ToSatisfyOnly),
        vec!["app==1.0", "dep==1.0", "lib==1.0"]
    );
    assert_eq!(
        with_strategy(UpgradeStrategy::OnlyIfNeeded),
        vec!["app==1.0", "dep==2.0", "lib==1.0"]
    );
    assert_eq!(
        with_strategy(UpgradeStrategy::Eager),
        vec!["app==1.0", "dep==2.0", "lib==2.0"]
    );
}

#[test]
fn constraints_restrict_without_requiring() {
    let mut resolver = resolver(UPGRADE_INDEX, ResolverConfig {
        upgrade_strategy: UpgradeStrategy::Eager,
        ..ResolverConfig::default()
    });
    resolver.add_constraint(&RequirementSpec::parse("lib<2").unwrap());
    resolver.add_constraint(&RequirementSpec::parse("unrelated==9").unwrap());
    let resolution = resolver.resolve(&reqs(&["app"])).unwrap();
    assert_eq!(pinned(&resolution), vec!["app==1.0", "lib==1.0"]);
}

#[test]
fn ignore_dependencies_pins_roots_only() {
    let config = ResolverConfig {
        ignore_dependencies: true,
        ..ResolverConfig::default()
    };
    let resolution = resolver(CYCLE_INDEX, config)
        .resolve(&reqs(&["complex-pkg"]))
        .unwrap();
    assert_eq!(pinned(&resolution), vec!["complex-pkg==1.0"]);
}

#[test]
fn extras_pull_in_gated_dependencies() {
    let index = r#"
[[package]]
name = "web"
version = "1.0"
dependencies = ["core", "turbo; extra == 'fast'"]

[[package]]
name = "core"
version = "1.0"

[[package]]
name = "turbo"
version = "0.5"
"#;
    let plain = resolver(index, ResolverConfig::default())
        .resolve(&reqs(&["web"]))
        .unwrap();
    assert_eq!(pinned(&plain), vec!["core==1.0", "web==1.0"]);

    let fast = resolver(index, ResolverConfig::default())
        .resolve(&reqs(&["web[fast]"]))
        .unwrap();
    assert_eq!(pinned(&fast), vec!["core==1.0", "turbo==0.5", "web==1.0"]);
    assert!(fast.mapping().iter().any(|(id, _)| id == "web[fast]"));
    let order = order(&fast);
    let web = order.iter().position(|n| n == "web").unwrap();
    let turbo = order.iter().position(|n| n == "turbo").unwrap();
    assert!(turbo < web);
}

#[test]
fn requires_python_filters_releases() {
    let index = r#"
python = "3.8"

[[package]]
name = "modern"
version = "2.0"
requires-python = ">=3.10"

[[package]]
name = "modern"
version = "1.0"
requires-python = ">=3.7"
"#;
    let resolution = resolver(index, ResolverConfig::default())
        .resolve(&reqs(&["modern"]))
        .unwrap();
    assert_eq!(pinned(&resolution), vec!["modern==1.0"]);

    let config = ResolverConfig {
        python_version: Some("3.12".to_string()),
        ..ResolverConfig::default()
    };
    let resolution = resolver(index, config)
        .resolve(&reqs(&["modern"]))
        .unwrap();
    assert_eq!(pinned(&resolution), vec!["modern==2.0"]);
}

#[test]
fn upload_cutoff_backtracks_to_older_dependency() {
    let index = r#"
[[package]]
name = "app"
version = "2.0"
upload-time = "2024-05-01T00:00:00Z"
dependencies = ["lib>=2"]

[[package]]
name = "app"
version = "1.0"
upload-time = "2022-05-01T00:00:00Z"
dependencies = ["lib"]

[[package]]
name = "lib"
version = "2.0"
upload-time = "2024-04-01T00:00:00Z"

[[package]]
name = "lib"
version = "1.0"
upload-time = "2021-01-01T00:00:00Z"
"#;
    let resolution = resolver(index, ResolverConfig::default())
        .resolve(&reqs(&["app"]))
        .unwrap();
    assert_eq!(pinned(&resolution), vec!["app==2.0", "lib==2.0"]);

    let config = ResolverConfig {
        exclude_newer_than: Some("2024-01-01T00:00:00Z".to_string()),
        ..ResolverConfig::default()
    };
    let resolution = resolver(index, config)
        .resolve(&reqs(&["app"]))
        .unwrap();
    assert_eq!(pinned(&resolution), vec!["app==1.0", "lib==1.0"]);
}

#[test]
fn report_serialises_in_installation_order() {
    let resolution = resolver(UPGRADE_INDEX, ResolverConfig::default())
        .resolve(&reqs(&["app"]))
        .unwrap();
    let report = resolution.report();
    let json = serde_json::to_value(&report).unwrap();
    let packages = json["packages"].as_array().unwrap();
    assert_eq!(packages[0]["name"], "lib");
    assert_eq!(packages[0]["installed"], true);
    assert_eq!(packages[1]["name"], "app");
    assert_eq!(packages[1]["dependencies"][0], "lib");
    assert!(json["rounds"].as_u64().unwrap() > 0);
}
