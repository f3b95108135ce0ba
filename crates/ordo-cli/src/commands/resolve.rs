//! Handler for `ordo resolve`.

use std::path::PathBuf;
use std::rc::Rc;

use miette::Result;

use ordo_core::config::{GlobalConfig, ResolverConfig, UpgradeStrategy};
use ordo_core::index::{IndexFile, INDEX_FILE_NAME};
use ordo_core::requirement::RequirementSpec;
use ordo_resolver::cache::ValueCache;
use ordo_resolver::factory::IndexFactory;
use ordo_resolver::resolve::Resolver;
use ordo_util::errors::OrdoError;
use ordo_util::fs::find_ancestor_with;

use crate::cli::{OutputFormat, ResolveArgs};

pub fn exec(args: ResolveArgs) -> Result<()> {
    let global = match &args.config {
        Some(path) => GlobalConfig::load_from(path)?,
        None => GlobalConfig::load()?,
    };
    let config = apply_overrides(global.resolver, &args);
    tracing::debug!(?config, "effective resolver config");

    let index_path = locate_index(args.index.as_ref())?;
    let index = IndexFile::from_path(&index_path)?;

    let cache = Rc::new(ValueCache::new());
    let mut factory = IndexFactory::from_index(&index, &config, cache.clone())?;
    for pin in &args.installed {
        let (name, version) = pin.split_once("==").ok_or_else(|| OrdoError::InvalidRequirement {
            requirement: pin.clone(),
            reason: "expected name==version".to_string(),
        })?;
        factory.add_installed(name.trim(), version.trim())?;
    }

    let requirements = args
        .requirements
        .iter()
        .map(|text| RequirementSpec::parse(text))
        .collect::<Result<Vec<_>, _>>()?;

    let mut resolver = Resolver::new(factory, config, cache.clone());
    for text in &args.constraints {
        resolver.add_constraint(&RequirementSpec::parse(text)?);
    }

    let resolution = resolver.resolve(&requirements)?;
    let stats = cache.stats();
    tracing::debug!(hits = stats.hits, misses = stats.misses, "value cache");

    match args.format {
        OutputFormat::Text => {
            for candidate in resolution.installation_order() {
                println!("{}=={}", candidate.project_name(), candidate.version());
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&resolution.report()).map_err(|e| {
                OrdoError::Generic {
                    message: format!("Failed to serialize report: {e}"),
                }
            })?;
            println!("{json}");
        }
    }

    Ok(())
}

/// Command-line flags win over the config file.
fn apply_overrides(mut config: ResolverConfig, args: &ResolveArgs) -> ResolverConfig {
    if let Some(name) = &args.upgrade_strategy {
        config.upgrade_strategy = UpgradeStrategy::from_name(name);
    }
    if let Some(rounds) = args.max_resolution_rounds {
        config.max_rounds = rounds;
    }
    if let Some(python) = &args.python_version {
        config.python_version = Some(python.clone());
    }
    if let Some(cutoff) = &args.exclude_newer_than {
        config.exclude_newer_than = Some(cutoff.clone());
    }
    config.ignore_dependencies |= args.no_deps;
    config.pre |= args.pre;
    config.ignore_requires_python |= args.ignore_requires_python;
    config
}

fn locate_index(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(OrdoError::Index {
                message: format!("Index file {} does not exist", path.display()),
            }
            .into());
        }
        return Ok(path.clone());
    }
    let cwd = std::env::current_dir().map_err(OrdoError::Io)?;
    let dir = find_ancestor_with(&cwd, INDEX_FILE_NAME).ok_or_else(|| OrdoError::Index {
        message: format!("{INDEX_FILE_NAME} not found in current or parent directories"),
    })?;
    Ok(dir.join(INDEX_FILE_NAME))
}
