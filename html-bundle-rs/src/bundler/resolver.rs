//! Specifier resolution for the bundler.
//!
//! Without a project config file, specifiers resolve the standard way
//! (relative to the referrer, or as absolute URLs). With one, its `imports`
//! and `scopes` maps are applied first.

use std::path::Path;

use anyhow::{anyhow, Context};
use deno_graph::source::{ResolutionKind, ResolveError, Resolver};
use deno_graph::{ModuleSpecifier, Range};
use serde_json::{Map, Value};

use super::file_specifier;
use crate::config::parse_config_text;

type SpecifierMap = Vec<(String, String)>;

/// Import map read from the `imports`/`scopes` keys of a config file.
#[derive(Debug, Clone)]
pub struct ImportMapResolver {
    /// URL of the config file. Relative keys and targets resolve against it.
    base: ModuleSpecifier,
    imports: SpecifierMap,
    /// Scope prefix URL and its map, longest prefix first.
    scopes: Vec<(String, SpecifierMap)>,
    /// Where the automatic JSX runtime is imported from.
    jsx_import_source: Option<String>,
}

impl ImportMapResolver {
    pub async fn from_config_file(path: &Path) -> Result<Self, anyhow::Error> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read import map from {}", path.display()))?;
        let document = parse_config_text(&text)
            .map_err(|message| anyhow!("Invalid import map in {}: {}", path.display(), message))?;
        Ok(Self::from_document(file_specifier(path)?, &document))
    }

    pub fn from_document(base: ModuleSpecifier, document: &Map<String, Value>) -> Self {
        let imports = match document.get("imports") {
            Some(Value::Object(imports)) => specifier_map(&base, imports),
            _ => Vec::new(),
        };

        let mut scopes: Vec<(String, SpecifierMap)> = match document.get("scopes") {
            Some(Value::Object(scopes)) => scopes
                .iter()
                .filter_map(|(prefix, map)| {
                    let prefix = base.join(prefix).ok()?.to_string();
                    match map {
                        Value::Object(map) => Some((prefix, specifier_map(&base, map))),
                        _ => None,
                    }
                })
                .collect(),
            _ => Vec::new(),
        };
        scopes.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));

        Self {
            base,
            imports,
            scopes,
            jsx_import_source: None,
        }
    }

    /// Makes the automatic JSX runtime import part of the module graph.
    pub fn with_jsx_import_source(mut self, import_source: Option<String>) -> Self {
        self.jsx_import_source = import_source;
        self
    }

    /// Remapped target for `specifier` imported from `referrer`, if any entry matches.
    pub fn remap(&self, specifier: &str, referrer: &ModuleSpecifier) -> Option<String> {
        let normalized = normalize_key(specifier, referrer);
        let referrer = referrer.as_str();

        self.scopes
            .iter()
            .filter(|(prefix, _)| referrer.starts_with(prefix.as_str()))
            .find_map(|(_, map)| lookup(map, &normalized))
            .or_else(|| lookup(&self.imports, &normalized))
    }

    pub fn as_resolver(&self) -> &dyn Resolver {
        self
    }
}

impl Resolver for ImportMapResolver {
    fn default_jsx_import_source(&self, _referrer: &ModuleSpecifier) -> Option<String> {
        self.jsx_import_source.clone()
    }

    fn resolve(
        &self,
        specifier: &str,
        referrer_range: &Range,
        _kind: ResolutionKind,
    ) -> Result<ModuleSpecifier, ResolveError> {
        let referrer = &referrer_range.specifier;
        let resolved = match self.remap(specifier, referrer) {
            Some(target) => deno_graph::resolve_import(&target, &self.base),
            None => deno_graph::resolve_import(specifier, referrer),
        };
        resolved.map_err(|err| err.into())
    }
}

/// Keys are normalized like specifiers: relative keys become absolute URLs,
/// bare keys are kept as written. Targets keep their text and are resolved
/// against the config file once matched.
fn specifier_map(base: &ModuleSpecifier, map: &Map<String, Value>) -> SpecifierMap {
    let mut entries: SpecifierMap = map
        .iter()
        .filter_map(|(key, target)| {
            let target = target.as_str()?;
            Some((normalize_key(key, base), target.to_string()))
        })
        .collect();
    // Longest keys first so the most specific prefix wins
    entries.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
    entries
}

fn normalize_key(key: &str, base: &ModuleSpecifier) -> String {
    let is_relative = key.starts_with('/') || key.starts_with("./") || key.starts_with("../");
    if is_relative {
        if let Ok(url) = base.join(key) {
            return url.to_string();
        }
    }
    match ModuleSpecifier::parse(key) {
        Ok(url) => url.to_string(),
        Err(_) => key.to_string(),
    }
}

fn lookup(map: &SpecifierMap, specifier: &str) -> Option<String> {
    map.iter().find_map(|(key, target)| {
        if key == specifier {
            Some(target.clone())
        } else if key.ends_with('/') && target.ends_with('/') {
            specifier
                .strip_prefix(key.as_str())
                .map(|rest| format!("{target}{rest}"))
        } else {
            None
        }
    })
}
