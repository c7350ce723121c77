//! JavaScript/TypeScript bundler.
//!
//! This module turns the entry file of a `<script src>` reference into a
//! single self-contained script. It absorbs the essential functionality of
//! the deprecated deno_emit crate, adapted to current versions of deno_graph
//! and deno_ast.
//!
//! # Architecture
//!
//! - `loader`: Implements `deno_graph::source::Loader` for local and remote modules
//! - `resolver`: Applies the import map declared in the project config file
//! - `bundle_hook`: Handles `import.meta` rewriting during bundling
//! - `emit`: Core bundling logic using SWC bundler
//! - `text`: Utility functions for text processing

mod bundle_hook;
mod emit;
mod loader;
mod resolver;
mod text;

use std::path::Path;

use anyhow::anyhow;
use deno_graph::ModuleSpecifier;
use path_clean::PathClean;

use crate::config::BundlerConfig;

pub use emit::{bundle, BundleEmit, BundleOptions, BundleType};
pub use loader::ScriptGraphLoader;
pub use resolver::ImportMapResolver;

/// Capability that bundles one entry file into a single script.
#[allow(async_fn_in_trait)]
pub trait ScriptBundler {
    async fn bundle(
        &self,
        entry: &Path,
        config: &BundlerConfig,
    ) -> Result<BundleEmit, anyhow::Error>;
}

/// Bundler built on deno_graph and the SWC bundler shipped with deno_ast.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenoBundler;

impl ScriptBundler for DenoBundler {
    async fn bundle(
        &self,
        entry: &Path,
        config: &BundlerConfig,
    ) -> Result<BundleEmit, anyhow::Error> {
        let root = file_specifier(entry)?;
        let loader = ScriptGraphLoader::new(config.allow_remote);
        let resolver = match &config.import_map {
            Some(path) => Some(
                ImportMapResolver::from_config_file(path)
                    .await?
                    .with_jsx_import_source(config.jsx_import_source()),
            ),
            None => None,
        };

        bundle(
            root,
            &loader,
            resolver.as_ref().map(ImportMapResolver::as_resolver),
            config.bundle_options(),
        )
        .await
    }
}

/// `file:` URL for `path`, made absolute against the working directory.
pub(crate) fn file_specifier(path: &Path) -> Result<ModuleSpecifier, anyhow::Error> {
    let absolute = std::path::absolute(path)?.clean();
    ModuleSpecifier::from_file_path(&absolute)
        .map_err(|_| anyhow!("Cannot convert {} to a file URL", absolute.display()))
}
