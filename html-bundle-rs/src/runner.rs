//! Bundle jobs for individual `<script src>` elements.

use std::io;
use std::path::{Component, Path, PathBuf};

use log::{debug, info};
use path_clean::PathClean;

use crate::bundler::ScriptBundler;
use crate::config::BundlerConfig;
use crate::document::{Document, NodeId};
use crate::error::{Error, Result};
use crate::fs::{empty_dir, ensure_dir, write_text_file};

/// Extension given to every linked bundle, whatever the source extension was.
pub const SCRIPT_EXTENSION: &str = "js";

/// What one bundle job produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    /// The `src` attribute as written in the source document.
    pub source: String,
    /// Entry file handed to the bundler.
    pub entry: PathBuf,
    /// Written bundle and its new `src`, or `None` when the code was embedded.
    pub linked: Option<LinkedScript>,
    /// Size of the bundled code in bytes.
    pub code_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedScript {
    pub src: String,
    pub path: PathBuf,
}

/// Runs bundle jobs against the live document, one script at a time.
///
/// The runner keeps the run-wide context (shared config, directories, mode)
/// and the list of files written so far, so that preparing the directory of
/// a later script never erases the bundle of an earlier one.
pub struct BundleJobRunner<'a, B> {
    bundler: &'a B,
    config: &'a BundlerConfig,
    document_dir: &'a Path,
    dist_dir: &'a Path,
    embed_script: bool,
    written: Vec<PathBuf>,
}

impl<'a, B: ScriptBundler> BundleJobRunner<'a, B> {
    pub fn new(
        bundler: &'a B,
        config: &'a BundlerConfig,
        document_dir: &'a Path,
        dist_dir: &'a Path,
        embed_script: bool,
    ) -> Self {
        Self {
            bundler,
            config,
            document_dir,
            dist_dir,
            embed_script,
            written: Vec::new(),
        }
    }

    /// Bundles the script referenced by `src` and rewrites element `script`.
    pub async fn run(
        &mut self,
        document: &mut Document,
        script: NodeId,
        src: &str,
    ) -> Result<ScriptOutput> {
        let entry = resolve_source(self.document_dir, src);
        let destination = if self.embed_script {
            None
        } else {
            let new_src = replace_extension(src, SCRIPT_EXTENSION);
            let path = output_path(self.dist_dir, &new_src)?;
            Some(LinkedScript { src: new_src, path })
        };
        info!("Bundling {}", entry.display());

        let emit = self
            .bundler
            .bundle(&entry, self.config)
            .await
            .map_err(|source| Error::Bundle {
                entry: entry.clone(),
                source,
            })?;

        match &destination {
            None => {
                document.remove_attribute(script, "src");
                document.set_text_content(script, &emit.code);
            }
            Some(LinkedScript { src: new_src, path }) => {
                if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                    self.prepare_dir(dir).await?;
                }
                write_text_file(path, &emit.code)
                    .await
                    .map_err(|source| Error::Write {
                        path: path.clone(),
                        source,
                    })?;
                info!("Wrote {}", path.display());
                self.written.push(path.clone());
                document.set_attribute(script, "src", new_src);
            }
        }

        Ok(ScriptOutput {
            source: src.to_string(),
            entry,
            linked: destination,
            code_len: emit.code.len(),
        })
    }

    /// Empties `dir` unless an earlier job of this run already wrote inside it.
    async fn prepare_dir(&self, dir: &Path) -> Result<()> {
        let result = if self.written.iter().any(|path| path.starts_with(dir)) {
            debug!("Reusing output directory {}", dir.display());
            ensure_dir(dir).await
        } else {
            debug!("Preparing empty output directory {}", dir.display());
            empty_dir(dir).await
        };
        result.map_err(|source| Error::Write {
            path: dir.to_path_buf(),
            source,
        })
    }
}

/// Joins a `src` value onto `base` the way URL-ish paths join: a leading `/`
/// stays under `base`.
fn join_relative(base: &Path, src: &str) -> PathBuf {
    base.join(src.trim_start_matches('/')).clean()
}

/// Where the bundle for `new_src` is written. Only paths strictly inside
/// `dist_dir` are accepted, since their directory may be emptied.
fn output_path(dist_dir: &Path, new_src: &str) -> Result<PathBuf> {
    let relative = Path::new(new_src.trim_start_matches('/')).clean();
    let inside = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if inside && !relative.as_os_str().is_empty() {
        return Ok(dist_dir.join(relative));
    }
    Err(Error::Write {
        path: dist_dir.join(&relative),
        source: io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "script {new_src:?} would be written outside of {}",
                dist_dir.display()
            ),
        ),
    })
}

/// Filesystem path of the script `src` relative to the document directory.
pub fn resolve_source(document_dir: &Path, src: &str) -> PathBuf {
    join_relative(document_dir, src)
}

/// Replaces the extension of the last path segment of `src` with `extension`.
///
/// A name without an extension gets one appended. A leading dot (`.env`) does
/// not start an extension.
pub fn replace_extension(src: &str, extension: &str) -> String {
    let name_start = src.rfind('/').map(|i| i + 1).unwrap_or(0);
    let stem_end = match src[name_start..].rfind('.') {
        Some(dot) if dot > 0 => name_start + dot,
        _ => src.len(),
    };
    format!("{}.{}", &src[..stem_end], extension)
}
