use std::io;
use std::path::PathBuf;

use log::info;

use crate::bundler::{DenoBundler, ScriptBundler};
use crate::config::build_config;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::fs::{empty_dir, ensure_dir, read_text_file, write_text_file};
use crate::request::BundleRequest;
use crate::runner::{BundleJobRunner, ScriptOutput};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReport {
    /// The rewritten document inside the dist directory.
    pub document: PathBuf,
    /// One entry per external script, in document order.
    pub scripts: Vec<ScriptOutput>,
}

/// Bundles every external script of the request's document with [`DenoBundler`].
pub async fn bundle(request: &BundleRequest) -> Result<BundleReport> {
    bundle_with(request, &DenoBundler).await
}

/// Runs the document pipeline with the given bundler.
///
/// The dist directory is emptied first. Scripts are bundled one after the
/// other in document order, and the first failure aborts the run, leaving
/// whatever bundles were already written in place.
pub async fn bundle_with<B: ScriptBundler>(
    request: &BundleRequest,
    bundler: &B,
) -> Result<BundleReport> {
    let dist_dir = &request.dist_dir;
    info!(
        "Bundling {} into {}",
        request.document_path.display(),
        dist_dir.display()
    );

    empty_dir(dist_dir).await.map_err(|source| Error::Write {
        path: dist_dir.clone(),
        source,
    })?;

    let html = read_text_file(&request.document_path)
        .await
        .map_err(|source| Error::Read {
            path: request.document_path.clone(),
            source,
        })?;
    let mut document = Document::parse(&html)?;

    let config = build_config(request).await?;

    let mut runner = BundleJobRunner::new(
        bundler,
        &config,
        request.document_dir(),
        dist_dir,
        request.embed_script,
    );
    let mut scripts = Vec::new();
    for script in document.external_scripts() {
        let src = document
            .attribute(script, "src")
            .unwrap_or_default()
            .to_string();
        scripts.push(runner.run(&mut document, script, &src).await?);
    }

    let html = document.to_html()?;

    let file_name = request.document_path.file_name().ok_or_else(|| Error::Read {
        path: request.document_path.clone(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "document path has no file name"),
    })?;
    let output = dist_dir.join(file_name);
    ensure_dir(dist_dir).await.map_err(|source| Error::Write {
        path: dist_dir.clone(),
        source,
    })?;
    write_text_file(&output, &html)
        .await
        .map_err(|source| Error::Write {
            path: output.clone(),
            source,
        })?;
    info!("Wrote {}", output.display());

    Ok(BundleReport {
        document: output,
        scripts,
    })
}
