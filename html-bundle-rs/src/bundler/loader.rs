//! Module loader for the bundler.
//!
//! Implements deno_graph's Loader trait for local `file:` modules and, when
//! remote imports are allowed, `http:`/`https:` modules fetched with reqwest.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use deno_graph::source::{LoadError, LoadFuture, LoadOptions, LoadResponse, Loader};
use deno_graph::ModuleSpecifier;
use log::debug;
use reqwest::{Client, StatusCode};

static HTML_BUNDLE_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

lazy_static! {
    static ref REQWEST_CLIENT: Client = reqwest::ClientBuilder::new()
        .user_agent(HTML_BUNDLE_USER_AGENT)
        .build()
        .expect("Failed to construct reqwest client");
}

/// Loader serving the module graph of a single script entry point.
#[derive(Debug, Clone, Copy)]
pub struct ScriptGraphLoader {
    /// Whether `http:`/`https:` specifiers may be fetched.
    pub allow_remote: bool,
}

impl ScriptGraphLoader {
    pub fn new(allow_remote: bool) -> Self {
        Self { allow_remote }
    }

    async fn load_specifier(
        self,
        specifier: ModuleSpecifier,
    ) -> Result<Option<LoadResponse>, LoadError> {
        match specifier.scheme() {
            "file" => load_file(specifier).await,
            "http" | "https" if self.allow_remote => load_remote(specifier).await,
            "http" | "https" => Err(load_error(
                io::ErrorKind::PermissionDenied,
                format!("Remote import of {specifier} is not allowed"),
            )),
            scheme => Err(load_error(
                io::ErrorKind::Unsupported,
                format!("Unsupported scheme \"{scheme}\" for module {specifier}"),
            )),
        }
    }
}

impl Loader for ScriptGraphLoader {
    fn load(&self, specifier: &ModuleSpecifier, _options: LoadOptions) -> LoadFuture {
        Box::pin(self.load_specifier(specifier.clone()))
    }
}

fn load_error(kind: io::ErrorKind, message: String) -> LoadError {
    LoadError::Other(Arc::new(io::Error::new(kind, message)))
}

async fn load_file(specifier: ModuleSpecifier) -> Result<Option<LoadResponse>, LoadError> {
    let path = specifier.to_file_path().map_err(|_| {
        load_error(
            io::ErrorKind::InvalidInput,
            format!("Invalid file specifier {specifier}"),
        )
    })?;

    debug!("Loading module {}", path.display());
    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        // deno_graph reports missing modules itself
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(LoadError::Other(Arc::new(err))),
    };

    Ok(Some(LoadResponse::Module {
        specifier,
        maybe_headers: None,
        content: Arc::from(content),
        mtime: None,
    }))
}

async fn load_remote(specifier: ModuleSpecifier) -> Result<Option<LoadResponse>, LoadError> {
    debug!("Fetching module {specifier}");
    let fetch_error =
        |err: reqwest::Error| load_error(io::ErrorKind::Other, format!("{specifier}: {err}"));

    let response = REQWEST_CLIENT
        .get(specifier.as_str())
        .send()
        .await
        .map_err(fetch_error)?;

    match response.status() {
        StatusCode::NOT_FOUND => return Ok(None),
        status if !status.is_success() => {
            return Err(load_error(
                io::ErrorKind::Other,
                format!("Failed to fetch {specifier} with status code {status}"),
            ));
        }
        _ => {}
    }

    // Redirects are followed by reqwest; report the final location to deno_graph
    let final_specifier =
        ModuleSpecifier::parse(response.url().as_str()).unwrap_or_else(|_| specifier.clone());
    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
        })
        .collect();
    let content = response.bytes().await.map_err(fetch_error)?;

    Ok(Some(LoadResponse::Module {
        specifier: final_specifier,
        maybe_headers: Some(headers),
        content: Arc::from(content.as_ref()),
        mtime: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_specifier(path: &std::path::Path) -> ModuleSpecifier {
        ModuleSpecifier::from_file_path(path).unwrap()
    }

    #[tokio::test]
    async fn test_load_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("mod.js");
        std::fs::write(&path, "export const a = 1;").unwrap();

        let specifier = file_specifier(&path);
        let response = ScriptGraphLoader::new(false)
            .load_specifier(specifier)
            .await
            .unwrap();

        match response {
            Some(LoadResponse::Module { content, .. }) => {
                assert_eq!(content.as_ref(), b"export const a = 1;")
            }
            _ => panic!("expected module response"),
        }
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let specifier = file_specifier(&temp.path().join("missing.js"));
        let response = ScriptGraphLoader::new(true)
            .load_specifier(specifier)
            .await
            .unwrap();
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_remote_denied() {
        let specifier = ModuleSpecifier::parse("https://example.com/mod.js").unwrap();
        let result = ScriptGraphLoader::new(false).load_specifier(specifier).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let specifier = ModuleSpecifier::parse("ftp://example.com/mod.js").unwrap();
        let result = ScriptGraphLoader::new(true).load_specifier(specifier).await;
        assert!(result.is_err());
    }
}
