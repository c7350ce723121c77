use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Caller-supplied description of a single bundle run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRequest {
    /// Path to the source HTML document.
    pub document_path: PathBuf,
    /// Output directory. Cleared and recreated by every run.
    pub dist_dir: PathBuf,
    /// Optional project config file (deno.json style).
    #[serde(default, alias = "denoConfigPath")]
    pub config_path: Option<PathBuf>,
    /// Inline bundled code into the document instead of writing sibling files.
    #[serde(default)]
    pub embed_script: bool,
}

impl BundleRequest {
    pub fn new(document_path: impl Into<PathBuf>, dist_dir: impl Into<PathBuf>) -> Self {
        Self {
            document_path: document_path.into(),
            dist_dir: dist_dir.into(),
            config_path: None,
            embed_script: false,
        }
    }

    pub fn with_config_path(mut self, config_path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(config_path.into());
        self
    }

    pub fn with_embed_script(mut self, embed_script: bool) -> Self {
        self.embed_script = embed_script;
        self
    }

    /// Directory relative script sources are resolved against.
    pub fn document_dir(&self) -> &Path {
        match self.document_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_dir() {
        let request = BundleRequest::new("site/index.html", "dist");
        assert_eq!(request.document_dir(), Path::new("site"));

        let request = BundleRequest::new("index.html", "dist");
        assert_eq!(request.document_dir(), Path::new("."));
    }

    #[test]
    fn test_deserialize_camel_case_option_names() {
        let request: BundleRequest = serde_json::from_str(
            r#"{"documentPath": "index.html", "distDir": "dist", "denoConfigPath": "deno.json"}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            BundleRequest::new("index.html", "dist").with_config_path("deno.json")
        );
        assert!(!request.embed_script);
    }
}
