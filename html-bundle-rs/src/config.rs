//! Effective bundler configuration.
//!
//! The configuration handed to the bundler is built once per run from fixed
//! defaults, optionally overlaid by the `compilerOptions` of a project config
//! file. The overlay is a one level merge: nested values in the loaded
//! `compilerOptions` replace the defaults wholesale.

use std::path::{Path, PathBuf};

use deno_ast::{
    DecoratorsTranspileOption, JsxAutomaticOptions, JsxClassicOptions, JsxPrecompileOptions,
    JsxRuntime, SourceMapOption, TranspileOptions,
};
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::bundler::{BundleOptions, BundleType};
use crate::error::{Error, Result};
use crate::fs::read_text_file;
use crate::request::BundleRequest;

const COMPILER_OPTIONS_KEY: &str = "compilerOptions";

/// Configuration shared by every bundle job of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlerConfig {
    /// Allow `http:`/`https:` imports to be fetched.
    pub allow_remote: bool,
    pub minify: bool,
    #[serde(rename = "type")]
    pub bundle_type: BundleType,
    pub compiler_options: Map<String, Value>,
    /// Config file the bundler reads `imports`/`scopes` remappings from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_map: Option<PathBuf>,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        let mut compiler_options = Map::new();
        compiler_options.insert("inlineSourceMap".to_string(), Value::Bool(true));
        Self {
            allow_remote: true,
            minify: true,
            bundle_type: BundleType::Module,
            compiler_options,
            import_map: None,
        }
    }
}

impl BundlerConfig {
    /// Overlays `compilerOptions` from a parsed project config document.
    ///
    /// Keys from `loaded` win. Anything other than an object under
    /// `compilerOptions` is ignored.
    pub fn merge_compiler_options(&mut self, loaded: &Map<String, Value>) {
        if let Some(Value::Object(options)) = loaded.get(COMPILER_OPTIONS_KEY) {
            for (key, value) in options {
                self.compiler_options.insert(key.clone(), value.clone());
            }
        }
    }

    fn compiler_flag(&self, key: &str) -> bool {
        matches!(self.compiler_options.get(key), Some(Value::Bool(true)))
    }

    pub fn source_map(&self) -> SourceMapOption {
        if self.compiler_flag("inlineSourceMap") {
            SourceMapOption::Inline
        } else {
            SourceMapOption::None
        }
    }

    fn compiler_string(&self, key: &str) -> Option<String> {
        self.compiler_options
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn compiler_strings(&self, key: &str) -> Option<Vec<String>> {
        let values = self.compiler_options.get(key)?.as_array()?;
        Some(
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        )
    }

    fn jsx_mode(&self) -> Option<&str> {
        self.compiler_options.get("jsx").and_then(Value::as_str)
    }

    /// TypeScript and JSX transforms requested by `compilerOptions`.
    ///
    /// `jsx` selects the runtime: `react-jsx`, `react-jsxdev` and `precompile`
    /// use the automatic runtime with `jsxImportSource`, anything else the
    /// classic one with `jsxFactory`/`jsxFragmentFactory`. Legacy decorators
    /// are used with `experimentalDecorators`, TC39 decorators otherwise.
    pub fn transpile_options(&self) -> TranspileOptions {
        let automatic = |development| JsxAutomaticOptions {
            development,
            import_source: self.compiler_string("jsxImportSource"),
        };
        let jsx = match self.jsx_mode() {
            Some("react-jsx") => JsxRuntime::Automatic(automatic(false)),
            Some("react-jsxdev") => JsxRuntime::Automatic(automatic(true)),
            Some("precompile") => JsxRuntime::Precompile(JsxPrecompileOptions {
                automatic: automatic(false),
                skip_elements: self.compiler_strings("jsxPrecompileSkipElements"),
                dynamic_props: None,
            }),
            _ => {
                let defaults = JsxClassicOptions::default();
                JsxRuntime::Classic(JsxClassicOptions {
                    factory: self
                        .compiler_string("jsxFactory")
                        .unwrap_or(defaults.factory),
                    fragment_factory: self
                        .compiler_string("jsxFragmentFactory")
                        .unwrap_or(defaults.fragment_factory),
                })
            }
        };
        let decorators = if self.compiler_flag("experimentalDecorators") {
            DecoratorsTranspileOption::LegacyTypeScript {
                emit_metadata: self.compiler_flag("emitDecoratorMetadata"),
            }
        } else {
            DecoratorsTranspileOption::Ecma
        };

        TranspileOptions {
            decorators,
            jsx: Some(jsx),
            verbatim_module_syntax: self.compiler_flag("verbatimModuleSyntax"),
            ..Default::default()
        }
    }

    /// Module the automatic JSX runtime is imported from, if that runtime is selected.
    pub fn jsx_import_source(&self) -> Option<String> {
        match self.jsx_mode() {
            Some("react-jsx" | "react-jsxdev" | "precompile") => {
                self.compiler_string("jsxImportSource")
            }
            _ => None,
        }
    }

    pub fn bundle_options(&self) -> BundleOptions {
        BundleOptions {
            bundle_type: self.bundle_type,
            minify: self.minify,
            source_map: self.source_map(),
            transpile: self.transpile_options(),
        }
    }
}

/// Builds the effective configuration for a run.
pub async fn build_config(request: &BundleRequest) -> Result<BundlerConfig> {
    let mut config = BundlerConfig::default();
    let Some(config_path) = &request.config_path else {
        return Ok(config);
    };

    let loaded = load_config_file(config_path).await?;
    config.merge_compiler_options(&loaded);
    config.import_map = Some(config_path.clone());

    debug!(
        "Effective bundler config: {}",
        serde_json::to_string(&config).unwrap_or_default()
    );
    Ok(config)
}

async fn load_config_file(path: &Path) -> Result<Map<String, Value>> {
    let text = read_text_file(path)
        .await
        .map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
    parse_config_text(&text).map_err(|message| Error::ConfigParse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parses a JSONC config document that must hold an object at the top level.
pub(crate) fn parse_config_text(text: &str) -> Result<Map<String, Value>, String> {
    let value = jsonc_parser::parse_to_serde_value(text, &Default::default())
        .map_err(|err| err.to_string())?;
    match value {
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err("expected an object at the top level".to_string()),
        None => Err("config file is empty".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = BundlerConfig::default();
        assert!(config.allow_remote);
        assert!(config.minify);
        assert_eq!(config.bundle_type, BundleType::Module);
        assert_eq!(config.source_map(), SourceMapOption::Inline);
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({
                "allowRemote": true,
                "minify": true,
                "type": "module",
                "compilerOptions": {"inlineSourceMap": true}
            })
        );
    }

    #[test]
    fn test_merge_overrides_and_reaches_bundle_options() {
        let mut config = BundlerConfig::default();
        config.merge_compiler_options(&object(json!({
            "compilerOptions": {"inlineSourceMap": false, "jsxFactory": "h"}
        })));

        assert_eq!(config.compiler_options["inlineSourceMap"], json!(false));
        assert_eq!(config.compiler_options["jsxFactory"], json!("h"));
        // Top-level bundle settings are not compiler options
        assert!(config.minify);
        assert_eq!(config.bundle_type, BundleType::Module);

        let options = config.bundle_options();
        assert_eq!(options.source_map, SourceMapOption::None);
        let jsx = options.transpile.jsx.unwrap();
        assert_eq!(jsx.classic().unwrap().factory, "h");
        assert_eq!(jsx.classic().unwrap().fragment_factory, "React.Fragment");
    }

    #[test]
    fn test_transpile_options_defaults() {
        let options = BundlerConfig::default().transpile_options();
        let jsx = options.jsx.unwrap();
        assert_eq!(jsx.classic().unwrap().factory, "React.createElement");
        assert!(matches!(options.decorators, DecoratorsTranspileOption::Ecma));
        assert!(!options.verbatim_module_syntax);
    }

    #[test]
    fn test_transpile_options_automatic_jsx() {
        let mut config = BundlerConfig::default();
        config.merge_compiler_options(&object(json!({
            "compilerOptions": {"jsx": "react-jsxdev", "jsxImportSource": "https://esm.sh/preact"}
        })));

        let jsx = config.transpile_options().jsx.unwrap();
        let automatic = jsx.automatic().unwrap();
        assert!(automatic.development);
        assert_eq!(automatic.import_source.as_deref(), Some("https://esm.sh/preact"));
        assert_eq!(
            config.jsx_import_source().as_deref(),
            Some("https://esm.sh/preact")
        );
    }

    #[test]
    fn test_jsx_import_source_ignored_for_classic_runtime() {
        let mut config = BundlerConfig::default();
        config.merge_compiler_options(&object(json!({
            "compilerOptions": {"jsx": "react", "jsxImportSource": "https://esm.sh/preact"}
        })));
        assert_eq!(config.jsx_import_source(), None);
        assert!(config.transpile_options().jsx.unwrap().classic().is_some());
    }

    #[test]
    fn test_transpile_options_legacy_decorators() {
        let mut config = BundlerConfig::default();
        config.merge_compiler_options(&object(json!({
            "compilerOptions": {
                "experimentalDecorators": true,
                "emitDecoratorMetadata": true,
                "verbatimModuleSyntax": true
            }
        })));

        let options = config.transpile_options();
        assert!(matches!(
            options.decorators,
            DecoratorsTranspileOption::LegacyTypeScript { emit_metadata: true }
        ));
        assert!(options.verbatim_module_syntax);
    }

    #[test]
    fn test_merge_replaces_nested_values_wholesale() {
        let mut config = BundlerConfig::default();
        config
            .compiler_options
            .insert("paths".into(), json!({"a": ["./a"], "b": ["./b"]}));

        config.merge_compiler_options(&object(json!({"compilerOptions": {"paths": {"c": ["./c"]}}})));

        assert_eq!(config.compiler_options["paths"], json!({"c": ["./c"]}));
    }

    #[test]
    fn test_merge_ignores_other_keys() {
        let mut config = BundlerConfig::default();
        config.merge_compiler_options(&object(json!({
            "imports": {"lodash": "https://esm.sh/lodash"},
            "compilerOptions": "not an object"
        })));
        assert_eq!(config, BundlerConfig::default());
    }

    #[test]
    fn test_inline_source_map_can_be_disabled() {
        let mut config = BundlerConfig::default();
        config.merge_compiler_options(&object(json!({"compilerOptions": {"inlineSourceMap": false}})));
        assert_eq!(config.source_map(), SourceMapOption::None);
    }

    #[test]
    fn test_parse_config_text_accepts_jsonc() {
        let map = parse_config_text(
            r#"{
                // comment
                "compilerOptions": { "jsx": "react", },
            }"#,
        )
        .unwrap();
        assert_eq!(map["compilerOptions"], json!({"jsx": "react"}));
    }

    #[test]
    fn test_parse_config_text_rejects_non_objects() {
        assert!(parse_config_text("[1, 2]").is_err());
        assert!(parse_config_text("").is_err());
        assert!(parse_config_text("{ \"a\": ").is_err());
    }

    #[tokio::test]
    async fn test_build_config_without_config_path() {
        let request = BundleRequest::new("index.html", "dist");
        assert_eq!(build_config(&request).await.unwrap(), BundlerConfig::default());
    }

    #[tokio::test]
    async fn test_build_config_sets_import_map() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = temp.path().join("deno.json");
        std::fs::write(&config_path, r#"{"compilerOptions": {"inlineSourceMap": false}}"#).unwrap();

        let request = BundleRequest::new("index.html", "dist").with_config_path(&config_path);
        let config = build_config(&request).await.unwrap();

        assert_eq!(config.import_map.as_deref(), Some(config_path.as_path()));
        assert_eq!(config.compiler_options["inlineSourceMap"], json!(false));
        assert!(config.minify);
    }

    #[tokio::test]
    async fn test_build_config_from_file_reaches_transpile_options() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = temp.path().join("deno.json");
        std::fs::write(
            &config_path,
            "{\n  // trailing comma too\n  \"compilerOptions\": {\"jsxFactory\": \"h\", \"experimentalDecorators\": true,},\n}\n",
        )
        .unwrap();

        let request = BundleRequest::new("index.html", "dist").with_config_path(&config_path);
        let options = build_config(&request).await.unwrap().bundle_options();

        assert_eq!(options.source_map, SourceMapOption::Inline);
        let jsx = options.transpile.jsx.unwrap();
        let classic = jsx.classic().unwrap();
        assert_eq!(classic.factory, "h");
        assert_eq!(classic.fragment_factory, "React.Fragment");
        assert!(matches!(
            options.transpile.decorators,
            DecoratorsTranspileOption::LegacyTypeScript { emit_metadata: false }
        ));
    }

    #[tokio::test]
    async fn test_build_config_missing_file() {
        let request = BundleRequest::new("index.html", "dist").with_config_path("does/not/exist.json");
        let err = build_config(&request).await.unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[tokio::test]
    async fn test_build_config_malformed_file() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = temp.path().join("deno.json");
        std::fs::write(&config_path, "{ compilerOptions: ").unwrap();

        let request = BundleRequest::new("index.html", "dist").with_config_path(&config_path);
        let err = build_config(&request).await.unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }
}
