//! Core bundling logic using SWC bundler.
//!
//! This module implements the JavaScript bundling process by:
//! 1. Building a module graph using deno_graph
//! 2. Transpiling TypeScript/JSX modules to JavaScript using deno_ast
//! 3. Bundling into a single output using SWC bundler
//! 4. Appending an inline source map when requested

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context};
use base64::Engine;
use deno_ast::swc::ast::EsVersion;
use deno_ast::swc::bundler::{Bundler, Config as BundlerConfig, Load, ModuleData, Resolve};
use deno_ast::swc::codegen::text_writer::JsWriter;
use deno_ast::swc::codegen::{Config as CodegenConfig, Emitter};
use deno_ast::swc::common::comments::SingleThreadedComments;
use deno_ast::swc::common::sync::Lrc;
use deno_ast::swc::common::{FileName, Globals, SourceMap, GLOBALS};
use deno_ast::swc::loader::resolve::Resolution;
use deno_ast::swc::parser::lexer::Lexer;
use deno_ast::swc::parser::{EsSyntax, Parser, StringInput, Syntax};
use deno_ast::{EmitOptions, MediaType, SourceMapOption, TranspileModuleOptions, TranspileOptions};
use deno_graph::source::{Loader, Resolver};
use deno_graph::{BuildOptions, GraphKind, Module, ModuleGraph, ModuleSpecifier};
use serde::Serialize;

use super::bundle_hook::BundleHook;
use super::text::{strip_bom, transform_json_source};

/// Options for JavaScript bundling.
#[derive(Debug, Clone)]
pub struct BundleOptions {
    /// The type of bundle output.
    pub bundle_type: BundleType,
    /// Whether to minify the output.
    pub minify: bool,
    /// Where the source map of the bundle goes. Only inline maps are emitted.
    pub source_map: SourceMapOption,
    /// TypeScript/JSX transforms applied to each module before bundling.
    pub transpile: TranspileOptions,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            bundle_type: BundleType::Module,
            minify: true,
            source_map: SourceMapOption::Inline,
            transpile: TranspileOptions::default(),
        }
    }
}

/// The type of bundle output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    /// ES Module output
    Module,
    /// Classic IIFE output
    Classic,
}

impl From<BundleType> for deno_ast::swc::bundler::ModuleType {
    fn from(bt: BundleType) -> Self {
        match bt {
            BundleType::Module => deno_ast::swc::bundler::ModuleType::Es,
            BundleType::Classic => deno_ast::swc::bundler::ModuleType::Iife,
        }
    }
}

/// The result of a bundle operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEmit {
    /// The bundled JavaScript code.
    pub code: String,
}

/// Builds the module graph rooted at `root` and bundles it into a single file.
pub async fn bundle(
    root: ModuleSpecifier,
    loader: &dyn Loader,
    resolver: Option<&dyn Resolver>,
    options: BundleOptions,
) -> Result<BundleEmit, anyhow::Error> {
    let mut graph = ModuleGraph::new(GraphKind::CodeOnly);
    graph
        .build(
            vec![root],
            vec![],
            loader,
            BuildOptions {
                resolver,
                ..Default::default()
            },
        )
        .await;

    // Missing files, failed fetches and unresolved imports surface here
    graph.valid()?;

    bundle_graph(&graph, options)
}

/// Bundles a module graph into a single JavaScript file.
fn bundle_graph(graph: &ModuleGraph, options: BundleOptions) -> Result<BundleEmit, anyhow::Error> {
    let globals = Globals::new();

    GLOBALS.set(&globals, || {
        let source_map = Lrc::new(SourceMap::default());

        let bundle_loader = SWCBundleLoader {
            graph,
            source_map: source_map.clone(),
            transpile_options: &options.transpile,
        };
        let bundle_resolver = SWCBundleResolver { graph };
        let hook = Box::new(BundleHook);

        // Npm, node and external specifiers are left as imports in the output
        let external_modules: Vec<_> = graph
            .modules()
            .filter_map(|m| match m {
                Module::External(_) | Module::Node(_) | Module::Npm(_) => {
                    Some(m.specifier().to_string().into())
                }
                _ => None,
            })
            .collect();

        let config = BundlerConfig {
            module: options.bundle_type.into(),
            external_modules,
            ..Default::default()
        };

        let mut bundler = Bundler::new(
            &globals,
            source_map.clone(),
            bundle_loader,
            bundle_resolver,
            config,
            hook,
        );

        let mut entries = HashMap::new();
        if let Some(root) = graph.roots.first() {
            entries.insert("bundle".to_string(), FileName::Url(root.clone()));
        } else {
            bail!("No root module in graph");
        }

        let bundles = bundler
            .bundle(entries)
            .context("Unable to output during bundling")?;
        let Some(output) = bundles.first() else {
            bail!("Bundler produced no output");
        };

        let mut buf = Vec::new();
        let mut mappings = Vec::new();
        {
            let cfg = CodegenConfig::default()
                .with_minify(options.minify)
                .with_target(EsVersion::Es2020)
                .with_omit_last_semi(false);

            let mut emitter = Emitter {
                cfg,
                cm: source_map.clone(),
                comments: None,
                wr: Box::new(JsWriter::new(
                    source_map.clone(),
                    "\n",
                    &mut buf,
                    Some(&mut mappings),
                )),
            };

            emitter
                .emit_module(&output.module)
                .context("Unable to emit during bundling")?;
        }

        let mut code = String::from_utf8(buf).context("Emitted code is an invalid string")?;

        if options.source_map == SourceMapOption::Inline {
            let source_map_config = deno_ast::SourceMapConfig {
                inline_sources: true,
                maybe_base: None,
            };
            let mut map_buf = Vec::new();
            source_map
                .build_source_map(&mappings, None, source_map_config)
                .to_writer(&mut map_buf)?;
            if !code.ends_with('\n') {
                code.push('\n');
            }
            code.push_str("//# sourceMappingURL=data:application/json;base64,");
            base64::prelude::BASE64_STANDARD.encode_string(map_buf, &mut code);
        }

        Ok(BundleEmit { code })
    })
}

/// SWC bundler Load trait implementation that loads modules from the graph.
struct SWCBundleLoader<'a> {
    graph: &'a ModuleGraph,
    source_map: Lrc<SourceMap>,
    transpile_options: &'a TranspileOptions,
}

impl Load for SWCBundleLoader<'_> {
    fn load(&self, file: &FileName) -> Result<ModuleData, anyhow::Error> {
        let specifier = match file {
            FileName::Url(url) => url,
            _ => bail!("Unsupported file name: {:?}", file),
        };

        let module = self
            .graph
            .get(specifier)
            .ok_or_else(|| anyhow!("Module not found in graph: {}", specifier))?;

        let (source, media_type) = match module {
            Module::Js(m) => (m.source.text.as_ref(), m.media_type),
            Module::Json(m) => (m.source.text.as_ref(), m.media_type),
            Module::Wasm(_) => bail!("WebAssembly modules are not supported for bundling"),
            Module::Npm(_) => bail!("NPM modules are not supported for bundling"),
            Module::Node(_) => bail!("Node built-in modules are not supported for bundling"),
            Module::External(_) => bail!("External modules are not supported for bundling"),
        };

        let (source_file, swc_module) = transpile_module(
            specifier,
            source,
            media_type,
            self.transpile_options,
            &self.source_map,
        )?;

        Ok(ModuleData {
            fm: source_file,
            module: swc_module,
            helpers: Default::default(),
        })
    }
}

/// SWC bundler Resolve trait implementation that resolves specifiers using the graph.
struct SWCBundleResolver<'a> {
    graph: &'a ModuleGraph,
}

impl Resolve for SWCBundleResolver<'_> {
    fn resolve(
        &self,
        base: &FileName,
        module_specifier: &str,
    ) -> Result<Resolution, anyhow::Error> {
        let base_specifier = match base {
            FileName::Url(url) => url,
            _ => bail!("Unsupported base file name: {:?}", base),
        };

        let resolved = self
            .graph
            .resolve_dependency(module_specifier, base_specifier, false)
            .ok_or_else(|| {
                anyhow!(
                    "Failed to resolve '{}' from '{}'",
                    module_specifier,
                    base_specifier
                )
            })?;

        Ok(Resolution {
            filename: FileName::Url(resolved.clone()),
            slug: None,
        })
    }
}

/// Returns true for media types that must go through the TypeScript/JSX transforms.
fn needs_transpile(media_type: MediaType) -> bool {
    matches!(
        media_type,
        MediaType::TypeScript
            | MediaType::Mts
            | MediaType::Cts
            | MediaType::Dts
            | MediaType::Dmts
            | MediaType::Dcts
            | MediaType::Tsx
            | MediaType::Jsx
    )
}

/// Strips types and lowers JSX, returning plain JavaScript source.
fn transpile_to_js(
    specifier: &ModuleSpecifier,
    source: &str,
    media_type: MediaType,
    options: &TranspileOptions,
) -> Result<String, anyhow::Error> {
    let parsed = deno_ast::parse_module(deno_ast::ParseParams {
        specifier: specifier.clone(),
        text: source.into(),
        media_type,
        capture_tokens: false,
        scope_analysis: false,
        maybe_syntax: None,
    })?;
    let transpiled = parsed.transpile(
        options,
        &TranspileModuleOptions::default(),
        &EmitOptions {
            source_map: SourceMapOption::None,
            ..Default::default()
        },
    )?;
    Ok(transpiled.into_source().text)
}

/// Turns a graph module into an SWC module ready for the bundler.
fn transpile_module(
    specifier: &ModuleSpecifier,
    source: &str,
    media_type: MediaType,
    options: &TranspileOptions,
    source_map: &Lrc<SourceMap>,
) -> Result<
    (
        Rc<deno_ast::swc::common::SourceFile>,
        deno_ast::swc::ast::Module,
    ),
    anyhow::Error,
> {
    let source = strip_bom(source);

    let source = if media_type == MediaType::Json {
        transform_json_source(source)?
    } else if needs_transpile(media_type) {
        transpile_to_js(specifier, source, media_type, options)?
    } else {
        source.to_string()
    };

    let source_file = source_map.new_source_file(FileName::Url(specifier.clone()).into(), source);

    // Everything is plain JavaScript at this point
    let comments = SingleThreadedComments::default();
    let input = StringInput::from(&*source_file);
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        EsVersion::Es2020,
        input,
        Some(&comments),
    );
    let mut parser = Parser::new_from(lexer);

    let module = parser
        .parse_module()
        .map_err(|e| anyhow!("Parse error in {}: {:?}", specifier, e))?;

    Ok((Rc::new((*source_file).clone()), module))
}
