// Allow uninlined format args for cleaner bail!/anyhow! macros
#![allow(clippy::uninlined_format_args)]
#![doc = include_str!("../README.md")]

pub mod bundler;
pub mod config;
pub mod document;
pub mod error;
pub mod fs;
pub mod pipeline;
pub mod request;
pub mod runner;

#[macro_use]
extern crate lazy_static;

pub use bundler::{BundleEmit, DenoBundler, ScriptBundler};
pub use config::BundlerConfig;
pub use document::Document;
pub use error::{Error, Result};
pub use pipeline::{bundle, bundle_with, BundleReport};
pub use request::BundleRequest;
pub use runner::ScriptOutput;
pub use anyhow;
