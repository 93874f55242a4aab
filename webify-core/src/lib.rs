//! # webify-core
//!
//! Core library for the webify static site builder.
//!
//! This crate compiles a graph of YAML index documents into data artifacts,
//! stub pages and a search index. Documents reference notebooks, markdown
//! files, PDFs, people and each other; `patch` and `sub` directives splice
//! external content and push defaults into children before anything is built.

pub mod assets;
pub mod builder;
pub mod config;
mod content;
pub mod error;
mod html;
pub mod link;
pub mod markdown;
pub mod models;
pub mod notebook;
pub mod page;
pub mod resolve;
pub mod search;
pub mod slug;
pub mod template;
pub mod validate;

pub use assets::{AssetContext, AssetRelocator};
pub use builder::{BuildReport, CompileOptions, IndexSource, Session};
pub use config::{Config, ConfigError};
pub use error::{BuildError, Result};
pub use link::LinkKind;
pub use markdown::MarkdownProcessor;
pub use models::{Diagnostic, DiagnosticSeverity, IndexKind, SearchSettings};
pub use notebook::NotebookExporter;
pub use search::{SearchEntry, SearchIndex};
pub use template::TemplateEngine;
pub use validate::Validator;
