//! # Penmark Template
//!
//! The rendering half of penmark: theme markup goes in, bytes come out.
//!
//! ## Pipeline
//!
//! 1. [`loader::TemplateLoader`] finds a template on the ordered theme path.
//! 2. [`compiler::TagCompiler`] turns its markup into a [`code::Code`] tree,
//!    cached per path and mtime by [`cache::UnitCache`].
//! 3. [`exec::execute`] runs the tree against a [`context::Context`], pulling
//!    records from a [`provider::DataProvider`]; scalar output goes through the
//!    fixed-order [`filters`] pipeline.
//! 4. [`document::DocumentRenderer`] wraps it all and computes HTTP validators.
//!
//! Third parties hook into compilation and filtering through
//! [`behaviors::TemplateBehavior`].
//!
//! ## Example
//!
//! ```
//! use penmark_template::compiler::TagCompiler;
//!
//! let compiler = TagCompiler::with_builtin_tags().unwrap();
//! let code = compiler
//!     .compile("inline", "<h1><tag:BlogName encode_html=\"1\"/></h1>")
//!     .unwrap();
//! assert_eq!(code.instrs().len(), 3);
//! ```

pub mod behaviors;
pub mod cache;
pub mod code;
pub mod compiler;
pub mod context;
pub mod document;
pub mod exec;
pub mod filters;
pub mod loader;
mod parser;
pub mod provider;
pub mod record;
pub mod tags;

pub use behaviors::{Behaviors, FilterOutcome, TemplateBehavior};
pub use cache::{CachePolicy, CacheStatistics, UnitCache};
pub use code::Code;
pub use compiler::{TagCompiler, TagInvocation};
pub use context::{Context, RecordSetHandle, Value};
pub use document::{Document, DocumentRenderer, RenderOptions, Validators};
pub use exec::{RenderEnv, UrlFor};
pub use filters::{FilterName, FilterSpec};
pub use loader::{ResolvedTemplate, TemplateLoader};
pub use provider::{DataProvider, QueryParams, RecordKind};
pub use record::{RecordSet, Row};
