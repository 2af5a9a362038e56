//! # Penmark
//!
//! A blog front-end rendering pipeline: theme templates written with
//! `<tag:Name/>` markup are compiled into cached units, executed against a
//! context stack of record sets, and served through an ordered URL router.
//!
//! ## Crates
//!
//! - [`exception`]: the shared error type
//! - [`conf`]: layered settings and the typed blog view
//! - [`template`]: filters, context stack, tag compiler, unit cache, renderer
//! - [`urls`]: route table, dispatcher and built-in blog handlers
//! - [`server`]: hyper server, JSON data provider, logging (feature `server`)
//!
//! ## Quick Example
//!
//! ```
//! use penmark::prelude::*;
//!
//! let compiler = TagCompiler::with_builtin_tags().unwrap();
//! let code = compiler
//!     .compile("inline", "<tag:Entries><tag:EntryTitle upper_case=\"1\"/>;</tag:Entries>")
//!     .unwrap();
//! assert!(code.to_json().unwrap().contains("EntryTitle"));
//!
//! let mut ctx = Context::new();
//! let posts = RecordSet::from_values(vec![serde_json::json!({"title": "hi"})]);
//! ctx.push("posts", Value::from(posts));
//! assert!(ctx.get("posts").is_records());
//! ctx.push("posts", Value::Absent);
//! assert!(!ctx.get("posts").is_records());
//! ```

pub use penmark_conf as conf;
pub use penmark_exception as exception;
#[cfg(feature = "server")]
pub use penmark_server as server;
pub use penmark_template as template;
pub use penmark_urls as urls;

pub use penmark_exception::{Error, Result};

/// Commonly used types
pub mod prelude {
	pub use penmark_conf::{BlogSettings, Settings, SettingsStore, UrlScan};
	pub use penmark_exception::{Error, Result};
	pub use penmark_template::{
		Behaviors, CachePolicy, Context, DataProvider, Document, DocumentRenderer, FilterOutcome,
		QueryParams, RecordSet, RenderOptions, TagCompiler, TemplateBehavior, TemplateLoader,
		UnitCache, Value,
	};
	pub use penmark_urls::handlers::register_blog_routes;
	pub use penmark_urls::{
		DispatchBehavior, Dispatcher, Request, Response, RouteContext, RouteMatch, Router,
		Services,
	};

	#[cfg(feature = "server")]
	pub use penmark_server::{HttpServer, JsonDataProvider, build_dispatcher};
}
