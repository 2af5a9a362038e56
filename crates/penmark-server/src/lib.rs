//! # Penmark Server
//!
//! Hosting layer: a hyper HTTP/1.1 server around the dispatcher, a JSON-file
//! [`DataProvider`](penmark_template::provider::DataProvider), logging setup
//! and the wiring that turns [`Settings`] into a ready [`Dispatcher`].

pub mod http;
pub mod logging;
pub mod provider;

pub use self::http::{HttpServer, shutdown_signal};
pub use logging::init_logging;
pub use provider::JsonDataProvider;

use penmark_conf::Settings;
use penmark_exception::Result;
use penmark_template::cache::{CachePolicy, UnitCache};
use penmark_template::compiler::TagCompiler;
use penmark_template::document::{DocumentRenderer, RenderOptions};
use penmark_template::loader::TemplateLoader;
use penmark_template::provider::DataProvider;
use penmark_urls::handlers::register_blog_routes;
use penmark_urls::{Dispatcher, Services};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const TEMPLATE_EXTENSIONS: &[&str] = &["html", "xml", "atom", "rss", "txt", "json"];

/// Build the renderer, route table and dispatcher described by `settings`
pub fn build_dispatcher(settings: Settings, provider: Arc<dyn DataProvider>) -> Result<Dispatcher> {
	let blog = settings.blog()?;
	let compiler = Arc::new(TagCompiler::with_builtin_tags()?);
	let cache = UnitCache::new(CachePolicy::from_settings(&blog));
	let renderer = DocumentRenderer::new(TemplateLoader::new(blog.theme_dirs.clone()), compiler, cache)
		.with_options(RenderOptions::from_settings(&blog));
	tracing::debug!(
		theme_dirs = ?blog.theme_dirs,
		cache = ?renderer.cache(),
		url_scan = ?blog.url_scan,
		"built renderer"
	);

	let mut services = Services::new(renderer, provider, settings, blog);
	register_blog_routes(&mut services.router)?;
	Dispatcher::new(services)
}

/// Compile every template reachable through the search path
///
/// Returns the names that compiled; the first failure is returned as an error.
pub fn check_templates(dispatcher: &Dispatcher) -> Result<Vec<String>> {
	let renderer = &dispatcher.services().renderer;
	let mut names = BTreeSet::new();
	for dir in renderer.loader().dirs() {
		collect_templates(dir, dir, &mut names)?;
	}
	for name in &names {
		renderer.compiled(name)?;
		tracing::debug!(template = %name, "compiled");
	}
	Ok(names.into_iter().collect())
}

fn collect_templates(root: &Path, dir: &Path, names: &mut BTreeSet<String>) -> Result<()> {
	if !dir.is_dir() {
		tracing::warn!(dir = %dir.display(), "theme directory does not exist");
		return Ok(());
	}
	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		if path.is_dir() {
			collect_templates(root, &path, names)?;
			continue;
		}
		let known = path
			.extension()
			.and_then(|ext| ext.to_str())
			.is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext));
		if let (true, Ok(relative)) = (known, path.strip_prefix(root)) {
			let name: Vec<_> = relative
				.components()
				.map(|c| c.as_os_str().to_string_lossy())
				.collect();
			names.insert(name.join("/"));
		}
	}
	Ok(())
}
