//! Document rendering
//!
//! [`DocumentRenderer::render`] resolves a template on the search path, fetches
//! or builds its compiled unit, runs it against the context and, when HTTP
//! caching is on, computes validators and answers conditional requests.

use crate::cache::UnitCache;
use crate::code::Code;
use crate::compiler::TagCompiler;
use crate::context::Context;
use crate::exec::{RenderEnv, execute};
use crate::loader::{ResolvedTemplate, TemplateLoader};
use bytes::Bytes;
use http::HeaderMap;
use http::header::{ETAG, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use penmark_conf::BlogSettings;
use penmark_exception::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// HTTP cache switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
	/// Compute validators and honor conditional requests
	pub http_cache: bool,
	/// Also emit an ETag derived from the body
	pub etag: bool,
}

impl Default for RenderOptions {
	fn default() -> Self {
		Self {
			http_cache: true,
			etag: true,
		}
	}
}

impl RenderOptions {
	pub fn from_settings(settings: &BlogSettings) -> Self {
		Self {
			http_cache: settings.http_cache,
			etag: settings.http_etag,
		}
	}
}

/// Cache validators of a rendered document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
	pub last_modified: Option<SystemTime>,
	pub etag: Option<String>,
}

impl Validators {
	/// Whether the client's copy is still current
	///
	/// `If-None-Match` takes precedence; when present, `If-Modified-Since` is
	/// not consulted.
	pub fn is_fresh(&self, request: &HeaderMap) -> bool {
		if let Some(value) = request.get(IF_NONE_MATCH) {
			return match (value.to_str(), self.etag.as_deref()) {
				(Ok(list), Some(etag)) => etag_matches(etag, list),
				_ => false,
			};
		}

		if let Some(value) = request.get(IF_MODIFIED_SINCE)
			&& let (Ok(text), Some(last_modified)) = (value.to_str(), self.last_modified)
			&& let Ok(since) = httpdate::parse_http_date(text)
		{
			return whole_seconds(last_modified) <= whole_seconds(since);
		}
		false
	}

	/// Write `Last-Modified` and `ETag`
	pub fn apply(&self, headers: &mut HeaderMap) {
		if let Some(last_modified) = self.last_modified
			&& let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(last_modified))
		{
			headers.insert(LAST_MODIFIED, value);
		}
		if let Some(etag) = &self.etag
			&& let Ok(value) = HeaderValue::from_str(etag)
		{
			headers.insert(ETAG, value);
		}
	}
}

/// Output of one render
#[derive(Debug, Clone)]
pub struct Document {
	/// Rendered bytes; empty when `not_modified`
	pub body: Bytes,
	pub content_type: String,
	pub validators: Validators,
	/// The request's conditional headers matched the validators
	pub not_modified: bool,
}

/// Renders templates from the search path through the compiled unit cache
#[derive(Debug)]
pub struct DocumentRenderer {
	loader: TemplateLoader,
	compiler: Arc<TagCompiler>,
	cache: UnitCache,
	options: RenderOptions,
}

impl DocumentRenderer {
	pub fn new(loader: TemplateLoader, compiler: Arc<TagCompiler>, cache: UnitCache) -> Self {
		Self {
			loader,
			compiler,
			cache,
			options: RenderOptions::default(),
		}
	}

	pub fn with_options(mut self, options: RenderOptions) -> Self {
		self.options = options;
		self
	}

	pub fn loader(&self) -> &TemplateLoader {
		&self.loader
	}

	pub fn compiler(&self) -> &TagCompiler {
		&self.compiler
	}

	pub fn cache(&self) -> &UnitCache {
		&self.cache
	}

	pub fn options(&self) -> RenderOptions {
		self.options
	}

	/// Resolve `name` and return its compiled unit
	///
	/// # Errors
	///
	/// - [`Error::TemplateNotFound`](penmark_exception::Error::TemplateNotFound) on a search path miss
	/// - [`Error::Compile`](penmark_exception::Error::Compile) for malformed markup
	pub fn compiled(&self, name: &str) -> Result<(ResolvedTemplate, Arc<Code>)> {
		let template = self.loader.resolve(name)?;
		let code = self
			.cache
			.get_or_compile(&template.path, template.modified, || {
				let source = self.loader.read(&template)?;
				let label = template.path.to_string_lossy();
				self.compiler.compile(&label, &source).inspect_err(|err| {
					tracing::error!(template = %label, error = %err, "template failed to compile");
				})
			})?;
		Ok((template, code))
	}

	/// Render `name` against `ctx`
	///
	/// `request` carries the conditional headers of the incoming request. When
	/// they match the computed validators the document comes back with
	/// `not_modified` set and an empty body.
	pub fn render(
		&self,
		name: &str,
		ctx: &mut Context,
		env: &RenderEnv<'_>,
		request: &HeaderMap,
	) -> Result<Document> {
		let (template, code) = self.compiled(name)?;
		let body = execute(&code, ctx, env)?;

		let content_type = ctx
			.content_type()
			.map(str::to_string)
			.unwrap_or_else(|| content_type_for(name).to_string());

		let mut validators = Validators::default();
		if self.options.http_cache {
			let mut last_modified = template.modified;
			for dependency in ctx.dependencies() {
				if let Some(modified) = mtime(dependency) {
					last_modified = last_modified.max(modified);
				}
			}
			if let Some(modified) = env.provider.last_modified() {
				last_modified = last_modified.max(modified);
			}
			validators.last_modified = Some(last_modified);
			if self.options.etag {
				validators.etag = Some(etag_for(body.as_bytes()));
			}
		}

		let not_modified = self.options.http_cache && validators.is_fresh(request);
		if not_modified {
			tracing::debug!(template = %name, "document not modified");
		}

		Ok(Document {
			body: if not_modified {
				Bytes::new()
			} else {
				Bytes::from(body)
			},
			content_type,
			validators,
			not_modified,
		})
	}
}

/// Content type implied by a template name's extension
pub fn content_type_for(name: &str) -> &'static str {
	let extension = Path::new(name)
		.extension()
		.and_then(|e| e.to_str())
		.map(str::to_ascii_lowercase);
	match extension.as_deref() {
		Some("xml" | "atom") => "application/atom+xml; charset=utf-8",
		Some("rss") => "application/rss+xml; charset=utf-8",
		Some("txt") => "text/plain; charset=utf-8",
		Some("json") => "application/json",
		_ => "text/html; charset=utf-8",
	}
}

/// Quoted ETag for a body
pub fn etag_for(body: &[u8]) -> String {
	let digest = Sha256::digest(body);
	format!("\"{}\"", hex::encode(&digest[..16]))
}

fn etag_matches(etag: &str, if_none_match: &str) -> bool {
	let ours = opaque(etag);
	if_none_match
		.split(',')
		.map(str::trim)
		.any(|candidate| candidate == "*" || opaque(candidate) == ours)
}

fn opaque(tag: &str) -> &str {
	tag.trim_start_matches("W/").trim_matches('"')
}

fn whole_seconds(time: SystemTime) -> u64 {
	time.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn mtime(path: &Path) -> Option<SystemTime> {
	fs::metadata(path).and_then(|m| m.modified()).ok()
}
