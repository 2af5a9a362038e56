//! Route table
//!
//! Entries are tried in registration order and the first match wins. Nothing
//! reorders them: register specific patterns before broad ones. Registering
//! the same kind and pattern twice keeps both entries.

use crate::dispatch::RouteContext;
use crate::pattern::{RouteMatch, RoutePattern};
use crate::response::Response;
use penmark_conf::UrlScan;
use penmark_exception::{Error, Result};
use penmark_template::exec::UrlFor;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::fmt;
use std::sync::Arc;

/// Characters escaped in reverse-routed arguments; `/` separates segments and stays
const ARG_ENCODE_SET: &AsciiSet = &CONTROLS
	.add(b' ')
	.add(b'"')
	.add(b'#')
	.add(b'<')
	.add(b'>')
	.add(b'?')
	.add(b'`')
	.add(b'{')
	.add(b'}')
	.add(b'&')
	.add(b'%');

/// A request handler
pub trait RouteHandler: Send + Sync {
	fn handle(&self, ctx: &mut RouteContext<'_>, matched: &RouteMatch) -> Result<Response>;
}

impl<F> RouteHandler for F
where
	F: Fn(&mut RouteContext<'_>, &RouteMatch) -> Result<Response> + Send + Sync,
{
	fn handle(&self, ctx: &mut RouteContext<'_>, matched: &RouteMatch) -> Result<Response> {
		self(ctx, matched)
	}
}

/// Consulted in order when a request ends in not-found
///
/// Returning `Ok(Some(_))` answers the request; `Ok(None)` passes to the next
/// handler and finally to the `404.html` page.
pub trait ErrorHandler: Send + Sync {
	fn handle(&self, ctx: &mut RouteContext<'_>, error: &Error) -> Result<Option<Response>>;
}

impl<F> ErrorHandler for F
where
	F: Fn(&mut RouteContext<'_>, &Error) -> Result<Option<Response>> + Send + Sync,
{
	fn handle(&self, ctx: &mut RouteContext<'_>, error: &Error) -> Result<Option<Response>> {
		self(ctx, error)
	}
}

/// One registered route
#[derive(Clone)]
pub struct RouteEntry {
	pub kind: String,
	pub pattern: RoutePattern,
	/// Public URL prefix used by reverse routing
	pub representation: String,
	handler: Arc<dyn RouteHandler>,
}

impl RouteEntry {
	pub fn handler(&self) -> &Arc<dyn RouteHandler> {
		&self.handler
	}
}

impl fmt::Debug for RouteEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteEntry")
			.field("kind", &self.kind)
			.field("pattern", &self.pattern.as_str())
			.field("representation", &self.representation)
			.finish()
	}
}

/// Ordered route table plus the default and error handlers
#[derive(Clone)]
pub struct Router {
	entries: Vec<RouteEntry>,
	default: Option<Arc<dyn RouteHandler>>,
	error_handlers: Vec<Arc<dyn ErrorHandler>>,
	base_url: String,
	url_scan: UrlScan,
}

impl Router {
	/// An empty router producing URLs under `base_url`
	///
	/// A `/` is appended to the base unless it already ends with one, or, in
	/// query-string mode, ends with `?` or a script name such as `index.php`.
	pub fn new(base_url: impl Into<String>, url_scan: UrlScan) -> Self {
		let mut base_url = base_url.into();
		let keep = base_url.ends_with('/')
			|| (url_scan == UrlScan::QueryString
				&& (base_url.ends_with('?') || base_url.ends_with("index.php")));
		if !keep {
			base_url.push('/');
		}
		Self {
			entries: Vec::new(),
			default: None,
			error_handlers: Vec::new(),
			base_url,
			url_scan,
		}
	}

	/// Append a route
	///
	/// # Errors
	///
	/// [`Error::InvalidRoute`] when a `^` pattern is not a valid regex.
	///
	/// # Examples
	///
	/// ```
	/// use penmark_conf::UrlScan;
	/// use penmark_exception::Result;
	/// use penmark_urls::{Response, RouteContext, RouteMatch, Router};
	///
	/// fn post(_: &mut RouteContext<'_>, _: &RouteMatch) -> Result<Response> {
	///     Ok(Response::ok())
	/// }
	///
	/// let mut router = Router::new("http://blog.test/", UrlScan::PathInfo);
	/// router.register("post", "^post/(.+)$", "post", post).unwrap();
	/// assert_eq!(router.routes().len(), 1);
	/// ```
	pub fn register<H>(
		&mut self,
		kind: &str,
		pattern: &str,
		representation: &str,
		handler: H,
	) -> Result<()>
	where
		H: RouteHandler + 'static,
	{
		let pattern = RoutePattern::parse(pattern)?;
		tracing::debug!(route = %kind, pattern = %pattern.as_str(), "registered route");
		self.entries.push(RouteEntry {
			kind: kind.to_string(),
			pattern,
			representation: representation.trim_matches('/').to_string(),
			handler: Arc::new(handler),
		});
		Ok(())
	}

	/// Set the handler used when no entry matches; replaces any previous one
	pub fn register_default<H>(&mut self, handler: H)
	where
		H: RouteHandler + 'static,
	{
		self.default = Some(Arc::new(handler));
	}

	pub fn register_error<H>(&mut self, handler: H)
	where
		H: ErrorHandler + 'static,
	{
		self.error_handlers.push(Arc::new(handler));
	}

	/// Remove every entry of `kind`, returning how many were removed
	pub fn unregister(&mut self, kind: &str) -> usize {
		let before = self.entries.len();
		self.entries.retain(|entry| entry.kind != kind);
		before - self.entries.len()
	}

	pub fn routes(&self) -> &[RouteEntry] {
		&self.entries
	}

	pub fn default_handler(&self) -> Option<&Arc<dyn RouteHandler>> {
		self.default.as_ref()
	}

	pub fn error_handlers(&self) -> &[Arc<dyn ErrorHandler>] {
		&self.error_handlers
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	pub fn url_scan(&self) -> UrlScan {
		self.url_scan
	}

	/// Base that `page/N` suffixes of the home listing are appended to
	///
	/// In query-string mode this is the base followed by `?`, so page 2 of
	/// the home listing is `base?page/2`.
	pub fn page_base(&self) -> String {
		match self.url_scan {
			UrlScan::PathInfo => self.base_url.clone(),
			UrlScan::QueryString => self.query_prefix(),
		}
	}

	fn query_prefix(&self) -> String {
		if self.base_url.ends_with('?') {
			self.base_url.clone()
		} else {
			format!("{}?", self.base_url)
		}
	}

	/// First entry matching `part`
	pub fn resolve(&self, part: &str) -> Option<(&RouteEntry, RouteMatch)> {
		self.entries
			.iter()
			.find_map(|entry| entry.pattern.matches(part).map(|m| (entry, m)))
	}

	/// Public URL of `kind` for `arg`
	///
	/// Unknown kinds resolve to the blog root.
	///
	/// # Examples
	///
	/// ```
	/// use penmark_conf::UrlScan;
	/// use penmark_exception::Result;
	/// use penmark_urls::{Response, RouteContext, RouteMatch, Router};
	///
	/// fn ok(_: &mut RouteContext<'_>, _: &RouteMatch) -> Result<Response> {
	///     Ok(Response::ok())
	/// }
	///
	/// let mut router = Router::new("http://blog.test", UrlScan::PathInfo);
	/// router.register("post", "^post/(.+)$", "post", ok).unwrap();
	/// assert_eq!(router.url_for("post", "hello world"), "http://blog.test/post/hello%20world");
	///
	/// let mut router = Router::new("http://blog.test/index.php", UrlScan::QueryString);
	/// router.register("post", "^post/(.+)$", "post", ok).unwrap();
	/// assert_eq!(router.url_for("post", "hello"), "http://blog.test/index.php?post/hello");
	/// ```
	pub fn url_for(&self, kind: &str, arg: &str) -> String {
		let Some(entry) = self.entries.iter().find(|e| e.kind == kind) else {
			tracing::debug!(route = %kind, "reverse routing for unknown route kind");
			return self.base_url.clone();
		};
		let arg = utf8_percent_encode(arg.trim_matches('/'), ARG_ENCODE_SET).to_string();
		let path = match (entry.representation.is_empty(), arg.is_empty()) {
			(true, true) => String::new(),
			(true, false) => arg,
			(false, true) => entry.representation.clone(),
			(false, false) => format!("{}/{arg}", entry.representation),
		};
		match self.url_scan {
			UrlScan::PathInfo => format!("{}{path}", self.base_url),
			UrlScan::QueryString if path.is_empty() => self.base_url.trim_end_matches('?').to_string(),
			UrlScan::QueryString => format!("{}{path}", self.query_prefix()),
		}
	}
}

impl UrlFor for Router {
	fn url_for(&self, kind: &str, arg: &str) -> String {
		Router::url_for(self, kind, arg)
	}
}

impl fmt::Debug for Router {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Router")
			.field("entries", &self.entries)
			.field("has_default", &self.default.is_some())
			.field("error_handlers", &self.error_handlers.len())
			.field("base_url", &self.base_url)
			.field("url_scan", &self.url_scan)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};

	fn ok(_: &mut RouteContext<'_>, _: &RouteMatch) -> Result<Response> {
		Ok(Response::ok())
	}

	#[fixture]
	fn router() -> Router {
		let mut router = Router::new("http://blog.test/", UrlScan::PathInfo);
		router.register("post", "^post/(.+)$", "post", ok).unwrap();
		router.register("feed", "feed", "feed", ok).unwrap();
		router.register("feed", "feed", "syndicate", ok).unwrap();
		router
	}

	#[rstest]
	fn test_first_registration_wins(router: Router) {
		let (entry, matched) = router.resolve("feed/atom").unwrap();
		assert_eq!(entry.representation, "feed");
		assert_eq!(matched.args, "atom");
		assert_eq!(router.routes().len(), 3);
	}

	#[rstest]
	fn test_unregister(mut router: Router) {
		assert_eq!(router.unregister("feed"), 2);
		assert!(router.resolve("feed").is_none());
		assert_eq!(router.unregister("feed"), 0);
	}

	#[rstest]
	#[case("post", "a/b", "http://blog.test/post/a/b")]
	#[case("feed", "", "http://blog.test/feed")]
	#[case("feed", "comments/atom", "http://blog.test/feed/comments/atom")]
	#[case("missing", "x", "http://blog.test/")]
	fn test_url_for_path_info(router: Router, #[case] kind: &str, #[case] arg: &str, #[case] expected: &str) {
		assert_eq!(router.url_for(kind, arg), expected);
	}

	#[rstest]
	fn test_url_for_query_string() {
		let mut router = Router::new("http://blog.test/index.php", UrlScan::QueryString);
		router.register("home", "home", "", ok).unwrap();
		router.register("category", "^category/(.+)$", "category", ok).unwrap();
		assert_eq!(router.url_for("home", ""), "http://blog.test/index.php");
		assert_eq!(
			router.url_for("category", "rust&go"),
			"http://blog.test/index.php?category/rust%26go"
		);
		assert_eq!(router.page_base(), "http://blog.test/index.php?");
	}

	#[rstest]
	#[case("http://blog.test", UrlScan::QueryString, "http://blog.test/?post/x", "http://blog.test/?")]
	#[case("http://blog.test/?", UrlScan::QueryString, "http://blog.test/?post/x", "http://blog.test/?")]
	#[case("http://blog.test/index.php", UrlScan::PathInfo, "http://blog.test/index.php/post/x", "http://blog.test/index.php/")]
	fn test_base_url_forms(
		#[case] base: &str,
		#[case] url_scan: UrlScan,
		#[case] post_url: &str,
		#[case] page_base: &str,
	) {
		let mut router = Router::new(base, url_scan);
		router.register("post", "^post/(.+)$", "post", ok).unwrap();
		assert_eq!(router.url_for("post", "x"), post_url);
		assert_eq!(router.page_base(), page_base);
	}
}
