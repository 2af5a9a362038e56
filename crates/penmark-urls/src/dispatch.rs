//! Request dispatch
//!
//! One request goes through these states:
//!
//! ```text
//! path / query ──► strip `page/N` ──► first matching route ──► handler
//!                                        │ none
//!                                        ▼
//!                                  default handler
//! ```
//!
//! A not-found outcome renders the theme's `404.html` with status 404. Any
//! other error becomes a generic 500 page; the detail is shown only in debug
//! mode.

use crate::pattern::{RouteMatch, split_page_suffix};
use crate::request::{Request, decode_path};
use crate::response::Response;
use crate::router::Router;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, StatusCode};
use penmark_conf::{BlogSettings, Settings, UrlScan};
use penmark_exception::{Error, Result};
use penmark_template::context::{Context, Value};
use penmark_template::document::DocumentRenderer;
use penmark_template::exec::RenderEnv;
use penmark_template::filters::encode_html;
use penmark_template::provider::DataProvider;
use std::fmt;
use std::sync::Arc;

const NOT_FOUND_TEMPLATE: &str = "404.html";

/// Hooks around dispatch
///
/// All methods default to doing nothing.
pub trait DispatchBehavior: Send + Sync {
	/// Adjust the route table once, before the first request
	fn init_routes(&self, _router: &mut Router) -> Result<()> {
		Ok(())
	}

	/// Called before a handler renders a document
	fn before_document(&self, _ctx: &RouteContext<'_>) {}

	/// Called with the response of every rendered document
	fn after_document(&self, _ctx: &RouteContext<'_>, _response: &mut Response) {}
}

/// Collaborators shared by every request
pub struct Services {
	pub renderer: DocumentRenderer,
	pub provider: Arc<dyn DataProvider>,
	pub settings: Settings,
	pub blog: BlogSettings,
	pub router: Router,
	pub behaviors: Vec<Arc<dyn DispatchBehavior>>,
}

impl Services {
	/// Services with a router built from `blog`'s URL and addressing mode
	pub fn new(
		renderer: DocumentRenderer,
		provider: Arc<dyn DataProvider>,
		settings: Settings,
		blog: BlogSettings,
	) -> Self {
		let router = Router::new(blog.blog_url.clone(), blog.url_scan);
		Self {
			renderer,
			provider,
			settings,
			blog,
			router,
			behaviors: Vec::new(),
		}
	}

	pub fn with_behavior(mut self, behavior: Arc<dyn DispatchBehavior>) -> Self {
		self.behaviors.push(behavior);
		self
	}
}

impl fmt::Debug for Services {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Services")
			.field("renderer", &self.renderer)
			.field("blog", &self.blog)
			.field("router", &self.router)
			.field("behaviors", &self.behaviors.len())
			.finish()
	}
}

/// Per-request state handed to route handlers
pub struct RouteContext<'a> {
	pub services: &'a Services,
	pub request: &'a Request,
	/// Page number from the `page/N` suffix; 0 when absent
	pub page: u32,
	/// Decoded query parameters (after the route part in query-string mode)
	pub params: Vec<(String, String)>,
	/// Template variables
	pub context: Context,
	/// Overrides the template's extension-derived content type
	pub content_type: Option<String>,
	pub status: StatusCode,
}

impl<'a> RouteContext<'a> {
	pub fn new(services: &'a Services, request: &'a Request, page: u32) -> Self {
		Self {
			services,
			request,
			page,
			params: Vec::new(),
			context: Context::new(),
			content_type: None,
			status: StatusCode::OK,
		}
	}

	pub fn param(&self, name: &str) -> Option<&str> {
		self.params
			.iter()
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.as_str())
	}

	pub fn blog(&self) -> &BlogSettings {
		&self.services.blog
	}

	pub fn provider(&self) -> &dyn DataProvider {
		self.services.provider.as_ref()
	}

	pub fn router(&self) -> &Router {
		&self.services.router
	}

	/// Push a template variable
	pub fn push(&mut self, name: &str, value: impl Into<Value>) {
		self.context.push(name, value.into());
	}

	/// Render `template` into a response
	///
	/// Conditional request headers are honored only for 2xx responses; a
	/// match yields `304 Not Modified` without a body.
	pub fn render(&mut self, template: &str) -> Result<Response> {
		let services = self.services;
		self.context.set_page(self.page);
		if self.context.page_base().is_empty() {
			self.context.set_page_base(services.router.page_base());
		}
		if let Some(content_type) = &self.content_type {
			self.context.set_content_type(content_type.clone());
		}

		for behavior in &services.behaviors {
			behavior.before_document(self);
		}

		let env = RenderEnv {
			provider: services.provider.as_ref(),
			settings: &services.settings,
			urls: &services.router,
			behaviors: services.renderer.compiler().behaviors(),
		};
		let unconditional = HeaderMap::new();
		let conditional = if self.status.is_success() {
			&self.request.headers
		} else {
			&unconditional
		};
		let document = services
			.renderer
			.render(template, &mut self.context, &env, conditional)?;

		let mut response = if document.not_modified {
			Response::not_modified()
		} else {
			Response::new(self.status).with_body(document.body)
		};
		if let Ok(value) = HeaderValue::from_str(&document.content_type) {
			response.headers.insert(CONTENT_TYPE, value);
		}
		document.validators.apply(&mut response.headers);

		for behavior in &services.behaviors {
			behavior.after_document(self, &mut response);
		}
		tracing::debug!(template = %template, status = %response.status, "rendered document");
		Ok(response)
	}
}

/// Entry point for requests
///
/// Cheap to clone; clones share the services.
#[derive(Debug, Clone)]
pub struct Dispatcher {
	services: Arc<Services>,
}

impl Dispatcher {
	/// Run every behavior's `init_routes`, then freeze the services
	pub fn new(mut services: Services) -> Result<Self> {
		let behaviors = services.behaviors.clone();
		for behavior in &behaviors {
			behavior.init_routes(&mut services.router)?;
		}
		Ok(Self {
			services: Arc::new(services),
		})
	}

	pub fn services(&self) -> &Services {
		&self.services
	}

	/// Route part and query parameters according to the addressing mode
	///
	/// Path-info mode routes on the decoded path without its leading `/`.
	/// Query-string mode routes on the query up to the first `&`; the rest
	/// are parameters.
	pub fn route_part(&self, request: &Request) -> (String, Vec<(String, String)>) {
		match self.services.router.url_scan() {
			UrlScan::PathInfo => {
				let part = decode_path(request.path().trim_start_matches('/'));
				let params = request.query().map(Request::parse_query).unwrap_or_default();
				(part, params)
			}
			UrlScan::QueryString => {
				let query = request.query().unwrap_or("");
				let (head, tail) = query.split_once('&').unwrap_or((query, ""));
				if head.contains('=') {
					(String::new(), Request::parse_query(query))
				} else {
					(decode_path(head.trim_matches('/')), Request::parse_query(tail))
				}
			}
		}
	}

	/// Answer one request; never fails
	pub fn dispatch(&self, request: &Request) -> Response {
		let (part, params) = self.route_part(request);
		let (rest, page) = split_page_suffix(&part);

		let mut ctx = RouteContext::new(&self.services, request, page);
		ctx.params = params;

		let outcome = match self.services.router.resolve(rest) {
			Some((entry, matched)) => {
				tracing::debug!(route = %entry.kind, part = %rest, page, "matched route");
				entry.handler().handle(&mut ctx, &matched)
			}
			None => match self.services.router.default_handler() {
				Some(handler) => {
					tracing::debug!(part = %rest, page, "no route matched, using default handler");
					handler.handle(&mut ctx, &RouteMatch::new(rest))
				}
				None => Err(Error::NotFound(rest.to_string())),
			},
		};

		match outcome {
			Ok(response) => response,
			Err(err) if err.is_not_found() => self.not_found(request, &err),
			Err(err) => self.server_error(&err),
		}
	}

	fn not_found(&self, request: &Request, err: &Error) -> Response {
		tracing::info!(path = %request.path(), error = %err, "not found");

		let mut ctx = RouteContext::new(&self.services, request, 0);
		ctx.status = StatusCode::NOT_FOUND;
		for handler in self.services.router.error_handlers() {
			match handler.handle(&mut ctx, err) {
				Ok(Some(response)) => return response,
				Ok(None) => {}
				Err(handler_err) => {
					tracing::warn!(error = %handler_err, "error handler failed");
				}
			}
		}

		ctx.push("page_title", "Not Found");
		match ctx.render(NOT_FOUND_TEMPLATE) {
			Ok(response) => response,
			Err(Error::TemplateNotFound(_)) => self.builtin_page(
				StatusCode::NOT_FOUND,
				"Not Found",
				&err.public_message(self.services.blog.debug),
			),
			Err(render_err) => self.server_error(&render_err),
		}
	}

	fn server_error(&self, err: &Error) -> Response {
		tracing::error!(error = %err, "request failed");
		self.builtin_page(
			StatusCode::INTERNAL_SERVER_ERROR,
			"Server Error",
			&err.public_message(self.services.blog.debug),
		)
	}

	fn builtin_page(&self, status: StatusCode, title: &str, message: &str) -> Response {
		let body = format!(
			"<!DOCTYPE html>\n<html><head><title>{title}</title></head>\
			 <body><h1>{title}</h1><p>{}</p></body></html>\n",
			encode_html(message)
		);
		Response::new(status)
			.with_body(body)
			.with_content_type("text/html; charset=utf-8")
	}
}
