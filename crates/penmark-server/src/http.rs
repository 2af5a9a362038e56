//! HTTP/1.1 server on hyper

use bytes::Bytes;
use http::header::{ALLOW, HeaderValue};
use http::{Method, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::Service;
use hyper_util::rt::TokioIo;
use penmark_urls::{Dispatcher, Request, Response};
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use tokio::net::{TcpListener, TcpStream};

/// HTTP/1.1 front for a [`Dispatcher`]
///
/// Each connection runs on its own task. Rendering is synchronous, so every
/// request is dispatched on the blocking pool.
#[derive(Debug, Clone)]
pub struct HttpServer {
	dispatcher: Dispatcher,
}

impl HttpServer {
	pub fn new(dispatcher: Dispatcher) -> Self {
		Self { dispatcher }
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	/// Bind `addr` and serve until an I/O error occurs
	///
	/// # Examples
	///
	/// ```no_run
	/// use penmark_server::{HttpServer, JsonDataProvider, build_dispatcher};
	/// use penmark_conf::Settings;
	/// use std::sync::Arc;
	///
	/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
	/// let settings = Settings::load(None)?;
	/// let provider = Arc::new(JsonDataProvider::load("blog.json")?);
	/// let server = HttpServer::new(build_dispatcher(settings, provider)?);
	/// server.listen("127.0.0.1:8080".parse()?).await?;
	/// # Ok(())
	/// # }
	/// ```
	pub async fn listen(self, addr: SocketAddr) -> std::io::Result<()> {
		let listener = TcpListener::bind(addr).await?;
		self.serve(listener, std::future::pending()).await
	}

	/// Accept connections on `listener` until `shutdown` completes
	///
	/// Connections already accepted keep running after shutdown.
	pub async fn serve(
		self,
		listener: TcpListener,
		shutdown: impl Future<Output = ()>,
	) -> std::io::Result<()> {
		tracing::info!(addr = %listener.local_addr()?, "listening");
		tokio::pin!(shutdown);
		loop {
			tokio::select! {
				result = listener.accept() => {
					let (stream, remote_addr) = result?;
					let dispatcher = self.dispatcher.clone();
					tokio::task::spawn(async move {
						if let Err(err) = Self::handle_connection(stream, remote_addr, dispatcher).await {
							tracing::debug!(remote = %remote_addr, error = %err, "connection closed with error");
						}
					});
				}
				_ = &mut shutdown => {
					tracing::info!("shutdown signal received, no longer accepting connections");
					return Ok(());
				}
			}
		}
	}

	async fn handle_connection(
		stream: TcpStream,
		remote_addr: SocketAddr,
		dispatcher: Dispatcher,
	) -> hyper::Result<()> {
		let io = TokioIo::new(stream);
		let service = RequestService {
			dispatcher,
			remote_addr,
		};
		http1::Builder::new().serve_connection(io, service).await
	}
}

struct RequestService {
	dispatcher: Dispatcher,
	remote_addr: SocketAddr,
}

impl Service<hyper::Request<Incoming>> for RequestService {
	type Response = hyper::Response<Full<Bytes>>;
	type Error = http::Error;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

	fn call(&self, req: hyper::Request<Incoming>) -> Self::Future {
		let dispatcher = self.dispatcher.clone();
		let remote_addr = self.remote_addr;

		Box::pin(async move {
			let (parts, _body) = req.into_parts();
			let head = parts.method == Method::HEAD;
			let request = Request::new(parts.method, parts.uri, parts.headers);
			let method = request.method.clone();
			let path = request.path().to_string();

			let response = if matches!(method, Method::GET | Method::HEAD) {
				tokio::task::spawn_blocking(move || dispatcher.dispatch(&request))
					.await
					.unwrap_or_else(|err| {
						tracing::error!(error = %err, "dispatch task failed");
						Response::internal_server_error()
					})
			} else {
				let mut response = Response::new(StatusCode::METHOD_NOT_ALLOWED);
				response
					.headers
					.insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
				response
			};
			tracing::info!(
				remote = %remote_addr,
				method = %method,
				path = %path,
				status = response.status.as_u16(),
				"request"
			);
			into_hyper(response, head)
		})
	}
}

fn into_hyper(response: Response, head: bool) -> Result<hyper::Response<Full<Bytes>>, http::Error> {
	let mut builder = hyper::Response::builder().status(response.status);
	if let Some(headers) = builder.headers_mut() {
		headers.extend(response.headers);
	}
	let body = if head { Bytes::new() } else { response.body };
	builder.body(Full::new(body))
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %err, "failed to install Ctrl-C handler");
		std::future::pending::<()>().await;
	}
}
