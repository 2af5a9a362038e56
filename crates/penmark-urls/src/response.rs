//! Outbound response type

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};

/// Outbound response produced by a route handler
#[derive(Debug, Clone)]
pub struct Response {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Bytes,
}

impl Response {
	/// # Examples
	///
	/// ```
	/// use penmark_urls::Response;
	/// use http::StatusCode;
	///
	/// let response = Response::new(StatusCode::OK);
	/// assert_eq!(response.status, StatusCode::OK);
	/// assert!(response.body.is_empty());
	/// ```
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			body: Bytes::new(),
		}
	}

	pub fn ok() -> Self {
		Self::new(StatusCode::OK)
	}

	pub fn not_found() -> Self {
		Self::new(StatusCode::NOT_FOUND)
	}

	pub fn not_modified() -> Self {
		Self::new(StatusCode::NOT_MODIFIED)
	}

	pub fn internal_server_error() -> Self {
		Self::new(StatusCode::INTERNAL_SERVER_ERROR)
	}

	pub fn with_status(mut self, status: StatusCode) -> Self {
		self.status = status;
		self
	}

	pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// Set a header; values that are not valid header text are dropped
	pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
		match HeaderValue::from_str(value) {
			Ok(value) => {
				self.headers.insert(name, value);
			}
			Err(_) => {
				tracing::warn!(header = %name, "dropping invalid header value");
			}
		}
		self
	}

	pub fn with_content_type(self, content_type: &str) -> Self {
		self.with_header(CONTENT_TYPE, content_type)
	}

	pub fn content_type(&self) -> Option<&str> {
		self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
	}

	/// Body as UTF-8 text, lossy
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}
