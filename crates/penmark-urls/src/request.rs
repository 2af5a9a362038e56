//! Inbound request wrapper and query parsing

use http::{HeaderMap, Method, Uri};
use percent_encoding::percent_decode_str;

/// Inbound request as seen by the dispatcher
#[derive(Debug, Clone)]
pub struct Request {
	pub method: Method,
	pub uri: Uri,
	pub headers: HeaderMap,
}

impl Request {
	pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
		Self {
			method,
			uri,
			headers,
		}
	}

	/// A `GET` request without headers
	///
	/// # Examples
	///
	/// ```
	/// use penmark_urls::Request;
	///
	/// let request = Request::get("/post/hello?x=1".parse().unwrap());
	/// assert_eq!(request.path(), "/post/hello");
	/// assert_eq!(request.query(), Some("x=1"));
	/// ```
	pub fn get(uri: Uri) -> Self {
		Self::new(Method::GET, uri, HeaderMap::new())
	}

	pub fn with_header(mut self, name: http::header::HeaderName, value: http::HeaderValue) -> Self {
		self.headers.insert(name, value);
		self
	}

	pub fn path(&self) -> &str {
		self.uri.path()
	}

	pub fn query(&self) -> Option<&str> {
		self.uri.query()
	}

	/// Decoded `key=value` pairs of `query`, in order
	///
	/// `+` is read as a space. Keys without `=` get an empty value.
	pub fn parse_query(query: &str) -> Vec<(String, String)> {
		query
			.split('&')
			.filter(|pair| !pair.is_empty())
			.map(|pair| {
				let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
				(decode(key), decode(value))
			})
			.collect()
	}
}

/// Percent-decode a query component, reading `+` as a space
pub fn decode(component: &str) -> String {
	decode_path(&component.replace('+', " "))
}

/// Percent-decode a path; `+` stays literal
pub fn decode_path(path: &str) -> String {
	percent_decode_str(path).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_parse_query() {
		assert_eq!(
			Request::parse_query("a=1&b=hello+world&flag&&c=%C3%A9"),
			vec![
				("a".to_string(), "1".to_string()),
				("b".to_string(), "hello world".to_string()),
				("flag".to_string(), String::new()),
				("c".to_string(), "é".to_string()),
			]
		);
	}

	#[rstest]
	#[case("caf%C3%A9", "café")]
	#[case("a%2Fb", "a/b")]
	#[case("%ZZ", "%ZZ")]
	fn test_decode(#[case] raw: &str, #[case] expected: &str) {
		assert_eq!(decode(raw), expected);
	}

	#[rstest]
	fn test_decode_path_keeps_plus() {
		assert_eq!(decode_path("c%2B%2B+tips"), "c+++tips");
	}
}
