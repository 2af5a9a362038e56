//! # Penmark Exception
//!
//! Error types shared by every penmark crate.
//!
//! The rendering pipeline distinguishes three runtime outcomes besides success:
//!
//! - **Not found**: no route accepted the request, a referenced record does not
//!   exist, or the requested template is missing from the search path. These are
//!   recovered at the dispatcher boundary and turned into a themed 404 page.
//! - **Compile errors**: malformed template markup. Fatal for the request, and
//!   reported with the template path and an approximate position.
//! - **Render faults**: a collaborator (data provider, settings store) failed
//!   while compiled code was running. Fatal for the request.
//!
//! ## Example
//!
//! ```
//! use penmark_exception::Error;
//!
//! let err = Error::NotFound("post/missing".to_string());
//! assert!(err.is_not_found());
//! assert_eq!(err.status_code(), 404);
//! ```

use thiserror::Error;

/// Result alias used across penmark crates
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the penmark pipeline
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// A route, record or page does not exist
	#[error("Not found: {0}")]
	NotFound(String),

	/// No directory of the template search path contains the template
	#[error("Template not found: {0}")]
	TemplateNotFound(String),

	/// Malformed template markup
	#[error("Template compile error in {path} at line {line} (offset {offset}): {message}")]
	Compile {
		/// Template path (or a caller supplied label for in-memory sources)
		path: String,
		/// Byte offset of the offending construct
		offset: usize,
		/// 1-based line of the offending construct
		line: usize,
		/// What went wrong
		message: String,
	},

	/// A collaborator failed while a compiled unit was executing
	#[error("Render fault: {0}")]
	RenderFault(String),

	/// A tag name is already registered with the other tag kind
	#[error("Tag '{name}' is already registered as a {existing} tag")]
	TagConflict {
		/// Tag name
		name: String,
		/// Kind the name is already bound to ("block" or "value")
		existing: &'static str,
	},

	/// A route pattern could not be compiled
	#[error("Invalid route pattern '{pattern}': {message}")]
	InvalidRoute {
		/// Pattern as given at registration
		pattern: String,
		/// Underlying reason
		message: String,
	},

	/// Settings could not be loaded or are inconsistent
	#[error("Configuration error: {0}")]
	Config(String),

	/// I/O failure (template files, cache directory)
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	/// Compiled unit (de)serialization failure
	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl Error {
	/// Build a compile error, deriving the line number from `source` and `offset`
	///
	/// # Examples
	///
	/// ```
	/// use penmark_exception::Error;
	///
	/// let err = Error::compile("home.html", "a\nb\n<tag:X", 4, "unterminated tag");
	/// match err {
	///     Error::Compile { line, offset, .. } => {
	///         assert_eq!(line, 3);
	///         assert_eq!(offset, 4);
	///     }
	///     _ => unreachable!(),
	/// }
	/// ```
	pub fn compile(
		path: impl Into<String>,
		source: &str,
		offset: usize,
		message: impl Into<String>,
	) -> Self {
		let clamped = offset.min(source.len());
		let line = source
			.as_bytes()
			.iter()
			.take(clamped)
			.filter(|b| **b == b'\n')
			.count() + 1;
		Error::Compile {
			path: path.into(),
			offset,
			line,
			message: message.into(),
		}
	}

	/// Whether this error should surface as a 404
	pub fn is_not_found(&self) -> bool {
		matches!(self, Error::NotFound(_) | Error::TemplateNotFound(_))
	}

	/// HTTP status code for this error
	pub fn status_code(&self) -> u16 {
		if self.is_not_found() { 404 } else { 500 }
	}

	/// Message suitable for an error page
	///
	/// In production mode (`debug == false`) the text is generic so that template
	/// paths and collaborator details never reach the client.
	///
	/// # Examples
	///
	/// ```
	/// use penmark_exception::Error;
	///
	/// let err = Error::RenderFault("db at /var/lib/blog.db unreachable".into());
	/// assert!(!err.public_message(false).contains("/var/lib"));
	/// assert!(err.public_message(true).contains("/var/lib"));
	/// ```
	pub fn public_message(&self, debug: bool) -> String {
		if debug {
			return self.to_string();
		}
		if self.is_not_found() {
			"The requested page could not be found.".to_string()
		} else {
			"An error occurred while processing your request.".to_string()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(Error::NotFound("x".into()), 404)]
	#[case(Error::TemplateNotFound("404.html".into()), 404)]
	#[case(Error::RenderFault("boom".into()), 500)]
	#[case(Error::Config("bad".into()), 500)]
	fn test_status_code(#[case] err: Error, #[case] expected: u16) {
		assert_eq!(err.status_code(), expected);
	}

	#[rstest]
	fn test_compile_error_line_counting() {
		let source = "line one\nline two\n<tag:Broken";
		let err = Error::compile("t.html", source, 18, "unterminated tag");
		let text = err.to_string();
		assert!(text.contains("t.html"));
		assert!(text.contains("line 3"));
	}

	#[rstest]
	fn test_compile_error_offset_past_end() {
		let err = Error::compile("t.html", "abc", 99, "eof");
		assert!(matches!(err, Error::Compile { line: 1, offset: 99, .. }));
	}

	#[rstest]
	fn test_public_message_hides_detail() {
		let err = Error::compile("/srv/themes/default/home.html", "x", 0, "bad");
		assert!(!err.public_message(false).contains("/srv"));
		assert!(err.public_message(true).contains("/srv"));
	}
}
