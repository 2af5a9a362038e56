//! Route patterns and the page-number suffix

use penmark_exception::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static PAGE_SUFFIX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?:^|/)page/(\d+)$").unwrap());

/// Split a trailing `page/N` off `part`
///
/// Returns the remaining part and the page number, 0 when there is no
/// suffix. `N` must be a positive integer; `page/0` and non-numeric
/// suffixes are ordinary path content.
///
/// # Examples
///
/// ```
/// use penmark_urls::pattern::split_page_suffix;
///
/// assert_eq!(split_page_suffix("post/hello/page/2"), ("post/hello", 2));
/// assert_eq!(split_page_suffix("page/3"), ("", 3));
/// assert_eq!(split_page_suffix("page/0"), ("page/0", 0));
/// assert_eq!(split_page_suffix("mypage/2"), ("mypage/2", 0));
/// ```
pub fn split_page_suffix(part: &str) -> (&str, u32) {
	let Some(caps) = PAGE_SUFFIX.captures(part) else {
		return (part, 0);
	};
	let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
		return (part, 0);
	};
	match digits.as_str().parse::<u32>() {
		Ok(page) if page > 0 => (&part[..whole.start()], page),
		_ => (part, 0),
	}
}

/// What a pattern captured
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
	/// First capture group, or the remainder after a literal prefix
	pub args: String,
	/// Every capture group of a regex pattern, in order; unmatched groups are empty
	pub groups: Vec<String>,
}

impl RouteMatch {
	pub fn new(args: impl Into<String>) -> Self {
		Self {
			args: args.into(),
			groups: Vec::new(),
		}
	}

	/// Capture group `index` (1-based, like regex groups)
	pub fn group(&self, index: usize) -> Option<&str> {
		index
			.checked_sub(1)
			.and_then(|i| self.groups.get(i))
			.map(String::as_str)
	}
}

/// Pattern of a route entry
///
/// A leading `^` makes the pattern a regular expression. Anything else is a
/// literal that matches the part exactly or as a `literal/` prefix.
#[derive(Debug, Clone)]
pub enum RoutePattern {
	Literal(String),
	Regex(Regex),
}

impl RoutePattern {
	/// # Examples
	///
	/// ```
	/// use penmark_urls::pattern::RoutePattern;
	///
	/// let feed = RoutePattern::parse("feed").unwrap();
	/// assert_eq!(feed.matches("feed/comments/atom").unwrap().args, "comments/atom");
	/// assert!(feed.matches("feeds").is_none());
	///
	/// let post = RoutePattern::parse("^post/(.+)$").unwrap();
	/// assert_eq!(post.matches("post/hello").unwrap().args, "hello");
	/// ```
	pub fn parse(pattern: &str) -> Result<Self> {
		if pattern.starts_with('^') {
			let regex = Regex::new(pattern).map_err(|e| Error::InvalidRoute {
				pattern: pattern.to_string(),
				message: e.to_string(),
			})?;
			Ok(RoutePattern::Regex(regex))
		} else {
			Ok(RoutePattern::Literal(pattern.trim_matches('/').to_string()))
		}
	}

	pub fn matches(&self, part: &str) -> Option<RouteMatch> {
		match self {
			RoutePattern::Literal(literal) => {
				if part == literal {
					return Some(RouteMatch::default());
				}
				part.strip_prefix(literal.as_str())
					.and_then(|rest| rest.strip_prefix('/'))
					.map(RouteMatch::new)
			}
			RoutePattern::Regex(regex) => {
				let caps = regex.captures(part)?;
				let groups: Vec<String> = caps
					.iter()
					.skip(1)
					.map(|g| g.map_or_else(String::new, |m| m.as_str().to_string()))
					.collect();
				Some(RouteMatch {
					args: groups.first().cloned().unwrap_or_default(),
					groups,
				})
			}
		}
	}

	pub fn as_str(&self) -> &str {
		match self {
			RoutePattern::Literal(literal) => literal,
			RoutePattern::Regex(regex) => regex.as_str(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("post/a/page/2", "post/a", 2)]
	#[case("category/rust/page/10", "category/rust", 10)]
	#[case("page/1", "", 1)]
	#[case("page/0", "page/0", 0)]
	#[case("post/a/page/x", "post/a/page/x", 0)]
	#[case("post/a/page/99999999999", "post/a/page/99999999999", 0)]
	#[case("", "", 0)]
	fn test_split_page_suffix(#[case] part: &str, #[case] rest: &str, #[case] page: u32) {
		assert_eq!(split_page_suffix(part), (rest, page));
	}

	#[rstest]
	fn test_regex_groups() {
		let archive = RoutePattern::parse(r"^archive/(\d{4})/(\d{2})$").unwrap();
		let m = archive.matches("archive/2024/03").unwrap();
		assert_eq!(m.args, "2024");
		assert_eq!(m.group(1), Some("2024"));
		assert_eq!(m.group(2), Some("03"));
		assert_eq!(m.group(0), None);
		assert!(archive.matches("archive/2024/3").is_none());
	}

	#[rstest]
	fn test_literal_exact_and_prefix() {
		let feed = RoutePattern::parse("/feed/").unwrap();
		assert_eq!(feed.as_str(), "feed");
		assert_eq!(feed.matches("feed"), Some(RouteMatch::default()));
		assert_eq!(feed.matches("feed/atom").unwrap().args, "atom");
		assert!(feed.matches("feedx/atom").is_none());
	}

	#[rstest]
	fn test_invalid_regex() {
		assert!(matches!(
			RoutePattern::parse("^post/(.+$"),
			Err(Error::InvalidRoute { .. })
		));
	}
}
