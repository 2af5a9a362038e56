//! Filter pipeline applied to every echoed value
//!
//! Filters run in one fixed global order no matter how the attributes were
//! declared on the tag:
//!
//! 1. `strip_tags`
//! 2. `remove_html`
//! 3. `encode_html`
//! 4. `cut_string`
//! 5. `lower_case`
//! 6. `capitalize`
//! 7. `upper_case`
//! 8. `encode_url`
//!
//! Interceptors registered on [`Behaviors`] observe the raw value, each enabled
//! filter pass, and the final result.

use crate::behaviors::{Behaviors, FilterOutcome};
use crate::compiler::Attributes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static ENTITY: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^&(?:#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);").unwrap());

/// RFC 3986 unreserved characters stay as they are
const URL_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'-')
	.remove(b'_')
	.remove(b'.')
	.remove(b'~');

/// Name of a built-in filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterName {
	StripTags,
	RemoveHtml,
	EncodeHtml,
	CutString,
	LowerCase,
	Capitalize,
	UpperCase,
	EncodeUrl,
}

impl FilterName {
	/// Every filter in execution order
	pub const ORDER: [FilterName; 8] = [
		FilterName::StripTags,
		FilterName::RemoveHtml,
		FilterName::EncodeHtml,
		FilterName::CutString,
		FilterName::LowerCase,
		FilterName::Capitalize,
		FilterName::UpperCase,
		FilterName::EncodeUrl,
	];

	/// Attribute name enabling this filter
	pub fn as_str(&self) -> &'static str {
		match self {
			FilterName::StripTags => "strip_tags",
			FilterName::RemoveHtml => "remove_html",
			FilterName::EncodeHtml => "encode_html",
			FilterName::CutString => "cut_string",
			FilterName::LowerCase => "lower_case",
			FilterName::Capitalize => "capitalize",
			FilterName::UpperCase => "upper_case",
			FilterName::EncodeUrl => "encode_url",
		}
	}
}

impl fmt::Display for FilterName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

fn is_false(b: &bool) -> bool {
	!*b
}

/// Filters enabled on one echoed value
///
/// Unset filters are no-ops. Serialized with defaults skipped so that compiled
/// units stay compact and stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
	#[serde(default, skip_serializing_if = "is_false")]
	pub strip_tags: bool,
	#[serde(default, skip_serializing_if = "is_false")]
	pub remove_html: bool,
	#[serde(default, skip_serializing_if = "is_false")]
	pub encode_html: bool,
	/// Truncation limit in decoded units
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cut_string: Option<usize>,
	/// Let `cut_string` split a word longer than the limit
	#[serde(default, skip_serializing_if = "is_false")]
	pub word_break: bool,
	#[serde(default, skip_serializing_if = "is_false")]
	pub lower_case: bool,
	#[serde(default, skip_serializing_if = "is_false")]
	pub capitalize: bool,
	#[serde(default, skip_serializing_if = "is_false")]
	pub upper_case: bool,
	#[serde(default, skip_serializing_if = "is_false")]
	pub encode_url: bool,
}

/// Attribute truthiness: non-empty and not `"0"`
pub fn is_truthy(value: &str) -> bool {
	!value.is_empty() && value != "0"
}

impl FilterSpec {
	/// Read the filter attributes of a tag; other attributes are ignored
	///
	/// # Examples
	///
	/// ```
	/// use penmark_template::compiler::Attributes;
	/// use penmark_template::filters::FilterSpec;
	///
	/// let mut attrs = Attributes::new();
	/// attrs.insert("cut_string".into(), "-4".into());
	/// attrs.insert("upper_case".into(), "1".into());
	/// attrs.insert("encode_html".into(), "0".into());
	///
	/// let spec = FilterSpec::from_attributes(&attrs);
	/// assert_eq!(spec.cut_string, None);
	/// assert!(spec.upper_case);
	/// assert!(!spec.encode_html);
	/// ```
	pub fn from_attributes(attrs: &Attributes) -> Self {
		let flag = |name: &str| attrs.get(name).is_some_and(|v| is_truthy(v));
		let cut_string = attrs
			.get("cut_string")
			.and_then(|v| v.trim().parse::<i64>().ok())
			.filter(|n| *n > 0)
			.map(|n| n as usize);

		Self {
			strip_tags: flag("strip_tags"),
			remove_html: flag("remove_html"),
			encode_html: flag("encode_html"),
			cut_string,
			word_break: flag("word_break"),
			lower_case: flag("lower_case"),
			capitalize: flag("capitalize"),
			upper_case: flag("upper_case"),
			encode_url: flag("encode_url"),
		}
	}

	/// Whether a filter runs
	pub fn is_enabled(&self, name: FilterName) -> bool {
		match name {
			FilterName::StripTags => self.strip_tags,
			FilterName::RemoveHtml => self.remove_html,
			FilterName::EncodeHtml => self.encode_html,
			FilterName::CutString => self.cut_string.is_some(),
			FilterName::LowerCase => self.lower_case,
			FilterName::Capitalize => self.capitalize,
			FilterName::UpperCase => self.upper_case,
			FilterName::EncodeUrl => self.encode_url,
		}
	}

	/// No filter enabled
	pub fn is_empty(&self) -> bool {
		FilterName::ORDER.iter().all(|n| !self.is_enabled(*n))
	}

	/// Same filters without truncation
	pub fn without_cut(&self) -> Self {
		Self {
			cut_string: None,
			..self.clone()
		}
	}

	fn apply_builtin(&self, name: FilterName, value: &str) -> String {
		match name {
			FilterName::StripTags => strip_tags(value),
			FilterName::RemoveHtml => remove_html(value),
			FilterName::EncodeHtml => encode_html(value),
			FilterName::CutString => match self.cut_string {
				Some(limit) => cut_string(value, limit, self.word_break),
				None => value.to_string(),
			},
			FilterName::LowerCase => value.to_lowercase(),
			FilterName::Capitalize => capitalize(value),
			FilterName::UpperCase => value.to_uppercase(),
			FilterName::EncodeUrl => encode_url(value),
		}
	}
}

/// Run the pipeline over `raw`
///
/// # Examples
///
/// ```
/// use penmark_template::behaviors::Behaviors;
/// use penmark_template::filters::{FilterSpec, apply_filters};
///
/// let spec = FilterSpec { upper_case: true, cut_string: Some(5), ..Default::default() };
/// assert_eq!(apply_filters("hello world", &spec, "EntryTitle", &Behaviors::new()), "HELLO");
/// ```
pub fn apply_filters(raw: &str, spec: &FilterSpec, tag: &str, behaviors: &Behaviors) -> String {
	let mut value = raw.to_string();
	behaviors.before_filter(tag, &mut value);

	for name in FilterName::ORDER {
		if !spec.is_enabled(name) {
			continue;
		}
		if behaviors.content_filter(tag, name, &mut value, spec) == FilterOutcome::Stop {
			continue;
		}
		value = spec.apply_builtin(name, &value);
	}

	behaviors.after_filter(tag, &mut value);
	value
}

/// Remove `<...>` markup
pub fn strip_tags(s: &str) -> String {
	MARKUP.replace_all(s, "").into_owned()
}

/// Remove markup, decode basic entities and collapse whitespace
///
/// # Examples
///
/// ```
/// use penmark_template::filters::remove_html;
///
/// assert_eq!(remove_html("<p>Fish &amp;\n  <b>chips</b></p> "), "Fish & chips");
/// ```
pub fn remove_html(s: &str) -> String {
	let decoded = decode_entities(&strip_tags(s));
	decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape HTML special characters
pub fn encode_html(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	for c in s.chars() {
		match c {
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'&' => out.push_str("&amp;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#x27;"),
			_ => out.push(c),
		}
	}
	out
}

/// Decode the basic named entities and numeric references
pub fn decode_entities(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	let mut rest = s;
	while let Some(pos) = rest.find('&') {
		out.push_str(&rest[..pos]);
		rest = &rest[pos..];
		let Some(m) = ENTITY.find(rest) else {
			out.push('&');
			rest = &rest[1..];
			continue;
		};
		let entity = m.as_str();
		match decode_entity(entity) {
			Some(c) => out.push(c),
			None => out.push_str(entity),
		}
		rest = &rest[m.end()..];
	}
	out.push_str(rest);
	out
}

fn decode_entity(entity: &str) -> Option<char> {
	let body = &entity[1..entity.len() - 1];
	if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
		return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
	}
	if let Some(dec) = body.strip_prefix('#') {
		return dec.parse::<u32>().ok().and_then(char::from_u32);
	}
	match body {
		"amp" => Some('&'),
		"lt" => Some('<'),
		"gt" => Some('>'),
		"quot" => Some('"'),
		"apos" => Some('\''),
		"nbsp" => Some('\u{a0}'),
		_ => None,
	}
}

/// Split text into length units: an entity is one unit, otherwise one char
fn units(s: &str) -> Vec<&str> {
	let mut out = Vec::new();
	let mut i = 0;
	while i < s.len() {
		let rest = &s[i..];
		let entity_len = if rest.starts_with('&') {
			ENTITY.find(rest).map(|m| m.end())
		} else {
			None
		};
		let len = entity_len.unwrap_or_else(|| rest.chars().next().map_or(1, char::len_utf8));
		out.push(&rest[..len]);
		i += len;
	}
	out
}

fn is_space_unit(unit: &str) -> bool {
	unit.chars().all(char::is_whitespace) && !unit.is_empty()
}

/// Truncate to at most `limit` decoded units on a word boundary
///
/// Entities are never split and no ellipsis is appended. When the first word
/// alone is longer than `limit` it is kept whole, unless `word_break` is set,
/// in which case it is cut at `limit`.
///
/// # Examples
///
/// ```
/// use penmark_template::filters::cut_string;
///
/// assert_eq!(cut_string("Hello wonderful world", 12, false), "Hello");
/// assert_eq!(cut_string("caf&eacute; au lait", 6, false), "caf&eacute;");
/// assert_eq!(cut_string("Supercalifragilistic", 5, false), "Supercalifragilistic");
/// assert_eq!(cut_string("Supercalifragilistic", 5, true), "Super");
/// ```
pub fn cut_string(text: &str, limit: usize, word_break: bool) -> String {
	let text = text.trim();
	let units = units(text);
	if limit == 0 || units.len() <= limit {
		return text.to_string();
	}

	let last_break = (1..=limit).rev().find(|i| is_space_unit(units[*i]));
	let kept = match last_break {
		Some(i) => &units[..i],
		None if word_break => &units[..limit],
		None => {
			let end = units.iter().position(|u| is_space_unit(u)).unwrap_or(units.len());
			&units[..end]
		}
	};
	kept.concat().trim_end().to_string()
}

/// Upper-case the first character
pub fn capitalize(s: &str) -> String {
	let mut chars = s.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

/// Percent-encode everything but RFC 3986 unreserved characters
pub fn encode_url(s: &str) -> String {
	utf8_percent_encode(s, URL_ENCODE_SET).to_string()
}
