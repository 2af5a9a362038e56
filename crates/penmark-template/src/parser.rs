//! Tokenizer for `<tag:...>` markup
//!
//! Splits a template into literal text, tag openings and tag closings. It knows
//! nothing about which tags exist; the compiler decides what a token means.

use crate::compiler::Attributes;

const OPEN: &str = "<tag:";
const CLOSE: &str = "</tag:";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token<'s> {
	Text(&'s str),
	Open {
		name: &'s str,
		attributes: Attributes,
		self_closing: bool,
		raw: &'s str,
		offset: usize,
	},
	Close {
		name: &'s str,
		raw: &'s str,
		offset: usize,
	},
}

/// Malformed markup at a byte offset
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SyntaxError {
	pub offset: usize,
	pub message: String,
}

impl SyntaxError {
	fn new(offset: usize, message: impl Into<String>) -> Self {
		Self {
			offset,
			message: message.into(),
		}
	}
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token<'_>>, SyntaxError> {
	let mut tokens = Vec::new();
	let mut text_start = 0;
	let mut pos = 0;

	while let Some(rel) = source[pos..].find('<') {
		let at = pos + rel;
		let rest = &source[at..];

		let tag = if let Some(after) = rest.strip_prefix(CLOSE) {
			close_tag(after).map(|(name, len)| {
				let end = at + CLOSE.len() + len;
				(
					Token::Close {
						name,
						raw: &source[at..end],
						offset: at,
					},
					end,
				)
			})
		} else if let Some(after) = rest.strip_prefix(OPEN) {
			open_tag(after, at)?.map(|(name, attributes, self_closing, len)| {
				let end = at + OPEN.len() + len;
				(
					Token::Open {
						name,
						attributes,
						self_closing,
						raw: &source[at..end],
						offset: at,
					},
					end,
				)
			})
		} else {
			None
		};

		match tag {
			Some((token, end)) => {
				if text_start < at {
					tokens.push(Token::Text(&source[text_start..at]));
				}
				tokens.push(token);
				pos = end;
				text_start = end;
			}
			None => pos = at + 1,
		}
	}

	if text_start < source.len() {
		tokens.push(Token::Text(&source[text_start..]));
	}
	Ok(tokens)
}

/// Length of a valid tag name at the start of `s`
fn name_len(s: &str) -> Option<usize> {
	let bytes = s.as_bytes();
	if !bytes.first()?.is_ascii_alphabetic() {
		return None;
	}
	Some(
		bytes
			.iter()
			.take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
			.count(),
	)
}

fn close_tag(after: &str) -> Option<(&str, usize)> {
	let len = name_len(after)?;
	let bytes = after.as_bytes();
	let mut i = len;
	while i < bytes.len() && bytes[i].is_ascii_whitespace() {
		i += 1;
	}
	(bytes.get(i) == Some(&b'>')).then(|| (&after[..len], i + 1))
}

type OpenTag<'s> = (&'s str, Attributes, bool, usize);

/// Parse the rest of an opening tag; `Ok(None)` means "not a tag, keep as text"
fn open_tag(after: &str, at: usize) -> Result<Option<OpenTag<'_>>, SyntaxError> {
	let Some(len) = name_len(after) else {
		return Ok(None);
	};
	let name = &after[..len];
	let bytes = after.as_bytes();
	let base = at + OPEN.len();

	match bytes.get(len) {
		None => {
			return Err(SyntaxError::new(
				at,
				format!("unterminated tag <tag:{name}"),
			));
		}
		Some(b) if b.is_ascii_whitespace() || *b == b'/' || *b == b'>' => {}
		Some(_) => return Ok(None),
	}

	let mut attributes = Attributes::new();
	let mut i = len;
	loop {
		while i < bytes.len() && bytes[i].is_ascii_whitespace() {
			i += 1;
		}
		if i >= bytes.len() {
			return Err(SyntaxError::new(
				at,
				format!("unterminated tag <tag:{name}"),
			));
		}
		if after[i..].starts_with("/>") {
			return Ok(Some((name, attributes, true, i + 2)));
		}
		if bytes[i] == b'>' {
			return Ok(Some((name, attributes, false, i + 1)));
		}

		let attr_start = i;
		while i < bytes.len()
			&& (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'-' | b':'))
		{
			i += 1;
		}
		if i == attr_start {
			let c = after[i..].chars().next().unwrap_or(' ');
			return Err(SyntaxError::new(
				base + i,
				format!("unexpected character '{c}' in <tag:{name}>"),
			));
		}
		let attr = after[attr_start..i].to_string();

		let mut j = i;
		while j < bytes.len() && bytes[j].is_ascii_whitespace() {
			j += 1;
		}
		if bytes.get(j) != Some(&b'=') {
			attributes.insert(attr, "1".to_string());
			continue;
		}
		i = j + 1;
		while i < bytes.len() && bytes[i].is_ascii_whitespace() {
			i += 1;
		}

		let value = match bytes.get(i) {
			Some(&quote) if quote == b'"' || quote == b'\'' => {
				let Some(close) = after[i + 1..].find(quote as char) else {
					return Err(SyntaxError::new(
						base + i,
						format!("unterminated quote in attribute '{attr}' of <tag:{name}>"),
					));
				};
				let value = &after[i + 1..i + 1 + close];
				i += close + 2;
				value
			}
			_ => {
				let value_start = i;
				while i < bytes.len()
					&& !bytes[i].is_ascii_whitespace()
					&& bytes[i] != b'>'
					&& !after[i..].starts_with("/>")
				{
					i += 1;
				}
				&after[value_start..i]
			}
		};
		attributes.insert(attr, value.to_string());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn open<'a>(token: &'a Token<'a>) -> (&'a str, Vec<(String, String)>, bool) {
		match token {
			Token::Open {
				name,
				attributes,
				self_closing,
				..
			} => (
				*name,
				attributes
					.iter()
					.map(|(k, v)| (k.clone(), v.clone()))
					.collect(),
				*self_closing,
			),
			other => panic!("expected open tag, got {other:?}"),
		}
	}

	#[rstest]
	fn test_text_only() {
		assert_eq!(tokenize("plain <b>html</b>").unwrap(), vec![Token::Text("plain <b>html</b>")]);
	}

	#[rstest]
	fn test_value_tag_with_attributes() {
		let tokens = tokenize(r#"a <tag:EntryTitle encode_html="1" cut_string='20' upper_case flag=x/> b"#).unwrap();
		assert_eq!(tokens.len(), 3);
		let (name, attrs, self_closing) = open(&tokens[1]);
		assert_eq!(name, "EntryTitle");
		assert!(self_closing);
		assert_eq!(
			attrs,
			vec![
				("encode_html".to_string(), "1".to_string()),
				("cut_string".to_string(), "20".to_string()),
				("upper_case".to_string(), "1".to_string()),
				("flag".to_string(), "x".to_string()),
			]
		);
	}

	#[rstest]
	fn test_block_open_and_close() {
		let tokens = tokenize("<tag:Entries lastn=\"3\">x</tag:Entries >").unwrap();
		assert_eq!(tokens.len(), 3);
		assert!(!open(&tokens[0]).2);
		assert_eq!(tokens[1], Token::Text("x"));
		assert!(matches!(tokens[2], Token::Close { name: "Entries", offset: 24, .. }));
	}

	#[rstest]
	#[case("<tag:>")]
	#[case("<tag:1abc/>")]
	#[case("<tag:Foo-bar/>")]
	#[case("</tag:Foo")]
	fn test_not_a_tag_stays_text(#[case] source: &str) {
		assert_eq!(tokenize(source).unwrap(), vec![Token::Text(source)]);
	}

	#[rstest]
	fn test_unterminated_open_tag() {
		let err = tokenize("abc <tag:Entries lastn=\"3\"").unwrap_err();
		assert_eq!(err.offset, 4);
		assert!(err.message.contains("unterminated tag"));
	}

	#[rstest]
	fn test_unterminated_quote() {
		let err = tokenize("<tag:X a=\"oops/>").unwrap_err();
		assert_eq!(err.offset, 9);
		assert!(err.message.contains("unterminated quote"));
	}

	#[rstest]
	fn test_quoted_value_may_contain_markup() {
		let tokens = tokenize(r#"<tag:X sep="<br/>"/>"#).unwrap();
		assert_eq!(open(&tokens[0]).1[0].1, "<br/>");
	}

	#[rstest]
	fn test_raw_is_preserved() {
		let source = "<tag:Bogus  a = 'b' />";
		match &tokenize(source).unwrap()[0] {
			Token::Open { raw, .. } => assert_eq!(*raw, source),
			other => panic!("unexpected {other:?}"),
		}
	}
}
