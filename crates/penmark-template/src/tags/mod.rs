//! Built-in blog tag library
//!
//! | Module | Tags |
//! |---|---|
//! | [`system`] | `Else`, `LoopPosition`, `IfExists` |
//! | [`blog`] | blog settings, page title, pagination |
//! | [`entries`] | `Entries` and every `Entry*` tag |
//! | [`listings`] | categories, comments, archives, languages |
//!
//! Handlers read the variables route handlers push: `posts` (the current post
//! listing or the single post), `page_title`. Loops bind their rows to
//! `posts`, `categories`, `comments`, `dates` and `langs`.

pub mod blog;
pub mod entries;
pub mod listings;
pub mod system;

use crate::code::{Code, Cond, Expr};
use crate::compiler::{TagCompiler, TagInvocation};
use penmark_exception::Result;
use std::collections::BTreeMap;

/// Register every built-in tag on `compiler`
pub fn register_builtin(compiler: &mut TagCompiler) -> Result<()> {
	system::register(compiler)?;
	blog::register(compiler)?;
	entries::register(compiler)?;
	listings::register(compiler)?;
	Ok(())
}

/// Value tag echoing one field of the current row of `var`
pub(crate) fn field_tag(
	compiler: &mut TagCompiler,
	name: &str,
	var: &'static str,
	field: &'static str,
) -> Result<()> {
	compiler.add_value_tag(name, move |tag| Ok(tag.echo(Expr::field(var, field))))
}

/// Value tag echoing a date field, honoring `format`
pub(crate) fn date_tag(
	compiler: &mut TagCompiler,
	name: &str,
	var: &'static str,
	field: &'static str,
	default_format: Option<&'static str>,
) -> Result<()> {
	compiler.add_value_tag(name, move |tag| {
		let format = if tag.flag("iso8601") {
			Some("%Y-%m-%dT%H:%M:%S%:z".to_string())
		} else if tag.flag("rfc822") {
			Some("%a, %d %b %Y %H:%M:%S %z".to_string())
		} else {
			tag.attr("format")
				.map(str::to_string)
				.or(default_format.map(str::to_string))
		};
		Ok(tag.echo(Expr::Date {
			expr: Box::new(Expr::field(var, field)),
			format,
		}))
	})
}

/// `*Header` / `*Footer` block pair: content only on the first / last row
pub(crate) fn header_footer(compiler: &mut TagCompiler, prefix: &str) -> Result<()> {
	compiler.add_block_tag(&format!("{prefix}Header"), |_, content| {
		Ok(Code::when(Cond::IsFirst, content))
	})?;
	compiler.add_block_tag(&format!("{prefix}Footer"), |_, content| {
		Ok(Code::when(Cond::IsLast, content))
	})
}

/// Copy literal attributes into provider query parameters
pub(crate) fn literal_params(tag: &TagInvocation, keys: &[&str]) -> BTreeMap<String, Expr> {
	keys.iter()
		.filter_map(|key| {
			tag.attr(key)
				.filter(|v| !v.is_empty())
				.map(|v| (key.to_string(), Expr::Literal(v.to_string())))
		})
		.collect()
}

/// Combine conditions according to `operator` (`and` by default, or `or`)
pub(crate) fn combine(tag: &TagInvocation, conds: Vec<Cond>) -> std::result::Result<Cond, String> {
	match tag.attr("operator").unwrap_or("and") {
		"and" | "&&" => Ok(Cond::All(conds)),
		"or" | "||" => Ok(Cond::Any(conds)),
		other => Err(format!("unknown operator '{other}'")),
	}
}

/// Condition for a boolean attribute: truthy keeps `cond`, falsy negates it
pub(crate) fn polar(value: &str, cond: Cond) -> Cond {
	if crate::filters::is_truthy(value) {
		cond
	} else {
		Cond::Not(Box::new(cond))
	}
}
