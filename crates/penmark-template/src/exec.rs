//! Execution of compiled units
//!
//! A small interpreter walks the [`Code`] tree against a [`Context`], pulling
//! records from the data provider and settings from the settings store, and
//! writes scalar output through the filter pipeline.

use crate::behaviors::Behaviors;
use crate::code::{Code, Cond, Expr, Instr, LoopSource};
use crate::context::{Context, RecordSetHandle, Value};
use crate::filters::{apply_filters, is_truthy};
use crate::provider::{DataProvider, QueryParams};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use penmark_conf::SettingsStore;
use penmark_exception::{Error, Result};
use std::fmt::Write;
use std::rc::Rc;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Reverse routing: public URL of a route kind for an argument
pub trait UrlFor {
	fn url_for(&self, kind: &str, arg: &str) -> String;
}

/// Collaborators a compiled unit talks to
#[derive(Clone, Copy)]
pub struct RenderEnv<'a> {
	pub provider: &'a dyn DataProvider,
	pub settings: &'a dyn SettingsStore,
	pub urls: &'a dyn UrlFor,
	pub behaviors: &'a Behaviors,
}

/// Run `code` and return its output
pub fn execute(code: &Code, ctx: &mut Context, env: &RenderEnv<'_>) -> Result<String> {
	let mut out = String::new();
	run(code.instrs(), ctx, env, &mut out)?;
	Ok(out)
}

fn run(instrs: &[Instr], ctx: &mut Context, env: &RenderEnv<'_>, out: &mut String) -> Result<()> {
	for instr in instrs {
		match instr {
			Instr::Text(text) => out.push_str(text),
			Instr::Echo { expr, filters, tag } => {
				let raw = eval(expr, ctx, env)?;
				out.push_str(&apply_filters(&raw, filters, tag, env.behaviors));
			}
			Instr::If { cond, body } => {
				let (then_part, else_part) = split_else(body);
				if holds(cond, ctx, env)? {
					run(then_part, ctx, env, out)?;
				} else if let Some(else_part) = else_part {
					run(else_part, ctx, env, out)?;
				}
			}
			Instr::Else => {
				return Err(Error::RenderFault(
					"Else used outside of a conditional block".to_string(),
				));
			}
			Instr::Loop { source, bind, body } => {
				let Some(rs) = loop_records(source, ctx, env)? else {
					continue;
				};
				ctx.push(bind, Value::Records(Rc::clone(&rs)));
				rs.rewind();
				let mut result = Ok(());
				while rs.fetch() {
					result = run(body, ctx, env, out);
					if result.is_err() {
						break;
					}
				}
				rs.rewind();
				ctx.pop(bind);
				result?;
			}
		}
	}
	Ok(())
}

fn split_else(body: &[Instr]) -> (&[Instr], Option<&[Instr]>) {
	match body.iter().position(|i| matches!(i, Instr::Else)) {
		Some(at) => (&body[..at], Some(&body[at + 1..])),
		None => (body, None),
	}
}

fn loop_records(
	source: &LoopSource,
	ctx: &Context,
	env: &RenderEnv<'_>,
) -> Result<Option<RecordSetHandle>> {
	match source {
		LoopSource::Context(var) => Ok(ctx.get(var).as_records().cloned()),
		LoopSource::Provider { kind, params } => {
			let mut query = QueryParams::new();
			for (key, expr) in params {
				query.set(key.as_str(), eval(expr, ctx, env)?);
			}
			let rs = env.provider.records(*kind, &query).map_err(|e| match e {
				Error::RenderFault(_) => e,
				other => Error::RenderFault(format!("{kind} query failed: {other}")),
			})?;
			Ok(Some(Rc::new(rs)))
		}
	}
}

fn eval(expr: &Expr, ctx: &Context, env: &RenderEnv<'_>) -> Result<String> {
	Ok(match expr {
		Expr::Literal(s) => s.clone(),
		Expr::Var(name) => ctx.get(name).as_text().to_string(),
		Expr::Field { var, field } => ctx
			.get(var)
			.as_records()
			.map(|rs| rs.field_text(field))
			.unwrap_or_default(),
		Expr::Setting(key) => env.settings.get_str(key).unwrap_or_default(),
		Expr::PageNumber => ctx.page().max(1).to_string(),
		Expr::Concat(parts) => {
			let mut s = String::new();
			for part in parts {
				s.push_str(&eval(part, ctx, env)?);
			}
			s
		}
		Expr::Date { expr, format } => {
			let raw = eval(expr, ctx, env)?;
			let format = match format {
				Some(f) => f.clone(),
				None => env
					.settings
					.get_str("date_format")
					.unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string()),
			};
			format_date(&raw, &format)
		}
		Expr::UrlFor { kind, arg } => env.urls.url_for(kind, &eval(arg, ctx, env)?),
		Expr::PageCount { var } => page_count(ctx, var).to_string(),
		Expr::PageUrl { offset } => {
			let page = i64::from(ctx.page().max(1)).saturating_add(*offset).max(1);
			page_url(ctx.page_base(), page)
		}
	})
}

fn holds(cond: &Cond, ctx: &Context, env: &RenderEnv<'_>) -> Result<bool> {
	Ok(match cond {
		Cond::Exists(name) => ctx.exists(name),
		Cond::Truthy(expr) => is_truthy(&eval(expr, ctx, env)?),
		Cond::Equals(a, b) => eval(a, ctx, env)? == eval(b, ctx, env)?,
		Cond::LoopPosition {
			start,
			length,
			even,
			modulo,
		} => ctx.loop_position(*start, *length, *even, *modulo),
		Cond::IsFirst => ctx.current_loop().is_some_and(|rs| rs.is_start()),
		Cond::IsLast => ctx.current_loop().is_some_and(|rs| rs.is_end()),
		Cond::HasNextPage { var } => (ctx.page().max(1) as usize) < page_count(ctx, var),
		Cond::HasPreviousPage => ctx.page() > 1,
		Cond::MultiplePages { var } => page_count(ctx, var) > 1,
		Cond::ContentCut { expr, filters } => {
			let raw = eval(expr, ctx, env)?;
			let plain = Behaviors::new();
			apply_filters(&raw, filters, "", &plain)
				!= apply_filters(&raw, &filters.without_cut(), "", &plain)
		}
		Cond::Not(inner) => !holds(inner, ctx, env)?,
		Cond::All(conds) => {
			for c in conds {
				if !holds(c, ctx, env)? {
					return Ok(false);
				}
			}
			true
		}
		Cond::Any(conds) => {
			for c in conds {
				if holds(c, ctx, env)? {
					return Ok(true);
				}
			}
			false
		}
	})
}

fn page_count(ctx: &Context, var: &str) -> usize {
	ctx.get(var).as_records().map_or(1, |rs| rs.page_count())
}

/// URL of page `page` of the listing at `base`; page 1 is `base` itself
///
/// # Examples
///
/// ```
/// use penmark_template::exec::page_url;
///
/// assert_eq!(page_url("http://blog.test/", 1), "http://blog.test/");
/// assert_eq!(page_url("http://blog.test/", 3), "http://blog.test/page/3");
/// assert_eq!(page_url("http://blog.test/category/rust", 2), "http://blog.test/category/rust/page/2");
/// ```
pub fn page_url(base: &str, page: i64) -> String {
	if page <= 1 {
		return base.to_string();
	}
	if base.ends_with('/') || base.ends_with('?') {
		format!("{base}page/{page}")
	} else {
		format!("{base}/page/{page}")
	}
}

fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
	let raw = raw.trim();
	if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
		return Some(dt);
	}
	if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
		return Some(dt.and_utc().fixed_offset());
	}
	NaiveDate::parse_from_str(raw, "%Y-%m-%d")
		.ok()
		.and_then(|d| d.and_hms_opt(0, 0, 0))
		.map(|dt| dt.and_utc().fixed_offset())
}

/// Reformat a timestamp with a chrono format string
///
/// Unparsable timestamps and invalid format strings leave `raw` unchanged.
pub fn format_date(raw: &str, format: &str) -> String {
	let Some(dt) = parse_date(raw) else {
		return raw.to_string();
	};
	let mut out = String::new();
	if write!(out, "{}", dt.format(format)).is_err() {
		return raw.to_string();
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::filters::FilterSpec;
	use crate::provider::RecordKind;
	use crate::record::RecordSet;
	use penmark_conf::Settings;
	use rstest::rstest;
	use serde_json::json;
	use std::collections::BTreeMap;

	struct Fixture;

	impl DataProvider for Fixture {
		fn posts(&self, params: &QueryParams) -> Result<RecordSet> {
			let limit = params.get_usize("limit").unwrap_or(3);
			Ok(RecordSet::from_values(
				(0..limit).map(|i| json!({"title": format!("p{i}")})).collect(),
			))
		}
		fn comments(&self, _params: &QueryParams) -> Result<RecordSet> {
			Err(Error::Io(std::io::Error::other("disk gone")))
		}
		fn categories(&self, _params: &QueryParams) -> Result<RecordSet> {
			Ok(RecordSet::default())
		}
		fn dates(&self, _params: &QueryParams) -> Result<RecordSet> {
			Ok(RecordSet::default())
		}
		fn langs(&self, _params: &QueryParams) -> Result<RecordSet> {
			Ok(RecordSet::default())
		}
	}

	struct Urls;
	impl UrlFor for Urls {
		fn url_for(&self, kind: &str, arg: &str) -> String {
			format!("/{kind}/{arg}")
		}
	}

	fn render(code: &Code, ctx: &mut Context) -> Result<String> {
		let settings = Settings::from_value(json!({"blog_name": "Notes", "date_format": "%d/%m/%Y"})).unwrap();
		let behaviors = Behaviors::new();
		let env = RenderEnv {
			provider: &Fixture,
			settings: &settings,
			urls: &Urls,
			behaviors: &behaviors,
		};
		execute(code, ctx, &env)
	}

	fn echo(expr: Expr) -> Code {
		Instr::Echo {
			expr,
			filters: FilterSpec::default(),
			tag: "T".into(),
		}
		.into()
	}

	fn provider_loop(kind: RecordKind, limit: &str, body: Code) -> Code {
		let mut params = BTreeMap::new();
		params.insert("limit".to_string(), Expr::Literal(limit.into()));
		Code::each(LoopSource::Provider { kind, params }, "posts", body)
	}

	#[rstest]
	fn test_if_else_branches() {
		let mut body = Code::text("yes");
		body.push(Instr::Else);
		body.extend(Code::text("no"));
		let code = Code::when(Cond::Exists("flag".into()), body);

		let mut ctx = Context::new();
		assert_eq!(render(&code, &mut ctx).unwrap(), "no");
		ctx.push("flag", "1".into());
		assert_eq!(render(&code, &mut ctx).unwrap(), "yes");
	}

	#[rstest]
	fn test_else_outside_conditional_faults() {
		let code: Code = Instr::Else.into();
		assert!(matches!(render(&code, &mut Context::new()), Err(Error::RenderFault(_))));
	}

	#[rstest]
	fn test_provider_loop_restores_stack() {
		let mut body = echo(Expr::field("posts", "title"));
		body.extend(Code::when(Cond::Not(Box::new(Cond::IsLast)), Code::text(",")));
		let code = provider_loop(RecordKind::Posts, "3", body);

		let mut ctx = Context::new();
		assert_eq!(render(&code, &mut ctx).unwrap(), "p0,p1,p2");
		assert_eq!(ctx.loop_depth(), 0);
		assert!(!ctx.exists("posts"));
	}

	#[rstest]
	fn test_context_loop_reuses_pushed_set() {
		let code = Code::each(
			LoopSource::Context("posts".into()),
			"posts",
			echo(Expr::field("posts", "title")),
		);
		let mut ctx = Context::new();
		ctx.push(
			"posts",
			RecordSet::from_values(vec![json!({"title": "a"}), json!({"title": "b"})]).into(),
		);

		assert_eq!(render(&code, &mut ctx).unwrap(), "ab");
		assert_eq!(ctx.loop_depth(), 1);
		assert_eq!(
			ctx.get("posts").as_records().unwrap().field_text("title"),
			"a"
		);
	}

	#[rstest]
	fn test_missing_context_set_renders_nothing() {
		let code = Code::each(LoopSource::Context("posts".into()), "posts", Code::text("x"));
		assert_eq!(render(&code, &mut Context::new()).unwrap(), "");
	}

	#[rstest]
	fn test_provider_failure_is_render_fault() {
		let code = provider_loop(RecordKind::Comments, "1", Code::text("x"));
		let mut ctx = Context::new();
		match render(&code, &mut ctx) {
			Err(Error::RenderFault(msg)) => assert!(msg.contains("comments")),
			other => panic!("unexpected {other:?}"),
		}
		assert_eq!(ctx.loop_depth(), 0);
	}

	#[rstest]
	fn test_settings_and_urls() {
		let mut code = echo(Expr::Setting("blog_name".into()));
		code.extend(echo(Expr::url_for("post", Expr::Literal("hello".into()))));
		assert_eq!(render(&code, &mut Context::new()).unwrap(), "Notes/post/hello");
	}

	#[rstest]
	fn test_date_uses_setting_format() {
		let code = echo(Expr::Date {
			expr: Box::new(Expr::Literal("2024-03-09T10:00:00+01:00".into())),
			format: None,
		});
		assert_eq!(render(&code, &mut Context::new()).unwrap(), "09/03/2024");
	}

	#[rstest]
	#[case("2024-03-09 08:05:00", "%H:%M", "08:05")]
	#[case("2024-03-09", "%Y", "2024")]
	#[case("yesterday", "%Y", "yesterday")]
	#[case("2024-03-09", "%Q", "2024-03-09")]
	fn test_format_date(#[case] raw: &str, #[case] format: &str, #[case] expected: &str) {
		assert_eq!(format_date(raw, format), expected);
	}

	#[rstest]
	fn test_pagination_conditions() {
		let posts = RecordSet::from_values(vec![json!({}); 10]).with_paging(25, 10);
		let mut ctx = Context::new();
		ctx.push("posts", posts.into());
		ctx.set_page_base("http://b/");
		ctx.set_page(2);

		let next = Cond::HasNextPage { var: "posts".into() };
		let mut code = Code::when(next, echo(Expr::PageUrl { offset: 1 }));
		code.extend(Code::when(Cond::HasPreviousPage, echo(Expr::PageUrl { offset: -1 })));
		code.extend(echo(Expr::PageCount { var: "posts".into() }));
		assert_eq!(render(&code, &mut ctx).unwrap(), "http://b/page/3http://b/3");
	}

	#[rstest]
	#[case(i64::MAX, "http://b/page/9223372036854775807")]
	#[case(i64::MIN, "http://b/")]
	fn test_page_url_offset_saturates(#[case] offset: i64, #[case] expected: &str) {
		let mut ctx = Context::new();
		ctx.set_page_base("http://b/");
		ctx.set_page(2);
		let code = echo(Expr::PageUrl { offset });
		assert_eq!(render(&code, &mut ctx).unwrap(), expected);
	}

	#[rstest]
	fn test_content_cut() {
		let cond = Cond::ContentCut {
			expr: Expr::Var("body".into()),
			filters: FilterSpec {
				cut_string: Some(5),
				..Default::default()
			},
		};
		let code = Code::when(cond, Code::text("more"));
		let mut ctx = Context::new();
		ctx.push("body", "short".into());
		assert_eq!(render(&code, &mut ctx).unwrap(), "");
		ctx.push("body", "much longer text".into());
		assert_eq!(render(&code, &mut ctx).unwrap(), "more");
	}
}
