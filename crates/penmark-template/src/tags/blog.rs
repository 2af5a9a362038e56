//! Blog-wide values and pagination

use super::{combine, polar};
use crate::code::{Code, Cond, Expr};
use crate::compiler::TagCompiler;
use penmark_exception::Result;

const FEED_TYPES: [&str; 2] = ["atom", "rss2"];

pub(crate) fn register(compiler: &mut TagCompiler) -> Result<()> {
	for (name, key) in [
		("BlogName", "blog_name"),
		("BlogDescription", "blog_description"),
		("BlogURL", "blog_url"),
		("BlogLanguage", "language"),
	] {
		compiler.add_value_tag(name, move |tag| Ok(tag.echo(Expr::Setting(key.to_string()))))?;
	}

	compiler.add_value_tag("BlogFeedURL", |tag| {
		let kind = tag.attr("type").unwrap_or("atom");
		if !FEED_TYPES.contains(&kind) {
			return Err(format!("unknown feed type '{kind}'"));
		}
		let arg = if tag.flag("comments") {
			format!("comments/{kind}")
		} else {
			kind.to_string()
		};
		Ok(tag.echo(Expr::url_for("feed", Expr::Literal(arg))))
	})?;

	compiler.add_value_tag("PageTitle", |tag| {
		Ok(tag.echo(Expr::Var("page_title".to_string())))
	})?;

	register_pagination(compiler)
}

fn register_pagination(compiler: &mut TagCompiler) -> Result<()> {
	compiler.add_block_tag("Pagination", |_, content| {
		Ok(Code::when(
			Cond::MultiplePages {
				var: "posts".to_string(),
			},
			content,
		))
	})?;

	compiler.add_value_tag("PaginationCounter", |tag| {
		Ok(tag.echo(Expr::PageCount {
			var: "posts".to_string(),
		}))
	})?;

	compiler.add_value_tag("PaginationCurrent", |tag| Ok(tag.echo(Expr::PageNumber)))?;

	compiler.add_block_tag("PaginationIf", |tag, content| {
		let mut conds = Vec::new();
		if let Some(start) = tag.attr("start") {
			let first = Cond::Not(Box::new(Cond::HasPreviousPage));
			conds.push(polar(start, first));
		}
		if let Some(end) = tag.attr("end") {
			let last = Cond::Not(Box::new(Cond::HasNextPage {
				var: "posts".to_string(),
			}));
			conds.push(polar(end, last));
		}
		Ok(Code::when(combine(tag, conds)?, content))
	})?;

	compiler.add_value_tag("PaginationURL", |tag| {
		let offset = tag.int("offset")?.unwrap_or(0);
		Ok(tag.echo(Expr::PageUrl { offset }))
	})?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use crate::code::{Cond, Expr, Instr};
	use crate::compiler::TagCompiler;
	use rstest::{fixture, rstest};

	#[fixture]
	fn compiler() -> TagCompiler {
		let mut c = TagCompiler::new();
		super::register(&mut c).unwrap();
		c
	}

	#[rstest]
	fn test_blog_name_reads_setting(compiler: TagCompiler) {
		let code = compiler.compile("t", "<tag:BlogName encode_html=\"1\"/>").unwrap();
		match &code.instrs()[0] {
			Instr::Echo { expr, filters, .. } => {
				assert_eq!(*expr, Expr::Setting("blog_name".into()));
				assert!(filters.encode_html);
			}
			other => panic!("unexpected {other:?}"),
		}
	}

	#[rstest]
	#[case("<tag:BlogFeedURL/>", "atom")]
	#[case("<tag:BlogFeedURL type=\"rss2\"/>", "rss2")]
	#[case("<tag:BlogFeedURL comments=\"1\"/>", "comments/atom")]
	fn test_feed_url(compiler: TagCompiler, #[case] source: &str, #[case] arg: &str) {
		let code = compiler.compile("t", source).unwrap();
		match &code.instrs()[0] {
			Instr::Echo { expr, .. } => {
				assert_eq!(*expr, Expr::url_for("feed", Expr::Literal(arg.into())))
			}
			other => panic!("unexpected {other:?}"),
		}
	}

	#[rstest]
	fn test_unknown_feed_type(compiler: TagCompiler) {
		assert!(compiler.compile("t", "<tag:BlogFeedURL type=\"json\"/>").is_err());
	}

	#[rstest]
	fn test_pagination_if_start(compiler: TagCompiler) {
		let code = compiler
			.compile("t", "<tag:PaginationIf start=\"0\">prev</tag:PaginationIf>")
			.unwrap();
		match &code.instrs()[0] {
			Instr::If { cond, .. } => assert_eq!(
				*cond,
				Cond::All(vec![Cond::Not(Box::new(Cond::Not(Box::new(Cond::HasPreviousPage))))])
			),
			other => panic!("unexpected {other:?}"),
		}
	}
}
