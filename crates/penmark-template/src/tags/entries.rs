//! Post listing tags
//!
//! `<tag:Entries>` walks the `posts` set a route handler pushed. When no such
//! set exists, or `no_context` is given, it queries the data provider itself
//! using its `lastn`, `category`, `lang` and `order` attributes.

use super::{combine, date_tag, field_tag, header_footer, literal_params, polar};
use crate::code::{Code, Cond, Expr, Instr, LoopSource};
use crate::compiler::TagCompiler;
use crate::filters::FilterSpec;
use crate::provider::RecordKind;
use penmark_exception::Result;

const POSTS: &str = "posts";

pub(crate) fn register(compiler: &mut TagCompiler) -> Result<()> {
	compiler.add_block_tag("Entries", |tag, content| {
		let mut params = literal_params(tag, &["category", "lang", "order"]);
		let limit = match tag.int("lastn")? {
			Some(n) if n > 0 => Expr::Literal(n.to_string()),
			Some(_) => return Err("attribute 'lastn' must be positive".to_string()),
			None => Expr::Setting("posts_per_page".to_string()),
		};
		params.insert("limit".to_string(), limit);
		if !tag.flag("ignore_pagination") {
			params.insert("page".to_string(), Expr::PageNumber);
		}

		let query = Code::each(
			LoopSource::Provider {
				kind: RecordKind::Posts,
				params,
			},
			POSTS,
			content.clone(),
		);
		if tag.flag("no_context") {
			return Ok(query);
		}

		let mut body = Code::each(LoopSource::Context(POSTS.to_string()), POSTS, content);
		body.push(Instr::Else);
		body.extend(query);
		Ok(Code::when(Cond::Exists(POSTS.to_string()), body))
	})?;
	header_footer(compiler, "Entries")?;

	compiler.add_block_tag("EntryIf", |tag, content| {
		let mut conds = Vec::new();
		for (attr, cond) in [
			("first", Cond::IsFirst),
			("last", Cond::IsLast),
			(
				"odd",
				Cond::LoopPosition {
					start: 0,
					length: None,
					even: Some(false),
					modulo: None,
				},
			),
			("has_category", truthy_field("category")),
			("extended", truthy_field("excerpt")),
			("comments", truthy_field("comment_count")),
		] {
			if let Some(value) = tag.attr(attr) {
				conds.push(polar(value, cond));
			}
		}
		Ok(Code::when(combine(tag, conds)?, content))
	})?;

	compiler.add_value_tag("EntryIfFirst", |tag| {
		let ret = tag.attr("return").unwrap_or("first");
		Ok(Code::when(Cond::IsFirst, Code::text(ret)))
	})?;
	compiler.add_value_tag("EntryIfOdd", |tag| {
		let ret = tag.attr("return").unwrap_or("odd");
		let odd = Cond::LoopPosition {
			start: 0,
			length: None,
			even: Some(false),
			modulo: None,
		};
		Ok(Code::when(odd, Code::text(ret)))
	})?;

	for (name, field) in [
		("EntryID", "id"),
		("EntryTitle", "title"),
		("EntryContent", "content"),
		("EntryExcerpt", "excerpt"),
		("EntryAuthor", "author"),
		("EntryCategory", "category_title"),
		("EntryLang", "lang"),
		("EntryCommentCount", "comment_count"),
	] {
		field_tag(compiler, name, POSTS, field)?;
	}
	date_tag(compiler, "EntryDate", POSTS, "date", None)?;

	compiler.add_value_tag("EntryURL", |tag| {
		Ok(tag.echo(Expr::url_for("post", Expr::field(POSTS, "url"))))
	})?;
	compiler.add_value_tag("EntryCategoryURL", |tag| {
		Ok(tag.echo(Expr::url_for("category", Expr::field(POSTS, "category"))))
	})?;

	compiler.add_block_tag("EntryIfContentCut", |tag, content| {
		let expr = if tag.flag("full") {
			Expr::Concat(vec![Expr::field(POSTS, "excerpt"), Expr::field(POSTS, "content")])
		} else {
			Expr::field(POSTS, "content")
		};
		let cond = Cond::ContentCut {
			expr,
			filters: FilterSpec::from_attributes(&tag.attributes),
		};
		Ok(Code::when(cond, content))
	})?;

	Ok(())
}

fn truthy_field(field: &str) -> Cond {
	Cond::Truthy(Expr::field(POSTS, field))
}
