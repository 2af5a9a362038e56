//! Categories, comments, archive months and languages

use super::{date_tag, field_tag, header_footer, literal_params};
use crate::code::{Code, Cond, Expr, LoopSource};
use crate::compiler::TagCompiler;
use crate::provider::RecordKind;
use penmark_exception::Result;

pub(crate) fn register(compiler: &mut TagCompiler) -> Result<()> {
	categories(compiler)?;
	comments(compiler)?;
	archives(compiler)?;
	languages(compiler)
}

fn categories(compiler: &mut TagCompiler) -> Result<()> {
	compiler.add_block_tag("Categories", |tag, content| {
		let params = literal_params(tag, &["lang", "order"]);
		Ok(Code::each(
			LoopSource::Provider {
				kind: RecordKind::Categories,
				params,
			},
			"categories",
			content,
		))
	})?;
	header_footer(compiler, "Categories")?;

	field_tag(compiler, "CategoryTitle", "categories", "title")?;
	field_tag(compiler, "CategoryDescription", "categories", "description")?;
	field_tag(compiler, "CategoryEntriesCount", "categories", "count")?;
	compiler.add_value_tag("CategoryURL", |tag| {
		Ok(tag.echo(Expr::url_for("category", Expr::field("categories", "url"))))
	})
}

fn comments(compiler: &mut TagCompiler) -> Result<()> {
	compiler.add_block_tag("Comments", |tag, content| {
		let mut params = literal_params(tag, &["order"]);
		params.insert("post_id".to_string(), Expr::field("posts", "id"));
		Ok(Code::each(
			LoopSource::Provider {
				kind: RecordKind::Comments,
				params,
			},
			"comments",
			content,
		))
	})?;
	header_footer(compiler, "Comments")?;

	field_tag(compiler, "CommentAuthor", "comments", "author")?;
	field_tag(compiler, "CommentContent", "comments", "content")?;
	date_tag(compiler, "CommentDate", "comments", "date", None)?;
	compiler.add_value_tag("CommentIfOdd", |tag| {
		let ret = tag.attr("return").unwrap_or("odd");
		let odd = Cond::LoopPosition {
			start: 0,
			length: None,
			even: Some(false),
			modulo: None,
		};
		Ok(Code::when(odd, Code::text(ret)))
	})
}

fn archives(compiler: &mut TagCompiler) -> Result<()> {
	compiler.add_block_tag("Archives", |tag, content| {
		let params = literal_params(tag, &["category", "lang", "order"]);
		Ok(Code::each(
			LoopSource::Provider {
				kind: RecordKind::Dates,
				params,
			},
			"dates",
			content,
		))
	})?;
	header_footer(compiler, "Archives")?;

	date_tag(compiler, "ArchiveDate", "dates", "date", Some("%B %Y"))?;
	field_tag(compiler, "ArchiveEntriesCount", "dates", "count")?;
	compiler.add_value_tag("ArchiveURL", |tag| {
		let month = Expr::Date {
			expr: Box::new(Expr::field("dates", "date")),
			format: Some("%Y/%m".to_string()),
		};
		Ok(tag.echo(Expr::url_for("archive", month)))
	})
}

fn languages(compiler: &mut TagCompiler) -> Result<()> {
	compiler.add_block_tag("Languages", |tag, content| {
		let params = literal_params(tag, &["order"]);
		Ok(Code::each(
			LoopSource::Provider {
				kind: RecordKind::Langs,
				params,
			},
			"langs",
			content,
		))
	})?;
	field_tag(compiler, "LanguageCode", "langs", "code")?;
	field_tag(compiler, "LanguageEntriesCount", "langs", "count")?;
	compiler.add_value_tag("LanguageURL", |tag| {
		Ok(tag.echo(Expr::url_for("lang", Expr::field("langs", "code"))))
	})
}

#[cfg(test)]
mod tests {
	use crate::code::{Expr, Instr, LoopSource};
	use crate::compiler::TagCompiler;
	use crate::provider::RecordKind;
	use rstest::rstest;

	#[rstest]
	#[case("Categories", RecordKind::Categories, "categories")]
	#[case("Comments", RecordKind::Comments, "comments")]
	#[case("Archives", RecordKind::Dates, "dates")]
	#[case("Languages", RecordKind::Langs, "langs")]
	fn test_listing_blocks_query_provider(
		#[case] tag: &str,
		#[case] expected_kind: RecordKind,
		#[case] expected_bind: &str,
	) {
		let compiler = TagCompiler::with_builtin_tags().unwrap();
		let code = compiler
			.compile("t", &format!("<tag:{tag}>x</tag:{tag}>"))
			.unwrap();
		let Instr::Loop {
			source: LoopSource::Provider { kind, .. },
			bind,
			..
		} = &code.instrs()[0]
		else {
			panic!("expected provider loop");
		};
		assert_eq!(*kind, expected_kind);
		assert_eq!(bind, expected_bind);
	}

	#[rstest]
	fn test_comments_bound_to_current_post() {
		let compiler = TagCompiler::with_builtin_tags().unwrap();
		let code = compiler.compile("t", "<tag:Comments>x</tag:Comments>").unwrap();
		let Instr::Loop {
			source: LoopSource::Provider { params, .. },
			..
		} = &code.instrs()[0]
		else {
			panic!("expected provider loop");
		};
		assert_eq!(params["post_id"], Expr::field("posts", "id"));
	}
}
