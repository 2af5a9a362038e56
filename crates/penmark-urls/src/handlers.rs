//! Built-in blog routes
//!
//! | Kind | Pattern | Template |
//! |---|---|---|
//! | `post` | `^post/(.+)$` | `post.html` |
//! | `category` | `^category/(.+)$` | `category.html` |
//! | `archive` | `^archive/(\d{4})/(\d{2})$` | `archive.html` |
//! | `lang` | `^lang/([a-zA-Z]{2}(?:-[a-zA-Z]{2})?)$` | `home.html` |
//! | `feed` | `feed` | `atom.xml`, `rss2.xml`, `comments-atom.xml`, `comments-rss2.xml` |
//! | default | anything else | `home.html` |
//!
//! Listing handlers push a paged `posts` set and point pagination links at
//! their own URL.

use crate::dispatch::RouteContext;
use crate::pattern::RouteMatch;
use crate::response::Response;
use crate::router::Router;
use penmark_exception::{Error, Result};
use penmark_template::provider::QueryParams;

/// Register the standard route table, specific patterns first
pub fn register_blog_routes(router: &mut Router) -> Result<()> {
	router.register("post", r"^post/(.+)$", "post", post)?;
	router.register("category", r"^category/(.+)$", "category", category)?;
	router.register("archive", r"^archive/(\d{4})/(\d{2})$", "archive", archive)?;
	router.register("lang", r"^lang/([a-zA-Z]{2}(?:-[a-zA-Z]{2})?)$", "lang", lang)?;
	router.register("feed", "feed", "feed", feed)?;
	router.register_default(home);
	Ok(())
}

/// Home page; a non-empty remainder cannot be interpreted
pub fn home(ctx: &mut RouteContext<'_>, matched: &RouteMatch) -> Result<Response> {
	if !matched.args.is_empty() {
		return Err(Error::NotFound(matched.args.clone()));
	}
	push_listing(ctx, QueryParams::new())?;
	ctx.render("home.html")
}

pub fn post(ctx: &mut RouteContext<'_>, matched: &RouteMatch) -> Result<Response> {
	let url = matched.args.as_str();
	let posts = ctx.provider().posts(&QueryParams::new().with("url", url))?;
	if posts.is_empty() {
		return Err(Error::NotFound(format!("post/{url}")));
	}
	posts.fetch();
	let title = posts.field_text("title");
	posts.rewind();

	ctx.push("page_title", title);
	ctx.push("posts", posts);
	ctx.render("post.html")
}

pub fn category(ctx: &mut RouteContext<'_>, matched: &RouteMatch) -> Result<Response> {
	let url = matched.args.as_str();
	let categories = ctx
		.provider()
		.categories(&QueryParams::new().with("url", url))?;
	if categories.is_empty() {
		return Err(Error::NotFound(format!("category/{url}")));
	}
	categories.fetch();
	let title = categories.field_text("title");
	categories.rewind();

	let base = ctx.router().url_for("category", url);
	ctx.context.set_page_base(base);
	ctx.push("page_title", title);
	ctx.push("category", url);
	push_listing(ctx, QueryParams::new().with("category", url))?;
	ctx.render("category.html")
}

pub fn archive(ctx: &mut RouteContext<'_>, matched: &RouteMatch) -> Result<Response> {
	let (Some(year), Some(month)) = (matched.group(1), matched.group(2)) else {
		return Err(Error::NotFound(format!("archive/{}", matched.args)));
	};
	if !matches!(month.parse::<u8>(), Ok(1..=12)) {
		return Err(Error::NotFound(format!("archive/{year}/{month}")));
	}
	let (year, month) = (year.to_string(), month.to_string());

	let base = ctx.router().url_for("archive", &format!("{year}/{month}"));
	ctx.context.set_page_base(base);
	ctx.push("page_title", format!("{year}-{month}"));
	ctx.push("year", year.as_str());
	ctx.push("month", month.as_str());
	let found = push_listing(ctx, QueryParams::new().with("year", year).with("month", month))?;
	if found == 0 {
		return Err(Error::NotFound("empty archive".to_string()));
	}
	ctx.render("archive.html")
}

pub fn lang(ctx: &mut RouteContext<'_>, matched: &RouteMatch) -> Result<Response> {
	let code = matched.args.to_ascii_lowercase();
	let base = ctx.router().url_for("lang", &code);
	ctx.context.set_page_base(base);
	ctx.push("lang", code.as_str());
	let found = push_listing(ctx, QueryParams::new().with("lang", code.as_str()))?;
	if found == 0 {
		return Err(Error::NotFound(format!("lang/{code}")));
	}
	ctx.render("home.html")
}

/// Feeds: `feed/atom`, `feed/rss2`, `feed/comments/atom`, `feed/comments/rss2`
///
/// Every feed gets the latest posts; comment feeds walk their comments.
pub fn feed(ctx: &mut RouteContext<'_>, matched: &RouteMatch) -> Result<Response> {
	let args = if matched.args.is_empty() {
		"atom"
	} else {
		matched.args.as_str()
	};
	let (comments, kind) = match args.strip_prefix("comments/") {
		Some(kind) => (true, kind),
		None => (false, args),
	};
	let content_type = match kind {
		"atom" => "application/atom+xml; charset=utf-8",
		"rss2" => "application/rss+xml; charset=utf-8",
		_ => return Err(Error::NotFound(format!("feed/{args}"))),
	};
	if ctx.page > 1 {
		return Err(Error::NotFound(format!("feed/{args} page {}", ctx.page)));
	}

	let limit = ctx.blog().posts_per_page.to_string();
	let rows = ctx
		.provider()
		.posts(&QueryParams::new().with("limit", limit).with("page", "1"))?;
	ctx.push("posts", rows);
	let template = if comments {
		format!("comments-{kind}.xml")
	} else {
		format!("{kind}.xml")
	};
	ctx.push("feed_type", kind);
	ctx.content_type = Some(content_type.to_string());
	ctx.render(&template)
}

/// Push the current page of posts matching `params`; returns the page's row count
///
/// Pages past the end are not found.
fn push_listing(ctx: &mut RouteContext<'_>, mut params: QueryParams) -> Result<usize> {
	let page = ctx.page.max(1);
	params.set("limit", ctx.blog().posts_per_page.to_string());
	params.set("page", page.to_string());
	let posts = ctx.provider().posts(&params)?;
	if page > 1 && posts.is_empty() {
		return Err(Error::NotFound(format!("page {page}")));
	}
	let count = posts.count();
	ctx.push("posts", posts);
	Ok(count)
}
