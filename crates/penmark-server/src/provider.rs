//! JSON-file data provider
//!
//! The data file holds three arrays:
//!
//! ```json
//! {
//!   "posts": [{"id": 1, "url": "hello", "title": "Hello", "content": "...",
//!              "date": "2024-03-05 10:00:00", "category": "rust", "lang": "en"}],
//!   "categories": [{"url": "rust", "title": "Rust", "description": ""}],
//!   "comments": [{"post_id": 1, "author": "ann", "content": "...", "date": "2024-03-06"}]
//! }
//! ```
//!
//! On load every post gains `category_title` and `comment_count`, and every
//! category gains `count`.

use penmark_exception::{Error, Result};
use penmark_template::provider::{DataProvider, QueryParams};
use penmark_template::record::{RecordSet, Row};
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone, Default, Deserialize)]
struct BlogData {
	#[serde(default)]
	posts: Vec<Row>,
	#[serde(default)]
	categories: Vec<Row>,
	#[serde(default)]
	comments: Vec<Row>,
}

/// Serves blog records from an in-memory copy of a JSON document
#[derive(Debug, Clone, Default)]
pub struct JsonDataProvider {
	data: BlogData,
	modified: Option<SystemTime>,
}

impl JsonDataProvider {
	/// Load a data file; its mtime becomes [`DataProvider::last_modified`]
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let raw = fs::read(path)?;
		let modified = fs::metadata(path).and_then(|m| m.modified()).ok();
		let mut provider = Self::from_value(serde_json::from_slice(&raw)?)?;
		provider.modified = modified;
		tracing::info!(
			path = %path.display(),
			posts = provider.data.posts.len(),
			categories = provider.data.categories.len(),
			comments = provider.data.comments.len(),
			"loaded blog data"
		);
		Ok(provider)
	}

	/// Build from an already parsed document
	///
	/// # Examples
	///
	/// ```
	/// use penmark_server::JsonDataProvider;
	/// use penmark_template::provider::{DataProvider, QueryParams};
	/// use serde_json::json;
	///
	/// let provider = JsonDataProvider::from_value(json!({
	///     "posts": [{"id": 1, "url": "hello", "date": "2024-03-05"}],
	/// }))
	/// .unwrap();
	/// let posts = provider.posts(&QueryParams::new().with("url", "hello")).unwrap();
	/// assert_eq!(posts.count(), 1);
	/// ```
	pub fn from_value(value: Value) -> Result<Self> {
		if !value.is_object() {
			return Err(Error::Config("blog data must be a JSON object".to_string()));
		}
		let mut data: BlogData = serde_json::from_value(value)?;
		enrich(&mut data);
		Ok(Self {
			data,
			modified: None,
		})
	}

	pub fn with_modified(mut self, modified: SystemTime) -> Self {
		self.modified = Some(modified);
		self
	}
}

fn enrich(data: &mut BlogData) {
	let titles: BTreeMap<String, Value> = data
		.categories
		.iter()
		.filter_map(|c| Some((text(c.get("url")?), c.get("title")?.clone())))
		.collect();
	let mut comment_counts: BTreeMap<String, u64> = BTreeMap::new();
	for comment in &data.comments {
		*comment_counts.entry(text_of(comment, "post_id")).or_default() += 1;
	}

	let mut post_counts: BTreeMap<String, u64> = BTreeMap::new();
	for post in &mut data.posts {
		let category = text_of(post, "category");
		if let Some(title) = titles.get(&category) {
			post.insert("category_title".to_string(), title.clone());
		}
		if !category.is_empty() {
			*post_counts.entry(category).or_default() += 1;
		}
		let comments = comment_counts.get(&text_of(post, "id")).copied().unwrap_or(0);
		post.insert("comment_count".to_string(), Value::from(comments));
	}
	for category in &mut data.categories {
		let count = post_counts.get(&text_of(category, "url")).copied().unwrap_or(0);
		category.insert("count".to_string(), Value::from(count));
	}
}

impl DataProvider for JsonDataProvider {
	fn posts(&self, params: &QueryParams) -> Result<RecordSet> {
		let mut rows: Vec<Row> = self
			.data
			.posts
			.iter()
			.filter(|post| matches_post(post, params))
			.cloned()
			.collect();
		sort_rows(&mut rows, params.get("order").unwrap_or("date desc"));
		Ok(paginate(rows, params))
	}

	fn comments(&self, params: &QueryParams) -> Result<RecordSet> {
		let mut rows: Vec<Row> = self
			.data
			.comments
			.iter()
			.filter(|c| params.get("post_id").is_none_or(|id| text_of(c, "post_id") == id))
			.cloned()
			.collect();
		sort_rows(&mut rows, params.get("order").unwrap_or("date asc"));
		Ok(paginate(rows, params))
	}

	fn categories(&self, params: &QueryParams) -> Result<RecordSet> {
		let mut rows: Vec<Row> = self
			.data
			.categories
			.iter()
			.filter(|c| params.get("url").is_none_or(|url| text_of(c, "url") == url))
			.cloned()
			.collect();
		if let Some(order) = params.get("order") {
			sort_rows(&mut rows, order);
		}
		Ok(paginate(rows, params))
	}

	/// One row per month with posts: `{"date": "YYYY-MM-01", "count": n}`
	fn dates(&self, params: &QueryParams) -> Result<RecordSet> {
		let mut months: BTreeMap<String, u64> = BTreeMap::new();
		for post in self.data.posts.iter().filter(|post| matches_post(post, params)) {
			if let Some(month) = text_of(post, "date").get(..7) {
				*months.entry(month.to_string()).or_default() += 1;
			}
		}
		let mut rows: Vec<Row> = months
			.into_iter()
			.map(|(month, count)| {
				let mut row = Row::new();
				row.insert("date".to_string(), Value::from(format!("{month}-01")));
				row.insert("count".to_string(), Value::from(count));
				row
			})
			.collect();
		sort_rows(&mut rows, params.get("order").unwrap_or("date desc"));
		Ok(paginate(rows, params))
	}

	/// One row per post language: `{"code": "en", "count": n}`
	fn langs(&self, params: &QueryParams) -> Result<RecordSet> {
		let mut langs: BTreeMap<String, u64> = BTreeMap::new();
		for post in &self.data.posts {
			let lang = text_of(post, "lang");
			if !lang.is_empty() {
				*langs.entry(lang.to_ascii_lowercase()).or_default() += 1;
			}
		}
		let mut rows: Vec<Row> = langs
			.into_iter()
			.map(|(code, count)| {
				let mut row = Row::new();
				row.insert("code".to_string(), Value::from(code));
				row.insert("count".to_string(), Value::from(count));
				row
			})
			.collect();
		if let Some(order) = params.get("order") {
			sort_rows(&mut rows, order);
		}
		Ok(paginate(rows, params))
	}

	fn last_modified(&self) -> Option<SystemTime> {
		self.modified
	}
}

fn matches_post(post: &Row, params: &QueryParams) -> bool {
	let field_is = |field: &str, key: &str| params.get(key).is_none_or(|v| text_of(post, field) == v);
	if !(field_is("url", "url") && field_is("id", "post_id") && field_is("category", "category")) {
		return false;
	}
	if let Some(lang) = params.get("lang")
		&& !text_of(post, "lang").eq_ignore_ascii_case(lang)
	{
		return false;
	}
	let date = text_of(post, "date");
	if let Some(year) = params.get("year")
		&& date.get(..4) != Some(year)
	{
		return false;
	}
	if let Some(month) = params.get("month") {
		let Ok(month) = month.parse::<u32>() else {
			return false;
		};
		if date.get(5..7) != Some(format!("{month:02}").as_str()) {
			return false;
		}
	}
	true
}

/// Sort by `"<field> [asc|desc]"`; numbers compare numerically
fn sort_rows(rows: &mut [Row], order: &str) {
	let mut words = order.split_whitespace();
	let Some(field) = words.next() else {
		return;
	};
	let descending = words.next().is_some_and(|d| d.eq_ignore_ascii_case("desc"));
	rows.sort_by(|a, b| {
		let ordering = compare(a.get(field), b.get(field));
		if descending { ordering.reverse() } else { ordering }
	});
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
	match (a.and_then(Value::as_f64), b.and_then(Value::as_f64)) {
		(Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
		_ => text(a.unwrap_or(&Value::Null)).cmp(&text(b.unwrap_or(&Value::Null))),
	}
}

/// Apply `limit`/`page`; a missing or zero limit returns every row
fn paginate(rows: Vec<Row>, params: &QueryParams) -> RecordSet {
	let limit = params.get_usize("limit").unwrap_or(0);
	if limit == 0 {
		return RecordSet::new(rows);
	}
	let page = params.get_usize("page").unwrap_or(1).max(1);
	let total = rows.len();
	let rows = rows
		.into_iter()
		.skip((page - 1).saturating_mul(limit))
		.take(limit)
		.collect();
	RecordSet::new(rows).with_paging(total, limit)
}

fn text_of(row: &Row, field: &str) -> String {
	row.get(field).map(text).unwrap_or_default()
}

fn text(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}
