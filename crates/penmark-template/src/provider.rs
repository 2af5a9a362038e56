//! Data provider contract
//!
//! Record storage lives outside the pipeline. Compiled templates and route
//! handlers reach it only through [`DataProvider`].

use crate::record::RecordSet;
use penmark_exception::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

/// Kind of record set a provider can return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
	Posts,
	Comments,
	Categories,
	Dates,
	Langs,
}

impl fmt::Display for RecordKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			RecordKind::Posts => "posts",
			RecordKind::Comments => "comments",
			RecordKind::Categories => "categories",
			RecordKind::Dates => "dates",
			RecordKind::Langs => "langs",
		})
	}
}

/// Query parameters passed to the provider
///
/// Recognized keys: `url`, `post_id`, `category`, `lang`, `year`, `month`,
/// `limit`, `page`, `order`. Providers ignore keys they do not know.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style [`set`](Self::set)
	///
	/// # Examples
	///
	/// ```
	/// use penmark_template::provider::QueryParams;
	///
	/// let params = QueryParams::new().with("limit", "5").with("lang", "");
	/// assert_eq!(params.get_usize("limit"), Some(5));
	/// assert_eq!(params.get("lang"), None);
	/// ```
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.set(key, value);
		self
	}

	/// Set a parameter; empty values remove it
	pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
		let key = key.into();
		let value = value.into();
		if value.is_empty() {
			self.0.remove(&key);
		} else {
			self.0.insert(key, value);
		}
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	pub fn get_usize(&self, key: &str) -> Option<usize> {
		self.get(key)?.trim().parse().ok()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}

/// Source of blog records
pub trait DataProvider: Send + Sync {
	fn posts(&self, params: &QueryParams) -> Result<RecordSet>;

	fn comments(&self, params: &QueryParams) -> Result<RecordSet>;

	fn categories(&self, params: &QueryParams) -> Result<RecordSet>;

	/// Archive months, one row per month with posts
	fn dates(&self, params: &QueryParams) -> Result<RecordSet>;

	fn langs(&self, params: &QueryParams) -> Result<RecordSet>;

	/// Last time any record changed; used as an HTTP cache dependency
	fn last_modified(&self) -> Option<SystemTime> {
		None
	}

	/// Dispatch by kind
	fn records(&self, kind: RecordKind, params: &QueryParams) -> Result<RecordSet> {
		match kind {
			RecordKind::Posts => self.posts(params),
			RecordKind::Comments => self.comments(params),
			RecordKind::Categories => self.categories(params),
			RecordKind::Dates => self.dates(params),
			RecordKind::Langs => self.langs(params),
		}
	}
}
