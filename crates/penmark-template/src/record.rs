//! Ordered record sets with a shared cursor
//!
//! A record set is what the data provider returns for posts, comments,
//! categories, archive dates and languages. Templates walk it with
//! [`RecordSet::fetch`] and query the position with [`RecordSet::index`],
//! [`RecordSet::is_start`] and [`RecordSet::is_end`].
//!
//! Before the first `fetch` the first row is current, so a single-row set
//! pushed by a route handler can be read outside of any loop.

use serde_json::{Map, Value};
use std::cell::Cell;

/// One row: field name to JSON value
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct RecordSet {
	rows: Vec<Row>,
	pos: Cell<usize>,
	fetched: Cell<bool>,
	total: Option<usize>,
	page_size: Option<usize>,
}

impl RecordSet {
	pub fn new(rows: Vec<Row>) -> Self {
		Self {
			rows,
			..Self::default()
		}
	}

	/// Build from JSON values; non-object values are skipped
	///
	/// # Examples
	///
	/// ```
	/// use penmark_template::record::RecordSet;
	/// use serde_json::json;
	///
	/// let rs = RecordSet::from_values(vec![json!({"title": "a"}), json!(3), json!({"title": "b"})]);
	/// assert_eq!(rs.count(), 2);
	/// ```
	pub fn from_values(values: Vec<Value>) -> Self {
		Self::new(
			values
				.into_iter()
				.filter_map(|v| match v {
					Value::Object(map) => Some(map),
					_ => None,
				})
				.collect(),
		)
	}

	/// Record the unpaged row count and the page size used to produce this set
	pub fn with_paging(mut self, total: usize, page_size: usize) -> Self {
		self.total = Some(total);
		self.page_size = Some(page_size);
		self
	}

	/// Advance to the next row
	///
	/// The first call selects the first row. Returns false once the set is
	/// exhausted.
	pub fn fetch(&self) -> bool {
		if !self.fetched.get() {
			self.fetched.set(true);
			self.pos.set(0);
			return !self.rows.is_empty();
		}
		let next = self.pos.get() + 1;
		if next < self.rows.len() {
			self.pos.set(next);
			true
		} else {
			false
		}
	}

	pub fn rewind(&self) {
		self.pos.set(0);
		self.fetched.set(false);
	}

	pub fn count(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	/// 0-based index of the current row
	pub fn index(&self) -> usize {
		self.pos.get()
	}

	pub fn is_start(&self) -> bool {
		self.pos.get() == 0
	}

	pub fn is_end(&self) -> bool {
		self.pos.get() + 1 == self.rows.len()
	}

	/// Row count before paging, or [`count`](Self::count) for unpaged sets
	pub fn total(&self) -> usize {
		self.total.unwrap_or(self.rows.len())
	}

	/// Number of pages the unpaged set spans, at least 1
	pub fn page_count(&self) -> usize {
		match self.page_size {
			Some(size) if size > 0 => self.total().div_ceil(size).max(1),
			_ => 1,
		}
	}

	pub fn row(&self) -> Option<&Row> {
		self.rows.get(self.pos.get())
	}

	pub fn field(&self, name: &str) -> Option<&Value> {
		self.row()?.get(name)
	}

	/// Field of the current row as template text
	///
	/// Strings verbatim, numbers in decimal, `true` as `"1"`; `false`, null,
	/// missing fields, arrays and objects are empty.
	pub fn field_text(&self, name: &str) -> String {
		match self.field(name) {
			Some(Value::String(s)) => s.clone(),
			Some(Value::Number(n)) => n.to_string(),
			Some(Value::Bool(true)) => "1".to_string(),
			_ => String::new(),
		}
	}
}
