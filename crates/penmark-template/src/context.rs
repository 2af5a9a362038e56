//! Per-render context stack
//!
//! Every variable name maps to a stack of values, so a nested block can shadow
//! a variable and restore it on exit. Pushing a record set also pushes it onto
//! the current-iterator stack, which is what position queries such as
//! [`Context::loop_position`] look at. Pushing [`Value::Absent`] pops.
//!
//! ```
//! use penmark_template::context::{Context, Value};
//! use penmark_template::record::RecordSet;
//! use serde_json::json;
//! use std::rc::Rc;
//!
//! let mut ctx = Context::new();
//! let posts = Rc::new(RecordSet::from_values(vec![json!({"title": "a"})]));
//!
//! ctx.push("posts", Value::Records(posts));
//! assert_eq!(ctx.loop_depth(), 1);
//! ctx.push("posts", Value::Absent);
//! assert_eq!(ctx.loop_depth(), 0);
//! assert!(!ctx.exists("posts"));
//! ```

use crate::record::RecordSet;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// Shared handle to a record set
pub type RecordSetHandle = Rc<RecordSet>;

/// A context variable value
#[derive(Debug, Clone, Default)]
pub enum Value {
	Scalar(String),
	Records(RecordSetHandle),
	#[default]
	Absent,
}

impl Value {
	pub fn is_records(&self) -> bool {
		matches!(self, Value::Records(_))
	}

	/// Text form: scalars as-is, everything else empty
	pub fn as_text(&self) -> &str {
		match self {
			Value::Scalar(s) => s,
			_ => "",
		}
	}

	pub fn as_records(&self) -> Option<&RecordSetHandle> {
		match self {
			Value::Records(rs) => Some(rs),
			_ => None,
		}
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::Scalar(s)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::Scalar(s.to_string())
	}
}

impl From<RecordSet> for Value {
	fn from(rs: RecordSet) -> Self {
		Value::Records(Rc::new(rs))
	}
}

/// Variable stacks plus the request state a render needs
#[derive(Debug, Default)]
pub struct Context {
	vars: HashMap<String, Vec<Value>>,
	loops: Vec<RecordSetHandle>,
	page: u32,
	page_base: String,
	dependencies: Vec<PathBuf>,
	content_type: Option<String>,
	absent: Value,
}

impl Context {
	pub fn new() -> Self {
		Self::default()
	}

	/// Push `value` onto `name`'s stack, or pop it when `value` is absent
	pub fn push(&mut self, name: &str, value: Value) {
		if let Value::Absent = value {
			self.pop(name);
			return;
		}
		if let Value::Records(rs) = &value {
			self.loops.push(Rc::clone(rs));
		}
		self.vars.entry(name.to_string()).or_default().push(value);
	}

	/// Pop the top of `name`'s stack
	///
	/// The iterator slot is popped only when the removed value was a record set.
	pub fn pop(&mut self, name: &str) -> Option<Value> {
		let stack = self.vars.get_mut(name)?;
		let value = stack.pop()?;
		if stack.is_empty() {
			self.vars.remove(name);
		}
		if value.is_records() {
			self.loops.pop();
		}
		Some(value)
	}

	/// Top of `name`'s stack, [`Value::Absent`] when nothing is pushed
	pub fn get(&self, name: &str) -> &Value {
		self.vars
			.get(name)
			.and_then(|stack| stack.last())
			.unwrap_or(&self.absent)
	}

	pub fn exists(&self, name: &str) -> bool {
		self.vars.get(name).is_some_and(|stack| !stack.is_empty())
	}

	/// The innermost pushed record set
	pub fn current_loop(&self) -> Option<&RecordSetHandle> {
		self.loops.last()
	}

	/// Depth of the iterator slot
	pub fn loop_depth(&self) -> usize {
		self.loops.len()
	}

	/// Position test against the current iterator
	///
	/// `start` and `length` follow slice conventions: a negative `start` counts
	/// from the end, a negative `length` ends the window that many rows before
	/// the end. `even` selects 1-based even (`true`) or odd (`false`)
	/// positions. `modulo` keeps indices divisible by it and is ignored unless
	/// positive. Without a current iterator the answer is false.
	///
	/// # Examples
	///
	/// ```
	/// use penmark_template::context::{Context, Value};
	/// use penmark_template::record::RecordSet;
	/// use serde_json::json;
	///
	/// let mut ctx = Context::new();
	/// assert!(!ctx.loop_position(0, None, None, None));
	///
	/// ctx.push("rows", RecordSet::from_values(vec![json!({}); 10]).into());
	/// let rs = ctx.current_loop().unwrap().clone();
	/// let mut hits = Vec::new();
	/// while rs.fetch() {
	///     if ctx.loop_position(-3, None, None, None) {
	///         hits.push(rs.index());
	///     }
	/// }
	/// assert_eq!(hits, vec![7, 8, 9]);
	/// ```
	pub fn loop_position(
		&self,
		start: i64,
		length: Option<i64>,
		even: Option<bool>,
		modulo: Option<i64>,
	) -> bool {
		let Some(rs) = self.current_loop() else {
			return false;
		};
		let index = rs.index() as i64;
		let size = rs.count() as i64;

		let from = if start >= 0 { start } else { size + start };
		if index < from {
			return false;
		}
		if let Some(length) = length {
			let to = if length >= 0 {
				from.saturating_add(length)
			} else {
				size + length
			};
			if index >= to {
				return false;
			}
		}
		if let Some(even) = even
			&& (index % 2 == 1) != even
		{
			return false;
		}
		if let Some(modulo) = modulo
			&& modulo > 0
			&& index % modulo != 0
		{
			return false;
		}
		true
	}

	/// Requested page, 0 when unspecified
	pub fn page(&self) -> u32 {
		self.page
	}

	pub fn set_page(&mut self, page: u32) {
		self.page = page;
	}

	/// Absolute URL of the current listing without its page suffix
	pub fn page_base(&self) -> &str {
		&self.page_base
	}

	pub fn set_page_base(&mut self, base: impl Into<String>) {
		self.page_base = base.into();
	}

	/// Declare a file whose mtime the HTTP validators must account for
	pub fn add_dependency(&mut self, path: impl Into<PathBuf>) {
		self.dependencies.push(path.into());
	}

	pub fn dependencies(&self) -> &[PathBuf] {
		&self.dependencies
	}

	/// Override the content type derived from the template extension
	pub fn set_content_type(&mut self, content_type: impl Into<String>) {
		self.content_type = Some(content_type.into());
	}

	pub fn content_type(&self) -> Option<&str> {
		self.content_type.as_deref()
	}
}
