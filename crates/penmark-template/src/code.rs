//! Compiled units
//!
//! The tag compiler emits a tree of [`Instr`]uctions rather than source code.
//! The tree serializes to a stable JSON text: the same template source always
//! produces byte-identical output, which is what the unit cache stores and
//! compares.

use crate::filters::FilterSpec;
use crate::provider::RecordKind;
use penmark_exception::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An executable compiled unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Code(Vec<Instr>);

impl Code {
	pub fn new() -> Self {
		Self::default()
	}

	/// Literal output
	pub fn text(text: impl Into<String>) -> Self {
		let mut code = Self::new();
		code.push(Instr::Text(text.into()));
		code
	}

	/// Conditional around `body`; `body` may contain one top-level `Else`
	pub fn when(cond: Cond, body: Code) -> Self {
		Instr::If {
			cond,
			body: body.0,
		}
		.into()
	}

	/// Loop binding each row of `source` to `bind`
	pub fn each(source: LoopSource, bind: impl Into<String>, body: Code) -> Self {
		Instr::Loop {
			source,
			bind: bind.into(),
			body: body.0,
		}
		.into()
	}

	/// Append an instruction, merging adjacent literal text
	pub fn push(&mut self, instr: Instr) {
		if let Instr::Text(text) = &instr {
			if text.is_empty() {
				return;
			}
			if let Some(Instr::Text(last)) = self.0.last_mut() {
				last.push_str(text);
				return;
			}
		}
		self.0.push(instr);
	}

	pub fn extend(&mut self, other: Code) {
		for instr in other.0 {
			self.push(instr);
		}
	}

	pub fn instrs(&self) -> &[Instr] {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Stable serialized form
	///
	/// # Examples
	///
	/// ```
	/// use penmark_template::code::Code;
	///
	/// let code = Code::text("hi");
	/// assert_eq!(code.to_json().unwrap(), r#"[{"text":"hi"}]"#);
	/// assert_eq!(Code::from_json(&code.to_json().unwrap()).unwrap(), code);
	/// ```
	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string(self)?)
	}

	pub fn from_json(json: &str) -> Result<Self> {
		Ok(serde_json::from_str(json)?)
	}
}

impl From<Instr> for Code {
	fn from(instr: Instr) -> Self {
		let mut code = Self::new();
		code.push(instr);
		code
	}
}

/// One instruction of a compiled unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instr {
	/// Literal output
	Text(String),
	/// Evaluate, run through the filter pipeline, output
	Echo {
		expr: Expr,
		#[serde(default, skip_serializing_if = "FilterSpec::is_empty")]
		filters: FilterSpec,
		/// Tag that produced the value, passed to filter interceptors
		tag: String,
	},
	/// Run the part of `body` before the first top-level `Else` when `cond`
	/// holds, the part after it otherwise
	If { cond: Cond, body: Vec<Instr> },
	/// Branch separator inside an `If` body
	Else,
	/// Bind every row of `source` to `bind` in turn and run `body`
	Loop {
		source: LoopSource,
		bind: String,
		body: Vec<Instr>,
	},
}

/// Where a loop gets its rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopSource {
	/// A record set already pushed under this name
	Context(String),
	/// A fresh query; parameter values are evaluated at render time
	Provider {
		kind: RecordKind,
		params: BTreeMap<String, Expr>,
	},
}

/// A value computed at render time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
	Literal(String),
	/// Scalar context variable
	Var(String),
	/// Field of the current row of a record-set variable
	Field { var: String, field: String },
	/// Settings store lookup by key path
	Setting(String),
	/// Requested page, 1 when unspecified
	PageNumber,
	Concat(Vec<Expr>),
	/// Reformat a timestamp; without `format` the `date_format` setting is used
	Date {
		expr: Box<Expr>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		format: Option<String>,
	},
	/// Public URL of a route
	UrlFor { kind: String, arg: Box<Expr> },
	/// Number of pages of a paged record-set variable
	PageCount { var: String },
	/// URL of the page `offset` pages away from the current one
	PageUrl { offset: i64 },
}

impl Expr {
	pub fn field(var: &str, field: &str) -> Self {
		Expr::Field {
			var: var.to_string(),
			field: field.to_string(),
		}
	}

	pub fn url_for(kind: &str, arg: Expr) -> Self {
		Expr::UrlFor {
			kind: kind.to_string(),
			arg: Box::new(arg),
		}
	}
}

/// A render-time test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cond {
	/// Variable has at least one pushed value
	Exists(String),
	/// Value is non-empty and not `"0"`
	Truthy(Expr),
	Equals(Expr, Expr),
	/// See `Context::loop_position`
	LoopPosition {
		start: i64,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		length: Option<i64>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		even: Option<bool>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		modulo: Option<i64>,
	},
	/// Current iterator is on its first row
	IsFirst,
	/// Current iterator is on its last row
	IsLast,
	HasNextPage { var: String },
	HasPreviousPage,
	MultiplePages { var: String },
	/// Filtering `expr` with `filters` shortens it compared to the same
	/// filters without truncation
	ContentCut { expr: Expr, filters: FilterSpec },
	Not(Box<Cond>),
	All(Vec<Cond>),
	Any(Vec<Cond>),
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_adjacent_text_merges() {
		let mut code = Code::text("a");
		code.push(Instr::Text("b".into()));
		code.push(Instr::Text(String::new()));
		code.extend(Code::text("c"));
		assert_eq!(code.instrs(), &[Instr::Text("abc".into())]);
	}

	#[rstest]
	fn test_serialization_is_stable() {
		let mut params = BTreeMap::new();
		params.insert("limit".to_string(), Expr::Literal("3".into()));
		params.insert("category".to_string(), Expr::Var("cat".into()));
		let code = Code::each(
			LoopSource::Provider {
				kind: RecordKind::Posts,
				params,
			},
			"posts",
			Instr::Echo {
				expr: Expr::field("posts", "title"),
				filters: FilterSpec::default(),
				tag: "EntryTitle".into(),
			}
			.into(),
		);

		let json = code.to_json().unwrap();
		assert_eq!(
			json,
			concat!(
				r#"[{"loop":{"source":{"provider":{"kind":"posts","params":"#,
				r#"{"category":{"var":"cat"},"limit":{"literal":"3"}}}},"bind":"posts","#,
				r#""body":[{"echo":{"expr":{"field":{"var":"posts","field":"title"}},"tag":"EntryTitle"}}]}}]"#
			)
		);
		assert_eq!(Code::from_json(&json).unwrap(), code);
	}
}
