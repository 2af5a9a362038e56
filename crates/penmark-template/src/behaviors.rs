//! Typed interception points for compilation and filtering
//!
//! Third parties implement [`TemplateBehavior`], overriding only the hooks they
//! care about, and register the implementation on a [`Behaviors`] list. Hooks
//! run in registration order.

use crate::code::Code;
use crate::compiler::TagInvocation;
use crate::filters::{FilterName, FilterSpec};
use std::fmt;
use std::sync::Arc;

/// Result of a content-filter interceptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterOutcome {
	/// The interceptor did nothing
	Unhandled,
	/// The interceptor changed the value; the built-in filter still runs
	Continue,
	/// The interceptor fully handled this filter; skip the built-in and any
	/// later interceptor for this filter name
	Stop,
}

/// Extension points of the template pipeline
///
/// Every method has a no-op default.
pub trait TemplateBehavior: Send + Sync {
	/// Sees the raw value before any filter runs
	fn before_filter(&self, _tag: &str, _value: &mut String) {}

	/// Called for every enabled filter, before its built-in transform
	fn content_filter(
		&self,
		_tag: &str,
		_filter: FilterName,
		_value: &mut String,
		_spec: &FilterSpec,
	) -> FilterOutcome {
		FilterOutcome::Unhandled
	}

	/// Sees the final value after every filter ran
	fn after_filter(&self, _tag: &str, _value: &mut String) {}

	/// Code placed before a compiled block tag
	fn before_block_compile(&self, _tag: &TagInvocation) -> Option<Code> {
		None
	}

	/// Rewrites the compiled content of a block before its handler sees it
	fn inside_block_compile(&self, _tag: &TagInvocation, _content: &mut Code) {}

	/// Code placed after a compiled block tag
	fn after_block_compile(&self, _tag: &TagInvocation) -> Option<Code> {
		None
	}

	/// Code placed before a compiled value tag
	fn before_value_compile(&self, _tag: &TagInvocation) -> Option<Code> {
		None
	}

	/// Code placed after a compiled value tag
	fn after_value_compile(&self, _tag: &TagInvocation) -> Option<Code> {
		None
	}
}

/// Ordered list of registered behaviors
#[derive(Clone, Default)]
pub struct Behaviors {
	list: Vec<Arc<dyn TemplateBehavior>>,
}

impl fmt::Debug for Behaviors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Behaviors")
			.field("count", &self.list.len())
			.finish()
	}
}

impl Behaviors {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a behavior; it runs after every behavior already registered
	pub fn push(&mut self, behavior: Arc<dyn TemplateBehavior>) {
		self.list.push(behavior);
	}

	pub fn len(&self) -> usize {
		self.list.len()
	}

	pub fn is_empty(&self) -> bool {
		self.list.is_empty()
	}

	pub(crate) fn before_filter(&self, tag: &str, value: &mut String) {
		for b in &self.list {
			b.before_filter(tag, value);
		}
	}

	pub(crate) fn content_filter(
		&self,
		tag: &str,
		filter: FilterName,
		value: &mut String,
		spec: &FilterSpec,
	) -> FilterOutcome {
		let mut outcome = FilterOutcome::Unhandled;
		for b in &self.list {
			outcome = outcome.max(b.content_filter(tag, filter, value, spec));
			if outcome == FilterOutcome::Stop {
				break;
			}
		}
		outcome
	}

	pub(crate) fn after_filter(&self, tag: &str, value: &mut String) {
		for b in &self.list {
			b.after_filter(tag, value);
		}
	}

	pub(crate) fn before_block(&self, tag: &TagInvocation) -> Code {
		self.collect(|b| b.before_block_compile(tag))
	}

	pub(crate) fn inside_block(&self, tag: &TagInvocation, content: &mut Code) {
		for b in &self.list {
			b.inside_block_compile(tag, content);
		}
	}

	pub(crate) fn after_block(&self, tag: &TagInvocation) -> Code {
		self.collect(|b| b.after_block_compile(tag))
	}

	pub(crate) fn before_value(&self, tag: &TagInvocation) -> Code {
		self.collect(|b| b.before_value_compile(tag))
	}

	pub(crate) fn after_value(&self, tag: &TagInvocation) -> Code {
		self.collect(|b| b.after_value_compile(tag))
	}

	fn collect(&self, hook: impl Fn(&dyn TemplateBehavior) -> Option<Code>) -> Code {
		let mut code = Code::new();
		for b in &self.list {
			if let Some(extra) = hook(b.as_ref()) {
				code.extend(extra);
			}
		}
		code
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	struct Upper;
	impl TemplateBehavior for Upper {
		fn content_filter(
			&self,
			_tag: &str,
			_filter: FilterName,
			value: &mut String,
			_spec: &FilterSpec,
		) -> FilterOutcome {
			*value = value.to_uppercase();
			FilterOutcome::Stop
		}
	}

	struct Suffix;
	impl TemplateBehavior for Suffix {
		fn content_filter(
			&self,
			_tag: &str,
			_filter: FilterName,
			value: &mut String,
			_spec: &FilterSpec,
		) -> FilterOutcome {
			value.push('+');
			FilterOutcome::Continue
		}
	}

	#[rstest]
	fn test_stop_hides_filter_from_later_behaviors() {
		let mut behaviors = Behaviors::new();
		behaviors.push(Arc::new(Upper));
		behaviors.push(Arc::new(Suffix));

		let mut value = "a".to_string();
		let outcome = behaviors.content_filter(
			"T",
			FilterName::LowerCase,
			&mut value,
			&FilterSpec::default(),
		);
		assert_eq!(outcome, FilterOutcome::Stop);
		assert_eq!(value, "A");
	}

	#[rstest]
	fn test_continue_runs_every_behavior() {
		let mut behaviors = Behaviors::new();
		behaviors.push(Arc::new(Suffix));
		behaviors.push(Arc::new(Suffix));

		let mut value = "a".to_string();
		let outcome = behaviors.content_filter(
			"T",
			FilterName::LowerCase,
			&mut value,
			&FilterSpec::default(),
		);
		assert_eq!(outcome, FilterOutcome::Continue);
		assert_eq!(value, "a++");
	}

	#[rstest]
	fn test_empty_list() {
		let behaviors = Behaviors::new();
		assert!(behaviors.is_empty());
		let inv = TagInvocation::new("BlogName");
		assert!(behaviors.before_value(&inv).is_empty());
	}
}
