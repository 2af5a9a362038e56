//! Tag compiler
//!
//! Turns template markup into a [`Code`] tree. Tags come in two kinds:
//!
//! - **value** tags, written `<tag:Name attr="v"/>`, are replaced by the code
//!   their handler returns;
//! - **block** tags, written `<tag:Name attr="v">...</tag:Name>`, have their
//!   content compiled first and handed to the handler.
//!
//! Names that are not registered pass through as literal text, so themes
//! written for a newer tag library still render.
//!
//! ```
//! use penmark_template::code::{Code, Expr};
//! use penmark_template::compiler::TagCompiler;
//!
//! let mut compiler = TagCompiler::new();
//! compiler
//!     .add_value_tag("Greeting", |tag| Ok(tag.echo(Expr::Literal("hello".into()))))
//!     .unwrap();
//!
//! let code = compiler.compile("inline", "<tag:Greeting upper_case/> <tag:Bogus/>").unwrap();
//! assert_eq!(code.instrs().len(), 2);
//! ```

use crate::behaviors::Behaviors;
use crate::code::{Code, Expr, Instr};
use crate::filters::{FilterSpec, is_truthy};
use crate::parser::{Token, tokenize};
use indexmap::IndexMap;
use penmark_exception::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Tag attributes in declaration order
pub type Attributes = IndexMap<String, String>;

/// What a handler returns; the error text becomes a compile error
pub type TagResult = std::result::Result<Code, String>;

type BlockHandler = Arc<dyn Fn(&TagInvocation, Code) -> TagResult + Send + Sync>;
type ValueHandler = Arc<dyn Fn(&TagInvocation) -> TagResult + Send + Sync>;

/// The tag being compiled, handed to handlers and behaviors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInvocation {
	pub name: String,
	pub attributes: Attributes,
}

impl TagInvocation {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			attributes: Attributes::new(),
		}
	}

	pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.attributes.insert(name.into(), value.into());
		self
	}

	pub fn attr(&self, name: &str) -> Option<&str> {
		self.attributes.get(name).map(String::as_str)
	}

	/// Attribute set to a truthy value
	pub fn flag(&self, name: &str) -> bool {
		self.attr(name).is_some_and(is_truthy)
	}

	/// Integer attribute; present but unparsable is an error
	pub fn int(&self, name: &str) -> std::result::Result<Option<i64>, String> {
		match self.attr(name) {
			None => Ok(None),
			Some(raw) => raw
				.trim()
				.parse()
				.map(Some)
				.map_err(|_| format!("attribute '{name}' must be an integer, got '{raw}'")),
		}
	}

	/// Output `expr` through the filters declared on this tag
	pub fn echo(&self, expr: Expr) -> Code {
		Instr::Echo {
			expr,
			filters: FilterSpec::from_attributes(&self.attributes),
			tag: self.name.clone(),
		}
		.into()
	}
}

/// Registry of tag handlers plus the compile entry point
#[derive(Clone, Default)]
pub struct TagCompiler {
	blocks: HashMap<String, BlockHandler>,
	values: HashMap<String, ValueHandler>,
	behaviors: Behaviors,
}

impl fmt::Debug for TagCompiler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TagCompiler")
			.field("blocks", &self.blocks.len())
			.field("values", &self.values.len())
			.field("behaviors", &self.behaviors)
			.finish()
	}
}

impl TagCompiler {
	/// An empty registry
	pub fn new() -> Self {
		Self::default()
	}

	/// A registry holding the built-in blog tag library
	pub fn with_builtin_tags() -> Result<Self> {
		let mut compiler = Self::new();
		crate::tags::register_builtin(&mut compiler)?;
		Ok(compiler)
	}

	/// Register a block tag
	///
	/// Fails with [`Error::TagConflict`] when `name` is a value tag.
	/// Registering an existing block tag again replaces its handler.
	pub fn add_block_tag<F>(&mut self, name: &str, handler: F) -> Result<()>
	where
		F: Fn(&TagInvocation, Code) -> TagResult + Send + Sync + 'static,
	{
		if self.values.contains_key(name) {
			return Err(Error::TagConflict {
				name: name.to_string(),
				existing: "value",
			});
		}
		self.blocks.insert(name.to_string(), Arc::new(handler));
		Ok(())
	}

	/// Register a value tag
	///
	/// Fails with [`Error::TagConflict`] when `name` is a block tag.
	pub fn add_value_tag<F>(&mut self, name: &str, handler: F) -> Result<()>
	where
		F: Fn(&TagInvocation) -> TagResult + Send + Sync + 'static,
	{
		if self.blocks.contains_key(name) {
			return Err(Error::TagConflict {
				name: name.to_string(),
				existing: "block",
			});
		}
		self.values.insert(name.to_string(), Arc::new(handler));
		Ok(())
	}

	pub fn is_block(&self, name: &str) -> bool {
		self.blocks.contains_key(name)
	}

	pub fn is_value(&self, name: &str) -> bool {
		self.values.contains_key(name)
	}

	pub fn behaviors(&self) -> &Behaviors {
		&self.behaviors
	}

	pub fn behaviors_mut(&mut self) -> &mut Behaviors {
		&mut self.behaviors
	}

	/// Compile `source`; `path` only labels errors
	pub fn compile(&self, path: &str, source: &str) -> Result<Code> {
		let tokens = tokenize(source)
			.map_err(|e| Error::compile(path, source, e.offset, e.message))?;
		let mut pass = Pass {
			compiler: self,
			path,
			source,
			tokens,
			pos: 0,
		};
		let code = pass.sequence(None)?;
		tracing::debug!(template = %path, instructions = code.instrs().len(), "compiled template");
		Ok(code)
	}
}

/// One compilation: the token stream and where we are in it
struct Pass<'c, 's> {
	compiler: &'c TagCompiler,
	path: &'s str,
	source: &'s str,
	tokens: Vec<Token<'s>>,
	pos: usize,
}

impl Pass<'_, '_> {
	fn error(&self, offset: usize, message: impl Into<String>) -> Error {
		Error::compile(self.path, self.source, offset, message)
	}

	/// Compile tokens up to the close tag of `enclosing` (or the end)
	fn sequence(&mut self, enclosing: Option<(&str, usize)>) -> Result<Code> {
		let mut code = Code::new();

		while self.pos < self.tokens.len() {
			let token = self.tokens[self.pos].clone();
			self.pos += 1;

			match token {
				Token::Text(text) => code.push(Instr::Text(text.to_string())),
				Token::Open {
					name,
					attributes,
					self_closing,
					raw,
					offset,
				} => {
					let tag = TagInvocation {
						name: name.to_string(),
						attributes,
					};
					if self.compiler.is_value(name) {
						if !self_closing {
							return Err(self.error(
								offset,
								format!("value tag <tag:{name}/> used in block form"),
							));
						}
						code.extend(self.value(&tag, offset)?);
					} else if self.compiler.is_block(name) {
						let content = if self_closing {
							Code::new()
						} else {
							self.sequence(Some((name, offset)))?
						};
						code.extend(self.block(&tag, content, offset)?);
					} else {
						code.push(Instr::Text(raw.to_string()));
					}
				}
				Token::Close { name, raw, offset } => {
					if !self.compiler.is_block(name) {
						code.push(Instr::Text(raw.to_string()));
						continue;
					}
					return match enclosing {
						Some((open, _)) if open == name => Ok(code),
						Some((open, _)) => Err(self.error(
							offset,
							format!("expected </tag:{open}>, found </tag:{name}>"),
						)),
						None => Err(self.error(offset, format!("stray close tag </tag:{name}>"))),
					};
				}
			}
		}

		match enclosing {
			Some((name, offset)) => Err(self.error(offset, format!("missing close tag </tag:{name}>"))),
			None => Ok(code),
		}
	}

	fn value(&self, tag: &TagInvocation, offset: usize) -> Result<Code> {
		let behaviors = self.compiler.behaviors();
		let Some(handler) = self.compiler.values.get(&tag.name) else {
			return Ok(Code::new());
		};
		let mut code = behaviors.before_value(tag);
		code.extend(
			handler(tag).map_err(|m| self.error(offset, format!("<tag:{}/>: {m}", tag.name)))?,
		);
		code.extend(behaviors.after_value(tag));
		Ok(code)
	}

	fn block(&self, tag: &TagInvocation, mut content: Code, offset: usize) -> Result<Code> {
		let behaviors = self.compiler.behaviors();
		let Some(handler) = self.compiler.blocks.get(&tag.name) else {
			return Ok(content);
		};
		let mut code = behaviors.before_block(tag);
		behaviors.inside_block(tag, &mut content);
		code.extend(
			handler(tag, content)
				.map_err(|m| self.error(offset, format!("<tag:{}>: {m}", tag.name)))?,
		);
		code.extend(behaviors.after_block(tag));
		Ok(code)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::behaviors::TemplateBehavior;
	use crate::code::Cond;
	use rstest::{fixture, rstest};

	#[fixture]
	fn compiler() -> TagCompiler {
		let mut c = TagCompiler::new();
		c.add_value_tag("Name", |tag| Ok(tag.echo(Expr::Var("name".into()))))
			.unwrap();
		c.add_value_tag("Else", |_| Ok(Instr::Else.into())).unwrap();
		c.add_block_tag("IfName", |_, content| {
			Ok(Code::when(Cond::Exists("name".into()), content))
		})
		.unwrap();
		c.add_block_tag("Wrap", |tag, content| {
			let mut code = Code::text(format!("[{}", tag.attr("label").unwrap_or("")));
			code.extend(content);
			code.extend(Code::text("]"));
			Ok(code)
		})
		.unwrap();
		c.add_value_tag("Strict", |tag| {
			let n = tag.int("n")?.ok_or("attribute 'n' is required")?;
			Ok(Code::text(n.to_string()))
		})
		.unwrap();
		c
	}

	fn text(code: &Code) -> Vec<String> {
		code.instrs()
			.iter()
			.filter_map(|i| match i {
				Instr::Text(t) => Some(t.clone()),
				_ => None,
			})
			.collect()
	}

	#[rstest]
	fn test_unknown_tag_passthrough(compiler: TagCompiler) {
		let code = compiler.compile("t", "<tag:Bogus/> hi").unwrap();
		assert_eq!(code.instrs(), &[Instr::Text("<tag:Bogus/> hi".into())]);
	}

	#[rstest]
	fn test_unknown_block_keeps_raw_tags(compiler: TagCompiler) {
		let code = compiler
			.compile("t", "<tag:Future a=\"1\"><tag:Wrap label=x>y</tag:Wrap></tag:Future>")
			.unwrap();
		assert_eq!(text(&code), vec!["<tag:Future a=\"1\">[xy]</tag:Future>"]);
	}

	#[rstest]
	fn test_value_tag_echoes_with_filters(compiler: TagCompiler) {
		let code = compiler.compile("t", "<tag:Name upper_case=\"1\"/>").unwrap();
		match &code.instrs()[0] {
			Instr::Echo { filters, tag, .. } => {
				assert!(filters.upper_case);
				assert_eq!(tag, "Name");
			}
			other => panic!("unexpected {other:?}"),
		}
	}

	#[rstest]
	fn test_block_self_closing_is_empty_block(compiler: TagCompiler) {
		let code = compiler.compile("t", "<tag:Wrap label=\"e\"/>").unwrap();
		assert_eq!(text(&code), vec!["[e]"]);
	}

	#[rstest]
	fn test_nested_blocks(compiler: TagCompiler) {
		let code = compiler
			.compile("t", "<tag:Wrap label=a><tag:Wrap label=b>c</tag:Wrap></tag:Wrap>")
			.unwrap();
		assert_eq!(text(&code), vec!["[a[bc]]"]);
	}

	#[rstest]
	fn test_else_lands_inside_conditional(compiler: TagCompiler) {
		let code = compiler
			.compile("t", "<tag:IfName>yes<tag:Else/>no</tag:IfName>")
			.unwrap();
		assert_eq!(
			code.instrs(),
			&[Instr::If {
				cond: Cond::Exists("name".into()),
				body: vec![Instr::Text("yes".into()), Instr::Else, Instr::Text("no".into())],
			}]
		);
	}

	#[rstest]
	#[case("<tag:Wrap>never closed", "missing close tag", 1)]
	#[case("ok\n<tag:Wrap>x</tag:IfName>", "expected </tag:Wrap>", 2)]
	#[case("x\n\n</tag:Wrap>", "stray close tag", 3)]
	#[case("<tag:Name>x</tag:Name>", "used in block form", 1)]
	#[case("<tag:Strict/>", "attribute 'n' is required", 1)]
	#[case("<tag:Strict n=\"many\"/>", "must be an integer", 1)]
	#[case("<tag:Wrap label=\"x", "unterminated quote", 1)]
	fn test_compile_errors(
		compiler: TagCompiler,
		#[case] source: &str,
		#[case] needle: &str,
		#[case] expected_line: usize,
	) {
		match compiler.compile("theme/home.html", source) {
			Err(Error::Compile {
				path, line, message, ..
			}) => {
				assert_eq!(path, "theme/home.html");
				assert_eq!(line, expected_line);
				assert!(message.contains(needle), "{message}");
			}
			other => panic!("expected compile error, got {other:?}"),
		}
	}

	#[rstest]
	fn test_tag_conflicts(mut compiler: TagCompiler) {
		assert!(matches!(
			compiler.add_value_tag("Wrap", |_| Ok(Code::new())),
			Err(Error::TagConflict { existing: "block", .. })
		));
		assert!(matches!(
			compiler.add_block_tag("Name", |_, c| Ok(c)),
			Err(Error::TagConflict { existing: "value", .. })
		));
	}

	#[rstest]
	fn test_reregistration_replaces(mut compiler: TagCompiler) {
		compiler
			.add_value_tag("Name", |_| Ok(Code::text("replaced")))
			.unwrap();
		let code = compiler.compile("t", "<tag:Name/>").unwrap();
		assert_eq!(text(&code), vec!["replaced"]);
	}

	#[rstest]
	fn test_compile_is_deterministic(compiler: TagCompiler) {
		let source = "<tag:IfName><tag:Name cut_string=\"4\"/></tag:IfName>";
		let a = compiler.compile("t", source).unwrap().to_json().unwrap();
		let b = compiler.compile("t", source).unwrap().to_json().unwrap();
		assert_eq!(a, b);
	}

	struct Marker;
	impl TemplateBehavior for Marker {
		fn before_block_compile(&self, tag: &TagInvocation) -> Option<Code> {
			Some(Code::text(format!("<!--{}-->", tag.name)))
		}
		fn inside_block_compile(&self, _tag: &TagInvocation, content: &mut Code) {
			content.extend(Code::text("!"));
		}
		fn after_value_compile(&self, tag: &TagInvocation) -> Option<Code> {
			(tag.name == "Strict").then(|| Code::text(";"))
		}
	}

	#[rstest]
	fn test_compile_behaviors(mut compiler: TagCompiler) {
		compiler.behaviors_mut().push(Arc::new(Marker));
		let code = compiler
			.compile("t", "<tag:Wrap label=a>b</tag:Wrap><tag:Strict n=\"2\"/>")
			.unwrap();
		assert_eq!(text(&code), vec!["<!--Wrap-->[ab!]2;"]);
	}
}
