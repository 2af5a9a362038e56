//! Structural tags: branching and loop position tests

use crate::code::{Code, Cond, Instr};
use crate::compiler::TagCompiler;
use crate::filters::is_truthy;
use penmark_exception::Result;

pub(crate) fn register(compiler: &mut TagCompiler) -> Result<()> {
	// Only meaningful inside a conditional block; see `Instr::If`
	compiler.add_value_tag("Else", |_| Ok(Instr::Else.into()))?;

	compiler.add_block_tag("LoopPosition", |tag, content| {
		let start = tag
			.int("start")?
			.ok_or("attribute 'start' is required")?;
		let cond = Cond::LoopPosition {
			start,
			length: tag.int("length")?,
			even: tag.attr("even").map(is_truthy),
			modulo: tag.int("modulo")?,
		};
		Ok(Code::when(cond, content))
	})?;

	compiler.add_block_tag("IfExists", |tag, content| {
		let name = tag
			.attr("name")
			.filter(|n| !n.is_empty())
			.ok_or("attribute 'name' is required")?;
		let exists = Cond::Exists(name.to_string());
		let cond = if tag.flag("not") {
			Cond::Not(Box::new(exists))
		} else {
			exists
		};
		Ok(Code::when(cond, content))
	})?;

	Ok(())
}
