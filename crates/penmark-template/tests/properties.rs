//! Property tests for the filter pipeline and the context stack

use penmark_template::behaviors::Behaviors;
use penmark_template::compiler::Attributes;
use penmark_template::context::{Context, Value};
use penmark_template::filters::{FilterSpec, apply_filters};
use penmark_template::record::RecordSet;
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashMap;

const FILTERS: [&str; 8] = [
	"strip_tags",
	"remove_html",
	"encode_html",
	"cut_string",
	"lower_case",
	"capitalize",
	"upper_case",
	"encode_url",
];

fn attributes(names: &[&str], cut: usize) -> Attributes {
	names
		.iter()
		.map(|name| {
			let value = if *name == "cut_string" {
				cut.to_string()
			} else {
				"1".to_string()
			};
			(name.to_string(), value)
		})
		.collect()
}

proptest! {
	#[test]
	fn filter_order_ignores_declaration_order(
		enabled in proptest::sample::subsequence(FILTERS.to_vec(), 0..=FILTERS.len()),
		shuffled_seed in any::<u64>(),
		cut in 1usize..40,
		text in "[a-zA-Z <>&'\"/ ]{0,60}",
	) {
		let declared = attributes(&enabled, cut);

		let mut reordered_names = enabled.clone();
		let len = reordered_names.len().max(1);
		reordered_names.rotate_left((shuffled_seed as usize) % len);
		reordered_names.reverse();
		let reordered = attributes(&reordered_names, cut);

		let behaviors = Behaviors::new();
		let a = apply_filters(&text, &FilterSpec::from_attributes(&declared), "EntryTitle", &behaviors);
		let b = apply_filters(&text, &FilterSpec::from_attributes(&reordered), "EntryTitle", &behaviors);
		prop_assert_eq!(a, b);
	}

	#[test]
	fn iterator_depth_tracks_pushed_record_sets(
		ops in proptest::collection::vec((0u8..3, 0usize..3), 0..60),
	) {
		let names = ["posts", "comments", "title"];
		let mut ctx = Context::new();
		let mut model: HashMap<&str, Vec<bool>> = HashMap::new();

		for (op, which) in ops {
			let name = names[which];
			match op {
				0 => {
					ctx.push(name, Value::Scalar("x".to_string()));
					model.entry(name).or_default().push(false);
				}
				1 => {
					ctx.push(name, RecordSet::from_values(vec![json!({"id": 1})]).into());
					model.entry(name).or_default().push(true);
				}
				_ => {
					ctx.push(name, Value::Absent);
					if let Some(stack) = model.get_mut(name) {
						stack.pop();
					}
				}
			}

			let expected: usize = model.values().map(|s| s.iter().filter(|r| **r).count()).sum();
			prop_assert_eq!(ctx.loop_depth(), expected);
			prop_assert_eq!(
				ctx.exists(name),
				model.get(name).is_some_and(|s| !s.is_empty())
			);
		}
	}
}

#[test]
fn upper_case_and_cut_commute_in_declaration() {
	let behaviors = Behaviors::new();
	let first = FilterSpec::from_attributes(&attributes(&["upper_case", "cut_string"], 5));
	let second = FilterSpec::from_attributes(&attributes(&["cut_string", "upper_case"], 5));
	assert_eq!(
		apply_filters("hello world", &first, "T", &behaviors),
		apply_filters("hello world", &second, "T", &behaviors)
	);
}
