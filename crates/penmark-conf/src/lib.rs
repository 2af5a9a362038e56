//! # Penmark Conf
//!
//! Blog settings for the rendering pipeline.
//!
//! Settings are assembled from [`sources`] merged in ascending priority into a
//! nested JSON object. Compiled templates read individual keys through the
//! [`SettingsStore`] trait using dot-separated key paths, while the hosting
//! layer reads the typed [`BlogSettings`] view.
//!
//! ## Example
//!
//! ```
//! use penmark_conf::{Settings, SettingsStore, UrlScan};
//! use penmark_conf::sources::{DefaultSource, MemorySource};
//! use serde_json::json;
//!
//! let settings = Settings::builder()
//!     .add_source(DefaultSource::blog())
//!     .add_source(MemorySource::new(100).with_value("url_scan", json!("query_string")))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(settings.blog().unwrap().url_scan, UrlScan::QueryString);
//! assert_eq!(settings.get_i64("posts_per_page"), Some(10));
//! ```

pub mod sources;

use penmark_exception::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sources::{ConfigSource, DefaultSource, EnvSource, TomlFileSource};
use std::path::{Path, PathBuf};

/// Key-path lookup of blog configuration
///
/// Implemented by [`Settings`]; compiled templates only see this trait.
pub trait SettingsStore: Send + Sync {
	/// Look up a value by dot-separated key path
	fn get(&self, key_path: &str) -> Option<Value>;

	/// Look up a value rendered as text
	///
	/// Strings are returned verbatim, numbers and booleans in their JSON form.
	/// Arrays, tables and nulls yield `None`.
	fn get_str(&self, key_path: &str) -> Option<String> {
		match self.get(key_path)? {
			Value::String(s) => Some(s),
			Value::Number(n) => Some(n.to_string()),
			Value::Bool(b) => Some(b.to_string()),
			_ => None,
		}
	}

	/// Look up an integer, accepting numeric strings
	fn get_i64(&self, key_path: &str) -> Option<i64> {
		match self.get(key_path)? {
			Value::Number(n) => n.as_i64(),
			Value::String(s) => s.trim().parse().ok(),
			_ => None,
		}
	}

	/// Look up a flag; missing keys are false
	fn get_bool(&self, key_path: &str) -> bool {
		match self.get(key_path) {
			Some(Value::Bool(b)) => b,
			Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
			Some(Value::String(s)) => !s.is_empty() && s != "0" && s != "false",
			_ => false,
		}
	}
}

/// URL addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlScan {
	/// Route on the request path (`/post/slug`)
	#[default]
	PathInfo,
	/// Route on the raw query string (`/?post/slug`)
	QueryString,
}

/// Compiled template cache mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCacheMode {
	/// Always compile
	Disabled,
	/// Keep compiled units in process memory
	#[default]
	Memory,
	/// Persist compiled units under `cache_dir`
	Disk,
}

/// Typed view of the blog settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogSettings {
	pub blog_name: String,
	pub blog_description: String,
	/// Public base URL, always ending with `/`
	pub blog_url: String,
	pub language: String,
	pub url_scan: UrlScan,
	pub posts_per_page: u32,
	/// chrono format string used by date tags without a `format` attribute
	pub date_format: String,
	pub time_format: String,
	/// Template search path, first hit wins
	pub theme_dirs: Vec<PathBuf>,
	pub cache_dir: PathBuf,
	pub template_cache: TemplateCacheMode,
	/// Emit `Last-Modified` and honor conditional GET
	pub http_cache: bool,
	/// Also emit an `ETag` derived from the body
	pub http_etag: bool,
	pub debug: bool,
	pub listen: String,
}

impl Default for BlogSettings {
	fn default() -> Self {
		Self {
			blog_name: "My penmark blog".to_string(),
			blog_description: String::new(),
			blog_url: "http://127.0.0.1:8080/".to_string(),
			language: "en".to_string(),
			url_scan: UrlScan::PathInfo,
			posts_per_page: 10,
			date_format: "%B %-d, %Y".to_string(),
			time_format: "%H:%M".to_string(),
			theme_dirs: vec![PathBuf::from("themes/default")],
			cache_dir: PathBuf::from("cache"),
			template_cache: TemplateCacheMode::Memory,
			http_cache: true,
			http_etag: true,
			debug: false,
			listen: "127.0.0.1:8080".to_string(),
		}
	}
}

/// Merged settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
	values: Map<String, Value>,
}

impl Settings {
	/// Start building settings from sources
	pub fn builder() -> SettingsBuilder {
		SettingsBuilder::new()
	}

	/// Defaults, then the optional TOML file, then `PENMARK_*` variables
	pub fn load(config_file: Option<&Path>) -> Result<Self> {
		let mut builder = Self::builder()
			.add_source(DefaultSource::blog())
			.add_source(EnvSource::new());
		if let Some(path) = config_file {
			builder = builder.add_source(TomlFileSource::new(path));
		}
		builder.build()
	}

	/// Settings holding exactly the values of a JSON object
	pub fn from_value(value: Value) -> Result<Self> {
		match value {
			Value::Object(values) => Ok(Self { values }),
			other => Err(Error::Config(format!(
				"settings root must be a table, got {}",
				other
			))),
		}
	}

	/// Deserialize the typed blog view
	pub fn blog(&self) -> Result<BlogSettings> {
		let mut blog: BlogSettings = serde_json::from_value(Value::Object(self.values.clone()))
			.map_err(|e| Error::Config(e.to_string()))?;
		if !blog.blog_url.ends_with('/') {
			blog.blog_url.push('/');
		}
		if blog.posts_per_page == 0 {
			return Err(Error::Config("posts_per_page must be positive".to_string()));
		}
		Ok(blog)
	}

	/// Set a single value, creating intermediate tables
	pub fn set(&mut self, key_path: &str, value: Value) {
		insert_path(&mut self.values, key_path, value);
	}

	/// The merged values
	pub fn as_map(&self) -> &Map<String, Value> {
		&self.values
	}
}

impl SettingsStore for Settings {
	fn get(&self, key_path: &str) -> Option<Value> {
		if let Some(v) = self.values.get(key_path) {
			return Some(v.clone());
		}
		let mut parts = key_path.split('.');
		let mut current = self.values.get(parts.next()?)?;
		for part in parts {
			current = current.as_object()?.get(part)?;
		}
		Some(current.clone())
	}
}

/// Builder merging [`ConfigSource`]s by priority
#[derive(Default)]
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	/// Create an empty builder
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a source; order of addition only matters between equal priorities
	pub fn add_source(mut self, source: impl ConfigSource + 'static) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	/// Load and merge every source
	pub fn build(mut self) -> Result<Settings> {
		self.sources.sort_by_key(|s| s.priority());

		let mut values = Map::new();
		for source in &self.sources {
			let loaded = source
				.load()
				.map_err(|e| Error::Config(format!("{}: {}", source.description(), e)))?;
			tracing::debug!(
				source = %source.description(),
				keys = loaded.len(),
				"loaded settings source"
			);
			for (key, value) in loaded {
				insert_path(&mut values, &key, value);
			}
		}

		Ok(Settings { values })
	}
}

fn insert_path(root: &mut Map<String, Value>, key_path: &str, value: Value) {
	let mut parts: Vec<&str> = key_path.split('.').collect();
	let Some(last) = parts.pop() else {
		return;
	};

	let mut table = root;
	for part in parts {
		let entry = table
			.entry(part.to_string())
			.or_insert_with(|| Value::Object(Map::new()));
		if !entry.is_object() {
			*entry = Value::Object(Map::new());
		}
		let Value::Object(next) = entry else {
			return;
		};
		table = next;
	}

	match value {
		Value::Object(incoming) if table.get(last).is_some_and(Value::is_object) => {
			if let Some(Value::Object(existing)) = table.get_mut(last) {
				for (k, v) in incoming {
					insert_path(existing, &k, v);
				}
			}
		}
		value => {
			table.insert(last.to_string(), value);
		}
	}
}
