//! Configuration sources for the layered settings system
//!
//! Sources are merged in priority order (environment variables > TOML file >
//! defaults). Keys may contain dots to address nested tables, so
//! `system.posts_per_page` from any source lands in the `system` table.

use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// Prefix recognized by [`EnvSource::new`]
pub const ENV_PREFIX: &str = "PENMARK_";

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Error type for configuration sources
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Environment variable configuration source
///
/// `PENMARK_BLOG_NAME` becomes `blog_name`; a double underscore separates
/// nested tables, so `PENMARK_SYSTEM__POSTS_PER_PAGE` becomes
/// `system.posts_per_page`.
pub struct EnvSource {
	prefix: String,
	vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
	/// Create a source reading `PENMARK_*` variables from the process environment
	///
	/// # Examples
	///
	/// ```
	/// use penmark_conf::sources::EnvSource;
	///
	/// let source = EnvSource::new();
	/// ```
	pub fn new() -> Self {
		Self {
			prefix: ENV_PREFIX.to_string(),
			vars: None,
		}
	}

	/// Set a different variable prefix
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();
		self
	}

	/// Read from a fixed list of variables instead of the process environment
	///
	/// # Examples
	///
	/// ```
	/// use penmark_conf::sources::{ConfigSource, EnvSource};
	///
	/// let source = EnvSource::new().with_vars([("PENMARK_DEBUG", "yes")]);
	/// let values = source.load().unwrap();
	/// assert_eq!(values["debug"], serde_json::Value::Bool(true));
	/// ```
	pub fn with_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		self.vars = Some(
			vars.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		);
		self
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let vars: Vec<(String, String)> = match &self.vars {
			Some(vars) => vars.clone(),
			None => std::env::vars().collect(),
		};

		let mut config = IndexMap::new();
		for (key, value) in vars {
			let Some(clean_key) = key.strip_prefix(&self.prefix) else {
				continue;
			};
			if clean_key.is_empty() {
				continue;
			}

			let key = clean_key.to_lowercase().replace("__", ".");
			let parsed = parse_env_value(&key, &value);
			config.insert(key, parsed);
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		100 // Highest priority
	}

	fn description(&self) -> String {
		format!("Environment variables (prefix: {})", self.prefix)
	}
}

fn parse_env_value(key: &str, value: &str) -> Value {
	let leaf = key.rsplit('.').next().unwrap_or(key);
	if matches!(leaf, "debug" | "http_cache" | "http_etag") {
		match value.trim().to_lowercase().as_str() {
			"true" | "1" | "yes" | "on" => return Value::Bool(true),
			"false" | "0" | "no" | "off" | "" => return Value::Bool(false),
			_ => {}
		}
	}
	if leaf == "theme_dirs" {
		// Path list, same separator as PATH
		let list = value
			.split(':')
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(|s| Value::String(s.to_string()))
			.collect();
		return Value::Array(list);
	}
	match serde_json::from_str::<Value>(value.trim()) {
		Ok(Value::Null) | Err(_) => Value::String(value.to_string()),
		Ok(parsed) => parsed,
	}
}

/// TOML file configuration source
///
/// A missing file loads as empty so that a default config path can always be
/// passed.
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	/// Create a new TOML file configuration source
	///
	/// # Examples
	///
	/// ```
	/// use penmark_conf::sources::TomlFileSource;
	/// use std::path::PathBuf;
	///
	/// let source = TomlFileSource::new(PathBuf::from("penmark.toml"));
	/// ```
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let toml_value: toml::Value = toml::from_str(&content)?;
		let json_value = serde_json::to_value(toml_value)?;

		let map = json_value
			.as_object()
			.ok_or_else(|| SourceError::Parse("Expected table at root".to_string()))?;

		Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
	}

	fn priority(&self) -> u8 {
		50 // Medium priority
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// Default values configuration source
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	/// Create an empty default source
	pub fn new() -> Self {
		Self {
			values: IndexMap::new(),
		}
	}

	/// Default values for every blog setting
	///
	/// # Examples
	///
	/// ```
	/// use penmark_conf::sources::{ConfigSource, DefaultSource};
	///
	/// let values = DefaultSource::blog().load().unwrap();
	/// assert_eq!(values["url_scan"], "path_info");
	/// ```
	pub fn blog() -> Self {
		Self::new()
			.with_value("blog_name", Value::from("My penmark blog"))
			.with_value("blog_description", Value::from(""))
			.with_value("blog_url", Value::from("http://127.0.0.1:8080/"))
			.with_value("language", Value::from("en"))
			.with_value("url_scan", Value::from("path_info"))
			.with_value("posts_per_page", Value::from(10))
			.with_value("date_format", Value::from("%B %-d, %Y"))
			.with_value("time_format", Value::from("%H:%M"))
			.with_value("theme_dirs", Value::from(vec!["themes/default"]))
			.with_value("cache_dir", Value::from("cache"))
			.with_value("template_cache", Value::from("memory"))
			.with_value("http_cache", Value::Bool(true))
			.with_value("http_etag", Value::Bool(true))
			.with_value("debug", Value::Bool(false))
			.with_value("listen", Value::from("127.0.0.1:8080"))
	}

	/// Add a default value for a configuration key
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}
}

impl Default for DefaultSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0 // Lowest priority
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}

/// In-memory source with an explicit priority, used for overrides
pub struct MemorySource {
	values: IndexMap<String, Value>,
	priority: u8,
}

impl MemorySource {
	/// Create an empty in-memory source
	///
	/// # Examples
	///
	/// ```
	/// use penmark_conf::sources::MemorySource;
	/// use serde_json::json;
	///
	/// let source = MemorySource::new(200).with_value("debug", json!(true));
	/// ```
	pub fn new(priority: u8) -> Self {
		Self {
			values: IndexMap::new(),
			priority,
		}
	}

	/// Set a value
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}
}

impl ConfigSource for MemorySource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		self.priority
	}

	fn description(&self) -> String {
		format!("In-memory values (priority {})", self.priority)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::io::Write;

	#[rstest]
	fn test_env_source_strips_prefix_and_nests() {
		let source = EnvSource::new().with_vars([
			("PENMARK_BLOG_NAME", "Notes"),
			("PENMARK_SYSTEM__POSTS_PER_PAGE", "5"),
			("HOME", "/root"),
		]);
		let values = source.load().unwrap();

		assert_eq!(values.len(), 2);
		assert_eq!(values["blog_name"], Value::from("Notes"));
		assert_eq!(values["system.posts_per_page"], Value::from(5));
	}

	#[rstest]
	#[case("on", true)]
	#[case("1", true)]
	#[case("off", false)]
	#[case("0", false)]
	fn test_env_source_bool_keys(#[case] raw: &str, #[case] expected: bool) {
		let source = EnvSource::new().with_vars([("PENMARK_DEBUG", raw)]);
		assert_eq!(source.load().unwrap()["debug"], Value::Bool(expected));
	}

	#[rstest]
	#[case("12", serde_json::json!(12))]
	#[case("false", serde_json::json!(false))]
	#[case("{\"a\": [1]}", serde_json::json!({"a": [1]}))]
	#[case("null", serde_json::json!("null"))]
	#[case("plain text", serde_json::json!("plain text"))]
	fn test_env_source_json_values(#[case] raw: &str, #[case] expected: Value) {
		let source = EnvSource::new().with_vars([("PENMARK_EXTRA", raw)]);
		assert_eq!(source.load().unwrap()["extra"], expected);
	}

	#[rstest]
	fn test_env_source_theme_dirs_list() {
		let source = EnvSource::new().with_vars([("PENMARK_THEME_DIRS", "a:b")]);
		assert_eq!(
			source.load().unwrap()["theme_dirs"],
			serde_json::json!(["a", "b"])
		);
	}

	#[rstest]
	fn test_toml_source_missing_file_is_empty() {
		let source = TomlFileSource::new("/nonexistent/penmark.toml");
		assert!(source.load().unwrap().is_empty());
	}

	#[rstest]
	fn test_toml_source_reads_tables() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "blog_name = \"From TOML\"\n[system]\nposts_per_page = 3").unwrap();

		let values = TomlFileSource::new(file.path()).load().unwrap();
		assert_eq!(values["blog_name"], Value::from("From TOML"));
		assert_eq!(values["system"]["posts_per_page"], Value::from(3));
	}

	#[rstest]
	fn test_toml_source_parse_error() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "blog_name = ").unwrap();
		assert!(matches!(
			TomlFileSource::new(file.path()).load(),
			Err(SourceError::Toml(_))
		));
	}
}
