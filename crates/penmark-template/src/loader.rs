//! Template search path
//!
//! Resolves template names against an ordered list of theme directories. The
//! first directory holding the name wins; names that try to leave the
//! directory are treated as missing.

use penmark_exception::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// A template file found on the search path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplate {
	pub name: String,
	pub path: PathBuf,
	pub modified: SystemTime,
}

/// Ordered template directories
#[derive(Debug, Clone, Default)]
pub struct TemplateLoader {
	dirs: Vec<PathBuf>,
}

impl TemplateLoader {
	/// Create a loader over `dirs`, searched in order
	///
	/// # Example
	///
	/// ```rust,no_run
	/// use penmark_template::loader::TemplateLoader;
	///
	/// let loader = TemplateLoader::new(["themes/custom", "themes/default"]);
	/// let home = loader.resolve("home.html").unwrap();
	/// ```
	pub fn new<I, P>(dirs: I) -> Self
	where
		I: IntoIterator<Item = P>,
		P: Into<PathBuf>,
	{
		Self {
			dirs: dirs.into_iter().map(Into::into).collect(),
		}
	}

	/// Append a directory with the lowest precedence
	pub fn push_dir(&mut self, dir: impl Into<PathBuf>) {
		self.dirs.push(dir.into());
	}

	pub fn dirs(&self) -> &[PathBuf] {
		&self.dirs
	}

	/// Find `name` on the search path
	///
	/// # Errors
	///
	/// [`Error::TemplateNotFound`] if:
	/// - the name is empty, absolute or contains `..`
	/// - no directory contains a regular file by that name
	/// - the file resolves outside its directory (symlinks)
	pub fn resolve(&self, name: &str) -> Result<ResolvedTemplate> {
		let relative = validate_name(name)?;

		for dir in &self.dirs {
			let candidate = dir.join(relative);
			if !candidate.is_file() {
				continue;
			}
			if let (Ok(full), Ok(base)) = (candidate.canonicalize(), dir.canonicalize())
				&& !full.starts_with(&base)
			{
				tracing::warn!(template = %name, dir = %dir.display(), "template escapes its directory");
				continue;
			}
			let modified = fs::metadata(&candidate)?.modified()?;
			tracing::trace!(template = %name, path = %candidate.display(), "resolved template");
			return Ok(ResolvedTemplate {
				name: name.to_string(),
				path: candidate,
				modified,
			});
		}

		Err(Error::TemplateNotFound(name.to_string()))
	}

	/// Read a resolved template
	pub fn read(&self, template: &ResolvedTemplate) -> Result<String> {
		Ok(fs::read_to_string(&template.path)?)
	}
}

fn validate_name(name: &str) -> Result<&Path> {
	let path = Path::new(name);
	let mut has_normal = false;
	for component in path.components() {
		match component {
			Component::Normal(_) => has_normal = true,
			Component::CurDir => {}
			Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
				return Err(Error::TemplateNotFound(name.to_string()));
			}
		}
	}
	if !has_normal {
		return Err(Error::TemplateNotFound(name.to_string()));
	}
	Ok(path)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::io::Write;
	use tempfile::TempDir;

	fn create_template(dir: &Path, name: &str, content: &str) {
		let file_path = dir.join(name);
		if let Some(parent) = file_path.parent() {
			fs::create_dir_all(parent).unwrap();
		}
		let mut file = fs::File::create(file_path).unwrap();
		file.write_all(content.as_bytes()).unwrap();
	}

	#[rstest]
	fn test_first_directory_wins() {
		let custom = TempDir::new().unwrap();
		let default = TempDir::new().unwrap();
		create_template(custom.path(), "home.html", "custom");
		create_template(default.path(), "home.html", "default");
		create_template(default.path(), "post.html", "default post");

		let loader = TemplateLoader::new([custom.path(), default.path()]);
		let home = loader.resolve("home.html").unwrap();
		assert_eq!(loader.read(&home).unwrap(), "custom");
		let post = loader.resolve("post.html").unwrap();
		assert_eq!(loader.read(&post).unwrap(), "default post");
	}

	#[rstest]
	fn test_nested_name() {
		let dir = TempDir::new().unwrap();
		create_template(dir.path(), "feeds/atom.xml", "<feed/>");
		let loader = TemplateLoader::new([dir.path()]);
		assert!(loader.resolve("feeds/atom.xml").is_ok());
	}

	#[rstest]
	#[case("../secret.html")]
	#[case("/etc/passwd")]
	#[case("")]
	#[case("feeds/../../x")]
	fn test_rejected_names(#[case] name: &str) {
		let dir = TempDir::new().unwrap();
		let loader = TemplateLoader::new([dir.path()]);
		assert!(matches!(loader.resolve(name), Err(Error::TemplateNotFound(_))));
	}

	#[rstest]
	fn test_missing_and_directory() {
		let dir = TempDir::new().unwrap();
		fs::create_dir(dir.path().join("sub")).unwrap();
		let loader = TemplateLoader::new([dir.path()]);
		assert!(matches!(loader.resolve("missing.html"), Err(Error::TemplateNotFound(_))));
		assert!(matches!(loader.resolve("sub"), Err(Error::TemplateNotFound(_))));
	}
}
