//! Compiled unit cache
//!
//! Compiled units are keyed by the resolved template path and the source
//! modification time. A changed mtime replaces the entry. With
//! [`CachePolicy::Disk`] every unit is also written as JSON under the cache
//! directory, so a fresh process can reuse the previous process's work.
//!
//! Two renders compiling the same stale template at once both compile; the
//! last one to store wins. Compilation is a pure function of the source, so
//! either result is correct.

use crate::code::Code;
use parking_lot::RwLock;
use penmark_conf::{BlogSettings, TemplateCacheMode};
use penmark_exception::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Where compiled units are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachePolicy {
	/// Compile on every render
	Disabled,
	/// Keep units in process memory
	Memory,
	/// Keep units in memory and as JSON files under the directory
	Disk(PathBuf),
}

impl CachePolicy {
	/// Policy configured by `template_cache` and `cache_dir`
	pub fn from_settings(settings: &BlogSettings) -> Self {
		match settings.template_cache {
			TemplateCacheMode::Disabled => CachePolicy::Disabled,
			TemplateCacheMode::Memory => CachePolicy::Memory,
			TemplateCacheMode::Disk => CachePolicy::Disk(settings.cache_dir.clone()),
		}
	}
}

/// Counters reported by [`UnitCache::statistics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatistics {
	pub hits: u64,
	pub misses: u64,
	pub entry_count: u64,
}

impl CacheStatistics {
	pub fn hit_rate(&self) -> f64 {
		let total = self.hits + self.misses;
		if total == 0 {
			0.0
		} else {
			self.hits as f64 / total as f64
		}
	}
}

#[derive(Clone)]
struct CachedUnit {
	modified: SystemTime,
	code: Arc<Code>,
}

#[derive(Serialize)]
struct DiskEntryRef<'a> {
	path: &'a Path,
	modified: SystemTime,
	code: &'a Code,
}

#[derive(Deserialize)]
struct DiskEntry {
	path: PathBuf,
	modified: SystemTime,
	code: Code,
}

/// Compiled unit cache shared by all renders
pub struct UnitCache {
	policy: CachePolicy,
	units: RwLock<HashMap<PathBuf, CachedUnit>>,
	hits: AtomicU64,
	misses: AtomicU64,
}

impl UnitCache {
	pub fn new(policy: CachePolicy) -> Self {
		Self {
			policy,
			units: RwLock::new(HashMap::new()),
			hits: AtomicU64::new(0),
			misses: AtomicU64::new(0),
		}
	}

	pub fn policy(&self) -> &CachePolicy {
		&self.policy
	}

	/// Return the unit for `path` at `modified`, compiling on a miss
	///
	/// `compile` runs only on a miss. Its errors are returned unchanged and
	/// nothing is stored for them. Disk write failures are logged and the
	/// freshly compiled unit is still returned.
	///
	/// # Examples
	///
	/// ```
	/// use penmark_template::cache::{CachePolicy, UnitCache};
	/// use penmark_template::code::Code;
	/// use std::path::Path;
	/// use std::time::SystemTime;
	///
	/// let cache = UnitCache::new(CachePolicy::Memory);
	/// let now = SystemTime::now();
	/// let first = cache.get_or_compile(Path::new("home.html"), now, || Ok(Code::text("hi"))).unwrap();
	/// let second = cache
	///     .get_or_compile(Path::new("home.html"), now, || unreachable!())
	///     .unwrap();
	/// assert_eq!(first, second);
	/// assert_eq!(cache.statistics().hits, 1);
	/// ```
	pub fn get_or_compile<F>(&self, path: &Path, modified: SystemTime, compile: F) -> Result<Arc<Code>>
	where
		F: FnOnce() -> Result<Code>,
	{
		if self.policy == CachePolicy::Disabled {
			self.misses.fetch_add(1, Ordering::Relaxed);
			return compile().map(Arc::new);
		}

		if let Some(unit) = self.units.read().get(path)
			&& unit.modified == modified
		{
			self.hits.fetch_add(1, Ordering::Relaxed);
			tracing::trace!(template = %path.display(), "compiled unit cache hit");
			return Ok(Arc::clone(&unit.code));
		}

		if let Some(code) = self.load_from_disk(path, modified) {
			self.hits.fetch_add(1, Ordering::Relaxed);
			tracing::debug!(template = %path.display(), "compiled unit loaded from disk");
			let code = Arc::new(code);
			self.store(path, modified, Arc::clone(&code));
			return Ok(code);
		}

		self.misses.fetch_add(1, Ordering::Relaxed);
		tracing::debug!(template = %path.display(), "compiling template");
		let code = Arc::new(compile()?);
		if let Err(err) = self.write_to_disk(path, modified, &code) {
			tracing::warn!(template = %path.display(), error = %err, "failed to persist compiled unit");
		}
		self.store(path, modified, Arc::clone(&code));
		Ok(code)
	}

	/// Location of the disk entry for `path`, when the policy is `Disk`
	pub fn disk_path(&self, path: &Path) -> Option<PathBuf> {
		let CachePolicy::Disk(dir) = &self.policy else {
			return None;
		};
		let digest = hex::encode(Sha256::digest(path.to_string_lossy().as_bytes()));
		Some(dir.join(&digest[..2]).join(format!("{digest}.json")))
	}

	/// Drop every in-memory unit; disk entries stay
	pub fn clear(&self) {
		self.units.write().clear();
	}

	pub fn statistics(&self) -> CacheStatistics {
		CacheStatistics {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			entry_count: self.units.read().len() as u64,
		}
	}

	fn store(&self, path: &Path, modified: SystemTime, code: Arc<Code>) {
		self.units
			.write()
			.insert(path.to_path_buf(), CachedUnit { modified, code });
	}

	fn load_from_disk(&self, path: &Path, modified: SystemTime) -> Option<Code> {
		let file = self.disk_path(path)?;
		let json = fs::read_to_string(&file).ok()?;
		match serde_json::from_str::<DiskEntry>(&json) {
			Ok(entry) if entry.path == path && entry.modified == modified => Some(entry.code),
			Ok(_) => None,
			Err(err) => {
				tracing::warn!(file = %file.display(), error = %err, "ignoring unreadable cache entry");
				None
			}
		}
	}

	fn write_to_disk(&self, path: &Path, modified: SystemTime, code: &Code) -> Result<()> {
		let Some(file) = self.disk_path(path) else {
			return Ok(());
		};
		let Some(dir) = file.parent() else {
			return Ok(());
		};
		fs::create_dir_all(dir)?;

		let json = serde_json::to_string(&DiskEntryRef {
			path,
			modified,
			code,
		})?;
		let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
		tmp.write_all(json.as_bytes())?;
		tmp.persist(&file).map_err(|err| err.error)?;
		Ok(())
	}
}

impl std::fmt::Debug for UnitCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("UnitCache")
			.field("policy", &self.policy)
			.field("statistics", &self.statistics())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use penmark_exception::Error;
	use rstest::rstest;
	use std::time::Duration;
	use tempfile::TempDir;

	fn unit(text: &str) -> Result<Code> {
		Ok(Code::text(text))
	}

	#[rstest]
	fn test_disabled_always_compiles() {
		let cache = UnitCache::new(CachePolicy::Disabled);
		let now = SystemTime::now();
		cache.get_or_compile(Path::new("a"), now, || unit("1")).unwrap();
		cache.get_or_compile(Path::new("a"), now, || unit("1")).unwrap();
		let stats = cache.statistics();
		assert_eq!(stats.hits, 0);
		assert_eq!(stats.misses, 2);
		assert_eq!(stats.entry_count, 0);
	}

	#[rstest]
	fn test_newer_mtime_recompiles() {
		let cache = UnitCache::new(CachePolicy::Memory);
		let then = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
		let now = then + Duration::from_secs(5);
		let old = cache.get_or_compile(Path::new("a"), then, || unit("old")).unwrap();
		let new = cache.get_or_compile(Path::new("a"), now, || unit("new")).unwrap();
		assert_eq!(*old, Code::text("old"));
		assert_eq!(*new, Code::text("new"));
		assert_eq!(cache.statistics().misses, 2);
		assert_eq!(cache.statistics().entry_count, 1);
	}

	#[rstest]
	fn test_compile_error_not_cached() {
		let cache = UnitCache::new(CachePolicy::Memory);
		let now = SystemTime::now();
		let err = cache
			.get_or_compile(Path::new("a"), now, || Err(Error::compile("a", "", 0, "bad")))
			.unwrap_err();
		assert!(matches!(err, Error::Compile { .. }));
		let ok = cache.get_or_compile(Path::new("a"), now, || unit("fixed")).unwrap();
		assert_eq!(*ok, Code::text("fixed"));
	}

	#[rstest]
	fn test_disk_path_layout() {
		let dir = TempDir::new().unwrap();
		let cache = UnitCache::new(CachePolicy::Disk(dir.path().to_path_buf()));
		let file = cache.disk_path(Path::new("themes/default/home.html")).unwrap();
		let name = file.file_stem().unwrap().to_str().unwrap();
		assert_eq!(name.len(), 64);
		let shard = file.parent().unwrap().file_name().unwrap().to_str().unwrap();
		assert_eq!(shard, &name[..2]);
		assert!(UnitCache::new(CachePolicy::Memory).disk_path(Path::new("x")).is_none());
	}

	#[rstest]
	fn test_corrupt_disk_entry_recompiles() {
		let dir = TempDir::new().unwrap();
		let cache = UnitCache::new(CachePolicy::Disk(dir.path().to_path_buf()));
		let file = cache.disk_path(Path::new("a")).unwrap();
		fs::create_dir_all(file.parent().unwrap()).unwrap();
		fs::write(&file, "not json").unwrap();

		let code = cache
			.get_or_compile(Path::new("a"), SystemTime::now(), || unit("ok"))
			.unwrap();
		assert_eq!(*code, Code::text("ok"));
		assert_eq!(cache.statistics().misses, 1);
	}
}
