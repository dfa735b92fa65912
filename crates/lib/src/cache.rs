//! Directory-backed multi-artifact cache.
//!
//! A [`MultiCache`] lives in `<project>/.beet_cache` and holds any number of
//! named caches. Each [`Cache`] owns a directory for arbitrary artifacts plus a
//! JSON index (`index.json`) that plugins can use to remember small values
//! across builds. Indexes are loaded lazily and written back on [`MultiCache::close`].

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

const INDEX_FILENAME: &str = "index.json";

#[derive(Debug, Error)]
pub enum CacheError {
  #[error("failed to create cache directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read cache index {path}: {source}")]
  ReadIndex {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("corrupt cache index {path}: {source}")]
  ParseIndex {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to write cache index {path}: {source}")]
  WriteIndex {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to clear cache {path}: {source}")]
  Clear {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug)]
pub struct Cache {
  pub directory: PathBuf,
  pub json: Map<String, Value>,
  dirty: bool,
}

impl Cache {
  fn open(directory: PathBuf) -> Result<Self, CacheError> {
    fs::create_dir_all(&directory).map_err(|source| CacheError::CreateDir {
      path: directory.clone(),
      source,
    })?;

    let index_path = directory.join(INDEX_FILENAME);
    let json = match fs::read_to_string(&index_path) {
      Ok(contents) => serde_json::from_str(&contents).map_err(|source| CacheError::ParseIndex {
        path: index_path.clone(),
        source,
      })?,
      Err(err) if err.kind() == io::ErrorKind::NotFound => Map::new(),
      Err(source) => {
        return Err(CacheError::ReadIndex {
          path: index_path,
          source,
        });
      }
    };

    Ok(Self {
      directory,
      json,
      dirty: false,
    })
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.json.get(key)
  }

  pub fn set(&mut self, key: impl Into<String>, value: Value) {
    self.json.insert(key.into(), value);
    self.dirty = true;
  }

  /// Path of an artifact stored in this cache.
  pub fn get_path(&self, name: &str) -> PathBuf {
    self.directory.join(name)
  }

  fn flush(&mut self) -> Result<(), CacheError> {
    if !self.dirty {
      return Ok(());
    }

    let index_path = self.directory.join(INDEX_FILENAME);
    let contents = serde_json::to_string_pretty(&self.json).map_err(|e| CacheError::WriteIndex {
      path: index_path.clone(),
      source: io::Error::other(e),
    })?;
    fs::write(&index_path, contents).map_err(|source| CacheError::WriteIndex {
      path: index_path,
      source,
    })?;

    self.dirty = false;
    Ok(())
  }
}

#[derive(Debug)]
pub struct MultiCache {
  path: PathBuf,
  caches: BTreeMap<String, Cache>,
  closed: bool,
}

impl MultiCache {
  /// Open the multi-cache rooted at `path`, creating the directory if needed.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
    let path = path.into();
    fs::create_dir_all(&path).map_err(|source| CacheError::CreateDir {
      path: path.clone(),
      source,
    })?;
    debug!(path = %path.display(), "opened cache");

    Ok(Self {
      path,
      caches: BTreeMap::new(),
      closed: false,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Get the named cache, loading it from disk on first access.
  pub fn get(&mut self, key: &str) -> Result<&mut Cache, CacheError> {
    let cache = match self.caches.entry(key.to_string()) {
      Entry::Occupied(entry) => entry.into_mut(),
      Entry::Vacant(entry) => entry.insert(Cache::open(self.path.join(key))?),
    };
    Ok(cache)
  }

  /// Names of the caches loaded during this session.
  pub fn loaded(&self) -> impl Iterator<Item = &str> {
    self.caches.keys().map(String::as_str)
  }

  /// Write every modified index back to disk.
  pub fn flush(&mut self) -> Result<(), CacheError> {
    for cache in self.caches.values_mut() {
      cache.flush()?;
    }
    Ok(())
  }

  /// Flush and release the cache. Closing twice is a no-op.
  pub fn close(&mut self) -> Result<(), CacheError> {
    if self.closed {
      return Ok(());
    }
    self.closed = true;
    self.flush()?;
    debug!(path = %self.path.display(), "closed cache");
    Ok(())
  }

  pub fn is_closed(&self) -> bool {
    self.closed
  }

  /// Delete a cache directory from disk.
  pub fn clear(path: &Path) -> Result<bool, CacheError> {
    match fs::remove_dir_all(path) {
      Ok(()) => Ok(true),
      Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(source) => Err(CacheError::Clear {
        path: path.to_path_buf(),
        source,
      }),
    }
  }
}
