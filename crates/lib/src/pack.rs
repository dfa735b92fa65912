//! Resource packs and data packs.
//!
//! A build produces two packs: the resource pack holds presentation assets
//! (models, block states, fonts, languages) and the data pack holds behavioral
//! data (functions, advancements, loot tables, predicates, recipes, tags). Each
//! pack declares which [`FileType`]s it can contain, which is how
//! [`Context::generate`](crate::context::Context::generate) routes an item to
//! the right pack.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Latest resource pack format.
pub const RESOURCE_PACK_FORMAT: u32 = 6;

/// Latest data pack format.
pub const DATA_PACK_FORMAT: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackKind {
  Resource,
  Data,
}

impl PackKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      PackKind::Resource => "resource_pack",
      PackKind::Data => "data_pack",
    }
  }

  /// Item types this kind of pack can hold.
  pub fn file_types(&self) -> &'static [FileType] {
    match self {
      PackKind::Resource => &[FileType::BlockState, FileType::Model, FileType::Font, FileType::Language],
      PackKind::Data => &[
        FileType::Advancement,
        FileType::Function,
        FileType::LootTable,
        FileType::Predicate,
        FileType::Recipe,
        FileType::Tag,
      ],
    }
  }
}

/// The concrete type of a pack item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
  BlockState,
  Model,
  Font,
  Language,
  Advancement,
  Function,
  LootTable,
  Predicate,
  Recipe,
  Tag,
}

impl FileType {
  /// Lowercased type name, used as the `{type}` tag of generated names.
  pub fn type_name(&self) -> &'static str {
    match self {
      FileType::BlockState => "blockstate",
      FileType::Model => "model",
      FileType::Font => "font",
      FileType::Language => "language",
      FileType::Advancement => "advancement",
      FileType::Function => "function",
      FileType::LootTable => "loottable",
      FileType::Predicate => "predicate",
      FileType::Recipe => "recipe",
      FileType::Tag => "tag",
    }
  }
}

impl fmt::Display for FileType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.type_name())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown file type '{0}'")]
pub struct UnknownFileType(pub String);

impl FromStr for FileType {
  type Err = UnknownFileType;

  /// Accepts both the type tag (`loottable`) and snake case (`loot_table`).
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized = s.to_ascii_lowercase().replace('_', "");
    PackKind::Resource
      .file_types()
      .iter()
      .chain(PackKind::Data.file_types())
      .find(|t| t.type_name() == normalized)
      .copied()
      .ok_or_else(|| UnknownFileType(s.to_string()))
  }
}

/// A single pack item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
  pub file_type: FileType,
  pub content: String,
}

impl File {
  pub fn new(file_type: FileType, content: impl Into<String>) -> Self {
    Self {
      file_type,
      content: content.into(),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pack {
  pub kind: PackKind,
  pub name: String,
  pub description: String,
  pub pack_format: u32,
  pub zipped: bool,
  files: BTreeMap<FileType, BTreeMap<String, File>>,
}

impl Pack {
  pub fn new(
    kind: PackKind,
    name: impl Into<String>,
    description: impl Into<String>,
    pack_format: u32,
    zipped: bool,
  ) -> Self {
    Self {
      kind,
      name: name.into(),
      description: description.into(),
      pack_format,
      zipped,
      files: BTreeMap::new(),
    }
  }

  pub fn accepts(&self, file_type: FileType) -> bool {
    self.kind.file_types().contains(&file_type)
  }

  /// Insert an item under `name`, returning the item it replaced.
  ///
  /// Callers are expected to route items with [`Pack::accepts`] first.
  pub fn insert(&mut self, name: impl Into<String>, file: File) -> Option<File> {
    self.files.entry(file.file_type).or_default().insert(name.into(), file)
  }

  pub fn get(&self, file_type: FileType, name: &str) -> Option<&File> {
    self.files.get(&file_type).and_then(|files| files.get(name))
  }

  /// Names of all items of one type, in sorted order.
  pub fn names(&self, file_type: FileType) -> impl Iterator<Item = &str> {
    self.files.get(&file_type).into_iter().flat_map(|files| files.keys().map(String::as_str))
  }

  pub fn len(&self) -> usize {
    self.files.values().map(BTreeMap::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
