use std::path::{Component, Path, PathBuf};

use crate::UnitId;

/// Maps unit identities to source and artifact paths under one root.
///
/// `a.b.Foo` with extension `rs` lives at `<root>/a/b/Foo.rs`; its artifact
/// sits next to it with the toolchain's extension. Paths are recomputed on
/// every call so edits on disk are always seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
	root: PathBuf,
	source_extension: String,
}

impl SourceLayout {
	/// The root is made absolute against the current directory.
	pub fn new(root: impl Into<PathBuf>, source_extension: impl Into<String>) -> Self {
		let root = root.into();
		let root = std::path::absolute(&root).unwrap_or(root);
		Self {
			root,
			source_extension: source_extension.into(),
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn source_extension(&self) -> &str {
		&self.source_extension
	}

	pub fn source_path(&self, unit: &UnitId) -> PathBuf {
		self.path_with_extension(unit, &self.source_extension)
	}

	pub fn artifact_path(&self, unit: &UnitId, artifact_extension: &str) -> PathBuf {
		self.path_with_extension(unit, artifact_extension)
	}

	/// Reverses [`Self::source_path`]. Returns `None` for paths outside the
	/// root, with another extension, or whose components are not identifiers.
	pub fn unit_for(&self, path: &Path) -> Option<UnitId> {
		if path.extension()?.to_str()? != self.source_extension {
			return None;
		}
		let relative = path.strip_prefix(&self.root).ok()?.with_extension("");
		let mut name = String::new();
		for component in relative.components() {
			let Component::Normal(segment) = component else {
				return None;
			};
			if !name.is_empty() {
				name.push(UnitId::SEPARATOR);
			}
			name.push_str(segment.to_str()?);
		}
		UnitId::new(name).ok()
	}

	fn path_with_extension(&self, unit: &UnitId, extension: &str) -> PathBuf {
		let mut path = self.root.clone();
		path.extend(unit.segments());
		path.set_extension(extension);
		path
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn layout() -> SourceLayout {
		SourceLayout::new("/srv/units", "rs")
	}

	#[test]
	fn source_path_nests_segments() {
		let unit = UnitId::new("a.b.Foo").unwrap();
		assert_eq!(layout().source_path(&unit), PathBuf::from("/srv/units/a/b/Foo.rs"));
		assert_eq!(layout().artifact_path(&unit, "so"), PathBuf::from("/srv/units/a/b/Foo.so"));
	}

	#[test]
	fn unit_for_reverses_source_path() {
		let unit = UnitId::new("a.b.Foo").unwrap();
		let path = layout().source_path(&unit);
		assert_eq!(layout().unit_for(&path), Some(unit));
	}

	#[test]
	fn unit_for_rejects_foreign_paths() {
		assert_eq!(layout().unit_for(Path::new("/srv/units/a/Foo.so")), None);
		assert_eq!(layout().unit_for(Path::new("/elsewhere/a/Foo.rs")), None);
		assert_eq!(layout().unit_for(Path::new("/srv/units/a-b/Foo.rs")), None);
	}

	#[test]
	fn relative_root_becomes_absolute() {
		let layout = SourceLayout::new("units", "rs");
		assert!(layout.root().is_absolute());
	}
}
