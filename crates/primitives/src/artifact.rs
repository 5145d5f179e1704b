use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Immutable bytes of one compiled unit, read fresh for every reload attempt.
#[derive(Clone)]
pub struct Artifact {
	bytes: Arc<[u8]>,
	origin: PathBuf,
}

impl Artifact {
	pub fn new(bytes: impl Into<Arc<[u8]>>, origin: impl Into<PathBuf>) -> Self {
		Self {
			bytes: bytes.into(),
			origin: origin.into(),
		}
	}

	/// Reads the whole file at `path`.
	pub fn read(path: &Path) -> std::io::Result<Self> {
		let bytes = std::fs::read(path)?;
		Ok(Self::new(bytes, path))
	}

	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}

	/// Path the bytes were read from.
	pub fn origin(&self) -> &Path {
		&self.origin
	}

	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}
}

impl std::fmt::Debug for Artifact {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Artifact")
			.field("origin", &self.origin)
			.field("len", &self.bytes.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn read_keeps_origin_and_bytes() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("Foo.so");
		std::fs::write(&path, b"\x7fELF").unwrap();

		let artifact = Artifact::read(&path).unwrap();
		assert_eq!(artifact.bytes(), b"\x7fELF");
		assert_eq!(artifact.origin(), path.as_path());
		assert_eq!(artifact.len(), 4);
	}

	#[test]
	fn read_missing_file_is_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let err = Artifact::read(&dir.path().join("gone.so")).unwrap_err();
		assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
	}
}
