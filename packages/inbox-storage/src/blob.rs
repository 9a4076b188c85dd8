//! Local media bucket.
//!
//! Objects live at `<root>/<bucket>/<storage_path>`. Storage paths are relative and may not leave
//! the bucket.

use std::{
	io::ErrorKind,
	path::{Component, Path, PathBuf},
};

use crate::{Error, Result};

#[derive(Clone, Debug)]
pub struct BlobStore {
	base: PathBuf,
}
impl BlobStore {
	pub fn new(cfg: &inbox_config::Media) -> Self {
		Self { base: cfg.root.join(&cfg.bucket) }
	}

	pub fn base(&self) -> &Path {
		&self.base
	}

	/// Writes the object, replacing any previous content.
	pub async fn put(&self, storage_path: &str, bytes: &[u8]) -> Result<()> {
		let path = self.resolve(storage_path)?;

		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}

		tokio::fs::write(&path, bytes).await?;

		Ok(())
	}

	pub async fn get(&self, storage_path: &str) -> Result<Vec<u8>> {
		let path = self.resolve(storage_path)?;

		match tokio::fs::read(&path).await {
			Ok(bytes) => Ok(bytes),
			Err(err) if err.kind() == ErrorKind::NotFound =>
				Err(Error::NotFound(format!("media object {storage_path}"))),
			Err(err) => Err(err.into()),
		}
	}

	/// Removes the object. A missing object counts as removed.
	pub async fn delete(&self, storage_path: &str) -> Result<()> {
		let path = self.resolve(storage_path)?;

		match tokio::fs::remove_file(&path).await {
			Ok(()) => Ok(()),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
			Err(err) => Err(err.into()),
		}
	}

	fn resolve(&self, storage_path: &str) -> Result<PathBuf> {
		let relative = Path::new(storage_path);
		let valid = !storage_path.is_empty()
			&& relative.components().all(|component| matches!(component, Component::Normal(_)));

		if !valid {
			return Err(Error::InvalidArgument(format!(
				"storage path {storage_path:?} must be relative and stay inside the bucket."
			)));
		}

		Ok(self.base.join(relative))
	}
}
