use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::config::Config;
use crate::error::AppError;

/// Where the bytes of a source file live.
#[derive(Clone)]
pub enum SourceData {
    Memory(Bytes),
    File(PathBuf),
}

impl fmt::Debug for SourceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceData::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
            SourceData::File(path) => write!(f, "File({})", path.display()),
        }
    }
}

/// File selected by the caller: a display name, a known size, and a way to read it.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    size: u64,
    data: SourceData,
}

impl SourceFile {
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            data: SourceData::Memory(bytes),
        }
    }

    /// Reads metadata only; the file is streamed later by the upload.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            AppError::Validation(format!("Cannot read {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(AppError::Validation(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                AppError::Validation(format!("{} has no usable file name", path.display()))
            })?
            .to_string();

        Ok(Self {
            name,
            size: metadata.len(),
            data: SourceData::File(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn data(&self) -> &SourceData {
        &self.data
    }

    /// Lowercase extension without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }

    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    /// Checks that must pass before any network call.
    pub fn validate(&self, config: &Config) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Please select a file first".to_string()));
        }

        let accepted = config.accepted_extensions();
        if !accepted.is_empty() {
            let ok = self
                .extension()
                .is_some_and(|ext| accepted.iter().any(|a| *a == ext));
            if !ok {
                return Err(AppError::Validation(format!(
                    "Please upload a valid .{} file",
                    accepted.join(" / .")
                )));
            }
        }

        if self.size == 0 {
            return Err(AppError::Validation(format!("{} is empty", self.name)));
        }

        if let Some(limit) = config.max_upload_bytes() {
            if self.size > limit {
                return Err(AppError::TooLarge {
                    size: self.size,
                    limit,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_extension_case_insensitively() {
        let config = Config::default();
        assert!(SourceFile::from_bytes("Model.3DM", vec![1u8; 4])
            .validate(&config)
            .is_ok());
        let err = SourceFile::from_bytes("model.obj", vec![1u8; 4])
            .validate(&config)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_empty_and_oversized_files() {
        let config = Config::default().with_max_upload_bytes(Some(8));
        assert!(matches!(
            SourceFile::from_bytes("a.3dm", Vec::<u8>::new()).validate(&config),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            SourceFile::from_bytes("a.3dm", vec![0u8; 9]).validate(&config),
            Err(AppError::TooLarge { size: 9, limit: 8 })
        ));
    }

    #[test]
    fn any_extension_when_list_is_empty() {
        let config = Config::default().with_accepted_extensions(Vec::new());
        assert!(SourceFile::from_bytes("notes", vec![1u8]).validate(&config).is_ok());
    }

    #[tokio::test]
    async fn open_reads_size_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.3dm");
        std::fs::write(&path, b"0123456789").unwrap();

        let source = SourceFile::open(&path).await.unwrap();
        assert_eq!(source.name(), "part.3dm");
        assert_eq!(source.stem(), "part");
        assert_eq!(source.size(), 10);
        assert!(matches!(source.data(), SourceData::File(_)));

        assert!(SourceFile::open(dir.path().join("missing.3dm")).await.is_err());
    }
}
