use std::fs;
use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

const RESUME_DIR: &str = "resumes";

/// File part received from the application form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Where uploaded resumes are written. Paths are relative to the storage root.
pub trait ResumeStorage: Send + Sync {
    fn save(&self, upload: &ResumeUpload) -> Result<String, StorageError>;
    /// `Ok(None)` for unknown or unsafe paths.
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Writes resumes below `<root>/resumes/`, prefixing each name so uploads never collide.
#[derive(Debug, Clone)]
pub struct FilesystemResumeStorage {
    root: PathBuf,
}

impl FilesystemResumeStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResumeStorage for FilesystemResumeStorage {
    fn save(&self, upload: &ResumeUpload) -> Result<String, StorageError> {
        let relative = format!(
            "{RESUME_DIR}/{}-{}",
            Uuid::new_v4().simple(),
            sanitize_file_name(&upload.file_name)
        );
        let target = self.root.join(&relative);

        let write = |target: &Path| -> std::io::Result<()> {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, &upload.bytes)
        };
        write(&target).map_err(|source| StorageError::Write {
            path: relative.clone(),
            source,
        })?;

        tracing::debug!(path = %relative, bytes = upload.bytes.len(), "stored resume");
        Ok(relative)
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let Some(relative) = safe_relative_path(path) else {
            return Ok(None);
        };
        match fs::read(self.root.join(relative)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read {
                path: path.to_string(),
                source,
            }),
        }
    }
}

/// Keeps the final path segment and replaces anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "resume".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Only plain relative paths are served; `..`, roots and prefixes are refused.
pub fn safe_relative_path(path: &str) -> Option<PathBuf> {
    let candidate = Path::new(path);
    let mut relative = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_root() -> PathBuf {
        std::env::temp_dir().join(format!("job-board-media-{}", Uuid::new_v4()))
    }

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\My CV.pdf"), "My_CV.pdf");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "resume");
    }

    #[test]
    fn safe_relative_path_refuses_traversal() {
        assert!(safe_relative_path("resumes/a.pdf").is_some());
        assert!(safe_relative_path("../secret").is_none());
        assert!(safe_relative_path("/etc/passwd").is_none());
        assert!(safe_relative_path("resumes/../../x").is_none());
        assert!(safe_relative_path("").is_none());
    }

    #[test]
    fn saved_resumes_can_be_read_back() {
        let root = scratch_root();
        let storage = FilesystemResumeStorage::new(&root);
        let upload = ResumeUpload {
            file_name: "jane doe.pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        };

        let first = storage.save(&upload).expect("save succeeds");
        let second = storage.save(&upload).expect("save succeeds");
        assert_ne!(first, second, "every upload gets its own name");
        assert!(first.starts_with("resumes/"));
        assert!(first.ends_with("-jane_doe.pdf"));

        let stored = storage.read(&first).expect("read succeeds");
        assert_eq!(stored.as_deref(), Some(&b"%PDF-1.4"[..]));
        assert_eq!(storage.read("resumes/missing.pdf").expect("read"), None);
        assert_eq!(storage.read("../outside").expect("read"), None);

        let _ = fs::remove_dir_all(storage.root());
    }
}
