use super::{Transport, TransportError};
use std::{
    fs::File,
    io::{ErrorKind, Read},
    path::{Path, PathBuf, MAIN_SEPARATOR_STR},
};

/// A transport implementation backed by the local filesystem. Recognizes
/// `.ach`, `.txt` (fixed-width) and `.json` files anywhere under its root
/// directory, matching the extensions the File Source Aggregator reads.
#[derive(Clone, Debug)]
pub struct LocalFileTransport {
    directory: PathBuf,
}

impl LocalFileTransport {
    pub fn new(directory: PathBuf) -> LocalFileTransport {
        LocalFileTransport { directory }
    }

    fn relative_path(key: &str) -> PathBuf {
        PathBuf::from(key.replace('/', MAIN_SEPARATOR_STR))
    }

    fn has_recognized_extension(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("ach") | Some("txt") | Some("json")
        )
    }

    /// Recursively walks `dir`, appending every recognized file found to
    /// `out` as a path relative to `root`.
    fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), TransportError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| TransportError::Local(e, dir.display().to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| TransportError::Local(e, dir.display().to_string()))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(|e| TransportError::Local(e, path.display().to_string()))?;
            if file_type.is_dir() {
                Self::walk(root, &path, out)?;
            } else if file_type.is_file() && Self::has_recognized_extension(&path) {
                let relative = path.strip_prefix(root).unwrap_or(&path);
                out.push(relative.to_string_lossy().replace(MAIN_SEPARATOR_STR, "/"));
            }
        }
        Ok(())
    }
}

impl Transport for LocalFileTransport {
    fn path(&self) -> String {
        self.directory.to_string_lossy().to_string()
    }

    fn list(&self) -> Result<Vec<String>, TransportError> {
        let mut keys = Vec::new();
        Self::walk(&self.directory, &self.directory, &mut keys)?;
        keys.sort();
        Ok(keys)
    }

    fn get(&self, key: &str) -> Result<Box<dyn Read>, TransportError> {
        let path = self.directory.join(Self::relative_path(key));
        let f = File::open(&path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                TransportError::ObjectNotFound(key.to_owned())
            } else {
                TransportError::Local(err, path.display().to_string())
            }
        })?;
        Ok(Box::new(f))
    }
}
