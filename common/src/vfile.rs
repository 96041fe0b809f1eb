use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use ahash::AHashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VFileError {
    #[error("{0:?} file not found")]
    NotFound(String),
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A file opened through a [`VFileProvider`]. Owns its bytes.
#[derive(Default, Clone, Debug)]
pub struct VFile {
    pub path: String,
    pub data: Vec<u8>,
}

/// Read-only, hierarchical source of game files (archive, directory or memory).
pub trait VFileProvider {
    fn open(&self, path: &str) -> Result<VFile, VFileError>;

    fn exists(&self, path: &str) -> bool;
}

/// Forward slashes, no leading slash. Source paths are case insensitive.
pub fn normalise_path(path: &str) -> String {
    path.replace('\\', "/")
        .trim_start_matches('/')
        .to_ascii_lowercase()
}

#[derive(Default, Clone)]
pub struct VFileSystem {
    pub files: Arc<AHashMap<String, VFile>>,
}

impl VFileSystem {
    pub fn insert(&mut self, path: &str, data: Vec<u8>) {
        let key = normalise_path(path);
        Arc::make_mut(&mut self.files).insert(
            key,
            VFile {
                path: path.replace('\\', "/"),
                data,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl VFileProvider for VFileSystem {
    fn open(&self, path: &str) -> Result<VFile, VFileError> {
        match self.files.get(&normalise_path(path)) {
            Some(file) => Ok(file.clone()),
            None => {
                log::debug!("{:?} file not found", path);
                Err(VFileError::NotFound(path.to_owned()))
            }
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(&normalise_path(path))
    }
}

/// Files on disk below `root`. Lookups are as case sensitive as the host file system.
#[derive(Clone, Debug)]
pub struct VDirFileSystem {
    root: PathBuf,
}

impl VDirFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        for part in path.replace('\\', "/").split('/').filter(|p| !p.is_empty()) {
            full.push(part);
        }
        full
    }
}

impl VFileProvider for VDirFileSystem {
    fn open(&self, path: &str) -> Result<VFile, VFileError> {
        let full = self.full_path(path);
        match fs::read(&full) {
            Ok(data) => Ok(VFile {
                path: path.replace('\\', "/"),
                data,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("{:?} file not found", full);
                Err(VFileError::NotFound(path.to_owned()))
            }
            Err(source) => Err(VFileError::Io {
                path: path.to_owned(),
                source,
            }),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.full_path(path).is_file()
    }
}

/// Search path of providers, the first one holding a file wins.
#[derive(Default)]
pub struct VLayeredFileSystem {
    layers: Vec<Box<dyn VFileProvider + Send + Sync>>,
}

impl VLayeredFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, layer: impl VFileProvider + Send + Sync + 'static) {
        self.layers.push(Box::new(layer));
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl VFileProvider for VLayeredFileSystem {
    fn open(&self, path: &str) -> Result<VFile, VFileError> {
        for layer in &self.layers {
            match layer.open(path) {
                Ok(file) => return Ok(file),
                Err(VFileError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(VFileError::NotFound(path.to_owned()))
    }

    fn exists(&self, path: &str) -> bool {
        self.layers.iter().any(|l| l.exists(path))
    }
}
