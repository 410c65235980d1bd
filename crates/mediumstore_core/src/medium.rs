//! Medium identities: the data sources a store can work on.
//!
//! A [`Medium`] describes *what* is accessed (a file, a shared memory
//! buffer or an input stream) together with its capabilities and its
//! [`MediumConfig`]. It never performs I/O itself; that is the job of the
//! accessor built for it.

use crate::config::MediumConfig;
use crate::error::{StoreError, StoreResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

static NEXT_MEDIUM_ID: AtomicU64 = AtomicU64::new(1);

/// File paths already assigned an identity, so that two mediums over the
/// same file compare equal.
///
/// Entries are never removed: the registry holds one id per distinct file
/// for the life of the process.
static FILE_IDS: LazyLock<Mutex<HashMap<PathBuf, u64>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Identity of the resource behind a medium.
///
/// Two ids are equal iff they denote the same file path or the same memory
/// buffer or stream instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediumId(u64);

impl MediumId {
    fn unique() -> Self {
        Self(NEXT_MEDIUM_ID.fetch_add(1, Ordering::Relaxed))
    }

    fn for_path(path: &Path) -> Self {
        let key = registry_key(path);
        let mut ids = FILE_IDS.lock();
        let id = *ids
            .entry(key)
            .or_insert_with(|| NEXT_MEDIUM_ID.fetch_add(1, Ordering::Relaxed));
        Self(id)
    }

    /// Returns the raw identity value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Normalizes `path` so that spellings of one file share a key, whether or
/// not the file exists yet.
fn registry_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|parent| parent.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}

impl fmt::Display for MediumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "medium#{}", self.0)
    }
}

/// Whether a medium may be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediumAccess {
    /// Reads only; every edit, write or flush is rejected.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

/// The reader behind a stream medium; taken by the accessor on open.
pub(crate) type StreamSource = Arc<Mutex<Option<Box<dyn Read + Send>>>>;

#[derive(Clone)]
pub(crate) enum MediumKind {
    File { path: PathBuf },
    Memory { content: Arc<RwLock<Vec<u8>>> },
    Stream { source: StreamSource },
}

/// A byte-addressable data source or sink.
///
/// # Example
///
/// ```rust
/// use mediumstore_core::{Medium, MediumAccess, MediumConfig};
///
/// let medium = Medium::memory(b"hello".to_vec(), MediumAccess::ReadWrite, MediumConfig::default()).unwrap();
/// assert!(medium.is_random_access());
/// assert_eq!(medium.current_length(), Some(5));
/// ```
#[derive(Clone)]
pub struct Medium {
    id: MediumId,
    name: String,
    kind: MediumKind,
    access: MediumAccess,
    config: MediumConfig,
}

impl Medium {
    /// Creates a file-backed medium.
    ///
    /// The file is not touched until a store over this medium is opened.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the configuration is invalid.
    pub fn file(
        path: impl AsRef<Path>,
        access: MediumAccess,
        config: MediumConfig,
    ) -> StoreResult<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        Ok(Self {
            id: MediumId::for_path(&path),
            name: path.display().to_string(),
            kind: MediumKind::File { path },
            access,
            config,
        })
    }

    /// Creates a medium over an in-memory byte buffer.
    ///
    /// Clones of the returned medium share the buffer, so bytes written back
    /// by a flush are visible through [`Medium::content`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the configuration is invalid.
    pub fn memory(
        content: Vec<u8>,
        access: MediumAccess,
        config: MediumConfig,
    ) -> StoreResult<Self> {
        config.validate()?;
        let id = MediumId::unique();
        Ok(Self {
            id,
            name: format!("memory#{}", id.0),
            kind: MediumKind::Memory {
                content: Arc::new(RwLock::new(content)),
            },
            access,
            config,
        })
    }

    /// Creates a sequential, read-only medium over an input stream.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the configuration is invalid.
    pub fn stream(
        reader: impl Read + Send + 'static,
        name: impl Into<String>,
        config: MediumConfig,
    ) -> StoreResult<Self> {
        config.validate()?;
        let reader: Box<dyn Read + Send> = Box::new(reader);
        Ok(Self {
            id: MediumId::unique(),
            name: name.into(),
            kind: MediumKind::Stream {
                source: Arc::new(Mutex::new(Some(reader))),
            },
            access: MediumAccess::ReadOnly,
            config,
        })
    }

    /// Returns the identity of the underlying resource.
    #[must_use]
    pub fn id(&self) -> MediumId {
        self.id
    }

    /// Returns a human-readable name of the medium.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration of the medium.
    #[must_use]
    pub fn config(&self) -> &MediumConfig {
        &self.config
    }

    /// Returns the access mode of the medium.
    #[must_use]
    pub fn access(&self) -> MediumAccess {
        self.access
    }

    /// Returns true if the medium can't be written.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.access == MediumAccess::ReadOnly
    }

    /// Returns true if bytes can be read at arbitrary offsets.
    #[must_use]
    pub fn is_random_access(&self) -> bool {
        !matches!(self.kind, MediumKind::Stream { .. })
    }

    /// Returns the file path for file media.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            MediumKind::File { path } => Some(path),
            _ => None,
        }
    }

    /// Returns true if the underlying resource exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        match &self.kind {
            MediumKind::File { path } => path.is_file(),
            MediumKind::Memory { .. } | MediumKind::Stream { .. } => true,
        }
    }

    /// Returns the current length in bytes, or `None` if it is unknown
    /// (streams, missing files).
    #[must_use]
    pub fn current_length(&self) -> Option<u64> {
        match &self.kind {
            MediumKind::File { path } => std::fs::metadata(path).ok().map(|m| m.len()),
            MediumKind::Memory { content } => Some(content.read().len() as u64),
            MediumKind::Stream { .. } => None,
        }
    }

    /// Returns a copy of the content of an in-memory medium.
    #[must_use]
    pub fn content(&self) -> Option<Vec<u8>> {
        match &self.kind {
            MediumKind::Memory { content } => Some(content.read().clone()),
            _ => None,
        }
    }

    /// Replaces the content of an in-memory medium.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` for any other kind of medium.
    pub fn set_content(&self, bytes: Vec<u8>) -> StoreResult<()> {
        match &self.kind {
            MediumKind::Memory { content } => {
                *content.write() = bytes;
                Ok(())
            }
            _ => Err(StoreError::unsupported(format!(
                "content replacement on non-memory medium {}",
                self.name
            ))),
        }
    }

    pub(crate) fn kind(&self) -> &MediumKind {
        &self.kind
    }
}

impl PartialEq for Medium {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Medium {}

impl fmt::Debug for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            MediumKind::File { .. } => "file",
            MediumKind::Memory { .. } => "memory",
            MediumKind::Stream { .. } => "stream",
        };
        f.debug_struct("Medium")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &kind)
            .field("access", &self.access)
            .field("config", &self.config)
            .finish()
    }
}
