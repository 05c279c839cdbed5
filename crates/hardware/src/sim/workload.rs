//! Workload resources and providers.
//!
//! This module locates and loads the program a board runs. It provides:
//! 1. **Images:** An entry point plus loadable segments.
//! 2. **Providers:** The `ResourceProvider` trait, injected into `Board::set_workload`
//!    in place of any global registry, with in-memory and directory-backed implementations.
//! 3. **Formats:** ELF executables (via `object`) or flat binaries placed at the memory base.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use object::{Architecture, Object, ObjectSegment};
use tracing::debug;

use crate::common::error::ResourceNotFoundError;

/// ELF magic bytes.
const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// One loadable region of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Physical load address.
    pub addr: u64,
    /// Initialized contents.
    pub data: Vec<u8>,
}

/// Program image: entry point and segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadImage {
    /// Address of the first instruction.
    pub entry: u64,
    /// Loadable segments.
    pub segments: Vec<Segment>,
}

impl WorkloadImage {
    /// A flat binary placed at `load_base` and entered at its first byte.
    pub fn flat(bytes: Vec<u8>, load_base: u64) -> Self {
        Self {
            entry: load_base,
            segments: vec![Segment {
                addr: load_base,
                data: bytes,
            }],
        }
    }

    /// Parses an ELF64 RISC-V executable.
    ///
    /// # Errors
    ///
    /// `ResourceNotFoundError::Malformed` for anything other than a loadable RV64 ELF.
    pub fn from_elf(id: &str, bytes: &[u8]) -> Result<Self, ResourceNotFoundError> {
        let malformed = |reason: String| ResourceNotFoundError::Malformed {
            id: id.to_string(),
            reason,
        };
        let file = object::File::parse(bytes).map_err(|e| malformed(e.to_string()))?;
        if file.architecture() != Architecture::Riscv64 {
            return Err(malformed(format!(
                "expected a RISC-V 64-bit executable, found {:?}",
                file.architecture()
            )));
        }
        let mut segments = Vec::new();
        for segment in file.segments() {
            let data = segment.data().map_err(|e| malformed(e.to_string()))?;
            if data.is_empty() {
                continue;
            }
            segments.push(Segment {
                addr: segment.address(),
                data: data.to_vec(),
            });
        }
        if segments.is_empty() {
            return Err(malformed("no loadable segments".to_string()));
        }
        Ok(Self {
            entry: file.entry(),
            segments,
        })
    }

    /// Decodes raw bytes as ELF if they carry the ELF magic, otherwise as a flat binary.
    ///
    /// # Errors
    ///
    /// `Malformed` for an empty file or a broken ELF.
    pub fn from_bytes(
        id: &str,
        bytes: Vec<u8>,
        load_base: u64,
    ) -> Result<Self, ResourceNotFoundError> {
        if bytes.is_empty() {
            return Err(ResourceNotFoundError::Malformed {
                id: id.to_string(),
                reason: "file is empty".to_string(),
            });
        }
        if bytes.starts_with(ELF_MAGIC) {
            Self::from_elf(id, &bytes)
        } else {
            Ok(Self::flat(bytes, load_base))
        }
    }
}

/// A resolved workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadResource {
    /// Identifier it was resolved from.
    pub id: String,
    /// Program image.
    pub image: WorkloadImage,
}

/// Source of workload resources.
///
/// `load_base` is where a flat binary is placed; providers of relocated
/// formats ignore it.
pub trait ResourceProvider {
    /// Resolves `id` to a loadable resource.
    ///
    /// # Errors
    ///
    /// `ResourceNotFoundError` if the identifier is unknown or unreadable.
    fn resolve(&self, id: &str, load_base: u64) -> Result<WorkloadResource, ResourceNotFoundError>;
}

/// Provider over images registered in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    images: HashMap<String, Entry>,
}

#[derive(Debug, Clone)]
enum Entry {
    Image(WorkloadImage),
    Flat(Vec<u8>),
}

impl InMemoryProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a complete image.
    #[must_use]
    pub fn with_image(mut self, id: impl Into<String>, image: WorkloadImage) -> Self {
        let _ = self.images.insert(id.into(), Entry::Image(image));
        self
    }

    /// Registers a flat binary that will be placed at the memory base.
    #[must_use]
    pub fn with_flat(mut self, id: impl Into<String>, bytes: Vec<u8>) -> Self {
        let _ = self.images.insert(id.into(), Entry::Flat(bytes));
        self
    }
}

impl ResourceProvider for InMemoryProvider {
    fn resolve(&self, id: &str, load_base: u64) -> Result<WorkloadResource, ResourceNotFoundError> {
        let image = match self.images.get(id) {
            Some(Entry::Image(image)) => image.clone(),
            Some(Entry::Flat(bytes)) => WorkloadImage::flat(bytes.clone(), load_base),
            None => return Err(ResourceNotFoundError::Unknown(id.to_string())),
        };
        Ok(WorkloadResource {
            id: id.to_string(),
            image,
        })
    }
}

/// Provider resolving identifiers to files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    /// Creates a provider rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, id: &str) -> Option<PathBuf> {
        let relative = Path::new(id);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if id.is_empty() || !contained {
            return None;
        }
        let path = self.root.join(relative);
        path.is_file().then_some(path)
    }
}

impl ResourceProvider for DirectoryProvider {
    fn resolve(&self, id: &str, load_base: u64) -> Result<WorkloadResource, ResourceNotFoundError> {
        let path = self
            .locate(id)
            .ok_or_else(|| ResourceNotFoundError::Unknown(id.to_string()))?;
        let bytes = fs::read(&path).map_err(|source| ResourceNotFoundError::Io {
            id: id.to_string(),
            source,
        })?;
        debug!(id, path = %path.display(), bytes = bytes.len(), "workload file read");
        Ok(WorkloadResource {
            id: id.to_string(),
            image: WorkloadImage::from_bytes(id, bytes, load_base)?,
        })
    }
}
