//! Read named entries out of a (possibly compressed) results tarball.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use thiserror::Error;
use xz2::read::XzDecoder;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BZIP2_MAGIC: [u8; 3] = *b"BZh";
const XZ_MAGIC: [u8; 6] = [0xfd, b'7', b'z', b'X', b'Z', 0x00];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read archive {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("archive {path} has no entry `{entry}`")]
    MissingEntry { path: PathBuf, entry: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    /// Sniff the compression from the first bytes of the file.
    pub fn detect(header: &[u8]) -> Self {
        if header.starts_with(&GZIP_MAGIC) {
            Compression::Gzip
        } else if header.starts_with(&BZIP2_MAGIC) {
            Compression::Bzip2
        } else if header.starts_with(&XZ_MAGIC) {
            Compression::Xz
        } else {
            Compression::None
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Compression::None => "uncompressed",
            Compression::Gzip => "gzip",
            Compression::Bzip2 => "bzip2",
            Compression::Xz => "xz",
        })
    }
}

/// Entries pulled from one archive, keyed by normalised path.
#[derive(Debug)]
pub struct ArchiveEntries {
    path: PathBuf,
    entries: BTreeMap<String, Vec<u8>>,
}

impl ArchiveEntries {
    pub fn take(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries.remove(name)
    }

    pub fn require(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        self.take(name).ok_or_else(|| ArchiveError::MissingEntry {
            path: self.path.clone(),
            entry: name.to_string(),
        })
    }
}

/// Read the `wanted` entries in a single pass over the archive.
///
/// Missing entries are not an error here; callers decide which ones they need.
pub fn read_entries(path: &Path, wanted: &[String]) -> Result<ArchiveEntries, ArchiveError> {
    let file = File::open(path).map_err(|source| ArchiveError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let read_err = |source| ArchiveError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = BufReader::new(file);
    let compression = Compression::detect(reader.fill_buf().map_err(read_err)?);
    log::debug!("reading {compression} archive {}", path.display());

    let decoded: Box<dyn Read> = match compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
        Compression::Bzip2 => Box::new(BzDecoder::new(reader)),
        Compression::Xz => Box::new(XzDecoder::new(reader)),
    };

    let mut archive = tar::Archive::new(decoded);
    let mut entries = BTreeMap::new();
    for entry in archive.entries().map_err(read_err)? {
        let mut entry = entry.map_err(read_err)?;
        let name = normalize_entry_name(&entry.path().map_err(read_err)?);
        if !wanted.iter().any(|w| *w == name) || entries.contains_key(&name) {
            continue;
        }

        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).map_err(read_err)?;
        entries.insert(name, bytes);
        if entries.len() == wanted.len() {
            break;
        }
    }

    Ok(ArchiveEntries {
        path: path.to_path_buf(),
        entries,
    })
}

fn normalize_entry_name(path: &Path) -> String {
    let name = path.to_string_lossy().replace('\\', "/");
    let mut name = name.as_str();
    while let Some(rest) = name.strip_prefix("./") {
        name = rest;
    }
    name.to_string()
}
