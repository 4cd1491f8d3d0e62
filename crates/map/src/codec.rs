//! Map file facade
//!
//! Reads whole files into memory, hands them to the decoder, and writes the
//! encoder's output back in one go.

use bytes::Bytes;
use otbm_config::CodecConfig;
use otbm_core::{FormatIdentifier, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::node::Node;
use crate::reader::{self, DecodeStats};
use crate::writer;

/// A decoded map with the identifier it was stored under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDocument {
    pub identifier: FormatIdentifier,
    pub root: Node,
    #[serde(skip)]
    pub stats: DecodeStats,
}

impl MapDocument {
    /// Wrap a tree built in memory
    pub fn new(root: Node) -> Self {
        Self {
            identifier: FormatIdentifier::Zero,
            root,
            stats: DecodeStats::default(),
        }
    }

    /// Pretty-printed JSON form of the document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Map reader/writer bound to one configuration
#[derive(Debug, Clone, Default)]
pub struct MapCodec {
    config: CodecConfig,
}

impl MapCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Decode an in-memory map
    pub fn decode(&self, data: &[u8]) -> Result<MapDocument> {
        reader::decode(data, &self.config)
    }

    /// Read and decode a map file
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<MapDocument> {
        let path = path.as_ref();
        let data = fs::read(path)?;

        tracing::info!("Reading map {} ({} bytes)", path.display(), data.len());
        self.decode(&data)
    }

    /// Encode a tree into a byte buffer
    pub fn serialize(&self, root: &Node) -> Result<Bytes> {
        writer::encode(root, &self.config)
    }

    /// Encode a tree and write it to `path`
    ///
    /// With `atomic_write` on, the bytes go to `<path>.tmp` first and are
    /// renamed over `path`, so readers never see a partial file.
    pub fn write<P: AsRef<Path>>(&self, path: P, root: &Node) -> Result<()> {
        let path = path.as_ref();
        let data = self.serialize(root)?;

        if self.config.atomic_write {
            let tmp = temp_path(path);
            if let Err(err) = fs::write(&tmp, &data).and_then(|_| fs::rename(&tmp, path)) {
                discard_temp(&tmp);
                return Err(err.into());
            }
        } else {
            fs::write(path, &data)?;
        }

        tracing::info!("Wrote map {} ({} bytes)", path.display(), data.len());
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Remove a leftover temporary file after a failed write
fn discard_temp(tmp: &Path) {
    match fs::remove_file(tmp) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!("Could not remove temporary file {}: {}", tmp.display(), err);
        }
    }
}
