//! OTBM Codec Configuration
//!
//! Loads codec settings from a `key = value` text file. Lines starting with
//! `#` are comments, unknown keys are ignored and a value that does not parse
//! keeps its default.
//!
//! ```text
//! # codec.txt
//! maxdepth = 64
//! unknownnodes = skip
//! unknownattributes = preserve
//! atomicwrite = true
//! ```

use otbm_core::{OtbmError, Result, UnknownAttributePolicy, UnknownNodePolicy};
use std::fs;
use std::path::Path;

/// Default limit on node nesting
///
/// Well-formed maps nest about five levels deep.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Hard ceiling on node nesting
///
/// Reader and writer recurse once per level, so any configured limit above
/// this is clamped to it.
pub const MAX_SUPPORTED_DEPTH: usize = 1024;

/// Settings shared by the reader, the writer and the file facade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Deepest node nesting accepted (from "maxdepth")
    pub max_depth: usize,
    /// Handling of unrecognized node kinds (from "unknownnodes")
    pub unknown_nodes: UnknownNodePolicy,
    /// Handling of unrecognized attribute tags (from "unknownattributes")
    pub unknown_attributes: UnknownAttributePolicy,
    /// Write through a temporary file and rename (from "atomicwrite")
    pub atomic_write: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            unknown_nodes: UnknownNodePolicy::Abort,
            unknown_attributes: UnknownAttributePolicy::Preserve,
            atomic_write: true,
        }
    }
}

impl CodecConfig {
    /// Load configuration from a settings file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse settings file content
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some(eq_pos) = line.find('=') else {
                return Err(OtbmError::Config(format!(
                    "line {}: expected key = value, got {:?}",
                    number + 1,
                    line
                )));
            };

            let key = line[..eq_pos].trim();
            let value = line[eq_pos + 1..].trim();
            config.parse_option(key, value);
        }

        if config.max_depth == 0 {
            return Err(OtbmError::Config("maxdepth must be at least 1".into()));
        }
        if config.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(OtbmError::Config(format!(
                "maxdepth {} exceeds the supported maximum of {}",
                config.max_depth, MAX_SUPPORTED_DEPTH
            )));
        }

        Ok(config)
    }

    /// Nesting limit actually enforced, never above [`MAX_SUPPORTED_DEPTH`]
    pub fn effective_max_depth(&self) -> usize {
        self.max_depth.min(MAX_SUPPORTED_DEPTH)
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        match key.to_lowercase().as_str() {
            "maxdepth" => match value.parse() {
                Ok(depth) => self.max_depth = depth,
                Err(_) => ignored(key, value),
            },
            "unknownnodes" => match value.to_lowercase().as_str() {
                "abort" => self.unknown_nodes = UnknownNodePolicy::Abort,
                "skip" => self.unknown_nodes = UnknownNodePolicy::Skip,
                _ => ignored(key, value),
            },
            "unknownattributes" => match value.to_lowercase().as_str() {
                "preserve" => self.unknown_attributes = UnknownAttributePolicy::Preserve,
                "discard" => self.unknown_attributes = UnknownAttributePolicy::Discard,
                _ => ignored(key, value),
            },
            "atomicwrite" => match value.parse() {
                Ok(atomic) => self.atomic_write = atomic,
                Err(_) => ignored(key, value),
            },
            _ => {
                tracing::debug!("Unknown config option: {} = {}", key, value);
            }
        }
    }

    /// Log the effective settings
    pub fn display(&self) {
        tracing::info!("Codec configuration:");
        tracing::info!("    Max depth: {}", self.max_depth);
        tracing::info!("    Unknown nodes: {:?}", self.unknown_nodes);
        tracing::info!("    Unknown attributes: {:?}", self.unknown_attributes);
        tracing::info!("    Atomic write: {}", self.atomic_write);
    }
}

fn ignored(key: &str, value: &str) {
    tracing::warn!("Ignoring invalid value for {}: {:?}", key, value);
}
