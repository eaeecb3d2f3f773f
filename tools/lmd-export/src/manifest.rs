//! Batch conversion manifest
//!
//! Parses `lmd.toml`:
//!
//! ```toml
//! [output]
//! dir = "export/"
//!
//! [[model]]
//! input = "pm0001_00.lmd"
//! version = "1.0"
//! textures = "textures/"
//! output = "pm0001.json"
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lmd_format::FormatVersion;
use serde::Deserialize;

use crate::convert::convert_model;

/// Root manifest structure
#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default, rename = "model")]
    pub models: Vec<ModelEntry>,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize)]
pub struct ModelEntry {
    pub input: PathBuf,
    /// Layout version, `"1.0"` or `"1.2+"` (default)
    #[serde(default)]
    pub version: Option<String>,
    /// Texture search root (defaults to the input's directory)
    #[serde(default)]
    pub textures: Option<PathBuf>,
    /// Output file name inside the output directory
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl ModelEntry {
    pub fn format_version(&self) -> Result<FormatVersion> {
        match &self.version {
            Some(v) => v
                .parse()
                .with_context(|| format!("Model {:?}: bad version", self.input)),
            None => Ok(FormatVersion::default()),
        }
    }

    /// Output file name: explicit, or the input stem with `.json`
    pub fn output_name(&self) -> PathBuf {
        match &self.output {
            Some(output) => output.clone(),
            None => {
                let stem = self
                    .input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "model".to_string());
                PathBuf::from(format!("{}.json", stem))
            }
        }
    }
}

/// Load and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    let mut manifest = parse_manifest(&content)
        .with_context(|| format!("Failed to parse manifest: {:?}", path))?;
    manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(manifest)
}

/// Parse manifest text; relative paths resolve against the working directory
pub fn parse_manifest(content: &str) -> Result<Manifest> {
    Ok(toml::from_str(content)?)
}

impl Manifest {
    fn resolve(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }
}

/// Validate a manifest without building
pub fn validate(manifest: &Manifest) -> Result<()> {
    if manifest.models.is_empty() {
        anyhow::bail!("Manifest lists no models");
    }
    for entry in &manifest.models {
        let input = manifest.resolve(&entry.input);
        if !input.exists() {
            anyhow::bail!("Model source not found: {:?}", input);
        }
        entry.format_version()?;
        if let Some(textures) = &entry.textures {
            let textures = manifest.resolve(textures);
            if !textures.is_dir() {
                anyhow::bail!("Texture directory not found: {:?}", textures);
            }
        }
    }
    Ok(())
}

/// Convert every model in a manifest, returning the number written
pub fn build_all(manifest: &Manifest, output_override: Option<&Path>) -> Result<usize> {
    let output_dir = match output_override {
        Some(dir) => dir.to_path_buf(),
        None => manifest.resolve(&manifest.output.dir),
    };
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

    for entry in &manifest.models {
        let input = manifest.resolve(&entry.input);
        let output = output_dir.join(entry.output_name());
        let textures = entry.textures.as_deref().map(|t| manifest.resolve(t));
        tracing::info!("Converting model: {:?} -> {:?}", input, output);

        convert_model(&input, &output, entry.format_version()?, textures.as_deref())?;
    }

    Ok(manifest.models.len())
}
