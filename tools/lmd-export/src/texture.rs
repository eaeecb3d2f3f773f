//! Texture file discovery
//!
//! LMD files name textures by their authoring file name (usually `.tga`),
//! while extracted game data ships them under other extensions. The resolver
//! searches a directory tree for the first plausible match.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Maps a texture file name from an LMD file to a file on disk
pub trait ResolveTexture {
    fn resolve(&self, file_name: &str) -> Option<PathBuf>;
}

/// Searches a directory tree (recursively) for texture files
#[derive(Debug, Clone)]
pub struct TextureResolver {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl TextureResolver {
    /// Index every file below `root`, in file-name order per directory
    pub fn new(root: &Path) -> Self {
        let files = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect::<Vec<_>>();

        tracing::debug!("Indexed {} file(s) under {:?}", files.len(), root);
        Self {
            root: root.to_path_buf(),
            files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn find(&self, pattern: &str) -> Option<PathBuf> {
        self.files
            .iter()
            .find(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| wildcard_match(pattern, name))
            })
            .cloned()
    }
}

impl ResolveTexture for TextureResolver {
    fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        candidate_patterns(file_name)
            .iter()
            .find_map(|pattern| self.find(pattern))
    }
}

/// Search patterns in priority order: exact name, then `.tga` replaced by
/// `.ktx.tga`, `.png`, `.ktx.png`, and finally `*.png`.
pub fn candidate_patterns(file_name: &str) -> Vec<String> {
    let mut patterns = vec![file_name.to_string()];
    for replacement in [".ktx.tga", ".png", ".ktx.png", "*.png"] {
        let pattern = file_name.replace(".tga", replacement);
        if !patterns.contains(&pattern) {
            patterns.push(pattern);
        }
    }
    patterns
}

/// Match `text` against `pattern`, where `*` matches any run of characters
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let remaining: Vec<&str> = parts.collect();
    let Some((last, middle)) = remaining.split_last() else {
        // No wildcard at all
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}
