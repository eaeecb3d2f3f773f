//! lmd-export library
//!
//! Converts decoded LMD models into JSON scene documents, resolving texture
//! files on disk along the way.

pub mod convert;
pub mod manifest;
pub mod scene;
pub mod texture;

pub use scene::{ExportScene, build_scene};
pub use texture::{ResolveTexture, TextureResolver};
