//! Core building blocks for compiling module manifests into command files.
//!
//! - [`naming`] maps artifact identity to flat output filenames and back.
//! - [`manifest`] loads typed artifact records from CSV/YAML manifests.
//! - [`customize`] layers user overlays onto vendor agent definitions.

pub mod customize;
pub mod error;
pub mod manifest;
pub mod model;
pub mod naming;

pub use customize::{merge, Overlay, OverlayLoad};
pub use error::CoreError;
pub use manifest::{ManifestFormat, ManifestSchema, Variables};
pub use model::{AgentDefinition, ArtifactRecord, ArtifactType};
pub use naming::{NamingConvention, ParsedName};
