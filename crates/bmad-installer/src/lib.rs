//! Installation lifecycle for bmad module content.
//!
//! The [`Installer`] drives one pass of the pipeline:
//! module content is copied into `<project>/<bmad-folder>/`, per-type
//! manifests are generated and loaded back, agents are compiled with their
//! user overlays, and a pointer command file is written for every artifact in
//! every selected IDE's command directory. The installation manifest is written
//! last, so a failed run never leaves it describing files that were not written.

pub mod compiler;
pub mod config;
pub mod error;
pub mod files;
pub mod generator;
pub mod ide;
pub mod layout;
pub mod lifecycle;
pub mod modules;
pub mod result;
pub mod scan;
pub mod state;
pub mod status;
pub mod uninstall;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ActionRequest, CoreSettings, InstallConfig};
pub use error::InstallError;
pub use generator::{ArtifactGenerator, GenerateOutcome, GeneratedFile};
pub use ide::IdeTarget;
pub use layout::Layout;
pub use lifecycle::{Action, AutoConfirm, Confirm, InstallPlan, InstallState, Installer};
pub use result::InstallResult;
pub use state::InstallationManifest;
pub use status::{read_status, InstallStatus, ModuleUpdate, Status};
pub use uninstall::{UninstallOptions, UninstallPhase, UninstallReport};
