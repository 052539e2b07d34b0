//! Snapshot naming
//!
//! - `template`: renders filenames from templates and a clock reading
//! - `artifact`: storage keys and the `.gz` suffix convention

mod artifact;
mod template;

pub use artifact::{strip_gz_suffix, with_gz_suffix, SnapshotArtifact, GZ_SUFFIX};
pub use template::{check_file_name, render, TemplateVars};
