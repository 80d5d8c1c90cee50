//! CLI command implementations.
//!
//! - `scan`: Show occupied ports in a range
//! - `allocate`: Allocate ports for services or a template
//! - `release`: Release one service or a whole project
//! - `status`: Show a project's allocations and URLs
//! - `generate`: Write artifacts for a project
//! - `up` / `down`: Run docker compose on the generated file
//! - `cleanup`: Purge released and stale records
//! - `doctor`: Report engine, detectors and store
//! - `templates`: List or show project templates
//! - `completions`: Generate shell completion scripts

pub mod allocate;
pub mod cleanup;
pub mod completions;
pub mod compose;
pub mod doctor;
pub mod generate;
pub mod release;
pub mod scan;
pub mod status;
pub mod templates;

pub use allocate::AllocateCommand;
pub use cleanup::CleanupCommand;
pub use completions::CompletionsCommand;
pub use compose::{DownCommand, UpCommand};
pub use doctor::DoctorCommand;
pub use generate::GenerateCommand;
pub use release::ReleaseCommand;
pub use scan::ScanCommand;
pub use status::StatusCommand;
pub use templates::TemplatesCommand;
