//! Output generation for run reports.
//!
//! # Submodules
//!
//! - [`json`]: Writes the per-feed [`RunSummary`](crate::models::RunSummary)
//!   list of a run to a JSON file
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── 083000.json
//!     └── 143000.json
//! ```

pub mod json;
