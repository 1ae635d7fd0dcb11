//! # panel-align
//!
//! Builds labeled datasets from keyed panels. A feature ("factor") panel and
//! an outcome ("return") panel, both keyed by (entity, date), are joined so
//! that every feature observation is paired with the outcome recorded at the
//! entity's *next* feature date.
//!
//! ## Example
//!
//! ```rust,no_run
//! use panel_align::prelude::*;
//!
//! let config = MergeConfig::new("combined_factors.parquet", "returns.parquet", "total.parquet");
//! let (table, report) = merge_files(&config)?;
//! println!("{} rows, shape {}", table.len(), report.output_shape);
//! # Ok::<(), AlignError>(())
//! ```

pub mod align;
pub mod config;
pub mod error;
pub mod io;
pub mod panel;
pub mod pipeline;
pub mod table;
pub mod types;

pub mod prelude {
    //! Commonly used types and functions
    pub use crate::align::{align_entity, merge, merge_with, MergeOptions, MergeOutcome, MergeStats};
    pub use crate::config::{KeySchema, MergeConfig};
    pub use crate::error::{AlignError, Result};
    pub use crate::io::{load_panel, write_table, TableFormat};
    pub use crate::panel::Panel;
    pub use crate::pipeline::{merge_files, MergeReport};
    pub use crate::table::CombinedTable;
    pub use crate::types::*;
}
