//! Form 8949 generation
//!
//! This crate turns a CSV of capital asset sales into filled Form 8949 pages.
//!
//! The flow for one request:
//! - `ingest` / `record`: read the CSV and normalize each row into a record
//! - `partition`: split short-term from long-term, paginate 14 rows per page
//! - `render` / `merge`: draw each page at fixed coordinates and stamp it onto
//!   the official form (`template`), or draw a standalone page (`fallback`)
//! - `output` / `archive`: one PDF, or a zip when there are several

pub mod archive;
pub mod error;
pub mod fallback;
pub mod fonts;
pub mod ingest;
pub mod layout;
pub mod merge;
pub mod normalize;
pub mod output;
pub mod partition;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod template;

pub use error::{FormError, NoRecordsReason};
pub use ingest::InputVariant;
pub use layout::{LayoutProfile, LayoutRegistry};
pub use output::{Deliverable, GenerationReport, OutputDocument, RenderPath, Summary};
pub use partition::{Partition, PAGE_CAPACITY};
pub use pipeline::{build, generate, GenerationConfig};
pub use record::{TaxYear, TransactionRecord, Warning};
pub use render::{BoxSelection, Taxpayer};
pub use template::{
    FileTemplateSource, HttpTemplateSource, OfflineTemplateSource, TemplateCatalog,
    TemplateOutcome, TemplateSource,
};
