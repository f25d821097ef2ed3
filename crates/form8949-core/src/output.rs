use std::fmt;

use serde::Serialize;

use crate::archive::build_archive;
use crate::error::FormError;
use crate::partition::{Partition, Totals};
use crate::record::Warning;

/// How a page was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RenderPath {
    /// Overlay merged onto the official form.
    Template,
    /// Standalone page, no base form.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub partition: Partition,
    /// 1-based within the partition.
    pub page_number: usize,
    pub render_path: RenderPath,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartSummary {
    pub records: usize,
    pub pages: usize,
    pub totals: Totals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub tax_year: i32,
    pub rows_read: usize,
    pub records: usize,
    pub out_of_year: usize,
    pub skipped_action: usize,
    pub rejected: usize,
    pub short_term: PartSummary,
    pub long_term: PartSummary,
    pub template_pages: usize,
    pub fallback_pages: usize,
    /// Why the base form could not be used, if it could not.
    pub template_unavailable: Option<String>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Tax year {}: {} of {} rows reported ({} outside the year, {} skipped, {} rejected)",
            self.tax_year,
            self.records,
            self.rows_read,
            self.out_of_year,
            self.skipped_action,
            self.rejected
        )?;
        for (label, part) in [("Short-term", &self.short_term), ("Long-term", &self.long_term)] {
            if part.records == 0 {
                continue;
            }
            writeln!(
                f,
                "  {}: {} records on {} pages, proceeds {}, cost basis {}, gain/loss {}",
                label,
                part.records,
                part.pages,
                part.totals.proceeds,
                part.totals.cost_basis,
                part.totals.gain_loss
            )?;
        }
        write!(
            f,
            "  Pages: {} on the official form, {} standalone",
            self.template_pages, self.fallback_pages
        )?;
        if let Some(reason) = &self.template_unavailable {
            write!(f, " (base form unavailable: {})", reason)?;
        }
        Ok(())
    }
}

/// What the caller should hand to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum Deliverable {
    Pdf { filename: String, bytes: Vec<u8> },
    Archive { filename: String, bytes: Vec<u8> },
}

impl Deliverable {
    pub fn filename(&self) -> &str {
        match self {
            Deliverable::Pdf { filename, .. } | Deliverable::Archive { filename, .. } => filename,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Deliverable::Pdf { bytes, .. } | Deliverable::Archive { bytes, .. } => bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub documents: Vec<OutputDocument>,
    pub warnings: Vec<Warning>,
    pub summary: Summary,
    pub archive_name: String,
}

impl GenerationReport {
    /// The document itself when there is exactly one, otherwise a zip of all
    /// of them.
    pub fn single_or_archive(&self) -> Result<Deliverable, FormError> {
        match self.documents.as_slice() {
            [only] => Ok(Deliverable::Pdf {
                filename: only.filename.clone(),
                bytes: only.bytes.clone(),
            }),
            documents => Ok(Deliverable::Archive {
                filename: self.archive_name.clone(),
                bytes: build_archive(documents)?,
            }),
        }
    }
}
