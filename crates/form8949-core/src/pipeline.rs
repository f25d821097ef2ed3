//! End-to-end generation for one request
//!
//! CSV bytes in, finished documents out. All inputs that change the result
//! arrive in [`GenerationConfig`]; nothing is shared between requests.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FormError, NoRecordsReason};
use crate::fallback::render_fallback;
use crate::ingest::{read_rows, InputVariant};
use crate::layout::LayoutRegistry;
use crate::merge::merge_overlay;
use crate::output::{GenerationReport, OutputDocument, PartSummary, RenderPath, Summary};
use crate::partition::{paginate, partition, Partition, Totals, PAGE_CAPACITY};
use crate::record::{build_records, BuildReport, TaxYear};
use crate::render::{render_overlay, BoxSelection, PageContext, Taxpayer};
use crate::template::{TemplateOutcome, TemplateSource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub tax_year: i32,
    #[serde(default)]
    pub box_selection: BoxSelection,
    pub taxpayer: Taxpayer,
    #[serde(default)]
    pub variant: InputVariant,
}

impl GenerationConfig {
    pub fn new(tax_year: i32, taxpayer: Taxpayer) -> Self {
        Self {
            tax_year,
            box_selection: BoxSelection::default(),
            taxpayer,
            variant: InputVariant::default(),
        }
    }

    pub fn with_box(mut self, selection: BoxSelection) -> Self {
        self.box_selection = selection;
        self
    }

    pub fn with_variant(mut self, variant: InputVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Filename token: the taxpayer name with whitespace runs replaced by
    /// `_`, or `taxpayer` when no name is given.
    pub fn file_token(&self) -> String {
        let words: Vec<&str> = self.taxpayer.name.split_whitespace().collect();
        if words.is_empty() {
            "taxpayer".to_string()
        } else {
            words.join("_")
        }
    }
}

/// Pick the error for a request that produced no records.
pub fn no_records_reason(report: &BuildReport, year: i32) -> NoRecordsReason {
    if report.total_rows == 0 {
        NoRecordsReason::EmptyInput
    } else if report.out_of_year > 0 {
        NoRecordsReason::OutsideTaxYear {
            year,
            out_of_year: report.out_of_year,
        }
    } else if report.rejected > 0 {
        NoRecordsReason::AllRowsRejected {
            rejected: report.rejected,
        }
    } else {
        NoRecordsReason::NoMatchingAction {
            skipped: report.skipped_action,
        }
    }
}

/// Read and validate the CSV, stopping before any PDF work.
pub fn build(csv: &[u8], config: &GenerationConfig) -> Result<BuildReport, FormError> {
    let rows = read_rows(csv, config.variant)?;
    let report = build_records(&rows, config.variant, TaxYear(config.tax_year));
    info!(
        rows = report.total_rows,
        accepted = report.accepted(),
        out_of_year = report.out_of_year,
        skipped = report.skipped_action,
        rejected = report.rejected,
        "Built records"
    );
    Ok(report)
}

/// Produce one document per page group of each non-empty partition.
pub fn generate(
    csv: &[u8],
    config: &GenerationConfig,
    source: &dyn TemplateSource,
    layouts: &LayoutRegistry,
) -> Result<GenerationReport, FormError> {
    let report = build(csv, config)?;
    if report.accepted() == 0 {
        return Err(FormError::NoRecords(no_records_reason(&report, config.tax_year)));
    }

    let mut summary = Summary {
        tax_year: config.tax_year,
        rows_read: report.total_rows,
        records: report.accepted(),
        out_of_year: report.out_of_year,
        skipped_action: report.skipped_action,
        rejected: report.rejected,
        ..Default::default()
    };

    let base = match source.acquire(config.tax_year) {
        TemplateOutcome::Available(bytes) => Some(bytes),
        TemplateOutcome::Unavailable { reason } => {
            warn!(reason = %reason, "Base form unavailable, using standalone pages");
            summary.template_unavailable = Some(reason);
            None
        }
    };
    let profile = layouts.for_year(config.tax_year);
    let token = config.file_token();

    let (short, long) = partition(report.records);
    let mut documents = Vec::new();

    for (part, records) in [(Partition::ShortTerm, &short), (Partition::LongTerm, &long)] {
        let groups = paginate(records, PAGE_CAPACITY)?;
        let totals = Totals::of(records)?;
        let part_summary = PartSummary {
            records: records.len(),
            pages: groups.len(),
            totals,
        };
        match part {
            Partition::ShortTerm => summary.short_term = part_summary,
            Partition::LongTerm => summary.long_term = part_summary,
        }

        for group in groups {
            let ctx = PageContext {
                partition: part,
                group,
                totals: &totals,
                taxpayer: &config.taxpayer,
                selection: config.box_selection,
                tax_year: config.tax_year,
            };

            let (bytes, render_path) = match &base {
                Some(base) => {
                    let layer = render_overlay(&ctx, profile);
                    match merge_overlay(base, part.template_page_index(), &layer) {
                        Ok(bytes) => (bytes, RenderPath::Template),
                        Err(e) => {
                            warn!(
                                partition = %part,
                                page = group.number,
                                error = %e,
                                "Merge failed, using standalone page"
                            );
                            (render_fallback(&ctx).to_pdf()?, RenderPath::Fallback)
                        }
                    }
                }
                None => (render_fallback(&ctx).to_pdf()?, RenderPath::Fallback),
            };

            match render_path {
                RenderPath::Template => summary.template_pages += 1,
                RenderPath::Fallback => summary.fallback_pages += 1,
            }
            let page_label = group_label(group.number, group.page_count);
            documents.push(OutputDocument {
                filename: document_name(config.tax_year, part, &page_label, &token),
                bytes,
                partition: part,
                page_number: group.number,
                render_path,
            });
        }
    }

    info!(
        documents = documents.len(),
        template_pages = summary.template_pages,
        fallback_pages = summary.fallback_pages,
        "Generation complete"
    );

    Ok(GenerationReport {
        documents,
        warnings: report.warnings,
        summary,
        archive_name: format!("Form_8949_{}_{}.zip", config.tax_year, token),
    })
}

fn group_label(number: usize, page_count: usize) -> String {
    if page_count > 1 {
        format!("_Page_{}", number)
    } else {
        String::new()
    }
}

fn document_name(year: i32, part: Partition, page: &str, token: &str) -> String {
    format!("Form_8949_{}_{}{}_{}.pdf", year, part.file_label(), page, token)
}
