//! Overlay rendering
//!
//! A page of the form is filled by drawing text at fixed coordinates on a
//! transparent layer which is later stamped onto the base page. The layer
//! is kept as a list of marks so it can be inspected in tests, encoded as
//! a content stream for merging, or saved as a standalone one-page PDF.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FormError;
use crate::fonts::{encode_text, truncate_chars, StandardFont, CHECK_MARK};
use crate::layout::{Align, ColumnLayout, Columns, LayoutProfile, PageSize};
use crate::partition::{PageGroup, Partition, Totals};
use crate::record::TransactionRecord;

const NAME_MAX_CHARS: usize = 45;

/// Which reporting box applies. Part I shows it as A/B/C, Part II as D/E/F.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoxSelection {
    /// Basis reported to the IRS on Form 1099-B.
    #[default]
    A,
    /// Basis not reported to the IRS.
    B,
    /// No Form 1099-B received.
    C,
}

impl BoxSelection {
    /// Offset from the first checkbox on either part.
    pub fn index(self) -> usize {
        match self {
            BoxSelection::A => 0,
            BoxSelection::B => 1,
            BoxSelection::C => 2,
        }
    }

    /// Letter printed on the form for this box in `partition`.
    pub fn letter(self, partition: Partition) -> char {
        let letters = match partition {
            Partition::ShortTerm => ['A', 'B', 'C'],
            Partition::LongTerm => ['D', 'E', 'F'],
        };
        letters[self.index()]
    }

    pub fn description(self) -> &'static str {
        match self {
            BoxSelection::A => "Form 1099-B received, basis reported to the IRS",
            BoxSelection::B => "Form 1099-B received, basis not reported to the IRS",
            BoxSelection::C => "No Form 1099-B received",
        }
    }
}

impl FromStr for BoxSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let letter = trimmed
            .strip_prefix("Box ")
            .or_else(|| trimmed.strip_prefix("box "))
            .unwrap_or(trimmed);
        match letter.to_ascii_uppercase().as_str() {
            "A" | "D" => Ok(BoxSelection::A),
            "B" | "E" => Ok(BoxSelection::B),
            "C" | "F" => Ok(BoxSelection::C),
            _ => Err(format!("Unknown box '{}'. Use A, B or C", s)),
        }
    }
}

impl fmt::Display for BoxSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter(Partition::ShortTerm))
    }
}

/// Name and identification number printed in the page header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxpayer {
    pub name: String,
    #[serde(default)]
    pub tin: String,
}

impl Taxpayer {
    pub fn new(name: impl Into<String>, tin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tin: tin.into(),
        }
    }
}

/// Everything needed to draw one page besides coordinates.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub partition: Partition,
    pub group: PageGroup<'a>,
    /// Totals of the whole partition, drawn on its final page only.
    pub totals: &'a Totals,
    pub taxpayer: &'a Taxpayer,
    pub selection: BoxSelection,
    pub tax_year: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub font: StandardFont,
    pub size: f32,
    /// Start of the baseline.
    pub x: f32,
    pub y: f32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mark {
    Text(TextRun),
    Rule {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
    },
}

/// One page worth of drawing instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayer {
    pub page: PageSize,
    pub marks: Vec<Mark>,
}

impl OverlayLayer {
    pub fn new(page: PageSize) -> Self {
        Self {
            page,
            marks: Vec::new(),
        }
    }

    /// Draw `text` with its baseline anchored at `x` according to `align`.
    pub fn text(&mut self, font: StandardFont, size: f32, x: f32, y: f32, align: Align, text: &str) {
        if text.is_empty() {
            return;
        }
        let width = font.text_width(text, size);
        let start = match align {
            Align::Left => x,
            Align::Center => x - width / 2.0,
            Align::Right => x - width,
        };
        self.marks.push(Mark::Text(TextRun {
            font,
            size,
            x: start,
            y,
            text: text.to_string(),
        }));
    }

    pub fn rule(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32) {
        self.marks.push(Mark::Rule {
            x1,
            y1,
            x2,
            y2,
            width,
        });
    }

    pub fn texts(&self) -> impl Iterator<Item = &TextRun> {
        self.marks.iter().filter_map(|mark| match mark {
            Mark::Text(run) => Some(run),
            Mark::Rule { .. } => None,
        })
    }

    /// First text run whose contents equal `text`.
    pub fn find_text(&self, text: &str) -> Option<&TextRun> {
        self.texts().find(|run| run.text == text)
    }

    /// Fonts referenced by the layer.
    pub fn fonts(&self) -> BTreeSet<StandardFont> {
        self.texts().map(|run| run.font).collect()
    }

    pub fn operations(&self) -> Vec<Operation> {
        let mut ops = vec![
            Operation::new("q", vec![]),
            Operation::new("g", vec![Object::Real(0.0)]),
            Operation::new("G", vec![Object::Real(0.0)]),
        ];
        for mark in &self.marks {
            match mark {
                Mark::Text(run) => {
                    ops.push(Operation::new("BT", vec![]));
                    ops.push(Operation::new(
                        "Tf",
                        vec![
                            Object::Name(run.font.resource_name().as_bytes().to_vec()),
                            Object::Real(run.size),
                        ],
                    ));
                    ops.push(Operation::new(
                        "Td",
                        vec![Object::Real(run.x), Object::Real(run.y)],
                    ));
                    ops.push(Operation::new(
                        "Tj",
                        vec![Object::String(encode_text(&run.text), StringFormat::Literal)],
                    ));
                    ops.push(Operation::new("ET", vec![]));
                }
                Mark::Rule {
                    x1,
                    y1,
                    x2,
                    y2,
                    width,
                } => {
                    ops.push(Operation::new("w", vec![Object::Real(*width)]));
                    ops.push(Operation::new("m", vec![Object::Real(*x1), Object::Real(*y1)]));
                    ops.push(Operation::new("l", vec![Object::Real(*x2), Object::Real(*y2)]));
                    ops.push(Operation::new("S", vec![]));
                }
            }
        }
        ops.push(Operation::new("Q", vec![]));
        ops
    }

    /// Encoded content stream.
    pub fn content(&self) -> Result<Vec<u8>, FormError> {
        let content = Content {
            operations: self.operations(),
        };
        Ok(content.encode()?)
    }

    /// Save the layer as a single page PDF with nothing underneath.
    pub fn to_pdf(&self) -> Result<Vec<u8>, FormError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut fonts = Dictionary::new();
        for font in self.fonts() {
            let font_id = doc.add_object(font.dictionary());
            fonts.set(font.resource_name(), Object::Reference(font_id));
        }
        let resources_id = doc.add_object(dictionary! { "Font" => fonts });
        let content_id = doc.add_object(Stream::new(Dictionary::new(), self.content()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(self.page.width),
                Object::Real(self.page.height),
            ],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| FormError::Pdf(format!("Failed to save page: {}", e)))?;
        Ok(buffer)
    }
}

/// Format an amount with thousands separators and `decimals` places,
/// negatives in parentheses: `-1234.5` gives `(1,234.50)`.
pub fn format_money(value: Decimal, decimals: u32) -> String {
    let rounded = value
        .abs()
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let plain = format!("{:.*}", decimals as usize, rounded);
    let (integer, fraction) = match plain.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (plain.as_str(), None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }

    if value.is_sign_negative() && !rounded.is_zero() {
        format!("({})", grouped)
    } else {
        grouped
    }
}

/// Money text that fits `budget` points, dropping the cents if needed.
pub fn fit_money(value: Decimal, font: StandardFont, size: f32, budget: f32) -> String {
    let full = format_money(value, 2);
    if font.text_width(&full, size) <= budget {
        full
    } else {
        format_money(value, 0)
    }
}

fn draw_cell(
    layer: &mut OverlayLayer,
    column: &ColumnLayout,
    font: StandardFont,
    size: f32,
    y: f32,
    text: &str,
) {
    let text = match column.align {
        Align::Right => text,
        Align::Left | Align::Center => truncate_chars(text, column.max_width as usize),
    };
    layer.text(font, size, column.x, y, column.align, text);
}

fn draw_money(
    layer: &mut OverlayLayer,
    column: &ColumnLayout,
    font: StandardFont,
    size: f32,
    y: f32,
    value: Decimal,
) {
    let text = fit_money(value, font, size, column.max_width);
    layer.text(font, size, column.x, y, Align::Right, &text);
}

/// Draw columns (a) through (h) of one record on baseline `y`.
pub(crate) fn draw_record(
    layer: &mut OverlayLayer,
    columns: &Columns,
    size: f32,
    y: f32,
    record: &TransactionRecord,
) {
    let font = StandardFont::Helvetica;
    draw_cell(layer, &columns.description, font, size, y, &record.description);
    draw_cell(
        layer,
        &columns.date_acquired,
        font,
        size,
        y,
        &record.date_acquired.format("%m/%d/%Y").to_string(),
    );
    draw_cell(
        layer,
        &columns.date_sold,
        font,
        size,
        y,
        &record.date_sold.format("%m/%d/%Y").to_string(),
    );
    draw_money(layer, &columns.proceeds, font, size, y, record.proceeds);
    draw_money(layer, &columns.cost_basis, font, size, y, record.cost_basis);
    if let Some(code) = &record.adjustment_code {
        draw_cell(layer, &columns.code, font, size, y, code);
    }
    if !record.adjustment.is_zero() {
        draw_money(layer, &columns.adjustment, font, size, y, record.adjustment);
    }
    draw_money(layer, &columns.gain_loss, font, size, y, record.gain_loss);
}

/// Draw the totals row in bold on baseline `y`.
pub(crate) fn draw_totals(
    layer: &mut OverlayLayer,
    columns: &Columns,
    size: f32,
    y: f32,
    totals: &Totals,
) {
    let font = StandardFont::HelveticaBold;
    draw_money(layer, &columns.proceeds, font, size, y, totals.proceeds);
    draw_money(layer, &columns.cost_basis, font, size, y, totals.cost_basis);
    if !totals.adjustment.is_zero() {
        draw_money(layer, &columns.adjustment, font, size, y, totals.adjustment);
    }
    draw_money(layer, &columns.gain_loss, font, size, y, totals.gain_loss);
}

/// Draw one page group at the coordinates of `profile`.
pub fn render_overlay(ctx: &PageContext<'_>, profile: &LayoutProfile) -> OverlayLayer {
    let part = profile.part(ctx.partition);
    let fonts = &profile.fonts;
    let mut layer = OverlayLayer::new(profile.page);

    debug!(
        partition = %ctx.partition,
        page = ctx.group.number,
        rows = ctx.group.items.len(),
        revision = %profile.revision,
        "Rendering overlay"
    );

    let header = &part.header;
    layer.text(
        StandardFont::Helvetica,
        fonts.header,
        header.name.x,
        header.name.y,
        Align::Left,
        truncate_chars(ctx.taxpayer.name.trim(), NAME_MAX_CHARS),
    );
    layer.text(
        StandardFont::Helvetica,
        fonts.header,
        header.tin.x,
        header.tin.y,
        Align::Right,
        ctx.taxpayer.tin.trim(),
    );
    layer.text(
        StandardFont::ZapfDingbats,
        fonts.checkbox,
        header.checkbox.x,
        header.checkbox.y - ctx.selection.index() as f32 * header.checkbox_step,
        Align::Left,
        CHECK_MARK,
    );

    let table = &part.table;
    for (i, record) in ctx.group.items.iter().take(table.capacity).enumerate() {
        draw_record(&mut layer, &table.columns, fonts.row, table.row_y(i), record);
    }

    if ctx.group.is_final() {
        draw_totals(&mut layer, &table.columns, fonts.totals, table.totals_y(), ctx.totals);
    }

    layer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{paginate, PAGE_CAPACITY};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn record(description: &str, proceeds: i64, cost: i64) -> TransactionRecord {
        TransactionRecord::computed(
            description.to_string(),
            NaiveDate::from_ymd_opt(2023, 3, 7).unwrap(),
            NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            Decimal::new(proceeds, 2),
            Decimal::new(cost, 2),
        )
    }

    fn render(records: &[TransactionRecord], page: usize, selection: BoxSelection, partition: Partition) -> OverlayLayer {
        let taxpayer = Taxpayer::new("Jane Q Public", "123-45-6789");
        let totals = Totals::of(records).unwrap();
        let groups = paginate(records, PAGE_CAPACITY).unwrap();
        let ctx = PageContext {
            partition,
            group: groups[page],
            totals: &totals,
            taxpayer: &taxpayer,
            selection,
            tax_year: 2023,
        };
        render_overlay(&ctx, &LayoutProfile::revision_2022())
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(Decimal::new(6000, 2), 2), "60.00");
        assert_eq!(format_money(Decimal::new(-2550, 2), 2), "(25.50)");
        assert_eq!(format_money(Decimal::new(123456789, 2), 2), "1,234,567.89");
        assert_eq!(format_money(Decimal::new(-123456789, 2), 0), "(1,234,568)");
        assert_eq!(format_money(Decimal::new(5, 3), 2), "0.01");
        assert_eq!(format_money(Decimal::new(-1, 3), 2), "0.00");
        assert_eq!(format_money(Decimal::ZERO, 2), "0.00");
        assert_eq!(format_money(Decimal::new(100000, 0), 2), "100,000.00");
    }

    #[test]
    fn test_fit_money_drops_cents_when_too_wide() {
        let value = Decimal::new(123456789012, 2);
        let text = fit_money(value, StandardFont::Helvetica, 7.0, 40.0);
        assert_eq!(text, "1,234,567,890");
        let small = fit_money(Decimal::new(6000, 2), StandardFont::Helvetica, 7.0, 40.0);
        assert_eq!(small, "60.00");
    }

    #[test]
    fn test_box_selection() {
        assert_eq!(BoxSelection::B.letter(Partition::ShortTerm), 'B');
        assert_eq!(BoxSelection::B.letter(Partition::LongTerm), 'E');
        assert_eq!("Box C".parse::<BoxSelection>(), Ok(BoxSelection::C));
        assert_eq!("d".parse::<BoxSelection>(), Ok(BoxSelection::A));
        assert!("G".parse::<BoxSelection>().is_err());
    }

    #[test]
    fn test_gain_drawn_without_parentheses() {
        let records = vec![record("100 sh XYZ", 10000, 4000)];
        let layer = render(&records, 0, BoxSelection::A, Partition::ShortTerm);
        let profile = LayoutProfile::revision_2022();
        let columns = profile.part_one.table.columns;

        let row = layer
            .texts()
            .find(|run| run.text == "60.00" && run.font == StandardFont::Helvetica)
            .unwrap();
        let right_edge = row.x + StandardFont::Helvetica.text_width("60.00", row.size);
        assert!((right_edge - columns.gain_loss.x).abs() < 1e-3);
        assert_eq!(row.y, profile.part_one.table.row_base);
        assert!(layer.texts().all(|run| !run.text.contains('(')));
    }

    #[test]
    fn test_loss_in_parentheses() {
        let records = vec![record("lot", 1000, 3550)];
        let layer = render(&records, 0, BoxSelection::A, Partition::ShortTerm);
        assert!(layer.find_text("(25.50)").is_some());
    }

    #[test]
    fn test_dates_are_centered() {
        let records = vec![record("lot", 100, 100)];
        let layer = render(&records, 0, BoxSelection::A, Partition::ShortTerm);
        let columns = LayoutProfile::revision_2022().part_one.table.columns;
        let run = layer.find_text("03/07/2023").unwrap();
        let center = run.x + StandardFont::Helvetica.text_width(&run.text, run.size) / 2.0;
        assert!((center - columns.date_acquired.x).abs() < 1e-3);
        assert!(layer.find_text("06/01/2023").is_some());
    }

    #[test]
    fn test_description_truncated() {
        let records = vec![record("A very long description of a security lot", 100, 100)];
        let layer = render(&records, 0, BoxSelection::A, Partition::ShortTerm);
        assert!(layer.find_text("A very long description of a").is_some());
    }

    #[test]
    fn test_checkbox_offset_per_part() {
        let records = vec![record("lot", 100, 100)];
        let profile = LayoutProfile::revision_2022();

        let layer = render(&records, 0, BoxSelection::C, Partition::LongTerm);
        let check = layer
            .texts()
            .find(|run| run.font == StandardFont::ZapfDingbats)
            .unwrap();
        let header = profile.part_two.header;
        assert_eq!(check.y, header.checkbox.y - 2.0 * header.checkbox_step);
        assert_eq!(check.text, CHECK_MARK);
    }

    #[test]
    fn test_totals_only_on_final_page_and_cover_partition() {
        let records: Vec<_> = (1..=20).map(|n| record(&format!("lot {}", n), n * 100, 0)).collect();
        let first = render(&records, 0, BoxSelection::A, Partition::ShortTerm);
        let last = render(&records, 1, BoxSelection::A, Partition::ShortTerm);

        assert!(first.texts().all(|run| run.font != StandardFont::HelveticaBold));

        let bold: Vec<_> = last
            .texts()
            .filter(|run| run.font == StandardFont::HelveticaBold)
            .collect();
        // Proceeds, cost basis and gain; adjustment total is zero.
        assert_eq!(bold.len(), 3);
        assert!(bold.iter().any(|run| run.text == "210.00"));
        let table = LayoutProfile::revision_2022().part_one.table;
        assert!(bold.iter().all(|run| run.y == table.totals_y()));
    }

    #[test]
    fn test_header_truncates_name_and_right_aligns_tin() {
        let records = vec![record("lot", 100, 100)];
        let taxpayer = Taxpayer::new("N".repeat(60), "123-45-6789");
        let totals = Totals::of(&records).unwrap();
        let groups = paginate(&records, PAGE_CAPACITY).unwrap();
        let ctx = PageContext {
            partition: Partition::ShortTerm,
            group: groups[0],
            totals: &totals,
            taxpayer: &taxpayer,
            selection: BoxSelection::A,
            tax_year: 2023,
        };
        let profile = LayoutProfile::revision_2022();
        let layer = render_overlay(&ctx, &profile);
        assert!(layer.find_text(&"N".repeat(45)).is_some());
        let tin = layer.find_text("123-45-6789").unwrap();
        let right = tin.x + StandardFont::Helvetica.text_width(&tin.text, tin.size);
        assert!((right - profile.part_one.header.tin.x).abs() < 1e-3);
    }

    #[test]
    fn test_adjustment_columns() {
        let mut lot = record("wash", 1000, 3000);
        lot.adjustment_code = Some("W".to_string());
        lot.adjustment = Decimal::new(2000, 2);
        lot.gain_loss = lot.computed_gain_loss().unwrap();
        let layer = render(&[lot], 0, BoxSelection::A, Partition::ShortTerm);
        assert!(layer.find_text("W").is_some());
        assert!(layer.texts().filter(|run| run.text == "20.00").count() >= 1);
        assert!(layer.find_text("0.00").is_some());
    }

    #[test]
    fn test_standalone_pdf_loads() {
        let records = vec![record("lot", 100, 100)];
        let layer = render(&records, 0, BoxSelection::A, Partition::ShortTerm);
        let bytes = layer.to_pdf().unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
