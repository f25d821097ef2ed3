//! Self-contained page used when no base form is available
//!
//! Lays out the same information as the official form top to bottom on a
//! blank letter page: title, part, box, taxpayer, the column grid and the
//! page footer.

use tracing::debug;

use crate::fonts::{truncate_chars, StandardFont};
use crate::layout::{Align, ColumnLayout, Columns, PageSize};
use crate::partition::PAGE_CAPACITY;
use crate::render::{draw_record, draw_totals, OverlayLayer, PageContext};

const MARGIN: f32 = 36.0;
const TOP: f32 = 792.0 - MARGIN;
const ROW_SIZE: f32 = 7.0;
const ROW_PITCH: f32 = 22.0;
const TABLE_TOP: f32 = 600.0;

fn columns() -> Columns {
    Columns {
        description: ColumnLayout::new(MARGIN, Align::Left, 30.0),
        date_acquired: ColumnLayout::new(190.0, Align::Center, 10.0),
        date_sold: ColumnLayout::new(245.0, Align::Center, 10.0),
        proceeds: ColumnLayout::new(335.0, Align::Right, 60.0),
        cost_basis: ColumnLayout::new(405.0, Align::Right, 60.0),
        code: ColumnLayout::new(428.0, Align::Center, 3.0),
        adjustment: ColumnLayout::new(500.0, Align::Right, 60.0),
        gain_loss: ColumnLayout::new(PageSize::LETTER.width - MARGIN, Align::Right, 66.0),
    }
}

const HEADINGS: [(&str, &str); 8] = [
    ("(a) Description", "of property"),
    ("(b) Date", "acquired"),
    ("(c) Date sold", "or disposed of"),
    ("(d) Proceeds", "(sales price)"),
    ("(e) Cost or", "other basis"),
    ("(f)", "Code"),
    ("(g) Amount of", "adjustment"),
    ("(h) Gain or", "(loss)"),
];

/// Draw one page group on a blank page.
pub fn render_fallback(ctx: &PageContext<'_>) -> OverlayLayer {
    let page = PageSize::LETTER;
    let right = page.width - MARGIN;
    let mut layer = OverlayLayer::new(page);
    let regular = StandardFont::Helvetica;
    let bold = StandardFont::HelveticaBold;

    debug!(
        partition = %ctx.partition,
        page = ctx.group.number,
        rows = ctx.group.items.len(),
        "Rendering fallback page"
    );

    layer.text(bold, 16.0, MARGIN, TOP - 14.0, Align::Left, "Form 8949");
    layer.text(
        regular,
        9.0,
        MARGIN,
        TOP - 28.0,
        Align::Left,
        "Sales and Other Dispositions of Capital Assets",
    );
    layer.text(
        bold,
        12.0,
        right,
        TOP - 14.0,
        Align::Right,
        &ctx.tax_year.to_string(),
    );
    layer.rule(MARGIN, TOP - 36.0, right, TOP - 36.0, 1.0);

    layer.text(
        regular,
        9.0,
        MARGIN,
        TOP - 54.0,
        Align::Left,
        &format!("Name: {}", truncate_chars(ctx.taxpayer.name.trim(), 45)),
    );
    let tin = ctx.taxpayer.tin.trim();
    if !tin.is_empty() {
        layer.text(
            regular,
            9.0,
            right,
            TOP - 54.0,
            Align::Right,
            &format!("Taxpayer identification number: {}", tin),
        );
    }

    layer.text(bold, 11.0, MARGIN, TOP - 80.0, Align::Left, ctx.partition.title());
    layer.text(
        regular,
        8.0,
        MARGIN,
        TOP - 96.0,
        Align::Left,
        &format!(
            "[X] Box {}: {}",
            ctx.selection.letter(ctx.partition),
            ctx.selection.description()
        ),
    );

    let columns = columns();
    let anchors = [
        &columns.description,
        &columns.date_acquired,
        &columns.date_sold,
        &columns.proceeds,
        &columns.cost_basis,
        &columns.code,
        &columns.adjustment,
        &columns.gain_loss,
    ];
    let heading_y = TABLE_TOP + 30.0;
    for (column, (first, second)) in anchors.iter().zip(HEADINGS) {
        layer.text(bold, 7.0, column.x, heading_y, column.align, first);
        layer.text(regular, 7.0, column.x, heading_y - 9.0, column.align, second);
    }
    layer.rule(MARGIN, heading_y - 14.0, right, heading_y - 14.0, 0.75);

    for i in 0..PAGE_CAPACITY {
        let y = TABLE_TOP - i as f32 * ROW_PITCH;
        if let Some(record) = ctx.group.items.get(i) {
            draw_record(&mut layer, &columns, ROW_SIZE, y, record);
        }
        layer.rule(MARGIN, y - 6.0, right, y - 6.0, 0.25);
    }

    let totals_y = TABLE_TOP - PAGE_CAPACITY as f32 * ROW_PITCH;
    if ctx.group.is_final() {
        layer.text(bold, ROW_SIZE, MARGIN, totals_y, Align::Left, "Totals");
        draw_totals(&mut layer, &columns, ROW_SIZE, totals_y, ctx.totals);
    }
    layer.rule(MARGIN, totals_y - 6.0, right, totals_y - 6.0, 1.0);

    layer.text(
        regular,
        8.0,
        page.width / 2.0,
        MARGIN,
        Align::Center,
        &format!("Page {} of {}", ctx.group.number, ctx.group.page_count),
    );

    layer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{paginate, Partition, Totals};
    use crate::record::TransactionRecord;
    use crate::render::{BoxSelection, Taxpayer};
    use chrono::NaiveDate;
    use lopdf::Document;
    use rust_decimal::Decimal;

    fn records(count: i64) -> Vec<TransactionRecord> {
        (1..=count)
            .map(|n| {
                TransactionRecord::computed(
                    format!("lot {}", n),
                    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                    Decimal::new(n * 1000, 2),
                    Decimal::new(n * 1500, 2),
                )
            })
            .collect()
    }

    fn render_page(records: &[TransactionRecord], index: usize) -> OverlayLayer {
        let totals = Totals::of(records).unwrap();
        let taxpayer = Taxpayer::new("Jane Q Public", "");
        let groups = paginate(records, PAGE_CAPACITY).unwrap();
        let ctx = PageContext {
            partition: Partition::LongTerm,
            group: groups[index],
            totals: &totals,
            taxpayer: &taxpayer,
            selection: BoxSelection::B,
            tax_year: 2023,
        };
        render_fallback(&ctx)
    }

    #[test]
    fn test_fallback_contains_header_blocks() {
        let layer = render_page(&records(3), 0);
        assert!(layer.find_text("Form 8949").is_some());
        assert!(layer.find_text("2023").is_some());
        assert!(layer.find_text("Part II - Long-Term").is_some());
        assert!(layer
            .find_text("[X] Box E: Form 1099-B received, basis not reported to the IRS")
            .is_some());
        assert!(layer.find_text("Name: Jane Q Public").is_some());
        assert!(layer.texts().all(|run| !run.text.starts_with("Taxpayer identification")));
        assert!(layer.find_text("Page 1 of 1").is_some());
    }

    #[test]
    fn test_fallback_totals_on_last_page_only() {
        let all = records(16);
        let first = render_page(&all, 0);
        let last = render_page(&all, 1);
        assert!(first.find_text("Totals").is_none());
        assert!(first.find_text("Page 1 of 2").is_some());
        assert!(last.find_text("Totals").is_some());
        // Gain of every lot is -n * 5.00, summed over all 16 lots.
        assert!(last.find_text("(680.00)").is_some());
    }

    #[test]
    fn test_fallback_saves_as_pdf() {
        let bytes = render_page(&records(2), 0).to_pdf().unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
