//! Coordinate model for the fixed-layout form
//!
//! Every position the overlay renderer draws at lives here as data: one
//! [`LayoutProfile`] per form revision, each with an independent
//! [`PartLayout`] for Part I and Part II (the two base pages do not share
//! header geometry). Profiles are validated once when a registry is built,
//! so a recalibration is a data change rather than a code change.
//!
//! All coordinates are PDF points with the origin at the bottom-left.

use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::partition::{Partition, PAGE_CAPACITY};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    fn contains(&self, p: Point) -> bool {
        (0.0..=self.width).contains(&p.x) && (0.0..=self.height).contains(&p.y)
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::LETTER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnLayout {
    /// Left edge, center, or right edge depending on `align`.
    pub x: f32,
    pub align: Align,
    /// Character budget for left/center aligned text, point budget for
    /// right aligned amounts.
    pub max_width: f32,
}

impl ColumnLayout {
    pub const fn new(x: f32, align: Align, max_width: f32) -> Self {
        Self { x, align, max_width }
    }
}

/// Columns (a) through (h) of the form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Columns {
    pub description: ColumnLayout,
    pub date_acquired: ColumnLayout,
    pub date_sold: ColumnLayout,
    pub proceeds: ColumnLayout,
    pub cost_basis: ColumnLayout,
    pub code: ColumnLayout,
    pub adjustment: ColumnLayout,
    pub gain_loss: ColumnLayout,
}

impl Columns {
    fn all(&self) -> [(&'static str, &ColumnLayout); 8] {
        [
            ("description", &self.description),
            ("date_acquired", &self.date_acquired),
            ("date_sold", &self.date_sold),
            ("proceeds", &self.proceeds),
            ("cost_basis", &self.cost_basis),
            ("code", &self.code),
            ("adjustment", &self.adjustment),
            ("gain_loss", &self.gain_loss),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeaderLayout {
    /// Left edge of the taxpayer name.
    pub name: Point,
    /// Right edge of the taxpayer identification number.
    pub tin: Point,
    /// Check mark position for the first box option.
    pub checkbox: Point,
    /// Downward distance between consecutive box options.
    pub checkbox_step: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableLayout {
    /// Baseline of the first data row.
    pub row_base: f32,
    pub row_height: f32,
    pub capacity: usize,
    pub columns: Columns,
}

impl TableLayout {
    /// Baseline of row `index` (0-based).
    pub fn row_y(&self, index: usize) -> f32 {
        self.row_base - index as f32 * self.row_height
    }

    /// Baseline of the totals row, one pitch below the last data row.
    pub fn totals_y(&self) -> f32 {
        self.row_y(self.capacity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartLayout {
    pub header: HeaderLayout,
    pub table: TableLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontSizes {
    pub header: f32,
    pub checkbox: f32,
    pub row: f32,
    pub totals: f32,
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            header: 9.0,
            checkbox: 10.0,
            row: 7.0,
            totals: 7.0,
        }
    }
}

/// Inclusive range of tax years; open ends match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    #[serde(default)]
    pub first: Option<i32>,
    #[serde(default)]
    pub last: Option<i32>,
}

impl YearRange {
    pub fn contains(&self, year: i32) -> bool {
        self.first.map_or(true, |f| year >= f) && self.last.map_or(true, |l| year <= l)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutProfile {
    pub revision: String,
    #[serde(default)]
    pub years: YearRange,
    #[serde(default)]
    pub page: PageSize,
    #[serde(default)]
    pub fonts: FontSizes,
    pub part_one: PartLayout,
    pub part_two: PartLayout,
}

impl LayoutProfile {
    pub fn part(&self, partition: Partition) -> &PartLayout {
        match partition {
            Partition::ShortTerm => &self.part_one,
            Partition::LongTerm => &self.part_two,
        }
    }

    /// Check the profile can place every mark on the page.
    pub fn validate(&self) -> Result<(), FormError> {
        let fail = |msg: String| Err(FormError::Layout(format!("{}: {}", self.revision, msg)));

        if self.revision.trim().is_empty() {
            return Err(FormError::Layout("Layout revision must not be empty".into()));
        }
        if let (Some(first), Some(last)) = (self.years.first, self.years.last) {
            if first > last {
                return fail(format!("year range {}..={} is empty", first, last));
            }
        }
        if self.page.width <= 0.0 || self.page.height <= 0.0 {
            return fail("page size must be positive".into());
        }
        let sizes = [
            self.fonts.header,
            self.fonts.checkbox,
            self.fonts.row,
            self.fonts.totals,
        ];
        if sizes.iter().any(|s| *s <= 0.0) {
            return fail("font sizes must be positive".into());
        }

        for (label, part) in [("part_one", &self.part_one), ("part_two", &self.part_two)] {
            let header = &part.header;
            let table = &part.table;
            for (what, point) in [("name", header.name), ("tin", header.tin)] {
                if !self.page.contains(point) {
                    return fail(format!("{} {} is off the page", label, what));
                }
            }
            let last_box = Point::new(
                header.checkbox.x,
                header.checkbox.y - 2.0 * header.checkbox_step,
            );
            if !self.page.contains(header.checkbox) || !self.page.contains(last_box) {
                return fail(format!("{} checkbox marks are off the page", label));
            }
            if table.row_height <= 0.0 {
                return fail(format!("{} row height must be positive", label));
            }
            if table.capacity != PAGE_CAPACITY {
                return fail(format!(
                    "{} capacity is {}, the form holds {} rows",
                    label, table.capacity, PAGE_CAPACITY
                ));
            }
            if table.row_base > self.page.height || table.totals_y() < 0.0 {
                return fail(format!("{} table does not fit on the page", label));
            }
            for (name, column) in table.columns.all() {
                if !(0.0..=self.page.width).contains(&column.x) {
                    return fail(format!("{} column {} is off the page", label, name));
                }
                if column.max_width <= 0.0 {
                    return fail(format!("{} column {} has no width budget", label, name));
                }
            }
        }

        Ok(())
    }

    /// Calibrated against the 2022 and later revisions of the form.
    pub fn revision_2022() -> Self {
        let columns = Columns {
            description: ColumnLayout::new(38.0, Align::Left, 28.0),
            date_acquired: ColumnLayout::new(182.0, Align::Center, 10.0),
            date_sold: ColumnLayout::new(234.0, Align::Center, 10.0),
            proceeds: ColumnLayout::new(320.0, Align::Right, 56.0),
            cost_basis: ColumnLayout::new(386.0, Align::Right, 56.0),
            code: ColumnLayout::new(405.0, Align::Center, 3.0),
            adjustment: ColumnLayout::new(484.0, Align::Right, 56.0),
            gain_loss: ColumnLayout::new(570.0, Align::Right, 62.0),
        };
        Self {
            revision: "2022".to_string(),
            years: YearRange {
                first: Some(2022),
                last: None,
            },
            page: PageSize::LETTER,
            fonts: FontSizes::default(),
            part_one: PartLayout {
                header: HeaderLayout {
                    name: Point::new(38.0, 700.0),
                    tin: Point::new(570.0, 700.0),
                    checkbox: Point::new(47.5, 563.0),
                    checkbox_step: 18.0,
                },
                table: TableLayout {
                    row_base: 430.0,
                    row_height: 24.0,
                    capacity: PAGE_CAPACITY,
                    columns,
                },
            },
            part_two: PartLayout {
                header: HeaderLayout {
                    name: Point::new(38.0, 724.0),
                    tin: Point::new(570.0, 724.0),
                    checkbox: Point::new(47.5, 599.0),
                    checkbox_step: 18.0,
                },
                table: TableLayout {
                    row_base: 466.0,
                    row_height: 24.0,
                    capacity: PAGE_CAPACITY,
                    columns,
                },
            },
        }
    }

    /// Earlier revisions: box text was shorter, so the grid sits higher
    /// and the gain column is narrower.
    pub fn revision_2018() -> Self {
        let columns = Columns {
            description: ColumnLayout::new(36.0, Align::Left, 28.0),
            date_acquired: ColumnLayout::new(180.0, Align::Center, 10.0),
            date_sold: ColumnLayout::new(232.0, Align::Center, 10.0),
            proceeds: ColumnLayout::new(318.0, Align::Right, 56.0),
            cost_basis: ColumnLayout::new(384.0, Align::Right, 56.0),
            code: ColumnLayout::new(403.0, Align::Center, 3.0),
            adjustment: ColumnLayout::new(482.0, Align::Right, 56.0),
            gain_loss: ColumnLayout::new(568.0, Align::Right, 58.0),
        };
        Self {
            revision: "2018".to_string(),
            years: YearRange {
                first: None,
                last: Some(2021),
            },
            page: PageSize::LETTER,
            fonts: FontSizes {
                row: 6.5,
                totals: 6.5,
                ..FontSizes::default()
            },
            part_one: PartLayout {
                header: HeaderLayout {
                    name: Point::new(36.0, 704.0),
                    tin: Point::new(568.0, 704.0),
                    checkbox: Point::new(46.0, 575.0),
                    checkbox_step: 17.5,
                },
                table: TableLayout {
                    row_base: 441.0,
                    row_height: 23.8,
                    capacity: PAGE_CAPACITY,
                    columns,
                },
            },
            part_two: PartLayout {
                header: HeaderLayout {
                    name: Point::new(36.0, 728.0),
                    tin: Point::new(568.0, 728.0),
                    checkbox: Point::new(46.0, 611.0),
                    checkbox_step: 17.5,
                },
                table: TableLayout {
                    row_base: 477.0,
                    row_height: 23.8,
                    capacity: PAGE_CAPACITY,
                    columns,
                },
            },
        }
    }
}

/// Validated set of layout profiles, selected by tax year.
#[derive(Debug, Clone)]
pub struct LayoutRegistry {
    profiles: Vec<LayoutProfile>,
    default_revision: String,
}

impl LayoutRegistry {
    /// Build a registry; fails on the first invalid profile or when the
    /// default revision is not present.
    pub fn new(profiles: Vec<LayoutProfile>, default_revision: &str) -> Result<Self, FormError> {
        for profile in &profiles {
            profile.validate()?;
        }
        if !profiles.iter().any(|p| p.revision == default_revision) {
            return Err(FormError::Layout(format!(
                "Default revision '{}' is not defined",
                default_revision
            )));
        }
        Ok(Self {
            profiles,
            default_revision: default_revision.to_string(),
        })
    }

    /// The built-in profiles with the newest as default.
    pub fn builtin() -> Self {
        Self {
            profiles: vec![LayoutProfile::revision_2022(), LayoutProfile::revision_2018()],
            default_revision: "2022".to_string(),
        }
    }

    /// Built-in profiles with `overrides` replacing (by revision) or
    /// extending them.
    pub fn with_overrides(overrides: Vec<LayoutProfile>) -> Result<Self, FormError> {
        let mut profiles = Self::builtin().profiles;
        for profile in overrides {
            match profiles.iter_mut().find(|p| p.revision == profile.revision) {
                Some(existing) => *existing = profile,
                None => profiles.push(profile),
            }
        }
        Self::new(profiles, "2022")
    }

    pub fn profiles(&self) -> &[LayoutProfile] {
        &self.profiles
    }

    pub fn get(&self, revision: &str) -> Option<&LayoutProfile> {
        self.profiles.iter().find(|p| p.revision == revision)
    }

    /// First profile whose year range covers `year`, else the default.
    pub fn for_year(&self, year: i32) -> &LayoutProfile {
        self.profiles
            .iter()
            .find(|p| p.years.contains(year))
            .or_else(|| self.get(&self.default_revision))
            .unwrap_or(&self.profiles[0])
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
