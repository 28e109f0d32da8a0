//! Table layout: page geometry, column widths, line wrapping and pagination.
//!
//! This stage is pure arithmetic over points (1/72 inch). It knows nothing
//! about the PDF object model; [`crate::pipeline::render`] turns the
//! resulting [`Layout`] into content-stream operators.
//!
//! PDF coordinates grow upwards from the bottom-left corner of the page, so
//! "top" values are larger than "bottom" values throughout.

use crate::config::Orientation;
use crate::error::Csv2PdfError;
use crate::pipeline::fonts::Font;
use crate::pipeline::markup;
use crate::table::Table;
use std::ops::Range;
use tracing::debug;

/// A4 portrait in points.
pub const A4: (f64, f64) = (595.275_590_551_181_2, 841.889_763_779_527_7);

/// Narrowest column the width heuristic will produce.
pub const MIN_COLUMN_WIDTH: f64 = 40.0;

/// Smallest weight a column header contributes, so one-letter headers are
/// not starved.
pub const MIN_COLUMN_WEIGHT: usize = 5;

/// Padding inside every table cell.
pub const CELL_PADDING: Padding = Padding {
    top: 4.0,
    bottom: 4.0,
    left: 6.0,
    right: 6.0,
};

/// Space after the title paragraph, plus the spacer before the table.
pub const TITLE_SPACE_AFTER: f64 = 6.0 + 10.0;

/// Fraction of the font size that sits below the baseline.
const DESCENT: f64 = 0.2;

const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Padding {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

/// Font, size and line spacing of one kind of paragraph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParagraphStyle {
    pub font: Font,
    pub size: f64,
    pub leading: f64,
}

pub const TITLE_STYLE: ParagraphStyle = ParagraphStyle {
    font: Font::HelveticaBold,
    size: 18.0,
    leading: 22.0,
};

pub const HEADER_STYLE: ParagraphStyle = ParagraphStyle {
    font: Font::HelveticaBold,
    size: 9.0,
    leading: 11.0,
};

pub const CELL_STYLE: ParagraphStyle = ParagraphStyle {
    font: Font::Helvetica,
    size: 8.0,
    leading: 10.0,
};

/// Page size and margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margins: Padding,
}

impl PageGeometry {
    /// A4 in the requested orientation with the fixed document margins
    /// (left/right 20, top 30, bottom 20).
    pub fn a4(orientation: Orientation) -> Self {
        let (width, height) = match orientation {
            Orientation::Portrait => A4,
            Orientation::Landscape => (A4.1, A4.0),
        };
        Self {
            width,
            height,
            margins: Padding {
                top: 30.0,
                bottom: 20.0,
                left: 20.0,
                right: 20.0,
            },
        }
    }

    pub fn usable_width(&self) -> f64 {
        self.width - self.margins.left - self.margins.right
    }

    pub fn frame_top(&self) -> f64 {
        self.height - self.margins.top
    }

    pub fn frame_bottom(&self) -> f64 {
        self.margins.bottom
    }

    pub fn frame_height(&self) -> f64 {
        self.frame_top() - self.frame_bottom()
    }
}

/// Compute column widths from header lengths.
///
/// Each column's weight is `max(5, header chars)` and its width is its share
/// of `usable_width`, floored at [`MIN_COLUMN_WIDTH`]. Columns lifted to the
/// floor are frozen and the remaining width is re-shared among the others,
/// so the widths sum to `usable_width` whenever `n × 40 ≤ usable_width`.
/// Past that point every column gets the floor and the table is wider than
/// the frame.
pub fn column_widths(headers: &[String], usable_width: f64) -> Vec<f64> {
    let n = headers.len();
    if n == 0 {
        return Vec::new();
    }
    if n as f64 * MIN_COLUMN_WIDTH >= usable_width {
        return vec![MIN_COLUMN_WIDTH; n];
    }

    let weights: Vec<f64> = headers
        .iter()
        .map(|h| h.chars().count().max(MIN_COLUMN_WEIGHT) as f64)
        .collect();
    let mut floored = vec![false; n];

    loop {
        let floored_count = floored.iter().filter(|f| **f).count();
        let free_width = usable_width - floored_count as f64 * MIN_COLUMN_WIDTH;
        let free_weight: f64 = weights
            .iter()
            .zip(&floored)
            .filter(|(_, f)| !**f)
            .map(|(w, _)| w)
            .sum();

        let mut changed = false;
        for i in 0..n {
            if !floored[i] && free_width * weights[i] / free_weight < MIN_COLUMN_WIDTH {
                floored[i] = true;
                changed = true;
            }
        }

        if !changed {
            return weights
                .iter()
                .zip(&floored)
                .map(|(w, f)| {
                    if *f {
                        MIN_COLUMN_WIDTH
                    } else {
                        free_width * w / free_weight
                    }
                })
                .collect();
        }
    }
}

/// Greedy word wrap of one explicit line.
///
/// Runs of whitespace collapse to a single space. Words wider than
/// `max_width` are broken between characters.
pub fn wrap_line(text: &str, font: Font, size: f64, max_width: f64) -> Vec<String> {
    let space = font.text_width(" ", size);
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0;

    for word in text.split_whitespace() {
        let word_width = font.text_width(word, size);

        if !current.is_empty() && current_width + space + word_width <= max_width + EPSILON {
            current.push(' ');
            current.push_str(word);
            current_width += space + word_width;
            continue;
        }
        if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        if word_width <= max_width + EPSILON {
            current.push_str(word);
            current_width = word_width;
            continue;
        }

        // hard-break an over-long word
        current_width = 0.0;
        for c in word.chars() {
            let w = font.text_width(c.encode_utf8(&mut [0; 4]), size);
            if !current.is_empty() && current_width + w > max_width + EPSILON {
                out.push(std::mem::take(&mut current));
                current_width = 0.0;
            }
            current.push(c);
            current_width += w;
        }
    }

    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

/// A wrapped paragraph, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub lines: Vec<String>,
    pub style: ParagraphStyle,
}

impl Paragraph {
    /// Build from escaped markup, wrapping each explicit line to `max_width`.
    pub fn from_markup(markup_text: &str, style: ParagraphStyle, max_width: f64) -> Self {
        let lines = markup::lines(markup_text)
            .iter()
            .flat_map(|line| wrap_line(line, style.font, style.size, max_width))
            .collect();
        Self { lines, style }
    }

    pub fn height(&self) -> f64 {
        self.lines.len() as f64 * self.style.leading
    }

    /// Baseline of line `index` (0-based) for a paragraph whose top edge is
    /// at `top`.
    pub fn baseline(&self, top: f64, index: usize) -> f64 {
        top - (index + 1) as f64 * self.style.leading + DESCENT * self.style.size
    }
}

/// One table row: a paragraph per column and the row's total height.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLayout {
    pub cells: Vec<Paragraph>,
    pub height: f64,
}

impl RowLayout {
    fn new(markups: &[String], style: ParagraphStyle, widths: &[f64]) -> Self {
        let cells: Vec<Paragraph> = markups
            .iter()
            .zip(widths)
            .map(|(m, w)| {
                let text_width = w - CELL_PADDING.left - CELL_PADDING.right;
                Paragraph::from_markup(m, style, text_width)
            })
            .collect();
        let content = cells.iter().map(Paragraph::height).fold(0.0, f64::max);
        Self {
            cells,
            height: content + CELL_PADDING.top + CELL_PADDING.bottom,
        }
    }
}

/// What one page shows.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSlice {
    /// Title lines drawn on this page; empty once the title is done.
    pub title: Range<usize>,
    /// The header row is drawn on this page.
    pub header: bool,
    /// Top edge of the table on this page.
    pub table_top: f64,
    /// Body rows placed on this page.
    pub rows: Range<usize>,
}

/// The full, paginated document layout.
#[derive(Debug, Clone)]
pub struct Layout {
    pub geometry: PageGeometry,
    pub column_widths: Vec<f64>,
    pub title: Paragraph,
    pub header: RowLayout,
    pub body: Vec<RowLayout>,
    pub pages: Vec<PageSlice>,
}

impl Layout {
    /// Lay out `table` under a title.
    ///
    /// Missing cells must already be filled; every header and cell goes
    /// through [`markup::escape`] before wrapping. Fails when a single row
    /// is taller than an empty page.
    pub fn build(table: &Table, title: &str, geometry: PageGeometry) -> Result<Self, Csv2PdfError> {
        let widths = column_widths(table.columns(), geometry.usable_width());
        let title = Paragraph::from_markup(
            &markup::escape(title),
            TITLE_STYLE,
            geometry.usable_width(),
        );

        let header_markup: Vec<String> = table.columns().iter().map(|c| markup::escape(c)).collect();
        let header = RowLayout::new(&header_markup, HEADER_STYLE, &widths);

        let body: Vec<RowLayout> = table
            .rows()
            .iter()
            .map(|row| {
                let markups: Vec<String> =
                    row.iter().map(|cell| markup::escape(&cell.to_text())).collect();
                RowLayout::new(&markups, CELL_STYLE, &widths)
            })
            .collect();

        let pages = paginate(&geometry, &title, &header, &body)?;
        debug!(
            "Laid out {} rows on {} pages ({} columns)",
            body.len(),
            pages.len(),
            widths.len()
        );

        Ok(Self {
            geometry,
            column_widths: widths,
            title,
            header,
            body,
            pages,
        })
    }

    /// Total width of the table.
    pub fn table_width(&self) -> f64 {
        self.column_widths.iter().sum()
    }
}

/// Split body rows across pages, repeating the header on each one.
///
/// A title taller than one page flows onto as many title-only pages as it
/// needs; the table starts below its last line.
fn paginate(
    geometry: &PageGeometry,
    title: &Paragraph,
    header: &RowLayout,
    body: &[RowLayout],
) -> Result<Vec<PageSlice>, Csv2PdfError> {
    let bottom = geometry.frame_bottom() - EPSILON;
    let leading = title.style.leading;
    let title_per_page = (((geometry.frame_height() + EPSILON) / leading).floor() as usize).max(1);
    let done = title.lines.len()..title.lines.len();

    let mut pages = Vec::new();
    let mut title_start = 0;
    while title.lines.len() - title_start > title_per_page {
        pages.push(PageSlice {
            title: title_start..title_start + title_per_page,
            header: false,
            table_top: geometry.frame_top(),
            rows: 0..0,
        });
        title_start += title_per_page;
    }

    let mut title_lines = title_start..title.lines.len();
    let mut start = 0;

    loop {
        let table_top = if title_lines.is_empty() {
            geometry.frame_top()
        } else {
            geometry.frame_top() - title_lines.len() as f64 * leading - TITLE_SPACE_AFTER
        };

        let mut y = table_top - header.height;
        let header_fits = y >= bottom;
        let mut end = start;
        if header_fits {
            while end < body.len() && y - body[end].height >= bottom {
                y -= body[end].height;
                end += 1;
            }
        }

        if !header_fits || (end == start && start < body.len()) {
            if !title_lines.is_empty() {
                // the title leaves too little room; start the table on a fresh page
                pages.push(PageSlice {
                    title: title_lines,
                    header: false,
                    table_top,
                    rows: start..start,
                });
                title_lines = done.clone();
                continue;
            }
            let (what, height) = if header_fits {
                (format!("Row {}", start + 1), body[start].height)
            } else {
                ("The header row".to_string(), header.height)
            };
            return Err(Csv2PdfError::Render {
                detail: format!(
                    "{what} needs {height:.0}pt but a page holds {:.0}pt of table",
                    geometry.frame_height() - if header_fits { header.height } else { 0.0 }
                ),
            });
        }

        pages.push(PageSlice {
            title: title_lines,
            header: true,
            table_top,
            rows: start..end,
        });
        title_lines = done.clone();
        start = end;
        if start >= body.len() {
            return Ok(pages);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn headers(n: usize, len: usize) -> Vec<String> {
        (0..n).map(|i| format!("{:width$}", i, width = len)).collect()
    }

    fn table(cols: &[&str], rows: usize, cell: &str) -> Table {
        let mut t = Table::new(cols.iter().map(|s| s.to_string()).collect());
        for _ in 0..rows {
            t.push_row(cols.iter().map(|_| Cell::from_field(cell)).collect())
                .unwrap();
        }
        t.fill_missing();
        t
    }

    #[test]
    fn a4_geometry() {
        let l = PageGeometry::a4(Orientation::Landscape);
        assert!(l.width > l.height);
        assert!((l.usable_width() - (841.889_763_779_527_7 - 40.0)).abs() < 1e-9);
        let p = PageGeometry::a4(Orientation::Portrait);
        assert!((p.usable_width() - (595.275_590_551_181_2 - 40.0)).abs() < 1e-9);
        assert!((p.frame_top() - (841.889_763_779_527_7 - 30.0)).abs() < 1e-9);
        assert_eq!(p.frame_bottom(), 20.0);
    }

    #[test]
    fn proportional_widths_follow_header_length() {
        let h = vec!["id".to_string(), "description".to_string()];
        let w = column_widths(&h, 160.0);
        // weights 5 and 11
        assert!((w[0] - 50.0).abs() < 1e-9);
        assert!((w[1] - 110.0).abs() < 1e-9);
    }

    #[test]
    fn widths_sum_to_usable_and_respect_floor() {
        for orientation in [Orientation::Landscape, Orientation::Portrait] {
            let usable = PageGeometry::a4(orientation).usable_width();
            for n in 1..=50 {
                for len in [1, 7, 40] {
                    let w = column_widths(&headers(n, len), usable);
                    assert_eq!(w.len(), n);
                    assert!(w.iter().all(|x| *x >= MIN_COLUMN_WIDTH - 1e-9));
                    if n as f64 * MIN_COLUMN_WIDTH <= usable {
                        let sum: f64 = w.iter().sum();
                        assert!((sum - usable).abs() < 1e-6, "n={n} len={len} sum={sum}");
                    }
                }
            }
        }
    }

    #[test]
    fn floor_redistributes_to_wide_headers() {
        let mut h = headers(5, 1);
        h.push("x".repeat(200));
        let w = column_widths(&h, 555.0);
        for x in &w[..5] {
            assert_eq!(*x, MIN_COLUMN_WIDTH);
        }
        assert!((w[5] - (555.0 - 5.0 * MIN_COLUMN_WIDTH)).abs() < 1e-9);
    }

    #[test]
    fn too_many_columns_all_get_floor() {
        let w = column_widths(&headers(30, 3), 555.0);
        assert!(w.iter().all(|x| *x == MIN_COLUMN_WIDTH));
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_line("the quick brown fox jumps over the lazy dog", Font::Helvetica, 8.0, 60.0);
        assert!(lines.len() > 1);
        for l in &lines {
            assert!(Font::Helvetica.text_width(l, 8.0) <= 60.0 + 1e-6, "{l}");
        }
        assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn wrap_breaks_long_words() {
        let word = "x".repeat(100);
        let lines = wrap_line(&word, Font::Helvetica, 8.0, 28.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
    }

    #[test]
    fn empty_text_is_one_line() {
        assert_eq!(wrap_line("", Font::Helvetica, 8.0, 50.0), vec![String::new()]);
        assert_eq!(wrap_line("   ", Font::Helvetica, 8.0, 50.0), vec![String::new()]);
    }

    #[test]
    fn paragraph_honours_explicit_breaks() {
        let p = Paragraph::from_markup("a<br/>b<br/>c", CELL_STYLE, 100.0);
        assert_eq!(p.lines, vec!["a", "b", "c"]);
        assert!((p.height() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn single_page_for_small_table() {
        let t = table(&["a", "b"], 2, "1");
        let layout = Layout::build(&t, "T", PageGeometry::a4(Orientation::Landscape)).unwrap();
        assert_eq!(layout.pages.len(), 1);
        assert_eq!(layout.pages[0].title, 0..1);
        assert!(layout.pages[0].header);
        assert_eq!(layout.pages[0].rows, 0..2);
    }

    #[test]
    fn header_repeats_and_rows_are_contiguous() {
        let t = table(&["a", "b", "c"], 400, "value");
        let layout = Layout::build(&t, "Report", PageGeometry::a4(Orientation::Portrait)).unwrap();
        assert!(layout.pages.len() > 1);
        assert!(layout.pages.iter().all(|p| p.header));
        assert!(!layout.pages[0].title.is_empty());
        assert!(layout.pages[1..].iter().all(|p| p.title.is_empty()));

        let mut next = 0;
        for page in &layout.pages {
            assert_eq!(page.rows.start, next);
            next = page.rows.end;
            let used = layout.header.height
                + layout.body[page.rows.clone()].iter().map(|r| r.height).sum::<f64>();
            assert!(page.table_top - used >= layout.geometry.frame_bottom() - 1e-6);
        }
        assert_eq!(next, 400);
    }

    #[test]
    fn zero_rows_gives_header_only_page() {
        let t = table(&["a"], 0, "");
        let layout = Layout::build(&t, "T", PageGeometry::a4(Orientation::Landscape)).unwrap();
        assert_eq!(layout.pages.len(), 1);
        assert!(layout.pages[0].header);
        assert!(layout.pages[0].rows.is_empty());
    }

    #[test]
    fn row_taller_than_page_is_a_render_error() {
        let tall = "line\n".repeat(200);
        let t = table(&["a"], 1, &tall);
        let err = Layout::build(&t, "T", PageGeometry::a4(Orientation::Landscape)).unwrap_err();
        assert!(matches!(err, Csv2PdfError::Render { .. }));
    }

    #[test]
    fn header_and_cells_are_escaped_before_layout() {
        let t = table(&["a<b"], 1, "x & y\nz");
        let layout = Layout::build(&t, "T", PageGeometry::a4(Orientation::Landscape)).unwrap();
        assert_eq!(layout.header.cells[0].lines, vec!["a<b"]);
        assert_eq!(layout.body[0].cells[0].lines, vec!["x & y", "z"]);
    }

    #[test]
    fn long_title_flows_onto_following_pages() {
        let t = table(&["a", "b"], 3, "1");
        let geometry = PageGeometry::a4(Orientation::Landscape);
        let layout = Layout::build(&t, &"word ".repeat(2000), geometry).unwrap();
        let line_count = layout.title.lines.len();
        assert!(layout.title.height() > geometry.frame_height());

        let mut next = 0;
        for page in layout.pages.iter().filter(|p| !p.title.is_empty()) {
            assert_eq!(page.title.start, next);
            next = page.title.end;
            let last = layout.title.baseline(geometry.frame_top(), page.title.len() - 1);
            assert!(last >= geometry.frame_bottom(), "title line below the page");
        }
        assert_eq!(next, line_count);

        let table_page = layout.pages.iter().position(|p| p.header).unwrap();
        assert!(layout.pages[..table_page].iter().all(|p| !p.title.is_empty()));
        assert_eq!(layout.pages.last().unwrap().rows.end, 3);
    }
}
