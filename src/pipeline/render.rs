//! PDF writing: turn a laid-out [`Table`] into document bytes with lopdf.
//!
//! Rendering is synchronous and CPU-bound. The async entry points in
//! [`crate::convert`] run it inside `tokio::task::spawn_blocking` so large
//! tables never stall the Tokio worker threads.
//!
//! Each page's content stream is drawn in three passes: background fills
//! (header shading and body banding), then the grid, then text. Text goes
//! last so fills can never cover it.

use crate::config::{ConversionConfig, Orientation, DEFAULT_TITLE};
use crate::error::Csv2PdfError;
use crate::pipeline::fonts::{encode_win_ansi, Font};
use crate::pipeline::layout::{Layout, PageGeometry, PageSlice, RowLayout, CELL_PADDING};
use crate::table::Table;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::io::Cursor;
use std::time::Instant;
use tracing::{debug, info};

const HEADER_FILL: [u8; 3] = [0xf0, 0xf0, 0xf0];
const BAND_FILLS: [[u8; 3]; 2] = [[0xff, 0xff, 0xff], [0xfb, 0xfb, 0xfb]];
const GRID_STROKE: [u8; 3] = [0xaa, 0xaa, 0xaa];
const GRID_WIDTH: f64 = 0.25;

/// Options that shape the rendered document.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub title: String,
    pub orientation: Orientation,
    /// Flate-compress content streams.
    pub compress: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            orientation: Orientation::Landscape,
            compress: true,
        }
    }
}

impl RenderOptions {
    pub fn new(title: impl Into<String>, orientation: Orientation) -> Self {
        Self {
            title: title.into(),
            orientation,
            ..Self::default()
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            title: config.effective_title().to_string(),
            orientation: config.orientation,
            compress: config.compress,
        }
    }

    /// The title to draw; blank titles fall back to [`DEFAULT_TITLE`].
    pub fn effective_title(&self) -> &str {
        match self.title.trim() {
            "" => DEFAULT_TITLE,
            t => t,
        }
    }
}

/// A finished PDF held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    bytes: Vec<u8>,
    page_count: usize,
}

impl RenderedDocument {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// A readable stream positioned at the first byte.
    pub fn into_reader(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.bytes)
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Render `table` as a paginated A4 PDF.
///
/// Missing cells are drawn as empty strings. The header row is repeated at
/// the top of every page. A table with a header and no rows renders a single
/// page holding the title and header; rejecting empty tables is the caller's
/// job.
pub fn render(mut table: Table, options: &RenderOptions) -> Result<RenderedDocument, Csv2PdfError> {
    if table.column_count() == 0 {
        return Err(Csv2PdfError::Render {
            detail: "table has no columns".into(),
        });
    }
    let start = Instant::now();
    table.fill_missing();

    let geometry = PageGeometry::a4(options.orientation);
    let layout = Layout::build(&table, options.effective_title(), geometry)?;
    let bytes = write_pdf(&layout, options)?;

    info!(
        "Rendered {} rows into {} pages ({} bytes) in {}ms",
        table.row_count(),
        layout.pages.len(),
        bytes.len(),
        start.elapsed().as_millis()
    );
    Ok(RenderedDocument {
        bytes,
        page_count: layout.pages.len(),
    })
}

fn render_err(e: impl std::fmt::Display) -> Csv2PdfError {
    Csv2PdfError::Render {
        detail: e.to_string(),
    }
}

fn write_pdf(layout: &Layout, options: &RenderOptions) -> Result<Vec<u8>, Csv2PdfError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(font_dict(Font::Helvetica));
    let bold_id = doc.add_object(font_dict(Font::HelveticaBold));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            Font::Helvetica.resource_name() => regular_id,
            Font::HelveticaBold.resource_name() => bold_id,
        },
    });

    let geometry = &layout.geometry;
    let media_box: Vec<Object> = vec![
        Object::Integer(0),
        Object::Integer(0),
        real(geometry.width),
        real(geometry.height),
    ];

    let mut kids = Vec::with_capacity(layout.pages.len());
    for (n, slice) in layout.pages.iter().enumerate() {
        let content = Content {
            operations: page_operations(layout, slice),
        };
        let encoded = content.encode().map_err(render_err)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        debug!("Page {}: rows {:?}", n + 1, slice.rows);
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => media_box,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let info_id = info_dict(&mut doc, options.effective_title());
    doc.trailer.set("Info", info_id);

    if options.compress {
        doc.compress();
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).map_err(render_err)?;
    Ok(buffer)
}

fn font_dict(font: Font) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn info_dict(doc: &mut Document, title: &str) -> ObjectId {
    let created = chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
    doc.add_object(dictionary! {
        "Title" => Object::String(text_string(title), StringFormat::Hexadecimal),
        "Producer" => Object::string_literal(format!("csv2pdf {}", env!("CARGO_PKG_VERSION"))),
        "CreationDate" => Object::string_literal(created),
    })
}

/// PDF text string: UTF-16BE with a byte-order mark.
fn text_string(s: &str) -> Vec<u8> {
    let mut out = vec![0xFE, 0xFF];
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn color(op: &str, rgb: [u8; 3]) -> Operation {
    Operation::new(
        op,
        rgb.iter().map(|c| real(*c as f64 / 255.0)).collect(),
    )
}

/// Rows drawn on one page, top to bottom, with their top edges.
struct PlacedRow<'a> {
    row: &'a RowLayout,
    top: f64,
    /// Body index, `None` for the header.
    body_index: Option<usize>,
}

fn place_rows<'a>(layout: &'a Layout, slice: &PageSlice) -> Vec<PlacedRow<'a>> {
    let mut placed = Vec::with_capacity(slice.rows.len() + 1);
    let mut top = slice.table_top;
    if slice.header {
        placed.push(PlacedRow {
            row: &layout.header,
            top,
            body_index: None,
        });
        top -= layout.header.height;
    }
    for i in slice.rows.clone() {
        let row = &layout.body[i];
        placed.push(PlacedRow {
            row,
            top,
            body_index: Some(i),
        });
        top -= row.height;
    }
    placed
}

fn page_operations(layout: &Layout, slice: &PageSlice) -> Vec<Operation> {
    let mut ops = Vec::new();
    let geometry = &layout.geometry;
    let x0 = geometry.margins.left;

    if !slice.title.is_empty() {
        let style = layout.title.style;
        for (i, line) in layout.title.lines[slice.title.clone()].iter().enumerate() {
            let width = style.font.text_width(line, style.size);
            let x = x0 + (geometry.usable_width() - width) / 2.0;
            let y = layout.title.baseline(geometry.frame_top(), i);
            push_text(&mut ops, style.font, style.size, x, y, line);
        }
    }

    let rows = place_rows(layout, slice);
    if rows.is_empty() {
        return ops;
    }
    let table_width = layout.table_width();

    // fills
    for placed in &rows {
        let fill = match placed.body_index {
            None => HEADER_FILL,
            Some(i) => BAND_FILLS[i % BAND_FILLS.len()],
        };
        ops.push(color("rg", fill));
        ops.push(Operation::new(
            "re",
            vec![
                real(x0),
                real(placed.top - placed.row.height),
                real(table_width),
                real(placed.row.height),
            ],
        ));
        ops.push(Operation::new("f", vec![]));
    }

    // grid
    let table_top = rows[0].top;
    let table_bottom = rows
        .last()
        .map(|r| r.top - r.row.height)
        .unwrap_or(table_top);
    ops.push(Operation::new("w", vec![real(GRID_WIDTH)]));
    ops.push(color("RG", GRID_STROKE));
    let mut horizontal: Vec<f64> = rows.iter().map(|r| r.top).collect();
    horizontal.push(table_bottom);
    for y in horizontal {
        ops.push(Operation::new("m", vec![real(x0), real(y)]));
        ops.push(Operation::new("l", vec![real(x0 + table_width), real(y)]));
    }
    let mut x = x0;
    let mut vertical = vec![x];
    for w in &layout.column_widths {
        x += w;
        vertical.push(x);
    }
    for x in vertical {
        ops.push(Operation::new("m", vec![real(x), real(table_top)]));
        ops.push(Operation::new("l", vec![real(x), real(table_bottom)]));
    }
    ops.push(Operation::new("S", vec![]));

    // text
    ops.push(color("rg", [0, 0, 0]));
    for placed in &rows {
        let mut cell_x = x0;
        for (paragraph, width) in placed.row.cells.iter().zip(&layout.column_widths) {
            let text_top = placed.top - CELL_PADDING.top;
            for (i, line) in paragraph.lines.iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let y = paragraph.baseline(text_top, i);
                push_text(
                    &mut ops,
                    paragraph.style.font,
                    paragraph.style.size,
                    cell_x + CELL_PADDING.left,
                    y,
                    line,
                );
            }
            cell_x += width;
        }
    }
    ops
}

fn push_text(ops: &mut Vec<Operation>, font: Font, size: f64, x: f64, y: f64, text: &str) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![font.resource_name().into(), real(size)],
    ));
    ops.push(Operation::new("Td", vec![real(x), real(y)]));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
    ));
    ops.push(Operation::new("ET", vec![]));
}
