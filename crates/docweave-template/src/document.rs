//! The styled document tree templates are read from and rendered into.
//!
//! A [`Document`] is a sequence of [`BodyElement`]s: paragraphs made of
//! styled [`Run`]s, and tables made of rows of cells, where each cell holds
//! its own body (so tables nest). Only the formatting the engine needs to carry
//! through is modelled; serializing the tree into a container format is left to
//! the caller, which is why every type here is `Serialize`/`Deserialize`.

use serde::{Deserialize, Serialize};

// ── Formatting ───────────────────────────────────────────────────────

/// Horizontal alignment of a paragraph, table or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Aligned to the start of the line.
    Left,
    /// Centered.
    Center,
    /// Aligned to the end of the line.
    Right,
    /// Stretched to both margins.
    Justify,
}

/// Character formatting of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RunProperties {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    /// Font family name.
    pub font_family: Option<String>,
    /// Font size in half-points.
    pub font_size: Option<u32>,
    /// Text color as a hex string such as `"FF0000"`.
    pub color: Option<String>,
    /// Highlight color name.
    pub highlight: Option<String>,
}

impl RunProperties {
    /// Bold formatting, everything else default.
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    /// Italic formatting, everything else default.
    pub fn italic() -> Self {
        Self {
            italic: true,
            ..Self::default()
        }
    }
}

/// Paragraph-level formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ParagraphProperties {
    /// Named paragraph style, e.g. `"Heading1"`.
    pub style: Option<String>,
    pub alignment: Option<Alignment>,
    /// Space before the paragraph in twips.
    pub spacing_before: Option<u32>,
    /// Space after the paragraph in twips.
    pub spacing_after: Option<u32>,
    /// Left indentation in twips.
    pub indent_left: Option<i32>,
    pub keep_with_next: bool,
}

// ── Images ───────────────────────────────────────────────────────────

/// Encoded image formats the engine recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
}

impl ImageFormat {
    /// The MIME type of the format.
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }

    /// The conventional file extension of the format.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }
}

/// How an image sits relative to the surrounding text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagePosition {
    /// Part of the line, like a large character.
    #[default]
    Inline,
    /// Anchored to the left margin with text flowing around it.
    FloatLeft,
    /// Anchored to the right margin with text flowing around it.
    FloatRight,
}

/// Text wrapping around a floating image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageWrap {
    #[default]
    None,
    Square,
    Tight,
    TopAndBottom,
}

/// An image embedded in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedImage {
    /// Name of the placeholder (or source) the image came from.
    pub name: String,
    pub format: ImageFormat,
    /// The encoded image bytes.
    pub data: Vec<u8>,
    /// Intrinsic width in pixels.
    pub pixel_width: u32,
    /// Intrinsic height in pixels.
    pub pixel_height: u32,
    /// Display width in millimetres.
    pub width_mm: f64,
    /// Display height in millimetres.
    pub height_mm: f64,
    pub position: ImagePosition,
    pub wrap: ImageWrap,
    pub alignment: Option<Alignment>,
    /// Horizontal offset of a floating image in millimetres.
    pub offset_x_mm: f64,
    /// Vertical offset of a floating image in millimetres.
    pub offset_y_mm: f64,
    pub alt_text: Option<String>,
    pub title: Option<String>,
}

// ── Runs and paragraphs ──────────────────────────────────────────────

/// What a run carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunContent {
    Text(String),
    /// A manual line break.
    Break,
    Image(EmbeddedImage),
}

/// A span of content with uniform character formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub properties: RunProperties,
    pub content: RunContent,
}

impl Run {
    /// A text run with default formatting.
    pub fn text(text: impl Into<String>) -> Self {
        Self::styled(text, RunProperties::default())
    }

    /// A text run with the given formatting.
    pub fn styled(text: impl Into<String>, properties: RunProperties) -> Self {
        Self {
            properties,
            content: RunContent::Text(text.into()),
        }
    }

    /// A line break run.
    pub fn line_break() -> Self {
        Self {
            properties: RunProperties::default(),
            content: RunContent::Break,
        }
    }

    /// An image run.
    pub fn image(image: EmbeddedImage) -> Self {
        Self {
            properties: RunProperties::default(),
            content: RunContent::Image(image),
        }
    }

    /// The run's text, or `None` for non-text runs.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            RunContent::Text(t) => Some(t),
            _ => None,
        }
    }

    /// The run's image, if it carries one.
    pub fn as_image(&self) -> Option<&EmbeddedImage> {
        match &self.content {
            RunContent::Image(img) => Some(img),
            _ => None,
        }
    }
}

/// A paragraph: a sequence of runs sharing paragraph formatting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub properties: ParagraphProperties,
    #[serde(default)]
    pub runs: Vec<Run>,
}

impl Paragraph {
    /// A paragraph with a single default-formatted text run.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_runs(vec![Run::text(text)])
    }

    /// A paragraph with the given runs and default formatting.
    pub fn from_runs(runs: Vec<Run>) -> Self {
        Self {
            properties: ParagraphProperties::default(),
            runs,
        }
    }

    /// Appends a run.
    pub fn add_run(&mut self, run: Run) -> &mut Self {
        self.runs.push(run);
        self
    }

    /// The concatenated text of all text runs. Breaks become `'\n'`.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            match &run.content {
                RunContent::Text(t) => out.push_str(t),
                RunContent::Break => out.push('\n'),
                RunContent::Image(_) => {}
            }
        }
        out
    }

    /// Returns `true` if the paragraph has no runs with content.
    pub fn is_empty(&self) -> bool {
        self.runs
            .iter()
            .all(|r| matches!(&r.content, RunContent::Text(t) if t.is_empty()))
    }
}

// ── Tables ───────────────────────────────────────────────────────────

/// Vertical merge state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalMerge {
    /// First cell of a vertically merged range.
    Restart,
    /// Continuation of the range above.
    Continue,
}

/// Vertical alignment of cell content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlign {
    Top,
    Center,
    Bottom,
}

/// Table-level formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TableProperties {
    /// Named table style.
    pub style: Option<String>,
    /// Preferred width in twips.
    pub width: Option<u32>,
    pub alignment: Option<Alignment>,
    pub borders: bool,
}

/// Row-level formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RowProperties {
    /// Row height in twips.
    pub height: Option<u32>,
    /// Repeat as a header row on every page.
    pub header: bool,
    /// Do not split the row across pages.
    pub cant_split: bool,
}

/// Cell-level formatting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CellProperties {
    /// Cell width in twips.
    pub width: Option<u32>,
    /// Number of grid columns the cell spans.
    pub grid_span: u32,
    pub v_merge: Option<VerticalMerge>,
    pub v_align: Option<VerticalAlign>,
    /// Background fill as a hex color.
    pub shading: Option<String>,
}

impl Default for CellProperties {
    fn default() -> Self {
        Self {
            width: None,
            grid_span: 1,
            v_merge: None,
            v_align: None,
            shading: None,
        }
    }
}

/// A table cell holding its own body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub properties: CellProperties,
    #[serde(default)]
    pub body: Vec<BodyElement>,
}

impl Default for TableCell {
    fn default() -> Self {
        Self {
            properties: CellProperties::default(),
            body: vec![BodyElement::Paragraph(Paragraph::default())],
        }
    }
}

impl TableCell {
    /// A cell holding one paragraph of plain text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            properties: CellProperties::default(),
            body: vec![BodyElement::Paragraph(Paragraph::from_text(text))],
        }
    }

    /// The cell's paragraphs (nested tables excluded).
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.body.iter().filter_map(BodyElement::as_paragraph)
    }

    /// The plain text of the cell; paragraphs are joined with `'\n'`.
    pub fn text(&self) -> String {
        body_text(&self.body)
    }
}

/// A table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub properties: RowProperties,
    #[serde(default)]
    pub cells: Vec<TableCell>,
}

impl TableRow {
    /// A row of plain-text cells.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            properties: RowProperties::default(),
            cells: texts.into_iter().map(TableCell::from_text).collect(),
        }
    }

    /// Number of grid columns the row occupies.
    pub fn grid_columns(&self) -> usize {
        self.cells
            .iter()
            .map(|c| c.properties.grid_span.max(1) as usize)
            .sum()
    }
}

/// Default column width for new tables, in twips.
const DEFAULT_COLUMN_WIDTH: u32 = 2000;

/// A table: a column grid and rows of cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub properties: TableProperties,
    /// Column widths in twips.
    #[serde(default)]
    pub grid: Vec<u32>,
    #[serde(default)]
    pub rows: Vec<TableRow>,
}

impl Table {
    /// An empty `rows` × `cols` table with evenly sized columns.
    pub fn new(rows: usize, cols: usize) -> Self {
        let grid = vec![DEFAULT_COLUMN_WIDTH; cols];
        let row = TableRow {
            properties: RowProperties::default(),
            cells: grid
                .iter()
                .map(|w| TableCell {
                    properties: CellProperties {
                        width: Some(*w),
                        ..CellProperties::default()
                    },
                    ..TableCell::default()
                })
                .collect(),
        };
        Self {
            properties: TableProperties::default(),
            grid,
            rows: vec![row; rows],
        }
    }

    /// A table built from rows of plain-text cells. The grid is sized to the
    /// widest row.
    pub fn from_rows<R, I, S>(rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows: Vec<TableRow> = rows.into_iter().map(TableRow::from_texts).collect();
        let cols = rows.iter().map(TableRow::grid_columns).max().unwrap_or(0);
        let mut table = Self {
            properties: TableProperties::default(),
            grid: vec![DEFAULT_COLUMN_WIDTH; cols],
            rows,
        };
        for row in &mut table.rows {
            for (cell, width) in row.cells.iter_mut().zip(&table.grid) {
                cell.properties.width = Some(*width);
            }
        }
        table
    }

    /// Mutable access to the cell at (`row`, `col`).
    pub fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut TableCell> {
        self.rows.get_mut(row).and_then(|r| r.cells.get_mut(col))
    }

    /// The cell at (`row`, `col`).
    pub fn cell(&self, row: usize, col: usize) -> Option<&TableCell> {
        self.rows.get(row).and_then(|r| r.cells.get(col))
    }

    /// Number of grid columns.
    pub fn column_count(&self) -> usize {
        self.grid.len()
    }

    /// Returns the indices of rows whose spanned column count differs from
    /// the grid.
    pub fn check_grid(&self) -> Vec<usize> {
        let cols = self.grid.len();
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.grid_columns() != cols)
            .map(|(i, _)| i)
            .collect()
    }
}

// ── Document ─────────────────────────────────────────────────────────

/// A top-level (or cell-level) block of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyElement {
    Paragraph(Paragraph),
    Table(Table),
}

impl BodyElement {
    /// The paragraph, if this element is one.
    pub const fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Self::Paragraph(p) => Some(p),
            Self::Table(_) => None,
        }
    }

    /// The table, if this element is one.
    pub const fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            Self::Paragraph(_) => None,
        }
    }
}

/// A styled document.
///
/// # Examples
///
/// ```
/// use docweave_template::document::Document;
///
/// let doc = Document::from_text("Dear {{name}},\nThank you.");
/// assert_eq!(doc.paragraphs().count(), 2);
/// assert_eq!(doc.plain_text(), "Dear {{name}},\nThank you.");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub body: Vec<BodyElement>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a document with one default-styled paragraph per line of
    /// `text`.
    pub fn from_text(text: &str) -> Self {
        Self {
            body: text
                .split('\n')
                .map(|line| {
                    BodyElement::Paragraph(Paragraph::from_text(line.trim_end_matches('\r')))
                })
                .collect(),
        }
    }

    /// Appends a paragraph.
    pub fn add_paragraph(&mut self, paragraph: Paragraph) -> &mut Self {
        self.body.push(BodyElement::Paragraph(paragraph));
        self
    }

    /// Appends a table.
    pub fn add_table(&mut self, table: Table) -> &mut Self {
        self.body.push(BodyElement::Table(table));
        self
    }

    /// Top-level paragraphs, in order.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.body.iter().filter_map(BodyElement::as_paragraph)
    }

    /// Top-level tables, in order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.body.iter().filter_map(BodyElement::as_table)
    }

    /// The text of the document.
    ///
    /// Paragraphs are separated by `'\n'`; table cells by `'\t'` and table
    /// rows by `'\n'`.
    pub fn plain_text(&self) -> String {
        body_text(&self.body)
    }

    /// Every image embedded anywhere in the document, in document order.
    pub fn images(&self) -> Vec<&EmbeddedImage> {
        let mut out = Vec::new();
        collect_images(&self.body, &mut out);
        out
    }
}

fn body_text(body: &[BodyElement]) -> String {
    let parts: Vec<String> = body
        .iter()
        .map(|element| match element {
            BodyElement::Paragraph(p) => p.text(),
            BodyElement::Table(t) => t
                .rows
                .iter()
                .map(|row| {
                    row.cells
                        .iter()
                        .map(TableCell::text)
                        .collect::<Vec<_>>()
                        .join("\t")
                })
                .collect::<Vec<_>>()
                .join("\n"),
        })
        .collect();
    parts.join("\n")
}

fn collect_images<'a>(body: &'a [BodyElement], out: &mut Vec<&'a EmbeddedImage>) {
    for element in body {
        match element {
            BodyElement::Paragraph(p) => out.extend(p.runs.iter().filter_map(Run::as_image)),
            BodyElement::Table(t) => {
                for cell in t.rows.iter().flat_map(|r| &r.cells) {
                    collect_images(&cell.body, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_one_paragraph_per_line() {
        let doc = Document::from_text("a\r\nb\n\nc");
        let texts: Vec<String> = doc.paragraphs().map(Paragraph::text).collect();
        assert_eq!(texts, vec!["a", "b", "", "c"]);
    }

    #[test]
    fn test_paragraph_text_concatenates_runs() {
        let p = Paragraph::from_runs(vec![
            Run::text("Hello "),
            Run::styled("bold", RunProperties::bold()),
            Run::line_break(),
            Run::text("next"),
        ]);
        assert_eq!(p.text(), "Hello bold\nnext");
        assert!(!p.is_empty());
        assert!(Paragraph::default().is_empty());
    }

    #[test]
    fn test_table_new_has_consistent_grid() {
        let t = Table::new(3, 4);
        assert_eq!(t.rows.len(), 3);
        assert_eq!(t.column_count(), 4);
        assert!(t.check_grid().is_empty());
        assert_eq!(t.cell(2, 3).unwrap().properties.width, Some(2000));
    }

    #[test]
    fn test_check_grid_reports_bad_rows() {
        let mut t = Table::from_rows([vec!["a", "b"], vec!["c", "d"]]);
        t.cell_mut(1, 0).unwrap().properties.grid_span = 2;
        assert_eq!(t.check_grid(), vec![1]);
    }

    #[test]
    fn test_plain_text_with_table() {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::from_text("Title"));
        doc.add_table(Table::from_rows([vec!["a", "b"], vec!["c", "d"]]));
        assert_eq!(doc.plain_text(), "Title\na\tb\nc\td");
        assert_eq!(doc.tables().count(), 1);
    }

    #[test]
    fn test_cell_default_has_one_paragraph() {
        let cell = TableCell::default();
        assert_eq!(cell.paragraphs().count(), 1);
        assert_eq!(cell.properties.grid_span, 1);
    }

    #[test]
    fn test_document_serde_roundtrip() {
        let mut doc = Document::from_text("x");
        doc.add_table(Table::new(1, 1));
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_image_format_metadata() {
        assert_eq!(ImageFormat::Png.mime_type(), "image/png");
        assert_eq!(ImageFormat::Jpeg.extension(), "jpeg");
    }
}
