//! Template parser.
//!
//! Converts a styled [`Document`] into a tree of [`Block`]s. Directives are
//! recognised in the concatenated text of each paragraph, so a placeholder
//! split across several runs (as word processors like to do) still parses;
//! every literal span keeps the formatting of the run it came from, and every
//! placeholder takes the formatting of the run its `{{` starts in.
//!
//! Directives work at two levels:
//!
//! - **Inline**: inside one paragraph, e.g. `Dear {{#if vip}}valued {{/if}}customer`.
//!   Inline directives must balance within their paragraph.
//! - **Body**: a paragraph whose whole text is a single `#if`, `else`,
//!   `/if`, `#each`, `/each`, `#block`, `/block` or `extends` directive is
//!   removed, and the directive wraps the paragraphs and tables between it and
//!   its partner.
//!
//! A table row whose first cell starts with `{{#each list}}` and whose last
//! cell ends with the matching `{{/each}}` is a *template row*: it is repeated
//! once per list entry when rendered.

use std::collections::BTreeSet;

use docweave_core::{ParseError, ParseErrorKind, Position, TemplateSettings};

use crate::document::{
    BodyElement, CellProperties, Document, Paragraph, ParagraphProperties, RowProperties, Run,
    RunContent, RunProperties, Table, TableProperties, TableRow,
};
use crate::lexer::{self, Token, TokenKind};

/// A node in the parsed template tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Literal text with the formatting of its source run.
    Text {
        text: String,
        style: RunProperties,
    },
    /// `{{path}}`.
    Variable {
        path: String,
        style: RunProperties,
        position: Position,
    },
    /// `{{#image name}}`.
    Image {
        name: String,
        style: RunProperties,
        position: Position,
    },
    /// `{{#if condition}} … {{else}} … {{/if}}`.
    Conditional {
        condition: String,
        then_blocks: Vec<Block>,
        else_blocks: Option<Vec<Block>>,
        position: Position,
    },
    /// `{{#each list}} … {{/each}}`.
    Loop {
        list: String,
        body: Vec<Block>,
        position: Position,
    },
    /// `{{#block "id"}} … {{/block}}`.
    NamedBlock {
        id: String,
        body: Vec<Block>,
        position: Position,
        /// Template the body was taken from when inheritance replaced it.
        /// `None` means the body belongs to the enclosing template.
        origin: Option<String>,
    },
    /// `{{extends "parent"}}`. Renders nothing.
    Extends { parent: String, position: Position },
    /// A source paragraph.
    Paragraph {
        properties: ParagraphProperties,
        children: Vec<Block>,
        /// Whether the source paragraph contained any directive.
        has_directives: bool,
    },
    /// A source table.
    Table(TableBlock),
    /// A non-text run (image, line break) passed through unchanged.
    Static(Run),
}

/// A parsed table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub properties: TableProperties,
    pub grid: Vec<u32>,
    pub rows: Vec<RowBlock>,
}

/// A parsed table row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowBlock {
    /// A row rendered once.
    Static(RowTemplate),
    /// A template row rendered once per entry of `list`.
    Loop {
        list: String,
        row: RowTemplate,
        position: Position,
    },
}

/// The formatting and parsed cells of a row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowTemplate {
    pub properties: RowProperties,
    pub cells: Vec<CellTemplate>,
}

/// The formatting and parsed body of a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellTemplate {
    pub properties: CellProperties,
    pub body: Vec<Block>,
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// The name the template is registered under.
    pub name: String,
    /// The parsed block tree.
    pub blocks: Vec<Block>,
    /// The parent template name, if this template starts with `{{extends}}`.
    pub extends: Option<String>,
    /// Every variable path referenced by a `{{path}}` placeholder.
    pub variables: BTreeSet<String>,
    /// The styled document the template was parsed from.
    pub source: Document,
}

/// Parses a template from plain text: one default-styled paragraph per line.
///
/// # Errors
///
/// Returns a [`ParseError`] (carrying `name`) for unbalanced or malformed
/// directives.
pub fn parse_str(
    name: &str,
    source: &str,
    settings: &TemplateSettings,
) -> Result<Template, ParseError> {
    parse_document(name, Document::from_text(source), settings)
}

/// Parses a template from a styled document.
///
/// # Errors
///
/// Returns a [`ParseError`] (carrying `name`) for unbalanced or malformed
/// directives.
pub fn parse_document(
    name: &str,
    document: Document,
    settings: &TemplateSettings,
) -> Result<Template, ParseError> {
    let mut state = ParserState::new(settings);
    let blocks = state
        .parse_body(&document.body, 0)
        .map_err(|e| e.with_template(name))?;

    Ok(Template {
        name: name.to_string(),
        blocks,
        extends: state.extends,
        variables: state.variables,
        source: document,
    })
}

// ============================================================
// Tree builder
// ============================================================

#[derive(Debug)]
enum FrameKind {
    If {
        condition: String,
        then_blocks: Vec<Block>,
        else_blocks: Option<Vec<Block>>,
    },
    Each {
        list: String,
        body: Vec<Block>,
    },
    Named {
        id: String,
        body: Vec<Block>,
    },
}

impl FrameKind {
    const fn closer(&self) -> Closer {
        match self {
            Self::If { .. } => Closer::If,
            Self::Each { .. } => Closer::Each,
            Self::Named { .. } => Closer::Block,
        }
    }
}

/// An open directive waiting for its closer.
#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    /// Source text of the opener, for error messages.
    opener: String,
    position: Position,
}

impl Frame {
    fn push(&mut self, block: Block) {
        match &mut self.kind {
            FrameKind::If {
                then_blocks,
                else_blocks,
                ..
            } => else_blocks.as_mut().unwrap_or(then_blocks).push(block),
            FrameKind::Each { body, .. } | FrameKind::Named { body, .. } => body.push(block),
        }
    }

    fn into_block(self) -> Block {
        match self.kind {
            FrameKind::If {
                condition,
                then_blocks,
                else_blocks,
            } => Block::Conditional {
                condition,
                then_blocks,
                else_blocks,
                position: self.position,
            },
            FrameKind::Each { list, body } => Block::Loop {
                list,
                body,
                position: self.position,
            },
            FrameKind::Named { id, body } => Block::NamedBlock {
                id,
                body,
                position: self.position,
                origin: None,
            },
        }
    }
}

/// Which closer a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closer {
    If,
    Each,
    Block,
}

impl Closer {
    const fn text(self) -> &'static str {
        match self {
            Self::If => "{{/if}}",
            Self::Each => "{{/each}}",
            Self::Block => "{{/block}}",
        }
    }
}

/// A stack of open directives. Each opener pushes a frame and each closer
/// pops the innermost one, which must be of the same kind.
#[derive(Debug)]
struct TreeBuilder {
    root: Vec<Block>,
    open: Vec<Frame>,
    base_depth: usize,
    max_depth: usize,
}

impl TreeBuilder {
    const fn new(base_depth: usize, max_depth: usize) -> Self {
        Self {
            root: Vec::new(),
            open: Vec::new(),
            base_depth,
            max_depth,
        }
    }

    /// Number of directives currently open, including those of enclosing
    /// builders.
    fn depth(&self) -> usize {
        self.base_depth + self.open.len()
    }

    fn push(&mut self, block: Block) {
        match self.open.last_mut() {
            Some(frame) => frame.push(block),
            None => self.root.push(block),
        }
    }

    fn open(&mut self, kind: FrameKind, opener: String, position: Position) -> Result<(), ParseError> {
        check_depth(self.depth(), self.max_depth, position)?;
        self.open.push(Frame {
            kind,
            opener,
            position,
        });
        Ok(())
    }

    fn else_branch(&mut self, position: Position) -> Result<(), ParseError> {
        match self.open.last_mut().map(|f| &mut f.kind) {
            Some(FrameKind::If { else_blocks, .. }) => {
                if else_blocks.is_some() {
                    return Err(ParseError::new(ParseErrorKind::DuplicateElse, position));
                }
                *else_blocks = Some(Vec::new());
                Ok(())
            }
            _ => Err(ParseError::new(ParseErrorKind::UnexpectedElse, position)),
        }
    }

    fn close(&mut self, closer: Closer, position: Position) -> Result<(), ParseError> {
        let Some(frame) = self.open.pop() else {
            return Err(ParseError::new(
                ParseErrorKind::UnmatchedCloser(closer.text().to_string()),
                position,
            ));
        };
        let expected = frame.kind.closer();
        if expected != closer {
            return Err(ParseError::new(
                ParseErrorKind::MismatchedCloser {
                    expected: expected.text().to_string(),
                    found: closer.text().to_string(),
                },
                position,
            ));
        }
        self.push(frame.into_block());
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Block>, ParseError> {
        match self.open.pop() {
            Some(frame) => Err(ParseError::new(
                ParseErrorKind::UnclosedDirective(frame.opener),
                frame.position,
            )),
            None => Ok(self.root),
        }
    }
}

fn check_depth(depth: usize, limit: usize, position: Position) -> Result<(), ParseError> {
    if depth >= limit {
        return Err(ParseError::new(
            ParseErrorKind::NestingTooDeep { limit },
            position,
        ));
    }
    Ok(())
}

// ============================================================
// Run mapping
// ============================================================

/// The text of a paragraph with a map back to the runs it came from.
struct RunMap<'a> {
    text: String,
    /// `(start, end, style)` of every text run, in order.
    spans: Vec<(usize, usize, &'a RunProperties)>,
    /// Non-text runs and the text offset they sit at.
    anchors: Vec<(usize, &'a Run)>,
}

impl<'a> RunMap<'a> {
    fn new(paragraph: &'a Paragraph) -> Self {
        let mut text = String::new();
        let mut spans = Vec::new();
        let mut anchors = Vec::new();
        for run in &paragraph.runs {
            match &run.content {
                RunContent::Text(t) => {
                    let start = text.len();
                    text.push_str(t);
                    spans.push((start, text.len(), &run.properties));
                }
                _ => anchors.push((text.len(), run)),
            }
        }
        Self {
            text,
            spans,
            anchors,
        }
    }

    /// The style of the run containing byte `offset`.
    fn style_at(&self, offset: usize) -> RunProperties {
        self.spans
            .iter()
            .find(|(s, e, _)| *s <= offset && offset < *e)
            .map(|(_, _, style)| (*style).clone())
            .unwrap_or_default()
    }
}

// ============================================================
// Parser
// ============================================================

struct ParserState<'s> {
    settings: &'s TemplateSettings,
    paragraph: usize,
    seen_directive: bool,
    extends: Option<String>,
    variables: BTreeSet<String>,
}

impl<'s> ParserState<'s> {
    fn new(settings: &'s TemplateSettings) -> Self {
        Self {
            settings,
            paragraph: 0,
            seen_directive: false,
            extends: None,
            variables: BTreeSet::new(),
        }
    }

    /// Parses a sequence of body elements (document body or cell body).
    fn parse_body(&mut self, body: &[BodyElement], depth: usize) -> Result<Vec<Block>, ParseError> {
        let mut builder = TreeBuilder::new(depth, self.settings.max_nesting_depth);

        for element in body {
            match element {
                BodyElement::Paragraph(paragraph) => {
                    let ordinal = self.paragraph;
                    self.paragraph += 1;
                    let map = RunMap::new(paragraph);
                    let tokens = lexer::tokenize(&map.text, self.settings.strict)
                        .map_err(|e| at_paragraph(e, ordinal))?;

                    if let Some(token) = standalone_directive(&tokens, &map) {
                        let position = Position::new(ordinal, token.start);
                        let opener = map.text[token.start..token.end].to_string();
                        self.apply_token(&mut builder, &token.kind, opener, RunProperties::default(), position)?;
                        continue;
                    }

                    let block = self.parse_paragraph(paragraph, &map, &tokens, ordinal, builder.depth())?;
                    builder.push(block);
                }
                BodyElement::Table(table) => {
                    let block = self.parse_table(table, builder.depth())?;
                    builder.push(Block::Table(block));
                }
            }
        }

        builder.finish()
    }

    /// Parses the inline content of one paragraph.
    fn parse_paragraph(
        &mut self,
        paragraph: &Paragraph,
        map: &RunMap<'_>,
        tokens: &[Token],
        ordinal: usize,
        depth: usize,
    ) -> Result<Block, ParseError> {
        let has_directives = tokens.iter().any(|t| !matches!(t.kind, TokenKind::Text(_)));
        if !has_directives {
            // Keep the runs exactly as they are, empty runs included.
            return Ok(Block::Paragraph {
                properties: paragraph.properties.clone(),
                children: paragraph.runs.iter().cloned().map(Block::Static).collect(),
                has_directives: false,
            });
        }

        let mut builder = TreeBuilder::new(depth, self.settings.max_nesting_depth);
        let mut anchors = map.anchors.iter().peekable();

        for token in tokens {
            match &token.kind {
                TokenKind::Text(_) => {
                    for &(span_start, span_end, style) in &map.spans {
                        if span_end <= token.start || span_start >= token.end {
                            continue;
                        }
                        let from = span_start.max(token.start);
                        let to = span_end.min(token.end);
                        while let Some((_, run)) = anchors.next_if(|(pos, _)| *pos <= from) {
                            builder.push(Block::Static((*run).clone()));
                        }
                        builder.push(Block::Text {
                            text: map.text[from..to].to_string(),
                            style: style.clone(),
                        });
                    }
                }
                kind => {
                    while let Some((_, run)) = anchors.next_if(|(pos, _)| *pos < token.end) {
                        builder.push(Block::Static((*run).clone()));
                    }
                    let position = Position::new(ordinal, token.start);
                    let opener = map.text[token.start..token.end].to_string();
                    let style = map.style_at(token.start);
                    self.apply_token(&mut builder, kind, opener, style, position)?;
                }
            }
        }
        for (_, run) in anchors {
            builder.push(Block::Static((*run).clone()));
        }

        Ok(Block::Paragraph {
            properties: paragraph.properties.clone(),
            children: builder.finish()?,
            has_directives: true,
        })
    }

    /// Feeds one directive into `builder`.
    fn apply_token(
        &mut self,
        builder: &mut TreeBuilder,
        kind: &TokenKind,
        opener: String,
        style: RunProperties,
        position: Position,
    ) -> Result<(), ParseError> {
        if !matches!(kind, TokenKind::Extends(_)) {
            self.seen_directive = true;
        }

        match kind {
            TokenKind::Extends(parent) => self.apply_extends(builder, parent, position)?,
            TokenKind::Text(text) => builder.push(Block::Text {
                text: text.clone(),
                style,
            }),
            TokenKind::Variable(path) => {
                self.variables.insert(path.clone());
                builder.push(Block::Variable {
                    path: path.clone(),
                    style,
                    position,
                });
            }
            TokenKind::Image(name) => builder.push(Block::Image {
                name: name.clone(),
                style,
                position,
            }),
            TokenKind::IfOpen(condition) => builder.open(
                FrameKind::If {
                    condition: condition.clone(),
                    then_blocks: Vec::new(),
                    else_blocks: None,
                },
                opener,
                position,
            )?,
            TokenKind::Else => builder.else_branch(position)?,
            TokenKind::IfClose => builder.close(Closer::If, position)?,
            TokenKind::EachOpen(list) => builder.open(
                FrameKind::Each {
                    list: list.clone(),
                    body: Vec::new(),
                },
                opener,
                position,
            )?,
            TokenKind::EachClose => builder.close(Closer::Each, position)?,
            TokenKind::BlockOpen(id) => builder.open(
                FrameKind::Named {
                    id: id.clone(),
                    body: Vec::new(),
                },
                opener,
                position,
            )?,
            TokenKind::BlockClose => builder.close(Closer::Block, position)?,
        }
        Ok(())
    }

    fn apply_extends(
        &mut self,
        builder: &mut TreeBuilder,
        parent: &str,
        position: Position,
    ) -> Result<(), ParseError> {
        if !self.seen_directive && self.extends.is_none() {
            self.seen_directive = true;
            self.extends = Some(parent.to_string());
            builder.push(Block::Extends {
                parent: parent.to_string(),
                position,
            });
            return Ok(());
        }
        if self.settings.strict {
            return Err(ParseError::new(
                ParseErrorKind::MisplacedExtends(parent.to_string()),
                position,
            ));
        }
        tracing::warn!(
            parent = %parent,
            position = %position,
            "ignoring extends that is not the first directive"
        );
        Ok(())
    }

    fn parse_table(&mut self, table: &Table, depth: usize) -> Result<TableBlock, ParseError> {
        let mut rows = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            let first_paragraph = self.paragraph;
            if let Some((list, stripped)) = self.template_row(row)? {
                check_depth(depth, self.settings.max_nesting_depth, Position::new(first_paragraph, 0))?;
                let row_template = self.parse_row(&stripped, depth + 1)?;
                rows.push(RowBlock::Loop {
                    list,
                    row: row_template,
                    position: Position::new(first_paragraph, 0),
                });
            } else {
                rows.push(RowBlock::Static(self.parse_row(row, depth)?));
            }
        }

        let bad_rows = table.check_grid();
        if !bad_rows.is_empty() {
            tracing::warn!(rows = ?bad_rows, columns = table.grid.len(), "table rows do not match the column grid");
        }

        Ok(TableBlock {
            properties: table.properties.clone(),
            grid: table.grid.clone(),
            rows,
        })
    }

    fn parse_row(&mut self, row: &TableRow, depth: usize) -> Result<RowTemplate, ParseError> {
        let mut cells = Vec::with_capacity(row.cells.len());
        for cell in &row.cells {
            cells.push(CellTemplate {
                properties: cell.properties.clone(),
                body: self.parse_body(&cell.body, depth)?,
            });
        }
        Ok(RowTemplate {
            properties: row.properties.clone(),
            cells,
        })
    }

    /// Detects a template row. Returns the list name and a copy of the row
    /// with the `{{#each}}`/`{{/each}}` markers removed.
    ///
    /// The opener must lead the first cell and its matching closer must end
    /// the last cell. In a one-column row both markers sit in the same cell.
    fn template_row(&self, row: &TableRow) -> Result<Option<(String, TableRow)>, ParseError> {
        let Some(first_cell) = row.cells.first() else {
            return Ok(None);
        };
        let Some(last_cell) = row.cells.last() else {
            return Ok(None);
        };
        let Some(BodyElement::Paragraph(first_para)) = first_cell.body.first() else {
            return Ok(None);
        };
        let Some(BodyElement::Paragraph(last_para)) = last_cell.body.last() else {
            return Ok(None);
        };

        let strict = self.settings.strict;
        let first_map = RunMap::new(first_para);
        let last_map = RunMap::new(last_para);
        let first_tokens = lexer::tokenize(&first_map.text, strict)
            .map_err(|e| at_paragraph(e, self.paragraph))?;
        let last_tokens = lexer::tokenize(&last_map.text, strict)
            .map_err(|e| at_paragraph(e, self.paragraph))?;

        let Some(open) = first_tokens.iter().find(|t| !is_blank(t)) else {
            return Ok(None);
        };
        let Some(close) = last_tokens.iter().rev().find(|t| !is_blank(t)) else {
            return Ok(None);
        };
        let TokenKind::EachOpen(list) = &open.kind else {
            return Ok(None);
        };
        if close.kind != TokenKind::EachClose || !loop_spans_row(row, strict) {
            return Ok(None);
        }

        let mut stripped = row.clone();
        let last = stripped.cells.len() - 1;

        // A marker that stood in a paragraph of its own leaves nothing behind.
        let body = &mut stripped.cells[last].body;
        let idx = body.len() - 1;
        let p = strip_span(last_para, close.start, close.end);
        if is_blank_paragraph(&p) && body.len() > 1 {
            body.remove(idx);
        } else {
            body[idx] = BodyElement::Paragraph(p);
        }

        // In a one-column row the closer may already be stripped from the
        // same paragraph; it sits after the opener, so offsets still hold.
        let body = &mut stripped.cells[0].body;
        let current = match body.first() {
            Some(BodyElement::Paragraph(p)) => p,
            _ => first_para,
        };
        let p = strip_span(current, open.start, open.end);
        if is_blank_paragraph(&p) && body.len() > 1 {
            body.remove(0);
        } else {
            body[0] = BodyElement::Paragraph(p);
        }

        Ok(Some((list.clone(), stripped)))
    }
}

fn at_paragraph(mut err: ParseError, paragraph: usize) -> ParseError {
    err.position.paragraph = paragraph;
    err
}

fn is_blank_paragraph(paragraph: &Paragraph) -> bool {
    paragraph
        .runs
        .iter()
        .all(|r| r.as_text().is_some_and(|t| t.trim().is_empty()))
}

fn is_blank(token: &Token) -> bool {
    matches!(&token.kind, TokenKind::Text(t) if t.trim().is_empty())
}

/// If the paragraph's only content is one structural directive, returns it.
fn standalone_directive<'t>(tokens: &'t [Token], map: &RunMap<'_>) -> Option<&'t Token> {
    if !map.anchors.is_empty() {
        return None;
    }
    let mut meaningful = tokens.iter().filter(|t| !is_blank(t));
    let token = meaningful.next()?;
    if meaningful.next().is_some() || !token.kind.is_structural() {
        return None;
    }
    Some(token)
}

/// Returns `true` if the first `{{#each}}` of the row is closed by the very
/// last `{{/each}}` of the row (and not earlier).
fn loop_spans_row(row: &TableRow, strict: bool) -> bool {
    let mut markers = Vec::new();
    for cell in &row.cells {
        collect_each_markers(&cell.body, strict, &mut markers);
    }
    let mut depth = 0usize;
    for (i, is_open) in markers.iter().enumerate() {
        if *is_open {
            depth += 1;
        } else {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return i == markers.len() - 1;
            }
        }
    }
    false
}

fn collect_each_markers(body: &[BodyElement], strict: bool, out: &mut Vec<bool>) {
    for element in body {
        match element {
            BodyElement::Paragraph(p) => {
                let text = RunMap::new(p).text;
                if let Ok(tokens) = lexer::tokenize(&text, strict) {
                    out.extend(tokens.iter().filter_map(|t| match t.kind {
                        TokenKind::EachOpen(_) => Some(true),
                        TokenKind::EachClose => Some(false),
                        _ => None,
                    }));
                }
            }
            BodyElement::Table(t) => {
                for cell in t.rows.iter().flat_map(|r| &r.cells) {
                    collect_each_markers(&cell.body, strict, out);
                }
            }
        }
    }
}

/// Returns a copy of `paragraph` with the text bytes `start..end` (offsets
/// into the concatenated run text) removed.
fn strip_span(paragraph: &Paragraph, start: usize, end: usize) -> Paragraph {
    let mut out = Paragraph {
        properties: paragraph.properties.clone(),
        runs: Vec::with_capacity(paragraph.runs.len()),
    };
    let mut offset = 0;
    for run in &paragraph.runs {
        let RunContent::Text(text) = &run.content else {
            out.runs.push(run.clone());
            continue;
        };
        let run_start = offset;
        let run_end = offset + text.len();
        offset = run_end;

        if run_end <= start || run_start >= end {
            out.runs.push(run.clone());
            continue;
        }
        let mut kept = String::new();
        if run_start < start {
            kept.push_str(&text[..start - run_start]);
        }
        if run_end > end {
            kept.push_str(&text[end - run_start..]);
        }
        if !kept.is_empty() {
            out.runs.push(Run::styled(kept, run.properties.clone()));
        }
    }
    out
}
