//! Block tree renderer.
//!
//! Walks a resolved block tree against a [`Context`] and produces a new
//! [`Document`]. Rendering is pure: the template and the data are only read,
//! and the only I/O goes through the [`ImageLoader`].
//!
//! Rendered content is collected as a flat list of [`Fragment`]s: inline
//! runs and whole body elements. After inheritance a named block that sits
//! inside a paragraph may be replaced by a body of paragraphs and tables, so
//! a paragraph is split around any body element rendered inside it, and
//! runs rendered at body level are wrapped in a default paragraph.

use std::borrow::Cow;

use docweave_core::{DocweaveError, DocweaveResult, Position, TemplateSettings};

use crate::context::Context;
use crate::data::ImageSource;
use crate::document::{
    BodyElement, Document, Paragraph, ParagraphProperties, Run, RunContent, RunProperties, Table,
    TableCell, TableRow,
};
use crate::image;
use crate::loaders::ImageLoader;
use crate::parser::{Block, CellTemplate, RowBlock, RowTemplate, TableBlock};

/// One piece of rendered output.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Inline content.
    Run(Run),
    /// Inline content substituted for a variable. Its paragraph is kept even
    /// when the value is empty.
    Value(Run),
    /// A paragraph or table.
    Element(BodyElement),
}

/// Renders `blocks` into a document.
///
/// # Errors
///
/// Any error raised while rendering, wrapped with `template` and the location
/// of the directive that raised it.
pub fn render(
    template: &str,
    blocks: &[Block],
    ctx: &mut Context<'_>,
    settings: &TemplateSettings,
    loader: &dyn ImageLoader,
) -> DocweaveResult<Document> {
    let mut renderer = Renderer {
        template: Cow::Borrowed(template),
        ctx,
        settings,
        loader,
    };
    let mut out = Vec::new();
    renderer.render_blocks(blocks, &mut out)?;
    Ok(Document {
        body: into_elements(out),
    })
}

struct Renderer<'r, 'd> {
    template: Cow<'r, str>,
    ctx: &'r mut Context<'d>,
    settings: &'r TemplateSettings,
    loader: &'r dyn ImageLoader,
}

impl Renderer<'_, '_> {
    fn located(&self, err: DocweaveError, position: Position) -> DocweaveError {
        err.in_template(&self.template, Some(position))
    }

    fn render_blocks(&mut self, blocks: &[Block], out: &mut Vec<Fragment>) -> DocweaveResult<()> {
        for block in blocks {
            self.render_block(block, out)?;
        }
        Ok(())
    }

    fn render_block(&mut self, block: &Block, out: &mut Vec<Fragment>) -> DocweaveResult<()> {
        match block {
            Block::Text { text, style } => {
                out.push(Fragment::Run(Run::styled(text.clone(), style.clone())));
            }
            Block::Static(run) => out.push(Fragment::Run(run.clone())),
            Block::Variable {
                path,
                style,
                position,
            } => {
                let text = self
                    .ctx
                    .resolve_variable(path)
                    .map_err(|e| self.located(e, *position))?;
                out.push(Fragment::Value(Run::styled(text, style.clone())));
            }
            Block::Image {
                name,
                style,
                position,
            } => {
                let run = self
                    .render_image(name, style)
                    .map_err(|e| self.located(e, *position))?;
                out.push(Fragment::Run(run));
            }
            Block::Conditional {
                condition,
                then_blocks,
                else_blocks,
                ..
            } => {
                if self.ctx.evaluate_condition(condition) {
                    self.render_blocks(then_blocks, out)?;
                } else if let Some(else_blocks) = else_blocks {
                    self.render_blocks(else_blocks, out)?;
                }
            }
            Block::Loop {
                list,
                body,
                position,
            } => {
                let entries = self
                    .ctx
                    .resolve_list(list)
                    .map_err(|e| self.located(e, *position))?;
                let len = entries.len();
                for (index, entry) in entries.iter().enumerate() {
                    self.ctx.push_loop_scope(entry, index, len);
                    let result = self.render_blocks(body, out);
                    self.ctx.pop();
                    result?;
                }
            }
            Block::NamedBlock { body, origin, .. } => match origin {
                Some(origin) => {
                    // Locations inside an inherited body refer to its own template.
                    let outer = std::mem::replace(&mut self.template, Cow::Owned(origin.clone()));
                    let result = self.render_blocks(body, out);
                    self.template = outer;
                    result?;
                }
                None => self.render_blocks(body, out)?,
            },
            Block::Extends { .. } => {}
            Block::Paragraph {
                properties,
                children,
                has_directives,
            } => self.render_paragraph(properties, children, *has_directives, out)?,
            Block::Table(table) => {
                let table = self.render_table(table)?;
                out.push(Fragment::Element(BodyElement::Table(table)));
            }
        }
        Ok(())
    }

    fn render_paragraph(
        &mut self,
        properties: &ParagraphProperties,
        children: &[Block],
        has_directives: bool,
        out: &mut Vec<Fragment>,
    ) -> DocweaveResult<()> {
        let mut inner = Vec::new();
        self.render_blocks(children, &mut inner)?;

        if !has_directives {
            // Static runs only: emit the paragraph exactly as it was.
            let runs = inner
                .into_iter()
                .filter_map(|f| match f {
                    Fragment::Run(run) | Fragment::Value(run) => Some(run),
                    Fragment::Element(_) => None,
                })
                .collect();
            out.push(Fragment::Element(BodyElement::Paragraph(Paragraph {
                properties: properties.clone(),
                runs,
            })));
            return Ok(());
        }

        // A segment holding a substituted value survives even when empty;
        // only conditionals and loops that produced nothing drop it.
        let mut runs = Vec::new();
        let mut has_value = false;
        for fragment in inner {
            match fragment {
                Fragment::Run(run) => runs.push(run),
                Fragment::Value(run) => {
                    has_value = true;
                    runs.push(run);
                }
                Fragment::Element(element) => {
                    self.flush_paragraph(properties, &mut runs, has_value, out);
                    has_value = false;
                    out.push(Fragment::Element(element));
                }
            }
        }
        self.flush_paragraph(properties, &mut runs, has_value, out);
        Ok(())
    }

    /// Emits the pending runs as a paragraph, unless they render to nothing
    /// and `keep` is unset.
    fn flush_paragraph(
        &self,
        properties: &ParagraphProperties,
        runs: &mut Vec<Run>,
        keep: bool,
        out: &mut Vec<Fragment>,
    ) {
        let mut pending: Vec<Run> = runs
            .drain(..)
            .filter(|r| r.as_text().map_or(true, |t| !t.is_empty()))
            .collect();
        if pending.is_empty() && !keep {
            return;
        }
        if self.settings.coalesce_runs {
            pending = coalesce(pending);
        }
        out.push(Fragment::Element(BodyElement::Paragraph(Paragraph {
            properties: properties.clone(),
            runs: pending,
        })));
    }

    fn render_image(&self, name: &str, style: &RunProperties) -> DocweaveResult<Run> {
        let Some(bound) = self.ctx.image(name) else {
            tracing::debug!(image = %name, "no image bound, emitting marker");
            return Ok(Run::styled(
                self.settings.missing_image_marker(name),
                style.clone(),
            ));
        };
        let data = match &bound.source {
            ImageSource::Data(data) => data.clone(),
            ImageSource::Path(path) => self.loader.load(path).map_err(|e| match e {
                DocweaveError::ImageLoad { reason, .. } => DocweaveError::ImageLoad {
                    name: name.to_string(),
                    reason,
                },
                other => other,
            })?,
        };
        let embedded = image::embed(name, data, bound)?;
        let mut run = Run::image(embedded);
        run.properties = style.clone();
        Ok(run)
    }

    fn render_table(&mut self, table: &TableBlock) -> DocweaveResult<Table> {
        let mut rows = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            match row {
                RowBlock::Static(row) => rows.push(self.render_row(row)?),
                RowBlock::Loop {
                    list,
                    row,
                    position,
                } => {
                    let entries = self
                        .ctx
                        .resolve_list(list)
                        .map_err(|e| self.located(e, *position))?;
                    let len = entries.len();
                    tracing::debug!(list = %list, rows = len, "expanding template row");
                    for (index, entry) in entries.iter().enumerate() {
                        self.ctx.push_loop_scope(entry, index, len);
                        let result = self.render_row(row);
                        self.ctx.pop();
                        rows.push(result?);
                    }
                }
            }
        }

        let table = Table {
            properties: table.properties.clone(),
            grid: table.grid.clone(),
            rows,
        };
        let mismatched = table.check_grid();
        if !mismatched.is_empty() {
            tracing::warn!(
                template = %self.template,
                rows = ?mismatched,
                columns = table.grid.len(),
                "rendered table rows do not match the column grid"
            );
        }
        Ok(table)
    }

    /// Renders one row. Row and cell properties are cloned, so every
    /// rendered row owns its own formatting.
    fn render_row(&mut self, row: &RowTemplate) -> DocweaveResult<TableRow> {
        let cells = row
            .cells
            .iter()
            .map(|cell| self.render_cell(cell))
            .collect::<DocweaveResult<Vec<_>>>()?;
        Ok(TableRow {
            properties: row.properties.clone(),
            cells,
        })
    }

    fn render_cell(&mut self, cell: &CellTemplate) -> DocweaveResult<TableCell> {
        let mut out = Vec::new();
        self.render_blocks(&cell.body, &mut out)?;
        let mut body = into_elements(out);
        // A cell must hold at least one paragraph.
        if body.is_empty() {
            body.push(BodyElement::Paragraph(Paragraph::default()));
        }
        Ok(TableCell {
            properties: cell.properties.clone(),
            body,
        })
    }
}

/// Turns fragments into body elements, wrapping loose runs in default
/// paragraphs.
fn into_elements(fragments: Vec<Fragment>) -> Vec<BodyElement> {
    let mut elements = Vec::new();
    let mut loose = Vec::new();
    for fragment in fragments {
        match fragment {
            Fragment::Run(run) | Fragment::Value(run) => loose.push(run),
            Fragment::Element(element) => {
                if !loose.is_empty() {
                    elements.push(BodyElement::Paragraph(Paragraph::from_runs(
                        std::mem::take(&mut loose),
                    )));
                }
                elements.push(element);
            }
        }
    }
    if !loose.is_empty() {
        elements.push(BodyElement::Paragraph(Paragraph::from_runs(loose)));
    }
    elements
}

/// Merges adjacent text runs with identical formatting.
fn coalesce(runs: Vec<Run>) -> Vec<Run> {
    let mut merged: Vec<Run> = Vec::with_capacity(runs.len());
    for run in runs {
        if let Some(last) = merged.last_mut() {
            if last.properties == run.properties {
                if let (RunContent::Text(prev), RunContent::Text(next)) =
                    (&mut last.content, &run.content)
                {
                    prev.push_str(next);
                    continue;
                }
            }
        }
        merged.push(run);
    }
    merged
}
