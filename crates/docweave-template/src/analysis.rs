//! Template analysis.
//!
//! Reports which names a template consumes, so callers can check their data
//! before rendering or generate a sample payload with
//! [`TemplateAnalysis::sample_data`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::data::TemplateData;
use crate::parser::{Block, RowBlock, TableBlock};
use crate::value::Value;

/// Names referenced by a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateAnalysis {
    /// The analysed template.
    pub template: String,
    /// Variable paths used outside any loop.
    pub variables: BTreeSet<String>,
    /// Condition names used outside any loop.
    pub conditions: BTreeSet<String>,
    /// Top-level lists, each with the entry fields its loop bodies use.
    pub lists: BTreeMap<String, BTreeSet<String>>,
    /// Image placeholder names.
    pub images: BTreeSet<String>,
    /// Named block ids.
    pub named_blocks: BTreeSet<String>,
    /// One entry per table, in document order (nested tables included).
    pub tables: Vec<TableAnalysis>,
}

/// Shape of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableAnalysis {
    /// Ordinal of the table in document order.
    pub index: usize,
    /// Number of rows in the template (before row loops expand).
    pub rows: usize,
    /// Number of grid columns.
    pub columns: usize,
    /// Index of the first template row, if any.
    pub template_row: Option<usize>,
    /// Lists iterated by template rows.
    pub loop_lists: Vec<String>,
    /// Names used inside template rows.
    pub loop_variables: BTreeSet<String>,
}

impl TemplateAnalysis {
    /// Builds placeholder data that binds every discovered name: variables
    /// get `sample_<name>` strings, conditions are `true` and lists get two
    /// entries whose fields hold sample strings.
    pub fn sample_data(&self) -> TemplateData {
        let mut data = TemplateData::new();

        let mut roots: HashMap<String, Value> = HashMap::new();
        for path in &self.variables {
            insert_path(&mut roots, path, Value::from(format!("sample_{}", leaf(path))));
        }
        data.set_variables(roots);

        for name in &self.conditions {
            data.set_condition(name.clone(), true);
        }

        for (list, fields) in &self.lists {
            let entries: Vec<Value> = (1..=2)
                .map(|n| {
                    if fields.is_empty() {
                        return Value::from(format!("sample_{list}_{n}"));
                    }
                    let mut entry = HashMap::new();
                    for field in fields {
                        insert_path(
                            &mut entry,
                            field,
                            Value::from(format!("sample_{}_{n}", leaf(field))),
                        );
                    }
                    Value::Map(entry)
                })
                .collect();
            data.set_list(list.clone(), entries);
        }
        data
    }
}

/// Analyses a resolved block tree.
pub fn analyze(template: &str, blocks: &[Block]) -> TemplateAnalysis {
    let mut walker = Walker {
        analysis: TemplateAnalysis {
            template: template.to_string(),
            ..TemplateAnalysis::default()
        },
        loops: Vec::new(),
        row_loop: None,
    };
    walker.walk(blocks);
    tracing::debug!(
        template = %template,
        variables = walker.analysis.variables.len(),
        conditions = walker.analysis.conditions.len(),
        lists = walker.analysis.lists.len(),
        tables = walker.analysis.tables.len(),
        "analysed template"
    );
    walker.analysis
}

struct Walker {
    analysis: TemplateAnalysis,
    /// Lists of the enclosing loops, outermost first. Only the outermost is
    /// a top-level list; inner ones are fields of their enclosing entry.
    loops: Vec<String>,
    /// The table collecting template-row names, by index into `tables`.
    row_loop: Option<usize>,
}

impl Walker {
    fn walk(&mut self, blocks: &[Block]) {
        for block in blocks {
            match block {
                Block::Variable { path, .. } => self.use_name(path, false),
                Block::Image { name, .. } => {
                    self.analysis.images.insert(name.clone());
                }
                Block::Conditional {
                    condition,
                    then_blocks,
                    else_blocks,
                    ..
                } => {
                    self.use_name(condition, true);
                    self.walk(then_blocks);
                    if let Some(else_blocks) = else_blocks {
                        self.walk(else_blocks);
                    }
                }
                Block::Loop { list, body, .. } => self.walk_loop(list, |w| w.walk(body)),
                Block::NamedBlock { id, body, .. } => {
                    self.analysis.named_blocks.insert(id.clone());
                    self.walk(body);
                }
                Block::Paragraph { children, .. } => self.walk(children),
                Block::Table(table) => self.walk_table(table),
                Block::Text { .. } | Block::Extends { .. } | Block::Static(_) => {}
            }
        }
    }

    fn walk_loop(&mut self, list: &str, body: impl FnOnce(&mut Self)) {
        if self.loops.is_empty() {
            self.analysis.lists.entry(list.to_string()).or_default();
        } else {
            self.use_name(list, false);
        }
        self.loops.push(list.to_string());
        body(self);
        self.loops.pop();
    }

    fn walk_table(&mut self, table: &TableBlock) {
        let index = self.analysis.tables.len();
        self.analysis.tables.push(TableAnalysis {
            index,
            rows: table.rows.len(),
            columns: table.grid.len(),
            ..TableAnalysis::default()
        });

        for (row_index, row) in table.rows.iter().enumerate() {
            match row {
                RowBlock::Static(row) => {
                    for cell in &row.cells {
                        self.walk(&cell.body);
                    }
                }
                RowBlock::Loop { list, row, .. } => {
                    let info = &mut self.analysis.tables[index];
                    info.template_row.get_or_insert(row_index);
                    info.loop_lists.push(list.clone());

                    let outer = self.row_loop.replace(index);
                    self.walk_loop(list, |w| {
                        for cell in &row.cells {
                            w.walk(&cell.body);
                        }
                    });
                    self.row_loop = outer;
                }
            }
        }
    }

    fn use_name(&mut self, path: &str, is_condition: bool) {
        if path == "this" || path.starts_with('@') || path.starts_with("this.") {
            return;
        }
        if let Some(table) = self.row_loop {
            self.analysis.tables[table]
                .loop_variables
                .insert(path.to_string());
        }
        match self.loops.first() {
            Some(list) => {
                self.analysis
                    .lists
                    .entry(list.clone())
                    .or_default()
                    .insert(path.to_string());
            }
            None if is_condition => {
                self.analysis.conditions.insert(path.to_string());
            }
            None => {
                self.analysis.variables.insert(path.to_string());
            }
        }
    }
}

fn leaf(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Inserts `value` at a dotted `path`, creating intermediate maps.
fn insert_path(map: &mut HashMap<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Map(HashMap::new()));
            if !matches!(slot, Value::Map(_)) {
                *slot = Value::Map(HashMap::new());
            }
            if let Value::Map(inner) = slot {
                insert_path(inner, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use docweave_core::TemplateSettings;

    use super::*;
    use crate::context::Context;
    use crate::document::{BodyElement, Document, Table};
    use crate::parser::{parse_document, parse_str};

    fn analyze_source(source: &str) -> TemplateAnalysis {
        let template = parse_str("t", source, &TemplateSettings::default()).unwrap();
        analyze("t", &template.blocks)
    }

    #[test]
    fn test_collects_names() {
        let a = analyze_source(
            "Dear {{customer.name}}\n{{#if vip}}Gold{{/if}}\n{{#image logo}}\n{{#block \"footer\"}}bye{{/block}}",
        );
        assert_eq!(a.variables, BTreeSet::from(["customer.name".to_string()]));
        assert_eq!(a.conditions, BTreeSet::from(["vip".to_string()]));
        assert_eq!(a.images, BTreeSet::from(["logo".to_string()]));
        assert_eq!(a.named_blocks, BTreeSet::from(["footer".to_string()]));
    }

    #[test]
    fn test_loop_fields_belong_to_list() {
        let a = analyze_source(
            "{{#each orders}}{{@number}} {{id}}{{#each lines}}{{sku}}{{/each}}{{/each}}",
        );
        assert!(a.variables.is_empty());
        let fields = &a.lists["orders"];
        assert!(fields.contains("id"));
        assert!(fields.contains("lines"));
        assert!(fields.contains("sku"));
        assert!(!fields.contains("@number"));
    }

    #[test]
    fn test_table_analysis() {
        let doc = Document {
            body: vec![BodyElement::Table(Table::from_rows(vec![
                vec!["Item", "Price"],
                vec!["{{#each items}}{{name}}", "{{price}}{{/each}}"],
            ]))],
        };
        let template = parse_document("t", doc, &TemplateSettings::default()).unwrap();
        let a = analyze("t", &template.blocks);
        assert_eq!(a.tables.len(), 1);
        let table = &a.tables[0];
        assert_eq!((table.rows, table.columns), (2, 2));
        assert_eq!(table.template_row, Some(1));
        assert_eq!(table.loop_lists, vec!["items".to_string()]);
        assert!(table.loop_variables.contains("price"));
    }

    #[test]
    fn test_sample_data_binds_everything() {
        let a = analyze_source(
            "{{title}} {{customer.city}}\n{{#if vip}}x{{/if}}\n{{#each items}}{{name}}{{/each}}\n{{#each tags}}{{this}}{{/each}}",
        );
        let data = a.sample_data();
        let ctx = Context::new(&data).with_strict(true);
        assert_eq!(ctx.resolve_variable("title").unwrap(), "sample_title");
        assert_eq!(ctx.resolve_variable("customer.city").unwrap(), "sample_city");
        assert!(ctx.evaluate_condition("vip"));
        let items = ctx.resolve_list("items").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].lookup("name"), Some(&Value::from("sample_name_2")));
        assert_eq!(ctx.resolve_list("tags").unwrap()[0], Value::from("sample_tags_1"));
    }
}
