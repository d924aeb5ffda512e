//! Template inheritance.
//!
//! A child template declares `{{extends "parent"}}` as its first directive and
//! defines `{{#block "id"}}...{{/block}}` regions. Rendering the child renders
//! the root ancestor's skeleton, with every named block replaced by the body
//! from the nearest descendant that defines it.
//!
//! ## Rules
//!
//! 1. The parent must be registered when the child is rendered; otherwise
//!    rendering fails with `TemplateNotFound`.
//! 2. A named block not overridden anywhere in the chain keeps the skeleton's
//!    default body.
//! 3. Named blocks defined only in descendants, with no matching id in the
//!    skeleton, are discarded.
//! 4. Chains can be any length (`c` extends `b` extends `a`). A chain that loops
//!    back on itself fails with `InheritanceCycle`.
//!
//! ## Example
//!
//! ```text
//! base:   Header
//!         {{#block "content"}}Default content{{/block}}
//!
//! page:   {{extends "base"}}
//!         {{#block "content"}}Page content{{/block}}
//! ```
//!
//! Rendering `page` produces `Header` followed by `Page content`.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use docweave_core::{DocweaveError, DocweaveResult};

use crate::parser::{Block, CellTemplate, RowBlock, RowTemplate, Template};

/// Returns the inheritance chain of `template`: the template itself, then its
/// parent, up to the root ancestor.
///
/// # Errors
///
/// Returns `TemplateNotFound` if an ancestor is not registered and
/// `InheritanceCycle` if the chain loops.
pub fn chain<'a, F>(template: &'a Template, lookup: F) -> DocweaveResult<Vec<&'a Template>>
where
    F: Fn(&str) -> Option<&'a Template>,
{
    let mut chain = vec![template];
    let mut current = template;
    while let Some(parent_name) = &current.extends {
        if chain.iter().any(|t| &t.name == parent_name) {
            let mut names: Vec<String> = chain.iter().map(|t| t.name.clone()).collect();
            names.push(parent_name.clone());
            return Err(DocweaveError::InheritanceCycle(names));
        }
        let parent =
            lookup(parent_name).ok_or_else(|| DocweaveError::TemplateNotFound(parent_name.clone()))?;
        chain.push(parent);
        current = parent;
    }
    Ok(chain)
}

/// Returns the blocks to render for `template`, with inheritance applied.
///
/// A template without `extends` is returned as-is, without copying.
///
/// # Errors
///
/// Returns `TemplateNotFound` or `InheritanceCycle`, see [`chain`].
pub fn resolve<'a, F>(template: &'a Template, lookup: F) -> DocweaveResult<Cow<'a, [Block]>>
where
    F: Fn(&str) -> Option<&'a Template>,
{
    Ok(resolve_chain(&chain(template, lookup)?))
}

/// Applies an inheritance chain as returned by [`chain`], leaf first.
///
/// The result is the root's skeleton. Every named block whose body came from
/// another template records that template's name in `origin`.
pub fn resolve_chain<'a>(chain: &[&'a Template]) -> Cow<'a, [Block]> {
    let Some((&root, descendants)) = chain.split_last() else {
        return Cow::Borrowed(&[]);
    };
    if descendants.is_empty() {
        return Cow::Borrowed(&root.blocks);
    }

    // Walk from the root's child down to the leaf so nearer descendants win.
    let mut overrides: HashMap<&str, (&str, &[Block])> = HashMap::new();
    for &descendant in descendants.iter().rev() {
        let name = descendant.name.as_str();
        merge_blocks(
            &mut overrides,
            collect_blocks(&descendant.blocks)
                .into_iter()
                .map(|(id, body)| (id, (name, body))),
        );
    }

    let mut used = HashSet::new();
    let mut active = Vec::new();
    let blocks = substitute(&root.blocks, &overrides, &mut active, &mut used);

    let leaf = &descendants[0].name;
    for id in overrides.keys().filter(|id| !used.contains(*id)) {
        tracing::debug!(
            template = %leaf,
            root = %root.name,
            block = %id,
            "discarding named block with no counterpart in the parent skeleton"
        );
    }
    tracing::debug!(
        template = %leaf,
        chain = ?chain.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        "resolved template inheritance"
    );

    Cow::Owned(blocks)
}

/// Collects every named block in `blocks` (at any depth) into an id -> body
/// map. A later definition of the same id wins.
pub fn collect_blocks(blocks: &[Block]) -> HashMap<&str, &[Block]> {
    let mut out = HashMap::new();
    visit(blocks, &mut |block| {
        if let Block::NamedBlock { id, body, .. } = block {
            out.insert(id.as_str(), body.as_slice());
        }
    });
    out
}

/// Merges `child` over `parent` (child wins).
fn merge_blocks<'a, V>(parent: &mut HashMap<&'a str, V>, child: impl IntoIterator<Item = (&'a str, V)>) {
    parent.extend(child);
}

/// Calls `f` on every block in the tree, parents before children.
pub(crate) fn visit<'a>(blocks: &'a [Block], f: &mut dyn FnMut(&'a Block)) {
    for block in blocks {
        f(block);
        match block {
            Block::Conditional {
                then_blocks,
                else_blocks,
                ..
            } => {
                visit(then_blocks, f);
                if let Some(else_blocks) = else_blocks {
                    visit(else_blocks, f);
                }
            }
            Block::Loop { body, .. } | Block::NamedBlock { body, .. } => visit(body, f),
            Block::Paragraph { children, .. } => visit(children, f),
            Block::Table(table) => {
                for row in &table.rows {
                    let (RowBlock::Static(row) | RowBlock::Loop { row, .. }) = row;
                    for cell in &row.cells {
                        visit(&cell.body, f);
                    }
                }
            }
            Block::Text { .. }
            | Block::Variable { .. }
            | Block::Image { .. }
            | Block::Extends { .. }
            | Block::Static(_) => {}
        }
    }
}

/// Rebuilds `blocks` with overridden named-block bodies spliced in.
///
/// `active` holds the ids being substituted on the current path, so a body is
/// never substituted into itself.
fn substitute<'a>(
    blocks: &[Block],
    overrides: &HashMap<&'a str, (&'a str, &'a [Block])>,
    active: &mut Vec<String>,
    used: &mut HashSet<&'a str>,
) -> Vec<Block> {
    blocks
        .iter()
        .map(|block| match block {
            Block::NamedBlock {
                id,
                body,
                position,
                origin,
            } => {
                let replacement = overrides
                    .get_key_value(id.as_str())
                    .filter(|_| !active.contains(id));
                active.push(id.clone());
                let (new_body, new_origin) = match replacement {
                    Some((key, (owner, body))) => {
                        used.insert(*key);
                        (
                            substitute(body, overrides, active, used),
                            Some((*owner).to_string()),
                        )
                    }
                    None => (substitute(body, overrides, active, used), origin.clone()),
                };
                active.pop();
                Block::NamedBlock {
                    id: id.clone(),
                    body: new_body,
                    position: *position,
                    origin: new_origin,
                }
            }
            Block::Conditional {
                condition,
                then_blocks,
                else_blocks,
                position,
            } => Block::Conditional {
                condition: condition.clone(),
                then_blocks: substitute(then_blocks, overrides, active, used),
                else_blocks: else_blocks
                    .as_ref()
                    .map(|e| substitute(e, overrides, active, used)),
                position: *position,
            },
            Block::Loop {
                list,
                body,
                position,
            } => Block::Loop {
                list: list.clone(),
                body: substitute(body, overrides, active, used),
                position: *position,
            },
            Block::Paragraph {
                properties,
                children,
                has_directives,
            } => Block::Paragraph {
                properties: properties.clone(),
                children: substitute(children, overrides, active, used),
                has_directives: *has_directives,
            },
            Block::Table(table) => {
                let mut table = table.clone();
                for row in &mut table.rows {
                    let (RowBlock::Static(row) | RowBlock::Loop { row, .. }) = row;
                    substitute_row(row, overrides, active, used);
                }
                Block::Table(table)
            }
            other => other.clone(),
        })
        .collect()
}

fn substitute_row<'a>(
    row: &mut RowTemplate,
    overrides: &HashMap<&'a str, (&'a str, &'a [Block])>,
    active: &mut Vec<String>,
    used: &mut HashSet<&'a str>,
) {
    for CellTemplate { body, .. } in &mut row.cells {
        *body = substitute(body, overrides, active, used);
    }
}

#[cfg(test)]
mod tests {
    use docweave_core::TemplateSettings;

    use super::*;
    use crate::parser::parse_str;

    fn registry(templates: &[(&str, &str)]) -> HashMap<String, Template> {
        let settings = TemplateSettings::default();
        templates
            .iter()
            .map(|(name, source)| {
                (
                    (*name).to_string(),
                    parse_str(name, source, &settings).unwrap(),
                )
            })
            .collect()
    }

    fn named_body<'a>(blocks: &'a [Block], wanted: &str) -> Option<&'a [Block]> {
        let mut found = None;
        visit(blocks, &mut |b| {
            if let Block::NamedBlock { id, body, .. } = b {
                if id == wanted && found.is_none() {
                    found = Some(body.as_slice());
                }
            }
        });
        found
    }

    fn texts(blocks: &[Block]) -> Vec<String> {
        let mut out = Vec::new();
        visit(blocks, &mut |b| match b {
            Block::Text { text, .. } => out.push(text.clone()),
            Block::Static(run) => out.extend(run.as_text().map(str::to_string)),
            _ => {}
        });
        out
    }

    #[test]
    fn test_no_extends_is_borrowed() {
        let reg = registry(&[("a", "Hello")]);
        let resolved = resolve(&reg["a"], |n| reg.get(n)).unwrap();
        assert!(matches!(resolved, Cow::Borrowed(_)));
    }

    #[test]
    fn test_child_overrides_block() {
        let reg = registry(&[
            ("base", "Top\n{{#block \"content\"}}default{{/block}}"),
            ("child", "{{extends \"base\"}}{{#block \"content\"}}X{{/block}}"),
        ]);
        let resolved = resolve(&reg["child"], |n| reg.get(n)).unwrap();
        assert_eq!(texts(named_body(&resolved, "content").unwrap()), vec!["X"]);
        assert_eq!(texts(&resolved), vec!["Top", "X"]);
    }

    #[test]
    fn test_substituted_block_records_origin() {
        let reg = registry(&[
            (
                "base",
                "{{#block \"header\"}}H{{/block}}\n{{#block \"content\"}}C{{/block}}",
            ),
            ("child", "{{extends \"base\"}}{{#block \"content\"}}X{{/block}}"),
        ]);
        let resolved = resolve(&reg["child"], |n| reg.get(n)).unwrap();
        let mut origins = Vec::new();
        visit(&resolved, &mut |b| {
            if let Block::NamedBlock { id, origin, .. } = b {
                origins.push((id.clone(), origin.clone()));
            }
        });
        assert_eq!(
            origins,
            vec![
                ("header".to_string(), None),
                ("content".to_string(), Some("child".to_string())),
            ]
        );
    }

    #[test]
    fn test_not_overridden_keeps_default() {
        let reg = registry(&[
            (
                "base",
                "{{#block \"header\"}}H{{/block}}\n{{#block \"content\"}}C{{/block}}",
            ),
            ("child", "{{extends \"base\"}}{{#block \"content\"}}X{{/block}}"),
        ]);
        let resolved = resolve(&reg["child"], |n| reg.get(n)).unwrap();
        assert_eq!(texts(&resolved), vec!["H", "X"]);
    }

    #[test]
    fn test_child_only_blocks_discarded() {
        let reg = registry(&[
            ("base", "{{#block \"content\"}}C{{/block}}"),
            (
                "child",
                "{{extends \"base\"}}\n{{#block \"sidebar\"}}S{{/block}}",
            ),
        ]);
        let resolved = resolve(&reg["child"], |n| reg.get(n)).unwrap();
        assert_eq!(texts(&resolved), vec!["C"]);
    }

    #[test]
    fn test_multi_level_nearest_wins() {
        let reg = registry(&[
            (
                "a",
                "{{#block \"x\"}}ax{{/block}}\n{{#block \"y\"}}ay{{/block}}",
            ),
            (
                "b",
                "{{extends \"a\"}}\n{{#block \"x\"}}bx{{/block}}\n{{#block \"y\"}}by{{/block}}",
            ),
            ("c", "{{extends \"b\"}}\n{{#block \"y\"}}cy{{/block}}"),
        ]);
        let resolved = resolve(&reg["c"], |n| reg.get(n)).unwrap();
        assert_eq!(texts(&resolved), vec!["bx", "cy"]);
    }

    #[test]
    fn test_nested_named_block_override() {
        let reg = registry(&[
            (
                "base",
                "{{#block \"outer\"}}\nO\n{{#block \"inner\"}}I{{/block}}\n{{/block}}",
            ),
            ("child", "{{extends \"base\"}}{{#block \"inner\"}}X{{/block}}"),
        ]);
        let resolved = resolve(&reg["child"], |n| reg.get(n)).unwrap();
        assert_eq!(texts(&resolved), vec!["O", "X"]);
    }

    #[test]
    fn test_missing_parent() {
        let reg = registry(&[("child", "{{extends \"nope\"}}")]);
        let err = resolve(&reg["child"], |n| reg.get(n)).unwrap_err();
        assert!(matches!(err, DocweaveError::TemplateNotFound(ref n) if n == "nope"));
    }

    #[test]
    fn test_cycle_detected() {
        let reg = registry(&[("a", "{{extends \"b\"}}"), ("b", "{{extends \"a\"}}")]);
        let err = resolve(&reg["a"], |n| reg.get(n)).unwrap_err();
        match err {
            DocweaveError::InheritanceCycle(names) => assert_eq!(names, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_extends_is_cycle() {
        let reg = registry(&[("a", "{{extends \"a\"}}")]);
        let err = resolve(&reg["a"], |n| reg.get(n)).unwrap_err();
        assert!(matches!(err, DocweaveError::InheritanceCycle(ref names) if names == &["a", "a"]));
    }

    #[test]
    fn test_chain_order() {
        let reg = registry(&[
            ("a", "root"),
            ("b", "{{extends \"a\"}}"),
            ("c", "{{extends \"b\"}}"),
        ]);
        let names: Vec<&str> = chain(&reg["c"], |n| reg.get(n))
            .unwrap()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }
}
