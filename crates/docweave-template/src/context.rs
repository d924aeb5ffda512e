//! Render context: variable, condition and list resolution.
//!
//! [`Context`] wraps the caller's [`TemplateData`] with a stack of scopes. Each
//! `{{#each}}` iteration pushes one scope holding the entry's fields, `this`
//! and the loop metadata (`@index`, `@number`, `@first`, `@last`); lookups
//! search from the innermost scope outward before falling back to the global
//! bindings, so an inner loop body can still see outer-loop fields and
//! top-level variables.

use std::borrow::Cow;
use std::collections::HashMap;

use docweave_core::{DocweaveError, DocweaveResult};

use crate::data::{TemplateData, TemplateImage};
use crate::value::Value;

/// A template context: global bindings plus a stack of loop scopes.
///
/// # Examples
///
/// ```
/// use docweave_template::context::Context;
/// use docweave_template::data::TemplateData;
/// use docweave_template::value::Value;
///
/// let mut data = TemplateData::new();
/// data.set_variable("name", "Docweave");
///
/// let mut ctx = Context::new(&data);
/// assert_eq!(ctx.resolve_variable("name").unwrap(), "Docweave");
///
/// ctx.push();
/// ctx.set("name", Value::from("Overridden"));
/// assert_eq!(ctx.resolve_variable("name").unwrap(), "Overridden");
///
/// ctx.pop();
/// assert_eq!(ctx.resolve_variable("name").unwrap(), "Docweave");
/// ```
pub struct Context<'a> {
    data: &'a TemplateData,
    stack: Vec<HashMap<String, Value>>,
    strict: bool,
}

impl<'a> Context<'a> {
    /// Creates a non-strict context over `data` with no scopes.
    pub const fn new(data: &'a TemplateData) -> Self {
        Self {
            data,
            stack: Vec::new(),
            strict: false,
        }
    }

    /// Sets strict mode: unresolved variables and lists become errors.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Returns whether the context is strict.
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// The global bindings.
    pub const fn data(&self) -> &'a TemplateData {
        self.data
    }

    /// Number of scopes currently pushed.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Pushes an empty scope.
    pub fn push(&mut self) {
        self.stack.push(HashMap::new());
    }

    /// Pops the innermost scope. A no-op when no scope is pushed.
    pub fn pop(&mut self) {
        self.stack.pop();
    }

    /// Binds `key` in the innermost scope, pushing one if none exists.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        if self.stack.is_empty() {
            self.push();
        }
        if let Some(top) = self.stack.last_mut() {
            top.insert(key.into(), value);
        }
    }

    /// Pushes the scope for entry `index` of a list of `len` entries.
    ///
    /// Map entries expose each field plus `this`; other entries expose
    /// `this` only.
    pub fn push_loop_scope(&mut self, entry: &Value, index: usize, len: usize) {
        let mut scope = HashMap::new();
        if let Value::Map(fields) = entry {
            scope.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        scope.insert("this".to_string(), entry.clone());
        scope.insert("@index".to_string(), Value::from(index));
        scope.insert("@number".to_string(), Value::from(index + 1));
        scope.insert("@first".to_string(), Value::Bool(index == 0));
        scope.insert("@last".to_string(), Value::Bool(index + 1 == len));
        self.stack.push(scope);
    }

    /// Looks up a dotted path: scopes innermost first, then global
    /// variables, then lists (as a `List`), then conditions (as a `Bool`).
    ///
    /// The first binding of the path's first segment wins; the remaining
    /// segments are resolved below it.
    pub fn get(&self, path: &str) -> Option<Cow<'_, Value>> {
        let (root, rest) = split_path(path);

        if let Some(value) = self.stack.iter().rev().find_map(|scope| scope.get(root)) {
            return value.lookup(rest).map(Cow::Borrowed);
        }
        if let Some(value) = self.data.variable(root) {
            return value.lookup(rest).map(Cow::Borrowed);
        }
        if let Some(entries) = self.data.list(root) {
            let list = Value::List(entries.to_vec());
            return list.lookup(rest).cloned().map(Cow::Owned);
        }
        match self.data.condition(root) {
            Some(flag) if rest.is_empty() => Some(Cow::Owned(Value::Bool(flag))),
            _ => None,
        }
    }

    /// Resolves a `{{path}}` placeholder to its display text.
    ///
    /// # Errors
    ///
    /// Returns `VariableResolution` in strict mode when the path does not
    /// resolve. Non-strict misses render as an empty string.
    pub fn resolve_variable(&self, path: &str) -> DocweaveResult<String> {
        match self.get(path) {
            Some(value) => Ok(value.to_display_string()),
            None if self.strict => Err(DocweaveError::VariableResolution(path.to_string())),
            None => {
                tracing::trace!(variable = %path, "unresolved variable rendered empty");
                Ok(String::new())
            }
        }
    }

    /// Evaluates an `{{#if name}}` condition.
    ///
    /// Looks in scopes, then conditions, then variables, then lists, and
    /// applies truthiness. A missing name is false in every mode.
    pub fn evaluate_condition(&self, name: &str) -> bool {
        let (root, rest) = split_path(name);

        if let Some(value) = self.stack.iter().rev().find_map(|scope| scope.get(root)) {
            return value.lookup(rest).is_some_and(Value::is_truthy);
        }
        if let Some(flag) = self.data.condition(name) {
            return flag;
        }
        if let Some(value) = self.data.variable(root) {
            return value.lookup(rest).is_some_and(Value::is_truthy);
        }
        if let Some(entries) = self.data.list(root) {
            return if rest.is_empty() {
                !entries.is_empty()
            } else {
                Value::List(entries.to_vec())
                    .lookup(rest)
                    .is_some_and(Value::is_truthy)
            };
        }
        false
    }

    /// Returns the entries an `{{#each name}}` iterates over.
    ///
    /// Looks in scopes (entry fields may hold lists), then lists, then
    /// variables holding a `List`. A name bound to `Null` counts as an empty
    /// list.
    ///
    /// # Errors
    ///
    /// Returns `VariableResolution` in strict mode when no list is bound or
    /// the name is bound to something other than a list.
    pub fn resolve_list(&self, name: &str) -> DocweaveResult<Vec<Value>> {
        let (root, rest) = split_path(name);

        let found: Option<Cow<'_, [Value]>> =
            if let Some(value) = self.stack.iter().rev().find_map(|scope| scope.get(root)) {
                value.lookup(rest).and_then(list_entries)
            } else if let Some(entries) = self.data.list(name) {
                Some(Cow::Borrowed(entries))
            } else if let Some(value) = self.data.variable(root) {
                value.lookup(rest).and_then(list_entries)
            } else {
                None
            };

        match found {
            Some(entries) => Ok(entries.into_owned()),
            None if self.strict => Err(DocweaveError::VariableResolution(name.to_string())),
            None => {
                tracing::debug!(list = %name, "no list bound, iterating zero times");
                Ok(Vec::new())
            }
        }
    }

    /// The image bound to a placeholder name.
    pub fn image(&self, name: &str) -> Option<&'a TemplateImage> {
        self.data.image(name)
    }
}

fn split_path(path: &str) -> (&str, &str) {
    path.split_once('.').unwrap_or((path, ""))
}

fn list_entries(value: &Value) -> Option<Cow<'_, [Value]>> {
    match value {
        Value::List(items) => Some(Cow::Borrowed(items.as_slice())),
        Value::Null => Some(Cow::Owned(Vec::new())),
        _ => None,
    }
}
