use std::borrow::Cow;
use std::fmt;

use crate::render::core::Executor;
use crate::render::fmt::Output;
use crate::render::frame::Frame;
use crate::types::tree::{Path, Tree};
use crate::{value, Result, Value};

static NULL: Value = Value::Null;

/// A locale identifier, e.g. `en-US`.
///
/// The engine does not interpret the locale itself, it is passed through to
/// plugins that format locale dependent output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    tag: String,
}

impl Locale {
    /// Construct a new locale from a language tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// Returns the language tag.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.tag
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::new("en-US")
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

/// The execution context passed to plugins.
///
/// A context is a read only view of the current scope. It resolves variables
/// the same way the template does and can render precompiled sub-templates.
pub struct Context<'a> {
    pub(crate) exec: Executor<'a>,
    pub(crate) frame: &'a Frame<'a>,
    pub(crate) depth: usize,
}

impl<'a> Context<'a> {
    /// Returns the node bound to the current scope.
    #[inline]
    pub fn node(&self) -> &'a Value {
        self.frame.node()
    }

    /// Returns the locale of the current render.
    #[inline]
    pub fn locale(&self) -> &'a Locale {
        self.exec.locale
    }

    /// Resolves a path in the current scope, returning `None` if it is
    /// missing.
    pub fn resolve(&self, path: &Path) -> Option<Cow<'a, Value>> {
        self.frame.resolve(path)
    }

    /// Parses and resolves a path in the current scope.
    ///
    /// Returns `None` if the path is missing or not well formed.
    pub fn lookup(&self, raw: &str) -> Option<Cow<'a, Value>> {
        self.resolve(&Path::parse(raw)?)
    }

    /// Resolves a message argument.
    ///
    /// Unlike [`resolve`][Context::resolve] this skips the current scope and
    /// starts at the enclosing one. Formatters that substitute arguments into
    /// a message bind the message to a scope with [`scoped`][Context::scoped]
    /// first, so an argument can never resolve against the message itself.
    pub fn resolve_message_arg(&self, path: &Path) -> Option<Cow<'a, Value>> {
        self.frame.resolve_from_parent(path)
    }

    /// Calls `f` with a context that has an extra scope bound to `node`.
    pub fn scoped<R>(&self, node: &Value, f: impl FnOnce(&Context<'_>) -> R) -> R {
        let frame = Frame::nested(self.frame, node);
        f(&Context {
            exec: self.exec,
            frame: &frame,
            depth: self.depth,
        })
    }

    /// Renders a precompiled tree in a new scope bound to `node`.
    ///
    /// Variables that are not found on `node` are looked up in the enclosing
    /// scopes, just like a `.section` block.
    pub fn render_nested(&self, tree: &Tree, node: &Value) -> Result<String> {
        let frame = Frame::nested(self.frame, node);
        self.render_in(tree, &frame)
    }

    /// Renders a precompiled tree in a private scope rooted at `node`.
    ///
    /// Nothing from the enclosing scopes is visible to the tree.
    pub fn render_private(&self, tree: &Tree, node: &Value) -> Result<String> {
        let frame = Frame::root(node);
        self.render_in(tree, &frame)
    }

    fn render_in(&self, tree: &Tree, frame: &Frame<'_>) -> Result<String> {
        let mut s = String::new();
        self.exec
            .block(&mut Output::with_string(&mut s), tree.instructions(), frame, self.depth + 1)?;
        Ok(s)
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("node", self.frame.node())
            .field("locale", self.exec.locale)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

/// The value flowing through a formatter pipeline.
#[derive(Debug, Clone)]
pub struct Variable<'a> {
    value: Option<Cow<'a, Value>>,
}

impl<'a> Variable<'a> {
    pub(crate) fn new(value: Cow<'a, Value>) -> Self {
        Self { value: Some(value) }
    }

    /// Returns the current value, or `None` if the variable was marked
    /// missing.
    #[inline]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_deref()
    }

    /// Returns the current value, or `null` if the variable was marked
    /// missing.
    #[inline]
    pub fn node(&self) -> &Value {
        self.value.as_deref().unwrap_or(&NULL)
    }

    /// Returns the textual representation of the current value.
    pub fn text(&self) -> Cow<'_, str> {
        value::as_text(self.node())
    }

    /// Returns `true` if the variable was marked missing.
    #[inline]
    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }

    /// Replaces the value.
    pub fn set(&mut self, value: impl Into<Value>) {
        self.value = Some(Cow::Owned(value.into()));
    }

    /// Marks the variable missing, which suppresses its output and skips the
    /// remaining formatters in the pipeline.
    pub fn set_missing(&mut self) {
        self.value = None;
    }
}
