#![allow(clippy::wrong_self_convention)]

mod context;
mod core;
mod fmt;
mod frame;

use std::io;

use crate::render::core::Executor;
use crate::render::fmt::{Output, Writer};
use crate::render::frame::Frame;
use crate::types::tree::Tree;
use crate::{Engine, Error, Result, Value};

pub use crate::render::context::{Context, Locale, Variable};

fn to_string(exec: Executor<'_>, tree: &Tree, globals: &Value) -> Result<String> {
    let mut s = String::new();
    let frame = Frame::root(globals);
    exec.block(&mut Output::with_string(&mut s), tree.instructions(), &frame, 0)?;
    Ok(s)
}

fn to_writer<W>(exec: Executor<'_>, tree: &Tree, globals: &Value, writer: W) -> Result<()>
where
    W: io::Write,
{
    let mut w = Writer::new(writer);
    let frame = Frame::root(globals);
    exec.block(&mut Output::with_writer(&mut w), tree.instructions(), &frame, 0)
        .map_err(|err| w.take_err().map(Error::from).unwrap_or(err))
}

/// A renderer that executes a compiled [`Template`][crate::Template] against
/// a data document.
///
/// This struct is created by one of the following functions:
/// - [`Template{,Ref}::render`][crate::Template::render]
/// - [`Template{,Ref}::render_from`][crate::Template::render_from]
///
/// Every render owns its scope chain and output, so any number of renders of
/// the same template can run concurrently.
#[must_use = "must call `.to_string()` or `.to_writer(..)` on the renderer"]
pub struct Renderer<'render> {
    engine: &'render Engine<'render>,
    tree: &'render Tree,
    globals: Globals<'render>,
    locale: Option<Locale>,
    max_depth: Option<usize>,
}

enum Globals<'render> {
    Owned(Result<Value>),
    Borrowed(&'render Value),
}

impl<'render> Renderer<'render> {
    fn new(engine: &'render Engine<'render>, tree: &'render Tree, globals: Globals<'render>) -> Self {
        Self {
            engine,
            tree,
            globals,
            locale: None,
            max_depth: None,
        }
    }

    pub(crate) fn with_serde<S>(engine: &'render Engine<'render>, tree: &'render Tree, globals: S) -> Self
    where
        S: serde::Serialize,
    {
        let value = serde_json::to_value(globals).map_err(Error::from);
        Self::new(engine, tree, Globals::Owned(value))
    }

    pub(crate) fn with_value(
        engine: &'render Engine<'render>,
        tree: &'render Tree,
        globals: &'render Value,
    ) -> Self {
        Self::new(engine, tree, Globals::Borrowed(globals))
    }

    /// Set the locale passed to plugins.
    ///
    /// Defaults to the engine setting.
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    /// Set the maximum nesting depth.
    ///
    /// This bounds the number of nested blocks and plugin rendered
    /// sub-templates, as counted from the root of the template.
    ///
    /// Defaults to the engine setting.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Render the template to a string.
    pub fn to_string(self) -> Result<String> {
        let locale = self.locale.as_ref().unwrap_or(&self.engine.default_locale);
        let exec = self.executor(locale);
        match &self.globals {
            Globals::Owned(result) => to_string(exec, self.tree, result.as_ref().map_err(Clone::clone)?),
            Globals::Borrowed(value) => to_string(exec, self.tree, value),
        }
    }

    /// Render the template to the given writer.
    pub fn to_writer<W>(self, w: W) -> Result<()>
    where
        W: io::Write,
    {
        let locale = self.locale.as_ref().unwrap_or(&self.engine.default_locale);
        let exec = self.executor(locale);
        match &self.globals {
            Globals::Owned(result) => to_writer(exec, self.tree, result.as_ref().map_err(Clone::clone)?, w),
            Globals::Borrowed(value) => to_writer(exec, self.tree, value, w),
        }
    }

    fn executor<'a>(&'a self, locale: &'a Locale) -> Executor<'a> {
        Executor {
            engine: self.engine,
            locale,
            max_depth: self.max_depth.unwrap_or(self.engine.max_depth),
        }
    }
}
