//! Compile template source into an instruction tree.
//!
//! This process has two stages:
//! - The lexer chunks the template source into text and instruction tags.
//! - The parser interprets each tag, resolves plugin names against the
//!   registry and assembles the tree.

mod lex;
mod parse;

use std::fmt;

use crate::types::syntax::Syntax;
use crate::types::tree::Tree;
use crate::{Engine, Result};

/// Compile a template into a tree.
///
/// This does not run plugin initialization, callers that hand the tree out
/// to users must make sure the engine was initialized first.
pub(crate) fn template(engine: &Engine<'_>, source: &str) -> Result<Tree> {
    parse::Parser::new(engine, source).parse_template()
}

/// A handle for compiling sub-templates while plugins are initialized.
///
/// Plugins receive a compiler in [`Formatter::initialize`] and
/// [`Predicate::initialize`]. The trees it returns are immutable and can be
/// stored by the plugin and rendered on every invocation.
///
/// [`Formatter::initialize`]: crate::Formatter::initialize
/// [`Predicate::initialize`]: crate::Predicate::initialize
#[derive(Clone, Copy)]
pub struct Compiler<'engine> {
    engine: &'engine Engine<'engine>,
}

impl<'engine> Compiler<'engine> {
    pub(crate) fn new(engine: &'engine Engine<'engine>) -> Self {
        Self { engine }
    }

    /// Compile a template.
    ///
    /// The template may use any plugin registered with the engine, including
    /// plugins that have not been initialized yet.
    pub fn compile(&self, source: &str) -> Result<Tree> {
        template(self.engine, source)
    }

    /// Returns the syntax configuration of the engine.
    #[inline]
    pub fn syntax(&self) -> &Syntax {
        &self.engine.syntax
    }
}

impl fmt::Debug for Compiler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler").finish_non_exhaustive()
    }
}
