//! A JSON-Template compiler and execution engine.
//!
//! # Features
//!
//! ### Syntax
//!
//! - Variables: `{user.name}`
//! - Sections: `{.section user} ... {.or} ... {.end}`
//! - Repeated sections: `{.repeated section items} ... {.alternates with} ... {.end}`
//! - Predicates: `{.plural?} ... {.or singular?} ... {.or} ... {.end}`
//! - Conditions: `{.if a || b} ... {.end}`
//! - Formatter pipelines: `{item.title|truncate 20|html}`
//! - Configurable delimiters: `<%user.name%>`
//!
//! ### Engine
//!
//! - Pluggable formatters and predicates that validate their arguments once
//!   at compile time and may precompile sub-templates
//! - Render any [`serde`] serializable value or a [`serde_json::Value`]
//! - Render to a [`String`] or any [`std::io::Write`] implementor
//! - Compiled templates are immutable and can be rendered from many threads
//!
//! # Getting started
//!
//! Your entry point is the [`Engine`] struct. The engine stores the syntax
//! config, the plugin registry, and compiled templates. Generally, you only
//! need to construct one engine during the lifetime of a program.
//!
//! ```
//! let engine = jsont::Engine::new();
//! ```
//!
//! Next, [`.add_template`][Engine::add_template] is used to compile and store
//! a template in the engine.
//!
//! ```
//! # let mut engine = jsont::Engine::new();
//! engine.add_template("hello", "Hello {user.name}!")?;
//! # Ok::<(), jsont::Error>(())
//! ```
//!
//! Finally, the template is rendered by fetching it using
//! [`.get_template`][Engine::get_template] and calling
//! [`.render`][TemplateRef::render].
//!
//! ```
//! # let mut engine = jsont::Engine::new();
//! # engine.add_template("hello", "Hello {user.name}!")?;
//! let template = engine.get_template("hello").unwrap();
//! let result = template
//!     .render(serde_json::json!({ "user": { "name": "John Smith" } }))
//!     .to_string()?;
//! assert_eq!(result, "Hello John Smith!");
//! # Ok::<(), jsont::Error>(())
//! ```
//!
//! If you don't need to store the compiled template then you can also use the
//! [`.compile`][Engine::compile] function to return the template directly.
//!
//! ```
//! # let engine = jsont::Engine::new();
//! let template = engine.compile("Hello {user.name}!")?;
//! let result = template
//!     .render(serde_json::json!({ "user": { "name": "John Smith" } }))
//!     .to_string()?;
//! assert_eq!(result, "Hello John Smith!");
//! # Ok::<(), jsont::Error>(())
//! ```
//!
//! # Examples
//!
//! ### Render using structured data
//!
//! ```
//! #[derive(serde::Serialize)]
//! struct Context { items: Vec<Item> }
//!
//! #[derive(serde::Serialize)]
//! struct Item { name: String }
//!
//! let ctx = Context {
//!     items: vec![Item { name: "pen".into() }, Item { name: "ink".into() }],
//! };
//!
//! let result = jsont::Engine::new()
//!     .compile("{.repeated section items}{name}{.alternates with}, {.end}")?
//!     .render(&ctx)
//!     .to_string()?;
//!
//! assert_eq!(result, "pen, ink");
//! # Ok::<(), jsont::Error>(())
//! ```
//!
//! ### Transform data using formatters
//!
//! ```
//! use jsont::Value;
//!
//! let mut engine = jsont::Engine::new();
//! engine.add_formatter_fn("lower", |value, _| {
//!     Ok(Value::from(jsont::value::as_text(value).to_lowercase()))
//! })?;
//!
//! let result = engine
//!     .compile("Hello {value|lower}")?
//!     .render(serde_json::json!({ "value": "WORLD!" }))
//!     .to_string()?;
//!
//! assert_eq!(result, "Hello world!");
//! # Ok::<(), jsont::Error>(())
//! ```
//!
//! See the [`Formatter`] and [`Predicate`] trait documentation for more
//! information on plugins.
//!
//! ### Render a template using custom syntax
//!
//! ```
//! let syntax = jsont::Syntax::builder().delimiters("<%", "%>").build();
//!
//! let result = jsont::Engine::with_syntax(syntax)
//!     .compile("function() { return <%user.name%>; }")?
//!     .render(serde_json::json!({ "user": { "name": "John Smith" } }))
//!     .to_string()?;
//!
//! assert_eq!(result, "function() { return John Smith; }");
//! # Ok::<(), jsont::Error>(())
//! ```
//!
//! ### Render a template to an `impl io::Write`
//!
//! ```
//! use std::io;
//!
//! let stdout = io::BufWriter::new(io::stdout());
//!
//! jsont::Engine::new()
//!     .compile("Hello {user.name}")?
//!     .render(serde_json::json!({ "user": { "name": "John Smith" } }))
//!     .to_writer(stdout)?;
//! # Ok::<(), jsont::Error>(())
//! ```

mod compile;
mod error;
mod plugin;
mod render;
mod types;
pub mod value;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use log::{debug, trace};

pub use crate::compile::Compiler;
pub use crate::error::{Error, ErrorKind};
#[cfg(feature = "builtins")]
pub use crate::plugin::builtins::Builtins;
pub use crate::plugin::{Arguments, Formatter, Predicate, Registrar};
pub use crate::render::{Context, Locale, Renderer, Variable};
pub use crate::types::syntax::{Syntax, SyntaxBuilder};
pub use crate::types::tree::Tree;
pub use crate::value::Value;

use crate::plugin::{FormatterFn, Plugin, PredicateFn, Registry};

/// The instruction tree that templates compile to.
pub mod tree {
    pub use crate::types::tree::{
        Alternative, Block, Call, IfBlock, Instr, Literal, Operator, Path, PredicateBlock,
        Repeated, Section, Segment, Tree, Variable,
    };
}

/// A type alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;

const DEFAULT_MAX_DEPTH: usize = 64;

/// The compilation and rendering engine.
pub struct Engine<'engine> {
    syntax: Syntax,
    registry: Registry,
    /// Set once the registry is frozen and every plugin was initialized.
    init: OnceLock<Result<()>>,
    default_locale: Locale,
    max_depth: usize,
    templates: BTreeMap<Cow<'engine, str>, Stored<'engine>>,
}

struct Stored<'engine> {
    source: Cow<'engine, str>,
    tree: Tree,
}

/// A compiled template.
pub struct Template<'engine, 'source> {
    engine: &'engine Engine<'engine>,
    source: &'source str,
    tree: Tree,
}

/// A reference to a compiled template in an [`Engine`].
#[derive(Clone, Copy)]
pub struct TemplateRef<'engine> {
    engine: &'engine Engine<'engine>,
    template: &'engine Stored<'engine>,
}

impl<'engine> Default for Engine<'engine> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<'engine> Engine<'engine> {
    /// Construct a new engine.
    ///
    /// If the `builtins` feature is enabled the builtin formatters and
    /// predicates are registered.
    #[inline]
    pub fn new() -> Self {
        Self::with_syntax(Syntax::default())
    }

    /// Construct a new engine with no plugins registered.
    #[inline]
    pub fn empty() -> Self {
        Self::with_registry(Syntax::default(), Registry::default())
    }

    /// Construct a new engine with custom syntax.
    ///
    /// # Examples
    ///
    /// ```
    /// use jsont::{Engine, Syntax};
    ///
    /// let syntax = Syntax::builder().delimiters("<%", "%>").build();
    /// let engine = Engine::with_syntax(syntax);
    /// ```
    #[inline]
    pub fn with_syntax(syntax: Syntax) -> Self {
        #[cfg(feature = "builtins")]
        let registry = plugin::builtins::plugins().collect();
        #[cfg(not(feature = "builtins"))]
        let registry = Registry::default();
        Self::with_registry(syntax, registry)
    }

    fn with_registry(syntax: Syntax, registry: Registry) -> Self {
        Self {
            syntax,
            registry,
            init: OnceLock::new(),
            default_locale: Locale::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            templates: BTreeMap::new(),
        }
    }

    /// Returns the syntax configuration.
    #[inline]
    pub fn syntax(&self) -> &Syntax {
        &self.syntax
    }

    /// Set the locale passed to plugins when none is given to the renderer.
    ///
    /// Defaults to `en-US`.
    #[inline]
    pub fn set_default_locale(&mut self, locale: Locale) {
        self.default_locale = locale;
    }

    /// Set the default maximum nesting depth.
    ///
    /// This is the maximum number of nested blocks and plugin rendered
    /// sub-templates allowed during rendering.
    ///
    /// Defaults to 64.
    #[inline]
    pub fn set_max_depth(&mut self, depth: usize) {
        self.max_depth = depth;
    }

    /// Add a new formatter to the engine.
    ///
    /// Fails if a plugin with the same name is already registered or if the
    /// engine has already compiled a template.
    pub fn add_formatter<F>(&mut self, formatter: F) -> Result<()>
    where
        F: Formatter,
    {
        self.add_plugin(Plugin::Formatter(Box::new(formatter)))
    }

    /// Add a new predicate to the engine.
    ///
    /// Fails if a plugin with the same name is already registered or if the
    /// engine has already compiled a template.
    pub fn add_predicate<P>(&mut self, predicate: P) -> Result<()>
    where
        P: Predicate,
    {
        self.add_plugin(Plugin::Predicate(Box::new(predicate)))
    }

    /// Add a formatter backed by a function or closure.
    ///
    /// The function receives the current value and returns the new one.
    pub fn add_formatter_fn<F>(&mut self, name: impl Into<String>, f: F) -> Result<()>
    where
        F: Fn(&Value, &Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        self.add_formatter(FormatterFn {
            name: name.into(),
            f,
        })
    }

    /// Add a predicate backed by a function or closure.
    ///
    /// # Examples
    ///
    /// ```
    /// let mut engine = jsont::Engine::new();
    /// engine.add_predicate_fn("admin?", |ctx, _| {
    ///     Ok(ctx.lookup("role").map_or(false, |role| *role == "admin"))
    /// })?;
    ///
    /// let template = engine.compile("{.admin?}hi admin{.or}hi{.end}")?;
    /// let result = template
    ///     .render(serde_json::json!({ "role": "admin" }))
    ///     .to_string()?;
    /// assert_eq!(result, "hi admin");
    /// # Ok::<(), jsont::Error>(())
    /// ```
    pub fn add_predicate_fn<F>(&mut self, name: impl Into<String>, f: F) -> Result<()>
    where
        F: Fn(&Context<'_>, &Arguments) -> Result<bool> + Send + Sync + 'static,
    {
        self.add_predicate(PredicateFn {
            name: name.into(),
            f,
        })
    }

    /// Register a bundle of plugins.
    pub fn add_registrar<R>(&mut self, registrar: R) -> Result<()>
    where
        R: Registrar,
    {
        registrar.register(self)
    }

    pub(crate) fn add_plugin(&mut self, plugin: Plugin) -> Result<()> {
        if self.init.get().is_some() {
            return Err(Error::registration(format!(
                "cannot register `{}` after the engine compiled a template",
                plugin.name()
            ))
            .with_plugin(plugin.name()));
        }
        debug!("registering {} `{}`", plugin.human(), plugin.name());
        self.registry.register(plugin)
    }

    /// Add a template to the engine.
    ///
    /// The template will be compiled and stored under the given name.
    pub fn add_template<N, S>(&mut self, name: N, source: S) -> Result<()>
    where
        N: Into<Cow<'engine, str>>,
        S: Into<Cow<'engine, str>>,
    {
        let source = source.into();
        let tree = self.compile_tree(&source)?;
        self.templates
            .insert(name.into(), Stored { source, tree });
        Ok(())
    }

    /// Lookup a template by name.
    #[inline]
    pub fn get_template(&self, name: &str) -> Option<TemplateRef<'_>> {
        self.templates
            .get(name)
            .map(|template| TemplateRef {
                engine: self,
                template,
            })
    }

    /// Compile a template.
    ///
    /// The template will not be stored in the engine. The advantage over
    /// [`.add_template(..)`][Engine::add_template] here is that the lifetime
    /// of the template source does not need to outlive the engine.
    #[inline]
    pub fn compile<'source>(&self, source: &'source str) -> Result<Template<'_, 'source>> {
        let tree = self.compile_tree(source)?;
        Ok(Template {
            engine: self,
            source,
            tree,
        })
    }

    fn compile_tree(&self, source: &str) -> Result<Tree> {
        self.initialize()?;
        let tree = compile::template(self, source)?;
        debug!(
            "compiled template with {} top level instructions",
            tree.instructions().len()
        );
        Ok(tree)
    }

    /// Freezes the registry and initializes every plugin, exactly once.
    fn initialize(&self) -> Result<()> {
        self.init
            .get_or_init(|| {
                debug!("initializing {} plugins", self.registry.len());
                let compiler = Compiler::new(self);
                for plugin in self.registry.iter() {
                    trace!("initializing {} `{}`", plugin.human(), plugin.name());
                    plugin
                        .initialize(&compiler)
                        .map_err(|err| Error::compile(plugin.name(), err))?;
                }
                Ok(())
            })
            .clone()
    }
}

impl fmt::Debug for Engine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("syntax", &self.syntax)
            .field("plugins", &self.registry)
            .field("default_locale", &self.default_locale)
            .field("max_depth", &self.max_depth)
            .field("templates", &self.templates.keys())
            .finish()
    }
}

impl<'engine, 'source> Template<'engine, 'source> {
    /// Render the template using the provided serializable data.
    #[inline]
    pub fn render<S>(&self, data: S) -> Renderer<'_>
    where
        S: serde::Serialize,
    {
        Renderer::with_serde(self.engine, &self.tree, data)
    }

    /// Render the template using the provided data document.
    #[inline]
    pub fn render_from<'render>(&'render self, data: &'render Value) -> Renderer<'render> {
        Renderer::with_value(self.engine, &self.tree, data)
    }

    /// Returns the compiled instruction tree.
    #[inline]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Returns the canonical source form of the template.
    #[inline]
    pub fn repr(&self) -> String {
        self.tree.repr_with(&self.engine.syntax)
    }

    /// Returns the original template source.
    #[inline]
    pub fn source(&self) -> &'source str {
        self.source
    }
}

impl fmt::Debug for Template<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("source", &self.source)
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}

impl<'engine> TemplateRef<'engine> {
    /// Render the template using the provided serializable data.
    #[inline]
    pub fn render<S>(&self, data: S) -> Renderer<'engine>
    where
        S: serde::Serialize,
    {
        Renderer::with_serde(self.engine, &self.template.tree, data)
    }

    /// Render the template using the provided data document.
    #[inline]
    pub fn render_from<'render>(&self, data: &'render Value) -> Renderer<'render>
    where
        'engine: 'render,
    {
        Renderer::with_value(self.engine, &self.template.tree, data)
    }

    /// Returns the compiled instruction tree.
    #[inline]
    pub fn tree(&self) -> &'engine Tree {
        &self.template.tree
    }

    /// Returns the canonical source form of the template.
    #[inline]
    pub fn repr(&self) -> String {
        self.template.tree.repr_with(&self.engine.syntax)
    }

    /// Returns the original template source.
    #[inline]
    pub fn source(&self) -> &'engine str {
        &self.template.source
    }
}

impl fmt::Debug for TemplateRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRef")
            .field("source", &self.template.source)
            .field("tree", &self.template.tree)
            .finish_non_exhaustive()
    }
}
