//! The formatter and predicate plugin contract.
//!
//! Plugins are registered with an [`Engine`][crate::Engine] before the first
//! template is compiled. Templates reference them by name, formatters in a
//! variable pipeline (`{title|html}`) and predicates in a block
//! (`{.plural?}`). The parser resolves every name against the registry, so an
//! unknown plugin is always a compile error and never an execution error.

mod args;
#[cfg(feature = "builtins")]
pub(crate) mod builtins;

use std::collections::BTreeMap;
use std::fmt;

use crate::render::{Context, Variable};
use crate::{Compiler, Error, Result, Value};

pub use crate::plugin::args::Arguments;

/// A formatter transforms the value of a variable.
///
/// # Examples
///
/// ```
/// use jsont::{Arguments, Context, Formatter, Result, Variable};
///
/// struct Lower;
///
/// impl Formatter for Lower {
///     fn name(&self) -> &str {
///         "lower"
///     }
///
///     fn apply(&self, _: &Context<'_>, _: &Arguments, var: &mut Variable<'_>) -> Result<()> {
///         let lower = var.text().to_lowercase();
///         var.set(lower);
///         Ok(())
///     }
/// }
///
/// let mut engine = jsont::Engine::new();
/// engine.add_formatter(Lower)?;
/// let result = engine
///     .compile("{name|lower}")?
///     .render(serde_json::json!({ "name": "JOHN" }))
///     .to_string()?;
/// assert_eq!(result, "john");
/// # Ok::<(), jsont::Error>(())
/// ```
pub trait Formatter: Send + Sync + 'static {
    /// The unique name the formatter is referenced by in templates.
    fn name(&self) -> &str;

    /// Checks the arguments given in a template.
    ///
    /// Called once for every use of this formatter when a template is
    /// compiled. The arguments may cache a precomputed value using
    /// [`Arguments::set_opaque`].
    fn validate_args(&self, args: &mut Arguments) -> Result<()> {
        let _ = args;
        Ok(())
    }

    /// Called once, before the first template is compiled.
    ///
    /// The compiler can be used to compile sub-templates that are rendered on
    /// every invocation using [`Context::render_nested`] or
    /// [`Context::render_private`].
    fn initialize(&self, compiler: &Compiler<'_>) -> Result<()> {
        let _ = compiler;
        Ok(())
    }

    /// Transforms the variable.
    ///
    /// The variable is never missing when this is called. Calling
    /// [`Variable::set_missing`] suppresses output and skips the rest of the
    /// pipeline.
    fn apply(&self, ctx: &Context<'_>, args: &Arguments, var: &mut Variable<'_>) -> Result<()>;
}

/// A predicate selects a branch of a predicate block.
pub trait Predicate: Send + Sync + 'static {
    /// The unique name the predicate is referenced by in templates, by
    /// convention ending with a `?`.
    fn name(&self) -> &str;

    /// See [`Formatter::validate_args`].
    fn validate_args(&self, args: &mut Arguments) -> Result<()> {
        let _ = args;
        Ok(())
    }

    /// See [`Formatter::initialize`].
    fn initialize(&self, compiler: &Compiler<'_>) -> Result<()> {
        let _ = compiler;
        Ok(())
    }

    /// Evaluates the predicate in the current scope.
    fn test(&self, ctx: &Context<'_>, args: &Arguments) -> Result<bool>;
}

/// A bundle of plugins that is registered in one go.
pub trait Registrar {
    /// Register the plugins with the engine.
    fn register(&self, engine: &mut crate::Engine<'_>) -> Result<()>;
}

/// A registered plugin.
pub(crate) enum Plugin {
    Formatter(Box<dyn Formatter>),
    Predicate(Box<dyn Predicate>),
}

/// The plugin registry.
///
/// Written to during the registration phase and only read once the engine
/// has compiled its first template.
#[derive(Default)]
pub(crate) struct Registry {
    plugins: BTreeMap<String, Plugin>,
}

impl Plugin {
    pub fn name(&self) -> &str {
        match self {
            Self::Formatter(f) => f.name(),
            Self::Predicate(p) => p.name(),
        }
    }

    pub fn validate_args(&self, args: &mut Arguments) -> Result<()> {
        match self {
            Self::Formatter(f) => f.validate_args(args),
            Self::Predicate(p) => p.validate_args(args),
        }
    }

    pub fn initialize(&self, compiler: &Compiler<'_>) -> Result<()> {
        match self {
            Self::Formatter(f) => f.initialize(compiler),
            Self::Predicate(p) => p.initialize(compiler),
        }
    }

    pub fn human(&self) -> &'static str {
        match self {
            Self::Formatter(_) => "formatter",
            Self::Predicate(_) => "predicate",
        }
    }
}

impl Registry {
    /// Adds a plugin, failing if the name is already taken.
    pub fn register(&mut self, plugin: Plugin) -> Result<()> {
        let name = plugin.name().to_owned();
        if name.is_empty() {
            return Err(Error::registration("plugin name must not be empty"));
        }
        if let Some(existing) = self.plugins.get(&name) {
            return Err(Error::registration(format!(
                "a {} named `{name}` is already registered",
                existing.human()
            ))
            .with_plugin(&name));
        }
        self.plugins.insert(name, plugin);
        Ok(())
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Plugin> {
        self.plugins.get(name)
    }

    pub fn formatter(&self, name: &str) -> Option<&dyn Formatter> {
        match self.plugins.get(name)? {
            Plugin::Formatter(f) => Some(&**f),
            Plugin::Predicate(_) => None,
        }
    }

    pub fn predicate(&self, name: &str) -> Option<&dyn Predicate> {
        match self.plugins.get(name)? {
            Plugin::Predicate(p) => Some(&**p),
            Plugin::Formatter(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }
}

impl FromIterator<Plugin> for Registry {
    /// Collects plugins whose names are known to be unique, e.g. the
    /// builtins. Use [`Registry::register`] for anything else.
    fn from_iter<I: IntoIterator<Item = Plugin>>(iter: I) -> Self {
        let mut plugins = BTreeMap::new();
        for plugin in iter {
            let name = plugin.name().to_owned();
            debug_assert!(
                !plugins.contains_key(&name),
                "plugin `{name}` collected twice"
            );
            plugins.insert(name, plugin);
        }
        Self { plugins }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.plugins.keys()).finish()
    }
}

/// A formatter backed by a function or closure.
///
/// Created by [`Engine::add_formatter_fn`][crate::Engine::add_formatter_fn].
pub(crate) struct FormatterFn<F> {
    pub name: String,
    pub f: F,
}

impl<F> Formatter for FormatterFn<F>
where
    F: Fn(&Value, &Arguments) -> Result<Value> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, _: &Context<'_>, args: &Arguments, var: &mut Variable<'_>) -> Result<()> {
        let value = (self.f)(var.node(), args)?;
        var.set(value);
        Ok(())
    }
}

/// A predicate backed by a function or closure.
///
/// Created by [`Engine::add_predicate_fn`][crate::Engine::add_predicate_fn].
pub(crate) struct PredicateFn<F> {
    pub name: String,
    pub f: F,
}

impl<F> Predicate for PredicateFn<F>
where
    F: Fn(&Context<'_>, &Arguments) -> Result<bool> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn test(&self, ctx: &Context<'_>, args: &Arguments) -> Result<bool> {
        (self.f)(ctx, args)
    }
}
