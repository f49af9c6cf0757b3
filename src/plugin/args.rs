use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};

/// The arguments bound to one formatter or predicate invocation in a
/// template.
///
/// The character directly following the plugin name is the delimiter and the
/// rest of the instruction is split on it. Usually this is a space but any
/// character that cannot be part of a plugin name works.
///
/// ```text
/// {title|truncate 20 ...}      =>  ["20", "..."]
/// {count|pluralize/item/items} =>  ["item", "items"]
/// ```
///
/// Arguments are immutable once the template is compiled, except for an
/// opaque value that a plugin may compute once in
/// [`validate_args`][crate::Formatter::validate_args] and then read on every
/// invocation.
#[derive(Clone)]
pub struct Arguments {
    delimiter: char,
    args: Vec<String>,
    opaque: Option<Arc<dyn Any + Send + Sync>>,
}

impl Arguments {
    /// Parses the raw text following a plugin name.
    pub(crate) fn parse(raw: &str) -> Self {
        let mut chars = raw.chars();
        let delimiter = match chars.next() {
            Some(c) => c,
            None => return Self::empty(),
        };
        let rest = chars.as_str();
        if rest.is_empty() {
            return Self::empty();
        }
        Self {
            delimiter,
            args: rest.split(delimiter).map(String::from).collect(),
            opaque: None,
        }
    }

    pub(crate) fn empty() -> Self {
        Self {
            delimiter: ' ',
            args: Vec::new(),
            opaque: None,
        }
    }

    /// Returns the number of arguments.
    #[inline]
    pub fn count(&self) -> usize {
        self.args.len()
    }

    /// Returns `true` if there are no arguments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Returns the first argument.
    #[inline]
    pub fn first(&self) -> Option<&str> {
        self.get(0)
    }

    /// Returns the argument at the given position.
    #[inline]
    pub fn get(&self, i: usize) -> Option<&str> {
        self.args.get(i).map(String::as_str)
    }

    /// Returns an iterator over the raw arguments.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.args.iter().map(String::as_str)
    }

    /// Returns the delimiter the arguments were split on.
    #[inline]
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Fails unless there are exactly `n` arguments.
    pub fn exactly(&self, n: usize) -> Result<()> {
        if self.count() != n {
            return Err(self.err_count("exactly", n));
        }
        Ok(())
    }

    /// Fails unless there are at least `n` arguments.
    pub fn at_least(&self, n: usize) -> Result<()> {
        if self.count() < n {
            return Err(self.err_count("at least", n));
        }
        Ok(())
    }

    /// Fails unless there are at most `n` arguments.
    pub fn at_most(&self, n: usize) -> Result<()> {
        if self.count() > n {
            return Err(self.err_count("at most", n));
        }
        Ok(())
    }

    /// Fails unless the number of arguments is within `min..=max`.
    pub fn between(&self, min: usize, max: usize) -> Result<()> {
        self.at_least(min)?;
        self.at_most(max)
    }

    /// Caches a value computed from the arguments.
    ///
    /// This is intended to be called from
    /// [`validate_args`][crate::Formatter::validate_args], which runs once
    /// when the template is compiled.
    pub fn set_opaque<T>(&mut self, value: T)
    where
        T: Any + Send + Sync,
    {
        self.opaque = Some(Arc::new(value));
    }

    /// Returns the cached value if one was set and it has type `T`.
    pub fn opaque<T>(&self) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        self.opaque.as_deref()?.downcast_ref()
    }

    /// Writes the canonical source form of the arguments.
    pub(crate) fn repr(&self, out: &mut String) {
        for arg in &self.args {
            out.push(self.delimiter);
            out.push_str(arg);
        }
    }

    fn err_count(&self, cmp: &str, n: usize) -> Error {
        let s = if n == 1 { "" } else { "s" };
        Error::arguments(format!(
            "expected {cmp} {n} argument{s}, found {}",
            self.count()
        ))
    }
}

impl PartialEq for Arguments {
    fn eq(&self, other: &Self) -> bool {
        self.args == other.args && (self.args.is_empty() || self.delimiter == other.delimiter)
    }
}

impl Eq for Arguments {}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("delimiter", &self.delimiter)
            .field("args", &self.args)
            .field("opaque", &self.opaque.is_some())
            .finish()
    }
}
