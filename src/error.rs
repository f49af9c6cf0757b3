use std::cmp::max;
use std::fmt;
use std::io;
use std::sync::Arc;

use crate::types::span::Span;

/// The kind of an [`Error`].
///
/// Compilation can fail with any of [`Lex`][ErrorKind::Lex],
/// [`Syntax`][ErrorKind::Syntax], [`UnknownPlugin`][ErrorKind::UnknownPlugin],
/// [`Arguments`][ErrorKind::Arguments] or [`Compile`][ErrorKind::Compile].
/// Rendering can fail with [`Execution`][ErrorKind::Execution] or
/// [`Render`][ErrorKind::Render].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A delimiter sequence was malformed or left unterminated.
    Lex,
    /// A structural violation, e.g. an unbalanced block or misplaced `.or`.
    Syntax,
    /// A formatter or predicate name that is not in the registry.
    UnknownPlugin,
    /// A plugin rejected its arguments while the template was compiled.
    Arguments,
    /// A plugin's one-time initialization failed.
    Compile,
    /// A plugin failed while the template was executed.
    Execution,
    /// A plugin could not be registered.
    Registration,
    /// Any other failure while rendering, e.g. an IO error or the maximum
    /// nesting depth was exceeded.
    Render,
}

/// An error that can occur during template compilation or rendering.
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
    plugin: Option<String>,
    span: Option<(String, Span)>,
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            plugin: None,
            span: None,
            source: None,
        }
    }

    fn with_span(mut self, source: &str, span: impl Into<Span>) -> Self {
        self.span = Some((source.to_owned(), span.into()));
        self
    }

    pub(crate) fn lex(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        Self::new(ErrorKind::Lex, msg).with_span(source, span)
    }

    pub(crate) fn syntax(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        Self::new(ErrorKind::Syntax, msg).with_span(source, span)
    }

    pub(crate) fn unknown_plugin(name: &str, source: &str, span: impl Into<Span>) -> Self {
        let mut err = Self::new(ErrorKind::UnknownPlugin, format!("unknown plugin `{name}`"))
            .with_span(source, span);
        err.plugin = Some(name.to_owned());
        err
    }

    /// Construct an arguments error.
    ///
    /// Plugins return this from
    /// [`validate_args`][crate::Formatter::validate_args] to reject the
    /// arguments they were given in a template.
    pub fn arguments(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Arguments, msg)
    }

    pub(crate) fn compile(plugin: &str, cause: Error) -> Self {
        let mut err = Self::new(
            ErrorKind::Compile,
            format!("failed to initialize plugin `{plugin}`"),
        );
        err.plugin = Some(plugin.to_owned());
        err.source = Some(Arc::new(cause));
        err
    }

    pub(crate) fn execution(plugin: &str, cause: Error) -> Self {
        let mut err = Self::new(ErrorKind::Execution, format!("plugin `{plugin}` failed"));
        err.plugin = Some(plugin.to_owned());
        err.source = Some(Arc::new(cause));
        err
    }

    pub(crate) fn registration(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Registration, msg)
    }

    pub(crate) fn render(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Render, msg)
    }

    pub(crate) fn max_depth(max: usize) -> Self {
        Self::render(format!("reached maximum nesting depth of {max}"))
    }

    /// Attach the template source and the span of the offending instruction
    /// to an error that was raised by a plugin without that context.
    pub(crate) fn enrich(mut self, source: &str, span: impl Into<Span>) -> Self {
        if self.span.is_none() {
            self = self.with_span(source, span);
        }
        self
    }

    /// Plain messages raised while validating arguments are argument errors.
    pub(crate) fn into_arguments(mut self) -> Self {
        if self.kind == ErrorKind::Execution && self.source.is_none() {
            self.kind = ErrorKind::Arguments;
        }
        self
    }

    pub(crate) fn with_plugin(mut self, plugin: &str) -> Self {
        self.plugin = Some(plugin.to_owned());
        self
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the name of the plugin involved in this error, if any.
    pub fn plugin_name(&self) -> Option<&str> {
        self.plugin.as_deref()
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Self::new(ErrorKind::Execution, msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Self::new(ErrorKind::Execution, msg)
    }
}

impl From<fmt::Error> for Error {
    fn from(err: fmt::Error) -> Self {
        let mut e = Self::render("failed to format value");
        e.source = Some(Arc::new(err));
        e
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let mut e = Self::render("failed to write output");
        e.source = Some(Arc::new(err));
        e
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        let mut e = Self::render("failed to serialize data document");
        e.source = Some(Arc::new(err));
        e
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) => fmt_pretty(&self.msg, source, *span, f),
            None => {
                write!(f, "{}", self.msg)?;
                fmt_cause(self, f)
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) => {
                if f.alternate() {
                    fmt_pretty(&self.msg, source, *span, f)
                } else {
                    write!(f, "{} between bytes {} and {}", self.msg, span.m, span.n)
                }
            }
            None => {
                write!(f, "{}", self.msg)?;
                fmt_cause(self, f)
            }
        }
    }
}

fn fmt_cause(err: &Error, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &err.source {
        Some(cause) if matches!(err.kind, ErrorKind::Compile | ErrorKind::Execution) => {
            write!(f, ": {cause}")
        }
        _ => Ok(()),
    }
}

fn fmt_pretty(msg: &str, source: &str, span: Span, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let lines: Vec<_> = source.split_terminator('\n').collect();
    let (line, col) = to_line_col(&lines, span.m);
    let width = max(1, str_width(&source[span]));
    let code = lines
        .get(line)
        .or_else(|| lines.last())
        .copied()
        .unwrap_or_default();

    let num = (line + 1).to_string();
    let pad = str_width(&num);
    let pipe = "|";
    let underline = "^".repeat(width);

    write!(
        f,
        "\n \
        {0:pad$} {pipe}\n \
        {num:>} {pipe} {code}\n \
        {0:pad$} {pipe} {underline:>width$} {msg}\n",
        "",
        pad = pad,
        pipe = pipe,
        num = num,
        code = code,
        underline = underline,
        width = col + width,
        msg = msg
    )
}

fn to_line_col(lines: &[&str], offset: usize) -> (usize, usize) {
    let mut n = 0;
    for (i, line) in lines.iter().enumerate() {
        let len = line.len() + 1;
        if n + len > offset {
            return (i, str_width(&line[..offset - n]));
        }
        n += len;
    }
    (
        lines.len().saturating_sub(1),
        lines.last().map(|l| str_width(l)).unwrap_or(0),
    )
}

#[cfg(feature = "unicode")]
fn str_width(s: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(s)
}

#[cfg(not(feature = "unicode"))]
fn str_width(s: &str) -> usize {
    s.chars().count()
}
