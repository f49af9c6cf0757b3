/// The template syntax configuration.
///
/// Instructions are wrapped in an open and close delimiter, by default `{` and
/// `}`. Use [`Syntax::default()`] to get the default syntax configuration and
/// [`Syntax::builder()`] to create a custom one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syntax {
    pub(crate) open: String,
    pub(crate) close: String,
}

/// A builder for the syntax configuration.
///
/// This struct is typically created using [`Syntax::builder()`].
#[derive(Debug, Clone)]
pub struct SyntaxBuilder<'a> {
    delimiters: Option<(&'a str, &'a str)>,
}

impl Default for Syntax {
    /// Returns the default syntax configuration.
    ///
    /// This is equivalent to the following.
    /// ```
    /// use jsont::Syntax;
    ///
    /// let syntax = Syntax::builder().delimiters("{", "}").build();
    /// assert_eq!(syntax, Syntax::default());
    /// ```
    #[inline]
    fn default() -> Self {
        Self {
            open: "{".into(),
            close: "}".into(),
        }
    }
}

impl Syntax {
    /// Create a new syntax builder.
    ///
    /// # Examples
    ///
    /// ```
    /// let syntax = jsont::Syntax::builder().delimiters("<%", "%>").build();
    /// ```
    #[inline]
    pub fn builder<'a>() -> SyntaxBuilder<'a> {
        SyntaxBuilder::new()
    }

    /// Returns the open delimiter, e.g. `{`.
    #[inline]
    pub fn open(&self) -> &str {
        &self.open
    }

    /// Returns the close delimiter, e.g. `}`.
    #[inline]
    pub fn close(&self) -> &str {
        &self.close
    }
}

impl<'a> SyntaxBuilder<'a> {
    /// Creates a new syntax builder.
    #[inline]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self { delimiters: None }
    }

    /// Set the instruction delimiters.
    ///
    /// If not set then the default `{` and `}` are used.
    ///
    /// # Panics
    ///
    /// If either of the strings are empty or if they are equal.
    #[inline]
    pub fn delimiters(&mut self, open: &'a str, close: &'a str) -> &mut Self {
        assert!(!open.is_empty() && !close.is_empty());
        assert_ne!(open, close, "open and close delimiters must differ");
        self.delimiters = Some((open, close));
        self
    }

    /// Builds the syntax configuration.
    pub fn build(&self) -> Syntax {
        match self.delimiters {
            Some((open, close)) => Syntax {
                open: open.into(),
                close: close.into(),
            },
            None => Syntax::default(),
        }
    }
}
