use std::fmt;
use std::io;

/// The sink that rendered text is written to.
pub struct Output<'a> {
    buf: &'a mut (dyn fmt::Write + 'a),
}

/// Adapts an [`io::Write`] so it can be used as an [`Output`], holding on to
/// the underlying IO error if a write fails.
pub struct Writer<W> {
    writer: W,
    err: Option<io::Error>,
}

impl<'a> Output<'a> {
    pub fn with_string(buf: &'a mut String) -> Self {
        Self { buf }
    }

    pub fn with_writer<W>(buf: &'a mut Writer<W>) -> Self
    where
        W: io::Write,
    {
        Self { buf }
    }
}

impl fmt::Write for Output<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.write_str(s)
    }

    #[inline]
    fn write_char(&mut self, c: char) -> fmt::Result {
        self.buf.write_char(c)
    }
}

impl<W> Writer<W>
where
    W: io::Write,
{
    pub fn new(writer: W) -> Self {
        Self { writer, err: None }
    }

    pub fn take_err(&mut self) -> Option<io::Error> {
        self.err.take()
    }
}

impl<W> fmt::Write for Writer<W>
where
    W: io::Write,
{
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.writer.write_all(s.as_bytes()).map_err(|e| {
            self.err = Some(e);
            fmt::Error
        })
    }
}
