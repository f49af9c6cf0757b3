//! The instruction tree that a template compiles to.
//!
//! A [`Tree`] is immutable once built. Executing it any number of times, from
//! any number of threads, never changes it, so compiled trees can be cached
//! and shared freely, including the sub-templates that plugins compile during
//! initialization.

use std::fmt;

use crate::plugin::Arguments;
use crate::types::syntax::Syntax;

/// A compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub(crate) root: Block,
}

/// A sequence of instructions executed in order.
pub type Block = Vec<Instr>;

/// A single node in the instruction tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    /// Literal characters emitted verbatim.
    Text(String),
    /// An escaped meta character, e.g. `{.space}`.
    Literal(Literal),
    /// A variable reference with an optional formatter pipeline, e.g.
    /// `{item.title|truncate 10}`.
    Variable(Variable),
    /// `{.section path}`
    Section(Section),
    /// `{.repeated section path}`
    Repeated(Repeated),
    /// A predicate block, e.g. `{.plural?}`.
    Predicate(PredicateBlock),
    /// `{.if a || b}`
    If(IfBlock),
}

/// The meta characters that have a dedicated escape instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    /// `{.meta-left}` emits the open delimiter.
    MetaLeft,
    /// `{.meta-right}` emits the close delimiter.
    MetaRight,
    /// `{.space}`
    Space,
    /// `{.tab}`
    Tab,
    /// `{.newline}`
    Newline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub path: Path,
    pub pipeline: Vec<Call>,
}

/// A formatter or predicate reference together with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: String,
    pub args: Arguments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub path: Path,
    pub body: Block,
    pub or: Vec<Alternative>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repeated {
    pub path: Path,
    pub body: Block,
    /// Executed between consecutive elements.
    pub alternates_with: Option<Block>,
    pub or: Vec<Alternative>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateBlock {
    pub predicate: Call,
    pub body: Block,
    pub or: Vec<Alternative>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfBlock {
    pub op: Operator,
    pub paths: Vec<Path>,
    pub body: Block,
    pub or: Vec<Alternative>,
}

/// How the operands of an `.if` are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `||`
    Or,
    /// `&&`
    And,
}

/// One `{.or}` clause of a block.
///
/// Only the last clause of a chain may be unconditional, i.e. have no
/// predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    pub predicate: Option<Call>,
    pub body: Block,
}

/// A variable path, e.g. `item.images.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `@`, the node bound to the current frame.
    Current,
    /// `@index`, the 1-based index of the enclosing repeated section.
    Index1,
    /// `@index0`, the 0-based index of the enclosing repeated section.
    Index0,
    /// An object key.
    Key(String),
    /// An array index.
    Index(usize),
}

impl Tree {
    /// Returns the top level instructions.
    #[inline]
    pub fn instructions(&self) -> &[Instr] {
        &self.root
    }

    /// Renders the canonical source form of this tree using the default
    /// syntax.
    ///
    /// Compiling the output yields a tree equal to this one.
    pub fn repr(&self) -> String {
        self.repr_with(&Syntax::default())
    }

    /// Renders the canonical source form of this tree using the given syntax.
    pub fn repr_with(&self, syntax: &Syntax) -> String {
        let mut out = String::new();
        Repr { syntax, out: &mut out }.block(&self.root);
        out
    }
}

impl Path {
    /// Parses a dotted path, returning `None` if it is not well formed.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "@" => return Some(Self::from(Segment::Current)),
            "@index" => return Some(Self::from(Segment::Index1)),
            "@index0" => return Some(Self::from(Segment::Index0)),
            _ => {}
        }
        let mut segments = Vec::new();
        for (i, part) in raw.split('.').enumerate() {
            let segment = match part {
                "@" if i == 0 => Segment::Current,
                p if !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()) => {
                    Segment::Index(p.parse().ok()?)
                }
                p if is_key(p) => Segment::Key(p.to_owned()),
                _ => return None,
            };
            segments.push(segment);
        }
        Some(Self { segments })
    }

    /// Returns the segments of this path. There is always at least one.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub(crate) fn first(&self) -> &Segment {
        &self.segments[0]
    }

    pub(crate) fn rest(&self) -> &[Segment] {
        &self.segments[1..]
    }
}

impl From<Segment> for Path {
    fn from(segment: Segment) -> Self {
        Self {
            segments: vec![segment],
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                Segment::Current => f.write_str("@")?,
                Segment::Index1 => f.write_str("@index")?,
                Segment::Index0 => f.write_str("@index0")?,
                Segment::Key(key) => f.write_str(key)?,
                Segment::Index(i) => write!(f, "{i}")?,
            }
        }
        Ok(())
    }
}

impl Literal {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            Self::MetaLeft => "meta-left",
            Self::MetaRight => "meta-right",
            Self::Space => "space",
            Self::Tab => "tab",
            Self::Newline => "newline",
        }
    }
}

impl Operator {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
        }
    }
}

/// Whether the string is a valid object key in a path.
pub(crate) fn is_key(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| matches!(c, '_' | '$' | '-') || is_ident(c))
}

/// Whether the character can appear in a plugin name.
pub(crate) fn is_name(c: char) -> bool {
    c == '-' || c == '_' || is_ident(c)
}

#[cfg(feature = "unicode")]
fn is_ident(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "unicode"))]
fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

/// Writes the canonical source form of instructions.
struct Repr<'a> {
    syntax: &'a Syntax,
    out: &'a mut String,
}

impl Repr<'_> {
    fn block(&mut self, block: &[Instr]) {
        for instr in block {
            self.instr(instr);
        }
    }

    fn instr(&mut self, instr: &Instr) {
        match instr {
            Instr::Text(text) => self.out.push_str(text),
            Instr::Literal(lit) => self.tag(|out| {
                out.push('.');
                out.push_str(lit.keyword());
            }),
            Instr::Variable(Variable { path, pipeline }) => self.tag(|out| {
                out.push_str(&path.to_string());
                for call in pipeline {
                    out.push('|');
                    out.push_str(&call.name);
                    call.args.repr(out);
                }
            }),
            Instr::Section(Section { path, body, or }) => {
                self.tag(|out| {
                    out.push_str(".section ");
                    out.push_str(&path.to_string());
                });
                self.block(body);
                self.alternatives(or);
            }
            Instr::Repeated(Repeated {
                path,
                body,
                alternates_with,
                or,
            }) => {
                self.tag(|out| {
                    out.push_str(".repeated section ");
                    out.push_str(&path.to_string());
                });
                self.block(body);
                if let Some(alt) = alternates_with {
                    self.tag(|out| out.push_str(".alternates with"));
                    self.block(alt);
                }
                self.alternatives(or);
            }
            Instr::Predicate(PredicateBlock {
                predicate,
                body,
                or,
            }) => {
                self.tag(|out| {
                    out.push('.');
                    out.push_str(&predicate.name);
                    predicate.args.repr(out);
                });
                self.block(body);
                self.alternatives(or);
            }
            Instr::If(IfBlock {
                op,
                paths,
                body,
                or,
            }) => {
                self.tag(|out| {
                    out.push_str(".if ");
                    for (i, path) in paths.iter().enumerate() {
                        if i > 0 {
                            out.push(' ');
                            out.push_str(op.symbol());
                            out.push(' ');
                        }
                        out.push_str(&path.to_string());
                    }
                });
                self.block(body);
                self.alternatives(or);
            }
        }
    }

    /// Writes the `{.or}` chain and the closing `{.end}`.
    fn alternatives(&mut self, or: &[Alternative]) {
        for alt in or {
            self.tag(|out| {
                out.push_str(".or");
                if let Some(call) = &alt.predicate {
                    out.push(' ');
                    out.push_str(&call.name);
                    call.args.repr(out);
                }
            });
            self.block(&alt.body);
        }
        self.tag(|out| out.push_str(".end"));
    }

    fn tag(&mut self, f: impl FnOnce(&mut String)) {
        self.out.push_str(&self.syntax.open);
        f(self.out);
        self.out.push_str(&self.syntax.close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_parse() {
        let path = Path::parse("foo.bar.0").unwrap();
        assert_eq!(
            path.segments(),
            [
                Segment::Key("foo".into()),
                Segment::Key("bar".into()),
                Segment::Index(0)
            ]
        );
        assert_eq!(Path::parse("@").unwrap().segments(), [Segment::Current]);
        assert_eq!(Path::parse("@index").unwrap().segments(), [Segment::Index1]);
        assert_eq!(Path::parse("@index0").unwrap().segments(), [Segment::Index0]);
        assert_eq!(
            Path::parse("@.title").unwrap().segments(),
            [Segment::Current, Segment::Key("title".into())]
        );
        assert_eq!(
            Path::parse("base-url").unwrap().segments(),
            [Segment::Key("base-url".into())]
        );
    }

    #[test]
    fn path_parse_invalid() {
        for raw in ["", ".", "foo.", ".foo", "foo..bar", "foo.@", "a b", "foo|bar", "#x"] {
            assert!(Path::parse(raw).is_none(), "{raw:?} should be invalid");
        }
    }

    #[test]
    fn path_display() {
        for raw in ["@", "@index", "@index0", "a.b.12", "@.x"] {
            assert_eq!(Path::parse(raw).unwrap().to_string(), raw);
        }
    }

    #[test]
    fn repr_custom_syntax() {
        let tree = Tree {
            root: vec![
                Instr::Literal(Literal::MetaLeft),
                Instr::Variable(Variable {
                    path: Path::parse("a").unwrap(),
                    pipeline: vec![Call {
                        name: "html".into(),
                        args: Arguments::empty(),
                    }],
                }),
            ],
        };
        let syntax = Syntax::builder().delimiters("<%", "%>").build();
        assert_eq!(tree.repr_with(&syntax), "<%.meta-left%><%a|html%>");
        assert_eq!(tree.repr(), "{.meta-left}{a|html}");
    }
}
