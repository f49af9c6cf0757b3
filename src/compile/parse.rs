use std::mem;

use crate::compile::lex::{Lexer, Token};
use crate::plugin::{Arguments, Plugin};
use crate::types::span::Span;
use crate::types::tree::{
    self, Alternative, Block, Call, IfBlock, Instr, Literal, Operator, Path, PredicateBlock,
    Repeated, Section, Tree, Variable,
};
use crate::{Engine, Error, Result};

/// The maximum number of blocks that may be open at once.
///
/// The compiled tree is nested, so it is dropped, compared and printed
/// recursively.
const MAX_NESTING: usize = 256;

/// A parser that constructs an instruction tree from a token stream.
///
/// The parser is implemented as a simple hand written parser with no
/// recursion. Open blocks are kept on a stack and each one collects the
/// instructions of the clause it is currently in.
pub struct Parser<'a> {
    engine: &'a Engine<'a>,

    /// A lexer that tokenizes the template source.
    tokens: Lexer<'a>,
}

/// Stores the state of an open block during parsing.
struct State {
    /// The instruction that opened the block.
    open: Open,
    /// The span of the opening tag.
    span: Span,
    /// Which clause of the block is being collected.
    clause: Clause,
    /// The instructions collected for the current clause.
    scope: Block,

    body: Block,
    alternates_with: Option<Block>,
    or: Vec<Alternative>,
}

enum Open {
    Section(Path),
    Repeated(Path),
    Predicate(Call),
    If(Operator, Vec<Path>),
}

enum Clause {
    Body,
    AlternatesWith,
    Or(Option<Call>),
}

/// A parsed instruction tag.
enum Parsed {
    /// The tag is not an instruction and is emitted as is.
    Text,
    Instr(Instr),
    Open(Open),
    AlternatesWith,
    Or(Option<Call>),
    End,
}

#[derive(Clone, Copy)]
enum Expect {
    Formatter,
    Predicate,
}

impl<'a> Parser<'a> {
    /// Construct a new parser.
    pub fn new(engine: &'a Engine<'a>, source: &'a str) -> Self {
        Self {
            engine,
            tokens: Lexer::new(&engine.syntax, source),
        }
    }

    /// Parses a template.
    pub fn parse_template(mut self) -> Result<Tree> {
        let mut blocks: Vec<State> = Vec::new();
        let mut root = Block::new();

        while let Some((tk, span)) = self.tokens.next()? {
            let parsed = match tk {
                Token::Text => Parsed::Text,
                Token::Comment => continue,
                Token::Instruction => self.parse_instr(span)?,
            };

            match parsed {
                Parsed::Text => {
                    push_text(current(&mut blocks, &mut root), &self.source()[span]);
                }

                Parsed::Instr(instr) => {
                    current(&mut blocks, &mut root).push(instr);
                }

                // The start of a block, e.g. `{.section foo}` or `{.plural?}`.
                Parsed::Open(open) => {
                    if blocks.len() >= MAX_NESTING {
                        return Err(Error::syntax(
                            format!("exceeded maximum nesting depth of {MAX_NESTING}"),
                            self.source(),
                            span,
                        ));
                    }
                    blocks.push(State::new(open, span));
                }

                // The separator of a repeated section. It must come before
                // any `.or` clause.
                Parsed::AlternatesWith => {
                    let state = blocks
                        .last_mut()
                        .filter(|state| {
                            matches!((&state.open, &state.clause), (Open::Repeated(_), Clause::Body))
                        })
                        .ok_or_else(|| {
                            Error::syntax("unexpected `.alternates with`", self.source(), span)
                        })?;
                    state.next_clause(Clause::AlternatesWith);
                }

                // An alternative branch. Nothing may follow an unconditional
                // `.or` except for the closing `.end`.
                Parsed::Or(predicate) => {
                    let state = blocks
                        .last_mut()
                        .ok_or_else(|| Error::syntax("unexpected `.or`", self.source(), span))?;
                    if let Clause::Or(None) = state.clause {
                        return Err(Error::syntax(
                            "unexpected `.or` after unconditional `.or`",
                            self.source(),
                            span,
                        ));
                    }
                    state.next_clause(Clause::Or(predicate));
                }

                Parsed::End => {
                    let state = blocks
                        .pop()
                        .ok_or_else(|| Error::syntax("unexpected `.end`", self.source(), span))?;
                    let instr = state.finish();
                    current(&mut blocks, &mut root).push(instr);
                }
            }
        }

        if let Some(state) = blocks.last() {
            let msg = format!("unclosed `{}` block", state.open.human());
            return Err(Error::syntax(msg, self.source(), state.span));
        }

        Ok(Tree { root })
    }

    fn parse_instr(&self, span: Span) -> Result<Parsed> {
        let inner = self.tokens.inner(span);
        let body = &self.source()[inner];

        if body.is_empty() || body.starts_with(char::is_whitespace) {
            return Ok(Parsed::Text);
        }

        match body.strip_prefix('.') {
            Some(kw) => self.parse_keyword(kw, inner.m + 1, span),
            None => self.parse_variable(body, inner.m, span),
        }
    }

    /// Parses a dot instruction, e.g. `.section foo` or `.or singular?`.
    fn parse_keyword(&self, kw: &str, at: usize, span: Span) -> Result<Parsed> {
        let (word, rest) = match kw.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest),
            None => (kw, ""),
        };
        let trimmed = rest.trim_start();
        let rest_at = at + kw.len() - trimmed.len();
        let rest = trimmed.trim_end();

        let unexpected_args = || {
            Error::syntax(
                format!("unexpected arguments to `.{word}`"),
                self.source(),
                span,
            )
        };

        let literal = |lit| match rest.is_empty() {
            true => Ok(Parsed::Instr(Instr::Literal(lit))),
            false => Err(unexpected_args()),
        };

        match word {
            "section" => {
                let path = self.parse_path(rest, span)?;
                Ok(Parsed::Open(Open::Section(path)))
            }

            "repeated" => match rest.split_once(char::is_whitespace) {
                Some(("section", path)) => {
                    let path = self.parse_path(path.trim_start(), span)?;
                    Ok(Parsed::Open(Open::Repeated(path)))
                }
                _ => Err(Error::syntax(
                    "expected `.repeated section <path>`",
                    self.source(),
                    span,
                )),
            },

            "alternates" if rest == "with" => Ok(Parsed::AlternatesWith),
            "alternates" => Err(Error::syntax(
                "expected `.alternates with`",
                self.source(),
                span,
            )),

            "end" if rest.is_empty() => Ok(Parsed::End),
            "end" => Err(unexpected_args()),

            "or" if rest.is_empty() => Ok(Parsed::Or(None)),
            "or" => {
                let call = self.parse_call(rest, rest_at, Expect::Predicate, span)?;
                Ok(Parsed::Or(Some(call)))
            }

            "if" => self.parse_if(rest, span),

            "meta-left" => literal(Literal::MetaLeft),
            "meta-right" => literal(Literal::MetaRight),
            "space" => literal(Literal::Space),
            "tab" => literal(Literal::Tab),
            "newline" => literal(Literal::Newline),

            _ => {
                let name = plugin_name(kw);
                if name.ends_with('?') || self.engine.registry.get(name).is_some() {
                    let call = self.parse_call(kw.trim_end(), at, Expect::Predicate, span)?;
                    Ok(Parsed::Open(Open::Predicate(call)))
                } else {
                    Err(Error::syntax(
                        format!("unknown instruction `.{word}`"),
                        self.source(),
                        span,
                    ))
                }
            }
        }
    }

    /// Parses an `.if` condition, e.g. `a || b.c`.
    fn parse_if(&self, rest: &str, span: Span) -> Result<Parsed> {
        let mut words = rest.split_whitespace();
        let mut op = None;
        let mut paths = vec![self.parse_path(words.next().unwrap_or_default(), span)?];

        while let Some(symbol) = words.next() {
            let this = match symbol {
                "||" => Operator::Or,
                "&&" => Operator::And,
                _ => {
                    return Err(Error::syntax(
                        format!("expected `||` or `&&`, found `{symbol}`"),
                        self.source(),
                        span,
                    ))
                }
            };
            if op.map_or(false, |op| op != this) {
                return Err(Error::syntax(
                    "`||` and `&&` cannot be mixed",
                    self.source(),
                    span,
                ));
            }
            op = Some(this);
            paths.push(self.parse_path(words.next().unwrap_or_default(), span)?);
        }

        Ok(Parsed::Open(Open::If(op.unwrap_or(Operator::Or), paths)))
    }

    /// Parses a variable with an optional pipeline, e.g. `foo.bar|html`.
    ///
    /// Returns [`Parsed::Text`] if the body is not a variable at all, so that
    /// braces in inline scripts and styles survive.
    fn parse_variable(&self, body: &str, at: usize, span: Span) -> Result<Parsed> {
        let mut parts = body.split('|');
        let head = parts.next().unwrap_or_default();
        let path = match Path::parse(head) {
            Some(path) => path,
            None => return Ok(Parsed::Text),
        };

        let mut pipeline = Vec::new();
        let mut offset = at + head.len() + 1;
        for part in parts {
            pipeline.push(self.parse_call(part.trim_end(), offset, Expect::Formatter, span)?);
            offset += part.len() + 1;
        }

        Ok(Parsed::Instr(Instr::Variable(Variable { path, pipeline })))
    }

    /// Parses a plugin reference and validates its arguments.
    fn parse_call(&self, raw: &str, at: usize, expect: Expect, span: Span) -> Result<Call> {
        let name = plugin_name(raw);
        if name.is_empty() {
            return Err(Error::syntax(
                format!("expected {} name", expect.human()),
                self.source(),
                span,
            ));
        }
        let name_span = Span::from(at..at + name.len());

        let plugin = self
            .engine
            .registry
            .get(name)
            .ok_or_else(|| Error::unknown_plugin(name, self.source(), name_span))?;

        match (expect, plugin) {
            (Expect::Formatter, Plugin::Formatter(_)) | (Expect::Predicate, Plugin::Predicate(_)) => {}
            _ => {
                return Err(Error::syntax(
                    format!("expected {}, found {} `{name}`", expect.human(), plugin.human()),
                    self.source(),
                    name_span,
                ))
            }
        }

        let mut args = Arguments::parse(&raw[name.len()..]);
        plugin.validate_args(&mut args).map_err(|err| {
            err.into_arguments()
                .enrich(self.source(), span)
                .with_plugin(name)
        })?;

        Ok(Call {
            name: name.to_owned(),
            args,
        })
    }

    fn parse_path(&self, raw: &str, span: Span) -> Result<Path> {
        Path::parse(raw).ok_or_else(|| {
            let msg = match raw.is_empty() {
                true => "expected a path".to_owned(),
                false => format!("expected a path, found `{raw}`"),
            };
            Error::syntax(msg, self.source(), span)
        })
    }

    #[inline]
    fn source(&self) -> &'a str {
        self.tokens.source
    }
}

impl State {
    fn new(open: Open, span: Span) -> Self {
        Self {
            open,
            span,
            clause: Clause::Body,
            scope: Block::new(),
            body: Block::new(),
            alternates_with: None,
            or: Vec::new(),
        }
    }

    /// Finishes the current clause and starts collecting the next one.
    fn next_clause(&mut self, next: Clause) {
        let scope = mem::take(&mut self.scope);
        let clause = mem::replace(&mut self.clause, next);
        self.store(clause, scope);
    }

    fn store(&mut self, clause: Clause, scope: Block) {
        match clause {
            Clause::Body => self.body = scope,
            Clause::AlternatesWith => self.alternates_with = Some(scope),
            Clause::Or(predicate) => self.or.push(Alternative {
                predicate,
                body: scope,
            }),
        }
    }

    fn finish(mut self) -> Instr {
        self.next_clause(Clause::Body);
        let State {
            open,
            body,
            alternates_with,
            or,
            ..
        } = self;
        match open {
            Open::Section(path) => Instr::Section(Section { path, body, or }),
            Open::Repeated(path) => Instr::Repeated(Repeated {
                path,
                body,
                alternates_with,
                or,
            }),
            Open::Predicate(predicate) => Instr::Predicate(PredicateBlock {
                predicate,
                body,
                or,
            }),
            Open::If(op, paths) => Instr::If(IfBlock {
                op,
                paths,
                body,
                or,
            }),
        }
    }
}

impl Open {
    fn human(&self) -> String {
        match self {
            Self::Section(_) => ".section".to_owned(),
            Self::Repeated(_) => ".repeated section".to_owned(),
            Self::Predicate(call) => format!(".{}", call.name),
            Self::If(..) => ".if".to_owned(),
        }
    }
}

impl Expect {
    fn human(self) -> &'static str {
        match self {
            Self::Formatter => "formatter",
            Self::Predicate => "predicate",
        }
    }
}

/// Returns the instructions of the innermost open clause.
fn current<'s>(blocks: &'s mut [State], root: &'s mut Block) -> &'s mut Block {
    match blocks.last_mut() {
        Some(state) => &mut state.scope,
        None => root,
    }
}

/// Appends text, merging it with a directly preceding text node.
fn push_text(scope: &mut Block, text: &str) {
    match scope.last_mut() {
        Some(Instr::Text(prev)) => prev.push_str(text),
        _ => scope.push(Instr::Text(text.to_owned())),
    }
}

/// Returns the plugin name at the start of `raw`, including a trailing `?`.
fn plugin_name(raw: &str) -> &str {
    let n = raw.find(|c| !tree::is_name(c)).unwrap_or(raw.len());
    match raw[n..].starts_with('?') {
        true => &raw[..n + 1],
        false => &raw[..n],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Context;
    use crate::types::tree::Segment;
    use crate::{ErrorKind, Predicate};

    struct Always(&'static str);

    impl Predicate for Always {
        fn name(&self) -> &str {
            self.0
        }

        fn test(&self, _: &Context<'_>, _: &Arguments) -> Result<bool> {
            Ok(true)
        }
    }

    fn engine() -> Engine<'static> {
        let mut engine = Engine::empty();
        engine.add_predicate(Always("plural?")).unwrap();
        engine.add_predicate(Always("singular?")).unwrap();
        engine.add_predicate(Always("custom")).unwrap();
        engine
            .add_formatter_fn("html", |v, _| Ok(v.clone()))
            .unwrap();
        engine
    }

    #[track_caller]
    fn parse(source: &str) -> Result<Tree> {
        Parser::new(&engine(), source).parse_template()
    }

    #[test]
    fn parse_text_is_merged() {
        let tree = parse("a{# comment}b{ c }d").unwrap();
        assert_eq!(tree.instructions(), [Instr::Text("ab{ c }d".into())]);
    }

    #[test]
    fn parse_variable_with_pipeline() {
        let tree = parse("{foo.bar|html}").unwrap();
        match tree.instructions() {
            [Instr::Variable(Variable { path, pipeline })] => {
                assert_eq!(
                    path.segments(),
                    [Segment::Key("foo".into()), Segment::Key("bar".into())]
                );
                assert_eq!(pipeline.len(), 1);
                assert_eq!(pipeline[0].name, "html");
                assert!(pipeline[0].args.is_empty());
            }
            instrs => panic!("unexpected instructions {instrs:?}"),
        }
    }

    #[test]
    fn parse_invalid_variable_is_text() {
        let tree = parse("{ x }{}{a b}{a.}").unwrap();
        assert_eq!(tree.instructions(), [Instr::Text("{ x }{}{a b}{a.}".into())]);
    }

    #[test]
    fn parse_predicate_chain() {
        let tree = parse("{.plural?}A{.or singular?}B{.or}C{.end}").unwrap();
        match tree.instructions() {
            [Instr::Predicate(PredicateBlock { predicate, body, or })] => {
                assert_eq!(predicate.name, "plural?");
                assert_eq!(body, &[Instr::Text("A".into())]);
                assert_eq!(or.len(), 2);
                assert_eq!(or[0].predicate.as_ref().unwrap().name, "singular?");
                assert!(or[1].predicate.is_none());
            }
            instrs => panic!("unexpected instructions {instrs:?}"),
        }
    }

    #[test]
    fn parse_registered_predicate_without_question_mark() {
        let tree = parse("{.custom}x{.end}").unwrap();
        assert!(matches!(tree.instructions(), [Instr::Predicate(_)]));
    }

    #[test]
    fn parse_repeated_alternates_with() {
        let tree = parse("{.repeated section xs}{@}{.alternates with}, {.or}none{.end}").unwrap();
        match tree.instructions() {
            [Instr::Repeated(Repeated {
                alternates_with: Some(sep),
                or,
                ..
            })] => {
                assert_eq!(sep, &[Instr::Text(", ".into())]);
                assert_eq!(or.len(), 1);
            }
            instrs => panic!("unexpected instructions {instrs:?}"),
        }
    }

    #[test]
    fn parse_literals() {
        let tree = parse("{.meta-left}{.space}{.tab}{.newline}{.meta-right}").unwrap();
        assert_eq!(tree.instructions().len(), 5);
        assert_eq!(tree.repr(), "{.meta-left}{.space}{.tab}{.newline}{.meta-right}");
    }

    #[test]
    fn parse_if() {
        let tree = parse("{.if a && b.c}x{.end}").unwrap();
        match tree.instructions() {
            [Instr::If(IfBlock { op, paths, .. })] => {
                assert_eq!(*op, Operator::And);
                assert_eq!(paths.len(), 2);
            }
            instrs => panic!("unexpected instructions {instrs:?}"),
        }
    }

    #[test]
    fn parse_err_mixed_operators() {
        let err = parse("{.if a || b && c}x{.end}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.to_string(), "`||` and `&&` cannot be mixed between bytes 0 and 17");
    }

    #[test]
    fn parse_err_unclosed_block() {
        let err = parse("lorem {.section foo} ipsum").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.to_string(), "unclosed `.section` block between bytes 6 and 20");
    }

    #[test]
    fn parse_err_unexpected_end() {
        let err = parse("{.end}").unwrap_err();
        assert_eq!(err.to_string(), "unexpected `.end` between bytes 0 and 6");
    }

    #[test]
    fn parse_err_or_outside_block() {
        let err = parse("a{.or}b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.to_string(), "unexpected `.or` between bytes 1 and 6");
    }

    #[test]
    fn parse_err_or_after_unconditional_or() {
        let err = parse("{.section a}{.or}{.or plural?}{.end}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn parse_err_alternates_with_outside_repeated() {
        let err = parse("{.section a}{.alternates with}{.end}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        let err = parse("{.repeated section a}{.or}{.alternates with}{.end}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn parse_err_unknown_plugin() {
        let err = parse("{foo|nope}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownPlugin);
        assert_eq!(err.plugin_name(), Some("nope"));
        assert_eq!(err.to_string(), "unknown plugin `nope` between bytes 5 and 9");

        let err = parse("{.nope?}{.end}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownPlugin);
        assert_eq!(err.to_string(), "unknown plugin `nope?` between bytes 2 and 7");
    }

    #[test]
    fn parse_err_unknown_instruction() {
        let err = parse("{.foo}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.to_string(), "unknown instruction `.foo` between bytes 0 and 6");
    }

    #[test]
    fn parse_err_wrong_plugin_kind() {
        let err = parse("{a|plural?}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(
            err.to_string(),
            "expected formatter, found predicate `plural?` between bytes 3 and 10"
        );
    }

    #[test]
    fn parse_predicate_trailing_whitespace() {
        let tree = parse("{.plural? n }A{.end}").unwrap();
        match tree.instructions() {
            [Instr::Predicate(PredicateBlock { predicate, .. })] => {
                assert_eq!(predicate.args.iter().collect::<Vec<_>>(), ["n"]);
            }
            instrs => panic!("unexpected instructions {instrs:?}"),
        }
    }

    #[test]
    fn parse_nesting_limit() {
        let ok = "{.section a}".repeat(MAX_NESTING) + &"{.end}".repeat(MAX_NESTING);
        parse(&ok).unwrap();

        let n = MAX_NESTING + 1;
        let err = parse(&("{.section a}".repeat(n) + &"{.end}".repeat(n))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        let m = MAX_NESTING * 12;
        assert_eq!(
            err.to_string(),
            format!(
                "exceeded maximum nesting depth of {MAX_NESTING} between bytes {m} and {}",
                m + 12
            )
        );
    }

    #[test]
    fn parse_err_section_without_path() {
        let err = parse("{.section}{.end}").unwrap_err();
        assert_eq!(err.to_string(), "expected a path between bytes 0 and 10");
    }
}
