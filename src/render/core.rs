use std::fmt::Write;

use log::trace;

use crate::render::context::{Context, Locale, Variable as Var};
use crate::render::fmt::Output;
use crate::render::frame::Frame;
use crate::types::tree::{
    Alternative, Call, IfBlock, Instr, Literal, Operator, PredicateBlock, Repeated, Section,
    Variable,
};
use crate::value::{self, Value};
use crate::{Engine, Error, Result};

/// Walks an instruction tree, writing the output as it goes.
///
/// The executor itself holds no per-render state besides configuration, the
/// scope chain is made of [`Frame`]s on the Rust stack.
#[derive(Clone, Copy)]
pub struct Executor<'a> {
    pub engine: &'a Engine<'a>,
    pub locale: &'a Locale,
    pub max_depth: usize,
}

impl<'a> Executor<'a> {
    pub fn block(
        &self,
        out: &mut Output<'_>,
        block: &[Instr],
        frame: &Frame<'_>,
        depth: usize,
    ) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::max_depth(self.max_depth));
        }
        for instr in block {
            self.instr(out, instr, frame, depth)?;
        }
        Ok(())
    }

    fn instr(
        &self,
        out: &mut Output<'_>,
        instr: &Instr,
        frame: &Frame<'_>,
        depth: usize,
    ) -> Result<()> {
        match instr {
            Instr::Text(text) => out.write_str(text)?,

            Instr::Literal(lit) => {
                let syntax = &self.engine.syntax;
                match lit {
                    Literal::MetaLeft => out.write_str(syntax.open())?,
                    Literal::MetaRight => out.write_str(syntax.close())?,
                    Literal::Space => out.write_char(' ')?,
                    Literal::Tab => out.write_char('\t')?,
                    Literal::Newline => out.write_char('\n')?,
                }
            }

            Instr::Variable(var) => self.variable(out, var, frame, depth)?,

            Instr::Section(Section { path, body, or }) => {
                let node = frame.resolve(path);
                match node.as_deref() {
                    Some(node) if value::is_truthy(Some(node)) => {
                        let frame = Frame::nested(frame, node);
                        self.block(out, body, &frame, depth + 1)?;
                    }
                    // the alternatives run in the current scope
                    _ => self.alternatives(out, or, frame, depth)?,
                }
            }

            Instr::Repeated(Repeated {
                path,
                body,
                alternates_with,
                or,
            }) => {
                let node = frame.resolve(path);
                match node.as_deref() {
                    Some(Value::Array(items)) if !items.is_empty() => {
                        for (i, item) in items.iter().enumerate() {
                            match alternates_with {
                                Some(sep) if i > 0 => self.block(out, sep, frame, depth + 1)?,
                                _ => {}
                            }
                            let frame = Frame::item(frame, item, i);
                            self.block(out, body, &frame, depth + 1)?;
                        }
                    }
                    _ => self.alternatives(out, or, frame, depth)?,
                }
            }

            Instr::Predicate(PredicateBlock {
                predicate,
                body,
                or,
            }) => {
                if self.test(predicate, frame, depth)? {
                    self.block(out, body, frame, depth + 1)?;
                } else {
                    self.alternatives(out, or, frame, depth)?;
                }
            }

            Instr::If(IfBlock {
                op,
                paths,
                body,
                or,
            }) => {
                let mut truthy = paths
                    .iter()
                    .map(|path| value::is_truthy(frame.resolve(path).as_deref()));
                let pass = match op {
                    Operator::Or => truthy.any(|t| t),
                    Operator::And => truthy.all(|t| t),
                };
                if pass {
                    self.block(out, body, frame, depth + 1)?;
                } else {
                    self.alternatives(out, or, frame, depth)?;
                }
            }
        }
        Ok(())
    }

    fn variable(
        &self,
        out: &mut Output<'_>,
        Variable { path, pipeline }: &Variable,
        frame: &Frame<'_>,
        depth: usize,
    ) -> Result<()> {
        // Missing values are never passed to a formatter.
        let mut var = match frame.resolve(path) {
            Some(value) => Var::new(value),
            None => return Ok(()),
        };

        if !pipeline.is_empty() {
            let ctx = self.context(frame, depth);
            for Call { name, args } in pipeline {
                let formatter = self
                    .engine
                    .registry
                    .formatter(name)
                    .ok_or_else(|| Error::render(format!("unknown formatter `{name}`")))?;
                formatter.apply(&ctx, args, &mut var).map_err(|err| {
                    trace!("formatter `{name}` failed: {err}");
                    Error::execution(name, err)
                })?;
                if var.is_missing() {
                    return Ok(());
                }
            }
        }

        if let Some(value) = var.value() {
            out.write_str(&value::as_text(value))?;
        }
        Ok(())
    }

    /// Runs the body of the first alternative that passes.
    fn alternatives(
        &self,
        out: &mut Output<'_>,
        or: &[Alternative],
        frame: &Frame<'_>,
        depth: usize,
    ) -> Result<()> {
        for Alternative { predicate, body } in or {
            let pass = match predicate {
                Some(call) => self.test(call, frame, depth)?,
                None => true,
            };
            if pass {
                return self.block(out, body, frame, depth + 1);
            }
        }
        Ok(())
    }

    fn test(&self, Call { name, args }: &Call, frame: &Frame<'_>, depth: usize) -> Result<bool> {
        let predicate = self
            .engine
            .registry
            .predicate(name)
            .ok_or_else(|| Error::render(format!("unknown predicate `{name}`")))?;
        predicate
            .test(&self.context(frame, depth), args)
            .map_err(|err| {
                trace!("predicate `{name}` failed: {err}");
                Error::execution(name, err)
            })
    }

    fn context<'c>(&self, frame: &'c Frame<'c>, depth: usize) -> Context<'c>
    where
        'a: 'c,
    {
        Context {
            exec: *self,
            frame,
            depth,
        }
    }
}
