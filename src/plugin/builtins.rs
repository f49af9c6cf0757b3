//! Builtin formatters and predicates.

use std::borrow::Cow;

use crate::plugin::{Arguments, Formatter, Plugin, Predicate, Registrar};
use crate::render::{Context, Variable};
use crate::types::tree::Path;
use crate::value::{self, Value};
use crate::{Engine, Error, Result};

/// Registers the builtin plugins.
///
/// [`Engine::new`] already does this when the `builtins` feature is enabled,
/// this is for engines created with [`Engine::empty`].
///
/// Formatters:
/// - `html`: escapes `&`, `<` and `>`.
/// - `htmlattr`: like `html` but also escapes `"`.
/// - `json`: the value as JSON.
/// - `capitalize`: the value in upper case.
/// - `truncate N [ellipsis]`: at most `N` characters, followed by `...` or
///   the given ellipsis if anything was cut.
/// - `pluralize [singular] [plural]`: `singular` if the value is 1, else
///   `plural`. Defaults to `""` and `"s"`, a single argument sets the plural.
/// - `count`: the length of an array or object, else 0.
/// - `format arg...`: replaces `{0}`, `{1}`, ... in the value with the
///   arguments, which are paths resolved in the enclosing scope.
///
/// Predicates:
/// - `plural? [path]`: the number is greater than 1.
/// - `singular? [path]`: the number is 1.
/// - `even? [path]`, `odd? [path]`
/// - `equal? a [b]`: compares two operands, or one operand with the current
///   node. Operands are JSON literals such as `"x"` or `3`, or paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct Builtins;

impl Registrar for Builtins {
    fn register(&self, engine: &mut Engine<'_>) -> Result<()> {
        for plugin in plugins() {
            engine.add_plugin(plugin)?;
        }
        Ok(())
    }
}

pub(crate) fn plugins() -> impl Iterator<Item = Plugin> {
    let formatters: [Box<dyn Formatter>; 8] = [
        Box::new(Html { attr: false }),
        Box::new(Html { attr: true }),
        Box::new(Json),
        Box::new(Capitalize),
        Box::new(Truncate),
        Box::new(Pluralize),
        Box::new(Count),
        Box::new(Format),
    ];
    let predicates: [Box<dyn Predicate>; 5] = [
        Box::new(Number {
            name: "plural?",
            test: |n| n > 1.0,
        }),
        Box::new(Number {
            name: "singular?",
            test: |n| n == 1.0,
        }),
        Box::new(Number {
            name: "even?",
            test: |n| n.fract() == 0.0 && (n as i64) % 2 == 0,
        }),
        Box::new(Number {
            name: "odd?",
            test: |n| n.fract() == 0.0 && (n as i64) % 2 != 0,
        }),
        Box::new(Equal),
    ];
    formatters
        .into_iter()
        .map(Plugin::Formatter)
        .chain(predicates.into_iter().map(Plugin::Predicate))
}

////////////////////////////////////////////////////////////////////////////////
// Formatters
////////////////////////////////////////////////////////////////////////////////

struct Html {
    attr: bool,
}

impl Formatter for Html {
    fn name(&self) -> &str {
        match self.attr {
            true => "htmlattr",
            false => "html",
        }
    }

    fn apply(&self, _: &Context<'_>, _: &Arguments, var: &mut Variable<'_>) -> Result<()> {
        let escaped = escape_html(&var.text(), self.attr);
        var.set(escaped);
        Ok(())
    }
}

fn escape_html(s: &str, attr: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

struct Json;

impl Formatter for Json {
    fn name(&self) -> &str {
        "json"
    }

    fn apply(&self, _: &Context<'_>, _: &Arguments, var: &mut Variable<'_>) -> Result<()> {
        let json = serde_json::to_string(var.node())?;
        var.set(json);
        Ok(())
    }
}

struct Capitalize;

impl Formatter for Capitalize {
    fn name(&self) -> &str {
        "capitalize"
    }

    fn apply(&self, _: &Context<'_>, _: &Arguments, var: &mut Variable<'_>) -> Result<()> {
        let upper = var.text().to_uppercase();
        var.set(upper);
        Ok(())
    }
}

struct Truncate;

struct TruncateArgs {
    max: usize,
    ellipsis: String,
}

impl Formatter for Truncate {
    fn name(&self) -> &str {
        "truncate"
    }

    fn validate_args(&self, args: &mut Arguments) -> Result<()> {
        args.between(1, 2)?;
        let raw = args.first().unwrap_or_default();
        let max = raw
            .parse()
            .map_err(|_| Error::arguments(format!("expected a length, found `{raw}`")))?;
        let ellipsis = args.get(1).unwrap_or("...").to_owned();
        args.set_opaque(TruncateArgs { max, ellipsis });
        Ok(())
    }

    fn apply(&self, _: &Context<'_>, args: &Arguments, var: &mut Variable<'_>) -> Result<()> {
        let TruncateArgs { max, ellipsis } = opaque::<TruncateArgs>(args)?;
        let text = var.text();
        if text.chars().count() <= *max {
            return Ok(());
        }
        let mut cut: String = text.chars().take(*max).collect();
        cut.push_str(ellipsis);
        var.set(cut);
        Ok(())
    }
}

struct Pluralize;

impl Formatter for Pluralize {
    fn name(&self) -> &str {
        "pluralize"
    }

    fn validate_args(&self, args: &mut Arguments) -> Result<()> {
        args.at_most(2)
    }

    fn apply(&self, _: &Context<'_>, args: &Arguments, var: &mut Variable<'_>) -> Result<()> {
        let (singular, plural) = match (args.get(0), args.get(1)) {
            (Some(singular), Some(plural)) => (singular, plural),
            (Some(plural), None) => ("", plural),
            _ => ("", "s"),
        };
        let word = match value::as_f64(var.node()) {
            Some(n) if n == 1.0 => singular,
            _ => plural,
        };
        var.set(word);
        Ok(())
    }
}

struct Count;

impl Formatter for Count {
    fn name(&self) -> &str {
        "count"
    }

    fn apply(&self, _: &Context<'_>, _: &Arguments, var: &mut Variable<'_>) -> Result<()> {
        let n = match var.node() {
            Value::Array(list) => list.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        };
        var.set(n);
        Ok(())
    }
}

struct Format;

impl Formatter for Format {
    fn name(&self) -> &str {
        "format"
    }

    fn validate_args(&self, args: &mut Arguments) -> Result<()> {
        let paths = args.iter().map(parse_path).collect::<Result<Vec<_>>>()?;
        args.set_opaque(paths);
        Ok(())
    }

    fn apply(&self, ctx: &Context<'_>, args: &Arguments, var: &mut Variable<'_>) -> Result<()> {
        let paths: &Vec<Path> = opaque(args)?;
        let message = var.node().clone();
        let text = value::as_text(&message);
        let formatted = ctx.scoped(&message, |ctx| {
            substitute(&text, |i| {
                let path = paths.get(i)?;
                let arg = ctx.resolve_message_arg(path);
                Some(arg.map(|v| value::as_text(&v).into_owned()).unwrap_or_default())
            })
        });
        var.set(formatted);
        Ok(())
    }
}

/// Replaces `{N}` placeholders in the message.
///
/// Placeholders that `arg` returns `None` for are kept as is.
fn substitute(message: &str, mut arg: impl FnMut(usize) -> Option<String>) -> String {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(i) = rest.find('{') {
        out.push_str(&rest[..i]);
        let after = &rest[i + 1..];
        let digits = after
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after.len());
        let index = match after[digits..].starts_with('}') {
            true => after[..digits].parse::<usize>().ok(),
            false => None,
        };
        match index {
            Some(n) => {
                match arg(n) {
                    Some(s) => out.push_str(&s),
                    None => out.push_str(&rest[i..i + digits + 2]),
                }
                rest = &after[digits + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

////////////////////////////////////////////////////////////////////////////////
// Predicates
////////////////////////////////////////////////////////////////////////////////

/// A predicate on the numeric value of the current node or an optional path.
struct Number {
    name: &'static str,
    test: fn(f64) -> bool,
}

impl Predicate for Number {
    fn name(&self) -> &str {
        self.name
    }

    fn validate_args(&self, args: &mut Arguments) -> Result<()> {
        args.at_most(1)?;
        if let Some(raw) = args.first() {
            let path = parse_path(raw)?;
            args.set_opaque(path);
        }
        Ok(())
    }

    fn test(&self, ctx: &Context<'_>, args: &Arguments) -> Result<bool> {
        let subject = match args.opaque::<Path>() {
            Some(path) => ctx.resolve(path),
            None => Some(Cow::Borrowed(ctx.node())),
        };
        Ok(subject
            .as_deref()
            .and_then(value::as_f64)
            .map_or(false, self.test))
    }
}

struct Equal;

enum Operand {
    Literal(Value),
    Path(Path),
}

impl Predicate for Equal {
    fn name(&self) -> &str {
        "equal?"
    }

    fn validate_args(&self, args: &mut Arguments) -> Result<()> {
        args.between(1, 2)?;
        let operands = args
            .iter()
            .map(|raw| match serde_json::from_str(raw) {
                Ok(literal) => Ok(Operand::Literal(literal)),
                Err(_) => parse_path(raw).map(Operand::Path),
            })
            .collect::<Result<Vec<_>>>()?;
        args.set_opaque(operands);
        Ok(())
    }

    fn test(&self, ctx: &Context<'_>, args: &Arguments) -> Result<bool> {
        let operands: &Vec<Operand> = opaque(args)?;
        let eval = |op: &Operand| match op {
            Operand::Literal(v) => Some(Cow::Owned(v.clone())),
            Operand::Path(path) => ctx.resolve(path),
        };
        let (lhs, rhs) = match operands.as_slice() {
            [rhs] => (Some(Cow::Borrowed(ctx.node())), eval(rhs)),
            [lhs, rhs] => (eval(lhs), eval(rhs)),
            _ => return Err(Error::arguments("expected one or two operands")),
        };
        Ok(match (lhs.as_deref(), rhs.as_deref()) {
            (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
            (Some(a), Some(b)) => a == b,
            _ => false,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////
// Helpers
////////////////////////////////////////////////////////////////////////////////

fn parse_path(raw: &str) -> Result<Path> {
    Path::parse(raw).ok_or_else(|| Error::arguments(format!("expected a path, found `{raw}`")))
}

fn opaque<T>(args: &Arguments) -> Result<&T>
where
    T: Send + Sync + 'static,
{
    args.opaque()
        .ok_or_else(|| Error::from("arguments were not validated"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape() {
        assert_eq!(
            escape_html("<a href=\"x\">&</a>", false),
            "&lt;a href=\"x\"&gt;&amp;&lt;/a&gt;"
        );
        assert_eq!(escape_html("\"", true), "&quot;");
    }

    #[test]
    fn substitute_placeholders() {
        let args = ["a".to_owned(), String::new()];
        let arg = |i: usize| args.get(i).cloned();
        assert_eq!(substitute("x{0}y{1}z", arg), "xayz");
        assert_eq!(substitute("{2} {0}", arg), "{2} a");
        assert_eq!(substitute("{ {x} {0", arg), "{ {x} {0");
        assert_eq!(substitute("{{0}}", arg), "{a}");
    }

    #[test]
    fn builtin_names_are_unique() {
        let names: std::collections::BTreeSet<_> =
            plugins().map(|p| p.name().to_owned()).collect();
        assert_eq!(names.len(), plugins().count());
    }
}
