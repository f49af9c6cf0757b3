use jsont::tree::{Instr, Segment};
use jsont::{Engine, ErrorKind, Syntax};

#[test]
fn compile_empty() {
    let engine = Engine::new();
    let template = engine.compile("").unwrap();
    assert!(template.tree().instructions().is_empty());
    assert_eq!(template.repr(), "");
}

#[test]
fn compile_text_only() {
    let engine = Engine::new();
    let template = engine.compile("lorem ipsum").unwrap();
    assert_eq!(
        template.tree().instructions(),
        [Instr::Text("lorem ipsum".into())]
    );
}

#[test]
fn compile_repr_round_trip() {
    let engine = Engine::new();
    for source in [
        "{.plural?}A{.or singular?}B{.or}C{.end}",
        "{.section foo}{bar|html}{.or}none{.end}",
        "{.repeated section items}{@}{.alternates with}, {.or}empty{.end}",
        "{.if a || b.c}x{.end}",
        "{title|truncate 10 ...|htmlattr}",
        "{.plural? count}many{.end}",
        "{.meta-left}{.space}{.tab}{.newline}{.meta-right}",
        "{msg|format name site.url}",
    ] {
        let template = engine.compile(source).unwrap();
        assert_eq!(template.repr(), source);
        let repr = template.repr();
        let again = engine.compile(&repr).unwrap();
        assert_eq!(again.tree(), template.tree());
    }
}

#[test]
fn compile_repr_normalizes() {
    let engine = Engine::new();
    let template = engine
        .compile("{# note}{.section   foo }x{.end}{.if a  &&  b}y{.end}")
        .unwrap();
    assert_eq!(template.repr(), "{.section foo}x{.end}{.if a && b}y{.end}");
}

#[test]
fn compile_repr_custom_syntax() {
    let syntax = Syntax::builder().delimiters("[[", "]]").build();
    let engine = Engine::with_syntax(syntax);
    let source = "[[.section a]][[b|html]][[.end]]";
    let template = engine.compile(source).unwrap();
    assert_eq!(template.repr(), source);
}

#[test]
fn compile_variable_path() {
    let engine = Engine::new();
    let template = engine.compile("{a.b.2}").unwrap();
    match template.tree().instructions() {
        [Instr::Variable(var)] => {
            assert_eq!(
                var.path.segments(),
                [
                    Segment::Key("a".into()),
                    Segment::Key("b".into()),
                    Segment::Index(2)
                ]
            );
        }
        instrs => panic!("unexpected instructions {instrs:?}"),
    }
}

#[test]
fn compile_is_deterministic() {
    let engine = Engine::new();
    let source = "{.repeated section xs}{@|html}{.alternates with},{.or}-{.end}";
    let a = engine.compile(source).unwrap();
    let b = engine.compile(source).unwrap();
    assert_eq!(a.tree(), b.tree());
}

#[test]
fn compile_err_unclosed_blocks() {
    let engine = Engine::new();
    for (source, msg) in [
        ("{.section a}", "unclosed `.section` block between bytes 0 and 12"),
        (
            "x{.repeated section a}",
            "unclosed `.repeated section` block between bytes 1 and 22",
        ),
        ("{.plural?}{.or}", "unclosed `.plural?` block between bytes 0 and 10"),
        ("{.if a}", "unclosed `.if` block between bytes 0 and 7"),
    ] {
        let err = engine.compile(source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax, "source: {source}");
        assert_eq!(err.to_string(), msg);
    }
}

#[test]
fn compile_err_unclosed_tag() {
    let err = Engine::new().compile("lorem {ipsum").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lex);
    assert_eq!(err.to_string(), "unclosed instruction between bytes 6 and 7");
}

#[test]
fn compile_err_unclosed_comment() {
    let err = Engine::new().compile("{## lorem").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lex);
    assert_eq!(err.to_string(), "unclosed comment between bytes 0 and 3");
}

#[test]
fn compile_err_misplaced_clauses() {
    let engine = Engine::new();
    for source in [
        "{.end}",
        "{.or}",
        "{.alternates with}",
        "{.section a}{.alternates with}{.end}",
        "{.section a}{.or}{.or}{.end}",
        "{.repeated section a}{.or}{.alternates with}{.end}",
    ] {
        let err = engine.compile(source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax, "source: {source}");
    }
}

#[test]
fn compile_err_unknown_formatter() {
    let err = Engine::new().compile("{foo|shout}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownPlugin);
    assert_eq!(err.plugin_name(), Some("shout"));
    assert_eq!(err.to_string(), "unknown plugin `shout` between bytes 5 and 10");
}

#[test]
fn compile_err_unknown_predicate() {
    let err = Engine::new().compile("{.or-else?}x{.end}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownPlugin);
    assert_eq!(err.plugin_name(), Some("or-else?"));
}

#[test]
fn compile_err_unknown_instruction() {
    let err = Engine::new().compile("{.sektion a}{.end}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(
        err.to_string(),
        "unknown instruction `.sektion` between bytes 0 and 12"
    );
}

#[test]
fn compile_err_predicate_as_formatter() {
    let err = Engine::new().compile("{a|plural?}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
}

#[test]
fn compile_err_arguments() {
    let engine = Engine::new();

    let err = engine.compile("{x|truncate abc}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Arguments);
    assert_eq!(err.plugin_name(), Some("truncate"));
    assert_eq!(
        err.to_string(),
        "expected a length, found `abc` between bytes 0 and 16"
    );

    let err = engine.compile("{x|truncate}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Arguments);
    assert_eq!(
        err.to_string(),
        "expected at least 1 argument, found 0 between bytes 0 and 12"
    );

    let err = engine.compile("{.plural? a b}x{.end}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Arguments);
    assert_eq!(err.plugin_name(), Some("plural?"));
}

#[test]
fn compile_err_pretty() {
    let err = Engine::new()
        .compile("lorem\n{.section ipsum}\ndolor")
        .unwrap_err();
    assert_eq!(
        format!("{err:#}"),
        "
   |
 2 | {.section ipsum}
   | ^^^^^^^^^^^^^^^^ unclosed `.section` block
"
    );
}

#[test]
fn compile_err_deeply_nested() {
    let n = 100_000;
    let source = "{.section a}".repeat(n) + &"{.end}".repeat(n);
    let err = Engine::new().compile(&source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(err
        .to_string()
        .starts_with("exceeded maximum nesting depth of 256 "));
}

#[test]
fn compile_nested_within_limit() {
    let source = "{.section a}".repeat(200) + "x" + &"{.end}".repeat(200);
    let engine = Engine::new();
    let template = engine.compile(&source).unwrap();
    assert_eq!(template.repr(), source);
}

#[test]
fn compile_predicate_trailing_whitespace() {
    let engine = Engine::new();
    let template = engine.compile("{.plural? n }A{.or singular? n }B{.end}").unwrap();
    assert_eq!(template.repr(), "{.plural? n}A{.or singular? n}B{.end}");
    let result = template
        .render(serde_json::json!({ "n": 2 }))
        .to_string()
        .unwrap();
    assert_eq!(result, "A");
}
