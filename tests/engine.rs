use std::thread;

use jsont::{Engine, Locale};
use serde_json::json;

#[test]
fn engine_debug() {
    format!("{:?}", Engine::new());
}

#[test]
fn engine_send_and_sync() {
    let engine = Engine::new();
    thread::spawn(move || {
        let result = engine
            .compile("{lorem}")
            .unwrap()
            .render(json!({ "lorem": "ipsum" }))
            .to_string()
            .unwrap();
        assert_eq!(result, "ipsum");
    })
    .join()
    .unwrap();
}

#[test]
fn engine_shared_between_threads() {
    let mut engine = Engine::new();
    engine
        .add_template("greet", "Hello {name|capitalize}!")
        .unwrap();
    let names = ["ann", "bob", "cat", "dan"];
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = names
            .iter()
            .map(|name| {
                let engine = &engine;
                s.spawn(move || {
                    engine
                        .get_template("greet")
                        .unwrap()
                        .render(json!({ "name": name }))
                        .to_string()
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(
        results,
        ["Hello ANN!", "Hello BOB!", "Hello CAT!", "Hello DAN!"]
    );
}

#[test]
fn engine_compile_non_static_source() -> jsont::Result<()> {
    let engine = Engine::new();
    let source = String::from("{lorem}");
    let result = engine
        .compile(&source)?
        .render(json!({ "lorem": "ipsum" }))
        .to_string()?;
    assert_eq!(result, "ipsum");
    Ok(())
}

#[test]
fn engine_add_template_non_static_source() -> jsont::Result<()> {
    let mut engine = Engine::new();
    let source = String::from("{lorem}");
    engine.add_template("test", &source)?;
    let result = engine
        .get_template("test")
        .unwrap()
        .render(json!({ "lorem": "ipsum" }))
        .to_string()?;
    assert_eq!(result, "ipsum");
    Ok(())
}

#[test]
fn engine_add_template_owned_source() -> jsont::Result<()> {
    let mut engine = Engine::new();
    engine.add_template(String::from("test"), String::from("{.section a}{b}{.end}"))?;
    let template = engine.get_template("test").unwrap();
    assert_eq!(template.source(), "{.section a}{b}{.end}");
    assert_eq!(template.repr(), "{.section a}{b}{.end}");
    let data = json!({ "a": { "b": 1 } });
    assert_eq!(template.render_from(&data).to_string()?, "1");
    Ok(())
}

#[test]
fn engine_add_template_err() {
    let mut engine = Engine::new();
    let err = engine.add_template("test", "{.section a}").unwrap_err();
    assert_eq!(err.kind(), jsont::ErrorKind::Syntax);
    assert!(engine.get_template("test").is_none());
}

#[test]
fn engine_get_template_missing() {
    let engine = Engine::new();
    assert!(engine.get_template("nope").is_none());
}

#[test]
fn engine_default_locale() {
    let mut engine = Engine::new();
    engine.set_default_locale(Locale::new("fr-FR"));
    engine
        .add_predicate_fn("french?", |ctx, _| Ok(ctx.locale().as_str() == "fr-FR"))
        .unwrap();
    let result = engine
        .compile("{.french?}Bonjour{.or}Hello{.end}")
        .unwrap()
        .render(json!({}))
        .to_string()
        .unwrap();
    assert_eq!(result, "Bonjour");
}

#[test]
fn engine_max_depth() {
    let mut engine = Engine::new();
    engine.set_max_depth(1);
    let template = engine.compile("{.section a}{.section b}x{.end}{.end}").unwrap();
    let data = json!({ "a": { "b": true } });
    let err = template.render_from(&data).to_string().unwrap_err();
    assert_eq!(err.kind(), jsont::ErrorKind::Render);
    let result = template
        .render_from(&data)
        .with_max_depth(2)
        .to_string()
        .unwrap();
    assert_eq!(result, "x");
}

#[test]
fn engine_render_err_serialize() {
    use std::collections::BTreeMap;

    let mut data = BTreeMap::new();
    data.insert(vec![1], "non string key");
    let err = Engine::new()
        .compile("lorem")
        .unwrap()
        .render(data)
        .to_string()
        .unwrap_err();
    assert_eq!(err.kind(), jsont::ErrorKind::Render);
    assert_eq!(err.to_string(), "failed to serialize data document");
}
