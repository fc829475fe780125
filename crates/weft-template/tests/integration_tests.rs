/*
 * integration_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for weft-template using test fixtures.
 */

use pretty_assertions::assert_eq;
use serde_json::json;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use weft_template::{
    CompileOptions, EvalOptions, FileSystemResolver, HostError, HostObject, StateTable, Template,
    TemplateCache, TrimMode, Value,
};

/// Helper to get the path to test fixtures
fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("test-fixtures").join(name)
}

/// Helper to load a template from fixtures
fn load_template(name: &str) -> Template {
    load_template_with(name, TrimMode::Standard)
}

fn load_template_with(name: &str, trim: TrimMode) -> Template {
    let path = fixture_path(name);
    Template::compile_from_file(&path, &CompileOptions { trim })
        .unwrap_or_else(|_| panic!("Failed to load template: {}", name))
}

fn state(json: serde_json::Value) -> StateTable {
    StateTable::from_json(&json).expect("state must be a JSON object")
}

#[test]
fn test_invoice_with_lines() {
    let template = load_template("invoice.weft");
    assert!(!template.has_parse_errors());

    let mut state = state(json!({
        "customer": { "name": "ACME" },
        "lines": [
            { "item": "bolt", "qty": 3, "price": 2 },
            { "item": "nut", "qty": 10, "price": 1 }
        ]
    }));
    let result = template.evaluate(&mut state);
    assert_eq!(
        result.output,
        "Invoice for ACME\n* bolt x3 = 6\n* nut x10 = 10\nTotal: 16\n"
    );
    assert!(result.errors.is_empty());
    assert_eq!(state.get("total"), Some(&Value::Int32(16)));
}

#[test]
fn test_invoice_without_lines() {
    let template = load_template("invoice.weft");
    let mut state = state(json!({ "customer": { "name": "ACME" }, "lines": [] }));
    let result = template.evaluate(&mut state);
    assert_eq!(result.output, "Invoice for ACME\n(no lines)\nTotal: 0\n");
    assert!(result.errors.is_empty());
}

#[test]
fn test_parse_and_include_from_directories() {
    let resolver = FileSystemResolver::new([fixture_path("partials"), fixture_path("")]);
    let cache = TemplateCache::new(resolver);
    let template = load_template("page.weft");

    let mut state = state(json!({ "title": "Weft", "body": "Hello" }));
    let result = template.evaluate_with(&mut state, &cache, EvalOptions::default());
    assert_eq!(
        result.output,
        "<h1>WEFT</h1>\n<main>Hello</main>\n<footer>$raw</footer>\n"
    );
    assert!(result.errors.is_empty());

    // The second evaluation reuses the compiled header.
    let again = template.evaluate_with(&mut state, &cache, EvalOptions::default());
    assert_eq!(again.output, result.output);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_trim_modes() {
    let mut state = state(json!({ "xs": [1, 2] }));

    let standard = load_template("list.weft").evaluate(&mut state);
    assert_eq!(
        standard.output,
        "<ul>\n    <li>1</li>\n    <li>2</li>\n  </ul>\n"
    );

    let greedy = load_template_with("list.weft", TrimMode::Greedy).evaluate(&mut state);
    assert_eq!(greedy.output, "<ul>\n  <li>1</li>\n  <li>2</li>\n</ul>\n");
}

#[test]
fn test_trim_pragma() {
    let result = load_template("pragma.weft").evaluate(&mut StateTable::new());
    assert_eq!(result.output, "<ol>\n  <li>1</li>\n  <li>2</li>\n</ol>\n");
    assert!(result.errors.is_empty());
}

#[test]
fn test_diagnostics_accumulate_in_order() {
    let template = Template::compile("$missing #break $(1 +) $(2 * 3)");
    let result = template.evaluate(&mut StateTable::new());
    assert_eq!(result.output, "   6");
    insta::assert_snapshot!(result.errors.codes().join(" "), @"E101 R902 P001");
    assert!(!result.is_ok());
}

#[test]
fn test_diagnostic_rendering_points_at_source() {
    let template = Template::compile("Hi $user.name");
    let result = template.evaluate(&mut StateTable::new());
    let diagnostic = &result.errors.as_slice()[0];

    let plain = diagnostic.to_text(None);
    assert!(plain.starts_with("Warning [E101]"), "{plain}");

    let location = diagnostic.location.expect("location");
    assert_eq!(location.start_offset(), 3);
    assert_eq!(location.end_offset(), 13);

    let rendered = diagnostic.to_text(Some(&template.source_context()));
    assert!(rendered.contains("`user` is not defined"), "{rendered}");
}

#[test]
fn test_strict_mode_makes_misses_errors() {
    let template = Template::compile("[$user.name]");
    let mut state = state(json!({ "user": {} }));

    let lenient = template.evaluate(&mut state);
    assert!(lenient.is_ok());
    assert!(lenient.errors.contains_warning());

    let strict = template.evaluate_with(
        &mut state,
        &weft_template::NullResolver,
        EvalOptions::default().with_strict_mode(true),
    );
    assert_eq!(strict.output, "[]");
    assert!(!strict.is_ok());
}

/// Inventory exposed by the host application.
struct Inventory {
    items: RefCell<Vec<String>>,
}

impl HostObject for Inventory {
    fn type_name(&self) -> &str {
        "Inventory"
    }

    fn get_property(&self, name: &str) -> Result<Value, HostError> {
        match name {
            "size" => Ok(Value::Int32(self.items.borrow().len() as i32)),
            _ => Err(HostError::NotFound(name.to_string())),
        }
    }

    fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, HostError> {
        match (name, args) {
            ("stock", [Value::String(item)]) => {
                self.items.borrow_mut().push(item.clone());
                Ok(Value::Void)
            }
            ("stock", _) => Err(HostError::failed("stock takes one string")),
            _ => Err(HostError::NotFound(name.to_string())),
        }
    }

    fn iterate(&self) -> Option<Result<Vec<Value>, HostError>> {
        Some(Ok(self.items.borrow().iter().map(Value::string).collect()))
    }
}

#[test]
fn test_host_object_round_trip() {
    let mut state = StateTable::new();
    state.insert(
        "inv",
        Value::host(Inventory {
            items: RefCell::new(vec!["apple".to_string()]),
        }),
    );
    let template = Template::compile(
        "$inv.stock('pear')#foreach(i in inv)$i#after,#end ($inv.size)[$inv.stock(1)]",
    );
    let result = template.evaluate(&mut state);
    assert_eq!(result.output, "apple,pear, (2)[]");
    assert_eq!(result.errors.codes(), vec!["R901"]);
}

#[test]
fn test_state_round_trips_to_json() {
    let mut state = state(json!({ "config": { "tags": ["a"] } }));
    let result = Template::compile("#set(config.tags[1] = 'b')#set(config.debug = true)")
        .evaluate(&mut state);
    assert!(result.errors.is_empty());
    let config = state.get("config").expect("config").to_json();
    assert_eq!(config, json!({ "debug": true, "tags": ["a", "b"] }));
}

#[test]
fn test_stop_inside_nested_blocks_halts_document() {
    let mut state = state(json!({ "xs": [1, 2, 3] }));
    let template = Template::compile(
        "start;#foreach(x in xs)#if(x == 2)#stop#end$x;#afterall\nafter#end\nend",
    );
    let result = template.evaluate(&mut state);
    assert_eq!(result.output, "start;1;");
    assert!(result.errors.is_empty());
}
