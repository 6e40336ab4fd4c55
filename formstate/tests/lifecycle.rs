//! Tests for registration, element attachment and value collection.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use formstate::prelude::*;
use formstate::{FieldsChange, UsageWarning};
use serde_json::{Value, json};

#[test]
fn test_handlers_keep_identity_across_registrations() {
    let form = Form::new();
    let options = FieldOptions::new()
        .rules(vec![Rule::required()])
        .validate_trigger(["onBlur"]);
    let first = form.register("name", options.clone()).unwrap();
    let second = form.register("name", options).unwrap();

    for action in ["onBlur", "onChange"] {
        assert!(Arc::ptr_eq(
            first.handler(action).unwrap(),
            second.handler(action).unwrap()
        ));
    }
    assert!(Arc::ptr_eq(&first.attach, &second.attach));
}

#[test]
fn test_default_trigger_is_bound_once() {
    let form = Form::new();
    let props = form
        .register("name", FieldOptions::new().rules(vec![Rule::required()]))
        .unwrap();
    let actions: Vec<&String> = props.handlers.keys().collect();
    assert_eq!(actions, vec!["onChange"]);
}

#[test]
fn test_custom_trigger_and_value_prop() {
    let form = Form::new();
    let props = form
        .register(
            "agree",
            FieldOptions::new()
                .trigger("onToggle")
                .value_prop_name("checked")
                .initial_value(false),
        )
        .unwrap();
    assert_eq!(props.to_map(), json!({"checked": false}).as_object().unwrap().clone());

    props.fire("onToggle", EventData::Toggle { checked: true });
    assert_eq!(form.get_field_value("agree"), Some(json!(true)));
}

#[test]
fn test_passthrough_props() {
    let form = Form::builder()
        .config(
            FormConfig::default()
                .with_field_name_prop("id")
                .with_field_meta_prop("meta")
                .with_field_data_prop("data"),
        )
        .build();
    let props = form
        .register("email", FieldOptions::new().initial_value("a@b.c"))
        .unwrap();

    assert_eq!(props.extra["id"], json!("email"));
    assert_eq!(props.extra["meta"]["valuePropName"], json!("value"));
    assert_eq!(props.extra["data"]["dirty"], json!(true));
    assert_eq!(props.value, Some(json!("a@b.c")));
}

#[test]
fn test_zero_rule_field_never_validates() {
    let form = Form::new();
    let props = form.register("note", FieldOptions::new()).unwrap();

    for text in ["a", "ab", "abc"] {
        props.fire("onChange", EventData::change(text));
        assert!(!form.is_field_validating("note"));
    }
    assert!(!form.get_field("note").dirty);
    assert!(form.is_field_touched("note"));

    let outcome =
        futures::executor::block_on(form.validate_fields(ValidateOptions::new().force(true)));
    assert!(outcome.is_valid());
    assert!(!form.is_field_validating("note"));
}

#[test]
fn test_collect_marks_ruled_fields_dirty() {
    let form = Form::new();
    let props = form
        .register(
            "name",
            FieldOptions::new().validate(ValidateRule::new(["onBlur"], vec![Rule::required()])),
        )
        .unwrap();

    props.fire("onChange", EventData::change("x"));
    let field = form.get_field("name");
    assert_eq!(field.value, Some(json!("x")));
    assert!(field.dirty);
    assert!(!field.validating);
}

#[test]
fn test_detach_and_reattach_restores_field() {
    let form = Form::new();
    let props = form
        .register("city", FieldOptions::new().rules(vec![Rule::min_length(10)]))
        .unwrap();
    props.mount(Arc::new("input#city"));
    form.set_fields_value(&json!({"city": "Rome"}));
    futures::executor::block_on(form.validate_fields(ValidateOptions::new()));
    let before = form.get_field("city");
    assert!(before.errors.is_some());

    props.unmount();
    assert_eq!(form.get_fields_value(), json!({}));
    assert!(form.get_field_meta("city").is_none());
    assert!(form.get_field_instance("city").is_none());

    props.mount(Arc::new("input#city"));
    assert_eq!(form.get_field("city"), before);
    assert_eq!(form.get_fields_value(), json!({"city": "Rome"}));
    assert!(form.get_field_instance("city").is_some());
}

#[test]
fn test_detach_without_reattach_removes_field() {
    let form = Form::new();
    let props = form.register("city", FieldOptions::new()).unwrap();
    props.mount(Arc::new(()));
    form.set_fields_value(&json!({"city": "Rome"}));
    props.unmount();

    assert_eq!(form.get_fields_value(), json!({}));
    form.set_fields_value(&json!({"city": "Paris"}));
    assert_eq!(form.get_fields_value(), json!({}));
}

#[test]
fn test_reregistration_discards_cleared_entry() {
    let form = Form::new();
    let props = form.register("city", FieldOptions::new()).unwrap();
    props.mount(Arc::new(()));
    form.set_fields_value(&json!({"city": "Rome"}));
    props.unmount();

    let props = form.register("city", FieldOptions::new()).unwrap();
    props.mount(Arc::new(()));
    assert_eq!(form.get_field_value("city"), None);
}

#[test]
fn test_cleared_entry_expires_after_grace_window() {
    let form = Form::builder()
        .config(FormConfig::default().with_cleared_field_ttl(Duration::from_millis(1)))
        .build();
    let props = form.register("city", FieldOptions::new()).unwrap();
    props.mount(Arc::new(()));
    form.set_fields_value(&json!({"city": "Rome"}));
    props.unmount();

    std::thread::sleep(Duration::from_millis(20));
    props.mount(Arc::new(()));
    assert_eq!(form.get_field_value("city"), None);
    assert!(form.cleared_fields().is_empty());
}

#[test]
fn test_preserved_field_survives_detach() {
    let form = Form::new();
    let props = form
        .register("city", FieldOptions::new().preserve(true))
        .unwrap();
    props.mount(Arc::new(()));
    form.set_fields_value(&json!({"city": "Rome"}));
    props.unmount();

    assert_eq!(form.get_field_value("city"), Some(json!("Rome")));
    assert!(form.get_field_instance("city").is_none());
}

#[test]
fn test_instance_hook_runs_on_attach() {
    let form = Form::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let props = form
        .register(
            "city",
            FieldOptions::new().on_instance(move |instance| {
                if let Some(tag) = instance.downcast_ref::<&str>() {
                    sink.lock().unwrap().push(tag.to_string());
                }
            }),
        )
        .unwrap();
    props.mount(Arc::new("input#city"));
    assert_eq!(*seen.lock().unwrap(), vec!["input#city".to_string()]);
}

#[test]
fn test_decorator_merges_element_props() {
    let warnings = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&warnings);
    let form = Form::builder()
        .on_warning(move |warning| sink.lock().unwrap().push(warning.clone()))
        .build();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let element = ElementProps::new()
        .with_value("value", "ignored")
        .with_value("defaultValue", "ignored")
        .with_value("placeholder", "Title")
        .with_handler("onChange", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .with_handler("onFocus", |_| {});

    let props = form
        .get_field_decorator("title", FieldOptions::new().initial_value("Draft"))
        .unwrap()
        .decorate(element);

    assert_eq!(
        *warnings.lock().unwrap(),
        vec![
            UsageWarning::ValuePropOverride {
                name: "title".into(),
                prop: "value".into()
            },
            UsageWarning::DefaultValueProp {
                name: "title".into(),
                prop: "defaultValue".into()
            },
        ]
    );
    assert_eq!(props.extra["placeholder"], json!("Title"));
    assert!(!props.extra.contains_key("value"));
    assert_eq!(props.value, Some(json!("Draft")));
    assert!(props.handler("onFocus").is_some());

    props.fire("onChange", EventData::change("Hello"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(form.get_field_value("title"), Some(json!("Hello")));
}

#[test]
fn test_own_handler_wins_over_element_handler() {
    let form = Form::new();
    let own = Arc::new(AtomicUsize::new(0));
    let element_calls = Arc::new(AtomicUsize::new(0));
    let own_counter = Arc::clone(&own);
    let element_counter = Arc::clone(&element_calls);

    let props = form
        .get_field_decorator(
            "title",
            FieldOptions::new().on("onChange", move |_| {
                own_counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap()
        .decorate(ElementProps::new().with_handler("onChange", move |_| {
            element_counter.fetch_add(1, Ordering::SeqCst);
        }));

    props.fire("onChange", EventData::change("x"));
    assert_eq!(own.load(Ordering::SeqCst), 1);
    assert_eq!(element_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_custom_value_extractor_and_normalize() {
    let form = Form::new();
    let props = form
        .register(
            "code",
            FieldOptions::new()
                .get_value_from_event(|event| match event {
                    EventData::Change { text } => Some(Value::from(text.trim())),
                    _ => None,
                })
                .normalize(|value, _previous, _all| {
                    value
                        .and_then(Value::as_str)
                        .map(|s| Value::from(s.to_uppercase()))
                }),
        )
        .unwrap();

    props.fire("onChange", EventData::change("  ab "));
    assert_eq!(form.get_field_value("code"), Some(json!("AB")));
}

#[test]
fn test_change_hooks_report_nested_values() {
    let values_seen: Arc<Mutex<Vec<(Value, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let fields_seen: Arc<Mutex<Vec<FieldsChange>>> = Arc::new(Mutex::new(Vec::new()));
    let values_sink = Arc::clone(&values_seen);
    let fields_sink = Arc::clone(&fields_seen);

    let form = Form::builder()
        .on_values_change(move |changed, all| {
            values_sink.lock().unwrap().push((changed.clone(), all.clone()));
        })
        .on_fields_change(move |change| fields_sink.lock().unwrap().push(change.clone()))
        .build();
    let name = form.register("user.name", FieldOptions::new()).unwrap();
    form.register("user.age", FieldOptions::new().initial_value(30))
        .unwrap();

    name.fire("onChange", EventData::change("ann"));

    let values = values_seen.lock().unwrap();
    assert_eq!(
        *values,
        vec![(
            json!({"user": {"name": "ann"}}),
            json!({"user": {"name": "ann", "age": 30}})
        )]
    );
    let fields = fields_seen.lock().unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].changed["user"]["name"]["value"], json!("ann"));
    assert_eq!(fields[0].changed["user"]["name"]["touched"], json!(true));
    assert!(fields[0].changed["user"].get("age").is_none());
    assert_eq!(fields[0].all["user"]["age"]["value"], Value::Null);
}

#[test]
fn test_unchanged_value_skips_values_hook() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let form = Form::builder()
        .on_values_change(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    let props = form.register("a", FieldOptions::new()).unwrap();

    props.fire("onChange", EventData::change("x"));
    props.fire("onChange", EventData::change("x"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_hooks_may_call_back_into_form() {
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let form = Form::new();
    let handle = form.clone();
    let props = form
        .register(
            "a",
            FieldOptions::new().on("onChange", move |_| {
                *sink.lock().unwrap() = Some(handle.get_fields_value());
            }),
        )
        .unwrap();

    form.set_fields_value(&json!({"a": 1}));
    props.fire("onChange", EventData::value(2));
    assert_eq!(*seen.lock().unwrap(), Some(json!({"a": 1})));
    assert_eq!(form.get_field_value("a"), Some(json!(2)));
}

#[test]
fn test_handlers_outliving_form_are_inert() {
    let props = {
        let form = Form::new();
        form.register("a", FieldOptions::new()).unwrap()
    };
    assert!(props.fire("onChange", EventData::change("x")));
    props.mount(Arc::new(()));
}
