use std::sync::Arc;
use std::time::Duration;

use formstate::prelude::*;
use serde_json::json;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

/// Waits for handler-triggered validation runs to settle.
async fn settle(form: &Form) {
    while form.is_fields_validating() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn print_section(title: &str, value: &serde_json::Value) {
    println!("== {}", title);
    println!("{:#}", value);
}

fn print_outcome(title: &str, outcome: &ValidationOutcome) {
    let errors = outcome
        .errors
        .as_ref()
        .map(ErrorTree::to_json)
        .unwrap_or(serde_json::Value::Null);
    print_section(title, &json!({"errors": errors, "values": outcome.values}));
}

async fn run() -> Result<(), FormError> {
    let form = Form::builder()
        .config(FormConfig::default().with_field_name_prop("id"))
        .on_values_change(|changed, _all| log::info!("values changed: {}", changed))
        .build();

    let name = form.register(
        "user.name",
        FieldOptions::new().rules(vec![Rule::required(), Rule::min_length(2)]),
    )?;
    let email = form.register(
        "user.email",
        FieldOptions::new()
            .rules(vec![Rule::required(), Rule::email()])
            .validate_trigger(["onBlur"]),
    )?;
    let city = form.register(
        "address.city",
        FieldOptions::new()
            .initial_value("Berlin")
            .rules(vec![Rule::one_of(["Berlin", "Hamburg", "Munich"])]),
    )?;
    for props in [&name, &email, &city] {
        props.mount(Arc::new(props.name.clone()));
    }

    name.fire("onChange", EventData::change("A"));
    email.fire("onChange", EventData::change("ann@example"));
    email.fire("onBlur", EventData::Blur);
    settle(&form).await;
    print_section("errors after editing", &form.get_fields_error());

    email.fire("onChange", EventData::change("ann@example.com"));
    email.fire("onBlur", EventData::Blur);
    settle(&form).await;

    let outcome = form.validate_fields(ValidateOptions::new().force(true)).await;
    print_outcome("full validation", &outcome);

    city.unmount();
    print_section("values with city hidden", &form.get_fields_value());
    city.mount(Arc::new(city.name.clone()));
    print_section("values with city shown again", &form.get_fields_value());

    form.set_fields_value(&json!({"address": {"city": "Paris"}}));
    let outcome = form
        .validate_fields_for(&["address"], ValidateOptions::new())
        .await;
    print_outcome("address validation", &outcome);

    form.reset_fields();
    print_section("values after reset", &form.get_fields_value());
    Ok(())
}

#[tokio::main]
async fn main() {
    TermLogger::init(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .expect("Failed to initialize logger");

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
