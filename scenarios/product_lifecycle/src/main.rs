use http_gale_runner::prelude::*;
use rand::Rng;
use serde_json::{json, Value};
use std::process::ExitCode;
use std::time::Duration;

/// The id of a created product, as a path segment. The gateway may return it as a number or a
/// string.
fn created_id(response: &HttpResponse) -> Option<String> {
    match response.json_value().ok()?.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn vu_behaviour(ctx: &mut VuContext<HttpRunnerContext, HttpVuContext>) -> HookResult {
    let price = rand::thread_rng().gen_range(100..=1099);
    let create = HttpRequest::post("/api/products").with_json(&json!({
        "name": "k6 Load Test Product",
        "description": "Omelo",
        "Category": "chino",
        "price": price,
    }))?;
    let response = send(ctx, create)?;
    check(
        ctx,
        &response,
        &[NamedCheck::new("create OK (201)", Check::Status(201))],
    );

    let Some(id) = created_id(&response) else {
        log::debug!("No product id in create response, skipping update and delete");
        return Ok(());
    };

    let price = rand::thread_rng().gen_range(50..=549);
    let update = HttpRequest::put(format!("/api/products/{id}"))
        .with_name("/api/products/{id}")
        .with_json(&json!({
            "name": "Updated Test Product",
            "description": "Omelo chino,soy Homero pero chino",
            "price": price,
        }))?;
    let response = send(ctx, update)?;
    check(
        ctx,
        &response,
        &[NamedCheck::new("update OK (200)", Check::Status(200))],
    );

    let delete = HttpRequest::delete(format!("/api/products/{id}")).with_name("/api/products/{id}");
    let response = send(ctx, delete)?;
    check(
        ctx,
        &response,
        &[NamedCheck::new("delete OK (204)", Check::Status(204))],
    );

    Ok(())
}

fn main() -> GaleResult<ExitCode> {
    let builder = ScenarioDefinitionBuilder::<HttpRunnerContext, HttpVuContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    )
    .with_default_scenario(
        ScenarioSpec::constant("product_lifecycle", 1, Duration::from_secs(5))
            .with_think_time(Duration::from_secs(1)),
    )
    .use_setup(configure_http_client)
    .use_vu_behaviour(vu_behaviour);

    let report = run(builder)?;

    Ok(ExitCode::from(report.exit_code()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_id_accepts_numbers_and_strings() {
        assert_eq!(
            Some("42".to_string()),
            created_id(&HttpResponse::new(201, r#"{"id": 42}"#))
        );
        assert_eq!(
            Some("a1".to_string()),
            created_id(&HttpResponse::new(201, r#"{"id": "a1"}"#))
        );
        assert_eq!(None, created_id(&HttpResponse::new(201, r#"{"id": ""}"#)));
        assert_eq!(None, created_id(&HttpResponse::new(400, r#"{"error": "bad"}"#)));
        assert_eq!(None, created_id(&HttpResponse::new(500, "oops")));
    }
}
