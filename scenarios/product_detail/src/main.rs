use http_gale_runner::prelude::*;
use std::process::ExitCode;
use std::time::Duration;

fn vu_behaviour(ctx: &mut VuContext<HttpRunnerContext, HttpVuContext>) -> HookResult {
    let product_id = random_id(1..=5);
    let response = send(
        ctx,
        HttpRequest::get(format!("/api/products/{product_id}")).with_name("/api/products/{id}"),
    )?;
    check(
        ctx,
        &response,
        &[
            NamedCheck::new("status OK", Check::Status(200)),
            NamedCheck::new("returns JSON", Check::JsonTruthy),
            NamedCheck::new(
                "includes inventory",
                Check::FieldNullOrObject("inventory".to_string()),
            ),
        ],
    );

    Ok(())
}

fn main() -> GaleResult<ExitCode> {
    let builder = ScenarioDefinitionBuilder::<HttpRunnerContext, HttpVuContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    )
    .with_default_scenario(
        ScenarioSpec::ramping(
            "product_detail",
            vec![
                Stage::new(Duration::from_secs(15), 5),
                Stage::new(Duration::from_secs(45), 15),
                Stage::new(Duration::from_secs(10), 0),
            ],
        )
        .with_think_time(Duration::from_secs(1)),
    )
    .with_default_threshold("http_req_failed", "rate<0.20")
    .with_default_threshold("http_req_duration", "p(95)<5000")
    .use_setup(configure_http_client)
    .use_vu_behaviour(vu_behaviour);

    let report = run(builder)?;

    Ok(ExitCode::from(report.exit_code()))
}
