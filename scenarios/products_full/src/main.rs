use http_gale_runner::prelude::*;
use std::process::ExitCode;
use std::time::Duration;

fn vu_behaviour(ctx: &mut VuContext<HttpRunnerContext, HttpVuContext>) -> HookResult {
    let response = send(ctx, HttpRequest::get("/api/products-full"))?;
    check(
        ctx,
        &response,
        &[
            NamedCheck::new("status OK", Check::Status(200)),
            NamedCheck::new("is array", Check::JsonArray),
        ],
    );

    Ok(())
}

fn main() -> GaleResult<ExitCode> {
    let builder = ScenarioDefinitionBuilder::<HttpRunnerContext, HttpVuContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    )
    .with_default_target_host("http://localhost:8000")
    .with_default_scenario(
        ScenarioSpec::ramping(
            "products_full",
            vec![
                Stage::new(Duration::from_secs(10), 10),
                Stage::new(Duration::from_secs(30), 25),
                Stage::new(Duration::from_secs(10), 0),
            ],
        )
        .with_think_time(Duration::from_secs(1)),
    )
    .with_default_threshold("http_req_failed", "rate<0.05")
    // The full listing joins products with inventory so it is allowed to be slower
    .with_default_threshold("http_req_duration", "p(95)<1200")
    .use_setup(configure_http_client)
    .use_vu_behaviour(vu_behaviour);

    let report = run(builder)?;

    Ok(ExitCode::from(report.exit_code()))
}
