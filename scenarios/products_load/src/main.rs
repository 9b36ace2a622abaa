use http_gale_runner::prelude::*;
use std::process::ExitCode;
use std::time::Duration;

fn vu_behaviour(ctx: &mut VuContext<HttpRunnerContext, HttpVuContext>) -> HookResult {
    let response = send(ctx, HttpRequest::get("/api/products"))?;
    check(
        ctx,
        &response,
        &[
            NamedCheck::new("status 200", Check::Status(200)),
            // Anything longer than `[]`
            NamedCheck::new("body not empty", Check::BodyLongerThan(2)),
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
            "products",
            vec![
                Stage::new(Duration::from_secs(10), 20),
                Stage::new(Duration::from_secs(40), 50),
                Stage::new(Duration::from_secs(10), 0),
            ],
        )
        .with_think_time(Duration::from_secs(1)),
    )
    .with_default_threshold("http_req_failed", "rate<0.01")
    .with_default_threshold("http_req_duration", "p(95)<450")
    .use_setup(configure_http_client)
    .use_vu_behaviour(vu_behaviour);

    let report = run(builder)?;

    Ok(ExitCode::from(report.exit_code()))
}
