use http_gale_runner::prelude::*;
use std::process::ExitCode;
use std::time::Duration;

fn vu_behaviour(ctx: &mut VuContext<HttpRunnerContext, HttpVuContext>) -> HookResult {
    let id = random_id(1..=5);
    let response = send(
        ctx,
        HttpRequest::get(format!("/api/inventory/{id}")).with_name("/api/inventory/{id}"),
    )?;
    check(
        ctx,
        &response,
        &[
            NamedCheck::new("status is 200", Check::Status(200)),
            NamedCheck::new("returns JSON", Check::JsonTruthy),
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
            "inventory",
            vec![
                Stage::new(Duration::from_secs(10), 2),
                Stage::new(Duration::from_secs(20), 1),
                Stage::new(Duration::from_secs(10), 0),
            ],
        )
        .with_think_time(Duration::from_secs(1)),
    )
    .with_default_threshold("http_req_failed", "rate<0.20")
    .with_default_threshold("http_req_duration", "p(95)<3000")
    .use_setup(configure_http_client)
    .use_vu_behaviour(vu_behaviour);

    let report = run(builder)?;

    Ok(ExitCode::from(report.exit_code()))
}
