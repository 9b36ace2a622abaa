use http_gale_runner::prelude::*;
use std::process::ExitCode;
use std::time::Duration;

fn vu_behaviour(ctx: &mut VuContext<HttpRunnerContext, HttpVuContext>) -> HookResult {
    let response = send(ctx, HttpRequest::get("/health"))?;
    check(ctx, &response, &[NamedCheck::new("healthy", Check::Status(200))]);

    Ok(())
}

fn main() -> GaleResult<ExitCode> {
    let builder = ScenarioDefinitionBuilder::<HttpRunnerContext, HttpVuContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    )
    .with_default_scenario(ScenarioSpec::constant(
        "health",
        5,
        Duration::from_secs(20),
    ))
    .use_setup(configure_http_client)
    .use_vu_behaviour(vu_behaviour);

    let report = run(builder)?;

    Ok(ExitCode::from(report.exit_code()))
}
