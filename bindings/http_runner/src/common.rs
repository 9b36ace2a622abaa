use std::ops::RangeInclusive;
use std::sync::Arc;

use anyhow::Context;
use gale_runner::prelude::{HookResult, RunnerContext, UserValuesConstraint, VuContext};
use http_client_instrumented::prelude::{
    HttpClient, HttpRequest, HttpResponse, InstrumentedHttpClient, NamedCheck, ReqwestHttpClient,
};
use rand::Rng;

use crate::context::HttpVuContext;
use crate::runner_context::HttpRunnerContext;

/// Sets up the HTTP client that every VU shares, so that connections are pooled across the run.
///
/// Call this from your global setup hook:
/// ```rust
/// use http_gale_runner::prelude::*;
///
/// fn setup(ctx: &mut RunnerContext<HttpRunnerContext>) -> HookResult {
///     configure_http_client(ctx)?;
///     Ok(())
/// }
/// ```
pub fn configure_http_client(ctx: &mut RunnerContext<HttpRunnerContext>) -> HookResult {
    let client = ReqwestHttpClient::new().context("Failed to build the HTTP client")?;
    use_http_client(ctx, Arc::new(client));

    Ok(())
}

/// Use a custom [HttpClient] for every VU instead of the default one.
pub fn use_http_client(ctx: &mut RunnerContext<HttpRunnerContext>, client: Arc<dyn HttpClient>) {
    log::debug!("Using HTTP client {client:?} for {}", ctx.target_host());
    ctx.get_mut().set_http_client(client);
}

/// Send a request to the target host and wait for the response.
///
/// The outcome is recorded against the VU's scenario. A response with any status is returned
/// as `Ok`, so check the status with [check]. A timeout or a transport error is returned as an
/// error, which fails the iteration.
///
/// ```rust
/// use http_gale_runner::prelude::*;
///
/// fn vu_behaviour(ctx: &mut VuContext<HttpRunnerContext, HttpVuContext>) -> HookResult {
///     let response = send(ctx, HttpRequest::get("/api/products"))?;
///     check(ctx, &response, &[NamedCheck::new("status is 200", Check::Status(200))]);
///     Ok(())
/// }
/// ```
pub fn send<SV: UserValuesConstraint>(
    ctx: &mut VuContext<HttpRunnerContext, HttpVuContext<SV>>,
    request: HttpRequest,
) -> anyhow::Result<HttpResponse> {
    let client = match &ctx.get().http_client {
        Some(client) => client.clone(),
        None => {
            let client = instrumented_client(ctx)?;
            ctx.get_mut().http_client = Some(client.clone());
            client
        }
    };

    ctx.execute(async move { client.send(request).await.map_err(anyhow::Error::from) })
}

fn instrumented_client<SV: UserValuesConstraint>(
    ctx: &VuContext<HttpRunnerContext, HttpVuContext<SV>>,
) -> anyhow::Result<InstrumentedHttpClient> {
    let runner_context = ctx.runner_context();
    let inner = runner_context
        .get()
        .http_client()
        .context("No HTTP client configured, call `configure_http_client` in your setup hook")?;

    Ok(InstrumentedHttpClient::new(
        inner,
        runner_context.reporter(),
        runner_context.target_host().clone(),
        runner_context.request_timeout(),
        ctx.scenario_name(),
        ctx.vu_id(),
    ))
}

/// Evaluate each check against the response and record the result under the check's name.
///
/// Returns true if every check passed. Failing checks do not fail the iteration.
pub fn check<SV: UserValuesConstraint>(
    ctx: &VuContext<HttpRunnerContext, HttpVuContext<SV>>,
    response: &HttpResponse,
    checks: &[NamedCheck],
) -> bool {
    let reporter = ctx.runner_context().reporter();

    let mut all_passed = true;
    for named in checks {
        let result = named.evaluate(response);
        reporter.add_check(ctx.scenario_name(), &named.name, result.passed);
        if !result.passed {
            log::debug!(
                "Check [{}] failed for VU {}: {}",
                named.name,
                ctx.vu_id(),
                result.message
            );
            all_passed = false;
        }
    }

    all_passed
}

/// Pick a random id from `range`, for requests like `/api/products/{id}`.
pub fn random_id(range: RangeInclusive<u32>) -> u32 {
    rand::thread_rng().gen_range(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_id_stays_in_range() {
        for _ in 0..1000 {
            let id = random_id(1..=5);
            assert!((1..=5).contains(&id));
        }
        assert_eq!(7, random_id(7..=7));
    }
}
