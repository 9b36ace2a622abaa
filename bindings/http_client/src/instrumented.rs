use std::sync::Arc;
use std::time::Duration;

use gale_instruments::{OutcomeStatus, RequestRecord, Reporter};
use url::Url;

use crate::client::HttpClient;
use crate::error::TransportError;
use crate::types::{HttpRequest, HttpResponse};

/// Records one outcome for every request a VU sends.
///
/// Every attempt that completes is recorded exactly once, whether it produced a response, a
/// transport error or a timeout. A request that is dropped before it completes, which happens when
/// the graceful stop period runs out, records nothing.
#[derive(Debug, Clone)]
pub struct InstrumentedHttpClient {
    inner: Arc<dyn HttpClient>,
    reporter: Arc<Reporter>,
    base_url: Url,
    timeout: Duration,
    scenario: String,
    vu_id: String,
}

impl InstrumentedHttpClient {
    pub fn new(
        inner: Arc<dyn HttpClient>,
        reporter: Arc<Reporter>,
        base_url: Url,
        timeout: Duration,
        scenario: &str,
        vu_id: &str,
    ) -> Self {
        Self {
            inner,
            reporter,
            base_url,
            timeout,
            scenario: scenario.to_string(),
            vu_id: vu_id.to_string(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send a request and record its outcome.
    ///
    /// A non-2xx status is returned as a response and counted as a failed request, unless the
    /// request sets [HttpRequest::with_expected_statuses]. A timeout is recorded with the timeout
    /// as its latency.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let record = RequestRecord::start(&self.scenario, &self.vu_id, request.name(), request.method);

        let result = match tokio::time::timeout(
            self.timeout,
            self.inner.send(&self.base_url, &request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        };

        let outcome = match &result {
            Ok(response) => {
                let failed = request.is_failure(response.status);
                record.finish(
                    OutcomeStatus::Status(response.status),
                    response.body_len(),
                    failed,
                )
            }
            Err(TransportError::Timeout(bound)) => {
                record.finish_with_latency(OutcomeStatus::Timeout, *bound, 0, true)
            }
            Err(e) => record.finish(OutcomeStatus::TransportError(e.to_string()), 0, true),
        };

        if let Err(e) = &result {
            log::debug!(
                "{} {} failed for VU {}: {e}",
                request.method,
                request.path,
                self.vu_id
            );
        }
        self.reporter.add_outcome(outcome);

        result
    }
}
