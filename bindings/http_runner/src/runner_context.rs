use std::sync::Arc;

use gale_runner::prelude::UserValuesConstraint;
use http_client_instrumented::prelude::HttpClient;

#[derive(Default, Debug)]
pub struct HttpRunnerContext {
    http_client: Option<Arc<dyn HttpClient>>,
}

impl UserValuesConstraint for HttpRunnerContext {}

impl HttpRunnerContext {
    /// The client shared by every VU. Set by [crate::common::configure_http_client] or
    /// [crate::common::use_http_client] in the scenario setup.
    pub fn http_client(&self) -> Option<Arc<dyn HttpClient>> {
        self.http_client.clone()
    }

    pub(crate) fn set_http_client(&mut self, client: Arc<dyn HttpClient>) {
        self.http_client = Some(client);
    }
}
