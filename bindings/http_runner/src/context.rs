use gale_runner::prelude::UserValuesConstraint;
use http_client_instrumented::prelude::InstrumentedHttpClient;

#[derive(Default, Debug)]
pub struct DefaultScenarioValues {}

impl UserValuesConstraint for DefaultScenarioValues {}

#[derive(Default, Debug)]
pub struct HttpVuContext<SV: UserValuesConstraint = DefaultScenarioValues> {
    pub(crate) http_client: Option<InstrumentedHttpClient>,
    /// Values that are specific to a scenario. Use this to keep state between iterations of a VU.
    pub scenario_values: SV,
}

impl<SV: UserValuesConstraint> UserValuesConstraint for HttpVuContext<SV> {}
