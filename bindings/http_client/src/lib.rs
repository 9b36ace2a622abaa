mod check;
mod client;
mod error;
mod instrumented;
mod types;

pub mod prelude {
    pub use crate::check::{Check, CheckResult, NamedCheck};
    pub use crate::client::{HttpClient, ReqwestHttpClient};
    pub use crate::error::TransportError;
    pub use crate::instrumented::InstrumentedHttpClient;
    pub use crate::types::{HttpRequest, HttpResponse};

    // Needed to implement a custom [HttpClient] without depending on `async-trait` directly
    pub use async_trait::async_trait;
}
