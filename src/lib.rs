//! CloudFormation custom resources that request ACM certificates and help
//! validate them through DNS.
//!
//! A [`Dispatcher`] routes each CloudFormation event to the
//! [`ResourceProvider`] registered for its `ResourceType`, which validates the
//! request, runs the create, update or delete hook and PUTs the outcome to the
//! request's pre-signed `ResponseURL`.

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;

use std::future::Future;
use std::sync::Arc;
use serde_json::Value;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Added to `ResourceProperties` by CloudFormation: the ARN of the function
/// handling the resource.
pub const SERVICE_TOKEN_KEY: &str = "ServiceToken";

pub mod map;
pub mod model;
pub mod schema;
pub mod protocol;
pub mod error;
pub mod provider;
pub mod response;
pub mod invoke;
pub mod certificate;
pub mod dispatcher;
pub mod config;
#[cfg(feature = "aws")]
pub mod aws;
#[cfg(test)]
mod testing;

pub use map::Map;
pub use model::{Context, Request, RequestType, Response, Status};
pub use provider::{Invocation, ResourceProvider};
pub use response::{HttpTransport, ResponseTransport};
pub use dispatcher::Dispatcher;
pub use config::Config;

use certificate::{CertificateDnsRecordProvider, CertificateManager, CertificateProvider, IssuedCertificateProvider};
use invoke::FunctionInvoker;

pub fn decode_event(event: Value) -> Result<Request, serde_json::Error> {
    Request::from_value(event)
}

/// A dispatcher serving `Custom::Certificate`, `Custom::CertificateDNSRecord`
/// and `Custom::IssuedCertificate`.
pub fn certificate_dispatcher(certificates: Arc<dyn CertificateManager>, invoker: Arc<dyn FunctionInvoker>, transport: Box<dyn ResponseTransport>, config: &Config) -> Dispatcher {
    Dispatcher::new(transport)
        .with_provider(CertificateProvider::new(certificates.clone()))
        .with_provider(CertificateDnsRecordProvider::new(certificates.clone(), config.polling))
        .with_provider(IssuedCertificateProvider::new(certificates, invoker, config.reinvoke_interval))
}

/// Runs `future` to completion from synchronous code on a multi-threaded
/// tokio runtime.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
