use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::Duration;
use serde_json::{self, json, Value};

use crate::certificate::{certificate_arn, CertificateManager, CertificateStatus, ValidationOptionResolver};
use crate::error::ProviderError;
use crate::invoke::FunctionInvoker;
use crate::map::{heuristic_convert_property_types, JsonObject};
use crate::provider::{Invocation, ResourceProvider};
use crate::SERVICE_TOKEN_KEY;

pub const RESOURCE_TYPE: &str = "Custom::IssuedCertificate";

const ATTEMPT_KEY: &str = "Attempt";

static REQUEST_SCHEMA: LazyLock<Value> = LazyLock::new(|| json!({
    "type": "object",
    "required": ["CertificateArn"],
    "properties": {
        "CertificateArn": {
            "type": "string",
            "description": "to get the status of"
        },
        "Attempt": {
            "type": "integer",
            "minimum": 1,
            "default": 1
        }
    }
}));

/// How far waiting for a certificate has come.
///
/// Nothing survives between invocations except the request payload, so the
/// continuation lives in the `CertificateArn` and `Attempt` resource
/// properties of the request that is sent to the next invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Continuation {
    pub certificate_arn: String,
    /// Starts at 1. Informational only, it never ends the wait.
    pub attempt: u64,
}

impl Continuation {
    pub fn from_invocation(invocation: &Invocation) -> Result<Self, ProviderError> {
        let attempt = match invocation.get(ATTEMPT_KEY) {
            Some(&Value::Number(ref n)) => n.as_u64(),
            Some(&Value::String(ref s)) => s.parse().ok(),
            _ => None,
        };

        Ok(Continuation {
            certificate_arn: certificate_arn(invocation)?,
            attempt: attempt.unwrap_or(1),
        })
    }

    pub fn next(&self) -> Self {
        Continuation {
            certificate_arn: self.certificate_arn.clone(),
            attempt: self.attempt.saturating_add(1),
        }
    }

    /// Writes the continuation into the request's resource properties.
    pub fn store(&self, invocation: &mut Invocation) {
        if let Some(properties) = invocation.properties_mut() {
            properties.insert("CertificateArn".into(), self.certificate_arn.as_str().into());
            properties.insert(ATTEMPT_KEY.into(), self.attempt.into());
        }
    }
}

/// Completes once the certificate has been issued.
///
/// While the certificate is pending validation, no response is sent. Instead
/// the function is invoked again, asynchronously, with the same request and an
/// incremented `Attempt`, until the certificate is issued or CloudFormation
/// gives up waiting.
pub struct IssuedCertificateProvider {
    resolver: ValidationOptionResolver,
    invoker: Arc<dyn FunctionInvoker>,
    reinvoke_interval: Duration,
}

impl IssuedCertificateProvider {
    pub fn new(certificates: Arc<dyn CertificateManager>, invoker: Arc<dyn FunctionInvoker>, reinvoke_interval: Duration) -> Self {
        IssuedCertificateProvider {
            resolver: ValidationOptionResolver::new(certificates),
            invoker: invoker,
            reinvoke_interval: reinvoke_interval,
        }
    }

    fn check(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        let continuation = Continuation::from_invocation(invocation)?;
        invocation.set_physical_resource_id(continuation.certificate_arn.clone());

        let certificate = self.resolver.describe(&continuation.certificate_arn)?;
        match certificate.status {
            CertificateStatus::Issued => {
                info!("{} is issued", certificate);
                invocation.success();
                Ok(())
            },
            CertificateStatus::PendingValidation => {
                info!("{} is pending validation, attempt {}", certificate, continuation.attempt);
                self.async_reinvoke(invocation, continuation.next())
            },
            ref status => {
                info!("{} is in incorrect state {}", certificate, status);
                invocation.fail(format!("incorrect certificate status {}, expected ISSUED or PENDING_VALIDATION", status));
                Ok(())
            },
        }
    }

    /// Hands the request over to a new invocation of this function.
    fn async_reinvoke(&self, invocation: &mut Invocation, next: Continuation) -> Result<(), ProviderError> {
        invocation.set_asynchronous(true);
        thread::sleep(self.reinvoke_interval);
        next.store(invocation);

        let result = self.function_name(invocation)
            .and_then(|function_name| {
                let payload = serde_json::to_vec(invocation.request())?;
                self.invoker.invoke_async(&function_name, &payload)?;
                Ok(())
            });

        if result.is_err() {
            // Nobody else is going to answer CloudFormation.
            invocation.set_asynchronous(false);
        }
        result
    }

    fn function_name(&self, invocation: &Invocation) -> Result<String, ProviderError> {
        invocation.get_str(SERVICE_TOKEN_KEY)
            .filter(|name| !name.is_empty())
            .or_else(|| Some(invocation.context().invoked_function_arn.as_str()).filter(|name| !name.is_empty()))
            .map(String::from)
            .ok_or_else(|| ProviderError::precondition("cannot wait for the certificate, the request has no ServiceToken"))
    }
}

impl ResourceProvider for IssuedCertificateProvider {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    fn request_schema(&self) -> &Value {
        &REQUEST_SCHEMA
    }

    fn convert_property_types(&self, properties: &mut JsonObject) {
        heuristic_convert_property_types(properties);
    }

    fn create(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        self.check(invocation)
    }

    fn update(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        self.check(invocation)
    }

    fn delete(&self, _invocation: &mut Invocation) -> Result<(), ProviderError> {
        Ok(())
    }
}
