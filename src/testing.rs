//! In-memory stand-ins for the external services.

use std::collections::VecDeque;
use std::sync::Mutex;
use serde_json::{json, Value};
use url::Url;

use crate::certificate::{Certificate, CertificateManager, CertificateOptions, CertificateRequest, CertificateStatus, DomainValidationOption, ResourceRecord};
use crate::error::RemoteError;
use crate::invoke::FunctionInvoker;
use crate::model::{Request, Response};
use crate::response::ResponseTransport;
use crate::Error;

pub const RESPONSE_URL: &str = "https://cloudformation-custom-resource-response.example.com/response";

pub fn request(request_type: &str, resource_type: &str, properties: Value) -> Request {
    Request::from_value(json!({
        "RequestType": request_type,
        "ResponseURL": RESPONSE_URL,
        "StackId": "arn:aws:cloudformation:us-west-2:EXAMPLE/stack-name/guid",
        "RequestId": "request-1",
        "ResourceType": resource_type,
        "LogicalResourceId": "Resource",
        "ResourceProperties": properties,
    })).unwrap()
}

/// `request` with extra top-level fields such as `PhysicalResourceId`.
pub fn request_with(request_type: &str, resource_type: &str, properties: Value, extra: Value) -> Request {
    let mut value = request(request_type, resource_type, properties).into_value();
    for (name, field) in extra.as_object().unwrap() {
        value[name] = field.clone();
    }
    Request::from_value(value).unwrap()
}

/// A certificate for `test.example.com` with an alternative name
/// `alt.example.com`, both validated through `method`.
pub fn certificate(arn: &str, status: CertificateStatus, method: &str, with_records: bool) -> Certificate {
    let option = |domain_name: &str| DomainValidationOption {
        domain_name: domain_name.into(),
        validation_status: Some("PENDING_VALIDATION".into()),
        validation_method: Some(method.into()),
        resource_record: if with_records {
            Some(ResourceRecord {
                name: format!("_x1.{}.", domain_name),
                record_type: "CNAME".into(),
                value: format!("_x2.{}.acm-validations.aws.", domain_name),
            })
        } else {
            None
        },
    };

    Certificate {
        arn: arn.into(),
        domain_name: "test.example.com".into(),
        status: status,
        validation_options: vec![option("test.example.com"), option("alt.example.com")],
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Url, Response)>>,
    reject: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn rejecting() -> Self {
        RecordingTransport { reject: true, ..Default::default() }
    }

    pub fn sent(&self) -> Vec<(Url, Response)> {
        self.sent.lock().unwrap().clone()
    }
}

impl ResponseTransport for RecordingTransport {
    fn send(&self, url: &Url, response: &Response) -> Result<(), Error> {
        if self.reject {
            return Err("failed to put the response, status code 403".into());
        }
        self.sent.lock().unwrap().push((url.clone(), response.clone()));
        Ok(())
    }
}

/// Answers `describe_certificate` from a script, repeating the last answer
/// once the script runs out, and hands out sequential ARNs for requests.
#[derive(Default)]
pub struct FakeCertificateManager {
    describe: Mutex<VecDeque<Result<Certificate, RemoteError>>>,
    describe_calls: Mutex<Vec<(Option<String>, String)>>,
    requested: Mutex<Vec<(Option<String>, CertificateRequest)>>,
    updated: Mutex<Vec<(Option<String>, String, CertificateOptions)>>,
    deleted: Mutex<Vec<(Option<String>, String)>>,
    failure: Mutex<Option<RemoteError>>,
}

impl FakeCertificateManager {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn describing(answers: Vec<Result<Certificate, RemoteError>>) -> Self {
        let fake = Self::new();
        *fake.describe.lock().unwrap() = answers.into();
        fake
    }

    /// Makes every request, update and delete fail with `message`.
    pub fn failing(message: &str) -> Self {
        let fake = Self::new();
        *fake.failure.lock().unwrap() = Some(RemoteError::new(message));
        fake
    }

    pub fn describe_calls(&self) -> Vec<(Option<String>, String)> {
        self.describe_calls.lock().unwrap().clone()
    }

    pub fn requested(&self) -> Vec<(Option<String>, CertificateRequest)> {
        self.requested.lock().unwrap().clone()
    }

    pub fn updated(&self) -> Vec<(Option<String>, String, CertificateOptions)> {
        self.updated.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<(Option<String>, String)> {
        self.deleted.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), RemoteError> {
        match *self.failure.lock().unwrap() {
            Some(ref error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl CertificateManager for FakeCertificateManager {
    fn describe_certificate(&self, region: Option<&str>, arn: &str) -> Result<Certificate, RemoteError> {
        self.describe_calls.lock().unwrap().push((region.map(Into::into), arn.into()));
        let mut answers = self.describe.lock().unwrap();
        let answer = if answers.len() > 1 { answers.pop_front() } else { answers.front().cloned() };
        answer.unwrap_or_else(|| Err(RemoteError::new(format!("ResourceNotFoundException: Could not find certificate {}", arn))))
    }

    fn request_certificate(&self, region: Option<&str>, request: &CertificateRequest) -> Result<String, RemoteError> {
        self.check_failure()?;
        let mut requested = self.requested.lock().unwrap();
        requested.push((region.map(Into::into), request.clone()));
        Ok(format!("arn:aws:acm:{}:111111111111:certificate/{}", region.unwrap_or("us-east-1"), requested.len()))
    }

    fn update_certificate_options(&self, region: Option<&str>, arn: &str, options: &CertificateOptions) -> Result<(), RemoteError> {
        self.check_failure()?;
        self.updated.lock().unwrap().push((region.map(Into::into), arn.into(), options.clone()));
        Ok(())
    }

    fn delete_certificate(&self, region: Option<&str>, arn: &str) -> Result<(), RemoteError> {
        self.check_failure()?;
        self.deleted.lock().unwrap().push((region.map(Into::into), arn.into()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingInvoker {
    calls: Mutex<Vec<(String, Value)>>,
    fail: bool,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn failing() -> Self {
        RecordingInvoker { fail: true, ..Default::default() }
    }

    /// Function names and decoded payloads, in invocation order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

impl FunctionInvoker for RecordingInvoker {
    fn invoke_async(&self, function_name: &str, payload: &[u8]) -> Result<(), RemoteError> {
        if self.fail {
            return Err(RemoteError::new("TooManyRequestsException: Rate Exceeded."));
        }
        let payload = serde_json::from_slice(payload).map_err(|e| RemoteError::new(e.to_string()))?;
        self.calls.lock().unwrap().push((function_name.into(), payload));
        Ok(())
    }
}
