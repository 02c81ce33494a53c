use std::sync::{Arc, LazyLock};
use std::thread;
use serde_json::{json, Value};

use crate::certificate::{certificate_arn, CertificateManager, ValidationOptionResolver};
use crate::config::PollingConfig;
use crate::error::ProviderError;
use crate::map::Map;
use crate::provider::{Invocation, ResourceProvider};

pub const RESOURCE_TYPE: &str = "Custom::CertificateDNSRecord";

static REQUEST_SCHEMA: LazyLock<Value> = LazyLock::new(|| json!({
    "type": "object",
    "required": ["CertificateArn"],
    "properties": {
        "CertificateArn": {
            "type": "string",
            "description": "to get the DNS record for"
        },
        "DomainName": {
            "type": "string",
            "description": "to get the DNS validation record for, default Certificate's Domain name"
        }
    }
}));

/// Returns the DNS record that validates one domain of a certificate.
///
/// The record is returned as the `Name`, `Type` and `Value` attributes, with
/// the record name as physical resource id. The certificate service fills in
/// the record a little while after the certificate was requested, so it is
/// polled for until it shows up.
pub struct CertificateDnsRecordProvider {
    resolver: ValidationOptionResolver,
    polling: PollingConfig,
}

impl CertificateDnsRecordProvider {
    pub fn new(certificates: Arc<dyn CertificateManager>, polling: PollingConfig) -> Self {
        CertificateDnsRecordProvider {
            resolver: ValidationOptionResolver::new(certificates),
            polling: polling,
        }
    }

    fn poll_for_resource_record(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        let arn = certificate_arn(invocation)?;
        let domain_name = invocation.get_str("DomainName").map(String::from);

        let mut attempt = 1;
        let record = loop {
            let option = self.resolver.dns_validation_option(&arn, domain_name.as_deref())?;
            if let Some(record) = option.resource_record {
                break record;
            }

            if attempt >= self.polling.max_attempts {
                return Err(ProviderError::precondition(format!(
                    "no DNS validation record for {} appeared after {} attempts", option.domain_name, attempt
                )));
            }
            if !invocation.context().has_time_for(self.polling.interval) {
                return Err(ProviderError::precondition(format!(
                    "invocation timed out waiting for the DNS validation record for {}", option.domain_name
                )));
            }

            info!("waiting for resource record of {} to appear (attempt {})", option.domain_name, attempt);
            thread::sleep(self.polling.interval);
            attempt += 1;
        };

        invocation.response_mut().data = Map::serialize_from(&record)?;
        invocation.set_physical_resource_id(record.name);
        Ok(())
    }
}

impl ResourceProvider for CertificateDnsRecordProvider {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    fn request_schema(&self) -> &Value {
        &REQUEST_SCHEMA
    }

    fn create(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        self.poll_for_resource_record(invocation)
    }

    fn update(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        self.poll_for_resource_record(invocation)
    }

    fn delete(&self, _invocation: &mut Invocation) -> Result<(), ProviderError> {
        Ok(())
    }
}
