use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use serde_json::{self, json, Value};

use crate::certificate::{arn_region, is_certificate_arn, CertificateManager, CertificateOptions, CertificateRequest};
use crate::error::ProviderError;
use crate::provider::{Invocation, ResourceProvider};
use crate::SERVICE_TOKEN_KEY;

pub const RESOURCE_TYPE: &str = "Custom::Certificate";

/// Physical resource id of a certificate the service refused to create.
pub const PHYSICAL_RESOURCE_ID_FAILED: &str = "failed-to-create";

static REQUEST_SCHEMA: LazyLock<Value> = LazyLock::new(|| json!({
    "type": "object",
    "required": ["DomainName", "ValidationMethod"],
    "additionalProperties": true,
    "properties": {
        "DomainName": {"type": "string", "description": "to create"},
        "ValidationMethod": {
            "type": "string",
            "enum": ["DNS"],
            "description": "to get the DNS validation record for"
        },
        "SubjectAlternativeNames": {"type": "array", "items": {"type": "string"}},
        "DomainValidationOptions": {
            "type": "array",
            "items": {
                "type": "object",
                "required": ["DomainName", "ValidationDomain"],
                "properties": {
                    "DomainName": {"type": "string"},
                    "ValidationDomain": {"type": "string"}
                }
            }
        },
        "Options": {
            "type": "object",
            "properties": {
                "CertificateTransparencyLoggingPreference": {"type": "string", "enum": ["ENABLED", "DISABLED"]}
            }
        },
        "Region": {"type": "string"},
        "IdempotencyToken": {"type": "string"},
        "CertificateAuthorityArn": {"type": "string"},
        "KeyAlgorithm": {"type": "string"},
        "Tags": {
            "type": "array",
            "items": {
                "type": "object",
                "required": ["Key"],
                "properties": {
                    "Key": {"type": "string"},
                    "Value": {"type": "string"}
                }
            }
        },
        "ServiceToken": {"type": "string"}
    }
}));

/// Requests a DNS-validated certificate and returns as soon as the request has
/// been accepted, with the certificate ARN as physical resource id.
///
/// Only `DomainName` and `Options` can be updated. A new `DomainName` replaces
/// the certificate.
pub struct CertificateProvider {
    certificates: Arc<dyn CertificateManager>,
}

impl CertificateProvider {
    pub fn new(certificates: Arc<dyn CertificateManager>) -> Self {
        CertificateProvider {
            certificates: certificates,
        }
    }

    fn request_certificate(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        let mut arguments = invocation.properties().clone();
        let region = arguments.remove("Region").and_then(|region| region.as_str().map(String::from));
        arguments.remove(SERVICE_TOKEN_KEY);

        // Makes a retried Create return the certificate requested the first time.
        if !arguments.contains_key("IdempotencyToken") {
            arguments.insert("IdempotencyToken".into(), invocation.logical_resource_id().into());
        }

        let request: CertificateRequest = serde_json::from_value(Value::Object(arguments))?;
        let arn = self.certificates.request_certificate(region.as_deref(), &request)?;
        info!("requested certificate {} for {}", arn, request.domain_name);
        invocation.set_physical_resource_id(arn);
        Ok(())
    }

    fn update_options(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        let arn = match invocation.physical_resource_id() {
            Some(arn) if is_certificate_arn(arn) => arn.to_owned(),
            id => return Err(ProviderError::precondition(format!("cannot update the options of certificate {}", id.unwrap_or("<none>")))),
        };
        let options: CertificateOptions = match invocation.get("Options") {
            Some(options) => serde_json::from_value(options.clone())?,
            None => Default::default(),
        };
        let region = invocation.get_str("Region").or_else(|| arn_region(&arn)).map(String::from);

        if let Err(e) = self.certificates.update_certificate_options(region.as_deref(), &arn, &options) {
            invocation.fail(e.to_string());
        }
        Ok(())
    }
}

/// Names of the properties that were added, removed or given a new value.
fn changed_properties(invocation: &Invocation) -> BTreeSet<String> {
    let new_names: BTreeSet<&str> = invocation.properties().keys()
        .map(String::as_str)
        .filter(|&name| name != SERVICE_TOKEN_KEY)
        .collect();
    let old_names: BTreeSet<&str> = if invocation.has_old_properties() {
        invocation.old_properties().keys()
            .map(String::as_str)
            .filter(|&name| name != SERVICE_TOKEN_KEY)
            .collect()
    } else {
        new_names.clone()
    };

    let added_or_removed = new_names.symmetric_difference(&old_names).cloned();
    let modified = new_names.intersection(&old_names)
        .cloned()
        .filter(|&name| invocation.get(name) != invocation.get_old(name).or_else(|| invocation.get(name)));

    added_or_removed.chain(modified).map(String::from).collect()
}

impl ResourceProvider for CertificateProvider {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    fn request_schema(&self) -> &Value {
        &REQUEST_SCHEMA
    }

    fn create(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        match self.request_certificate(invocation) {
            Err(ProviderError::Remote(e)) => {
                invocation.fail(e.to_string());
                invocation.set_physical_resource_id(PHYSICAL_RESOURCE_ID_FAILED);
                Ok(())
            },
            result => result,
        }
    }

    fn update(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        let changed = changed_properties(invocation);

        if changed.contains("DomainName") {
            match self.request_certificate(invocation) {
                Err(ProviderError::Remote(e)) => {
                    invocation.fail(e.to_string());
                    Ok(())
                },
                result => result,
            }
        } else if changed.len() == 1 && changed.contains("Options") {
            self.update_options(invocation)
        } else if !changed.is_empty() {
            let names: Vec<&str> = changed.iter().map(String::as_str).collect();
            invocation.fail(format!(
                "You can only change the \"Options\" and \"DomainName\" of a certificate, you tried to change {}",
                names.join(", ")
            ));
            Ok(())
        } else {
            invocation.success_with_reason("nothing to change");
            Ok(())
        }
    }

    /// Deletion never fails: a certificate that cannot be deleted must not
    /// keep the stack from being removed.
    fn delete(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        let arn = match invocation.physical_resource_id() {
            Some(arn) if is_certificate_arn(arn) => arn.to_owned(),
            _ => return Ok(()),
        };
        let region = invocation.get_str("Region").or_else(|| arn_region(&arn)).map(String::from);

        if let Err(e) = self.certificates.delete_certificate(region.as_deref(), &arn) {
            invocation.success_with_reason(format!("Ignore failure to delete certificate {}", e));
        }
        Ok(())
    }
}
