//! Certificate resources backed by a certificate-management service.
//!
//! * [`CertificateProvider`] requests a DNS-validated certificate and returns
//!   as soon as the request is accepted.
//! * [`CertificateDnsRecordProvider`] waits for the DNS record that proves
//!   domain ownership and returns it as resource attributes.
//! * [`IssuedCertificateProvider`] completes only once the certificate has
//!   been issued, re-invoking the function while validation is pending.

use std::fmt;
use std::sync::Arc;

use crate::error::{ProviderError, RemoteError};
use crate::provider::Invocation;

mod certificate_provider;
mod dns_record_provider;
mod issued_provider;

pub use self::certificate_provider::CertificateProvider;
pub use self::dns_record_provider::CertificateDnsRecordProvider;
pub use self::issued_provider::{Continuation, IssuedCertificateProvider};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CertificateStatus {
    PendingValidation,
    Issued,
    Other(String),
}

impl CertificateStatus {
    pub fn as_str(&self) -> &str {
        match *self {
            CertificateStatus::PendingValidation => "PENDING_VALIDATION",
            CertificateStatus::Issued => "ISSUED",
            CertificateStatus::Other(ref status) => status,
        }
    }
}

impl<'a> From<&'a str> for CertificateStatus {
    fn from(status: &'a str) -> Self {
        match status {
            "PENDING_VALIDATION" => CertificateStatus::PendingValidation,
            "ISSUED" => CertificateStatus::Issued,
            other => CertificateStatus::Other(other.into()),
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The DNS record a certificate authority wants published before it issues
/// a certificate. Serialized as the `Name`, `Type` and `Value` attributes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceRecord {
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainValidationOption {
    pub domain_name: String,
    pub validation_status: Option<String>,
    pub validation_method: Option<String>,
    /// Not filled in until some time after the certificate was requested.
    pub resource_record: Option<ResourceRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Certificate {
    pub arn: String,
    pub domain_name: String,
    pub status: CertificateStatus,
    pub validation_options: Vec<DomainValidationOption>,
}

impl Certificate {
    /// The validation option for `domain_name`, or for the certificate's own
    /// domain name if none is given.
    pub fn validation_option(&self, domain_name: Option<&str>) -> Option<&DomainValidationOption> {
        let domain_name = domain_name.filter(|name| !name.is_empty()).unwrap_or(&self.domain_name);
        self.validation_options.iter().find(|option| option.domain_name == domain_name)
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} - {}", self.domain_name, self.arn)
    }
}

/// Arguments for requesting a certificate, read from the resource properties.
/// Properties that cannot be passed on are rejected.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct CertificateRequest {
    pub domain_name: String,
    pub validation_method: String,
    pub subject_alternative_names: Option<Vec<String>>,
    pub idempotency_token: Option<String>,
    #[serde(default)]
    pub domain_validation_options: Vec<ValidationDomain>,
    pub options: Option<CertificateOptions>,
    pub certificate_authority_arn: Option<String>,
    pub key_algorithm: Option<String>,
    pub tags: Option<Vec<Tag>>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Tag {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ValidationDomain {
    pub domain_name: String,
    pub validation_domain: String,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct CertificateOptions {
    pub certificate_transparency_logging_preference: Option<String>,
}

/// The certificate-management operations the providers rely on. A `region`
/// of `None` means the client's default region.
pub trait CertificateManager: Send + Sync {
    fn describe_certificate(&self, region: Option<&str>, arn: &str) -> Result<Certificate, RemoteError>;

    /// Returns the ARN of the requested certificate.
    fn request_certificate(&self, region: Option<&str>, request: &CertificateRequest) -> Result<String, RemoteError>;

    fn update_certificate_options(&self, region: Option<&str>, arn: &str, options: &CertificateOptions) -> Result<(), RemoteError>;

    fn delete_certificate(&self, region: Option<&str>, arn: &str) -> Result<(), RemoteError>;
}

/// The region part of an ARN.
pub fn arn_region(arn: &str) -> Option<&str> {
    arn.split(':').nth(3).filter(|region| !region.is_empty())
}

/// Whether `id` is the ARN of a certificate in any AWS partition.
pub fn is_certificate_arn(id: &str) -> bool {
    let mut parts = id.splitn(4, ':');
    parts.next() == Some("arn")
        && parts.next().map_or(false, |partition| partition == "aws" || partition.starts_with("aws-"))
        && parts.next() == Some("acm")
}

/// Looks up certificates and their domain validation options.
#[derive(Clone)]
pub struct ValidationOptionResolver {
    certificates: Arc<dyn CertificateManager>,
}

impl ValidationOptionResolver {
    pub fn new(certificates: Arc<dyn CertificateManager>) -> Self {
        ValidationOptionResolver {
            certificates: certificates,
        }
    }

    /// The certificate, in whatever state it is.
    pub fn describe(&self, arn: &str) -> Result<Certificate, ProviderError> {
        self.certificates.describe_certificate(arn_region(arn), arn)
            .map_err(|e| ProviderError::precondition(e.to_string()))
    }

    /// The certificate, which must be pending validation or issued.
    pub fn certificate(&self, arn: &str) -> Result<Certificate, ProviderError> {
        let certificate = self.describe(arn)?;

        match certificate.status {
            CertificateStatus::PendingValidation | CertificateStatus::Issued => Ok(certificate),
            ref status => Err(ProviderError::precondition(format!(
                "certificate {} is in state {}, expected PENDING_VALIDATION or ISSUED", arn, status
            ))),
        }
    }

    pub fn validation_option(&self, arn: &str, domain_name: Option<&str>) -> Result<DomainValidationOption, ProviderError> {
        let certificate = self.certificate(arn)?;
        certificate.validation_option(domain_name).cloned().ok_or_else(|| ProviderError::precondition(format!(
            "No validation option found for domain {}", domain_name.unwrap_or(&certificate.domain_name)
        )))
    }

    /// Like [`validation_option`](Self::validation_option), but the domain must be validated through DNS.
    pub fn dns_validation_option(&self, arn: &str, domain_name: Option<&str>) -> Result<DomainValidationOption, ProviderError> {
        let option = self.validation_option(arn, domain_name)?;
        match option.validation_method.as_deref() {
            Some("DNS") => Ok(option),
            method => Err(ProviderError::precondition(format!(
                "domain is using validation method {}, not DNS", method.unwrap_or("unknown")
            ))),
        }
    }
}

fn certificate_arn(invocation: &Invocation) -> Result<String, ProviderError> {
    invocation.get_str("CertificateArn")
        .map(Into::into)
        .ok_or_else(|| ProviderError::precondition("CertificateArn is required"))
}
