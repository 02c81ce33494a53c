//! Certificate Manager and Lambda clients over the AWS SDK.

use aws_config::SdkConfig;
use aws_sdk_acm::config::Region;
use aws_sdk_acm::error::DisplayErrorContext;
use aws_sdk_acm::types as acm;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;

use crate::certificate::{Certificate, CertificateManager, CertificateOptions, CertificateRequest, DomainValidationOption, ResourceRecord};
use crate::error::RemoteError;
use crate::invoke::FunctionInvoker;

fn remote_error<E: std::error::Error>(error: E) -> RemoteError {
    RemoteError::new(DisplayErrorContext(error).to_string())
}

/// ACM client for the region of each call.
pub struct AcmCertificateManager {
    sdk: SdkConfig,
}

impl AcmCertificateManager {
    pub fn new(sdk: SdkConfig) -> Self {
        AcmCertificateManager {
            sdk: sdk,
        }
    }

    fn client(&self, region: Option<&str>) -> aws_sdk_acm::Client {
        let mut config = aws_sdk_acm::config::Builder::from(&self.sdk);
        if let Some(region) = region {
            config = config.region(Region::new(region.to_owned()));
        }
        aws_sdk_acm::Client::from_conf(config.build())
    }
}

fn certificate_detail(detail: &acm::CertificateDetail) -> Certificate {
    Certificate {
        arn: detail.certificate_arn().unwrap_or_default().into(),
        domain_name: detail.domain_name().unwrap_or_default().into(),
        status: detail.status().map(|s| s.as_str()).unwrap_or_default().into(),
        validation_options: detail.domain_validation_options().iter().map(|option| DomainValidationOption {
            domain_name: option.domain_name().into(),
            validation_status: option.validation_status().map(|s| s.as_str().into()),
            validation_method: option.validation_method().map(|m| m.as_str().into()),
            resource_record: option.resource_record().map(|record| ResourceRecord {
                name: record.name().into(),
                record_type: record.r#type().as_str().into(),
                value: record.value().into(),
            }),
        }).collect(),
    }
}

fn certificate_options(options: &CertificateOptions) -> acm::CertificateOptions {
    acm::CertificateOptions::builder()
        .set_certificate_transparency_logging_preference(options.certificate_transparency_logging_preference.as_deref()
            .map(acm::CertificateTransparencyLoggingPreference::from))
        .build()
}

impl CertificateManager for AcmCertificateManager {
    fn describe_certificate(&self, region: Option<&str>, arn: &str) -> Result<Certificate, RemoteError> {
        let client = self.client(region);
        let output = crate::block_on(client.describe_certificate().certificate_arn(arn).send())
            .map_err(remote_error)?;

        output.certificate()
            .map(certificate_detail)
            .ok_or_else(|| RemoteError::new(format!("no details returned for certificate {}", arn)))
    }

    fn request_certificate(&self, region: Option<&str>, request: &CertificateRequest) -> Result<String, RemoteError> {
        let validation_domains = request.domain_validation_options.iter()
            .map(|option| acm::DomainValidationOption::builder()
                .domain_name(&option.domain_name)
                .validation_domain(&option.validation_domain)
                .build()
                .map_err(remote_error))
            .collect::<Result<Vec<_>, _>>()?;

        let tags = request.tags.as_ref()
            .map(|tags| tags.iter()
                .map(|tag| acm::Tag::builder()
                    .key(&tag.key)
                    .set_value(tag.value.clone())
                    .build()
                    .map_err(remote_error))
                .collect::<Result<Vec<_>, _>>())
            .transpose()?;

        let client = self.client(region);
        let call = client.request_certificate()
            .domain_name(&request.domain_name)
            .validation_method(acm::ValidationMethod::from(request.validation_method.as_str()))
            .set_subject_alternative_names(request.subject_alternative_names.clone())
            .set_idempotency_token(request.idempotency_token.clone())
            .set_domain_validation_options(Some(validation_domains).filter(|domains| !domains.is_empty()))
            .set_options(request.options.as_ref().map(certificate_options))
            .set_certificate_authority_arn(request.certificate_authority_arn.clone())
            .set_key_algorithm(request.key_algorithm.as_deref().map(acm::KeyAlgorithm::from))
            .set_tags(tags);

        let output = crate::block_on(call.send()).map_err(remote_error)?;
        output.certificate_arn()
            .map(String::from)
            .ok_or_else(|| RemoteError::new(format!("no certificate ARN returned for {}", request.domain_name)))
    }

    fn update_certificate_options(&self, region: Option<&str>, arn: &str, options: &CertificateOptions) -> Result<(), RemoteError> {
        let client = self.client(region);
        let call = client.update_certificate_options()
            .certificate_arn(arn)
            .options(certificate_options(options));
        crate::block_on(call.send()).map(|_| ()).map_err(remote_error)
    }

    fn delete_certificate(&self, region: Option<&str>, arn: &str) -> Result<(), RemoteError> {
        let client = self.client(region);
        crate::block_on(client.delete_certificate().certificate_arn(arn).send())
            .map(|_| ())
            .map_err(remote_error)
    }
}

/// Invokes functions with the `Event` invocation type, so the call returns
/// as soon as the event is queued.
pub struct LambdaFunctionInvoker {
    client: aws_sdk_lambda::Client,
}

impl LambdaFunctionInvoker {
    pub fn new(sdk: &SdkConfig) -> Self {
        LambdaFunctionInvoker {
            client: aws_sdk_lambda::Client::new(sdk),
        }
    }
}

impl FunctionInvoker for LambdaFunctionInvoker {
    fn invoke_async(&self, function_name: &str, payload: &[u8]) -> Result<(), RemoteError> {
        let call = self.client.invoke()
            .function_name(function_name)
            .invocation_type(InvocationType::Event)
            .payload(Blob::new(payload));

        crate::block_on(call.send())
            .map(|_| ())
            .map_err(remote_error)
    }
}
