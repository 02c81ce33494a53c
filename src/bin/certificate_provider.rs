use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use lambda_runtime::{service_fn, LambdaEvent};
use log::{debug, info};
use serde_json::Value;

use cfn_certificate_provider::aws::{AcmCertificateManager, LambdaFunctionInvoker};
use cfn_certificate_provider::{certificate_dispatcher, Config, Context, Dispatcher, Error, HttpTransport};

fn context(context: &lambda_runtime::Context) -> Context {
    Context {
        request_id: context.request_id.clone(),
        invoked_function_arn: context.invoked_function_arn.clone(),
        deadline: Some(UNIX_EPOCH + Duration::from_millis(context.deadline)),
    }
}

async fn handle_request(dispatcher: Arc<Dispatcher>, event: LambdaEvent<Value>) -> Result<Value, Error> {
    let context = context(&event.context);
    debug!("invocation {} has {:?} left", context.request_id, context.remaining_time());

    let response = tokio::task::block_in_place(|| dispatcher.handle(event.payload, context))?;
    Ok(serde_json::to_value(response)?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env()?;
    #[cfg(feature = "env_logger")]
    env_logger::Builder::new().parse_filters(&config.log_level).init();

    let sdk = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let dispatcher = Arc::new(certificate_dispatcher(
        Arc::new(AcmCertificateManager::new(sdk.clone())),
        Arc::new(LambdaFunctionInvoker::new(&sdk)),
        Box::new(HttpTransport::new()),
        &config,
    ));
    info!("serving {}", dispatcher.resource_types().join(", "));

    lambda_runtime::run(service_fn(move |event| handle_request(dispatcher.clone(), event))).await
}
