//! Routes requests to the provider registered for their resource type.

use serde_json::Value;

use crate::model::{Context, Request, RequestType, Response};
use crate::provider::{self, Invocation, ResourceProvider, PHYSICAL_RESOURCE_ID_FAILURE};
use crate::response::ResponseTransport;
use crate::Error;

pub struct Dispatcher {
    providers: Vec<Box<dyn ResourceProvider>>,
    transport: Box<dyn ResponseTransport>,
}

impl Dispatcher {
    pub fn new(transport: Box<dyn ResponseTransport>) -> Self {
        Dispatcher {
            providers: Vec::new(),
            transport: transport,
        }
    }

    /// Registers `provider` for its resource type. A later registration for
    /// the same type replaces the earlier one.
    pub fn with_provider<P: ResourceProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.retain(|p| p.resource_type() != provider.resource_type());
        self.providers.push(Box::new(provider));
        self
    }

    pub fn provider(&self, resource_type: &str) -> Option<&dyn ResourceProvider> {
        self.providers.iter()
            .find(|p| p.resource_type() == resource_type)
            .map(|p| &**p)
    }

    pub fn resource_types(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.resource_type()).collect()
    }

    /// Handles a raw CloudFormation event.
    pub fn handle(&self, event: Value, context: Context) -> Result<Response, Error> {
        let request = crate::decode_event(event)?;
        match self.provider(request.resource_type()) {
            Some(provider) => provider::handle(provider, &*self.transport, request, context),
            None => self.unhandled(request, context),
        }
    }

    fn unhandled(&self, request: Request, context: Context) -> Result<Response, Error> {
        let mut invocation = Invocation::new(request, context);
        match invocation.request_type() {
            Some(RequestType::Delete) => invocation.success(),
            request_type => {
                if request_type == Some(RequestType::Create) && invocation.physical_resource_id().is_none() {
                    invocation.set_physical_resource_id(PHYSICAL_RESOURCE_ID_FAILURE);
                }
                let reason = format!("Unknown ResourceType {}", invocation.resource_type());
                warn!("{}", reason);
                invocation.fail(reason);
            },
        }

        provider::send_response(&invocation, &*self.transport)?;
        Ok(invocation.into_response())
    }
}
