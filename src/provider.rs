//! The custom resource lifecycle shared by every provider.
//!
//! A request is handled in one pass: it is checked against the CloudFormation
//! request schema, its `ResourceProperties` are validated against the
//! provider's own schema (which fills in defaults), the resource type is
//! matched against the provider, and the matching lifecycle hook runs. The
//! resulting response is then PUT to the request's `ResponseURL`, unless the
//! provider went asynchronous and left that to a later invocation.

use std::sync::LazyLock;
use serde_json::{self, json, Value};

use crate::error::ProviderError;
use crate::map::JsonObject;
use crate::model::{Context, Request, RequestType, Response, Status};
use crate::protocol;
use crate::response::{DeliveryError, ResponseTransport};
use crate::schema::{self, ValidationError};
use crate::Error;

/// Physical resource id reported when a Create fails before the provider set
/// one, so that CloudFormation can still send a matching Delete.
pub const PHYSICAL_RESOURCE_ID_FAILURE: &str = "could-not-create";

static PERMISSIVE_SCHEMA: LazyLock<Value> = LazyLock::new(|| json!({"type": "object"}));
static EMPTY_PROPERTIES: LazyLock<JsonObject> = LazyLock::new(JsonObject::new);

/// A custom resource implementation.
///
/// The hooks record their outcome on the [`Invocation`]. Returning an error
/// fails the request with the error's message.
pub trait ResourceProvider: Send + Sync {
    /// The custom resource type handled, e.g. `Custom::Certificate`.
    fn resource_type(&self) -> &str;

    /// Schema for `ResourceProperties`. Declared defaults are filled in.
    fn request_schema(&self) -> &Value {
        &PERMISSIVE_SCHEMA
    }

    /// Runs before the properties are validated.
    fn convert_property_types(&self, _properties: &mut JsonObject) {
    }

    fn create(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        invocation.fail(format!("create not implemented by {}", self.resource_type()));
        Ok(())
    }

    fn update(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        invocation.fail(format!("update not implemented by {}", self.resource_type()));
        Ok(())
    }

    fn delete(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
        invocation.success_with_reason(format!("delete not implemented by {}", self.resource_type()));
        Ok(())
    }
}

/// The state of one request being handled: the request, the response being
/// built for it and whether sending that response has been deferred.
#[derive(Clone, Default, Debug)]
pub struct Invocation {
    request: Request,
    response: Response,
    context: Context,
    asynchronous: bool,
}

impl Invocation {
    pub fn new(request: Request, context: Context) -> Self {
        let mut invocation = Invocation::default();
        invocation.set_request(request, context);
        invocation
    }

    /// Starts over with `request`, with a successful response that echoes its identifiers.
    pub fn set_request(&mut self, request: Request, context: Context) {
        self.response = Response::for_request(&request);
        self.request = request;
        self.context = context;
        self.asynchronous = false;
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn request_type(&self) -> Option<RequestType> {
        self.request.request_type()
    }

    pub fn resource_type(&self) -> &str {
        self.request.resource_type()
    }

    pub fn stack_id(&self) -> &str {
        self.request.stack_id()
    }

    pub fn request_id(&self) -> &str {
        self.request.request_id()
    }

    pub fn logical_resource_id(&self) -> &str {
        self.request.logical_resource_id()
    }

    pub fn response_url(&self) -> Option<&str> {
        self.request.response_url()
    }

    pub fn properties(&self) -> &JsonObject {
        self.request.resource_properties().unwrap_or(&EMPTY_PROPERTIES)
    }

    pub fn properties_mut(&mut self) -> Option<&mut JsonObject> {
        self.request.resource_properties_mut()
    }

    /// Empty unless this is an Update.
    pub fn old_properties(&self) -> &JsonObject {
        self.request.old_resource_properties().unwrap_or(&EMPTY_PROPERTIES)
    }

    pub fn has_old_properties(&self) -> bool {
        self.request.has_old_resource_properties()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties().get(name)
    }

    pub fn get_or(&self, name: &str, default: Value) -> Value {
        self.get(name).cloned().unwrap_or(default)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_old(&self, name: &str) -> Option<&Value> {
        self.old_properties().get(name)
    }

    pub fn get_old_or(&self, name: &str, default: Value) -> Value {
        self.get_old(name).cloned().unwrap_or(default)
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn into_response(self) -> Response {
        self.response
    }

    pub fn physical_resource_id(&self) -> Option<&str> {
        self.response.physical_resource_id.as_deref()
    }

    pub fn set_physical_resource_id<S: Into<String>>(&mut self, physical_resource_id: S) {
        self.response.physical_resource_id = Some(physical_resource_id.into());
    }

    pub fn status(&self) -> Status {
        self.response.status
    }

    pub fn set_status(&mut self, status: Status) {
        self.response.status = status;
    }

    pub fn reason(&self) -> &str {
        &self.response.reason
    }

    pub fn set_reason<S: Into<String>>(&mut self, reason: S) {
        self.response.reason = reason.into();
    }

    pub fn no_echo(&self) -> Option<bool> {
        self.response.no_echo
    }

    pub fn set_no_echo(&mut self, no_echo: bool) {
        self.response.no_echo = Some(no_echo);
    }

    /// Sets an attribute that the template can read with `Fn::GetAtt`.
    pub fn set_attribute<S: Into<String>, V: Into<Value>>(&mut self, name: S, value: V) {
        self.response.data.insert(name.into(), value.into());
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Value> {
        self.response.data.get(name)
    }

    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    /// While set, no response is sent for this invocation.
    pub fn set_asynchronous(&mut self, asynchronous: bool) {
        self.asynchronous = asynchronous;
    }

    /// Marks the request successful, keeping the current reason.
    pub fn success(&mut self) {
        self.response.status = Status::Success;
    }

    pub fn success_with_reason<S: Into<String>>(&mut self, reason: S) {
        self.response.status = Status::Success;
        self.response.reason = reason.into();
    }

    pub fn fail<S: Into<String>>(&mut self, reason: S) {
        self.response.status = Status::Failed;
        self.response.reason = reason.into();
    }

    /// Checks the request against the CloudFormation request schema, failing
    /// the response if it does not conform.
    pub fn is_valid_cfn_request(&mut self) -> bool {
        let request = self.request.as_map().clone().into_value();
        match protocol::check_request(&request) {
            Ok(()) => true,
            Err(e) => {
                self.fail(format!("invalid CloudFormation Request received: {}", e));
                false
            },
        }
    }

    /// Checks the response against the CloudFormation response schema. A
    /// malformed response is only logged; the status is left alone.
    pub fn is_valid_cfn_response(&self) -> bool {
        let result = serde_json::to_value(&self.response)
            .map_err(|e| ValidationError::Schema(e.to_string()))
            .and_then(|response| protocol::check_response(&response));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("invalid CloudFormation response created: {}", e);
                false
            },
        }
    }

    /// Converts and validates the resource properties against the provider's
    /// schema, filling in defaults. Fails the response if they are invalid.
    pub fn is_valid_request(&mut self, provider: &dyn ResourceProvider) -> bool {
        let result = match self.request.resource_properties_value_mut() {
            Some(properties) => {
                if let Value::Object(ref mut object) = *properties {
                    provider.convert_property_types(object);
                }
                schema::validate(properties, provider.request_schema())
            },
            None => Err(ValidationError::Invalid {
                path: String::new(),
                message: "\"ResourceProperties\" is a required property".into(),
            }),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                self.fail(format!("invalid resource properties: {}", e));
                false
            },
        }
    }

    pub fn is_supported_resource_type(&self, provider: &dyn ResourceProvider) -> bool {
        self.resource_type() == provider.resource_type()
    }

    pub fn is_supported_request(&mut self, provider: &dyn ResourceProvider) -> bool {
        let supported = self.is_supported_resource_type(provider);
        if !supported {
            let reason = format!("ResourceType {} not supported by provider {}", self.resource_type(), provider.resource_type());
            self.fail(reason);
        }
        supported
    }
}

/// Validates the request and runs the matching lifecycle hook.
///
/// An invalid Delete is reported as successful: failing it would keep the
/// stack from ever removing a resource that was never created.
pub fn execute(provider: &dyn ResourceProvider, invocation: &mut Invocation) -> Result<(), ProviderError> {
    if invocation.is_valid_cfn_request() && invocation.is_valid_request(provider) && invocation.is_supported_request(provider) {
        match invocation.request_type() {
            Some(RequestType::Create) => provider.create(invocation)?,
            Some(RequestType::Update) => provider.update(invocation)?,
            request_type => {
                debug_assert_eq!(request_type, Some(RequestType::Delete));
                provider.delete(invocation)?
            },
        }

        invocation.is_valid_cfn_response();
    } else if invocation.request_type() == Some(RequestType::Delete) {
        warn!("ignoring invalid delete request: {}", invocation.reason());
        invocation.success_with_reason("ignoring invalid delete request");
    }

    Ok(())
}

/// Handles one request end to end and returns the response it produced.
///
/// Errors from the hooks are turned into a failed response. The response is
/// sent to the `ResponseURL` unless the invocation went asynchronous; failing
/// to send it is the only error returned.
pub fn handle(provider: &dyn ResourceProvider, transport: &dyn ResponseTransport, request: Request, context: Context) -> Result<Response, Error> {
    debug!("received request {}", serde_json::to_string(request.as_map()).unwrap_or_default());

    let mut invocation = Invocation::new(request, context);
    if let Err(e) = execute(provider, &mut invocation) {
        error!("exception occurred processing the request: {}", e);
        recover(&mut invocation, &e);
    }

    if !invocation.is_asynchronous() {
        send_response(&invocation, transport)?;
    }

    Ok(invocation.into_response())
}

fn recover(invocation: &mut Invocation, error: &ProviderError) {
    if invocation.request_type() == Some(RequestType::Create) && invocation.physical_resource_id().is_none() {
        invocation.set_physical_resource_id(PHYSICAL_RESOURCE_ID_FAILURE);
    }
    if invocation.status() == Status::Success {
        invocation.fail(error.to_string());
    }
}

/// Sends the current response to the request's `ResponseURL`.
pub fn send_response(invocation: &Invocation, transport: &dyn ResponseTransport) -> Result<(), Error> {
    let url = invocation.request().parsed_response_url().map_err(DeliveryError::from)?;
    debug!("sending response to {} -> {}", url, serde_json::to_string(invocation.response()).unwrap_or_default());
    transport.send(&url, invocation.response())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use crate::testing::{request, RecordingTransport};
    use super::*;

    struct TestProvider {
        schema: Value,
        create: fn(&mut Invocation) -> Result<(), ProviderError>,
    }

    impl TestProvider {
        fn new() -> Self {
            TestProvider {
                schema: json!({
                    "type": "object",
                    "required": ["Name"],
                    "properties": {
                        "Name": {"type": "string"},
                        "Size": {"type": "integer", "default": 3},
                    }
                }),
                create: |invocation| {
                    let size = invocation.get_or("Size", json!(0));
                    invocation.set_physical_resource_id("test-resource");
                    invocation.set_attribute("Size", size);
                    Ok(())
                },
            }
        }
    }

    impl ResourceProvider for TestProvider {
        fn resource_type(&self) -> &str {
            "Custom::Test"
        }

        fn request_schema(&self) -> &Value {
            &self.schema
        }

        fn create(&self, invocation: &mut Invocation) -> Result<(), ProviderError> {
            (self.create)(invocation)
        }
    }

    struct Unimplemented;

    impl ResourceProvider for Unimplemented {
        fn resource_type(&self) -> &str {
            "Custom::Unimplemented"
        }
    }

    fn invocation(request_type: &str, properties: Value) -> Invocation {
        Invocation::new(request(request_type, "Custom::Test", properties), Context::default())
    }

    #[test]
    fn set_request_resets_the_response() {
        let mut invocation = invocation("Update", json!({"Name": "a"}));
        invocation.fail("earlier failure");
        invocation.set_asynchronous(true);

        let mut next = request("Delete", "Custom::Test", json!({"Name": "a"})).into_value();
        next["PhysicalResourceId"] = json!("existing-id");
        invocation.set_request(Request::from_value(next).unwrap(), Context::default());

        assert_eq!(invocation.status(), Status::Success);
        assert_eq!(invocation.reason(), "");
        assert!(!invocation.is_asynchronous());
        assert_eq!(invocation.physical_resource_id(), Some("existing-id"));
        assert_eq!(invocation.response().stack_id, invocation.stack_id());
        assert_eq!(invocation.response().logical_resource_id, "Resource");
        assert!(invocation.response().data.is_empty());
    }

    #[test]
    fn property_accessors() {
        let mut update = request("Update", "Custom::Test", json!({"Name": "new"})).into_value();
        update["OldResourceProperties"] = json!({"Name": "old"});
        let update = Invocation::new(Request::from_value(update).unwrap(), Context::default());

        assert_eq!(update.get_str("Name"), Some("new"));
        assert_eq!(update.get_old("Name"), Some(&json!("old")));
        assert_eq!(update.get_or("Missing", json!(1)), json!(1));
        assert_eq!(update.get_old_or("Missing", json!(2)), json!(2));
        assert!(update.has_old_properties());

        let create = invocation("Create", json!({"Name": "a"}));
        assert!(create.old_properties().is_empty());
        assert!(!create.has_old_properties());
    }

    #[test]
    fn success_and_fail_set_status_and_reason() {
        let mut invocation = invocation("Create", json!({"Name": "a"}));

        invocation.fail("it broke");
        assert_eq!(invocation.status(), Status::Failed);
        assert_eq!(invocation.reason(), "it broke");

        invocation.success_with_reason("fixed");
        assert_eq!(invocation.status(), Status::Success);
        assert_eq!(invocation.reason(), "fixed");

        invocation.fail("again");
        invocation.success();
        assert_eq!(invocation.status(), Status::Success);

        invocation.set_no_echo(true);
        assert_eq!(invocation.no_echo(), Some(true));
        invocation.set_attribute("Arn", "arn");
        assert_eq!(invocation.get_attribute("Arn"), Some(&json!("arn")));
        assert_eq!(invocation.get_attribute("Missing"), None);
    }

    #[test]
    fn create_runs_hook_with_defaults_injected() {
        let provider = TestProvider::new();
        let mut invocation = invocation("Create", json!({"Name": "a"}));

        execute(&provider, &mut invocation).unwrap();

        assert_eq!(invocation.status(), Status::Success, "{}", invocation.reason());
        assert_eq!(invocation.get("Size"), Some(&json!(3)));
        assert_eq!(invocation.get_attribute("Size"), Some(&json!(3)));
        assert_eq!(invocation.physical_resource_id(), Some("test-resource"));
    }

    #[test]
    fn invalid_properties_fail_without_calling_hook() {
        let provider = TestProvider::new();
        let mut invocation = invocation("Create", json!({"Size": 3}));

        execute(&provider, &mut invocation).unwrap();

        assert_eq!(invocation.status(), Status::Failed);
        assert!(invocation.reason().starts_with("invalid resource properties: "), "{}", invocation.reason());
        assert_eq!(invocation.physical_resource_id(), None);
    }

    #[test]
    fn invalid_delete_always_succeeds() {
        let provider = TestProvider::new();
        let mut invocation = invocation("Delete", json!({"Name": 42}));

        execute(&provider, &mut invocation).unwrap();

        assert_eq!(invocation.status(), Status::Success);
        assert_eq!(invocation.reason(), "ignoring invalid delete request");
    }

    #[test]
    fn malformed_cloudformation_request_fails() {
        let provider = TestProvider::new();
        let mut request = request("Create", "Custom::Test", json!({"Name": "a"})).into_value();
        request.as_object_mut().unwrap().remove("StackId");
        let mut invocation = Invocation::new(Request::from_value(request).unwrap(), Context::default());

        execute(&provider, &mut invocation).unwrap();

        assert_eq!(invocation.status(), Status::Failed);
        assert!(invocation.reason().starts_with("invalid CloudFormation Request received: "), "{}", invocation.reason());
    }

    #[test]
    fn unsupported_resource_type_fails() {
        let provider = TestProvider::new();
        let mut invocation = Invocation::new(request("Create", "Custom::Other", json!({"Name": "a"})), Context::default());

        assert!(!invocation.is_supported_resource_type(&provider));
        execute(&provider, &mut invocation).unwrap();

        assert_eq!(invocation.status(), Status::Failed);
        assert_eq!(invocation.reason(), "ResourceType Custom::Other not supported by provider Custom::Test");
    }

    #[test]
    fn default_hooks() {
        let provider = Unimplemented;
        for (request_type, status, reason) in [
            ("Create", Status::Failed, "create not implemented by Custom::Unimplemented"),
            ("Update", Status::Failed, "update not implemented by Custom::Unimplemented"),
            ("Delete", Status::Success, "delete not implemented by Custom::Unimplemented"),
        ] {
            let mut invocation = Invocation::new(request(request_type, "Custom::Unimplemented", json!({})), Context::default());
            execute(&provider, &mut invocation).unwrap();
            assert_eq!(invocation.status(), status);
            assert_eq!(invocation.reason(), reason);
        }
    }

    #[test]
    fn valid_response_passes_response_check() {
        let invocation = invocation("Create", json!({"Name": "a"}));
        assert!(invocation.is_valid_cfn_response());
    }

    #[test]
    fn response_missing_a_required_field_is_rejected() {
        let mut invocation = invocation("Create", json!({"Name": "a"}));
        invocation.fail("quota exceeded");
        assert!(invocation.is_valid_cfn_response());

        for field in ["Status", "Reason", "StackId", "RequestId", "LogicalResourceId", "Data"] {
            let mut response = serde_json::to_value(invocation.response()).unwrap();
            response.as_object_mut().unwrap().remove(field);
            assert!(protocol::check_response(&response).is_err(), "{}", field);
        }

        assert_eq!(invocation.status(), Status::Failed);
        assert_eq!(invocation.reason(), "quota exceeded");
    }

    #[test]
    fn handle_sends_the_response() {
        let provider = TestProvider::new();
        let transport = RecordingTransport::new();

        let response = handle(&provider, &transport, request("Create", "Custom::Test", json!({"Name": "a"})), Context::default()).unwrap();

        assert_eq!(response.status, Status::Success);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.as_str(), "https://cloudformation-custom-resource-response.example.com/response");
        assert_eq!(sent[0].1, response);
    }

    #[test]
    fn handle_turns_hook_errors_into_failures() {
        let mut provider = TestProvider::new();
        provider.create = |_| Err(ProviderError::precondition("certificate is gone"));
        let transport = RecordingTransport::new();

        let response = handle(&provider, &transport, request("Create", "Custom::Test", json!({"Name": "a"})), Context::default()).unwrap();

        assert_eq!(response.status, Status::Failed);
        assert_eq!(response.reason, "certificate is gone");
        assert_eq!(response.physical_resource_id.as_deref(), Some(PHYSICAL_RESOURCE_ID_FAILURE));
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn handle_keeps_an_earlier_failure_reason() {
        let mut provider = TestProvider::new();
        provider.create = |invocation| {
            invocation.set_physical_resource_id("partial");
            invocation.fail("first problem");
            Err(ProviderError::precondition("second problem"))
        };
        let transport = RecordingTransport::new();

        let response = handle(&provider, &transport, request("Create", "Custom::Test", json!({"Name": "a"})), Context::default()).unwrap();

        assert_eq!(response.reason, "first problem");
        assert_eq!(response.physical_resource_id.as_deref(), Some("partial"));
    }

    #[test]
    fn asynchronous_invocations_send_nothing() {
        let mut provider = TestProvider::new();
        provider.create = |invocation| {
            invocation.set_asynchronous(true);
            Ok(())
        };
        let transport = RecordingTransport::new();

        handle(&provider, &transport, request("Create", "Custom::Test", json!({"Name": "a"})), Context::default()).unwrap();

        assert!(transport.sent().is_empty());
    }

    #[test]
    fn delivery_failure_is_returned() {
        let provider = TestProvider::new();
        let transport = RecordingTransport::rejecting();

        let result = handle(&provider, &transport, request("Create", "Custom::Test", json!({"Name": "a"})), Context::default());

        assert!(result.is_err());
    }
}
