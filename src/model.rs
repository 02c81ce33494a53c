use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use serde_json::Value;
use url::Url;
use crate::map::{JsonObject, Map};

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match *self {
            RequestType::Create => "Create",
            RequestType::Update => "Update",
            RequestType::Delete => "Delete",
        }
    }
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create" => Ok(RequestType::Create),
            "Update" => Ok(RequestType::Update),
            "Delete" => Ok(RequestType::Delete),
            _ => Err(format!("unknown RequestType {}", s)),
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Success,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Status::Success => "SUCCESS",
            Status::Failed => "FAILED",
        })
    }
}

/// An inbound custom resource request.
///
/// The request is kept as the raw JSON object it arrived as, so that it can be
/// validated against the CloudFormation request schema and forwarded verbatim
/// when the function re-invokes itself. The accessors return empty values for
/// fields that are missing or of the wrong type.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Debug)]
pub struct Request(Map);

impl Request {
    pub fn from_value(event: Value) -> Result<Self, serde_json::Error> {
        Map::from_value(event).map(Request)
    }

    pub fn as_map(&self) -> &Map {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0.into_value()
    }

    /// `None` when `RequestType` is missing or not one of the three known types.
    pub fn request_type(&self) -> Option<RequestType> {
        self.0.str("RequestType").and_then(|s| s.parse().ok())
    }

    pub fn response_url(&self) -> Option<&str> {
        self.0.str("ResponseURL")
    }

    pub fn parsed_response_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(self.response_url().unwrap_or_default())
    }

    pub fn stack_id(&self) -> &str {
        self.0.str("StackId").unwrap_or_default()
    }

    pub fn request_id(&self) -> &str {
        self.0.str("RequestId").unwrap_or_default()
    }

    pub fn resource_type(&self) -> &str {
        self.0.str("ResourceType").unwrap_or_default()
    }

    pub fn logical_resource_id(&self) -> &str {
        self.0.str("LogicalResourceId").unwrap_or_default()
    }

    pub fn physical_resource_id(&self) -> Option<&str> {
        self.0.str("PhysicalResourceId")
    }

    pub fn resource_properties(&self) -> Option<&JsonObject> {
        self.0.object("ResourceProperties")
    }

    pub fn resource_properties_mut(&mut self) -> Option<&mut JsonObject> {
        self.0.object_mut("ResourceProperties")
    }

    pub fn has_old_resource_properties(&self) -> bool {
        self.0.contains_key("OldResourceProperties")
    }

    pub fn old_resource_properties(&self) -> Option<&JsonObject> {
        self.0.object("OldResourceProperties")
    }

    pub(crate) fn resource_properties_value_mut(&mut self) -> Option<&mut Value> {
        self.0.get_mut("ResourceProperties")
    }
}

#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct Response {
    pub status: Status,
    pub reason: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    pub data: Map,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_echo: Option<bool>,
}

impl Response {
    /// A successful response echoing the identifiers of `request`.
    pub fn for_request(request: &Request) -> Self {
        Response {
            status: Status::Success,
            reason: String::new(),
            stack_id: request.stack_id().into(),
            request_id: request.request_id().into(),
            logical_resource_id: request.logical_resource_id().into(),
            physical_resource_id: request.physical_resource_id().map(Into::into),
            data: Default::default(),
            no_echo: None,
        }
    }
}

/// What the core needs to know about the running function invocation.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct Context {
    pub request_id: String,
    pub invoked_function_arn: String,
    pub deadline: Option<SystemTime>,
}

impl Context {
    /// Time left before the invocation is killed, `None` if there is no deadline.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.duration_since(SystemTime::now()).unwrap_or_default())
    }

    /// Whether waiting for `duration` still leaves the invocation alive.
    pub fn has_time_for(&self, duration: Duration) -> bool {
        self.remaining_time().map_or(true, |remaining| remaining > duration)
    }
}
