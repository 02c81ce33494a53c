//! The fixed shape of CloudFormation custom resource requests and responses.

use std::sync::LazyLock;
use serde_json::{json, Value};
use crate::schema::{self, ValidationError};

pub static CFN_REQUEST_SCHEMA: LazyLock<Value> = LazyLock::new(|| json!({
    "type": "object",
    "required": ["RequestType", "ResponseURL", "StackId", "RequestId", "ResourceType",
                 "LogicalResourceId", "ResourceProperties"],
    "properties": {
        "RequestType": {"type": "string", "enum": ["Create", "Update", "Delete"]},
        "ResponseURL": {"type": "string", "format": "uri", "pattern": "^https?://"},
        "StackId": {"type": "string"},
        "RequestId": {"type": "string"},
        "ResourceType": {"type": "string"},
        "LogicalResourceId": {"type": "string"},
        "PhysicalResourceId": {"type": "string"},
        "ResourceProperties": {"type": "object"},
        "OldResourceProperties": {"type": "object"}
    }
}));

pub static CFN_RESPONSE_SCHEMA: LazyLock<Value> = LazyLock::new(|| json!({
    "type": "object",
    "required": ["Status", "Reason", "RequestId", "StackId", "LogicalResourceId", "Data"],
    "properties": {
        "Status": {"type": "string", "enum": ["SUCCESS", "FAILED"]},
        "Reason": {"type": "string"},
        "StackId": {"type": "string"},
        "RequestId": {"type": "string"},
        "LogicalResourceId": {"type": "string"},
        "PhysicalResourceId": {"type": "string"},
        "Data": {"type": "object"},
        "NoEcho": {"type": "boolean"}
    }
}));

pub fn check_request(request: &Value) -> Result<(), ValidationError> {
    schema::check(request, &CFN_REQUEST_SCHEMA)
}

pub fn check_response(response: &Value) -> Result<(), ValidationError> {
    schema::check(response, &CFN_RESPONSE_SCHEMA)
}
