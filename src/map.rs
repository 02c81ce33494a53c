use std::fmt;
use std::ops::{Deref, DerefMut};
use serde_json::{self, Value};

pub type JsonObject = serde_json::Map<String, Value>;

/// A JSON object, as used for `ResourceProperties`, response `Data` and the
/// raw request itself.
#[derive(Default, Clone, PartialEq)]
pub struct Map(JsonObject);

impl Map {
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn serialize_from<T: serde::Serialize>(t: T) -> Result<Self, serde_json::Error> {
        serde_json::value::to_value(t).and_then(Self::from_value)
    }

    /// Fails unless `v` is a JSON object.
    pub fn from_value(v: Value) -> Result<Self, serde_json::Error> {
        use serde::de::{Error, Unexpected};

        let expected = &"object map";
        match v {
            Value::Object(map) => Ok(Map(map)),
            Value::Null => Err(Error::invalid_type(Unexpected::Unit, expected)),
            Value::Bool(v) => Err(Error::invalid_type(Unexpected::Bool(v), expected)),
            Value::Number(ref v) => Err(Error::invalid_type(Unexpected::Other(&v.to_string()), expected)),
            Value::String(ref v) => Err(Error::invalid_type(Unexpected::Str(v), expected)),
            Value::Array(..) => Err(Error::invalid_type(Unexpected::Seq, expected)),
        }
    }

    /// The object stored under `key`, if there is one.
    pub fn object(&self, key: &str) -> Option<&JsonObject> {
        self.0.get(key).and_then(Value::as_object)
    }

    pub fn object_mut(&mut self, key: &str) -> Option<&mut JsonObject> {
        self.0.get_mut(key).and_then(Value::as_object_mut)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// Coerces string values the way CloudFormation should have sent them:
/// `"true"`/`"false"` become booleans, decimal integers become numbers and
/// everything else stays a string. Nested objects are converted in place.
pub fn heuristic_convert_property_types(properties: &mut JsonObject) {
    for value in properties.values_mut() {
        let converted = match *value {
            Value::Object(ref mut nested) => {
                heuristic_convert_property_types(nested);
                continue
            },
            Value::String(ref s) if s == "true" => Value::Bool(true),
            Value::String(ref s) if s == "false" => Value::Bool(false),
            Value::String(ref s) if is_int(s) => match s.parse::<i64>() {
                Ok(i) => Value::from(i),
                Err(..) => continue,
            },
            _ => continue,
        };
        *value = converted;
    }
}

fn is_int(s: &str) -> bool {
    let digits = s.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl Deref for Map {
    type Target = JsonObject;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Map {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.0, fmt)
    }
}

impl serde::Serialize for Map {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.0, s)
    }
}

impl<'de> serde::Deserialize<'de> for Map {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        serde::Deserialize::deserialize(d).map(Map)
    }
}
