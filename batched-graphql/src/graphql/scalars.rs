use crate::key::EntityId;
use async_graphql::{InputValueError, InputValueResult, Scalar, ScalarType, Value};

/// Identifiers are validated and normalized as soon as they are received.
#[Scalar(name = "UUID")]
impl ScalarType for EntityId {
    fn parse(value: Value) -> InputValueResult<Self> {
        match &value {
            Value::String(raw) => Ok(EntityId::parse(raw.as_str())?),
            _ => Err(InputValueError::expected_type(value)),
        }
    }

    fn is_valid(value: &Value) -> bool {
        matches!(value, Value::String(_))
    }

    fn to_value(&self) -> Value {
        Value::String(self.as_str().to_string())
    }
}
