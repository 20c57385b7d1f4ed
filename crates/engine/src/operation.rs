//! Typed descriptors for remote operations.

use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Names a remote activity and fixes its argument and result types.
///
/// Arguments are a tuple serialized as a JSON array, so `("user-1",)`
/// travels as `["user-1"]`. Descriptors are plain constants:
///
/// ```
/// use engine::RemoteOperation;
///
/// const GREET: RemoteOperation<(String,), String> = RemoteOperation::new("greet");
/// assert_eq!(GREET.name(), "greet");
/// ```
pub struct RemoteOperation<I, O> {
    name: &'static str,
    _schema: PhantomData<fn(I) -> O>,
}

impl<I, O> RemoteOperation<I, O> {
    /// Creates a descriptor for the named operation.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _schema: PhantomData,
        }
    }

    /// Returns the activity type name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<I: Serialize, O> RemoteOperation<I, O> {
    /// Encodes arguments for dispatch.
    pub fn encode_args(&self, args: &I) -> Result<Value, serde_json::Error> {
        serde_json::to_value(args)
    }
}

impl<I, O: DeserializeOwned> RemoteOperation<I, O> {
    /// Decodes a recorded or returned result.
    pub fn decode_output(&self, value: Value) -> Result<O, serde_json::Error> {
        serde_json::from_value(value)
    }
}

impl<I, O> Clone for RemoteOperation<I, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I, O> Copy for RemoteOperation<I, O> {}

impl<I, O> std::fmt::Debug for RemoteOperation<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RemoteOperation").field(&self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANCEL: RemoteOperation<(String, String), ()> = RemoteOperation::new("cancel");

    #[test]
    fn args_encode_as_array() {
        let args = CANCEL
            .encode_args(&("user-1".to_string(), "car-1".to_string()))
            .unwrap();
        assert_eq!(args, serde_json::json!(["user-1", "car-1"]));
    }

    #[test]
    fn unit_output_decodes_from_null() {
        CANCEL.decode_output(Value::Null).unwrap();
    }

    #[test]
    fn debug_shows_name() {
        assert_eq!(format!("{CANCEL:?}"), "RemoteOperation(\"cancel\")");
    }
}
