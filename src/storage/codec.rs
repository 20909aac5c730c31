use crate::errors::Result;
use serde_json::Value;

/// Converts values to the string form stored in the engines and back.
pub trait ValueCodec: Send + Sync {
    fn serialize(&self, value: &Value) -> Result<String>;

    fn parse(&self, raw: &str) -> Result<Value>;
}

/// Default codec: values are stored as JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn serialize(&self, value: &Value) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn parse(&self, raw: &str) -> Result<Value> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Parses a raw value, logging and discarding anything the codec rejects.
pub(crate) fn parse_or_absent(codec: &dyn ValueCodec, raw: Option<&str>) -> Option<Value> {
    let raw = raw?;
    match codec.parse(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::error!("cannot parse stored value {raw:?}: {e}");
            None
        }
    }
}
