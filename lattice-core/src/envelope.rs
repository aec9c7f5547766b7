//! The uniform response envelope.
//!
//! Every response the gateway produces, success or error, is one of these two
//! shapes. The envelope is the only value ever handed to an output emitter,
//! so a new wire format only has to know how to serialize this type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a gateway response before serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    /// Execution results for a submitted batch, in submission order.
    Results {
        #[serde(rename = "return")]
        results: Vec<Value>,
    },
    /// A simple acknowledgement or error notice.
    Notice { status: u16, message: String },
}

impl Envelope {
    /// An acknowledgement or error notice.
    pub fn notice(status: u16, message: impl Into<String>) -> Self {
        Self::Notice {
            status,
            message: message.into(),
        }
    }

    /// Results collected from the execution backend.
    pub fn results(results: Vec<Value>) -> Self {
        Self::Results { results }
    }
}
