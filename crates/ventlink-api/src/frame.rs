//! Wire frames.
//!
//! One JSON object per line. Requests:
//!
//! ```text
//! {"m":"get","r":12,"d":"VA-0042","i":"VA-0042","t":1760000000,"s":"9f2c..."}
//! {"m":"set","r":13,"d":"VA-0042","i":"VA-0042","t":1760000000,"s":"...",
//!  "p":{"ar_af":3,"ar_min":30}}
//! ```
//!
//! Replies:
//!
//! ```text
//! {"m":"rsp","r":12,"p":{"sup_rpm":1450,...}}
//! {"m":"ack","r":13}
//! {"m":"err","r":13,"c":"auth","e":"signature mismatch"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Read the full status report.
    Get,
    /// Write one or more settings.
    Set,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
        }
    }
}

/// Settings carried by a `set` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPayload {
    /// Airflow mode code.
    pub ar_af: u8,
    /// Duration of the mode in minutes.
    pub ar_min: u16,
}

/// A signed request, as written to the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub m: Method,
    pub r: u32,
    pub d: String,
    pub i: String,
    pub t: i64,
    pub s: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<SetPayload>,
}

impl RequestFrame {
    /// Encode as a single line (without the trailing newline).
    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::InvalidArgument(e.to_string()))
    }
}

/// A reply from the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "m")]
pub enum ReplyFrame {
    /// Status response carrying the raw field map.
    #[serde(rename = "rsp")]
    Response { r: u32, p: Map<String, Value> },

    /// Acknowledgement of a `set`.
    #[serde(rename = "ack")]
    Ack { r: u32 },

    /// Rejection of a request.
    #[serde(rename = "err")]
    Error {
        r: u32,
        c: String,
        #[serde(default)]
        e: Option<String>,
    },
}

impl ReplyFrame {
    /// Decode one line received from the device.
    pub fn decode(line: &str) -> Result<Self, Error> {
        serde_json::from_str(line).map_err(|e| Error::Malformed {
            message: e.to_string(),
            body: line.to_owned(),
        })
    }

    pub fn request_id(&self) -> u32 {
        match self {
            Self::Response { r, .. } | Self::Ack { r } | Self::Error { r, .. } => *r,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Response { .. } => "rsp",
            Self::Ack { .. } => "ack",
            Self::Error { .. } => "err",
        }
    }

    /// Turn an error frame into the matching [`Error`]; pass others through.
    pub fn into_result(self) -> Result<Self, Error> {
        match self {
            Self::Error { c, e, .. } => {
                let message = e.unwrap_or_else(|| "no detail".into());
                if c == "auth" {
                    Err(Error::Authentication { message })
                } else {
                    Err(Error::Rejected { code: c, message })
                }
            }
            other => Ok(other),
        }
    }

    /// Ensure this frame answers `request_id` with the expected kind.
    pub(crate) fn expect(self, request_id: u32, method: Method) -> Result<Self, Error> {
        if self.request_id() != request_id {
            return Err(Error::UnexpectedReply {
                expected: format!("reply to request {request_id}"),
                got: format!("reply to request {}", self.request_id()),
            });
        }
        let frame = self.into_result()?;
        let wanted = match method {
            Method::Get => "rsp",
            Method::Set => "ack",
        };
        if frame.kind() != wanted {
            return Err(Error::UnexpectedReply {
                expected: format!("'{wanted}' frame"),
                got: format!("'{}' frame", frame.kind()),
            });
        }
        Ok(frame)
    }
}
