//! JSON-lines wire format
//!
//! Every message is one JSON object on its own line, tagged by `kind`.
//! Binary payloads travel as standard base64.
//!
//! Client to server:
//! ```text
//! {"kind":"hello","role":"producer"}
//! {"kind":"frame","source_id":"bed-1","sequence":42,"payload":"<base64 image>"}
//! ```
//!
//! Server to consumer:
//! ```text
//! {"kind":"vitals","source_id":"bed-1","sequence":42,"flushing_score":0.31,
//!  "heart_rate_bpm":74,"respiratory_rate":null,"risk_score":0.22,
//!  "alert":false,"degraded":false,"annotated_frame":null}
//! {"kind":"source_closed","source_id":"bed-1"}
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::NetworkError;
use crate::hub::HubMessage;
use crate::session::InboundFrame;
use crate::signal::round_for_transport;
use crate::types::VitalsResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerRole {
    Producer,
    Consumer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameMessage {
    pub source_id: String,
    pub sequence: u64,
    /// Base64-encoded image bytes.
    pub payload: String,
}

impl FrameMessage {
    pub fn new(source_id: impl Into<String>, sequence: u64, image: &[u8]) -> Self {
        Self {
            source_id: source_id.into(),
            sequence,
            payload: STANDARD.encode(image),
        }
    }

    pub fn into_frame(self) -> Result<InboundFrame, NetworkError> {
        let payload = STANDARD.decode(self.payload.as_bytes())?;
        Ok(InboundFrame {
            source_id: self.source_id,
            sequence: self.sequence,
            payload,
        })
    }
}

/// Lines sent by clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello { role: PeerRole },
    Frame(FrameMessage),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VitalsMessage {
    pub source_id: String,
    pub sequence: u64,
    pub flushing_score: Option<f64>,
    pub heart_rate_bpm: Option<u16>,
    pub respiratory_rate: Option<u16>,
    /// Rounded to two decimals.
    pub risk_score: f64,
    pub alert: bool,
    pub degraded: bool,
    /// Base64 JPEG, present only when annotation is enabled.
    pub annotated_frame: Option<String>,
}

impl From<&VitalsResult> for VitalsMessage {
    fn from(result: &VitalsResult) -> Self {
        Self {
            source_id: result.source_id.clone(),
            sequence: result.sequence,
            flushing_score: result.flushing_score,
            heart_rate_bpm: result.heart_rate_bpm,
            respiratory_rate: result.respiratory_rate,
            risk_score: round_for_transport(result.risk_score),
            alert: result.alert,
            degraded: result.degraded,
            annotated_frame: result.annotated_frame.as_ref().map(|jpeg| STANDARD.encode(jpeg)),
        }
    }
}

/// Lines sent to consumers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerMessage {
    Vitals(VitalsMessage),
    SourceClosed { source_id: String },
}

impl From<&HubMessage> for ServerMessage {
    fn from(message: &HubMessage) -> Self {
        match message {
            HubMessage::Vitals(result) => ServerMessage::Vitals(VitalsMessage::from(result.as_ref())),
            HubMessage::SourceClosed { source_id } => ServerMessage::SourceClosed {
                source_id: source_id.clone(),
            },
        }
    }
}

/// Serialize a message as one newline-terminated line.
pub fn to_line<T: Serialize>(message: &T) -> Result<String, NetworkError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_parse_client_lines() {
        let hello: ClientMessage = serde_json::from_str(r#"{"kind":"hello","role":"consumer"}"#).unwrap();
        assert_eq!(hello, ClientMessage::Hello { role: PeerRole::Consumer });

        let line = to_line(&ClientMessage::Frame(FrameMessage::new("bed-1", 9, &[1, 2, 3]))).unwrap();
        assert!(line.ends_with('\n'));
        match serde_json::from_str::<ClientMessage>(line.trim_end()).unwrap() {
            ClientMessage::Frame(frame) => {
                assert_eq!(frame.payload, "AQID");
                let frame = frame.into_frame().unwrap();
                assert_eq!(frame.payload, vec![1, 2, 3]);
                assert_eq!(frame.sequence, 9);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bad_base64_is_rejected() {
        let frame = FrameMessage {
            source_id: "bed-1".to_string(),
            sequence: 0,
            payload: "***".to_string(),
        };
        assert!(matches!(frame.into_frame(), Err(NetworkError::Base64(_))));
    }

    #[test]
    fn test_vitals_line_shape() {
        let result = VitalsResult {
            source_id: "bed-2".to_string(),
            sequence: 11,
            flushing_score: Some(0.5),
            heart_rate_bpm: None,
            respiratory_rate: Some(17),
            risk_score: 0.400_000_1,
            alert: false,
            degraded: true,
            annotated_frame: Some(vec![0xFF, 0xD8]),
        };
        let message = ServerMessage::from(&HubMessage::Vitals(Arc::new(result)));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "vitals",
                "source_id": "bed-2",
                "sequence": 11,
                "flushing_score": 0.5,
                "heart_rate_bpm": null,
                "respiratory_rate": 17,
                "risk_score": 0.4,
                "alert": false,
                "degraded": true,
                "annotated_frame": "/9g=",
            })
        );
    }

    #[test]
    fn test_source_closed_line() {
        let message = ServerMessage::from(&HubMessage::SourceClosed {
            source_id: "bed-3".to_string(),
        });
        assert_eq!(
            to_line(&message).unwrap(),
            "{\"kind\":\"source_closed\",\"source_id\":\"bed-3\"}\n"
        );
    }
}
