//! Outcome packets
//!
//! Each `DispatchOutcome` goes back out as a primitive packet on the
//! subscribed tag whose value is JSON:
//!
//! ```json
//! {"batch_sequence":3,"success":true,"item_count":100,"detail":"...",
//!  "attempts":1,"latency_ms":12,"message":"write 100 items to log successfully"}
//! ```

use codec::Packet;
use contracts::{DispatchOutcome, RawPacket};
use serde::{Deserialize, Serialize};

use crate::error::OutcomeError;

/// JSON body of an outcome packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeMessage {
    #[serde(flatten)]
    pub outcome: DispatchOutcome,

    /// Human-readable status line
    pub message: String,
}

impl From<&DispatchOutcome> for OutcomeMessage {
    fn from(outcome: &DispatchOutcome) -> Self {
        Self {
            message: outcome.summary(),
            outcome: outcome.clone(),
        }
    }
}

pub fn encode_outcome(tag: u8, outcome: &DispatchOutcome) -> Result<RawPacket, OutcomeError> {
    let body = serde_json::to_vec(&OutcomeMessage::from(outcome))?;
    let frame = Packet::primitive(tag, body).to_bytes()?;
    Ok(RawPacket::new(tag, frame))
}

pub fn decode_outcome(packet: &RawPacket) -> Result<OutcomeMessage, OutcomeError> {
    let decoded = Packet::decode(&packet.frame)?;
    Ok(serde_json::from_slice(decoded.value()?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Batch, FlushReason, SensorRecord};
    use std::time::Instant;

    fn outcome(success: bool) -> DispatchOutcome {
        let batch = Batch {
            sequence: 3,
            opened_at: Instant::now(),
            reason: FlushReason::Count,
            records: vec![SensorRecord::new(1.0, 1, "a"); 4],
        };
        if success {
            DispatchOutcome::succeeded(&batch, r#"{"offsets":[]}"#, 1)
        } else {
            DispatchOutcome::failed(&batch, "connection refused", 3)
        }
    }

    #[test]
    fn test_outcome_packet_layout() {
        let packet = encode_outcome(0x10, &outcome(true)).unwrap();
        assert_eq!(packet.tag, 0x10);
        // Primitive header: tag without node flag
        assert_eq!(packet.frame[0], 0x10);

        let json: serde_json::Value =
            serde_json::from_slice(Packet::decode(&packet.frame).unwrap().value().unwrap())
                .unwrap();
        assert_eq!(json["batch_sequence"], 3);
        assert_eq!(json["success"], true);
        assert_eq!(json["item_count"], 4);
        assert_eq!(json["message"], "write 4 items to log successfully");
    }

    #[test]
    fn test_failed_outcome_decodes() {
        let packet = encode_outcome(0x10, &outcome(false)).unwrap();
        let message = decode_outcome(&packet).unwrap();
        assert_eq!(message.outcome, outcome(false));
        assert_eq!(message.message, "failed to write 4 items to log");
        assert_eq!(message.outcome.attempts, 3);
    }

    #[test]
    fn test_decode_rejects_node() {
        let node = Packet::node(0x10, vec![Packet::utf8(0x13, "x")])
            .to_bytes()
            .unwrap();
        assert!(decode_outcome(&RawPacket::new(0x10, node)).is_err());
    }
}
