//! Wire format of the signaling relay.
//!
//! Outbound and inbound tags differ (`store_offer` out, `offer` in); the relay
//! depends on that asymmetry.

use crate::error::ProtocolError;
use crate::peer::types::{IceCandidate, SessionDescription};
use serde::{Deserialize, Serialize};

/// Message body we send; the username is stamped on by [`Envelope`]
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    StoreUser,
    StoreOffer { offer: SessionDescription },
    SendAnswer { answer: SessionDescription },
    StoreCandidate { candidate: IceCandidate },
}

impl Outbound {
    pub fn tag(&self) -> &'static str {
        match self {
            Outbound::StoreUser => "store_user",
            Outbound::StoreOffer { .. } => "store_offer",
            Outbound::SendAnswer { .. } => "send_answer",
            Outbound::StoreCandidate { .. } => "store_candidate",
        }
    }
}

#[derive(Serialize, Debug)]
pub struct Envelope<'a> {
    #[serde(flatten)]
    pub body: &'a Outbound,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
}

impl<'a> Envelope<'a> {
    pub fn new(body: &'a Outbound, username: Option<&'a str>) -> Self {
        Self { body, username }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Message body received from the relay
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Offer { offer: SessionDescription },
    Answer { answer: SessionDescription },
    /// `null` is the remote end-of-candidates marker
    Candidate { candidate: Option<IceCandidate> },
}

impl Inbound {
    pub fn tag(&self) -> &'static str {
        match self {
            Inbound::Offer { .. } => "offer",
            Inbound::Answer { .. } => "answer",
            Inbound::Candidate { .. } => "candidate",
        }
    }
}

/// Parsed inbound envelope with the sender's name when the relay includes it
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InboundEnvelope {
    #[serde(flatten)]
    pub message: Inbound,
    #[serde(default)]
    pub username: Option<String>,
}

impl InboundEnvelope {
    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(body: &Outbound, username: Option<&str>) -> Value {
        serde_json::from_str(&Envelope::new(body, username).to_json().unwrap()).unwrap()
    }

    #[test]
    fn store_user_carries_only_type_and_username() {
        assert_eq!(
            to_value(&Outbound::StoreUser, Some("alice")),
            json!({ "type": "store_user", "username": "alice" })
        );
    }

    #[test]
    fn offer_and_answer_use_outbound_tags() {
        let offer = Outbound::StoreOffer {
            offer: SessionDescription::offer("v=0"),
        };
        assert_eq!(
            to_value(&offer, Some("alice")),
            json!({
                "type": "store_offer",
                "username": "alice",
                "offer": { "type": "offer", "sdp": "v=0" }
            })
        );

        let answer = Outbound::SendAnswer {
            answer: SessionDescription::answer("v=0"),
        };
        assert_eq!(to_value(&answer, Some("bob"))["type"], "send_answer");
        assert_eq!(to_value(&answer, Some("bob"))["answer"]["type"], "answer");
    }

    #[test]
    fn candidate_envelope_keeps_browser_keys() {
        let body = Outbound::StoreCandidate {
            candidate: IceCandidate {
                candidate: "candidate:1 1 udp 1 10.0.0.2 5000 typ host".into(),
                sdp_mid: Some("0".into()),
                sdp_mline_index: Some(0),
                username_fragment: None,
            },
        };
        let value = to_value(&body, Some("alice"));
        assert_eq!(value["type"], "store_candidate");
        assert_eq!(value["candidate"]["sdpMid"], "0");
        assert_eq!(value["candidate"]["sdpMLineIndex"], 0);
    }

    #[test]
    fn unbound_username_is_omitted() {
        let value = to_value(&Outbound::StoreUser, None);
        assert!(value.get("username").is_none());
    }

    #[test]
    fn parses_each_inbound_type() {
        let offer = InboundEnvelope::parse(
            r#"{"type":"offer","offer":{"type":"offer","sdp":"v=0"},"username":"bob"}"#,
        )
        .unwrap();
        assert_eq!(offer.username.as_deref(), Some("bob"));
        assert_eq!(
            offer.message,
            Inbound::Offer {
                offer: SessionDescription::offer("v=0")
            }
        );

        let answer =
            InboundEnvelope::parse(r#"{"type":"answer","answer":{"type":"answer","sdp":"v=0"}}"#)
                .unwrap();
        assert_eq!(answer.message.tag(), "answer");
        assert_eq!(answer.username, None);

        let cand = InboundEnvelope::parse(
            r#"{"type":"candidate","candidate":{"candidate":"candidate:1","sdpMid":"0","sdpMLineIndex":0}}"#,
        )
        .unwrap();
        assert!(matches!(
            cand.message,
            Inbound::Candidate {
                candidate: Some(_)
            }
        ));
    }

    #[test]
    fn null_candidate_is_end_of_candidates() {
        let env = InboundEnvelope::parse(r#"{"type":"candidate","candidate":null}"#).unwrap();
        assert_eq!(env.message, Inbound::Candidate { candidate: None });
    }

    #[test]
    fn outbound_tags_are_not_accepted_inbound() {
        let err = InboundEnvelope::parse(
            r#"{"type":"store_offer","offer":{"type":"offer","sdp":"v=0"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn missing_payload_is_malformed() {
        assert!(InboundEnvelope::parse(r#"{"type":"answer"}"#).is_err());
        assert!(InboundEnvelope::parse("not json").is_err());
    }
}
