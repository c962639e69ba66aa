use serde::Serialize;
use std::fmt;

/// Where a session is in the offer/answer cycle
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationState {
    /// Nothing negotiated yet
    #[default]
    Idle,
    /// Our offer is out, waiting for the answer
    Offering,
    /// Applying a remote offer and producing the answer
    Answering,
    /// Last exchange completed
    Stable,
    /// Torn down; every further event is ignored
    Closed,
}

impl NegotiationState {
    /// A new offer may be started from here
    pub fn can_offer(self) -> bool {
        matches!(self, NegotiationState::Idle | NegotiationState::Stable)
    }

    /// An offer/answer exchange is in flight
    pub fn is_negotiating(self) -> bool {
        matches!(self, NegotiationState::Offering | NegotiationState::Answering)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::Offering => "offering",
            NegotiationState::Answering => "answering",
            NegotiationState::Stable => "stable",
            NegotiationState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_settled_states_may_offer() {
        assert!(NegotiationState::Idle.can_offer());
        assert!(NegotiationState::Stable.can_offer());
        assert!(!NegotiationState::Offering.can_offer());
        assert!(!NegotiationState::Answering.can_offer());
        assert!(!NegotiationState::Closed.can_offer());
    }

    #[test]
    fn displays_lowercase() {
        assert_eq!(NegotiationState::Offering.to_string(), "offering");
        assert_eq!(
            serde_json::to_string(&NegotiationState::Stable).unwrap(),
            "\"stable\""
        );
    }
}
