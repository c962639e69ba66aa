use crate::peer::types::{IceCandidate, ServerConfig};
use crate::utils::add_ice_url_scheme;
use log::{debug, info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;

/// Peer connection configuration for the given ICE servers
pub fn rtc_config(servers: &[ServerConfig]) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: ice_servers(servers),
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

pub fn ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}

pub fn to_rtc_candidate(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_mline_index,
        username_fragment: candidate.username_fragment,
    }
}

pub fn from_rtc_candidate(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

/// Remote candidates that arrived before the remote description
#[derive(Debug, Default)]
pub struct PendingCandidates {
    queue: Vec<IceCandidate>,
}

impl PendingCandidates {
    pub fn push(&mut self, candidate: IceCandidate) {
        debug!("Remote description not set yet, queuing candidate");
        self.queue.push(candidate);
    }

    pub fn take(&mut self) -> Vec<IceCandidate> {
        std::mem::take(&mut self.queue)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSummary {
    pub host: usize,
    pub srflx: usize,
    pub relay: usize,
}

/// Counts candidate types and warns when no relay path was gathered.
pub fn analyze_candidates(candidates: &[IceCandidate]) -> CandidateSummary {
    let mut summary = CandidateSummary::default();

    for candidate in candidates {
        if candidate.candidate.contains("typ host") {
            summary.host += 1;
        } else if candidate.candidate.contains("typ srflx") {
            summary.srflx += 1;
        } else if candidate.candidate.contains("typ relay") {
            summary.relay += 1;
        }
    }

    info!(
        "Candidate analysis: {} host, {} srflx, {} relay",
        summary.host, summary.srflx, summary.relay
    );

    if summary.relay == 0 {
        warn!("No TURN relay candidates found! Connection through NAT may fail.");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(line: &str) -> IceCandidate {
        IceCandidate {
            candidate: line.into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        }
    }

    #[test]
    fn counts_candidate_types() {
        let summary = analyze_candidates(&[
            cand("candidate:1 1 udp 2122260223 10.0.0.2 5000 typ host"),
            cand("candidate:2 1 udp 1686052607 203.0.113.5 5000 typ srflx raddr 10.0.0.2"),
            cand("candidate:3 1 udp 41885439 198.51.100.7 3478 typ relay raddr 203.0.113.5"),
            cand("candidate:4 1 tcp 1518280447 10.0.0.2 9 typ host tcptype active"),
        ]);
        assert_eq!(
            summary,
            CandidateSummary {
                host: 2,
                srflx: 1,
                relay: 1
            }
        );
    }

    #[test]
    fn config_adds_schemes_and_credentials() {
        let config = rtc_config(&[ServerConfig {
            id: "t".into(),
            r#type: "turn".into(),
            url: "relay.example.org:3478".into(),
            username: Some("u".into()),
            credential: Some("p".into()),
        }]);
        assert_eq!(config.ice_servers[0].urls, vec!["turn:relay.example.org:3478"]);
        assert_eq!(config.ice_servers[0].username, "u");
        assert_eq!(config.bundle_policy, RTCBundlePolicy::MaxBundle);
    }

    #[test]
    fn pending_candidates_drain_in_order() {
        let mut pending = PendingCandidates::default();
        pending.push(cand("a"));
        pending.push(cand("b"));
        let drained = pending.take();
        assert_eq!(drained[0].candidate, "a");
        assert_eq!(drained[1].candidate, "b");
        assert!(pending.is_empty());
    }

    #[test]
    fn candidate_conversion_preserves_fields() {
        let original = IceCandidate {
            username_fragment: Some("frag".into()),
            ..cand("candidate:1")
        };
        assert_eq!(from_rtc_candidate(to_rtc_candidate(original.clone())), original);
    }
}
