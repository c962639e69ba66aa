//! Property-based tests for the negotiation controller
//!
//! Random interleavings of inbound envelopes, engine events and UI commands
//! against the mock engine.

mod common;

use callsig_lib::event::{Command, EngineEvent};
use callsig_lib::negotiation::NegotiationState;
use callsig_lib::peer::{IceCandidate, MediaSlot};
use common::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    RemoteOffer,
    RemoteAnswer,
    RemoteCandidate,
    LocalCandidate,
    NegotiationNeeded,
    ToggleMute(MediaSlot),
    ChangeSource(MediaSlot),
}

fn slot() -> impl Strategy<Value = MediaSlot> {
    prop_oneof![Just(MediaSlot::Audio), Just(MediaSlot::Video)]
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::RemoteOffer),
        Just(Step::RemoteAnswer),
        Just(Step::RemoteCandidate),
        Just(Step::LocalCandidate),
        Just(Step::NegotiationNeeded),
        slot().prop_map(Step::ToggleMute),
        slot().prop_map(Step::ChangeSource),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn apply(h: &mut Harness, step: &Step, n: usize) {
    match step {
        Step::RemoteOffer => h.deliver(&offer_frame(&remote_sdp(&format!("offer {n}")), None)).await,
        Step::RemoteAnswer => h.deliver(&answer_frame(&remote_sdp(&format!("answer {n}")))).await,
        Step::RemoteCandidate => {
            h.deliver(&candidate_frame(&format!("candidate:{n} 1 udp 1 10.0.0.9 {n} typ host")))
                .await
        }
        Step::LocalCandidate => {
            h.raise(EngineEvent::LocalCandidate(Some(IceCandidate {
                candidate: format!("candidate:{n} 1 udp 1 192.168.0.2 {n} typ host"),
                sdp_mid: Some("0".into()),
                sdp_mline_index: Some(0),
                username_fragment: None,
            })))
            .await
        }
        Step::NegotiationNeeded => h.raise(EngineEvent::NegotiationNeeded).await,
        Step::ToggleMute(slot) => h.command(Command::ToggleMute(*slot)).await,
        Step::ChangeSource(slot) => {
            h.command(Command::ChangeSource {
                slot: *slot,
                device: None,
            })
            .await
        }
    }
}

proptest! {
    /// Candidate sets only grow, answers only land while offering, and a new
    /// offer never goes out while another is outstanding.
    #[test]
    fn negotiation_invariants_hold(steps in prop::collection::vec(step(), 1..40)) {
        runtime().block_on(async {
            let mut h = Harness::new().await;
            h.pump().await;

            for (n, step) in steps.iter().enumerate() {
                let state = h.state();
                let remote = h.controller.session().remote_description().cloned();
                let local_count = h.controller.session().local_candidates().len();
                let remote_count = h.controller.session().remote_candidates().len();
                let offers_before = h.engine.offers_created();

                apply(&mut h, step, n).await;

                let session = h.controller.session();
                assert!(session.local_candidates().len() >= local_count);
                assert!(session.remote_candidates().len() >= remote_count);

                if matches!(step, Step::RemoteAnswer) && state != NegotiationState::Offering {
                    assert_eq!(session.remote_description().cloned(), remote);
                    assert_eq!(h.state(), state);
                }

                let new_offers = h.engine.offers_created() - offers_before;
                assert!(new_offers <= 1, "{new_offers} offers from one step");
                if new_offers == 1 && state == NegotiationState::Offering {
                    // Only a completed exchange frees the slot for the next offer.
                    assert!(matches!(step, Step::RemoteAnswer | Step::RemoteOffer));
                }
            }
        });
    }

    /// Mute and unmute are local only.
    #[test]
    fn mute_sequences_send_nothing(toggles in prop::collection::vec(slot(), 0..30)) {
        runtime().block_on(async {
            let mut h = Harness::new().await;
            h.reach_stable().await;

            for slot in &toggles {
                h.command(Command::ToggleMute(*slot)).await;
            }

            assert!(h.sent().is_empty());
            assert_eq!(h.state(), NegotiationState::Stable);
            for slot in MediaSlot::ALL {
                let flips = toggles.iter().filter(|s| **s == slot).count();
                let enabled = h.engine.track(slot).unwrap().is_enabled();
                assert_eq!(enabled, flips % 2 == 0);
            }
        });
    }
}
