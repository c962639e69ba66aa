pub mod controller;
pub mod state;

pub use controller::NegotiationController;
pub use state::NegotiationState;

use crate::event::SessionEvent;
use log::info;
use tokio::sync::mpsc;

/// Drains a session's event queue until the session is torn down.
pub async fn run_session(
    mut controller: NegotiationController,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    let id = controller.session().id().to_string();
    info!("Session {id} started");

    while let Some(event) = events.recv().await {
        controller.dispatch(event).await;
        if controller.state() == NegotiationState::Closed {
            break;
        }
    }

    if controller.state() != NegotiationState::Closed {
        controller.teardown("event queue closed").await;
    }
    info!("Session {id} finished");
}
