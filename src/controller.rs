//! Session lifecycle controller
//!
//! Owns the boot sequence and the auth-event loop: adopt a pending recovery
//! deep link or restore the persisted session, then keep translating auth
//! events into navigation routes for as long as the gateway lives. The
//! controller subscribes before it initializes, so events fired during a
//! slow restore are never lost; routes are delivered in order and the most
//! recent one wins.

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::deeplink::parse_recovery_link;
use crate::gateway::AuthGateway;
use crate::profile::ProfileStore;
use crate::role::{resolve_role, route_for_role, Route};
use crate::types::{AuthEvent, Session};

/// Lifecycle phase, observable by the navigation host. The host keeps its
/// splash screen up until `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Receiver side handed to the navigation host.
pub struct ControllerHandles {
    pub routes: mpsc::UnboundedReceiver<Route>,
    pub state: watch::Receiver<ControllerState>,
}

pub struct SessionController {
    gateway: Arc<dyn AuthGateway>,
    profiles: Arc<dyn ProfileStore>,
    routes: mpsc::UnboundedSender<Route>,
    state: watch::Sender<ControllerState>,
}

impl SessionController {
    pub fn new(
        gateway: Arc<dyn AuthGateway>,
        profiles: Arc<dyn ProfileStore>,
    ) -> (Self, ControllerHandles) {
        let (route_tx, route_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ControllerState::Uninitialized);
        (
            Self {
                gateway,
                profiles,
                routes: route_tx,
                state: state_tx,
            },
            ControllerHandles {
                routes: route_rx,
                state: state_rx,
            },
        )
    }

    /// Run until the gateway's event channel closes. `pending_deep_link` is
    /// the URL the app was launched with, if any.
    pub async fn run(self, pending_deep_link: Option<String>) {
        // Subscribe before touching the session so nothing emitted during a
        // slow restore is dropped.
        let mut events = self.gateway.subscribe();

        let _ = self.state.send(ControllerState::Initializing);
        self.initialize(pending_deep_link).await;
        let _ = self.state.send(ControllerState::Ready);

        loop {
            match events.recv().await {
                Ok(event) => self.handle_event(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} auth events; continuing", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    async fn initialize(&self, pending_deep_link: Option<String>) {
        if let Some(link) = pending_deep_link {
            if let Some(tokens) = parse_recovery_link(&link) {
                match self
                    .gateway
                    .adopt_recovery_session(&tokens.access_token, &tokens.refresh_token)
                    .await
                {
                    Ok(_) => {
                        info!("Recovery session adopted from deep link");
                        // Adoption queued a PasswordRecovery event; the loop
                        // below routes to the reset screen from it.
                        return;
                    }
                    // Expired or revoked recovery tokens; fall through to
                    // the normal restore path.
                    Err(e) => warn!("Recovery link rejected: {}", e),
                }
            }
        }

        match self.gateway.get_session().await {
            Ok(Some(session)) => self.route_home(&session).await,
            Ok(None) => debug!("No persisted session; staying on entry"),
            Err(e) => debug!("Session restore failed ({}); staying on entry", e),
        }
    }

    async fn handle_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::PasswordRecovery => self.emit(Route::ResetPassword),
            AuthEvent::SignedOut => self.emit(Route::Entry),
            AuthEvent::SignedIn => {
                if let Ok(Some(session)) = self.gateway.get_session().await {
                    self.route_home(&session).await;
                }
            }
            // The session object changed but the user did not; nothing to
            // navigate.
            AuthEvent::TokenRefreshed => {}
        }
    }

    async fn route_home(&self, session: &Session) {
        let metadata = self
            .gateway
            .current_identity()
            .await
            .ok()
            .map(|identity| identity.metadata);
        let role = resolve_role(&*self.profiles, &session.user_id, metadata.as_ref()).await;
        self.emit(route_for_role(role));
    }

    fn emit(&self, route: Route) {
        info!("Routing to {}", route.path());
        let _ = self.routes.send(route);
    }
}
