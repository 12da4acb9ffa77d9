use crate::gateway::RecordGateway;
use crate::notifier::{ChangeEvent, Subscription};
use crate::subscription::protocol::ClientMessage;
use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Manages a single WebSocket connection: forwards every change event to the
/// socket and feeds inbound readings into the gateway.
pub struct ConnectionManager {
    gateway: Arc<RecordGateway>,
}

impl ConnectionManager {
    pub fn new(gateway: Arc<RecordGateway>) -> Self {
        Self { gateway }
    }

    /// Handle WebSocket connection lifecycle.
    ///
    /// The subscription is removed from the notifier when the loop exits,
    /// whatever the reason.
    pub async fn handle(self, mut socket: WebSocket, subscription: Subscription) {
        let Subscription {
            id: subscriber_id,
            events: mut event_rx,
        } = subscription;

        info!(subscriber_id = %subscriber_id, "WebSocket connection established");

        loop {
            tokio::select! {
                // Handle incoming client messages
                msg = socket.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_client_message(&text),
                        Some(Ok(Message::Close(_))) | None => {
                            info!(subscriber_id = %subscriber_id, "WebSocket client disconnected");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                error!(error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Some(Ok(_)) => {
                            // Ignore binary, pong messages
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                // Forward change events
                event = event_rx.recv() => {
                    match event {
                        Some(event) => {
                            if let Err(e) = send_event(&mut socket, &event).await {
                                error!(error = %e, event = event.name(), "Failed to send change event");
                                break;
                            }
                        }
                        None => {
                            // Notifier dropped this subscriber
                            break;
                        }
                    }
                }
            }
        }

        self.gateway.notifier().unsubscribe(&subscriber_id);
        info!(subscriber_id = %subscriber_id, "WebSocket connection closed");
    }

    /// Handle an inbound frame. Failures are logged and dropped; nothing is
    /// sent back to the client.
    fn handle_client_message(&self, text: &str) {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed client message");
                return;
            }
        };

        match msg {
            ClientMessage::NewReading(payload) => {
                if let Err(e) = self.gateway.create(payload) {
                    error!(error = %e, "Failed to store new reading");
                }
            }
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &ChangeEvent) -> anyhow::Result<()> {
    let json = serde_json::to_string(event)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
