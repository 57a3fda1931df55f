//! Per-connection room membership.

use std::collections::HashMap;

use domain::Channel;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::JoinError;
use crate::hub::{Frame, RealtimeHub};
use crate::identity::Identity;
use crate::message::{ClientMessage, ServerMessage};
use crate::room;

/// One connection's view of the hub.
///
/// Each joined room gets a forwarding task that copies room traffic into
/// the connection's outbound queue. Dropping the session stops them all,
/// and each room is released from the hub once its last forwarder exits.
pub struct Session {
    hub: RealtimeHub,
    identity: Identity,
    outbound: mpsc::Sender<Frame>,
    rooms: HashMap<Channel, JoinHandle<()>>,
}

impl Session {
    pub fn new(hub: RealtimeHub, identity: Identity, outbound: mpsc::Sender<Frame>) -> Self {
        Self {
            hub,
            identity,
            outbound,
            rooms: HashMap::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Rooms currently joined.
    pub fn rooms(&self) -> Vec<Channel> {
        self.rooms.keys().copied().collect()
    }

    /// Handles a text frame from the client and returns the reply.
    pub fn handle_text(&mut self, text: &str) -> ServerMessage {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed client frame");
                return ServerMessage::error(None, format!("Malformed message: {e}"));
            }
        };

        match message {
            ClientMessage::Join { room } => match self.join(&room) {
                Ok(channel) => ServerMessage::Joined {
                    room: channel.name(),
                },
                Err(e) => ServerMessage::error(Some(room), e.to_string()),
            },
            ClientMessage::Leave { room } => {
                self.leave(&room);
                ServerMessage::Left { room }
            }
        }
    }

    /// Joins a room after checking the identity's access. Joining twice is
    /// a no-op.
    pub fn join(&mut self, name: &str) -> Result<Channel, JoinError> {
        let channel = room::authorize(name, &self.identity).inspect_err(|e| {
            tracing::info!(room = name, role = %self.identity.role, reason = %e, "Join refused");
        })?;

        if self.rooms.contains_key(&channel) {
            return Ok(channel);
        }

        let subscription = RoomSubscription {
            receiver: Some(self.hub.subscribe(channel)),
            hub: self.hub.clone(),
            channel,
        };
        let forwarder = tokio::spawn(forward(subscription, self.outbound.clone()));
        self.rooms.insert(channel, forwarder);
        tracing::debug!(room = %channel, role = %self.identity.role, "Joined room");

        Ok(channel)
    }

    /// Leaves a room. Returns false if the room was not joined.
    pub fn leave(&mut self, name: &str) -> bool {
        let Ok(channel) = room::parse(name) else {
            return false;
        };
        match self.rooms.remove(&channel) {
            Some(forwarder) => {
                forwarder.abort();
                tracing::debug!(room = %channel, "Left room");
                true
            }
            None => false,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for (_, forwarder) in self.rooms.drain() {
            forwarder.abort();
        }
    }
}

/// A room receiver owned by a forwarder task.
///
/// The room is pruned once the receiver is gone, whether the forwarder
/// finished or was aborted.
struct RoomSubscription {
    receiver: Option<broadcast::Receiver<Frame>>,
    hub: RealtimeHub,
    channel: Channel,
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        drop(self.receiver.take());
        self.hub.prune(self.channel);
    }
}

async fn forward(mut subscription: RoomSubscription, outbound: mpsc::Sender<Frame>) {
    let channel = subscription.channel;
    let Some(receiver) = subscription.receiver.as_mut() else {
        return;
    };
    loop {
        match receiver.recv().await {
            Ok(frame) => {
                if outbound.send(frame).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(room = %channel, skipped, "Subscriber lagged, events dropped");
                metrics::counter!("realtime_events_undelivered_total").increment(skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
