//! The Market Data Hub.
//!
//! A single task owns the client registry: every other task talks to it
//! only by sending a command over a channel, so the registry itself is
//! never shared behind a lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::shutdown::ShutdownSignal;

/// Capacity of each client's outbound queue.
pub const CLIENT_QUEUE_CAPACITY: usize = 256;
/// Capacity of the Hub's own command inlet.
const HUB_INLET_CAPACITY: usize = 256;

/// Identifies one connected subscriber.
pub type ClientId = u64;

/// A JSON-encoded outbound message, shared cheaply across every client
/// queue it fans out to.
pub type Payload = Arc<str>;

enum HubCommand {
    Register {
        id: ClientId,
        user_id: Option<Uuid>,
        sender: mpsc::Sender<Payload>,
    },
    Unregister {
        id: ClientId,
    },
    Broadcast {
        payload: Payload,
    },
    SendToUser {
        user_id: Uuid,
        payload: Payload,
    },
}

/// Handle used by producers (the broadcast pipeline) and by connection
/// tasks (the `/ws` handler) to talk to the Hub's single reader loop.
#[derive(Debug, Clone)]
pub struct Hub {
    inlet: mpsc::Sender<HubCommand>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for HubCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register { id, .. } => f.debug_struct("Register").field("id", id).finish(),
            Self::Unregister { id } => f.debug_struct("Unregister").field("id", id).finish(),
            Self::Broadcast { .. } => f.write_str("Broadcast"),
            Self::SendToUser { user_id, .. } => {
                f.debug_struct("SendToUser").field("user_id", user_id).finish()
            }
        }
    }
}

impl Hub {
    /// Spawn the Hub's reader loop and return a handle plus its
    /// `JoinHandle`. Call [`Hub::register`] for every accepted `/ws`
    /// connection and [`Hub::broadcast`] from the pipeline fan-out task.
    #[must_use]
    pub fn spawn(mut shutdown: ShutdownSignal) -> (Self, JoinHandle<()>) {
        let (inlet, mut outlet) = mpsc::channel(HUB_INLET_CAPACITY);
        let hub = Self {
            inlet,
            next_id: Arc::new(AtomicU64::new(0)),
        };

        let handle = tokio::spawn(async move {
            let mut clients: HashMap<ClientId, mpsc::Sender<Payload>> = HashMap::new();
            let mut owners: HashMap<ClientId, Uuid> = HashMap::new();
            let mut by_user: HashMap<Uuid, Vec<ClientId>> = HashMap::new();

            loop {
                let command = tokio::select! {
                    command = outlet.recv() => command,
                    () = shutdown.wait() => {
                        log::info!("hub: shutdown signal received");
                        break;
                    }
                };
                let Some(command) = command else { break };

                match command {
                    HubCommand::Register { id, user_id, sender } => {
                        log::info!("hub: client {id} registered ({} total)", clients.len() + 1);
                        clients.insert(id, sender);
                        if let Some(user_id) = user_id {
                            owners.insert(id, user_id);
                            by_user.entry(user_id).or_default().push(id);
                        }
                    }
                    HubCommand::Unregister { id } => {
                        if clients.remove(&id).is_some() {
                            log::info!("hub: client {id} unregistered ({} remain)", clients.len());
                        }
                        if let Some(user_id) = owners.remove(&id) {
                            if let Some(ids) = by_user.get_mut(&user_id) {
                                ids.retain(|&cid| cid != id);
                                if ids.is_empty() {
                                    by_user.remove(&user_id);
                                }
                            }
                        }
                    }
                    HubCommand::Broadcast { payload } => {
                        let mut slow = Vec::new();

                        for (&id, sender) in &clients {
                            match sender.try_send(Arc::clone(&payload)) {
                                Ok(()) => {}
                                Err(mpsc::error::TrySendError::Full(_)) => {
                                    log::warn!("hub: client {id} outbound queue full, dropping it");
                                    slow.push(id);
                                }
                                Err(mpsc::error::TrySendError::Closed(_)) => {
                                    slow.push(id);
                                }
                            }
                        }

                        for id in slow {
                            clients.remove(&id);
                            if let Some(user_id) = owners.remove(&id) {
                                if let Some(ids) = by_user.get_mut(&user_id) {
                                    ids.retain(|&cid| cid != id);
                                }
                            }
                        }
                    }
                    HubCommand::SendToUser { user_id, payload } => {
                        let Some(ids) = by_user.get(&user_id) else {
                            continue;
                        };

                        for &id in ids {
                            if let Some(sender) = clients.get(&id) {
                                if let Err(err) = sender.try_send(Arc::clone(&payload)) {
                                    log::warn!("hub: user event dropped for client {id}: {err}");
                                }
                            }
                        }
                    }
                }
            }

            log::info!("hub: reader loop stopped");
        });

        (hub, handle)
    }

    /// Allocate a fresh client id and register its outbound sender.
    /// `user_id` is `Some` for an authenticated connection and makes this
    /// client a valid [`Hub::send_to_user`] target; anonymous connections
    /// still receive the public broadcast stream. Returns the id and a
    /// receiver the connection's writer task drains.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the Hub's reader loop has already shut down.
    pub async fn register(&self, user_id: Option<Uuid>) -> Result<(ClientId, mpsc::Receiver<Payload>), HubClosed> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(CLIENT_QUEUE_CAPACITY);

        self.inlet
            .send(HubCommand::Register { id, user_id, sender })
            .await
            .map_err(|_| HubClosed)?;

        Ok((id, receiver))
    }

    /// Unregister a client, e.g. when its connection closes or a write
    /// fails. Idempotent.
    pub async fn unregister(&self, id: ClientId) {
        let _ = self.inlet.send(HubCommand::Unregister { id }).await;
    }

    /// Enqueue `payload` for fan-out to every registered client. Never
    /// blocks indefinitely: if the Hub's own inlet is full the message is
    /// dropped.
    pub fn broadcast(&self, payload: Payload) {
        if let Err(err) = self.inlet.try_send(HubCommand::Broadcast { payload }) {
            log::warn!("hub: inlet full or closed, dropping broadcast: {err}");
        }
    }

    /// Deliver `payload` only to `user_id`'s connected clients. A
    /// no-op if the user has no open connection. Never blocks.
    pub fn send_to_user(&self, user_id: Uuid, payload: Payload) {
        if let Err(err) = self.inlet.try_send(HubCommand::SendToUser { user_id, payload }) {
            log::warn!("hub: inlet full or closed, dropping user event: {err}");
        }
    }
}

/// The Hub's reader loop has stopped accepting commands.
#[derive(Debug, thiserror::Error)]
#[error("market data hub has shut down")]
pub struct HubClosed;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::Shutdown;

    #[tokio::test]
    async fn a_full_client_queue_is_dropped_without_affecting_others() {
        let (hub, _handle) = Hub::spawn(Shutdown::new().signal());

        let (_slow_id, mut slow_rx) = hub.register(None).await.expect("register");
        let (fast_id, mut fast_rx) = hub.register(None).await.expect("register");

        // Fill the slow client's queue without ever draining it.
        for i in 0..CLIENT_QUEUE_CAPACITY + 50 {
            hub.broadcast(Arc::from(format!("tick-{i}")));
            tokio::task::yield_now().await;
        }

        // Give the hub loop a chance to process every broadcast.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // The fast client, drained continuously, keeps receiving messages.
        let mut received = 0;
        while fast_rx.try_recv().is_ok() {
            received += 1;
        }
        assert!(received > 0, "fast client id {fast_id} should have received ticks");

        // The slow client was unregistered once its queue filled: once its
        // buffered messages are drained, the channel reports closed rather
        // than pending (its sender was dropped from the registry).
        while slow_rx.try_recv().is_ok() {}
        hub.broadcast(Arc::from("final"));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(matches!(
            slow_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn send_to_user_reaches_only_that_users_clients() {
        let (hub, _handle) = Hub::spawn(Shutdown::new().signal());

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (_alice_id, mut alice_rx) = hub.register(Some(alice)).await.expect("register");
        let (_bob_id, mut bob_rx) = hub.register(Some(bob)).await.expect("register");

        hub.send_to_user(alice, Arc::from("liquidation"));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(alice_rx.try_recv().as_deref(), Ok("liquidation"));
        assert!(bob_rx.try_recv().is_err());
    }
}
