//! CollaborationCoordinator: the per-node session state machine.
//!
//! The coordinator owns the node's [`SessionCell`] and [`SubscriberRegistry`]
//! and is the only thing that mutates them.  Local actions (`initiate`,
//! `stop`) and inbound messages (`on_announce`, `on_subscribe`,
//! `on_notify_stop`) all funnel through it.
//!
//! # Session lifecycle (for beginners)
//!
//! ```text
//!   owner node                               peer node
//!   ──────────                               ─────────
//!   initiate("a.ext")  ── Announce (UDP) ──▶ on_announce
//!     Idle → Active                            Idle → Active, emit Accepted
//!   on_subscribe       ◀── Subscribe (TCP) ──
//!     registry += peer
//!   stop()
//!     Active → Idle
//!     fan-out          ── StopCollaborating ─▶ on_notify_stop
//!                                              → Idle, emit StopRequested
//! ```
//!
//! A node that is already Active when an announcement arrives emits
//! `Declined` locally and sends nothing back.
//!
//! # Architecture
//!
//! This use case depends only on the [`DiscoveryTransport`] trait and domain
//! types from `collab_core`.  The socket implementation is injected at
//! construction time, so every transition is unit-testable with a recording
//! transport.  No lock is held while a transport call is awaited.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use collab_core::{
    protocol::ProtocolError, CollabMessage, CollaborationEvent, CollaborationRequest,
    NetworkAddress, SessionCell, Subscriber, SubscriberRegistry,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure of a single transport send.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer could not be reached or refused the call.
    #[error("peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: SocketAddr, reason: String },

    /// The peer did not acknowledge within the call timeout.
    #[error("call to {peer} timed out")]
    Timeout { peer: SocketAddr },

    /// A listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Any other socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The peer answered with something other than `Ack`.
    #[error("unexpected reply from {peer}: {reply}")]
    UnexpectedReply { peer: SocketAddr, reply: String },
}

/// Error type for coordinator transitions.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// A session is already active on this node.
    #[error("a collaboration session is already active ({filename})")]
    SessionBusy { filename: String },

    /// The announcement could not be broadcast; the node is Idle again.
    #[error("failed to broadcast announcement: {0}")]
    Broadcast(#[source] TransportError),

    /// The subscription back to the announcer failed; the node is Idle again.
    #[error("failed to subscribe to announcer: {0}")]
    Subscribe(#[source] TransportError),
}

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Outbound network capability used by the coordinator.
///
/// The socket implementation sends UDP datagrams and makes TCP calls; test
/// implementations record the calls.
#[async_trait]
pub trait DiscoveryTransport: Send + Sync {
    /// Sends `message` as a best-effort datagram to the subnet broadcast
    /// endpoint `target`.  The sending node also receives it.
    async fn broadcast(
        &self,
        target: SocketAddr,
        message: &CollabMessage,
    ) -> Result<(), TransportError>;

    /// Delivers `message` to `peer` and waits for its acknowledgement.
    async fn unicast_call(
        &self,
        peer: SocketAddr,
        message: &CollabMessage,
    ) -> Result<(), TransportError>;
}

// ── Coordinator ───────────────────────────────────────────────────────────────

/// Static identity and addressing of the local node.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    /// Display name sent as `sender_name` / `subscriber_name`.
    pub name: String,
    /// This node's address inside `network`; used for echo suppression and
    /// ownership checks.
    pub local_address: IpAddr,
    /// Subnet whose broadcast address receives announcements.
    pub network: NetworkAddress,
    /// UDP port announcements are broadcast to.
    pub broadcast_port: u16,
    /// TCP port every node accepts point-to-point calls on.
    pub unicast_port: u16,
}

/// Result of [`CollaborationCoordinator::stop`].
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// No session was active.
    Idle,
    /// A session announced by another node was dropped locally.  Nothing was
    /// sent.
    Released(CollaborationRequest),
    /// A session owned by this node ended and its subscribers were called.
    TornDown {
        request: CollaborationRequest,
        notified: usize,
        failed: usize,
    },
}

/// The per-node session state machine.
///
/// Shared as `Arc<CollaborationCoordinator>` between the console and both
/// listeners; every method takes `&self`.
pub struct CollaborationCoordinator {
    identity: NodeIdentity,
    transport: Arc<dyn DiscoveryTransport>,
    session: SessionCell,
    subscribers: SubscriberRegistry,
    event_tx: mpsc::UnboundedSender<CollaborationEvent>,
}

impl CollaborationCoordinator {
    /// Creates a coordinator and returns it together with the event receiver.
    ///
    /// The channel is unbounded so a slow observer never stalls a transition.
    pub fn new(
        identity: NodeIdentity,
        transport: Arc<dyn DiscoveryTransport>,
    ) -> (Self, mpsc::UnboundedReceiver<CollaborationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            identity,
            transport,
            session: SessionCell::new(),
            subscribers: SubscriberRegistry::new(),
            event_tx: tx,
        };
        (coordinator, rx)
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Snapshot of the active session, if any.
    pub fn current_session(&self) -> Option<CollaborationRequest> {
        self.session.current()
    }

    /// Number of peers subscribed to `request` on this node.
    pub fn subscriber_count(&self, request: &CollaborationRequest) -> usize {
        self.subscribers.subscriber_count(request)
    }

    // ── Local actions ─────────────────────────────────────────────────────────

    /// Claims the node for `filename` and announces it to the subnet.
    ///
    /// # Errors
    ///
    /// - [`CoordinatorError::SessionBusy`] if a session is already active.
    /// - [`CoordinatorError::Broadcast`] if the announcement could not be
    ///   sent; the node is returned to Idle.
    pub async fn initiate(
        &self,
        filename: impl Into<String>,
    ) -> Result<CollaborationRequest, CoordinatorError> {
        let request = CollaborationRequest::new(
            filename,
            self.identity.name.clone(),
            self.identity.local_address,
        );

        if !self.session.try_occupy(request.clone()) {
            let filename = self
                .session
                .current()
                .map_or_else(|| request.filename.clone(), |active| active.filename);
            return Err(CoordinatorError::SessionBusy { filename });
        }

        // Nothing can subscribe to this request before it is broadcast, so
        // every entry still here is left over from an earlier session.
        let stale = self.subscribers.purge();
        if stale > 0 {
            debug!("discarded {stale} stale subscription(s)");
        }

        let target = self
            .identity
            .network
            .broadcast_endpoint(self.identity.broadcast_port);
        if let Err(e) = self
            .transport
            .broadcast(target, &CollabMessage::announce(&request))
            .await
        {
            self.session.release(&request);
            return Err(CoordinatorError::Broadcast(e));
        }

        info!("announced {} to {target}", request.filename);
        Ok(request)
    }

    /// Ends the active session.
    ///
    /// When this node owns the session, every subscriber is called with
    /// `StopCollaborating`.  A failed call is logged, reported as
    /// [`CollaborationEvent::SubscriberNotifyFailed`], and skipped.  Calling
    /// `stop` again afterwards is a no-op.
    pub async fn stop(&self) -> StopOutcome {
        let Some(request) = self.session.take() else {
            debug!("stop requested while idle");
            return StopOutcome::Idle;
        };

        if !request.is_owned_by(self.identity.local_address) {
            info!("released {} announced by {}", request.filename, request.sender_name);
            return StopOutcome::Released(request);
        }

        let (notified, failed) = self.tear_down(&request).await;
        info!(
            "stopped {}: {notified} subscriber(s) notified, {failed} failed",
            request.filename
        );
        StopOutcome::TornDown {
            request,
            notified,
            failed,
        }
    }

    async fn tear_down(&self, request: &CollaborationRequest) -> (usize, usize) {
        let subscribers = self.subscribers.take(request);
        let message = CollabMessage::stop_collaborating(request);
        let mut notified = 0;
        let mut failed = 0;

        for subscriber in subscribers {
            let peer = SocketAddr::new(subscriber.address, self.identity.unicast_port);
            match self.transport.unicast_call(peer, &message).await {
                Ok(()) => {
                    notified += 1;
                    self.emit(CollaborationEvent::SubscriberNotified(subscriber));
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        "failed to notify {subscriber} that {} stopped: {e}",
                        request.filename
                    );
                    self.emit(CollaborationEvent::SubscriberNotifyFailed {
                        subscriber,
                        reason: e.to_string(),
                    });
                }
            }
        }
        (notified, failed)
    }

    // ── Inbound entry points ──────────────────────────────────────────────────

    /// Handles an announcement heard on the broadcast port.
    ///
    /// Announcements from this node's own address are discarded.  An idle
    /// node takes the session and subscribes back to the announcer; a busy
    /// node emits `Declined` and stays as it was.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::Subscribe`] if the subscription call failed.  The
    /// node is returned to Idle and no `Accepted` is emitted.  No `Accepted`
    /// is emitted either when the owner's stop arrives before the call
    /// returns.
    pub async fn on_announce(&self, request: CollaborationRequest) -> Result<(), CoordinatorError> {
        if request.is_owned_by(self.identity.local_address) {
            debug!("ignoring own announcement of {}", request.filename);
            return Ok(());
        }

        if !self.session.try_occupy(request.clone()) {
            debug!("busy, declining {request}");
            self.emit(CollaborationEvent::Declined(request));
            return Ok(());
        }

        let owner = SocketAddr::new(request.sender_address, self.identity.unicast_port);
        let message = CollabMessage::subscribe(&request, &self.identity.name);
        if let Err(e) = self.transport.unicast_call(owner, &message).await {
            self.session.release(&request);
            return Err(CoordinatorError::Subscribe(e));
        }

        // The owner may have stopped while the call was in flight.
        if self.session.current().as_ref() != Some(&request) {
            info!("{request} ended before the subscription completed");
            return Ok(());
        }

        info!("accepted {request}");
        self.emit(CollaborationEvent::Accepted(request));
        Ok(())
    }

    /// Records `subscriber` against `request`.
    ///
    /// Accepted regardless of whether this node still owns the session; a
    /// subscription that lands after teardown is never notified and is
    /// discarded when this node next initiates.
    pub fn on_subscribe(&self, request: CollaborationRequest, subscriber: Subscriber) {
        debug!("{subscriber} subscribed to {}", request.filename);
        self.subscribers.register(request, subscriber.clone());
        self.emit(CollaborationEvent::SubscriptionRegistered(subscriber));
    }

    /// Handles the owner's stop call: clears the session unconditionally.
    pub fn on_notify_stop(&self, request: CollaborationRequest) {
        self.session.clear();
        info!("owner stopped {request}");
        self.emit(CollaborationEvent::StopRequested(request));
    }

    /// Dispatches a decoded wire message to the matching entry point.
    ///
    /// `observed_peer` is the source address the transport saw; it becomes
    /// the request's sender address or the subscriber's address.  Returns
    /// the reply to write back on a point-to-point call, if any.
    ///
    /// # Errors
    ///
    /// Propagates [`CoordinatorError::Subscribe`] from [`on_announce`](Self::on_announce).
    pub async fn handle_message(
        &self,
        message: CollabMessage,
        observed_peer: IpAddr,
    ) -> Result<Option<CollabMessage>, CoordinatorError> {
        match message {
            CollabMessage::Announce(announce) => {
                self.on_announce(announce.into_request(observed_peer)).await?;
                Ok(None)
            }
            CollabMessage::Subscribe(subscribe) => {
                let (request, subscriber) = subscribe.into_parts(observed_peer);
                self.on_subscribe(request, subscriber);
                Ok(Some(CollabMessage::Ack))
            }
            CollabMessage::StopCollaborating(stop) => {
                self.on_notify_stop(stop.into_request(observed_peer));
                Ok(Some(CollabMessage::Ack))
            }
            CollabMessage::Ack => {
                debug!("stray Ack from {observed_peer} ignored");
                Ok(None)
            }
        }
    }

    fn emit(&self, event: CollaborationEvent) {
        // A closed channel only means nobody is observing.
        let _ = self.event_tx.send(event);
    }
}
