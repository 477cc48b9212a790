//! Collaboration requests, subscribers, and the events a coordinator emits.
//!
//! # Identity
//!
//! A [`CollaborationRequest`] is identified by its filename alone: two
//! requests for the same file are the same session even when the sender
//! metadata differs.  `PartialEq` and `Hash` are implemented by hand to
//! reflect that, which also makes the request usable as a `HashMap` key in
//! the [`SubscriberRegistry`](crate::domain::session::SubscriberRegistry).
//!
//! # Addresses are observed, not declared
//!
//! Neither type is ever built from an address carried in a network payload.
//! The receiving side fills `sender_address` / `address` from the peer
//! address its transport observed when the message arrived.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;

/// One collaboration session, identified by filename.
#[derive(Debug, Clone)]
pub struct CollaborationRequest {
    /// Resource identifier; the session's identity.
    pub filename: String,
    /// Display name of the node that announced the session.
    pub sender_name: String,
    /// Address of the announcing node as observed by the transport.
    pub sender_address: IpAddr,
}

impl CollaborationRequest {
    pub fn new(
        filename: impl Into<String>,
        sender_name: impl Into<String>,
        sender_address: IpAddr,
    ) -> Self {
        Self {
            filename: filename.into(),
            sender_name: sender_name.into(),
            sender_address,
        }
    }

    /// Returns `true` when this request was announced by `local`.
    pub fn is_owned_by(&self, local: IpAddr) -> bool {
        self.sender_address == local
    }
}

impl PartialEq for CollaborationRequest {
    fn eq(&self, other: &Self) -> bool {
        self.filename == other.filename
    }
}

impl Eq for CollaborationRequest {}

impl Hash for CollaborationRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.filename.hash(state);
    }
}

impl fmt::Display for CollaborationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (from {} at {})",
            self.filename, self.sender_name, self.sender_address
        )
    }
}

/// A peer that asked to be told when a session stops.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscriber {
    pub name: String,
    /// Observed transport address of the subscribing peer.
    pub address: IpAddr,
}

impl Subscriber {
    pub fn new(name: impl Into<String>, address: IpAddr) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

impl fmt::Display for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Observable outcomes of coordinator transitions.
///
/// Delivered on the coordinator's event channel to whatever front-end or
/// logger is listening.
#[derive(Debug, Clone, PartialEq)]
pub enum CollaborationEvent {
    /// An inbound announcement occupied this node; a subscription was sent
    /// back to the announcer.
    Accepted(CollaborationRequest),
    /// An inbound announcement arrived while this node was busy.  The
    /// announcer is not told.
    Declined(CollaborationRequest),
    /// The session owner told this node to stop.
    StopRequested(CollaborationRequest),
    /// A peer subscribed to a session owned by this node.
    SubscriptionRegistered(Subscriber),
    /// A subscriber was told the session stopped.
    SubscriberNotified(Subscriber),
    /// A subscriber could not be told the session stopped.
    SubscriberNotifyFailed { subscriber: Subscriber, reason: String },
}
