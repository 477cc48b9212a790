//! Network infrastructure for a LAN-Collab node.
//!
//! # Sub-modules
//!
//! - **`broadcast`** – UDP receive loop for `Announce` datagrams sent to the
//!   subnet broadcast address.
//!
//! - **`unicast`** – TCP accept loop for `Subscribe` and `StopCollaborating`
//!   calls, each answered with an `Ack`.
//!
//! - **`transport`** – [`SocketTransport`](transport::SocketTransport), the
//!   production implementation of the coordinator's `DiscoveryTransport`.
//!
//! - **`framing`** – Whole-frame reads and writes on a TCP stream.
//!
//! - **`interfaces`** – Local interface enumeration used to pick this node's
//!   address inside the configured subnet.
//!
//! - **`listener`** – The shutdown handle both receive loops return.

pub mod broadcast;
pub mod framing;
pub mod interfaces;
pub mod listener;
pub mod transport;
pub mod unicast;
