//! # collab-core
//!
//! Shared library for LAN-Collab containing subnet arithmetic, the
//! collaboration domain types, and the binary wire codec.
//!
//! It has zero dependencies on sockets, OS interface tables, or the file
//! system; those live in `collab-node`.
//!
//! # Architecture overview (for beginners)
//!
//! LAN-Collab lets machines on one subnet agree on who is working on which
//! file.  A node *announces* a file over UDP broadcast; every idle peer that
//! hears it becomes busy with that file and *subscribes* back to the
//! announcer over TCP.  When the announcer stops, it calls each subscriber
//! to tell them the session is over.
//!
//! This crate is the shared foundation.  It defines:
//!
//! - **`domain`** – `NetworkAddress` (CIDR parsing and broadcast derivation),
//!   the `CollaborationRequest` / `Subscriber` / `CollaborationEvent` types,
//!   and the thread-safe `SessionCell` and `SubscriberRegistry`.
//!
//! - **`protocol`** – How bytes travel over the network.  Messages are encoded
//!   into a compact binary format (24-byte header + payload) and decoded back
//!   into typed Rust structs on the other end.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `collab_core::NetworkAddress` instead of the full module path.
pub use domain::collaboration::{CollaborationEvent, CollaborationRequest, Subscriber};
pub use domain::network_address::{AddressError, LocalAddressSource, NetworkAddress};
pub use domain::session::{SessionCell, SubscriberRegistry};
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::messages::CollabMessage;
