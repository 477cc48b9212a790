//! Domain entities for LAN-Collab.
//!
//! This module contains pure business logic with no infrastructure
//! dependencies: no sockets, no file system, no OS interface tables.  The one
//! host lookup the domain needs (listing local addresses) is expressed as the
//! [`network_address::LocalAddressSource`] trait and supplied from outside.
//!
//! # Sub-modules
//!
//! - **`network_address`** – CIDR parsing, broadcast derivation, and
//!   local-address selection.
//! - **`collaboration`** – the request, subscriber, and event types.
//! - **`session`** – the single active-session cell and the subscriber
//!   registry, both safe to share across threads.

pub mod collaboration;
pub mod network_address;
pub mod session;
