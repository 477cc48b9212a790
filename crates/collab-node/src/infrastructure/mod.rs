//! Infrastructure layer for a LAN-Collab node.
//!
//! Contains OS-facing adapters: UDP and TCP sockets, interface enumeration,
//! file-system storage, and the interactive console.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `collab_core`, but MUST NOT be imported by the `application` or domain
//! layers.

pub mod console;
pub mod network;
pub mod storage;
