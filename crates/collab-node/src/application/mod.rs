//! Application layer use cases for a LAN-Collab node.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure business rules) and the infrastructure (OS/network/storage).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a user goal (e.g., "claim this
//!   file and tell the subnet").
//! - **Depend on abstractions** (traits) rather than concrete implementations,
//!   so the sockets can be swapped for an in-memory network in tests.
//! - **Contain no OS calls, no network I/O, no file system access**.
//!
//! # Sub-modules
//!
//! - **`coordinate_collaboration`** – The session state machine: announce,
//!   accept or decline, subscribe, and fan-out teardown.

pub mod coordinate_collaboration;
