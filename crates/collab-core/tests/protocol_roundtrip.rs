//! Integration tests for the collab-core public API.
//!
//! These exercise the codec together with the domain conversions a receiving
//! node performs: decode a frame, then stamp the payload with the observed
//! peer address.

use std::net::IpAddr;

use collab_core::{
    decode_message, encode_message,
    protocol::{sequence::SequenceCounter, HEADER_SIZE},
    CollabMessage, CollaborationRequest, NetworkAddress, Subscriber,
};

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// Encodes a message and decodes it again, checking all bytes were consumed.
fn over_the_wire(msg: &CollabMessage, counter: &SequenceCounter) -> CollabMessage {
    let bytes = encode_message(msg, counter.next(), 12345).expect("encode must succeed");
    let (decoded, consumed) = decode_message(&bytes).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    decoded
}

#[test]
fn test_announce_reaches_peer_as_request_with_observed_address() {
    // Arrange
    let counter = SequenceCounter::new();
    let local = CollaborationRequest::new("3fa1.ext", "alpha", ip("192.168.1.10"));

    // Act
    let decoded = over_the_wire(&CollabMessage::announce(&local), &counter);
    let CollabMessage::Announce(announce) = decoded else {
        panic!("expected Announce, got {decoded:?}");
    };
    let remote = announce.into_request(ip("192.168.1.10"));

    // Assert
    assert_eq!(remote, local);
    assert_eq!(remote.sender_name, "alpha");
    assert!(remote.is_owned_by(ip("192.168.1.10")));
}

#[test]
fn test_subscribe_reaches_owner_as_subscriber_with_observed_address() {
    let counter = SequenceCounter::new();
    let request = CollaborationRequest::new("3fa1.ext", "alpha", ip("192.168.1.10"));

    let decoded = over_the_wire(&CollabMessage::subscribe(&request, "beta"), &counter);
    let CollabMessage::Subscribe(subscribe) = decoded else {
        panic!("expected Subscribe, got {decoded:?}");
    };
    let (key, subscriber) = subscribe.into_parts(ip("192.168.1.20"));

    assert_eq!(key, request);
    assert_eq!(subscriber, Subscriber::new("beta", ip("192.168.1.20")));
}

#[test]
fn test_unicode_filenames_survive_encoding() {
    let counter = SequenceCounter::new();
    let request = CollaborationRequest::new("плaн-设计.ext", "ñode", ip("10.0.0.1"));

    let decoded = over_the_wire(&CollabMessage::stop_collaborating(&request), &counter);

    assert_eq!(decoded, CollabMessage::stop_collaborating(&request));
}

#[test]
fn test_ack_is_header_only() {
    let bytes = encode_message(&CollabMessage::Ack, 0, 0).unwrap();
    assert_eq!(bytes.len(), HEADER_SIZE);
}

#[test]
fn test_broadcast_endpoint_for_configured_subnet() {
    // Arrange
    let network: NetworkAddress = "192.168.1.77/24".parse().unwrap();

    // Act
    let endpoint = network.broadcast_endpoint(24810);

    // Assert
    assert_eq!(network.to_string(), "192.168.1.0/24");
    assert_eq!(endpoint.to_string(), "192.168.1.255:24810");
}
