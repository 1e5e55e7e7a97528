//! Live-update notification hub.
//!
//! Clients that open the watch endpoint become subscribers. Every successful
//! file write is announced to all of them as a `file` event naming the written
//! path, and each subscriber gets a `ping` every heartbeat interval so idle
//! connections are not closed by proxies.
//!
//! # Delivery
//!
//! - **Best effort, at most once**: events are pushed to whoever is subscribed
//!   at broadcast time. Nothing is queued for clients that connect later.
//! - **Partial failure tolerant**: a subscriber that cannot receive is logged
//!   and dropped without affecting delivery to the others.
//! - **Self-cleaning**: dropping a [`manager::Subscriber`] (which happens when
//!   the HTTP response stream is dropped on disconnect) removes it from the set
//!   and stops its heartbeat task.
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry, the concurrent subscriber set, and SubscriberId
//! - `manager`: Manager (subscribe, broadcast, unsubscribe) and Subscriber
//! - `message`: Event types and their payloads

pub mod connection;
pub mod manager;
pub mod message;

pub use manager::{Manager, Subscriber};
