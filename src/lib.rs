//! # Ledis
//!
//! An embeddable, Redis-wire-compatible in-memory data store.
//!
//! Ledis speaks RESP2 and RESP3 and keeps its key space in a fixed,
//! power-of-two array of concurrent shards. Each key maps to an item
//! carrying one of seven concrete payloads (strings, lists, hashes, sets,
//! sorted sets, roaring bitmaps, streams) plus a TTL and a per-item lock.
//! On top of the core sit a pub/sub bus, server-assisted client-side-caching
//! invalidation, optimistic WATCH/MULTI/EXEC transactions, and a TCP
//! front-end that accepts concurrent clients.

pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod pubsub;
pub mod resp;
pub mod server;
pub mod store;
pub mod tracker;
pub mod types;
