//! # dmap-rs
//!
//! Discovery, serving and catalog retrieval for DMAP-family media shares
//! (DAAP for audio, DPAP for images).
//!
//! The client side browses for shares, opens a session against each one it
//! finds and prints the catalog of every session that connects. The server
//! side builds a one-item share, serves it and advertises it. Both sides are
//! driven by a single [`event_loop::EventLoop`].

pub mod constants;
pub mod db;
pub mod error;
pub mod message;
pub mod protocol;
pub mod record;

pub mod client;
pub mod connection;
pub mod discovery;
pub mod enumerate;
pub mod event_loop;
pub mod reporter;
pub mod session;
pub mod share;

pub use error::{DiscoveryError, Error, Result, SessionError, ShareError};
pub use protocol::{MessageRead, MessageWrite, ProtocolRead, ProtocolWrite};
