//! A multi-user IRC relay server: the wire codec, name validator,
//! connection endpoint, listener, dispatcher, and reply table described in
//! SPEC_FULL.md, plus the ambient configuration/logging/MOTD stack that
//! turns them into a runnable binary (see `src/bin/relaird.rs`).

pub mod client;
pub mod config;
pub mod errors;
pub mod hub;
pub mod listener;
pub mod message;
pub mod motd;
pub mod replies;
pub mod state;
pub mod validate;
