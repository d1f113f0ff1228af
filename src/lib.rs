//! ABX exchange client library.
//!
//! This crate provides the core types and logic used by the `abx_client`
//! binary and the `player` tool:
//!
//! - `codec`: 2-byte requests and the 16-byte packet record
//! - `tracker`: range-complement gap detection over sequence numbers
//! - `session`: the replay / bounded-recovery state machine over a transport
//! - `assembler`: first-write-wins merge into sequence order
//! - `config`, `output`, `record`, `logging`: configuration file, JSON and
//!   capture writers, the CRC-framed capture schema, and `tracing` setup
//!
//! The binaries in this repository (`src/main.rs` and `src/bin/player.rs`)
//! run a session and replay capture files respectively.
pub mod assembler;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod record;
pub mod session;
pub mod tracker;

pub use codec::{CallType, Packet};
pub use config::Config;
pub use error::ClientError;
pub use session::{RunOutcome, Session};
