//! Wire types: status events going out, command frames coming in.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! carry them over whatever byte stream it owns (the `slidecap` binary uses
//! JSON lines on stdin/stdout).

pub mod events;
pub mod frames;
