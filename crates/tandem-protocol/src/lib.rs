//! Shared protocol definitions for Tandem
//!
//! Every WebSocket frame is a JSON object tagged by `"type"`. Session
//! descriptions and ICE candidates are carried as opaque JSON values: the
//! server forwards them verbatim and never looks inside.

pub mod messages;
pub mod types;

pub use messages::*;
pub use types::*;
