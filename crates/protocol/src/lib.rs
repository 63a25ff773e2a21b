//! Reverie Protocol - Wire types shared between the engine and clients.
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - only serde, serde_json, uuid
//! 2. **No business logic** - pure data types and serialization
//! 3. **No domain IDs** - DTOs carry raw `uuid::Uuid`

pub mod events;
pub mod requests;
pub mod responses;

pub use events::{SceneStateData, StreamEvent};
pub use requests::SubmitTurnRequest;
pub use responses::{FinalizeTurnResponse, ProgressResponse, SubmitTurnResponse};
