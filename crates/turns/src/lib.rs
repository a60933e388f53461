//! Turn coordination and stream consumption for Polylogue.
//!
//! This crate is the protocol core of the client: it decides how a user
//! action becomes zero or one streamed assistant replies, folds the wire
//! event sequence into a durable message, mirrors server-pushed memory
//! deltas, and guards shared state against overlapping async operations.
//!
//! Nothing here performs I/O.  The transport hands a
//! [`pl_domain::stream::BoxStream`] of events to [`session::ChatSession`],
//! which drives it to exactly one terminal resolution; rendering is a
//! separate projection over the state this crate owns.

pub mod cancel;
pub mod consumer;
pub mod coordinator;
pub mod gate;
pub mod memory;
pub mod pending;
pub mod session;
pub mod transcript;

pub use cancel::CancelToken;
pub use consumer::{TurnOutcome, TurnReducer, TurnUpdate};
pub use coordinator::{TurnCoordinator, TurnDecision};
pub use gate::{FetchSequencer, SendGate, SendPermit};
pub use memory::MemoryMergeBuffer;
pub use pending::{PendingAction, PendingSlot};
pub use session::{ChatSession, Notice, SendPlan, TurnReport};
