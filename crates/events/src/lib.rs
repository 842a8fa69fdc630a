//! Pyrowatch event stream infrastructure.
//!
//! Building blocks between the processing loop and the HTTP stream
//! adapter:
//!
//! - [`StreamEvent`] — the wire envelope pushed to subscribers
//!   (`hello`/`heartbeat`/`tick`/`end`/`error`).
//! - [`channel`] — bounded per-job event channel; a full channel blocks
//!   the producer, which throttles detection to the consumer's read rate.
//! - [`delivery`] — the fire-and-forget emergency e-mail adapter.

pub mod channel;
pub mod delivery;
pub mod event;

pub use channel::{channel, EventReceiver, EventSender, RecvOutcome, DEFAULT_CAPACITY};
pub use delivery::{AlertMailer, EmailConfig, EmailError};
pub use event::{StreamEvent, TickEvent};
