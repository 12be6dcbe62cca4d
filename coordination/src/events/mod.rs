//! Session event stream
//!
//! Polling remains the external contract for "is everyone done yet?", but
//! every room and round transition is also published here so in-process
//! observers (logging, tests, a future push transport) can follow along.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Coordinator  │────▶│  Event Bus   │────▶│  Subscribers │
//! │  (publish)   │     │  (broadcast) │     │   (recv)     │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventFilter, FilteredReceiver, SharedEventBus, DEFAULT_CAPACITY};
pub use types::{BallotKind, SessionEvent};
