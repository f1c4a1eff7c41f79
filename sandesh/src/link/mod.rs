//! Link layer: sessions, the session manager and event delivery

pub mod events;
pub mod framing;
pub mod manager;
pub mod session;

pub use events::{EventHub, LinkEvent};
pub use framing::LineFramer;
pub use manager::{LinkStatus, ListenerKind, SessionManager, SlotState, Subscription};
pub use session::{Session, SessionId, SessionState};
