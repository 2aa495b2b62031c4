//! Session tracking: one in-flight firmware update per device address.

mod table;
mod types;

pub use table::SessionTable;
pub use types::{Session, SessionInfo, SessionState};
