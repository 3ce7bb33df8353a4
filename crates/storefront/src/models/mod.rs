//! Per-visitor state kept in the session.

pub mod session;

pub use session::keys as session_keys;
pub use session::{Visitor, load_cart, load_transcript, save_cart, save_transcript};
