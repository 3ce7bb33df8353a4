//! External service clients and assistant logic.
//!
//! # Services
//!
//! - `stripe` - Product catalog and hosted checkout sessions
//! - `openai` - Chat completions (blocking and streamed)
//! - `chat` - System prompt and transcript mapping for the assistant
//! - `ads` - Thrads sponsored messages, cadence and impression logging

pub mod ads;
pub mod chat;
pub mod openai;
pub mod stripe;

pub use ads::{AdService, ThradsClient, ThradsError};
pub use openai::{OpenAiClient, OpenAiError};
pub use stripe::{StripeClient, StripeError};
