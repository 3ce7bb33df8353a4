//! Session-stored visitor state.
//!
//! The cart and the chat transcript live in the session store and vanish
//! with it. Missing or unreadable entries read as empty.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tower_sessions::session::Error;
use uuid::Uuid;

use lyceum_core::Cart;
use lyceum_core::chat::Transcript;

/// Session keys for visitor data.
pub mod keys {
    /// Key for the shopping cart.
    pub const CART: &str = "cart";

    /// Key for the chat transcript.
    pub const TRANSCRIPT: &str = "chat_transcript";

    /// Key for the visitor's ad-network identity.
    pub const VISITOR: &str = "visitor";
}

/// Identity sent to the ad network: one user ID per session and one chat ID
/// per conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visitor {
    pub user_id: String,
    pub chat_id: String,
}

impl Visitor {
    fn generate() -> Self {
        Self {
            user_id: format!("user_{}", Uuid::new_v4()),
            chat_id: format!("chat_{}", Uuid::new_v4()),
        }
    }

    /// Load the visitor, creating and storing one on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn load(session: &Session) -> Result<Self, Error> {
        if let Some(visitor) = session.get::<Self>(keys::VISITOR).await? {
            return Ok(visitor);
        }
        let visitor = Self::generate();
        session.insert(keys::VISITOR, &visitor).await?;
        Ok(visitor)
    }

    /// Start a new conversation, keeping the user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn restart_chat(session: &Session) -> Result<Self, Error> {
        let mut visitor = Self::load(session).await?;
        visitor.chat_id = format!("chat_{}", Uuid::new_v4());
        session.insert(keys::VISITOR, &visitor).await?;
        Ok(visitor)
    }
}

/// Get the cart from the session, or an empty cart.
pub async fn load_cart(session: &Session) -> Cart {
    match session.get::<Cart>(keys::CART).await {
        Ok(cart) => cart.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read cart from session");
            Cart::new()
        }
    }
}

/// Store the cart in the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), Error> {
    session.insert(keys::CART, cart).await
}

/// Get the transcript from the session, or a fresh one with the greeting.
pub async fn load_transcript(session: &Session) -> Transcript {
    match session.get::<Transcript>(keys::TRANSCRIPT).await {
        Ok(transcript) => transcript.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read chat transcript from session");
            Transcript::new()
        }
    }
}

/// Store the transcript in the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_transcript(session: &Session, transcript: &Transcript) -> Result<(), Error> {
    session.insert(keys::TRANSCRIPT, transcript).await
}
