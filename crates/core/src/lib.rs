//! Lyceum Core - domain types and storefront rules.
//!
//! This crate is shared by the storefront server and the CLI:
//! - `storefront` - Public-facing shop, cart, checkout and chat assistant
//! - `cli` - Command-line tools for migrations and Stripe catalog sync
//!
//! # Architecture
//!
//! The core crate contains types and pure rules only - no I/O, no database
//! access, no HTTP clients. Cart arithmetic, archetype discounts, wellness
//! scores, Stripe matching and the ad cadence can all be tested without a
//! server.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices and status enums
//! - [`catalog`] - Mushrooms, database products and the display product
//! - [`cart`] - Cart lines and totals
//! - [`archetype`] - Bundle completion, suggestions and discounts
//! - [`wellness`] - Wellness categories and cart scores
//! - [`stripe_match`] - Mapping cart products onto Stripe products
//! - [`chat`] - Transcript, ad cadence and the keyword advisor

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod archetype;
pub mod cart;
pub mod catalog;
pub mod chat;
pub mod stripe_match;
pub mod types;
pub mod wellness;

pub use cart::{Cart, CartItem};
pub use catalog::{DatabaseProduct, Mushroom, MushroomProduct, Product};
pub use types::*;
