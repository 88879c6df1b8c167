//! Telegram Bot API binding
//!
//! Wire types, the HTTP client implementing [`ChatTransport`] and the
//! long-poll loop. The webhook route lives in `api`.
//!
//! [`ChatTransport`]: crate::runtime::ChatTransport

mod client;
mod poll;
pub mod types;

pub use client::TelegramClient;
pub use poll::run_polling;
pub use types::Update;
