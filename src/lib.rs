//! Rule-based update routing for Telegram bots.
//!
//! Handler units declare [`routing::MatchRule`]s, [`routing::Discovery`]
//! builds the lookup tables once at startup, and [`routing::Dispatcher`]
//! routes every incoming update to at most one unit.

pub mod config;
pub mod error;
pub mod handlers;
pub mod platform;
pub mod routing;
