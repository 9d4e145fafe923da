//! Demo programs that query a hosted chat model for movie information and
//! run a customer-support chat.

pub mod config;
pub mod demos;
pub mod llm;
pub mod logging;
pub mod movies;
pub mod session;
