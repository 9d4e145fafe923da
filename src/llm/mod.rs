//! Chat model plumbing: message types, tool schemas, and provider clients.

pub mod backend;
pub mod bedrock;
pub(crate) mod chat_runtime;
pub mod message;
pub mod openai;
pub mod request;
pub mod response;
pub mod tools;
