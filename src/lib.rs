//! Scolia - retrieval-and-routing engine for conversational textbook Q&A
//!
//! For every incoming question the engine decides whether retrieval is
//! needed at all, which passages to retrieve and in what order, and what
//! task-specific behavior to apply, while keeping a per-conversation scope
//! (chapter focus, pinned blocks) alive across turns.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod generate;
pub mod index;
pub mod pipeline;
pub mod retrieval;
pub mod rewrite;
pub mod router;
pub mod session;

pub use error::{Result, ScoliaError};
