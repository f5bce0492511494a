//! Type definitions for the Moonshot API.
//!
//! Wire types for the file and chat endpoints, plus the local upload limits
//! enforced before anything is sent.

pub mod chat;
pub mod files;
pub mod limits;
