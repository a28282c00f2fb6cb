//! Contains types for working with the pitches written in prompts.

pub mod notes;
