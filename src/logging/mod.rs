//! Transition journal.

mod jsonl;

pub use jsonl::{JsonlLogger, SessionEvent};
