//! Play position, pending queue and play log

pub mod error;
pub mod history;
pub mod key;
pub mod media;
pub mod metadata;
pub mod player;
pub mod queue;
