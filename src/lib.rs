pub mod cli;
pub mod config;
pub mod domain;
pub mod library;
pub mod playback;
pub mod storage;
