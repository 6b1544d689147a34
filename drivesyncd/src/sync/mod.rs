pub mod engine;
pub mod hasher;
pub mod hydrate;
pub mod local_watcher;
pub mod resolve;
pub mod tracking;
