mod client;
mod store;

pub use client::{DriveClient, DriveError};
pub use reqwest::StatusCode;
pub use store::RemoteStore;
