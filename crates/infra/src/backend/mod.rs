//! HomeChef backend adapters

pub mod bridge;

pub use bridge::BackendSessionBridge;
