//! Detector adapter.
//!
//! The object-detection engine is an external collaborator: given a frame
//! it returns detected regions with a class and a confidence. This crate
//! holds the contract ([`Detector`]), an HTTP client implementation
//! against a remote inference server ([`HttpDetector`]), and a scripted
//! implementation for driving the pipeline in tests
//! ([`ScriptedDetector`]).

pub mod adapter;
pub mod remote;
pub mod scripted;

pub use adapter::{Detector, DetectorError};
pub use remote::HttpDetector;
pub use scripted::ScriptedDetector;
