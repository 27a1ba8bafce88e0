//! Philips Hue integration
//!
//! - [`api`] - management REST API (pairing, rooms, lights, streaming mode)
//! - [`stream`] - encrypted entertainment stream

pub mod api;
pub mod models;
pub mod stream;

pub use models::{ColorUpdate, HueConfig, LightInfo, RemoteGroup};
