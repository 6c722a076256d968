//! Inbound data-layer schema
//!
//! This module defines the change notifications delivered by the wearable
//! data layer and the scoped batch buffer they arrive in.

mod buffer;
mod notification;

pub use buffer::*;
pub use notification::*;
