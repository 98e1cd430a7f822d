#![warn(rust_2018_idioms)]

pub mod consumer;
pub mod device;
pub mod engine;
pub mod error;
pub mod ortc;
pub mod producer;
pub mod rtp_parameters;
pub mod session;
pub mod socket;
pub mod transport_lifecycle;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::Error;

#[macro_use]
extern crate lazy_static;

/// MIME_TYPE_OPUS Opus MIME type.
/// Note: Matching should be case insensitive.
pub const MIME_TYPE_OPUS: &str = "audio/opus";
/// MIME_TYPE_VP8 VP8 MIME type.
/// Note: Matching should be case insensitive.
pub const MIME_TYPE_VP8: &str = "video/VP8";
/// MIME_TYPE_VP9 VP9 MIME type.
/// Note: Matching should be case insensitive.
pub const MIME_TYPE_VP9: &str = "video/VP9";
/// MIME_TYPE_H264 H264 MIME type.
/// Note: Matching should be case insensitive.
pub const MIME_TYPE_H264: &str = "video/H264";
