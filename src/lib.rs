//! Converts i.MX NAND flash dumps into linear memory images.
//!
//! The core pipeline: locate the Flash Control Block ([`fcb::locate`]),
//! parse it into a [`fcb::Geometry`], then drive [`converter::convert`]
//! across the dump (or a firmware subrange), which splits each page
//! ([`splitter::split_page`]) and, when correction is enabled, repairs
//! bit flips with [`bch::BchDecoder`].

pub mod bch;
pub mod bitshift;
pub mod converter;
pub mod error;
pub mod fcb;
pub mod splitter;
pub mod stats;

pub use converter::{convert, Mode};
pub use error::{Error, Result};
pub use fcb::Geometry;
pub use stats::EccStats;
