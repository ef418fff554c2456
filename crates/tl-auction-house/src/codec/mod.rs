//! compress-json codec used for the `items` and per-server price payloads.

pub mod base62;
pub mod compress_json;

pub use compress_json::{compress, decompress};
