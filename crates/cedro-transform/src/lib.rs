//! The four marker-rewriting passes (spec.md §2 item 5, §4.3-§4.5):
//! backstitch, defer, slice, and self. Each pass takes a lexed
//! [`cedro_syntax::MarkerArray`] and the owning [`cedro_syntax::Buffer`]
//! and rewrites markers in place, interning any synthetic tokens it
//! needs into the buffer.

pub mod backstitch;
pub mod defer;
pub mod error;
pub mod self_pass;
pub mod slice;
pub mod util;

pub use error::TransformError;
