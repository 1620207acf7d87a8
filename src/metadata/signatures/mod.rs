//! Raw signature shapes as produced by the blob decoder.
//!
//! Byte-level blob parsing belongs to the image decoder; this module only defines the
//! decoded-but-unrealized form the decoder hands over. The module reader turns these
//! into [`crate::metadata::typesystem::TypeSig`] by realizing every token against its
//! own image and binding generic indices through the active decode context.

mod types;

pub use types::{SignatureArrayShape, SignatureMember, SignatureMethod, SignatureType};
