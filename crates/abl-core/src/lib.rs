#![deny(missing_docs)]
#![doc = "Core error model, value helpers and the salted hash primitive shared by every ABL crate."]

pub mod errors;
pub mod hash;
pub mod serde;
pub mod value;

pub use errors::{AblError, ErrorInfo};
pub use hash::{digest_key, hash_key, SaltedHasher, LONG_SCALE};
pub use value::{hash_string, unit_parts, Inputs};
