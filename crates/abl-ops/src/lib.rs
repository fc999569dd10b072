#![deny(missing_docs)]

//! Random operators and the [`Assignment`] context they are evaluated in.
//!
//! ```
//! use abl_ops::{Assignment, RandomOperator};
//! use serde_json::json;
//!
//! let mut params = Assignment::new("checkout_test");
//! params
//!     .set("button", RandomOperator::uniform_choice(json!(["red", "blue"])).unit(42))
//!     .unwrap();
//! assert!(params.get("button").is_some());
//! ```

mod arg;
mod assignment;
mod operator;
pub mod random;

pub use arg::Arg;
pub use assignment::Assignment;
pub use operator::{OptionSpec, Params, RandomKind, RandomOperator, SALT_ARG, UNIT_ARG};
