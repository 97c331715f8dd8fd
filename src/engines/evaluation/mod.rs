pub mod expression;

pub use expression::{evaluate, Bindings};
