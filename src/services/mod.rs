pub mod generator;

pub use generator::{DrawItem, Generator};
