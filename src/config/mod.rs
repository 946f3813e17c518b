pub mod bridge;
pub mod global;

pub use bridge::*;
pub use global::*;
