//! Random number generation

pub mod xorshift;

pub use xorshift::WheelRng;
