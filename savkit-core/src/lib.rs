//! Binary building blocks shared by the `savkit` crates: bounds-checked little-endian
//! (de)serialization and the length-prefixed strings used for resource names.

pub mod binary;
pub mod string;
