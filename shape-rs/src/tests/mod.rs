//! Test module for shape-rs
//!
//! This module contains property-based tests using proptest
//! to validate correctness properties of the schema engine.

#[cfg(test)]
pub mod strategies;

#[cfg(test)]
pub mod roundtrip_tests;

#[cfg(test)]
pub mod object_tests;


#[cfg(test)]
pub mod compile_tests;

#[cfg(test)]
pub mod async_tests;
