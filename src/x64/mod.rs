//! x86-64 target description.
//!
//! The concrete back-end data for AMD64: the static register table with its
//! `CPU` and `XMM` categories, the [`amd64`] architecture constructor, and
//! the System V flavored [`X64RegisterConfig`].

pub mod regconfig;
pub mod registers;

pub use regconfig::X64RegisterConfig;
pub use registers::{amd64, CPU, XMM};
