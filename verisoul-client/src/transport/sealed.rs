//! Sealed trait marker for Transport implementations.
//!
//! This module prevents external implementations of the `Transport` trait, so
//! every transport goes through the same response classification.

pub(crate) mod private {
    /// Sealed trait marker.
    ///
    /// This trait cannot be implemented outside this crate.
    pub trait Sealed {}
}
