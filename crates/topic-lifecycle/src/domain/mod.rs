//! # Domain Layer
//!
//! Pure topic lifecycle logic, no I/O.

pub mod chunking;
pub mod entities;
pub mod errors;
pub mod transactions;
