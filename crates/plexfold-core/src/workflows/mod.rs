//! # Workflows Module
//!
//! The highest-level, user-facing layer: complete procedures tying the
//! immutable [`crate::core`] model to the [`crate::engine`] search. The
//! CLI calls these entry points; library users can too.

pub mod assemble;
