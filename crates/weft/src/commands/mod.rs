//! Command implementations for the weft CLI

pub mod check;
pub mod render;
pub mod tokens;
