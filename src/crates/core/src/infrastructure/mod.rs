//! Infrastructure layer

pub mod ai;

