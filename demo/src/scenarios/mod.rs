//! Demo scenarios. Each one prints its steps and returns an error only when
//! Bastion itself misbehaves.

pub mod anchoring;
pub mod audit;
pub mod encryption;
