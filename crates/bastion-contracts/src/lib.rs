//! # bastion-contracts
//!
//! Shared types, wire formats, and error contracts for Bastion.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate beyond field validation and the hybrid ciphertext framing.

pub mod actions;
pub mod batch;
pub mod crypto;
pub mod error;
pub mod record;
