//! Shared types, adapter traits, and error types for the Attenda push
//! subsystem.
//!
//! This crate contains the foundational types that are shared between the
//! push delivery crate and the subscription storage adapters. Extracting
//! these into a separate crate lets adapter implementations compile without
//! pulling in the delivery stack.

pub mod error;
pub mod prelude;
pub mod subscription_adapter;
pub mod types;

// vim: ts=4
