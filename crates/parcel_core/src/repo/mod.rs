//! Persistence layer for parcels.
//!
//! # Responsibility
//! - Define the `ParcelStore` data access contract.
//! - Keep SQL inside the core crate.
//!
//! # Invariants
//! - Store APIs return semantic errors (`NotFound`, `InvalidTransition`)
//!   separately from engine errors (`Storage`).

pub mod parcel_store;
