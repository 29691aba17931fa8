//! Use-case services over the parcel store.
//!
//! # Responsibility
//! - Turn store primitives into tracker use-cases (register, advance, ...).
//! - Keep CLI callers decoupled from SQL details.

pub mod parcel_service;
