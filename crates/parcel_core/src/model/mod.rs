//! Parcel domain model.
//!
//! # Invariants
//! - A parcel is identified by an engine-assigned `ParcelNumber` that is
//!   never reused.
//! - The address is frozen once the status leaves `registered`.

pub mod parcel;
