//! Parcel record and lifecycle labels.
//!
//! # Responsibility
//! - Define the record persisted in the `parcel` table.
//! - Name the well-known lifecycle statuses and their forward order.
//! - Validate records before they are written and after they are read.
//!
//! # Invariants
//! - `status` is never empty.
//! - `created_at` is an RFC3339 timestamp with a UTC offset.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Engine-assigned parcel identifier.
pub type ParcelNumber = i64;

/// Identifier of the client that owns a parcel.
pub type ClientId = i64;

/// Well-known parcel statuses.
///
/// Statuses are stored as free-form text so carriers can introduce their own
/// labels; these constants cover the lifecycle the tracker itself drives.
pub struct ParcelStatus;

impl ParcelStatus {
    /// Initial status. Address edits and deletion are only allowed here.
    pub const REGISTERED: &'static str = "registered";
    /// Handed over to the carrier.
    pub const SENT: &'static str = "sent";
    /// Terminal status.
    pub const DELIVERED: &'static str = "delivered";

    /// Returns the status that follows `current` in the tracker lifecycle.
    ///
    /// Returns `None` for `delivered` and for labels outside the lifecycle.
    pub fn next(current: &str) -> Option<&'static str> {
        match current {
            Self::REGISTERED => Some(Self::SENT),
            Self::SENT => Some(Self::DELIVERED),
            _ => None,
        }
    }

    /// Whether the address and existence of a parcel can still be changed.
    pub fn is_mutable(status: &str) -> bool {
        status == Self::REGISTERED
    }
}

/// A tracked shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    /// `0` until the store assigns a number on insert.
    pub number: ParcelNumber,
    pub client: ClientId,
    pub status: String,
    pub address: String,
    /// RFC3339, UTC, second precision when produced by [`Parcel::new`].
    pub created_at: String,
}

/// Record-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParcelValidationError {
    EmptyStatus,
    /// New parcels must start out `registered`; holds the rejected label.
    InitialStatus(String),
    InvalidCreatedAt(String),
    CreatedAtNotUtc(String),
}

impl Display for ParcelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyStatus => write!(f, "parcel status cannot be empty"),
            Self::InitialStatus(status) => write!(
                f,
                "new parcels must start as `{}`, got `{status}`",
                ParcelStatus::REGISTERED
            ),
            Self::InvalidCreatedAt(value) => {
                write!(f, "created_at `{value}` is not an RFC3339 timestamp")
            }
            Self::CreatedAtNotUtc(value) => write!(f, "created_at `{value}` is not in UTC"),
        }
    }
}

impl Error for ParcelValidationError {}

impl Parcel {
    /// Builds an unsaved `registered` parcel stamped with the current time.
    pub fn new(client: ClientId, address: impl Into<String>) -> Self {
        Self::with_created_at(client, address, now_rfc3339())
    }

    /// Builds an unsaved `registered` parcel with a caller-provided timestamp.
    ///
    /// Used by imports where the creation time already exists elsewhere.
    pub fn with_created_at(
        client: ClientId,
        address: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            number: 0,
            client,
            status: ParcelStatus::REGISTERED.to_string(),
            address: address.into(),
            created_at: created_at.into(),
        }
    }

    /// Whether the parcel is still in its initial status.
    pub fn is_registered(&self) -> bool {
        ParcelStatus::is_mutable(&self.status)
    }

    /// Checks field-level invariants.
    pub fn validate(&self) -> Result<(), ParcelValidationError> {
        validate_status(&self.status)?;
        validate_created_at(&self.created_at)
    }
}

/// Rejects blank status labels.
pub fn validate_status(status: &str) -> Result<(), ParcelValidationError> {
    if status.trim().is_empty() {
        return Err(ParcelValidationError::EmptyStatus);
    }
    Ok(())
}

fn validate_created_at(value: &str) -> Result<(), ParcelValidationError> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .map_err(|_| ParcelValidationError::InvalidCreatedAt(value.to_string()))?;
    if parsed.offset().local_minus_utc() != 0 {
        return Err(ParcelValidationError::CreatedAtNotUtc(value.to_string()));
    }
    Ok(())
}

/// Current time as RFC3339 UTC with second precision, e.g. `2024-05-01T09:30:00Z`.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
