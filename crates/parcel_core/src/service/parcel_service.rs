//! Parcel tracking use-cases.
//!
//! # Invariants
//! - Services never bypass the store's status guards.
//! - Status advancement follows `registered -> sent -> delivered` only.

use crate::model::parcel::{ClientId, Parcel, ParcelNumber, ParcelStatus};
use crate::repo::parcel_store::{ParcelStore, RepoError, RepoResult};
use log::info;

/// Tracker use-case service generic over the store backend.
pub struct ParcelService<S: ParcelStore> {
    store: S,
}

impl<S: ParcelStore> ParcelService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers a new parcel for `client` and returns the stored record.
    pub fn register(&self, client: ClientId, address: impl Into<String>) -> RepoResult<Parcel> {
        let mut parcel = Parcel::new(client, address);
        parcel.number = self.store.add(&parcel)?;

        info!(
            "event=parcel_register module=service status=ok number={} client={}",
            parcel.number, client
        );
        Ok(parcel)
    }

    /// Fetches one parcel.
    pub fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        self.store.get(number)
    }

    /// Lists a client's parcels.
    pub fn client_parcels(&self, client: ClientId) -> RepoResult<Vec<Parcel>> {
        self.store.get_by_client(client)
    }

    /// Moves a parcel one step forward and returns its new status.
    ///
    /// # Errors
    /// - `InvalidTransition` when the parcel is `delivered` or carries a
    ///   status outside the tracker lifecycle.
    pub fn next_status(&self, number: ParcelNumber) -> RepoResult<String> {
        let parcel = self.store.get(number)?;
        let Some(next) = ParcelStatus::next(&parcel.status) else {
            return Err(RepoError::InvalidTransition {
                number,
                status: parcel.status,
            });
        };

        self.store.transition_status(number, &parcel.status, next)?;
        info!(
            "event=parcel_advance module=service status=ok number={} from={} to={}",
            number, parcel.status, next
        );
        Ok(next.to_string())
    }

    /// Changes the delivery address of a still `registered` parcel.
    pub fn change_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()> {
        self.store.set_address(number, address)
    }

    /// Deletes a still `registered` parcel.
    pub fn delete(&self, number: ParcelNumber) -> RepoResult<()> {
        self.store.delete(number)?;
        info!(
            "event=parcel_delete module=service status=ok number={}",
            number
        );
        Ok(())
    }
}
