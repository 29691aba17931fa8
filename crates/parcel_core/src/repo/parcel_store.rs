//! Parcel store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `parcel` table behind the `ParcelStore` trait.
//! - Translate "zero rows affected" into typed failures.
//!
//! # Invariants
//! - Each mutating operation (add, status and address changes, delete) is
//!   exactly one SQL statement; reads are single `SELECT`s.
//! - Address changes and deletion are conditional on `status = 'registered'`
//!   inside that statement, so the check and the write cannot interleave
//!   with another writer.
//! - Status is a one-way gate: once a parcel leaves `registered` no update
//!   can set it back.
//! - Rows read back are validated; bad persisted data is reported, not masked.

use crate::db::migrations::{current_version, latest_version, PARCEL_COLUMNS, PARCEL_TABLE};
use crate::db::DbError;
use crate::model::parcel::{
    validate_status, ClientId, Parcel, ParcelNumber, ParcelStatus, ParcelValidationError,
};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const PARCEL_SELECT_SQL: &str = "SELECT
    number,
    client,
    status,
    address,
    created_at
FROM parcel";

pub type RepoResult<T> = Result<T, RepoError>;

/// Failure returned by parcel store operations.
#[derive(Debug)]
pub enum RepoError {
    /// Connectivity or constraint failure reported by the engine.
    Storage(DbError),
    /// No parcel with this number exists.
    NotFound(ParcelNumber),
    /// The parcel's current status forbids the requested change.
    InvalidTransition {
        number: ParcelNumber,
        status: String,
    },
    Validation(ParcelValidationError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::NotFound(number) => write!(f, "parcel not found: {number}"),
            Self::InvalidTransition { number, status } => write!(
                f,
                "parcel {number} has status `{status}`; transition refused"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted parcel data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} is older than required {expected_version}; open it with db::open_db first"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParcelValidationError> for RepoError {
    fn from(value: ParcelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}

/// CRUD contract over persisted parcels.
pub trait ParcelStore {
    /// Inserts a `registered` parcel and returns its assigned number.
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber>;
    /// Fetches one parcel; `NotFound` when the number does not exist.
    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel>;
    /// Fetches every parcel owned by `client`, oldest number first.
    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>>;
    /// Replaces the address of a `registered` parcel.
    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()>;
    /// Replaces the status label. Moving back to `registered` is refused.
    fn set_status(&self, number: ParcelNumber, status: &str) -> RepoResult<()>;
    /// Replaces the status only while it still equals `expected`.
    ///
    /// `InvalidTransition` carries the status found when it did not match.
    fn transition_status(
        &self,
        number: ParcelNumber,
        expected: &str,
        status: &str,
    ) -> RepoResult<()>;
    /// Removes a `registered` parcel.
    fn delete(&self, number: ParcelNumber) -> RepoResult<()>;
}

/// SQLite-backed parcel store borrowing a caller-owned connection.
pub struct SqliteParcelStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteParcelStore<'conn> {
    /// Wraps a connection after checking it carries the parcel schema.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations were never applied.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the schema
    ///   does not match what the store queries.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_version(conn)?;
        if actual_version < expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        if actual_version > expected_version {
            return Err(DbError::UnsupportedSchemaVersion {
                db_version: actual_version,
                latest_supported: expected_version,
            }
            .into());
        }

        ensure_parcel_schema(conn)?;
        Ok(Self { conn })
    }

    /// Explains why a conditional mutation matched no row.
    fn rejection(&self, number: ParcelNumber) -> RepoError {
        let status = self
            .conn
            .query_row(
                "SELECT status FROM parcel WHERE number = ?1;",
                [number],
                |row| row.get::<_, String>(0),
            )
            .optional();

        match status {
            Ok(Some(status)) => {
                warn!(
                    "event=parcel_transition_rejected module=repo status=error number={} parcel_status={}",
                    number, status
                );
                RepoError::InvalidTransition { number, status }
            }
            Ok(None) => RepoError::NotFound(number),
            Err(err) => err.into(),
        }
    }
}

impl ParcelStore for SqliteParcelStore<'_> {
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber> {
        parcel.validate()?;
        if !parcel.is_registered() {
            return Err(ParcelValidationError::InitialStatus(parcel.status.clone()).into());
        }

        let number = self.conn.query_row(
            "INSERT INTO parcel (
                client,
                status,
                address,
                created_at
            ) VALUES (?1, ?2, ?3, ?4)
            RETURNING number;",
            params![
                parcel.client,
                parcel.status.as_str(),
                parcel.address.as_str(),
                parcel.created_at.as_str(),
            ],
            |row| row.get::<_, ParcelNumber>(0),
        )?;

        debug!(
            "event=parcel_add module=repo status=ok number={} client={}",
            number, parcel.client
        );
        Ok(number)
    }

    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PARCEL_SELECT_SQL} WHERE number = ?1;"))?;

        let mut rows = stmt.query([number])?;
        if let Some(row) = rows.next()? {
            return parse_parcel_row(row);
        }

        Err(RepoError::NotFound(number))
    }

    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PARCEL_SELECT_SQL} WHERE client = ?1 ORDER BY number ASC;"
        ))?;

        let mut rows = stmt.query([client])?;
        let mut parcels = Vec::new();
        while let Some(row) = rows.next()? {
            parcels.push(parse_parcel_row(row)?);
        }

        Ok(parcels)
    }

    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE parcel
             SET address = ?1
             WHERE number = ?2 AND status = ?3;",
            params![address, number, ParcelStatus::REGISTERED],
        )?;

        if changed == 0 {
            return Err(self.rejection(number));
        }

        debug!(
            "event=parcel_set_address module=repo status=ok number={}",
            number
        );
        Ok(())
    }

    fn set_status(&self, number: ParcelNumber, status: &str) -> RepoResult<()> {
        validate_status(status)?;

        let changed = self.conn.execute(
            "UPDATE parcel
             SET status = ?1
             WHERE number = ?2 AND (?1 <> ?3 OR status = ?3);",
            params![status, number, ParcelStatus::REGISTERED],
        )?;

        if changed == 0 {
            return Err(self.rejection(number));
        }

        debug!(
            "event=parcel_set_status module=repo status=ok number={} parcel_status={}",
            number, status
        );
        Ok(())
    }

    fn transition_status(
        &self,
        number: ParcelNumber,
        expected: &str,
        status: &str,
    ) -> RepoResult<()> {
        validate_status(status)?;

        let changed = self.conn.execute(
            "UPDATE parcel
             SET status = ?1
             WHERE number = ?2 AND status = ?3 AND (?1 <> ?4 OR ?3 = ?4);",
            params![status, number, expected, ParcelStatus::REGISTERED],
        )?;

        if changed == 0 {
            return Err(self.rejection(number));
        }

        debug!(
            "event=parcel_transition module=repo status=ok number={} from={} to={}",
            number, expected, status
        );
        Ok(())
    }

    fn delete(&self, number: ParcelNumber) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM parcel WHERE number = ?1 AND status = ?2;",
            params![number, ParcelStatus::REGISTERED],
        )?;

        if changed == 0 {
            return Err(self.rejection(number));
        }

        debug!("event=parcel_delete module=repo status=ok number={}", number);
        Ok(())
    }
}

fn ensure_parcel_schema(conn: &Connection) -> RepoResult<()> {
    let table_exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [PARCEL_TABLE],
        |row| row.get(0),
    )?;
    if !table_exists {
        return Err(RepoError::MissingRequiredTable(PARCEL_TABLE));
    }

    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let present = stmt
        .query_map([PARCEL_TABLE], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;

    match PARCEL_COLUMNS
        .iter()
        .copied()
        .find(|column| !present.contains(*column))
    {
        Some(column) => Err(RepoError::MissingRequiredColumn {
            table: PARCEL_TABLE,
            column,
        }),
        None => Ok(()),
    }
}

fn parse_parcel_row(row: &Row<'_>) -> RepoResult<Parcel> {
    let parcel = Parcel {
        number: row.get("number")?,
        client: row.get("client")?,
        status: row.get("status")?,
        address: row.get("address")?,
        created_at: row.get("created_at")?,
    };

    parcel.validate().map_err(|err| {
        RepoError::InvalidData(format!("parcel {} failed validation: {err}", parcel.number))
    })?;
    Ok(parcel)
}
