//! Database module for the AERP cargo desk
//!
//! Provides persistence for profiles, shipments, settings, in-flight proof
//! uploads and the processed-event ledger.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Database lock poisoned")]
    Poisoned,
    #[error("User not found: {0}")]
    UserNotFound(UserId),
    #[error("Shipment not found: {0}")]
    ShipmentNotFound(ShipmentId),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

const PROFILE_COLUMNS: &str =
    "telegram_id, username, full_name, company_name, role, is_approved, state, created_at";

const SHIPMENT_COLUMNS: &str = "id, created_by, airline, origin, destination, awb_number, pieces,
     gross_weight, chargeable_weight, chargeable_manual, length_cm, width_cm, height_cm,
     approved_rate_usd, sale_rate_usd, exchange_rate_etb, shipper_info, consignee_info,
     notify_party, files, shipment_status, payment_status, admin_message_id, created_at,
     updated_at";

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // ==================== Profile Operations ====================

    /// Get a profile by transport id
    pub fn get_user(&self, id: UserId) -> DbResult<Option<User>> {
        let conn = self.conn()?;
        fetch_user(&conn, id)
    }

    /// Create a profile on first contact. A concurrent duplicate insert is a no-op.
    pub fn create_user(&self, new: &NewUser) -> DbResult<User> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO profiles (telegram_id, username, role, is_approved, state, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(telegram_id) DO NOTHING",
            params![
                new.id,
                new.username,
                new.role.as_str(),
                new.is_approved,
                new.state.as_ref().map(ToString::to_string),
                now.to_rfc3339(),
            ],
        )?;
        fetch_user(&conn, new.id)?.ok_or(DbError::UserNotFound(new.id))
    }

    /// Apply a partial update to a profile
    pub fn update_user(&self, id: UserId, patch: &UserPatch) -> DbResult<User> {
        let conn = self.conn()?;
        let mut user = fetch_user(&conn, id)?.ok_or(DbError::UserNotFound(id))?;
        patch.apply(&mut user);
        conn.execute(
            "UPDATE profiles SET full_name = ?2, company_name = ?3, role = ?4,
                 is_approved = ?5, state = ?6
             WHERE telegram_id = ?1",
            params![
                id,
                user.full_name,
                user.company_name,
                user.role.as_str(),
                user.is_approved,
                user.state.as_ref().map(ToString::to_string),
            ],
        )?;
        Ok(user)
    }

    /// Remove a profile (staff block action)
    pub fn delete_user(&self, id: UserId) -> DbResult<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM profiles WHERE telegram_id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Profiles that finished registration and still wait for staff approval
    pub fn list_pending_users(&self) -> DbResult<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles
             WHERE is_approved = 0 AND state IS NULL
             ORDER BY created_at ASC"
        ))?;
        let users = stmt
            .query_map([], parse_user_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Ids of every approved profile (broadcast audience)
    pub fn list_approved_ids(&self) -> DbResult<Vec<UserId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT telegram_id FROM profiles WHERE is_approved = 1 ORDER BY telegram_id",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ==================== Shipment Operations ====================

    /// Create an empty draft shipment
    pub fn create_shipment(&self, new: &NewShipment) -> DbResult<Shipment> {
        let conn = self.conn()?;
        let shipment = Shipment::draft(new, Utc::now());
        conn.execute(
            "INSERT INTO shipments (id, created_by, exchange_rate_etb, shipment_status,
                 payment_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                shipment.id.to_string(),
                shipment.owner_id,
                shipment.exchange_rate,
                shipment.status.as_str(),
                shipment.payment_status.as_str(),
                shipment.created_at.to_rfc3339(),
            ],
        )?;
        Ok(shipment)
    }

    /// Get a shipment by id
    pub fn get_shipment(&self, id: ShipmentId) -> DbResult<Option<Shipment>> {
        let conn = self.conn()?;
        fetch_shipment(&conn, id)
    }

    /// Apply a partial update to a shipment
    pub fn update_shipment(&self, id: ShipmentId, patch: &ShipmentPatch) -> DbResult<Shipment> {
        let conn = self.conn()?;
        let mut shipment = fetch_shipment(&conn, id)?.ok_or(DbError::ShipmentNotFound(id))?;
        patch.apply(&mut shipment);
        shipment.updated_at = Utc::now();
        write_shipment(&conn, &shipment)?;
        Ok(shipment)
    }

    /// Set lifecycle status and optionally payment status
    pub fn set_status(
        &self,
        id: ShipmentId,
        status: ShipmentStatus,
        payment: Option<PaymentStatus>,
    ) -> DbResult<Shipment> {
        let patch = ShipmentPatch {
            status: Some(status),
            payment_status: payment,
            ..ShipmentPatch::default()
        };
        self.update_shipment(id, &patch)
    }

    /// Shipments owned by a user, newest first
    pub fn list_shipments_by_owner(&self, owner: UserId) -> DbResult<Vec<Shipment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments
             WHERE created_by = ?1 ORDER BY created_at DESC"
        ))?;
        let shipments = stmt
            .query_map(params![owner], parse_shipment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(shipments)
    }

    /// All shipments, newest first, capped at `limit`
    pub fn list_recent_shipments(&self, limit: usize) -> DbResult<Vec<Shipment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments ORDER BY created_at DESC LIMIT ?1"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let shipments = stmt
            .query_map(params![limit], parse_shipment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(shipments)
    }

    // ==================== Settings ====================

    /// Numeric setting; never-written keys read as 1.0
    pub fn get_setting(&self, key: &str) -> DbResult<f64> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, f64>(0),
            )
            .optional()?;
        Ok(value.unwrap_or(DEFAULT_SETTING_VALUE))
    }

    pub fn set_setting(&self, key: &str, value: f64) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Record counts for the admin panel
    pub fn stats(&self) -> DbResult<Stats> {
        let conn = self.conn()?;
        let users: i64 = conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
        let shipments: i64 =
            conn.query_row("SELECT COUNT(*) FROM shipments", [], |row| row.get(0))?;
        Ok(Stats {
            users: u64::try_from(users).unwrap_or_default(),
            shipments: u64::try_from(shipments).unwrap_or_default(),
        })
    }

    // ==================== Pending Uploads ====================

    /// Start (or restart) proof collection for a shipment
    pub fn reset_pending_proofs(&self, shipment: ShipmentId, owner: UserId) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO pending_uploads (shipment_id, owner_id, proofs, updated_at)
             VALUES (?1, ?2, '[]', ?3)
             ON CONFLICT(shipment_id) DO UPDATE SET
                 owner_id = excluded.owner_id, proofs = '[]', updated_at = excluded.updated_at",
            params![shipment.to_string(), owner, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Append one stored proof and return how many are now collected.
    /// Proofs beyond [`REQUIRED_PROOFS`] are dropped.
    pub fn append_pending_proof(
        &self,
        shipment: ShipmentId,
        owner: UserId,
        proof: &ProofFile,
    ) -> DbResult<usize> {
        let conn = self.conn()?;
        let mut proofs = fetch_pending(&conn, shipment)?.unwrap_or_default();
        if proofs.len() >= REQUIRED_PROOFS {
            return Ok(proofs.len());
        }
        proofs.push(proof.clone());
        conn.execute(
            "INSERT INTO pending_uploads (shipment_id, owner_id, proofs, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(shipment_id) DO UPDATE SET
                 proofs = excluded.proofs, updated_at = excluded.updated_at",
            params![
                shipment.to_string(),
                owner,
                serde_json::to_string(&proofs)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(proofs.len())
    }

    pub fn count_pending_proofs(&self, shipment: ShipmentId) -> DbResult<usize> {
        let conn = self.conn()?;
        Ok(fetch_pending(&conn, shipment)?.map_or(0, |p| p.len()))
    }

    /// Remove the pending record and return the first proofs it held, in
    /// upload order
    pub fn take_pending_proofs(&self, shipment: ShipmentId) -> DbResult<Vec<ProofFile>> {
        let conn = self.conn()?;
        let mut proofs = fetch_pending(&conn, shipment)?.unwrap_or_default();
        proofs.truncate(REQUIRED_PROOFS);
        conn.execute(
            "DELETE FROM pending_uploads WHERE shipment_id = ?1",
            params![shipment.to_string()],
        )?;
        Ok(proofs)
    }

    // ==================== Processed Events ====================

    /// Record an inbound event id. Returns false when it was already seen.
    pub fn claim_event(&self, event_id: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO processed_events (event_id, received_at) VALUES (?1, ?2)",
            params![event_id, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    /// Forget a claim so a redelivery of the same event is processed
    pub fn release_event(&self, event_id: &str) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM processed_events WHERE event_id = ?1",
            params![event_id],
        )?;
        Ok(())
    }

    /// Drop claims older than `cutoff`
    pub fn prune_events(&self, cutoff: DateTime<Utc>) -> DbResult<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM processed_events WHERE received_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(removed)
    }
}

fn fetch_user(conn: &Connection, id: UserId) -> DbResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE telegram_id = ?1"),
            params![id],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

fn fetch_shipment(conn: &Connection, id: ShipmentId) -> DbResult<Option<Shipment>> {
    let shipment = conn
        .query_row(
            &format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = ?1"),
            params![id.to_string()],
            parse_shipment_row,
        )
        .optional()?;
    Ok(shipment)
}

fn fetch_pending(conn: &Connection, shipment: ShipmentId) -> DbResult<Option<Vec<ProofFile>>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT proofs FROM pending_uploads WHERE shipment_id = ?1",
            params![shipment.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|json| serde_json::from_str(&json).map_err(DbError::from))
        .transpose()
}

fn write_shipment(conn: &Connection, s: &Shipment) -> DbResult<()> {
    let (length, width, height) = match s.dimensions {
        Some(d) => (Some(d.length), Some(d.width), Some(d.height)),
        None => (None, None, None),
    };
    conn.execute(
        "UPDATE shipments SET airline = ?2, origin = ?3, destination = ?4, awb_number = ?5,
             pieces = ?6, gross_weight = ?7, chargeable_weight = ?8, chargeable_manual = ?9,
             length_cm = ?10, width_cm = ?11, height_cm = ?12, approved_rate_usd = ?13,
             sale_rate_usd = ?14, exchange_rate_etb = ?15, shipper_info = ?16,
             consignee_info = ?17, notify_party = ?18, files = ?19, shipment_status = ?20,
             payment_status = ?21, admin_message_id = ?22, updated_at = ?23
         WHERE id = ?1",
        params![
            s.id.to_string(),
            s.airline,
            s.origin,
            s.destination,
            s.awb_number,
            s.pieces,
            s.gross_weight,
            s.chargeable_weight,
            s.chargeable_manual,
            length,
            width,
            height,
            s.approved_rate_usd,
            s.sale_rate_usd,
            s.exchange_rate,
            s.shipper_info,
            s.consignee_info,
            s.notify_party,
            serde_json::to_string(&s.files)?,
            s.status.as_str(),
            s.payment_status.as_str(),
            s.admin_message_id,
            s.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Parse a profile row from the database
fn parse_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: UserId = row.get(0)?;
    let state = row
        .get::<_, Option<String>>(6)?
        .and_then(|raw| match raw.parse::<SessionToken>() {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(
                    user_id = id,
                    token = %raw,
                    error = %e,
                    "Discarding unrecognized session token"
                );
                None
            }
        });
    Ok(User {
        id,
        username: row.get(1)?,
        full_name: row.get(2)?,
        company_name: row.get(3)?,
        role: parse_column(row, 4)?,
        is_approved: row.get(5)?,
        state,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

/// Parse a shipment row from the database
fn parse_shipment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Shipment> {
    let dimensions = match (
        row.get::<_, Option<f64>>(10)?,
        row.get::<_, Option<f64>>(11)?,
        row.get::<_, Option<f64>>(12)?,
    ) {
        (Some(length), Some(width), Some(height)) => Some(Dimensions {
            length,
            width,
            height,
        }),
        _ => None,
    };
    let files_json: String = row.get(19)?;
    let files = serde_json::from_str(&files_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(19, Type::Text, Box::new(e)))?;

    Ok(Shipment {
        id: parse_column(row, 0)?,
        owner_id: row.get(1)?,
        airline: row.get(2)?,
        origin: row.get(3)?,
        destination: row.get(4)?,
        awb_number: row.get(5)?,
        pieces: row.get(6)?,
        gross_weight: row.get(7)?,
        chargeable_weight: row.get(8)?,
        chargeable_manual: row.get(9)?,
        dimensions,
        approved_rate_usd: row.get(13)?,
        sale_rate_usd: row.get(14)?,
        exchange_rate: row.get(15)?,
        shipper_info: row.get(16)?,
        consignee_info: row.get(17)?,
        notify_party: row.get(18)?,
        files,
        status: parse_column(row, 20)?,
        payment_status: parse_column(row, 21)?,
        admin_message_id: row.get(22)?,
        created_at: parse_datetime(&row.get::<_, String>(23)?),
        updated_at: parse_datetime(&row.get::<_, String>(24)?),
    })
}

/// Read a TEXT column through `FromStr`, reporting bad values as conversion failures
fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::token::WizardStep;

    fn seed_user(db: &Database, id: UserId) -> User {
        db.create_user(&NewUser {
            id,
            username: Some(format!("user{id}")),
            role: Role::User,
            is_approved: false,
            state: Some(SessionToken::RegName),
        })
        .unwrap()
    }

    fn seed_shipment(db: &Database, owner: UserId) -> Shipment {
        db.create_shipment(&NewShipment {
            id: ShipmentId::new(),
            owner_id: owner,
            exchange_rate: 56.5,
        })
        .unwrap()
    }

    #[test]
    fn test_create_and_get_user() {
        let db = Database::open_in_memory().unwrap();
        let user = seed_user(&db, 42);

        assert_eq!(user.id, 42);
        assert_eq!(user.role, Role::User);
        assert!(!user.is_approved);
        assert_eq!(user.state, Some(SessionToken::RegName));

        let fetched = db.get_user(42).unwrap().unwrap();
        assert_eq!(fetched, user);
        assert!(db.get_user(43).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_create_keeps_first_profile() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, 1);
        db.update_user(
            1,
            &UserPatch {
                full_name: Some("Abebe".to_string()),
                ..UserPatch::default()
            },
        )
        .unwrap();

        let again = seed_user(&db, 1);
        assert_eq!(again.full_name.as_deref(), Some("Abebe"));
    }

    #[test]
    fn test_update_user_token_and_clear() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, 5);

        let user = db
            .update_user(5, &UserPatch::token(Some(SessionToken::RegCompany)))
            .unwrap();
        assert_eq!(user.state, Some(SessionToken::RegCompany));

        let user = db.update_user(5, &UserPatch::token(None)).unwrap();
        assert_eq!(user.state, None);
        assert_eq!(db.get_user(5).unwrap().unwrap().state, None);
    }

    #[test]
    fn test_update_missing_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.update_user(9, &UserPatch::default()).unwrap_err();
        assert!(matches!(err, DbError::UserNotFound(9)));
    }

    #[test]
    fn test_unrecognized_token_loads_as_idle() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, 3);
        {
            let conn = db.conn().unwrap();
            conn.execute(
                "UPDATE profiles SET state = 'SHIP_NOWHERE' WHERE telegram_id = 3",
                [],
            )
            .unwrap();
        }
        assert_eq!(db.get_user(3).unwrap().unwrap().state, None);
    }

    #[test]
    fn test_pending_and_approved_lists() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, 1);
        seed_user(&db, 2);
        seed_user(&db, 3);
        // 1 finished registration, 2 is still typing, 3 is approved
        db.update_user(1, &UserPatch::token(None)).unwrap();
        db.update_user(
            3,
            &UserPatch {
                is_approved: Some(true),
                state: Some(None),
                ..UserPatch::default()
            },
        )
        .unwrap();

        let pending: Vec<_> = db
            .list_pending_users()
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(pending, vec![1]);
        assert_eq!(db.list_approved_ids().unwrap(), vec![3]);

        assert!(db.delete_user(3).unwrap());
        assert!(!db.delete_user(3).unwrap());
        assert!(db.list_approved_ids().unwrap().is_empty());
    }

    #[test]
    fn test_shipment_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let draft = seed_shipment(&db, 7);
        assert_eq!(draft.status, ShipmentStatus::QuotationCreated);
        assert_eq!(draft.payment_status, PaymentStatus::Unpaid);

        let patch = ShipmentPatch {
            airline: Some("ET".to_string()),
            pieces: Some(10),
            dimensions: Some(Dimensions {
                length: 120.0,
                width: 80.0,
                height: 100.0,
            }),
            files: Some(vec![ProofFile {
                url: "http://x/files/a.jpg".to_string(),
                kind: ProofKind::Photo,
            }]),
            ..ShipmentPatch::default()
        };
        db.update_shipment(draft.id, &patch).unwrap();

        let loaded = db.get_shipment(draft.id).unwrap().unwrap();
        assert_eq!(loaded.airline.as_deref(), Some("ET"));
        assert_eq!(loaded.pieces, Some(10));
        assert_eq!(loaded.dimensions, patch.dimensions);
        assert_eq!(loaded.files.len(), 1);
        assert_eq!(loaded.exchange_rate, Some(56.5));
    }

    #[test]
    fn test_set_status_with_payment() {
        let db = Database::open_in_memory().unwrap();
        let s = seed_shipment(&db, 7);

        let updated = db
            .set_status(s.id, ShipmentStatus::Booked, Some(PaymentStatus::Paid))
            .unwrap();
        assert_eq!(updated.status, ShipmentStatus::Booked);
        assert_eq!(updated.payment_status, PaymentStatus::Paid);

        let updated = db.set_status(s.id, ShipmentStatus::Uplifted, None).unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Paid);

        let missing = db.set_status(ShipmentId::new(), ShipmentStatus::Booked, None);
        assert!(matches!(missing, Err(DbError::ShipmentNotFound(_))));
    }

    #[test]
    fn test_list_shipments_by_owner() {
        let db = Database::open_in_memory().unwrap();
        seed_shipment(&db, 1);
        seed_shipment(&db, 1);
        seed_shipment(&db, 2);

        assert_eq!(db.list_shipments_by_owner(1).unwrap().len(), 2);
        assert_eq!(db.list_shipments_by_owner(2).unwrap().len(), 1);
        assert_eq!(db.list_recent_shipments(2).unwrap().len(), 2);
        assert_eq!(db.stats().unwrap().shipments, 3);
    }

    #[test]
    fn test_setting_defaults_to_one() {
        let db = Database::open_in_memory().unwrap();
        assert!((db.get_setting(EXCHANGE_RATE_KEY).unwrap() - 1.0).abs() < f64::EPSILON);

        db.set_setting(EXCHANGE_RATE_KEY, 56.5).unwrap();
        db.set_setting(EXCHANGE_RATE_KEY, 57.25).unwrap();
        assert!((db.get_setting(EXCHANGE_RATE_KEY).unwrap() - 57.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pending_proofs_accumulate_in_order() {
        let db = Database::open_in_memory().unwrap();
        let s = seed_shipment(&db, 7);
        let first = ProofFile {
            url: "u1".to_string(),
            kind: ProofKind::Photo,
        };
        let second = ProofFile {
            url: "u2".to_string(),
            kind: ProofKind::Document,
        };

        db.reset_pending_proofs(s.id, 7).unwrap();
        assert_eq!(db.count_pending_proofs(s.id).unwrap(), 0);
        assert_eq!(db.append_pending_proof(s.id, 7, &first).unwrap(), 1);
        assert_eq!(db.append_pending_proof(s.id, 7, &second).unwrap(), 2);

        let taken = db.take_pending_proofs(s.id).unwrap();
        assert_eq!(taken, vec![first, second]);
        assert_eq!(db.count_pending_proofs(s.id).unwrap(), 0);
    }

    #[test]
    fn test_pending_proofs_are_capped() {
        let db = Database::open_in_memory().unwrap();
        let s = seed_shipment(&db, 7);
        let proofs: Vec<ProofFile> = ["u1", "u2", "u3"]
            .iter()
            .map(|url| ProofFile {
                url: (*url).to_string(),
                kind: ProofKind::Photo,
            })
            .collect();

        db.reset_pending_proofs(s.id, 7).unwrap();
        for proof in &proofs {
            db.append_pending_proof(s.id, 7, proof).unwrap();
        }
        assert_eq!(db.count_pending_proofs(s.id).unwrap(), REQUIRED_PROOFS);
        assert_eq!(db.take_pending_proofs(s.id).unwrap(), proofs[..2].to_vec());
    }

    #[test]
    fn test_reset_discards_partial_upload() {
        let db = Database::open_in_memory().unwrap();
        let s = seed_shipment(&db, 7);
        let proof = ProofFile {
            url: "u1".to_string(),
            kind: ProofKind::Photo,
        };
        db.append_pending_proof(s.id, 7, &proof).unwrap();
        db.reset_pending_proofs(s.id, 7).unwrap();
        assert_eq!(db.count_pending_proofs(s.id).unwrap(), 0);
    }

    #[test]
    fn test_event_claims() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.claim_event("upd-1").unwrap());
        assert!(!db.claim_event("upd-1").unwrap());

        db.release_event("upd-1").unwrap();
        assert!(db.claim_event("upd-1").unwrap());

        let removed = db
            .prune_events(Utc::now() + chrono::Duration::hours(1))
            .unwrap();
        assert_eq!(removed, 1);
        assert!(db.claim_event("upd-1").unwrap());
    }

    #[test]
    fn test_wizard_token_persists() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, 8);
        let s = seed_shipment(&db, 8);
        let token = SessionToken::Ship {
            step: WizardStep::Dimensions,
            shipment: s.id,
        };
        db.update_user(8, &UserPatch::token(Some(token.clone())))
            .unwrap();
        assert_eq!(db.get_user(8).unwrap().unwrap().state, Some(token));
    }
}
