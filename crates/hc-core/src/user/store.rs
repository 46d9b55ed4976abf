//! User state persistence using SQLite

use crate::user::{GeoPoint, Service, Step, UserState};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::debug;

/// SQLite-based user state store, keyed by sender phone number
pub struct UserStore {
    conn: Connection,
}

impl UserStore {
    /// Create a new user store with the given database path
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    /// Create an in-memory user store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    /// Initialize database tables
    fn init_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                sender TEXT PRIMARY KEY,
                step TEXT NOT NULL,
                selected_service TEXT,
                lat REAL,
                lng REAL,
                age INTEGER,
                requested_tests TEXT,
                prescription_ref TEXT,
                last_message_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Save a user state, stamping its update timestamp
    pub fn save(&self, state: &mut UserState) -> Result<()> {
        state.updated_at = Utc::now();

        self.conn.execute(
            "INSERT OR REPLACE INTO users (
                sender, step, selected_service, lat, lng, age,
                requested_tests, prescription_ref, last_message_id,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                state.sender,
                state.step.as_str(),
                state.selected_service.map(|s| s.id()),
                state.location.map(|l| l.lat),
                state.location.map(|l| l.lng),
                state.age,
                state.requested_tests,
                state.prescription_ref,
                state.last_message_id,
                state.created_at.to_rfc3339(),
                state.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Load a user state by sender
    pub fn load(&self, sender: &str) -> Result<Option<UserState>> {
        let mut stmt = self.conn.prepare(
            "SELECT sender, step, selected_service, lat, lng, age,
                    requested_tests, prescription_ref, last_message_id,
                    created_at, updated_at
             FROM users WHERE sender = ?1",
        )?;

        let result = stmt.query_row(params![sender], |row| {
            let step_str: String = row.get(1)?;
            let service_str: Option<String> = row.get(2)?;
            let lat: Option<f64> = row.get(3)?;
            let lng: Option<f64> = row.get(4)?;

            let location = match (lat, lng) {
                (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
                _ => None,
            };

            let created_at_str: String = row.get(9)?;
            let updated_at_str: String = row.get(10)?;

            let created_at = DateTime::parse_from_rfc3339(&created_at_str)
                .map_err(|_| rusqlite::Error::InvalidQuery)?
                .with_timezone(&Utc);

            let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
                .map_err(|_| rusqlite::Error::InvalidQuery)?
                .with_timezone(&Utc);

            Ok(UserState {
                sender: row.get(0)?,
                step: Step::parse(&step_str),
                selected_service: service_str.as_deref().and_then(Service::parse),
                location,
                age: row.get(5)?,
                requested_tests: row.get(6)?,
                prescription_ref: row.get(7)?,
                last_message_id: row.get(8)?,
                created_at,
                updated_at,
            })
        });

        match result {
            Ok(state) => Ok(Some(state)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::from(e)),
        }
    }

    /// Load the state for a sender, creating a fresh one at the start
    /// step when none exists yet
    pub fn load_or_create(&self, sender: &str) -> Result<UserState> {
        if let Some(state) = self.load(sender)? {
            return Ok(state);
        }

        debug!("Creating new user state for sender {}", sender);
        let mut state = UserState::new(sender);
        self.save(&mut state)?;
        Ok(state)
    }

    /// Count stored users
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_creation() {
        let store = UserStore::in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("users.db");
        let db_path = db_path.to_str().unwrap();

        {
            let store = UserStore::new(db_path).unwrap();
            let mut state = UserState::new("15551234567");
            state.age = Some(34);
            store.save(&mut state).unwrap();
        }

        // Reopen and read back
        let store = UserStore::new(db_path).unwrap();
        let loaded = store.load("15551234567").unwrap().unwrap();
        assert_eq!(loaded.age, Some(34));
    }

    #[test]
    fn test_save_and_load() {
        let store = UserStore::in_memory().unwrap();
        let mut state = UserState::new("15551234567");
        state.step = Step::AwaitingAge;
        state.selected_service = Some(Service::LabTest);
        state.location = Some(GeoPoint {
            lat: 24.7136,
            lng: 46.6753,
        });

        store.save(&mut state).unwrap();
        let loaded = store.load("15551234567").unwrap();

        assert!(loaded.is_some());
        let loaded = loaded.unwrap();
        assert_eq!(loaded.sender, "15551234567");
        assert_eq!(loaded.step, Step::AwaitingAge);
        assert_eq!(loaded.selected_service, Some(Service::LabTest));
        assert_eq!(loaded.location.unwrap().lat, 24.7136);
        assert!(loaded.age.is_none());
    }

    #[test]
    fn test_load_missing_returns_none() {
        let store = UserStore::in_memory().unwrap();
        assert!(store.load("15550000000").unwrap().is_none());
    }

    #[test]
    fn test_load_or_create() {
        let store = UserStore::in_memory().unwrap();

        let state = store.load_or_create("15551234567").unwrap();
        assert_eq!(state.step, Step::Start);
        assert_eq!(store.count().unwrap(), 1);

        // Second call returns the stored row, not a new one
        let mut state = store.load_or_create("15551234567").unwrap();
        state.step = Step::AwaitingService;
        store.save(&mut state).unwrap();

        let again = store.load_or_create("15551234567").unwrap();
        assert_eq!(again.step, Step::AwaitingService);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_save_stamps_updated_at() {
        let store = UserStore::in_memory().unwrap();
        let mut state = UserState::new("15551234567");
        let created = state.created_at;

        store.save(&mut state).unwrap();
        assert!(state.updated_at >= created);

        let loaded = store.load("15551234567").unwrap().unwrap();
        assert_eq!(loaded.created_at.to_rfc3339(), created.to_rfc3339());
    }

    #[test]
    fn test_replace_preserves_full_record() {
        let store = UserStore::in_memory().unwrap();
        let mut state = UserState::new("15551234567");
        state.step = Step::AwaitingTestsOrPrescription;
        state.selected_service = Some(Service::LabTest);
        state.age = Some(62);
        state.requested_tests = Some("CBC, lipid panel".to_string());
        state.last_message_id = Some("wamid.abc123".to_string());
        store.save(&mut state).unwrap();

        let loaded = store.load("15551234567").unwrap().unwrap();
        assert_eq!(loaded.age, Some(62));
        assert_eq!(loaded.requested_tests.as_deref(), Some("CBC, lipid panel"));
        assert_eq!(loaded.last_message_id.as_deref(), Some("wamid.abc123"));
    }
}
