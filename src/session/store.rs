//! Durable storage of the conversation across process restarts.
//!
//! One serialized [`PersistedRecord`] per client.  Writes go to a sibling
//! temp file that is renamed over the snapshot, so a reader sees either the
//! previous record or the new one, never a half-written file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{ConversationSession, Preferences};

/// Format version written into every record.
pub const RECORD_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode session: {0}")]
    Encode(String),

    /// The persisted snapshot exists but cannot be read back.
    #[error("persisted session is corrupt: {0}")]
    Corrupt(String),
}

// ---------------------------------------------------------------------------
// PersistedRecord
// ---------------------------------------------------------------------------

/// What is written to disk: the session plus user preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub version: u32,
    pub session: ConversationSession,
    #[serde(default)]
    pub preferences: Preferences,
}

impl PersistedRecord {
    pub fn new(session: ConversationSession, preferences: Preferences) -> Self {
        Self {
            version: RECORD_VERSION,
            session,
            preferences,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStore trait
// ---------------------------------------------------------------------------

/// Persistence boundary used by the engine.
///
/// `load` fails soft: any problem reading the snapshot yields `None` so the
/// engine starts a fresh session instead of crashing.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<PersistedRecord>;

    /// Replace the stored snapshot entirely.
    fn save(&self, record: &PersistedRecord) -> Result<(), StoreError>;

    /// Remove the stored snapshot.  Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), StoreError>;
}

// Compile-time assertion: Box<dyn SessionStore> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SessionStore>) {}
};

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// Stores the record as pretty-printed JSON at a fixed path.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Like [`SessionStore::load`] but reports why a snapshot was rejected.
    pub fn load_checked(&self) -> Result<Option<PersistedRecord>, StoreError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: PersistedRecord =
            serde_json::from_str(&data).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        if record.version != RECORD_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported record version {}",
                record.version
            )));
        }
        Ok(Some(record))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self) -> Option<PersistedRecord> {
        match self.load_checked() {
            Ok(record) => record,
            Err(e) => {
                log::warn!(
                    "store: ignoring snapshot at {}: {e}",
                    self.path.display()
                );
                None
            }
        }
    }

    fn save(&self, record: &PersistedRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data =
            serde_json::to_string_pretty(record).map_err(|e| StoreError::Encode(e.to_string()))?;

        let tmp = self.temp_path();
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        log::debug!(
            "store: saved {} ({} messages)",
            record.session.id,
            record.session.transcript.len()
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// MemorySessionStore
// ---------------------------------------------------------------------------

/// Keeps the record in memory only.  Nothing survives the process.
#[derive(Default)]
pub struct MemorySessionStore {
    record: Mutex<Option<PersistedRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<PersistedRecord> {
        self.record.lock().unwrap().clone()
    }

    fn save(&self, record: &PersistedRecord) -> Result<(), StoreError> {
        *self.record.lock().unwrap() = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.record.lock().unwrap() = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{OrchestratorState, SanctionLetterDetails};
    use crate::session::{Decision, Language, Message, Sentiment, StatusTag, UiMode};
    use proptest::prelude::*;
    use serde_json::{json, Map, Value};
    use tempfile::tempdir;

    fn sample_record() -> PersistedRecord {
        let mut session = ConversationSession::new();
        session.conversation_id = Some("conv_42".into());
        session.bootstrapped = true;
        session.state = OrchestratorState::from_map(
            json!({
                "stage": "COMPLETED",
                "loan_amount": 500000,
                "explainability": { "decision": "approved", "credit_score": 780 },
                "badges": ["kyc", "credit"]
            })
            .as_object()
            .unwrap()
            .clone(),
        );
        session.mode = UiMode::Terminal(Decision::Approved);
        session.transcript.push(Message::user("I need a loan of 500000"));
        session
            .transcript
            .push(Message::assistant("Approved!").with_status(Some(StatusTag::Approved)));

        PersistedRecord::new(
            session,
            Preferences {
                language: Language::Ta,
                dark_mode: true,
            },
        )
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().expect("temp dir");
        let store = JsonFileStore::new(dir.path().join("session.json"));

        let record = sample_record();
        store.save(&record).expect("save");
        assert_eq!(store.load(), Some(record));
    }

    #[test]
    fn load_then_save_is_idempotent() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("session.json");
        let store = JsonFileStore::new(&path);
        store.save(&sample_record()).expect("save");

        let first = std::fs::read_to_string(&path).unwrap();
        let loaded = store.load().expect("record");
        store.save(&loaded).expect("resave");
        let second = std::fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempdir().expect("temp dir");
        let store = JsonFileStore::new(dir.path().join("nope.json"));
        assert!(store.load().is_none());
        assert!(store.load_checked().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_fails_soft() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.load().is_none());
        assert!(matches!(store.load_checked(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn unknown_version_is_corrupt() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("session.json");
        let mut value = serde_json::to_value(sample_record()).unwrap();
        value["version"] = json!(99);
        std::fs::write(&path, value.to_string()).unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.load().is_none());
    }

    #[test]
    fn save_creates_parent_dirs_and_leaves_no_temp_file() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("deeper").join("session.json");
        let store = JsonFileStore::new(&path);

        store.save(&sample_record()).expect("save");
        assert!(path.exists());
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn clear_removes_snapshot_and_tolerates_missing() {
        let dir = tempdir().expect("temp dir");
        let store = JsonFileStore::new(dir.path().join("session.json"));
        store.save(&sample_record()).expect("save");

        store.clear().expect("clear");
        assert!(store.load().is_none());
        store.clear().expect("second clear is fine");
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemorySessionStore::new();
        assert!(store.load().is_none());

        let record = sample_record();
        store.save(&record).unwrap();
        assert_eq!(store.load(), Some(record));

        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn persisted_floats_keep_every_bit() {
        let awkward = [
            0.1 + 0.2,
            5e-324,
            f64::MAX,
            f64::EPSILON,
            123456.78901234567,
            0.053842844067752756,
        ];
        let mut record = sample_record();
        let mut map = Map::new();
        for (i, x) in awkward.iter().enumerate() {
            map.insert(format!("f{i}"), json!(x));
        }
        record.session.state = OrchestratorState::from_map(map);

        let dir = tempdir().expect("temp dir");
        let store = JsonFileStore::new(dir.path().join("session.json"));
        store.save(&record).expect("save");
        let loaded = store.load_checked().expect("readable").expect("record");

        for (i, x) in awkward.iter().enumerate() {
            let back = loaded.session.state.get(&format!("f{i}")).and_then(Value::as_f64);
            assert_eq!(back.map(f64::to_bits), Some(x.to_bits()), "f{i} = {x:e}");
        }
    }

    // ---- properties ---

    fn number() -> impl Strategy<Value = f64> {
        prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO
    }

    fn value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            number().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            ".{0,12}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                proptest::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    fn state() -> impl Strategy<Value = OrchestratorState> {
        proptest::collection::btree_map("[a-z_]{1,12}", value(), 0..8)
            .prop_map(|m| OrchestratorState::from_map(m.into_iter().collect()))
    }

    fn message() -> impl Strategy<Value = Message> {
        let status = prop::option::of(prop_oneof![
            Just(StatusTag::Approved),
            Just(StatusTag::Rejected),
            Just(StatusTag::PendingDocuments),
            Just(StatusTag::Processing),
        ]);
        let sentiment = prop::option::of(prop_oneof![
            Just(Sentiment::Neutral),
            Just(Sentiment::Hesitation),
            Just(Sentiment::Confusion),
            Just(Sentiment::Negative),
        ]);
        (
            any::<bool>(),
            ".{0,40}",
            status,
            sentiment,
            prop::option::of("[a-z_]{1,12}"),
        )
            .prop_map(|(from_user, content, status, sentiment, agent)| {
                let message = if from_user {
                    Message::user(content)
                } else {
                    Message::assistant(content)
                };
                message
                    .with_status(status)
                    .with_sentiment(sentiment)
                    .with_agent(agent)
            })
    }

    fn mode() -> impl Strategy<Value = UiMode> {
        prop_oneof![
            Just(UiMode::Conversing),
            Just(UiMode::AwaitingUpload),
            Just(UiMode::HandoffRequested),
            Just(UiMode::Terminal(Decision::Approved)),
            Just(UiMode::Terminal(Decision::Rejected)),
            Just(UiMode::Terminal(Decision::PendingReview)),
        ]
    }

    fn letter() -> impl Strategy<Value = SanctionLetterDetails> {
        (number(), any::<u32>(), number(), number()).prop_map(|(amount, months, rate, emi)| {
            SanctionLetterDetails {
                sanction_number: "SL-0001".into(),
                amount,
                tenure_months: months,
                rate_percent: rate,
                emi,
                pdf_url: "/sanctions/SL-0001.pdf".into(),
                valid_until: "2025-01-31".into(),
            }
        })
    }

    fn record() -> impl Strategy<Value = PersistedRecord> {
        (
            state(),
            proptest::collection::vec(message(), 0..6),
            mode(),
            prop::option::of(letter()),
            prop::option::of("conv_[a-z0-9]{1,8}"),
            any::<bool>(),
            prop_oneof![Just(Language::En), Just(Language::Ta)],
            any::<bool>(),
        )
            .prop_map(
                |(state, transcript, mode, letter, conversation_id, bootstrapped, language, dark_mode)| {
                    let mut session = ConversationSession::new();
                    session.state = state;
                    session.transcript.extend(transcript);
                    session.mode = mode;
                    session.sanction_letter = letter;
                    session.conversation_id = conversation_id;
                    session.bootstrapped = bootstrapped;
                    PersistedRecord::new(session, Preferences { language, dark_mode })
                },
            )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn any_record_survives_the_file_round_trip(record in record()) {
            let dir = tempdir().expect("temp dir");
            let store = JsonFileStore::new(dir.path().join("session.json"));
            store.save(&record).expect("save");
            prop_assert_eq!(store.load_checked().expect("readable"), Some(record));
        }
    }
}
