//! The persisted consent record and its storage codec.

use ccg_core::{Error, Result};
use ccg_store::KeyValueStore;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::category::ConsentCategories;

/// Storage key holding the record.
pub const CONSENT_KEY: &str = "ccg_cookie_consent";

/// Bump when categories or legal text change; older records are ignored.
pub const CONSENT_VERSION: &str = "1.0";

/// What gets written to storage after every decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConsent {
    pub version: String,
    #[serde(with = "iso_millis")]
    pub date: DateTime<Utc>,
    pub choices: ConsentCategories,
}

impl StoredConsent {
    /// A record for `choices` stamped with the current time and version.
    ///
    /// The timestamp is truncated to what the wire format keeps.
    pub fn now(choices: ConsentCategories) -> Self {
        Self {
            version: CONSENT_VERSION.to_string(),
            date: Utc::now().trunc_subsecs(3),
            choices,
        }
    }

    pub fn is_current(&self) -> bool {
        self.version == CONSENT_VERSION
    }
}

/// Read the record for the current version.
///
/// Returns `Ok(None)` when nothing is stored or the stored version is stale.
pub fn load_record(store: &dyn KeyValueStore) -> Result<Option<StoredConsent>> {
    let raw = match store.get(CONSENT_KEY)? {
        Some(raw) if !raw.is_empty() => raw,
        _ => {
            debug!("No consent record in {} storage", store.backend());
            return Ok(None);
        }
    };

    let record: StoredConsent =
        serde_json::from_str(&raw).map_err(|e| Error::MalformedRecord(e.to_string()))?;

    if !record.is_current() {
        info!(
            "Ignoring consent record with version {} (current {})",
            record.version, CONSENT_VERSION
        );
        return Ok(None);
    }
    Ok(Some(record))
}

/// Write a fresh record for `choices`, replacing any previous one.
pub fn save_record(store: &dyn KeyValueStore, choices: ConsentCategories) -> Result<StoredConsent> {
    let record = StoredConsent::now(choices);
    let json = serde_json::to_string(&record)?;
    store.set(CONSENT_KEY, &json)?;
    Ok(record)
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2026-10-18T09:30:00.000Z`.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|date| date.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccg_store::MemoryStore;

    #[test]
    fn test_wire_format() {
        let store = MemoryStore::new();
        save_record(&store, ConsentCategories::new(true, false)).unwrap();

        let raw = store.get(CONSENT_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(
            json["choices"],
            serde_json::json!({ "necessary": true, "analytics": true, "marketing": false })
        );

        let date = json["date"].as_str().unwrap();
        assert!(date.ends_with('Z'));
        assert_eq!(date.len(), "2026-10-18T09:30:00.000Z".len());
    }

    #[test]
    fn test_load_round_trip() {
        let store = MemoryStore::new();
        let saved = save_record(&store, ConsentCategories::new(false, true)).unwrap();
        let loaded = load_record(&store).unwrap().unwrap();
        assert_eq!(loaded.choices, saved.choices);
        assert_eq!(loaded.version, CONSENT_VERSION);
    }

    #[test]
    fn test_load_accepts_browser_timestamp() {
        let store = MemoryStore::new();
        store
            .set(
                CONSENT_KEY,
                r#"{"version":"1.0","date":"2025-03-01T12:34:56.789Z","choices":{"necessary":true,"analytics":false,"marketing":true}}"#,
            )
            .unwrap();
        let record = load_record(&store).unwrap().unwrap();
        assert_eq!(record.choices, ConsentCategories::new(false, true));
        assert_eq!(record.date.timestamp_subsec_millis(), 789);
    }

    #[test]
    fn test_stale_version_is_absent() {
        let store = MemoryStore::new();
        store
            .set(
                CONSENT_KEY,
                r#"{"version":"0.9","date":"2024-01-01T00:00:00.000Z","choices":{"necessary":true,"analytics":true,"marketing":true}}"#,
            )
            .unwrap();
        assert!(load_record(&store).unwrap().is_none());
    }

    #[test]
    fn test_malformed_records() {
        let cases = [
            "not json",
            r#"{"version":"1.0"}"#,
            r#"{"version":"1.0","date":"yesterday","choices":{"necessary":true,"analytics":false,"marketing":false}}"#,
            r#"{"version":"1.0","date":"2025-03-01T12:34:56.789Z","choices":{"necessary":false,"analytics":false,"marketing":false}}"#,
        ];
        for raw in cases {
            let store = MemoryStore::new();
            store.set(CONSENT_KEY, raw).unwrap();
            assert!(
                matches!(load_record(&store), Err(Error::MalformedRecord(_))),
                "expected malformed: {}",
                raw
            );
        }
    }

    #[test]
    fn test_storage_failure_propagates() {
        let store = MemoryStore::disabled();
        assert!(matches!(load_record(&store), Err(Error::StorageUnavailable(_))));
        assert!(matches!(
            save_record(&store, ConsentCategories::opted_out()),
            Err(Error::StorageUnavailable(_))
        ));
    }
}
