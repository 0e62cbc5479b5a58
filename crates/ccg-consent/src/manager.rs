//! Consent manager — banner state machine, read API, change observers.
//!
//! ```text
//!            open_settings            back
//!   Prompt ───────────────▶ Settings ─────▶ (state it was opened from)
//!     │                        │
//!     │ accept_all / reject    │ reject / save_settings
//!     ▼                        ▼
//!   Hidden ◀───────────────────┘
//!     │ open_settings ("Cookie Settings" control)
//!     └──────────────▶ Settings
//! ```

use std::sync::Arc;

use ccg_core::{Error, Result};
use ccg_store::KeyValueStore;
use chrono::SecondsFormat;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::category::{Category, ConsentCategories};
use crate::record::{load_record, save_record, StoredConsent, CONSENT_VERSION};

/// Callback invoked with the new decision after every persisted choice.
pub type ConsentObserver = Arc<dyn Fn(&ConsentCategories) + Send + Sync>;

/// Which part of the banner UI is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerState {
    /// Nothing shown; a decision for the current version is on file.
    Hidden,
    /// The initial banner: accept all, reject non-essential, open settings.
    Prompt,
    /// The per-category panel.
    Settings,
}

impl BannerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Prompt => "prompt",
            Self::Settings => "settings",
        }
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Hidden)
    }
}

impl std::fmt::Display for BannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user agent's do-not-track preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoNotTrack {
    #[default]
    Unspecified,
    Enabled,
}

impl DoNotTrack {
    /// Interpret a raw signal; browsers report `"1"` or `"yes"` when enabled.
    pub fn from_signal(signal: Option<&str>) -> Self {
        match signal.map(str::trim) {
            Some("1") | Some("yes") => Self::Enabled,
            _ => Self::Unspecified,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// One toggle row of the settings panel.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRow {
    pub category: Category,
    pub label: &'static str,
    pub description: &'static str,
    pub locked: bool,
    pub enabled: bool,
}

/// Everything the page shell needs to render the banner.
#[derive(Debug, Clone, Serialize)]
pub struct BannerView {
    pub state: BannerState,
    /// Whether the banner or settings panel should be rendered at all.
    pub visible: bool,
    pub decision: ConsentCategories,
    /// Rows reflect the unsaved draft while in `Settings`, the decision otherwise.
    pub categories: Vec<CategoryRow>,
    /// When the decision in effect was stored. Absent if it never reached storage.
    #[serde(rename = "consentedAt", skip_serializing_if = "Option::is_none")]
    pub consented_at: Option<String>,
    pub version: &'static str,
}

struct Inner {
    state: BannerState,
    decision: ConsentCategories,
    /// Settings-panel edits; `Some` only while in `Settings`.
    draft: Option<ConsentCategories>,
    /// Where `back` leads from `Settings`.
    return_to: BannerState,
    record: Option<StoredConsent>,
}

/// Owns the consent decision for one client profile.
pub struct ConsentManager {
    store: Arc<dyn KeyValueStore>,
    inner: Mutex<Inner>,
    observers: RwLock<Vec<ConsentObserver>>,
    do_not_track: DoNotTrack,
}

impl ConsentManager {
    /// Evaluate stored consent and pick the initial banner state.
    ///
    /// Storage failures and malformed records are logged and treated as
    /// "no consent on file".
    pub fn load(store: Arc<dyn KeyValueStore>, do_not_track: DoNotTrack) -> Self {
        let record = match load_record(store.as_ref()) {
            Ok(record) => record,
            Err(e) => {
                warn!("Treating consent as absent: {}", e);
                None
            }
        };

        let inner = match record {
            Some(record) => {
                info!(
                    "Loaded consent from {} (analytics={}, marketing={})",
                    record.date,
                    record.choices.analytics(),
                    record.choices.marketing()
                );
                Inner {
                    state: BannerState::Hidden,
                    decision: record.choices,
                    draft: None,
                    return_to: BannerState::Hidden,
                    record: Some(record),
                }
            }
            None => Inner {
                state: BannerState::Prompt,
                decision: Self::provisional_seed(do_not_track),
                draft: None,
                return_to: BannerState::Prompt,
                record: None,
            },
        };

        Self {
            store,
            inner: Mutex::new(inner),
            observers: RwLock::new(Vec::new()),
            do_not_track,
        }
    }

    /// Decision in effect before the visitor has chosen anything.
    fn provisional_seed(do_not_track: DoNotTrack) -> ConsentCategories {
        if do_not_track.is_enabled() {
            debug!("Do-not-track is enabled; non-essential categories stay off");
        }
        ConsentCategories::opted_out()
    }

    // ---------------------------------------------------------------
    // Read API
    // ---------------------------------------------------------------

    /// The decision currently in effect. Opted out until the visitor chooses.
    pub fn current_decision(&self) -> ConsentCategories {
        self.inner.lock().decision
    }

    pub fn is_category_allowed(&self, category: Category) -> bool {
        self.current_decision().allows(category)
    }

    /// Register an observer called synchronously after every persisted choice.
    pub fn on_change<F>(&self, observer: F)
    where
        F: Fn(&ConsentCategories) + Send + Sync + 'static,
    {
        self.observers.write().push(Arc::new(observer));
    }

    pub fn state(&self) -> BannerState {
        self.inner.lock().state
    }

    /// Unsaved settings-panel toggles, while the panel is open.
    pub fn draft(&self) -> Option<ConsentCategories> {
        self.inner.lock().draft
    }

    /// The stored record behind the decision in effect.
    ///
    /// `None` when nothing is on file or the latest choice could not be written.
    pub fn stored_record(&self) -> Option<StoredConsent> {
        self.inner.lock().record.clone()
    }

    pub fn do_not_track(&self) -> DoNotTrack {
        self.do_not_track
    }

    pub fn storage_backend(&self) -> &'static str {
        self.store.backend()
    }

    pub fn view(&self) -> BannerView {
        let inner = self.inner.lock();
        let shown = inner.draft.unwrap_or(inner.decision);
        let categories = Category::all()
            .iter()
            .map(|&category| CategoryRow {
                category,
                label: category.label(),
                description: category.description(),
                locked: category.is_locked(),
                enabled: shown.allows(category),
            })
            .collect();

        BannerView {
            state: inner.state,
            visible: inner.state.is_visible(),
            decision: inner.decision,
            categories,
            consented_at: inner
                .record
                .as_ref()
                .map(|r| r.date.to_rfc3339_opts(SecondsFormat::Millis, true)),
            version: CONSENT_VERSION,
        }
    }

    // ---------------------------------------------------------------
    // Banner actions
    // ---------------------------------------------------------------

    /// Grant every category. Valid from any state, so a repeated click is harmless.
    pub fn accept_all(&self) -> BannerState {
        self.persist("accept all", ConsentCategories::all_granted())
    }

    /// Keep only strictly necessary cookies. Valid from any state.
    pub fn reject_non_essential(&self) -> BannerState {
        self.persist("reject non-essential", ConsentCategories::opted_out())
    }

    /// Open the settings panel from the banner or from the "Cookie Settings" control.
    pub fn open_settings(&self) -> BannerState {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.state != BannerState::Settings {
            inner.return_to = inner.state;
            inner.draft = Some(inner.decision);
            inner.state = BannerState::Settings;
            debug!("Settings opened from {}", inner.return_to);
        }
        inner.state
    }

    /// Close the settings panel without saving.
    pub fn back(&self) -> Result<BannerState> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        Self::require_settings(inner, "go back")?;
        inner.draft = None;
        inner.state = inner.return_to;
        debug!("Settings closed, unsaved edits discarded");
        Ok(inner.state)
    }

    /// Flip a category in the settings draft. Nothing is stored until saved.
    pub fn toggle(&self, category: Category, enabled: bool) -> Result<ConsentCategories> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        Self::require_settings(inner, "toggle a category")?;
        let draft = inner.draft.unwrap_or(inner.decision).with(category, enabled)?;
        inner.draft = Some(draft);
        debug!("Draft {}={}", category, enabled);
        Ok(draft)
    }

    /// Persist the settings draft.
    pub fn save_settings(&self) -> Result<BannerState> {
        let choices = {
            let inner = self.inner.lock();
            Self::require_settings(&inner, "save settings")?;
            inner.draft.unwrap_or(inner.decision)
        };
        Ok(self.persist("save settings", choices))
    }

    fn require_settings(inner: &Inner, action: &'static str) -> Result<()> {
        if inner.state == BannerState::Settings {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                action,
                state: inner.state.as_str(),
            })
        }
    }

    /// Store `choices`, apply them in memory, hide the banner, notify observers.
    ///
    /// A failed write is logged and otherwise ignored; the choice still holds
    /// for this session and the next load will prompt again.
    fn persist(&self, action: &'static str, choices: ConsentCategories) -> BannerState {
        {
            let mut inner = self.inner.lock();
            match save_record(self.store.as_ref(), choices) {
                Ok(record) => {
                    info!(
                        "Consent saved via {}: analytics={}, marketing={}",
                        action,
                        choices.analytics(),
                        choices.marketing()
                    );
                    inner.record = Some(record);
                }
                Err(e) => {
                    warn!("Could not persist consent ({}): {}", action, e);
                    inner.record = None;
                }
            }
            inner.decision = choices;
            inner.draft = None;
            inner.state = BannerState::Hidden;
            inner.return_to = BannerState::Hidden;
        }
        self.notify(&choices);
        BannerState::Hidden
    }

    fn notify(&self, choices: &ConsentCategories) {
        // Observers run without any lock held so they may call back into the manager.
        let observers: Vec<ConsentObserver> = self.observers.read().clone();
        for observer in observers {
            observer(choices);
        }
    }
}
