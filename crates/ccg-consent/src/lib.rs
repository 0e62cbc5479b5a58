//! Cookie consent — category decisions, the versioned stored record, and the
//! banner state machine that the page shell renders.
//!
//! Third-party loaders ask [`ConsentManager::is_category_allowed`] before they
//! initialize and subscribe with [`ConsentManager::on_change`] to react when
//! the visitor changes their mind.

pub mod category;
pub mod manager;
pub mod record;

pub use category::{Category, ConsentCategories};
pub use manager::{BannerState, BannerView, CategoryRow, ConsentManager, DoNotTrack};
pub use record::{load_record, save_record, StoredConsent, CONSENT_KEY, CONSENT_VERSION};
