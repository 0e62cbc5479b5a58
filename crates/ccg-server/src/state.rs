//! Shared application state.

use std::sync::Arc;

use ccg_consent::{Category, ConsentManager, DoNotTrack};
use ccg_core::ConsentConfig;
use ccg_store::KeyValueStore;
use tracing::info;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: ConsentConfig,
    pub consent: ConsentManager,
}

impl AppState {
    pub fn new(config: ConsentConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let do_not_track = DoNotTrack::from_signal(config.do_not_track.as_deref());
        let consent = ConsentManager::load(store, do_not_track);

        // Stand-in for the page's tracking loaders: report what may now run.
        consent.on_change(|choices| {
            for category in [Category::Analytics, Category::Marketing] {
                info!(
                    "{} scripts {}",
                    category.label(),
                    if choices.allows(category) { "enabled" } else { "disabled" }
                );
            }
        });

        info!(
            "Consent banner starts {} (do-not-track: {:?})",
            consent.state(),
            do_not_track
        );

        Self { config, consent }
    }
}
