use crate::config::Config;
use crate::decl::DeclError;
use crate::profiles::ProfileSet;
use crate::views::ViewRegistry;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub profiles: ProfileSet,
    pub views: ViewRegistry,
}

impl AppState {
    /// Build state from config. Configured profiles that fail validation are
    /// skipped and handed back to the caller.
    pub fn new(config: Config) -> (Self, Vec<(String, DeclError)>) {
        let mut profiles = ProfileSet::builtin();
        let rejected = profiles.extend(config.profiles.clone());
        let views = ViewRegistry::new(config.max_records_per_view);
        (
            Self {
                config,
                profiles,
                views,
            },
            rejected,
        )
    }
}
