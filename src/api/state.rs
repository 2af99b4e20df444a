use std::sync::Arc;

use chrono_tz::Tz;

use crate::chain::ChainService;

#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<ChainService>,
    /// Zone used for the "today or later" expiration cutoff when the
    /// request does not name one.
    pub default_tz: Tz,
}

impl AppState {
    pub fn new(chain: ChainService, default_tz: Tz) -> Self {
        Self {
            chain: Arc::new(chain),
            default_tz,
        }
    }
}
