use std::sync::Arc;

use crate::config::Config;
use crate::snapshot::Snapshot;
use crate::store::Store;

/// Everything a command can read or change. Cloning is cheap, all clones share the same store.
#[derive(Clone)]
pub struct Context {
    pub store: Store,
    pub snapshot: Snapshot,
    pub config: Arc<Config>,
}

impl Context {
    pub fn new(config: Config) -> Context {
        Context {
            store: Store::new(),
            snapshot: Snapshot::new(&config),
            config: Arc::new(config),
        }
    }
}
