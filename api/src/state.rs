use sqlx::PgPool;

use crate::llm::GenerationClient;
use crate::store::AgendaStore;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub generator: GenerationClient,
}

impl AppState {
    /// Scoped persistence handle for one operation.
    pub fn store(&self) -> AgendaStore {
        AgendaStore::new(self.db.clone())
    }
}
