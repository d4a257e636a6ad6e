// Concrete collaborators: e-Stat and Ollama HTTP clients, SQLite caches, local storage.

pub mod estat;
pub mod ollama;
pub mod sqlite;
pub mod storage;

pub use estat::{EstatClient, StatsListQuery};
pub use ollama::OllamaAdvisor;
pub use sqlite::{MetadataCache, TableIndex};
pub use storage::LocalStorage;
