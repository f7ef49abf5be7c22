// src/db.rs

pub mod collection;
pub mod settings_repo;
pub mod state;
pub mod storage;

pub use collection::{Collection, Identified};
pub use settings_repo::SettingsRepository;
pub use state::StoreState;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
