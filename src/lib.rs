// src/lib.rs

pub mod db;

pub use db::config::StoreConfig;
pub use db::diff::{save_edited_companies, EditOutcome};
pub use db::error::{RowError, StoreError, StoreResult};
pub use db::fields::RawRow;
pub use db::identity::Resolution;
pub use db::reconcile::{import_companies, import_consultations, import_contacts, BatchReport};
pub use db::store::{RecordStore, RecordWriter};
pub use db::values::{CellValue, CustomerCategory};

use log::{error, info};

use crate::db::projection::{check_health, HealthStatus};

/// Открывает хранилище и проверяет его состояние.
/// Ошибка открытия фатальна; проблемы целостности только логируются.
pub fn init_store(config: StoreConfig) -> StoreResult<RecordStore> {
    let store = RecordStore::open(config)?;
    match check_health(store.conn())? {
        HealthStatus::Healthy => info!("database is healthy"),
        HealthStatus::MissingTables { tables } => error!("missing tables: {}", tables.join(", ")),
        HealthStatus::ForeignKeyErrors { count } => {
            error!("{} rows reference unknown companies", count)
        }
    }
    Ok(store)
}
