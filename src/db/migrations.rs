use log::info;
use rusqlite::{Connection, Result};

use crate::db::schema::SCHEMA_V1;

pub const LATEST_SCHEMA_VERSION: i32 = 1;

pub fn setup_migrations(conn: &Connection) -> Result<()> {
    // Внешние ключи объявлены в схеме, но не проверяются
    conn.pragma_update(None, "foreign_keys", "OFF")?;

    // Узнаём текущую версию схемы
    let ver: i32 = conn.query_row("PRAGMA user_version;", [], |r| r.get(0))?;

    // Если 0 -> выполняем SCHEMA_V1
    if ver < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        info!("schema upgraded from v{} to v{}", ver, LATEST_SCHEMA_VERSION);
    }

    Ok(())
}
