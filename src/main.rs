use anyhow::Context;
use log::info;

use crm_sqlite::db::projection::table_info;
use crm_sqlite::{init_store, StoreConfig};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = StoreConfig::from_env();
    let path = config.db_path.display().to_string();
    let store = init_store(config).with_context(|| format!("failed to open database {}", path))?;

    let tables = table_info(store.conn()).context("failed to read table info")?;
    for table in &tables {
        info!(
            "{}: {} records, columns [{}]",
            table.name,
            table.record_count,
            table.columns.join(", ")
        );
    }
    println!("{}", serde_json::to_string_pretty(&tables)?);
    Ok(())
}
