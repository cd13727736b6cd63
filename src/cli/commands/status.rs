//! Status command: list synced-file records.

use comfy_table::{Table, presets::UTF8_FULL};

use crate::config::Settings;
use crate::sync::{ReconciliationStore, SyncedFileRecord};

pub fn run_status(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let store = ReconciliationStore::open(settings.resolve(&settings.sync.synced_files_db))?;
    let records = store.records()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No synced files.");
        return Ok(());
    }

    println!("{}", records_table(&records));
    println!("{} synced files", records.len());
    Ok(())
}

fn records_table(records: &[SyncedFileRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Input file", "Remote name", "URL", "Server"]);
    for record in records {
        table.add_row(vec![
            record.input_file.as_str(),
            record.transported_file_basename.as_str(),
            record.url.as_str(),
            record.server.as_str(),
        ]);
    }
    table
}
