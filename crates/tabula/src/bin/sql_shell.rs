//! Interactive SQL shell over a file-backed table.
//!
//! Usage: `sql_shell [DIR] [STORE]` (defaults: `./tabula-data`, `DefaultStore`).
//! Lines are run as SQL-subset statements; dot commands cover the rest.

use rustyline::{DefaultEditor, error::ReadlineError};
use std::{env, sync::Arc};
use tabula::{
    Error,
    db::{
        Environment, Table,
        config::{BackendKind, StoreConfig},
        sql::SqlOutcome,
        store::FileTextStore,
    },
    record::Record,
};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
.help                 show this message
.insert {json}        insert one record
.export               print every record as JSON
.import {json array}  replace the table's contents
.quit                 exit
anything else         SELECT / UPDATE / DELETE statement";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let dir = args.next().unwrap_or_else(|| "tabula-data".to_string());
    let store = args.next().unwrap_or_else(|| "DefaultStore".to_string());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let env = Environment::new(Arc::new(FileTextStore::new(&dir)));
    let config = StoreConfig::new(store).backend(BackendKind::Flat);
    let mut table = runtime
        .block_on(env.open(&config, None))
        .map_err(Error::from)?;

    println!("tabula {} | {} in {dir} | .help for commands", tabula::VERSION, table.name());

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline("tabula> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        editor.add_history_entry(line)?;

        if line == ".quit" {
            break;
        }

        match runtime.block_on(run(&mut table, line)) {
            Ok(output) => println!("{output}"),
            Err(err) => eprintln!("error ({:?}/{}): {err}", err.kind, err.origin),
        }
    }

    Ok(())
}

async fn run(table: &mut Table, line: &str) -> Result<String, Error> {
    if line == ".help" {
        return Ok(HELP.to_string());
    }
    if line == ".export" {
        return Ok(table.export_json().await?);
    }
    if let Some(json) = line.strip_prefix(".insert ") {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(tabula::core::error::InternalError::from)?;
        let record = Record::try_from(value)?;
        let id = table.insert(record).await?;

        return Ok(format!("inserted id {}", id.to_text_lossy()));
    }
    if let Some(json) = line.strip_prefix(".import ") {
        let count = table.import_json(json).await?;

        return Ok(format!("imported {count} record(s)"));
    }

    match table.sql(line).await? {
        SqlOutcome::Rows(rows) => {
            let count = rows.len();
            let body = serde_json::to_string_pretty(&rows)
                .map_err(tabula::core::error::InternalError::from)?;

            Ok(format!("{body}\n({count} row(s))"))
        }
        SqlOutcome::Applied(n) => Ok(format!("ok, {n} record(s) affected")),
    }
}
