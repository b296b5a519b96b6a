//! Generic record management for the catalog entities.

use anyhow::{Context, Result};
use comfy_table::{ContentArrangement, Table};
use libradmin_core::error::ClientError;
use libradmin_core::routes::Route;
use libradmin_core::validation;
use libradmin_types::Entity;
use serde_json::Value;

use crate::cli::App;

const CREATED: &str = "Registro creado";
const UPDATED: &str = "Registro actualizado";
const DELETED: &str = "Registro eliminado";

pub async fn list(app: &App, entity: Entity, json: bool) -> Result<()> {
    app.enter(Route::for_entity(entity)).await?;
    let token = app.session.token();
    let records = app
        .api
        .list(token.as_deref(), entity)
        .await
        .map_err(|e| app.report(e))?;

    if json {
        let out = serde_json::to_string_pretty(&records).context("serialize records")?;
        println!("{out}");
    } else if records.is_empty() {
        println!("No {entity} records.");
    } else {
        println!("{}", table(&records));
    }
    Ok(())
}

pub async fn create(app: &App, entity: Entity, data: &str) -> Result<()> {
    app.enter(Route::for_entity(entity)).await?;
    let record = payload(app, entity, data)?;
    let token = app.session.token();
    let reply = app
        .api
        .create(token.as_deref(), entity, &record)
        .await
        .map_err(|e| app.report(e))?;
    println!("{}", reply.text().unwrap_or(CREATED));
    Ok(())
}

pub async fn update(app: &App, entity: Entity, data: &str) -> Result<()> {
    app.enter(Route::for_entity(entity)).await?;
    let record = payload(app, entity, data)?;
    let token = app.session.token();
    let reply = app
        .api
        .update(token.as_deref(), entity, &record)
        .await
        .map_err(|e| app.report(e))?;
    println!("{}", reply.text().unwrap_or(UPDATED));
    Ok(())
}

pub async fn delete(app: &App, entity: Entity, id: i64) -> Result<()> {
    app.enter(Route::for_entity(entity)).await?;
    let token = app.session.token();
    let reply = app
        .api
        .delete(token.as_deref(), entity, id)
        .await
        .map_err(|e| app.report(e))?;
    println!("{}", reply.text().unwrap_or(DELETED));
    Ok(())
}

/// Parses and validates `--data`; invalid records never reach the server.
fn payload(app: &App, entity: Entity, data: &str) -> Result<Value> {
    let record: Value = serde_json::from_str(data).context("parse --data as JSON")?;
    if !record.is_object() {
        anyhow::bail!("--data must be a JSON object");
    }
    validation::ensure_valid(validation::entity_payload(entity, &record))
        .map_err(|e: ClientError| app.report(e))?;
    Ok(record)
}

/// Columns are the union of keys, in first-seen order.
fn table(records: &[Value]) -> Table {
    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        if let Some(fields) = record.as_object() {
            for key in fields.keys() {
                if !columns.contains(&key.as_str()) {
                    columns.push(key);
                }
            }
        }
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(columns.clone());
    for record in records {
        table.add_row(columns.iter().map(|column| cell(record.get(column))));
    }
    table
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| cell(Some(item)))
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::Object(fields)) => fields
            .get("nombre")
            .or_else(|| fields.get("titulo"))
            .map_or_else(|| Value::Object(fields.clone()).to_string(), |v| cell(Some(v))),
        Some(other) => other.to_string(),
    }
}
