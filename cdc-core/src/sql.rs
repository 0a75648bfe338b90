//! Definition validation and SQL compilation
//!
//! A [`PipelineDefinition`] compiles into an ordered list of statements that the
//! cluster executes one at a time: session `SET`s, the source table, the sink
//! table and finally the `INSERT` that starts the streaming job. Later
//! statements reference tables created by earlier ones, so order matters.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::pipeline::{ColumnSpec, PipelineDefinition, TableSpec};

const MAX_NAME_LEN: usize = 255;
const MAX_ID_LEN: usize = 128;

/// Errors produced while validating a definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// One or more fields are missing or malformed
    #[error("invalid pipeline definition: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// The definition could not be decoded at all
    #[error("malformed pipeline definition: {0}")]
    Malformed(String),
}

impl PipelineDefinition {
    /// Decodes a definition from an untyped JSON document
    pub fn from_json(value: serde_json::Value) -> Result<Self, DefinitionError> {
        serde_json::from_value(value).map_err(|e| DefinitionError::Malformed(e.to_string()))
    }
}

/// Validates `definition` and compiles it into ordered SQL statements
pub fn compile(definition: &PipelineDefinition) -> Result<Vec<String>, DefinitionError> {
    validate(definition)?;

    let mut statements: Vec<String> = definition
        .settings
        .iter()
        .map(|(key, value)| format!("SET {} = {}", literal(key), literal(value)))
        .collect();

    if definition.is_raw() {
        statements.extend(definition.statements.iter().map(|s| s.trim().to_string()));
        return Ok(statements);
    }

    // validate() guarantees both tables are present for non-raw definitions
    let (Some(source), Some(sink)) = (&definition.source, &definition.sink) else {
        return Err(DefinitionError::Invalid(vec![
            "source and sink are required".to_string(),
        ]));
    };

    statements.push(create_table(source, &source.columns));

    let sink_columns = if sink.columns.is_empty() {
        &source.columns
    } else {
        &sink.columns
    };
    statements.push(create_table(sink, sink_columns));

    let query = match &definition.transform {
        Some(transform) => transform.query.trim().to_string(),
        None => format!("SELECT * FROM {}", ident(&source.table)),
    };
    statements.push(format!("INSERT INTO {} {}", ident(&sink.table), query));

    Ok(statements)
}

/// Checks every field and reports all problems at once
pub fn validate(definition: &PipelineDefinition) -> Result<(), DefinitionError> {
    let mut errors = Vec::new();

    if definition.name.trim().is_empty() {
        errors.push("name is required".to_string());
    } else if definition.name.chars().count() > MAX_NAME_LEN {
        errors.push(format!("name is too long (max {MAX_NAME_LEN} characters)"));
    }

    if let Some(id) = &definition.id {
        if !is_valid_id(id) {
            errors.push(format!(
                "id '{id}' must start with a letter or digit and contain only letters, digits, '_', '-' or '.' (max {MAX_ID_LEN} characters)"
            ));
        }
    }

    for key in definition.settings.keys() {
        if key.trim().is_empty() {
            errors.push("settings keys must not be empty".to_string());
        }
    }

    if definition.is_raw() {
        if definition.source.is_some() || definition.sink.is_some() || definition.transform.is_some() {
            errors.push("raw statements cannot be combined with source, sink or transform".to_string());
        }
        for (idx, statement) in definition.statements.iter().enumerate() {
            if statement.trim().is_empty() {
                errors.push(format!("statement {} is empty", idx + 1));
            }
        }
    } else {
        match &definition.source {
            Some(source) => {
                validate_table("source", source, &mut errors);
                if source.columns.is_empty() {
                    errors.push("source must declare at least one column".to_string());
                }
            }
            None => errors.push("source is required".to_string()),
        }

        match &definition.sink {
            Some(sink) => validate_table("sink", sink, &mut errors),
            None => errors.push("sink is required".to_string()),
        }

        if let (Some(source), Some(sink)) = (&definition.source, &definition.sink) {
            if sink.columns.is_empty() {
                // Sink inherits source columns, so its key must refer to them
                check_primary_key("sink", &sink.primary_key, &source.columns, &mut errors);
            }
        }

        if let Some(transform) = &definition.transform {
            if transform.query.trim().is_empty() {
                errors.push("transform query must not be empty".to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DefinitionError::Invalid(errors))
    }
}

/// Whether `id` is usable as a pipeline id (it also names the record file)
pub fn is_valid_id(id: &str) -> bool {
    let mut chars = id.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    id.len() <= MAX_ID_LEN
        && first.is_ascii_alphanumeric()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn validate_table(role: &str, table: &TableSpec, errors: &mut Vec<String>) {
    if !is_identifier(&table.table) {
        errors.push(format!("{role} table name '{}' is not a valid identifier", table.table));
    }
    if table.connector.trim().is_empty() {
        errors.push(format!("{role} connector is required"));
    }
    for column in &table.columns {
        if !is_identifier(&column.name) {
            errors.push(format!("{role} column name '{}' is not a valid identifier", column.name));
        }
        if column.data_type.trim().is_empty() {
            errors.push(format!("{role} column '{}' has no type", column.name));
        }
    }
    if !table.columns.is_empty() {
        check_primary_key(role, &table.primary_key, &table.columns, errors);
    }
    for key in table.options.keys() {
        if key.trim().is_empty() {
            errors.push(format!("{role} option keys must not be empty"));
        }
    }
}

fn check_primary_key(role: &str, key: &[String], columns: &[ColumnSpec], errors: &mut Vec<String>) {
    for name in key {
        if !columns.iter().any(|c| &c.name == name) {
            errors.push(format!("{role} primary key column '{name}' is not declared"));
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn create_table(table: &TableSpec, columns: &[ColumnSpec]) -> String {
    let mut parts: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", ident(&c.name), c.data_type.trim()))
        .collect();

    if !table.primary_key.is_empty() {
        let key: Vec<String> = table.primary_key.iter().map(|k| ident(k)).collect();
        parts.push(format!("PRIMARY KEY ({}) NOT ENFORCED", key.join(", ")));
    }

    format!(
        "CREATE TABLE {} ({}) WITH ({})",
        ident(&table.table),
        parts.join(", "),
        with_clause(&table.connector, &table.options)
    )
}

fn with_clause(connector: &str, options: &BTreeMap<String, String>) -> String {
    let mut entries = vec![format!("{} = {}", literal("connector"), literal(connector.trim()))];
    entries.extend(
        options
            .iter()
            .filter(|(key, _)| key.as_str() != "connector")
            .map(|(key, value)| format!("{} = {}", literal(key), literal(value))),
    );
    entries.join(", ")
}

fn ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
