use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;

use crate::record::Schema;
use crate::sink::{SinkError, SinkKind};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("regex compiles");
}

/// Table and column names are spliced into SQL, so only plain identifiers
/// are accepted.
pub fn check_identifier(name: &str) -> Result<&str, SinkError> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(SinkError::fatal(
            SinkKind::Relational,
            format!("{name:?} is not a usable sql identifier"),
        ))
    }
}

/// `INSERT INTO sensors (time, ws_ave) VALUES ($1, $2)`
pub fn insert_statement(table_name: &str, schema: &Schema) -> Result<String, SinkError> {
    let table = check_identifier(table_name)?;
    let columns = schema
        .fields()
        .iter()
        .map(|field| check_identifier(field))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    let placeholders = (1..=schema.len()).map(|i| format!("${i}")).join(", ");
    Ok(format!(
        "INSERT INTO {table} ({columns}) VALUES ({placeholders})"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_one_placeholder_per_column() {
        let schema = Schema::new(["time", "ws_ave", "w_dir"]).unwrap();
        assert_eq!(
            insert_statement("sensors", &schema).unwrap(),
            "INSERT INTO sensors (time, ws_ave, w_dir) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn rejects_spliced_sql() {
        let schema = Schema::new(["time"]).unwrap();
        assert!(insert_statement("sensors; drop table x", &schema).is_err());

        let schema = Schema::new(["time", "rain)"]).unwrap();
        let error = insert_statement("sensors", &schema).unwrap_err();
        assert!(!error.is_retryable());
    }
}
