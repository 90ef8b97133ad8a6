//! Read a tabular dataset and write it back with one cluster label per record.
//!
//! The first row is a header and the first column holds the record
//! identifier. Every other column must be a real number.

use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use log::debug;

use crate::error::{Error, Result};

/// Name of the appended label column.
pub const CLUSTER_COLUMN: &str = "Cluster";

/// Records of a delimited file, split into identifiers and features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub ids: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

/// Load a delimited file.
pub fn read_table(path: impl AsRef<Path>) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path.as_ref())?;
    let header = reader.headers()?.iter().map(str::to_string).collect();

    let mut ids = Vec::new();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let mut fields = record.iter();
        ids.push(fields.next().unwrap_or_default().to_string());
        let row = fields
            .enumerate()
            .map(|(column, value)| {
                value.trim().parse::<f64>().map_err(|_| Error::Parse {
                    line,
                    column: column + 1,
                    value: value.to_string(),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }
    debug!("read {} records from {}", rows.len(), path.as_ref().display());
    Ok(Table { header, ids, rows })
}

/// Write the records with a trailing cluster column, features with two decimals.
pub fn write_results(path: impl AsRef<Path>, table: &Table, labels: &[u32]) -> Result<()> {
    if labels.len() != table.rows.len() {
        return Err(Error::InvalidParameter(format!(
            "{} labels for {} records",
            labels.len(),
            table.rows.len()
        )));
    }
    let mut writer = WriterBuilder::new().from_path(path.as_ref())?;
    writer.write_record(
        table
            .header
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(CLUSTER_COLUMN)),
    )?;
    for ((id, row), label) in table.ids.iter().zip(table.rows.iter()).zip(labels.iter()) {
        let mut record = Vec::with_capacity(row.len() + 2);
        record.push(id.clone());
        record.extend(row.iter().map(|v| format!("{:.2}", v)));
        record.push(label.to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    debug!("wrote {} records to {}", labels.len(), path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::{Table, read_table, write_results};
    use crate::error::Error;

    #[test]
    fn test_read_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.csv");
        fs::write(&path, "ID,Frequency,Spent\nc1,3,120.5\nc2, 7 ,-8\n").unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.header, vec!["ID", "Frequency", "Spent"]);
        assert_eq!(table.ids, vec!["c1", "c2"]);
        assert_eq!(table.rows, vec![vec![3.0, 120.5], vec![7.0, -8.0]]);
    }

    #[test]
    fn test_non_numeric_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.csv");
        fs::write(&path, "ID,a,b\nx,1,2\ny,3,four\n").unwrap();

        match read_table(&path) {
            Err(Error::Parse {
                line,
                column,
                value,
            }) => {
                assert_eq!(line, 3);
                assert_eq!(column, 2);
                assert_eq!(value, "four");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_table(dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, Error::Csv(_)), "{:?}", err);
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let table = Table {
            header: vec!["ID".into(), "a".into(), "b".into()],
            ids: vec!["p".into(), "q".into()],
            rows: vec![vec![1.0, 2.346], vec![-0.5, 10.0]],
        };
        write_results(&path, &table, &[1, 0]).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "ID,a,b,Cluster\np,1.00,2.35,1\nq,-0.50,10.00,0\n");

        let err = write_results(&path, &table, &[0]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }
}
