use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One variable map per CSV row, keyed by the header
pub type DataRow = HashMap<String, String>;

/// Load data rows from a CSV file
pub fn load_data_rows(path: &Path) -> Result<Vec<DataRow>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open data file: {}", path.display()))?;
    read_data_rows(file)
}

pub fn read_data_rows<R: Read>(reader: R) -> Result<Vec<DataRow>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: DataRow = result.context("Failed to parse CSV record")?;
        rows.push(record);
    }
    Ok(rows)
}

/// Layer a data row on top of base variables; row values win
pub fn merge_row(base: &HashMap<String, String>, row: &DataRow) -> HashMap<String, String> {
    let mut merged = base.clone();
    for (k, v) in row {
        merged.insert(k.clone(), v.clone());
    }
    merged
}
