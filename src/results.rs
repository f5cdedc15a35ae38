//! Parsing of the engine's tabular results.
use crate::error::{VarroaPopError, VarroaPopResult};
use crate::schema::ResultSchema;
use derive_more::Display;
use indexmap::IndexMap;
use log::debug;
use serde::{Serialize, Serializer};
use std::fs;
use std::path::Path;

/// A single value in a result table
#[derive(Debug, Clone, PartialEq, Display)]
pub enum Cell {
    /// A value which parsed as a number
    #[display("{_0}")]
    Number(f64),
    /// Anything else, including the date label
    #[display("{_0}")]
    Text(String),
}

impl Cell {
    /// Interpret a raw token, keeping it as text if it isn't numeric
    fn parse(token: &str) -> Self {
        token
            .parse()
            .map_or_else(|_| Self::Text(token.to_string()), Self::Number)
    }

    /// The numeric value of the cell, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(value) => serializer.serialize_f64(*value),
            Self::Text(value) => serializer.serialize_str(value),
        }
    }
}

/// One simulated day
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// The date label, exactly as the engine wrote it
    pub date: String,
    /// The remaining cells, in schema order (excluding the date)
    pub values: Vec<Cell>,
}

/// The results of a simulation: one row per simulated day
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Parse raw result lines against a schema.
    ///
    /// The first `schema.skip_rows` lines are skipped, as are blank lines. Every other line must
    /// have exactly one whitespace-separated token per column.
    pub fn parse<I, S>(lines: I, schema: &ResultSchema) -> VarroaPopResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let width = schema.width();
        let mut rows = Vec::new();
        for (num, line) in lines.into_iter().enumerate().skip(schema.skip_rows) {
            let line = line.as_ref();
            if line.trim().is_empty() {
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != width {
                return Err(VarroaPopError::SchemaMismatch {
                    line: num + 1,
                    expected: width,
                    found: tokens.len(),
                });
            }

            rows.push(ResultRow {
                date: tokens[0].to_string(),
                values: tokens[1..].iter().map(|token| Cell::parse(token)).collect(),
            });
        }

        debug!("Parsed {} result rows", rows.len());
        Ok(Self {
            columns: schema.columns.clone(),
            rows,
        })
    }

    /// Parse a block of raw result text
    pub fn parse_str(text: &str, schema: &ResultSchema) -> VarroaPopResult<Self> {
        Self::parse(text.lines(), schema)
    }

    /// Read and parse a results file
    pub fn from_path(path: &Path, schema: &ResultSchema) -> VarroaPopResult<Self> {
        if !path.is_file() {
            return Err(VarroaPopError::NotFound {
                what: "Results file",
                path: path.to_path_buf(),
            });
        }

        let text = fs::read_to_string(path).map_err(|err| VarroaPopError::io(path, err))?;
        Self::parse_str(&text, schema)
    }

    /// The column names, starting with the date column
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The rows, in the order the engine wrote them
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// The number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over the cells of a non-date column
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell>> {
        let idx = self.columns.iter().position(|column| column == name)?;
        let idx = idx.checked_sub(1)?;
        Some(self.rows.iter().map(move |row| &row.values[idx]))
    }

    /// The values of a column, which must be numeric in every row
    pub fn numeric_column(&self, name: &str) -> VarroaPopResult<Vec<f64>> {
        let column = self.column(name).ok_or_else(|| {
            VarroaPopError::invalid_argument(format!("no numeric column named '{name}'"))
        })?;

        column
            .map(|cell| {
                cell.as_f64().ok_or_else(|| {
                    VarroaPopError::invalid_argument(format!(
                        "column '{name}' has non-numeric value '{cell}'"
                    ))
                })
            })
            .collect()
    }

    /// The date labels of every row
    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.date.as_str())
    }

    /// Convert to a column-oriented map (`{column: [values...]}`)
    pub fn to_columns(&self) -> IndexMap<&str, Vec<Cell>> {
        let mut map: IndexMap<&str, Vec<Cell>> = IndexMap::new();
        let Some(date_column) = self.columns.first() else {
            return map;
        };
        map.insert(
            date_column,
            self.rows
                .iter()
                .map(|row| Cell::Text(row.date.clone()))
                .collect(),
        );
        for (idx, name) in self.columns.iter().enumerate().skip(1) {
            map.insert(
                name,
                self.rows
                    .iter()
                    .map(|row| row.values[idx - 1].clone())
                    .collect(),
            );
        }

        map
    }

    /// Serialise the table as a column-oriented JSON string
    pub fn to_json(&self) -> VarroaPopResult<String> {
        serde_json::to_string(&self.to_columns())
            .map_err(|err| VarroaPopError::invalid_argument(err.to_string()))
    }

    /// Write the table to a CSV file with a header row
    pub fn write_csv(&self, path: &Path) -> VarroaPopResult<()> {
        let csv_err = |err: csv::Error| VarroaPopError::io(path, err.into());
        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        writer.write_record(&self.columns).map_err(csv_err)?;
        for row in &self.rows {
            writer
                .write_record(
                    std::iter::once(row.date.clone())
                        .chain(row.values.iter().map(ToString::to_string)),
                )
                .map_err(csv_err)?;
        }
        writer.flush().map_err(|err| VarroaPopError::io(path, err))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaVersion;
    use float_cmp::assert_approx_eq;
    use itertools::Itertools;
    use rstest::{fixture, rstest};
    use tempfile::tempdir;

    #[fixture]
    fn schema() -> ResultSchema {
        ResultSchema::new(2, ["Date", "Colony Size", "Free Mites"])
    }

    #[fixture]
    fn raw() -> String {
        [
            "VarroaPop results",
            "Date ColonySize FreeMites",
            "06/15/2014 18000 5.5",
            "06/16/2014 18250 6",
            "",
            "06/17/2014 18500 nan?",
        ]
        .join("\n")
    }

    #[rstest]
    fn test_parse(schema: ResultSchema, raw: String) {
        let table = ResultTable::parse_str(&raw, &schema).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.columns(), schema.columns.as_slice());
        assert_equal_dates(&table, &["06/15/2014", "06/16/2014", "06/17/2014"]);
        assert_eq!(
            table.rows()[0].values,
            [Cell::Number(18000.0), Cell::Number(5.5)]
        );
        assert_eq!(table.rows()[2].values[1], Cell::Text("nan?".into()));
    }

    fn assert_equal_dates(table: &ResultTable, expected: &[&str]) {
        assert_eq!(table.dates().collect_vec(), expected);
    }

    #[rstest]
    fn test_parse_width_mismatch(schema: ResultSchema) {
        let raw = "banner\nheader\n06/15/2014 18000 5.5\n06/16/2014 18250\n";
        assert!(matches!(
            ResultTable::parse_str(raw, &schema),
            Err(VarroaPopError::SchemaMismatch {
                line: 4,
                expected: 3,
                found: 2
            })
        ));

        let raw = "banner\nheader\n06/15/2014 18000 5.5 1.0\n";
        assert!(matches!(
            ResultTable::parse_str(raw, &schema),
            Err(VarroaPopError::SchemaMismatch { found: 4, .. })
        ));
    }

    #[rstest]
    fn test_parse_only_banner(schema: ResultSchema) {
        let table = ResultTable::parse(["banner", "header"], &schema).unwrap();
        assert!(table.is_empty());
    }

    #[rstest]
    fn test_numeric_column(schema: ResultSchema, raw: String) {
        let table = ResultTable::parse_str(&raw, &schema).unwrap();
        let sizes = table.numeric_column("Colony Size").unwrap();
        assert_eq!(sizes.len(), 3);
        assert_approx_eq!(f64, sizes[1], 18250.0);

        assert!(table.numeric_column("Free Mites").is_err());
        assert!(table.numeric_column("Date").is_err());
        assert!(table.numeric_column("Nonexistent").is_err());
    }

    #[rstest]
    fn test_to_json(schema: ResultSchema) {
        let table = ResultTable::parse(
            ["", "", "06/15/2014 18000 5.5", "06/16/2014 18250 6"],
            &schema,
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&table.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Date": ["06/15/2014", "06/16/2014"],
                "Colony Size": [18000.0, 18250.0],
                "Free Mites": [5.5, 6.0],
            })
        );
    }

    #[rstest]
    fn test_write_csv(schema: ResultSchema) {
        let table = ResultTable::parse(["", "", "06/15/2014 18000 5.5"], &schema).unwrap();
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("results.csv");
        table.write_csv(&file_path).unwrap();

        let contents = fs::read_to_string(&file_path).unwrap();
        assert_eq!(
            contents.lines().collect_vec(),
            ["Date,Colony Size,Free Mites", "06/15/2014,18000,5.5"]
        );
    }

    #[test]
    fn test_parse_executable_schema() {
        let schema = ResultSchema::for_version(SchemaVersion::Executable);
        let mut lines = vec![String::from("banner"); schema.skip_rows];
        let values = (1..schema.width()).map(|i| i.to_string()).join(" ");
        lines.push(format!("06/15/2014 {values}"));
        lines.push(format!("06/16/2014 {values}"));

        let table = ResultTable::parse(&lines, &schema).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.rows().iter().all(|row| row.values.len() == 29));
    }

    #[test]
    fn test_from_path_missing() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            ResultTable::from_path(
                &dir.path().join("vp_results.txt"),
                &ResultSchema::for_version(SchemaVersion::Executable)
            ),
            Err(VarroaPopError::NotFound { .. })
        ));
    }
}
