use polars::prelude::{AnyValue, DataFrame, PolarsResult};
use serde::Serialize;
use std::fmt;

/// A single value of a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl From<AnyValue<'_>> for Cell {
    fn from(value: AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Cell::Null,
            AnyValue::Boolean(b) => Cell::Bool(b),
            AnyValue::String(s) => Cell::Str(s.to_string()),
            AnyValue::StringOwned(s) => Cell::Str(s.to_string()),
            other => {
                let dtype = other.dtype();
                if dtype.is_signed_integer() {
                    other.extract::<i64>().map_or(Cell::Null, Cell::Int)
                } else if dtype.is_unsigned_integer() {
                    other.extract::<u64>().map_or(Cell::Null, Cell::UInt)
                } else if dtype.is_float() {
                    other.extract::<f64>().map_or(Cell::Null, Cell::Float)
                } else {
                    Cell::Str(other.to_string())
                }
            }
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("null"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::UInt(v) => write!(f, "{v}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Str(s) => f.write_str(s),
        }
    }
}

/// The rows of the current page, with their column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultPage {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ResultPage {
    /// Convert a query result. An empty frame gives an empty page (no header either).
    pub fn from_frame(df: &DataFrame) -> PolarsResult<Self> {
        if df.height() == 0 {
            return Ok(Self::default());
        }
        let header = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let columns = df.get_columns();
        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let row = columns
                .iter()
                .map(|c| c.get(i).map(Cell::from))
                .collect::<PolarsResult<Vec<_>>>()?;
            rows.push(row);
        }
        Ok(Self { header, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_from_frame_converts_cells() {
        let df = df!(
            "id" => [1i64, 2],
            "name" => [Some("a"), None],
            "score" => [0.5f64, 1.5],
            "ok" => [true, false]
        )
        .unwrap();
        let page = ResultPage::from_frame(&df).unwrap();
        assert_eq!(page.header, vec!["id", "name", "score", "ok"]);
        assert_eq!(
            page.rows[0],
            vec![
                Cell::Int(1),
                Cell::Str("a".into()),
                Cell::Float(0.5),
                Cell::Bool(true)
            ]
        );
        assert_eq!(page.rows[1][1], Cell::Null);
    }

    #[test]
    fn test_empty_frame_has_no_header() {
        let df = df!("id" => Vec::<i64>::new()).unwrap();
        let page = ResultPage::from_frame(&df).unwrap();
        assert!(page.header.is_empty());
        assert!(page.is_empty());
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Null.to_string(), "null");
        assert_eq!(Cell::Str("x y".into()).to_string(), "x y");
        assert_eq!(Cell::UInt(7).to_string(), "7");
    }
}
