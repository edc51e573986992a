use crate::error::DatasetError;
use std::fmt;

/// A single cell of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
}

impl Value {
    /// Interpret a raw cell coming from a CSV or HTML source.
    ///
    /// A cell only becomes a `Number` when rendering it gives back the exact
    /// source text, so `007`, `1.0` or ` 1 ` stay `Text` and write out unchanged.
    pub fn parse_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || matches!(trimmed, "nan" | "NaN" | "NAN" | "null" | "NULL") {
            return Value::Null;
        }

        match raw.parse::<f64>() {
            Ok(number) if number.is_finite() => {
                let value = Value::Number(number);
                if value.render() == raw {
                    value
                } else {
                    Value::Text(raw.to_string())
                }
            }
            _ => Value::Text(raw.to_string()),
        }
    }

    /// String form used for key comparison and CSV output.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Ordered rows sharing one ordered column set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, DatasetError> {
        for (row, values) in rows.iter().enumerate() {
            if values.len() != columns.len() {
                return Err(DatasetError::RowWidth {
                    row,
                    expected: columns.len(),
                    found: values.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Rewrite every cell of one column in place.
    pub(crate) fn map_column<F>(&mut self, col: usize, mut f: F)
    where
        F: FnMut(&Value) -> Value,
    {
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(col) {
                *cell = f(cell);
            }
        }
    }

    /// Keep the rows whose mask entry is `true`, preserving order.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        let mut index = 0;
        self.rows.retain(|_| {
            let keep_row = keep.get(index).copied().unwrap_or(true);
            index += 1;
            keep_row
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell() {
        assert_eq!(Value::parse_cell(""), Value::Null);
        assert_eq!(Value::parse_cell("NaN"), Value::Null);
        assert_eq!(Value::parse_cell("1"), Value::Number(1.0));
        assert_eq!(Value::parse_cell("2.5"), Value::Number(2.5));
        assert_eq!(Value::parse_cell(" 1 "), Value::Text(" 1 ".to_string()));
        assert_eq!(Value::parse_cell(" A-17 "), Value::Text(" A-17 ".to_string()));
    }

    #[test]
    fn test_parse_cell_keeps_source_text() {
        for raw in ["007", "1.0", "1e3", "-0", "+5", "12345678901234567890"] {
            assert_eq!(Value::parse_cell(raw), Value::Text(raw.to_string()));
            assert_eq!(Value::parse_cell(raw).render(), raw);
        }
        assert_eq!(Value::parse_cell("-12"), Value::Number(-12.0));
    }

    #[test]
    fn test_render_integral_numbers() {
        assert_eq!(Value::Number(1.0).render(), "1");
        assert_eq!(Value::Number(1.5).render(), "1.5");
        assert_eq!(Value::Null.render(), "");
    }

    #[test]
    fn test_row_width_is_checked() {
        let err = Dataset::new(
            vec!["ID".to_string(), "FLAG".to_string()],
            vec![vec![Value::from(1)]],
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::RowWidth { row: 0, expected: 2, found: 1 }));
    }

    #[test]
    fn test_retain_rows_preserves_order() {
        let mut dataset = Dataset::new(
            vec!["ID".to_string()],
            vec![vec![Value::from(1)], vec![Value::from(2)], vec![Value::from(3)]],
        )
        .unwrap();
        dataset.retain_rows(&[true, false, true]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.value(1, "ID"), Some(&Value::Number(3.0)));
    }
}
