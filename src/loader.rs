use crate::dataset::{Dataset, Value};
use crate::error::LoadError;
use scraper::{ElementRef, Html, Selector};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Html,
}

impl InputFormat {
    pub fn from_path(path: &str) -> Option<Self> {
        let extension = Path::new(path)
            .extension()
            .and_then(|s| s.to_str())?
            .to_lowercase();
        match extension.as_str() {
            "csv" => Some(InputFormat::Csv),
            "html" | "htm" => Some(InputFormat::Html),
            _ => None,
        }
    }
}

pub struct DatasetLoader {
    client: reqwest::Client,
    table_selector: String,
}

impl DatasetLoader {
    pub fn new(table_selector: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            table_selector: table_selector.to_string(),
        }
    }

    pub fn load_file(&self, file_path: &str) -> Result<Dataset, LoadError> {
        let format = InputFormat::from_path(file_path)
            .ok_or_else(|| LoadError::UnsupportedFormat(file_path.to_string()))?;
        let content = fs::read_to_string(file_path)?;

        self.parse_content(&content, format)
    }

    pub async fn load_url(&self, url: &str) -> Result<Dataset, LoadError> {
        info!(url, "Fetching dataset");

        let response = self
            .client
            .get(url)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LoadError::Status(response.status()));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("text/html"))
            .unwrap_or(false);

        let format = if is_html {
            InputFormat::Html
        } else {
            InputFormat::from_path(url).unwrap_or(InputFormat::Csv)
        };

        let content = response.text().await?;
        self.parse_content(&content, format)
    }

    pub fn parse_content(&self, content: &str, format: InputFormat) -> Result<Dataset, LoadError> {
        match format {
            InputFormat::Csv => parse_csv(content),
            InputFormat::Html => self.parse_html_table(content),
        }
    }

    fn parse_html_table(&self, content: &str) -> Result<Dataset, LoadError> {
        let document = Html::parse_document(content);
        let table_selector = Selector::parse(&self.table_selector)
            .map_err(|e| LoadError::Selector(format!("{}: {:?}", self.table_selector, e)))?;
        let row_selector = parse_selector("tr")?;
        let header_selector = parse_selector("th")?;
        let cell_selector = parse_selector("td")?;

        let table = document
            .select(&table_selector)
            .next()
            .ok_or_else(|| LoadError::TableNotFound(self.table_selector.clone()))?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::new();

        for (i, row) in table.select(&row_selector).enumerate() {
            if columns.is_empty() {
                let headers: Vec<String> = row.select(&header_selector).map(cell_text).collect();
                if !headers.is_empty() {
                    columns = headers;
                    continue;
                }
            }

            let cells: Vec<Value> = row
                .select(&cell_selector)
                .map(|cell| Value::parse_cell(&cell_text(cell)))
                .collect();

            if cells.is_empty() {
                continue;
            }
            if cells.len() != columns.len() {
                // Skip incomplete rows
                warn!(row = i, cells = cells.len(), expected = columns.len(), "Skipping table row");
                continue;
            }
            rows.push(cells);
        }

        Ok(Dataset::new(columns, rows)?)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, LoadError> {
    Selector::parse(selector).map_err(|e| LoadError::Selector(format!("{}: {:?}", selector, e)))
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Parse CSV text with a header row.
pub fn parse_csv(content: &str) -> Result<Dataset, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Value::parse_cell).collect());
    }

    Ok(Dataset::new(columns, rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv() {
        let content = "STUDENTID,FLAG_APP,FLAG_ENR\n 001 ,1,\nA7,0,1\n";
        let dataset = parse_csv(content).unwrap();
        assert_eq!(dataset.columns(), ["STUDENTID", "FLAG_APP", "FLAG_ENR"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.value(0, "STUDENTID"), Some(&Value::from(" 001 ")));
        assert_eq!(dataset.value(0, "FLAG_APP"), Some(&Value::Number(1.0)));
        assert_eq!(dataset.value(0, "FLAG_ENR"), Some(&Value::Null));
        assert_eq!(dataset.value(1, "STUDENTID"), Some(&Value::from("A7")));
    }

    #[test]
    fn test_parse_csv_rejects_ragged_rows() {
        assert!(parse_csv("ID,FLAG\n1,0,9\n").is_err());
    }

    #[test]
    fn test_parse_html_table() {
        let html = r#"
            <html><body>
            <table class="funnel">
              <thead><tr><th>STUDENTID</th><th>FLAG_APP</th><th>FLAG_ENR</th></tr></thead>
              <tbody>
                <tr><td>10</td><td>1</td><td>0</td></tr>
                <tr><td>10</td><td>1</td></tr>
                <tr><td> 11 </td><td>1</td><td>1</td></tr>
              </tbody>
            </table>
            </body></html>
        "#;
        let loader = DatasetLoader::new("table.funnel");
        let dataset = loader.parse_content(html, InputFormat::Html).unwrap();
        assert_eq!(dataset.columns(), ["STUDENTID", "FLAG_APP", "FLAG_ENR"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.value(1, "FLAG_ENR"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_missing_table() {
        let loader = DatasetLoader::new("table.funnel");
        let err = loader
            .parse_content("<html><body><p>nothing</p></body></html>", InputFormat::Html)
            .unwrap_err();
        assert!(matches!(err, LoadError::TableNotFound(_)));
    }

    #[test]
    fn test_load_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("applicants.csv");
        std::fs::write(&path, "ID,FLAG_APP\n1,1\n").unwrap();

        let loader = DatasetLoader::new("table");
        let dataset = loader.load_file(path.to_str().unwrap()).unwrap();
        assert_eq!(dataset.len(), 1);

        let other = dir.path().join("applicants.xlsx");
        std::fs::write(&other, "").unwrap();
        assert!(matches!(
            loader.load_file(other.to_str().unwrap()),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }
}
