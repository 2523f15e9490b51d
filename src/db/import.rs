// src/db/import.rs
//
// Файлы импорта -> RawRow. Разбор значений здесь не делается: ячейки остаются
// как есть, приведение типов и валидация происходят в reconcile/diff.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use csv::{ReaderBuilder, Trim};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::db::error::{StoreError, StoreResult};
use crate::db::fields::{self, RawRow};
use crate::db::values::CellValue;

/// Заголовки, под которыми поля встречаются в выгрузках. Первый - основной.
const KNOWN_HEADERS: [(&str, &[&str]); 16] = [
    (fields::COMPANY_CODE, &["업체코드", "기업코드"]),
    (fields::COMPANY_NAME, &["기업명"]),
    (fields::REVENUE, &["매출액_2024", "매출액 (2024)", "매출액"]),
    (fields::INDUSTRY, &["업종"]),
    (fields::EMPLOYEE_COUNT, &["종업원수"]),
    (fields::ADDRESS, &["주소"]),
    (fields::PRODUCTS, &["상품"]),
    (fields::CUSTOMER_CATEGORY, &["고객구분"]),
    (fields::CUSTOMER_NAME, &["고객명"]),
    (fields::POSITION, &["직위", "직책"]),
    (fields::PHONE, &["전화", "전화번호", "연락처"]),
    (fields::EMAIL, &["이메일"]),
    (fields::ACQUISITION_PATH, &["획득경로"]),
    (fields::CONSULTATION_DATE, &["상담날짜", "상담 날짜"]),
    (fields::CONSULTATION_CONTENT, &["상담내역", "상담 내역"]),
    (fields::PROJECT_NAME, &["프로젝트명"]),
];

/// Соответствие «каноническое поле -> колонка файла», которое задаёт пользователь.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    columns: BTreeMap<String, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, source: impl Into<String>) -> Self {
        self.columns.insert(field.to_string(), source.into());
        self
    }

    /// Подбирает соответствие по заголовкам: каноническое имя или
    /// привычный заголовок выгрузки.
    pub fn detect(headers: &[String]) -> Self {
        let mut mapping = Self::new();
        for (field, labels) in KNOWN_HEADERS {
            let found = headers
                .iter()
                .find(|h| h.trim() == field || labels.contains(&h.trim()));
            if let Some(header) = found {
                mapping.columns.insert(field.to_string(), header.clone());
            }
        }
        mapping
    }

    pub fn source_for(&self, field: &str) -> Option<&str> {
        self.columns.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Колонки из соответствия, которых нет в файле.
    pub fn validate_columns(&self, headers: &[String]) -> Vec<String> {
        self.columns
            .values()
            .filter(|source| !headers.iter().any(|h| h == *source))
            .cloned()
            .collect()
    }

    /// Переименовывает колонки в канонические; несопоставленные отбрасываются.
    pub fn apply(&self, rows: &[RawRow]) -> Vec<RawRow> {
        rows.iter()
            .map(|row| {
                self.columns
                    .iter()
                    .filter_map(|(field, source)| {
                        row.get(source).map(|value| (field.clone(), value.clone()))
                    })
                    .collect()
            })
            .collect()
    }
}

/// Заголовки в порядке первого появления.
pub fn headers(rows: &[RawRow]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !seen.contains(key) {
                seen.push(key.clone());
            }
        }
    }
    seen
}

/// CSV с заголовком. Пустая ячейка -> `CellValue::Empty`.
pub fn read_csv<R: Read>(reader: R) -> StoreResult<Vec<RawRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row: RawRow = header
            .iter()
            .zip(record.iter())
            .map(|(name, value)| {
                let value = if value.is_empty() { CellValue::Empty } else { CellValue::from(value) };
                (name.clone(), value)
            })
            .collect();
        rows.push(row);
    }
    debug!("read {} csv rows with {} columns", rows.len(), header.len());
    Ok(rows)
}

pub fn read_csv_path(path: &Path) -> StoreResult<Vec<RawRow>> {
    let file = std::fs::File::open(path)?;
    let rows = read_csv(file)?;
    info!("imported {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

fn data_to_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::from(s.as_str()),
        Data::Int(n) => CellValue::Int(*n),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Text(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Первый лист книги (xlsx / xls / ods). Первая строка - заголовок.
pub fn read_workbook(path: &Path) -> StoreResult<Vec<RawRow>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| StoreError::Workbook(format!("{}: {}", path.display(), e)))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| StoreError::Workbook(format!("{}: no sheets", path.display())))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| StoreError::Workbook(format!("{} / {}: {}", path.display(), sheet, e)))?;

    let mut lines = range.rows();
    let header: Vec<String> = match lines.next() {
        Some(cells) => cells
            .iter()
            .map(|c| data_to_cell(c).as_text().unwrap_or_default())
            .collect(),
        None => return Ok(Vec::new()),
    };

    let rows: Vec<RawRow> = lines
        .map(|cells| {
            header
                .iter()
                .zip(cells.iter())
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, data)| (name.clone(), data_to_cell(data)))
                .collect()
        })
        .collect();
    info!("imported {} rows from sheet '{}' of {}", rows.len(), sheet, path.display());
    Ok(rows)
}

/// Выбор читателя по расширению файла.
pub fn read_table(path: &Path) -> StoreResult<Vec<RawRow>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("csv") => read_csv_path(path),
        Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => read_workbook(path),
        _ => Err(StoreError::Workbook(format!(
            "unsupported file type: {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fields::cell;

    const SAMPLE: &str = "기업명,매출액_2024,담당자 메모,업종\n\
                          Acme,\"1,500\",call back,IT\n\
                          Globex,,,\n";

    #[test]
    fn test_read_csv() {
        let rows = read_csv(SAMPLE.as_bytes()).expect("Failed to read csv");
        assert_eq!(rows.len(), 2);
        assert_eq!(cell(&rows[0], "기업명").as_text().as_deref(), Some("Acme"));
        assert_eq!(cell(&rows[0], "매출액_2024").as_text().as_deref(), Some("1,500"));
        assert_eq!(rows[1].get("업종"), Some(&CellValue::Empty));
    }

    #[test]
    fn test_detect_and_apply_mapping() {
        let rows = read_csv(SAMPLE.as_bytes()).unwrap();
        let mapping = ColumnMapping::detect(&headers(&rows));
        assert_eq!(mapping.source_for(fields::COMPANY_NAME), Some("기업명"));
        assert_eq!(mapping.source_for(fields::PHONE), None);

        let mapped = mapping.apply(&rows);
        assert_eq!(
            cell(&mapped[0], fields::COMPANY_NAME).as_text().as_deref(),
            Some("Acme")
        );
        assert_eq!(cell(&mapped[0], fields::INDUSTRY).as_text().as_deref(), Some("IT"));
        // несопоставленная колонка отброшена
        assert!(!mapped[0].contains_key("담당자 메모"));
    }

    #[test]
    fn test_detect_accepts_upload_form_labels() {
        let headers: Vec<String> = ["업체코드", "기업명", "고객명", "직위", "전화", "상담 내역"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let mapping = ColumnMapping::detect(&headers);
        assert_eq!(mapping.source_for(fields::COMPANY_CODE), Some("업체코드"));
        assert_eq!(mapping.source_for(fields::POSITION), Some("직위"));
        assert_eq!(mapping.source_for(fields::PHONE), Some("전화"));
        assert_eq!(mapping.source_for(fields::CONSULTATION_CONTENT), Some("상담 내역"));

        let legacy = ColumnMapping::detect(&["기업코드".to_string(), "직책".to_string()]);
        assert_eq!(legacy.source_for(fields::COMPANY_CODE), Some("기업코드"));
        assert_eq!(legacy.source_for(fields::POSITION), Some("직책"));
    }

    #[test]
    fn test_validate_columns_reports_missing() {
        let mapping = ColumnMapping::new()
            .with(fields::COMPANY_NAME, "Company")
            .with(fields::EMAIL, "E-mail");
        let missing = mapping.validate_columns(&["Company".to_string(), "Phone".to_string()]);
        assert_eq!(missing, vec!["E-mail".to_string()]);
    }

    #[test]
    fn test_mapping_from_json() {
        let mapping: ColumnMapping =
            serde_json::from_str(r#"{"columns":{"company_name":"Name"}}"#).unwrap();
        assert_eq!(mapping.source_for(fields::COMPANY_NAME), Some("Name"));
    }

    #[test]
    fn test_workbook_cells() {
        assert_eq!(data_to_cell(&Data::Float(12.0)), CellValue::Float(12.0));
        assert_eq!(data_to_cell(&Data::String("Acme".into())), CellValue::from("Acme"));
        assert!(data_to_cell(&Data::Empty).is_empty());
    }

    #[test]
    fn test_read_table_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.txt");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(read_table(&path), Err(StoreError::Workbook(_))));
    }

    #[test]
    fn test_read_csv_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(read_table(&path).unwrap().len(), 2);
    }
}
