// src/db/diff.rs
//
// Сравнение отредактированной таблицы компаний с исходной.
// Выравнивание ПОЗИЦИОННОЕ: строка i исходной таблицы сравнивается со строкой i
// отредактированной. Вставка/удаление строки в середине сдвигает все последующие
// сравнения - таблица должна редактироваться только дописыванием в конец.

use log::{info, warn};

use crate::db::company::{Company, CompanyFields};
use crate::db::error::RowError;
use crate::db::fields::{self, cell, RawRow};
use crate::db::identity::generate_company_code;
use crate::db::monitoring::{measure_db_operation, record_row};
use crate::db::store::{RecordStore, RecordWriter};
use crate::db::values::CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Update,
    Insert,
}

/// Одна запись, которую нужно сделать. `row` - номер строки таблицы (с 1).
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeOp {
    pub row: usize,
    pub kind: ChangeKind,
    pub code: String,
    pub fields: CompanyFields,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub ops: Vec<ChangeOp>,
    pub errors: Vec<RowError>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn updates(&self) -> usize {
        self.ops.iter().filter(|op| op.kind == ChangeKind::Update).count()
    }

    pub fn inserts(&self) -> usize {
        self.ops.iter().filter(|op| op.kind == ChangeKind::Insert).count()
    }
}

/// Результат сохранения правок.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditOutcome {
    /// false только если не удалось открыть соединение для записи.
    pub success: bool,
    pub written: usize,
    pub errors: Vec<RowError>,
    /// Ошибка уровня вызова (не строки): соединение для записи не открылось.
    pub failure: Option<String>,
}

/// Снимок компаний в виде строк таблицы, с колонкой `_index`.
pub fn snapshot(companies: &[Company]) -> Vec<RawRow> {
    companies
        .iter()
        .enumerate()
        .map(|(idx, company)| {
            let f = &company.fields;
            let mut row = RawRow::new();
            row.insert(fields::ROW_INDEX.into(), CellValue::Int(idx as i64));
            row.insert(fields::COMPANY_CODE.into(), company.company_code.as_str().into());
            row.insert(fields::COMPANY_NAME.into(), f.company_name.as_str().into());
            row.insert(fields::REVENUE.into(), f.revenue_2024.into());
            row.insert(fields::INDUSTRY.into(), f.industry.clone().into());
            row.insert(fields::EMPLOYEE_COUNT.into(), f.employee_count.into());
            row.insert(fields::ADDRESS.into(), f.address.clone().into());
            row.insert(fields::PRODUCTS.into(), f.products.clone().into());
            row.insert(
                fields::CUSTOMER_CATEGORY.into(),
                f.customer_category.map(|c| c.as_str()).into(),
            );
            row
        })
        .collect()
}

/// Сырые значения совпадают по всем колонкам, кроме `_index`.
fn same_raw(original: &RawRow, edited: &RawRow) -> bool {
    original
        .keys()
        .chain(edited.keys())
        .filter(|key| key.as_str() != fields::ROW_INDEX)
        .all(|key| cell(original, key) == cell(edited, key))
}

/// Строки совпадают после разбора: "1,000" и 1000 - одно и то же значение.
fn same_parsed(original: &RawRow, edited_fields: &CompanyFields, edited: &RawRow) -> bool {
    let code_matches =
        cell(original, fields::COMPANY_CODE).as_text() == cell(edited, fields::COMPANY_CODE).as_text();
    match CompanyFields::from_row(original) {
        Ok(original_fields) => code_matches && original_fields == *edited_fields,
        Err(_) => false,
    }
}

/// Строит набор изменений. Ничего не пишет.
pub fn plan_company_changes(original: &[RawRow], edited: &[RawRow]) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (idx, row) in edited.iter().enumerate() {
        let row_no = idx + 1;
        let before = original.get(idx);

        if let Some(before) = before {
            if same_raw(before, row) {
                continue;
            }
        }

        if cell(row, fields::COMPANY_NAME).is_empty() {
            changes.errors.push(RowError::new(row_no, "company name is required"));
            continue;
        }

        let company = match CompanyFields::from_row(row) {
            Ok(company) => company,
            Err(e) => {
                changes.errors.push(RowError::new(row_no, e.to_string()));
                continue;
            }
        };

        match before {
            Some(before) => {
                if same_parsed(before, &company, row) {
                    continue;
                }
                match cell(before, fields::COMPANY_CODE).as_text() {
                    Some(code) => changes.ops.push(ChangeOp {
                        row: row_no,
                        kind: ChangeKind::Update,
                        code,
                        fields: company,
                    }),
                    None => changes
                        .errors
                        .push(RowError::new(row_no, "original row has no company code")),
                }
            }
            None => {
                let code = cell(row, fields::COMPANY_CODE)
                    .as_text()
                    .unwrap_or_else(generate_company_code);
                changes.ops.push(ChangeOp {
                    row: row_no,
                    kind: ChangeKind::Insert,
                    code,
                    fields: company,
                });
            }
        }
    }

    changes
}

/// Пишет операции по одной; каждая коммитится отдельно.
pub fn apply_changes(writer: &RecordWriter<'_>, changes: ChangeSet) -> EditOutcome {
    let ChangeSet { ops, mut errors } = changes;
    let mut written = 0;

    for op in ops {
        let result = match op.kind {
            ChangeKind::Update => writer.update_company(&op.code, &op.fields).map(|changed| {
                if changed == 0 {
                    Err(format!("company {} no longer exists", op.code))
                } else {
                    Ok(())
                }
            }),
            ChangeKind::Insert => writer.insert_company(&op.code, &op.fields).map(Ok),
        };

        match result {
            Ok(Ok(())) => {
                written += 1;
                let outcome = match op.kind {
                    ChangeKind::Update => "updated",
                    ChangeKind::Insert => "inserted",
                };
                record_row("company_edit", outcome);
            }
            Ok(Err(message)) => {
                warn!("edit row {}: {}", op.row, message);
                errors.push(RowError::new(op.row, message));
                record_row("company_edit", "failed");
            }
            Err(e) => {
                warn!("edit row {}: {}", op.row, e);
                errors.push(RowError::new(op.row, e.to_string()));
                record_row("company_edit", "failed");
            }
        }
    }

    EditOutcome { success: true, written, errors, failure: None }
}

/// Сохранение правок таблицы компаний: свежее соединение на весь вызов.
pub fn save_edited_companies(
    store: &RecordStore,
    original: &[RawRow],
    edited: &[RawRow],
) -> EditOutcome {
    let writer = match store.writer() {
        Ok(writer) => writer,
        Err(e) => {
            warn!("cannot open write connection: {}", e);
            return EditOutcome {
                success: false,
                written: 0,
                errors: Vec::new(),
                failure: Some(e.to_string()),
            };
        }
    };

    let changes = plan_company_changes(original, edited);
    info!(
        "company edits: {} updates, {} inserts, {} rejected",
        changes.updates(),
        changes.inserts(),
        changes.errors.len()
    );
    measure_db_operation("save_edited_companies", || apply_changes(&writer, changes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::company::CompanyRepo;
    use crate::db::config::StoreConfig;
    use crate::db::fields::row_from;
    use crate::db::identity::is_generated_code;

    fn setup_store() -> (tempfile::TempDir, RecordStore) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = RecordStore::open(StoreConfig::with_path(dir.path().join("crm.db")))
            .expect("Failed to open store");
        (dir, store)
    }

    fn grid() -> Vec<RawRow> {
        vec![
            row_from([
                (fields::ROW_INDEX, CellValue::Int(0)),
                (fields::COMPANY_CODE, "C-1".into()),
                (fields::COMPANY_NAME, "Acme".into()),
                (fields::REVENUE, CellValue::Float(1000.0)),
            ]),
            row_from([
                (fields::ROW_INDEX, CellValue::Int(1)),
                (fields::COMPANY_CODE, "C-2".into()),
                (fields::COMPANY_NAME, "Globex".into()),
                (fields::EMPLOYEE_COUNT, CellValue::Int(12)),
            ]),
        ]
    }

    #[test]
    fn test_unchanged_snapshot_has_no_ops() {
        let original = grid();
        let changes = plan_company_changes(&original, &original.clone());
        assert!(changes.is_empty());
        assert!(changes.errors.is_empty());
    }

    #[test]
    fn test_formatting_only_change_is_ignored() {
        let original = grid();
        let mut edited = original.clone();
        edited[0].insert(fields::REVENUE.into(), "1,000".into());
        edited[1].insert(fields::EMPLOYEE_COUNT.into(), CellValue::Float(12.4));
        edited[1].insert(fields::ROW_INDEX.into(), CellValue::Int(7));

        let changes = plan_company_changes(&original, &edited);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_appended_row_is_one_insert() {
        let original = grid();
        let mut edited = original.clone();
        edited.push(row_from([(fields::COMPANY_NAME, "Initech")]));

        let changes = plan_company_changes(&original, &edited);
        assert_eq!(changes.inserts(), 1);
        assert_eq!(changes.updates(), 0);
        assert_eq!(changes.ops[0].row, 3);
        assert!(is_generated_code(&changes.ops[0].code));
    }

    #[test]
    fn test_appended_row_without_name_is_error() {
        let original = grid();
        let mut edited = original.clone();
        edited.push(row_from([(fields::INDUSTRY, "Retail")]));

        let changes = plan_company_changes(&original, &edited);
        assert!(changes.ops.is_empty());
        assert_eq!(changes.errors.len(), 1);
        assert_eq!(changes.errors[0].row, 3);
    }

    #[test]
    fn test_changed_row_targets_original_code() {
        let original = grid();
        let mut edited = original.clone();
        edited[1].insert(fields::INDUSTRY.into(), "Energy".into());
        edited[1].insert(fields::COMPANY_CODE.into(), "HACKED".into());

        let changes = plan_company_changes(&original, &edited);
        assert_eq!(changes.updates(), 1);
        assert_eq!(changes.ops[0].code, "C-2");
        assert_eq!(changes.ops[0].fields.industry.as_deref(), Some("Energy"));
    }

    #[test]
    fn test_bad_number_is_error_not_op() {
        let original = grid();
        let mut edited = original.clone();
        edited[0].insert(fields::REVENUE.into(), "lots".into());

        let changes = plan_company_changes(&original, &edited);
        assert!(changes.ops.is_empty());
        assert_eq!(changes.errors.len(), 1);
        assert_eq!(changes.errors[0].row, 1);
    }

    #[test]
    fn test_save_edited_companies() {
        let (_dir, store) = setup_store();
        let writer = store.writer().unwrap();
        writer.insert_company("C-1", &CompanyFields::named("Acme")).unwrap();
        writer.insert_company("C-2", &CompanyFields::named("Globex")).unwrap();

        let original = snapshot(&CompanyRepo::new(store.conn()).all().unwrap());
        let mut edited = original.clone();
        edited[1].insert(fields::ADDRESS.into(), "Busan".into());
        edited.push(row_from([(fields::COMPANY_NAME, "Hooli")]));
        edited.push(row_from([(fields::COMPANY_NAME, "")]));

        let outcome = save_edited_companies(&store, &original, &edited);
        assert!(outcome.success);
        assert_eq!(outcome.failure, None);
        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].row, 4);

        let globex = CompanyRepo::new(store.conn()).get("C-2").unwrap().unwrap();
        assert_eq!(globex.fields.address.as_deref(), Some("Busan"));
        assert_eq!(store.company_names().unwrap().len(), 3);
    }

    #[test]
    fn test_unopenable_writer_is_call_failure() {
        let dir = tempfile::tempdir().unwrap();
        let db_dir = dir.path().join("data");
        std::fs::create_dir(&db_dir).unwrap();
        let store = RecordStore::open(StoreConfig::with_path(db_dir.join("crm.db"))).unwrap();
        std::fs::remove_dir_all(&db_dir).unwrap();

        let original = grid();
        let mut edited = original.clone();
        edited.push(row_from([(fields::COMPANY_NAME, "Initech")]));

        let outcome = save_edited_companies(&store, &original, &edited);
        assert!(!outcome.success);
        assert_eq!(outcome.written, 0);
        assert!(outcome.errors.is_empty());
        assert!(outcome.failure.is_some());
    }

    #[test]
    fn test_update_of_deleted_company_is_reported() {
        let (_dir, store) = setup_store();
        let writer = store.writer().unwrap();
        let original = grid();
        let mut edited = original.clone();
        edited[0].insert(fields::INDUSTRY.into(), "Retail".into());

        let outcome = apply_changes(&writer, plan_company_changes(&original, &edited));
        assert!(outcome.success);
        assert_eq!(outcome.written, 0);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].message.contains("C-1"));
    }
}
