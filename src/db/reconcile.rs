// src/db/reconcile.rs
//
// Пакетный импорт строк: для каждой строки - найти/создать компанию, затем
// insert или update. Каждая строка коммитится сама по себе: ошибка в строке 5
// оставляет строки 1–4 в базе. Отката пакета нет.

use log::{info, warn};

use crate::db::company::{CompanyFields, UpsertOutcome};
use crate::db::consultation::ConsultationFields;
use crate::db::contact::ContactFields;
use crate::db::error::{RowError, StoreResult};
use crate::db::fields::{self, cell, RawRow};
use crate::db::monitoring::{measure_db_operation, record_row};
use crate::db::store::RecordWriter;
use crate::db::values::validate_company_name;

/// Итог пакета: счётчики + построчные ошибки.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub inserted: usize,
    pub updated: usize,
    /// Строки без обязательного ключа. Ошибкой не считаются.
    pub skipped: usize,
    /// Компании, созданные «по ссылке» из контактов/консультаций.
    pub companies_created: usize,
    pub errors: Vec<RowError>,
}

impl BatchReport {
    pub fn committed(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "inserted: {}, updated: {}, skipped: {}, failed: {}",
            self.inserted,
            self.updated,
            self.skipped,
            self.errors.len()
        );
        if self.companies_created > 0 {
            out.push_str(&format!(", companies created: {}", self.companies_created));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Skipped,
    Inserted,
    Updated,
}

impl RowOutcome {
    fn label(&self) -> &'static str {
        match self {
            RowOutcome::Skipped => "skipped",
            RowOutcome::Inserted => "inserted",
            RowOutcome::Updated => "updated",
        }
    }
}

struct Applied {
    outcome: RowOutcome,
    created_company: bool,
}

impl From<RowOutcome> for Applied {
    fn from(outcome: RowOutcome) -> Self {
        Applied { outcome, created_company: false }
    }
}

/// Общий цикл: строка за строкой, ошибка строки не прерывает пакет.
fn run_batch<F>(entity: &'static str, rows: &[RawRow], mut apply: F) -> BatchReport
where
    F: FnMut(&RawRow) -> StoreResult<Applied>,
{
    let mut report = BatchReport::default();

    measure_db_operation(entity, || {
        for (idx, row) in rows.iter().enumerate() {
            match apply(row) {
                Ok(applied) => {
                    match applied.outcome {
                        RowOutcome::Skipped => report.skipped += 1,
                        RowOutcome::Inserted => report.inserted += 1,
                        RowOutcome::Updated => report.updated += 1,
                    }
                    if applied.created_company {
                        report.companies_created += 1;
                    }
                    record_row(entity, applied.outcome.label());
                }
                Err(e) => {
                    let err = RowError::new(idx + 1, e.to_string());
                    warn!("{} import: {}", entity, err);
                    report.errors.push(err);
                    record_row(entity, "failed");
                }
            }
        }
    });

    info!("{} import finished: {}", entity, report.summary());
    report
}

/// Импорт компаний. Код из строки имеет приоритет; иначе компания ищется
/// по имени, а для нового имени генерируется код.
pub fn import_companies(writer: &RecordWriter<'_>, rows: &[RawRow]) -> BatchReport {
    run_batch("company", rows, |row| {
        if cell(row, fields::COMPANY_NAME).is_empty() {
            return Ok(RowOutcome::Skipped.into());
        }
        let company = CompanyFields::from_row(row)?;

        let code = match cell(row, fields::COMPANY_CODE).as_text() {
            Some(code) => code,
            None => writer.resolve(&company.company_name)?.into_code(),
        };

        let outcome = match writer.upsert_company(&code, &company)? {
            UpsertOutcome::Inserted => RowOutcome::Inserted,
            UpsertOutcome::Updated => RowOutcome::Updated,
        };
        Ok(outcome.into())
    })
}

/// Импорт контактов. Контакт всегда вставляется заново; компания создаётся,
/// если её ещё нет.
pub fn import_contacts(writer: &RecordWriter<'_>, rows: &[RawRow]) -> BatchReport {
    run_batch("contact", rows, |row| {
        if cell(row, fields::COMPANY_NAME).is_empty() || cell(row, fields::CUSTOMER_NAME).is_empty() {
            return Ok(RowOutcome::Skipped.into());
        }
        // сначала валидация, чтобы битая строка не оставила пустую компанию
        let company_name = validate_company_name(cell(row, fields::COMPANY_NAME))?;
        let contact = ContactFields::from_row(row)?;

        let resolution = writer.find_or_create(&company_name)?;
        writer.insert_contact(resolution.code(), &contact)?;
        Ok(Applied { outcome: RowOutcome::Inserted, created_company: resolution.is_new() })
    })
}

pub fn import_consultations(writer: &RecordWriter<'_>, rows: &[RawRow]) -> BatchReport {
    run_batch("consultation", rows, |row| {
        if cell(row, fields::COMPANY_NAME).is_empty()
            || cell(row, fields::CONSULTATION_CONTENT).is_empty()
        {
            return Ok(RowOutcome::Skipped.into());
        }
        let company_name = validate_company_name(cell(row, fields::COMPANY_NAME))?;
        let consultation = ConsultationFields::from_row(row)?;

        let resolution = writer.find_or_create(&company_name)?;
        writer.insert_consultation(resolution.code(), &consultation)?;
        Ok(Applied { outcome: RowOutcome::Inserted, created_company: resolution.is_new() })
    })
}
