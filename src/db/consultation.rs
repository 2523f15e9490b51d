// src/db/consultation.rs

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use rusqlite::{params, Connection, Result, Row};
use serde::{Deserialize, Serialize};

use crate::db::fields::{self, cell, RawRow};
use crate::db::values::{validate_consultation_content, ValueError};

/// Формат даты, в котором форма ручного ввода сохраняет дату консультации.
pub const CONSULTATION_DATE_FORMAT: &str = "%Y.%m.%d";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConsultationFields {
    pub customer_name: Option<String>,
    /// Свободный текст, как в исходной таблице; календарной проверки нет.
    pub consultation_date: Option<String>,
    pub consultation_content: String,
    pub project_name: Option<String>,
}

impl ConsultationFields {
    pub fn from_row(row: &RawRow) -> std::result::Result<Self, ValueError> {
        Ok(Self {
            customer_name: cell(row, fields::CUSTOMER_NAME).as_text(),
            consultation_date: cell(row, fields::CONSULTATION_DATE).as_text(),
            consultation_content: validate_consultation_content(cell(
                row,
                fields::CONSULTATION_CONTENT,
            ))?,
            project_name: cell(row, fields::PROJECT_NAME).as_text(),
        })
    }

    /// Дата из календарного виджета -> текст вида `2024.05.17`.
    pub fn dated(mut self, date: NaiveDate) -> Self {
        self.consultation_date = Some(date.format(CONSULTATION_DATE_FORMAT).to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consultation {
    pub id: i64,
    pub company_code: Option<String>,
    #[serde(flatten)]
    pub fields: ConsultationFields,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

pub struct ConsultationRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ConsultationRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub(crate) fn insert(&self, company_code: &str, consultation: &ConsultationFields) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO consultations (
                company_code, customer_name, consultation_date,
                consultation_content, project_name
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                company_code,
                consultation.customer_name,
                consultation.consultation_date,
                consultation.consultation_content,
                consultation.project_name,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("Inserted consultation {} for company {}", id, company_code);
        Ok(id)
    }

    pub fn by_company(&self, company_code: &str) -> Result<Vec<Consultation>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, company_code, customer_name, consultation_date,
                   consultation_content, project_name, created_at, updated_at
            FROM consultations
            WHERE company_code = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![company_code], Self::row_to_consultation)?;
        let consultations = rows.collect::<Result<Vec<_>>>()?;
        Ok(consultations)
    }

    pub fn count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM consultations", [], |r| r.get(0))
    }

    pub(crate) fn delete_all(&self) -> Result<usize> {
        self.conn.execute("DELETE FROM consultations", [])
    }

    fn row_to_consultation(row: &Row<'_>) -> Result<Consultation> {
        Ok(Consultation {
            id: row.get(0)?,
            company_code: row.get(1)?,
            fields: ConsultationFields {
                customer_name: row.get(2)?,
                consultation_date: row.get(3)?,
                consultation_content: row.get(4)?,
                project_name: row.get(5)?,
            },
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fields::row_from;
    use crate::db::migrations::setup_migrations;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().expect("Failed to open in-memory database");
        setup_migrations(&conn).expect("Failed to create schema");
        conn
    }

    #[test]
    fn test_insert_consultation() {
        let conn = setup_test_db();
        let repo = ConsultationRepo::new(&conn);

        let input = ConsultationFields {
            customer_name: Some("Choi".to_string()),
            consultation_date: Some("2024.05.17".to_string()),
            consultation_content: "Quoted the annual maintenance plan".to_string(),
            project_name: Some("Renewal".to_string()),
        };
        let id = repo.insert("C-9", &input).expect("Failed to add consultation");

        let fetched = repo.by_company("C-9").unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, id);
        assert_eq!(fetched[0].fields, input);
    }

    #[test]
    fn test_date_is_free_text() {
        let row = row_from([
            (fields::CONSULTATION_CONTENT, "Follow-up call about pricing"),
            (fields::CONSULTATION_DATE, "next tuesday"),
        ]);
        let parsed = ConsultationFields::from_row(&row).expect("Failed to parse consultation");
        assert_eq!(parsed.consultation_date.as_deref(), Some("next tuesday"));
        assert_eq!(parsed.customer_name, None);

        let dated = parsed.dated(NaiveDate::from_ymd_opt(2024, 5, 7).unwrap());
        assert_eq!(dated.consultation_date.as_deref(), Some("2024.05.07"));
    }

    #[test]
    fn test_short_content_rejected() {
        let row = row_from([(fields::CONSULTATION_CONTENT, "ok")]);
        assert!(matches!(
            ConsultationFields::from_row(&row),
            Err(ValueError::TooShort { .. })
        ));
    }
}
