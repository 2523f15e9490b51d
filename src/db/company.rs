// src/db/company.rs

use chrono::NaiveDateTime;
use log::{debug, warn};
use rusqlite::types::{ToSql, ToSqlOutput};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::{Deserialize, Serialize};

use crate::db::fields::{self, cell, RawRow};
use crate::db::values::{
    parse_category, parse_employee_count, parse_revenue, validate_company_name, CustomerCategory,
    ValueError,
};

/// Изменяемые поля компании (всё, кроме кода и временных меток).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompanyFields {
    pub company_name: String,
    pub revenue_2024: Option<f64>,
    pub industry: Option<String>,
    pub employee_count: Option<i64>,
    pub address: Option<String>,
    pub products: Option<String>,
    pub customer_category: Option<CustomerCategory>,
}

impl CompanyFields {
    /// Минимальная запись: только имя. Так создаются компании «по ссылке»
    /// из контактов и консультаций.
    pub fn named(name: impl Into<String>) -> Self {
        Self { company_name: name.into(), ..Self::default() }
    }

    /// Разбирает строку импорта/таблицы. Числа приводятся, текст обрезается,
    /// пустые ячейки становятся `None`.
    pub fn from_row(row: &RawRow) -> std::result::Result<Self, ValueError> {
        Ok(Self {
            company_name: validate_company_name(cell(row, fields::COMPANY_NAME))?,
            revenue_2024: parse_revenue(cell(row, fields::REVENUE))?,
            industry: cell(row, fields::INDUSTRY).as_text(),
            employee_count: parse_employee_count(cell(row, fields::EMPLOYEE_COUNT))?,
            address: cell(row, fields::ADDRESS).as_text(),
            products: cell(row, fields::PRODUCTS).as_text(),
            customer_category: parse_category(cell(row, fields::CUSTOMER_CATEGORY))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Company {
    pub company_code: String,
    #[serde(flatten)]
    pub fields: CompanyFields,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

impl ToSql for CustomerCategory {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Категория из колонки. Хранилище перечисление не проверяет, поэтому пустая
/// или незнакомая метка читается как `None`, а не валит всю выборку.
pub(crate) fn category_column(row: &Row<'_>, idx: usize) -> Result<Option<CustomerCategory>> {
    let label: Option<String> = row.get(idx)?;
    Ok(label.and_then(|label| match label.parse::<CustomerCategory>() {
        Ok(category) => Some(category),
        Err(_) => {
            if !label.trim().is_empty() {
                warn!("unknown customer category '{}' read as empty", label);
            }
            None
        }
    }))
}

const SELECT_COMPANY: &str = r#"
    SELECT
        company_code,
        company_name,
        revenue_2024,
        industry,
        employee_count,
        address,
        products,
        customer_category,
        created_at,
        updated_at
    FROM companies
"#;

pub struct CompanyRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> CompanyRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn exists(&self, code: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM companies WHERE company_code = ?1",
                params![code],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get(&self, code: &str) -> Result<Option<Company>> {
        let sql = format!("{SELECT_COMPANY} WHERE company_code = ?1");
        self.conn
            .query_row(&sql, params![code], Self::row_to_company)
            .optional()
    }

    pub fn all(&self) -> Result<Vec<Company>> {
        let sql = format!("{SELECT_COMPANY} ORDER BY company_name, company_code");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_company)?;
        let companies = rows.collect::<Result<Vec<_>>>()?;
        Ok(companies)
    }

    /// Обновляет или вставляет компанию с заданным кодом.
    pub(crate) fn upsert(&self, code: &str, company: &CompanyFields) -> Result<UpsertOutcome> {
        if self.exists(code)? {
            self.update(code, company)?;
            Ok(UpsertOutcome::Updated)
        } else {
            self.insert(code, company)?;
            Ok(UpsertOutcome::Inserted)
        }
    }

    /// Вставляет новую компанию
    pub(crate) fn insert(&self, code: &str, company: &CompanyFields) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO companies (
                company_code, company_name, revenue_2024, industry,
                employee_count, address, products, customer_category
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                code,
                company.company_name,
                company.revenue_2024,
                company.industry,
                company.employee_count,
                company.address,
                company.products,
                company.customer_category,
            ],
        )?;
        debug!("Inserted company {}", code);
        Ok(())
    }

    /// Полное обновление всех колонок. Возвращает число затронутых строк.
    pub(crate) fn update(&self, code: &str, company: &CompanyFields) -> Result<usize> {
        let changed = self.conn.execute(
            r#"
            UPDATE companies
            SET company_name = ?1,
                revenue_2024 = ?2,
                industry = ?3,
                employee_count = ?4,
                address = ?5,
                products = ?6,
                customer_category = ?7,
                updated_at = CURRENT_TIMESTAMP
            WHERE company_code = ?8
            "#,
            params![
                company.company_name,
                company.revenue_2024,
                company.industry,
                company.employee_count,
                company.address,
                company.products,
                company.customer_category,
                code,
            ],
        )?;
        debug!("Updated company {} ({} rows)", code, changed);
        Ok(changed)
    }

    pub(crate) fn delete_all(&self) -> Result<usize> {
        self.conn.execute("DELETE FROM companies", [])
    }

    fn row_to_company(row: &Row<'_>) -> Result<Company> {
        Ok(Company {
            company_code: row.get(0)?,
            fields: CompanyFields {
                company_name: row.get(1)?,
                revenue_2024: row.get(2)?,
                industry: row.get(3)?,
                employee_count: row.get(4)?,
                address: row.get(5)?,
                products: row.get(6)?,
                customer_category: category_column(row, 7)?,
            },
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fields::row_from;
    use crate::db::migrations::setup_migrations;

    // Временная база в памяти со схемой v1
    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().expect("Failed to open in-memory database");
        setup_migrations(&conn).expect("Failed to create schema");
        conn
    }

    fn acme() -> CompanyFields {
        CompanyFields {
            company_name: "Acme".to_string(),
            revenue_2024: Some(1_500_000.0),
            industry: Some("Manufacturing".to_string()),
            employee_count: Some(42),
            address: Some("Seoul".to_string()),
            products: Some("Anvils".to_string()),
            customer_category: Some(CustomerCategory::Vip),
        }
    }

    #[test]
    fn test_insert_company() {
        let conn = setup_test_db();
        let repo = CompanyRepo::new(&conn);

        repo.insert("C-1", &acme()).expect("Failed to insert company");

        let fetched = repo.get("C-1").expect("Failed to fetch company").expect("missing company");
        assert_eq!(fetched.company_code, "C-1");
        assert_eq!(fetched.fields, acme());
        assert!(fetched.created_at.is_some());
    }

    #[test]
    fn test_upsert_updates_existing() {
        let conn = setup_test_db();
        let repo = CompanyRepo::new(&conn);

        assert_eq!(repo.upsert("C-1", &acme()).unwrap(), UpsertOutcome::Inserted);

        let mut changed = acme();
        changed.employee_count = None;
        changed.customer_category = Some(CustomerCategory::Existing);
        assert_eq!(repo.upsert("C-1", &changed).unwrap(), UpsertOutcome::Updated);

        let fetched = repo.get("C-1").unwrap().unwrap();
        // Полное обновление: None затирает старое значение
        assert_eq!(fetched.fields.employee_count, None);
        assert_eq!(fetched.fields.customer_category, Some(CustomerCategory::Existing));
        assert_eq!(repo.all().unwrap().len(), 1);
    }

    #[test]
    fn test_get_nonexistent_company() {
        let conn = setup_test_db();
        let repo = CompanyRepo::new(&conn);

        assert!(repo.get("missing").unwrap().is_none());
        assert!(!repo.exists("missing").unwrap());
        assert_eq!(repo.update("missing", &acme()).unwrap(), 0);
    }

    #[test]
    fn test_unknown_category_reads_as_none() {
        let conn = setup_test_db();
        conn.execute_batch(
            "INSERT INTO companies (company_code, company_name, customer_category)
             VALUES ('C-1', 'Blank', ''), ('C-2', 'Gold', 'Gold'), ('C-3', 'Vip', 'VIP');",
        )
        .unwrap();

        let all = CompanyRepo::new(&conn).all().expect("bad labels must not fail the read");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].fields.customer_category, None);
        assert_eq!(all[1].fields.customer_category, None);
        assert_eq!(all[2].fields.customer_category, Some(CustomerCategory::Vip));
    }

    #[test]
    fn test_fields_from_row() {
        let row = row_from([
            (fields::COMPANY_NAME, "  Acme "),
            (fields::REVENUE, "1,500,000"),
            (fields::EMPLOYEE_COUNT, "42.7"),
            (fields::CUSTOMER_CATEGORY, "VIP"),
            (fields::ADDRESS, ""),
        ]);
        let parsed = CompanyFields::from_row(&row).expect("Failed to parse row");
        assert_eq!(parsed.company_name, "Acme");
        assert_eq!(parsed.revenue_2024, Some(1_500_000.0));
        assert_eq!(parsed.employee_count, Some(42));
        assert_eq!(parsed.customer_category, Some(CustomerCategory::Vip));
        assert_eq!(parsed.address, None);

        let bad = row_from([(fields::COMPANY_NAME, "Acme"), (fields::REVENUE, "abc")]);
        assert!(matches!(
            CompanyFields::from_row(&bad),
            Err(ValueError::NotANumber { .. })
        ));
    }
}
