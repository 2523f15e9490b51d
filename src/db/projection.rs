// src/db/projection.rs
//
// Представления только для чтения: объединения трёх таблиц по коду компании.
// Все функции работают с соединением для чтения (RecordStore::conn).

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Result, Row};
use serde::Serialize;

use crate::db::company::{category_column, Company, CompanyRepo};
use crate::db::schema::TABLES;
use crate::db::values::CustomerCategory;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactView {
    pub id: i64,
    pub company_code: Option<String>,
    pub company_name: Option<String>,
    pub customer_name: String,
    pub position: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub acquisition_path: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsultationView {
    pub id: i64,
    pub company_code: Option<String>,
    pub company_name: Option<String>,
    pub customer_name: Option<String>,
    pub consultation_date: Option<String>,
    pub consultation_content: String,
    pub project_name: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

/// Строка сводной таблицы: компания × контакт × консультация.
/// Компания без контактов и консультаций даёт одну строку с пустыми полями.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegratedRow {
    pub company_code: String,
    pub company_name: String,
    pub industry: Option<String>,
    pub revenue_2024: Option<f64>,
    pub employee_count: Option<i64>,
    pub customer_category: Option<CustomerCategory>,
    pub customer_name: Option<String>,
    pub position: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub consultation_date: Option<String>,
    pub consultation_content: Option<String>,
    pub project_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub record_count: i64,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    MissingTables { tables: Vec<String> },
    ForeignKeyErrors { count: usize },
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

pub fn companies_view(conn: &Connection) -> Result<Vec<Company>> {
    CompanyRepo::new(conn).all()
}

pub fn contacts_view(conn: &Connection) -> Result<Vec<ContactView>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT cc.id, cc.company_code, c.company_name, cc.customer_name,
               cc.position, cc.phone, cc.email, cc.acquisition_path, cc.created_at
        FROM customer_contacts cc
        LEFT JOIN companies c ON cc.company_code = c.company_code
        ORDER BY c.company_name, cc.id
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ContactView {
            id: row.get(0)?,
            company_code: row.get(1)?,
            company_name: row.get(2)?,
            customer_name: row.get(3)?,
            position: row.get(4)?,
            phone: row.get(5)?,
            email: row.get(6)?,
            acquisition_path: row.get(7)?,
            created_at: row.get(8)?,
        })
    })?;
    let contacts = rows.collect::<Result<Vec<_>>>()?;
    Ok(contacts)
}

const SELECT_CONSULTATION_VIEW: &str = r#"
    SELECT con.id, con.company_code, c.company_name, con.customer_name,
           con.consultation_date, con.consultation_content, con.project_name,
           con.created_at
    FROM consultations con
    LEFT JOIN companies c ON con.company_code = c.company_code
"#;

fn row_to_consultation_view(row: &Row<'_>) -> Result<ConsultationView> {
    Ok(ConsultationView {
        id: row.get(0)?,
        company_code: row.get(1)?,
        company_name: row.get(2)?,
        customer_name: row.get(3)?,
        consultation_date: row.get(4)?,
        consultation_content: row.get(5)?,
        project_name: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn consultations_view(conn: &Connection) -> Result<Vec<ConsultationView>> {
    let sql = format!("{SELECT_CONSULTATION_VIEW} ORDER BY c.company_name, con.id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_consultation_view)?;
    let consultations = rows.collect::<Result<Vec<_>>>()?;
    Ok(consultations)
}

/// Последние консультации, новые сверху.
pub fn recent_consultations(conn: &Connection, limit: usize) -> Result<Vec<ConsultationView>> {
    let sql = format!("{SELECT_CONSULTATION_VIEW} ORDER BY con.created_at DESC, con.id DESC LIMIT ?1");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit as i64], row_to_consultation_view)?;
    let consultations = rows.collect::<Result<Vec<_>>>()?;
    Ok(consultations)
}

pub fn integrated_view(conn: &Connection) -> Result<Vec<IntegratedRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT c.company_code, c.company_name, c.industry, c.revenue_2024,
               c.employee_count, c.customer_category,
               cc.customer_name, cc.position, cc.phone, cc.email,
               con.consultation_date, con.consultation_content, con.project_name
        FROM companies c
        LEFT JOIN customer_contacts cc ON c.company_code = cc.company_code
        LEFT JOIN consultations con ON c.company_code = con.company_code
        ORDER BY c.company_name, c.company_code, cc.id, con.id
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(IntegratedRow {
            company_code: row.get(0)?,
            company_name: row.get(1)?,
            industry: row.get(2)?,
            revenue_2024: row.get(3)?,
            employee_count: row.get(4)?,
            customer_category: category_column(row, 5)?,
            customer_name: row.get(6)?,
            position: row.get(7)?,
            phone: row.get(8)?,
            email: row.get(9)?,
            consultation_date: row.get(10)?,
            consultation_content: row.get(11)?,
            project_name: row.get(12)?,
        })
    })?;
    let integrated = rows.collect::<Result<Vec<_>>>()?;
    Ok(integrated)
}

/// Число записей и имена колонок по каждой таблице.
pub fn table_info(conn: &Connection) -> Result<Vec<TableInfo>> {
    let mut info = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let record_count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;

        let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
        let columns = rows.collect::<Result<Vec<_>>>()?;

        info.push(TableInfo { name: table.to_string(), record_count, columns });
    }
    Ok(info)
}

/// Проверка: все ли таблицы на месте и нет ли висячих ссылок на компании.
/// Внешние ключи не включены, поэтому нарушения возможны и только считаются.
pub fn check_health(conn: &Connection) -> Result<HealthStatus> {
    conn.query_row("SELECT 1", [], |_| Ok(()))?;

    let mut missing = Vec::new();
    for table in TABLES {
        let found: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |r| r.get(0),
        )?;
        if found == 0 {
            missing.push(table.to_string());
        }
    }
    if !missing.is_empty() {
        return Ok(HealthStatus::MissingTables { tables: missing });
    }

    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let mut rows = stmt.query([])?;
    let mut count = 0;
    while rows.next()?.is_some() {
        count += 1;
    }
    if count > 0 {
        return Ok(HealthStatus::ForeignKeyErrors { count });
    }
    Ok(HealthStatus::Healthy)
}
