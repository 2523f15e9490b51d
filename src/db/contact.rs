// src/db/contact.rs

use chrono::NaiveDateTime;
use log::debug;
use rusqlite::{params, Connection, Result, Row};
use serde::{Deserialize, Serialize};

use crate::db::fields::{self, cell, RawRow};
use crate::db::values::{validate_email, validate_phone, ValueError};

/// Поля контакта, приходящие из импорта или ручного ввода.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContactFields {
    pub customer_name: String,
    pub position: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub acquisition_path: Option<String>,
}

impl ContactFields {
    pub fn from_row(row: &RawRow) -> std::result::Result<Self, ValueError> {
        let customer_name = cell(row, fields::CUSTOMER_NAME)
            .as_text()
            .ok_or(ValueError::Required { field: "customer name" })?;
        Ok(Self {
            customer_name,
            position: cell(row, fields::POSITION).as_text(),
            phone: validate_phone(cell(row, fields::PHONE))?,
            email: validate_email(cell(row, fields::EMAIL))?,
            acquisition_path: cell(row, fields::ACQUISITION_PATH).as_text(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contact {
    pub id: i64,
    pub company_code: Option<String>,
    #[serde(flatten)]
    pub fields: ContactFields,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Контакты только добавляются: обновления на месте нет, удаление - только
/// полная очистка таблицы.
pub struct ContactRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ContactRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Вставляет контакт и возвращает его id.
    pub(crate) fn insert(&self, company_code: &str, contact: &ContactFields) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO customer_contacts (
                company_code, customer_name, position, phone, email, acquisition_path
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                company_code,
                contact.customer_name,
                contact.position,
                contact.phone,
                contact.email,
                contact.acquisition_path,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("Inserted contact {} for company {}", id, company_code);
        Ok(id)
    }

    pub fn by_company(&self, company_code: &str) -> Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, company_code, customer_name, position, phone, email,
                   acquisition_path, created_at, updated_at
            FROM customer_contacts
            WHERE company_code = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![company_code], Self::row_to_contact)?;
        let contacts = rows.collect::<Result<Vec<_>>>()?;
        Ok(contacts)
    }

    pub fn count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM customer_contacts", [], |r| r.get(0))
    }

    pub(crate) fn delete_all(&self) -> Result<usize> {
        self.conn.execute("DELETE FROM customer_contacts", [])
    }

    fn row_to_contact(row: &Row<'_>) -> Result<Contact> {
        Ok(Contact {
            id: row.get(0)?,
            company_code: row.get(1)?,
            fields: ContactFields {
                customer_name: row.get(2)?,
                position: row.get(3)?,
                phone: row.get(4)?,
                email: row.get(5)?,
                acquisition_path: row.get(6)?,
            },
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
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
    fn test_insert_contact() {
        let conn = setup_test_db();
        let repo = ContactRepo::new(&conn);

        let input = ContactFields {
            customer_name: "Kim Minji".to_string(),
            position: Some("Manager".to_string()),
            phone: Some("010-1234-5678".to_string()),
            email: Some("minji@example.com".to_string()),
            acquisition_path: None,
        };

        let id = repo.insert("C-1", &input).expect("Failed to add contact");

        let fetched = repo.by_company("C-1").expect("Failed to fetch contacts");
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, id);
        assert_eq!(fetched[0].company_code.as_deref(), Some("C-1"));
        assert_eq!(fetched[0].fields, input);
    }

    #[test]
    fn test_same_contact_twice_is_two_rows() {
        let conn = setup_test_db();
        let repo = ContactRepo::new(&conn);
        let input = ContactFields { customer_name: "Lee".to_string(), ..ContactFields::default() };

        repo.insert("C-1", &input).unwrap();
        repo.insert("C-1", &input).unwrap();
        assert_eq!(repo.count().unwrap(), 2);

        assert_eq!(repo.delete_all().unwrap(), 2);
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_fields_from_row_validates_email() {
        let ok = row_from([
            (fields::CUSTOMER_NAME, "Park"),
            (fields::EMAIL, "park@example.com"),
            (fields::PHONE, ""),
        ]);
        let parsed = ContactFields::from_row(&ok).expect("Failed to parse contact");
        assert_eq!(parsed.email.as_deref(), Some("park@example.com"));
        assert_eq!(parsed.phone, None);

        let bad = row_from([(fields::CUSTOMER_NAME, "Park"), (fields::EMAIL, "park-at-example")]);
        assert!(matches!(ContactFields::from_row(&bad), Err(ValueError::InvalidEmail(_))));

        let missing = row_from([(fields::EMAIL, "park@example.com")]);
        assert!(matches!(
            ContactFields::from_row(&missing),
            Err(ValueError::Required { .. })
        ));
    }
}
