// src/db/identity.rs

use log::debug;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Result};

/// Префикс сгенерированных кодов компаний.
pub const COMPANY_CODE_PREFIX: &str = "AUTO";
/// Длина случайной части кода.
pub const COMPANY_CODE_TOKEN_LEN: usize = 8;

const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Результат поиска компании по имени.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Компания уже есть в базе.
    Existing(String),
    /// Компании нет; код сгенерирован, но строка ещё НЕ записана -
    /// это обязанность вызывающего.
    New(String),
}

impl Resolution {
    pub fn code(&self) -> &str {
        match self {
            Resolution::Existing(code) | Resolution::New(code) => code,
        }
    }

    pub fn into_code(self) -> String {
        match self {
            Resolution::Existing(code) | Resolution::New(code) => code,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Resolution::New(_))
    }
}

/// `AUTO` + 8 символов из A-Z0-9. Уникальность проверяет `resolve_company`.
pub fn generate_company_code() -> String {
    let mut rng = rand::rng();
    let token: String = (0..COMPANY_CODE_TOKEN_LEN)
        .map(|_| TOKEN_CHARSET[rng.random_range(0..TOKEN_CHARSET.len())] as char)
        .collect();
    format!("{COMPANY_CODE_PREFIX}{token}")
}

pub fn is_generated_code(code: &str) -> bool {
    code.strip_prefix(COMPANY_CODE_PREFIX)
        .map(|token| {
            token.len() == COMPANY_CODE_TOKEN_LEN
                && token.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        })
        .unwrap_or(false)
}

/// Код компании по точному (регистрозависимому) совпадению имени.
/// При дублях имён берётся первый по коду.
pub fn find_company_code(conn: &Connection, name: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT company_code FROM companies WHERE company_name = ?1 ORDER BY company_code LIMIT 1",
        params![name],
        |row| row.get(0),
    )
    .optional()
}

fn code_taken(conn: &Connection, code: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM companies WHERE company_code = ?1",
            params![code],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Ничего не пишет в базу: «не найдено» - это ветка создания, а не ошибка.
/// Новый код никогда не совпадает с уже существующим.
pub fn resolve_company(conn: &Connection, name: &str) -> Result<Resolution> {
    resolve_company_with(conn, name, generate_company_code)
}

fn resolve_company_with(
    conn: &Connection,
    name: &str,
    mut next_code: impl FnMut() -> String,
) -> Result<Resolution> {
    if let Some(code) = find_company_code(conn, name)? {
        return Ok(Resolution::Existing(code));
    }
    let mut code = next_code();
    while code_taken(conn, &code)? {
        debug!("generated code {} already taken, retrying", code);
        code = next_code();
    }
    Ok(Resolution::New(code))
}
