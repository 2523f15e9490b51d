// src/db/error.rs

use thiserror::Error;

use crate::db::values::ValueError;

/// Ошибки уровня хранилища.
///
/// Всё, что не укладывается в «ошибку строки», поднимается наверх как `StoreError`:
/// не открылась база, не создалась схема, не прочитался файл импорта.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQL Error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook Error: {0}")]
    Workbook(String),

    #[error("Xlsx Error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Config Error: {0}")]
    Config(String),

    #[error("Validation Error: {0}")]
    Validation(#[from] ValueError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Ошибка одной строки пакета. Номер строки считается с единицы,
/// как его видит пользователь в таблице.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self { row, message: message.into() }
    }
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.row, self.message)
    }
}
