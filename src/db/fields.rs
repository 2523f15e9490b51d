// src/db/fields.rs
//
// Канонические имена полей строки. Импорт переименовывает колонки файла в эти ключи
// (см. import::ColumnMapping), дальше весь код работает только с ними.

use std::collections::BTreeMap;

use crate::db::values::CellValue;

/// Строка произвольной формы: имя поля -> значение ячейки.
pub type RawRow = BTreeMap<String, CellValue>;

pub const COMPANY_CODE: &str = "company_code";
pub const COMPANY_NAME: &str = "company_name";
pub const REVENUE: &str = "revenue_2024";
pub const INDUSTRY: &str = "industry";
pub const EMPLOYEE_COUNT: &str = "employee_count";
pub const ADDRESS: &str = "address";
pub const PRODUCTS: &str = "products";
pub const CUSTOMER_CATEGORY: &str = "customer_category";

pub const CUSTOMER_NAME: &str = "customer_name";
pub const POSITION: &str = "position";
pub const PHONE: &str = "phone";
pub const EMAIL: &str = "email";
pub const ACQUISITION_PATH: &str = "acquisition_path";

pub const CONSULTATION_DATE: &str = "consultation_date";
pub const CONSULTATION_CONTENT: &str = "consultation_content";
pub const PROJECT_NAME: &str = "project_name";

/// Служебная колонка с номером строки таблицы. В сравнении строк не участвует.
pub const ROW_INDEX: &str = "_index";

static EMPTY: CellValue = CellValue::Empty;

/// Значение поля; отсутствующий ключ читается как пустая ячейка.
pub fn cell<'a>(row: &'a RawRow, field: &str) -> &'a CellValue {
    row.get(field).unwrap_or(&EMPTY)
}

/// Собирает строку из пар (поле, значение). Удобно в тестах и при ручном вводе.
pub fn row_from<I, K, V>(pairs: I) -> RawRow
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<CellValue>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
