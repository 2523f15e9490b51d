// src/db/values.rs

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_COMPANY_NAME_LEN: usize = 100;
pub const MAX_REVENUE: f64 = 999_999_999_999.0;
pub const MAX_EMPLOYEE_COUNT: i64 = 1_000_000;
pub const MIN_CONTENT_LEN: usize = 5;
pub const MAX_CONTENT_LEN: usize = 2000;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field}: '{value}' is not a number")]
    NotANumber { field: &'static str, value: String },

    #[error("{field}: {value} is out of range")]
    OutOfRange { field: &'static str, value: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("phone number must have 9-11 digits: {0}")]
    InvalidPhone(String),

    #[error("unknown customer category: {0}")]
    UnknownCategory(String),
}

/// Значение ячейки таблицы.
///
/// Пустая строка, отсутствующая ячейка и `null` сводятся к одному случаю:
/// `is_empty()` / `as_text() == None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Текстовое представление без окружающих пробелов; `None` для пустой ячейки.
    pub fn as_text(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        match self {
            CellValue::Empty => None,
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Int(n) => Some(n.to_string()),
            // 1234.0 из Excel должно читаться как "1234", а не "1234.0"
            CellValue::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
            CellValue::Float(f) => Some(f.to_string()),
            CellValue::Text(s) => Some(s.trim().to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text().unwrap_or_default())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Int(n)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Empty)
    }
}

impl From<serde_json::Value> for CellValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => CellValue::Empty,
            Value::Bool(b) => CellValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => CellValue::Int(i),
                None => n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Empty),
            },
            Value::String(s) => CellValue::Text(s),
            other => CellValue::Text(other.to_string()),
        }
    }
}

/// Категория клиента. В базе хранится корейской меткой, как её вводят сотрудники.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerCategory {
    #[serde(rename = "신규")]
    New,
    #[serde(rename = "기존")]
    Existing,
    #[serde(rename = "잠재")]
    Prospect,
    #[serde(rename = "VIP")]
    Vip,
}

impl CustomerCategory {
    pub const ALL: [CustomerCategory; 4] = [
        CustomerCategory::New,
        CustomerCategory::Existing,
        CustomerCategory::Prospect,
        CustomerCategory::Vip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerCategory::New => "신규",
            CustomerCategory::Existing => "기존",
            CustomerCategory::Prospect => "잠재",
            CustomerCategory::Vip => "VIP",
        }
    }
}

impl fmt::Display for CustomerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerCategory {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "신규" => Ok(CustomerCategory::New),
            "기존" => Ok(CustomerCategory::Existing),
            "잠재" => Ok(CustomerCategory::Prospect),
            other => match other.to_ascii_lowercase().as_str() {
                "new" => Ok(CustomerCategory::New),
                "existing" => Ok(CustomerCategory::Existing),
                "prospect" => Ok(CustomerCategory::Prospect),
                "vip" => Ok(CustomerCategory::Vip),
                _ => Err(ValueError::UnknownCategory(other.to_string())),
            },
        }
    }
}

// ---------------------- Разбор чисел ----------------------

fn strip_separators(s: &str) -> String {
    s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect()
}

/// Выручка: разделители тысяч и пробелы отбрасываются, пусто -> `None`,
/// не-число -> ошибка (а не тихий ноль).
pub fn parse_revenue(value: &CellValue) -> Result<Option<f64>, ValueError> {
    const FIELD: &str = "revenue";
    let parsed = match value {
        v if v.is_empty() => return Ok(None),
        CellValue::Int(n) => *n as f64,
        CellValue::Float(f) => *f,
        CellValue::Text(s) => {
            let cleaned = strip_separators(s);
            cleaned
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .ok_or_else(|| ValueError::NotANumber { field: FIELD, value: s.trim().to_string() })?
        }
        other => {
            return Err(ValueError::NotANumber { field: FIELD, value: other.to_string() })
        }
    };

    if !(0.0..=MAX_REVENUE).contains(&parsed) {
        return Err(ValueError::OutOfRange { field: FIELD, value: parsed.to_string() });
    }
    Ok(Some(parsed))
}

/// Число сотрудников: дробная часть отбрасывается.
pub fn parse_employee_count(value: &CellValue) -> Result<Option<i64>, ValueError> {
    const FIELD: &str = "employee count";
    let parsed = match value {
        v if v.is_empty() => return Ok(None),
        CellValue::Int(n) => *n,
        CellValue::Float(f) => f.trunc() as i64,
        CellValue::Text(s) => {
            let cleaned = strip_separators(s);
            match cleaned.parse::<i64>() {
                Ok(n) => n,
                Err(_) => cleaned
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
                    .ok_or_else(|| ValueError::NotANumber { field: FIELD, value: s.trim().to_string() })?,
            }
        }
        other => {
            return Err(ValueError::NotANumber { field: FIELD, value: other.to_string() })
        }
    };

    if !(0..=MAX_EMPLOYEE_COUNT).contains(&parsed) {
        return Err(ValueError::OutOfRange { field: FIELD, value: parsed.to_string() });
    }
    Ok(Some(parsed))
}

// ---------------------- Валидаторы ----------------------

pub fn validate_company_name(value: &CellValue) -> Result<String, ValueError> {
    let name = value.as_text().ok_or(ValueError::Required { field: "company name" })?;
    if name.chars().count() > MAX_COMPANY_NAME_LEN {
        return Err(ValueError::TooLong { field: "company name", max: MAX_COMPANY_NAME_LEN });
    }
    Ok(name)
}

pub fn validate_email(value: &CellValue) -> Result<Option<String>, ValueError> {
    match value.as_text() {
        None => Ok(None),
        Some(email) if EMAIL_RE.is_match(&email) => Ok(Some(email)),
        Some(email) => Err(ValueError::InvalidEmail(email)),
    }
}

/// Допускаются цифры, дефисы, скобки и пробелы; считаются только цифры.
pub fn validate_phone(value: &CellValue) -> Result<Option<String>, ValueError> {
    match value.as_text() {
        None => Ok(None),
        Some(phone) => {
            let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
            if (9..=11).contains(&digits) {
                Ok(Some(phone))
            } else {
                Err(ValueError::InvalidPhone(phone))
            }
        }
    }
}

pub fn validate_consultation_content(value: &CellValue) -> Result<String, ValueError> {
    const FIELD: &str = "consultation content";
    let content = value.as_text().ok_or(ValueError::Required { field: FIELD })?;
    let len = content.chars().count();
    if len < MIN_CONTENT_LEN {
        return Err(ValueError::TooShort { field: FIELD, min: MIN_CONTENT_LEN });
    }
    if len > MAX_CONTENT_LEN {
        return Err(ValueError::TooLong { field: FIELD, max: MAX_CONTENT_LEN });
    }
    Ok(content)
}

pub fn parse_category(value: &CellValue) -> Result<Option<CustomerCategory>, ValueError> {
    value.as_text().map(|s| s.parse()).transpose()
}
