pub const SCHEMA_V1: &str = r#"
BEGIN;

-- Companies:
-- company_code задаётся при импорте или генерируется (AUTO + 8 символов)
CREATE TABLE
    IF NOT EXISTS companies (
        company_code TEXT PRIMARY KEY,
        company_name TEXT NOT NULL,
        revenue_2024 REAL,
        industry TEXT,
        employee_count INTEGER,
        address TEXT,
        products TEXT,
        customer_category TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );

CREATE INDEX IF NOT EXISTS idx_companies_name ON companies (company_name);

-- CustomerContacts:
CREATE TABLE
    IF NOT EXISTS customer_contacts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        company_code TEXT,
        customer_name TEXT NOT NULL,
        position TEXT,
        phone TEXT,
        email TEXT,
        acquisition_path TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (company_code) REFERENCES companies (company_code)
    );

-- Consultations:
-- consultation_date хранится как свободный текст (например "2024.05.17")
CREATE TABLE
    IF NOT EXISTS consultations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        company_code TEXT,
        customer_name TEXT,
        consultation_date TEXT,
        consultation_content TEXT NOT NULL,
        project_name TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (company_code) REFERENCES companies (company_code)
    );

------------------------------------------------------------------
-- Устанавливаем user_version = 1
PRAGMA user_version = 1;

COMMIT;
"#;

/// Таблицы, которые обязаны существовать после миграции.
pub const TABLES: [&str; 3] = ["companies", "customer_contacts", "consultations"];
