// src/db/store.rs
//
// Граница хранения.
// - RecordStore держит одно соединение для чтения на всё время жизни (мемоизация);
// - каждая запись идёт через RecordWriter со СВЕЖИМ соединением;
// - RecordWriter - единственный путь к мутациям, и он же сбрасывает кэш имён.

use log::{debug, info, warn};
use rusqlite::{Connection, OpenFlags, Result as SqlResult};

use crate::db::cache::{CacheHandler, NameList};
use crate::db::company::{CompanyFields, CompanyRepo, UpsertOutcome};
use crate::db::config::StoreConfig;
use crate::db::consultation::{ConsultationFields, ConsultationRepo};
use crate::db::contact::{ContactFields, ContactRepo};
use crate::db::error::StoreResult;
use crate::db::identity::{generate_company_code, resolve_company, Resolution};
use crate::db::migrations::setup_migrations;

/// Открывает соединение с настройками, общими для чтения и записи:
/// WAL, synchronous=NORMAL и busy timeout. Повторов поверх busy timeout нет.
pub fn open_connection(config: &StoreConfig) -> SqlResult<Connection> {
    let conn = Connection::open_with_flags(
        &config.db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )?;
    conn.busy_timeout(config.busy_timeout())?;

    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        warn!("journal_mode is {} instead of WAL for {}", mode, config.db_path.display());
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    // bundled-сборка включает внешние ключи по умолчанию; у нас они только объявлены
    conn.pragma_update(None, "foreign_keys", "OFF")?;
    Ok(conn)
}

pub struct RecordStore {
    config: StoreConfig,
    conn: Connection,
    cache: CacheHandler,
}

impl RecordStore {
    /// Открывает базу и создаёт схему. Ошибка здесь фатальна для приложения.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let conn = open_connection(&config)?;
        setup_migrations(&conn)?;
        // Писать можно только через RecordWriter, иначе кэш имён не сбросится
        conn.pragma_update(None, "query_only", "ON")?;
        let cache = CacheHandler::new(config.cache_capacity, config.cache_ttl());
        info!("record store opened at {}", config.db_path.display());
        Ok(Self { config, conn, cache })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Соединение для чтения (проекции, списки имён). Запись через него
    /// отклоняется SQLite (`query_only`).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn cache(&self) -> &CacheHandler {
        &self.cache
    }

    /// Новое соединение для записи на время одной операции.
    pub fn writer(&self) -> StoreResult<RecordWriter<'_>> {
        let conn = open_connection(&self.config)?;
        debug!("opened write connection to {}", self.config.db_path.display());
        Ok(RecordWriter { conn, cache: &self.cache })
    }

    pub fn names(&self, list: NameList) -> StoreResult<Vec<String>> {
        let names = self.cache.get_or_load(list, || -> SqlResult<Vec<String>> {
            let mut stmt = self.conn.prepare(list.query())?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let names = rows.collect::<SqlResult<Vec<_>>>()?;
            Ok(names)
        })?;
        Ok(names)
    }

    pub fn company_names(&self) -> StoreResult<Vec<String>> {
        self.names(NameList::CompanyNames)
    }

    pub fn customer_names(&self) -> StoreResult<Vec<String>> {
        self.names(NameList::CustomerNames)
    }

    pub fn industries(&self) -> StoreResult<Vec<String>> {
        self.names(NameList::Industries)
    }

    pub fn positions(&self) -> StoreResult<Vec<String>> {
        self.names(NameList::Positions)
    }
}

/// Соединение для записи. Все мутации идут только через него; после каждой
/// успешной мутации затронутые списки имён сбрасываются.
pub struct RecordWriter<'s> {
    conn: Connection,
    cache: &'s CacheHandler,
}

impl<'s> RecordWriter<'s> {
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    fn touched(&self, lists: &[NameList]) {
        for list in lists {
            self.cache.invalidate(*list);
        }
    }

    pub fn resolve(&self, name: &str) -> SqlResult<Resolution> {
        resolve_company(&self.conn, name)
    }

    /// Находит компанию по имени или создаёт минимальную запись (только имя).
    /// `Resolution::New` здесь означает, что строка уже записана.
    pub fn find_or_create(&self, name: &str) -> SqlResult<Resolution> {
        let name = name.trim();
        let resolution = self.resolve(name)?;
        if let Resolution::New(code) = &resolution {
            CompanyRepo::new(&self.conn).insert(code, &CompanyFields::named(name))?;
            self.touched(&[NameList::CompanyNames]);
            info!("created company {} for '{}'", code, name);
        }
        Ok(resolution)
    }

    pub fn upsert_company(&self, code: &str, company: &CompanyFields) -> SqlResult<UpsertOutcome> {
        let outcome = CompanyRepo::new(&self.conn).upsert(code, company)?;
        self.touched(&[NameList::CompanyNames, NameList::Industries]);
        Ok(outcome)
    }

    pub fn insert_company(&self, code: &str, company: &CompanyFields) -> SqlResult<()> {
        CompanyRepo::new(&self.conn).insert(code, company)?;
        self.touched(&[NameList::CompanyNames, NameList::Industries]);
        Ok(())
    }

    pub fn update_company(&self, code: &str, company: &CompanyFields) -> SqlResult<usize> {
        let changed = CompanyRepo::new(&self.conn).update(code, company)?;
        self.touched(&[NameList::CompanyNames, NameList::Industries]);
        Ok(changed)
    }

    /// Новая компания из формы ручного ввода: код всегда новый, даже если
    /// компания с таким именем уже есть.
    pub fn add_company(&self, company: &CompanyFields) -> SqlResult<String> {
        let code = loop {
            let code = generate_company_code();
            if !CompanyRepo::new(&self.conn).exists(&code)? {
                break code;
            }
        };
        self.insert_company(&code, company)?;
        Ok(code)
    }

    pub fn insert_contact(&self, company_code: &str, contact: &ContactFields) -> SqlResult<i64> {
        let id = ContactRepo::new(&self.conn).insert(company_code, contact)?;
        self.touched(&[NameList::CustomerNames, NameList::Positions]);
        Ok(id)
    }

    pub fn insert_consultation(
        &self,
        company_code: &str,
        consultation: &ConsultationFields,
    ) -> SqlResult<i64> {
        ConsultationRepo::new(&self.conn).insert(company_code, consultation)
    }

    /// Одиночная консультация из формы: компания ищется по имени и
    /// создаётся при отсутствии.
    pub fn add_consultation(
        &self,
        company_name: &str,
        consultation: &ConsultationFields,
    ) -> SqlResult<(Resolution, i64)> {
        let resolution = self.find_or_create(company_name)?;
        let id = self.insert_consultation(resolution.code(), consultation)?;
        Ok((resolution, id))
    }

    /// Полная очистка всех трёх таблиц.
    pub fn wipe_all(&self) -> SqlResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        ConsultationRepo::new(&tx).delete_all()?;
        ContactRepo::new(&tx).delete_all()?;
        CompanyRepo::new(&tx).delete_all()?;
        tx.commit()?;
        self.cache.invalidate_all();
        warn!("all records wiped");
        Ok(())
    }
}
