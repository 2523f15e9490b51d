// src/db/cache.rs

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::debug;

/// Списки для автодополнения. Каждый - результат одного фиксированного запроса.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameList {
    CompanyNames,
    CustomerNames,
    Industries,
    Positions,
}

impl NameList {
    pub const ALL: [NameList; 4] = [
        NameList::CompanyNames,
        NameList::CustomerNames,
        NameList::Industries,
        NameList::Positions,
    ];

    pub fn query(&self) -> &'static str {
        match self {
            NameList::CompanyNames => {
                "SELECT DISTINCT company_name FROM companies WHERE company_name IS NOT NULL ORDER BY company_name"
            }
            NameList::CustomerNames => {
                "SELECT DISTINCT customer_name FROM customer_contacts WHERE customer_name IS NOT NULL ORDER BY customer_name"
            }
            NameList::Industries => {
                "SELECT DISTINCT industry FROM companies WHERE industry IS NOT NULL ORDER BY industry"
            }
            NameList::Positions => {
                "SELECT DISTINCT position FROM customer_contacts WHERE position IS NOT NULL ORDER BY position"
            }
        }
    }
}

struct CachedNames {
    loaded_at: Instant,
    names: Vec<String>,
}

/// Кэш списков имён с истечением по времени.
///
/// Сам по себе кэш ничего не знает об изменениях в базе: сбрасывать записи
/// обязан тот, кто пишет (см. `store::RecordWriter`).
#[derive(Clone)]
pub struct CacheHandler {
    names: Arc<Mutex<LruCache<NameList, CachedNames>>>,
    ttl: Duration,
}

impl CacheHandler {
    /// Создаёт новый кэш с заданной ёмкостью и временем жизни записи
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            names: Arc::new(Mutex::new(LruCache::new(capacity))),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<NameList, CachedNames>> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Свежая запись или `None`, если её нет или она устарела.
    pub fn get(&self, list: NameList) -> Option<Vec<String>> {
        let mut cache = self.lock();
        let entry = cache
            .get(&list)
            .map(|entry| (entry.loaded_at.elapsed() < self.ttl, entry.names.clone()));
        match entry {
            Some((true, names)) => Some(names),
            Some((false, _)) => {
                cache.pop(&list);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, list: NameList, names: Vec<String>) {
        let mut cache = self.lock();
        cache.put(list, CachedNames { loaded_at: Instant::now(), names });
    }

    /// Read-through: при промахе вызывает `load` и кладёт результат в кэш.
    /// Ошибка загрузки не кэшируется.
    pub fn get_or_load<E, F>(&self, list: NameList, load: F) -> Result<Vec<String>, E>
    where
        F: FnOnce() -> Result<Vec<String>, E>,
    {
        if let Some(names) = self.get(list) {
            return Ok(names);
        }
        debug!("name cache miss for {:?}", list);
        let names = load()?;
        self.put(list, names.clone());
        Ok(names)
    }

    pub fn invalidate(&self, list: NameList) {
        self.lock().pop(&list);
    }

    pub fn invalidate_all(&self) {
        self.lock().clear();
    }
}
