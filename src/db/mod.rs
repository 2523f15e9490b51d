// src/db/mod.rs
//
// Хранилище CRM: три таблицы (companies, customer_contacts, consultations),
// пакетный импорт с сопоставлением компаний по имени и сохранение правок таблицы.

pub mod cache;
pub mod company;
pub mod config;
pub mod consultation;
pub mod contact;
pub mod diff;
pub mod error;
pub mod export;
pub mod fields;
pub mod identity;
pub mod import;
pub mod migrations;
pub mod monitoring;
pub mod projection;
pub mod reconcile;
pub mod schema;
pub mod store;
pub mod values;
