// src/db/export.rs

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use log::info;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, XlsxError};
use serde::Serialize;

use crate::db::company::Company;
use crate::db::error::StoreResult;
use crate::db::projection::{companies_view, consultations_view, contacts_view, integrated_view};
use crate::db::store::RecordStore;
use crate::db::values::CustomerCategory;

pub const INTEGRATED_BASE: &str = "통합데이터";
pub const COMPANIES_BASE: &str = "기업목록";
pub const CONTACTS_BASE: &str = "고객연락처";
pub const CONSULTATIONS_BASE: &str = "상담이력";
pub const BACKUP_BASE: &str = "CRM_전체백업";

/// Плоская строка компании. csv не умеет `#[serde(flatten)]`.
#[derive(Debug, Serialize)]
struct CompanyRecord<'a> {
    company_code: &'a str,
    company_name: &'a str,
    revenue_2024: Option<f64>,
    industry: Option<&'a str>,
    employee_count: Option<i64>,
    address: Option<&'a str>,
    products: Option<&'a str>,
    customer_category: Option<CustomerCategory>,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
}

impl<'a> From<&'a Company> for CompanyRecord<'a> {
    fn from(company: &'a Company) -> Self {
        let f = &company.fields;
        Self {
            company_code: &company.company_code,
            company_name: &f.company_name,
            revenue_2024: f.revenue_2024,
            industry: f.industry.as_deref(),
            employee_count: f.employee_count,
            address: f.address.as_deref(),
            products: f.products.as_deref(),
            customer_category: f.customer_category,
            created_at: company.created_at,
            updated_at: company.updated_at,
        }
    }
}

/// Пишет строки в CSV; заголовок берётся из имён полей.
pub fn write_csv<W: Write, S: Serialize>(writer: W, rows: &[S]) -> StoreResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// `기업목록` + 2024-05-17 09:30 -> `기업목록_20240517_0930.csv`
pub fn download_filename(base: &str, now: NaiveDateTime) -> String {
    format!("{}_{}.csv", base, now.format("%Y%m%d_%H%M"))
}

fn write_file<S: Serialize>(dir: &Path, base: &str, now: NaiveDateTime, rows: &[S]) -> StoreResult<PathBuf> {
    let path = dir.join(download_filename(base, now));
    write_csv(File::create(&path)?, rows)?;
    info!("exported {} rows to {}", rows.len(), path.display());
    Ok(path)
}

/// `CRM_전체백업` + метка времени, как у CSV, но `.xlsx`.
pub fn backup_filename(now: NaiveDateTime) -> String {
    format!("{}_{}.xlsx", BACKUP_BASE, now.format("%Y%m%d_%H%M"))
}

// Заголовок берётся из первой строки, поэтому пустой лист остаётся без шапки
fn write_sheet<S: Serialize>(
    workbook: &mut Workbook,
    name: &str,
    header: &Format,
    rows: &[S],
) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;
    if let Some(first) = rows.first() {
        sheet.serialize_headers_with_format(0, 0, first, header)?;
        for row in rows {
            sheet.serialize(row)?;
        }
        sheet.autofit();
    }
    Ok(())
}

/// Резервная копия одной книгой: листы 통합데이터, 기업목록, 고객연락처, 상담이력.
pub fn export_backup(store: &RecordStore, dir: &Path) -> StoreResult<PathBuf> {
    let now = Local::now().naive_local();
    let conn = store.conn();

    let companies = companies_view(conn)?;
    let company_records: Vec<CompanyRecord<'_>> = companies.iter().map(CompanyRecord::from).collect();

    let header = Format::new()
        .set_bold()
        .set_text_wrap()
        .set_align(FormatAlign::Top)
        .set_background_color("#D7E4BC")
        .set_border(FormatBorder::Thin);

    let mut workbook = Workbook::new();
    write_sheet(&mut workbook, INTEGRATED_BASE, &header, &integrated_view(conn)?)?;
    write_sheet(&mut workbook, COMPANIES_BASE, &header, &company_records)?;
    write_sheet(&mut workbook, CONTACTS_BASE, &header, &contacts_view(conn)?)?;
    write_sheet(&mut workbook, CONSULTATIONS_BASE, &header, &consultations_view(conn)?)?;

    let path = dir.join(backup_filename(now));
    workbook.save(&path)?;
    info!("backup written to {}", path.display());
    Ok(path)
}

/// Полная выгрузка: сводная таблица и три списка, по файлу на каждый.
pub fn export_all(store: &RecordStore, dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let now = Local::now().naive_local();
    let conn = store.conn();

    let companies = companies_view(conn)?;
    let company_records: Vec<CompanyRecord<'_>> = companies.iter().map(CompanyRecord::from).collect();

    let paths = vec![
        write_file(dir, INTEGRATED_BASE, now, &integrated_view(conn)?)?,
        write_file(dir, COMPANIES_BASE, now, &company_records)?,
        write_file(dir, CONTACTS_BASE, now, &contacts_view(conn)?)?,
        write_file(dir, CONSULTATIONS_BASE, now, &consultations_view(conn)?)?,
    ];
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::company::CompanyFields;
    use crate::db::contact::ContactFields;
    use crate::db::config::StoreConfig;
    use crate::db::fields::cell;
    use crate::db::import::read_workbook;
    use calamine::{open_workbook_auto, Reader};
    use chrono::NaiveDate;

    #[test]
    fn test_download_filename() {
        let now = NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(9, 30, 59)
            .unwrap();
        assert_eq!(download_filename(COMPANIES_BASE, now), "기업목록_20240517_0930.csv");
    }

    #[test]
    fn test_write_csv_uses_field_names() {
        let company = Company {
            company_code: "C-1".to_string(),
            fields: CompanyFields {
                revenue_2024: Some(1500.0),
                customer_category: Some(CustomerCategory::Vip),
                ..CompanyFields::named("Acme")
            },
            created_at: None,
            updated_at: None,
        };
        let mut out = Vec::new();
        write_csv(&mut out, &[CompanyRecord::from(&company)]).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("company_code,company_name,revenue_2024"));
        assert_eq!(lines.next().unwrap(), "C-1,Acme,1500.0,,,,,VIP,,");
    }

    #[test]
    fn test_export_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(StoreConfig::with_path(dir.path().join("crm.db"))).unwrap();
        store.writer().unwrap().find_or_create("Acme").unwrap();

        let paths = export_all(&store, dir.path()).unwrap();
        assert_eq!(paths.len(), 4);
        for path in &paths {
            assert!(path.exists());
        }
        let companies = std::fs::read_to_string(&paths[1]).unwrap();
        assert!(companies.contains("Acme"));
    }

    #[test]
    fn test_export_backup_writes_four_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(StoreConfig::with_path(dir.path().join("crm.db"))).unwrap();
        let writer = store.writer().unwrap();
        let code = writer.find_or_create("Acme").unwrap().into_code();
        let contact = ContactFields { customer_name: "Kim".into(), ..Default::default() };
        writer.insert_contact(&code, &contact).unwrap();

        let path = export_backup(&store, dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("CRM_전체백업_") && name.ends_with(".xlsx"), "{name}");

        let workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec![INTEGRATED_BASE, COMPANIES_BASE, CONTACTS_BASE, CONSULTATIONS_BASE]
        );

        // первый лист - сводная таблица
        let rows = read_workbook(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(cell(&rows[0], "company_name").as_text().as_deref(), Some("Acme"));
        assert_eq!(cell(&rows[0], "customer_name").as_text().as_deref(), Some("Kim"));
    }
}
