use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder, Row};

use crate::error::StoreError;
use crate::filter::{RecordFilter, RecordOrder};
use crate::models::{CustomerForm, CustomerRecord, NewCustomerRecord};
use crate::store::RecordStore;

const COLUMNS: &str = "id, recruitment_method, customer_name, year_month, monthly_fee, \
     monthly_applications, monthly_registrations, monthly_placements, \
     application_unit_price, registration_unit_price, placement_unit_price, \
     created_at, updated_at";

pub async fn init_db(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed record store. Deletion sets `deleted_at`; rows are never removed.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find(&self, filter: &RecordFilter) -> Result<Vec<CustomerRecord>, StoreError> {
        let mut query = select_query(filter);
        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn get(&self, id: i64) -> Result<Option<CustomerRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM customer_records WHERE id = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(record_from_row))
    }

    async fn create(&self, record: &NewCustomerRecord) -> Result<i64, StoreError> {
        Ok(insert(&self.pool, record).await?)
    }

    async fn update(&self, id: i64, record: &NewCustomerRecord) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE customer_records
            SET recruitment_method = $2, customer_name = $3, year_month = $4,
                monthly_fee = $5, monthly_applications = $6,
                monthly_registrations = $7, monthly_placements = $8,
                application_unit_price = $9, registration_unit_price = $10,
                placement_unit_price = $11, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(&record.recruitment_method)
        .bind(&record.customer_name)
        .bind(record.year_month)
        .bind(record.monthly_fee)
        .bind(record.monthly_applications)
        .bind(record.monthly_registrations)
        .bind(record.monthly_placements)
        .bind(record.application_unit_price)
        .bind(record.registration_unit_price)
        .bind(record.placement_unit_price)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE customer_records SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn select_query(filter: &RecordFilter) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(format!(
        "SELECT {COLUMNS} FROM customer_records WHERE deleted_at IS NULL"
    ));

    if let Some(method) = &filter.recruitment_method {
        query.push(" AND recruitment_method LIKE ");
        query.push_bind(contains_pattern(method));
    }
    if let Some(name) = &filter.customer_name {
        query.push(" AND customer_name LIKE ");
        query.push_bind(contains_pattern(name));
    }
    if let Some(start) = filter.start {
        query.push(" AND year_month >= ");
        query.push_bind(start);
    }
    if let Some(end) = filter.end {
        query.push(" AND year_month < ");
        query.push_bind(end);
    }

    // Column names come only from the SortKey allow-list.
    match filter.order {
        RecordOrder::Newest => {
            query.push(" ORDER BY year_month DESC, id DESC");
        }
        RecordOrder::By(key, direction) => {
            query.push(format!(
                " ORDER BY {} {dir}, id {dir}",
                key.column(),
                dir = direction.keyword()
            ));
        }
    }

    query
}

/// `%value%` with LIKE wildcards in `value` escaped.
fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn record_from_row(row: &PgRow) -> CustomerRecord {
    CustomerRecord {
        id: row.get("id"),
        recruitment_method: row.get("recruitment_method"),
        customer_name: row.get("customer_name"),
        year_month: row.get("year_month"),
        monthly_fee: row.get("monthly_fee"),
        monthly_applications: row.get("monthly_applications"),
        monthly_registrations: row.get("monthly_registrations"),
        monthly_placements: row.get("monthly_placements"),
        application_unit_price: row.get("application_unit_price"),
        registration_unit_price: row.get("registration_unit_price"),
        placement_unit_price: row.get("placement_unit_price"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn insert<'e, E>(executor: E, record: &NewCustomerRecord) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let id: i64 = sqlx::query(
        r#"
        INSERT INTO customer_records
        (recruitment_method, customer_name, year_month, monthly_fee,
         monthly_applications, monthly_registrations, monthly_placements,
         application_unit_price, registration_unit_price, placement_unit_price)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(&record.recruitment_method)
    .bind(&record.customer_name)
    .bind(record.year_month)
    .bind(record.monthly_fee)
    .bind(record.monthly_applications)
    .bind(record.monthly_registrations)
    .bind(record.monthly_placements)
    .bind(record.application_unit_price)
    .bind(record.registration_unit_price)
    .bind(record.placement_unit_price)
    .fetch_one(executor)
    .await?
    .get("id");

    Ok(id)
}

pub fn seed_records() -> Vec<CustomerForm> {
    let rows = [
        ("Job board", "Acme Staffing", "2024-01", "300000", "120", "40", "6"),
        ("Job board", "Acme Staffing", "2024-02", "300000", "95", "31", "4"),
        ("Job board", "Acme Staffing", "2024-03", "320000", "140", "52", "8"),
        ("Referral", "Acme Staffing", "2024-02", "80000", "12", "9", "3"),
        ("Referral", "Acme Staffing", "2024-03", "80000", "0", "0", "0"),
        ("Scout mail", "Globex Works", "2024-01", "150000", "60", "18", "2"),
        ("Scout mail", "Globex Works", "2024-03", "150000", "48", "20", "0"),
    ];

    rows.into_iter()
        .map(
            |(method, name, month, fee, applications, registrations, placements)| CustomerForm {
                recruitment_method: method.to_string(),
                customer_name: name.to_string(),
                year_month: month.to_string(),
                monthly_fee: fee.to_string(),
                monthly_applications: applications.to_string(),
                monthly_registrations: registrations.to_string(),
                monthly_placements: placements.to_string(),
            },
        )
        .collect()
}

/// Inserts the sample data set, skipping group/months that already have a live record.
pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    for form in seed_records() {
        let record = form.validate().context("invalid seed record")?;
        let result = sqlx::query(
            r#"
            INSERT INTO customer_records
            (recruitment_method, customer_name, year_month, monthly_fee,
             monthly_applications, monthly_registrations, monthly_placements,
             application_unit_price, registration_unit_price, placement_unit_price)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
            WHERE NOT EXISTS (
                SELECT 1 FROM customer_records
                WHERE recruitment_method = $1 AND customer_name = $2
                  AND year_month = $3 AND deleted_at IS NULL
            )
            "#,
        )
        .bind(&record.recruitment_method)
        .bind(&record.customer_name)
        .bind(record.year_month)
        .bind(record.monthly_fee)
        .bind(record.monthly_applications)
        .bind(record.monthly_registrations)
        .bind(record.monthly_placements)
        .bind(record.application_unit_price)
        .bind(record.registration_unit_price)
        .bind(record.placement_unit_price)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    recruitment_method: String,
    customer_name: String,
    year_month: String,
    monthly_fee: String,
    monthly_applications: String,
    monthly_registrations: String,
    monthly_placements: String,
}

impl From<CsvRow> for CustomerForm {
    fn from(row: CsvRow) -> Self {
        CustomerForm {
            recruitment_method: row.recruitment_method,
            customer_name: row.customer_name,
            year_month: row.year_month,
            monthly_fee: row.monthly_fee,
            monthly_applications: row.monthly_applications,
            monthly_registrations: row.monthly_registrations,
            monthly_placements: row.monthly_placements,
        }
    }
}

/// Reads and validates every row, so one bad row leaves the table untouched.
pub fn read_csv<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<NewCustomerRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = result.with_context(|| format!("malformed CSV row on line {line}"))?;
        let record = CustomerForm::from(row)
            .validate()
            .with_context(|| format!("invalid CSV row on line {line}"))?;
        records.push(record);
    }

    Ok(records)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let records = read_csv(file)?;

    let mut tx = pool.begin().await?;
    for record in &records {
        insert(&mut *tx, record).await?;
    }
    tx.commit().await?;

    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ListParams;

    fn sql(params: ListParams) -> String {
        select_query(&RecordFilter::from_params(&params))
            .sql()
            .to_string()
    }

    #[test]
    fn unfiltered_query_orders_newest_first() {
        let sql = sql(ListParams::default());
        assert!(sql.ends_with("WHERE deleted_at IS NULL ORDER BY year_month DESC, id DESC"));
    }

    #[test]
    fn filters_are_bound_not_inlined() {
        let sql = sql(ListParams {
            recruitment_method: Some("Job' OR 1=1 --".to_string()),
            customer_name: Some("Acme".to_string()),
            start_date: Some("2024-01".to_string()),
            end_date: Some("2024-06".to_string()),
            ..ListParams::default()
        });
        assert!(sql.contains(
            "AND recruitment_method LIKE $1 AND customer_name LIKE $2 \
             AND year_month >= $3 AND year_month < $4"
        ));
        assert!(!sql.contains("OR 1=1"));
    }

    #[test]
    fn allowed_sort_is_emitted_with_direction() {
        let sql = sql(ListParams {
            sort: Some("placement_unit_price".to_string()),
            order: Some("desc".to_string()),
            ..ListParams::default()
        });
        assert!(sql.ends_with("ORDER BY placement_unit_price DESC, id DESC"));
    }

    #[test]
    fn rejected_sort_never_reaches_sql() {
        let sql = sql(ListParams {
            sort: Some("year_month; DROP TABLE customer_records".to_string()),
            order: Some("asc".to_string()),
            ..ListParams::default()
        });
        assert!(!sql.contains("DROP"));
        assert!(sql.ends_with("ORDER BY year_month DESC, id DESC"));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(contains_pattern("Acme"), "%Acme%");
        assert_eq!(contains_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn seed_records_are_valid() {
        for form in seed_records() {
            assert!(form.validate().is_ok(), "{form:?}");
        }
    }

    #[test]
    fn csv_rows_are_validated() {
        let data = "recruitment_method,customer_name,year_month,monthly_fee,monthly_applications,monthly_registrations,monthly_placements\n\
                    Job board,Acme,2024-01,1000,10,5,2\n\
                    Referral,Acme,2024-02,600,0,3,0\n";
        let records = read_csv(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].placement_unit_price, 500.0);
        assert_eq!(records[1].application_unit_price, 0.0);
        assert_eq!(records[1].registration_unit_price, 200.0);
    }

    #[test]
    fn bad_csv_row_reports_line_and_field() {
        let data = "recruitment_method,customer_name,year_month,monthly_fee,monthly_applications,monthly_registrations,monthly_placements\n\
                    Job board,Acme,2024-01,1000,10,5,2\n\
                    Job board,Acme,2024-02,lots,10,5,2\n";
        let err = read_csv(data.as_bytes()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("line 3"), "{message}");
        assert!(message.contains("monthlyFee"), "{message}");
    }
}
