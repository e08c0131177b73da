use chrono::{NaiveDate, Utc};

use crate::models::{CustomerRecord, NewCustomerRecord};

pub fn new_record(
    method: &str,
    name: &str,
    year_month: &str,
    fee: i64,
    counts: (i64, i64, i64),
) -> NewCustomerRecord {
    let (applications, registrations, placements) = counts;
    let date = NaiveDate::parse_from_str(&format!("{year_month}-01"), "%Y-%m-%d")
        .expect("test month should be YYYY-MM");
    NewCustomerRecord::new(method, name, date, fee, applications, registrations, placements)
}

pub fn stored(id: i64, values: NewCustomerRecord) -> CustomerRecord {
    let now = Utc::now();
    CustomerRecord {
        id,
        recruitment_method: values.recruitment_method,
        customer_name: values.customer_name,
        year_month: values.year_month,
        monthly_fee: values.monthly_fee,
        monthly_applications: values.monthly_applications,
        monthly_registrations: values.monthly_registrations,
        monthly_placements: values.monthly_placements,
        application_unit_price: values.application_unit_price,
        registration_unit_price: values.registration_unit_price,
        placement_unit_price: values.placement_unit_price,
        created_at: now,
        updated_at: now,
    }
}

pub fn record(
    id: i64,
    method: &str,
    name: &str,
    year_month: &str,
    fee: i64,
    counts: (i64, i64, i64),
) -> CustomerRecord {
    stored(id, new_record(method, name, year_month, fee, counts))
}
