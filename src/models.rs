use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::month;

/// One customer's reported metrics for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    pub id: i64,
    pub recruitment_method: String,
    pub customer_name: String,
    pub year_month: NaiveDate,
    pub monthly_fee: i64,
    pub monthly_applications: i64,
    pub monthly_registrations: i64,
    pub monthly_placements: i64,
    pub application_unit_price: f64,
    pub registration_unit_price: f64,
    pub placement_unit_price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerRecord {
    pub fn group_label(&self) -> String {
        format!("{} - {}", self.recruitment_method, self.customer_name)
    }
}

/// The writable fields of a record, with unit prices already derived.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomerRecord {
    pub recruitment_method: String,
    pub customer_name: String,
    pub year_month: NaiveDate,
    pub monthly_fee: i64,
    pub monthly_applications: i64,
    pub monthly_registrations: i64,
    pub monthly_placements: i64,
    pub application_unit_price: f64,
    pub registration_unit_price: f64,
    pub placement_unit_price: f64,
}

impl NewCustomerRecord {
    pub fn new(
        recruitment_method: impl Into<String>,
        customer_name: impl Into<String>,
        year_month: NaiveDate,
        monthly_fee: i64,
        monthly_applications: i64,
        monthly_registrations: i64,
        monthly_placements: i64,
    ) -> Self {
        Self {
            recruitment_method: recruitment_method.into(),
            customer_name: customer_name.into(),
            year_month: month::first_of_month(year_month),
            monthly_fee,
            monthly_applications,
            monthly_registrations,
            monthly_placements,
            application_unit_price: unit_price(monthly_fee, monthly_applications),
            registration_unit_price: unit_price(monthly_fee, monthly_registrations),
            placement_unit_price: unit_price(monthly_fee, monthly_placements),
        }
    }
}

/// Fee divided by count, or zero when there is nothing to divide by.
pub fn unit_price(fee: i64, count: i64) -> f64 {
    if count > 0 {
        fee as f64 / count as f64
    } else {
        0.0
    }
}

/// Raw create/update payload as submitted by a form or a CSV row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerForm {
    pub recruitment_method: String,
    pub customer_name: String,
    pub year_month: String,
    pub monthly_fee: String,
    pub monthly_applications: String,
    pub monthly_registrations: String,
    pub monthly_placements: String,
}

impl CustomerForm {
    pub fn validate(&self) -> Result<NewCustomerRecord, ValidationError> {
        let recruitment_method = required_text("recruitmentMethod", &self.recruitment_method)?;
        let customer_name = required_text("customerName", &self.customer_name)?;
        let year_month = month::parse_year_month(self.year_month.trim()).ok_or_else(|| {
            ValidationError::new(
                "yearMonth",
                format!("invalid year/month {:?}, expected YYYY-MM", self.year_month),
            )
        })?;

        Ok(NewCustomerRecord::new(
            recruitment_method,
            customer_name,
            year_month,
            count("monthlyFee", &self.monthly_fee)?,
            count("monthlyApplications", &self.monthly_applications)?,
            count("monthlyRegistrations", &self.monthly_registrations)?,
            count("monthlyPlacements", &self.monthly_placements)?,
        ))
    }
}

fn required_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(value.to_string())
}

fn count(field: &'static str, value: &str) -> Result<i64, ValidationError> {
    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| ValidationError::new(field, format!("{value:?} is not an integer")))?;
    if parsed < 0 {
        return Err(ValidationError::new(field, "must not be negative"));
    }
    Ok(parsed)
}

/// Arithmetic means over a filtered record set. All zero when the set is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Averages {
    pub monthly_fee: f64,
    pub monthly_applications: f64,
    pub monthly_registrations: f64,
    pub monthly_placements: f64,
    pub application_unit_price: f64,
    pub registration_unit_price: f64,
    pub placement_unit_price: f64,
}

/// One line of the trend chart: a `(method, customer)` group aligned to the label axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDataset {
    pub label: String,
    pub monthly_applications: Vec<i64>,
    pub monthly_registrations: Vec<i64>,
    pub monthly_placements: Vec<i64>,
    pub application_unit_price: Vec<f64>,
    pub registration_unit_price: Vec<f64>,
    pub placement_unit_price: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}
