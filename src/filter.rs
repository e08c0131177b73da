use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::month;

/// Optional list/report refinements, exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase"), default)]
pub struct ListParams {
    pub recruitment_method: Option<String>,
    pub customer_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

/// Columns a caller may sort by. Anything else falls back to the default order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    YearMonth,
    RecruitmentMethod,
    CustomerName,
    MonthlyFee,
    MonthlyApplications,
    MonthlyRegistrations,
    MonthlyPlacements,
    ApplicationUnitPrice,
    RegistrationUnitPrice,
    PlacementUnitPrice,
    UpdatedAt,
}

impl SortKey {
    pub const ALL: [SortKey; 11] = [
        SortKey::YearMonth,
        SortKey::RecruitmentMethod,
        SortKey::CustomerName,
        SortKey::MonthlyFee,
        SortKey::MonthlyApplications,
        SortKey::MonthlyRegistrations,
        SortKey::MonthlyPlacements,
        SortKey::ApplicationUnitPrice,
        SortKey::RegistrationUnitPrice,
        SortKey::PlacementUnitPrice,
        SortKey::UpdatedAt,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.column() == value)
    }

    pub fn column(self) -> &'static str {
        match self {
            SortKey::YearMonth => "year_month",
            SortKey::RecruitmentMethod => "recruitment_method",
            SortKey::CustomerName => "customer_name",
            SortKey::MonthlyFee => "monthly_fee",
            SortKey::MonthlyApplications => "monthly_applications",
            SortKey::MonthlyRegistrations => "monthly_registrations",
            SortKey::MonthlyPlacements => "monthly_placements",
            SortKey::ApplicationUnitPrice => "application_unit_price",
            SortKey::RegistrationUnitPrice => "registration_unit_price",
            SortKey::PlacementUnitPrice => "placement_unit_price",
            SortKey::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// `"desc"` is descending; anything else is ascending.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("desc") => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordOrder {
    /// `year_month DESC, id DESC`
    #[default]
    Newest,
    By(SortKey, SortDirection),
}

/// A validated predicate and ordering over the record store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub recruitment_method: Option<String>,
    pub customer_name: Option<String>,
    /// Inclusive lower bound.
    pub start: Option<NaiveDate>,
    /// Exclusive upper bound: first day of the month after `endDate`.
    pub end: Option<NaiveDate>,
    pub order: RecordOrder,
}

impl RecordFilter {
    /// Never fails: malformed dates and unknown sort keys are dropped.
    pub fn from_params(params: &ListParams) -> Self {
        let start = non_empty(&params.start_date).and_then(month::parse_year_month);
        let end = non_empty(&params.end_date)
            .and_then(month::parse_year_month)
            .map(month::first_of_next_month);

        let order = match non_empty(&params.sort).and_then(SortKey::parse) {
            Some(key) => RecordOrder::By(key, SortDirection::parse(params.order.as_deref())),
            None => {
                if let Some(sort) = non_empty(&params.sort) {
                    tracing::debug!(sort, "ignoring unrecognized sort key");
                }
                RecordOrder::Newest
            }
        };

        Self {
            recruitment_method: non_empty(&params.recruitment_method).map(str::to_string),
            customer_name: non_empty(&params.customer_name).map(str::to_string),
            start,
            end,
            order,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
