use std::fmt::Write;

use serde::Serialize;

use crate::error::StoreError;
use crate::filter::{ListParams, RecordFilter};
use crate::format::{format_decimal, format_integer};
use crate::models::{Averages, ChartData, CustomerRecord};
use crate::month;
use crate::series;
use crate::stats;
use crate::store::RecordStore;

/// Everything the presentation layer needs for one list request.
#[derive(Debug, Clone, Serialize)]
pub struct ListReport {
    pub customers: Vec<CustomerRecord>,
    pub averages: Averages,
    /// `None` when no record matched.
    pub chart_data: Option<ChartData>,
    pub params: ListParams,
}

pub async fn build_list_report(
    store: &dyn RecordStore,
    params: ListParams,
) -> Result<ListReport, StoreError> {
    let filter = RecordFilter::from_params(&params);
    let customers = store.find(&filter).await?;
    tracing::debug!(count = customers.len(), ?filter, "fetched customer records");

    let averages = stats::averages(&customers);
    let chart_data = series::build_chart(&customers);

    Ok(ListReport {
        customers,
        averages,
        chart_data,
        params,
    })
}

pub fn build_markdown(report: &ListReport) -> String {
    let mut output = String::new();
    let params = &report.params;

    let _ = writeln!(output, "# Customer Metrics Report");
    let _ = writeln!(
        output,
        "Method: {} / Customer: {} / Months: {} to {}",
        params.recruitment_method.as_deref().unwrap_or("any"),
        params.customer_name.as_deref().unwrap_or("any"),
        params.start_date.as_deref().unwrap_or("earliest"),
        params.end_date.as_deref().unwrap_or("latest"),
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Averages ({} records)", report.customers.len());

    let avg = &report.averages;
    let _ = writeln!(output, "- Monthly fee: {}", format_decimal(avg.monthly_fee));
    let _ = writeln!(output, "- Applications: {}", format_decimal(avg.monthly_applications));
    let _ = writeln!(output, "- Registrations: {}", format_decimal(avg.monthly_registrations));
    let _ = writeln!(output, "- Placements: {}", format_decimal(avg.monthly_placements));
    let _ = writeln!(
        output,
        "- Application unit price: {}",
        format_decimal(avg.application_unit_price)
    );
    let _ = writeln!(
        output,
        "- Registration unit price: {}",
        format_decimal(avg.registration_unit_price)
    );
    let _ = writeln!(
        output,
        "- Placement unit price: {}",
        format_decimal(avg.placement_unit_price)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trends");

    match &report.chart_data {
        None => {
            let _ = writeln!(output, "No records match these filters.");
        }
        Some(chart) => {
            for dataset in &chart.datasets {
                let _ = writeln!(output);
                let _ = writeln!(output, "### {}", dataset.label);
                let _ = writeln!(
                    output,
                    "| Month | Applications | Registrations | Placements | Per application | Per registration | Per placement |"
                );
                let _ = writeln!(output, "|---|---:|---:|---:|---:|---:|---:|");
                for (i, label) in chart.labels.iter().enumerate() {
                    let _ = writeln!(
                        output,
                        "| {} | {} | {} | {} | {} | {} | {} |",
                        label,
                        format_integer(dataset.monthly_applications[i]),
                        format_integer(dataset.monthly_registrations[i]),
                        format_integer(dataset.monthly_placements[i]),
                        format_decimal(dataset.application_unit_price[i]),
                        format_decimal(dataset.registration_unit_price[i]),
                        format_decimal(dataset.placement_unit_price[i]),
                    );
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Records");

    if report.customers.is_empty() {
        let _ = writeln!(output, "No records match these filters.");
    } else {
        for record in &report.customers {
            let _ = writeln!(
                output,
                "- {} {}: fee {}, {} applications, {} registrations, {} placements",
                month::label(record.year_month),
                record.group_label(),
                format_integer(record.monthly_fee),
                format_integer(record.monthly_applications),
                format_integer(record.monthly_registrations),
                format_integer(record.monthly_placements),
            );
        }
    }

    output
}
