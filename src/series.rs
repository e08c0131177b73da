use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::models::{ChartData, ChartDataset, CustomerRecord};
use crate::month;

/// Pivots flat monthly records into one dataset per `(method, customer)` group,
/// aligned to a shared ascending month axis.
///
/// Returns `None` for an empty record set. Datasets appear in the order their
/// group is first seen in `records`; months a group has no record for stay zero.
pub fn build_chart(records: &[CustomerRecord]) -> Option<ChartData> {
    if records.is_empty() {
        return None;
    }

    let months: BTreeSet<NaiveDate> = records
        .iter()
        .map(|record| month::first_of_month(record.year_month))
        .collect();
    let index: HashMap<NaiveDate, usize> = months
        .iter()
        .enumerate()
        .map(|(position, month)| (*month, position))
        .collect();
    let labels: Vec<String> = months.iter().copied().map(month::label).collect();

    let mut datasets: Vec<ChartDataset> = Vec::new();
    let mut by_group: HashMap<(&str, &str), usize> = HashMap::new();

    for record in records {
        let key = (
            record.recruitment_method.as_str(),
            record.customer_name.as_str(),
        );
        let slot = *by_group.entry(key).or_insert_with(|| {
            datasets.push(empty_dataset(record.group_label(), labels.len()));
            datasets.len() - 1
        });

        let Some(&position) = index.get(&month::first_of_month(record.year_month)) else {
            continue;
        };
        let dataset = &mut datasets[slot];
        dataset.monthly_applications[position] = record.monthly_applications;
        dataset.monthly_registrations[position] = record.monthly_registrations;
        dataset.monthly_placements[position] = record.monthly_placements;
        dataset.application_unit_price[position] = record.application_unit_price;
        dataset.registration_unit_price[position] = record.registration_unit_price;
        dataset.placement_unit_price[position] = record.placement_unit_price;
    }

    Some(ChartData { labels, datasets })
}

fn empty_dataset(label: String, len: usize) -> ChartDataset {
    ChartDataset {
        label,
        monthly_applications: vec![0; len],
        monthly_registrations: vec![0; len],
        monthly_placements: vec![0; len],
        application_unit_price: vec![0.0; len],
        registration_unit_price: vec![0.0; len],
        placement_unit_price: vec![0.0; len],
    }
}
