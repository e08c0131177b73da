use crate::models::{Averages, CustomerRecord};

pub fn averages(records: &[CustomerRecord]) -> Averages {
    if records.is_empty() {
        return Averages::default();
    }

    // Wide enough that summing any number of i64 values cannot overflow.
    let mut fee = 0i128;
    let mut applications = 0i128;
    let mut registrations = 0i128;
    let mut placements = 0i128;
    let mut application_price = 0.0;
    let mut registration_price = 0.0;
    let mut placement_price = 0.0;

    for record in records {
        fee += i128::from(record.monthly_fee);
        applications += i128::from(record.monthly_applications);
        registrations += i128::from(record.monthly_registrations);
        placements += i128::from(record.monthly_placements);
        application_price += record.application_unit_price;
        registration_price += record.registration_unit_price;
        placement_price += record.placement_unit_price;
    }

    let count = records.len() as f64;
    Averages {
        monthly_fee: fee as f64 / count,
        monthly_applications: applications as f64 / count,
        monthly_registrations: registrations as f64 / count,
        monthly_placements: placements as f64 / count,
        application_unit_price: application_price / count,
        registration_unit_price: registration_price / count,
        placement_unit_price: placement_price / count,
    }
}
