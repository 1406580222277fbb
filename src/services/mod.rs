pub mod boq;
pub mod costing;
pub mod job_materials;
pub mod jobs;
pub mod materials;
pub mod projects;
pub mod supplier_prices;

use rust_decimal::Decimal;
use sea_orm::DbErr;
use tracing::error;
use validator::ValidationError;

use crate::errors::{constraint_violation, Constraint, ServiceError};

/// Maps a storage failure to `Internal`, logging it with the operation name.
pub(crate) fn db_failure(operation: &'static str) -> impl FnOnce(DbErr) -> ServiceError {
    move |err| {
        error!(operation, error = %err, "Database operation failed");
        ServiceError::db_error(operation, err)
    }
}

/// Translates known constraint violations into domain errors.
///
/// Anything that is not a unique or foreign-key violation stays `Internal`.
pub(crate) fn translate_write_error<U, F>(
    operation: &'static str,
    err: DbErr,
    on_unique: U,
    on_foreign_key: F,
) -> ServiceError
where
    U: FnOnce() -> ServiceError,
    F: FnOnce() -> ServiceError,
{
    match constraint_violation(&err) {
        Some(Constraint::Unique) => on_unique(),
        Some(Constraint::ForeignKey) => on_foreign_key(),
        None => db_failure(operation)(err),
    }
}

/// Fractional digits kept by the `Decimal(16, 4)` quantity and amount columns.
pub const STORED_DECIMAL_SCALE: u32 = 4;

/// Integer digits kept by the `Decimal(16, 4)` columns; values must stay below `10^12`.
pub const STORED_INTEGER_DIGITS: u32 = 12;

fn range_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Rejects values the quantity and amount columns would round or refuse.
fn validate_storable_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if value.normalize().scale() > STORED_DECIMAL_SCALE {
        return Err(range_error("scale", "At most 4 decimal places are allowed"));
    }
    let limit = Decimal::from(10_i64.pow(STORED_INTEGER_DIGITS));
    if value.abs() >= limit {
        return Err(range_error("range", "Must be less than 1000000000000"));
    }
    Ok(())
}

pub(crate) fn validate_positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(range_error("range", "Must be greater than 0"));
    }
    validate_storable_decimal(value)
}

pub(crate) fn validate_non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(range_error("range", "Must not be negative"));
    }
    validate_storable_decimal(value)
}

pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("Must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}
