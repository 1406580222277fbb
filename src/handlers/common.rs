use crate::{errors::ApiError, services::boq::MAX_PRICE_WINDOW_DAYS};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Optional trailing window for actual price statistics.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PriceWindowParams {
    pub window_days: Option<i64>,
}

impl PriceWindowParams {
    pub fn window(&self) -> Result<Option<Duration>, ApiError> {
        let out_of_range = || {
            ApiError::BadRequest(format!(
                "window_days must be between 1 and {}",
                MAX_PRICE_WINDOW_DAYS
            ))
        };
        match self.window_days {
            Some(days) if !(1..=MAX_PRICE_WINDOW_DAYS).contains(&days) => Err(out_of_range()),
            Some(days) => Duration::try_days(days).map(Some).ok_or_else(out_of_range),
            None => Ok(None),
        }
    }
}
