use super::{CURRENT_USER, Period};
use crate::macros::setter;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::Request;

// Common

/// One body-weight log entry. Measurements the scale did not take are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightRecord {
    pub date: NaiveDate,
    /// Local time of day on the user's device, no offset attached.
    pub time: NaiveTime,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub fat: Option<f64>,
    #[serde(default)]
    pub bmi: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
    pub log_id: u64,
}

// Requests

#[derive(Debug, Clone, Serialize)]
pub struct GetWeightLogs {
    user_id: String,
    base_date: NaiveDate,
    period: Period,
}

impl GetWeightLogs {
    pub fn new(base_date: NaiveDate, period: Period) -> Self {
        Self {
            user_id: CURRENT_USER.to_string(),
            base_date,
            period,
        }
    }

    setter!(user_id: String);
}

impl Request for GetWeightLogs {
    type Data = ();
    type Response = WeightLogsResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        format!(
            "/1/user/{}/body/log/weight/date/{}/{}.json",
            self.user_id,
            self.base_date.format("%Y-%m-%d"),
            self.period
        )
        .into()
    }
}

// Responses

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeightLogsResponse {
    #[serde(default)]
    pub weight: Vec<WeightRecord>,
}
