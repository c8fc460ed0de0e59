use crate::endpoints::{CURRENT_USER, Period, weight::GetWeightLogs};
use chrono::NaiveDate;

pub struct WeightRepository {
    user_id: String,
}

impl Default for WeightRepository {
    fn default() -> Self {
        Self {
            user_id: CURRENT_USER.to_string(),
        }
    }
}

impl WeightRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn logs(&self, base_date: NaiveDate, period: Period) -> GetWeightLogs {
        GetWeightLogs::new(base_date, period).user_id(self.user_id.clone())
    }
}
