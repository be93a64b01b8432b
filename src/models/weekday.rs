//! Per-weekday customisation (text and image) used by template markers.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Default day names, indexed from Sunday (0) to Saturday (6).
pub const WEEK_DAYS: [&str; 7] = [
    "Domingo",
    "Segunda-feira",
    "Terça-feira",
    "Quarta-feira",
    "Quinta-feira",
    "Sexta-feira",
    "Sábado",
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WeekDay {
    pub id: i64,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_number: i16,
    /// Storage path of the day's image, relative to the public disk.
    pub image: Option<String>,
    pub text_value: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeekDay {
    /// Default name for this record's day, or `None` for an out-of-range number.
    pub fn day_name(&self) -> Option<&'static str> {
        usize::try_from(self.day_number)
            .ok()
            .and_then(|n| WEEK_DAYS.get(n).copied())
    }

    /// Custom text upper-cased, if any.
    pub fn formatted_text(&self) -> Option<String> {
        self.text_value
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(str::to_uppercase)
    }

    /// Public URL of the day's image.
    pub fn image_url(&self, public_base_url: &str) -> Option<String> {
        let image = self.image.as_deref().filter(|i| !i.is_empty())?;
        let filename = image.rsplit('/').next().unwrap_or(image);
        Some(format!(
            "{}/weekday-image/{filename}",
            public_base_url.trim_end_matches('/')
        ))
    }
}

/// Day number (Sunday = 0) for a chrono weekday.
pub fn day_number(weekday: Weekday) -> i16 {
    weekday.num_days_from_sunday() as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(day_number: i16) -> WeekDay {
        let now = Utc::now();
        WeekDay {
            id: 1,
            day_number,
            image: Some("weekdays/monday.png".to_string()),
            text_value: Some("segunda verde".to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn day_number_starts_on_sunday() {
        assert_eq!(day_number(Weekday::Sun), 0);
        assert_eq!(day_number(Weekday::Mon), 1);
        assert_eq!(day_number(Weekday::Sat), 6);
    }

    #[test]
    fn day_name_out_of_range_is_none() {
        assert_eq!(record(1).day_name(), Some("Segunda-feira"));
        assert_eq!(record(7).day_name(), None);
        assert_eq!(record(-1).day_name(), None);
    }

    #[test]
    fn formatted_text_is_upper_case() {
        assert_eq!(
            record(1).formatted_text().as_deref(),
            Some("SEGUNDA VERDE")
        );
        let mut r = record(1);
        r.text_value = Some(String::new());
        assert_eq!(r.formatted_text(), None);
    }

    #[test]
    fn image_url_uses_basename() {
        assert_eq!(
            record(1).image_url("https://guardian.local/").as_deref(),
            Some("https://guardian.local/weekday-image/monday.png")
        );
        let mut r = record(1);
        r.image = None;
        assert_eq!(r.image_url("https://guardian.local"), None);
    }
}
