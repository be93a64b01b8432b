//! Weekday marker resolution (`tpl-weekday-txt`, `tpl-weekday-img`).
//!
//! A custom [`WeekDay`] record supplies text and an image for a day. When no
//! active record exists for the date, the text falls back to the fixed
//! day-name table and the image marker is left unresolved.

use chrono::{Datelike, NaiveDate, Weekday};
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::weekday::{day_number, WeekDay, WEEK_DAYS};
use crate::services::storage::AssetStore;
use crate::services::template::{Marker, MarkerValue, TemplateContext};

/// Default (non-customised) name for a weekday.
pub fn default_day_name(weekday: Weekday) -> &'static str {
    WEEK_DAYS[weekday.num_days_from_sunday() as usize]
}

/// Upper-cased display text for `date`.
///
/// Custom record text wins, then the record's default day name, then the
/// fallback table entry for the date itself.
pub fn weekday_text(date: NaiveDate, record: Option<&WeekDay>) -> String {
    if let Some(record) = record {
        if let Some(text) = record.formatted_text() {
            return text;
        }
        if let Some(name) = record.day_name() {
            return name.to_uppercase();
        }
    }
    default_day_name(date.weekday()).to_uppercase()
}

/// Context entries for the weekday markers.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekdayMarkers {
    pub text: String,
    pub image: Option<MarkerValue>,
}

impl WeekdayMarkers {
    pub fn into_context(self) -> TemplateContext {
        let mut context = TemplateContext::new();
        context.insert(Marker::WeekdayText, MarkerValue::Text(self.text));
        if let Some(image) = self.image {
            context.insert(Marker::WeekdayImage, image);
        }
        context
    }
}

/// Resolve both weekday markers for `date`.
///
/// Missing or unreadable image files degrade to a blank inline reference;
/// they never fail the render.
pub fn resolve_markers(
    date: NaiveDate,
    record: Option<&WeekDay>,
    store: &dyn AssetStore,
    public_base_url: &str,
) -> WeekdayMarkers {
    let text = weekday_text(date, record);

    let Some(record) = record else {
        tracing::warn!(
            date = %date,
            fallback = %text,
            "No weekday record for date, using default day name"
        );
        return WeekdayMarkers { text, image: None };
    };

    let image = match (record.image.as_deref(), record.image_url(public_base_url)) {
        (Some(path), Some(url)) => Some(MarkerValue::Image {
            url,
            inline: Some(inline_image(store, path)),
        }),
        _ => {
            tracing::debug!(weekday_id = record.id, "Weekday record has no image");
            None
        }
    };

    WeekdayMarkers { text, image }
}

/// Data URI for a stored image, or an empty reference when unavailable.
fn inline_image(store: &dyn AssetStore, path: &str) -> String {
    match store.read(path) {
        Ok(Some(asset)) => asset.data_uri(),
        Ok(None) => {
            tracing::warn!(path, "Weekday image not found in storage");
            String::new()
        }
        Err(e) => {
            tracing::error!(path, error = %e, "Weekday image could not be read");
            String::new()
        }
    }
}

/// `<img>` tag for the day's image, or an empty string when there is none.
pub fn weekday_image_html(
    record: Option<&WeekDay>,
    attributes: &[(&str, &str)],
    public_base_url: &str,
) -> String {
    let Some(record) = record else {
        return String::new();
    };
    let Some(url) = record.image_url(public_base_url) else {
        return String::new();
    };

    let alt = record.day_name().unwrap_or("");
    let extra: String = attributes
        .iter()
        .map(|(key, value)| format!(" {key}=\"{value}\""))
        .collect();

    format!("<img src=\"{url}\" alt=\"{alt}\"{extra}>")
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Fetch the active weekday record for the day of `date`.
pub async fn find_active_for_date(
    pool: &PgPool,
    date: NaiveDate,
) -> Result<Option<WeekDay>, AppError> {
    let record = sqlx::query_as::<_, WeekDay>(
        "SELECT * FROM week_days WHERE day_number = $1 AND is_active = true ORDER BY id LIMIT 1",
    )
    .bind(day_number(date.weekday()))
    .fetch_optional(pool)
    .await?;

    tracing::debug!(
        date = %date,
        found = record.is_some(),
        "Weekday record lookup"
    );

    Ok(record)
}

/// Display text and `<img>` tag for `date`, reading the record from the database.
pub async fn display_for_date(
    pool: &PgPool,
    date: NaiveDate,
    public_base_url: &str,
) -> Result<(String, String), AppError> {
    let record = find_active_for_date(pool, date).await?;
    let text = weekday_text(date, record.as_ref());
    let image_html = weekday_image_html(record.as_ref(), &[("class", "weekday-img")], public_base_url);
    Ok((text, image_html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::{Asset, StorageError};
    use chrono::Utc;
    use std::collections::HashMap;

    /// In-memory asset store; paths listed in `broken` fail to read.
    #[derive(Default)]
    struct MemoryStore {
        assets: HashMap<String, Asset>,
        broken: Vec<String>,
    }

    impl AssetStore for MemoryStore {
        fn read(&self, path: &str) -> Result<Option<Asset>, StorageError> {
            if self.broken.iter().any(|b| b == path) {
                return Err(StorageError::Read {
                    path: path.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                });
            }
            Ok(self.assets.get(path).cloned())
        }
    }

    fn record(day: i16, text: Option<&str>, image: Option<&str>) -> WeekDay {
        let now = Utc::now();
        WeekDay {
            id: 10,
            day_number: day,
            image: image.map(str::to_string),
            text_value: text.map(str::to_string),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const BASE: &str = "https://g.local";

    #[test]
    fn sunday_without_record_uses_fallback_upper_case() {
        // 2024-01-07 is a Sunday.
        assert_eq!(weekday_text(date(2024, 1, 7), None), "DOMINGO");
    }

    #[test]
    fn fallback_covers_all_seven_days() {
        let expected = [
            "DOMINGO",
            "SEGUNDA-FEIRA",
            "TERÇA-FEIRA",
            "QUARTA-FEIRA",
            "QUINTA-FEIRA",
            "SEXTA-FEIRA",
            "SÁBADO",
        ];
        for (offset, name) in expected.iter().enumerate() {
            let day = date(2024, 1, 7 + offset as u32);
            assert_eq!(&weekday_text(day, None), name);
        }
    }

    #[test]
    fn custom_text_wins_over_default_name() {
        let r = record(1, Some("dia verde"), None);
        assert_eq!(weekday_text(date(2024, 1, 8), Some(&r)), "DIA VERDE");
    }

    #[test]
    fn record_without_text_uses_its_day_name() {
        let r = record(1, None, None);
        assert_eq!(weekday_text(date(2024, 1, 8), Some(&r)), "SEGUNDA-FEIRA");
    }

    #[test]
    fn no_record_leaves_image_marker_unresolved() {
        let markers = resolve_markers(date(2024, 1, 7), None, &MemoryStore::default(), BASE);
        assert_eq!(markers.text, "DOMINGO");
        assert!(markers.image.is_none());

        let context = markers.into_context();
        assert!(context.get_marker(&Marker::WeekdayImage).is_none());
        assert_eq!(
            context.get_marker(&Marker::WeekdayText),
            Some(&MarkerValue::Text("DOMINGO".to_string()))
        );
    }

    #[test]
    fn stored_image_is_inlined_as_data_uri() {
        let mut store = MemoryStore::default();
        store.assets.insert(
            "weekdays/sun.png".to_string(),
            Asset {
                bytes: vec![1, 2, 3],
                mime: "image/png",
            },
        );
        let r = record(0, None, Some("weekdays/sun.png"));
        let markers = resolve_markers(date(2024, 1, 7), Some(&r), &store, BASE);
        assert_eq!(
            markers.image,
            Some(MarkerValue::Image {
                url: "https://g.local/weekday-image/sun.png".to_string(),
                inline: Some("data:image/png;base64,AQID".to_string()),
            })
        );
    }

    #[test]
    fn missing_image_file_degrades_to_blank_reference() {
        let r = record(0, None, Some("weekdays/gone.png"));
        let markers = resolve_markers(date(2024, 1, 7), Some(&r), &MemoryStore::default(), BASE);
        assert_eq!(
            markers.image,
            Some(MarkerValue::Image {
                url: "https://g.local/weekday-image/gone.png".to_string(),
                inline: Some(String::new()),
            })
        );
    }

    #[test]
    fn unreadable_image_file_degrades_to_blank_reference() {
        let store = MemoryStore {
            broken: vec!["weekdays/sun.png".to_string()],
            ..Default::default()
        };
        let r = record(0, Some("domingo"), Some("weekdays/sun.png"));
        let markers = resolve_markers(date(2024, 1, 7), Some(&r), &store, BASE);
        assert_eq!(markers.text, "DOMINGO");
        assert!(matches!(
            markers.image,
            Some(MarkerValue::Image { inline: Some(ref s), .. }) if s.is_empty()
        ));
    }

    #[test]
    fn image_html_includes_attributes() {
        let r = record(6, None, Some("weekdays/sat.png"));
        let html = weekday_image_html(Some(&r), &[("width", "80"), ("class", "day")], BASE);
        assert_eq!(
            html,
            "<img src=\"https://g.local/weekday-image/sat.png\" alt=\"Sábado\" width=\"80\" class=\"day\">"
        );
        assert_eq!(weekday_image_html(None, &[], BASE), "");
        assert_eq!(weekday_image_html(Some(&record(6, None, None)), &[], BASE), "");
    }
}
