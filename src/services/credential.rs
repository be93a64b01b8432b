//! Credential (badge) rendering from stored HTML templates.

use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::services::storage::AssetStore;
use crate::services::template::{RenderReport, TemplateContext, TemplateRenderer};

/// Rendered credential HTML, ready for the external print/PDF step.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedCredential {
    pub template: String,
    pub html: String,
    pub replaced: Vec<String>,
    pub unresolved: Vec<String>,
}

/// Template directory name from a configured template reference.
///
/// `badges/visitor.html` and `visitor` both resolve to `visitor`.
pub fn template_slug(template: &str) -> Option<&str> {
    let file = template.rsplit(['/', '\\']).next().unwrap_or(template);
    let slug = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    let slug = slug.trim();
    (!slug.is_empty() && slug != "..").then_some(slug)
}

/// Flatten a visitor JSON object into field markers.
///
/// Nested keys are joined with `.` (`destination.name`), array items by
/// index. Nulls are skipped so their markers stay unresolved.
pub fn visitor_context(value: &Value) -> TemplateContext {
    let mut context = TemplateContext::new();
    flatten_into(&mut context, None, value);
    context
}

fn flatten_into(context: &mut TemplateContext, prefix: Option<&str>, value: &Value) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                let path = join_key(prefix, key);
                flatten_into(context, Some(&path), child);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let path = join_key(prefix, &index.to_string());
                flatten_into(context, Some(&path), child);
            }
        }
        Value::String(text) => {
            if let Some(key) = prefix {
                context.insert_text(key, text.as_str());
            }
        }
        Value::Bool(_) | Value::Number(_) => {
            if let Some(key) = prefix {
                context.insert_text(key, value.to_string());
            }
        }
    }
}

fn join_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}.{key}"),
        None => key.to_string(),
    }
}

/// Load `templates/{slug}/index.html` and substitute visitor and weekday markers.
pub fn render_credential(
    store: &dyn AssetStore,
    template: &str,
    visitor: TemplateContext,
    weekday: TemplateContext,
    public_base_url: &str,
) -> Result<RenderedCredential, AppError> {
    let slug = template_slug(template)
        .ok_or_else(|| AppError::Validation(format!("Invalid template name: {template}")))?;
    let path = format!("templates/{slug}/index.html");

    let html = store
        .read_text(&path)
        .map_err(|e| AppError::Internal(format!("Failed to load template {slug}: {e}")))?
        .ok_or_else(|| {
            tracing::error!(template = slug, path = %path, "Credential template not found");
            AppError::NotFound(format!("Template not found: {slug}"))
        })?;

    let mut context = visitor;
    context.extend(weekday);

    let RenderReport {
        output,
        replaced,
        unresolved,
    } = TemplateRenderer::new()
        .with_base_url(public_base_url)
        .render_with_report(&html, &context);

    tracing::info!(
        template = slug,
        replaced = replaced.len(),
        unresolved = unresolved.len(),
        "Credential rendered"
    );

    Ok(RenderedCredential {
        template: slug.to_string(),
        html: output,
        replaced,
        unresolved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::LocalDiskStore;
    use crate::services::template::{Marker, MarkerValue};
    use serde_json::json;

    fn store_with(slug: &str, html: &str) -> (tempfile::TempDir, LocalDiskStore) {
        let dir = tempfile::tempdir().unwrap();
        let template_dir = dir.path().join("templates").join(slug);
        std::fs::create_dir_all(&template_dir).unwrap();
        std::fs::write(template_dir.join("index.html"), html).unwrap();
        let store = LocalDiskStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn slug_strips_directory_and_extension() {
        assert_eq!(template_slug("badges/visitor.html"), Some("visitor"));
        assert_eq!(template_slug("visitor"), Some("visitor"));
        assert_eq!(template_slug(""), None);
        assert_eq!(template_slug("../"), None);
    }

    #[test]
    fn visitor_fields_are_flattened() {
        let ctx = visitor_context(&json!({
            "name": "Ana Souza",
            "id": 42,
            "has_restrictions": false,
            "photo": null,
            "destination": { "name": "Finance" },
            "tags": ["vip"]
        }));
        assert_eq!(ctx.get("name"), Some(&MarkerValue::text("Ana Souza")));
        assert_eq!(ctx.get("id"), Some(&MarkerValue::text("42")));
        assert_eq!(ctx.get("has_restrictions"), Some(&MarkerValue::text("false")));
        assert_eq!(ctx.get("destination.name"), Some(&MarkerValue::text("Finance")));
        assert_eq!(ctx.get("tags.0"), Some(&MarkerValue::text("vip")));
        assert!(ctx.get("photo").is_none());
    }

    #[test]
    fn renders_visitor_and_weekday_markers() {
        let (_dir, store) = store_with(
            "visitor",
            "<div class=\"tpl-name\">x</div><img class=\"tpl-photo\"><span>{tpl-weekday-txt}</span>",
        );
        let visitor = visitor_context(&json!({ "name": "Ana", "photo": "photos/ana.jpg" }));
        let mut weekday = TemplateContext::new();
        weekday.insert(Marker::WeekdayText, MarkerValue::text("DOMINGO"));

        let rendered =
            render_credential(&store, "visitor.html", visitor, weekday, "https://g.local").unwrap();

        assert_eq!(rendered.template, "visitor");
        assert!(rendered.html.contains("<div class=\"tpl-name\">Ana</div>"));
        assert!(rendered.html.contains("src=\"https://g.local/photos/ana.jpg\""));
        assert!(rendered.html.contains("<span>DOMINGO</span>"));
        assert!(rendered.unresolved.is_empty());
    }

    #[test]
    fn missing_template_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDiskStore::new(dir.path());
        let err = render_credential(
            &store,
            "ghost",
            TemplateContext::new(),
            TemplateContext::new(),
            "https://g.local",
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }
}
