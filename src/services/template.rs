//! Template marker substitution for credentials and informational pages.
//!
//! Two marker styles are recognised:
//!
//! * inline tokens, `{tpl-name}` or `{{tpl-name}}`, replaced textually;
//! * tagged elements, any element whose `class` list carries `tpl-name`.
//!   Image-like elements get the value written into `src`; other elements
//!   have their children replaced by a single text node.
//!
//! Markers with no value in the [`TemplateContext`] are left verbatim.
//! Scanning is tolerant: malformed markup is passed through, never rejected.
//!
//! Both styles are resolved in one pass over the template. Inserted values
//! are never scanned again, so a value containing marker syntax stays literal.

use std::collections::BTreeMap;

use serde::Serialize;

/// Class and token prefix identifying a marker.
pub const MARKER_PREFIX: &str = "tpl-";

const WEEKDAY_TEXT: &str = "weekday-txt";
const WEEKDAY_IMAGE: &str = "weekday-img";

/// Elements that never have children.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose content is raw text and must not be scanned for tags.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

// ---------------------------------------------------------------------------
// Markers and context
// ---------------------------------------------------------------------------

/// Recognised marker kinds. Anything else is a free-form field marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    WeekdayText,
    WeekdayImage,
    Field(String),
}

impl Marker {
    pub fn name(&self) -> &str {
        match self {
            Self::WeekdayText => WEEKDAY_TEXT,
            Self::WeekdayImage => WEEKDAY_IMAGE,
            Self::Field(name) => name,
        }
    }
}

/// A resolved marker value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarkerValue {
    Text(String),
    /// Image reference. `url` is used by inline tokens; element `src`
    /// attributes prefer the `inline` data URI when one was resolved.
    Image { url: String, inline: Option<String> },
}

impl MarkerValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    fn token_text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Image { url, .. } => url,
        }
    }

    fn src(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Image { url, inline } => inline.as_deref().unwrap_or(url),
        }
    }

    fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// Marker name to value mapping for one render call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateContext {
    values: BTreeMap<String, MarkerValue>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, marker: Marker, value: MarkerValue) {
        self.values.insert(marker.name().to_string(), value);
    }

    pub fn insert_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .insert(name.into(), MarkerValue::Text(value.into()));
    }

    /// Merge `other` into this context; `other` wins on conflicts.
    pub fn extend(&mut self, other: TemplateContext) {
        self.values.extend(other.values);
    }

    pub fn get(&self, name: &str) -> Option<&MarkerValue> {
        self.values.get(name)
    }

    pub fn get_marker(&self, marker: &Marker) -> Option<&MarkerValue> {
        self.values.get(marker.name())
    }
}

impl FromIterator<(String, String)> for TemplateContext {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k, MarkerValue::Text(v)))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Output of a render call with diagnostics.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RenderReport {
    pub output: String,
    /// Marker names substituted, in first-seen order.
    pub replaced: Vec<String>,
    /// Marker names found in the template without a context value.
    pub unresolved: Vec<String>,
}

#[derive(Debug, Default)]
struct Diagnostics {
    replaced: Vec<String>,
    unresolved: Vec<String>,
}

impl Diagnostics {
    fn replaced(&mut self, name: &str) {
        if !self.replaced.iter().any(|n| n == name) {
            self.replaced.push(name.to_string());
        }
    }

    fn unresolved(&mut self, name: &str) {
        tracing::debug!(marker = name, "Template marker has no value, left untouched");
        if !self.unresolved.iter().any(|n| n == name) {
            self.unresolved.push(name.to_string());
        }
    }
}

/// Substitutes markers in templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    base_url: Option<String>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make relative `src` values written into elements absolute.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn render(&self, template: &str, context: &TemplateContext) -> String {
        self.render_with_report(template, context).output
    }

    pub fn render_with_report(&self, template: &str, context: &TemplateContext) -> RenderReport {
        let mut diagnostics = Diagnostics::default();

        let output = if template.contains(MARKER_PREFIX) {
            self.substitute(template, context, &mut diagnostics)
        } else {
            template.to_string()
        };

        tracing::debug!(
            template_size = template.len(),
            context_size = context.values.len(),
            output_size = output.len(),
            replaced = ?diagnostics.replaced,
            unresolved = ?diagnostics.unresolved,
            "Template rendered"
        );

        RenderReport {
            output,
            replaced: diagnostics.replaced,
            unresolved: diagnostics.unresolved,
        }
    }

    fn absolute_src(&self, src: &str) -> String {
        match &self.base_url {
            Some(base) if needs_base(src) => {
                format!("{base}/{}", src.trim_start_matches('/'))
            }
            _ => src.to_string(),
        }
    }

    /// Resolve tagged elements, running token substitution over every slice
    /// of `input` copied to the output. Inserted values are not rescanned.
    fn substitute(
        &self,
        input: &str,
        context: &TemplateContext,
        diagnostics: &mut Diagnostics,
    ) -> String {
        let mut out = String::with_capacity(input.len());
        let mut cursor = 0;

        while let Some(rel) = input[cursor..].find('<') {
            let lt = cursor + rel;

            if input[lt..].starts_with("<!--") {
                let end = input[lt..]
                    .find("-->")
                    .map_or(input.len(), |i| lt + i + 3);
                push_tokens(&mut out, &input[cursor..end], context, diagnostics);
                cursor = end;
                continue;
            }

            let Some(tag) = StartTag::parse(input, lt) else {
                push_tokens(&mut out, &input[cursor..=lt], context, diagnostics);
                cursor = lt + 1;
                continue;
            };

            push_tokens(&mut out, &input[cursor..lt], context, diagnostics);
            let resolved = resolve_tag_marker(&tag, context, diagnostics);

            let Some((name, value)) = resolved else {
                let mut end = tag.end;
                if RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) && !tag.self_closing {
                    end = find_close(input, tag.end, &tag.name).map_or(input.len(), |c| c.start);
                }
                push_tokens(&mut out, &input[lt..end], context, diagnostics);
                cursor = end;
                continue;
            };

            if tag.is_image_like() || value.is_image() {
                let src = self.absolute_src(value.src());
                let (head, inserted, tail) = tag.with_src(input, &src);
                push_tokens(&mut out, head, context, diagnostics);
                out.push_str(&inserted);
                push_tokens(&mut out, tail, context, diagnostics);
                diagnostics.replaced(name);
                cursor = tag.end;
                continue;
            }

            if tag.self_closing || VOID_ELEMENTS.contains(&tag.name.as_str()) {
                tracing::debug!(
                    marker = name,
                    element = %tag.name,
                    "Marker on element without content, left untouched"
                );
                push_tokens(&mut out, &input[lt..tag.end], context, diagnostics);
                cursor = tag.end;
                continue;
            }

            push_tokens(&mut out, &input[lt..tag.end], context, diagnostics);
            out.push_str(&escape_text(value.token_text()));
            diagnostics.replaced(name);

            cursor = match find_close(input, tag.end, &tag.name) {
                Some(close) => close.start,
                None => {
                    tracing::debug!(
                        marker = name,
                        element = %tag.name,
                        "Unclosed marker element, value inserted after start tag"
                    );
                    tag.end
                }
            };
        }

        push_tokens(&mut out, &input[cursor..], context, diagnostics);
        out
    }
}

/// Pick the first `tpl-` class on the tag that has a context value.
fn resolve_tag_marker<'a>(
    tag: &'a StartTag,
    context: &'a TemplateContext,
    diagnostics: &mut Diagnostics,
) -> Option<(&'a str, &'a MarkerValue)> {
    let names: Vec<&str> = tag.marker_names().collect();
    let found = names
        .iter()
        .find_map(|name| context.get(name).map(|value| (*name, value)));
    if found.is_none() {
        for name in &names {
            diagnostics.unresolved(name);
        }
    }
    found
}

fn needs_base(src: &str) -> bool {
    !(src.is_empty()
        || src.starts_with("http://")
        || src.starts_with("https://")
        || src.starts_with("data:")
        || src.starts_with("//"))
}

// ---------------------------------------------------------------------------
// Inline tokens
// ---------------------------------------------------------------------------

fn is_marker_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Append `input` to `out` with inline tokens replaced.
///
/// Callers split the template only next to `<` or `>`, which never occur
/// inside a token, so no token straddles two calls.
fn push_tokens(
    out: &mut String,
    input: &str,
    context: &TemplateContext,
    diagnostics: &mut Diagnostics,
) {
    const OPEN: &str = "{tpl-";

    let mut cursor = 0;

    while let Some(rel) = input[cursor..].find(OPEN) {
        let open = cursor + rel;
        let name_start = open + OPEN.len();
        let name_len = input[name_start..]
            .find(|c: char| !is_marker_char(c))
            .unwrap_or(input.len() - name_start);
        let name = &input[name_start..name_start + name_len];
        let after = &input[name_start + name_len..];
        let doubled = open > cursor && input.as_bytes()[open - 1] == b'{';

        let token = if name.is_empty() {
            None
        } else if doubled && after.starts_with("}}") {
            Some((open - 1, name_start + name_len + 2))
        } else if after.starts_with('}') {
            Some((open, name_start + name_len + 1))
        } else {
            None
        };

        let Some((start, end)) = token else {
            out.push_str(&input[cursor..name_start]);
            cursor = name_start;
            continue;
        };

        out.push_str(&input[cursor..start]);
        match context.get(name) {
            Some(value) => {
                out.push_str(value.token_text());
                diagnostics.replaced(name);
            }
            None => {
                out.push_str(&input[start..end]);
                diagnostics.unresolved(name);
            }
        }
        cursor = end;
    }

    out.push_str(&input[cursor..]);
}

// ---------------------------------------------------------------------------
// Tolerant start-tag scanning
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Attribute {
    name: String,
    value: Option<String>,
    /// Byte range of the value including quotes, when present.
    value_span: Option<(usize, usize)>,
    /// Byte offset just past the attribute name.
    name_end: usize,
}

#[derive(Debug)]
struct StartTag {
    name: String,
    start: usize,
    /// Byte offset just past `>`.
    end: usize,
    /// Byte offset just past the last attribute (or the tag name).
    attrs_end: usize,
    self_closing: bool,
    attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Copy)]
struct CloseTag {
    start: usize,
}

impl StartTag {
    /// Parse a start tag beginning at `lt` (which indexes a `<`).
    ///
    /// Returns `None` for anything that is not a well-terminated start tag.
    fn parse(input: &str, lt: usize) -> Option<Self> {
        let bytes = input.as_bytes();
        let mut i = lt + 1;
        if !bytes.get(i)?.is_ascii_alphabetic() {
            return None;
        }
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'-' | b':'))
        {
            i += 1;
        }
        let name = input[lt + 1..i].to_ascii_lowercase();
        let mut attrs_end = i;
        let mut attributes = Vec::new();

        loop {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match *bytes.get(i)? {
                b'>' => {
                    return Some(Self {
                        name,
                        start: lt,
                        end: i + 1,
                        attrs_end,
                        self_closing: false,
                        attributes,
                    });
                }
                b'/' if bytes.get(i + 1) == Some(&b'>') => {
                    return Some(Self {
                        name,
                        start: lt,
                        end: i + 2,
                        attrs_end,
                        self_closing: true,
                        attributes,
                    });
                }
                b'/' | b'"' | b'\'' | b'=' => {
                    i += 1;
                    continue;
                }
                b'<' => return None,
                _ => {}
            }

            let name_start = i;
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && !matches!(bytes[i], b'=' | b'>' | b'/' | b'<' | b'"' | b'\'')
            {
                i += 1;
            }
            let attr_name = input[name_start..i].to_ascii_lowercase();
            let name_end = i;

            let mut j = i;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }

            let (value, value_span) = if bytes.get(j) == Some(&b'=') {
                j += 1;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                match *bytes.get(j)? {
                    quote @ (b'"' | b'\'') => {
                        let close = j + 1 + input[j + 1..].find(quote as char)?;
                        let value = input[j + 1..close].to_string();
                        let span = (j, close + 1);
                        i = close + 1;
                        (Some(value), Some(span))
                    }
                    _ => {
                        let value_start = j;
                        while j < bytes.len() && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>'
                        {
                            j += 1;
                        }
                        i = j;
                        (
                            Some(input[value_start..j].to_string()),
                            Some((value_start, j)),
                        )
                    }
                }
            } else {
                (None, None)
            };

            attrs_end = i;
            attributes.push(Attribute {
                name: attr_name,
                value,
                value_span,
                name_end,
            });
        }
    }

    fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Marker names carried in the `class` attribute.
    fn marker_names(&self) -> impl Iterator<Item = &str> {
        self.attribute("class")
            .and_then(|a| a.value.as_deref())
            .unwrap_or("")
            .split_whitespace()
            .filter_map(|class| class.strip_prefix(MARKER_PREFIX))
            .filter(|name| !name.is_empty())
    }

    fn is_image_like(&self) -> bool {
        match self.name.as_str() {
            "img" | "image" => true,
            "input" => self
                .attribute("type")
                .and_then(|a| a.value.as_deref())
                .is_some_and(|t| t.eq_ignore_ascii_case("image")),
            _ => false,
        }
    }

    /// Original tag text split around a `src` value set to `src`:
    /// the text before, the quoted value to insert, and the text after.
    fn with_src<'a>(&self, input: &'a str, src: &str) -> (&'a str, String, &'a str) {
        let quoted = format!("\"{}\"", escape_attr(src));

        let (at, replace_to, insert) = match self.attribute("src") {
            Some(Attribute {
                value_span: Some((from, to)),
                ..
            }) => (*from, *to, quoted),
            Some(attr) => (attr.name_end, attr.name_end, format!("={quoted}")),
            None => (self.attrs_end, self.attrs_end, format!(" src={quoted}")),
        };

        (&input[self.start..at], insert, &input[replace_to..self.end])
    }
}

/// Find the close tag matching an element named `name` opened before `from`.
fn find_close(input: &str, from: usize, name: &str) -> Option<CloseTag> {
    let bytes = input.as_bytes();
    let mut depth = 1usize;
    let mut i = from;
    let raw_text = RAW_TEXT_ELEMENTS.contains(&name);

    while let Some(rel) = input[i..].find('<') {
        let lt = i + rel;
        let rest = &input[lt..];

        if !raw_text && rest.starts_with("<!--") {
            i = rest.find("-->").map_or(input.len(), |e| lt + e + 3);
            continue;
        }

        if rest.starts_with("</") && tag_name_at(bytes, lt + 2, name) {
            depth -= 1;
            if depth == 0 {
                return Some(CloseTag { start: lt });
            }
            i = lt + 2;
            continue;
        }

        if !raw_text && tag_name_at(bytes, lt + 1, name) {
            if let Some(tag) = StartTag::parse(input, lt) {
                if !tag.self_closing {
                    depth += 1;
                }
                i = tag.end;
                continue;
            }
        }

        i = lt + 1;
    }

    None
}

/// Whether `name` appears at `pos` as a complete tag name.
fn tag_name_at(bytes: &[u8], pos: usize, name: &str) -> bool {
    let end = pos + name.len();
    let Some(candidate) = bytes.get(pos..end) else {
        return false;
    };
    candidate.eq_ignore_ascii_case(name.as_bytes())
        && bytes
            .get(end)
            .map_or(true, |b| b.is_ascii_whitespace() || matches!(b, b'>' | b'/'))
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            other => out.push(other),
        }
    }
    out
}
