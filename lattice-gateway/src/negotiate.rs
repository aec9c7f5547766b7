//! Bidirectional content negotiation.
//!
//! The output side ranks the Accept header against a registry of emitters;
//! the input side matches the Content-Type header against a fixed table of
//! decoders. Both directions report their misses as 406 — this API has
//! always answered unsupported request media types with 406 rather than 415,
//! and existing clients depend on it.

use std::sync::Arc;

use serde_json::{Map, Value};

use lattice_core::{Envelope, GatewayError};

pub const MEDIA_JSON: &str = "application/json";
pub const MEDIA_YAML: &str = "application/x-yaml";
pub const MEDIA_YAML_ALT: &str = "text/yaml";
pub const MEDIA_HTML: &str = "text/html";
pub const MEDIA_FORM: &str = "application/x-www-form-urlencoded";

/// A named wire serialization of the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    Yaml,
}

type RenderFn = dyn Fn(&Envelope) -> Result<String, GatewayError> + Send + Sync;

/// How a negotiated media type turns an envelope into a body.
///
/// Routes that serve HTML install a one-off [`Emitter::Renderer`] for a
/// single response; everything else goes through a named format.
#[derive(Clone)]
pub enum Emitter {
    Format(WireFormat),
    Renderer(Arc<RenderFn>),
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Format(fmt) => f.debug_tuple("Format").field(fmt).finish(),
            Self::Renderer(_) => f.debug_tuple("Renderer").field(&"<fn>").finish(),
        }
    }
}

impl Emitter {
    pub fn renderer(f: impl Fn(&Envelope) -> Result<String, GatewayError> + Send + Sync + 'static) -> Self {
        Self::Renderer(Arc::new(f))
    }

    /// Serialize an envelope for the wire.
    pub fn emit(&self, envelope: &Envelope) -> Result<String, GatewayError> {
        match self {
            Self::Format(WireFormat::Json) => serde_json::to_string(envelope)
                .map_err(|e| GatewayError::Internal(format!("json serialization failed: {e}"))),
            Self::Format(WireFormat::Yaml) => serde_yml::to_string(envelope)
                .map_err(|e| GatewayError::Internal(format!("yaml serialization failed: {e}"))),
            Self::Renderer(render) => render(envelope),
        }
    }
}

/// Ordered media-type → emitter table.
///
/// The standard table is built once at startup and shared read-only; a route
/// that needs a request-scoped entry clones the table and inserts into the
/// clone. Registration order breaks ties for wildcard Accept items.
#[derive(Clone)]
pub struct OutputRegistry {
    entries: Vec<(&'static str, Emitter)>,
}

impl OutputRegistry {
    /// The process-wide defaults: JSON first, then YAML.
    pub fn standard() -> Self {
        Self {
            entries: vec![
                (MEDIA_JSON, Emitter::Format(WireFormat::Json)),
                (MEDIA_YAML, Emitter::Format(WireFormat::Yaml)),
            ],
        }
    }

    /// Insert or replace an entry.
    pub fn set(&mut self, media_type: &'static str, emitter: Emitter) {
        if let Some(slot) = self.entries.iter_mut().find(|(mt, _)| *mt == media_type) {
            slot.1 = emitter;
        } else {
            self.entries.push((media_type, emitter));
        }
    }

    fn entries(&self) -> &[(&'static str, Emitter)] {
        &self.entries
    }
}

/// One ranked item out of an Accept header.
#[derive(Debug)]
struct Preference {
    main: String,
    sub: String,
    quality: f32,
    specificity: u8,
    position: usize,
}

impl Preference {
    fn wildcard() -> Self {
        Self {
            main: "*".into(),
            sub: "*".into(),
            quality: 1.0,
            specificity: 0,
            position: 0,
        }
    }

    fn matches(&self, media_type: &str) -> bool {
        let Some((main, sub)) = media_type.split_once('/') else {
            return false;
        };
        (self.main == "*" || self.main == main) && (self.sub == "*" || self.sub == sub)
    }
}

fn parse_accept(header: &str) -> Vec<Preference> {
    let mut preferences = Vec::new();
    for (position, item) in header.split(',').enumerate() {
        let mut parts = item.split(';');
        let Some(media) = parts.next() else { continue };
        let media = media.trim().to_ascii_lowercase();
        let Some((main, sub)) = media.split_once('/') else {
            continue;
        };

        let mut quality = 1.0f32;
        for param in parts {
            if let Some((name, value)) = param.split_once('=') {
                if name.trim().eq_ignore_ascii_case("q") {
                    quality = value.trim().parse().unwrap_or(1.0);
                }
            }
        }

        let specificity = match (main, sub) {
            ("*", _) => 0,
            (_, "*") => 1,
            _ => 2,
        };
        preferences.push(Preference {
            main: main.to_string(),
            sub: sub.to_string(),
            quality,
            specificity,
            position,
        });
    }

    preferences.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.specificity.cmp(&a.specificity))
            .then(a.position.cmp(&b.position))
    });
    preferences
}

/// Pick the best registered emitter for an Accept header.
///
/// A missing header behaves like `*/*`. Preferences are ranked by quality,
/// then specificity, then header order; within one preference the registry
/// order decides. No satisfiable preference fails with `NotAcceptable`, on
/// the error path as much as on the success path.
pub fn select_output<'r>(
    accept: Option<&str>,
    registry: &'r OutputRegistry,
) -> Result<(&'static str, &'r Emitter), GatewayError> {
    let preferences = match accept {
        Some(header) => {
            let mut parsed = parse_accept(header);
            if parsed.is_empty() {
                // Nothing parseable; be liberal and treat it as "anything".
                vec![Preference::wildcard()]
            } else {
                // q=0 means "never this one". An item kept through parsing
                // but excluded here still counts as a stated preference, so
                // a header naming only q=0 types matches nothing.
                parsed.retain(|preference| preference.quality > 0.0);
                parsed
            }
        }
        None => vec![Preference::wildcard()],
    };

    for preference in &preferences {
        for (media_type, emitter) in registry.entries() {
            if preference.matches(media_type) {
                return Ok((*media_type, emitter));
            }
        }
    }

    Err(GatewayError::NotAcceptable)
}

/// A request-body decoder: raw bytes to a field mapping.
pub type Decoder = fn(&[u8]) -> Result<Map<String, Value>, GatewayError>;

/// Pick the decoder for a Content-Type header.
///
/// Parameters (`; charset=...`) are ignored. A missing header decodes as a
/// form, which is what clients that never set one are sending. Anything
/// unregistered is rejected.
pub fn select_input(content_type: Option<&str>) -> Result<Decoder, GatewayError> {
    let media = content_type
        .unwrap_or(MEDIA_FORM)
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match media.as_str() {
        MEDIA_JSON => Ok(decode_json),
        MEDIA_YAML | MEDIA_YAML_ALT => Ok(decode_yaml),
        MEDIA_FORM => Ok(decode_form),
        _ => Err(GatewayError::UnsupportedMediaType),
    }
}

fn decode_json(body: &[u8]) -> Result<Map<String, Value>, GatewayError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| GatewayError::MalformedBatch(format!("invalid json body: {e}")))?;
    require_mapping(value)
}

fn decode_yaml(body: &[u8]) -> Result<Map<String, Value>, GatewayError> {
    let value: Value = serde_yml::from_slice(body)
        .map_err(|e| GatewayError::MalformedBatch(format!("invalid yaml body: {e}")))?;
    require_mapping(value)
}

/// Form fields: a repeated key collects into a list, a single key stays a
/// scalar. All form values are strings.
fn decode_form(body: &[u8]) -> Result<Map<String, Value>, GatewayError> {
    let mut fields = Map::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        let value = Value::String(value.into_owned());
        match fields.entry(key.into_owned()) {
            serde_json::map::Entry::Vacant(slot) => {
                slot.insert(value);
            }
            serde_json::map::Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Array(items) => items.push(value),
                scalar => {
                    let first = scalar.take();
                    *scalar = Value::Array(vec![first, value]);
                }
            },
        }
    }
    Ok(fields)
}

fn require_mapping(value: Value) -> Result<Map<String, Value>, GatewayError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(GatewayError::MalformedBatch(format!(
            "request body must be a mapping, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn selected(accept: Option<&str>, registry: &OutputRegistry) -> &'static str {
        select_output(accept, registry).expect("a match").0
    }

    fn with_html() -> OutputRegistry {
        let mut registry = OutputRegistry::standard();
        registry.set(MEDIA_HTML, Emitter::renderer(|_| Ok("<html>".into())));
        registry
    }

    #[test]
    fn missing_accept_header_gets_the_first_registered_type() {
        assert_eq!(selected(None, &OutputRegistry::standard()), MEDIA_JSON);
    }

    #[test]
    fn exact_match_wins() {
        let registry = OutputRegistry::standard();
        assert_eq!(selected(Some("application/x-yaml"), &registry), MEDIA_YAML);
        assert_eq!(selected(Some("application/json"), &registry), MEDIA_JSON);
    }

    #[test]
    fn quality_ranks_preferences() {
        let registry = OutputRegistry::standard();
        assert_eq!(
            selected(Some("application/x-yaml;q=0.9, application/json"), &registry),
            MEDIA_JSON
        );
        assert_eq!(
            selected(Some("application/json;q=0.1, application/x-yaml;q=0.9"), &registry),
            MEDIA_YAML
        );
    }

    #[test]
    fn exact_beats_wildcard_at_equal_quality() {
        let registry = OutputRegistry::standard();
        assert_eq!(selected(Some("*/*, application/x-yaml"), &registry), MEDIA_YAML);
    }

    #[test]
    fn wildcard_falls_back_to_registration_order() {
        let registry = OutputRegistry::standard();
        assert_eq!(selected(Some("*/*"), &registry), MEDIA_JSON);
        assert_eq!(selected(Some("application/*"), &registry), MEDIA_JSON);
    }

    #[test]
    fn zero_quality_excludes_a_type() {
        let registry = OutputRegistry::standard();
        assert_eq!(
            selected(Some("application/json;q=0, application/x-yaml"), &registry),
            MEDIA_YAML
        );
        let err = select_output(Some("application/json;q=0"), &registry).unwrap_err();
        assert!(matches!(err, GatewayError::NotAcceptable));
    }

    #[test]
    fn unsatisfiable_accept_is_not_acceptable() {
        let registry = OutputRegistry::standard();
        let err = select_output(Some("text/html"), &registry).unwrap_err();
        assert!(matches!(err, GatewayError::NotAcceptable));
    }

    #[test]
    fn request_scoped_html_entry_satisfies_browsers() {
        let registry = with_html();
        assert_eq!(selected(Some("text/html"), &registry), MEDIA_HTML);
        // A browser-ish header still prefers the renderer it asked for.
        assert_eq!(
            selected(Some("text/html,application/xhtml+xml,*/*;q=0.8"), &registry),
            MEDIA_HTML
        );
        // The shared table is untouched by the request-scoped clone.
        let err = select_output(Some("text/html"), &OutputRegistry::standard()).unwrap_err();
        assert!(matches!(err, GatewayError::NotAcceptable));
    }

    #[test]
    fn emitters_serialize_the_envelope() {
        let envelope = Envelope::notice(200, "Welcome");
        let json = Emitter::Format(WireFormat::Json).emit(&envelope).unwrap();
        assert_eq!(json, r#"{"status":200,"message":"Welcome"}"#);

        let yaml = Emitter::Format(WireFormat::Yaml).emit(&envelope).unwrap();
        assert!(yaml.contains("status: 200"), "yaml was: {yaml}");
        assert!(yaml.contains("message: Welcome"), "yaml was: {yaml}");
    }

    #[test]
    fn select_input_matches_with_parameters() {
        assert!(select_input(Some("application/json; charset=utf-8")).is_ok());
        assert!(select_input(Some("Application/JSON")).is_ok());
        assert!(select_input(Some("text/yaml")).is_ok());
        assert!(select_input(Some("application/x-yaml")).is_ok());
        assert!(select_input(Some("application/x-www-form-urlencoded")).is_ok());
    }

    #[test]
    fn select_input_rejects_unregistered_types() {
        let err = select_input(Some("text/xml")).unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedMediaType));
    }

    #[test]
    fn missing_content_type_decodes_as_form() {
        let decoder = select_input(None).unwrap();
        let fields = decoder(b"fun=test.ping&client=local").unwrap();
        assert_eq!(fields["fun"], json!("test.ping"));
        assert_eq!(fields["client"], json!("local"));
    }

    #[test]
    fn repeated_form_keys_collect_into_a_list() {
        let fields = decode_form(b"fun=test.ping&arg=a&arg=b&arg=c").unwrap();
        assert_eq!(fields["fun"], json!("test.ping"));
        assert_eq!(fields["arg"], json!(["a", "b", "c"]));
    }

    #[test]
    fn empty_form_value_is_an_empty_string() {
        let fields = decode_form(b"fun=test.ping&arg").unwrap();
        assert_eq!(fields["arg"], json!(""));
    }

    #[test]
    fn json_body_decodes_to_fields() {
        let fields = decode_json(br#"{"fun":"test.ping","arg":["a","b"]}"#).unwrap();
        assert_eq!(fields["arg"], json!(["a", "b"]));
    }

    #[test]
    fn non_mapping_bodies_are_malformed() {
        assert!(matches!(
            decode_json(br#"["not", "a", "mapping"]"#).unwrap_err(),
            GatewayError::MalformedBatch(_)
        ));
        assert!(matches!(
            decode_yaml(b"- just\n- a\n- list\n").unwrap_err(),
            GatewayError::MalformedBatch(_)
        ));
    }

    #[test]
    fn yaml_body_decodes_to_fields() {
        let fields = decode_yaml(b"fun: test.ping\nclient: local\n").unwrap();
        assert_eq!(fields["fun"], json!("test.ping"));
        assert_eq!(fields["client"], json!("local"));
    }
}
