//! Request body validation.
//!
//! [`parse_request`] checks the whole JSON body and only then builds a
//! [`SynthesisRequest`], so no field is used before every field is known to
//! be well formed.

use std::fmt;

use serde_json::{Map, Value};

use crate::types::{GpuId, Numeric, ReferenceOptions, SynthesisOptions, SynthesisRequest};

/// A violated schema constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// The body is not valid JSON.
    Syntax(String),
    /// A required key is absent.
    Missing,
    /// The value has the wrong JSON type.
    Type {
        expected: &'static str,
        found: &'static str,
    },
    /// A string that must have content is empty.
    Empty,
    /// A number is below its minimum.
    Minimum { value: String, min: String },
    /// A number is above its maximum.
    Maximum { value: String, max: String },
    /// A name that ends up in a file path has separators or a leading dot.
    FileName,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Syntax(msg) => write!(f, "malformed JSON: {msg}"),
            Constraint::Missing => f.write_str("is a required property"),
            Constraint::Type { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            Constraint::Empty => f.write_str("must not be empty"),
            Constraint::Minimum { value, min } => {
                write!(f, "{value} is less than the minimum of {min}")
            }
            Constraint::Maximum { value, max } => {
                write!(f, "{value} is greater than the maximum of {max}")
            }
            Constraint::FileName => {
                f.write_str("must be a plain name without path separators or a leading '.'")
            }
        }
    }
}

/// Field path plus the constraint it violates.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Dotted path, e.g. `Options.Style Blend`. Empty for the body itself.
    pub path: String,
    pub constraint: Constraint,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            path: path.into(),
            constraint,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "request body {}", self.constraint)
        } else {
            write!(f, "'{}' {}", self.path, self.constraint)
        }
    }
}

impl std::error::Error for ValidationError {}

type Checked<T> = Result<T, ValidationError>;

/// Parse and validate a raw request body.
pub fn parse_body(body: &[u8]) -> Checked<SynthesisRequest> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ValidationError::new("", Constraint::Syntax(e.to_string())))?;
    parse_request(&value)
}

/// Validate a JSON request and convert it into a [`SynthesisRequest`].
pub fn parse_request(value: &Value) -> Checked<SynthesisRequest> {
    let root = Object::root(value)?;

    let inputs = root.object("Inputs")?;
    let text = inputs.string("User Text")?;
    if text.is_empty() {
        return Err(inputs.error("User Text", Constraint::Empty));
    }
    let user_audio = inputs.nullable_string("User Audio")?;

    let options = root.object("Options")?;
    let character = options.string("Character")?;
    check_file_name(&options, "Character", character)?;
    let noise = options.number("Noise")?;
    let style_blend = options.number("Style Blend")?;
    check_unit_interval(&options, "Style Blend", &style_blend)?;
    let diffusion_steps = options.integer("Diffusion Steps")?;
    if diffusion_steps < 1 {
        return Err(options.error(
            "Diffusion Steps",
            Constraint::Minimum {
                value: diffusion_steps.to_string(),
                min: "1".into(),
            },
        ));
    }
    let diffusion_steps = diffusion_steps as u64;
    let embedding_scale = options.number("Embedding Scale")?;
    let use_long_form = options.boolean("Use Long Form")?;

    let reference_enabled = options.optional_boolean("Enable Reference Audio")?;
    let timbre_blend = options.optional_number("Timbre Reference Blend")?;
    if let Some(blend) = &timbre_blend {
        check_unit_interval(&options, "Timbre Reference Blend", blend)?;
    }
    let prosody_blend = options.optional_number("Prosody Reference Blend")?;
    if let Some(blend) = &prosody_blend {
        check_unit_interval(&options, "Prosody Reference Blend", blend)?;
    }

    let output_id = root.string("Output File")?;
    check_file_name(&root, "Output File", output_id)?;
    let gpu_id = root.gpu_id("GPU ID")?;
    let session_id = root.nullable_string("Session ID")?;
    if !root.has("Session ID") {
        return Err(root.error("Session ID", Constraint::Missing));
    }
    if let Some(session) = session_id {
        check_file_name(&root, "Session ID", session)?;
    }

    let reference_enabled = reference_enabled.unwrap_or(false);
    if let Some(item) = user_audio {
        check_file_name(&inputs, "User Audio", item)?;
    }

    Ok(SynthesisRequest {
        text: text.to_owned(),
        options: SynthesisOptions {
            character: character.to_owned(),
            noise,
            style_blend,
            diffusion_steps,
            embedding_scale,
            use_long_form,
            reference: ReferenceOptions {
                enabled: reference_enabled,
                item_id: user_audio.map(str::to_owned),
                timbre_blend,
                prosody_blend,
            },
        },
        output_id: output_id.to_owned(),
        gpu_id,
        session_id: session_id.map(str::to_owned),
    })
}

fn check_unit_interval(obj: &Object<'_>, key: &str, value: &Numeric) -> Checked<()> {
    let v = value.as_f64();
    if v < 0.0 {
        return Err(obj.error(
            key,
            Constraint::Minimum {
                value: value.to_string(),
                min: "0".into(),
            },
        ));
    }
    if v > 1.0 {
        return Err(obj.error(
            key,
            Constraint::Maximum {
                value: value.to_string(),
                max: "1".into(),
            },
        ));
    }
    Ok(())
}

fn check_file_name(obj: &Object<'_>, key: &str, name: &str) -> Checked<()> {
    if name.is_empty() {
        return Err(obj.error(key, Constraint::Empty));
    }
    let bad = name.contains(['/', '\\', '\0']) || name.starts_with('.');
    if bad {
        return Err(obj.error(key, Constraint::FileName));
    }
    Ok(())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A JSON object plus its path from the body root.
struct Object<'a> {
    path: String,
    map: &'a Map<String, Value>,
}

impl<'a> Object<'a> {
    fn root(value: &'a Value) -> Checked<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                path: String::new(),
                map,
            }),
            other => Err(ValidationError::new(
                "",
                Constraint::Type {
                    expected: "object",
                    found: json_type(other),
                },
            )),
        }
    }

    fn field_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_owned()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    fn error(&self, key: &str, constraint: Constraint) -> ValidationError {
        ValidationError::new(self.field_path(key), constraint)
    }

    fn type_error(&self, key: &str, expected: &'static str, found: &Value) -> ValidationError {
        self.error(
            key,
            Constraint::Type {
                expected,
                found: json_type(found),
            },
        )
    }

    fn has(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    fn required(&self, key: &str) -> Checked<&'a Value> {
        self.map
            .get(key)
            .ok_or_else(|| self.error(key, Constraint::Missing))
    }

    fn object(&self, key: &str) -> Checked<Object<'a>> {
        match self.required(key)? {
            Value::Object(map) => Ok(Object {
                path: self.field_path(key),
                map,
            }),
            other => Err(self.type_error(key, "object", other)),
        }
    }

    fn string(&self, key: &str) -> Checked<&'a str> {
        match self.required(key)? {
            Value::String(s) => Ok(s),
            other => Err(self.type_error(key, "string", other)),
        }
    }

    /// Absent and `null` both read as `None`.
    fn nullable_string(&self, key: &str) -> Checked<Option<&'a str>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.type_error(key, "string or null", other)),
        }
    }

    fn number(&self, key: &str) -> Checked<Numeric> {
        match self.required(key)? {
            Value::Number(n) => Ok(Numeric::new(n.clone())),
            other => Err(self.type_error(key, "number", other)),
        }
    }

    fn optional_number(&self, key: &str) -> Checked<Option<Numeric>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(Some(Numeric::new(n.clone()))),
            Some(other) => Err(self.type_error(key, "number", other)),
        }
    }

    /// Accepts `5` and `5.0`, like JSON Schema's `integer`.
    fn integer(&self, key: &str) -> Checked<i64> {
        let value = self.required(key)?;
        let Value::Number(n) = value else {
            return Err(self.type_error(key, "integer", value));
        };
        if let Some(i) = n.as_i64() {
            return Ok(i);
        }
        match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
            _ => Err(self.error(
                key,
                Constraint::Type {
                    expected: "integer",
                    found: "number",
                },
            )),
        }
    }

    fn boolean(&self, key: &str) -> Checked<bool> {
        match self.required(key)? {
            Value::Bool(b) => Ok(*b),
            other => Err(self.type_error(key, "boolean", other)),
        }
    }

    fn optional_boolean(&self, key: &str) -> Checked<Option<bool>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.type_error(key, "boolean", other)),
        }
    }

    fn gpu_id(&self, key: &str) -> Checked<GpuId> {
        let value = self.required(key)?;
        match value {
            Value::String(s) => Ok(GpuId::Name(s.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(GpuId::Index)
                .ok_or_else(|| self.type_error(key, "string or integer", value)),
            other => Err(self.type_error(key, "string or integer", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "Inputs": {"User Text": "hello"},
            "Options": {
                "Character": "voiceA",
                "Noise": 0.5,
                "Style Blend": 0.3,
                "Diffusion Steps": 5,
                "Embedding Scale": 1.0,
                "Use Long Form": false
            },
            "Output File": "out1",
            "GPU ID": "0",
            "Session ID": "s1"
        })
    }

    fn error_for(body: Value) -> ValidationError {
        parse_request(&body).expect_err("request should be rejected")
    }

    #[test]
    fn test_parse_valid_request() {
        let req = parse_request(&valid()).unwrap();
        assert_eq!(req.text, "hello");
        assert_eq!(req.options.character, "voiceA");
        assert_eq!(req.options.noise.to_string(), "0.5");
        assert_eq!(req.options.embedding_scale.to_string(), "1.0");
        assert_eq!(req.options.diffusion_steps, 5);
        assert!(!req.options.use_long_form);
        assert!(!req.options.reference.enabled);
        assert_eq!(req.output_id, "out1");
        assert_eq!(req.gpu_id, GpuId::Name("0".into()));
        assert_eq!(req.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_null_session_and_integer_gpu() {
        let mut body = valid();
        body["Session ID"] = Value::Null;
        body["GPU ID"] = json!(1);
        let req = parse_request(&body).unwrap();
        assert!(req.session_id.is_none());
        assert_eq!(req.gpu_id, GpuId::Index(1));
    }

    #[test]
    fn test_missing_fields() {
        let mut body = valid();
        body["Options"].as_object_mut().unwrap().remove("Noise");
        let err = error_for(body);
        assert_eq!(err.path, "Options.Noise");
        assert_eq!(err.constraint, Constraint::Missing);

        let mut body = valid();
        body.as_object_mut().unwrap().remove("Session ID");
        assert_eq!(error_for(body).path, "Session ID");

        let mut body = valid();
        body.as_object_mut().unwrap().remove("Inputs");
        assert_eq!(error_for(body).path, "Inputs");
    }

    #[test]
    fn test_range_violations() {
        let mut body = valid();
        body["Options"]["Style Blend"] = json!(1.5);
        let err = error_for(body);
        assert_eq!(err.path, "Options.Style Blend");
        assert_eq!(
            err.to_string(),
            "'Options.Style Blend' 1.5 is greater than the maximum of 1"
        );

        let mut body = valid();
        body["Options"]["Diffusion Steps"] = json!(0);
        let err = error_for(body);
        assert_eq!(err.path, "Options.Diffusion Steps");
        assert!(matches!(err.constraint, Constraint::Minimum { .. }));

        let mut body = valid();
        body["Options"]["Diffusion Steps"] = json!(-3);
        assert_eq!(error_for(body).path, "Options.Diffusion Steps");
    }

    #[test]
    fn test_type_violations() {
        let mut body = valid();
        body["Options"]["Diffusion Steps"] = json!(2.5);
        assert_eq!(
            error_for(body).constraint,
            Constraint::Type {
                expected: "integer",
                found: "number"
            }
        );

        let mut body = valid();
        body["Options"]["Use Long Form"] = json!("yes");
        let err = error_for(body);
        assert_eq!(err.path, "Options.Use Long Form");

        let mut body = valid();
        body["GPU ID"] = json!(true);
        assert_eq!(error_for(body).path, "GPU ID");

        let err = parse_request(&json!([1, 2])).unwrap_err();
        assert_eq!(err.path, "");
    }

    #[test]
    fn test_empty_text_rejected() {
        let mut body = valid();
        body["Inputs"]["User Text"] = json!("");
        let err = error_for(body);
        assert_eq!(err.path, "Inputs.User Text");
        assert_eq!(err.constraint, Constraint::Empty);
    }

    #[test]
    fn test_path_like_names_rejected() {
        let mut body = valid();
        body["Output File"] = json!("../escape");
        assert_eq!(error_for(body).constraint, Constraint::FileName);

        let mut body = valid();
        body["Options"]["Character"] = json!("..");
        assert_eq!(error_for(body).constraint, Constraint::FileName);
    }

    #[test]
    fn test_reference_audio_options() {
        let mut body = valid();
        body["Inputs"]["User Audio"] = json!("clip1");
        body["Options"]["Enable Reference Audio"] = json!(true);
        body["Options"]["Timbre Reference Blend"] = json!(0.2);
        let req = parse_request(&body).unwrap();
        assert!(req.options.reference.enabled);
        assert_eq!(req.options.reference.item_id.as_deref(), Some("clip1"));
        assert_eq!(
            req.options.reference.timbre_blend.map(|n| n.to_string()),
            Some("0.2".to_string())
        );
        assert!(req.options.reference.prosody_blend.is_none());

        let mut body = valid();
        body["Options"]["Prosody Reference Blend"] = json!(-0.1);
        assert_eq!(
            error_for(body).path,
            "Options.Prosody Reference Blend"
        );
    }

    #[test]
    fn test_reference_audio_without_item_is_accepted() {
        let mut body = valid();
        body["Options"]["Enable Reference Audio"] = json!(true);
        let req = parse_request(&body).unwrap();
        assert!(req.options.reference.enabled);
        assert!(req.options.reference.item_id.is_none());

        body["Inputs"]["User Audio"] = Value::Null;
        let req = parse_request(&body).unwrap();
        assert!(req.options.reference.item_id.is_none());
    }

    #[test]
    fn test_session_id_must_be_plain_name() {
        for bad in ["../x", "a/b", "..", ".", ".no_session"] {
            let mut body = valid();
            body["Session ID"] = json!(bad);
            let err = error_for(body);
            assert_eq!(err.path, "Session ID");
            assert_eq!(err.constraint, Constraint::FileName);
        }

        let mut body = valid();
        body["Session ID"] = json!("");
        assert_eq!(error_for(body).constraint, Constraint::Empty);
    }

    #[test]
    fn test_parse_body_syntax_error() {
        let err = parse_body(b"{not json").unwrap_err();
        assert!(matches!(err.constraint, Constraint::Syntax(_)));
        assert!(err.to_string().contains("malformed JSON"));
    }
}
