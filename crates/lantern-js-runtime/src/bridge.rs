//! Value bridge between host data and script values.
//!
//! Everything crosses as canonical JSON text: host values are serialized with
//! serde_json and parsed by the engine, script values are stringified by the
//! engine and deserialized with serde_json. Field names therefore follow the
//! serde attributes on the shared types, and a script-side `undefined` or
//! `null` comes back as an absent value.

use std::collections::BTreeMap;
use std::fmt;

use lantern_types::Key;
use rquickjs::{Ctx, Object, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::BridgeError;

/// Convert a host value into a script value.
pub fn to_js<'js, T>(ctx: &Ctx<'js>, value: &T, what: &str) -> Result<Value<'js>, BridgeError>
where
    T: Serialize + ?Sized,
{
    let text = serde_json::to_string(value).map_err(|source| BridgeError::Encode {
        what: what.to_string(),
        source,
    })?;
    ctx.json_parse(text).map_err(|e| BridgeError::Engine {
        what: what.to_string(),
        message: ScriptException::from_error(ctx, e).to_string(),
    })
}

/// Convert a script value into its JSON form. `undefined` and `null` map to `None`.
pub fn from_js<'js>(
    ctx: &Ctx<'js>,
    value: Value<'js>,
    what: &str,
) -> Result<Option<serde_json::Value>, BridgeError> {
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }

    let engine_error = |e: rquickjs::Error| BridgeError::Engine {
        what: what.to_string(),
        message: ScriptException::from_error(ctx, e).to_string(),
    };

    // Functions and symbols have no JSON form.
    let Some(text) = ctx.json_stringify(value).map_err(engine_error)? else {
        return Ok(None);
    };
    let text = text.to_string().map_err(engine_error)?;

    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| BridgeError::Decode {
            what: what.to_string(),
            source,
        })
}

/// Decode a JSON value into a typed host value.
pub fn decode<T: DeserializeOwned>(what: &str, value: serde_json::Value) -> Result<T, BridgeError> {
    serde_json::from_value(value).map_err(|source| BridgeError::Decode {
        what: what.to_string(),
        source,
    })
}

/// Convert a script value into a typed host value, `None` when absent.
pub fn from_js_as<'js, T: DeserializeOwned>(
    ctx: &Ctx<'js>,
    value: Value<'js>,
    what: &str,
) -> Result<Option<T>, BridgeError> {
    from_js(ctx, value, what)?
        .map(|json| decode(what, json))
        .transpose()
}

/// Read a store key straight off a script object.
///
/// Keys are read field by field rather than through JSON so that extra
/// properties scripts attach are ignored.
pub fn read_key<'js>(value: Value<'js>) -> Result<Key, BridgeError> {
    let engine_error = |e: rquickjs::Error| BridgeError::Engine {
        what: "key".to_string(),
        message: e.to_string(),
    };

    let Some(obj) = value.into_object() else {
        return Err(BridgeError::Engine {
            what: "key".to_string(),
            message: "key must be an object".to_string(),
        });
    };

    let field = |obj: &Object<'js>, name: &str| -> Result<String, BridgeError> {
        Ok(obj
            .get::<_, Option<String>>(name)
            .map_err(engine_error)?
            .unwrap_or_default())
    };

    Ok(Key {
        namespace: field(&obj, "namespace")?,
        api_version: field(&obj, "apiVersion")?,
        kind: field(&obj, "kind")?,
        name: field(&obj, "name")?,
        selector: obj
            .get::<_, Option<BTreeMap<String, String>>>("selector")
            .map_err(engine_error)?,
    })
}

/// A script exception pulled out of the engine.
#[derive(Debug, Clone, Default)]
pub struct ScriptException {
    pub name: Option<String>,
    pub message: String,
    pub stack: Option<String>,
}

impl ScriptException {
    /// Describe an engine error, taking the pending exception when there is one.
    pub fn from_error<'js>(ctx: &Ctx<'js>, error: rquickjs::Error) -> Self {
        match error {
            rquickjs::Error::Exception => Self::from_value(ctx, ctx.catch()),
            other => Self {
                message: other.to_string(),
                ..Self::default()
            },
        }
    }

    fn from_value<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> Self {
        if let Some(obj) = value.as_object() {
            let text = |key: &str| obj.get::<_, Option<String>>(key).ok().flatten();
            if let Some(message) = text("message") {
                return Self {
                    name: text("name"),
                    message,
                    stack: text("stack").filter(|s| !s.is_empty()),
                };
            }
        }
        if let Some(s) = value.as_string() {
            return Self {
                message: s.to_string().unwrap_or_default(),
                ..Self::default()
            };
        }
        let message = match from_js(ctx, value, "exception") {
            Ok(Some(json)) => json.to_string(),
            _ => "unknown exception".to_string(),
        };
        Self {
            message,
            ..Self::default()
        }
    }

    pub fn is_syntax_error(&self) -> bool {
        self.name.as_deref() == Some("SyntaxError")
    }
}

impl fmt::Display for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}", name, self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineLoop, EngineOptions};
    use lantern_types::Navigation;
    use serde_json::json;

    fn engine() -> EngineLoop {
        EngineLoop::start("bridge-test", EngineOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_navigation_survives_round_trip() {
        let engine = engine();
        let nav = Navigation::new("Sample", "sample")
            .with_icon("cloud")
            .with_child(Navigation::new("Nested", "sample/nested"));

        let expected = nav.clone();
        let back: Navigation = engine
            .call(move |state| {
                state.with(|ctx| {
                    let value = to_js(&ctx, &nav, "navigation").unwrap();
                    from_js_as(&ctx, value, "navigation").unwrap().unwrap()
                })
            })
            .await
            .unwrap();

        assert_eq!(back, expected);
    }

    #[tokio::test]
    async fn test_script_sees_serde_field_names() {
        let engine = engine();
        let nav = Navigation::new("Sample", "sample").with_icon("cloud");

        let icon: String = engine
            .call(move |state| {
                state.with(|ctx| {
                    let value = to_js(&ctx, &nav, "navigation").unwrap();
                    ctx.globals().set("nav", value).unwrap();
                    ctx.eval::<String, _>("nav.iconName").unwrap()
                })
            })
            .await
            .unwrap();

        assert_eq!(icon, "cloud");
    }

    #[tokio::test]
    async fn test_undefined_and_null_are_absent() {
        let engine = engine();
        let (undefined, null, empty) = engine
            .call(|state| {
                state.with(|ctx| {
                    let undefined = from_js(&ctx, ctx.eval("undefined").unwrap(), "u").unwrap();
                    let null = from_js(&ctx, ctx.eval("null").unwrap(), "n").unwrap();
                    let empty = from_js(&ctx, ctx.eval("({})").unwrap(), "e").unwrap();
                    (undefined, null, empty)
                })
            })
            .await
            .unwrap();

        assert_eq!(undefined, None);
        assert_eq!(null, None);
        assert_eq!(empty, Some(json!({})));
    }

    #[tokio::test]
    async fn test_decode_reports_mismatched_shape() {
        let err = decode::<Navigation>("navigation", json!({ "title": 3 })).unwrap_err();
        assert!(matches!(err, BridgeError::Decode { .. }));
        assert!(err.to_string().contains("navigation"));
    }

    #[tokio::test]
    async fn test_read_key_ignores_extra_properties() {
        let engine = engine();
        let key = engine
            .call(|state| {
                state.with(|ctx| {
                    let value = ctx
                        .eval(
                            r#"({ namespace: "default", apiVersion: "v1", kind: "Pod",
                                 name: "web", selector: { app: "web" }, extra: [1, 2] })"#,
                        )
                        .unwrap();
                    read_key(value).unwrap()
                })
            })
            .await
            .unwrap();

        assert_eq!(key.namespace, "default");
        assert_eq!(key.api_version, "v1");
        assert_eq!(key.kind, "Pod");
        assert_eq!(key.name, "web");
        assert_eq!(key.selector.unwrap().get("app").map(String::as_str), Some("web"));
    }

    #[tokio::test]
    async fn test_read_key_rejects_non_objects() {
        let engine = engine();
        let failed = engine
            .call(|state| state.with(|ctx| read_key(ctx.eval("42").unwrap()).is_err()))
            .await
            .unwrap();
        assert!(failed);
    }

    #[tokio::test]
    async fn test_exception_keeps_name_and_message() {
        let engine = engine();
        let exception = engine
            .call(|state| {
                state.with(|ctx| {
                    let err = ctx.eval::<(), _>("throw new TypeError('bad input')").unwrap_err();
                    ScriptException::from_error(&ctx, err)
                })
            })
            .await
            .unwrap();

        assert_eq!(exception.name.as_deref(), Some("TypeError"));
        assert_eq!(exception.message, "bad input");
        assert_eq!(exception.to_string(), "TypeError: bad input");
    }

    #[tokio::test]
    async fn test_thrown_strings_become_messages() {
        let engine = engine();
        let exception = engine
            .call(|state| {
                state.with(|ctx| {
                    let err = ctx.eval::<(), _>("throw 'plain'").unwrap_err();
                    ScriptException::from_error(&ctx, err)
                })
            })
            .await
            .unwrap();

        assert_eq!(exception.to_string(), "plain");
        assert!(!exception.is_syntax_error());
    }
}
