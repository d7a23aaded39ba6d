//! Plugin contract extraction: instantiate the plugin class and read its
//! metadata.

use lantern_types::{Capabilities, Capability, GroupVersionKind, Metadata};
use rquickjs::{Ctx, Object, Value};

use crate::bridge::{self, ScriptException};
use crate::error::LoadError;

/// Global a script may define to name its plugin class directly.
pub(crate) const PLUGIN_GLOBAL: &str = "_lanternPlugin";

const CONSTRUCT_FROM_GLOBAL: &str = "new _lanternPlugin(dashboardClient, httpClient)";
const CONSTRUCT_FROM_EXPORT: &str = "new module.exports.default(dashboardClient, httpClient)";

/// Construct the plugin instance, passing the two capability objects.
///
/// The class named by [`PLUGIN_GLOBAL`] wins; otherwise the default export
/// is used.
pub(crate) fn instantiate<'js>(ctx: &Ctx<'js>) -> Result<Object<'js>, LoadError> {
    let signalled = ctx
        .globals()
        .get::<_, Value>(PLUGIN_GLOBAL)
        .map(|value| !value.is_undefined())
        .unwrap_or(false);

    let expression = if signalled {
        CONSTRUCT_FROM_GLOBAL
    } else {
        let default_export: Value = ctx
            .eval("module.exports.default")
            .map_err(|e| LoadError::Export(ScriptException::from_error(ctx, e).to_string()))?;
        if !default_export.is_function() {
            return Err(LoadError::Export(
                "module.exports.default is not a plugin class".to_string(),
            ));
        }
        CONSTRUCT_FROM_EXPORT
    };

    let instance: Value = ctx.eval(expression).map_err(|e| {
        LoadError::Export(format!(
            "unable to create new plugin: {}",
            ScriptException::from_error(ctx, e)
        ))
    })?;

    instance
        .into_object()
        .ok_or_else(|| LoadError::Export("plugin constructor did not produce an object".to_string()))
}

/// Read name, description and capabilities off a plugin instance.
pub(crate) fn metadata<'js>(ctx: &Ctx<'js>, plugin: &Object<'js>) -> Result<Metadata, LoadError> {
    let name = required_string(plugin, "name")?;
    let description = required_string(plugin, "description")?;

    let is_module = plugin
        .get::<_, Value>("isModule")
        .map(|value| truthy(&value))
        .map_err(|e| LoadError::Metadata(format!("isModule: {e}")))?;

    let mut capabilities = extract_capabilities(ctx, plugin)?;
    capabilities.is_module = is_module;

    Ok(Metadata {
        name,
        description,
        capabilities,
    })
}

fn required_string<'js>(plugin: &Object<'js>, key: &str) -> Result<String, LoadError> {
    let value: Value = plugin
        .get(key)
        .map_err(|e| LoadError::Metadata(format!("{key}: {e}")))?;

    let text = match value.as_string() {
        Some(s) => s
            .to_string()
            .map_err(|e| LoadError::Metadata(format!("{key}: {e}")))?,
        None if value.is_undefined() || value.is_null() => String::new(),
        None => return Err(LoadError::Metadata(format!("{key} must be a string"))),
    };

    if text.is_empty() {
        return Err(LoadError::Metadata(format!("{key} is a required property")));
    }
    Ok(text)
}

/// JavaScript truthiness for primitive values; any object is truthy.
fn truthy(value: &Value<'_>) -> bool {
    if value.is_undefined() || value.is_null() {
        return false;
    }
    if let Some(b) = value.as_bool() {
        return b;
    }
    if let Some(i) = value.as_int() {
        return i != 0;
    }
    if let Some(f) = value.as_float() {
        return f != 0.0 && !f.is_nan();
    }
    if let Some(s) = value.as_string() {
        return s.to_string().map(|s| !s.is_empty()).unwrap_or(false);
    }
    true
}

fn extract_capabilities<'js>(ctx: &Ctx<'js>, plugin: &Object<'js>) -> Result<Capabilities, LoadError> {
    let value: Value = plugin
        .get("capabilities")
        .map_err(|e| LoadError::Metadata(format!("capabilities: {e}")))?;

    let table = match value.as_object() {
        Some(obj) if !value.is_array() && !value.is_function() => obj.clone(),
        _ => {
            return Err(LoadError::Metadata(
                "unable to get capabilities for plugin class".to_string(),
            ));
        }
    };

    let mut capabilities = Capabilities::default();
    for key in table.keys::<String>() {
        let key = key.map_err(|e| LoadError::Metadata(format!("capabilities: {e}")))?;
        let entry: Value = table
            .get(key.as_str())
            .map_err(|e| LoadError::Metadata(format!("{key}: {e}")))?;

        match Capability::from_key(&key) {
            Some(Capability::ActionNames) => {
                capabilities.action_names.extend(extract_action_names(ctx, entry)?);
            }
            Some(capability) => {
                let gvks = extract_gvks(ctx, &key, entry)?;
                capabilities.extend_gvks(capability, gvks);
            }
            None => {
                tracing::warn!(capability = %key, "ignoring unknown plugin capability");
            }
        }
    }

    Ok(capabilities)
}

fn extract_gvks<'js>(ctx: &Ctx<'js>, key: &str, value: Value<'js>) -> Result<Vec<GroupVersionKind>, LoadError> {
    let json = bridge::from_js(ctx, value, key).map_err(|e| LoadError::Metadata(e.to_string()))?;
    let Some(serde_json::Value::Array(entries)) = json else {
        return Err(LoadError::Metadata(format!("{key}: expected a list of GVKs")));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(position, entry)| {
            if !entry.is_object() {
                return Err(LoadError::Metadata(format!(
                    "{key}: unable to parse GVK in position {position}"
                )));
            }
            bridge::decode(&format!("GVK in position {position} of {key}"), entry)
                .map_err(|e| LoadError::Metadata(e.to_string()))
        })
        .collect()
}

fn extract_action_names<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> Result<Vec<String>, LoadError> {
    let key = Capability::ActionNames.as_key();
    let json = bridge::from_js(ctx, value, key).map_err(|e| LoadError::Metadata(e.to_string()))?;
    let Some(serde_json::Value::Array(entries)) = json else {
        return Err(LoadError::Metadata(format!("{key}: expected a list of names")));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(position, entry)| match entry {
            serde_json::Value::String(name) => Ok(name),
            _ => Err(LoadError::Metadata(format!(
                "{key}: entry in position {position} is not a string"
            ))),
        })
        .collect()
}
