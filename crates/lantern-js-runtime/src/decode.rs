//! Response decoders for the plugin handlers.
//!
//! Handlers return loosely shaped script values. Each decoder checks the
//! expected shape on the JSON form and produces the typed response, or a
//! [`CallError`] naming what was wrong.

use lantern_types::{
    Component, ContentResponse, FlexLayoutItem, Navigation, ObjectStatusResponse, PrintResponse,
    SummarySection, Tab, TabResponse,
};
use serde_json::{Map, Value};

use crate::bridge;
use crate::error::CallError;

pub(crate) fn navigation(response: Option<Value>) -> Result<Navigation, CallError> {
    let response = response
        .ok_or_else(|| CallError::MissingField("navigationHandler returned no navigation".into()))?;
    if !response.is_object() {
        return Err(CallError::InvalidShape("navigation must be an object".into()));
    }
    Ok(bridge::decode("navigation", response)?)
}

/// Accepts either the content object itself or a wrapper with a `content`
/// property.
pub(crate) fn content(response: Option<Value>) -> Result<ContentResponse, CallError> {
    let response = require_object(response, "contentHandler returned no content")?;
    let wrapped = match response.get("content") {
        Some(Value::Object(inner)) => Some(inner.clone()),
        Some(Value::Null) | None => None,
        Some(_) => {
            return Err(CallError::InvalidShape(
                "unable to get content as map from contentResponse".into(),
            ));
        }
    };
    let content = wrapped.unwrap_or(response);

    let mut decoded = ContentResponse::default();

    if let Some(raw) = present(&content, "title") {
        let titles = raw
            .as_array()
            .ok_or_else(|| CallError::InvalidShape("unable to get title array from content".into()))?;
        for (position, raw) in titles.iter().enumerate() {
            let title = component(&format!("title[{position}]"), raw)?;
            if !title.is_title() {
                return Err(CallError::InvalidShape(format!(
                    "title[{position}]: a {:?} component cannot be used as a title",
                    title.component_type()
                )));
            }
            decoded.title.push(title);
        }
    }

    let raw = content
        .get("viewComponents")
        .ok_or_else(|| CallError::MissingField("unable to get viewComponents from content".into()))?;
    let components = raw
        .as_array()
        .ok_or_else(|| CallError::InvalidShape("unable to get viewComponents list".into()))?;
    for (position, raw) in components.iter().enumerate() {
        decoded
            .view_components
            .push(component(&format!("viewComponents[{position}]"), raw)?);
    }

    if let Some(raw) = present(&content, "buttonGroup") {
        let group = component("buttonGroup", raw)?;
        if !group.is_button_group() {
            return Err(CallError::InvalidShape(format!(
                "buttonGroup: expected a buttonGroup component, got {:?}",
                group.component_type()
            )));
        }
        decoded.button_group = Some(group);
    }

    Ok(decoded)
}

pub(crate) fn print(response: Option<Value>) -> Result<PrintResponse, CallError> {
    let sections = require_object(response, "printHandler returned no response")?;
    let mut decoded = PrintResponse::default();

    for (section, value) in sections {
        match section.as_str() {
            "config" => decoded.config = summary_sections(&section, value)?,
            "status" => decoded.status = summary_sections(&section, value)?,
            "items" => decoded.items = flex_items(value)?,
            _ => return Err(CallError::UnknownSection(section)),
        }
    }

    Ok(decoded)
}

pub(crate) fn tab(response: Option<Value>) -> Result<TabResponse, CallError> {
    let response = require_object(response, "tabHandler returned no response")?;
    let tab = present(&response, "tab")
        .ok_or_else(|| CallError::MissingField("tab property not found".into()))?
        .as_object()
        .ok_or_else(|| CallError::InvalidShape("unable to get tab map".into()))?;

    let name = tab
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| CallError::MissingField("tab name not found".into()))?
        .to_string();

    let raw = present(tab, "contents")
        .ok_or_else(|| CallError::MissingField("tab contents not found".into()))?;
    let contents = component("tab contents", raw)?;
    if !contents.is_flex_layout() {
        return Err(CallError::InvalidShape(format!(
            "tab contents must be a flexlayout component, got {:?}",
            contents.component_type()
        )));
    }

    Ok(TabResponse {
        tab: Tab { name, contents },
    })
}

pub(crate) fn object_status(response: Option<Value>) -> Result<ObjectStatusResponse, CallError> {
    let response = require_object(response, "objectStatusHandler returned no response")?;
    let status = present(&response, "objectStatus")
        .ok_or_else(|| CallError::MissingField("objectStatus property not found".into()))?;
    if !status.is_object() {
        return Err(CallError::InvalidShape("unable to get objectStatus map".into()));
    }

    Ok(ObjectStatusResponse {
        object_status: bridge::decode("objectStatus", status.clone())?,
    })
}

/// An action succeeds unless the response carries a non-empty `error`.
pub(crate) fn action(plugin: &str, response: Option<Value>) -> Result<(), CallError> {
    let Some(error) = response.as_ref().and_then(|r| r.get("error")) else {
        return Ok(());
    };
    let message = match error {
        Value::Null => return Ok(()),
        Value::String(message) => message.clone(),
        other => other.to_string(),
    };
    if message.is_empty() {
        return Ok(());
    }
    Err(CallError::Action {
        plugin: plugin.to_string(),
        message,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Shape helpers
// ─────────────────────────────────────────────────────────────────────────────

fn require_object(response: Option<Value>, missing: &str) -> Result<Map<String, Value>, CallError> {
    match response {
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(CallError::InvalidShape(format!("{missing}: expected an object"))),
        None => Err(CallError::MissingField(missing.to_string())),
    }
}

/// A property that exists and is not `null`.
fn present<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|value| !value.is_null())
}

/// Decode a component envelope, checking for `metadata` and `config` first
/// so the error says which is missing.
fn component(name: &str, raw: &Value) -> Result<Component, CallError> {
    let map = raw
        .as_object()
        .ok_or_else(|| CallError::InvalidShape(format!("unable to get {name} map")))?;
    for field in ["metadata", "config"] {
        if !map.contains_key(field) {
            return Err(CallError::MissingField(format!("unable to get {field} from {name}")));
        }
    }

    let component: Component = bridge::decode(name, raw.clone())?;
    if component.component_type().is_empty() {
        return Err(CallError::InvalidShape(format!("{name} has no component type")));
    }
    Ok(component)
}

fn summary_sections(name: &str, value: Value) -> Result<Vec<SummarySection>, CallError> {
    let Value::Array(entries) = value else {
        return Err(CallError::InvalidShape(format!(
            "unable to parse printHandler {name} summary sections"
        )));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(position, entry)| {
            let section = entry.as_object().ok_or_else(|| {
                CallError::InvalidShape(format!("{name} section in position {position} is not an object"))
            })?;
            let header = section
                .get("header")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    CallError::MissingField(format!("{name} section in position {position} has no header"))
                })?
                .to_string();
            let raw = section.get("content").ok_or_else(|| {
                CallError::MissingField(format!("{name} section in position {position} has no content"))
            })?;
            let content = component(&format!("{name}[{position}].content"), raw)?;
            Ok(SummarySection { header, content })
        })
        .collect()
}

fn flex_items(value: Value) -> Result<Vec<FlexLayoutItem>, CallError> {
    let Value::Array(entries) = value else {
        return Err(CallError::InvalidShape("unable to parse printHandler items".into()));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(position, entry)| {
            let item = entry.as_object().ok_or_else(|| {
                CallError::InvalidShape(format!("item in position {position} is not an object"))
            })?;
            let raw = item
                .get("view")
                .ok_or_else(|| CallError::MissingField(format!("item in position {position} has no view")))?;
            component(&format!("items[{position}].view"), raw)?;
            Ok(bridge::decode(&format!("items[{position}]"), entry)?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_types::NodeStatus;
    use serde_json::json;

    fn text(value: &str) -> Value {
        json!({ "metadata": { "type": "text" }, "config": { "value": value } })
    }

    fn flexlayout() -> Value {
        json!({ "metadata": { "type": "flexlayout" }, "config": { "sections": [] } })
    }

    #[test]
    fn test_navigation_requires_a_value() {
        assert!(matches!(navigation(None), Err(CallError::MissingField(_))));
        assert!(matches!(navigation(Some(json!("nav"))), Err(CallError::InvalidShape(_))));

        let nav = navigation(Some(json!({ "title": "Sample", "path": "sample" }))).unwrap();
        assert_eq!(nav.title, "Sample");
    }

    #[test]
    fn test_navigation_null_fields_are_empty() {
        let nav = navigation(Some(json!({
            "title": "Root",
            "path": "root",
            "children": null,
            "iconName": null,
        })))
        .unwrap();
        assert!(nav.children.is_empty());
        assert!(nav.icon_name.is_empty());
    }

    #[test]
    fn test_content_accepts_wrapped_and_bare_forms() {
        let bare = json!({ "title": [text("Hi")], "viewComponents": [text("body")] });
        let wrapped = json!({ "content": bare.clone() });

        let from_bare = content(Some(bare)).unwrap();
        let from_wrapped = content(Some(wrapped)).unwrap();
        assert_eq!(from_bare, from_wrapped);
        assert_eq!(from_bare.title.len(), 1);
        assert_eq!(from_bare.view_components.len(), 1);
        assert!(from_bare.button_group.is_none());
    }

    #[test]
    fn test_content_distinguishes_missing_and_empty_view_components() {
        let empty = content(Some(json!({ "viewComponents": [] }))).unwrap();
        assert!(empty.view_components.is_empty());

        let err = content(Some(json!({ "title": [text("Hi")] }))).unwrap_err();
        assert!(matches!(err, CallError::MissingField(_)));
    }

    #[test]
    fn test_content_title_must_be_text_or_link() {
        let err = content(Some(json!({
            "title": [flexlayout()],
            "viewComponents": [],
        })))
        .unwrap_err();
        assert!(matches!(err, CallError::InvalidShape(_)));
    }

    #[test]
    fn test_content_button_group_checked() {
        let group = json!({ "metadata": { "type": "buttonGroup" }, "config": { "buttons": [] } });
        let decoded = content(Some(json!({ "viewComponents": [], "buttonGroup": group }))).unwrap();
        assert!(decoded.button_group.unwrap().is_button_group());

        let err = content(Some(json!({ "viewComponents": [], "buttonGroup": text("no") }))).unwrap_err();
        assert!(matches!(err, CallError::InvalidShape(_)));
    }

    #[test]
    fn test_component_reports_missing_envelope_fields() {
        let err = content(Some(json!({ "viewComponents": [{ "config": {} }] }))).unwrap_err();
        assert_eq!(err.to_string(), "unable to get metadata from viewComponents[0]");

        let err = content(Some(json!({ "viewComponents": [{ "metadata": { "type": "text" } }] }))).unwrap_err();
        assert_eq!(err.to_string(), "unable to get config from viewComponents[0]");
    }

    #[test]
    fn test_component_rejects_extra_keys() {
        let mut component = text("x");
        component["extra"] = json!(true);
        let err = content(Some(json!({ "viewComponents": [component] }))).unwrap_err();
        assert!(matches!(err, CallError::Bridge(_)));
    }

    #[test]
    fn test_print_sections() {
        let decoded = print(Some(json!({
            "config": [{ "header": "Name", "content": text("web") }],
            "status": [{ "header": "Phase", "content": text("Running") }],
            "items": [{ "width": 12, "view": text("item") }],
        })))
        .unwrap();

        assert_eq!(decoded.config[0].header, "Name");
        assert_eq!(decoded.status[0].header, "Phase");
        assert_eq!(decoded.items[0].width, 12);
    }

    #[test]
    fn test_print_items_only_leaves_other_sections_empty() {
        let decoded = print(Some(json!({ "items": [{ "view": text("item") }] }))).unwrap();
        assert!(decoded.config.is_empty());
        assert!(decoded.status.is_empty());
        assert_eq!(decoded.items.len(), 1);
        assert_eq!(decoded.items[0].width, 0);
    }

    #[test]
    fn test_print_rejects_malformed_item_width() {
        for width in [json!("wide"), json!(6.5), json!(4_294_967_308_i64)] {
            let err = print(Some(json!({ "items": [{ "width": width, "view": text("item") }] })))
                .unwrap_err();
            assert!(matches!(err, CallError::Bridge(_)), "width {width} decoded");
        }

        let decoded = print(Some(json!({ "items": [{ "width": null, "view": text("item") }] }))).unwrap();
        assert_eq!(decoded.items[0].width, 0);
    }

    #[test]
    fn test_print_rejects_unknown_section() {
        let err = print(Some(json!({ "bogus": [] }))).unwrap_err();
        assert_eq!(err.to_string(), "unknown printHandler response section: bogus");
    }

    #[test]
    fn test_print_rejects_malformed_sections() {
        let err = print(Some(json!({ "config": {} }))).unwrap_err();
        assert!(matches!(err, CallError::InvalidShape(_)));

        let err = print(Some(json!({ "config": [{ "content": text("x") }] }))).unwrap_err();
        assert!(matches!(err, CallError::MissingField(_)));
    }

    #[test]
    fn test_tab_requires_name_and_flexlayout() {
        let decoded = tab(Some(json!({ "tab": { "name": "Sample", "contents": flexlayout() } }))).unwrap();
        assert_eq!(decoded.tab.name, "Sample");

        let err = tab(Some(json!({}))).unwrap_err();
        assert_eq!(err.to_string(), "tab property not found");

        let err = tab(Some(json!({ "tab": { "contents": flexlayout() } }))).unwrap_err();
        assert_eq!(err.to_string(), "tab name not found");

        let err = tab(Some(json!({ "tab": { "name": "Sample" } }))).unwrap_err();
        assert_eq!(err.to_string(), "tab contents not found");

        let err = tab(Some(json!({ "tab": { "name": "Sample", "contents": text("x") } }))).unwrap_err();
        assert!(matches!(err, CallError::InvalidShape(_)));
    }

    #[test]
    fn test_object_status() {
        let decoded = object_status(Some(json!({
            "objectStatus": { "status": "warning", "details": [text("check")] }
        })))
        .unwrap();
        assert_eq!(decoded.object_status.status, NodeStatus::Warning);
        assert_eq!(decoded.object_status.details.len(), 1);

        assert!(matches!(object_status(Some(json!({}))), Err(CallError::MissingField(_))));
        assert!(matches!(object_status(None), Err(CallError::MissingField(_))));
    }

    #[test]
    fn test_action_error_field() {
        assert!(action("p.js", None).is_ok());
        assert!(action("p.js", Some(json!({}))).is_ok());
        assert!(action("p.js", Some(json!({ "error": null }))).is_ok());
        assert!(action("p.js", Some(json!({ "error": "" }))).is_ok());

        let err = action("p.js", Some(json!({ "error": "boom" }))).unwrap_err();
        assert_eq!(err.to_string(), "p.js actionHandler: \"boom\"");
    }
}
