//! In-memory object store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use lantern_types::{Key, ObjectList};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;

use crate::error::StoreError;
use crate::services::ObjectStore;

/// (apiVersion, kind, namespace, name)
type ObjectId = (String, String, String, String);

/// An [`ObjectStore`] that keeps objects in a map.
///
/// Used by the CLI (seeded from a fixtures file) and by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<ObjectId, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace `object`. Returns a `kubectl apply`-style summary.
    pub fn apply(&self, mut object: Value, default_namespace: &str) -> Result<String, StoreError> {
        let api_version = required_str(&object, "apiVersion")?;
        let kind = required_str(&object, "kind")?;

        let metadata = object
            .get_mut("metadata")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| StoreError::InvalidObject(format!("{kind} has no metadata")))?;
        let name = metadata
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| StoreError::InvalidObject(format!("{kind} has no metadata.name")))?
            .to_string();
        let existing = metadata
            .get("namespace")
            .and_then(Value::as_str)
            .filter(|namespace| !namespace.is_empty())
            .map(str::to_string);
        let namespace = match existing {
            Some(namespace) => namespace,
            None => {
                if !default_namespace.is_empty() {
                    metadata.insert("namespace".into(), Value::String(default_namespace.into()));
                }
                default_namespace.to_string()
            }
        };

        let summary = format!("{}/{}", kind.to_lowercase(), name);
        let id = (api_version, kind, namespace, name);
        let created = self.objects.write().insert(id, object).is_none();

        Ok(format!("{} {}", summary, if created { "created" } else { "configured" }))
    }

    /// Apply every document of a YAML stream.
    pub fn apply_yaml(&self, yaml: &str, default_namespace: &str) -> Result<Vec<String>, StoreError> {
        let mut applied = Vec::new();
        for document in serde_yaml::Deserializer::from_str(yaml) {
            let object =
                Value::deserialize(document).map_err(|e| StoreError::InvalidObject(e.to_string()))?;
            if object.is_null() {
                continue;
            }
            applied.push(self.apply(object, default_namespace)?);
        }
        if applied.is_empty() {
            return Err(StoreError::InvalidObject("no objects found in yaml".into()));
        }
        Ok(applied)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

fn required_str(object: &Value, field: &str) -> Result<String, StoreError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StoreError::InvalidObject(format!("object has no {field}")))
}

fn labels(object: &Value) -> BTreeMap<String, String> {
    object
        .pointer("/metadata/labels")
        .and_then(Value::as_object)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn require_type(key: &Key) -> Result<(), StoreError> {
    if key.api_version.is_empty() || key.kind.is_empty() {
        return Err(StoreError::InvalidKey(format!("{key}: apiVersion and kind are required")));
    }
    Ok(())
}

fn object_id(key: &Key) -> Result<ObjectId, StoreError> {
    require_type(key)?;
    if key.name.is_empty() {
        return Err(StoreError::InvalidKey(format!("{key}: name is required")));
    }
    Ok((
        key.api_version.clone(),
        key.kind.clone(),
        key.namespace.clone(),
        key.name.clone(),
    ))
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &Key) -> Result<Option<Value>, StoreError> {
        let id = object_id(key)?;
        Ok(self.objects.read().get(&id).cloned())
    }

    async fn list(&self, key: &Key) -> Result<ObjectList, StoreError> {
        require_type(key)?;
        let objects = self.objects.read();
        let items = objects
            .iter()
            .filter(|((api_version, kind, namespace, _), _)| {
                *api_version == key.api_version
                    && *kind == key.kind
                    && (key.namespace.is_empty() || *namespace == key.namespace)
            })
            .filter(|(_, object)| key.matches_labels(&labels(object)))
            .map(|(_, object)| object.clone())
            .collect();

        Ok(ObjectList {
            items,
            next_token: None,
        })
    }

    async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        let id = object_id(key)?;
        match self.objects.write().remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    async fn create_or_update_from_yaml(&self, namespace: &str, yaml: &str) -> Result<Vec<String>, StoreError> {
        self.apply_yaml(yaml, namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PODS: &str = r#"
apiVersion: v1
kind: Pod
metadata:
  name: web
  labels:
    app: web
---
apiVersion: v1
kind: Pod
metadata:
  name: db
  namespace: data
  labels:
    app: db
"#;

    #[tokio::test]
    async fn test_apply_yaml_defaults_namespace() {
        let store = MemoryStore::new();
        let applied = store.apply_yaml(PODS, "default").unwrap();
        assert_eq!(applied, vec!["pod/web created", "pod/db created"]);
        assert_eq!(store.len(), 2);

        let web = store
            .get(&Key::new("v1", "Pod").with_namespace("default").with_name("web"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(web["metadata"]["namespace"], "default");

        let db = store
            .get(&Key::new("v1", "Pod").with_namespace("data").with_name("db"))
            .await
            .unwrap();
        assert!(db.is_some());
    }

    #[tokio::test]
    async fn test_reapply_reports_configured() {
        let store = MemoryStore::new();
        store.apply_yaml(PODS, "default").unwrap();
        let applied = store.apply_yaml(PODS, "default").unwrap();
        assert_eq!(applied, vec!["pod/web configured", "pod/db configured"]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_list_filters_by_namespace_and_selector() {
        let store = MemoryStore::new();
        store.apply_yaml(PODS, "default").unwrap();

        let all = store.list(&Key::new("v1", "Pod")).await.unwrap();
        assert_eq!(all.items.len(), 2);

        let data = store.list(&Key::new("v1", "Pod").with_namespace("data")).await.unwrap();
        assert_eq!(data.items.len(), 1);

        let selector = BTreeMap::from([("app".to_string(), "web".to_string())]);
        let web = store.list(&Key::new("v1", "Pod").with_selector(selector)).await.unwrap();
        assert_eq!(web.items.len(), 1);
        assert_eq!(web.items[0]["metadata"]["name"], "web");

        let none = store.list(&Key::new("apps/v1", "Deployment")).await.unwrap();
        assert!(none.items.is_empty());
    }

    #[tokio::test]
    async fn test_missing_object_is_none_and_delete_reports_not_found() {
        let store = MemoryStore::new();
        let key = Key::new("v1", "Pod").with_namespace("default").with_name("ghost");
        assert_eq!(store.get(&key).await.unwrap(), None);
        assert!(matches!(store.delete(&key).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_object() {
        let store = MemoryStore::new();
        store
            .apply(json!({ "apiVersion": "v1", "kind": "Pod", "metadata": { "name": "web" } }), "default")
            .unwrap();

        let key = Key::new("v1", "Pod").with_namespace("default").with_name("web");
        store.delete(&key).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_keys_and_objects() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get(&Key::new("v1", "Pod")).await,
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            store.list(&Key::default()).await,
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            store.apply(json!({ "kind": "Pod" }), ""),
            Err(StoreError::InvalidObject(_))
        ));
        assert!(matches!(store.apply_yaml("", "default"), Err(StoreError::InvalidObject(_))));
    }
}
