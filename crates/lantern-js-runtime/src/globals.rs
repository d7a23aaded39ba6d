//! Capability surface
//!
//! Registers the `dashboardClient` and `httpClient` globals a plugin's
//! constructor receives. Every method runs on the engine loop; failures are
//! thrown into the script as exceptions rather than returned.

use std::sync::Arc;

use rquickjs::function::{Opt, Rest};
use rquickjs::{Ctx, Exception, Function, Object, Result as JsResult, Value};
use tokio::runtime::Handle;

use crate::bridge;
use crate::services::{HttpTransport, ObjectStore, PluginServices};

/// Register both capability globals.
pub(crate) fn register_capabilities(ctx: &Ctx<'_>, services: &PluginServices, runtime: Handle) -> JsResult<()> {
    let globals = ctx.globals();

    let dashboard = DashboardClient {
        store: services.store.clone(),
        runtime,
    };
    globals.set("dashboardClient", dashboard.into_object(ctx)?)?;

    let http = HttpClient {
        transport: services.http.clone(),
    };
    globals.set("httpClient", http.into_object(ctx)?)?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// dashboardClient
// ─────────────────────────────────────────────────────────────────────────────

/// Store access for scripts. Store futures are driven to completion on the
/// host runtime while the loop waits.
#[derive(Clone)]
struct DashboardClient {
    store: Arc<dyn ObjectStore>,
    runtime: Handle,
}

impl DashboardClient {
    fn into_object<'js>(self, ctx: &Ctx<'js>) -> JsResult<Object<'js>> {
        let obj = Object::new(ctx.clone())?;

        let client = self.clone();
        obj.set(
            "Get",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, key: Opt<Value<'js>>| client.get(&ctx, key.0))?,
        )?;

        let client = self.clone();
        obj.set(
            "List",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, key: Opt<Value<'js>>| client.list(&ctx, key.0))?,
        )?;

        let client = self.clone();
        obj.set(
            "Delete",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, key: Opt<Value<'js>>| client.delete(&ctx, key.0))?,
        )?;

        // Create and Update are the same apply operation.
        for method in ["Create", "Update"] {
            let client = self.clone();
            obj.set(
                method,
                Function::new(
                    ctx.clone(),
                    move |ctx: Ctx<'js>, namespace: Opt<String>, yaml: Opt<String>| {
                        client.apply(&ctx, namespace.0.unwrap_or_default(), yaml.0.unwrap_or_default())
                    },
                )?,
            )?;
        }

        Ok(obj)
    }

    fn get<'js>(&self, ctx: &Ctx<'js>, key: Option<Value<'js>>) -> JsResult<Value<'js>> {
        let key = read_key(ctx, "Get", key)?;
        let object = self
            .runtime
            .block_on(self.store.get(&key))
            .map_err(|e| Exception::throw_message(ctx, &format!("dashboardClient.Get: {e}")))?;
        bridge::to_js(ctx, &object, "object")
            .map_err(|e| Exception::throw_message(ctx, &format!("dashboardClient.Get: {e}")))
    }

    fn list<'js>(&self, ctx: &Ctx<'js>, key: Option<Value<'js>>) -> JsResult<Value<'js>> {
        let key = read_key(ctx, "List", key)?;
        let list = self
            .runtime
            .block_on(self.store.list(&key))
            .map_err(|e| Exception::throw_message(ctx, &format!("dashboardClient.List: {e}")))?;
        bridge::to_js(ctx, &list.items, "object list")
            .map_err(|e| Exception::throw_message(ctx, &format!("dashboardClient.List: {e}")))
    }

    fn delete<'js>(&self, ctx: &Ctx<'js>, key: Option<Value<'js>>) -> JsResult<()> {
        let key = read_key(ctx, "Delete", key)?;
        self.runtime
            .block_on(self.store.delete(&key))
            .map_err(|e| Exception::throw_message(ctx, &format!("dashboardClient.Delete: {e}")))
    }

    fn apply<'js>(&self, ctx: &Ctx<'js>, namespace: String, yaml: String) -> JsResult<Vec<String>> {
        if namespace.is_empty() {
            return Err(Exception::throw_type(ctx, "create/update: invalid namespace"));
        }
        if yaml.is_empty() {
            return Err(Exception::throw_type(ctx, "create/update: empty yaml"));
        }
        self.runtime
            .block_on(self.store.create_or_update_from_yaml(&namespace, &yaml))
            .map_err(|e| Exception::throw_message(ctx, &format!("create/update: {e}")))
    }
}

fn read_key<'js>(ctx: &Ctx<'js>, method: &str, key: Option<Value<'js>>) -> JsResult<lantern_types::Key> {
    let Some(key) = key else {
        return Err(Exception::throw_type(ctx, &format!("dashboardClient.{method}: key is required")));
    };
    bridge::read_key(key).map_err(|e| Exception::throw_type(ctx, &format!("dashboardClient.{method}: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// httpClient
// ─────────────────────────────────────────────────────────────────────────────

/// Outbound HTTP for scripts. Results are delivered by invoking the
/// caller's callback synchronously, and the callback's return value is
/// returned from the call.
#[derive(Clone)]
struct HttpClient {
    transport: Arc<dyn HttpTransport>,
}

impl HttpClient {
    fn into_object<'js>(self, ctx: &Ctx<'js>) -> JsResult<Object<'js>> {
        let obj = Object::new(ctx.clone())?;

        let client = self.clone();
        obj.set(
            "get",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<Value<'js>>| client.get(&ctx, args.0))?,
        )?;

        let client = self.clone();
        obj.set(
            "getJSON",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
                client.get_json(&ctx, args.0)
            })?,
        )?;

        obj.set(
            "post",
            Function::new(ctx.clone(), |ctx: Ctx<'js>, _args: Rest<Value<'js>>| -> JsResult<()> {
                Err(Exception::throw_message(&ctx, "post: not implemented"))
            })?,
        )?;

        Ok(obj)
    }

    /// Validate `(url, callback)` and perform the request.
    fn fetch<'js>(&self, ctx: &Ctx<'js>, method: &str, args: Vec<Value<'js>>) -> JsResult<(Function<'js>, Vec<u8>)> {
        let [url, callback]: [Value<'js>; 2] = args
            .try_into()
            .map_err(|_| Exception::throw_type(ctx, &format!("{method}: invalid arguments")))?;

        let url = match url.as_string() {
            Some(url) => url.to_string()?,
            None => String::new(),
        };
        if url.is_empty() {
            return Err(Exception::throw_type(ctx, &format!("{method}: empty url")));
        }

        let Some(callback) = callback.into_function() else {
            return Err(Exception::throw_type(ctx, &format!("{method}: bad callback function")));
        };

        let body = self
            .transport
            .get(&url)
            .map_err(|e| Exception::throw_message(ctx, &format!("{method} {url}: {e}")))?;

        Ok((callback, body))
    }

    /// Hands the raw body to the callback as an array of bytes.
    fn get<'js>(&self, ctx: &Ctx<'js>, args: Vec<Value<'js>>) -> JsResult<Value<'js>> {
        let (callback, body) = self.fetch(ctx, "get", args)?;
        let data = bridge::to_js(ctx, &body, "response body")
            .map_err(|e| Exception::throw_message(ctx, &format!("get: {e}")))?;
        callback.call((data,))
    }

    fn get_json<'js>(&self, ctx: &Ctx<'js>, args: Vec<Value<'js>>) -> JsResult<Value<'js>> {
        let (callback, body) = self.fetch(ctx, "getJSON", args)?;
        let parsed: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| Exception::throw_type(ctx, &format!("getJSON: invalid json response: {e}")))?;
        let data = bridge::to_js(ctx, &parsed, "response body")
            .map_err(|e| Exception::throw_message(ctx, &format!("getJSON: {e}")))?;
        callback.call((data,))
    }
}
