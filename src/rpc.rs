//! JSON-RPC 2.0 front end
//!
//! Maps method names onto [`RemoteControl`] operations. Parameters are
//! decoded into the typed request structures; a request that cannot be
//! decoded is a bad request. Results are serialized back as JSON, with
//! `null` for operations that return nothing.

use crate::backend::KeyboardBackend;
use crate::control::{DeviceParams, ErrorCode, KeyActionParams, KeyParams, RemoteControl, UnpairParams};
use crate::registry::DeviceRegistry;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Every method installed by [`JsonRpcDispatcher::register_all`]
pub const METHODS: [&str; 13] = [
    "devices", "device", "key", "delete", "modify", "pair", "unpair", "send", "press", "release", "save", "load",
    "add",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("Parse error")]
    Parse,

    #[error("Invalid request")]
    InvalidRequest,

    #[error("Unknown method '{0}'")]
    UnknownMethod(String),

    #[error(transparent)]
    Call(#[from] ErrorCode),
}

impl RpcError {
    pub fn code(&self) -> i32 {
        match self {
            RpcError::Parse => -32700,
            RpcError::InvalidRequest => -32600,
            RpcError::UnknownMethod(_) => -32601,
            RpcError::Call(code) => code.code(),
        }
    }
}

type Handler<R, K> = fn(&RemoteControl<R, K>, Value) -> Result<Value, ErrorCode>;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Serialize)]
struct RpcErrorBody {
    code: i32,
    message: String,
}

/// Method table in front of a [`RemoteControl`]
pub struct JsonRpcDispatcher<R, K>
where
    R: DeviceRegistry,
    K: KeyboardBackend,
{
    control: RemoteControl<R, K>,
    handlers: HashMap<&'static str, Handler<R, K>>,
}

impl<R, K> JsonRpcDispatcher<R, K>
where
    R: DeviceRegistry,
    K: KeyboardBackend,
{
    /// Create a dispatcher with all methods registered
    pub fn new(control: RemoteControl<R, K>) -> Self {
        let mut dispatcher = Self {
            control,
            handlers: HashMap::new(),
        };
        dispatcher.register_all();
        dispatcher
    }

    pub fn control(&self) -> &RemoteControl<R, K> {
        &self.control
    }

    pub fn register(&mut self, method: &'static str, handler: Handler<R, K>) {
        self.handlers.insert(method, handler);
    }

    pub fn unregister(&mut self, method: &str) {
        self.handlers.remove(method);
    }

    pub fn register_all(&mut self) {
        self.register("devices", devices::<R, K>);
        self.register("device", device::<R, K>);
        self.register("key", key::<R, K>);
        self.register("delete", delete::<R, K>);
        self.register("modify", modify::<R, K>);
        self.register("pair", pair::<R, K>);
        self.register("unpair", unpair::<R, K>);
        self.register("send", send::<R, K>);
        self.register("press", press::<R, K>);
        self.register("release", release::<R, K>);
        self.register("save", save::<R, K>);
        self.register("load", load::<R, K>);
        self.register("add", add::<R, K>);
    }

    pub fn unregister_all(&mut self) {
        for method in METHODS {
            self.unregister(method);
        }
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Invoke a method directly.
    ///
    /// A designator such as `RemoteControl.1.key` is reduced to its last
    /// component.
    pub fn handle(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let name = method.rsplit_once('.').map_or(method, |(_, name)| name);
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| RpcError::UnknownMethod(method.to_string()))?;

        debug!("-> {} {}", name, params);
        let result = handler(&self.control, params);
        debug!("<- {} {:?}", name, result);
        Ok(result?)
    }

    /// Process one JSON-RPC message.
    ///
    /// Returns `None` for notifications, i.e. well-formed requests without an
    /// `id` member. An explicit `"id": null` is answered.
    pub fn handle_message(&self, text: &str) -> Option<String> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                debug!("Unparseable request: {}", e);
                return render(Value::Null, Err(RpcError::Parse));
            }
        };

        let id = value.get("id").cloned();
        let request: RpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                debug!("Invalid request: {}", e);
                return render(id.unwrap_or(Value::Null), Err(RpcError::InvalidRequest));
            }
        };

        if request.jsonrpc != "2.0" {
            return render(id.unwrap_or(Value::Null), Err(RpcError::InvalidRequest));
        }

        let outcome = self.handle(&request.method, request.params.unwrap_or(Value::Null));
        render(id?, outcome)
    }
}

fn render(id: Value, outcome: Result<Value, RpcError>) -> Option<String> {
    let response = match outcome {
        Ok(result) => RpcResponse {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        },
        Err(e) => RpcResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcErrorBody {
                code: e.code(),
                message: e.to_string(),
            }),
        },
    };

    match serde_json::to_string(&response) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Failed to serialize response: {}", e);
            None
        }
    }
}

fn params<T: DeserializeOwned + Default>(value: Value) -> Result<T, ErrorCode> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|e| {
        debug!("Malformed parameters: {}", e);
        ErrorCode::BadRequest
    })
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ErrorCode> {
    serde_json::to_value(value).map_err(|_| ErrorCode::General)
}

fn devices<R: DeviceRegistry, K: KeyboardBackend>(rc: &RemoteControl<R, K>, _: Value) -> Result<Value, ErrorCode> {
    to_value(rc.devices())
}

fn device<R: DeviceRegistry, K: KeyboardBackend>(rc: &RemoteControl<R, K>, value: Value) -> Result<Value, ErrorCode> {
    match rc.device_info(&params::<DeviceParams>(value)?)? {
        Some(info) => to_value(info),
        None => Ok(json!({})),
    }
}

fn key<R: DeviceRegistry, K: KeyboardBackend>(rc: &RemoteControl<R, K>, value: Value) -> Result<Value, ErrorCode> {
    to_value(rc.key_mapping(&params::<KeyParams>(value)?)?)
}

fn delete<R: DeviceRegistry, K: KeyboardBackend>(rc: &RemoteControl<R, K>, value: Value) -> Result<Value, ErrorCode> {
    rc.delete_mapping(&params::<KeyParams>(value)?)?;
    Ok(Value::Null)
}

fn modify<R: DeviceRegistry, K: KeyboardBackend>(rc: &RemoteControl<R, K>, value: Value) -> Result<Value, ErrorCode> {
    rc.modify_mapping(&params::<KeyActionParams>(value)?)?;
    Ok(Value::Null)
}

fn add<R: DeviceRegistry, K: KeyboardBackend>(rc: &RemoteControl<R, K>, value: Value) -> Result<Value, ErrorCode> {
    rc.add_mapping(&params::<KeyActionParams>(value)?)?;
    Ok(Value::Null)
}

fn pair<R: DeviceRegistry, K: KeyboardBackend>(rc: &RemoteControl<R, K>, value: Value) -> Result<Value, ErrorCode> {
    rc.pair(&params::<DeviceParams>(value)?)?;
    Ok(Value::Null)
}

fn unpair<R: DeviceRegistry, K: KeyboardBackend>(rc: &RemoteControl<R, K>, value: Value) -> Result<Value, ErrorCode> {
    rc.unpair(&params::<UnpairParams>(value)?)?;
    Ok(Value::Null)
}

fn send<R: DeviceRegistry, K: KeyboardBackend>(rc: &RemoteControl<R, K>, value: Value) -> Result<Value, ErrorCode> {
    rc.send_key(&params::<KeyActionParams>(value)?)?;
    Ok(Value::Null)
}

fn press<R: DeviceRegistry, K: KeyboardBackend>(rc: &RemoteControl<R, K>, value: Value) -> Result<Value, ErrorCode> {
    rc.press_key(&params::<KeyActionParams>(value)?)?;
    Ok(Value::Null)
}

fn release<R: DeviceRegistry, K: KeyboardBackend>(rc: &RemoteControl<R, K>, value: Value) -> Result<Value, ErrorCode> {
    rc.release_key(&params::<KeyActionParams>(value)?)?;
    Ok(Value::Null)
}

fn save<R: DeviceRegistry, K: KeyboardBackend>(rc: &RemoteControl<R, K>, value: Value) -> Result<Value, ErrorCode> {
    rc.save_mapping(&params::<DeviceParams>(value)?)?;
    Ok(Value::Null)
}

fn load<R: DeviceRegistry, K: KeyboardBackend>(rc: &RemoteControl<R, K>, value: Value) -> Result<Value, ErrorCode> {
    rc.load_mapping(&params::<DeviceParams>(value)?)?;
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockKeyboardBackend;
    use crate::registry::InMemoryRegistry;

    fn dispatcher() -> JsonRpcDispatcher<InMemoryRegistry, MockKeyboardBackend> {
        let registry = InMemoryRegistry::new().with_producer("IR", "");
        JsonRpcDispatcher::new(RemoteControl::new(
            registry,
            MockKeyboardBackend::new(),
            vec!["Web".to_string()],
            None,
        ))
    }

    fn reply(dispatcher: &JsonRpcDispatcher<InMemoryRegistry, MockKeyboardBackend>, text: &str) -> Value {
        serde_json::from_str(&dispatcher.handle_message(text).unwrap()).unwrap()
    }

    #[test]
    fn test_all_methods_registered() {
        let mut d = dispatcher();
        let mut expected = METHODS.to_vec();
        expected.sort_unstable();
        assert_eq!(d.methods(), expected);

        d.unregister_all();
        assert!(d.methods().is_empty());
        assert_eq!(d.handle("devices", Value::Null), Err(RpcError::UnknownMethod("devices".to_string())));
    }

    #[test]
    fn test_devices_call() {
        let response = reply(&dispatcher(), r#"{"jsonrpc":"2.0","id":1,"method":"devices"}"#);
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"], json!(["Web", "IR"]));
    }

    #[test]
    fn test_designator_prefix() {
        let d = dispatcher();
        assert_eq!(d.handle("RemoteControl.1.devices", Value::Null).unwrap(), json!(["Web", "IR"]));
    }

    #[test]
    fn test_error_envelope() {
        let response = reply(&dispatcher(), r#"{"jsonrpc":"2.0","id":"a","method":"key","params":{"device":"Web","code":0}}"#);
        assert_eq!(response["error"]["code"], 30);
        assert!(response.get("result").is_none());
    }

    #[test]
    fn test_malformed_params_are_bad_requests() {
        let d = dispatcher();
        let err = d.handle("key", json!({"device": "Web", "code": 70000})).unwrap_err();
        assert_eq!(err, RpcError::Call(ErrorCode::BadRequest));

        let err = d.handle("key", json!("Web")).unwrap_err();
        assert_eq!(err.code(), 30);
    }

    #[test]
    fn test_void_result_is_null() {
        let d = dispatcher();
        let add = json!({"device": "Web", "code": 1, "key": 2, "modifiers": []});
        assert_eq!(d.handle("add", add).unwrap(), Value::Null);

        let response = reply(&d, r#"{"jsonrpc":"2.0","id":7,"method":"delete","params":{"device":"Web","code":1}}"#);
        assert!(response["result"].is_null());
        assert!(response.get("error").is_none());
    }

    #[test]
    fn test_protocol_errors() {
        let d = dispatcher();
        assert_eq!(reply(&d, "{not json")["error"]["code"], -32700);
        assert_eq!(reply(&d, r#"{"jsonrpc":"2.0","id":1}"#)["error"]["code"], -32600);
        assert_eq!(reply(&d, r#"{"jsonrpc":"1.0","id":1,"method":"devices"}"#)["error"]["code"], -32600);
        assert_eq!(reply(&d, r#"{"jsonrpc":"2.0","id":1,"method":"reboot"}"#)["error"]["code"], -32601);
    }

    #[test]
    fn test_null_id_is_answered() {
        let response = reply(&dispatcher(), r#"{"jsonrpc":"2.0","id":null,"method":"devices"}"#);
        assert!(response["id"].is_null());
        assert_eq!(response["result"], json!(["Web", "IR"]));
    }

    #[test]
    fn test_invalid_request_keeps_id() {
        let d = dispatcher();
        let response = reply(&d, r#"{"jsonrpc":"2.0","id":5,"method":7}"#);
        assert_eq!(response["id"], 5);
        assert_eq!(response["error"]["code"], -32600);

        let response = reply(&d, r#"{"jsonrpc":"1.0","id":"x","method":"devices"}"#);
        assert_eq!(response["id"], "x");
    }

    #[test]
    fn test_notification_has_no_response() {
        let d = dispatcher();
        let text = r#"{"jsonrpc":"2.0","method":"add","params":{"device":"Web","code":5,"key":6,"modifiers":[]}}"#;
        assert!(d.handle_message(text).is_none());
        assert_eq!(d.handle("key", json!({"device": "Web", "code": 5})).unwrap()["key"], 6);
    }
}
