//! Resource, tool and prompt operations
//!
//! Thin wrappers over [`LinkClient::send_request`]: each one shapes the
//! method name and params and hands back the raw `result` payload. The wire
//! shapes are the compatibility surface:
//!
//! | Operation        | Method           | Params                |
//! |------------------|------------------|-----------------------|
//! | `list_resources` | `resources/list` | none                  |
//! | `read_resource`  | `resources/read` | `{uri}`               |
//! | `list_tools`     | `tools/list`     | none                  |
//! | `call_tool`      | `tools/call`     | `{name, arguments}`   |
//! | `list_prompts`   | `prompts/list`   | none                  |
//! | `get_prompt`     | `prompts/get`    | `{name, arguments}`   |
//!
//! Errors are exactly those of `send_request`.

use crate::client::LinkClient;
use rpclink_core::Result;
use serde_json::{json, Value};

pub const RESOURCES_LIST: &str = "resources/list";
pub const RESOURCES_READ: &str = "resources/read";
pub const TOOLS_LIST: &str = "tools/list";
pub const TOOLS_CALL: &str = "tools/call";
pub const PROMPTS_LIST: &str = "prompts/list";
pub const PROMPTS_GET: &str = "prompts/get";

impl LinkClient {
    pub async fn list_resources(&self) -> Result<Value> {
        self.send_request(RESOURCES_LIST, None).await
    }

    /// Read one resource by URI
    pub async fn read_resource(&self, uri: impl Into<String>) -> Result<Value> {
        self.send_request(RESOURCES_READ, Some(json!({ "uri": uri.into() })))
            .await
    }

    pub async fn list_tools(&self) -> Result<Value> {
        self.send_request(TOOLS_LIST, None).await
    }

    /// Invoke a named tool
    ///
    /// `arguments` is passed through verbatim; use `json!({})` for none.
    pub async fn call_tool(&self, name: impl Into<String>, arguments: Value) -> Result<Value> {
        self.send_request(TOOLS_CALL, Some(named_call(name.into(), arguments)))
            .await
    }

    pub async fn list_prompts(&self) -> Result<Value> {
        self.send_request(PROMPTS_LIST, None).await
    }

    /// Fetch a named prompt rendered with `arguments`
    pub async fn get_prompt(&self, name: impl Into<String>, arguments: Value) -> Result<Value> {
        self.send_request(PROMPTS_GET, Some(named_call(name.into(), arguments)))
            .await
    }
}

fn named_call(name: String, arguments: Value) -> Value {
    json!({ "name": name, "arguments": arguments })
}
