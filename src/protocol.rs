//! Request, result and event wire surface.
//!
//! Requests arrive as a method name plus a loose JSON payload and parse into
//! typed [`NavRequest`]s; results serialize back to JSON. Outbound events
//! carry their wire name separately from their payload because lifecycle
//! events encode the component id into the name itself
//! (`viewWillAppear:<id>`), which lets content listeners subscribe to a
//! single view without filtering.

use serde_json::{json, Map, Value};

use crate::backend::PresentationStyle;
use crate::component::{as_object, ComponentId, ComponentSpec, ViewSpec};
use crate::error::{NavError, Result};
use crate::options::ComponentOptions;

/// How a push lands on the target stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushMode {
    /// Append a new top entry.
    #[default]
    Push,
    /// Overwrite the current top entry in place.
    Replace,
    /// Clear the stack down to just the pushed entry.
    Root,
}

impl PushMode {
    pub fn parse(s: &str) -> Option<PushMode> {
        match s {
            "push" => Some(PushMode::Push),
            "replace" => Some(PushMode::Replace),
            "root" => Some(PushMode::Root),
            _ => None,
        }
    }
}

/// A parsed navigation request.
#[derive(Debug, Clone)]
pub enum NavRequest {
    Present(PresentRequest),
    Dismiss(DismissRequest),
    Push(PushRequest),
    Pop(PopRequest),
    SetOptions(SetOptionsRequest),
    Reset(ResetRequest),
    Get(GetRequest),
    Message(MessageRequest),
    ViewReady(ViewReadyRequest),
}

#[derive(Debug, Clone)]
pub struct PresentRequest {
    pub component: ComponentSpec,
    pub style: PresentationStyle,
    pub animated: bool,
    /// Whether the user may dismiss the root natively (sheet swipe etc).
    pub cancellable: bool,
}

#[derive(Debug, Clone)]
pub struct DismissRequest {
    /// Root to dismiss; defaults to the top-most root.
    pub id: Option<ComponentId>,
    pub animated: bool,
}

#[derive(Debug, Clone)]
pub struct PushRequest {
    pub component: ViewSpec,
    /// Target stack or view; defaults to the top-most root.
    pub target: Option<ComponentId>,
    pub mode: PushMode,
    /// Entries to remove from the top before the push lands.
    pub pop_count: usize,
    pub animated: bool,
}

#[derive(Debug, Clone)]
pub struct PopRequest {
    pub target: Option<ComponentId>,
    pub count: usize,
    pub animated: bool,
}

#[derive(Debug, Clone)]
pub struct SetOptionsRequest {
    pub id: ComponentId,
    pub options: ComponentOptions,
    pub animated: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ResetRequest {
    pub animated: bool,
}

#[derive(Debug, Clone)]
pub struct GetRequest {
    pub id: Option<ComponentId>,
}

#[derive(Debug, Clone)]
pub struct MessageRequest {
    /// Addressee; defaults to the currently visible leaf view.
    pub target: Option<ComponentId>,
    pub message_type: String,
    pub value: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ViewReadyRequest {
    pub id: ComponentId,
}

impl NavRequest {
    /// Parses a request from a method name and its JSON payload.
    pub fn parse(method: &str, payload: &Value) -> Result<NavRequest> {
        let obj = as_object(payload, "payload")?;
        match method {
            "present" => Ok(NavRequest::Present(PresentRequest {
                component: ComponentSpec::from_value(
                    obj.get("component").ok_or_else(|| NavError::missing("component"))?,
                )?,
                style: match obj.get("style").and_then(Value::as_str) {
                    None => PresentationStyle::default(),
                    Some(style) => PresentationStyle::parse(style).ok_or_else(|| {
                        NavError::invalid("style", format!("unknown style `{style}`"))
                    })?,
                },
                animated: bool_field(obj, "animated", true)?,
                cancellable: bool_field(obj, "cancellable", true)?,
            })),
            "dismiss" => Ok(NavRequest::Dismiss(DismissRequest {
                id: id_field(obj, "id")?,
                animated: bool_field(obj, "animated", true)?,
            })),
            "push" => Ok(NavRequest::Push(PushRequest {
                component: ViewSpec::from_value(
                    obj.get("component").ok_or_else(|| NavError::missing("component"))?,
                )?,
                target: id_field(obj, "stack")?,
                mode: match obj.get("mode").and_then(Value::as_str) {
                    None => PushMode::default(),
                    Some(mode) => PushMode::parse(mode).ok_or_else(|| {
                        NavError::invalid("mode", format!("unknown push mode `{mode}`"))
                    })?,
                },
                pop_count: count_field(obj, "popCount", 0)?,
                animated: bool_field(obj, "animated", true)?,
            })),
            "pop" => Ok(NavRequest::Pop(PopRequest {
                target: id_field(obj, "stack")?,
                count: count_field(obj, "count", 1)?,
                animated: bool_field(obj, "animated", true)?,
            })),
            "setOptions" | "update" => Ok(NavRequest::SetOptions(SetOptionsRequest {
                id: id_field(obj, "id")?.ok_or_else(|| NavError::missing("id"))?,
                options: ComponentOptions::from_value(
                    obj.get("options").ok_or_else(|| NavError::missing("options"))?,
                )?,
                animated: bool_field(obj, "animated", false)?,
            })),
            "reset" => Ok(NavRequest::Reset(ResetRequest {
                animated: bool_field(obj, "animated", false)?,
            })),
            "get" => Ok(NavRequest::Get(GetRequest {
                id: id_field(obj, "id")?,
            })),
            "message" => Ok(NavRequest::Message(MessageRequest {
                target: id_field(obj, "target")?,
                message_type: obj
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| NavError::missing("type"))?
                    .to_string(),
                value: match obj.get("value") {
                    None | Some(Value::Null) => None,
                    Some(value) => Some(value.clone()),
                },
            })),
            "viewReady" => Ok(NavRequest::ViewReady(ViewReadyRequest {
                id: id_field(obj, "id")?.ok_or_else(|| NavError::missing("id"))?,
            })),
            other => Err(NavError::invalid(
                "method",
                format!("unknown method `{other}`"),
            )),
        }
    }
}

/// Result of a `present`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentResult {
    pub id: ComponentId,
}

impl PresentResult {
    pub fn to_value(&self) -> Value {
        json!({ "id": self.id })
    }
}

/// Result of a `dismiss`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DismissResult {
    pub id: ComponentId,
}

impl DismissResult {
    pub fn to_value(&self) -> Value {
        json!({ "id": self.id })
    }
}

/// Result of a `push`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResult {
    /// The id now on top (reused on an in-place replace).
    pub id: ComponentId,
    /// The stack pushed onto; absent when the target was a bare view.
    pub stack: Option<ComponentId>,
}

impl PushResult {
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("id".into(), json!(self.id));
        if let Some(stack) = &self.stack {
            obj.insert("stack".into(), json!(stack));
        }
        Value::Object(obj)
    }
}

/// Result of a `pop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopResult {
    pub stack: ComponentId,
    /// Entries actually removed, after clamping.
    pub count: usize,
    /// The deepest entry removed, if any.
    pub id: Option<ComponentId>,
}

impl PopResult {
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("stack".into(), json!(self.stack));
        obj.insert("count".into(), json!(self.count));
        if let Some(id) = &self.id {
            obj.insert("id".into(), json!(id));
        }
        Value::Object(obj)
    }
}

/// An outbound event to the content layer.
#[derive(Debug, Clone, PartialEq)]
pub enum NavEvent {
    /// A new empty native view needs content rendered into it.
    CreateView {
        id: ComponentId,
        path: String,
        state: Option<Value>,
        stack: Option<ComponentId>,
    },
    /// An existing view's content must be replaced in place.
    UpdateView {
        id: ComponentId,
        path: String,
        state: Option<Value>,
        stack: Option<ComponentId>,
    },
    /// The view left the tree; its content can be torn down.
    DestroyView { id: ComponentId },
    /// A navigation bar button was tapped.
    Click {
        button_id: String,
        component_id: ComponentId,
    },
    /// An embedder message addressed to a component's content.
    Message {
        target: ComponentId,
        message_type: String,
        value: Option<Value>,
    },
    ViewWillAppear { id: ComponentId },
    ViewDidAppear { id: ComponentId },
    ViewWillDisappear { id: ComponentId },
    ViewDidDisappear { id: ComponentId },
}

impl NavEvent {
    /// The wire name the embedder dispatches on.
    pub fn name(&self) -> String {
        match self {
            NavEvent::CreateView { .. } => "createView".into(),
            NavEvent::UpdateView { .. } => "updateView".into(),
            NavEvent::DestroyView { .. } => "destroyView".into(),
            NavEvent::Click { .. } => "click".into(),
            NavEvent::Message { .. } => "message".into(),
            NavEvent::ViewWillAppear { id } => format!("viewWillAppear:{id}"),
            NavEvent::ViewDidAppear { id } => format!("viewDidAppear:{id}"),
            NavEvent::ViewWillDisappear { id } => format!("viewWillDisappear:{id}"),
            NavEvent::ViewDidDisappear { id } => format!("viewDidDisappear:{id}"),
        }
    }

    /// The wire payload.
    pub fn data(&self) -> Value {
        match self {
            NavEvent::CreateView { id, path, state, stack }
            | NavEvent::UpdateView { id, path, state, stack } => {
                let mut obj = Map::new();
                obj.insert("id".into(), json!(id));
                obj.insert("path".into(), json!(path));
                if let Some(state) = state {
                    obj.insert("state".into(), state.clone());
                }
                if let Some(stack) = stack {
                    obj.insert("stack".into(), json!(stack));
                }
                Value::Object(obj)
            }
            NavEvent::DestroyView { id } => json!({ "id": id }),
            NavEvent::Click { button_id, component_id } => {
                json!({ "buttonId": button_id, "componentId": component_id })
            }
            NavEvent::Message { target, message_type, value } => {
                let mut obj = Map::new();
                obj.insert("target".into(), json!(target));
                obj.insert("type".into(), json!(message_type));
                if let Some(value) = value {
                    obj.insert("value".into(), value.clone());
                }
                Value::Object(obj)
            }
            NavEvent::ViewWillAppear { .. }
            | NavEvent::ViewDidAppear { .. }
            | NavEvent::ViewWillDisappear { .. }
            | NavEvent::ViewDidDisappear { .. } => json!({}),
        }
    }
}

fn id_field(obj: &Map<String, Value>, name: &str) -> Result<Option<ComponentId>> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(ComponentId::new(id.clone()))),
        Some(_) => Err(NavError::invalid(name, "expected a string")),
    }
}

fn bool_field(obj: &Map<String, Value>, name: &str, default: bool) -> Result<bool> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(NavError::invalid(name, "expected a boolean")),
    }
}

fn count_field(obj: &Map<String, Value>, name: &str, default: usize) -> Result<usize> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| NavError::invalid(name, "expected a non-negative integer")),
    }
}
