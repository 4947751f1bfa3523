//! The declarative component model.
//!
//! A [`ComponentSpec`] describes a tree of navigation containers and content
//! views: a `stack` holds an ordered list of views, `tabs` hold sibling
//! containers, and a `view` is a leaf that the content layer renders at a
//! `path`. Specs arrive as loose JSON from the content layer and are parsed
//! field-by-field so that a bad request names the exact offending field.

use std::fmt;

use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::{NavError, Result};
use crate::options::ComponentOptions;

/// Identifies a component for its entire lifetime.
///
/// Ids are caller-supplied or generated (UUID v4) at creation, and become
/// reusable once the component is destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> ComponentId {
        ComponentId(id.into())
    }

    pub fn generate() -> ComponentId {
        ComponentId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> ComponentId {
        ComponentId(id.to_string())
    }
}

/// A component tree as requested by the content layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentSpec {
    Stack(StackSpec),
    Tabs(TabsSpec),
    View(ViewSpec),
}

/// An ordered navigation stack of views.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StackSpec {
    pub id: Option<ComponentId>,
    pub options: ComponentOptions,
    pub stack: Vec<ViewSpec>,
}

/// Sibling containers selectable through a tab bar.
///
/// Tabs may contain stacks or bare views, but never other tabs.
#[derive(Debug, Clone, PartialEq)]
pub struct TabsSpec {
    pub id: Option<ComponentId>,
    pub options: ComponentOptions,
    pub tabs: Vec<ComponentSpec>,
}

/// A leaf content view, rendered by the content layer at `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpec {
    pub id: Option<ComponentId>,
    pub options: ComponentOptions,
    pub path: String,
    /// Opaque state handed back to the content layer on creation.
    pub state: Option<Value>,
}

impl ComponentSpec {
    /// Parses a spec from loose JSON.
    pub fn from_value(value: &Value) -> Result<ComponentSpec> {
        let obj = as_object(value, "component")?;
        match require_str(obj, "type")? {
            "stack" => Ok(ComponentSpec::Stack(StackSpec::parse(obj)?)),
            "tabs" => Ok(ComponentSpec::Tabs(TabsSpec::parse(obj)?)),
            "view" => Ok(ComponentSpec::View(ViewSpec::parse(obj)?)),
            other => Err(NavError::invalid(
                "type",
                format!("unknown component type `{other}`"),
            )),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ComponentSpec::Stack(spec) => spec.to_value(),
            ComponentSpec::Tabs(spec) => spec.to_value(),
            ComponentSpec::View(spec) => spec.to_value(),
        }
    }

    pub fn id(&self) -> Option<&ComponentId> {
        match self {
            ComponentSpec::Stack(spec) => spec.id.as_ref(),
            ComponentSpec::Tabs(spec) => spec.id.as_ref(),
            ComponentSpec::View(spec) => spec.id.as_ref(),
        }
    }

    pub fn options(&self) -> &ComponentOptions {
        match self {
            ComponentSpec::Stack(spec) => &spec.options,
            ComponentSpec::Tabs(spec) => &spec.options,
            ComponentSpec::View(spec) => &spec.options,
        }
    }

    /// Pre-order traversal of this spec and all nested specs.
    pub fn flatten(&self) -> Vec<SpecNode<'_>> {
        let mut out = Vec::new();
        self.as_node().flatten_into(&mut out);
        out
    }

    fn as_node(&self) -> SpecNode<'_> {
        match self {
            ComponentSpec::Stack(spec) => SpecNode::Stack(spec),
            ComponentSpec::Tabs(spec) => SpecNode::Tabs(spec),
            ComponentSpec::View(spec) => SpecNode::View(spec),
        }
    }
}

/// A borrowed node in a spec tree, as produced by [`ComponentSpec::flatten`].
#[derive(Debug, Clone, Copy)]
pub enum SpecNode<'a> {
    Stack(&'a StackSpec),
    Tabs(&'a TabsSpec),
    View(&'a ViewSpec),
}

impl<'a> SpecNode<'a> {
    pub fn id(&self) -> Option<&'a ComponentId> {
        match self {
            SpecNode::Stack(spec) => spec.id.as_ref(),
            SpecNode::Tabs(spec) => spec.id.as_ref(),
            SpecNode::View(spec) => spec.id.as_ref(),
        }
    }

    fn flatten_into(self, out: &mut Vec<SpecNode<'a>>) {
        out.push(self);
        match self {
            SpecNode::Stack(spec) => {
                for view in &spec.stack {
                    out.push(SpecNode::View(view));
                }
            }
            SpecNode::Tabs(spec) => {
                for tab in &spec.tabs {
                    tab.as_node().flatten_into(out);
                }
            }
            SpecNode::View(_) => {}
        }
    }
}

impl StackSpec {
    fn parse(obj: &Map<String, Value>) -> Result<StackSpec> {
        let mut stack = Vec::new();
        if let Some(value) = obj.get("stack") {
            let entries = value
                .as_array()
                .ok_or_else(|| NavError::invalid("stack", "expected an array"))?;
            for entry in entries {
                let child = as_object(entry, "stack")?;
                match require_str(child, "type")? {
                    "view" => stack.push(ViewSpec::parse(child)?),
                    other => {
                        return Err(NavError::invalid(
                            "stack",
                            format!("stack entries must be views, got `{other}`"),
                        ))
                    }
                }
            }
        }
        Ok(StackSpec {
            id: id_field(obj)?,
            options: options_field(obj)?,
            stack,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut obj = spec_header("stack", &self.id, &self.options);
        obj.insert(
            "stack".into(),
            Value::Array(self.stack.iter().map(ViewSpec::to_value).collect()),
        );
        Value::Object(obj)
    }
}

impl TabsSpec {
    fn parse(obj: &Map<String, Value>) -> Result<TabsSpec> {
        let entries = obj
            .get("tabs")
            .ok_or_else(|| NavError::missing("tabs"))?
            .as_array()
            .ok_or_else(|| NavError::invalid("tabs", "expected an array"))?;
        let mut tabs = Vec::new();
        for entry in entries {
            let tab = ComponentSpec::from_value(entry)?;
            if matches!(tab, ComponentSpec::Tabs(_)) {
                return Err(NavError::invalid("tabs", "tabs cannot be nested"));
            }
            tabs.push(tab);
        }
        Ok(TabsSpec {
            id: id_field(obj)?,
            options: options_field(obj)?,
            tabs,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut obj = spec_header("tabs", &self.id, &self.options);
        obj.insert(
            "tabs".into(),
            Value::Array(self.tabs.iter().map(ComponentSpec::to_value).collect()),
        );
        Value::Object(obj)
    }
}

impl ViewSpec {
    fn parse(obj: &Map<String, Value>) -> Result<ViewSpec> {
        let path = obj
            .get("path")
            .ok_or_else(|| NavError::missing("path"))?
            .as_str()
            .ok_or_else(|| NavError::invalid("path", "expected a string"))?
            .to_string();
        let state = match obj.get("state") {
            None | Some(Value::Null) => None,
            Some(state @ Value::Object(_)) => Some(state.clone()),
            Some(_) => return Err(NavError::invalid("state", "expected an object")),
        };
        Ok(ViewSpec {
            id: id_field(obj)?,
            options: options_field(obj)?,
            path,
            state,
        })
    }

    /// Parses a spec that must be a view.
    pub fn from_value(value: &Value) -> Result<ViewSpec> {
        match ComponentSpec::from_value(value)? {
            ComponentSpec::View(spec) => Ok(spec),
            _ => Err(NavError::invalid("type", "expected a view component")),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut obj = spec_header("view", &self.id, &self.options);
        obj.insert("path".into(), json!(self.path));
        if let Some(state) = &self.state {
            obj.insert("state".into(), state.clone());
        }
        Value::Object(obj)
    }
}

fn spec_header(
    ty: &str,
    id: &Option<ComponentId>,
    options: &ComponentOptions,
) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert("type".into(), json!(ty));
    if let Some(id) = id {
        obj.insert("id".into(), json!(id.as_str()));
    }
    if !options.is_empty() {
        obj.insert("options".into(), options.to_value());
    }
    obj
}

fn id_field(obj: &Map<String, Value>) -> Result<Option<ComponentId>> {
    match obj.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(ComponentId::new(id.clone()))),
        Some(_) => Err(NavError::invalid("id", "expected a string")),
    }
}

fn options_field(obj: &Map<String, Value>) -> Result<ComponentOptions> {
    match obj.get("options") {
        None | Some(Value::Null) => Ok(ComponentOptions::default()),
        Some(value) => ComponentOptions::from_value(value),
    }
}

pub(crate) fn as_object<'a>(value: &'a Value, name: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| NavError::invalid(name, "expected an object"))
}

pub(crate) fn require_str<'a>(obj: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    obj.get(name)
        .ok_or_else(|| NavError::missing(name))?
        .as_str()
        .ok_or_else(|| NavError::invalid(name, "expected a string"))
}
