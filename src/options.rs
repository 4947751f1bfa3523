//! Component styling options and the merge layer.
//!
//! Options updates are partial: every field distinguishes *absent* (leave the
//! stored value alone), *null* (clear the stored value), and *value*
//! (overwrite). [`Nullable`] carries the null/value half of that tri-state;
//! the absent half is an ordinary `Option` around it. Nested structures are
//! replaced whole on merge, except the navigation bar which merges one level
//! deep so a visibility toggle does not discard colors.

use serde_json::{json, Map, Value};

use crate::component::as_object;
use crate::error::{NavError, Result};

/// An explicitly-clearable option value.
///
/// `Null` means the caller asked for the stored value to be cleared, which is
/// distinct from not mentioning the field at all.
#[derive(Debug, Clone, PartialEq)]
pub enum Nullable<T> {
    Null,
    Value(T),
}

impl<T> Nullable<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Nullable::Null => None,
            Nullable::Value(value) => Some(value),
        }
    }
}

/// Styling options attached to a component.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentOptions {
    pub title: Option<Nullable<String>>,
    /// Bar-item configuration used while the component sits in a stack.
    pub stack: Option<Nullable<StackBarOptions>>,
    /// Tab-button configuration used while the component sits in tabs.
    pub tab: Option<Nullable<TabOptions>>,
    /// Navigation bar styling (stack components).
    pub bar: Option<Nullable<BarOptions>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StackBarOptions {
    pub back_item: Option<BarItem>,
    pub left_items: Option<Vec<BarItem>>,
    pub right_items: Option<Vec<BarItem>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabOptions {
    pub image: Option<String>,
    pub badge_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BarOptions {
    pub background: Option<Nullable<FillOptions>>,
    pub title: Option<Nullable<LabelOptions>>,
    pub buttons: Option<Nullable<LabelOptions>>,
    pub visible: Option<Nullable<bool>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillOptions {
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelOptions {
    pub color: Option<String>,
    pub font: Option<FontOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontOptions {
    pub name: String,
    pub size: f64,
}

/// A button in the navigation bar. Clicks come back to the content layer as
/// `click` events carrying this id.
#[derive(Debug, Clone, PartialEq)]
pub struct BarItem {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
}

impl ComponentOptions {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.stack.is_none() && self.tab.is_none() && self.bar.is_none()
    }

    /// Merges `update` into `self` field by field.
    pub fn merge(&mut self, update: &ComponentOptions) {
        if let Some(title) = &update.title {
            self.title = Some(title.clone());
        }
        if let Some(stack) = &update.stack {
            self.stack = Some(stack.clone());
        }
        if let Some(tab) = &update.tab {
            self.tab = Some(tab.clone());
        }
        match (&mut self.bar, &update.bar) {
            (_, None) => {}
            (Some(Nullable::Value(current)), Some(Nullable::Value(update))) => {
                current.merge(update);
            }
            (slot, Some(bar)) => *slot = Some(bar.clone()),
        }
    }

    pub fn from_value(value: &Value) -> Result<ComponentOptions> {
        let obj = as_object(value, "options")?;
        Ok(ComponentOptions {
            title: nullable_field(obj, "title", |v| {
                str_value(v, "title").map(str::to_string)
            })?,
            stack: nullable_field(obj, "stack", StackBarOptions::parse)?,
            tab: nullable_field(obj, "tab", TabOptions::parse)?,
            bar: nullable_field(obj, "bar", BarOptions::parse)?,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        put_nullable(&mut obj, "title", &self.title, |t| json!(t));
        put_nullable(&mut obj, "stack", &self.stack, StackBarOptions::to_value);
        put_nullable(&mut obj, "tab", &self.tab, TabOptions::to_value);
        put_nullable(&mut obj, "bar", &self.bar, BarOptions::to_value);
        Value::Object(obj)
    }
}

impl StackBarOptions {
    fn parse(value: &Value) -> Result<StackBarOptions> {
        let obj = as_object(value, "stack")?;
        let items = |name: &str| -> Result<Option<Vec<BarItem>>> {
            match obj.get(name) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::Array(items)) => {
                    items.iter().map(BarItem::parse).collect::<Result<_>>().map(Some)
                }
                Some(_) => Err(NavError::invalid(name, "expected an array")),
            }
        };
        Ok(StackBarOptions {
            back_item: match obj.get("backItem") {
                None | Some(Value::Null) => None,
                Some(item) => Some(BarItem::parse(item)?),
            },
            left_items: items("leftItems")?,
            right_items: items("rightItems")?,
        })
    }

    fn to_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(item) = &self.back_item {
            obj.insert("backItem".into(), item.to_value());
        }
        if let Some(items) = &self.left_items {
            obj.insert(
                "leftItems".into(),
                Value::Array(items.iter().map(BarItem::to_value).collect()),
            );
        }
        if let Some(items) = &self.right_items {
            obj.insert(
                "rightItems".into(),
                Value::Array(items.iter().map(BarItem::to_value).collect()),
            );
        }
        Value::Object(obj)
    }
}

impl TabOptions {
    fn parse(value: &Value) -> Result<TabOptions> {
        let obj = as_object(value, "tab")?;
        Ok(TabOptions {
            image: opt_str(obj, "image")?,
            badge_value: opt_str(obj, "badgeValue")?,
        })
    }

    fn to_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(image) = &self.image {
            obj.insert("image".into(), json!(image));
        }
        if let Some(badge) = &self.badge_value {
            obj.insert("badgeValue".into(), json!(badge));
        }
        Value::Object(obj)
    }
}

impl BarOptions {
    fn parse(value: &Value) -> Result<BarOptions> {
        let obj = as_object(value, "bar")?;
        Ok(BarOptions {
            background: nullable_field(obj, "background", FillOptions::parse)?,
            title: nullable_field(obj, "title", |v| LabelOptions::parse(v, "title"))?,
            buttons: nullable_field(obj, "buttons", |v| LabelOptions::parse(v, "buttons"))?,
            visible: nullable_field(obj, "visible", |v| {
                v.as_bool()
                    .ok_or_else(|| NavError::invalid("visible", "expected a boolean"))
            })?,
        })
    }

    /// Per-field merge, so partial bar updates keep unrelated styling.
    fn merge(&mut self, update: &BarOptions) {
        if let Some(background) = &update.background {
            self.background = Some(background.clone());
        }
        if let Some(title) = &update.title {
            self.title = Some(title.clone());
        }
        if let Some(buttons) = &update.buttons {
            self.buttons = Some(buttons.clone());
        }
        if let Some(visible) = &update.visible {
            self.visible = Some(visible.clone());
        }
    }

    fn to_value(&self) -> Value {
        let mut obj = Map::new();
        put_nullable(&mut obj, "background", &self.background, FillOptions::to_value);
        put_nullable(&mut obj, "title", &self.title, LabelOptions::to_value);
        put_nullable(&mut obj, "buttons", &self.buttons, LabelOptions::to_value);
        put_nullable(&mut obj, "visible", &self.visible, |v| json!(v));
        Value::Object(obj)
    }
}

impl FillOptions {
    fn parse(value: &Value) -> Result<FillOptions> {
        let obj = as_object(value, "background")?;
        Ok(FillOptions {
            color: obj
                .get("color")
                .and_then(Value::as_str)
                .ok_or_else(|| NavError::missing("color"))?
                .to_string(),
        })
    }

    fn to_value(&self) -> Value {
        json!({ "color": self.color })
    }
}

impl LabelOptions {
    fn parse(value: &Value, name: &str) -> Result<LabelOptions> {
        let obj = as_object(value, name)?;
        Ok(LabelOptions {
            color: opt_str(obj, "color")?,
            font: match obj.get("font") {
                None | Some(Value::Null) => None,
                Some(font) => Some(FontOptions::parse(font)?),
            },
        })
    }

    fn to_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(color) = &self.color {
            obj.insert("color".into(), json!(color));
        }
        if let Some(font) = &self.font {
            obj.insert("font".into(), font.to_value());
        }
        Value::Object(obj)
    }
}

impl FontOptions {
    fn parse(value: &Value) -> Result<FontOptions> {
        let obj = as_object(value, "font")?;
        Ok(FontOptions {
            name: obj
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| NavError::missing("name"))?
                .to_string(),
            size: obj
                .get("size")
                .and_then(Value::as_f64)
                .ok_or_else(|| NavError::missing("size"))?,
        })
    }

    fn to_value(&self) -> Value {
        json!({ "name": self.name, "size": self.size })
    }
}

impl BarItem {
    fn parse(value: &Value) -> Result<BarItem> {
        let obj = as_object(value, "item")?;
        Ok(BarItem {
            id: obj
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| NavError::missing("id"))?
                .to_string(),
            title: obj
                .get("title")
                .and_then(Value::as_str)
                .ok_or_else(|| NavError::missing("title"))?
                .to_string(),
            image: opt_str(obj, "image")?,
        })
    }

    fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("id".into(), json!(self.id));
        obj.insert("title".into(), json!(self.title));
        if let Some(image) = &self.image {
            obj.insert("image".into(), json!(image));
        }
        Value::Object(obj)
    }
}

fn nullable_field<T>(
    obj: &Map<String, Value>,
    name: &str,
    parse: impl FnOnce(&Value) -> Result<T>,
) -> Result<Option<Nullable<T>>> {
    match obj.get(name) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(Nullable::Null)),
        Some(value) => Ok(Some(Nullable::Value(parse(value)?))),
    }
}

fn put_nullable<T>(
    obj: &mut Map<String, Value>,
    name: &str,
    field: &Option<Nullable<T>>,
    to_value: impl FnOnce(&T) -> Value,
) {
    match field {
        None => {}
        Some(Nullable::Null) => {
            obj.insert(name.into(), Value::Null);
        }
        Some(Nullable::Value(value)) => {
            obj.insert(name.into(), to_value(value));
        }
    }
}

fn str_value<'a>(value: &'a Value, name: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| NavError::invalid(name, "expected a string"))
}

fn opt_str(obj: &Map<String, Value>, name: &str) -> Result<Option<String>> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => str_value(value, name).map(|s| Some(s.to_string())),
    }
}
