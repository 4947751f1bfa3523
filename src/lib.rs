//! Native navigation engine for hybrid web apps.
//!
//! # Conceptual overview
//! Perch lets a web content layer declare native navigation structure
//! (stacks, tabs, modally presented roots) and have it realized as real
//! platform navigation containers, while each screen's content is still
//! rendered by the web layer.
//!
//! ## Components
//! The content layer describes what it wants as a [`ComponentSpec`]: a small
//! tree where a `stack` holds an ordered list of views, `tabs` hold sibling
//! containers, and a `view` is a leaf rendered by the content layer at a
//! path. When a spec is presented, the engine creates one native element per
//! spec node through the [`Backend`] seam and registers each under a
//! [`ComponentId`] (caller-chosen or generated). Ids stay valid until the
//! component is destroyed, after which they may be reused.
//!
//! ## The readiness handshake
//! Native view elements are created empty. For each one the engine emits a
//! `createView` event; the content layer renders into the element and calls
//! [`Navigator::view_ready`]. Transitions that would reveal a view wait for
//! that signal, so the user never sees an unpainted screen.
//!
//! ## Serialization
//! Every mutating operation runs on a single-worker queue, one at a time,
//! including all of its internal waits. A second call made while the first
//! is animating simply queues behind it. The engine's own model (the
//! *virtual* state) is updated before any waiting begins, and `get` answers
//! from that model, so reads reflect the intended outcome of every
//! operation accepted so far rather than whatever frame the platform
//! animation happens to be on.
//!
//! ## Native input
//! Navigation can also originate natively: back gestures, sheet swipes, bar
//! button taps, tab selection. The platform layer reports these as
//! [`BackendEvent`]s and the engine reconciles its model to match, emitting
//! `destroyView` for anything the user navigated away from.
//!
//! ## Recovery
//! If the content layer never reports a view ready, the queue is stalled by
//! design. [`Navigator::reset`] abandons all pending waits out-of-band and
//! tears the whole presentation down, returning the engine to a clean
//! state.

pub mod backend;
pub mod component;
pub mod engine;
pub mod error;
pub mod options;
pub mod protocol;
pub mod queue;
pub mod registry;

mod bridge;

pub use crate::backend::{Backend, BackendEvent, ElementToken, NativeHandle, PresentationStyle};
pub use crate::component::{ComponentId, ComponentSpec, SpecNode, StackSpec, TabsSpec, ViewSpec};
pub use crate::engine::Navigator;
pub use crate::error::{NavError, Result};
pub use crate::options::{ComponentOptions, Nullable};
pub use crate::protocol::{
    DismissRequest, DismissResult, GetRequest, MessageRequest, NavEvent, NavRequest, PopRequest,
    PopResult, PresentRequest, PresentResult, PushMode, PushRequest, PushResult, ResetRequest,
    SetOptionsRequest, ViewReadyRequest,
};
