//! The navigation engine.
//!
//! [`Navigator`] is the public handle: a cheaply cloneable front for a
//! single-worker [`SerialQueue`] that owns the [`Engine`] state. Every
//! mutation runs as one queued operation, start to finish, including any
//! waits on content readiness or native transitions, so overlapping calls
//! from the embedder can never interleave.
//!
//! The engine tracks the *intended* navigation state (the virtual model) and
//! commits it before waiting on anything asynchronous. Reads (`get`) answer
//! from the virtual model, so a caller that pushes and immediately reads
//! sees its push even while the platform animation is still running.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::backend::{Backend, BackendEvent, ElementToken, NativeHandle, PresentationStyle};
use crate::bridge::{ReadyOutcome, ViewLifecycleBridge};
use crate::component::{ComponentId, ComponentSpec, StackSpec, TabsSpec, ViewSpec};
use crate::error::{NavError, Result};
use crate::protocol::{
    DismissRequest, DismissResult, GetRequest, MessageRequest, NavEvent, NavRequest, PopRequest,
    PopResult, PresentRequest, PresentResult, PushMode, PushRequest, PushResult, SetOptionsRequest,
};
use crate::queue::SerialQueue;
use crate::registry::Registry;

/// A live component in the virtual model.
struct Component<R> {
    container: Option<ComponentId>,
    options: crate::options::ComponentOptions,
    element: Arc<NativeHandle<R>>,
    kind: ComponentKind,
}

enum ComponentKind {
    Stack { views: Vec<ComponentId> },
    Tabs { tabs: Vec<ComponentId>, selected: usize },
    View { path: String, state: Option<Value> },
}

/// Presentation parameters of a root, kept so the root can be detached and
/// re-presented identically when a root below it is dismissed.
#[derive(Clone)]
struct RootContext {
    id: ComponentId,
    style: PresentationStyle,
    cancellable: bool,
}

enum PushTarget {
    Stack(ComponentId),
    View(ComponentId),
}

pub(crate) struct Engine<B: Backend> {
    backend: Arc<B>,
    bridge: Arc<ViewLifecycleBridge>,
    registry: Registry<B::Element>,
    components: HashMap<ComponentId, Component<B::Element>>,
    /// Presented roots, bottom to top.
    roots: Vec<RootContext>,
    next_token: u64,
}

impl<B: Backend> Engine<B> {
    fn new(backend: Arc<B>, bridge: Arc<ViewLifecycleBridge>) -> Engine<B> {
        Engine {
            backend,
            bridge,
            registry: Registry::new(),
            components: HashMap::new(),
            roots: Vec::new(),
            next_token: 0,
        }
    }

    fn alloc_token(&mut self) -> ElementToken {
        self.next_token += 1;
        ElementToken(self.next_token)
    }

    fn component(&self, id: &ComponentId) -> Result<&Component<B::Element>> {
        self.components
            .get(id)
            .ok_or_else(|| NavError::ComponentNotFound(id.clone()))
    }

    fn component_mut(&mut self, id: &ComponentId) -> Result<&mut Component<B::Element>> {
        self.components
            .get_mut(id)
            .ok_or_else(|| NavError::ComponentNotFound(id.clone()))
    }

    fn entry_handles(&self, ids: &[ComponentId]) -> Result<Vec<Arc<NativeHandle<B::Element>>>> {
        ids.iter()
            .map(|id| Ok(self.component(id)?.element.clone()))
            .collect()
    }

    /// The view the user would see inside `id`.
    fn visible_leaf(&self, id: &ComponentId) -> ComponentId {
        match self.components.get(id).map(|c| &c.kind) {
            Some(ComponentKind::Stack { views }) => match views.last() {
                Some(top) => self.visible_leaf(top),
                None => id.clone(),
            },
            Some(ComponentKind::Tabs { tabs, selected }) => match tabs.get(*selected) {
                Some(tab) => self.visible_leaf(tab),
                None => id.clone(),
            },
            _ => id.clone(),
        }
    }

    fn root_of(&self, id: &ComponentId) -> ComponentId {
        let mut current = id.clone();
        while let Some(container) = self
            .components
            .get(&current)
            .and_then(|c| c.container.clone())
        {
            current = container;
        }
        current
    }

    /// The stack currently hosting `view`, checking the platform's committed
    /// back-stack first and the virtual model second (during an animation
    /// only one of the two may list the view yet).
    fn find_owning_stack(&self, view: &ComponentId) -> Option<ComponentId> {
        for (id, component) in &self.components {
            let ComponentKind::Stack { views } = &component.kind else {
                continue;
            };
            let native = self.backend.native_stack_entries(&component.element);
            let native_hit = native
                .iter()
                .any(|token| self.registry.id_for_token(*token) == Some(view));
            if native_hit || views.contains(view) {
                return Some(id.clone());
            }
        }
        None
    }

    // -- creation --

    fn create_component(
        &mut self,
        spec: &ComponentSpec,
        container: Option<&ComponentId>,
        created: &mut Vec<ComponentId>,
        pending: &mut Vec<(ComponentId, oneshot::Receiver<ReadyOutcome>)>,
    ) -> Result<ComponentId> {
        match spec {
            ComponentSpec::Stack(spec) => self.create_stack_component(spec, container, created, pending),
            ComponentSpec::Tabs(spec) => self.create_tabs_component(spec, container, created, pending),
            ComponentSpec::View(spec) => {
                self.create_view_component(spec, container, None, created, pending)
            }
        }
    }

    fn create_element(
        &mut self,
        id: &ComponentId,
        created: &mut Vec<ComponentId>,
        create: impl FnOnce(&B, ElementToken) -> Result<B::Element>,
    ) -> Result<Arc<NativeHandle<B::Element>>> {
        let token = self.alloc_token();
        let backing = create(self.backend.as_ref(), token)?;
        let element = NativeHandle::new(token, backing);
        if let Err(err) = self.registry.register(id, &element) {
            self.backend.dispose(&element);
            return Err(err);
        }
        created.push(id.clone());
        Ok(element)
    }

    fn create_stack_component(
        &mut self,
        spec: &StackSpec,
        container: Option<&ComponentId>,
        created: &mut Vec<ComponentId>,
        pending: &mut Vec<(ComponentId, oneshot::Receiver<ReadyOutcome>)>,
    ) -> Result<ComponentId> {
        let id = spec.id.clone().unwrap_or_else(ComponentId::generate);
        let element = self.create_element(&id, created, |b, t| b.create_stack(t))?;
        if !spec.options.is_empty() {
            self.backend.apply_options(&element, &spec.options, false)?;
        }
        let mut views = Vec::new();
        for view in &spec.stack {
            views.push(self.create_view_component(view, Some(&id), Some(&id), created, pending)?);
        }
        let entries = self.entry_handles(&views)?;
        self.backend.set_stack_entries(&element, &entries, false)?;
        self.components.insert(
            id.clone(),
            Component {
                container: container.cloned(),
                options: spec.options.clone(),
                element,
                kind: ComponentKind::Stack { views },
            },
        );
        Ok(id)
    }

    fn create_tabs_component(
        &mut self,
        spec: &TabsSpec,
        container: Option<&ComponentId>,
        created: &mut Vec<ComponentId>,
        pending: &mut Vec<(ComponentId, oneshot::Receiver<ReadyOutcome>)>,
    ) -> Result<ComponentId> {
        let id = spec.id.clone().unwrap_or_else(ComponentId::generate);
        let element = self.create_element(&id, created, |b, t| b.create_tabs(t))?;
        if !spec.options.is_empty() {
            self.backend.apply_options(&element, &spec.options, false)?;
        }
        let mut tabs = Vec::new();
        for tab in &spec.tabs {
            tabs.push(self.create_component(tab, Some(&id), created, pending)?);
        }
        let entries = self.entry_handles(&tabs)?;
        self.backend.set_tab_entries(&element, &entries)?;
        self.components.insert(
            id.clone(),
            Component {
                container: container.cloned(),
                options: spec.options.clone(),
                element,
                kind: ComponentKind::Tabs { tabs, selected: 0 },
            },
        );
        Ok(id)
    }

    fn create_view_component(
        &mut self,
        spec: &ViewSpec,
        container: Option<&ComponentId>,
        stack: Option<&ComponentId>,
        created: &mut Vec<ComponentId>,
        pending: &mut Vec<(ComponentId, oneshot::Receiver<ReadyOutcome>)>,
    ) -> Result<ComponentId> {
        let id = spec.id.clone().unwrap_or_else(ComponentId::generate);
        let element = self.create_element(&id, created, |b, t| b.create_view(t))?;
        if !spec.options.is_empty() {
            self.backend.apply_options(&element, &spec.options, false)?;
        }
        let rx = self
            .bridge
            .request_creation(&id, &spec.path, spec.state.as_ref(), stack);
        pending.push((id.clone(), rx));
        self.components.insert(
            id.clone(),
            Component {
                container: container.cloned(),
                options: spec.options.clone(),
                element,
                kind: ComponentKind::View {
                    path: spec.path.clone(),
                    state: spec.state.clone(),
                },
            },
        );
        Ok(id)
    }

    /// Undoes a partially completed creation, newest first.
    fn discard_created(&mut self, created: &[ComponentId]) {
        for id in created.iter().rev() {
            self.bridge.abandon(id);
            if let Some(component) = self.components.remove(id) {
                if matches!(component.kind, ComponentKind::View { .. }) {
                    self.bridge.emit(NavEvent::DestroyView { id: id.clone() });
                }
                self.backend.dispose(&component.element);
            }
            self.registry.unregister(id);
        }
    }

    /// Tears down a committed component and everything inside it.
    fn remove_component_tree(&mut self, id: &ComponentId) {
        let Some(component) = self.components.remove(id) else {
            return;
        };
        match &component.kind {
            ComponentKind::Stack { views } => {
                for view in views {
                    self.remove_component_tree(view);
                }
            }
            ComponentKind::Tabs { tabs, .. } => {
                for tab in tabs {
                    self.remove_component_tree(tab);
                }
            }
            ComponentKind::View { .. } => {
                self.bridge.abandon(id);
                self.bridge.emit(NavEvent::DestroyView { id: id.clone() });
            }
        }
        self.registry.unregister(id);
        self.backend.dispose(&component.element);
    }

    // -- operations --

    pub(crate) async fn present(&mut self, req: PresentRequest) -> Result<PresentResult> {
        if !self.backend.has_host_window() {
            return Err(NavError::IllegalState(
                "no host window to present into".into(),
            ));
        }

        let mut created = Vec::new();
        let mut pending = Vec::new();
        let root_id = match self.create_component(&req.component, None, &mut created, &mut pending)
        {
            Ok(id) => id,
            Err(err) => {
                self.discard_created(&created);
                return Err(err);
            }
        };
        debug!(id = %root_id, style = req.style.as_str(), "presenting root");

        if !await_readiness(pending).await {
            self.discard_created(&created);
            return Err(NavError::Cancelled(root_id));
        }

        let element = self.component(&root_id)?.element.clone();
        let leaf = self.visible_leaf(&root_id);
        self.bridge.emit(NavEvent::ViewWillAppear { id: leaf.clone() });
        if let Err(err) = self
            .backend
            .present(&element, req.style, req.cancellable, req.animated)
            .await
        {
            // nothing reached the screen; the created tree must not survive
            self.discard_created(&created);
            return Err(err);
        }
        self.roots.push(RootContext {
            id: root_id.clone(),
            style: req.style,
            cancellable: req.cancellable,
        });
        self.bridge.emit(NavEvent::ViewDidAppear { id: leaf });
        Ok(PresentResult { id: root_id })
    }

    pub(crate) async fn dismiss(&mut self, req: DismissRequest) -> Result<DismissResult> {
        let root_id = match &req.id {
            Some(id) => {
                if !self.components.contains_key(id) {
                    return Err(NavError::ComponentNotFound(id.clone()));
                }
                let root = self.root_of(id);
                if !self.roots.iter().any(|r| r.id == root) {
                    return Err(NavError::NotPresented(id.clone()));
                }
                root
            }
            None => {
                self.roots
                    .last()
                    .ok_or_else(|| NavError::IllegalState("nothing is presented".into()))?
                    .id
                    .clone()
            }
        };
        debug!(id = %root_id, "dismissing root");

        let index = self
            .roots
            .iter()
            .position(|r| r.id == root_id)
            .expect("presented root missing from roots list");

        // roots stacked above must come off first, top-down, and go back
        // afterwards in their original order
        let above: Vec<RootContext> = self.roots[index + 1..].to_vec();
        let mut detached: Vec<RootContext> = Vec::new();
        for ctx in above.iter().rev() {
            let element = self.component(&ctx.id)?.element.clone();
            if let Err(err) = self.backend.dismiss(&element, false).await {
                self.restore_detached(&detached).await;
                return Err(err);
            }
            detached.push(ctx.clone());
        }

        let element = self.component(&root_id)?.element.clone();
        let leaf = self.visible_leaf(&root_id);
        self.bridge
            .emit(NavEvent::ViewWillDisappear { id: leaf.clone() });
        if let Err(err) = self.backend.dismiss(&element, req.animated).await {
            self.restore_detached(&detached).await;
            return Err(err);
        }
        self.bridge.emit(NavEvent::ViewDidDisappear { id: leaf });
        self.roots.remove(index);
        self.remove_component_tree(&root_id);

        for ctx in &above {
            let element = self.component(&ctx.id)?.element.clone();
            self.backend
                .present(&element, ctx.style, ctx.cancellable, false)
                .await?;
        }
        Ok(DismissResult { id: root_id })
    }

    /// Puts roots detached for a dismiss that then failed back on screen,
    /// bottom-up, so the platform matches the unchanged model again.
    async fn restore_detached(&mut self, detached: &[RootContext]) {
        for ctx in detached.iter().rev() {
            let Some(element) = self.registry.lookup(&ctx.id) else {
                continue;
            };
            if let Err(err) = self
                .backend
                .present(&element, ctx.style, ctx.cancellable, false)
                .await
            {
                warn!(id = %ctx.id, error = %err, "re-present after a failed dismiss failed");
            }
        }
    }

    fn resolve_push_target(&self, target: Option<&ComponentId>) -> Result<PushTarget> {
        let id = match target {
            Some(id) => {
                if !self.components.contains_key(id) {
                    return Err(NavError::ComponentNotFound(id.clone()));
                }
                id.clone()
            }
            None => self
                .roots
                .last()
                .ok_or(NavError::NoSuchStack)?
                .id
                .clone(),
        };
        self.descend_to_stack_or_view(&id)
    }

    fn descend_to_stack_or_view(&self, id: &ComponentId) -> Result<PushTarget> {
        match &self.component(id)?.kind {
            ComponentKind::Stack { .. } => Ok(PushTarget::Stack(id.clone())),
            ComponentKind::Tabs { tabs, selected } => {
                let tab = tabs
                    .get(*selected)
                    .ok_or_else(|| NavError::IllegalState("tabs component has no tabs".into()))?;
                self.descend_to_stack_or_view(tab)
            }
            ComponentKind::View { .. } => match self.find_owning_stack(id) {
                Some(stack) => Ok(PushTarget::Stack(stack)),
                None => Ok(PushTarget::View(id.clone())),
            },
        }
    }

    pub(crate) async fn push(&mut self, req: PushRequest) -> Result<PushResult> {
        match self.resolve_push_target(req.target.as_ref())? {
            PushTarget::Stack(stack) => self.push_on_stack(stack, req).await,
            PushTarget::View(view) => self.replace_view_content(view, req).await,
        }
    }

    async fn push_on_stack(
        &mut self,
        stack_id: ComponentId,
        req: PushRequest,
    ) -> Result<PushResult> {
        let mut views = match &self.component(&stack_id)?.kind {
            ComponentKind::Stack { views } => views.clone(),
            _ => unreachable!("push target resolved to a non-stack"),
        };
        debug!(stack = %stack_id, mode = ?req.mode, pop_count = req.pop_count, "pushing");

        let was_empty = views.is_empty();
        let mut popped: Vec<ComponentId> = Vec::new();
        if req.pop_count > 0 {
            let keep = views.len().saturating_sub(req.pop_count);
            popped.extend(views.drain(keep..));
        }

        // a replace of a top view reuses its element and id, swapping the
        // content in place instead of recreating
        let reuse = if req.mode == PushMode::Replace {
            views.last().cloned().filter(|top| {
                matches!(
                    self.components.get(top).map(|c| &c.kind),
                    Some(ComponentKind::View { .. })
                )
            })
        } else {
            None
        };

        let (view_id, rx, created) = match reuse {
            Some(existing) => {
                let spec = &req.component;
                let component = self.component_mut(&existing)?;
                let ComponentKind::View { path, state } = &mut component.kind else {
                    unreachable!("reused component is not a view");
                };
                *path = spec.path.clone();
                *state = spec.state.clone();
                component.options = spec.options.clone();
                let element = component.element.clone();
                self.backend.apply_options(&element, &spec.options, false)?;
                let rx = self.bridge.request_update(
                    &existing,
                    &spec.path,
                    spec.state.as_ref(),
                    Some(&stack_id),
                );
                (existing, rx, Vec::new())
            }
            None => {
                let mut created = Vec::new();
                let mut pending = Vec::new();
                let id = match self.create_view_component(
                    &req.component,
                    Some(&stack_id),
                    Some(&stack_id),
                    &mut created,
                    &mut pending,
                ) {
                    Ok(id) => id,
                    Err(err) => {
                        self.discard_created(&created);
                        return Err(err);
                    }
                };
                let (_, rx) = pending.pop().expect("view creation produced no readiness waiter");
                (id, rx, created)
            }
        };

        let mut animated = req.animated;
        if was_empty {
            views = vec![view_id.clone()];
            // the first entry appears without a transition
            animated = false;
        } else {
            match req.mode {
                PushMode::Push => views.push(view_id.clone()),
                PushMode::Replace => {
                    if let Some(top) = views.pop() {
                        popped.push(top);
                    }
                    views.push(view_id.clone());
                }
                PushMode::Root => {
                    popped.extend(views.drain(..));
                    views.push(view_id.clone());
                }
            }
        }
        popped.retain(|p| *p != view_id);

        // commit the intended state before waiting on anything
        self.set_stack_views(&stack_id, views.clone())?;

        if !matches!(rx.await, Ok(ReadyOutcome::Ready)) {
            self.discard_created(&created);
            if let Ok(component) = self.component_mut(&stack_id) {
                if let ComponentKind::Stack { views } = &mut component.kind {
                    views.retain(|v| *v != view_id);
                }
            }
            return Err(NavError::Cancelled(view_id));
        }

        let element = self.component(&stack_id)?.element.clone();
        let entries = self.entry_handles(&views)?;
        self.bridge
            .emit(NavEvent::ViewWillAppear { id: view_id.clone() });
        // set_stack_entries resolves on acceptance of the transition, so
        // the did event marks the commit rather than the animation
        if let Err(err) = self.backend.set_stack_entries(&element, &entries, animated) {
            for id in &popped {
                self.remove_component_tree(id);
            }
            return Err(err);
        }
        self.bridge
            .emit(NavEvent::ViewDidAppear { id: view_id.clone() });

        for id in &popped {
            self.remove_component_tree(id);
        }
        Ok(PushResult {
            id: view_id,
            stack: Some(stack_id),
        })
    }

    /// A push targeting a bare view (one not hosted by any stack) replaces
    /// that view's content in place.
    async fn replace_view_content(
        &mut self,
        view_id: ComponentId,
        req: PushRequest,
    ) -> Result<PushResult> {
        debug!(view = %view_id, "replacing view content");
        let spec = &req.component;
        let component = self.component_mut(&view_id)?;
        let ComponentKind::View { path, state } = &mut component.kind else {
            unreachable!("push target resolved to a non-view");
        };
        *path = spec.path.clone();
        *state = spec.state.clone();
        component.options = spec.options.clone();
        let element = component.element.clone();
        self.backend.apply_options(&element, &spec.options, false)?;

        let rx = self
            .bridge
            .request_update(&view_id, &spec.path, spec.state.as_ref(), None);
        if !matches!(rx.await, Ok(ReadyOutcome::Ready)) {
            return Err(NavError::Cancelled(view_id));
        }
        Ok(PushResult {
            id: view_id,
            stack: None,
        })
    }

    pub(crate) async fn pop(&mut self, req: PopRequest) -> Result<PopResult> {
        let stack_id = match self.resolve_push_target(req.target.as_ref())? {
            PushTarget::Stack(stack) => stack,
            PushTarget::View(_) => {
                return Err(NavError::IllegalState("can only pop from a stack".into()))
            }
        };
        let views = match &self.component(&stack_id)?.kind {
            ComponentKind::Stack { views } => views.clone(),
            _ => unreachable!("pop target resolved to a non-stack"),
        };

        // the bottom entry never pops
        let clamped = req.count.min(views.len().saturating_sub(1));
        debug!(stack = %stack_id, requested = req.count, count = clamped, "popping");
        if clamped == 0 {
            return Ok(PopResult {
                stack: stack_id,
                count: 0,
                id: None,
            });
        }

        let keep = views.len() - clamped;
        let remaining = views[..keep].to_vec();
        let popped = views[keep..].to_vec();
        self.set_stack_views(&stack_id, remaining.clone())?;

        let top = popped.last().expect("clamped pop removed no entries").clone();
        self.bridge
            .emit(NavEvent::ViewWillDisappear { id: top.clone() });
        let element = self.component(&stack_id)?.element.clone();
        let entries = self.entry_handles(&remaining)?;
        if let Err(err) = self.backend.set_stack_entries(&element, &entries, req.animated) {
            for id in &popped {
                self.remove_component_tree(id);
            }
            return Err(err);
        }
        self.bridge.emit(NavEvent::ViewDidDisappear { id: top });

        for id in &popped {
            self.remove_component_tree(id);
        }
        Ok(PopResult {
            stack: stack_id,
            count: clamped,
            id: Some(popped[0].clone()),
        })
    }

    fn set_stack_views(&mut self, stack_id: &ComponentId, views: Vec<ComponentId>) -> Result<()> {
        let component = self.component_mut(stack_id)?;
        match &mut component.kind {
            ComponentKind::Stack { views: stored } => {
                *stored = views;
                Ok(())
            }
            _ => Err(NavError::IllegalState(format!(
                "component `{stack_id}` is not a stack"
            ))),
        }
    }

    pub(crate) fn set_options(&mut self, req: SetOptionsRequest) -> Result<()> {
        let component = self.component_mut(&req.id)?;
        component.options.merge(&req.options);
        let options = component.options.clone();
        let element = component.element.clone();
        self.backend.apply_options(&element, &options, req.animated)?;
        Ok(())
    }

    pub(crate) fn get(&self, req: &GetRequest) -> Result<ComponentSpec> {
        let id = match &req.id {
            Some(id) => id.clone(),
            None => {
                self.roots
                    .last()
                    .ok_or_else(|| NavError::IllegalState("nothing is presented".into()))?
                    .id
                    .clone()
            }
        };
        self.spec_of(&id)
    }

    fn spec_of(&self, id: &ComponentId) -> Result<ComponentSpec> {
        let component = self.component(id)?;
        Ok(match &component.kind {
            ComponentKind::Stack { views } => ComponentSpec::Stack(StackSpec {
                id: Some(id.clone()),
                options: component.options.clone(),
                stack: views
                    .iter()
                    .map(|view| self.view_spec_of(view))
                    .collect::<Result<_>>()?,
            }),
            ComponentKind::Tabs { tabs, .. } => ComponentSpec::Tabs(TabsSpec {
                id: Some(id.clone()),
                options: component.options.clone(),
                tabs: tabs
                    .iter()
                    .map(|tab| self.spec_of(tab))
                    .collect::<Result<_>>()?,
            }),
            ComponentKind::View { .. } => ComponentSpec::View(self.view_spec_of(id)?),
        })
    }

    fn view_spec_of(&self, id: &ComponentId) -> Result<ViewSpec> {
        let component = self.component(id)?;
        match &component.kind {
            ComponentKind::View { path, state } => Ok(ViewSpec {
                id: Some(id.clone()),
                options: component.options.clone(),
                path: path.clone(),
                state: state.clone(),
            }),
            _ => Err(NavError::IllegalState(format!(
                "component `{id}` is not a view"
            ))),
        }
    }

    pub(crate) fn message(&self, req: MessageRequest) -> Result<()> {
        let target = match req.target {
            Some(id) => {
                self.component(&id)?;
                id
            }
            None => {
                let root = self
                    .roots
                    .last()
                    .ok_or_else(|| NavError::IllegalState("nothing is presented".into()))?;
                self.visible_leaf(&root.id)
            }
        };
        self.bridge.emit(NavEvent::Message {
            target,
            message_type: req.message_type,
            value: req.value,
        });
        Ok(())
    }

    pub(crate) async fn reset(&mut self, animated: bool) -> Result<()> {
        debug!(roots = self.roots.len(), "resetting");
        // waiters were already abandoned before this op entered the queue;
        // catch any registered since
        self.bridge.abandon_all();

        let roots: Vec<ComponentId> = self.roots.iter().map(|r| r.id.clone()).collect();
        for root in roots.iter().rev() {
            if let Some(element) = self.registry.lookup(root) {
                if let Err(err) = self.backend.dismiss(&element, animated).await {
                    warn!(id = %root, error = %err, "dismiss during reset failed");
                }
            }
        }
        self.roots.clear();

        let ids: Vec<ComponentId> = self.components.keys().cloned().collect();
        for id in ids {
            self.remove_component_tree(&id);
        }
        self.registry.clear();
        Ok(())
    }

    pub(crate) fn backend_event(&mut self, event: BackendEvent) -> Result<()> {
        match event {
            BackendEvent::BarButtonClick { element, button } => {
                let Some(id) = self.registry.id_for_token(element).cloned() else {
                    debug!(%element, "click on unknown element");
                    return Ok(());
                };
                self.bridge.emit(NavEvent::Click {
                    button_id: button,
                    component_id: id,
                });
                Ok(())
            }
            BackendEvent::BackNavigated { stack, visible } => {
                let stack_id = self
                    .registry
                    .id_for_token(stack)
                    .cloned()
                    .ok_or_else(|| NavError::IllegalState("back navigation on unknown stack".into()))?;
                let visible_id = self
                    .registry
                    .id_for_token(visible)
                    .cloned()
                    .ok_or_else(|| NavError::IllegalState("back navigation to unknown entry".into()))?;
                let component = self.component_mut(&stack_id)?;
                let ComponentKind::Stack { views } = &mut component.kind else {
                    return Err(NavError::IllegalState(format!(
                        "component `{stack_id}` is not a stack"
                    )));
                };
                // already reconciled (e.g. an engine-driven pop)
                let Some(position) = views.iter().position(|v| *v == visible_id) else {
                    return Ok(());
                };
                let trimmed: Vec<ComponentId> = views.drain(position + 1..).collect();
                debug!(stack = %stack_id, trimmed = trimmed.len(), "reconciling back navigation");
                for id in &trimmed {
                    self.remove_component_tree(id);
                }
                Ok(())
            }
            BackendEvent::ModalDismissed { root } => {
                let Some(id) = self.registry.id_for_token(root).cloned() else {
                    return Ok(());
                };
                debug!(id = %id, "user dismissed root");
                self.roots.retain(|r| r.id != id);
                let leaf = self.visible_leaf(&id);
                self.bridge.emit(NavEvent::ViewDidDisappear { id: leaf });
                self.remove_component_tree(&id);
                Ok(())
            }
            BackendEvent::TabSelected { tabs, index } => {
                let id = self
                    .registry
                    .id_for_token(tabs)
                    .cloned()
                    .ok_or_else(|| NavError::IllegalState("selection on unknown tabs".into()))?;
                let component = self.component_mut(&id)?;
                let ComponentKind::Tabs { tabs, selected } = &mut component.kind else {
                    return Err(NavError::IllegalState(format!(
                        "component `{id}` is not tabs"
                    )));
                };
                if index >= tabs.len() {
                    return Err(NavError::IllegalState(format!(
                        "tab index {index} out of range"
                    )));
                }
                *selected = index;
                Ok(())
            }
        }
    }
}

async fn await_readiness(
    pending: Vec<(ComponentId, oneshot::Receiver<ReadyOutcome>)>,
) -> bool {
    if pending.is_empty() {
        return true;
    }
    let waits = pending
        .into_iter()
        .map(|(_, rx)| async move { matches!(rx.await, Ok(ReadyOutcome::Ready)) });
    join_all(waits).await.into_iter().all(|ready| ready)
}

/// The public handle to a navigation engine.
///
/// Cloning is cheap and all clones share the same engine. Dropping the last
/// clone shuts the engine down.
pub struct Navigator<B: Backend> {
    queue: SerialQueue<Engine<B>>,
    bridge: Arc<ViewLifecycleBridge>,
}

impl<B: Backend> Clone for Navigator<B> {
    fn clone(&self) -> Self {
        Navigator {
            queue: self.queue.clone(),
            bridge: self.bridge.clone(),
        }
    }
}

impl<B: Backend> Navigator<B> {
    /// Starts an engine over `backend`. Returns the navigator and the stream
    /// of events for the embedder to forward to the content layer.
    ///
    /// Requires a Tokio runtime.
    pub fn new(backend: B) -> (Navigator<B>, mpsc::UnboundedReceiver<NavEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(ViewLifecycleBridge::new(tx));
        let engine = Engine::new(Arc::new(backend), bridge.clone());
        let queue = SerialQueue::spawn(engine);
        (Navigator { queue, bridge }, rx)
    }

    /// Creates a component tree and presents it over the host window.
    /// Resolves once every view reported ready and the native transition
    /// finished.
    pub async fn present(&self, request: PresentRequest) -> Result<PresentResult> {
        self.queue
            .perform(move |engine| engine.present(request).boxed())
            .await
    }

    /// Dismisses a presented root (the top-most if `id` is absent).
    pub async fn dismiss(&self, request: DismissRequest) -> Result<DismissResult> {
        self.queue
            .perform(move |engine| engine.dismiss(request).boxed())
            .await
    }

    /// Pushes a view onto a stack.
    pub async fn push(&self, request: PushRequest) -> Result<PushResult> {
        self.queue
            .perform(move |engine| engine.push(request).boxed())
            .await
    }

    /// Pops entries off a stack. Never pops the bottom entry.
    pub async fn pop(&self, request: PopRequest) -> Result<PopResult> {
        self.queue
            .perform(move |engine| engine.pop(request).boxed())
            .await
    }

    /// Merges options into a component and restyles it.
    pub async fn set_options(&self, request: SetOptionsRequest) -> Result<()> {
        self.queue
            .perform(move |engine| async move { engine.set_options(request) }.boxed())
            .await
    }

    /// Reads the live spec rooted at `request.id` (the top-most root if
    /// absent) from the virtual model.
    pub async fn get(&self, request: GetRequest) -> Result<ComponentSpec> {
        self.queue
            .perform(move |engine| async move { engine.get(&request) }.boxed())
            .await
    }

    /// Sends a message event to a component's content.
    pub async fn message(&self, request: MessageRequest) -> Result<()> {
        self.queue
            .perform(move |engine| async move { engine.message(request) }.boxed())
            .await
    }

    /// Tears everything down. Safe to call at any time, including while an
    /// operation is stalled waiting for content readiness.
    pub async fn reset(&self, animated: bool) -> Result<()> {
        // wake any stalled creation first so the teardown can enter the queue
        self.bridge.abandon_all();
        self.queue
            .perform(move |engine| engine.reset(animated).boxed())
            .await
    }

    /// Reports that the content layer finished rendering into a view.
    /// Bypasses the operation queue.
    pub fn view_ready(&self, id: &ComponentId) -> Result<()> {
        self.bridge.view_ready(id)
    }

    /// Feeds a natively-originated notification into the engine.
    pub async fn handle_backend_event(&self, event: BackendEvent) -> Result<()> {
        self.queue
            .perform(move |engine| async move { engine.backend_event(event) }.boxed())
            .await
    }

    /// The ids of the presented roots, bottom to top.
    pub async fn presented_roots(&self) -> Result<Vec<ComponentId>> {
        self.queue
            .perform(|engine| {
                let roots = engine.roots.iter().map(|r| r.id.clone()).collect();
                async move { Ok(roots) }.boxed()
            })
            .await
    }

    /// Parses and dispatches a raw JSON request, returning the raw JSON
    /// result. This is the surface a plugin bridge calls into.
    pub async fn handle(&self, method: &str, payload: &Value) -> Result<Value> {
        match NavRequest::parse(method, payload)? {
            NavRequest::Present(request) => {
                self.present(request).await.map(|r| r.to_value())
            }
            NavRequest::Dismiss(request) => {
                self.dismiss(request).await.map(|r| r.to_value())
            }
            NavRequest::Push(request) => self.push(request).await.map(|r| r.to_value()),
            NavRequest::Pop(request) => self.pop(request).await.map(|r| r.to_value()),
            NavRequest::SetOptions(request) => {
                self.set_options(request).await.map(|_| Value::Null)
            }
            NavRequest::Reset(request) => {
                self.reset(request.animated).await.map(|_| Value::Null)
            }
            NavRequest::Get(request) => self.get(request).await.map(|s| s.to_value()),
            NavRequest::Message(request) => {
                self.message(request).await.map(|_| Value::Null)
            }
            NavRequest::ViewReady(request) => {
                self.view_ready(&request.id).map(|_| Value::Null)
            }
        }
    }
}
