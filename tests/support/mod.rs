//! Shared test backend.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use perch::{
    Backend, ComponentOptions, ElementToken, NativeHandle, NavError, NavEvent, Navigator,
    PresentationStyle, Result,
};

/// A scripted backend that records every call it receives.
#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    calls: Mutex<Vec<String>>,
    created: Mutex<Vec<(ElementToken, &'static str)>>,
    stacks: Mutex<HashMap<ElementToken, Vec<ElementToken>>>,
    presented: Mutex<Vec<ElementToken>>,
    options: Mutex<HashMap<ElementToken, ComponentOptions>>,
    present_failures: Mutex<VecDeque<bool>>,
    dismiss_failures: Mutex<VecDeque<bool>>,
    commit_failures: Mutex<VecDeque<bool>>,
}

pub struct MockElement {
    pub kind: &'static str,
}

impl MockBackend {
    pub fn new() -> MockBackend {
        MockBackend::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.calls.lock().clone()
    }

    /// Created element tokens in creation order, with their kinds.
    pub fn created(&self) -> Vec<(ElementToken, &'static str)> {
        self.inner.created.lock().clone()
    }

    pub fn presented(&self) -> Vec<ElementToken> {
        self.inner.presented.lock().clone()
    }

    pub fn options_for(&self, token: ElementToken) -> Option<ComponentOptions> {
        self.inner.options.lock().get(&token).cloned()
    }

    /// Scripts outcomes for upcoming `present` calls; `true` fails that
    /// call, anything beyond the plan succeeds.
    pub fn plan_present_failures(&self, plan: &[bool]) {
        *self.inner.present_failures.lock() = plan.iter().copied().collect();
    }

    pub fn plan_dismiss_failures(&self, plan: &[bool]) {
        *self.inner.dismiss_failures.lock() = plan.iter().copied().collect();
    }

    /// Scripts outcomes for upcoming `set_stack_entries` calls.
    pub fn plan_commit_failures(&self, plan: &[bool]) {
        *self.inner.commit_failures.lock() = plan.iter().copied().collect();
    }

    fn next_failure(plan: &Mutex<VecDeque<bool>>) -> bool {
        plan.lock().pop_front().unwrap_or(false)
    }

    fn record(&self, call: String) {
        self.inner.calls.lock().push(call);
    }

    fn create(&self, token: ElementToken, kind: &'static str) -> MockElement {
        self.record(format!("create_{kind} {token}"));
        self.inner.created.lock().push((token, kind));
        MockElement { kind }
    }
}

#[async_trait]
impl Backend for MockBackend {
    type Element = MockElement;

    fn has_host_window(&self) -> bool {
        true
    }

    fn create_stack(&self, token: ElementToken) -> Result<MockElement> {
        Ok(self.create(token, "stack"))
    }

    fn create_tabs(&self, token: ElementToken) -> Result<MockElement> {
        Ok(self.create(token, "tabs"))
    }

    fn create_view(&self, token: ElementToken) -> Result<MockElement> {
        Ok(self.create(token, "view"))
    }

    async fn present(
        &self,
        root: &NativeHandle<MockElement>,
        style: PresentationStyle,
        _cancellable: bool,
        animated: bool,
    ) -> Result<()> {
        if Self::next_failure(&self.inner.present_failures) {
            self.record(format!("present {} failed", root.token()));
            return Err(NavError::Backend("scripted present failure".into()));
        }
        self.record(format!(
            "present {} {} animated={animated}",
            root.token(),
            style.as_str()
        ));
        self.inner.presented.lock().push(root.token());
        Ok(())
    }

    async fn dismiss(&self, root: &NativeHandle<MockElement>, animated: bool) -> Result<()> {
        if Self::next_failure(&self.inner.dismiss_failures) {
            self.record(format!("dismiss {} failed", root.token()));
            return Err(NavError::Backend("scripted dismiss failure".into()));
        }
        self.record(format!("dismiss {} animated={animated}", root.token()));
        self.inner.presented.lock().retain(|t| *t != root.token());
        Ok(())
    }

    fn set_stack_entries(
        &self,
        stack: &NativeHandle<MockElement>,
        entries: &[Arc<NativeHandle<MockElement>>],
        animated: bool,
    ) -> Result<()> {
        if Self::next_failure(&self.inner.commit_failures) {
            self.record(format!("set_stack {} failed", stack.token()));
            return Err(NavError::Backend("scripted commit failure".into()));
        }
        let tokens: Vec<ElementToken> = entries.iter().map(|e| e.token()).collect();
        let listed: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        self.record(format!(
            "set_stack {} [{}] animated={animated}",
            stack.token(),
            listed.join(" ")
        ));
        self.inner.stacks.lock().insert(stack.token(), tokens);
        Ok(())
    }

    fn set_tab_entries(
        &self,
        tabs: &NativeHandle<MockElement>,
        entries: &[Arc<NativeHandle<MockElement>>],
    ) -> Result<()> {
        let listed: Vec<String> = entries.iter().map(|e| e.token().to_string()).collect();
        self.record(format!("set_tabs {} [{}]", tabs.token(), listed.join(" ")));
        Ok(())
    }

    fn native_stack_entries(&self, stack: &NativeHandle<MockElement>) -> Vec<ElementToken> {
        self.inner
            .stacks
            .lock()
            .get(&stack.token())
            .cloned()
            .unwrap_or_default()
    }

    fn apply_options(
        &self,
        element: &NativeHandle<MockElement>,
        options: &ComponentOptions,
        animated: bool,
    ) -> Result<()> {
        self.record(format!("apply_options {} animated={animated}", element.token()));
        self.inner
            .options
            .lock()
            .insert(element.token(), options.clone());
        Ok(())
    }

    fn dispose(&self, element: &NativeHandle<MockElement>) {
        self.record(format!("dispose {}", element.token()));
        self.inner.stacks.lock().remove(&element.token());
    }
}

/// Forwards every `createView`/`updateView` straight back as `viewReady` and
/// collects all events for later inspection.
pub fn auto_ready(
    nav: Navigator<MockBackend>,
    mut events: UnboundedReceiver<NavEvent>,
) -> (JoinHandle<()>, Arc<Mutex<Vec<NavEvent>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let collected = seen.clone();
    let handle = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let ready = match &event {
                NavEvent::CreateView { id, .. } | NavEvent::UpdateView { id, .. } => {
                    Some(id.clone())
                }
                _ => None,
            };
            collected.lock().push(event);
            if let Some(id) = ready {
                let _ = nav.view_ready(&id);
            }
        }
    });
    (handle, seen)
}

/// Waits for the forwarder task to observe a matching event.
pub async fn eventually(seen: &Arc<Mutex<Vec<NavEvent>>>, pred: impl Fn(&NavEvent) -> bool) {
    for _ in 0..200 {
        if seen.lock().iter().any(&pred) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    panic!("expected event not observed, saw {:#?}", seen.lock());
}

/// Position of the first call equal to `needle`, panicking with context if
/// absent.
pub fn call_index(calls: &[String], needle: &str) -> usize {
    calls
        .iter()
        .position(|c| c == needle)
        .unwrap_or_else(|| panic!("call `{needle}` not found in {calls:#?}"))
}
