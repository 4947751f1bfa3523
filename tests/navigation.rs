mod support;

use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

use perch::{
    BackendEvent, ComponentId, ComponentSpec, DismissRequest, GetRequest, MessageRequest,
    NavError, NavEvent, Navigator, PopRequest, PresentRequest, PushMode, PushRequest,
    SetOptionsRequest, ViewSpec,
};
use support::{auto_ready, call_index, MockBackend};

fn present_req(component: serde_json::Value) -> PresentRequest {
    PresentRequest {
        component: ComponentSpec::from_value(&component).unwrap(),
        style: Default::default(),
        animated: true,
        cancellable: true,
    }
}

fn push_req(path: &str) -> PushRequest {
    PushRequest {
        component: ViewSpec::from_value(&json!({ "type": "view", "path": path })).unwrap(),
        target: None,
        mode: PushMode::Push,
        pop_count: 0,
        animated: true,
    }
}

fn pop_req(count: usize) -> PopRequest {
    PopRequest {
        target: None,
        count,
        animated: true,
    }
}

async fn stack_views(nav: &Navigator<MockBackend>, id: Option<&str>) -> Vec<ViewSpec> {
    let request = GetRequest {
        id: id.map(ComponentId::from),
    };
    match nav.get(request).await.unwrap() {
        ComponentSpec::Stack(stack) => stack.stack,
        other => panic!("expected a stack, got {other:?}"),
    }
}

async fn stack_paths(nav: &Navigator<MockBackend>, id: Option<&str>) -> Vec<String> {
    stack_views(nav, id).await.iter().map(|v| v.path.clone()).collect()
}

async fn next_create(events: &mut UnboundedReceiver<NavEvent>) -> ComponentId {
    loop {
        match events.recv().await.expect("event channel closed") {
            NavEvent::CreateView { id, .. } => return id,
            _ => continue,
        }
    }
}

#[tokio::test]
async fn present_creates_realizes_and_presents() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend.clone());
    auto_ready(nav.clone(), events);

    let result = nav
        .present(present_req(json!({
            "type": "stack",
            "id": "main",
            "stack": [ { "type": "view", "path": "/home" } ],
        })))
        .await
        .unwrap();
    assert_eq!(result.id, ComponentId::from("main"));

    assert_eq!(stack_paths(&nav, None).await, ["/home"]);
    assert_eq!(
        nav.presented_roots().await.unwrap(),
        [ComponentId::from("main")]
    );

    // realize order: elements, stack entries, then the presentation
    let calls = backend.calls();
    let created = call_index(&calls, "create_stack #1");
    let view = call_index(&calls, "create_view #2");
    let committed = call_index(&calls, "set_stack #1 [#2] animated=false");
    let presented = call_index(&calls, "present #1 fullScreen animated=true");
    assert!(created < view && view < committed && committed < presented);
}

#[tokio::test]
async fn get_reads_the_virtual_model_after_push() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend);
    auto_ready(nav.clone(), events);

    nav.present(present_req(json!({
        "type": "stack",
        "id": "main",
        "stack": [ { "type": "view", "path": "/home" } ],
    })))
    .await
    .unwrap();

    let pushed = nav.push(push_req("/detail")).await.unwrap();
    assert_eq!(pushed.stack, Some(ComponentId::from("main")));
    assert_eq!(stack_paths(&nav, None).await, ["/home", "/detail"]);
}

#[tokio::test]
async fn replace_reuses_the_top_view() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend.clone());
    let (_, seen) = auto_ready(nav.clone(), events);

    nav.present(present_req(json!({
        "type": "stack",
        "id": "main",
        "stack": [ { "type": "view", "path": "/one" } ],
    })))
    .await
    .unwrap();
    let second = nav.push(push_req("/two")).await.unwrap();

    let mut replace = push_req("/three");
    replace.mode = PushMode::Replace;
    let third = nav.push(replace).await.unwrap();

    // the top entry kept its identity, only its content changed
    assert_eq!(third.id, second.id);
    assert_eq!(stack_paths(&nav, None).await, ["/one", "/three"]);

    let view_creations = backend
        .calls()
        .iter()
        .filter(|c| c.starts_with("create_view"))
        .count();
    assert_eq!(view_creations, 2);
    let reused = second.id.clone();
    support::eventually(&seen, move |e| {
        matches!(e, NavEvent::UpdateView { id, path, .. } if *id == reused && path == "/three")
    })
    .await;
}

#[tokio::test]
async fn push_onto_an_empty_stack_is_never_animated() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend.clone());
    auto_ready(nav.clone(), events);

    nav.present(present_req(json!({ "type": "stack", "id": "main" })))
        .await
        .unwrap();
    nav.push(push_req("/first")).await.unwrap();

    let calls = backend.calls();
    call_index(&calls, "set_stack #1 [#2] animated=false");
    assert_eq!(stack_paths(&nav, None).await, ["/first"]);
}

#[tokio::test]
async fn push_mode_root_clears_the_stack() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend);
    let (_, seen) = auto_ready(nav.clone(), events);

    nav.present(present_req(json!({
        "type": "stack",
        "id": "main",
        "stack": [
            { "type": "view", "id": "a", "path": "/a" },
            { "type": "view", "id": "b", "path": "/b" },
        ],
    })))
    .await
    .unwrap();

    let mut root = push_req("/fresh");
    root.mode = PushMode::Root;
    nav.push(root).await.unwrap();

    assert_eq!(stack_paths(&nav, None).await, ["/fresh"]);
    for gone in ["a", "b"] {
        support::eventually(&seen, move |e| {
            matches!(e, NavEvent::DestroyView { id } if *id == ComponentId::from(gone))
        })
        .await;
    }
}

#[tokio::test]
async fn pop_clamps_so_the_root_entry_survives() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend);
    auto_ready(nav.clone(), events);

    nav.present(present_req(json!({
        "type": "stack",
        "id": "main",
        "stack": [ { "type": "view", "path": "/a" } ],
    })))
    .await
    .unwrap();

    let popped = nav.pop(pop_req(5)).await.unwrap();
    assert_eq!(popped.count, 0);
    assert_eq!(popped.id, None);
    assert_eq!(stack_paths(&nav, None).await, ["/a"]);

    let b = nav.push(push_req("/b")).await.unwrap();
    nav.push(push_req("/c")).await.unwrap();

    let popped = nav.pop(pop_req(2)).await.unwrap();
    assert_eq!(popped.count, 2);
    // the id names the deepest entry removed
    assert_eq!(popped.id, Some(b.id));
    assert_eq!(stack_paths(&nav, None).await, ["/a"]);
}

#[tokio::test]
async fn queued_push_pops_an_entry_still_waiting_for_content() {
    let backend = MockBackend::new();
    let (nav, mut events) = Navigator::new(backend);

    let presenting = {
        let nav = nav.clone();
        tokio::spawn(async move {
            nav.present(present_req(json!({
                "type": "stack",
                "id": "main",
                "stack": [ { "type": "view", "id": "a", "path": "/a" } ],
            })))
            .await
        })
    };
    let a = next_create(&mut events).await;
    nav.view_ready(&a).unwrap();
    presenting.await.unwrap().unwrap();

    // first push stalls on readiness while the second queues behind it
    let first = {
        let nav = nav.clone();
        tokio::spawn(async move { nav.push(push_req("/b")).await })
    };
    let b = next_create(&mut events).await;

    let second = {
        let nav = nav.clone();
        let mut request = push_req("/c");
        request.pop_count = 1;
        tokio::spawn(async move { nav.push(request).await })
    };

    nav.view_ready(&b).unwrap();
    first.await.unwrap().unwrap();

    let c = next_create(&mut events).await;
    nav.view_ready(&c).unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(stack_paths(&nav, None).await, ["/a", "/c"]);
}

#[tokio::test]
async fn dismissing_a_buried_root_represents_the_roots_above() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend.clone());
    auto_ready(nav.clone(), events);

    nav.present(present_req(json!({
        "type": "stack",
        "id": "lower",
        "stack": [ { "type": "view", "path": "/base" } ],
    })))
    .await
    .unwrap();
    nav.present(present_req(json!({
        "type": "stack",
        "id": "upper",
        "stack": [ { "type": "view", "path": "/sheet" } ],
    })))
    .await
    .unwrap();

    nav.dismiss(DismissRequest {
        id: Some(ComponentId::from("lower")),
        animated: true,
    })
    .await
    .unwrap();

    assert_eq!(
        nav.presented_roots().await.unwrap(),
        [ComponentId::from("upper")]
    );

    // upper (#3) detaches unanimated, lower (#1) dismisses, upper returns
    let calls = backend.calls();
    let detach = call_index(&calls, "dismiss #3 animated=false");
    let dismissal = call_index(&calls, "dismiss #1 animated=true");
    let restore = calls
        .iter()
        .rposition(|c| c == "present #3 fullScreen animated=false")
        .expect("upper root was not re-presented");
    assert!(detach < dismissal && dismissal < restore);
}

#[tokio::test]
async fn dismiss_queued_behind_a_stalled_present_completes() {
    let backend = MockBackend::new();
    let (nav, mut events) = Navigator::new(backend);

    let presenting = {
        let nav = nav.clone();
        tokio::spawn(async move {
            nav.present(present_req(json!({
                "type": "stack",
                "id": "main",
                "stack": [ { "type": "view", "id": "v", "path": "/home" } ],
            })))
            .await
        })
    };
    let v = next_create(&mut events).await;

    let dismissing = {
        let nav = nav.clone();
        tokio::spawn(async move {
            nav.dismiss(DismissRequest {
                id: None,
                animated: false,
            })
            .await
        })
    };

    nav.view_ready(&v).unwrap();
    presenting.await.unwrap().unwrap();
    dismissing.await.unwrap().unwrap();
    assert!(nav.presented_roots().await.unwrap().is_empty());
}

#[tokio::test]
async fn reset_recovers_a_creation_stalled_on_readiness() {
    let backend = MockBackend::new();
    let (nav, mut events) = Navigator::new(backend.clone());

    let presenting = {
        let nav = nav.clone();
        tokio::spawn(async move {
            nav.present(present_req(json!({
                "type": "stack",
                "id": "main",
                "stack": [ { "type": "view", "id": "v", "path": "/home" } ],
            })))
            .await
        })
    };
    next_create(&mut events).await;

    nav.reset(false).await.unwrap();

    let err = presenting.await.unwrap().unwrap_err();
    assert!(matches!(err, NavError::Cancelled(_)));
    assert!(nav.presented_roots().await.unwrap().is_empty());

    let err = nav.get(GetRequest { id: None }).await.unwrap_err();
    assert!(matches!(err, NavError::IllegalState(_)));

    // ids freed by the reset are usable again
    let result = nav
        .present(present_req(json!({ "type": "stack", "id": "main" })))
        .await
        .unwrap();
    assert_eq!(result.id, ComponentId::from("main"));
}

#[tokio::test]
async fn view_ready_without_a_pending_creation_fails() {
    let (nav, _events) = Navigator::<MockBackend>::new(MockBackend::new());
    let err = nav.view_ready(&ComponentId::from("ghost")).unwrap_err();
    assert!(matches!(err, NavError::IllegalState(_)));
}

#[tokio::test]
async fn set_options_merges_and_null_clears() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend.clone());
    auto_ready(nav.clone(), events);

    nav.present(present_req(json!({
        "type": "stack",
        "id": "main",
        "stack": [ { "type": "view", "path": "/home" } ],
    })))
    .await
    .unwrap();

    let base = perch::ComponentOptions::from_value(&json!({
        "title": "Home",
        "bar": { "background": { "color": "#fff" } },
    }))
    .unwrap();
    nav.set_options(SetOptionsRequest {
        id: ComponentId::from("main"),
        options: base,
        animated: false,
    })
    .await
    .unwrap();

    let update = perch::ComponentOptions::from_value(&json!({
        "title": null,
        "bar": { "visible": false },
    }))
    .unwrap();
    nav.set_options(SetOptionsRequest {
        id: ComponentId::from("main"),
        options: update,
        animated: false,
    })
    .await
    .unwrap();

    // the backend received the merged result: cleared title, kept color
    let (stack_token, _) = backend.created()[0];
    let merged = backend.options_for(stack_token).unwrap();
    let merged = merged.to_value();
    assert_eq!(merged["title"], json!(null));
    assert_eq!(merged["bar"]["background"]["color"], json!("#fff"));
    assert_eq!(merged["bar"]["visible"], json!(false));
}

#[tokio::test]
async fn message_reaches_the_visible_leaf_by_default() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend);
    let (_, seen) = auto_ready(nav.clone(), events);

    nav.present(present_req(json!({
        "type": "stack",
        "id": "main",
        "stack": [
            { "type": "view", "id": "a", "path": "/a" },
            { "type": "view", "id": "b", "path": "/b" },
        ],
    })))
    .await
    .unwrap();

    nav.message(MessageRequest {
        target: None,
        message_type: "refresh".into(),
        value: Some(json!({ "hard": true })),
    })
    .await
    .unwrap();

    support::eventually(&seen, |e| {
        matches!(
            e,
            NavEvent::Message { target, message_type, .. }
                if *target == ComponentId::from("b") && message_type == "refresh"
        )
    })
    .await;
}

#[tokio::test]
async fn back_navigation_trims_the_virtual_stack() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend.clone());
    let (_, seen) = auto_ready(nav.clone(), events);

    nav.present(present_req(json!({
        "type": "stack",
        "id": "main",
        "stack": [
            { "type": "view", "id": "a", "path": "/a" },
            { "type": "view", "id": "b", "path": "/b" },
        ],
    })))
    .await
    .unwrap();

    let created = backend.created();
    let (stack_token, _) = created[0];
    let (a_token, _) = created[1];

    nav.handle_backend_event(BackendEvent::BackNavigated {
        stack: stack_token,
        visible: a_token,
    })
    .await
    .unwrap();

    assert_eq!(stack_paths(&nav, None).await, ["/a"]);
    support::eventually(&seen, |e| {
        matches!(e, NavEvent::DestroyView { id } if *id == ComponentId::from("b"))
    })
    .await;
}

#[tokio::test]
async fn user_modal_dismissal_removes_the_root() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend.clone());
    auto_ready(nav.clone(), events);

    nav.present(present_req(json!({
        "type": "stack",
        "id": "main",
        "stack": [ { "type": "view", "path": "/home" } ],
    })))
    .await
    .unwrap();

    let (root_token, _) = backend.created()[0];
    nav.handle_backend_event(BackendEvent::ModalDismissed { root: root_token })
        .await
        .unwrap();

    assert!(nav.presented_roots().await.unwrap().is_empty());
    let err = nav.get(GetRequest { id: None }).await.unwrap_err();
    assert!(matches!(err, NavError::IllegalState(_)));
}

#[tokio::test]
async fn bar_button_clicks_are_forwarded_with_the_component_id() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend.clone());
    let (_, seen) = auto_ready(nav.clone(), events);

    nav.present(present_req(json!({
        "type": "stack",
        "id": "main",
        "stack": [ { "type": "view", "id": "v", "path": "/home" } ],
    })))
    .await
    .unwrap();

    let (view_token, _) = backend.created()[1];
    nav.handle_backend_event(BackendEvent::BarButtonClick {
        element: view_token,
        button: "save".into(),
    })
    .await
    .unwrap();

    support::eventually(&seen, |e| {
        matches!(
            e,
            NavEvent::Click { button_id, component_id }
                if button_id == "save" && *component_id == ComponentId::from("v")
        )
    })
    .await;
}

#[tokio::test]
async fn tab_selection_redirects_untargeted_pushes() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend.clone());
    auto_ready(nav.clone(), events);

    nav.present(present_req(json!({
        "type": "tabs",
        "id": "t",
        "tabs": [
            { "type": "stack", "id": "s1", "stack": [ { "type": "view", "path": "/a" } ] },
            { "type": "stack", "id": "s2", "stack": [ { "type": "view", "path": "/b" } ] },
        ],
    })))
    .await
    .unwrap();

    let (tabs_token, kind) = backend.created()[0];
    assert_eq!(kind, "tabs");
    nav.handle_backend_event(BackendEvent::TabSelected {
        tabs: tabs_token,
        index: 1,
    })
    .await
    .unwrap();

    nav.push(push_req("/b2")).await.unwrap();
    assert_eq!(stack_paths(&nav, Some("s1")).await, ["/a"]);
    assert_eq!(stack_paths(&nav, Some("s2")).await, ["/b", "/b2"]);
}

#[tokio::test]
async fn duplicate_explicit_ids_are_rejected() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend);
    auto_ready(nav.clone(), events);

    nav.present(present_req(json!({ "type": "stack", "id": "dup" })))
        .await
        .unwrap();
    let err = nav
        .present(present_req(json!({ "type": "stack", "id": "dup" })))
        .await
        .unwrap_err();
    assert!(matches!(err, NavError::AlreadyExists(id) if id == ComponentId::from("dup")));

    // the first presentation is untouched
    assert_eq!(
        nav.presented_roots().await.unwrap(),
        [ComponentId::from("dup")]
    );
}

#[tokio::test]
async fn operations_without_a_presentation_fail_cleanly() {
    let (nav, _events) = Navigator::<MockBackend>::new(MockBackend::new());

    let err = nav.push(push_req("/x")).await.unwrap_err();
    assert!(matches!(err, NavError::NoSuchStack));

    let err = nav
        .dismiss(DismissRequest {
            id: Some(ComponentId::from("nope")),
            animated: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, NavError::ComponentNotFound(_)));

    // reset on a clean engine is a no-op
    nav.reset(false).await.unwrap();
}

#[tokio::test]
async fn json_dispatch_round_trips() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend);
    auto_ready(nav.clone(), events);

    let result = nav
        .handle(
            "present",
            &json!({
                "component": {
                    "type": "stack",
                    "id": "main",
                    "stack": [ { "type": "view", "path": "/home" } ],
                },
                "animated": false,
            }),
        )
        .await
        .unwrap();
    assert_eq!(result, json!({ "id": "main" }));

    let tree = nav.handle("get", &json!({})).await.unwrap();
    assert_eq!(tree["type"], json!("stack"));
    assert_eq!(tree["stack"][0]["path"], json!("/home"));

    let err = nav.handle("teleport", &json!({})).await.unwrap_err();
    assert!(matches!(err, NavError::InvalidFieldValue { name, .. } if name == "method"));
}

#[tokio::test]
async fn a_failed_present_leaves_no_residue() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend.clone());
    let (_, seen) = auto_ready(nav.clone(), events);

    let spec = json!({
        "type": "stack",
        "id": "main",
        "stack": [ { "type": "view", "id": "home", "path": "/home" } ],
    });

    backend.plan_present_failures(&[true]);
    let err = nav.present(present_req(spec.clone())).await.unwrap_err();
    assert!(matches!(err, NavError::Backend(_)));
    assert!(nav.presented_roots().await.unwrap().is_empty());
    support::eventually(&seen, |e| {
        matches!(e, NavEvent::DestroyView { id } if *id == ComponentId::from("home"))
    })
    .await;

    // the ids are free again, so a plain retry succeeds
    nav.present(present_req(spec)).await.unwrap();
    assert_eq!(
        nav.presented_roots().await.unwrap(),
        [ComponentId::from("main")]
    );
    assert_eq!(stack_paths(&nav, None).await, ["/home"]);
}

#[tokio::test]
async fn a_failed_detach_during_dismiss_restores_the_covering_roots() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend.clone());
    auto_ready(nav.clone(), events);

    for id in ["a", "b", "c"] {
        nav.present(present_req(json!({
            "type": "stack",
            "id": id,
            "stack": [ { "type": "view", "path": format!("/{id}") } ],
        })))
        .await
        .unwrap();
    }

    // detaching runs top-down: c comes off cleanly, then b refuses
    backend.plan_dismiss_failures(&[false, true]);
    let err = nav
        .dismiss(DismissRequest {
            id: Some(ComponentId::from("a")),
            animated: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, NavError::Backend(_)));

    // c went back up and the model still claims all three roots
    assert_eq!(
        nav.presented_roots().await.unwrap(),
        ["a", "b", "c"].map(ComponentId::from)
    );
    let calls = backend.calls();
    let failed = call_index(&calls, "dismiss #3 failed");
    let restored = call_index(&calls, "present #5 fullScreen animated=false");
    assert!(failed < restored);

    // with the platform cooperating again the dismiss goes through
    nav.dismiss(DismissRequest {
        id: Some(ComponentId::from("a")),
        animated: false,
    })
    .await
    .unwrap();
    assert_eq!(
        nav.presented_roots().await.unwrap(),
        ["b", "c"].map(ComponentId::from)
    );
}

#[tokio::test]
async fn a_failed_stack_commit_destroys_what_it_popped() {
    let backend = MockBackend::new();
    let (nav, events) = Navigator::new(backend.clone());
    let (_, seen) = auto_ready(nav.clone(), events);

    nav.present(present_req(json!({
        "type": "stack",
        "id": "main",
        "stack": [ { "type": "view", "id": "a", "path": "/a" } ],
    })))
    .await
    .unwrap();
    nav.push(push_req("/b")).await.unwrap();

    backend.plan_commit_failures(&[true]);
    let mut fresh = push_req("/c");
    fresh.mode = PushMode::Root;
    let err = nav.push(fresh).await.unwrap_err();
    assert!(matches!(err, NavError::Backend(_)));

    // the cleared entries are gone rather than lingering unowned
    support::eventually(&seen, |e| {
        matches!(e, NavEvent::DestroyView { id } if *id == ComponentId::from("a"))
    })
    .await;
    assert_eq!(stack_paths(&nav, None).await, ["/c"]);
}
