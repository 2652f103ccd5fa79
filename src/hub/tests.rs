//! Unit tests for the `hub` module: connection reuse, binding bookkeeping and routing.
//! `hub` 模块的单元测试：连接复用、绑定管理和事件路由。

use super::*;
use crate::{
    connection::ReadyState,
    event::EventKind,
    testing::{MockTransport, Recorder},
};

const URL: &str = "ws://example.com/";

struct HubHarness {
    hub: SocketHub<MockTransport>,
    transport: MockTransport,
}

impl HubHarness {
    fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    fn with_config(config: HubConfig) -> Self {
        let transport = MockTransport::new();
        Self {
            hub: SocketHub::with_config(transport.clone(), config),
            transport,
        }
    }

    fn attach(&self, address: &str, context: ContextId, owner: &Arc<Recorder>) -> ConnectionHandle {
        self.hub
            .attach(&EndpointSpec::from(address), None, AttachRequest::new(context, owner))
            .unwrap()
    }
}

#[test]
fn test_invalid_endpoint_is_refused_without_state_changes() {
    let harness = HubHarness::new();
    let owner = Recorder::new();

    for endpoint in [
        EndpointSpec::from("http://example.com"),
        EndpointSpec::from(""),
        EndpointSpec::List(Vec::new()),
    ] {
        let result = harness
            .hub
            .attach(&endpoint, None, AttachRequest::new(ContextId::next(), &owner));
        assert!(matches!(result, Err(Error::InvalidEndpoint(_))));
    }

    assert_eq!(harness.transport.connects(), 0);
    assert!(harness.hub.addresses().is_empty());
}

#[test]
fn test_two_contexts_share_one_connection() {
    let harness = HubHarness::new();
    let (a, b) = (Recorder::new(), Recorder::new());

    let first = harness.attach("ws://example.com", ContextId::next(), &a);
    let second = harness.attach("ws://example.com", ContextId::next(), &b);

    assert!(first.ptr_eq(&second));
    assert_eq!(harness.transport.connects(), 1);
    assert_eq!(harness.hub.addresses(), vec![URL.to_owned()]);
    assert_eq!(harness.hub.binding_count(URL), 2);

    let socket = harness.transport.socket(URL).unwrap();
    assert_eq!(socket.receive("tick"), RoutingResult::Dispatched(2));
    assert_eq!(socket.receive("tock"), RoutingResult::Dispatched(2));

    assert_eq!(a.messages(), ["tick", "tock"]);
    assert_eq!(b.messages(), ["tick", "tock"]);
}

#[test]
fn test_reattach_same_context_does_not_duplicate_delivery() {
    let harness = HubHarness::new();
    let owner = Recorder::new();
    let context = ContextId::next();

    let first = harness.attach(URL, context, &owner);
    let second = harness
        .hub
        .attach(&EndpointSpec::from(URL), Some(&first), AttachRequest::new(context, &owner))
        .unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(harness.hub.binding_count(URL), 1);

    harness.transport.socket(URL).unwrap().receive("once");
    assert_eq!(owner.count(EventKind::Message), 1);
}

#[test]
fn test_routing_is_installed_once_per_connection() {
    let harness = HubHarness::new();
    let owner = Recorder::new();

    for _ in 0..3 {
        harness.attach(URL, ContextId::next(), &owner);
    }

    let socket = harness.transport.socket(URL).unwrap();
    assert_eq!(socket.sink_installs(), 1);
}

#[test]
fn test_superseded_connection_bindings_are_skipped() {
    let harness = HubHarness::new();
    let (stale, fresh) = (Recorder::new(), Recorder::new());

    let old = harness.attach(URL, ContextId::next(), &stale);
    let old_socket = harness.transport.socket(URL).unwrap();
    old.close();
    old_socket.finish_close(1000, "bye");
    assert_eq!(old.ready_state(), ReadyState::Closed);

    let new = harness.attach(URL, ContextId::next(), &fresh);
    assert!(!old.ptr_eq(&new));
    assert_eq!(harness.transport.connects(), 2);
    // The stale binding is still recorded at the same address.
    assert_eq!(harness.hub.binding_count(URL), 2);

    let new_socket = harness.transport.socket(URL).unwrap();
    assert_eq!(new_socket.receive("fresh"), RoutingResult::Dispatched(1));

    assert_eq!(fresh.messages(), ["fresh"]);
    assert!(stale.messages().is_empty());
    assert_eq!(stale.count(EventKind::Close), 1);
}

#[test]
fn test_events_from_a_closed_connection_never_reach_new_bindings() {
    let harness = HubHarness::new();
    let (stale, fresh) = (Recorder::new(), Recorder::new());

    harness.attach(URL, ContextId::next(), &stale);
    let old_socket = harness.transport.socket(URL).unwrap();
    old_socket.finish_close(1006, "");

    harness.attach(URL, ContextId::next(), &fresh);
    old_socket.receive("late");

    assert!(fresh.events().is_empty());
}

#[test]
fn test_closing_connection_is_not_reused() {
    let harness = HubHarness::new();
    let owner = Recorder::new();

    let first = harness.attach(URL, ContextId::next(), &owner);
    first.close();
    assert_eq!(first.ready_state(), ReadyState::Closing);

    let second = harness.attach(URL, ContextId::next(), &owner);
    assert!(!first.ptr_eq(&second));
    assert!(harness.hub.connection(URL).unwrap().ptr_eq(&second));
}

#[test]
fn test_detach_honours_keep_alive() {
    let harness = HubHarness::new();
    let owner = Recorder::new();
    let handle = harness.attach(URL, ContextId::next(), &owner);
    let socket = harness.transport.socket(URL).unwrap();

    harness.hub.detach(Some(&handle), true);
    assert_eq!(socket.close_calls(), 0);
    assert_eq!(harness.hub.binding_count(URL), 1);

    harness.hub.detach(Some(&handle), false);
    assert_eq!(socket.close_calls(), 1);
    // Closing never touches registry membership.
    assert_eq!(harness.hub.binding_count(URL), 1);

    harness.hub.detach(None, false);
}

#[test]
fn test_release_removes_only_own_binding() {
    let harness = HubHarness::new();
    let (a, b) = (Recorder::new(), Recorder::new());
    let (ctx_a, ctx_b) = (ContextId::next(), ContextId::next());
    harness.attach(URL, ctx_a, &a);
    harness.attach(URL, ctx_b, &b);

    assert!(harness.hub.release(URL, ctx_a));
    assert!(!harness.hub.release(URL, ctx_a));
    assert!(!harness.hub.release("ws://unknown/", ctx_b));

    harness.transport.socket(URL).unwrap().receive("only b");
    assert!(a.messages().is_empty());
    assert_eq!(b.messages(), ["only b"]);
}

#[test]
fn test_dropped_owner_is_skipped() {
    let harness = HubHarness::new();
    let kept = Recorder::new();
    let dropped = Recorder::new();
    let handle = harness.attach(URL, ContextId::next(), &kept);
    harness.attach(URL, ContextId::next(), &dropped);
    drop(dropped);

    assert_eq!(harness.hub.bound_to(&handle), 1);
    let socket = harness.transport.socket(URL).unwrap();
    assert_eq!(socket.receive("hi"), RoutingResult::Dispatched(1));
}

#[test]
fn test_candidates_fall_through_to_next_on_connect_failure() {
    let harness = HubHarness::new();
    harness.transport.refuse("ws://primary/");
    let owner = Recorder::new();

    let endpoint = EndpointSpec::from(&["ws://primary", "ws://backup"][..]);
    let handle = harness
        .hub
        .attach(&endpoint, None, AttachRequest::new(ContextId::next(), &owner))
        .unwrap();

    assert_eq!(handle.url(), "ws://backup/");
    assert_eq!(harness.hub.addresses(), vec!["ws://backup/".to_owned()]);
}

#[test]
fn test_all_candidates_refused_returns_last_error() {
    let harness = HubHarness::new();
    harness.transport.refuse(URL);
    let owner = Recorder::new();

    let result = harness
        .hub
        .attach(&EndpointSpec::from(URL), None, AttachRequest::new(ContextId::next(), &owner));
    assert!(result.is_err());
    assert_eq!(harness.hub.binding_count(URL), 0);
}

#[test]
fn test_binary_type_defaults_and_overrides() {
    let harness = HubHarness::with_config(HubConfig {
        default_binary_type: BinaryType::ArrayBuffer,
        ..HubConfig::default()
    });
    let owner = Recorder::new();

    let default = harness.attach("ws://a", ContextId::next(), &owner);
    assert_eq!(default.binary_type(), BinaryType::ArrayBuffer);

    let request = AttachRequest::new(ContextId::next(), &owner).with_binary_type(Some(BinaryType::Blob));
    let explicit = harness.hub.attach(&EndpointSpec::from("ws://b"), None, request).unwrap();
    assert_eq!(explicit.binary_type(), BinaryType::Blob);
    assert_eq!(
        harness.transport.socket("ws://b/").unwrap().binary_type(),
        BinaryType::Blob
    );
}

#[test]
fn test_close_event_forgets_connection_and_prunes() {
    let harness = HubHarness::with_config(HubConfig {
        prune_empty_entries: true,
        ..HubConfig::default()
    });
    let owner = Recorder::new();
    let context = ContextId::next();
    harness.attach(URL, context, &owner);

    assert!(harness.hub.release(URL, context));
    // The live connection keeps the entry around.
    assert_eq!(harness.hub.addresses(), vec![URL.to_owned()]);

    harness.transport.socket(URL).unwrap().finish_close(1000, "");
    assert!(harness.hub.connection(URL).is_none());
    assert!(harness.hub.addresses().is_empty());
}

#[test]
fn test_close_all_closes_every_connection() {
    let harness = HubHarness::new();
    let owner = Recorder::new();
    harness.attach("ws://a", ContextId::next(), &owner);
    harness.attach("ws://b", ContextId::next(), &owner);

    harness.hub.close_all();
    for socket in harness.transport.sockets() {
        assert_eq!(socket.close_calls(), 1);
    }
}

#[test]
fn test_owner_may_reenter_hub_while_handling_event() {
    use std::sync::Mutex;

    struct Reattacher {
        hub: Arc<SocketHub<MockTransport>>,
        context: ContextId,
        me: Mutex<Option<Weak<dyn Dispatch>>>,
        handled: Mutex<usize>,
    }

    impl Dispatch for Reattacher {
        fn on_message(&self, _event: &crate::event::SocketEvent) {
            let me = self.me.lock().unwrap().clone().unwrap();
            let request = AttachRequest {
                context: self.context,
                owner: me,
                binary_type: None,
            };
            self.hub.attach(&EndpointSpec::from(URL), None, request).unwrap();
            *self.handled.lock().unwrap() += 1;
        }
    }

    let transport = MockTransport::new();
    let hub = Arc::new(SocketHub::new(transport.clone()));
    let owner = Arc::new(Reattacher {
        hub: hub.clone(),
        context: ContextId::next(),
        me: Mutex::new(None),
        handled: Mutex::new(0),
    });
    let weak: Weak<Reattacher> = Arc::downgrade(&owner);
    let weak: Weak<dyn Dispatch> = weak;
    *owner.me.lock().unwrap() = Some(weak);

    hub.attach(&EndpointSpec::from(URL), None, AttachRequest::new(owner.context, &owner))
        .unwrap();
    transport.socket(URL).unwrap().receive("re-enter");

    assert_eq!(*owner.handled.lock().unwrap(), 1);
    assert_eq!(hub.binding_count(URL), 1);
}

#[test]
fn test_concurrent_attaches_create_one_connection() {
    use std::sync::Barrier;

    const CONSUMERS: usize = 16;
    let transport = MockTransport::new();
    let hub = Arc::new(SocketHub::new(transport.clone()));
    let barrier = Arc::new(Barrier::new(CONSUMERS));
    let owners: Vec<_> = (0..CONSUMERS).map(|_| Recorder::new()).collect();

    let handles: Vec<ConnectionHandle> = std::thread::scope(|scope| {
        let workers: Vec<_> = owners
            .iter()
            .map(|owner| {
                let (hub, barrier) = (hub.clone(), barrier.clone());
                scope.spawn(move || {
                    barrier.wait();
                    hub.attach(
                        &EndpointSpec::from("ws://example.com"),
                        None,
                        AttachRequest::new(ContextId::next(), owner),
                    )
                    .unwrap()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(transport.connects(), 1);
    assert!(handles.iter().all(|h| h.ptr_eq(&handles[0])));
    assert_eq!(hub.binding_count(URL), CONSUMERS);
    assert_eq!(
        transport.socket(URL).unwrap().receive("all"),
        RoutingResult::Dispatched(CONSUMERS)
    );
}

#[test]
fn test_bindings_of_dropped_owners_are_swept() {
    let harness = HubHarness::with_config(HubConfig {
        prune_empty_entries: true,
        ..HubConfig::default()
    });
    let kept = Recorder::new();
    for _ in 0..100 {
        let transient = Recorder::new();
        harness.attach(URL, ContextId::next(), &transient);
    }
    assert_eq!(harness.hub.binding_count(URL), 1);

    harness.attach(URL, ContextId::next(), &kept);
    assert_eq!(harness.hub.binding_count(URL), 1);

    drop(kept);
    harness.hub.release(URL, ContextId::next());
    assert_eq!(harness.hub.binding_count(URL), 0);
}
