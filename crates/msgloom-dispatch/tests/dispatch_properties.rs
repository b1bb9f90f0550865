//! Correlation, backlog, and pump-loop properties.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bytes::Bytes;
use serde_json::json;

use msgloom_core::protocol::decode::{Decoder, Payload};
use msgloom_core::protocol::envelope::{Envelope, ErrorInfo, MessageTag};
use msgloom_core::MsgLoomError;
use msgloom_dispatch::config::DispatchConfig;
use msgloom_dispatch::{Dispatcher, MessageSource, RequestState};

/// In-memory source; the test keeps a handle to push envelopes mid-run.
#[derive(Clone, Default)]
struct ScriptedSource {
    queue: Rc<RefCell<VecDeque<Envelope>>>,
}

impl ScriptedSource {
    fn push(&self, env: Envelope) {
        self.queue.borrow_mut().push_back(env);
    }
}

impl MessageSource for ScriptedSource {
    fn pop_next(&mut self) -> Option<Envelope> {
        self.queue.borrow_mut().pop_front()
    }
}

fn dispatcher() -> (Dispatcher, ScriptedSource) {
    dispatcher_with(DispatchConfig::default())
}

fn dispatcher_with(cfg: DispatchConfig) -> (Dispatcher, ScriptedSource) {
    let source = ScriptedSource::default();
    let d = Dispatcher::new(cfg, Decoder::new(), Box::new(source.clone()));
    (d, source)
}

fn env(tag: MessageTag, request_id: u64, payload: serde_json::Value) -> Envelope {
    Envelope {
        tag: tag.wire(),
        request_id,
        is_error: false,
        error: None,
        payload: Bytes::from(serde_json::to_vec(&payload).unwrap()),
    }
}

fn room_env(request_id: u64, room_id: &str) -> Envelope {
    env(
        MessageTag::RoomUpdate,
        request_id,
        json!({ "room_id": room_id, "owner_id": "u-1", "joinable": true }),
    )
}

fn invite_env(n: u32) -> Envelope {
    env(
        MessageTag::RoomInviteReceived,
        0,
        json!({
            "invite_id": format!("inv-{n}"),
            "sender_id": "u-2",
            "room_id": "r-9",
            "sent_at_ms": 1000 + u64::from(n)
        }),
    )
}

fn intent_env(deeplink: &str) -> Envelope {
    env(
        MessageTag::LaunchIntentChanged,
        0,
        json!({ "intent_type": "join", "deeplink": deeplink }),
    )
}

fn invite_id(p: &Payload) -> String {
    match p {
        Payload::RoomInviteReceived(i) => i.invite_id.clone(),
        other => panic!("wrong variant: {other:?}"),
    }
}

#[test]
fn completions_fire_exactly_once_in_fifo_order() {
    let (mut d, src) = dispatcher();
    let order: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    let mut reqs = Vec::new();
    for (id, room) in [(1u64, "alpha"), (2, "beta"), (3, "gamma")] {
        let mut req = d.issue_request(id);
        let order = Rc::clone(&order);
        req.on_complete(move |msg| {
            match msg.payload().unwrap() {
                Payload::RoomUpdate(r) => order.borrow_mut().push(r.room_id.clone()),
                other => panic!("wrong variant: {other:?}"),
            }
            Ok(())
        })
        .unwrap();
        reqs.push(req);
    }

    // Enqueue out of issue order; dispatch order must follow queue order.
    src.push(room_env(2, "beta"));
    src.push(room_env(1, "alpha"));
    src.push(room_env(3, "gamma"));

    let stats = d.pump();
    assert_eq!(stats.popped, 3);
    assert_eq!(stats.completed, 3);
    assert_eq!(*order.borrow(), vec!["beta", "alpha", "gamma"]);
    assert!(reqs.iter().all(|r| r.state() == RequestState::Completed));

    // The entries are gone: a duplicate id is now a protocol violation.
    src.push(room_env(1, "alpha"));
    let stats = d.pump();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.completed, 0);
    assert_eq!(order.borrow().len(), 3);
}

#[test]
fn error_completion_uses_the_normal_callback_path() {
    let (mut d, src) = dispatcher();
    let seen: Rc<RefCell<Option<ErrorInfo>>> = Rc::new(RefCell::new(None));

    let mut req = d.issue_request(11);
    let seen_cb = Rc::clone(&seen);
    req.on_complete(move |msg| {
        assert!(msg.is_error());
        *seen_cb.borrow_mut() = msg.error().cloned();
        Ok(())
    })
    .unwrap();

    src.push(Envelope {
        tag: MessageTag::RoomUpdate.wire(),
        request_id: 11,
        is_error: true,
        error: Some(ErrorInfo {
            code: 77,
            message: "room gone".into(),
            http_code: 410,
        }),
        payload: Bytes::new(),
    });

    let stats = d.pump();
    assert_eq!(stats.completed, 1);
    assert_eq!(seen.borrow().as_ref().unwrap().code, 77);
    assert_eq!(req.state(), RequestState::Completed);
}

#[test]
fn accumulate_backlog_flushes_in_arrival_order_on_register() {
    let (mut d, src) = dispatcher();

    for n in 1..=3 {
        src.push(invite_env(n));
    }
    let stats = d.pump();
    assert_eq!(stats.buffered, 3);
    assert_eq!(stats.notified, 0);

    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_cb = Rc::clone(&seen);
    d.register_notification(MessageTag::RoomInviteReceived, move |msg| {
        seen_cb.borrow_mut().push(invite_id(msg.payload().unwrap()));
        Ok(())
    });
    // Flush completed synchronously, before register returned.
    assert_eq!(*seen.borrow(), vec!["inv-1", "inv-2", "inv-3"]);

    // Subsequent envelopes of that tag dispatch directly.
    src.push(invite_env(4));
    let stats = d.pump();
    assert_eq!(stats.notified, 1);
    assert_eq!(stats.buffered, 0);
    assert_eq!(seen.borrow().len(), 4);
}

#[test]
fn replace_backlog_keeps_only_the_newest() {
    let (mut d, src) = dispatcher();

    src.push(intent_env("loom://join/r-1"));
    src.push(intent_env("loom://join/r-2"));
    src.push(intent_env("loom://join/r-3"));
    d.pump();

    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_cb = Rc::clone(&seen);
    d.register_notification(MessageTag::LaunchIntentChanged, move |msg| {
        match msg.payload().unwrap() {
            Payload::LaunchIntentChanged(i) => {
                seen_cb.borrow_mut().push(i.deeplink.clone().unwrap());
            }
            other => panic!("wrong variant: {other:?}"),
        }
        Ok(())
    });

    assert_eq!(*seen.borrow(), vec!["loom://join/r-3"]);
}

#[test]
fn accumulate_backlog_at_cap_evicts_oldest() {
    let cfg = msgloom_dispatch::config::load_from_str(
        "version: 1\nbacklog: { accumulate_cap: 2 }\n",
    )
    .unwrap();
    let (mut d, src) = dispatcher_with(cfg);

    for n in 1..=3 {
        src.push(invite_env(n));
    }
    d.pump();

    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_cb = Rc::clone(&seen);
    d.register_notification(MessageTag::RoomInviteReceived, move |msg| {
        seen_cb.borrow_mut().push(invite_id(msg.payload().unwrap()));
        Ok(())
    });

    assert_eq!(*seen.borrow(), vec!["inv-2", "inv-3"]);
}

#[test]
fn pump_limit_bounds_work_per_call() {
    let (mut d, src) = dispatcher();
    d.register_notification(MessageTag::RoomInviteReceived, |_| Ok(()));
    for n in 1..=5 {
        src.push(invite_env(n));
    }

    let stats = d.pump_limit(2);
    assert_eq!(stats.popped, 2);
    assert_eq!(stats.notified, 2);

    let stats = d.pump();
    assert_eq!(stats.popped, 3);
}

#[test]
fn configured_default_limit_bounds_unqualified_pump() {
    let cfg =
        msgloom_dispatch::config::load_from_str("version: 1\npump: { default_limit: 2 }\n")
            .unwrap();
    let (mut d, src) = dispatcher_with(cfg);
    d.register_notification(MessageTag::RoomInviteReceived, |_| Ok(()));
    for n in 1..=5 {
        src.push(invite_env(n));
    }
    assert_eq!(d.pump().popped, 2);
    assert_eq!(d.pump().popped, 2);
    assert_eq!(d.pump().popped, 1);
}

#[test]
fn id_match_strictly_precedes_type_match() {
    let (mut d, src) = dispatcher();

    let request_hits = Rc::new(RefCell::new(0u32));
    let notify_hits = Rc::new(RefCell::new(0u32));

    let mut req = d.issue_request(42);
    let rh = Rc::clone(&request_hits);
    req.on_complete(move |_| {
        *rh.borrow_mut() += 1;
        Ok(())
    })
    .unwrap();

    let nh = Rc::clone(&notify_hits);
    d.register_notification(MessageTag::RoomUpdate, move |msg| {
        assert_eq!(msg.request_id, 0);
        *nh.borrow_mut() += 1;
        Ok(())
    });

    // Same tag, three routes: notification, pending request, stray id.
    src.push(room_env(0, "note"));
    src.push(room_env(42, "reply"));
    src.push(room_env(99, "stray"));

    let stats = d.pump();
    assert_eq!(*notify_hits.borrow(), 1);
    assert_eq!(*request_hits.borrow(), 1);
    // The stray correlated envelope is dropped, not handed to the type
    // handler, even though one is registered for this tag.
    assert_eq!(stats.dropped, 1);
}

#[test]
fn teardown_abandons_pending_and_drops_late_replies() {
    let (mut d, src) = dispatcher();

    let fired = Rc::new(RefCell::new(false));
    let mut req = d.issue_request(7);
    let fired_cb = Rc::clone(&fired);
    req.on_complete(move |_| {
        *fired_cb.borrow_mut() = true;
        Ok(())
    })
    .unwrap();
    assert_eq!(req.state(), RequestState::Pending);

    d.teardown();
    assert_eq!(req.state(), RequestState::Abandoned);

    src.push(room_env(7, "late"));
    let stats = d.pump();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.completed, 0);
    assert!(!*fired.borrow());
}

#[test]
fn reregistering_a_notification_replaces_the_handler() {
    let (mut d, src) = dispatcher();

    let first = Rc::new(RefCell::new(0u32));
    let second = Rc::new(RefCell::new(0u32));

    let f = Rc::clone(&first);
    d.register_notification(MessageTag::PartyUpdate, move |_| {
        *f.borrow_mut() += 1;
        Ok(())
    });
    let s = Rc::clone(&second);
    d.register_notification(MessageTag::PartyUpdate, move |_| {
        *s.borrow_mut() += 1;
        Ok(())
    });

    src.push(env(
        MessageTag::PartyUpdate,
        0,
        json!({ "party_id": "p-1", "leader_id": "u-1" }),
    ));
    d.pump();

    assert_eq!(*first.borrow(), 0);
    assert_eq!(*second.borrow(), 1);
}

#[test]
fn second_attach_is_rejected() {
    let (d, _src) = dispatcher();
    let mut req = d.issue_request(5);
    req.on_complete(|_| Ok(())).unwrap();
    let err = req.on_complete(|_| Ok(())).expect_err("must fail");
    assert!(matches!(err, MsgLoomError::AlreadyAttached(5)));
}

#[test]
fn duplicate_request_id_is_rejected() {
    let (d, _src) = dispatcher();
    let mut a = d.issue_request(9);
    let mut b = d.issue_request(9);
    a.on_complete(|_| Ok(())).unwrap();
    let err = b.on_complete(|_| Ok(())).expect_err("must fail");
    assert!(matches!(err, MsgLoomError::DuplicateRequestId(9)));
    assert_eq!(b.state(), RequestState::Created);
}

#[test]
fn id_zero_request_fails_synchronously() {
    let (d, _src) = dispatcher();
    let mut req = d.issue_request(0);
    assert_eq!(req.state(), RequestState::Failed);
    let err = req.on_complete(|_| Ok(())).expect_err("must fail");
    assert_eq!(err.code().as_str(), "INTEGRITY");
}

#[test]
fn failing_handler_does_not_abort_the_pump_cycle() {
    let (mut d, src) = dispatcher();

    let hits = Rc::new(RefCell::new(0u32));
    let h = Rc::clone(&hits);
    d.register_notification(MessageTag::RoomInviteReceived, move |_| {
        *h.borrow_mut() += 1;
        if *h.borrow() == 1 {
            Err(MsgLoomError::Internal("handler exploded".into()))
        } else {
            Ok(())
        }
    });

    src.push(invite_env(1));
    src.push(invite_env(2));

    let stats = d.pump();
    assert_eq!(stats.notified, 2);
    assert_eq!(stats.callback_failures, 1);
    assert_eq!(*hits.borrow(), 2);
}

#[test]
fn unrecognized_tag_notification_is_dropped_nonfatally() {
    let (mut d, src) = dispatcher();
    src.push(Envelope {
        tag: 0xbeef,
        request_id: 0,
        is_error: false,
        error: None,
        payload: Bytes::from_static(b"{}"),
    });
    src.push(invite_env(1));

    let stats = d.pump();
    assert_eq!(stats.popped, 2);
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.buffered, 1);
}
