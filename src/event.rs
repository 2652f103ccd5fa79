//! 连接事件以及接收事件的消费者能力接口。
//! Connection events and the capability interface of the consumers that receive them.

use crate::payload::Payload;

/// The enumerated kinds of events a connection produces.
///
/// 连接产生的事件种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    Message,
    Error,
    Close,
}

impl EventKind {
    /// Every kind that routing is installed for.
    pub const ALL: [EventKind; 4] = [
        EventKind::Open,
        EventKind::Message,
        EventKind::Error,
        EventKind::Close,
    ];

    /// The action name delivered to owners.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Open => "open",
            EventKind::Message => "message",
            EventKind::Error => "error",
            EventKind::Close => "close",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The data attached to an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Open,
    Message(Payload),
    Error(String),
    Close {
        code: u16,
        reason: String,
        was_clean: bool,
    },
}

/// An event that fired on a connection.
///
/// `url` is the normalized address of the connection the event fired on.
///
/// 在连接上触发的事件。`url` 是触发该事件的连接的规范化地址。
#[derive(Debug, Clone, PartialEq)]
pub struct SocketEvent {
    pub url: String,
    pub payload: EventPayload,
}

impl SocketEvent {
    pub fn open(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            payload: EventPayload::Open,
        }
    }

    pub fn message(url: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            url: url.into(),
            payload: EventPayload::Message(payload.into()),
        }
    }

    pub fn error(url: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            payload: EventPayload::Error(description.into()),
        }
    }

    pub fn close(url: impl Into<String>, code: u16, reason: impl Into<String>, was_clean: bool) -> Self {
        Self {
            url: url.into(),
            payload: EventPayload::Close {
                code,
                reason: reason.into(),
                was_clean,
            },
        }
    }

    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Open => EventKind::Open,
            EventPayload::Message(_) => EventKind::Message,
            EventPayload::Error(_) => EventKind::Error,
            EventPayload::Close { .. } => EventKind::Close,
        }
    }
}

/// An owner that receives the events routed to its bindings.
///
/// Every handler is an inert no-op by default, so an owner only overrides the
/// kinds it cares about and unhandled events never fail.
///
/// 接收路由到其绑定的事件的所有者。所有处理器默认都是空操作，
/// 所有者只需覆盖它关心的事件种类。
pub trait Dispatch: Send + Sync + 'static {
    /// Receives one routed event. The default forwards to the per-kind handlers.
    fn dispatch(&self, kind: EventKind, event: &SocketEvent) {
        match kind {
            EventKind::Open => self.on_open(event),
            EventKind::Message => self.on_message(event),
            EventKind::Error => self.on_error(event),
            EventKind::Close => self.on_close(event),
        }
    }

    fn on_open(&self, _event: &SocketEvent) {}

    fn on_message(&self, _event: &SocketEvent) {}

    fn on_error(&self, _event: &SocketEvent) {}

    fn on_close(&self, _event: &SocketEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MessagesOnly {
        messages: AtomicUsize,
    }

    impl Dispatch for MessagesOnly {
        fn on_message(&self, _event: &SocketEvent) {
            self.messages.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_default_handlers_are_inert() {
        let owner = MessagesOnly::default();
        for event in [
            SocketEvent::open("ws://a/"),
            SocketEvent::error("ws://a/", "boom"),
            SocketEvent::close("ws://a/", 1000, "", true),
            SocketEvent::message("ws://a/", "hi"),
        ] {
            owner.dispatch(event.kind(), &event);
        }
        assert_eq!(owner.messages.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_kind_names() {
        let names: Vec<_> = EventKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names, ["open", "message", "error", "close"]);
    }
}
