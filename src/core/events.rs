// ─── Progress / status channel ───
// Append-only notifications flowing from the core up to a front-end.

use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// One notification emitted by a long-running operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InstallEvent {
    Check {
        index: usize,
        total: usize,
        category: String,
    },
    Progress {
        downloaded: u64,
        total: u64,
        label: String,
    },
    /// Mean throughput over the sliding window, in bytes per second.
    Speed(f64),
    /// Seconds remaining; `None` when the current speed is zero.
    Estimated(Option<f64>),
    Extract(String),
    Patch(String),
    Error(String),
    Json(serde_json::Value),
}

pub type EventSender = UnboundedSender<InstallEvent>;
pub type EventReceiver = UnboundedReceiver<InstallEvent>;

/// Create a connected sink/receiver pair.
pub fn channel() -> (EventSink, EventReceiver) {
    let (tx, rx) = unbounded_channel();
    (EventSink::new(tx), rx)
}

/// Cloneable handle components use to publish events.
///
/// A disabled sink drops everything, and a dropped receiver is ignored:
/// listeners never acknowledge and never fail the emitter.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<EventSender>,
}

impl EventSink {
    pub fn new(sender: EventSender) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, event: InstallEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn check(&self, index: usize, total: usize, category: &str) {
        self.emit(InstallEvent::Check {
            index,
            total,
            category: category.to_string(),
        });
    }

    pub fn progress(&self, downloaded: u64, total: u64, label: &str) {
        self.emit(InstallEvent::Progress {
            downloaded,
            total,
            label: label.to_string(),
        });
    }

    pub fn extract(&self, message: impl Into<String>) {
        self.emit(InstallEvent::Extract(message.into()));
    }

    pub fn patch(&self, line: impl Into<String>) {
        self.emit(InstallEvent::Patch(line.into()));
    }

    pub fn error(&self, detail: impl Into<String>) {
        self.emit(InstallEvent::Error(detail.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_sink_swallows_events() {
        let sink = EventSink::disabled();
        sink.patch("ignored");
    }

    #[test]
    fn dropped_receiver_does_not_fail_emitter() {
        let (sink, rx) = channel();
        drop(rx);
        sink.error("nobody listening");
    }

    #[test]
    fn events_serialize_with_name_and_payload() {
        let speed = serde_json::to_value(InstallEvent::Speed(512.0)).unwrap();
        assert_eq!(speed, serde_json::json!({"event": "speed", "data": 512.0}));

        let check = serde_json::to_value(InstallEvent::Check {
            index: 1,
            total: 3,
            category: "libraries".into(),
        })
        .unwrap();
        assert_eq!(check["event"], "check");
        assert_eq!(check["data"]["total"], 3);
    }

    #[test]
    fn events_arrive_in_emission_order() {
        let (sink, mut rx) = channel();
        sink.check(0, 2, "libraries");
        sink.progress(10, 20, "libraries");

        assert_eq!(
            rx.try_recv().unwrap(),
            InstallEvent::Check {
                index: 0,
                total: 2,
                category: "libraries".into()
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            InstallEvent::Progress {
                downloaded: 10,
                total: 20,
                label: "libraries".into()
            }
        );
    }
}
