//! In-process message bus.
//!
//! `MemoryChannel` is the loop's side of a pair of crossbeam queues; the
//! `ChannelHandle` is the other side, used by tests and by the CLI's stdin
//! reader to inject commands and collect publications. Unbounded queues keep
//! `poll` and `publish` non-blocking.
use crossbeam_channel as xch;
use feeder_traits::{BoxError, CommandChannel, Inbound};

/// One outbound publication.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

pub struct MemoryChannel {
    inbound: xch::Receiver<Inbound>,
    outbound: xch::Sender<Published>,
}

#[derive(Clone)]
pub struct ChannelHandle {
    inbound: xch::Sender<Inbound>,
    outbound: xch::Receiver<Published>,
}

pub fn memory_channel() -> (MemoryChannel, ChannelHandle) {
    let (in_tx, in_rx) = xch::unbounded();
    let (out_tx, out_rx) = xch::unbounded();
    (
        MemoryChannel {
            inbound: in_rx,
            outbound: out_tx,
        },
        ChannelHandle {
            inbound: in_tx,
            outbound: out_rx,
        },
    )
}

impl CommandChannel for MemoryChannel {
    fn poll(&mut self) -> Option<Inbound> {
        self.inbound.try_recv().ok()
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BoxError> {
        self.outbound
            .send(Published {
                topic: topic.to_owned(),
                payload: payload.to_owned(),
                retain,
            })
            .map_err(|_| "message bus receiver disconnected".into())
    }
}

impl ChannelHandle {
    /// Queue an inbound message. Returns `false` once the loop side is gone.
    pub fn send(&self, topic: impl Into<String>, payload: impl Into<String>) -> bool {
        self.inbound
            .send(Inbound {
                topic: topic.into(),
                payload: payload.into(),
            })
            .is_ok()
    }

    /// Everything published since the last drain, in order.
    pub fn drain(&self) -> Vec<Published> {
        self.outbound.try_iter().collect()
    }

    /// Sender for a producer thread (e.g. a stdin reader).
    pub fn sender(&self) -> xch::Sender<Inbound> {
        self.inbound.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_flow_both_ways_in_order() {
        let (mut bus, handle) = memory_channel();
        assert!(bus.poll().is_none());
        assert!(handle.send("a", "1"));
        assert!(handle.send("b", "2"));
        assert_eq!(bus.poll().map(|m| m.topic), Some("a".into()));
        assert_eq!(bus.poll().map(|m| m.payload), Some("2".into()));

        bus.publish("t", "x", true).unwrap();
        bus.publish("t", "y", false).unwrap();
        let out = handle.drain();
        assert_eq!(out.len(), 2);
        assert!(out[0].retain && !out[1].retain);
        assert!(handle.drain().is_empty());
    }

    #[test]
    fn publish_fails_once_handle_is_dropped() {
        let (mut bus, handle) = memory_channel();
        drop(handle);
        assert!(bus.publish("t", "x", false).is_err());
    }
}
