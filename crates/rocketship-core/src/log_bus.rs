// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Log Bus: multiplexes [`LogLine`]s per run to zero or more live
//! subscribers, with a bounded per-run replay buffer and non-blocking,
//! drop-oldest delivery to slow subscribers.
//!
//! Delivery to each subscriber goes through a small mutex-guarded ring
//! plus a [`tokio::sync::Notify`] rather than a `tokio::sync::mpsc`
//! channel: `mpsc` has no way to evict an already-queued item when full,
//! and this bus requires dropping the *oldest* undelivered line, not the
//! newest, under backpressure.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::model::LogLine;

struct SubscriberInbox {
    queue: Mutex<VecDeque<LogLine>>,
    depth: usize,
    dropped: AtomicU64,
    notify: Notify,
    closed: std::sync::atomic::AtomicBool,
}

impl SubscriberInbox {
    fn push(&self, line: LogLine) {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() == self.depth {
            queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queue.push_back(line);
        drop(queue);
        self.notify.notify_one();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.notify.notify_one();
    }
}

struct RunChannel {
    buffer: VecDeque<LogLine>,
    buffer_cap: usize,
    subscribers: Vec<(u64, Arc<SubscriberInbox>)>,
}

/// A handle returned by [`LogBus::subscribe`]. Receives lines in publish
/// order, starting with a replay of the bounded buffer.
pub struct Subscription {
    run_id: String,
    id: u64,
    inbox: Arc<SubscriberInbox>,
    bus: LogBus,
}

impl Subscription {
    /// Receive the next line, or `None` once the subscription has been
    /// closed (explicit unsubscribe, or the bus retiring the run).
    pub async fn recv(&mut self) -> Option<LogLine> {
        loop {
            {
                let mut queue = self.inbox.queue.lock().unwrap();
                if let Some(line) = queue.pop_front() {
                    return Some(line);
                }
                if self.inbox.closed.load(Ordering::Relaxed) {
                    return None;
                }
            }
            self.inbox.notify.notified().await;
        }
    }

    /// How many lines were dropped on this subscriber's channel due to
    /// backpressure.
    pub fn dropped_count(&self) -> u64 {
        self.inbox.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe_sync(&self.run_id, self.id);
    }
}

/// In-memory publish/subscribe of structured log lines keyed by run id
///
#[derive(Clone)]
pub struct LogBus {
    channels: Arc<Mutex<HashMap<String, RunChannel>>>,
    next_subscriber_id: Arc<AtomicU64>,
    default_buffer_len: usize,
    default_channel_depth: usize,
}

impl LogBus {
    /// Construct a Log Bus. `buffer_len` bounds the per-run replay ring
    ///; `channel_depth` bounds each
    /// subscriber's outbound queue before drop-oldest kicks in.
    pub fn new(buffer_len: usize, channel_depth: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            next_subscriber_id: Arc::new(AtomicU64::new(1)),
            default_buffer_len: buffer_len,
            default_channel_depth: channel_depth.max(1),
        }
    }

    /// Append `line` to `run_id`'s ring buffer and push it to every live
    /// subscriber. Never blocks: a full subscriber queue has its oldest
    /// undelivered line dropped to make room.
    pub fn publish(&self, run_id: &str, line: LogLine) {
        let mut channels = self.channels.lock().unwrap();
        let channel = channels
            .entry(run_id.to_string())
            .or_insert_with(|| RunChannel {
                buffer: VecDeque::with_capacity(self.default_buffer_len),
                buffer_cap: self.default_buffer_len,
                subscribers: Vec::new(),
            });

        if channel.buffer.len() == channel.buffer_cap {
            channel.buffer.pop_front();
        }
        channel.buffer.push_back(line.clone());

        for (_, inbox) in channel.subscribers.iter() {
            inbox.push(line.clone());
        }
    }

    /// Subscribe to `run_id`'s log stream. Replays the current bounded
    /// buffer before any newly-published line is delivered.
    pub fn subscribe(&self, run_id: &str) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let inbox = Arc::new(SubscriberInbox {
            queue: Mutex::new(VecDeque::with_capacity(self.default_channel_depth)),
            depth: self.default_channel_depth,
            dropped: AtomicU64::new(0),
            notify: Notify::new(),
            closed: std::sync::atomic::AtomicBool::new(false),
        });

        let mut channels = self.channels.lock().unwrap();
        let channel = channels
            .entry(run_id.to_string())
            .or_insert_with(|| RunChannel {
                buffer: VecDeque::with_capacity(self.default_buffer_len),
                buffer_cap: self.default_buffer_len,
                subscribers: Vec::new(),
            });

        for replayed in channel.buffer.iter() {
            inbox.push(replayed.clone());
        }

        channel.subscribers.push((id, inbox.clone()));
        drop(channels);

        Subscription {
            run_id: run_id.to_string(),
            id,
            inbox,
            bus: self.clone(),
        }
    }

    fn unsubscribe_sync(&self, run_id: &str, id: u64) {
        let mut channels = self.channels.lock().unwrap();
        if let Some(channel) = channels.get_mut(run_id) {
            channel.subscribers.retain(|(slot_id, _)| *slot_id != id);
        }
    }

    /// Remove the per-run channel and close every live subscription, once
    /// the orchestrator knows no further lines will be published for this
    /// run.
    pub fn retire(&self, run_id: &str) {
        if let Some(channel) = self.channels.lock().unwrap().remove(run_id) {
            for (_, inbox) in channel.subscribers {
                inbox.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(msg: &str) -> LogLine {
        LogLine::plain(msg)
    }

    #[tokio::test]
    async fn late_subscriber_replays_buffer_in_order() {
        let bus = LogBus::new(256, 32);
        for i in 0..5 {
            bus.publish("run-1", line(&format!("line-{i}")));
        }
        let mut sub = bus.subscribe("run-1");
        for i in 0..5 {
            let received = sub.recv().await.unwrap();
            assert_eq!(received.message, format!("line-{i}"));
        }
        assert_eq!(sub.dropped_count(), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_drops_oldest_without_blocking_publisher() {
        let bus = LogBus::new(256, 4);
        let sub = bus.subscribe("run-1");
        for i in 0..100 {
            bus.publish("run-1", line(&format!("line-{i}")));
        }

        let mut sub = sub;
        let mut observed = Vec::new();
        while let Some(l) = sub.inbox.queue.lock().unwrap().pop_front() {
            observed.push(l.message);
        }

        assert_eq!(observed.len(), 4);
        assert_eq!(sub.dropped_count() as usize, 100 - observed.len());
        // the four most recent lines survive, oldest-first
        assert_eq!(observed, vec!["line-96", "line-97", "line-98", "line-99"]);
    }

    #[tokio::test]
    async fn subscriber_never_sees_messages_out_of_order() {
        let bus = LogBus::new(256, 32);
        let mut sub = bus.subscribe("run-1");
        for i in 0..10 {
            bus.publish("run-1", line(&format!("line-{i}")));
        }
        let mut last = -1i32;
        while let Ok(Some(l)) =
            tokio::time::timeout(std::time::Duration::from_millis(50), sub.recv()).await
        {
            let n: i32 = l.message.trim_start_matches("line-").parse().unwrap();
            assert!(n > last);
            last = n;
        }
    }

    #[tokio::test]
    async fn retire_closes_subscription() {
        let bus = LogBus::new(256, 32);
        let mut sub = bus.subscribe("run-1");
        bus.publish("run-1", line("hello"));
        bus.retire("run-1");
        assert_eq!(sub.recv().await.unwrap().message, "hello");
        assert!(sub.recv().await.is_none());
    }
}
