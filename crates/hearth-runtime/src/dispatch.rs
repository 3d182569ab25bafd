// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Hearth.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Subscription table and deferred delivery queue.

use crate::runtime::Runtime;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

/// Message callback registered by the application.
///
/// Shared so dispatch can resolve every match before running any of them,
/// which lets a callback change the table while it runs.
pub type Callback = Rc<RefCell<dyn FnMut(&mut Runtime, &str, &[u8]) -> anyhow::Result<()>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Run inside the bus pump, in arrival order
    #[default]
    Immediate,
    /// Queue and run on a later iteration
    Deferred,
}

#[derive(Clone)]
pub struct Subscription {
    pub callback: Callback,
    pub mode: DispatchMode,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Topic filter to callback. Survives reconnects.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    entries: BTreeMap<String, Subscription>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the subscription this one replaced, if any
    pub fn insert(&mut self, filter: &str, subscription: Subscription) -> Option<Subscription> {
        self.entries.insert(filter.to_owned(), subscription)
    }

    pub fn remove(&mut self, filter: &str) -> bool {
        self.entries.remove(filter).is_some()
    }

    pub fn contains(&self, filter: &str) -> bool {
        self.entries.contains_key(filter)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn filters(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every entry whose filter matches `topic`, in filter order.
    pub fn matching(&self, topic: &str) -> Vec<Subscription> {
        self.entries
            .iter()
            .filter(|(filter, _)| topic_matches(filter, topic))
            .map(|(_, subscription)| subscription.clone())
            .collect()
    }
}

/// MQTT filter matching: `+` is one level, a trailing `#` is any number of
/// levels including none.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

pub struct Deferred {
    pub topic: String,
    pub payload: Vec<u8>,
    pub callback: Callback,
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("topic", &self.topic)
            .field("payload_len", &self.payload.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// The oldest entry was dropped to make room
    DroppedOldest {
        /// First drop since the queue was last below capacity
        episode_start: bool,
    },
}

/// Bounded FIFO; at capacity each arrival evicts the oldest entry.
#[derive(Debug)]
pub struct DeferredQueue {
    items: VecDeque<Deferred>,
    capacity: usize,
    overflowing: bool,
    dropped: u64,
}

impl DeferredQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            overflowing: false,
            dropped: 0,
        }
    }

    pub fn push(&mut self, item: Deferred) -> Enqueued {
        let outcome = if self.items.len() >= self.capacity {
            self.items.pop_front();
            self.dropped += 1;
            let episode_start = !self.overflowing;
            self.overflowing = true;
            Enqueued::DroppedOldest { episode_start }
        } else {
            Enqueued::Queued
        };

        self.items.push_back(item);
        outcome
    }

    pub fn pop(&mut self) -> Option<Deferred> {
        let item = self.items.pop_front();
        if self.items.len() < self.capacity {
            self.overflowing = false;
        }
        item
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries evicted since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
