//! Timeout-bounded polling over the link buffers.
//!
//! Every combinator polls its buffer, sleeping `WaitOptions::delay` between
//! attempts, and returns `Ok(None)` once the timeout elapses. The deadline is
//! checked after each attempt, so a zero timeout still makes one attempt.

use std::thread;
use std::time::Instant;

use regex::Regex;
use seriallink_frame::{Packet, PacketId};
use tracing::{debug, trace, warn};

use crate::config::{MatchPolicy, WaitOptions};
use crate::error::{LinkError, Result};
use crate::link::SerialLink;
use crate::queue::BoundedQueue;

impl SerialLink {
    /// Wait for a packet with `id`.
    pub fn wait_for_packet(&self, id: PacketId, opts: WaitOptions) -> Result<Option<Packet>> {
        self.wait_for_packet_matching(|packet| packet.id() == id, opts)
    }

    /// Wait for the first packet satisfying `pred`.
    pub fn wait_for_packet_matching(
        &self,
        pred: impl Fn(&Packet) -> bool,
        opts: WaitOptions,
    ) -> Result<Option<Packet>> {
        self.poll(&opts, "packet", || {
            take_matching(self.packets(), opts.policy, &pred)
        })
    }

    /// Wait for a packet whose id is any of `ids`.
    ///
    /// Returns the packet and the index in `ids` of its id. An empty `ids`
    /// returns `Ok(None)` at once.
    pub fn wait_for_any_packet(
        &self,
        ids: &[PacketId],
        opts: WaitOptions,
    ) -> Result<Option<(Packet, usize)>> {
        if ids.is_empty() {
            return Ok(None);
        }
        let found = self.wait_for_packet_matching(|packet| ids.contains(&packet.id()), opts)?;
        Ok(found.and_then(|packet| {
            let index = ids.iter().position(|id| *id == packet.id())?;
            Some((packet, index))
        }))
    }

    /// Wait until one packet has arrived for every entry of `ids`.
    ///
    /// Each entry is satisfied by its own packet, so a repeated id needs as
    /// many packets. Packets are returned in arrival order. On timeout the
    /// packets collected so far are lost.
    pub fn wait_for_all_packets(
        &self,
        ids: &[PacketId],
        opts: WaitOptions,
    ) -> Result<Option<Vec<Packet>>> {
        let mut slots = Slots::new(ids.len());
        let found = self.poll(&opts, "packets", || {
            slots.fill(self.packets(), opts.policy, |packet: &Packet, slot| {
                packet.id() == ids[slot]
            })
        })?;
        Ok(found.map(|matched| matched.into_iter().map(|(packet, _)| packet).collect()))
    }

    /// Wait for any packet at all.
    pub fn wait_for_any_packet_available(&self, opts: WaitOptions) -> Result<Option<Packet>> {
        self.poll(&opts, "packet", || self.packets().pop_oldest())
    }

    /// Block until a packet arrives, polling every `delay`.
    pub fn read_packet(&self, delay: std::time::Duration) -> Result<Packet> {
        self.wait_for_any_packet_available(WaitOptions::forever().with_delay(delay))?
            .ok_or_else(|| LinkError::ReaderNotStarted(self.port().to_string()))
    }

    /// Wait for a diagnostic line matching `pattern` in full.
    pub fn wait_for_string(&self, pattern: &str, opts: WaitOptions) -> Result<Option<String>> {
        let regex = full_match(pattern)?;
        self.poll(&opts, "string", || {
            take_matching(self.strings(), opts.policy, |line: &String| regex.is_match(line))
        })
    }

    /// Wait for a line matching any of `patterns`.
    ///
    /// Returns the line and the index of the first pattern it matches.
    pub fn wait_for_any_string(
        &self,
        patterns: &[&str],
        opts: WaitOptions,
    ) -> Result<Option<(String, usize)>> {
        if patterns.is_empty() {
            return Ok(None);
        }
        let regexes = compile_all(patterns)?;
        let found = self.poll(&opts, "string", || {
            take_matching(self.strings(), opts.policy, |line: &String| {
                regexes.iter().any(|regex| regex.is_match(line))
            })
        })?;
        Ok(found.and_then(|line| {
            let index = regexes.iter().position(|regex| regex.is_match(&line))?;
            Some((line, index))
        }))
    }

    /// Wait until one line has matched every entry of `patterns`.
    ///
    /// Returns `(line, pattern index)` pairs in arrival order. A line fills
    /// the first unfilled pattern it matches.
    pub fn wait_for_all_strings(
        &self,
        patterns: &[&str],
        opts: WaitOptions,
    ) -> Result<Option<Vec<(String, usize)>>> {
        let regexes = compile_all(patterns)?;
        let mut slots = Slots::new(regexes.len());
        self.poll(&opts, "strings", || {
            slots.fill(self.strings(), opts.policy, |line: &String, slot| {
                regexes[slot].is_match(line)
            })
        })
    }

    /// Wait for any diagnostic line at all.
    pub fn wait_for_any_string_available(&self, opts: WaitOptions) -> Result<Option<String>> {
        self.poll(&opts, "string", || self.strings().pop_oldest())
    }

    /// Block until a diagnostic line arrives, polling every `delay`.
    pub fn read_string(&self, delay: std::time::Duration) -> Result<String> {
        self.wait_for_any_string_available(WaitOptions::forever().with_delay(delay))?
            .ok_or_else(|| LinkError::ReaderNotStarted(self.port().to_string()))
    }

    fn poll<T>(
        &self,
        opts: &WaitOptions,
        what: &'static str,
        mut attempt: impl FnMut() -> Option<T>,
    ) -> Result<Option<T>> {
        let deadline = opts.deadline();
        let delay = opts.poll_delay();
        let mut warned = false;

        loop {
            if let Some(found) = attempt() {
                return Ok(Some(found));
            }

            if !self.reader_requested() {
                if deadline.is_none() {
                    return Err(LinkError::ReaderNotStarted(self.port().to_string()));
                }
                if !warned {
                    warn!(port = %self.port(), what, "waiting on a link whose reader is not running");
                    warned = true;
                }
            }

            let sleep = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!(port = %self.port(), what, "wait timed out");
                        return Ok(None);
                    }
                    delay.min(deadline - now)
                }
                None => delay,
            };
            trace!(port = %self.port(), what, ?sleep, "nothing yet");
            thread::sleep(sleep);
        }
    }
}

/// Take one item satisfying `pred` according to `policy`.
fn take_matching<T>(
    queue: &BoundedQueue<T>,
    policy: MatchPolicy,
    pred: impl Fn(&T) -> bool,
) -> Option<T> {
    match policy {
        MatchPolicy::Retain => queue.remove_first(|item| pred(item)),
        MatchPolicy::Discard => {
            let item = queue.pop_oldest()?;
            if pred(&item) {
                Some(item)
            } else {
                trace!(queue = queue.name(), "discarding non-matching item");
                None
            }
        }
    }
}

/// Per-target bookkeeping for the wait-for-all combinators.
struct Slots<T> {
    open: Vec<bool>,
    matched: Vec<(T, usize)>,
}

impl<T> Slots<T> {
    fn new(count: usize) -> Self {
        Self {
            open: vec![true; count],
            matched: Vec::with_capacity(count),
        }
    }

    fn first_open(&self, item: &T, matches: &impl Fn(&T, usize) -> bool) -> Option<usize> {
        self.open
            .iter()
            .enumerate()
            .find(|(slot, open)| **open && matches(item, *slot))
            .map(|(slot, _)| slot)
    }

    /// Move matching items out of `queue` into open slots. Returns the
    /// collected items once every slot is filled.
    fn fill(
        &mut self,
        queue: &BoundedQueue<T>,
        policy: MatchPolicy,
        matches: impl Fn(&T, usize) -> bool,
    ) -> Option<Vec<(T, usize)>> {
        while self.matched.len() < self.open.len() {
            let item = match policy {
                MatchPolicy::Retain => {
                    match queue.remove_first(|item| self.first_open(item, &matches).is_some()) {
                        Some(item) => item,
                        None => break,
                    }
                }
                MatchPolicy::Discard => match queue.pop_oldest() {
                    Some(item) => item,
                    None => break,
                },
            };

            match self.first_open(&item, &matches) {
                Some(slot) => {
                    self.open[slot] = false;
                    self.matched.push((item, slot));
                }
                None => {
                    trace!(queue = queue.name(), "discarding non-matching item");
                    if policy == MatchPolicy::Discard {
                        break;
                    }
                }
            }
        }

        if self.matched.len() == self.open.len() {
            Some(std::mem::take(&mut self.matched))
        } else {
            None
        }
    }
}

/// Compile `pattern` so that it must match a whole line.
fn full_match(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{pattern})$"))?)
}

fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns.iter().map(|pattern| full_match(pattern)).collect()
}
