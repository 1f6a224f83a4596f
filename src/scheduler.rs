use alloc::collections::BinaryHeap;
use alloc::vec::Vec;
use core::cmp::Reverse;

use crate::timestamp::Timestamp;

// Single-threaded deferred-event scheduler. Events fire in deadline order,
//  ties broken by insertion order. Handles are slot indices with a generation
//  counter, so a handle to a fired or cancelled event goes stale instead of
//  aliasing whatever reuses the slot. Cancel is idempotent.
// The scheduler also owns the clock: the host drains due events and then
//  advances the current time, so callbacks always observe their fire time.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    slot: u32,
    generation: u32,
}

pub struct Scheduler<E> {
    now: Timestamp,
    slots: Vec<Slot<E>>,
    free: Vec<u32>,
    queue: BinaryHeap<Reverse<QueueKey>>,
    next_seq: u64,
}

struct Slot<E> {
    generation: u32,
    event: Option<E>,
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    deadline: Timestamp,
    seq: u64,
    slot: u32,
    generation: u32,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: Timestamp { us_since_start: 0 },
            slots: Vec::new(),
            free: Vec::new(),
            queue: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn schedule(&mut self, after_us: u64, event: E) -> TimerHandle {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize].event = Some(event);
                slot
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot { generation: 0, event: Some(event) });
                slot
            }
        };
        let generation = self.slots[slot as usize].generation;

        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(QueueKey {
            deadline: self.now.adding(after_us),
            seq,
            slot,
            generation,
        }));

        TimerHandle { slot, generation }
    }

    pub fn cancel(&mut self, handle: TimerHandle) {
        let Some(slot) = self.slots.get_mut(handle.slot as usize) else { return };
        if slot.generation != handle.generation || slot.event.is_none() {
            // Already fired, cancelled, or reused
            return;
        }
        slot.event = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.slot);
    }

    // Removes and returns the earliest pending event with deadline <= until,
    //  moving the clock to its deadline. Returns None once nothing is due.
    pub fn pop_due(&mut self, until: Timestamp) -> Option<(Timestamp, E)> {
        loop {
            let head = self.queue.peek()?;
            if head.0.deadline > until {
                return None;
            }
            let Reverse(key) = self.queue.pop().unwrap();

            let slot = &mut self.slots[key.slot as usize];
            if slot.generation != key.generation {
                // The entry was cancelled; the slot has already been recycled
                continue;
            }
            let Some(event) = slot.event.take() else { continue };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(key.slot);

            self.now = self.now.max(key.deadline);
            return Some((key.deadline, event));
        }
    }

    pub fn next_deadline(&mut self) -> Option<Timestamp> {
        loop {
            let head = self.queue.peek()?;
            let slot = &self.slots[head.0.slot as usize];
            if slot.generation == head.0.generation && slot.event.is_some() {
                return Some(head.0.deadline);
            }
            // Drop stale entries so the reported deadline is a live one
            self.queue.pop();
        }
    }

    pub fn advance_to(&mut self, to: Timestamp) {
        self.now = self.now.max(to);
    }
}
