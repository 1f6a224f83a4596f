use alloc::vec::Vec;

use crate::face::FaceHandle;
use crate::name::{Name, NameComponent};
use crate::tables::{FibHandle, MeasurementsHandle, NextHop, PitHandle, Tables};
use crate::timestamp::Timestamp;

// The reference implementation of the strategy-facing tables:
//  - FIB entries keyed by exact prefix, looked up by longest prefix match,
//      next hops kept in ascending cost order;
//  - PIT entries keyed by interest name, tracking downstream (in) and
//      upstream (out) faces so can_forward_to can enforce its rules;
//  - measurements kept as a name tree with parent links, entries created
//      lazily and reclaimed once their lifetime runs out.
// Slots live in arenas and are reused through free lists; removal bumps the
//  slot generation, which is what invalidates outstanding handles.

pub struct ReferenceTables<PI, MI> {
    fib: Vec<FibSlot>,
    fib_free: Vec<u32>,
    pit: Vec<PitSlot<PI>>,
    pit_free: Vec<u32>,
    measurements: Vec<MeasurementsNode<MI>>,
    measurements_free: Vec<u32>,
}

struct FibSlot {
    generation: u32,
    occupied: bool,
    prefix: Name,
    next_hops: Vec<NextHop>,
}

struct PitSlot<PI> {
    generation: u32,
    occupied: bool,
    name: Name,
    deadline: Timestamp,
    in_faces: Vec<FaceHandle>,
    out_faces: Vec<FaceHandle>,
    info: Option<PI>,
}

struct MeasurementsNode<MI> {
    generation: u32,
    occupied: bool,
    parent: Option<u32>,
    children: Vec<(NameComponent, u32)>,
    expiry: Timestamp,
    info: Option<MI>,
}

impl<PI, MI> ReferenceTables<PI, MI> {
    pub fn new() -> Self {
        // The measurements root is the empty name and is never reclaimed
        let root = MeasurementsNode {
            generation: 0,
            occupied: true,
            parent: None,
            children: Vec::new(),
            expiry: Timestamp { us_since_start: u64::MAX },
            info: None,
        };
        Self {
            fib: Vec::new(),
            fib_free: Vec::new(),
            pit: Vec::new(),
            pit_free: Vec::new(),
            measurements: alloc::vec![root],
            measurements_free: Vec::new(),
        }
    }

    // FIB methods

    pub fn register_prefix(&mut self, prefix: &Name, face: FaceHandle, cost: u32) {
        let slot = match self.fib_slot_for_prefix(prefix) {
            Some(slot) => slot,
            None => match self.fib_free.pop() {
                Some(slot) => {
                    let entry = &mut self.fib[slot as usize];
                    entry.occupied = true;
                    entry.prefix = prefix.clone();
                    entry.next_hops.clear();
                    slot
                }
                None => {
                    let slot = self.fib.len() as u32;
                    self.fib.push(FibSlot {
                        generation: 0,
                        occupied: true,
                        prefix: prefix.clone(),
                        next_hops: Vec::new(),
                    });
                    slot
                }
            },
        };

        let entry = &mut self.fib[slot as usize];
        match entry.next_hops.iter_mut().find(|h| h.face == face) {
            Some(hop) => hop.cost = cost,
            None => entry.next_hops.push(NextHop { cost, face }),
        }
        entry.next_hops.sort_by_key(|h| h.cost);
    }

    pub fn unregister_prefix(&mut self, prefix: &Name, face: FaceHandle) -> bool {
        let Some(slot) = self.fib_slot_for_prefix(prefix) else { return false };
        let entry = &mut self.fib[slot as usize];
        match entry.next_hops.iter().position(|h| h.face == face) {
            Some(idx) => {
                entry.next_hops.remove(idx);
                true
            }
            None => false,
        }
    }

    // Withdraws the whole entry, invalidating handles to it.
    pub fn remove_prefix(&mut self, prefix: &Name) -> bool {
        let Some(slot) = self.fib_slot_for_prefix(prefix) else { return false };
        let entry = &mut self.fib[slot as usize];
        entry.occupied = false;
        entry.generation = entry.generation.wrapping_add(1);
        entry.next_hops.clear();
        self.fib_free.push(slot);
        true
    }

    // Longest prefix match over the registered entries.
    pub fn fib_lookup(&self, name: &Name) -> Option<FibHandle> {
        let mut best: Option<(usize, u32)> = None;
        for (slot, entry) in self.fib.iter().enumerate() {
            if !entry.occupied || !entry.prefix.is_prefix_of(name) {
                continue;
            }
            let depth = entry.prefix.component_count();
            if best.map_or(true, |(d, _)| depth > d) {
                best = Some((depth, slot as u32));
            }
        }
        best.map(|(_, slot)| FibHandle {
            slot,
            generation: self.fib[slot as usize].generation,
        })
    }

    fn fib_slot_for_prefix(&self, prefix: &Name) -> Option<u32> {
        self.fib
            .iter()
            .position(|e| e.occupied && e.prefix == *prefix)
            .map(|s| s as u32)
    }

    // PIT methods

    // Registers a downstream for the interest, joining the existing entry
    //  if one is pending for the same name.
    pub fn insert_interest(
        &mut self,
        name: Name,
        in_face: FaceHandle,
        lifetime_us: u64,
        now: Timestamp,
    ) -> PitHandle {
        let deadline = now.adding(lifetime_us);

        if let Some(slot) = self.pit.iter().position(|e| e.occupied && e.name == name) {
            let entry = &mut self.pit[slot];
            if !entry.in_faces.contains(&in_face) {
                entry.in_faces.push(in_face);
            }
            entry.deadline = entry.deadline.max(deadline);
            return PitHandle {
                slot: slot as u32,
                generation: entry.generation,
            };
        }

        let slot = match self.pit_free.pop() {
            Some(slot) => {
                let entry = &mut self.pit[slot as usize];
                entry.occupied = true;
                entry.name = name;
                entry.deadline = deadline;
                entry.in_faces.push(in_face);
                slot
            }
            None => {
                let slot = self.pit.len() as u32;
                self.pit.push(PitSlot {
                    generation: 0,
                    occupied: true,
                    name,
                    deadline,
                    in_faces: alloc::vec![in_face],
                    out_faces: Vec::new(),
                    info: None,
                });
                slot
            }
        };
        PitHandle {
            slot,
            generation: self.pit[slot as usize].generation,
        }
    }

    pub fn satisfy_interest(&mut self, pit: PitHandle) -> Option<PI> {
        self.take_pit(pit)
    }

    pub fn reject_interest(&mut self, pit: PitHandle) -> Option<PI> {
        self.take_pit(pit)
    }

    // Removes entries whose deadline has passed, handing back the strategy
    //  info of each so the caller can run its teardown.
    pub fn expire_interests(&mut self, now: Timestamp) -> Vec<PI> {
        let mut infos = Vec::new();
        for slot in 0..self.pit.len() {
            if self.pit[slot].occupied && self.pit[slot].deadline < now {
                let handle = PitHandle {
                    slot: slot as u32,
                    generation: self.pit[slot].generation,
                };
                if let Some(info) = self.take_pit(handle) {
                    infos.push(info);
                }
            }
        }
        infos
    }

    fn take_pit(&mut self, pit: PitHandle) -> Option<PI> {
        let entry = self.pit.get_mut(pit.slot as usize)?;
        if !entry.occupied || entry.generation != pit.generation {
            return None;
        }
        entry.occupied = false;
        entry.generation = entry.generation.wrapping_add(1);
        entry.in_faces.clear();
        entry.out_faces.clear();
        entry.name = Name::new();
        let info = entry.info.take();
        self.pit_free.push(pit.slot);
        info
    }

    fn pit_slot(&self, pit: PitHandle) -> Option<&PitSlot<PI>> {
        let entry = self.pit.get(pit.slot as usize)?;
        (entry.occupied && entry.generation == pit.generation).then_some(entry)
    }

    fn pit_slot_mut(&mut self, pit: PitHandle) -> Option<&mut PitSlot<PI>> {
        let entry = self.pit.get_mut(pit.slot as usize)?;
        (entry.occupied && entry.generation == pit.generation).then_some(entry)
    }

    // Measurements methods

    // Walks the name tree from the root, creating missing nodes, and
    //  refreshes the lifetime of every node it passes through.
    pub fn measurements_for_name(&mut self, name: &Name, now: Timestamp) -> MeasurementsHandle {
        let mut current: u32 = 0;
        for component in name.components() {
            let found = self.measurements[current as usize]
                .children
                .binary_search_by(|(c, _)| c.cmp(component));
            current = match found {
                Ok(idx) => {
                    let slot = self.measurements[current as usize].children[idx].1;
                    let node = &mut self.measurements[slot as usize];
                    node.expiry = node.expiry.max(now.adding(DEFAULT_MEASUREMENTS_LIFETIME_US));
                    slot
                }
                Err(idx) => {
                    let slot = self.alloc_measurements_node(current, now);
                    self.measurements[current as usize]
                        .children
                        .insert(idx, (component.clone(), slot));
                    slot
                }
            };
        }
        MeasurementsHandle {
            slot: current,
            generation: self.measurements[current as usize].generation,
        }
    }

    // Reclaims expired leaf nodes, repeating so a whole stale branch goes
    //  in one call. The root always stays.
    pub fn prune_measurements(&mut self, now: Timestamp) {
        loop {
            let mut removed_any = false;
            for slot in 1..self.measurements.len() {
                let node = &self.measurements[slot];
                if !node.occupied || !node.children.is_empty() || node.expiry >= now {
                    continue;
                }
                let parent = node.parent;

                let node = &mut self.measurements[slot];
                node.occupied = false;
                node.generation = node.generation.wrapping_add(1);
                node.parent = None;
                node.info = None;
                self.measurements_free.push(slot as u32);

                if let Some(parent) = parent {
                    self.measurements[parent as usize]
                        .children
                        .retain(|(_, s)| *s != slot as u32);
                }
                removed_any = true;
            }
            if !removed_any {
                break;
            }
        }
    }

    fn alloc_measurements_node(&mut self, parent: u32, now: Timestamp) -> u32 {
        let expiry = now.adding(DEFAULT_MEASUREMENTS_LIFETIME_US);
        match self.measurements_free.pop() {
            Some(slot) => {
                let node = &mut self.measurements[slot as usize];
                node.occupied = true;
                node.parent = Some(parent);
                node.expiry = expiry;
                slot
            }
            None => {
                let slot = self.measurements.len() as u32;
                self.measurements.push(MeasurementsNode {
                    generation: 0,
                    occupied: true,
                    parent: Some(parent),
                    children: Vec::new(),
                    expiry,
                    info: None,
                });
                slot
            }
        }
    }

    fn measurements_node(&self, entry: MeasurementsHandle) -> Option<&MeasurementsNode<MI>> {
        let node = self.measurements.get(entry.slot as usize)?;
        (node.occupied && node.generation == entry.generation).then_some(node)
    }

    // Common methods

    // Removes the face from all FIB entries and PIT records.
    pub fn unregister_face(&mut self, face: FaceHandle) {
        for entry in self.fib.iter_mut() {
            if entry.occupied {
                entry.next_hops.retain(|h| h.face != face);
            }
        }
        for entry in self.pit.iter_mut() {
            if entry.occupied {
                entry.in_faces.retain(|f| *f != face);
                entry.out_faces.retain(|f| *f != face);
            }
        }
    }
}

impl<PI, MI> Tables for ReferenceTables<PI, MI> {
    type PitInfo = PI;
    type MeasurementsInfo = MI;

    fn next_hops(&self, fib: FibHandle) -> Option<&[NextHop]> {
        let entry = self.fib.get(fib.slot as usize)?;
        (entry.occupied && entry.generation == fib.generation)
            .then_some(entry.next_hops.as_slice())
    }

    fn has_next_hop(&self, fib: FibHandle, face: FaceHandle) -> bool {
        self.next_hops(fib)
            .map_or(false, |hops| hops.iter().any(|h| h.face == face))
    }

    fn pit_alive(&self, pit: PitHandle) -> bool {
        self.pit_slot(pit).is_some()
    }

    fn can_forward_to(&self, pit: PitHandle, face: FaceHandle) -> bool {
        let Some(entry) = self.pit_slot(pit) else { return false };
        if entry.out_faces.contains(&face) {
            return false;
        }
        // Never turn the interest straight around to its only downstream
        !(entry.in_faces.len() == 1 && entry.in_faces[0] == face)
    }

    fn record_out(&mut self, pit: PitHandle, face: FaceHandle) {
        if let Some(entry) = self.pit_slot_mut(pit) {
            if !entry.out_faces.contains(&face) {
                entry.out_faces.push(face);
            }
        }
    }

    fn pit_info_mut(&mut self, pit: PitHandle) -> Option<&mut Option<PI>> {
        self.pit_slot_mut(pit).map(|entry| &mut entry.info)
    }

    fn measurements_entry(&mut self, pit: PitHandle, now: Timestamp) -> Option<MeasurementsHandle> {
        let name = self.pit_slot(pit)?.name.clone();
        Some(self.measurements_for_name(&name, now))
    }

    fn measurements_parent(&self, entry: MeasurementsHandle) -> Option<MeasurementsHandle> {
        let parent = self.measurements_node(entry)?.parent?;
        Some(MeasurementsHandle {
            slot: parent,
            generation: self.measurements[parent as usize].generation,
        })
    }

    fn extend_measurements_lifetime(&mut self, entry: MeasurementsHandle, lifetime_us: u64, now: Timestamp) {
        let Some(node) = self.measurements.get_mut(entry.slot as usize) else { return };
        if node.occupied && node.generation == entry.generation {
            node.expiry = node.expiry.max(now.adding(lifetime_us));
        }
    }

    fn measurements_info_mut(&mut self, entry: MeasurementsHandle) -> Option<&mut Option<MI>> {
        let node = self.measurements.get_mut(entry.slot as usize)?;
        (node.occupied && node.generation == entry.generation).then_some(&mut node.info)
    }
}

const DEFAULT_MEASUREMENTS_LIFETIME_US: u64 = 4_000_000; // 4 sec
