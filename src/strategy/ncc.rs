use alloc::vec::Vec;

use log::{debug, trace};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::face::FaceHandle;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::strategy::{Forwarding, NccEvent};
use crate::tables::{FibHandle, MeasurementsHandle, PitHandle, Tables};

// The NCC strategy: per-namespace measurements learn which upstream face
//  returns data fastest and how long to wait for it, and a deferred
//  propagation timer fans the interest out to backup upstreams one at a
//  time when the preferred face is slow.

pub const STRATEGY_NAME: &str = "ndn:/localhost/nfd/strategy/ncc";

const DEFER_FIRST_WITHOUT_BEST_FACE_US: u64 = 4_000;
const DEFER_RANGE_WITHOUT_BEST_FACE_US: u64 = 75_000;
const MEASUREMENTS_LIFETIME_US: u64 = 16_000_000; // 16 sec

// How many namespace levels above the interest name share in each
//  measurement update.
const UPDATE_MEASUREMENTS_N_LEVELS: usize = 2;

const INITIAL_PREDICTION_US: u64 = 8_192;
const MIN_PREDICTION_US: u64 = 127;
const MAX_PREDICTION_US: u64 = 160_000;

// A miss must cost more than a hit recovers, so the penalty shift is the
//  more aggressive of the two.
const ADJUST_PREDICT_UP_SHIFT: u32 = 3;
const ADJUST_PREDICT_DOWN_SHIFT: u32 = 4;

// Per-namespace measurements: the predicted data return time on the best
//  face and the identities of the current and previous best faces. Face
//  handles are weak; every use revalidates them against the face table.
#[derive(Debug, Clone)]
pub struct MeasurementsInfo {
    prediction_us: u64,
    best_face: Option<FaceHandle>,
    previous_face: Option<FaceHandle>,
}

impl Default for MeasurementsInfo {
    fn default() -> Self {
        Self {
            prediction_us: INITIAL_PREDICTION_US,
            best_face: None,
            previous_face: None,
        }
    }
}

impl MeasurementsInfo {
    pub fn prediction_us(&self) -> u64 {
        self.prediction_us
    }

    pub fn inherit_from(&mut self, other: &MeasurementsInfo) {
        *self = other.clone();
    }

    // The live best face, falling back to promoting the previous face
    //  when the best one has gone away.
    pub fn get_best_face<F: Forwarding>(&mut self, fwd: &F) -> Option<FaceHandle> {
        if let Some(best) = self.best_face {
            if fwd.face_is_alive(best) {
                return Some(best);
            }
        }
        let previous = self.previous_face.filter(|f| fwd.face_is_alive(*f));
        self.best_face = previous;
        previous
    }

    pub fn update_best_face<F: Forwarding>(&mut self, fwd: &F, face: FaceHandle) {
        match self.best_face.filter(|f| fwd.face_is_alive(*f)) {
            None => self.best_face = Some(face),
            Some(best) if best == face => self.adjust_predict_down(),
            Some(best) => {
                trace!("best face {:?} displaced by {:?}", best, face);
                self.previous_face = Some(best);
                self.best_face = Some(face);
            }
        }
    }

    pub fn adjust_predict_down(&mut self) {
        self.prediction_us =
            MIN_PREDICTION_US.max(self.prediction_us - (self.prediction_us >> ADJUST_PREDICT_DOWN_SHIFT));
    }

    pub fn adjust_predict_up(&mut self) {
        self.prediction_us =
            MAX_PREDICTION_US.min(self.prediction_us + (self.prediction_us >> ADJUST_PREDICT_UP_SHIFT));
    }

    pub fn age_best_face(&mut self) {
        self.previous_face = self.best_face;
        self.best_face = None;
    }
}

// Per-pending-interest state. Both timers are cancelled when the PIT entry
//  goes away, whichever way it goes away.
#[derive(Debug, Clone)]
pub struct PitInfo {
    is_new_interest: bool,
    max_interval_us: u64,
    best_face_timeout: Option<TimerHandle>,
    propagate_timer: Option<TimerHandle>,
}

impl Default for PitInfo {
    fn default() -> Self {
        Self {
            is_new_interest: true,
            max_interval_us: 1,
            best_face_timeout: None,
            propagate_timer: None,
        }
    }
}

impl PitInfo {
    pub fn cancel_timers(&mut self, sched: &mut Scheduler<NccEvent>) {
        if let Some(handle) = self.best_face_timeout.take() {
            sched.cancel(handle);
        }
        if let Some(handle) = self.propagate_timer.take() {
            sched.cancel(handle);
        }
    }
}

pub struct NccStrategy<R = SmallRng> {
    rng: R,
}

impl NccStrategy<SmallRng> {
    pub fn with_seed(seed: u64) -> Self {
        Self::new(SmallRng::seed_from_u64(seed))
    }
}

impl<R: RngCore> NccStrategy<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    // Decides where the interest goes first and arms the deferred fan-out.
    //  Retransmissions of a still-pending interest change nothing.
    pub fn after_receive_interest<T, F>(
        &mut self,
        tables: &mut T,
        fwd: &mut F,
        sched: &mut Scheduler<NccEvent>,
        in_face: FaceHandle,
        fib: FibHandle,
        pit: PitHandle,
    ) where
        T: Tables<PitInfo = PitInfo, MeasurementsInfo = MeasurementsInfo>,
        F: Forwarding,
    {
        let (n_next_hops, first_hop) = match tables.next_hops(fib) {
            Some(hops) => (
                hops.len(),
                hops.iter().map(|h| h.face).find(|f| *f != in_face),
            ),
            None => return,
        };
        if n_next_hops == 0 {
            debug!("no next hops for {:?}, rejecting", pit);
            fwd.reject_interest(pit);
            return;
        }

        {
            let Some(slot) = tables.pit_info_mut(pit) else { return };
            let info = slot.get_or_insert_with(PitInfo::default);
            if !info.is_new_interest {
                return;
            }
            info.is_new_interest = false;
        }

        let now = sched.now();
        let entry = tables.measurements_entry(pit, now);
        let (best_face, previous_face, prediction_us) = match entry {
            Some(entry) => match Self::measurements_info_of(tables, entry) {
                Some(info) => {
                    let best = info.get_best_face(fwd);
                    (best, info.previous_face, info.prediction_us)
                }
                None => (None, None, INITIAL_PREDICTION_US),
            },
            None => (None, None, INITIAL_PREDICTION_US),
        };

        let mut defer_first_us = DEFER_FIRST_WITHOUT_BEST_FACE_US;
        let mut defer_range_us = DEFER_RANGE_WITHOUT_BEST_FACE_US;
        let mut n_upstreams = n_next_hops;

        let best =
            best_face.filter(|f| tables.has_next_hop(fib, *f) && tables.can_forward_to(pit, *f));
        match best {
            Some(best) => {
                defer_first_us = prediction_us;
                defer_range_us = (prediction_us + 1) / 2;
                n_upstreams -= 1;
                trace!("forwarding on best face {:?}, timeout in {}us", best, prediction_us);
                Self::send(tables, fwd, pit, best);
                let timeout = sched.schedule(prediction_us, NccEvent::BestFaceTimeout { pit });
                if let Some(info) = Self::pit_info_of(tables, pit) {
                    info.best_face_timeout = Some(timeout);
                }
            }
            None => {
                // No usable best face; start from the cheapest next hop,
                //  skipping the face the interest came in on
                if let Some(first) = first_hop {
                    Self::send(tables, fwd, pit, first);
                }
            }
        }

        if previous_face.map_or(false, |f| {
            fwd.face_is_alive(f) && tables.has_next_hop(fib, f) && tables.can_forward_to(pit, f)
        }) {
            n_upstreams = n_upstreams.saturating_sub(1);
        }

        let propagate = sched.schedule(defer_first_us, NccEvent::Propagate { pit, fib });
        if let Some(info) = Self::pit_info_of(tables, pit) {
            if n_upstreams > 0 {
                info.max_interval_us = max_interval_us(defer_range_us, n_upstreams);
            }
            info.propagate_timer = Some(propagate);
        }
    }

    // Runs when data comes back, before the host satisfies the PIT entry:
    //  rewards the namespace and stops any further fan-out.
    pub fn before_satisfy_interest<T, F>(
        &mut self,
        tables: &mut T,
        fwd: &F,
        sched: &mut Scheduler<NccEvent>,
        pit: PitHandle,
        in_face: FaceHandle,
    ) where
        T: Tables<PitInfo = PitInfo, MeasurementsInfo = MeasurementsInfo>,
        F: Forwarding,
    {
        let now = sched.now();
        let mut entry = tables.measurements_entry(pit, now);
        for _ in 0..UPDATE_MEASUREMENTS_N_LEVELS {
            let Some(current) = entry else { break };
            tables.extend_measurements_lifetime(current, MEASUREMENTS_LIFETIME_US, now);
            if let Some(info) = Self::measurements_info_of(tables, current) {
                info.update_best_face(fwd, in_face);
            }
            entry = tables.measurements_parent(current);
        }

        if let Some(info) = Self::pit_info_of(tables, pit) {
            if let Some(handle) = info.propagate_timer.take() {
                sched.cancel(handle);
            }
        }
    }

    // The host calls this whenever a PIT entry reaches the end of its life
    //  (satisfied, expired or rejected) and detaches the strategy info.
    pub fn finalize_interest(&mut self, sched: &mut Scheduler<NccEvent>, mut info: PitInfo) {
        info.cancel_timers(sched);
    }

    pub fn handle_event<T, F>(
        &mut self,
        tables: &mut T,
        fwd: &mut F,
        sched: &mut Scheduler<NccEvent>,
        event: NccEvent,
    ) where
        T: Tables<PitInfo = PitInfo, MeasurementsInfo = MeasurementsInfo>,
        F: Forwarding,
    {
        match event {
            NccEvent::BestFaceTimeout { pit } => self.timeout_on_best_face(tables, sched, pit),
            NccEvent::Propagate { pit, fib } => self.do_propagate(tables, fwd, sched, pit, fib),
        }
    }

    // The predicted window elapsed without data: penalize the prediction on
    //  this namespace and its ancestors so siblings learn from it too.
    fn timeout_on_best_face<T>(&mut self, tables: &mut T, sched: &mut Scheduler<NccEvent>, pit: PitHandle)
    where
        T: Tables<PitInfo = PitInfo, MeasurementsInfo = MeasurementsInfo>,
    {
        if !tables.pit_alive(pit) {
            return;
        }
        trace!("best face timed out for {:?}", pit);

        let now = sched.now();
        let mut entry = tables.measurements_entry(pit, now);
        for _ in 0..UPDATE_MEASUREMENTS_N_LEVELS {
            let Some(current) = entry else { return };
            tables.extend_measurements_lifetime(current, MEASUREMENTS_LIFETIME_US, now);
            if let Some(info) = Self::measurements_info_of(tables, current) {
                info.adjust_predict_up();
            }
            entry = tables.measurements_parent(current);
        }
    }

    // One fan-out tick: try the previous best face, then the first next hop
    //  the PIT still permits, and re-arm with jitter only if something went
    //  out. Runs from a timer, so both subjects must be revalidated.
    fn do_propagate<T, F>(
        &mut self,
        tables: &mut T,
        fwd: &mut F,
        sched: &mut Scheduler<NccEvent>,
        pit: PitHandle,
        fib: FibHandle,
    ) where
        T: Tables<PitInfo = PitInfo, MeasurementsInfo = MeasurementsInfo>,
        F: Forwarding,
    {
        if !tables.pit_alive(pit) {
            return;
        }
        let hop_faces: Vec<FaceHandle> = match tables.next_hops(fib) {
            Some(hops) => hops.iter().map(|h| h.face).collect(),
            None => return,
        };

        let now = sched.now();
        let previous = match tables.measurements_entry(pit, now) {
            Some(entry) => {
                Self::measurements_info_of(tables, entry).and_then(|info| info.previous_face)
            }
            None => None,
        };
        if let Some(previous) = previous {
            if fwd.face_is_alive(previous)
                && tables.has_next_hop(fib, previous)
                && tables.can_forward_to(pit, previous)
            {
                Self::send(tables, fwd, pit, previous);
            }
        }

        let mut is_forwarded = false;
        for face in hop_faces {
            if tables.can_forward_to(pit, face) {
                is_forwarded = true;
                Self::send(tables, fwd, pit, face);
                break;
            }
        }

        if is_forwarded {
            let max_interval = Self::pit_info_of(tables, pit)
                .map_or(1, |info| info.max_interval_us)
                .max(1);
            let defer = self.rng.random_range(0..max_interval);
            let handle = sched.schedule(defer, NccEvent::Propagate { pit, fib });
            if let Some(info) = Self::pit_info_of(tables, pit) {
                info.propagate_timer = Some(handle);
            }
        }
    }

    fn send<T, F>(tables: &mut T, fwd: &mut F, pit: PitHandle, face: FaceHandle)
    where
        T: Tables<PitInfo = PitInfo, MeasurementsInfo = MeasurementsInfo>,
        F: Forwarding,
    {
        tables.record_out(pit, face);
        fwd.send_interest(pit, face);
    }

    fn pit_info_of<T>(tables: &mut T, pit: PitHandle) -> Option<&mut PitInfo>
    where
        T: Tables<PitInfo = PitInfo, MeasurementsInfo = MeasurementsInfo>,
    {
        tables.pit_info_mut(pit).and_then(|slot| slot.as_mut())
    }

    // The measurements info for the entry, materializing it (and any missing
    //  ancestors) with a copy of the nearest ancestor's snapshot.
    fn measurements_info_of<T>(
        tables: &mut T,
        entry: MeasurementsHandle,
    ) -> Option<&mut MeasurementsInfo>
    where
        T: Tables<PitInfo = PitInfo, MeasurementsInfo = MeasurementsInfo>,
    {
        let missing = match tables.measurements_info_mut(entry) {
            Some(slot) => slot.is_none(),
            None => return None,
        };

        if missing {
            let mut chain = alloc::vec![entry];
            let mut inherited: Option<MeasurementsInfo> = None;
            let mut cursor = entry;
            while let Some(parent) = tables.measurements_parent(cursor) {
                match tables.measurements_info_mut(parent) {
                    Some(slot) => match slot.as_ref() {
                        Some(info) => {
                            inherited = Some(info.clone());
                            break;
                        }
                        None => {
                            chain.push(parent);
                            cursor = parent;
                        }
                    },
                    None => break,
                }
            }
            let base = inherited.unwrap_or_default();
            for handle in chain {
                if let Some(slot) = tables.measurements_info_mut(handle) {
                    *slot = Some(base.clone());
                }
            }
        }

        tables.measurements_info_mut(entry).and_then(|slot| slot.as_mut())
    }
}

// The spacing between fan-out sends: the defer window split evenly over the
//  remaining upstreams, never below a microsecond.
fn max_interval_us(defer_range_us: u64, n_upstreams: usize) -> u64 {
    let n = n_upstreams as u64;
    ((2 * defer_range_us + n - 1) / n).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::{Name, NameComponent};
    use crate::tables::ReferenceTables;
    use crate::timestamp::Timestamp;
    use alloc::vec::Vec;

    const F1: FaceHandle = FaceHandle(1);
    const F2: FaceHandle = FaceHandle(2);
    const F3: FaceHandle = FaceHandle(3);
    const CONSUMER: FaceHandle = FaceHandle(100);

    fn name(parts: &[&str]) -> Name {
        Name::from_components(parts.iter().map(|p| NameComponent::generic(p.as_bytes())).collect())
    }

    struct TestForwarder {
        alive: Vec<FaceHandle>,
        sent: Vec<(PitHandle, FaceHandle)>,
        rejected: Vec<PitHandle>,
    }

    impl Forwarding for TestForwarder {
        fn send_interest(&mut self, pit: PitHandle, face: FaceHandle) {
            self.sent.push((pit, face));
        }
        fn reject_interest(&mut self, pit: PitHandle) {
            self.rejected.push(pit);
        }
        fn face_is_alive(&self, face: FaceHandle) -> bool {
            self.alive.contains(&face)
        }
    }

    // Always yields the low end of any range, so re-armed propagation
    //  fires with zero jitter and schedules stay predictable
    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0)
        }
    }

    struct Bed {
        tables: ReferenceTables<PitInfo, MeasurementsInfo>,
        sched: Scheduler<NccEvent>,
        fwd: TestForwarder,
        strategy: NccStrategy<ZeroRng>,
    }

    impl Bed {
        fn new(alive: &[FaceHandle]) -> Self {
            Self {
                tables: ReferenceTables::new(),
                sched: Scheduler::new(),
                fwd: TestForwarder {
                    alive: alive.to_vec(),
                    sent: Vec::new(),
                    rejected: Vec::new(),
                },
                strategy: NccStrategy::new(ZeroRng),
            }
        }

        fn express(&mut self, name: &Name, in_face: FaceHandle) -> (PitHandle, FibHandle) {
            let now = self.sched.now();
            let pit = self.tables.insert_interest(name.clone(), in_face, 4_000_000, now);
            let fib = self.tables.fib_lookup(name).expect("a fib entry");
            self.strategy.after_receive_interest(
                &mut self.tables,
                &mut self.fwd,
                &mut self.sched,
                in_face,
                fib,
                pit,
            );
            (pit, fib)
        }

        fn run_until(&mut self, us: u64) {
            let target = Timestamp { us_since_start: us };
            while let Some((_, event)) = self.sched.pop_due(target) {
                self.strategy.handle_event(&mut self.tables, &mut self.fwd, &mut self.sched, event);
            }
            self.sched.advance_to(target);
        }

        fn deliver_data(&mut self, pit: PitHandle, from: FaceHandle) {
            self.strategy.before_satisfy_interest(
                &mut self.tables,
                &self.fwd,
                &mut self.sched,
                pit,
                from,
            );
            if let Some(info) = self.tables.satisfy_interest(pit) {
                self.strategy.finalize_interest(&mut self.sched, info);
            }
        }

        fn seed_measurements(&mut self, name: &Name, info: MeasurementsInfo) {
            let now = self.sched.now();
            let entry = self.tables.measurements_for_name(name, now);
            *self.tables.measurements_info_mut(entry).unwrap() = Some(info);
        }

        fn minfo(&mut self, name: &Name) -> MeasurementsInfo {
            let now = self.sched.now();
            let entry = self.tables.measurements_for_name(name, now);
            self.tables.measurements_info_mut(entry).unwrap().clone().expect("measurements info")
        }

        fn pinfo(&mut self, pit: PitHandle) -> PitInfo {
            NccStrategy::<ZeroRng>::pit_info_of(&mut self.tables, pit).expect("pit info").clone()
        }

        fn sent_faces(&self) -> Vec<FaceHandle> {
            self.fwd.sent.iter().map(|(_, f)| *f).collect()
        }
    }

    fn warm_info(prediction_us: u64, best: Option<FaceHandle>, previous: Option<FaceHandle>) -> MeasurementsInfo {
        MeasurementsInfo {
            prediction_us,
            best_face: best,
            previous_face: previous,
        }
    }

    #[test]
    fn test_prediction_stays_bounded_and_monotone() {
        let mut info = MeasurementsInfo::default();
        assert_eq!(info.prediction_us(), 8_192);

        let mut previous = info.prediction_us();
        for _ in 0..64 {
            info.adjust_predict_up();
            assert!(info.prediction_us() >= previous);
            assert!(info.prediction_us() <= MAX_PREDICTION_US);
            previous = info.prediction_us();
        }
        assert_eq!(info.prediction_us(), MAX_PREDICTION_US);
        info.adjust_predict_up();
        assert_eq!(info.prediction_us(), MAX_PREDICTION_US);

        for _ in 0..128 {
            info.adjust_predict_down();
            assert!(info.prediction_us() <= previous);
            assert!(info.prediction_us() >= MIN_PREDICTION_US);
            previous = info.prediction_us();
        }
        assert_eq!(info.prediction_us(), MIN_PREDICTION_US);
        info.adjust_predict_down();
        assert_eq!(info.prediction_us(), MIN_PREDICTION_US);
    }

    #[test]
    fn test_update_best_face_transitions() {
        let fwd = TestForwarder { alive: alloc::vec![F1, F2], sent: Vec::new(), rejected: Vec::new() };

        // Adopting a first face is not a reward
        let mut info = MeasurementsInfo::default();
        info.update_best_face(&fwd, F1);
        assert_eq!(info.best_face, Some(F1));
        assert_eq!(info.prediction_us(), INITIAL_PREDICTION_US);

        // Confirming the same face is
        info.update_best_face(&fwd, F1);
        assert_eq!(info.prediction_us(), 8_192 - 512);

        // A different face displaces without touching the prediction
        let before = info.prediction_us();
        info.update_best_face(&fwd, F2);
        assert_eq!(info.best_face, Some(F2));
        assert_eq!(info.previous_face, Some(F1));
        assert_eq!(info.prediction_us(), before);
    }

    #[test]
    fn test_get_best_face_promotes_previous() {
        let fwd = TestForwarder { alive: alloc::vec![F1], sent: Vec::new(), rejected: Vec::new() };

        let mut info = warm_info(8_192, Some(F3), Some(F1));
        assert_eq!(info.get_best_face(&fwd), Some(F1));
        assert_eq!(info.best_face, Some(F1));

        let mut info = warm_info(8_192, Some(F3), Some(F2));
        assert_eq!(info.get_best_face(&fwd), None);
        assert_eq!(info.best_face, None);
    }

    #[test]
    fn test_age_best_face() {
        let mut info = warm_info(8_192, Some(F1), None);
        info.age_best_face();
        assert_eq!(info.best_face, None);
        assert_eq!(info.previous_face, Some(F1));
    }

    #[test]
    fn test_max_interval_floor() {
        assert_eq!(max_interval_us(0, 1), 1);
        assert_eq!(max_interval_us(0, 10_000), 1);
        assert_eq!(max_interval_us(4_096, 1), 8_192);
        assert_eq!(max_interval_us(4_096, 3), 2_731); // rounded up
        assert_eq!(max_interval_us(75_000, 2), 75_000);
    }

    // FIB entry with no next hops: reject, send nothing, arm nothing
    #[test]
    fn test_no_next_hops_rejects() {
        let mut bed = Bed::new(&[F1]);
        bed.tables.register_prefix(&name(&["a"]), F1, 0);
        bed.tables.unregister_prefix(&name(&["a"]), F1);

        let (pit, _) = bed.express(&name(&["a", "1"]), CONSUMER);
        assert_eq!(bed.fwd.rejected, [pit]);
        assert!(bed.fwd.sent.is_empty());
        assert_eq!(bed.sched.next_deadline(), None);
    }

    // Cold start with one next hop: immediate send, only the propagate
    //  timer armed, and the returning data adopts the face without reward
    #[test]
    fn test_cold_start_single_next_hop() {
        let mut bed = Bed::new(&[F1]);
        bed.tables.register_prefix(&name(&["a"]), F1, 0);

        let (pit, _) = bed.express(&name(&["a", "1"]), CONSUMER);
        assert_eq!(bed.sent_faces(), [F1]);
        let info = bed.pinfo(pit);
        assert!(info.best_face_timeout.is_none());
        assert!(info.propagate_timer.is_some());
        assert_eq!(
            bed.sched.next_deadline(),
            Some(Timestamp { us_since_start: DEFER_FIRST_WITHOUT_BEST_FACE_US })
        );

        bed.run_until(3_000);
        bed.deliver_data(pit, F1);

        let info = bed.minfo(&name(&["a", "1"]));
        assert_eq!(info.best_face, Some(F1));
        assert_eq!(info.prediction_us(), INITIAL_PREDICTION_US);
        // The ancestor learned the face too
        assert_eq!(bed.minfo(&name(&["a"])).best_face, Some(F1));
        // Nothing left to fire
        assert_eq!(bed.sched.next_deadline(), None);
    }

    // Warm best face confirmed by data inside the predicted window
    #[test]
    fn test_warm_best_face_confirmed() {
        let mut bed = Bed::new(&[F1, F2]);
        bed.tables.register_prefix(&name(&["a"]), F1, 0);
        bed.tables.register_prefix(&name(&["a"]), F2, 1);
        bed.seed_measurements(&name(&["a", "1"]), warm_info(8_192, Some(F1), None));

        let (pit, _) = bed.express(&name(&["a", "1"]), CONSUMER);
        assert_eq!(bed.sent_faces(), [F1]);
        let info = bed.pinfo(pit);
        assert!(info.best_face_timeout.is_some());
        assert!(info.propagate_timer.is_some());
        assert_eq!(info.max_interval_us, 8_192);
        assert_eq!(bed.sched.next_deadline(), Some(Timestamp { us_since_start: 8_192 }));

        bed.run_until(5_000);
        assert_eq!(bed.sent_faces(), [F1]);
        bed.deliver_data(pit, F1);

        assert_eq!(bed.minfo(&name(&["a", "1"])).prediction_us(), 8_192 - 512);
        assert_eq!(bed.sched.next_deadline(), None);
    }

    // Warm best face times out, a backup wins, and the faces swap roles
    #[test]
    fn test_warm_best_face_timeout_then_backup_wins() {
        let mut bed = Bed::new(&[F1, F2]);
        bed.tables.register_prefix(&name(&["a"]), F1, 0);
        bed.tables.register_prefix(&name(&["a"]), F2, 1);
        bed.seed_measurements(&name(&["a", "1"]), warm_info(8_192, Some(F1), None));

        let (pit, _) = bed.express(&name(&["a", "1"]), CONSUMER);
        assert_eq!(bed.sent_faces(), [F1]);

        // The timeout penalizes the namespace and its ancestor, and the
        //  propagate tick falls through to the backup
        bed.run_until(8_192);
        assert_eq!(bed.sent_faces(), [F1, F2]);
        assert_eq!(bed.minfo(&name(&["a", "1"])).prediction_us(), 8_192 + 1_024);
        assert_eq!(bed.minfo(&name(&["a"])).prediction_us(), 8_192 + 1_024);

        bed.deliver_data(pit, F2);
        let info = bed.minfo(&name(&["a", "1"]));
        assert_eq!(info.best_face, Some(F2));
        assert_eq!(info.previous_face, Some(F1));
        // Displacement does not touch the prediction
        assert_eq!(info.prediction_us(), 8_192 + 1_024);
    }

    // A duplicate on-interest call leaves the prior decision in place
    #[test]
    fn test_retransmission_is_ignored() {
        let mut bed = Bed::new(&[F1]);
        bed.tables.register_prefix(&name(&["a"]), F1, 0);

        let (pit, fib) = bed.express(&name(&["a", "1"]), CONSUMER);
        let armed = bed.sched.next_deadline();
        assert_eq!(bed.sent_faces(), [F1]);

        bed.strategy.after_receive_interest(
            &mut bed.tables,
            &mut bed.fwd,
            &mut bed.sched,
            CONSUMER,
            fib,
            pit,
        );
        assert_eq!(bed.sent_faces(), [F1]);
        assert_eq!(bed.sched.next_deadline(), armed);
        assert!(bed.fwd.rejected.is_empty());
    }

    // A first touch of a deeper namespace copies the parent snapshot
    #[test]
    fn test_namespace_inheritance() {
        let mut bed = Bed::new(&[F1]);
        bed.tables.register_prefix(&name(&["a"]), F1, 0);
        bed.seed_measurements(&name(&["a"]), warm_info(20_000, Some(F1), None));

        let _ = bed.express(&name(&["a", "b"]), CONSUMER);

        let child = bed.minfo(&name(&["a", "b"]));
        assert_eq!(child.prediction_us(), 20_000);
        assert_eq!(child.best_face, Some(F1));
        assert_eq!(child.previous_face, None);

        // The inherited best face was usable, so the send went there and
        //  both timers follow the inherited prediction
        assert_eq!(bed.sent_faces(), [F1]);
        assert_eq!(bed.sched.next_deadline(), Some(Timestamp { us_since_start: 20_000 }));
    }

    // The cheapest next hop happens to be the downstream: skip it
    #[test]
    fn test_first_next_hop_skips_in_face() {
        let mut bed = Bed::new(&[F1, F2]);
        bed.tables.register_prefix(&name(&["a"]), F1, 0);
        bed.tables.register_prefix(&name(&["a"]), F2, 1);

        let _ = bed.express(&name(&["a", "1"]), F1);
        assert_eq!(bed.sent_faces(), [F2]);
    }

    // The previous best face gets a try when the propagate timer fires
    #[test]
    fn test_propagate_tries_previous_face_first() {
        let mut bed = Bed::new(&[F2, F3]);
        bed.tables.register_prefix(&name(&["a"]), F2, 0);
        bed.tables.register_prefix(&name(&["a"]), F3, 1);
        // The best face is gone, the previous one is alive
        bed.seed_measurements(&name(&["a", "1"]), warm_info(8_192, None, Some(F3)));

        let _ = bed.express(&name(&["a", "1"]), CONSUMER);
        // get_best_face promoted the previous face and sent there directly
        assert_eq!(bed.sent_faces(), [F3]);

        bed.run_until(8_192);
        // The fan-out tick reaches the remaining hop
        assert_eq!(bed.sent_faces(), [F3, F2]);
    }

    // Fan-out stops for good once every permitted upstream has been tried
    #[test]
    fn test_propagate_exhausts_and_stops() {
        let mut bed = Bed::new(&[F1, F2]);
        bed.tables.register_prefix(&name(&["a"]), F1, 0);
        bed.tables.register_prefix(&name(&["a"]), F2, 1);

        let _ = bed.express(&name(&["a", "1"]), CONSUMER);
        assert_eq!(bed.sent_faces(), [F1]);

        bed.run_until(1_000_000);
        assert_eq!(bed.sent_faces(), [F1, F2]);
        assert_eq!(bed.sched.next_deadline(), None);
    }

    // Timers left armed by a removed PIT entry fire into nothing
    #[test]
    fn test_stale_timers_are_harmless() {
        let mut bed = Bed::new(&[F1, F2]);
        bed.tables.register_prefix(&name(&["a"]), F1, 0);
        bed.tables.register_prefix(&name(&["a"]), F2, 1);
        bed.seed_measurements(&name(&["a", "1"]), warm_info(8_192, Some(F1), None));

        let (pit, _) = bed.express(&name(&["a", "1"]), CONSUMER);
        assert_eq!(bed.sent_faces(), [F1]);

        // Remove the entry but deliberately drop the info without cancelling
        let _ = bed.tables.reject_interest(pit);
        bed.run_until(1_000_000);

        assert_eq!(bed.sent_faces(), [F1]);
        assert!(bed.fwd.rejected.is_empty());
        // The measurements were not penalized by the orphaned timeout
        assert_eq!(bed.minfo(&name(&["a", "1"])).prediction_us(), 8_192);
    }

    // Finalizing cancels both timers so nothing fires afterwards
    #[test]
    fn test_finalize_cancels_timers() {
        let mut bed = Bed::new(&[F1, F2]);
        bed.tables.register_prefix(&name(&["a"]), F1, 0);
        bed.tables.register_prefix(&name(&["a"]), F2, 1);
        bed.seed_measurements(&name(&["a", "1"]), warm_info(8_192, Some(F1), None));

        let (pit, _) = bed.express(&name(&["a", "1"]), CONSUMER);
        let info = bed.tables.reject_interest(pit).expect("strategy info");
        bed.strategy.finalize_interest(&mut bed.sched, info);

        assert_eq!(bed.sched.next_deadline(), None);
        bed.run_until(1_000_000);
        assert_eq!(bed.sent_faces(), [F1]);
    }
}
