//! Bookkeeping of bin populations, the active-bin mask, and the flat
//! active-particle list.
//!
//! `TimeBinCount`/`TimeBinCountType` are the one piece of state mutated
//! from more than one thread during the kick phase (bin migrations inside
//! [`crate::kick`]), so they are `AtomicU64` arrays. `ActiveParticle` is
//! read-only during the kick phase and is rebuilt, not appended to, at each
//! sync point. [`BinRegistry::rebuild_active_list`] is idempotent given
//! unchanged inputs and is not safe to call concurrently with itself (it is
//! called once per sync point by the driver).

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::particle::Particle;
use crate::particle::ParticleKind;
use crate::particle::NUM_PARTICLE_KINDS;
use crate::units::Bin;
use crate::units::TIMEBINS;

/// Global per-bin and per-(type, bin) particle counts, the active-bin
/// mask, and the flat active-particle index list.
pub struct BinRegistry {
    count: Vec<AtomicU64>,
    count_by_kind: Vec<AtomicU64>,
    active: Vec<bool>,
    active_particles: Vec<usize>,
}

impl BinRegistry {
    /// Allocates the registry once, sized for `max_particles`. The active
    /// list is reused across syncs rather than reallocated.
    pub fn new(max_particles: usize) -> Self {
        let mut count = Vec::with_capacity(TIMEBINS as usize);
        count.resize_with(TIMEBINS as usize, || AtomicU64::new(0));
        let mut count_by_kind = Vec::with_capacity(TIMEBINS as usize * NUM_PARTICLE_KINDS);
        count_by_kind.resize_with(TIMEBINS as usize * NUM_PARTICLE_KINDS, || AtomicU64::new(0));
        Self {
            count,
            count_by_kind,
            active: vec![false; TIMEBINS as usize],
            active_particles: Vec::with_capacity(max_particles),
        }
    }

    fn kind_index(bin: Bin, kind: ParticleKind) -> usize {
        bin as usize * NUM_PARTICLE_KINDS + kind.as_index()
    }

    pub fn count(&self, bin: Bin) -> u64 {
        self.count[bin as usize].load(Ordering::Relaxed)
    }

    pub fn count_by_kind(&self, bin: Bin, kind: ParticleKind) -> u64 {
        self.count_by_kind[Self::kind_index(bin, kind)].load(Ordering::Relaxed)
    }

    pub fn is_active(&self, bin: Bin) -> bool {
        self.active[bin as usize]
    }

    pub fn active_mask(&self) -> &[bool] {
        &self.active
    }

    pub fn active_particles(&self) -> &[usize] {
        &self.active_particles
    }

    pub fn num_active_particles(&self) -> usize {
        self.active_particles.len()
    }

    /// `rebuild_activelist`: zero all bin counts, then for every local
    /// particle increment `TimeBinCount[TimeBin]` (and the per-type count)
    /// and, if that bin is active, append the particle's index to the
    /// active list. Idempotent given unchanged inputs.
    pub fn rebuild_active_list(&mut self, particles: &[Particle]) {
        for c in &self.count {
            c.store(0, Ordering::Relaxed);
        }
        for c in &self.count_by_kind {
            c.store(0, Ordering::Relaxed);
        }
        self.active_particles.clear();
        for (index, particle) in particles.iter().enumerate() {
            self.count[particle.time_bin as usize].fetch_add(1, Ordering::Relaxed);
            self.count_by_kind[Self::kind_index(particle.time_bin, particle.kind)]
                .fetch_add(1, Ordering::Relaxed);
            if self.active[particle.time_bin as usize] {
                self.active_particles.push(index);
            }
        }
    }

    /// `update_active_timebins`: bin `b` is active iff
    /// `next_kick_ti mod 2^b == 0`. Bin 0 is always active (the
    /// "always-on" short-range set). Returns the total number of force
    /// updates this sync point will perform, `Σ TimeBinCount[b]` over
    /// active `b`.
    pub fn update_active_timebins(&mut self, next_kick_ti: crate::units::Tick) -> u64 {
        self.active[0] = true;
        for bin in 1..TIMEBINS {
            self.active[bin as usize] = next_kick_ti % (1u32 << bin) == 0;
        }
        (0..TIMEBINS)
            .filter(|&b| self.active[b as usize])
            .map(|b| self.count(b))
            .sum()
    }

    /// Direct accessor used by a driver replaying state from a restart
    /// file, where the active mask was itself persisted rather than
    /// recomputed from `next_kick_ti`.
    pub fn set_active_mask(&mut self, mask: &[bool]) {
        self.active.copy_from_slice(mask);
    }

    /// Atomically move one particle's count contribution from `old` to
    /// `new`. Called by the Kick Engine when a particle's bin changes;
    /// safe to call concurrently for different particles because each
    /// update only ever touches the two affected `(bin[, kind])` counters
    /// with atomic fetch-add/sub.
    pub fn migrate(&self, old: Bin, new: Bin, kind: ParticleKind) {
        self.count[old as usize].fetch_sub(1, Ordering::Relaxed);
        self.count[new as usize].fetch_add(1, Ordering::Relaxed);
        self.count_by_kind[Self::kind_index(old, kind)].fetch_sub(1, Ordering::Relaxed);
        self.count_by_kind[Self::kind_index(new, kind)].fetch_add(1, Ordering::Relaxed);
    }

    /// Checks the bin-accounting invariant: `Σ_b TimeBinCount[b] == NumPart`
    /// and the per-type counts sum to the same total per bin. Intended for
    /// tests and debug assertions, not the hot path.
    pub fn check_invariants(&self, num_particles: usize) -> bool {
        let total: u64 = (0..TIMEBINS).map(|b| self.count(b)).sum();
        if total != num_particles as u64 {
            return false;
        }
        for b in 0..TIMEBINS {
            let by_kind: u64 = ParticleKind::ALL
                .iter()
                .map(|&k| self.count_by_kind(b, k))
                .sum();
            if by_kind != self.count(b) {
                return false;
            }
        }
        true
    }
}
