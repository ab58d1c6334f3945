//! The synchronizer: advances the global clock to the next tick at which
//! any nonempty bin fires, and the PM-boundary test the kick engine uses to
//! decide when to recompute the long-range step.

use crate::bin_registry::BinRegistry;
use crate::communication::Collectives;
use crate::units::Tick;
use crate::units::TIMEBASE;
use crate::units::TIMEBINS;

/// `find_next_kick`: the next tick at which any nonempty bin fires.
///
/// 1. Mask off the snapshot bits of `ti_current` (keep the lower
///    `log2(TIMEBASE)` bits).
/// 2. If bin 0 is populated, seed `best` with the masked current tick
///    (forces an immediate sync every call, since bin 0 is the always-on
///    short-range set).
/// 3. For each bin `n >= 1` with a nonzero count, the candidate is the next
///    multiple of `2^n` strictly after the masked current tick; keep the
///    minimum over all populated bins.
/// 4. Re-apply the snapshot bits and all-reduce MIN across ranks.
pub fn find_next_kick(ti_current: Tick, registry: &BinRegistry, collectives: &dyn Collectives) -> Tick {
    let snapshot_bits = ti_current & !(TIMEBASE - 1);
    let local = ti_current & (TIMEBASE - 1);

    let mut best: Option<Tick> = None;
    if registry.count(0) > 0 {
        best = Some(local);
    }
    for bin in 1..TIMEBINS {
        if registry.count(bin) == 0 {
            continue;
        }
        let step = 1u32 << bin;
        let candidate = (local / step) * step + step;
        best = Some(best.map_or(candidate, |b| b.min(candidate)));
    }
    // No populated bin means no particle exists anywhere in the local
    // active-timebin tables; the only sound answer is "nothing to do until
    // some other rank says otherwise," so fall back to the current tick and
    // let the all-reduce pick up whatever any populated rank proposes.
    let local_result = snapshot_bits | best.unwrap_or(local);

    collectives.all_reduce_min_u64(local_result as u64) as Tick
}

/// `is_PM_timestep(ti)`: true when `ti` lands exactly on the end of the
/// current PM super-step, i.e. when the long-range step must be
/// recomputed and kicked before the clock can advance past it.
pub fn is_pm_timestep(ti: Tick, pm_start: Tick, pm_step: Tick) -> bool {
    ti == pm_start + pm_step
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::SingleRankCollectives;
    use crate::particle::Particle;
    use crate::particle::ParticleId;
    use crate::particle::ParticleKind;
    use crate::units::Vec3;

    fn registry_with_bins(bins: &[u8]) -> BinRegistry {
        let particles: Vec<Particle> = bins
            .iter()
            .enumerate()
            .map(|(i, &bin)| {
                let mut p = Particle::new(ParticleId(i as u64), ParticleKind::Halo, 1.0, Vec3::ZERO);
                p.time_bin = bin;
                p
            })
            .collect();
        let mut registry = BinRegistry::new(particles.len());
        registry.update_active_timebins(0);
        registry.rebuild_active_list(&particles);
        registry
    }

    #[test]
    fn four_to_one_step_ratio_syncs_at_every_short_step() {
        // Particle A in bin 5 (dti=32), B in bin 3 (dti=8). The next four
        // find_next_kick values starting from Ti_Current=0 must be
        // 8, 16, 24, 32.
        let registry = registry_with_bins(&[5, 3]);
        let collectives = SingleRankCollectives;
        let mut ti = 0;
        let expected = [8, 16, 24, 32];
        for &want in &expected {
            ti = find_next_kick(ti, &registry, &collectives);
            assert_eq!(ti, want);
        }
    }

    #[test]
    fn bin_zero_forces_immediate_sync() {
        let registry = registry_with_bins(&[0, 4]);
        let collectives = SingleRankCollectives;
        assert_eq!(find_next_kick(100, &registry, &collectives), 100);
    }

    #[test]
    fn snapshot_bits_above_timebase_are_preserved() {
        let registry = registry_with_bins(&[3]);
        let collectives = SingleRankCollectives;
        let snapshot_tag = 5u32 << crate::units::TIMEBASE_EXPONENT;
        let ti_current = snapshot_tag | 0;
        let next = find_next_kick(ti_current, &registry, &collectives);
        assert_eq!(next & !(TIMEBASE - 1), snapshot_tag);
        assert_eq!(next & (TIMEBASE - 1), 8);
    }

    #[test]
    fn is_pm_timestep_matches_the_boundary_exactly() {
        assert!(is_pm_timestep(1024, 0, 1024));
        assert!(!is_pm_timestep(1023, 0, 1024));
        assert!(!is_pm_timestep(1025, 0, 1024));
    }
}
