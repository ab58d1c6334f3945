//! `advance_and_find_timesteps`, `apply_half_kick`, the short- and
//! long-range kicks they both call through, and the drift-time predictors
//! (`sph_VelPred`, `EntropyPred`, `PressurePred`).
//!
//! The active-particle loop in `advance_and_find_timesteps` is a plain loop
//! over indices with no cross-particle dependency inside one iteration.
//! Each iteration only reads/writes its own `Particle` plus the atomic
//! bin-count tables in [`crate::bin_registry`], so a driver is free to run
//! it on a thread pool (`rayon`, `std::thread::scope`, ...) without any
//! locking added here.

use crate::bin_registry::BinRegistry;
use crate::communication::Collectives;
use crate::integrator::GlobalTime;
use crate::integrator::IntegratorState;
use crate::particle::Particle;
use crate::timeline::get_kick_ti;
use crate::timeline::KickFactorCache;
use crate::timeline::LogScaleFactorRange;
use crate::timestep;
use crate::timestep::parameters::TimestepParameters;
use crate::timestep::TimestepContext;
use crate::units::Bin;
use crate::units::Float;
use crate::units::Tick;
use crate::units::Vec3;
use crate::units::TIMEBASE;


/// A particle's raw step was zero, one, or exceeded `TIMEBASE`. There is no
/// local recovery from this: the core reports it, and the driver is
/// responsible for dumping snapshot 999999 via
/// [`crate::diagnostics::Collaborators::save_positions`] and terminating
/// via [`crate::diagnostics::Collaborators::endrun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadTimestepError {
    pub count: u64,
}

impl std::fmt::Display for BadTimestepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} particle(s) produced an illegal timestep", self.count)
    }
}

impl std::error::Error for BadTimestepError {}

/// Summary of one `advance_and_find_timesteps` call, for a driver that
/// wants to log or assert on what happened without re-deriving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KickReport {
    pub num_short_range_kicked: usize,
    pub pm_kicked: bool,
}

/// `advance_and_find_timesteps(do_half_kick)`: the main entry point,
/// called once per sync point after force kernels have refreshed
/// `grav_accel`/`grav_pm`/SPH state for every active particle.
pub fn advance_and_find_timesteps(
    state: &mut IntegratorState,
    particles: &mut [Particle],
    do_half_kick: bool,
    collectives: &dyn Collectives,
) -> Result<KickReport, BadTimestepError> {
    let ti_current = state.ti_current;

    // 1. Recompute the long-range step on a PM boundary.
    let pm_step_new = if state.is_pm_timestep(ti_current) {
        let dloga = timestep::long_range::get_long_range_timestep_dloga(
            particles,
            &state.parameters.timestep,
            &state.parameters.cosmology,
            &state.global_time,
            collectives,
        );
        let dloga = dloga.min(state.range.dloga_total);
        let raw = state.range.dti_from_dloga(dloga).unwrap_or(TIMEBASE);
        Some(timestep::round_down_power_of_two(raw).max(1))
    } else {
        None
    };
    let dti_max = pm_step_new.unwrap_or(state.pm.step);

    // 2. Optional equalization: every active particle adopts the
    // cluster-wide minimum of the raw (pre-rounding) step.
    let equalized: Option<Tick> = if state.parameters.timestep.force_equal_timesteps {
        let ctx = TimestepContext {
            parameters: &state.parameters.timestep,
            softening: &state.softening,
            global_time: &state.global_time,
        };
        let local_min = state
            .registry
            .active_particles()
            .iter()
            .map(|&i| timestep::get_timestep_dloga(&particles[i], dti_max, &state.range, &ctx))
            .min()
            .unwrap_or(dti_max);
        Some(collectives.all_reduce_min_u64(local_min as u64) as Tick)
    } else {
        None
    };

    // 3. Per-active-particle bin assignment and short-range kick.
    let mut bad_steps_local = 0u64;
    let active_indices: Vec<usize> = state.registry.active_particles().to_vec();
    for index in active_indices {
        let b_old = particles[index].time_bin;
        let dti_raw = match equalized {
            Some(v) => v,
            None => {
                let ctx = TimestepContext {
                    parameters: &state.parameters.timestep,
                    softening: &state.softening,
                    global_time: &state.global_time,
                };
                timestep::get_timestep_dloga(&particles[index], dti_max, &state.range, &ctx)
            }
        };

        if dti_raw <= 1 || dti_raw > TIMEBASE {
            bad_steps_local += 1;
            continue;
        }
        let mut b = timestep::get_timestep_bin(timestep::round_down_power_of_two(dti_raw));
        if b == 0 {
            bad_steps_local += 1;
            continue;
        }

        // Upward-movement guard: a particle may not be promoted into a
        // currently-inactive bin, which would let it skip a required kick.
        if b > b_old {
            while b > b_old && !state.registry.is_active(b) {
                b -= 1;
            }
        }

        if b != b_old {
            state.registry.migrate(b_old, b, particles[index].kind);
            particles[index].time_bin = b;
        }

        let dti_old = 1u32 << b_old;
        let dti_new = 1u32 << b;
        let tistart = get_kick_ti(particles[index].ti_begstep, dti_old);
        let tiend = if do_half_kick {
            particles[index].ti_begstep + dti_old
        } else {
            get_kick_ti(particles[index].ti_begstep + dti_old, dti_new)
        };
        particles[index].ti_begstep += dti_old;

        do_short_range_kick(
            &mut particles[index],
            &state.parameters.timestep,
            &state.parameters.cosmology,
            &state.range,
            &state.kick_cache,
            &state.global_time,
            tistart,
            tiend,
        );
    }

    // 4. All-reduce bad-step count; a nonzero total is terminal.
    let bad_steps = collectives.all_reduce_sum_u64(bad_steps_local);
    if bad_steps > 0 {
        return Err(BadTimestepError { count: bad_steps });
    }

    // 5. Long-range (PM) kick over the PM half-interval, then advance the
    // PM super-step.
    let mut pm_kicked = false;
    if let Some(pm_step_new) = pm_step_new {
        let t0 = get_kick_ti(state.pm.start, state.pm.step);
        let t1 = if do_half_kick {
            state.pm.start + state.pm.step
        } else {
            get_kick_ti(state.pm.start + state.pm.step, pm_step_new)
        };
        do_long_range_kick(
            particles,
            &state.kick_cache,
            &state.range,
            &state.parameters.cosmology,
            t0,
            t1,
        );
        state.pm.start += state.pm.step;
        state.pm.step = pm_step_new;
        pm_kicked = true;
    }

    Ok(KickReport {
        num_short_range_kicked: state.registry.num_active_particles(),
        pm_kicked,
    })
}

/// `apply_half_kick()`: used right after a snapshot was written with only
/// the closing half-kick applied (see `advance_and_find_timesteps`'s
/// `do_half_kick` mode). Applies the remaining opening half, for every
/// active particle plus the PM half-interval; does not advance
/// `Ti_begstep` or the PM super-step.
pub fn apply_half_kick(state: &mut IntegratorState, particles: &mut [Particle]) {
    for &index in state.registry.active_particles() {
        let p = &mut particles[index];
        let dti = 1u32 << p.time_bin;
        let t0 = p.ti_begstep;
        let t1 = get_kick_ti(p.ti_begstep, dti);
        do_short_range_kick(
            p,
            &state.parameters.timestep,
            &state.parameters.cosmology,
            &state.range,
            &state.kick_cache,
            &state.global_time,
            t0,
            t1,
        );
    }
    let t0 = state.pm.start;
    let t1 = get_kick_ti(state.pm.start, state.pm.step);
    do_long_range_kick(
        particles,
        &state.kick_cache,
        &state.range,
        &state.parameters.cosmology,
        t0,
        t1,
    );
}

/// `do_the_short_range_kick(i, t0, t1)`: applies the tree (and, for gas,
/// hydro) momentum update over `[t0, t1)`, plus the gas-only velocity cap
/// and entropy predictor-corrector guard.
#[allow(clippy::too_many_arguments)]
fn do_short_range_kick(
    p: &mut Particle,
    params: &TimestepParameters,
    cosmology: &crate::cosmology::Cosmology,
    range: &LogScaleFactorRange,
    cache: &KickFactorCache,
    global_time: &GlobalTime,
    t0: Tick,
    t1: Tick,
) {
    #[cfg(debug_assertions)]
    debug_assert_eq!(p.ti_kick, t0, "kick-time desync: expected Ti_kick == t0 on entry");

    let kg = cache.gravkick_factor(range, cosmology, t0, t1);
    p.velocity += p.grav_accel * kg;

    if let Some(sph) = p.sph.as_mut() {
        let gamma = params.adiabatic_index;
        let kh = cache.hydrokick_factor(range, cosmology, t0, t1, gamma);
        p.velocity += sph.hydro_accel * kh;

        let dloga = range.dloga_from_dti(t1 - t0);

        let speed = p.velocity.length();
        let cap = params.max_gas_vel * global_time.a3inv.sqrt();
        if speed > cap && speed > 0.0 {
            p.velocity *= cap / speed;
        }

        if sph.dt_entropy * dloga < -0.5 * sph.entropy {
            sph.entropy *= 0.5;
        } else {
            sph.entropy += sph.dt_entropy * dloga;
        }

        if let Some(min_egy_spec) = params.min_egy_spec {
            // rho_EOM is taken equal to the plain SPH density.
            let rho_eom_a3inv = sph.density * global_time.a3inv;
            let a_min = min_egy_spec * (gamma - 1.0) / rho_eom_a3inv.powf(gamma - 1.0);
            if sph.entropy < a_min {
                sph.entropy = a_min;
                sph.dt_entropy = 0.0;
            }
        }

        let dloga_next = range.dloga_for_bin(p.time_bin) / 2.0;
        if sph.dt_entropy * dloga_next < -0.5 * sph.entropy {
            sph.dt_entropy = -0.5 * sph.entropy / dloga_next;
        }
    }

    #[cfg(debug_assertions)]
    {
        p.ti_kick = t1;
    }
}

/// `do_the_long_range_kick(t0, t1)`: the PM momentum update, applied to
/// every local particle, not just the active ones; the long-range force
/// changes for everyone on a PM boundary.
fn do_long_range_kick(
    particles: &mut [Particle],
    cache: &KickFactorCache,
    range: &LogScaleFactorRange,
    cosmology: &crate::cosmology::Cosmology,
    t0: Tick,
    t1: Tick,
) {
    let kg = cache.gravkick_factor(range, cosmology, t0, t1);
    for p in particles.iter_mut() {
        p.velocity += p.grav_pm * kg;
    }
}

/// The signed `dloga` a drift-time predictor needs: from `Ti_drift` forward
/// to the midpoint of the particle's currently-open step.
fn dloga_to_next_kick(p: &Particle, range: &LogScaleFactorRange) -> Float {
    let dti = 1u32 << p.time_bin;
    let next_kick_mid = get_kick_ti(p.ti_begstep, dti);
    range.dloga_between(p.ti_drift, next_kick_mid)
}

/// `sph_VelPred(i)`: the drift-time velocity estimate, subtracting the not-
/// yet-applied kick integral between `Ti_drift` and the next short-range
/// kick midpoint from the last-kicked velocity.
pub fn sph_vel_pred(
    p: &Particle,
    cache: &KickFactorCache,
    range: &LogScaleFactorRange,
    cosmology: &crate::cosmology::Cosmology,
    gamma: Float,
) -> Vec3 {
    let dti = 1u32 << p.time_bin;
    let next_kick_mid = get_kick_ti(p.ti_begstep, dti);
    let kg = cache.gravkick_factor(range, cosmology, p.ti_drift, next_kick_mid);
    let mut v = p.velocity - p.grav_accel * kg;
    if let Some(sph) = &p.sph {
        let kh = cache.hydrokick_factor(range, cosmology, p.ti_drift, next_kick_mid, gamma);
        v -= sph.hydro_accel * kh;
    }
    v
}

/// Shared extrapolation used by both `EntropyPred` and `PressurePred`:
/// the entropy `A` would have at `Ti_drift` given its current rate.
fn predicted_entropy(p: &Particle, range: &LogScaleFactorRange) -> Option<Float> {
    p.sph.as_ref().map(|sph| {
        let dloga = dloga_to_next_kick(p, range);
        sph.entropy - sph.dt_entropy * dloga
    })
}

/// `EntropyPred(i)`. Returns `None` for non-gas particles.
pub fn entropy_pred(p: &Particle, range: &LogScaleFactorRange) -> Option<Float> {
    predicted_entropy(p, range)
}

/// `PressurePred(i)`: the density-independent entropy form `(A + dA *
/// DeltaLogA) * rho_EOM^gamma`. Returns `None` for non-gas particles.
pub fn pressure_pred(p: &Particle, range: &LogScaleFactorRange, gamma: Float) -> Option<Float> {
    let sph = p.sph.as_ref()?;
    let a_pred = predicted_entropy(p, range)?;
    Some(a_pred * sph.density.powf(gamma))
}

#[cfg(test)]
pub(crate) fn registry_populated_with<'a>(
    particles: impl IntoIterator<Item = &'a Particle>,
) -> BinRegistry {
    let particles: Vec<Particle> = particles.into_iter().cloned().collect();
    let mut registry = BinRegistry::new(particles.len());
    registry.update_active_timebins(0);
    registry.rebuild_active_list(&particles);
    registry
}
