//! The integrator context: the mutable state the five components share,
//! passed explicitly rather than resolved from globals.
//!
//! [`IntegratorState`] owns the parameter structs, the tick/scale-factor
//! range, the kick-factor cache, the bin registry, the PM super-step, the
//! resolved softening, and the derived per-`set_global_time` quantities in
//! [`GlobalTime`]. It exposes the public entry points a driver calls:
//! `init_timebins`, `set_global_time`, `set_softenings`,
//! `get_short_kick_time`, `is_PM_timestep`, plus `find_next_kick`. The
//! three kick entry points (`advance_and_find_timesteps`, `apply_half_kick`,
//! the short/long-range kicks) live in [`crate::kick`] as free functions
//! over `&mut IntegratorState` instead.

use crate::bin_registry::BinRegistry;
use crate::cosmology::Cosmology;
use crate::parameters::IntegratorParameters;
use crate::particle::Particle;
use crate::softening::ResolvedSoftening;
use crate::timeline::KickFactorCache;
use crate::timeline::LogScaleFactorRange;
use crate::timestep::parameters::InvalidFastParticleType;
use crate::units::Float;
use crate::units::Tick;

/// The PM super-step: the current long-range interval is
/// `[start, start+step)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmState {
    pub start: Tick,
    pub step: Tick,
}

/// The scale-factor-dependent derived quantities `set_global_time`
/// recomputes: `a2inv`, `a3inv`, `fac_egy = a^{3(γ-1)}`, `hubble`,
/// `hubble_a2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalTime {
    pub scale_factor: Float,
    pub a2inv: Float,
    pub a3inv: Float,
    pub fac_egy: Float,
    pub hubble: Float,
    pub hubble_a2: Float,
}

impl GlobalTime {
    pub fn at(cosmology: &Cosmology, gamma: Float, scale_factor: Float) -> Self {
        Self {
            scale_factor,
            a2inv: 1.0 / (scale_factor * scale_factor),
            a3inv: 1.0 / (scale_factor * scale_factor * scale_factor),
            fac_egy: scale_factor.powf(3.0 * (gamma - 1.0)),
            hubble: cosmology.hubble_function(scale_factor),
            hubble_a2: cosmology.hubble_a2(scale_factor),
        }
    }
}

/// The mutable state shared by the five components, plus the immutable
/// configuration it was built from.
pub struct IntegratorState {
    pub parameters: IntegratorParameters,
    pub range: LogScaleFactorRange,
    pub registry: BinRegistry,
    pub kick_cache: KickFactorCache,
    pub pm: PmState,
    pub global_time: GlobalTime,
    pub softening: ResolvedSoftening,
    pub ti_current: Tick,
}

impl IntegratorState {
    pub fn new(
        parameters: IntegratorParameters,
        range: LogScaleFactorRange,
        max_particles: usize,
        initial_scale_factor: Float,
        initial_pm_step: Tick,
    ) -> Result<Self, InvalidFastParticleType> {
        parameters.validate()?;
        let softening = ResolvedSoftening::update(&parameters.softening, initial_scale_factor);
        let global_time = GlobalTime::at(
            &parameters.cosmology,
            parameters.timestep.adiabatic_index,
            initial_scale_factor,
        );
        Ok(Self {
            registry: BinRegistry::new(max_particles),
            kick_cache: KickFactorCache::new(),
            pm: PmState {
                start: 0,
                step: initial_pm_step,
            },
            global_time,
            softening,
            ti_current: 0,
            range,
            parameters,
        })
    }

    /// `init_timebins`: every particle starts in bin 0 at the origin of the
    /// timeline, then the registry is built against that state.
    pub fn init_timebins(&mut self, particles: &mut [Particle]) {
        for p in particles.iter_mut() {
            p.time_bin = 0;
            p.ti_begstep = 0;
            p.ti_drift = 0;
            #[cfg(debug_assertions)]
            {
                p.ti_kick = 0;
            }
        }
        self.registry.update_active_timebins(0);
        self.registry.rebuild_active_list(particles);
    }

    /// `set_global_time(a)`: advances the derived cosmology factors, clears
    /// the kick-factor cache (its entries are only valid within one epoch
    /// between scale-factor updates), refreshes softening, and forwards to
    /// the named collaborators.
    pub fn set_global_time(
        &mut self,
        scale_factor: Float,
        collaborators: &mut dyn crate::diagnostics::Collaborators,
    ) {
        self.global_time = GlobalTime::at(
            &self.parameters.cosmology,
            self.parameters.timestep.adiabatic_index,
            scale_factor,
        );
        self.kick_cache.clear();
        self.softening = ResolvedSoftening::update(&self.parameters.softening, scale_factor);
        collaborators.ionize_params(scale_factor);
        collaborators.lightcone_set_time(scale_factor);
    }

    /// `set_softenings(a)`: recomputes the resolved softening in isolation,
    /// for a driver that wants to refresh it without the rest of
    /// `set_global_time`'s side effects.
    pub fn set_softenings(&mut self, scale_factor: Float) {
        self.softening = ResolvedSoftening::update(&self.parameters.softening, scale_factor);
    }

    /// `get_short_kick_time(i)`: the midpoint of particle `p`'s current
    /// step, i.e. the tick its next short-range kick will land on.
    pub fn get_short_kick_time(&self, p: &Particle) -> Tick {
        crate::timeline::get_kick_ti(p.ti_begstep, 1u32 << p.time_bin)
    }

    /// `is_PM_timestep(ti)`.
    pub fn is_pm_timestep(&self, ti: Tick) -> bool {
        crate::sync::is_pm_timestep(ti, self.pm.start, self.pm.step)
    }

    /// `find_next_kick`: delegates to [`crate::sync`] with this state's
    /// current tick and bin registry.
    pub fn find_next_kick(&self, collectives: &dyn crate::communication::Collectives) -> Tick {
        crate::sync::find_next_kick(self.ti_current, &self.registry, collectives)
    }

    pub fn set_current_tick(&mut self, ti: Tick) {
        self.ti_current = ti;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NullCollaborators;
    use crate::softening::SofteningParameters;
    use crate::softening::TypeSoftening;
    use crate::timestep::parameters::TimestepParameters;

    fn flat_softening() -> SofteningParameters {
        let t = TypeSoftening {
            comoving: 0.01,
            max_physical: 0.0,
        };
        SofteningParameters {
            gas: t,
            halo: t,
            disk: t,
            bulge: t,
            stars: t,
            boundary: t,
            min_gas_hsml_fractional: 0.25,
        }
    }

    fn test_parameters() -> IntegratorParameters {
        IntegratorParameters {
            cosmology: Cosmology::flat_matter_dominated(1.0),
            timestep: TimestepParameters {
                err_tol_int_accuracy: 0.025,
                courant_fac: 0.15,
                max_size_timestep: 0.03,
                min_size_timestep: 0.0,
                max_rms_displacement_fac: 0.2,
                asmth: 1.25,
                nmesh: 64,
                box_size: 100.0,
                force_equal_timesteps: false,
                tree_grav_on: true,
                max_gas_vel: 3e5,
                min_egy_spec: None,
                star_formation_on: false,
                fast_particle_type: 2,
                adiabatic_index: 5.0 / 3.0,
                adaptive_gravsoft_for_gas: false,
            },
            softening: flat_softening(),
            logging: Default::default(),
        }
    }

    #[test]
    fn construction_rejects_invalid_fast_particle_type() {
        let mut parameters = test_parameters();
        parameters.timestep.fast_particle_type = 0;
        let range = LogScaleFactorRange::new(0.01, 1.0);
        let result = IntegratorState::new(parameters, range, 10, 0.01, 1024);
        assert!(result.is_err());
    }

    #[test]
    fn init_timebins_puts_every_particle_in_bin_zero_and_active() {
        let parameters = test_parameters();
        let range = LogScaleFactorRange::new(0.01, 1.0);
        let mut state = IntegratorState::new(parameters, range, 4, 0.01, 1024).unwrap();
        let mut particles = vec![
            Particle::new(
                crate::particle::ParticleId(0),
                crate::particle::ParticleKind::Halo,
                1.0,
                crate::units::Vec3::ZERO,
            ),
            Particle::new(
                crate::particle::ParticleId(1),
                crate::particle::ParticleKind::Halo,
                1.0,
                crate::units::Vec3::ZERO,
            ),
        ];
        state.init_timebins(&mut particles);
        assert!(particles.iter().all(|p| p.time_bin == 0));
        assert_eq!(state.registry.num_active_particles(), 2);
    }

    #[test]
    fn set_global_time_clears_the_kick_cache() {
        let parameters = test_parameters();
        let range = LogScaleFactorRange::new(0.01, 1.0);
        let mut state = IntegratorState::new(parameters, range, 4, 0.01, 1024).unwrap();
        let a = state
            .kick_cache
            .gravkick_factor(&state.range, &state.parameters.cosmology, 0, 1000);
        let mut collaborators = NullCollaborators;
        state.set_global_time(0.5, &mut collaborators);
        let b = state
            .kick_cache
            .gravkick_factor(&state.range, &state.parameters.cosmology, 0, 1000);
        // Cleared cache recomputes rather than returning a stale value from
        // the wrong epoch; with a changed scale-factor range window (0.5 is
        // still inside [0.01,1.0], so the range itself is unchanged here),
        // a fresh computation should still agree since the integrand only
        // depends on (t0, t1) through `range`. The real assertion is that
        // `set_global_time` does not panic and the cache is usable again.
        assert_eq!(a, b);
    }

    #[test]
    fn get_short_kick_time_is_the_step_midpoint() {
        let parameters = test_parameters();
        let range = LogScaleFactorRange::new(0.01, 1.0);
        let state = IntegratorState::new(parameters, range, 4, 0.01, 1024).unwrap();
        let mut p = Particle::new(
            crate::particle::ParticleId(0),
            crate::particle::ParticleKind::Halo,
            1.0,
            crate::units::Vec3::ZERO,
        );
        p.time_bin = 4;
        p.ti_begstep = 100;
        assert_eq!(state.get_short_kick_time(&p), 100 + 8);
    }
}
