//! Shared fixtures for tests scattered across the crate's `#[cfg(test)]`
//! modules: a flat softening table, a baseline `TimestepParameters`, and
//! the small amount of `IntegratorState` plumbing every scenario test
//! needs to set up before it can call into the Kick Engine or Synchronizer.

use crate::cosmology::Cosmology;
use crate::integrator::IntegratorState;
use crate::parameters::IntegratorParameters;
use crate::particle::Particle;
use crate::particle::ParticleId;
use crate::particle::ParticleKind;
use crate::softening::SofteningParameters;
use crate::softening::TypeSoftening;
use crate::timeline::LogScaleFactorRange;
use crate::timestep::parameters::TimestepParameters;
use crate::units::Float;
use crate::units::Tick;
use crate::units::Vec3;

#[allow(dead_code)]
pub fn flat_softening(comoving: Float) -> SofteningParameters {
    let t = TypeSoftening {
        comoving,
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

#[allow(dead_code)]
pub fn base_timestep_parameters() -> TimestepParameters {
    TimestepParameters {
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
    }
}

#[allow(dead_code)]
pub fn base_integrator_parameters(timestep: TimestepParameters) -> IntegratorParameters {
    IntegratorParameters {
        cosmology: Cosmology::flat_matter_dominated(1.0),
        timestep,
        softening: flat_softening(0.01),
        logging: Default::default(),
    }
}

#[allow(dead_code)]
pub fn build_state(timestep: TimestepParameters, pm_step: Tick, max_particles: usize) -> IntegratorState {
    let parameters = base_integrator_parameters(timestep);
    let range = LogScaleFactorRange::new(0.01, 1.0);
    IntegratorState::new(parameters, range, max_particles, 1.0, pm_step).unwrap()
}

#[allow(dead_code)]
pub fn make_halo(id: u64) -> Particle {
    Particle::new(ParticleId(id), ParticleKind::Halo, 1.0, Vec3::ZERO)
}

#[allow(dead_code)]
pub fn make_gas(id: u64) -> Particle {
    Particle::new(ParticleId(id), ParticleKind::Gas, 1.0, Vec3::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_state_produces_a_particle_ready_registry() {
        let state = build_state(base_timestep_parameters(), 1024, 4);
        assert_eq!(state.pm.step, 1024);
        assert_eq!(state.registry.num_active_particles(), 0);
    }
}
