use serde::Deserialize;

use crate::units::Float;

/// The configuration options that drive the timestep selector, both the
/// short-range criteria (`get_timestep_dloga`) and the long-range (PM)
/// step (`get_long_range_timestep_dloga`).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TimestepParameters {
    /// `ErrTolIntAccuracy`, η in the gravity criterion.
    pub err_tol_int_accuracy: Float,
    /// `CourantFac`, the Courant safety factor for the hydro criterion.
    pub courant_fac: Float,
    /// Upper bound on `dloga` for a single step.
    pub max_size_timestep: Float,
    /// Lower bound on `dloga` for a single step.
    pub min_size_timestep: Float,
    /// `MaxRMSDisplacementFac`, f_rms in the PM step criterion.
    pub max_rms_displacement_fac: Float,
    pub asmth: Float,
    pub nmesh: u32,
    pub box_size: Float,
    /// `ForceEqualTimesteps`: collapse every active particle's raw step to
    /// the cluster-wide minimum.
    pub force_equal_timesteps: bool,
    /// `TreeGravOn`: when `false`, `get_timestep_dloga` returns `dti_max`
    /// directly (no physical criterion is evaluated).
    pub tree_grav_on: bool,
    /// `MaxGasVel`, annotated in the reference source as "should probably
    /// not be needed" but preserved and exposed as a configurable threshold
    /// rather than hardcoded.
    pub max_gas_vel: Float,
    /// `MinEgySpec`: when set, the entropy floor in
    /// `kick::do_short_range_kick` is enforced; when absent, no floor is
    /// applied.
    pub min_egy_spec: Option<Float>,
    /// `StarformationOn`: when true, the long-range step criterion merges
    /// gas, stars, and black holes into one "baryonic" bucket using
    /// `Omega_baryon`; when false, the split follows the type tag alone.
    pub star_formation_on: bool,
    /// `FastParticleType`, excluded from the long-range step minimum (the
    /// type tag, `0..=5`). Validated at construction: a value of `0` (gas)
    /// is rejected rather than silently bounding the PM step by baryons.
    /// See [`TimestepParameters::validate`].
    pub fast_particle_type: u8,
    /// The adiabatic index γ of the gas equation of state. Required by
    /// nearly every formula here: the Courant criterion, the hydro-kick
    /// factor, the entropy floor.
    pub adiabatic_index: Float,
    /// `ADAPTIVE_GRAVSOFT_FORGAS`: when true, gas particles use
    /// `Hsml/2.8` in place of the type's softening in the gravity
    /// criterion.
    pub adaptive_gravsoft_for_gas: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidFastParticleType(pub u8);

impl TimestepParameters {
    /// A run with `FastParticleType == 0` (gas) is rejected at parameter
    /// validation rather than silently bounding the PM step by the baryon
    /// criterion it was meant to exclude.
    pub fn validate(&self) -> Result<(), InvalidFastParticleType> {
        if self.fast_particle_type == 0 {
            Err(InvalidFastParticleType(self.fast_particle_type))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> TimestepParameters {
        TimestepParameters {
            err_tol_int_accuracy: 0.025,
            courant_fac: 0.15,
            max_size_timestep: 0.03,
            min_size_timestep: 0.0,
            max_rms_displacement_fac: 0.2,
            asmth: 1.25,
            nmesh: 256,
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

    #[test]
    fn fast_particle_type_zero_is_rejected() {
        let mut params = base();
        params.fast_particle_type = 0;
        assert_eq!(params.validate(), Err(InvalidFastParticleType(0)));
    }

    #[test]
    fn nonzero_fast_particle_type_is_accepted() {
        assert_eq!(base().validate(), Ok(()));
    }
}
