//! Per-type gravitational softening (`set_softenings`).
//!
//! Comoving softening is clamped so the *physical* softening never exceeds
//! a configured maximum: `ForceSoftening = 2.8 * min(ε_comoving,
//! ε_max_phys / a)`. `MinGasHsml` is a fraction of the gas softening.

use serde::Deserialize;

use crate::particle::ParticleKind;
use crate::particle::NUM_PARTICLE_KINDS;
use crate::units::Float;

/// Comoving softening length and physical cap for one particle type.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TypeSoftening {
    pub comoving: Float,
    pub max_physical: Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SofteningParameters {
    pub gas: TypeSoftening,
    pub halo: TypeSoftening,
    pub disk: TypeSoftening,
    pub bulge: TypeSoftening,
    pub stars: TypeSoftening,
    pub boundary: TypeSoftening,
    /// `MinGasHsmlFractional`: the minimum SPH smoothing length as a
    /// fraction of the (scale-factor-dependent) gas force softening.
    pub min_gas_hsml_fractional: Float,
}

impl SofteningParameters {
    fn by_kind(&self, kind: ParticleKind) -> TypeSoftening {
        match kind {
            ParticleKind::Gas => self.gas,
            ParticleKind::Halo => self.halo,
            ParticleKind::Disk => self.disk,
            ParticleKind::Bulge => self.bulge,
            ParticleKind::Stars => self.stars,
            ParticleKind::Boundary => self.boundary,
        }
    }
}

/// The resolved, scale-factor-dependent softening state: one force
/// softening length per type, plus the derived minimum gas smoothing
/// length. Recomputed by [`Self::update`] at every `set_global_time`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedSoftening {
    force_softening: [Float; NUM_PARTICLE_KINDS],
    pub min_gas_hsml: Float,
}

impl ResolvedSoftening {
    pub fn force_softening(&self, kind: ParticleKind) -> Float {
        self.force_softening[kind.as_index()]
    }

    /// `set_softenings(a)`: comoving softening clamped so that physical
    /// `ε·a <= ε_max_phys`, then `ForceSoftening = 2.8 · ε`.
    pub fn update(parameters: &SofteningParameters, scale_factor: Float) -> Self {
        let mut force_softening = [0.0; NUM_PARTICLE_KINDS];
        for &kind in ParticleKind::ALL.iter() {
            let type_softening = parameters.by_kind(kind);
            let clamped = if type_softening.max_physical > 0.0
                && type_softening.comoving * scale_factor > type_softening.max_physical
            {
                type_softening.max_physical / scale_factor
            } else {
                type_softening.comoving
            };
            force_softening[kind.as_index()] = 2.8 * clamped;
        }
        let min_gas_hsml =
            parameters.min_gas_hsml_fractional * force_softening[ParticleKind::Gas.as_index()];
        Self {
            force_softening,
            min_gas_hsml,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameters() -> SofteningParameters {
        SofteningParameters {
            gas: TypeSoftening {
                comoving: 0.01,
                max_physical: 0.02,
            },
            halo: TypeSoftening {
                comoving: 0.05,
                max_physical: 0.0,
            },
            disk: TypeSoftening {
                comoving: 0.03,
                max_physical: 0.0,
            },
            bulge: TypeSoftening {
                comoving: 0.03,
                max_physical: 0.0,
            },
            stars: TypeSoftening {
                comoving: 0.01,
                max_physical: 0.0,
            },
            boundary: TypeSoftening {
                comoving: 0.01,
                max_physical: 0.0,
            },
            min_gas_hsml_fractional: 0.25,
        }
    }

    #[test]
    fn unclamped_softening_just_scales_by_2_8() {
        let params = parameters();
        let resolved = ResolvedSoftening::update(&params, 1.0);
        assert_eq!(resolved.force_softening(ParticleKind::Halo), 2.8 * 0.05);
    }

    #[test]
    fn physical_cap_clamps_comoving_softening_at_low_a() {
        let params = parameters();
        // At a = 0.1, comoving 0.01 gives physical 0.001 < cap 0.02: no clamp.
        let resolved = ResolvedSoftening::update(&params, 0.1);
        assert_eq!(resolved.force_softening(ParticleKind::Gas), 2.8 * 0.01);

        // At a = 10, comoving 0.01 gives physical 0.1 > cap 0.02: clamp to 0.02/10.
        let resolved = ResolvedSoftening::update(&params, 10.0);
        assert_eq!(resolved.force_softening(ParticleKind::Gas), 2.8 * 0.002);
    }

    #[test]
    fn min_gas_hsml_tracks_gas_softening() {
        let params = parameters();
        let resolved = ResolvedSoftening::update(&params, 1.0);
        assert_eq!(
            resolved.min_gas_hsml,
            0.25 * resolved.force_softening(ParticleKind::Gas)
        );
    }
}
