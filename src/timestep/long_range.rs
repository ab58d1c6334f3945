//! `get_long_range_timestep_dloga`: the cluster-wide PM step criterion. For
//! each particle type with nonzero global population, compute the rms
//! speed and minimum mass, derive the mean inter-particle spacing, and take
//! the minimum candidate step across types (excluding the configured
//! fast-particle type).
//!
//! `TimestepParameters::validate` already rejects `fast_particle_type == 0`
//! at construction, so this function never has to decide whether a
//! gas-excluding run should still be bounded by baryons.
//!
//! Baryon/CDM bucket assignment: gas, stars, and boundary (BH) particles
//! are the baryonic sector by type tag (`Ω_baryon`); halo, disk, and bulge
//! are the non-baryonic sector (`Ω_CDM`). When `StarformationOn`, the three
//! baryonic types are pooled into one bucket before computing `σ`/`m_min`;
//! when off, each type is its own candidate.

use crate::communication::Collectives;
use crate::cosmology::Cosmology;
use crate::integrator::GlobalTime;
use crate::particle::Particle;
use crate::particle::ParticleKind;
use crate::units::Float;

use super::parameters::TimestepParameters;

/// One candidate population: the kinds pooled into it, and the Ω it uses.
struct Bucket {
    kinds: &'static [ParticleKind],
    omega: Float,
}

fn buckets(params: &TimestepParameters, cosmology: &Cosmology) -> Vec<Bucket> {
    const BARYONIC: [ParticleKind; 3] = [ParticleKind::Gas, ParticleKind::Stars, ParticleKind::Boundary];
    const HALO: [ParticleKind; 1] = [ParticleKind::Halo];
    const DISK: [ParticleKind; 1] = [ParticleKind::Disk];
    const BULGE: [ParticleKind; 1] = [ParticleKind::Bulge];
    const GAS: [ParticleKind; 1] = [ParticleKind::Gas];
    const STARS: [ParticleKind; 1] = [ParticleKind::Stars];
    const BOUNDARY: [ParticleKind; 1] = [ParticleKind::Boundary];

    let mut out = vec![
        Bucket {
            kinds: &HALO,
            omega: cosmology.omega_cdm,
        },
        Bucket {
            kinds: &DISK,
            omega: cosmology.omega_cdm,
        },
        Bucket {
            kinds: &BULGE,
            omega: cosmology.omega_cdm,
        },
    ];
    if params.star_formation_on {
        out.push(Bucket {
            kinds: &BARYONIC,
            omega: cosmology.omega_baryon,
        });
    } else {
        out.push(Bucket {
            kinds: &GAS,
            omega: cosmology.omega_baryon,
        });
        out.push(Bucket {
            kinds: &STARS,
            omega: cosmology.omega_baryon,
        });
        out.push(Bucket {
            kinds: &BOUNDARY,
            omega: cosmology.omega_baryon,
        });
    }
    out
}

fn local_moments(particles: &[Particle], kinds: &[ParticleKind]) -> (u64, Float, Float) {
    let mut count = 0u64;
    let mut sum_v2 = 0.0;
    let mut min_mass = Float::INFINITY;
    for p in particles {
        if kinds.contains(&p.kind) {
            count += 1;
            sum_v2 += p.velocity.length_squared();
            min_mass = min_mass.min(p.mass);
        }
    }
    (count, sum_v2, min_mass)
}

/// `get_long_range_timestep_dloga`: the minimum PM-step candidate across
/// all populated, non-fast-particle buckets, clipped to `MaxSizeTimestep`.
/// Returns `MaxSizeTimestep` unchanged if no bucket is populated anywhere
/// in the cluster.
pub fn get_long_range_timestep_dloga(
    particles: &[Particle],
    params: &TimestepParameters,
    cosmology: &Cosmology,
    global_time: &GlobalTime,
    collectives: &dyn Collectives,
) -> Float {
    let asmth = params.asmth * params.box_size / params.nmesh as Float;
    let rho_crit = 3.0 * cosmology.hubble0().powi(2) / (8.0 * std::f64::consts::PI * cosmology.gravity_constant);
    let fast_kind = ParticleKind::from_index(params.fast_particle_type);

    let mut best: Option<Float> = None;
    for bucket in buckets(params, cosmology) {
        if fast_kind.is_some_and(|fast| bucket.kinds.contains(&fast)) {
            continue;
        }
        let (local_count, local_sum_v2, local_min_mass) = local_moments(particles, bucket.kinds);
        let count = collectives.all_reduce_sum_u64(local_count);
        if count == 0 {
            continue;
        }
        let sum_v2 = collectives.all_reduce_sum_f64(local_sum_v2);
        let min_mass = collectives.all_reduce_min_f64(local_min_mass);
        let sigma = (sum_v2 / count as Float).sqrt();
        if sigma <= 0.0 {
            continue;
        }
        let d_mean = (min_mass / (bucket.omega * rho_crit)).cbrt();
        let candidate = params.max_rms_displacement_fac
            * global_time.hubble_a2
            * asmth.min(d_mean)
            / sigma;
        best = Some(best.map_or(candidate, |b: Float| b.min(candidate)));
    }
    best.unwrap_or(params.max_size_timestep).min(params.max_size_timestep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::SingleRankCollectives;
    use crate::particle::ParticleId;
    use crate::units::Vec3;

    fn params() -> TimestepParameters {
        TimestepParameters {
            err_tol_int_accuracy: 0.025,
            courant_fac: 0.15,
            max_size_timestep: 1.0,
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

    fn halo_particle(mass: Float, vx: Float) -> Particle {
        let mut p = Particle::new(ParticleId(0), ParticleKind::Halo, mass, Vec3::ZERO);
        p.velocity = Vec3::new(vx, 0.0, 0.0);
        p
    }

    #[test]
    fn no_populated_bucket_returns_max_size_timestep() {
        let params = params();
        let cosmology = Cosmology::flat_matter_dominated(1.0);
        let global_time = GlobalTime::at(&cosmology, params.adiabatic_index, 1.0);
        let collectives = SingleRankCollectives;
        let dloga = get_long_range_timestep_dloga(&[], &params, &cosmology, &global_time, &collectives);
        assert_eq!(dloga, params.max_size_timestep);
    }

    #[test]
    fn populated_halo_bucket_yields_a_finite_positive_step() {
        let params = params();
        let cosmology = Cosmology {
            omega0: 0.3,
            omega_baryon: 0.05,
            omega_cdm: 0.25,
            omega_radiation: 0.0,
            hubble_param0: 1.0,
            gravity_constant: 1.0,
        };
        let global_time = GlobalTime::at(&cosmology, params.adiabatic_index, 1.0);
        let collectives = SingleRankCollectives;
        let particles = vec![halo_particle(1.0, 10.0), halo_particle(2.0, 20.0)];
        let dloga =
            get_long_range_timestep_dloga(&particles, &params, &cosmology, &global_time, &collectives);
        assert!(dloga > 0.0 && dloga.is_finite());
        assert!(dloga <= params.max_size_timestep);
    }

    #[test]
    fn fast_particle_type_bucket_is_excluded_from_the_minimum() {
        let mut params = params();
        params.fast_particle_type = 1; // Halo
        let cosmology = Cosmology::flat_matter_dominated(1.0);
        let global_time = GlobalTime::at(&cosmology, params.adiabatic_index, 1.0);
        let collectives = SingleRankCollectives;
        // Only a halo particle exists, and halo is the fast type: no bucket
        // is populated after exclusion, so the result is MaxSizeTimestep.
        let particles = vec![halo_particle(1.0, 1e6)];
        let dloga =
            get_long_range_timestep_dloga(&particles, &params, &cosmology, &global_time, &collectives);
        assert_eq!(dloga, params.max_size_timestep);
    }
}
