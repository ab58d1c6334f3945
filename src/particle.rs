//! The particle data model.
//!
//! `ParticleKind` is kept as a plain tag plus `match`, not a trait-object
//! hierarchy, so the hot path inlines cleanly. SPH and black-hole state are
//! carried as `Option` fields rather than separate particle arrays, which
//! keeps the active-list iteration in [`crate::bin_registry`] and
//! [`crate::kick`] a single flat loop over one slice.

use derive_more::Display;

use crate::units::Bin;
use crate::units::Float;
use crate::units::Tick;
use crate::units::Vec3;

/// The integer type tag: `{0..5}` for gas, halo, disk, bulge, stars,
/// boundary/BH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ParticleKind {
    Gas = 0,
    Halo = 1,
    Disk = 2,
    Bulge = 3,
    Stars = 4,
    Boundary = 5,
}

pub const NUM_PARTICLE_KINDS: usize = 6;

impl ParticleKind {
    pub const ALL: [ParticleKind; NUM_PARTICLE_KINDS] = [
        ParticleKind::Gas,
        ParticleKind::Halo,
        ParticleKind::Disk,
        ParticleKind::Bulge,
        ParticleKind::Stars,
        ParticleKind::Boundary,
    ];

    pub fn as_index(self) -> usize {
        self as u8 as usize
    }

    pub fn is_gas(self) -> bool {
        matches!(self, ParticleKind::Gas)
    }

    /// Inverse of the `{0..5}` integer type tag. Used to resolve the
    /// `FastParticleType` configuration option back to a `ParticleKind` for
    /// the long-range timestep criterion.
    pub fn from_index(index: u8) -> Option<Self> {
        ParticleKind::ALL.iter().copied().find(|k| k.as_index() as u8 == index)
    }
}

/// Extra state carried by type-0 (gas) particles: SPH density, entropy and
/// its rate, the hydrodynamic acceleration, smoothing length, and the
/// maximum signal velocity used by the Courant criterion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphState {
    pub density: Float,
    pub entropy: Float,
    pub dt_entropy: Float,
    pub hydro_accel: Vec3,
    pub smoothing_length: Float,
    pub max_signal_velocity: Float,
}

impl SphState {
    pub fn new(density: Float, entropy: Float, smoothing_length: Float) -> Self {
        Self {
            density,
            entropy,
            dt_entropy: 0.0,
            hydro_accel: Vec3::ZERO,
            smoothing_length,
            max_signal_velocity: 0.0,
        }
    }
}

/// Extra state carried by type-5 (boundary/black-hole) particles: the
/// accretion rate, when positive, feeds the accretion timestep limiter; the
/// minimum-timebin limiter bounds the step by a neighbor's bin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlackHoleState {
    pub accretion_rate: Float,
    pub mass: Float,
    pub min_neighbor_time_bin: Option<Bin>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub struct ParticleId(pub u64);

/// One particle, with the base fields plus optional SPH/BH state.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub id: ParticleId,
    pub kind: ParticleKind,
    pub mass: Float,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Short-range (tree) gravitational acceleration, refreshed by the
    /// external force kernel before every sync point.
    pub grav_accel: Vec3,
    /// Long-range (PM) gravitational acceleration, refreshed on PM
    /// boundaries by the external force kernel.
    pub grav_pm: Vec3,
    pub time_bin: Bin,
    pub ti_begstep: Tick,
    pub ti_drift: Tick,
    #[cfg(debug_assertions)]
    pub ti_kick: Tick,
    pub sph: Option<SphState>,
    pub black_hole: Option<BlackHoleState>,
}

impl Particle {
    pub fn new(id: ParticleId, kind: ParticleKind, mass: Float, position: Vec3) -> Self {
        Self {
            id,
            kind,
            mass,
            position,
            velocity: Vec3::ZERO,
            grav_accel: Vec3::ZERO,
            grav_pm: Vec3::ZERO,
            time_bin: 0,
            ti_begstep: 0,
            ti_drift: 0,
            #[cfg(debug_assertions)]
            ti_kick: 0,
            sph: if kind.is_gas() {
                Some(SphState::new(0.0, 0.0, 0.0))
            } else {
                None
            },
            black_hole: None,
        }
    }

    pub fn is_active(&self, active_mask: &[bool]) -> bool {
        active_mask[self.time_bin as usize]
    }
}
