//! Cosmology globals and `hubble_function(a)`.
//!
//! `Ω0`, `Ω_b`, `Ω_CDM`, `H0`, and `G` live on a concrete struct here rather
//! than behind a trait; every kick-factor integral in [`crate::timeline`]
//! and every long-range timestep candidate in
//! [`crate::timestep::long_range`] calls `hubble_function`. Ionization
//! balance, lightcone bookkeeping, snapshot I/O, and process termination
//! stay behind [`crate::diagnostics::Collaborators`].

use serde::Deserialize;

use crate::units::Float;

/// The Friedmann parameters of a flat Lambda-CDM cosmology. Gravitational
/// softening, kick factors, and the long-range timestep criterion all read
/// these.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Cosmology {
    /// Total matter density parameter at `a=1`.
    pub omega0: Float,
    /// Baryon density parameter at `a=1`.
    pub omega_baryon: Float,
    /// Cold dark matter density parameter at `a=1` (informational; not all
    /// callers need the matter/baryon split).
    pub omega_cdm: Float,
    /// Radiation density parameter at `a=1`. Defaults to `0`, negligible
    /// for the tick range this integrator operates over, but kept so a
    /// driver modeling the very early universe is not forced to lie about
    /// flatness.
    #[serde(default)]
    pub omega_radiation: Float,
    /// Hubble parameter today, in code units (so that `H0` directly
    /// multiplies code-unit `a^-3/2`-type combinations without an
    /// additional unit conversion).
    pub hubble_param0: Float,
    /// Newton's constant, in code units.
    pub gravity_constant: Float,
}

impl Cosmology {
    /// A flat, matter-only (Einstein-de Sitter) cosmology. Convenient for
    /// tests and for non-cosmological (`a` held at `1`) runs that still
    /// need a `Cosmology` value to pass around.
    pub fn flat_matter_dominated(hubble_param0: Float) -> Self {
        Self {
            omega0: 1.0,
            omega_baryon: 0.0,
            omega_cdm: 1.0,
            omega_radiation: 0.0,
            hubble_param0,
            gravity_constant: 1.0,
        }
    }

    pub fn hubble0(&self) -> Float {
        self.hubble_param0
    }

    /// Dark-energy density parameter implied by flatness:
    /// `Ω_Λ = 1 - Ω0 - Ω_radiation`.
    pub fn omega_lambda(&self) -> Float {
        1.0 - self.omega0 - self.omega_radiation
    }

    /// `H(a) = H0 sqrt(Ω0/a^3 + Ω_radiation/a^4 + Ω_Λ)`, the standard flat
    /// FLRW Hubble function. Called by every kick-factor and long-range
    /// timestep integral.
    pub fn hubble_function(&self, a: Float) -> Float {
        let matter = self.omega0 / a.powi(3);
        let radiation = self.omega_radiation / a.powi(4);
        let lambda = self.omega_lambda();
        self.hubble_param0 * (matter + radiation + lambda).sqrt()
    }

    /// `H(a) a^2`, used directly by the long-range step criterion.
    pub fn hubble_a2(&self, a: Float) -> Float {
        self.hubble_function(a) * a * a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::assert_float_is_close;

    #[test]
    fn matter_dominated_hubble_matches_power_law() {
        let c = Cosmology::flat_matter_dominated(2.0);
        for a in [0.1, 0.5, 1.0, 2.0] {
            assert_float_is_close(c.hubble_function(a), 2.0 * a.powf(-1.5));
        }
    }

    #[test]
    fn flatness_holds() {
        let c = Cosmology {
            omega0: 0.3,
            omega_baryon: 0.05,
            omega_cdm: 0.25,
            omega_radiation: 0.0,
            hubble_param0: 1.0,
            gravity_constant: 1.0,
        };
        assert_float_is_close(c.omega0 + c.omega_lambda(), 1.0);
        assert_float_is_close(c.hubble_function(1.0), c.hubble_param0);
    }
}
