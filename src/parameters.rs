//! Top-level configuration aggregation: the parameter structs a driver
//! fills in before constructing an integrator, plus the ambient logging
//! options.
//!
//! CLI and parameter-file parsing are an external collaborator's job, so
//! this module stops at a plain `#[derive(Deserialize)]` struct. A driver
//! is free to fill it in by hand, from `serde_yaml::from_str`, or from a
//! `clap`-parsed file, loading the parameter file once and letting each
//! subsystem deserialize its own section.

use serde::Deserialize;

use crate::cosmology::Cosmology;
use crate::softening::SofteningParameters;
use crate::timestep::parameters::InvalidFastParticleType;
use crate::timestep::parameters::TimestepParameters;

fn default_true() -> bool {
    true
}

/// Logging options: verbosity and whether non-root ranks log at all.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LoggingParameters {
    #[serde(default)]
    pub verbosity: usize,
    #[serde(default = "default_true")]
    pub only_main_rank: bool,
}

impl Default for LoggingParameters {
    fn default() -> Self {
        Self {
            verbosity: 0,
            only_main_rank: true,
        }
    }
}

/// The full set of configuration a driver must supply before constructing
/// an [`crate::integrator::IntegratorState`].
#[derive(Debug, Clone, Deserialize)]
pub struct IntegratorParameters {
    pub cosmology: Cosmology,
    pub timestep: TimestepParameters,
    pub softening: SofteningParameters,
    #[serde(default)]
    pub logging: LoggingParameters,
}

impl IntegratorParameters {
    /// Runs every parameter-level validation this crate performs. Today
    /// just `TimestepParameters::validate`, but the seam a future config
    /// addition hangs its own check on.
    pub fn validate(&self) -> Result<(), InvalidFastParticleType> {
        self.timestep.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_defaults_are_quiet_and_main_rank_only() {
        let params: LoggingParameters = serde_yaml::from_str("{}").unwrap();
        assert_eq!(params.verbosity, 0);
        assert!(params.only_main_rank);
    }
}
