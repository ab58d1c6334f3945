//! Fatal-error and collaborator plumbing: the small set of named external
//! calls the core is permitted to make outside its own components, plus the
//! RAII wall-clock timer used for phase diagnostics.
//!
//! Logging and wall-clock timing are deliberately not modeled as trait
//! methods here: they are ambient diagnostics, not physics collaborators,
//! so every module logs through the plain `log::*` macros directly and
//! [`WallTimer`] is a concrete RAII type rather than an injected logger.

use std::time::Instant;

use crate::units::Float;

/// Named external calls this core has no concrete implementation for:
/// ionization balance, lightcone output, snapshot I/O, and process
/// termination on an unrecoverable error. A driver supplies a real
/// implementation; every method defaults to a logging-only stand-in so a
/// driver that has not wired up chemistry/IO/lightcone yet can still
/// exercise the integrator.
pub trait Collaborators {
    fn ionize_params(&mut self, scale_factor: Float) {
        log::trace!("ionize_params(a={scale_factor}) [no-op]");
    }

    fn lightcone_set_time(&mut self, scale_factor: Float) {
        log::trace!("lightcone_set_time(a={scale_factor}) [no-op]");
    }

    fn save_positions(&mut self, snapnum: u32, half_flag: bool) {
        log::info!("save_positions(snapnum={snapnum}, half_flag={half_flag}) [no-op]");
    }

    /// `endrun(code, msg)`: there is no local recovery path, all fatal
    /// errors flow through here. The default terminates the process,
    /// matching the reference system's `endrun`/`MPI_Abort`.
    fn endrun(&mut self, code: i32, msg: &str) -> ! {
        log::error!("endrun({code}): {msg}");
        std::process::exit(code);
    }
}

/// A `Collaborators` that takes every default: logs, and for `endrun`,
/// terminates the process. The right choice for a single-node driver, or a
/// test, that does not exercise the chemistry/lightcone/snapshot paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCollaborators;

impl Collaborators for NullCollaborators {}

/// RAII phase timer matching `walltime_measure(tag)`: logs the elapsed
/// wall-clock time for `tag` at debug level when dropped.
pub struct WallTimer<'a> {
    tag: &'a str,
    start: Instant,
}

impl<'a> WallTimer<'a> {
    pub fn new(tag: &'a str) -> Self {
        Self {
            tag,
            start: Instant::now(),
        }
    }
}

impl Drop for WallTimer<'_> {
    fn drop(&mut self) {
        log::debug!("{} took {:?}", self.tag, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_collaborators_does_not_panic_on_non_terminal_calls() {
        let mut c = NullCollaborators;
        c.ionize_params(1.0);
        c.lightcone_set_time(1.0);
        c.save_positions(0, false);
    }

    #[test]
    fn wall_timer_does_not_panic_on_drop() {
        let _t = WallTimer::new("test-phase");
    }
}
