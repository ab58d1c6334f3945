//! The real MPI-backed `Collectives`: a thin wrapper around
//! `SystemCommunicator::all_reduce_into` with `SystemOperation::{sum,min}`.
//! Only present when the crate is built with the `mpi` feature. The rest
//! of the core is fully usable, and fully tested, without an MPI
//! installation present.

use mpi::collective::SystemOperation;
use mpi::topology::SystemCommunicator;
use mpi::traits::Communicator;
use mpi::traits::CommunicatorCollectives;

use super::Collectives;

/// Wraps an MPI world communicator. Construction is the caller's
/// responsibility: MPI bootstrap is out of scope for this crate, so no
/// `Universe`/`initialize` call lives here.
pub struct MpiCollectives {
    world: SystemCommunicator,
}

impl MpiCollectives {
    pub fn new(world: SystemCommunicator) -> Self {
        Self { world }
    }

    pub fn rank(&self) -> i32 {
        self.world.rank()
    }

    pub fn size(&self) -> usize {
        self.world.size() as usize
    }
}

impl Collectives for MpiCollectives {
    fn all_reduce_sum_u64(&self, value: u64) -> u64 {
        let mut out = 0u64;
        self.world
            .all_reduce_into(&value, &mut out, SystemOperation::sum());
        out
    }

    fn all_reduce_min_u64(&self, value: u64) -> u64 {
        let mut out = 0u64;
        self.world
            .all_reduce_into(&value, &mut out, SystemOperation::min());
        out
    }

    fn all_reduce_sum_f64(&self, value: f64) -> f64 {
        let mut out = 0.0f64;
        self.world
            .all_reduce_into(&value, &mut out, SystemOperation::sum());
        out
    }

    fn all_reduce_min_f64(&self, value: f64) -> f64 {
        let mut out = 0.0f64;
        self.world
            .all_reduce_into(&value, &mut out, SystemOperation::min());
        out
    }
}
