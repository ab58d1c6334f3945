//! Cluster-wide collective reductions: the only communication the core
//! needs. No point-to-point messaging is required here; force computation
//! performs its own exchanges and is out of scope for this crate.
//!
//! The `Operation`/trait split and the real MPI backing follow the usual
//! collective-communicator pattern, generalized to the reductions this core
//! actually performs: global min for the equalized step, global sum of
//! bad-step counts, global min for `next_kick`.

#[cfg(feature = "mpi")]
mod mpi_backed;
mod single_rank;

#[cfg(feature = "mpi")]
pub use mpi_backed::MpiCollectives;
pub use single_rank::SingleRankCollectives;

/// The collective operations the core performs across ranks: global min for
/// the equalized step, global sum of bad-step counts, global min for
/// `next_kick`. The long-range (PM) step criterion needs two more of the
/// same three primitive shapes, a cluster-wide sum of `Σv²` and a
/// cluster-wide min of per-type particle mass, so `all_reduce_sum_f64` sits
/// alongside the others.
pub trait Collectives {
    fn all_reduce_sum_u64(&self, value: u64) -> u64;
    fn all_reduce_min_u64(&self, value: u64) -> u64;
    fn all_reduce_sum_f64(&self, value: f64) -> f64;
    fn all_reduce_min_f64(&self, value: f64) -> f64;
}
