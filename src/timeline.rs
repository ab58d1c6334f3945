//! Pure conversions between integer ticks and logarithmic scale factor,
//! plus the memoized kick-factor integrals.
//!
//! Everything here is a pure function of its arguments and the
//! [`Cosmology`](crate::cosmology::Cosmology)/[`LogScaleFactorRange`] it is
//! given. [`KickFactorCache`] is the one piece of state, and it is purely
//! an optimization: dropping it changes no observable behaviour, only
//! speed.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::cosmology::Cosmology;
use crate::units::Float;
use crate::units::Tick;
use crate::units::TIMEBASE;

/// The affine map between tick count and `log(a)`, fixed for the duration
/// of a run (or until a restart changes the window). `dloga_total` is
/// `log(a_end) - log(a_begin)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogScaleFactorRange {
    pub log_a_begin: Float,
    pub dloga_total: Float,
}

impl LogScaleFactorRange {
    pub fn new(a_begin: Float, a_end: Float) -> Self {
        Self {
            log_a_begin: a_begin.ln(),
            dloga_total: a_end.ln() - a_begin.ln(),
        }
    }

    /// `log(a)` for the given tick, measured from `Ti = 0`.
    pub fn log_a_at_tick(&self, ti: Tick) -> Float {
        self.log_a_begin + self.dloga_from_dti(ti)
    }

    /// `dloga_from_dti`: `dloga = dloga_total * dti / TIMEBASE`.
    pub fn dloga_from_dti(&self, dti: Tick) -> Float {
        self.dloga_total * (dti as Float) / (TIMEBASE as Float)
    }

    /// `dti_from_dloga`: the inverse of [`Self::dloga_from_dti`], rounded to
    /// the nearest tick. Errors on overflow past `TIMEBASE`.
    pub fn dti_from_dloga(&self, dloga: Float) -> Result<Tick, TimelineError> {
        if dloga < 0.0 || !dloga.is_finite() {
            return Err(TimelineError::InvalidDloga(dloga));
        }
        if self.dloga_total <= 0.0 {
            return Err(TimelineError::DegenerateRange);
        }
        let raw = dloga / self.dloga_total * (TIMEBASE as Float);
        if !raw.is_finite() || raw > TIMEBASE as Float {
            return Err(TimelineError::Overflow { dloga, raw });
        }
        Ok(raw.round() as Tick)
    }

    /// `get_dloga_for_bin(b) = dloga_from_dti(2^b)`.
    pub fn dloga_for_bin(&self, bin: crate::units::Bin) -> Float {
        self.dloga_from_dti(1u32 << bin)
    }

    /// Signed `dloga` spanned going from `t0` to `t1`, negative if `t1 <
    /// t0`. `Tick` is unsigned, so `dloga_from_dti` alone cannot express
    /// this; the predictors in [`crate::kick`] need the signed form because
    /// a particle's drift tick can fall on either side of the next kick
    /// midpoint.
    pub fn dloga_between(&self, t0: Tick, t1: Tick) -> Float {
        self.dloga_from_dti(t1) - self.dloga_from_dti(t0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineError {
    InvalidDloga(Float),
    DegenerateRange,
    Overflow { dloga: Float, raw: Float },
}

impl std::fmt::Display for TimelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimelineError::InvalidDloga(dloga) => {
                write!(f, "dloga {dloga} is not a finite, non-negative step")
            }
            TimelineError::DegenerateRange => {
                write!(f, "scale factor range is degenerate (dloga_total <= 0)")
            }
            TimelineError::Overflow { dloga, raw } => write!(
                f,
                "dloga {dloga} converts to {raw} ticks, overflowing TIMEBASE"
            ),
        }
    }
}

impl std::error::Error for TimelineError {}

/// The midpoint of a step `[start, start+step)`, in ticks. This is the key
/// to second-order leapfrog accuracy: a kick applied at the midpoint of the
/// step it closes and the step it opens is exact to second order in the
/// step size. `step` is always even for `step >= 2` (every step size here
/// is a power of two), so the integer division is exact.
pub fn get_kick_ti(start: Tick, step: Tick) -> Tick {
    start + step / 2
}

/// Endpoints of a kick-factor integral, used as a cache key. `(t0, t1)` is
/// only ever queried in one direction by the kick engine, but callers
/// (predictors) may query sub-ranges of a currently-open step, so this is
/// not assumed to be sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FactorKey {
    t0: Tick,
    t1: Tick,
    kind: FactorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FactorKind {
    Grav,
    Hydro,
}

/// Memoizes [`KickFactorCache::gravkick_factor`]/[`KickFactorCache::hydrokick_factor`]
/// by `(t0, t1)`. The predictor functions call these repeatedly with the
/// same endpoints within one sync point; without the cache every predictor
/// call recomputes the same cosmological integral.
///
/// A `KickFactorCache` is only valid for the `LogScaleFactorRange` and
/// `Cosmology` it was built against. Call `clear()` whenever either changes,
/// i.e. at every `set_global_time`.
#[derive(Default)]
pub struct KickFactorCache {
    entries: RefCell<HashMap<FactorKey, Float>>,
}

impl KickFactorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// `∫ da/(a^2 H)` over `[t0, t1)`.
    pub fn gravkick_factor(
        &self,
        range: &LogScaleFactorRange,
        cosmology: &Cosmology,
        t0: Tick,
        t1: Tick,
    ) -> Float {
        self.cached(range, cosmology, t0, t1, FactorKind::Grav, |a| {
            1.0 / (a * a * cosmology.hubble_function(a))
        })
    }

    /// `∫ da/(a^{3(γ-1)+1} H)` over `[t0, t1)`.
    pub fn hydrokick_factor(
        &self,
        range: &LogScaleFactorRange,
        cosmology: &Cosmology,
        t0: Tick,
        t1: Tick,
        gamma: Float,
    ) -> Float {
        self.cached(range, cosmology, t0, t1, FactorKind::Hydro, |a| {
            1.0 / (a.powf(3.0 * (gamma - 1.0) + 1.0) * cosmology.hubble_function(a))
        })
    }

    fn cached(
        &self,
        range: &LogScaleFactorRange,
        cosmology: &Cosmology,
        t0: Tick,
        t1: Tick,
        kind: FactorKind,
        integrand: impl Fn(Float) -> Float,
    ) -> Float {
        let key = FactorKey { t0, t1, kind };
        if let Some(value) = self.entries.borrow().get(&key) {
            return *value;
        }
        let value = integrate_over_ticks(range, t0, t1, integrand);
        self.entries.borrow_mut().insert(key, value);
        value
    }
}

/// Simpson's rule over `log(a)`, which is where the physical integrands
/// above are smooth. `n` subdivisions is enough for the step sizes this
/// integrator ever sees (at most one PM super-step wide).
fn integrate_over_ticks(
    range: &LogScaleFactorRange,
    t0: Tick,
    t1: Tick,
    integrand: impl Fn(Float) -> Float,
) -> Float {
    const N: usize = 16;
    let loga0 = range.log_a_at_tick(t0);
    let loga1 = range.log_a_at_tick(t1);
    let h = (loga1 - loga0) / (N as Float);
    if h == 0.0 {
        return 0.0;
    }
    let f = |loga: Float| {
        let a = loga.exp();
        integrand(a) * a
    };
    let mut sum = f(loga0) + f(loga1);
    for i in 1..N {
        let loga = loga0 + (i as Float) * h;
        sum += if i % 2 == 0 { 2.0 } else { 4.0 } * f(loga);
    }
    sum * h / 3.0
}
