use std::fmt::Debug;

use derive_builder::Builder;
use num_traits::{Float, FloatConst, NumAssign, NumCast};

use crate::mapping::MappingError;

/// The scalar type every mapping is generic over.
///
/// Anything implementing [`Float`], [`FloatConst`] and the assign-operators qualifies, so
/// besides `f64` and `f32` a forward-mode dual number can be pushed through a mapping to
/// obtain derivatives of the generated momenta and weights with respect to the random
/// inputs or the construction parameters.
pub trait Real: Float + FloatConst + NumAssign + Debug + Send + Sync + 'static {}

impl<T> Real for T where T: Float + FloatConst + NumAssign + Debug + Send + Sync + 'static {}

/// Convert an `f64` constant into the working scalar.
///
/// Every [`Real`] can represent an `f64` (possibly with rounding), so the `NaN` fallback is
/// only reachable for exotic scalar types and propagates instead of panicking.
#[inline]
pub fn constant<T: Real>(value: f64) -> T {
    <T as NumCast>::from(value).unwrap_or_else(T::nan)
}

/// Källén triangle function $`\lambda(a, b, c) = a^2 + b^2 + c^2 - 2ab - 2bc - 2ca`$.
#[inline]
pub fn kaellen<T: Real>(a: T, b: T, c: T) -> T {
    let two = constant::<T>(2.0);
    a * a + b * b + c * c - two * (a * b + b * c + c * a)
}

/// Momentum of either daughter in the rest frame of a system of mass `m` decaying into
/// daughters of masses `m1` and `m2`.
///
/// Evaluates $`\sqrt{\lambda(m^2, m_1^2, m_2^2)} / 2m`$ in its factorised form, which keeps
/// full relative precision just above threshold. Below threshold the result is zero.
#[inline]
pub fn breakup_momentum<T: Real>(m: T, m1: T, m2: T) -> T {
    let above = (m - m1 - m2) * (m + m1 + m2);
    let split = (m - m1 + m2) * (m + m1 - m2);
    (above * split).max(T::zero()).sqrt() / (constant::<T>(2.0) * m)
}

/// Process-wide numeric defaults, passed explicitly into every mapping constructor.
///
/// ```
/// use phasespace::prelude::*;
///
/// let config = NumericConfigBuilder::default()
///     .epsilon(1e-14)
///     .build()
///     .unwrap();
/// assert_eq!(config.newton_iterations, 20);
/// ```
#[derive(Builder, Debug, Clone, Copy, PartialEq)]
#[builder(build_fn(error = "MappingError"))]
pub struct NumericConfig {
    /// Floor applied to near-singular quantities (log arguments, collinear momentum
    /// products, root brackets).
    #[builder(default = "1e-12")]
    pub epsilon: f64,
    /// Number of Newton steps used to solve for the RAMBO mass-rescaling factor.
    #[builder(default = "20")]
    pub newton_iterations: usize,
    /// Number of safeguarded Newton steps used to invert the RAMBO-on-diet mass CDF.
    #[builder(default = "60")]
    pub root_iterations: usize,
}

impl Default for NumericConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-12,
            newton_iterations: 20,
            root_iterations: 60,
        }
    }
}

impl NumericConfig {
    pub fn epsilon<T: Real>(&self) -> T {
        constant(self.epsilon)
    }
}
