use crate::{
    mapping::{check_columns, InverseMapping, MappingError, MappingResult, PhaseSpaceMapping},
    numeric::Real,
};

/// Interval $`[s_{min}, s_{max}]`$ an invariant is sampled in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvariantBounds<T: Real> {
    pub smin: T,
    pub smax: T,
}

impl<T: Real> InvariantBounds<T> {
    pub fn new(smin: T, smax: T) -> Self {
        Self { smin, smax }
    }

    fn validate(&self) -> MappingResult<()> {
        if self.smin > self.smax {
            return Err(MappingError::configuration(format!(
                "lower invariant bound {:?} exceeds upper bound {:?}",
                self.smin, self.smax
            )));
        }
        Ok(())
    }

    fn contains(&self, s: T) -> bool {
        s >= self.smin && s <= self.smax
    }
}

/// A relativistic resonance line-shape with pole `mass` and `width`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreitWigner<T: Real> {
    mass: T,
    width: T,
}

impl<T: Real> BreitWigner<T> {
    pub fn new(mass: T, width: T) -> MappingResult<Self> {
        if !(mass > T::zero() && width > T::zero()) {
            return Err(MappingError::configuration(format!(
                "Breit-Wigner needs a positive mass and width, got {:?} and {:?}",
                mass, width
            )));
        }
        Ok(Self { mass, width })
    }

    pub fn mass(&self) -> T {
        self.mass
    }

    pub fn width(&self) -> T {
        self.width
    }

    /// Arctangent range $`(\arctan y_1, \arctan y_2 - \arctan y_1)`$ of the truncated
    /// resonance.
    fn angle_range(&self, bounds: &InvariantBounds<T>) -> (T, T) {
        let (m2, mw) = (self.mass * self.mass, self.mass * self.width);
        let lower = ((bounds.smin - m2) / mw).atan();
        let upper = ((bounds.smax - m2) / mw).atan();
        (lower, upper - lower)
    }

    /// $`ds/dr`$ at `s` for an arctangent range of `delta`.
    fn jacobian(&self, s: T, delta: T) -> T {
        let (m2, mw) = (self.mass * self.mass, self.mass * self.width);
        let ds = s - m2;
        delta * (ds * ds + mw * mw) / mw
    }
}

/// Samples a single invariant (a squared mass) inside [`InvariantBounds`].
///
/// Both variants are monotonic bijections of $`r \in [0, 1]`$ onto the bounds, with
/// $`r = 0`$ mapping to $`s_{min}`$ and $`r = 1`$ to $`s_{max}`$.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvariantSampler<T: Real> {
    /// $`s = s_{min} + r (s_{max} - s_{min})`$.
    Uniform,
    /// Inverse-CDF sampling of a [`BreitWigner`] truncated to the bounds.
    BreitWigner(BreitWigner<T>),
}

impl<T: Real> InvariantSampler<T> {
    pub fn uniform() -> Self {
        Self::Uniform
    }

    pub fn breit_wigner(mass: T, width: T) -> MappingResult<Self> {
        Ok(Self::BreitWigner(BreitWigner::new(mass, width)?))
    }

    /// Map one random number onto `(s, ds/dr)`.
    pub fn sample(&self, r: T, bounds: &InvariantBounds<T>) -> MappingResult<(T, T)> {
        bounds.validate()?;
        Ok(match self {
            Self::Uniform => {
                let range = bounds.smax - bounds.smin;
                (bounds.smin + r * range, range)
            }
            Self::BreitWigner(bw) => {
                let (lower, delta) = bw.angle_range(bounds);
                let s = bw.mass * bw.mass + bw.mass * bw.width * (lower + r * delta).tan();
                // rounding in tan can step just outside the interval
                let s = s.max(bounds.smin).min(bounds.smax);
                (s, bw.jacobian(s, delta))
            }
        })
    }

    /// Recover the random number generating `s` together with $`dr/ds`$.
    pub fn invert(&self, s: T, bounds: &InvariantBounds<T>) -> MappingResult<(T, T)> {
        bounds.validate()?;
        if !(bounds.smin < bounds.smax) {
            return Err(MappingError::configuration(
                "cannot invert a sampler on an empty invariant range",
            ));
        }
        if !bounds.contains(s) {
            return Err(MappingError::kinematics(format!(
                "invariant {:?} outside [{:?}, {:?}]",
                s, bounds.smin, bounds.smax
            )));
        }
        Ok(match self {
            Self::Uniform => {
                let range = bounds.smax - bounds.smin;
                ((s - bounds.smin) / range, range.recip())
            }
            Self::BreitWigner(bw) => {
                let (lower, delta) = bw.angle_range(bounds);
                let m2 = bw.mass * bw.mass;
                let angle = ((s - m2) / (bw.mass * bw.width)).atan();
                ((angle - lower) / delta, bw.jacobian(s, delta).recip())
            }
        })
    }
}

impl<T: Real> PhaseSpaceMapping<T> for InvariantSampler<T> {
    type Condition = InvariantBounds<T>;
    type Output = T;

    fn random_dims(&self) -> usize {
        1
    }

    fn map_single(&self, r: &[T], condition: &InvariantBounds<T>) -> MappingResult<(T, T)> {
        check_columns(1, r.len())?;
        self.sample(r[0], condition)
    }
}

impl<T: Real> InverseMapping<T> for InvariantSampler<T> {
    type InverseCondition = InvariantBounds<T>;

    fn map_inverse_single(
        &self,
        output: &T,
        condition: &InvariantBounds<T>,
    ) -> MappingResult<(Vec<T>, InvariantBounds<T>, T)> {
        let (r, density) = self.invert(*output, condition)?;
        Ok((vec![r], *condition, density))
    }
}
