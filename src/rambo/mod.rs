//! Isotropic N-body generators in the center-of-mass frame.
//!
//! [`Rambo`] draws every momentum independently and rescales the set onto the requested
//! energy, which is simple but has no inverse. [`RamboOnDiet`] builds the same flat
//! distribution from a chain of two-body emissions with $`3n - 4`$ random numbers and can
//! be inverted exactly. Both share the massless phase-space volume and the massive
//! rescaling implemented here.

use crate::{
    four_momentum::FourMomentum,
    mapping::{InverseMapping, MappingError, MappingResult, PhaseSpaceMapping},
    numeric::{constant, NumericConfig, Real},
    rootfinder::rescaling_factor,
};

pub mod classic;
pub mod diet;

pub use classic::Rambo;
pub use diet::RamboOnDiet;

/// Which N-body generator a composed channel should use for its decay stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NBodyKind {
    Rambo,
    #[default]
    RamboOnDiet,
}

impl NBodyKind {
    pub fn build<T: Real>(
        self,
        masses: Vec<T>,
        config: &NumericConfig,
    ) -> MappingResult<NBodyMapper<T>> {
        let n = masses.len();
        Ok(match self {
            Self::Rambo => NBodyMapper::Rambo(Rambo::new(n, masses, config)?),
            Self::RamboOnDiet => NBodyMapper::RamboOnDiet(RamboOnDiet::new(n, masses, config)?),
        })
    }
}

/// One of the N-body generators behind a single mapping interface.
#[derive(Debug, Clone, PartialEq)]
pub enum NBodyMapper<T: Real> {
    Rambo(Rambo<T>),
    RamboOnDiet(RamboOnDiet<T>),
}

impl<T: Real> NBodyMapper<T> {
    pub fn kind(&self) -> NBodyKind {
        match self {
            Self::Rambo(_) => NBodyKind::Rambo,
            Self::RamboOnDiet(_) => NBodyKind::RamboOnDiet,
        }
    }

    pub fn masses(&self) -> &[T] {
        match self {
            Self::Rambo(m) => m.masses(),
            Self::RamboOnDiet(m) => m.masses(),
        }
    }
}

impl<T: Real> PhaseSpaceMapping<T> for NBodyMapper<T> {
    type Condition = T;
    type Output = Vec<FourMomentum<T>>;

    fn random_dims(&self) -> usize {
        match self {
            Self::Rambo(m) => m.random_dims(),
            Self::RamboOnDiet(m) => m.random_dims(),
        }
    }

    fn map_single(&self, r: &[T], e_cm: &T) -> MappingResult<(Vec<FourMomentum<T>>, T)> {
        match self {
            Self::Rambo(m) => m.map_single(r, e_cm),
            Self::RamboOnDiet(m) => m.map_single(r, e_cm),
        }
    }
}

impl<T: Real> InverseMapping<T> for NBodyMapper<T> {
    type InverseCondition = ();

    fn map_inverse_single(
        &self,
        output: &Vec<FourMomentum<T>>,
        condition: &(),
    ) -> MappingResult<(Vec<T>, T, T)> {
        match self {
            Self::Rambo(_) => Err(MappingError::NotInvertibleError { mapping: "Rambo" }),
            Self::RamboOnDiet(m) => m.map_inverse_single(output, condition),
        }
    }
}

/// Validate a particle count and mass list at construction.
fn validate_masses<T: Real>(n: usize, masses: &[T], name: &str) -> MappingResult<()> {
    if n < 2 {
        return Err(MappingError::kinematics(format!(
            "{name} needs at least two particles, got {n}"
        )));
    }
    if masses.len() != n {
        return Err(MappingError::configuration(format!(
            "{name} got {} masses for {n} particles",
            masses.len()
        )));
    }
    if let Some(m) = masses.iter().find(|m| **m < T::zero()) {
        return Err(MappingError::configuration(format!(
            "{name} masses must be non-negative, got {:?}",
            m
        )));
    }
    Ok(())
}

/// Reject a center-of-mass energy which cannot produce the configured masses.
fn check_threshold<T: Real>(masses: &[T], e_cm: T) -> MappingResult<()> {
    let mass_sum = masses.iter().fold(T::zero(), |acc, &m| acc + m);
    if !(e_cm > mass_sum) {
        return Err(MappingError::kinematics(format!(
            "center-of-mass energy {:?} does not exceed the mass sum {:?}",
            e_cm, mass_sum
        )));
    }
    Ok(())
}

/// Volume of massless $`n`$-body phase space,
/// $`(\pi/2)^{n-1} E_{cm}^{2n-4} / ((n-1)!\,(n-2)!)`$.
pub fn massless_weight<T: Real>(n: usize, e_cm: T) -> T {
    let factorial = |k: usize| (1..=k).fold(T::one(), |acc, i| acc * constant::<T>(i as f64));
    let half_pi = T::FRAC_PI_2();
    half_pi.powi(n as i32 - 1) * e_cm.powi(2 * n as i32 - 4)
        / (factorial(n - 1) * factorial(n - 2))
}

/// Ratio of massive to massless phase-space density for the rescaled configuration,
/// $`\xi^{3n-3} \prod_i \frac{p_i^0}{k_i^0}
/// \frac{\sum_i |\vec p_i|^2 / p_i^0}{\sum_i |\vec k_i|^2 / k_i^0}`$.
fn massive_factor<T: Real>(
    massless: &[FourMomentum<T>],
    massive: &[FourMomentum<T>],
    xi: T,
) -> T {
    let n = massless.len() as i32;
    let (product, numerator, denominator) = massless.iter().zip(massive).fold(
        (T::one(), T::zero(), T::zero()),
        |(prod, num, den), (p, k)| (prod * p.e / k.e, num + p.p2() / p.e, den + k.p2() / k.e),
    );
    xi.powi(3 * n - 3) * product * numerator / denominator
}

fn is_massless<T: Real>(masses: &[T]) -> bool {
    masses.iter().all(|&m| m == T::zero())
}

/// Put a massless center-of-mass configuration on the given mass shells, returning the
/// massive momenta together with the density correction.
fn rescale_to_masses<T: Real>(
    massless: Vec<FourMomentum<T>>,
    masses: &[T],
    e_cm: T,
    config: &NumericConfig,
) -> (Vec<FourMomentum<T>>, T) {
    if is_massless(masses) {
        return (massless, T::one());
    }
    let energies: Vec<T> = massless.iter().map(|p| p.e).collect();
    let xi = rescaling_factor(&energies, masses, e_cm, config);
    let massive: Vec<FourMomentum<T>> = massless
        .iter()
        .zip(masses)
        .map(|(p, &m)| {
            let e = (m * m + xi * xi * p.e * p.e).sqrt();
            FourMomentum::from_momentum(e, p.momentum() * xi)
        })
        .collect();
    let factor = massive_factor(&massless, &massive, xi);
    (massive, factor)
}

/// Undo [`rescale_to_masses`] for momenta in their center-of-mass frame. The rescaling
/// factor follows directly from $`\sum_i |\vec k_i| = \xi E_{cm}`$.
fn strip_masses<T: Real>(
    massive: Vec<FourMomentum<T>>,
    masses: &[T],
    e_cm: T,
) -> (Vec<FourMomentum<T>>, T) {
    if is_massless(masses) {
        return (massive, T::one());
    }
    let xi = massive.iter().fold(T::zero(), |acc, k| acc + k.p()) / e_cm;
    let massless: Vec<FourMomentum<T>> = massive
        .iter()
        .map(|k| FourMomentum::from_momentum(k.p() / xi, k.momentum() / xi))
        .collect();
    let factor = massive_factor(&massless, &massive, xi);
    (massless, factor)
}
