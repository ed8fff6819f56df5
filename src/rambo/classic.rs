use log::debug;

use crate::{
    four_momentum::FourMomentum,
    mapping::{check_columns, MappingResult, PhaseSpaceMapping},
    numeric::{constant, NumericConfig, Real},
    rambo::{check_threshold, massless_weight, rescale_to_masses, validate_masses},
};

/// The RAMBO algorithm of Kleiss, Stirling and Ellis.
///
/// Each of the $`n`$ particles takes four random numbers $`(r_1, r_2, r_3, r_4)`$ which
/// set an isotropic massless vector with $`\cos\theta = 2r_1 - 1`$, $`\phi = 2\pi r_2`$ and
/// energy $`-\ln(r_3 r_4)`$. The set is then boosted into its rest frame, scaled onto the
/// requested center-of-mass energy and, for massive particles, rescaled onto the mass
/// shells. The massless weight is exact; the massive weight is the standard RAMBO
/// correction evaluated at the numerically solved rescaling factor.
///
/// The map is many-to-one and therefore has no inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct Rambo<T: Real> {
    masses: Vec<T>,
    config: NumericConfig,
}

impl<T: Real> Rambo<T> {
    pub fn new(n_particles: usize, masses: Vec<T>, config: &NumericConfig) -> MappingResult<Self> {
        validate_masses(n_particles, &masses, "Rambo")?;
        debug!(
            "Rambo: {} particles, {} random numbers per event",
            n_particles,
            4 * n_particles
        );
        Ok(Self {
            masses,
            config: *config,
        })
    }

    pub fn massless(n_particles: usize, config: &NumericConfig) -> MappingResult<Self> {
        Self::new(n_particles, vec![T::zero(); n_particles], config)
    }

    pub fn n_particles(&self) -> usize {
        self.masses.len()
    }

    pub fn masses(&self) -> &[T] {
        &self.masses
    }

    fn isotropic(&self, r: &[T]) -> FourMomentum<T> {
        let two = constant::<T>(2.0);
        let costheta = two * r[0] - T::one();
        let sintheta = (T::one() - costheta * costheta).max(T::zero()).sqrt();
        let (sinphi, cosphi) = (T::TAU() * r[1]).sin_cos();
        let eps = self.config.epsilon::<T>();
        let e = -(r[2] * r[3]).max(eps).min(T::one() - eps).ln();
        FourMomentum::new(
            e,
            e * sintheta * cosphi,
            e * sintheta * sinphi,
            e * costheta,
        )
    }
}

impl<T: Real> PhaseSpaceMapping<T> for Rambo<T> {
    type Condition = T;
    type Output = Vec<FourMomentum<T>>;

    fn random_dims(&self) -> usize {
        4 * self.n_particles()
    }

    fn map_single(&self, r: &[T], e_cm: &T) -> MappingResult<(Vec<FourMomentum<T>>, T)> {
        check_columns(self.random_dims(), r.len())?;
        let e_cm = *e_cm;
        check_threshold(&self.masses, e_cm)?;
        let generated: Vec<FourMomentum<T>> = r.chunks_exact(4).map(|c| self.isotropic(c)).collect();
        let total: FourMomentum<T> = generated.iter().sum();
        let scale = e_cm / total.m();
        let massless = generated
            .iter()
            .map(|q| q.boost_to_rest(&total).scale(scale))
            .collect();
        let (momenta, factor) = rescale_to_masses(massless, &self.masses, e_cm, &self.config);
        Ok((momenta, massless_weight(self.n_particles(), e_cm) * factor))
    }
}
