use itertools::Itertools;
use log::debug;

use crate::{
    four_momentum::FourMomentum,
    mapping::{check_columns, InverseMapping, MappingError, MappingResult, PhaseSpaceMapping},
    numeric::{constant, NumericConfig, Real},
    rambo::{check_threshold, massless_weight, rescale_to_masses, strip_masses, validate_masses},
    rootfinder::{mass_ratio, mass_ratio_cdf},
};

/// RAMBO on diet (Plätzer), a flat N-body generator using the minimal $`3n - 4`$ random
/// numbers.
///
/// The center-of-mass system emits the particles one at a time. The first $`n - 2`$
/// random numbers fix the invariant masses $`M_2 > \dots > M_{n-1}`$ of the shrinking
/// remainder through the ratios $`u_k = M_{k+1}^2 / M_k^2`$, the remaining $`2(n - 1)`$
/// are one $`(\cos\theta, \phi)`$ pair per emission in the rest frame of the emitting
/// system. Every step is invertible, so [`InverseMapping`] recovers the random numbers
/// of any configuration exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct RamboOnDiet<T: Real> {
    masses: Vec<T>,
    config: NumericConfig,
}

impl<T: Real> RamboOnDiet<T> {
    pub fn new(n_particles: usize, masses: Vec<T>, config: &NumericConfig) -> MappingResult<Self> {
        validate_masses(n_particles, &masses, "RamboOnDiet")?;
        debug!(
            "RamboOnDiet: {} particles, {} random numbers per event",
            n_particles,
            3 * n_particles - 4
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

    /// Massless configuration at rest with total energy `e_cm`.
    fn generate(&self, r: &[T], e_cm: T) -> Vec<FourMomentum<T>> {
        let n = self.n_particles();
        let (ratios, angles) = r.split_at(n - 2);
        let two = constant::<T>(2.0);
        let eps = self.config.epsilon::<T>();
        let mut system = FourMomentum::at_rest(e_cm);
        let mut mass = e_cm;
        let mut momenta = Vec::with_capacity(n);
        for (k, (&r_cos, &r_phi)) in angles.iter().tuples::<(_, _)>().enumerate() {
            // both the emission and the remainder (the next boost frame) must carry energy
            let u = match ratios.get(k) {
                Some(&r_mass) => mass_ratio(n - 2 - k, r_mass, &self.config)
                    .max(eps)
                    .min(T::one() - eps),
                None => T::zero(),
            };
            let q = mass * (T::one() - u) / two;
            let emitted = FourMomentum::new(q, T::zero(), T::zero(), q)
                .rotate_zy(T::TAU() * r_phi, two * r_cos - T::one())
                .boost_from_rest(&system);
            system = system - emitted;
            mass = mass * u.sqrt();
            momenta.push(emitted);
        }
        momenta.push(system);
        momenta
    }
}

impl<T: Real> PhaseSpaceMapping<T> for RamboOnDiet<T> {
    type Condition = T;
    type Output = Vec<FourMomentum<T>>;

    fn random_dims(&self) -> usize {
        3 * self.n_particles() - 4
    }

    fn map_single(&self, r: &[T], e_cm: &T) -> MappingResult<(Vec<FourMomentum<T>>, T)> {
        check_columns(self.random_dims(), r.len())?;
        let e_cm = *e_cm;
        check_threshold(&self.masses, e_cm)?;
        let massless = self.generate(r, e_cm);
        let (momenta, factor) = rescale_to_masses(massless, &self.masses, e_cm, &self.config);
        Ok((momenta, massless_weight(self.n_particles(), e_cm) * factor))
    }
}

impl<T: Real> InverseMapping<T> for RamboOnDiet<T> {
    type InverseCondition = ();

    /// Recover the random numbers, the center-of-mass energy and the reciprocal weight of
    /// a configuration. The momenta may be given in any frame.
    fn map_inverse_single(
        &self,
        output: &Vec<FourMomentum<T>>,
        _condition: &(),
    ) -> MappingResult<(Vec<T>, T, T)> {
        let n = self.n_particles();
        if output.len() != n {
            return Err(MappingError::ShapeError {
                what: "particles",
                expected: n,
                found: output.len(),
            });
        }
        let total: FourMomentum<T> = output.iter().sum();
        let e_cm = total.m();
        check_threshold(&self.masses, e_cm)?;
        let at_rest = output.iter().map(|k| k.boost_to_rest(&total)).collect();
        let (massless, factor) = strip_masses(at_rest, &self.masses, e_cm);

        let two = constant::<T>(2.0);
        let eps = self.config.epsilon::<T>();
        let mut ratios = Vec::with_capacity(n - 2);
        let mut angles = Vec::with_capacity(2 * (n - 1));
        let mut system = FourMomentum::at_rest(e_cm);
        let mut mass2 = e_cm * e_cm;
        for (k, emitted) in massless[..n - 1].iter().enumerate() {
            let local = emitted.boost_to_rest(&system);
            let costheta = (local.pz / local.p().max(eps)).max(-T::one()).min(T::one());
            let mut phi = local.phi();
            if phi < T::zero() {
                phi += T::TAU();
            }
            angles.push((costheta + T::one()) / two);
            angles.push(phi / T::TAU());
            system = system - *emitted;
            if k < n - 2 {
                let next2 = system.m2().max(T::zero());
                let u = (next2 / mass2).min(T::one());
                ratios.push(mass_ratio_cdf(n - 2 - k, u));
                mass2 = next2;
            }
        }
        ratios.extend(angles);
        let weight = massless_weight(n, e_cm) * factor;
        Ok((ratios, e_cm, weight.recip()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::{array, Array2};
    use rand::prelude::*;
    use std::f64::consts::PI;

    fn random_rows(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_simple_fn((rows, cols), || rng.gen::<f64>())
    }

    #[test]
    fn uses_minimal_random_numbers() {
        let config = NumericConfig::default();
        assert_eq!(RamboOnDiet::<f64>::massless(2, &config).unwrap().random_dims(), 2);
        assert_eq!(RamboOnDiet::<f64>::massless(5, &config).unwrap().random_dims(), 11);
    }

    #[test]
    fn massless_momenta_balance() {
        let config = NumericConfig::default();
        for n in 2..8 {
            let diet = RamboOnDiet::massless(n, &config).unwrap();
            let r = random_rows(50, diet.random_dims(), 11 * n as u64);
            let (events, weights) = diet.map(r.view(), &[1000.0]).unwrap();
            for (event, weight) in events.iter().zip(weights.iter()) {
                let total: FourMomentum<f64> = event.iter().sum();
                assert_relative_eq!(total.e, 1000.0, max_relative = 1e-12);
                assert_relative_eq!(total.px, 0.0, epsilon = 1e-9);
                assert_relative_eq!(total.py, 0.0, epsilon = 1e-9);
                assert_relative_eq!(total.pz, 0.0, epsilon = 1e-9);
                assert!(event.iter().all(|p| p.m2().abs() < 1e-6));
                assert!(event.iter().all(|p| p.e > 0.0));
                assert_relative_eq!(*weight, massless_weight(n, 1000.0), max_relative = 1e-14);
            }
        }
    }

    #[test]
    fn first_emission_follows_angles() {
        let config = NumericConfig::default();
        let diet = RamboOnDiet::massless(3, &config).unwrap();
        let (event, _) = diet.map_single(&[0.5, 0.75, 0.125, 0.1, 0.9], &100.0).unwrap();
        assert_relative_eq!(event[0].costheta(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(event[0].phi(), PI / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn two_body_massive_weight() {
        let config = NumericConfig::default();
        let mass = 80.377;
        let diet = RamboOnDiet::new(2, vec![mass; 2], &config).unwrap();
        let (event, weight) = diet.map_single(&[0.3, 0.6], &500.0).unwrap();
        let beta = (1.0 - 4.0 * mass * mass / 250000.0f64).sqrt();
        assert_relative_eq!(weight, PI / 2.0 * beta, max_relative = 1e-10);
        assert_relative_eq!(event[0].e, 250.0, max_relative = 1e-12);
        assert_relative_eq!(event[1].m(), mass, max_relative = 1e-9);
    }

    #[test]
    fn inverse_round_trip() {
        let config = NumericConfig::default();
        for masses in [vec![0.0; 5], vec![80.377, 80.377, 0.0, 4.18, 0.0]] {
            let diet = RamboOnDiet::new(5, masses, &config).unwrap();
            let r = random_rows(40, diet.random_dims(), 3);
            let (events, weights) = diet.map(r.view(), &[500.0]).unwrap();
            let (r_back, e_cm, densities) = diet.map_inverse(&events, &[()]).unwrap();
            for i in 0..40 {
                assert_relative_eq!(e_cm[i], 500.0, max_relative = 1e-12);
                assert_relative_eq!(densities[i] * weights[i], 1.0, max_relative = 1e-8);
                for j in 0..diet.random_dims() {
                    assert_relative_eq!(
                        r_back[[i, j]],
                        r[[i, j]],
                        epsilon = 1e-10,
                        max_relative = 1e-10
                    );
                }
            }
        }
    }

    #[test]
    fn inverse_round_trip_with_three_w_bosons() {
        let config = NumericConfig::default();
        let diet = RamboOnDiet::new(3, vec![80.377; 3], &config).unwrap();
        let r = random_rows(200, diet.random_dims(), 17);
        let (events, _) = diet.map(r.view(), &[500.0]).unwrap();
        let (r_back, _, _) = diet.map_inverse(&events, &[()]).unwrap();
        for (a, b) in r_back.iter().zip(r.iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-10);
        }
    }

    #[test]
    fn edge_randoms_give_finite_events() {
        let config = NumericConfig::default();
        let base = [0.3, 0.7, 0.2, 0.8, 0.45, 0.55, 0.35, 0.65];
        for masses in [vec![0.0; 4], vec![0.0, 80.377, 80.377, 4.18]] {
            let diet = RamboOnDiet::new(4, masses.clone(), &config).unwrap();
            for j in 0..base.len() {
                for edge in [0.0, 1.0] {
                    let mut r = base;
                    r[j] = edge;
                    let (event, weight): (_, f64) = diet.map_single(&r, &500.0).unwrap();
                    assert!(weight.is_finite() && weight > 0.0, "r[{j}] = {edge}");
                    let total: FourMomentum<f64> = event.iter().sum();
                    assert_relative_eq!(total.e, 500.0, max_relative = 1e-9);
                    assert_abs_diff_eq!(total.px, 0.0, epsilon = 1e-7);
                    assert_abs_diff_eq!(total.py, 0.0, epsilon = 1e-7);
                    assert_abs_diff_eq!(total.pz, 0.0, epsilon = 1e-7);
                    for (p, &m) in event.iter().zip(&masses) {
                        let on_shell = p.e >= m * (1.0 - 1e-12);
                        assert!(p.e.is_finite() && on_shell, "r[{j}] = {edge}");
                    }
                }
            }
        }
    }

    #[test]
    fn inverse_accepts_boosted_configurations() {
        let config = NumericConfig::default();
        let diet = RamboOnDiet::massless(3, &config).unwrap();
        let r = array![0.4, 0.2, 0.7, 0.6, 0.3];
        let (event, _) = diet.map_single(r.as_slice().unwrap(), &200.0).unwrap();
        let frame = FourMomentum::new(250.0, 30.0, -20.0, 100.0);
        let boosted: Vec<_> = event.iter().map(|p| p.boost_from_rest(&frame)).collect();
        let (r_back, e_cm, _) = diet.map_inverse_single(&boosted, &()).unwrap();
        assert_relative_eq!(e_cm, 200.0, max_relative = 1e-10);
        for (a, b) in r_back.iter().zip(r.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-8);
        }
    }

    #[test]
    fn inverse_checks_particle_count() {
        let config = NumericConfig::default();
        let diet = RamboOnDiet::massless(3, &config).unwrap();
        let momenta = vec![
            FourMomentum::new(1.0, 0.0, 0.0, 1.0),
            FourMomentum::new(1.0, 0.0, 0.0, -1.0),
        ];
        assert_eq!(
            diet.map_inverse_single(&momenta, &()),
            Err(MappingError::ShapeError {
                what: "particles",
                expected: 3,
                found: 2
            })
        );
    }
}
