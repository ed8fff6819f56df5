//! Fixed-iteration root finders used by the RAMBO generators.
//!
//! Both solvers run a fixed number of steps instead of looping until a tolerance is met, so
//! the amount of work per event is constant and a dual-number scalar sees the same sequence
//! of operations for every row. Once an iteration has converged the remaining steps leave
//! the value (and its derivative part) unchanged, which makes the derivative of the last
//! step the implicit-function derivative of the root.

use log::warn;

use crate::numeric::{constant, NumericConfig, Real};

/// Cumulative distribution of the RAMBO-on-diet mass ratio, $` (p+1)u^p - p\,u^{p+1} `$.
#[inline]
pub fn mass_ratio_cdf<T: Real>(p: usize, u: T) -> T {
    let p_t = constant::<T>(p as f64);
    let up = u.powi(p as i32);
    (p_t + T::one()) * up - p_t * up * u
}

/// Solve $` (p+1)u^p - p\,u^{p+1} = r `$ for $` u \in [0, 1] `$.
///
/// `p = 1` has the closed form $` u = 1 - \sqrt{1 - r} `$. Higher powers use Newton steps
/// safeguarded by the bracket $`[(r / (p+1))^{1/p}, 1]`$, falling back to bisection whenever
/// a step would leave the bracket or the derivative drops below the epsilon floor.
pub fn mass_ratio<T: Real>(p: usize, r: T, config: &NumericConfig) -> T {
    if r <= T::zero() {
        return T::zero();
    }
    if r >= T::one() {
        return T::one();
    }
    if p == 1 {
        return T::one() - (T::one() - r).sqrt();
    }
    let p_t = constant::<T>(p as f64);
    let eps = config.epsilon::<T>();
    let half = constant::<T>(0.5);
    let mut lo = (r / (p_t + T::one())).powf(p_t.recip()).min(T::one());
    let mut hi = T::one();
    let mut u = lo;
    for _ in 0..config.root_iterations {
        let f = mass_ratio_cdf(p, u) - r;
        if f < T::zero() {
            lo = u;
        } else {
            hi = u;
        }
        let df = p_t * (p_t + T::one()) * u.powi(p as i32 - 1) * (T::one() - u);
        u = (df > eps)
            .then(|| u - f / df)
            .filter(|next| *next >= lo && *next <= hi)
            .unwrap_or_else(|| half * (lo + hi));
    }
    u
}

/// Solve $` \sum_i \sqrt{m_i^2 + \xi^2 E_i^2} = E_{cm} `$ for the RAMBO rescaling factor
/// $`\xi`$.
///
/// The left-hand side is convex and increasing in $`\xi`$ and the starting point
/// $` \xi_0 = \sqrt{1 - (\sum_i m_i / E_{cm})^2} `$ never undershoots the root, so plain
/// Newton steps approach it monotonically from above.
pub fn rescaling_factor<T: Real>(
    energies: &[T],
    masses: &[T],
    e_cm: T,
    config: &NumericConfig,
) -> T {
    let eps = config.epsilon::<T>();
    let mass_sum = masses.iter().fold(T::zero(), |acc, &m| acc + m);
    let ratio = mass_sum / e_cm;
    let mut xi = (T::one() - ratio * ratio).max(T::zero()).sqrt();
    let residual = |xi: T| -> (T, T) {
        energies
            .iter()
            .zip(masses)
            .fold((-e_cm, T::zero()), |(f, df), (&e, &m)| {
                let k0 = (m * m + xi * xi * e * e).sqrt();
                (f + k0, df + xi * e * e / k0)
            })
    };
    for _ in 0..config.newton_iterations {
        let (f, df) = residual(xi);
        xi -= f / df.max(eps);
    }
    let (f, _) = residual(xi);
    if f.abs() > eps * e_cm {
        warn!(
            "mass rescaling did not converge after {} iterations (relative residual {:?})",
            config.newton_iterations,
            f / e_cm
        );
    }
    xi
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn closed_form_for_linear_power() {
        let config = NumericConfig::default();
        let u = mass_ratio(1, 0.75, &config);
        assert_relative_eq!(u, 0.5, epsilon = 1e-15);
        assert_relative_eq!(mass_ratio_cdf(1, u), 0.75, epsilon = 1e-15);
    }

    #[test]
    fn newton_inverts_cdf() {
        let config = NumericConfig::default();
        for p in 2..8 {
            for &r in &[1e-9, 1e-4, 0.1, 0.5, 0.9, 0.999_999] {
                let u = mass_ratio(p, r, &config);
                assert!((0.0..=1.0).contains(&u));
                assert_relative_eq!(mass_ratio_cdf(p, u), r, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn cdf_is_bounded() {
        let config = NumericConfig::default();
        assert_eq!(mass_ratio(3, 0.0, &config), 0.0);
        assert_eq!(mass_ratio(3, 1.0, &config), 1.0);
        assert_relative_eq!(mass_ratio_cdf(4, 1.0), 1.0);
    }

    #[test]
    fn rescaling_conserves_energy() {
        let config = NumericConfig::default();
        let energies: [f64; 3] = [200.0, 150.0, 150.0];
        let masses: [f64; 3] = [80.377, 80.377, 0.0];
        let xi = rescaling_factor(&energies, &masses, 500.0, &config);
        let total: f64 = energies
            .iter()
            .zip(&masses)
            .map(|(e, m)| (m * m + xi * xi * e * e).sqrt())
            .sum();
        assert!(xi > 0.0 && xi < 1.0);
        assert_relative_eq!(total, 500.0, max_relative = 1e-13);
    }

    #[test]
    fn massless_rescaling_is_identity() {
        let config = NumericConfig::default();
        let xi = rescaling_factor(&[100.0, 300.0, 100.0], &[0.0; 3], 500.0, &config);
        assert_relative_eq!(xi, 1.0, epsilon = 1e-15);
    }
}
