use crate::{
    four_momentum::FourMomentum,
    invariants::{InvariantBounds, InvariantSampler},
    mapping::{check_columns, InverseMapping, MappingError, MappingResult, PhaseSpaceMapping},
    numeric::{breakup_momentum, constant, NumericConfig, Real},
};

/// Incoming momenta and outgoing masses of a $`2 \to 2`$ scattering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TChannelCondition<T: Real> {
    pub incoming: [FourMomentum<T>; 2],
    pub masses: [T; 2],
}

impl<T: Real> TChannelCondition<T> {
    pub fn new(incoming: [FourMomentum<T>; 2], masses: [T; 2]) -> Self {
        Self { incoming, masses }
    }
}

/// Center-of-mass quantities shared by the forward and inverse maps.
struct Frame<T: Real> {
    total: FourMomentum<T>,
    sqrt_s: T,
    /// First incoming momentum seen from the center-of-mass frame.
    incoming_cm: FourMomentum<T>,
    e_out: T,
    p_out: T,
    /// Momentum transfer at $`\cos\theta = +1`$ and $`\cos\theta = -1`$.
    t_forward: T,
    t_backward: T,
}

impl<T: Real> Frame<T> {
    fn cos_theta(&self, t: T, eps: T) -> T {
        let two = constant::<T>(2.0);
        let pk = (self.incoming_cm.p() * self.p_out).max(eps);
        let cos = T::one() + (t - self.t_forward) / (two * pk);
        cos.max(-T::one()).min(T::one())
    }

    /// $`\frac{2\pi}{8\sqrt{s}|p|}`$ times the width of the sampled $`t`$ range.
    fn weight(&self, t_jacobian: T, eps: T) -> T {
        let eight = constant::<T>(8.0);
        t_jacobian * T::TAU() / (eight * self.sqrt_s * self.incoming_cm.p().max(eps))
    }
}

/// Two-body map parameterised by the momentum transfer $`t = (p_1 - q_1)^2`$ and the
/// azimuth $`\phi`$ of the first outgoing particle around the incoming axis.
///
/// Two random numbers per row: $`r_t`$ draws $`-t`$ from the t-propagator sampler
/// between the forward and backward limits, so $`r_t = 0`$ is the forward direction, and
/// $`r_\phi`$ draws $`\phi = 2\pi r_\phi`$. With the default flat sampler the density
/// reduces to $`\pi/2`$ for massless outgoing particles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoParticleTChannel<T: Real> {
    t_sampler: InvariantSampler<T>,
    config: NumericConfig,
}

impl<T: Real> TwoParticleTChannel<T> {
    pub fn new(config: &NumericConfig) -> Self {
        Self::with_propagator(InvariantSampler::uniform(), config)
    }

    /// Sample $`-t`$ with `t_sampler`, e.g. a Breit-Wigner for a massive exchanged
    /// particle.
    pub fn with_propagator(t_sampler: InvariantSampler<T>, config: &NumericConfig) -> Self {
        Self {
            t_sampler,
            config: *config,
        }
    }

    pub fn t_sampler(&self) -> &InvariantSampler<T> {
        &self.t_sampler
    }

    fn frame(&self, condition: &TChannelCondition<T>) -> MappingResult<Frame<T>> {
        let [p1, p2] = condition.incoming;
        let [m1, m2] = condition.masses;
        if m1 < T::zero() || m2 < T::zero() {
            return Err(MappingError::configuration(format!(
                "outgoing masses must be non-negative, got {:?} and {:?}",
                m1, m2
            )));
        }
        let total = p1 + p2;
        let s = total.m2();
        if !(s > T::zero()) {
            return Err(MappingError::kinematics(format!(
                "incoming system is not time-like (s = {:?})",
                s
            )));
        }
        let sqrt_s = s.sqrt();
        if sqrt_s <= m1 + m2 {
            return Err(MappingError::kinematics(format!(
                "sqrt(s) = {:?} does not exceed the outgoing masses {:?} + {:?}",
                sqrt_s, m1, m2
            )));
        }
        let two = constant::<T>(2.0);
        let incoming_cm = p1.boost_to_rest(&total);
        let e_out = (s + m1 * m1 - m2 * m2) / (two * sqrt_s);
        let p_out = breakup_momentum(sqrt_s, m1, m2);
        let t_base = p1.m2() + m1 * m1 - two * incoming_cm.e * e_out;
        let pk = two * incoming_cm.p() * p_out;
        Ok(Frame {
            total,
            sqrt_s,
            incoming_cm,
            e_out,
            p_out,
            t_forward: t_base + pk,
            t_backward: t_base - pk,
        })
    }
}

impl<T: Real> Default for TwoParticleTChannel<T> {
    fn default() -> Self {
        Self::new(&NumericConfig::default())
    }
}

impl<T: Real> PhaseSpaceMapping<T> for TwoParticleTChannel<T> {
    type Condition = TChannelCondition<T>;
    type Output = [FourMomentum<T>; 2];

    fn random_dims(&self) -> usize {
        2
    }

    fn map_single(
        &self,
        r: &[T],
        condition: &TChannelCondition<T>,
    ) -> MappingResult<([FourMomentum<T>; 2], T)> {
        check_columns(2, r.len())?;
        let eps = self.config.epsilon::<T>();
        let frame = self.frame(condition)?;
        let bounds = InvariantBounds::new(-frame.t_forward, -frame.t_backward);
        let (minus_t, t_jacobian) = self.t_sampler.sample(r[0], &bounds)?;
        let costheta = frame.cos_theta(-minus_t, eps);
        let phi = T::TAU() * r[1];
        let q1 = FourMomentum::new(frame.e_out, T::zero(), T::zero(), frame.p_out)
            .rotate_zy(phi, costheta)
            .rotate_zy(frame.incoming_cm.phi(), axis_costheta(&frame.incoming_cm, eps))
            .boost_from_rest(&frame.total);
        let q2 = frame.total - q1;
        Ok(([q1, q2], frame.weight(t_jacobian, eps)))
    }
}

impl<T: Real> InverseMapping<T> for TwoParticleTChannel<T> {
    type InverseCondition = [FourMomentum<T>; 2];

    fn map_inverse_single(
        &self,
        output: &[FourMomentum<T>; 2],
        condition: &[FourMomentum<T>; 2],
    ) -> MappingResult<(Vec<T>, TChannelCondition<T>, T)> {
        let eps = self.config.epsilon::<T>();
        let [q1, q2] = *output;
        let recovered = TChannelCondition::new(*condition, [q1.m(), q2.m()]);
        let frame = self.frame(&recovered)?;
        let local = q1
            .boost_to_rest(&frame.total)
            .inverse_rotate_zy(frame.incoming_cm.phi(), axis_costheta(&frame.incoming_cm, eps));
        let costheta = (local.pz / local.p().max(eps)).max(-T::one()).min(T::one());
        let mut phi = local.phi();
        if phi < T::zero() {
            phi += T::TAU();
        }
        let bounds = InvariantBounds::new(-frame.t_forward, -frame.t_backward);
        let half_range = (frame.t_forward - frame.t_backward) / constant::<T>(2.0);
        let minus_t = (half_range * (T::one() - costheta) - frame.t_forward)
            .max(bounds.smin)
            .min(bounds.smax);
        let (r_t, dr_dt) = self.t_sampler.invert(minus_t, &bounds)?;
        Ok((
            vec![r_t, phi / T::TAU()],
            recovered,
            dr_dt / frame.weight(T::one(), eps),
        ))
    }
}

/// Polar direction of the incoming axis, `+1` for a momentum at rest.
fn axis_costheta<T: Real>(p: &FourMomentum<T>, eps: T) -> T {
    (p.pz / p.p().max(eps)).max(-T::one()).min(T::one())
}

/// Isotropic decay of a parent momentum into two particles of fixed masses.
///
/// Two random numbers per row set the direction of the first daughter in the parent rest
/// frame, $`\cos\theta = 2r_1 - 1`$ and $`\phi = 2\pi r_2`$, and the daughters are then
/// boosted along with the parent. A parent at rest therefore generates directly in the
/// center-of-mass frame. The density is $`\pi |\vec k| / \sqrt{s}`$, which is $`\pi/2`$
/// for massless daughters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoParticleDecay<T: Real> {
    masses: [T; 2],
    config: NumericConfig,
}

impl<T: Real> TwoParticleDecay<T> {
    pub fn new(masses: [T; 2], config: &NumericConfig) -> MappingResult<Self> {
        if masses.iter().any(|&m| !(m >= T::zero())) {
            return Err(MappingError::configuration(format!(
                "daughter masses must be non-negative, got {:?}",
                masses
            )));
        }
        Ok(Self {
            masses,
            config: *config,
        })
    }

    pub fn massless(config: &NumericConfig) -> Self {
        Self {
            masses: [T::zero(); 2],
            config: *config,
        }
    }

    pub fn masses(&self) -> [T; 2] {
        self.masses
    }

    /// `(sqrt(s), E_1, |k|)` of the first daughter in the parent rest frame.
    fn rest_frame(&self, parent: &FourMomentum<T>) -> MappingResult<(T, T, T)> {
        let [m1, m2] = self.masses;
        let s = parent.m2();
        if !(s > T::zero()) {
            return Err(MappingError::kinematics(format!(
                "decaying momentum is not time-like (s = {:?})",
                s
            )));
        }
        let sqrt_s = s.sqrt();
        if sqrt_s <= m1 + m2 {
            return Err(MappingError::kinematics(format!(
                "parent mass {:?} does not exceed the daughter masses {:?} + {:?}",
                sqrt_s, m1, m2
            )));
        }
        let e1 = (s + m1 * m1 - m2 * m2) / (constant::<T>(2.0) * sqrt_s);
        Ok((sqrt_s, e1, breakup_momentum(sqrt_s, m1, m2)))
    }
}

impl<T: Real> PhaseSpaceMapping<T> for TwoParticleDecay<T> {
    type Condition = FourMomentum<T>;
    type Output = [FourMomentum<T>; 2];

    fn random_dims(&self) -> usize {
        2
    }

    fn map_single(
        &self,
        r: &[T],
        parent: &FourMomentum<T>,
    ) -> MappingResult<([FourMomentum<T>; 2], T)> {
        check_columns(2, r.len())?;
        let (sqrt_s, e1, k) = self.rest_frame(parent)?;
        let costheta = constant::<T>(2.0) * r[0] - T::one();
        let k1 = FourMomentum::new(e1, T::zero(), T::zero(), k)
            .rotate_zy(T::TAU() * r[1], costheta)
            .boost_from_rest(parent);
        Ok(([k1, *parent - k1], T::PI() * k / sqrt_s))
    }
}

impl<T: Real> InverseMapping<T> for TwoParticleDecay<T> {
    type InverseCondition = ();

    /// Recover the angles, the parent momentum and the reciprocal density.
    fn map_inverse_single(
        &self,
        output: &[FourMomentum<T>; 2],
        _condition: &(),
    ) -> MappingResult<(Vec<T>, FourMomentum<T>, T)> {
        let eps = self.config.epsilon::<T>();
        let [k1, k2] = *output;
        let parent = k1 + k2;
        let (sqrt_s, _, k) = self.rest_frame(&parent)?;
        let local = k1.boost_to_rest(&parent);
        let costheta = (local.pz / local.p().max(eps)).max(-T::one()).min(T::one());
        let mut phi = local.phi();
        if phi < T::zero() {
            phi += T::TAU();
        }
        let r = vec![(costheta + T::one()) / constant::<T>(2.0), phi / T::TAU()];
        Ok((r, parent, sqrt_s / (T::PI() * k)))
    }
}
