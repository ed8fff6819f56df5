use std::ops::Range;

use derive_builder::Builder;
use indexmap::IndexMap;
use log::debug;

use crate::{
    four_momentum::FourMomentum,
    invariants::{InvariantBounds, InvariantSampler},
    mapping::{check_columns, MappingError, MappingResult, PhaseSpaceMapping},
    numeric::{constant, NumericConfig, Real},
    rambo::{NBodyKind, NBodyMapper},
    two_particle::{TChannelCondition, TwoParticleTChannel},
};

/// Pole mass of the $`W`$ boson in GeV.
pub const W_MASS: f64 = 80.377;

/// Construction parameters of a [`ChannelComposer`].
///
/// ```
/// use phasespace::prelude::*;
///
/// let config = ChannelConfigBuilder::default()
///     .e_cm(13000.0)
///     .masses(vec![0.0, 0.0, 80.377, 80.377])
///     .random_dims(10)
///     .build()
///     .unwrap();
/// assert_eq!(config.n_body, NBodyKind::RamboOnDiet);
/// ```
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(build_fn(error = "MappingError"))]
pub struct ChannelConfig<T: Real> {
    /// Hadronic center-of-mass energy $`\sqrt{S}`$.
    pub e_cm: T,
    /// Outgoing masses. The first particle recoils against the system formed by the rest.
    pub masses: Vec<T>,
    /// Expected number of random numbers per event, checked against the composed stages.
    pub random_dims: usize,
    /// Sampler for the invariant mass of the recoiling system.
    #[builder(default = "InvariantSampler::Uniform")]
    pub propagator: InvariantSampler<T>,
    /// Sampler for $`-t`$ in the emission of the first outgoing particle.
    #[builder(default = "InvariantSampler::Uniform")]
    pub t_propagator: InvariantSampler<T>,
    #[builder(default)]
    pub n_body: NBodyKind,
    #[builder(default)]
    pub numeric: NumericConfig,
}

/// One event of a composed channel: the incoming partons followed by the outgoing
/// particles, and the momentum fractions of the partons.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent<T: Real> {
    pub momenta: Vec<FourMomentum<T>>,
    pub x1: T,
    pub x2: T,
}

/// Generates complete hadron-collider events for the topology
/// $`p_a p_b \to k_1 + R,\ R \to k_2 \dots k_n`$.
///
/// Each event consumes its random numbers in named slices: the partonic invariant
/// $`\hat s`$, the rapidity of the partonic system, the invariant mass of $`R`$, the
/// t-channel emission of $`k_1`$ and finally the isotropic decay of $`R`$. The weight is
/// the product of every stage's density.
#[derive(Debug, Clone)]
pub struct ChannelComposer<T: Real> {
    s_lab: T,
    s_hat_min: T,
    s_r_min: T,
    eps: T,
    masses: Vec<T>,
    propagator: InvariantSampler<T>,
    t_channel: TwoParticleTChannel<T>,
    decay: NBodyMapper<T>,
    layout: IndexMap<&'static str, Range<usize>>,
}

impl<T: Real> ChannelComposer<T> {
    pub fn new(config: ChannelConfig<T>) -> MappingResult<Self> {
        let ChannelConfig {
            e_cm,
            masses,
            random_dims,
            propagator,
            t_propagator,
            n_body,
            numeric,
        } = config;
        if masses.len() < 3 {
            return Err(MappingError::configuration(format!(
                "a composed channel needs at least three outgoing particles, got {}",
                masses.len()
            )));
        }
        let mass_sum = masses.iter().fold(T::zero(), |acc, &m| acc + m);
        if !(e_cm > mass_sum) {
            return Err(MappingError::configuration(format!(
                "collider energy {:?} does not exceed the mass sum {:?}",
                e_cm, mass_sum
            )));
        }
        let decay = n_body.build(masses[1..].to_vec(), &numeric)?;

        let eps = numeric.epsilon::<T>();
        let s_lab = e_cm * e_cm;
        let recoil_sum = mass_sum - masses[0];
        let s_r_min = recoil_sum * recoil_sum * (T::one() + eps) + eps * s_lab;
        let threshold = masses[0] + s_r_min.sqrt();
        let s_hat_min = threshold * threshold * (T::one() + eps);
        if s_hat_min >= s_lab {
            return Err(MappingError::configuration(format!(
                "collider energy {:?} leaves no room above the production threshold",
                e_cm
            )));
        }

        let stages = [
            ("shat", 1),
            ("rapidity", 1),
            ("propagator", propagator.random_dims()),
            ("t_channel", 2),
            ("decay", decay.random_dims()),
        ];
        let mut layout = IndexMap::new();
        let mut offset = 0;
        for (name, dims) in stages {
            layout.insert(name, offset..offset + dims);
            offset += dims;
        }
        if offset != random_dims {
            return Err(MappingError::configuration(format!(
                "channel consumes {offset} random numbers per event but {random_dims} were declared"
            )));
        }
        debug!(
            "ChannelComposer: {} outgoing particles, {:?} decay, layout {:?}",
            masses.len(),
            decay.kind(),
            layout
        );
        Ok(Self {
            s_lab,
            s_hat_min,
            s_r_min,
            eps,
            masses,
            propagator,
            t_channel: TwoParticleTChannel::with_propagator(t_propagator, &numeric),
            decay,
            layout,
        })
    }

    /// Vector-boson scattering $`pp \to j j W^+ W^-`$ with a RAMBO-on-diet decay of the
    /// $`W`$ pair and the recoiling jet.
    pub fn vbs_ww(e_cm: T) -> MappingResult<Self> {
        let w = constant::<T>(W_MASS);
        Self::new(
            ChannelConfigBuilder::default()
                .e_cm(e_cm)
                .masses(vec![T::zero(), T::zero(), w, w])
                .random_dims(10)
                .build()?,
        )
    }

    /// Ranges of the random-number row consumed by each stage, in order.
    pub fn layout(&self) -> &IndexMap<&'static str, Range<usize>> {
        &self.layout
    }

    pub fn masses(&self) -> &[T] {
        &self.masses
    }

    fn slice<'a>(&self, r: &'a [T], stage: &str) -> &'a [T] {
        self.layout
            .get(stage)
            .map_or(&r[..0], |range| &r[range.clone()])
    }
}

impl<T: Real> PhaseSpaceMapping<T> for ChannelComposer<T> {
    type Condition = ();
    type Output = ChannelEvent<T>;

    fn random_dims(&self) -> usize {
        self.layout.values().map(|range| range.len()).sum()
    }

    fn map_single(&self, r: &[T], _condition: &()) -> MappingResult<(ChannelEvent<T>, T)> {
        check_columns(self.random_dims(), r.len())?;
        let half = constant::<T>(0.5);
        let uniform = InvariantSampler::<T>::uniform();

        let (s_hat, w_s_hat) = uniform.map_single(
            self.slice(r, "shat"),
            &InvariantBounds::new(self.s_hat_min, self.s_lab),
        )?;
        let tau = s_hat / self.s_lab;
        let y_max = -half * tau.ln();
        let (y, w_y) = uniform.map_single(
            self.slice(r, "rapidity"),
            &InvariantBounds::new(-y_max, y_max),
        )?;
        // at |y| = y_max one fraction is exactly one up to rounding
        let x1 = (tau.sqrt() * y.exp()).min(T::one());
        let x2 = (tau.sqrt() * (-y).exp()).min(T::one());
        let beam = half * self.s_lab.sqrt();
        let p_a = FourMomentum::new(x1 * beam, T::zero(), T::zero(), x1 * beam);
        let p_b = FourMomentum::new(x2 * beam, T::zero(), T::zero(), -x2 * beam);

        let m1 = self.masses[0];
        let recoil_max = s_hat.sqrt() - m1;
        // keeps the t-channel strictly above threshold at the top of the window
        let s_r_max = recoil_max * recoil_max / (T::one() + half * self.eps);
        let (s_r, w_r) = self.propagator.map_single(
            self.slice(r, "propagator"),
            &InvariantBounds::new(self.s_r_min, s_r_max),
        )?;
        let ([k1, recoil], w_t) = self.t_channel.map_single(
            self.slice(r, "t_channel"),
            &TChannelCondition::new([p_a, p_b], [m1, s_r.sqrt()]),
        )?;
        let (decay, w_decay) = self.decay.map_single(self.slice(r, "decay"), &s_r.sqrt())?;

        let mut momenta = Vec::with_capacity(self.masses.len() + 2);
        momenta.extend([p_a, p_b, k1]);
        momenta.extend(decay.iter().map(|k| k.boost_from_rest(&recoil)));
        let weight = w_s_hat / self.s_lab * w_y * w_r * w_t * w_decay;
        Ok((ChannelEvent { momenta, x1, x2 }, weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use rand::prelude::*;

    #[test]
    fn vbs_layout() {
        let channel = ChannelComposer::vbs_ww(13000.0).unwrap();
        assert_eq!(channel.random_dims(), 10);
        let names: Vec<_> = channel.layout().keys().copied().collect();
        assert_eq!(names, ["shat", "rapidity", "propagator", "t_channel", "decay"]);
        assert_eq!(channel.layout()["decay"], 5..10);
    }

    #[test]
    fn declared_dimensions_must_match() {
        let config = ChannelConfigBuilder::default()
            .e_cm(13000.0)
            .masses(vec![0.0, 0.0, W_MASS, W_MASS])
            .random_dims(9)
            .build()
            .unwrap();
        assert!(matches!(
            ChannelComposer::new(config),
            Err(MappingError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn rejects_small_or_closed_channels() {
        let too_few = ChannelConfigBuilder::default()
            .e_cm(13000.0)
            .masses(vec![0.0, 0.0])
            .random_dims(7)
            .build()
            .unwrap();
        assert!(ChannelComposer::new(too_few).is_err());
        let closed = ChannelConfigBuilder::default()
            .e_cm(100.0)
            .masses(vec![0.0, W_MASS, W_MASS])
            .random_dims(7)
            .build()
            .unwrap();
        assert!(matches!(
            ChannelComposer::new(closed),
            Err(MappingError::ConfigurationError { .. })
        ));
        let missing = ChannelConfigBuilder::<f64>::default().e_cm(100.0).build();
        assert!(matches!(missing, Err(MappingError::ConfigurationError { .. })));
    }

    #[test]
    fn events_conserve_momentum() {
        let channel = ChannelComposer::vbs_ww(13000.0).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let r = Array2::from_shape_simple_fn((200, 10), || rng.gen::<f64>());
        let (events, weights) = channel.map(r.view(), &[()]).unwrap();
        for (event, weight) in events.iter().zip(weights.iter()) {
            assert_eq!(event.momenta.len(), 6);
            assert!(*weight > 0.0 && weight.is_finite());
            assert!(event.x1 > 0.0 && event.x1 <= 1.0);
            assert!(event.x2 > 0.0 && event.x2 <= 1.0);
            let incoming = event.momenta[0] + event.momenta[1];
            let outgoing: FourMomentum<f64> = event.momenta[2..].iter().sum();
            assert_relative_eq!(outgoing.e, incoming.e, max_relative = 1e-9);
            assert_relative_eq!(outgoing.pz, incoming.pz, epsilon = 1e-9 * incoming.e);
            assert!(outgoing.pt() < 1e-9 * incoming.e);
            assert_relative_eq!(incoming.e, 6500.0 * (event.x1 + event.x2), max_relative = 1e-12);
            for (p, m) in event.momenta[2..].iter().zip(channel.masses()) {
                assert!((p.m2() - m * m).abs() < 1e-6 * p.e * p.e);
            }
        }
    }

    #[test]
    fn edge_randoms_stay_physical() {
        let channel = ChannelComposer::vbs_ww(13000.0).unwrap();
        let base = [0.4, 0.5, 0.3, 0.6, 0.7, 0.2, 0.8, 0.35, 0.65, 0.45];
        // r[0] = 1 puts the partons at tau = 1 where the rapidity range closes
        let edges = (0..10).map(|j| (j, 0.0)).chain((1..10).map(|j| (j, 1.0)));
        for (j, edge) in edges {
            let mut r = base;
            r[j] = edge;
            let (event, weight): (_, f64) = channel.map_single(&r, &()).unwrap();
            assert!(weight.is_finite() && weight > 0.0, "r[{j}] = {edge}");
            assert!(event.x1 > 0.0 && event.x1 <= 1.0, "r[{j}] = {edge}");
            assert!(event.x2 > 0.0 && event.x2 <= 1.0, "r[{j}] = {edge}");
            assert!(event.momenta.iter().all(|p| p.e.is_finite()));
            let incoming = event.momenta[0] + event.momenta[1];
            let outgoing: FourMomentum<f64> = event.momenta[2..].iter().sum();
            assert_relative_eq!(outgoing.e, incoming.e, max_relative = 1e-9);
            assert_relative_eq!(outgoing.pz, incoming.pz, epsilon = 1e-9 * incoming.e);
        }
    }

    #[test]
    fn rapidity_edges_clamp_momentum_fractions() {
        let channel = ChannelComposer::vbs_ww(13000.0).unwrap();
        let mut r = [0.4, 0.0, 0.3, 0.6, 0.7, 0.2, 0.8, 0.35, 0.65, 0.45];
        let (backward, _) = channel.map_single(&r, &()).unwrap();
        assert!(backward.x2 <= 1.0);
        assert_relative_eq!(backward.x2, 1.0, max_relative = 1e-14);
        r[1] = 1.0;
        let (forward, _) = channel.map_single(&r, &()).unwrap();
        assert!(forward.x1 <= 1.0);
        assert_relative_eq!(forward.x1, 1.0, max_relative = 1e-14);
        assert_relative_eq!(forward.x2, backward.x1, max_relative = 1e-12);
    }

    #[test]
    fn breit_wigner_t_propagator() {
        let r = [0.4, 0.5, 0.3, 0.6, 0.7, 0.2, 0.8, 0.35, 0.65, 0.45];
        let config = ChannelConfigBuilder::default()
            .e_cm(13000.0)
            .masses(vec![0.0, 0.0, W_MASS, W_MASS])
            .random_dims(10)
            .t_propagator(InvariantSampler::breit_wigner(W_MASS, 2.085).unwrap())
            .build()
            .unwrap();
        let channel = ChannelComposer::new(config).unwrap();
        let flat = ChannelComposer::vbs_ww(13000.0).unwrap();
        let (event, weight) = channel.map_single(&r, &()).unwrap();
        let (flat_event, flat_weight) = flat.map_single(&r, &()).unwrap();
        assert!(weight > 0.0 && weight.is_finite());
        assert_eq!(event.momenta[0], flat_event.momenta[0]);
        assert_eq!(event.momenta[1], flat_event.momenta[1]);
        assert!((weight - flat_weight).abs() > 1e-6 * flat_weight);
        let incoming = event.momenta[0] + event.momenta[1];
        let outgoing: FourMomentum<f64> = event.momenta[2..].iter().sum();
        assert_relative_eq!(outgoing.e, incoming.e, max_relative = 1e-9);
    }

    #[test]
    fn breit_wigner_propagator_and_classic_decay() {
        let config = ChannelConfigBuilder::default()
            .e_cm(1000.0)
            .masses(vec![0.0, 0.0, 0.0])
            .random_dims(7)
            .propagator(InvariantSampler::breit_wigner(91.1876, 2.4952).unwrap())
            .n_body(NBodyKind::Rambo)
            .build()
            .unwrap();
        assert!(matches!(
            ChannelComposer::new(config.clone()),
            Err(MappingError::ConfigurationError { .. })
        ));
        let channel = ChannelComposer::new(ChannelConfig {
            random_dims: 13,
            ..config
        })
        .unwrap();
        let r = [0.9, 0.5, 0.5, 0.3, 0.7, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8];
        let (event, weight) = channel.map_single(&r, &()).unwrap();
        assert_eq!(event.momenta.len(), 5);
        assert!(weight > 0.0);
        let recoil = event.momenta[3] + event.momenta[4];
        assert!(recoil.m() < (event.momenta[0] + event.momenta[1]).m());
    }
}
