pub mod channel;
pub mod four_momentum;
pub mod invariants;
pub mod mapping;
pub mod numeric;
pub mod rambo;
pub mod rootfinder;
pub mod two_particle;
pub mod prelude {
    pub use crate::channel::{
        ChannelComposer, ChannelConfig, ChannelConfigBuilder, ChannelEvent, W_MASS,
    };
    pub use crate::four_momentum::FourMomentum;
    pub use crate::invariants::{BreitWigner, InvariantBounds, InvariantSampler};
    pub use crate::mapping::{
        stack_momenta, InverseMapping, Mapped, MappingError, MappingResult, PhaseSpaceMapping,
    };
    pub use crate::numeric::{NumericConfig, NumericConfigBuilder, Real};
    pub use crate::rambo::{massless_weight, NBodyKind, NBodyMapper, Rambo, RamboOnDiet};
    pub use crate::two_particle::{TChannelCondition, TwoParticleDecay, TwoParticleTChannel};
}
