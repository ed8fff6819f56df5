use derive_builder::UninitializedFieldError;
use ndarray::{Array1, Array2, Array3, ArrayView2};
use rayon::prelude::*;
use thiserror::Error;

use crate::{four_momentum::FourMomentum, numeric::Real};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Invalid configuration: {reason}")]
    ConfigurationError { reason: String },
    #[error("Kinematically forbidden: {reason}")]
    KinematicsError { reason: String },
    #[error("Expected {expected} {what}, found {found}")]
    ShapeError {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{mapping} has no inverse")]
    NotInvertibleError { mapping: &'static str },
}

impl MappingError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::ConfigurationError {
            reason: reason.into(),
        }
    }
    pub(crate) fn kinematics(reason: impl Into<String>) -> Self {
        Self::KinematicsError {
            reason: reason.into(),
        }
    }
}

impl From<UninitializedFieldError> for MappingError {
    fn from(value: UninitializedFieldError) -> Self {
        Self::configuration(format!("missing field `{}`", value.field_name()))
    }
}

pub type MappingResult<R> = Result<R, MappingError>;

/// Outputs of a batched call together with one density per row.
pub type Mapped<O, T> = (Vec<O>, Array1<T>);

/// A change of variables from the unit hypercube onto (part of) phase space.
///
/// Implementors only provide the single-row kernel [`PhaseSpaceMapping::map_single`]; the
/// batched [`PhaseSpaceMapping::map`] validates shapes up front and then evaluates rows in
/// parallel. The returned density is the Jacobian of the map, i.e. the factor by which a
/// sample must be weighted to estimate an integral over the physical measure.
pub trait PhaseSpaceMapping<T: Real>: Send + Sync {
    /// Per-row auxiliary input (bounds, incoming momenta, energy, ...).
    type Condition: Sync;
    /// Per-row output (an invariant, a set of momenta, ...).
    type Output: Send;

    /// Number of random numbers consumed per row.
    fn random_dims(&self) -> usize;

    fn map_single(
        &self,
        r: &[T],
        condition: &Self::Condition,
    ) -> MappingResult<(Self::Output, T)>;

    /// Map a batch of random rows. `conditions` holds either a single entry, which is shared
    /// by every row, or exactly one entry per row.
    fn map(
        &self,
        r: ArrayView2<T>,
        conditions: &[Self::Condition],
    ) -> MappingResult<Mapped<Self::Output, T>> {
        check_columns(self.random_dims(), r.ncols())?;
        check_conditions(r.nrows(), conditions.len())?;
        let rows: Vec<(Self::Output, T)> = (0..r.nrows())
            .into_par_iter()
            .map(|i| {
                let row = r.row(i).to_vec();
                self.map_single(&row, broadcast(conditions, i))
            })
            .collect::<MappingResult<_>>()?;
        let (outputs, weights): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        Ok((outputs, Array1::from(weights)))
    }
}

/// The inverse direction of an exactly invertible [`PhaseSpaceMapping`].
///
/// `map_inverse_single` recovers the random numbers and the condition which reproduce a
/// given output, and returns the reciprocal of the forward density.
pub trait InverseMapping<T: Real>: PhaseSpaceMapping<T> {
    /// Extra input the inverse needs beyond the output itself (`()` when none).
    type InverseCondition: Sync;

    fn map_inverse_single(
        &self,
        output: &Self::Output,
        condition: &Self::InverseCondition,
    ) -> MappingResult<(Vec<T>, Self::Condition, T)>;

    fn map_inverse(
        &self,
        outputs: &[Self::Output],
        conditions: &[Self::InverseCondition],
    ) -> MappingResult<(Array2<T>, Vec<Self::Condition>, Array1<T>)>
    where
        Self::Output: Sync,
        Self::Condition: Send,
    {
        check_conditions(outputs.len(), conditions.len())?;
        let rows: Vec<(Vec<T>, Self::Condition, T)> = outputs
            .par_iter()
            .enumerate()
            .map(|(i, output)| self.map_inverse_single(output, broadcast(conditions, i)))
            .collect::<MappingResult<_>>()?;
        let dims = self.random_dims();
        let mut randoms = Array2::from_elem((rows.len(), dims), T::zero());
        let mut recovered = Vec::with_capacity(rows.len());
        let mut densities = Vec::with_capacity(rows.len());
        for (i, (r, condition, density)) in rows.into_iter().enumerate() {
            check_columns(dims, r.len())?;
            randoms
                .row_mut(i)
                .iter_mut()
                .zip(r)
                .for_each(|(slot, value)| *slot = value);
            recovered.push(condition);
            densities.push(density);
        }
        Ok((randoms, recovered, Array1::from(densities)))
    }
}

/// Stack a batch of momentum configurations into a `(batch, particles, 4)` array.
pub fn stack_momenta<T: Real>(events: &[Vec<FourMomentum<T>>]) -> MappingResult<Array3<T>> {
    let particles = events.first().map_or(0, Vec::len);
    let mut out = Array3::from_elem((events.len(), particles, 4), T::zero());
    for (i, event) in events.iter().enumerate() {
        if event.len() != particles {
            return Err(MappingError::ShapeError {
                what: "particles per event",
                expected: particles,
                found: event.len(),
            });
        }
        for (j, p) in event.iter().enumerate() {
            out[[i, j, 0]] = p.e;
            out[[i, j, 1]] = p.px;
            out[[i, j, 2]] = p.py;
            out[[i, j, 3]] = p.pz;
        }
    }
    Ok(out)
}

pub(crate) fn check_columns(expected: usize, found: usize) -> MappingResult<()> {
    if expected != found {
        return Err(MappingError::ShapeError {
            what: "random numbers per row",
            expected,
            found,
        });
    }
    Ok(())
}

fn check_conditions(rows: usize, found: usize) -> MappingResult<()> {
    if found != 1 && found != rows {
        return Err(MappingError::ShapeError {
            what: "conditions",
            expected: rows,
            found,
        });
    }
    Ok(())
}

#[inline]
fn broadcast<C>(conditions: &[C], i: usize) -> &C {
    if conditions.len() == 1 {
        &conditions[0]
    } else {
        &conditions[i]
    }
}
