use nalgebra::Vector3;
use ndarray::{array, Array1};
use std::ops::{Add, Neg, Sub};

use crate::numeric::{constant, Real};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FourMomentum<T: Real> {
    pub e: T,
    pub px: T,
    pub py: T,
    pub pz: T,
}

impl<T: Real> FourMomentum<T> {
    //! A four-momentum structure with the handful of Lorentz operations the phase-space
    //! mappings need.
    //!
    //! This is the basic structure of a Lorentz four-vector
    //! of the form $`(E, \overrightarrow{p})`$ where $E$ is the energy and $`\overrightarrow{p}`$ is the
    //! momentum. The metric is $`(+, -, -, -)`$.
    //!
    //! # Examples
    //! ```
    //! use phasespace::prelude::*;
    //!
    //! let vec_a: FourMomentum<f64> = FourMomentum::new(1.3, 0.2, 0.3, 0.1);
    //! let vec_b = FourMomentum::new(4.2, 0.5, 0.4, 0.5);
    //! let total = vec_a + vec_b;
    //! assert!((total.e - 5.5).abs() < 1e-12);
    //! ```

    pub fn new(e: T, px: T, py: T, pz: T) -> Self {
        //! Create a new [`FourMomentum`] from energy and momentum components.
        //!
        //! Components are listed in the order $` (E, p_x, p_y, p_z) `$
        Self { e, px, py, pz }
    }

    pub fn at_rest(m: T) -> Self {
        //! A [`FourMomentum`] of mass `m` at rest, $` (m, 0, 0, 0) `$.
        Self::new(m, T::zero(), T::zero(), T::zero())
    }

    pub fn from_momentum(e: T, p: Vector3<T>) -> Self {
        //! Assemble a [`FourMomentum`] from an energy and a [`nalgebra::Vector3`] momentum.
        Self::new(e, p[0], p[1], p[2])
    }

    pub fn to_array(&self) -> Array1<T> {
        //! Turns a [`FourMomentum`] into a [`ndarray::Array1`]
        //!
        //! # Examples
        //! ```
        //! use phasespace::prelude::*;
        //! use ndarray::array;
        //!
        //! let vec_a = FourMomentum::new(20.0, 1.0, 0.2, -0.1);
        //! assert_eq!(vec_a.to_array(), array![20.0, 1.0, 0.2, -0.1]);
        //! ```
        array![self.e, self.px, self.py, self.pz]
    }

    pub fn momentum(&self) -> Vector3<T> {
        //! Extract the 3-momentum as a [`nalgebra::Vector3`]
        Vector3::new(self.px, self.py, self.pz)
    }

    pub fn m2(&self) -> T {
        //! Calculate the invariant $ m^2 $ for this [`FourMomentum`] instance.
        //!
        //! Calculates $` m^2 = E^2 - \overrightarrow{p}^2 `$
        self.e * self.e - self.p2()
    }

    pub fn m(&self) -> T {
        //! Calculate the invariant $ m $ for this [`FourMomentum`] instance.
        //!
        //! Space-like vectors return the square root of $` |m^2| `$.
        //!
        //! # See Also:
        //!
        //! [`FourMomentum::m2`]
        self.m2().abs().sqrt()
    }

    pub fn e2(&self) -> T {
        //! The squared energy $` E^2 `$.
        self.e * self.e
    }

    pub fn p2(&self) -> T {
        //! The squared magnitude of the 3-momentum $` \overrightarrow{p}^2 `$.
        let p = self.momentum();
        p.dot(&p)
    }

    pub fn p(&self) -> T {
        //! The magnitude of the 3-momentum.
        self.p2().sqrt()
    }

    pub fn pt(&self) -> T {
        //! Transverse momentum with respect to the beam ($z$) axis.
        self.px.hypot(self.py)
    }

    pub fn dot(&self, other: &Self) -> T {
        //! Minkowski product $` a \cdot b = E_a E_b - \overrightarrow{p}_a \cdot \overrightarrow{p}_b `$.
        self.e * other.e - self.momentum().dot(&other.momentum())
    }

    pub fn rapidity(&self) -> T {
        //! Rapidity along the beam axis, $` y = \frac{1}{2}\ln\frac{E + p_z}{E - p_z} `$.
        constant::<T>(0.5) * ((self.e + self.pz) / (self.e - self.pz)).ln()
    }

    pub fn costheta(&self) -> T {
        //! Cosine of the polar angle of the 3-momentum.
        self.pz / self.p()
    }

    pub fn phi(&self) -> T {
        //! Azimuthal angle of the 3-momentum in $` (-\pi, \pi] `$.
        self.py.atan2(self.px)
    }

    pub fn beta3(&self) -> Vector3<T> {
        //! Construct the 3-vector $\overrightarrow{\beta}$ where
        //!
        //! $` \overrightarrow{\beta} = \frac{\overrightarrow{p}}{E} `$
        self.momentum() / self.e
    }

    pub fn scale(&self, factor: T) -> Self {
        //! Multiply every component by `factor`.
        Self::new(
            self.e * factor,
            self.px * factor,
            self.py * factor,
            self.pz * factor,
        )
    }

    fn boost_with_sign(&self, frame: &Self, sign: T) -> Self {
        let mass = frame.m();
        let p = self.momentum();
        let b = frame.momentum();
        let e = (self.e * frame.e + sign * p.dot(&b)) / mass;
        let c = (self.e + e) / (mass + frame.e);
        Self::from_momentum(e, p + b * (sign * c))
    }

    pub fn boost_from_rest(&self, frame: &Self) -> Self {
        //! Interpret `self` as living in the rest frame of `frame` and boost it into the frame
        //! in which `frame` carries its actual momentum.
        //!
        //! For any time-like `k`, `FourMomentum::at_rest(k.m()).boost_from_rest(&k)` gives `k`
        //! back. This form avoids building the full boost matrix and stays accurate for
        //! nearly light-like frames.
        self.boost_with_sign(frame, T::one())
    }

    pub fn boost_to_rest(&self, frame: &Self) -> Self {
        //! Boosts an instance of [`FourMomentum`] into the rest frame of `frame`, the inverse
        //! of [`FourMomentum::boost_from_rest`].
        //!
        //! # Examples
        //! ```
        //! use phasespace::prelude::*;
        //!
        //! let vec_a: FourMomentum<f64> = FourMomentum::new(20.0, 1.0, 1.2, -3.4);
        //! let vec_a_com = vec_a.boost_to_rest(&vec_a);
        //! assert!((vec_a_com.e - vec_a.m()).abs() < 1e-12);
        //! assert!(vec_a_com.p() < 1e-12);
        //! ```
        self.boost_with_sign(frame, -T::one())
    }

    pub fn boost_beam(&self, rapidity: T) -> Self {
        //! Longitudinal boost along the beam ($z$) axis by `rapidity`. A negative rapidity
        //! undoes a positive one.
        let (sinh, cosh) = (rapidity.sinh(), rapidity.cosh());
        Self::new(
            self.e * cosh + self.pz * sinh,
            self.px,
            self.py,
            self.pz * cosh + self.e * sinh,
        )
    }

    pub fn rotate_zy(&self, phi: T, costheta: T) -> Self {
        //! Rotate the 3-momentum by $` R_z(\phi) R_y(\theta) `$.
        //!
        //! A vector along the $z$ axis with magnitude $|p|$ ends up at the spherical
        //! coordinates $` (|p| \sin\theta\cos\phi, |p| \sin\theta\sin\phi, |p| \cos\theta) `$.
        let sintheta = (T::one() - costheta * costheta).max(T::zero()).sqrt();
        let (sinphi, cosphi) = phi.sin_cos();
        Self::new(
            self.e,
            self.px * costheta * cosphi + self.pz * sintheta * cosphi - self.py * sinphi,
            self.px * costheta * sinphi + self.pz * sintheta * sinphi + self.py * cosphi,
            self.pz * costheta - self.px * sintheta,
        )
    }

    pub fn inverse_rotate_zy(&self, phi: T, costheta: T) -> Self {
        //! Undo [`FourMomentum::rotate_zy`], applying $` R_y(-\theta) R_z(-\phi) `$.
        let sintheta = (T::one() - costheta * costheta).max(T::zero()).sqrt();
        let (sinphi, cosphi) = phi.sin_cos();
        Self::new(
            self.e,
            self.px * costheta * cosphi + self.py * costheta * sinphi - self.pz * sintheta,
            self.py * cosphi - self.px * sinphi,
            self.pz * costheta + self.px * sintheta * cosphi + self.py * sintheta * sinphi,
        )
    }
}

impl<T: Real> From<FourMomentum<T>> for Array1<T> {
    fn from(val: FourMomentum<T>) -> Self {
        array![val.e, val.px, val.py, val.pz]
    }
}

impl<T: Real> From<Array1<T>> for FourMomentum<T> {
    fn from(value: Array1<T>) -> Self {
        Self {
            e: value[0],
            px: value[1],
            py: value[2],
            pz: value[3],
        }
    }
}

impl<T: Real> Add for FourMomentum<T> {
    type Output = FourMomentum<T>;
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            e: self.e + rhs.e,
            px: self.px + rhs.px,
            py: self.py + rhs.py,
            pz: self.pz + rhs.pz,
        }
    }
}

impl<'a, 'b, T: Real> Add<&'b FourMomentum<T>> for &'a FourMomentum<T> {
    type Output = FourMomentum<T>;
    fn add(self, rhs: &'b FourMomentum<T>) -> Self::Output {
        *self + *rhs
    }
}

impl<T: Real> Sub for FourMomentum<T> {
    type Output = FourMomentum<T>;
    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            e: self.e - rhs.e,
            px: self.px - rhs.px,
            py: self.py - rhs.py,
            pz: self.pz - rhs.pz,
        }
    }
}

impl<'a, 'b, T: Real> Sub<&'b FourMomentum<T>> for &'a FourMomentum<T> {
    type Output = FourMomentum<T>;
    fn sub(self, rhs: &'b FourMomentum<T>) -> Self::Output {
        *self - *rhs
    }
}

impl<T: Real> Neg for FourMomentum<T> {
    type Output = FourMomentum<T>;
    fn neg(self) -> Self::Output {
        Self::new(-self.e, -self.px, -self.py, -self.pz)
    }
}

impl<T: Real> Default for FourMomentum<T> {
    fn default() -> Self {
        Self {
            e: T::zero(),
            px: T::zero(),
            py: T::zero(),
            pz: T::zero(),
        }
    }
}

impl<T: Real> std::iter::Sum<FourMomentum<T>> for FourMomentum<T> {
    fn sum<I: Iterator<Item = FourMomentum<T>>>(iter: I) -> Self {
        iter.fold(FourMomentum::default(), |a, b| a + b)
    }
}

impl<'a, T: Real> std::iter::Sum<&'a FourMomentum<T>> for FourMomentum<T> {
    fn sum<I: Iterator<Item = &'a FourMomentum<T>>>(iter: I) -> Self {
        iter.fold(FourMomentum::default(), |a, b| a + *b)
    }
}
