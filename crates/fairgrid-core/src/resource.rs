//! Resource vector arithmetic.
//!
//! A [`Resource`] is a plain value: every operation returns a new vector.
//! Components are signed so intermediate results such as
//! `fair_share - usage` can go negative before being clamped.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Memory (MB) and virtual cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Resource {
    pub memory_mb: i64,
    pub vcores: i64,
}

impl Resource {
    /// The zero vector.
    pub const NONE: Resource = Resource::new(0, 0);

    /// Larger than any real cluster; used for "no limit" max shares.
    pub const UNBOUNDED: Resource = Resource::new(i64::MAX, i64::MAX);

    pub const fn new(memory_mb: i64, vcores: i64) -> Self {
        Self { memory_mb, vcores }
    }

    pub const fn none() -> Self {
        Self::NONE
    }

    pub const fn unbounded() -> Self {
        Self::UNBOUNDED
    }

    /// True when both components are exactly zero.
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Componentwise `self <= other`.
    pub fn fits_in(&self, other: &Resource) -> bool {
        self.memory_mb <= other.memory_mb && self.vcores <= other.vcores
    }

    /// True when any component is strictly positive.
    pub fn any_positive(&self) -> bool {
        self.memory_mb > 0 || self.vcores > 0
    }

    pub fn component_min(&self, other: &Resource) -> Resource {
        Resource::new(
            self.memory_mb.min(other.memory_mb),
            self.vcores.min(other.vcores),
        )
    }

    pub fn component_max(&self, other: &Resource) -> Resource {
        Resource::new(
            self.memory_mb.max(other.memory_mb),
            self.vcores.max(other.vcores),
        )
    }

    /// Negative components become zero.
    pub fn clamp_non_negative(&self) -> Resource {
        self.component_max(&Resource::NONE)
    }

    /// Scale by a fraction, truncating toward zero.
    pub fn multiply(&self, by: f64) -> Resource {
        Resource::new(
            (self.memory_mb as f64 * by) as i64,
            (self.vcores as f64 * by) as i64,
        )
    }

    /// Scale by a container count.
    pub fn times(&self, count: u32) -> Resource {
        let count = i64::from(count);
        Resource::new(
            self.memory_mb.saturating_mul(count),
            self.vcores.saturating_mul(count),
        )
    }
}

impl Add for Resource {
    type Output = Resource;

    fn add(self, rhs: Resource) -> Resource {
        Resource::new(
            self.memory_mb.saturating_add(rhs.memory_mb),
            self.vcores.saturating_add(rhs.vcores),
        )
    }
}

impl Sub for Resource {
    type Output = Resource;

    fn sub(self, rhs: Resource) -> Resource {
        Resource::new(
            self.memory_mb.saturating_sub(rhs.memory_mb),
            self.vcores.saturating_sub(rhs.vcores),
        )
    }
}

impl AddAssign for Resource {
    fn add_assign(&mut self, rhs: Resource) {
        *self = *self + rhs;
    }
}

impl SubAssign for Resource {
    fn sub_assign(&mut self, rhs: Resource) {
        *self = *self - rhs;
    }
}

impl Sum for Resource {
    fn sum<I: Iterator<Item = Resource>>(iter: I) -> Resource {
        iter.fold(Resource::NONE, Add::add)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<memory:{}, vCores:{}>", self.memory_mb, self.vcores)
    }
}

/// Per-resource-type weights of a schedulable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceWeights {
    pub memory: f64,
    pub vcores: f64,
}

impl ResourceWeights {
    pub const fn uniform(weight: f64) -> Self {
        Self {
            memory: weight,
            vcores: weight,
        }
    }
}

impl Default for ResourceWeights {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_in_is_componentwise() {
        let small = Resource::new(1024, 1);
        let wide = Resource::new(512, 8);

        assert!(small.fits_in(&Resource::new(1024, 1)));
        assert!(!small.fits_in(&wide)); // Memory too large.
        assert!(!wide.fits_in(&small)); // Cores too large.
        assert!(small.fits_in(&Resource::UNBOUNDED));
    }

    #[test]
    fn subtraction_can_go_negative_and_clamps() {
        let diff = Resource::new(1024, 1) - Resource::new(2048, 0);
        assert_eq!(diff, Resource::new(-1024, 1));
        assert_eq!(diff.clamp_non_negative(), Resource::new(0, 1));
        assert!(diff.any_positive());
    }

    #[test]
    fn unbounded_survives_arithmetic() {
        let grown = Resource::UNBOUNDED + Resource::new(1, 1);
        assert_eq!(grown, Resource::UNBOUNDED);
        assert!(Resource::new(1 << 40, 1 << 20).fits_in(&(Resource::UNBOUNDED - Resource::new(10, 10))));
    }

    #[test]
    fn multiply_truncates() {
        assert_eq!(Resource::new(1000, 3).multiply(0.5), Resource::new(500, 1));
        assert_eq!(Resource::new(1024, 2).times(3), Resource::new(3072, 6));
    }

    #[test]
    fn sum_of_vectors() {
        let total: Resource = [Resource::new(1, 2), Resource::new(3, 4)].into_iter().sum();
        assert_eq!(total, Resource::new(4, 6));
        assert_eq!(format!("{total}"), "<memory:4, vCores:6>");
    }
}
