// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`ResourceVector`] type and its element-wise operations.

use crate::VectorError;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

/// Unit count for a single resource class.
pub type Units = u32;

/// An ordered, fixed-width sequence of unit counts, one per resource class.
///
/// The width is fixed when the allocator is configured and every vector
/// handed to it must match. Vectors of different widths are never
/// comparable: [`fits_within`](Self::fits_within) returns `false` for them.
///
/// # Parsing
/// Accepts comma-separated counts, optionally wrapped in brackets:
/// `"10,5,7"`, `"10, 5, 7"`, `"[10, 5, 7]"`.
///
/// # Examples
/// ```
/// use resource_vector::ResourceVector;
///
/// let v: ResourceVector = "[3, 3, 2]".parse().unwrap();
/// assert_eq!(v.classes(), 3);
/// assert_eq!(v.to_string(), "[3, 3, 2]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ResourceVector {
    units: Vec<Units>,
}

impl ResourceVector {
    /// Creates a vector from per-class unit counts.
    pub fn new(units: Vec<Units>) -> Self {
        Self { units }
    }

    /// Creates the zero vector of the given width.
    pub fn zeros(classes: usize) -> Self {
        Self {
            units: vec![0; classes],
        }
    }

    /// Returns the number of resource classes (the vector width).
    pub fn classes(&self) -> usize {
        self.units.len()
    }

    /// Returns the count for class `k`, or `None` if out of bounds.
    pub fn get(&self, k: usize) -> Option<Units> {
        self.units.get(k).copied()
    }

    /// Iterates over the per-class counts.
    pub fn iter(&self) -> impl Iterator<Item = Units> + '_ {
        self.units.iter().copied()
    }

    /// Returns `true` if every class holds zero units.
    pub fn is_zero(&self) -> bool {
        self.units.iter().all(|&u| u == 0)
    }

    /// Sum of units across all classes.
    pub fn total(&self) -> u64 {
        self.units.iter().map(|&u| u64::from(u)).sum()
    }

    /// Returns `true` if both vectors have the same width.
    pub fn same_width(&self, other: &ResourceVector) -> bool {
        self.units.len() == other.units.len()
    }

    /// Component-wise `self[k] <= bound[k]` for every class `k`.
    pub fn fits_within(&self, bound: &ResourceVector) -> bool {
        self.same_width(bound) && self.units.iter().zip(&bound.units).all(|(a, b)| a <= b)
    }

    /// Component-wise `self + rhs`, or `None` if the widths differ or any
    /// class would overflow.
    pub fn checked_add(&self, rhs: &ResourceVector) -> Option<ResourceVector> {
        if !self.same_width(rhs) {
            return None;
        }
        self.units
            .iter()
            .zip(&rhs.units)
            .map(|(a, b)| a.checked_add(*b))
            .collect::<Option<Vec<_>>>()
            .map(Self::new)
    }

    /// Parses a comma-separated list of unit counts.
    pub fn parse(s: &str) -> Result<Self, VectorError> {
        let s = s.trim();
        let s = s
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(s)
            .trim();
        if s.is_empty() {
            return Err(VectorError::Empty);
        }

        let units = s
            .split(',')
            .enumerate()
            .map(|(index, part)| {
                let part = part.trim();
                part.parse::<Units>()
                    .map_err(|_| VectorError::InvalidComponent {
                        index,
                        component: part.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { units })
    }
}

impl From<Vec<Units>> for ResourceVector {
    fn from(units: Vec<Units>) -> Self {
        Self { units }
    }
}

impl<const N: usize> From<[Units; N]> for ResourceVector {
    fn from(units: [Units; N]) -> Self {
        Self {
            units: units.to_vec(),
        }
    }
}

impl FromStr for ResourceVector {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AddAssign<&ResourceVector> for ResourceVector {
    /// Component-wise `self += rhs`.
    fn add_assign(&mut self, rhs: &ResourceVector) {
        debug_assert!(self.same_width(rhs), "width mismatch in add: {self} + {rhs}");
        for (a, b) in self.units.iter_mut().zip(&rhs.units) {
            *a += b;
        }
    }
}

impl SubAssign<&ResourceVector> for ResourceVector {
    /// Component-wise `self -= rhs`.
    ///
    /// The caller must have established `rhs.fits_within(self)`; this is
    /// checked in debug builds only.
    fn sub_assign(&mut self, rhs: &ResourceVector) {
        debug_assert!(rhs.fits_within(self), "subtraction underflow: {self} - {rhs}");
        for (a, b) in self.units.iter_mut().zip(&rhs.units) {
            *a = a.saturating_sub(*b);
        }
    }
}

impl Add for &ResourceVector {
    type Output = ResourceVector;

    fn add(self, rhs: &ResourceVector) -> ResourceVector {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl Sub for &ResourceVector {
    type Output = ResourceVector;

    fn sub(self, rhs: &ResourceVector) -> ResourceVector {
        let mut out = self.clone();
        out -= rhs;
        out
    }
}

impl fmt::Display for ResourceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, u) in self.units.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{u}")?;
        }
        write!(f, "]")
    }
}
