// shape.rs — Tensor shape vectors with an explicit "unknown" dimension
//
// A `Shape` is the ordered list of dimensions flowing along an edge. Batch
// dimensions are never represented. `Dim::Unknown` marks a dimension that could
// not be resolved; it compares equal to any dimension and is absorbing under
// arithmetic, so a partially known shape never produces a false mismatch.
//
// Preconditions: none (value types only).
// Postconditions: none.
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Dimension ───────────────────────────────────────────────────────────────

/// A single tensor dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dim {
    Known(u64),
    Unknown,
}

impl Dim {
    pub fn known(self) -> Option<u64> {
        match self {
            Dim::Known(n) => Some(n),
            Dim::Unknown => None,
        }
    }

    /// Structural compatibility: equal when both are known, always compatible
    /// when either side is unknown.
    pub fn compatible(self, other: Dim) -> bool {
        match (self, other) {
            (Dim::Known(a), Dim::Known(b)) => a == b,
            _ => true,
        }
    }

    /// Whether this dimension is known to differ from `expected`.
    pub fn differs_from(self, expected: u64) -> bool {
        matches!(self, Dim::Known(n) if n != expected)
    }

    pub fn checked_mul(self, other: Dim) -> Option<Dim> {
        match (self, other) {
            (Dim::Known(a), Dim::Known(b)) => a.checked_mul(b).map(Dim::Known),
            _ => Some(Dim::Unknown),
        }
    }

    pub fn checked_add(self, other: Dim) -> Option<Dim> {
        match (self, other) {
            (Dim::Known(a), Dim::Known(b)) => a.checked_add(b).map(Dim::Known),
            _ => Some(Dim::Unknown),
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Known(n) => write!(f, "{}", n),
            Dim::Unknown => write!(f, "?"),
        }
    }
}

impl From<u64> for Dim {
    fn from(n: u64) -> Self {
        Dim::Known(n)
    }
}

// Unknown dims serialize as `null` so JSON consumers see `[1, null, 28]`.
impl Serialize for Dim {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Dim::Known(n) => serializer.serialize_u64(*n),
            Dim::Unknown => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Dim {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value: Option<u64> = Option::deserialize(deserializer)?;
        Ok(value.map_or(Dim::Unknown, Dim::Known))
    }
}

// ── Shape vector ────────────────────────────────────────────────────────────

/// Ordered tensor dimensions, e.g. `[1, 28, 28]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(pub Vec<Dim>);

impl Shape {
    pub fn new(dims: Vec<Dim>) -> Self {
        Shape(dims)
    }

    /// Build a fully known shape from concrete sizes.
    pub fn from_dims(dims: &[u64]) -> Self {
        Shape(dims.iter().copied().map(Dim::Known).collect())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[Dim] {
        &self.0
    }

    pub fn dim(&self, index: usize) -> Option<Dim> {
        self.0.get(index).copied()
    }

    pub fn last_dim(&self) -> Option<Dim> {
        self.0.last().copied()
    }

    pub fn is_fully_known(&self) -> bool {
        self.0.iter().all(|d| matches!(d, Dim::Known(_)))
    }

    /// Copy of this shape with the last dimension replaced. A rank-0 shape
    /// gains a single dimension.
    pub fn with_last_dim(&self, dim: Dim) -> Shape {
        let mut dims = self.0.clone();
        match dims.last_mut() {
            Some(last) => *last = dim,
            None => dims.push(dim),
        }
        Shape(dims)
    }

    /// Product of all dimensions. `None` on overflow.
    pub fn product(&self) -> Option<Dim> {
        self.0
            .iter()
            .try_fold(Dim::Known(1), |acc, &d| acc.checked_mul(d))
    }

    /// Dimension-wise compatibility (same rank, every dim compatible).
    pub fn compatible(&self, other: &Shape) -> bool {
        self.rank() == other.rank()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.compatible(*b))
    }

    /// Resolve a possibly negative axis index against this shape's rank.
    pub fn normalize_axis(&self, axis: i64) -> Option<usize> {
        let rank = self.rank() as i64;
        let idx = if axis < 0 { rank + axis } else { axis };
        if (0..rank).contains(&idx) {
            Some(idx as usize)
        } else {
            None
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

impl From<Vec<u64>> for Shape {
    fn from(dims: Vec<u64>) -> Self {
        Shape(dims.into_iter().map(Dim::Known).collect())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_known_and_unknown() {
        let s = Shape::new(vec![Dim::Known(1), Dim::Unknown, Dim::Known(28)]);
        assert_eq!(s.to_string(), "[1, ?, 28]");
        assert_eq!(Shape::default().to_string(), "[]");
    }

    #[test]
    fn product_of_mnist_image() {
        assert_eq!(
            Shape::from_dims(&[1, 28, 28]).product(),
            Some(Dim::Known(784))
        );
    }

    #[test]
    fn product_with_unknown_is_unknown() {
        let s = Shape::new(vec![Dim::Known(3), Dim::Unknown]);
        assert_eq!(s.product(), Some(Dim::Unknown));
    }

    #[test]
    fn product_overflow_is_none() {
        let s = Shape::from_dims(&[u64::MAX, 2]);
        assert_eq!(s.product(), None);
    }

    #[test]
    fn unknown_is_compatible_with_anything() {
        let a = Shape::new(vec![Dim::Known(4), Dim::Unknown]);
        let b = Shape::from_dims(&[4, 99]);
        assert!(a.compatible(&b));
        assert!(!a.compatible(&Shape::from_dims(&[5, 99])));
        assert!(!a.compatible(&Shape::from_dims(&[4])));
    }

    #[test]
    fn with_last_dim_replaces_trailing() {
        let s = Shape::from_dims(&[10, 784]).with_last_dim(Dim::Known(128));
        assert_eq!(s, Shape::from_dims(&[10, 128]));
    }

    #[test]
    fn normalize_negative_axis() {
        let s = Shape::from_dims(&[2, 3, 4]);
        assert_eq!(s.normalize_axis(-1), Some(2));
        assert_eq!(s.normalize_axis(0), Some(0));
        assert_eq!(s.normalize_axis(3), None);
        assert_eq!(s.normalize_axis(-4), None);
    }

    #[test]
    fn unknown_serializes_as_null() {
        let s = Shape::new(vec![Dim::Known(1), Dim::Unknown]);
        assert_eq!(serde_json::to_string(&s).unwrap(), "[1,null]");
        let back: Shape = serde_json::from_str("[1,null]").unwrap();
        assert_eq!(back, s);
    }
}
