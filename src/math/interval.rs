//! Interval arithmetic over arbitrary-precision rationals.
//!
//! Intervals carry open/closed flags on both endpoints and support unbounded sides. They are
//! temporary values: the paver stores bounds, not intervals, and materialises an interval only
//! while a definition is being propagated.

use num_bigint::BigInt;
use num_integer::Roots;
use num_traits::One;
use num_traits::Pow;
use num_traits::Signed;
use num_traits::Zero;

use super::Rational;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ArithError {
    #[error("division by an interval spanning zero")]
    DivisorSpansZero,
    #[error("even-degree root of an interval with a negative lower endpoint")]
    NegativeEvenRoot,
}

/// One side of an interval. A missing endpoint (`None` in [`Interval`]) denotes infinity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Endpoint {
    pub(crate) value: Rational,
    pub(crate) open: bool,
}

impl Endpoint {
    pub(crate) fn closed(value: Rational) -> Endpoint {
        Endpoint { value, open: false }
    }

    pub(crate) fn open(value: Rational) -> Endpoint {
        Endpoint { value, open: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Interval {
    /// `None` means the interval extends to negative infinity.
    pub(crate) lower: Option<Endpoint>,
    /// `None` means the interval extends to positive infinity.
    pub(crate) upper: Option<Endpoint>,
}

pub(crate) fn pow_rational(value: &Rational, degree: u32) -> Rational {
    Pow::pow(value.clone(), degree as i32)
}

impl Interval {
    pub(crate) fn unbounded() -> Interval {
        Interval::default()
    }

    pub(crate) fn point(value: Rational) -> Interval {
        Interval {
            lower: Some(Endpoint::closed(value.clone())),
            upper: Some(Endpoint::closed(value)),
        }
    }

    pub(crate) fn contains_zero(&self) -> bool {
        let below = match &self.lower {
            None => true,
            Some(e) => e.value.is_negative() || (e.value.is_zero() && !e.open),
        };
        let above = match &self.upper {
            None => true,
            Some(e) => e.value.is_positive() || (e.value.is_zero() && !e.open),
        };
        below && above
    }

    pub(crate) fn lower_is_negative(&self) -> bool {
        match &self.lower {
            None => true,
            Some(e) => e.value.is_negative(),
        }
    }

    pub(crate) fn neg(&self) -> Interval {
        Interval {
            lower: self.upper.as_ref().map(|e| Endpoint {
                value: -e.value.clone(),
                open: e.open,
            }),
            upper: self.lower.as_ref().map(|e| Endpoint {
                value: -e.value.clone(),
                open: e.open,
            }),
        }
    }

    pub(crate) fn add(&self, other: &Interval) -> Interval {
        let side = |a: &Option<Endpoint>, b: &Option<Endpoint>| match (a, b) {
            (Some(a), Some(b)) => Some(Endpoint {
                value: &a.value + &b.value,
                open: a.open || b.open,
            }),
            _ => None,
        };
        Interval {
            lower: side(&self.lower, &other.lower),
            upper: side(&self.upper, &other.upper),
        }
    }

    pub(crate) fn sub(&self, other: &Interval) -> Interval {
        self.add(&other.neg())
    }

    /// Multiply by a non-zero rational constant.
    pub(crate) fn scale(&self, factor: &Rational) -> Interval {
        if factor.is_zero() {
            return Interval::point(Rational::zero());
        }
        let scaled = |e: &Endpoint| Endpoint {
            value: &e.value * factor,
            open: e.open,
        };
        if factor.is_positive() {
            Interval {
                lower: self.lower.as_ref().map(scaled),
                upper: self.upper.as_ref().map(scaled),
            }
        } else {
            Interval {
                lower: self.upper.as_ref().map(scaled),
                upper: self.lower.as_ref().map(scaled),
            }
        }
    }

    pub(crate) fn mul(&self, other: &Interval) -> Interval {
        let corners = [
            corner_mul(&low_corner(self), &low_corner(other)),
            corner_mul(&low_corner(self), &high_corner(other)),
            corner_mul(&high_corner(self), &low_corner(other)),
            corner_mul(&high_corner(self), &high_corner(other)),
        ];
        Interval {
            lower: corner_to_lower(corner_min(&corners)),
            upper: corner_to_upper(corner_max(&corners)),
        }
    }

    /// Divide by an interval that does not span zero.
    pub(crate) fn div(&self, divisor: &Interval) -> Result<Interval, ArithError> {
        if divisor.contains_zero() {
            return Err(ArithError::DivisorSpansZero);
        }
        Ok(self.mul(&divisor.invert()))
    }

    /// The reciprocal of an interval not spanning zero.
    fn invert(&self) -> Interval {
        Interval {
            lower: invert_endpoint(&self.upper),
            upper: invert_endpoint(&self.lower),
        }
    }

    /// Raise to a positive integer power. Even degrees fold the sign: an interval spanning zero
    /// yields a zero lower bound rather than the symmetric hull.
    pub(crate) fn powi(&self, degree: u32) -> Interval {
        if degree == 1 {
            return self.clone();
        }
        let powered = |e: &Endpoint| Endpoint {
            value: pow_rational(&e.value, degree),
            open: e.open,
        };
        if degree % 2 == 1 {
            return Interval {
                lower: self.lower.as_ref().map(powered),
                upper: self.upper.as_ref().map(powered),
            };
        }
        if self.contains_zero() {
            let magnitude = |e: &Option<Endpoint>| {
                e.as_ref().map(|e| Endpoint {
                    value: pow_rational(&e.value.abs(), degree),
                    open: e.open,
                })
            };
            let upper = match (magnitude(&self.lower), magnitude(&self.upper)) {
                (Some(a), Some(b)) => Some(max_endpoint(a, b)),
                _ => None,
            };
            Interval {
                lower: Some(Endpoint::closed(Rational::zero())),
                upper,
            }
        } else if self.lower_is_negative() {
            // entirely non-positive: the magnitudes swap sides
            Interval {
                lower: self.upper.as_ref().map(powered),
                upper: self.lower.as_ref().map(powered),
            }
        } else {
            Interval {
                lower: self.lower.as_ref().map(powered),
                upper: self.upper.as_ref().map(powered),
            }
        }
    }

    /// Solve `x^degree = self` for `x`, to within `1/precision`.
    ///
    /// Even degrees require a non-negative lower endpoint and produce the symmetric hull of the
    /// two real root branches. Odd degrees are monotone. Inexact endpoints are widened outward
    /// and opened.
    pub(crate) fn nth_root(&self, degree: u32, precision: u32) -> Result<Interval, ArithError> {
        if degree == 1 {
            return Ok(self.clone());
        }
        if degree % 2 == 0 {
            if self.lower_is_negative() {
                return Err(ArithError::NegativeEvenRoot);
            }
            let Some(u) = &self.upper else {
                return Ok(Interval::unbounded());
            };
            let root = root_above(&u.value, degree, precision, u.open);
            return Ok(Interval {
                lower: Some(Endpoint {
                    value: -&root.value,
                    open: root.open,
                }),
                upper: Some(root),
            });
        }
        let lower = self
            .lower
            .as_ref()
            .map(|e| signed_root_below(&e.value, degree, precision, e.open));
        let upper = self
            .upper
            .as_ref()
            .map(|e| signed_root_above(&e.value, degree, precision, e.open));
        Ok(Interval { lower, upper })
    }
}

/// A corner value used while multiplying intervals: an endpoint or a signed infinity.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Corner {
    NegInf,
    Finite(Rational, bool),
    PosInf,
}

fn low_corner(interval: &Interval) -> Corner {
    match &interval.lower {
        None => Corner::NegInf,
        Some(e) => Corner::Finite(e.value.clone(), e.open),
    }
}

fn high_corner(interval: &Interval) -> Corner {
    match &interval.upper {
        None => Corner::PosInf,
        Some(e) => Corner::Finite(e.value.clone(), e.open),
    }
}

/// Product of two corners. An exactly attained zero absorbs everything, including infinities: if
/// one factor is pinned to zero the product is pinned to zero no matter how far the other side
/// reaches.
fn corner_mul(a: &Corner, b: &Corner) -> Corner {
    use Corner::*;

    if let Finite(value, false) = a {
        if value.is_zero() {
            return Finite(Rational::zero(), false);
        }
    }
    if let Finite(value, false) = b {
        if value.is_zero() {
            return Finite(Rational::zero(), false);
        }
    }

    match (a, b) {
        (Finite(va, oa), Finite(vb, ob)) => Finite(va * vb, *oa || *ob),
        (Finite(v, o), inf) | (inf, Finite(v, o)) => {
            if v.is_zero() {
                // open zero: the products approach zero from one side but never leave it behind
                Finite(Rational::zero(), *o)
            } else if (v.is_positive()) == (*inf == PosInf) {
                PosInf
            } else {
                NegInf
            }
        }
        (PosInf, PosInf) | (NegInf, NegInf) => PosInf,
        _ => NegInf,
    }
}

fn corner_min(corners: &[Corner; 4]) -> Corner {
    corners
        .iter()
        .cloned()
        .reduce(|best, next| pick(best, next, true))
        .unwrap()
}

fn corner_max(corners: &[Corner; 4]) -> Corner {
    corners
        .iter()
        .cloned()
        .reduce(|best, next| pick(best, next, false))
        .unwrap()
}

fn pick(a: Corner, b: Corner, minimum: bool) -> Corner {
    use Corner::*;
    match (&a, &b) {
        (NegInf, _) | (_, PosInf) => {
            if minimum {
                a
            } else {
                b
            }
        }
        (PosInf, _) | (_, NegInf) => {
            if minimum {
                b
            } else {
                a
            }
        }
        (Finite(va, oa), Finite(vb, ob)) => {
            if va == vb {
                // a closed corner wins: the extremum is attained
                Finite(va.clone(), *oa && *ob)
            } else if (va < vb) == minimum {
                a
            } else {
                b
            }
        }
    }
}

fn corner_to_lower(corner: Corner) -> Option<Endpoint> {
    match corner {
        Corner::Finite(value, open) => Some(Endpoint { value, open }),
        _ => None,
    }
}

fn corner_to_upper(corner: Corner) -> Option<Endpoint> {
    match corner {
        Corner::Finite(value, open) => Some(Endpoint { value, open }),
        _ => None,
    }
}

fn max_endpoint(a: Endpoint, b: Endpoint) -> Endpoint {
    if a.value == b.value {
        Endpoint {
            value: a.value,
            open: a.open && b.open,
        }
    } else if a.value > b.value {
        a
    } else {
        b
    }
}

fn invert_endpoint(endpoint: &Option<Endpoint>) -> Option<Endpoint> {
    match endpoint {
        None => Some(Endpoint::open(Rational::zero())),
        Some(e) if e.value.is_zero() => None,
        Some(e) => Some(Endpoint {
            value: e.value.recip(),
            open: e.open,
        }),
    }
}

/// Bracket the real `degree`-th root of a non-negative rational in a window of width
/// `1/precision`. Returns `(below, above, exact)` with `below <= root <= above`.
fn root_window(value: &Rational, degree: u32, precision: u32) -> (Rational, Rational, bool) {
    let scale = BigInt::from(precision.max(1));
    let scaled = value * Rational::from_integer((&scale).pow(degree));
    let floored = scaled.floor().to_integer();
    let root = floored.nth_root(degree);
    let below = Rational::new(root.clone(), scale.clone());
    let exact = pow_rational(&below, degree) == *value;
    let above = Rational::new(root + BigInt::one(), scale);
    (below, above, exact)
}

/// Upper endpoint of a root: widen outward unless the root is exactly rational.
fn root_above(value: &Rational, degree: u32, precision: u32, open: bool) -> Endpoint {
    let (below, above, exact) = root_window(value, degree, precision);
    if exact {
        Endpoint { value: below, open }
    } else {
        Endpoint::open(above)
    }
}

/// Lower endpoint of a root: widen outward unless the root is exactly rational.
fn root_below(value: &Rational, degree: u32, precision: u32, open: bool) -> Endpoint {
    let (below, _, exact) = root_window(value, degree, precision);
    Endpoint {
        value: below,
        open: if exact { open } else { true },
    }
}

fn signed_root_below(value: &Rational, degree: u32, precision: u32, open: bool) -> Endpoint {
    if value.is_negative() {
        let e = root_above(&-value, degree, precision, open);
        Endpoint {
            value: -e.value,
            open: e.open,
        }
    } else {
        root_below(value, degree, precision, open)
    }
}

fn signed_root_above(value: &Rational, degree: u32, precision: u32, open: bool) -> Endpoint {
    if value.is_negative() {
        let e = root_below(&-value, degree, precision, open);
        Endpoint {
            value: -e.value,
            open: e.open,
        }
    } else {
        root_above(value, degree, precision, open)
    }
}
