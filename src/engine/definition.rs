use std::fmt;

use num_traits::One;

use crate::engine::variables::Var;
use crate::math::Rational;

/// One factor `x^d` of a monomial. Degrees are at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Power {
    pub var: Var,
    pub degree: u32,
}

impl Power {
    pub fn new(var: Var, degree: u32) -> Power {
        Power { var, degree }
    }
}

/// The defining expression of an auxiliary variable. Definitions are propagated in both
/// directions: from the operands to the defined variable and back.
#[derive(Debug, Clone)]
pub(crate) enum Definition {
    Monomial(Monomial),
    Polynomial(Polynomial),
}

/// `x_1^{d_1} * ... * x_n^{d_n}`, factors sorted by variable.
#[derive(Debug, Clone)]
pub(crate) struct Monomial {
    powers: Vec<Power>,
}

impl Monomial {
    pub(crate) fn new(mut powers: Vec<Power>) -> Monomial {
        powers.sort_by_key(|p| p.var);
        Monomial { powers }
    }

    pub(crate) fn len(&self) -> usize {
        self.powers.len()
    }

    pub(crate) fn powers(&self) -> &[Power] {
        &self.powers
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.powers.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", p.var)?;
            if p.degree > 1 {
                write!(f, "^{}", p.degree)?;
            }
        }
        Ok(())
    }
}

/// `a_1 * x_1 + ... + a_n * x_n`, terms sorted by variable, coefficients non-zero.
#[derive(Debug, Clone)]
pub(crate) struct Polynomial {
    terms: Vec<(Rational, Var)>,
}

impl Polynomial {
    pub(crate) fn new(mut terms: Vec<(Rational, Var)>) -> Polynomial {
        terms.sort_by_key(|(_, x)| *x);
        Polynomial { terms }
    }

    pub(crate) fn len(&self) -> usize {
        self.terms.len()
    }

    pub(crate) fn terms(&self) -> &[(Rational, Var)] {
        &self.terms
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (a, x)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            if a.is_one() {
                write!(f, "{x}")?;
            } else {
                write!(f, "{a} {x}")?;
            }
        }
        Ok(())
    }
}
