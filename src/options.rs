use std::path::PathBuf;

use num_bigint::BigInt;
use num_traits::One;
use num_traits::Pow;

use crate::math::Rational;

/// Tunable parameters of the partitioner. The defaults mirror the production configuration of
/// the per-iteration partitioning mode.
#[derive(Debug, Clone)]
pub struct PartitionerOptions {
    /// Maximum number of nodes in the paving tree; splits stop once reached.
    pub max_nodes: u32,
    /// Maximum paving depth; deeper leaves are not split further.
    pub max_depth: u32,
    /// A value `k` such that a new bound must improve the old one by at least
    /// `1/k * max(min(upper - lower, |bound|), 1)` to be propagated. `0` demands exact
    /// improvement only.
    pub epsilon: u32,
    /// A value `k` such that one-sided bounds beyond `±10^k` are not propagated.
    pub max_bound: u32,
    /// A value `k` such that `1/k` is the precision used for root extraction.
    pub nth_root_precision: u32,
    /// Memory ceiling in megabytes. The engine does not meter allocations itself; the driver is
    /// expected to enforce this through the termination condition it passes to `step`.
    pub max_memory_mb: Option<u64>,
    /// Directory for auxiliary artifacts. Only reported; the caller decides what lives there.
    pub output_dir: Option<PathBuf>,
    /// The number of solver processes the coordinator keeps busy. The worker keeps roughly
    /// `1.2 * this + 2` sub-tasks alive before throttling.
    pub max_running_tasks: u32,
    /// Seed for the split-literal sampling RNG.
    pub rand_seed: u64,
    /// Emit tag-0 diagnostic lines on the coordinator channel.
    pub debug_messages: bool,
}

impl Default for PartitionerOptions {
    fn default() -> Self {
        PartitionerOptions {
            max_nodes: 32,
            max_depth: 128,
            epsilon: 20,
            max_bound: 10,
            nth_root_precision: 8192,
            max_memory_mb: None,
            output_dir: None,
            max_running_tasks: 32,
            rand_seed: 0,
            debug_messages: false,
        }
    }
}

impl PartitionerOptions {
    pub(crate) fn max_alive_tasks(&self) -> u32 {
        (self.max_running_tasks as f64 * 1.2) as u32 + 2
    }
}

/// Rational thresholds derived once from [`PartitionerOptions`].
#[derive(Debug, Clone)]
pub(crate) struct Numerics {
    /// `1/epsilon`, or `None` when only exact improvement counts.
    pub(crate) epsilon: Option<Rational>,
    /// `10^max_bound`.
    pub(crate) max_bound: Rational,
    /// `-10^max_bound`.
    pub(crate) minus_max_bound: Rational,
    /// Bounds on reals whose denominator exceeds this are relaxed.
    pub(crate) max_denominator: BigInt,
    /// Precision the relaxation rounds to.
    pub(crate) adjust_denominator: BigInt,
    /// `1/k` precision for root extraction.
    pub(crate) root_precision: u32,
    /// Intervals at most this wide are a last-resort split choice.
    pub(crate) small_value_threshold: Rational,
    /// Distance from the finite end when splitting a half-bounded interval.
    pub(crate) split_delta: Rational,
    /// Width stand-in for a half-bounded interval.
    pub(crate) unbounded_penalty: Rational,
    /// Width stand-in for a fully unbounded interval.
    pub(crate) unbounded_penalty_sq: Rational,
}

impl Numerics {
    pub(crate) fn from_options(options: &PartitionerOptions) -> Numerics {
        let ten = BigInt::from(10);
        let max_bound = Rational::from_integer((&ten).pow(options.max_bound));
        let epsilon = if options.epsilon == 0 {
            None
        } else {
            Some(Rational::new(BigInt::one(), BigInt::from(options.epsilon)))
        };
        Numerics {
            epsilon,
            minus_max_bound: -&max_bound,
            max_bound,
            max_denominator: (&ten).pow(15_u32),
            adjust_denominator: (&ten).pow(10_u32),
            root_precision: options.nth_root_precision.max(1),
            small_value_threshold: Rational::new(BigInt::one(), BigInt::from(4)),
            split_delta: Rational::from_integer(BigInt::from(128)),
            unbounded_penalty: Rational::from_integer(BigInt::from(1024)),
            unbounded_penalty_sq: Rational::from_integer(BigInt::from(1024 * 1024)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alive_task_ceiling_follows_the_running_task_budget() {
        let options = PartitionerOptions::default();
        assert_eq!(options.max_alive_tasks(), 40);
    }

    #[test]
    fn zero_epsilon_switches_to_exact_improvement() {
        let options = PartitionerOptions {
            epsilon: 0,
            ..Default::default()
        };
        assert!(Numerics::from_options(&options).epsilon.is_none());
    }
}
