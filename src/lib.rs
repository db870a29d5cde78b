//! The partitioner worker of a distributed non-linear arithmetic SMT solver.
//!
//! Given a quantifier-free problem over mixed integer/rational variables, the worker subdivides
//! the search space into interval boxes: it tightens each box with interval constraint
//! propagation, exports the tightened box as a self-contained sub-task for a downstream solver,
//! and splits the box along the most promising variable. Coordinator verdicts prune the paving
//! tree, and the worker reports overall unsatisfiability once every box is closed.
//!
//! The crate is the engine only: SMT-LIB parsing, the downstream solvers and the coordinator
//! process are external collaborators speaking the line protocol in [`OutboundMessage`] /
//! [`InboundMessage`].
//!
//! ```no_run
//! use paver::{Partitioner, PartitionerOptions, Indefinite, StepResult};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut partitioner = Partitioner::with_stdio(PartitionerOptions::default())?;
//! let x = partitioner.mk_var(true);
//! let zero = paver::Rational::from_integer(0.into());
//! let lower = partitioner.mk_ineq_atom(x, zero, true, false);
//! partitioner.add_clause(&[lower]);
//!
//! let mut termination = Indefinite;
//! while partitioner.step(&mut termination)? == StepResult::TaskReady {
//!     // hand partitioner.task() to the coordinator
//! }
//! # Ok(())
//! # }
//! ```

#[doc(hidden)]
pub mod asserts;

pub mod containers;

mod engine;
mod error;
mod math;
mod options;
mod termination;

pub use crate::engine::atom::AtomId;
pub use crate::engine::context::Partitioner;
pub use crate::engine::context::Statistics;
pub use crate::engine::context::StepResult;
pub use crate::engine::definition::Power;
pub use crate::engine::protocol::ChannelTransport;
pub use crate::engine::protocol::InboundMessage;
pub use crate::engine::protocol::OutboundMessage;
pub use crate::engine::protocol::StdioTransport;
pub use crate::engine::protocol::Transport;
pub use crate::engine::task::Lit;
pub use crate::engine::task::LitKind;
pub use crate::engine::task::Task;
pub use crate::engine::variables::Var;
pub use crate::error::EngineError;
pub use crate::math::Rational;
pub use crate::options::PartitionerOptions;
pub use crate::termination::Cancellation;
pub use crate::termination::Indefinite;
pub use crate::termination::TerminationCondition;
pub use crate::termination::TimeBudget;
