mod dispatch;
mod eval;

pub use dispatch::select_candidate;
pub use eval::{EvalResult, Evaluator};
