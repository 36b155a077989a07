//! Evaluation policy
//!
//! The numeric model behind an instance is pluggable. A policy is shared by
//! every session of a server, so it only ever sees one instance's data at a
//! time through a shared reference and must not keep per-instance state.

use super::InstanceData;
use crate::protocol::EvaluateInput;

/// "No constraint" answer to MaxStepSize: the largest finite f64
pub const NO_STEP_LIMIT: f64 = f64::MAX;

/// Computes outputs and timestep constraints for an instance
pub trait Evaluator: Send + Sync {
    /// Output value for Evaluate
    fn evaluate(&self, instance: &InstanceData, input: &EvaluateInput) -> f64;

    /// Suggested maximum timestep at `sim_time`
    fn max_step_size(&self, _instance: &InstanceData, _sim_time: f64) -> f64 {
        NO_STEP_LIMIT
    }

    /// Possibly shortened timestep; must not exceed `proposed_step`
    fn truncate(&self, _instance: &InstanceData, _input: &EvaluateInput, proposed_step: f64) -> f64 {
        proposed_step
    }
}

/// `output = input * gain` while enabled, `0.0` otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearGain;

impl Evaluator for LinearGain {
    fn evaluate(&self, instance: &InstanceData, input: &EvaluateInput) -> f64 {
        if input.enable > 0.0 {
            input.input * f64::from(instance.gain)
        } else {
            0.0
        }
    }
}
