//! Observables - the raw model and trajectory state monitors read
//!
//! The training loop fills in whatever it can cheaply extract each step.
//! Every field is optional; a monitor whose observable is missing degrades
//! to its fallback instead of failing.

use serde::{Deserialize, Serialize};

/// Kind of observable a monitor declares it needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservableKind {
    /// Flattened gradient tensors
    Gradients,
    /// Square recurrent weight or Jacobian matrix
    RecurrentMatrix,
    /// Output/action/attention distribution (or logits)
    OutputDistribution,
    /// Parameter deltas applied this step
    ParameterDeltas,
    /// Sequence of hidden-state vectors
    HiddenTrajectory,
    /// Externally supplied scalar in [0, 1]
    ExternalFeedback,
}

impl std::fmt::Display for ObservableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ObservableKind::Gradients => "gradients",
            ObservableKind::RecurrentMatrix => "recurrent_matrix",
            ObservableKind::OutputDistribution => "output_distribution",
            ObservableKind::ParameterDeltas => "parameter_deltas",
            ObservableKind::HiddenTrajectory => "hidden_trajectory",
            ObservableKind::ExternalFeedback => "external_feedback",
        };
        f.write_str(name)
    }
}

/// Model-side observables for one step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelState {
    /// Gradient tensors, one flattened vector per parameter group
    pub gradients: Option<Vec<Vec<f64>>>,
    /// Row-major square matrix for spectral stability
    pub recurrent_matrix: Option<Vec<Vec<f64>>>,
    /// Output distribution (probabilities or logits)
    pub output_distribution: Option<Vec<f64>>,
    /// Flattened parameter update applied this step
    pub parameter_deltas: Option<Vec<f64>>,
}

impl ModelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one flattened gradient tensor
    pub fn with_gradient_tensor(mut self, tensor: Vec<f64>) -> Self {
        self.gradients.get_or_insert_with(Vec::new).push(tensor);
        self
    }

    pub fn with_recurrent_matrix(mut self, matrix: Vec<Vec<f64>>) -> Self {
        self.recurrent_matrix = Some(matrix);
        self
    }

    pub fn with_output_distribution(mut self, distribution: Vec<f64>) -> Self {
        self.output_distribution = Some(distribution);
        self
    }

    pub fn with_parameter_deltas(mut self, deltas: Vec<f64>) -> Self {
        self.parameter_deltas = Some(deltas);
        self
    }
}

/// Trajectory-side observables for one step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trajectory {
    /// Hidden states in time order
    pub hidden_states: Option<Vec<Vec<f64>>>,
    /// Optional human/BCI feedback
    pub external_feedback: Option<f64>,
    /// Normalized task performance, forwarded as `R_task`
    pub task_score: Option<f64>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hidden_states(mut self, states: Vec<Vec<f64>>) -> Self {
        self.hidden_states = Some(states);
        self
    }

    pub fn with_external_feedback(mut self, feedback: f64) -> Self {
        self.external_feedback = Some(feedback);
        self
    }

    pub fn with_task_score(mut self, score: f64) -> Self {
        self.task_score = Some(score);
        self
    }
}
