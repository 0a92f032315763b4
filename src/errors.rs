use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoostError {
    #[error("X has {0} features, but the model was fitted with {1} features.")]
    FeatureMismatch(usize, usize),
    /// First value is what was checked, then the two disagreeing sizes.
    #[error("Shape mismatch for {0}: expected {1}, found {2}.")]
    ShapeMismatch(String, usize, usize),
    #[error("Evaluation set {0} is malformed: {1}")]
    InvalidEvalSet(usize, String),
    #[error("Unknown label type: {0}")]
    InvalidLabels(String),
    #[error("y has only {0} sample(s) in classifier training.")]
    TooFewSamples(usize),
    #[error("The model must be fitted before calling {0}.")]
    NotFitted(String),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    #[error("Invalid value {0} passed for {1}, expected one of {2}.")]
    ParseString(String, String, String),
    #[error("Unable to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Unable to (de)serialize: {0}")]
    Json(#[from] serde_json::Error),
}
