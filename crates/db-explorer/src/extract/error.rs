/// Failures while pulling structured content out of model text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("No JSON content found in response: {0:?}")]
    AllStrategiesFailed(Vec<String>),
}
