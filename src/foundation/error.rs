pub type ReelResult<T> = Result<T, ReelError>;

#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("asset error: {0}")]
    Asset(String),

    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("no renderable segments for '{0}'")]
    NoSegments(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error("{variant} video failed at stage '{stage}': {source}")]
    Stage {
        variant: String,
        stage: &'static str,
        #[source]
        source: Box<ReelError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset(msg.into())
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Attach the variant and pipeline stage a failure happened in.
    pub fn at_stage(self, variant: impl Into<String>, stage: &'static str) -> Self {
        Self::Stage {
            variant: variant.into(),
            stage,
            source: Box::new(self),
        }
    }
}

/// A non-fatal problem with one script line, collected instead of aborting the batch.
#[derive(Clone, Debug, PartialEq)]
pub struct LineIssue {
    pub index: usize,
    pub stage: &'static str,
    pub message: String,
}

impl std::fmt::Display for LineIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {} ({}): {}", self.index, self.stage, self.message)
    }
}

/// Output of a per-line batch stage together with the lines it had to skip.
#[derive(Clone, Debug)]
pub struct Batch<T> {
    pub output: T,
    pub issues: Vec<LineIssue>,
}

impl<T> Batch<T> {
    pub fn new(output: T) -> Self {
        Self {
            output,
            issues: Vec::new(),
        }
    }

    pub fn skip(&mut self, index: usize, stage: &'static str, message: impl Into<String>) {
        self.issues.push(LineIssue {
            index,
            stage,
            message: message.into(),
        });
    }
}
