use crate::defaults::*;
use crate::error::ResponseError;
use crate::response::{SolverOptions, SolverOptionsBuilder};
use serde::{Deserialize, Serialize};

fn default_verbose() -> i8 {
    0
}
fn default_jobtype() -> String {
    String::from(JOBTYPE)
}
fn default_tmpdir() -> String {
    String::from(TMPDIR)
}
fn default_ops() -> Vec<String> {
    vec![String::from("x"), String::from("y"), String::from("z")]
}
fn default_freqs() -> Vec<f64> {
    vec![0.0]
}
fn default_roots() -> usize {
    0
}
fn default_maxit() -> usize {
    LR_MAX_ITER
}
fn default_threshold() -> f64 {
    LR_CONVERGENCE
}
fn default_hessian_diagonal_shift() -> f64 {
    HESSIAN_DIAGONAL_SHIFT
}
fn default_truncation_threshold() -> f64 {
    TRUNCATION_THRESHOLD
}

/// Job types that the command line program knows.
pub const JOBTYPES: [&str; 4] = ["lr", "pp", "direct_lr", "direct_pp"];

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    #[serde(default = "default_verbose")]
    pub verbose: i8,
    #[serde(default = "default_jobtype")]
    pub jobtype: String,
    #[serde(default = "default_tmpdir")]
    pub tmpdir: String,
    // Files of the quantum chemistry backend. They are passed on but not read here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xyz: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inp: Option<String>,
    /// Directory for the solution vectors and excitations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out: Option<String>,
    /// File of the dense model, if it is not given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub response: ResponseConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            verbose: default_verbose(),
            jobtype: default_jobtype(),
            tmpdir: default_tmpdir(),
            basis: None,
            xyz: None,
            inp: None,
            out: None,
            model: None,
            response: ResponseConfig::default(),
        }
    }
}

impl Configuration {
    /// Checks the values that serde cannot check.
    pub fn check(&self) -> Result<(), ResponseError> {
        if !JOBTYPES.contains(&self.jobtype.as_str()) {
            return Err(ResponseError::Config(format!(
                "jobtype {} is not available, choose one of: {}",
                self.jobtype,
                JOBTYPES.join(", ")
            )));
        }
        self.response.check()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ResponseConfig {
    #[serde(default = "default_ops")]
    pub ops: Vec<String>,
    #[serde(default = "default_freqs")]
    pub freqs: Vec<f64>,
    #[serde(default = "default_roots")]
    pub roots: usize,
    #[serde(default = "default_maxit")]
    pub maxit: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_hessian_diagonal_shift")]
    pub hessian_diagonal_shift: f64,
    #[serde(default = "default_truncation_threshold")]
    pub truncation_threshold: f64,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            ops: default_ops(),
            freqs: default_freqs(),
            roots: default_roots(),
            maxit: default_maxit(),
            threshold: default_threshold(),
            hessian_diagonal_shift: default_hessian_diagonal_shift(),
            truncation_threshold: default_truncation_threshold(),
        }
    }
}

impl ResponseConfig {
    pub fn ops(&self) -> Vec<&str> {
        self.ops.iter().map(|op| op.as_str()).collect()
    }

    fn check(&self) -> Result<(), ResponseError> {
        if let Some(w) = self.freqs.iter().find(|w| !w.is_finite()) {
            return Err(ResponseError::Config(format!("frequency {} is not finite", w)));
        }
        if !(self.threshold > 0.0) {
            return Err(ResponseError::Config(format!(
                "threshold has to be positive, got {}",
                self.threshold
            )));
        }
        if self.hessian_diagonal_shift < 0.0 || self.truncation_threshold < 0.0 {
            return Err(ResponseError::Config(
                "hessian_diagonal_shift and truncation_threshold must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&ResponseConfig> for SolverOptions {
    fn from(config: &ResponseConfig) -> Self {
        let mut options: SolverOptions = SolverOptions::default();
        options.maxit = config.maxit;
        options.threshold = config.threshold;
        options.hessian_diagonal_shift = config.hessian_diagonal_shift;
        options.truncation_threshold = config.truncation_threshold;
        options
    }
}

impl From<&ResponseConfig> for SolverOptionsBuilder {
    fn from(config: &ResponseConfig) -> Self {
        let mut builder: SolverOptionsBuilder = SolverOptionsBuilder::default();
        builder
            .maxit(config.maxit)
            .threshold(config.threshold)
            .hessian_diagonal_shift(config.hessian_diagonal_shift)
            .truncation_threshold(config.truncation_threshold);
        builder
    }
}
