// RESPONSE VECTORS
// norms below this value are treated as zero (gradients, trial vectors, frequencies)
pub const SMALL: f64 = 1.0e-10;
// eigenvalues of the trial overlap matrix below this value (relative to the
// column norm) are removed from the trial space
pub const TRUNCATION_THRESHOLD: f64 = 1.0e-10;

// LINEAR RESPONSE ITERATIONS
// stop the subspace iterations after maxit iterations
pub const LR_MAX_ITER: usize = 25;
// convergence threshold for the relative residual norms
pub const LR_CONVERGENCE: f64 = 1.0e-5;
// entries of the orbital hessian diagonal smaller than this value are
// replaced by it before they are used as a preconditioner
pub const HESSIAN_DIAGONAL_SHIFT: f64 = 1.0e-4;

// JOB SPECIFICATION
pub const JOBTYPE: &str = "lr";
// config file
pub const CONFIG_FILE_NAME: &str = "linresp.toml";
// scratch directory handed to the quantum chemistry backend
pub const TMPDIR: &str = "/tmp";

// conversion of excitation energies for the output
pub const HARTREE_TO_EV: f64 = 27.211396132;
