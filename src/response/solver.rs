/*!

# Linear Response Solver

Iterative subspace (Davidson type) solver for the paired linear response equations

  (E2 - w S2) N = V

and for the generalized eigenvalue problem E2 X = w S2 X. The electronic Hessian
`E2` and the metric `S2` are only accessed through their products with trial
vectors. Every trial vector is accompanied by its X/Y swapped partner, so the
projected problems keep the paired structure of the full problem.

*/

use crate::defaults::*;
use crate::error::ResponseError;
use crate::response::cache::ProductCache;
use crate::response::direct::{self, factorize_checked, fix_phase, solve_eigenproblem};
use crate::response::guess::{initial_excitations, initial_guess};
use crate::response::logging::{self, Observer};
use crate::response::trials::setup_trials;
use crate::response::{preconditioners, Excitation, PreconditionerMap, ResponseEngine, TargetMap};
use crate::utils::Timer;
use derive_builder::Builder;
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::prelude::*;
use ndarray_linalg::{Norm, Solve};
use ordered_float::OrderedFloat;

const E2_KEY: &str = "E2";
const S2_KEY: &str = "S2";

/// Options of the iterative response solvers.
#[derive(Builder)]
pub struct SolverOptions {
    /// Maximum number of subspace iterations.
    #[builder(default = "LR_MAX_ITER")]
    pub maxit: usize,
    /// All relative residual norms have to be below this value for convergence.
    #[builder(default = "LR_CONVERGENCE")]
    pub threshold: f64,
    /// Small entries of the orbital diagonal are replaced by this value.
    #[builder(default = "HESSIAN_DIAGONAL_SHIFT")]
    pub hessian_diagonal_shift: f64,
    /// Threshold for the removal of linear dependencies among new trial vectors.
    #[builder(default = "TRUNCATION_THRESHOLD")]
    pub truncation_threshold: f64,
    /// Receivers of the progress report.
    #[builder(setter(skip), default)]
    observers: Vec<Box<dyn Observer>>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            maxit: LR_MAX_ITER,
            threshold: LR_CONVERGENCE,
            hessian_diagonal_shift: HESSIAN_DIAGONAL_SHIFT,
            truncation_threshold: TRUNCATION_THRESHOLD,
            observers: Vec::new(),
        }
    }
}

impl SolverOptions {
    /// Attach a receiver for the progress report.
    pub fn attach(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn with_observer(mut self, observer: Box<dyn Observer>) -> Self {
        self.attach(observer);
        self
    }

    fn update(&mut self, text: &str) {
        for observer in self.observers.iter_mut() {
            observer.update(text);
        }
    }
}

/// Result of the iterative solver.
#[derive(Clone, Debug)]
pub struct ResponseSolution {
    /// Solution vectors of the linear response equations.
    pub solutions: TargetMap<Array1<f64>>,
    /// Excitation energies and vectors, in ascending order.
    pub excitations: Vec<Excitation>,
    /// Relative residual norms of the linear response equations.
    pub residual_norms: TargetMap<f64>,
    /// Relative residual norms of the excitations.
    pub excitation_residual_norms: Vec<f64>,
    /// Number of performed iterations.
    pub iterations: usize,
    pub converged: bool,
}

/// Linear response functions `<<A;B>>_w` keyed by `(A, B, w)`.
pub type ResponseFunctions = IndexMap<(String, String, OrderedFloat<f64>), f64>;

/// Transition moments `<0|A|k>` keyed by `(A, k)`.
pub type TransitionMoments = IndexMap<(String, usize), f64>;

/// Response solvers acting on a quantum chemistry backend.
pub struct ResponseSolver<'a, E: ResponseEngine + ?Sized> {
    engine: &'a mut E,
    pub options: SolverOptions,
}

impl<'a, E: ResponseEngine + ?Sized> ResponseSolver<'a, E> {
    pub fn new(engine: &'a mut E, options: SolverOptions) -> Self {
        Self { engine, options }
    }

    /// Preconditioned property gradients as initial guesses, see [initial_guess].
    pub fn initial_guess(
        &self,
        ops: &[&str],
        freqs: &[f64],
    ) -> Result<TargetMap<Array1<f64>>, ResponseError> {
        initial_guess(&*self.engine, ops, freqs, self.options.hessian_diagonal_shift)
    }

    /// Bare excitation vectors of the lowest diagonal excitation energies.
    pub fn initial_excitations(&self, n: usize) -> Vec<Excitation> {
        initial_excitations(&*self.engine, n)
    }

    /// Solve the linear response equations for all operators and frequencies and
    /// compute `roots` excitations in the same trial space.
    ///
    /// Reaching the maximum number of iterations is not an error, the current
    /// estimates are returned with `converged` set to false.
    pub fn lr_solve(
        &mut self,
        ops: &[&str],
        freqs: &[f64],
        roots: usize,
    ) -> Result<ResponseSolution, ResponseError> {
        let timer: Timer = Timer::start();
        let maxit: usize = self.options.maxit;
        let threshold: f64 = self.options.threshold;

        // The property gradients are the right-hand sides of the equations.
        let v1: IndexMap<&str, Array1<f64>> = ops
            .iter()
            .copied()
            .zip(self.engine.rhs(ops)?.into_iter())
            .collect();
        let ig: TargetMap<Array1<f64>> = self.initial_guess(ops, freqs)?;
        let ie: Vec<Excitation> = self.initial_excitations(roots);

        let mut b: Array2<f64> = setup_trials(
            &ig,
            &ie,
            None,
            None,
            true,
            self.options.truncation_threshold,
        )?;
        // If the set of trial vectors is empty the initial guesses are returned.
        if b.ncols() == 0 {
            return Ok(ResponseSolution {
                residual_norms: ig.keys().map(|t| (t.clone(), 0.0)).collect(),
                excitation_residual_norms: vec![0.0; ie.len()],
                solutions: ig,
                excitations: ie,
                iterations: 0,
                converged: true,
            });
        }

        // The products of the operators with the trial vectors are cached and only
        // computed for new trial vectors.
        let mut cache: ProductCache = ProductCache::new();
        self.products(&mut cache, b.view())?;

        let od: Array1<f64> = self.engine.orbital_diagonal(self.options.hessian_diagonal_shift);
        let sd: Array1<f64> = self.engine.overlap_diagonal();
        let td: PreconditionerMap = preconditioners(od.view(), sd.view(), freqs);

        let mut solutions: TargetMap<Array1<f64>> = TargetMap::new();
        let mut residuals: TargetMap<Array1<f64>> = TargetMap::new();
        let mut residual_norms: TargetMap<f64> = TargetMap::new();
        let mut excitations: Vec<Excitation> = Vec::with_capacity(roots);
        let mut exresiduals: Vec<Excitation> = Vec::with_capacity(roots);
        let mut excitation_residual_norms: Vec<f64> = Vec::with_capacity(roots);

        logging::print_lr_init(maxit, threshold, ig.len(), roots);
        self.options
            .update(&logging::progress_header(ig.keys(), roots));

        let mut converged: bool = false;
        let mut iterations: usize = 0;
        for i in 0..maxit {
            iterations = i + 1;
            let mut output: String = String::new();
            let e2b: ArrayView2<f64> = cached(&cache, E2_KEY)?;
            let s2b: ArrayView2<f64> = cached(&cache, S2_KEY)?;

            // 1. The reduced linear response equations are solved and the solutions are
            //    transformed back to the full space.
            for target in ig.keys() {
                let freq: f64 = target.freq();
                let v: &Array1<f64> = &v1[target.op.as_str()];
                let reduced_lhs: Array2<f64> = b.t().dot(&(&e2b - &(freq * &s2b)));
                let reduced_rhs: Array1<f64> = b.t().dot(v);
                let reduced_solution: Array1<f64> = factorize_checked(reduced_lhs.view())
                    .and_then(|lu| lu.solve(&reduced_rhs).map_err(|err| err.to_string()))
                    .map_err(|reason| ResponseError::SingularSystem {
                        op: target.op.clone(),
                        freq,
                        reason,
                    })?;
                let n: Array1<f64> = b.dot(&reduced_solution);

                // 2. The residual r = (E2 - w S2) N - V of the full space.
                let r: Array1<f64> =
                    e2b.dot(&reduced_solution) - freq * s2b.dot(&reduced_solution) - v;
                let nv: f64 = n.dot(v);
                let rn: f64 = r.norm_l2();
                let nn: f64 = n.norm_l2();
                output += &format!("{} {:.6} {:.5e} {:.5e}|", i + 1, -nv, rn, nn);
                logging::print_lr_residual(&target.to_string(), -nv, rn, nn);

                residual_norms.insert(target.clone(), relative_norm(rn, nn));
                residuals.insert(target.clone(), r);
                solutions.insert(target.clone(), n);
            }

            // 3. The reduced eigenvalue problem is solved.
            if roots > 0 {
                let reduced_ev: Vec<Excitation> =
                    solve_eigenproblem(roots, b.t().dot(&e2b).view(), b.t().dot(&s2b).view())?;
                excitations.clear();
                exresiduals.clear();
                excitation_residual_norms.clear();
                for (k, (w, reduced_x)) in reduced_ev.into_iter().enumerate() {
                    let r: Array1<f64> = (&e2b - &(w * &s2b)).dot(&reduced_x);
                    let mut x: Array1<f64> = b.dot(&reduced_x);
                    fix_phase(&mut x);
                    let rn: f64 = r.norm_l2();
                    let xn: f64 = x.norm_l2();
                    output += &format!("{} {:.6} {:.5e} {:.5e}|", i + 1, w, rn, xn);
                    logging::print_lr_residual(&format!("w_{}", k + 1), w, rn, xn);

                    excitation_residual_norms.push(relative_norm(rn, xn));
                    exresiduals.push((w, r));
                    excitations.push((w, x));
                }
            }

            self.options.update(&output);

            // 4. Convergence check, all equations and roots have to be converged.
            let all_norms = residual_norms
                .values()
                .chain(excitation_residual_norms.iter());
            let (n_cvd, n_lft): (usize, usize) = all_norms
                .clone()
                .fold((0, 0), |(c, l), &x| if x < threshold { (c + 1, l) } else { (c, l + 1) });
            let max_res: f64 = all_norms.copied().fold(0.0, f64::max);
            logging::print_lr_iteration(i, n_cvd, n_lft, b.ncols(), max_res);
            if n_lft == 0 {
                converged = true;
                break;
            }
            if i + 1 == maxit {
                break;
            }

            // 5. New trial vectors are formed from the preconditioned residuals and added to
            //    the trial space.
            let new_trials: Array2<f64> = setup_trials(
                &residuals,
                &exresiduals,
                Some(&td),
                Some(b.view()),
                true,
                self.options.truncation_threshold,
            )?;
            // Nothing left to add, the trial space cannot be improved any further.
            if new_trials.ncols() == 0 {
                break;
            }
            b.append(Axis(1), new_trials.view()).map_err(|_| {
                ResponseError::shape("lr_solve", "new trial vectors do not match the basis")
            })?;
            self.products(&mut cache, new_trials.view())?;
        }
        logging::print_lr_end(converged, &timer);

        Ok(ResponseSolution {
            solutions,
            excitations,
            residual_norms,
            excitation_residual_norms,
            iterations,
            converged,
        })
    }

    /// Only the excitations are computed.
    pub fn pp_solve(&mut self, roots: usize) -> Result<Vec<Excitation>, ResponseError> {
        Ok(self.lr_solve(&[], &[], roots)?.excitations)
    }

    /// Linear response functions `<<A;B>>_w = -V_A N_B(w)`.
    pub fn lr(
        &mut self,
        aops: &[&str],
        bops: &[&str],
        freqs: &[f64],
    ) -> Result<ResponseFunctions, ResponseError> {
        let v1: Vec<Array1<f64>> = self.engine.rhs(aops)?;
        let solution: ResponseSolution = self.lr_solve(bops, freqs, 0)?;
        Ok(response_functions(aops, &v1, &solution.solutions))
    }

    /// Transition moments `V_A X_k` of the lowest `roots` excitations.
    pub fn pp(&mut self, ops: &[&str], roots: usize) -> Result<TransitionMoments, ResponseError> {
        let v1: Vec<Array1<f64>> = self.engine.rhs(ops)?;
        let excitations: Vec<Excitation> = self.pp_solve(roots)?;
        Ok(transition_moments(ops, &v1, &excitations))
    }

    /// The lowest `n` excitation energies.
    pub fn excitation_energies(&mut self, n: usize) -> Result<Array1<f64>, ResponseError> {
        Ok(self.pp_solve(n)?.into_iter().map(|(w, _)| w).collect())
    }

    /// The excitation vectors of the lowest `n` excitations as columns.
    pub fn eigenvectors(&mut self, n: usize) -> Result<Array2<f64>, ResponseError> {
        let excitations: Vec<Excitation> = self.pp_solve(n)?;
        let mut x: Array2<f64> = Array2::zeros((self.engine.response_dim(), excitations.len()));
        for (mut col, (_, xk)) in x.axis_iter_mut(Axis(1)).zip(excitations.iter()) {
            col.assign(xk);
        }
        Ok(x)
    }

    /// Exact solutions from the full matrices, see [direct::direct_lr_solve].
    pub fn direct_lr_solver(
        &mut self,
        ops: &[&str],
        freqs: &[f64],
    ) -> Result<TargetMap<Array1<f64>>, ResponseError> {
        direct::direct_lr_solve(&mut *self.engine, ops, freqs)
    }

    /// Exact excitations from the full matrices, see [direct::direct_ev_solve].
    pub fn direct_ev_solver(&mut self, n_states: usize) -> Result<Vec<Excitation>, ResponseError> {
        direct::direct_ev_solve(&mut *self.engine, n_states)
    }

    /// The operators are applied to the new trial vectors and the products are
    /// appended to the cache.
    fn products(
        &mut self,
        cache: &mut ProductCache,
        new_trials: ArrayView2<f64>,
    ) -> Result<(), ResponseError> {
        let dim: usize = new_trials.nrows();
        let e2n: Array2<f64> = self.engine.e2n(new_trials);
        let s2n: Array2<f64> = self.engine.s2n(new_trials);
        for (name, m) in [("e2n", &e2n), ("s2n", &s2n)] {
            if m.dim() != new_trials.dim() {
                return Err(ResponseError::shape(
                    "products",
                    format!(
                        "{} returned shape {:?} for {} trial vectors of length {}",
                        name,
                        m.dim(),
                        new_trials.ncols(),
                        dim
                    ),
                ));
            }
        }
        cache.add(E2_KEY, e2n)?;
        cache.add(S2_KEY, s2n)?;
        Ok(())
    }
}

fn cached<'a>(
    cache: &'a ProductCache,
    key: &'static str,
) -> Result<ArrayView2<'a, f64>, ResponseError> {
    cache
        .get(key)
        .ok_or_else(|| ResponseError::shape("lr_solve", format!("no {} products cached", key)))
}

/// Contracts the property gradients `v1` of the operators `aops` with the solution
/// vectors.
pub fn response_functions(
    aops: &[&str],
    v1: &[Array1<f64>],
    solutions: &TargetMap<Array1<f64>>,
) -> ResponseFunctions {
    aops.iter()
        .zip(v1.iter())
        .cartesian_product(solutions.iter())
        .map(|((aop, va), (target, n))| {
            (
                (aop.to_string(), target.op.clone(), OrderedFloat(target.freq())),
                -va.dot(n),
            )
        })
        .collect()
}

/// Contracts the property gradients `v1` of the operators `ops` with the excitation
/// vectors.
pub fn transition_moments(
    ops: &[&str],
    v1: &[Array1<f64>],
    excitations: &[Excitation],
) -> TransitionMoments {
    ops.iter()
        .zip(v1.iter())
        .cartesian_product(excitations.iter().enumerate())
        .map(|((op, v), (k, (_, x)))| ((op.to_string(), k), v.dot(x)))
        .collect()
}

/// Residual norm relative to the norm of the solution. A vanishing solution with a
/// vanishing residual counts as converged.
fn relative_norm(rn: f64, nn: f64) -> f64 {
    if nn > 0.0 {
        rn / nn
    } else {
        rn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{h2, paired_model, resonant_model, CountingEngine};
    use crate::model::DenseModel;
    use crate::response::{Recorder, Target};
    use approx::{assert_relative_eq, AbsDiffEq};

    fn tight() -> SolverOptions {
        SolverOptionsBuilder::default()
            .threshold(1e-8)
            .build()
            .unwrap()
    }

    #[test]
    fn h2_static_response() {
        let mut model = h2();
        let mut solver = ResponseSolver::new(&mut model, SolverOptions::default());
        let solution = solver.lr_solve(&["z"], &[0.0], 0).unwrap();
        assert!(solution.converged);
        assert_eq!(solution.iterations, 1);
        assert!(solution.solutions[&Target::new("z", 0.0)]
            .abs_diff_eq(&array![0.82378017, -0.82378017], 1e-7));
    }

    #[test]
    fn h2_dynamic_response() {
        let mut model = h2();
        let mut solver = ResponseSolver::new(&mut model, SolverOptions::default());
        let solution = solver.lr_solve(&["x", "z"], &[0.5], 0).unwrap();
        assert!(solution.converged);
        assert!(solution.solutions[&Target::new("z", 0.5)]
            .abs_diff_eq(&array![1.91230027, -0.40322064], 1e-7));
        // A vanishing gradient gives a vanishing response.
        assert!(solution.solutions[&Target::new("x", 0.5)]
            .abs_diff_eq(&Array1::<f64>::zeros(2), 1e-12));
    }

    #[test]
    fn h2_response_functions() {
        let mut model = h2();
        let mut solver = ResponseSolver::new(&mut model, SolverOptions::default());
        let lrs: ResponseFunctions = solver.lr(&["z"], &["z"], &[0.0, 0.5]).unwrap();
        assert_eq!(lrs.len(), 2);
        let key = |w: f64| ("z".to_string(), "z".to_string(), OrderedFloat(w));
        assert_relative_eq!(lrs[&key(0.0)], -3.066295447276, epsilon = 1e-6);
        assert_relative_eq!(lrs[&key(0.5)], -4.309445328973, epsilon = 1e-6);
    }

    #[test]
    fn h2_excitation() {
        let mut model = h2();
        let mut solver = ResponseSolver::new(&mut model, SolverOptions::default());
        let energies: Array1<f64> = solver.excitation_energies(1).unwrap();
        assert_eq!(energies.len(), 1);
        assert_relative_eq!(energies[0], 0.93093411, epsilon = 1e-7);

        let x: Array2<f64> = solver.eigenvectors(1).unwrap();
        assert_eq!(x.dim(), (2, 1));
        assert!(x
            .column(0)
            .abs_diff_eq(&array![0.7104169615, 0.0685000673], 1e-6));
    }

    #[test]
    fn h2_transition_moment() {
        let mut model = h2();
        let mut solver = ResponseSolver::new(&mut model, SolverOptions::default());
        let moments: TransitionMoments = solver.pp(&["x", "z"], 1).unwrap();
        assert_eq!(moments.len(), 2);
        assert_relative_eq!(moments[&("x".to_string(), 0)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(moments[&("z".to_string(), 0)], 1.1946797, epsilon = 1e-6);
    }

    #[test]
    fn progress_lines_are_reported() {
        let recorder = Recorder::new();
        let options = SolverOptions::default().with_observer(Box::new(recorder.clone()));
        let mut model = h2();
        let mut solver = ResponseSolver::new(&mut model, options);
        let solution = solver.lr_solve(&["z"], &[0.0], 0).unwrap();

        let lines: Vec<String> = recorder.lines();
        assert_eq!(lines.len(), 1 + solution.iterations);
        assert_eq!(lines[0], "it  <<z;z>>0     rn      nn");
        assert!(lines[1].starts_with("1 -3.066295 "));
        assert!(lines[1].ends_with('|'));
    }

    #[test]
    fn zero_gradient_needs_no_products() {
        let mut engine = CountingEngine::new(paired_model(2, 3));
        let solution = ResponseSolver::new(&mut engine, SolverOptions::default())
            .lr_solve(&["zero"], &[0.0, 0.3], 0)
            .unwrap();
        assert!(solution.converged);
        assert_eq!(solution.iterations, 0);
        for n in solution.solutions.values() {
            assert_eq!(n.len(), 12);
            assert!(n.iter().all(|&v| v == 0.0));
        }
        assert_eq!(engine.e2n_calls, 0);
        assert_eq!(engine.s2n_calls, 0);
    }

    #[test]
    fn only_new_trial_vectors_are_multiplied() {
        let mut engine = CountingEngine::new(paired_model(2, 3));
        let solution = ResponseSolver::new(&mut engine, tight())
            .lr_solve(&["x", "z"], &[0.3], 0)
            .unwrap();
        assert!(solution.converged);
        assert!(solution.iterations > 1);
        // One product call for the initial trial vectors and one per extension.
        assert_eq!(engine.e2n_calls, solution.iterations);
        assert_eq!(engine.s2n_calls, solution.iterations);
    }

    #[test]
    fn singular_reduced_system_is_reported() {
        let mut model: DenseModel = resonant_model(0.5);
        let mut solver = ResponseSolver::new(&mut model, SolverOptions::default());
        assert!(matches!(
            solver.lr_solve(&["z"], &[0.5], 0),
            Err(ResponseError::SingularSystem { .. })
        ));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let mut model = h2();
        let mut solver = ResponseSolver::new(&mut model, SolverOptions::default());
        assert!(matches!(
            solver.lr_solve(&["q"], &[0.0], 0),
            Err(ResponseError::UnknownOperator(_))
        ));
    }

    #[test]
    fn iterative_response_agrees_with_direct() {
        let ops: [&str; 3] = ["x", "y", "z"];
        let freqs: [f64; 3] = [0.0, 0.2, 0.45];
        let mut model: DenseModel = paired_model(2, 3);
        let mut solver = ResponseSolver::new(&mut model, tight());
        let direct: TargetMap<Array1<f64>> = solver.direct_lr_solver(&ops, &freqs).unwrap();
        let solution: ResponseSolution = solver.lr_solve(&ops, &freqs, 0).unwrap();

        assert!(solution.converged);
        assert_eq!(solution.solutions.len(), 9);
        for (target, n) in solution.solutions.iter() {
            assert!(n.abs_diff_eq(&direct[target], 1e-6), "{}", target);
            assert!(solution.residual_norms[target] < 1e-8);
        }
    }

    #[test]
    fn iterative_excitations_agree_with_direct() {
        let mut model: DenseModel = paired_model(2, 3);
        let mut solver = ResponseSolver::new(&mut model, tight());
        let direct: Vec<Excitation> = solver.direct_ev_solver(3).unwrap();
        let solution: ResponseSolution = solver.lr_solve(&[], &[], 3).unwrap();

        assert!(solution.converged);
        assert_eq!(solution.excitations.len(), 3);
        for ((w, x), (w_ref, x_ref)) in solution.excitations.iter().zip(direct.iter()) {
            assert_relative_eq!(*w, *w_ref, epsilon = 1e-7);
            assert!(x.abs_diff_eq(x_ref, 1e-5));
        }
    }

    #[test]
    fn iteration_limit_is_not_an_error() {
        let mut model: DenseModel = paired_model(2, 3);
        let options = SolverOptionsBuilder::default()
            .maxit(1_usize)
            .threshold(1e-14)
            .build()
            .unwrap();
        let solution = ResponseSolver::new(&mut model, options)
            .lr_solve(&["z"], &[0.3], 0)
            .unwrap();
        assert!(!solution.converged);
        assert_eq!(solution.iterations, 1);
        assert!(solution.residual_norms[&Target::new("z", 0.3)] > 1e-14);
    }
}
