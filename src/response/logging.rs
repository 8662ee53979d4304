use crate::response::Target;
use crate::utils::Timer;
use log::{debug, info};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Receiver of the progress lines of the response solvers.
///
/// Reporting is best effort: implementations must not panic and have no way to
/// abort the solve.
pub trait Observer {
    fn update(&mut self, text: &str);
}

/// Writes every progress line to a stream. Write errors are ignored.
pub struct OutputStream<W: Write> {
    stream: W,
}

impl<W: Write> OutputStream<W> {
    pub fn new(stream: W) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> W {
        self.stream
    }
}

impl<W: Write> Observer for OutputStream<W> {
    fn update(&mut self, text: &str) {
        let _ = writeln!(self.stream, "{}", text);
    }
}

/// Forwards the progress lines to the logger.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn update(&mut self, text: &str) {
        info!("{}", text);
    }
}

/// Keeps all progress lines in memory. Clones share the same lines.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    lines: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl Observer for Recorder {
    fn update(&mut self, text: &str) {
        self.lines.borrow_mut().push(text.to_owned());
    }
}

/// Column labels of the progress report, one block per equation and per root.
pub fn progress_header<'a>(targets: impl Iterator<Item = &'a Target>, roots: usize) -> String {
    targets
        .map(|t| format!("it  {}     rn      nn", t))
        .chain((0..roots).map(|k| format!("it  w_{}     rn      nn", k + 1)))
        .collect::<Vec<String>>()
        .join("|")
}

pub fn print_lr_init(maxit: usize, threshold: f64, n_equations: usize, roots: usize) {
    info!("{:^80}", "");
    info!("{: ^80}", "Linear Response Solver");
    info!("{:-^80}", "");
    info!(
        "{: <25} {:4.2e}",
        "Converged when all relative residuals are below:", threshold
    );
    info!("{: <25} {}", "Maximum number of iterations:", maxit);
    info!("{: >4} {: <25}", n_equations, " Linear response equations.");
    if roots == 1 {
        info!("{: >4} {: <25}", roots, " Root will be computed.");
    } else {
        info!("{: >4} {: <25}", roots, " Roots will be computed.");
    }
    info!("{:-^75} ", "");
    info!(
        "{: <5}{: >14}{: >14}{: >14}{: >14}",
        "Iter.", "Conv.", "Left", "#subsp. Vec.", "Max. res."
    );
    info!("{:-^75} ", "");
}

pub fn print_lr_iteration(iter: usize, n_cvd: usize, n_lft: usize, nvec: usize, max_res: f64) {
    info!(
        "{: >5}{:>14}{:>14}{:>14}{:>14.4e}",
        iter + 1,
        n_cvd,
        n_lft,
        nvec,
        max_res
    );
}

pub fn print_lr_residual(label: &str, value: f64, rn: f64, nn: f64) {
    debug!(
        "{: <20} {:>18.10} rn: {:>12.5e} nn: {:>12.5e}",
        label, value, rn, nn
    );
}

pub fn print_lr_end(converged: bool, timer: &Timer) {
    info!("{:-^75} ", "");
    if converged {
        info!("Linear response solver converged")
    } else {
        info!("Linear response solver did not converge!")
    }
    info!("{}", timer);
    info!("{:-^80}", "");
    info!("{:^80}", "");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lists_equations_and_roots() {
        let targets: Vec<Target> = vec![Target::new("z", 0.0), Target::new("x", 0.5)];
        assert_eq!(
            progress_header(targets.iter(), 1),
            "it  <<z;z>>0     rn      nn|it  <<x;x>>0.5     rn      nn|it  w_1     rn      nn"
        );
    }

    #[test]
    fn output_stream_writes_lines() {
        let mut stream = OutputStream::new(Vec::<u8>::new());
        stream.update("first");
        stream.update("second");
        assert_eq!(String::from_utf8(stream.into_inner()).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn recorder_clones_share_lines() {
        let recorder = Recorder::new();
        let mut handle = recorder.clone();
        handle.update("line");
        assert_eq!(recorder.lines(), vec!["line".to_string()]);
    }
}
