use crate::defaults::HARTREE_TO_EV;
use crate::response::{Excitation, ResponseFunctions, TargetMap, TransitionMoments};
use anyhow::{Context, Result};
use log::info;
use ndarray::prelude::*;
use ndarray_npy::{write_npy, NpzWriter};
use std::fs::{self, File};
use std::path::Path;

/// All solution vectors are stored in `solutions.npz`, one array per equation named
/// after the operator and the frequency.
pub fn write_solutions(out: &Path, solutions: &TargetMap<Array1<f64>>) -> Result<()> {
    fs::create_dir_all(out).with_context(|| format!("Unable to create {:?}", out))?;
    let path = out.join("solutions.npz");
    let file: File = File::create(&path).with_context(|| format!("Unable to create {:?}", path))?;
    let mut npz = NpzWriter::new(file);
    for (target, n) in solutions.iter() {
        npz.add_array(format!("{}_{}", target.op, target.freq()), n)
            .with_context(|| format!("Unable to write {} to {:?}", target, path))?;
    }
    npz.finish()
        .with_context(|| format!("Unable to write {:?}", path))?;
    Ok(())
}

/// Excitation energies and the excitation vectors (as columns) are stored as `.npy` files.
pub fn write_excitations(out: &Path, excitations: &[Excitation]) -> Result<()> {
    fs::create_dir_all(out).with_context(|| format!("Unable to create {:?}", out))?;
    let energies: Array1<f64> = excitations.iter().map(|(w, _)| *w).collect();
    let dim: usize = excitations.first().map(|(_, x)| x.len()).unwrap_or(0);
    let mut vectors: Array2<f64> = Array2::zeros((dim, excitations.len()));
    for (mut col, (_, x)) in vectors.axis_iter_mut(Axis(1)).zip(excitations.iter()) {
        col.assign(x);
    }
    write_npy(out.join("excitation_energies.npy"), &energies)
        .context("Unable to write the excitation energies")?;
    write_npy(out.join("excitation_vectors.npy"), &vectors)
        .context("Unable to write the excitation vectors")?;
    Ok(())
}

pub fn print_response_functions(lrs: &ResponseFunctions) {
    info!("{:^80}", "");
    info!("{: ^80}", "Linear response functions");
    info!("{:-^80}", "");
    for ((a, b, w), value) in lrs.iter() {
        info!("{: >30} {: >18.10}", format!("<<{};{}>>{:.4}", a, b, w), value);
    }
    info!("{:-^80}", "");
}

pub fn print_excitations(excitations: &[Excitation]) {
    info!("{:^80}", "");
    info!("{: ^80}", "Excitation energies");
    info!("{:-^80}", "");
    info!("{: >8} {: >18} {: >18}", "State", "Energy [Eh]", "Energy [eV]");
    for (k, (w, _)) in excitations.iter().enumerate() {
        info!("{: >8} {: >18.10} {: >18.10}", k + 1, w, w * HARTREE_TO_EV);
    }
    info!("{:-^80}", "");
}

pub fn print_transition_moments(moments: &TransitionMoments) {
    info!("{:^80}", "");
    info!("{: ^80}", "Transition moments");
    info!("{:-^80}", "");
    for ((op, k), value) in moments.iter() {
        info!("{: >8} {: >8} {: >18.10}", op, k + 1, value);
    }
    info!("{:-^80}", "");
}
