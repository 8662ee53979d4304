use crate::error::ResponseError;
use crate::response::ResponseEngine;
use derive_builder::Builder;
use indexmap::IndexMap;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

#[cfg(test)]
pub(crate) mod fixtures;

/// Response backend that holds the electronic Hessian and the metric as dense
/// matrices. It is meant for small model systems and for testing, real quantum
/// chemistry programs implement [ResponseEngine] with integral driven products.
#[derive(Builder, Clone, Debug)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct DenseModel {
    /// Electronic Hessian `E2` in the doubled space.
    e2: Array2<f64>,
    /// Metric `S2`, by default the diagonal matrix of the overlap diagonal.
    #[builder(default = "self.default_s2()?")]
    s2: Array2<f64>,
    /// Diagonal orbital Hessian (orbital energy differences for X and Y).
    orbital_diagonal: Array1<f64>,
    /// Diagonal of the metric.
    overlap_diagonal: Array1<f64>,
    /// Property gradients by operator label.
    #[builder(default)]
    gradients: IndexMap<String, Array1<f64>>,
    /// Single excitations `(occupied, virtual)`.
    excitations: Vec<(usize, usize)>,
}

impl DenseModelBuilder {
    // Private helper method to build the metric from its diagonal.
    fn default_s2(&self) -> Result<Array2<f64>, String> {
        match &self.overlap_diagonal {
            Some(sd) => Ok(Array2::from_diag(sd)),
            None => Err("Overlap diagonal has to be initialized".to_string()),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let dim: usize = match &self.excitations {
            Some(excitations) => 2 * excitations.len(),
            None => return Err("Excitations have to be initialized".to_string()),
        };
        if let Some(e2) = &self.e2 {
            if e2.dim() != (dim, dim) {
                return Err(format!("E2 has shape {:?}, expected ({}, {})", e2.dim(), dim, dim));
            }
        }
        if let Some(s2) = &self.s2 {
            if s2.dim() != (dim, dim) {
                return Err(format!("S2 has shape {:?}, expected ({}, {})", s2.dim(), dim, dim));
            }
        }
        for (name, diag) in [
            ("orbital diagonal", &self.orbital_diagonal),
            ("overlap diagonal", &self.overlap_diagonal),
        ] {
            if let Some(diag) = diag {
                if diag.len() != dim {
                    return Err(format!("{} has length {}, expected {}", name, diag.len(), dim));
                }
            }
        }
        if let Some(gradients) = &self.gradients {
            for (op, grad) in gradients.iter() {
                if grad.len() != dim {
                    return Err(format!("gradient {} has length {}, expected {}", op, grad.len(), dim));
                }
            }
        }
        Ok(())
    }
}

impl DenseModel {
    /// Labels of all operators with a property gradient.
    pub fn operators(&self) -> Vec<&str> {
        self.gradients.keys().map(|k| k.as_str()).collect()
    }
}

impl ResponseEngine for DenseModel {
    fn orbital_diagonal(&self, shift: f64) -> Array1<f64> {
        self.orbital_diagonal
            .mapv(|x| if x.abs() < shift { shift } else { x })
    }

    fn overlap_diagonal(&self) -> Array1<f64> {
        self.overlap_diagonal.clone()
    }

    fn rhs(&self, ops: &[&str]) -> Result<Vec<Array1<f64>>, ResponseError> {
        ops.iter()
            .map(|op| {
                self.gradients
                    .get(*op)
                    .cloned()
                    .ok_or_else(|| ResponseError::UnknownOperator(op.to_string()))
            })
            .collect()
    }

    fn e2n(&mut self, b: ArrayView2<f64>) -> Array2<f64> {
        self.e2.dot(&b)
    }

    fn s2n(&mut self, b: ArrayView2<f64>) -> Array2<f64> {
        self.s2.dot(&b)
    }

    fn excitations(&self) -> Vec<(usize, usize)> {
        self.excitations.clone()
    }
}

/// Plain representation of a [DenseModel] as it is read from TOML or JSON files.
/// Matrices are given as lists of rows.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ModelInput {
    pub e2: Vec<Vec<f64>>,
    #[serde(default)]
    pub s2: Option<Vec<Vec<f64>>>,
    pub orbital_diagonal: Vec<f64>,
    pub overlap_diagonal: Vec<f64>,
    #[serde(default)]
    pub gradients: IndexMap<String, Vec<f64>>,
    pub excitations: Vec<(usize, usize)>,
}

fn rows_to_array(name: &str, rows: &[Vec<f64>]) -> Result<Array2<f64>, ResponseError> {
    let n_cols: usize = rows.first().map(|r| r.len()).unwrap_or(0);
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
        return Err(ResponseError::Config(format!(
            "row {} of {} has {} entries, expected {}",
            i,
            name,
            row.len(),
            n_cols
        )));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), n_cols), flat)
        .map_err(|_| ResponseError::Config(format!("{} is not a rectangular matrix", name)))
}

impl TryFrom<ModelInput> for DenseModel {
    type Error = ResponseError;

    fn try_from(input: ModelInput) -> Result<Self, Self::Error> {
        let mut builder = DenseModelBuilder::default();
        builder
            .e2(rows_to_array("e2", &input.e2)?)
            .orbital_diagonal(Array1::from(input.orbital_diagonal))
            .overlap_diagonal(Array1::from(input.overlap_diagonal))
            .gradients(
                input
                    .gradients
                    .into_iter()
                    .map(|(op, grad)| (op, Array1::from(grad)))
                    .collect(),
            )
            .excitations(input.excitations);
        if let Some(s2) = &input.s2 {
            builder.s2(rows_to_array("s2", s2)?);
        }
        builder
            .build()
            .map_err(|err| ResponseError::Config(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::h2;
    use approx::AbsDiffEq;

    #[test]
    fn h2_products() {
        let mut model = h2();
        let e2n: Array2<f64> = model.e2n(Array2::<f64>::eye(2).view());
        let expected: Array2<f64> = array![[1.89681370, -0.36242092], [-0.36242092, 1.89681370]];
        assert!(e2n.abs_diff_eq(&expected, 1e-8));
        let s2n: Array2<f64> = model.s2n(array![[1.0], [0.0]].view());
        assert!(s2n.abs_diff_eq(&array![[2.0], [0.0]], 1e-10));
    }

    #[test]
    fn h2_diagonals_and_gradients() {
        let model = h2();
        assert_eq!(model.response_dim(), 2);
        assert_eq!(model.orbital_diagonal(0.0), array![4.99878931, 4.99878931]);
        assert_eq!(model.overlap_diagonal(), array![2.0, -2.0]);
        let rhs: Vec<Array1<f64>> = model.rhs(&["x", "y", "z"]).unwrap();
        assert_eq!(rhs[0], array![0.0, 0.0]);
        assert_eq!(rhs[1], array![0.0, 0.0]);
        assert_eq!(rhs[2], array![1.86111268, -1.86111268]);
    }

    #[test]
    fn small_diagonal_entries_are_shifted() {
        let model = DenseModelBuilder::default()
            .e2(Array2::eye(2))
            .orbital_diagonal(array![0.0, 1.0])
            .overlap_diagonal(array![1.0, -1.0])
            .excitations(vec![(0, 1)])
            .build()
            .unwrap();
        assert_eq!(model.orbital_diagonal(1e-4), array![1e-4, 1.0]);
        // The metric is built from the overlap diagonal if it is not given.
        assert_eq!(model.s2, array![[1.0, 0.0], [0.0, -1.0]]);
    }

    #[test]
    fn inconsistent_dimensions_are_rejected() {
        let result = DenseModelBuilder::default()
            .e2(Array2::eye(4))
            .orbital_diagonal(array![1.0, 1.0])
            .overlap_diagonal(array![1.0, -1.0])
            .excitations(vec![(0, 1)])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn model_from_toml() {
        let input: ModelInput = toml::from_str(
            r#"
            e2 = [[1.89681370, -0.36242092], [-0.36242092, 1.89681370]]
            orbital_diagonal = [4.99878931, 4.99878931]
            overlap_diagonal = [2.0, -2.0]
            excitations = [[0, 1]]

            [gradients]
            z = [1.86111268, -1.86111268]
            "#,
        )
        .unwrap();
        let model: DenseModel = DenseModel::try_from(input).unwrap();
        assert_eq!(model.operators(), vec!["z"]);
        assert_eq!(model.s2, array![[2.0, 0.0], [0.0, -2.0]]);
    }

    #[test]
    fn ragged_matrix_is_rejected() {
        // Six entries fit a 3 x 2 shape, but the rows differ in length.
        let input: ModelInput = toml::from_str(
            r#"
            e2 = [[1.0, 0.0], [2.0, 3.0, 4.0], [5.0]]
            orbital_diagonal = [1.0, 1.0]
            overlap_diagonal = [1.0, -1.0]
            excitations = [[0, 1]]
            "#,
        )
        .unwrap();
        assert!(matches!(
            DenseModel::try_from(input),
            Err(ResponseError::Config(_))
        ));
        assert!(rows_to_array("e2", &[vec![1.0], vec![2.0, 3.0], vec![]]).is_err());
        assert_eq!(
            rows_to_array("e2", &[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap(),
            array![[1.0, 2.0], [3.0, 4.0]]
        );
    }

    #[test]
    fn unknown_model_keys_are_rejected() {
        let result: Result<ModelInput, _> = toml::from_str(
            r#"
            e2 = [[1.0]]
            orbital_diagonal = [1.0]
            overlap_diagonal = [1.0]
            excitations = []
            basis = "STO-3G"
            "#,
        );
        assert!(result.is_err());
    }
}
