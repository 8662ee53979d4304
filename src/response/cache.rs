use crate::error::ResponseError;
use ndarray::prelude::*;
use std::collections::HashMap;

/// A cache for the products of the response operators with the trial vectors.
/// Within one solve the trial space only grows, so the products of earlier trial
/// vectors are kept and the products of new trial vectors are appended as columns.
#[derive(Clone, Debug, Default)]
pub struct ProductCache {
    products: HashMap<&'static str, Array2<f64>>,
}

impl ProductCache {
    /// A new product cache with an empty dictionary is created.
    pub fn new() -> Self {
        Self {
            products: HashMap::new(),
        }
    }

    /// New products are added to the cache and all products with this key are returned.
    pub fn add(
        &mut self,
        key: &'static str,
        value: Array2<f64>,
    ) -> Result<ArrayView2<f64>, ResponseError> {
        // If the key is not yet in the HashMap the key-value pair is inserted. Otherwise
        // the array is stacked as new columns to the old values.
        let products: &mut Array2<f64> = self
            .products
            .entry(key)
            .or_insert_with(|| Array2::zeros([value.nrows(), 0]));
        let n_rows: usize = products.nrows();
        products.append(Axis(1), value.view()).map_err(|_| {
            ResponseError::shape(
                "ProductCache::add",
                format!("{} products have {} rows, expected {}", key, value.nrows(), n_rows),
            )
        })?;
        Ok(products.view())
    }

    /// All products that are stored under this key.
    pub fn get(&self, key: &'static str) -> Option<ArrayView2<f64>> {
        self.products.get(key).map(|p| p.view())
    }
}
