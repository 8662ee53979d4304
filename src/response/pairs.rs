use crate::error::ResponseError;
use ndarray::prelude::*;
use ndarray::{concatenate, Data, Slice};

/// Swap the X and Y parts of a response vector, or of every column of a matrix of
/// response vectors. Only arrays of rank one or two with an even number of rows
/// are accepted.
pub fn swap<S, D>(xy: &ArrayBase<S, D>) -> Result<Array<f64, D>, ResponseError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if xy.ndim() == 0 || xy.ndim() > 2 {
        return Err(ResponseError::shape(
            "swap",
            format!("not implemented for arrays of rank {}", xy.ndim()),
        ));
    }
    let rows: usize = xy.len_of(Axis(0));
    if rows % 2 != 0 {
        return Err(ResponseError::shape(
            "swap",
            format!("odd number of rows ({})", rows),
        ));
    }
    let half_rows: usize = rows / 2;

    let mut yx: Array<f64, D> = xy.to_owned();
    yx.slice_axis_mut(Axis(0), Slice::from(..half_rows))
        .assign(&xy.slice_axis(Axis(0), Slice::from(half_rows..)));
    yx.slice_axis_mut(Axis(0), Slice::from(half_rows..))
        .assign(&xy.slice_axis(Axis(0), Slice::from(..half_rows)));
    Ok(yx)
}

/// Merge two sets of vectors by appending the columns of `b2` to `b1`.
pub fn bappend<'a>(
    b1: ArrayView2<'a, f64>,
    b2: ArrayView2<'a, f64>,
) -> Result<Array2<f64>, ResponseError> {
    concatenate(Axis(1), &[b1, b2]).map_err(|_| {
        ResponseError::shape(
            "bappend",
            format!("{} rows cannot be merged with {} rows", b1.nrows(), b2.nrows()),
        )
    })
}
