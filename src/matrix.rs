use crate::Error;
use num_traits::Zero;

/// A symmetric matrix of pairwise communication volumes.
///
/// The order of the matrix is the number of *real* entities; the recursive
/// placement may work on problems larger than the matrix order when filler
/// slots pad the problem up to the topology's leaf capacity.  The diagonal is
/// not meaningful (self-communication is ignored by all algorithms).
#[derive(Clone, Debug)]
pub struct CommMatrix<W> {
    order: usize,
    values: Vec<W>,
}

impl<W> CommMatrix<W>
where
    W: Copy,
{
    /// The number of real entities.
    pub fn order(&self) -> usize {
        self.order
    }

    /// The communication volume between entities `i` and `j`.
    pub fn get(&self, i: usize, j: usize) -> W {
        self.values[i * self.order + j]
    }

    /// Build the sub-matrix indexed by `perm`, such that
    /// `sub.get(a, b) == self.get(perm[a], perm[b])`.
    pub(crate) fn extract(&self, perm: &[usize]) -> CommMatrix<W> {
        let order = perm.len();
        let mut values = Vec::with_capacity(order * order);
        for &i in perm {
            for &j in perm {
                values.push(self.get(i, j));
            }
        }
        CommMatrix { order, values }
    }
}

impl<W> CommMatrix<W>
where
    W: Copy + PartialOrd + Zero,
{
    /// Build a matrix from its rows.
    ///
    /// # Errors
    ///
    /// - [`Error::InputLenMismatch`] if a row does not have one entry per row,
    /// - [`Error::Asymmetric`] if `rows[i][j] != rows[j][i]` for some `i, j`,
    /// - [`Error::NegativeValues`] if any value is below zero.
    pub fn from_rows(rows: Vec<Vec<W>>) -> Result<Self, Error> {
        let order = rows.len();
        for row in &rows {
            if row.len() != order {
                return Err(Error::InputLenMismatch {
                    expected: order,
                    actual: row.len(),
                });
            }
        }
        let mut values = Vec::with_capacity(order * order);
        for row in &rows {
            values.extend_from_slice(row);
        }
        let matrix = CommMatrix { order, values };
        matrix.validate()?;
        Ok(matrix)
    }

    /// Build a matrix of the given order from a function over index pairs.
    ///
    /// The function is only called for `i <= j`; the lower triangle is
    /// mirrored so the result is symmetric by construction.
    pub fn from_fn(order: usize, mut f: impl FnMut(usize, usize) -> W) -> Result<Self, Error> {
        let mut values = vec![W::zero(); order * order];
        for i in 0..order {
            for j in i..order {
                let w = f(i, j);
                values[i * order + j] = w;
                values[j * order + i] = w;
            }
        }
        let matrix = CommMatrix { order, values };
        matrix.validate()?;
        Ok(matrix)
    }

    fn validate(&self) -> Result<(), Error> {
        for i in 0..self.order {
            for j in i..self.order {
                if self.get(i, j) < W::zero() {
                    return Err(Error::NegativeValues);
                }
                if self.get(i, j) != self.get(j, i) {
                    return Err(Error::Asymmetric { row: i, col: j });
                }
            }
        }
        Ok(())
    }
}
