//! Lazily grown Pascal's triangle in arbitrary precision.
//!
//! Rows are truncated to the widest column requested so far. The dice-sum
//! formula only ever asks for `C(a, b)` with `min(b, a - b) < n`, so tall
//! rows stay narrow.

use num_bigint::BigUint;
use num_traits::{One, Zero};

#[derive(Debug, Clone, Default)]
pub struct BinomialTable {
    /// `rows[a][b] = C(a, b)` for `b <= min(a, width - 1)`.
    rows: Vec<Vec<BigUint>>,
    width: usize,
}

impl BinomialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `C(a, b)`, zero when `a < 0`, `b < 0` or `b > a`.
    pub fn get(&mut self, a: i64, b: i64) -> BigUint {
        if a < 0 || b < 0 || b > a {
            return BigUint::zero();
        }
        let b = b.min(a - b) as usize;
        let a = a as usize;
        if b >= self.width {
            self.widen(b + 1);
        }
        self.extend_to(a);
        self.rows[a][b].clone()
    }

    /// Number of rows computed so far.
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    fn widen(&mut self, width: usize) {
        tracing::trace!(from = self.width, to = width, "widening binomial table");
        let height = self.rows.len();
        self.rows.clear();
        self.width = width;
        if height > 0 {
            self.extend_to(height - 1);
        }
    }

    fn extend_to(&mut self, a: usize) {
        while self.rows.len() <= a {
            let n = self.rows.len();
            let len = n.min(self.width - 1) + 1;
            let mut row = Vec::with_capacity(len);
            row.push(BigUint::one());
            if let Some(prev) = self.rows.last() {
                for k in 1..len {
                    let value = match prev.get(k) {
                        Some(right) => &prev[k - 1] + right,
                        None => prev[k - 1].clone(),
                    };
                    row.push(value);
                }
            }
            self.rows.push(row);
        }
    }
}
