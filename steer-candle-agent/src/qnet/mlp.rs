//! Multilayer perceptron with an optional dueling head.
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};

enum Head {
    Plain(Linear),
    Dueling { value: Linear, advantage: Linear },
}

/// Multilayer perceptron with ReLU activation function.
///
/// With the dueling head, the last hidden layer feeds a state value `V(s)` and
/// advantages `A(s, a)`, combined as `V(s) + A(s, a) - mean_a A(s, a)`.
pub struct Mlp {
    hidden: Vec<Linear>,
    head: Head,
}

impl Mlp {
    /// Creates the layers under the prefix `mlp`.
    pub fn build(vs: VarBuilder, in_dim: usize, units: &[usize], out_dim: usize, dueling: bool) -> Result<Self> {
        let vs = vs.pp("mlp");
        let mut hidden = Vec::with_capacity(units.len());
        let mut d = in_dim;
        for (i, &u) in units.iter().enumerate() {
            hidden.push(linear(d, u, vs.pp(format!("ln{}", i)))?);
            d = u;
        }

        let head = match dueling {
            false => Head::Plain(linear(d, out_dim, vs.pp("out"))?),
            true => Head::Dueling {
                value: linear(d, 1, vs.pp("value"))?,
                advantage: linear(d, out_dim, vs.pp("advantage"))?,
            },
        };

        Ok(Self { hidden, head })
    }

    /// Computes action values of a `(n, in_dim)` batch.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in self.hidden.iter() {
            xs = layer.forward(&xs)?.relu()?;
        }

        let q = match &self.head {
            Head::Plain(out) => out.forward(&xs)?,
            Head::Dueling { value, advantage } => {
                let v = value.forward(&xs)?;
                let a = advantage.forward(&xs)?;
                a.broadcast_sub(&a.mean_keepdim(1)?)?.broadcast_add(&v)?
            }
        };
        Ok(q)
    }
}
