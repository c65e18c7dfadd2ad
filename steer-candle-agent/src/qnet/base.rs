use super::{CriticLoss, Mlp, QNetConfig};
use crate::opt::Optimizer;
use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor, Var, D};
use candle_nn::{VarBuilder, VarMap};
use log::{info, trace};
use ndarray::Array2;
use std::{fs, path::Path};
use steer_core::{error::SteerError, Learner, ParamLayout};

const PARAMS_FILE: &str = "qnet.safetensors";

/// Q-network trained with importance-weighted regression.
pub struct QNet {
    config: QNetConfig,
    device: Device,
    varmap: VarMap,
    mlp: Mlp,
    opt: Optimizer,

    /// Variables sorted by name, the order of [`Learner::get_parameters`].
    vars: Vec<(String, Var)>,
}

fn sorted_vars(varmap: &VarMap) -> Result<Vec<(String, Var)>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| anyhow!("Variables of the Q-network are poisoned"))?;
    let mut vars = data
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<Vec<_>>();
    vars.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(vars)
}

/// See <https://pytorch.org/docs/stable/generated/torch.nn.SmoothL1Loss.html>.
fn smooth_l1(d: &Tensor) -> Result<Tensor> {
    let d = d.abs()?;
    let m1 = d.lt(1.0)?.to_dtype(DType::F32)?;
    let m2 = m1.affine(-1.0, 1.0)?;
    Ok(((m1 * d.sqr()?.affine(0.5, 0.0)?)? + (m2 * d.affine(1.0, -0.5)?)?)?)
}

impl QNet {
    /// Constructs a Q-network with freshly initialized parameters.
    pub fn build(config: QNetConfig) -> Result<Self> {
        let device = config.device.to_candle()?;
        let varmap = VarMap::new();
        let mlp = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Mlp::build(vb, config.in_dim, &config.units, config.out_dim, config.dueling)?
        };
        let vars = sorted_vars(&varmap)?;
        let opt = config
            .opt_config
            .build(vars.iter().map(|(_, v)| v.clone()).collect())?;
        info!(
            "Built Q-network: units = {:?}, dueling = {}, lr = {}",
            config.units,
            config.dueling,
            config.opt_config.lr()
        );
        trace!(
            "Q-network variables: {:?}",
            vars.iter().map(|(k, _)| k).collect::<Vec<_>>()
        );

        Ok(Self {
            config,
            device,
            varmap,
            mlp,
            opt,
            vars,
        })
    }

    /// Configuration.
    pub fn config(&self) -> &QNetConfig {
        &self.config
    }

    fn to_tensor(&self, obs: &Array2<f32>) -> Result<Tensor> {
        let (n, d) = obs.dim();
        if d != self.config.in_dim {
            return Err(SteerError::ShapeMismatch {
                what: "observation".into(),
                expected: self.config.in_dim,
                actual: d,
            }
            .into());
        }
        let data = obs.iter().copied().collect::<Vec<_>>();
        Ok(Tensor::from_vec(data, (n, d), &self.device)?)
    }

    fn penalty(&self) -> Result<Option<Tensor>> {
        if self.config.l2 <= 0.0 {
            return Ok(None);
        }
        let mut sum = Tensor::zeros((), DType::F32, &self.device)?;
        for (_, var) in self.vars.iter() {
            sum = (sum + var.as_tensor().sqr()?.sum_all()?)?;
        }
        Ok(Some(sum.affine(self.config.l2, 0.0)?))
    }
}

impl Learner for QNet {
    type Params = Vec<Tensor>;

    fn obs_dim(&self) -> usize {
        self.config.in_dim
    }

    fn n_actions(&self) -> usize {
        self.config.out_dim
    }

    fn predict(&self, obs: &Array2<f32>) -> Result<Array2<f32>> {
        let xs = self.to_tensor(obs)?;
        let q = self.mlp.forward(&xs)?.detach();
        let (n, m) = q.dims2()?;
        let data = q.flatten_all()?.to_vec1::<f32>()?;
        Ok(Array2::from_shape_vec((n, m), data)?)
    }

    fn train_on_batch(
        &mut self,
        obs: &Array2<f32>,
        act: &[usize],
        target: &[f32],
        weight: &[f32],
    ) -> Result<f32> {
        let n = obs.nrows();
        for (what, len) in [("act", act.len()), ("target", target.len()), ("weight", weight.len())] {
            if len != n {
                return Err(SteerError::ShapeMismatch {
                    what: what.into(),
                    expected: n,
                    actual: len,
                }
                .into());
            }
        }
        if let Some(&a) = act.iter().find(|&&a| a >= self.config.out_dim) {
            return Err(SteerError::IndexOutOfRange {
                index: a,
                len: self.config.out_dim,
            }
            .into());
        }

        let xs = self.to_tensor(obs)?;
        let act = act.iter().map(|&a| a as u32).collect::<Vec<_>>();
        let act = Tensor::from_vec(act, (n, 1), &self.device)?;
        let tgt = Tensor::from_slice(target, (n,), &self.device)?;
        let w = Tensor::from_slice(weight, (n,), &self.device)?;

        let pred = self.mlp.forward(&xs)?.gather(&act, D::Minus1)?.squeeze(D::Minus1)?;
        let diff = (pred - tgt)?;
        let elementwise = match self.config.critic_loss {
            CriticLoss::Mse => diff.sqr()?,
            CriticLoss::SmoothL1 => smooth_l1(&diff)?,
        };
        let mut loss = (elementwise * w)?.mean_all()?;
        if let Some(penalty) = self.penalty()? {
            loss = (loss + penalty)?;
        }

        self.opt.backward_step(&loss)?;
        Ok(loss.to_vec0::<f32>()?)
    }

    fn param_layout(&self) -> ParamLayout {
        ParamLayout::new(
            self.vars
                .iter()
                .map(|(_, v)| v.as_tensor().dims().to_vec())
                .collect(),
        )
    }

    fn get_parameters(&self) -> Result<Self::Params> {
        self.vars
            .iter()
            .map(|(_, v)| Ok(v.as_tensor().detach().copy()?))
            .collect()
    }

    fn set_parameters(&mut self, params: &Self::Params) -> Result<()> {
        let layout = ParamLayout::new(params.iter().map(|t| t.dims().to_vec()).collect());
        self.param_layout().check_parity(&layout)?;
        for ((_, var), t) in self.vars.iter().zip(params.iter()) {
            var.set(&t.to_device(&self.device)?)?;
        }
        Ok(())
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        let path = path.join(PARAMS_FILE);
        self.varmap.save(&path)?;
        info!("Saved Q-network to {:?}", &path);
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        let path = path.join(PARAMS_FILE);
        self.varmap.load(&path)?;
        info!("Loaded Q-network from {:?}", &path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opt::OptimizerConfig;
    use ndarray::array;
    use tempdir::TempDir;

    fn qnet(dueling: bool) -> QNet {
        let config = QNetConfig::default()
            .in_dim(3)
            .units(vec![8, 8])
            .out_dim(4)
            .dueling(dueling)
            .opt_config(OptimizerConfig::Adam { lr: 1e-2 });
        QNet::build(config).unwrap()
    }

    fn obs() -> Array2<f32> {
        array![[0.1, 0.2, 0.3], [1.0, -1.0, 0.5]]
    }

    #[test]
    fn test_predict_shape() -> Result<()> {
        for dueling in [false, true] {
            let q = qnet(dueling).predict(&obs())?;
            assert_eq!(q.dim(), (2, 4));
            assert!(q.iter().all(|v| v.is_finite()));
        }
        assert!(qnet(false).predict(&array![[0.0, 1.0]]).is_err());
        Ok(())
    }

    #[test]
    fn test_param_layout() {
        let layout = qnet(false).param_layout();
        // mlp.ln0, mlp.ln1 and mlp.out, each with bias and weight
        assert_eq!(layout.shapes().len(), 6);
        assert_eq!(layout.n_elements(), (3 * 8 + 8) + (8 * 8 + 8) + (8 * 4 + 4));
        assert!(layout.check_parity(&qnet(false).param_layout()).is_ok());
        assert!(layout.check_parity(&qnet(true).param_layout()).is_err());
    }

    #[test]
    fn test_copy_parameters() -> Result<()> {
        let online = qnet(true);
        let mut target = qnet(true);
        assert_ne!(online.predict(&obs())?, target.predict(&obs())?);

        target.set_parameters(&online.get_parameters()?)?;
        assert_eq!(online.predict(&obs())?, target.predict(&obs())?);

        let err = qnet(false)
            .set_parameters(&online.get_parameters()?)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SteerError>(),
            Some(SteerError::ParamLayoutMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn test_copy_is_not_shared() -> Result<()> {
        let mut online = qnet(false);
        let mut target = qnet(false);
        target.set_parameters(&online.get_parameters()?)?;
        online.train_on_batch(&obs(), &[0, 3], &[1.0, -1.0], &[1.0, 1.0])?;
        assert_ne!(online.predict(&obs())?, target.predict(&obs())?);
        Ok(())
    }

    #[test]
    fn test_train_reduces_loss() -> Result<()> {
        for critic_loss in [CriticLoss::Mse, CriticLoss::SmoothL1] {
            let config = QNetConfig::default()
                .in_dim(3)
                .units(vec![16])
                .out_dim(4)
                .critic_loss(critic_loss)
                .l2(1e-4)
                .opt_config(OptimizerConfig::Adam { lr: 1e-2 });
            let mut qnet = QNet::build(config)?;
            let first = qnet.train_on_batch(&obs(), &[1, 2], &[2.0, -3.0], &[1.0, 0.5])?;
            let mut last = first;
            for _ in 0..200 {
                last = qnet.train_on_batch(&obs(), &[1, 2], &[2.0, -3.0], &[1.0, 0.5])?;
            }
            assert!(last < first, "{:?}: {} -> {}", critic_loss, first, last);
        }
        Ok(())
    }

    #[test]
    fn test_train_rejects_bad_input() {
        let mut qnet = qnet(false);
        assert!(qnet.train_on_batch(&obs(), &[0], &[1.0, 1.0], &[1.0, 1.0]).is_err());
        assert!(qnet.train_on_batch(&obs(), &[0, 4], &[1.0, 1.0], &[1.0, 1.0]).is_err());
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new("qnet")?;
        let online = qnet(false);
        online.save_params(dir.path())?;

        let mut other = qnet(false);
        other.load_params(dir.path())?;
        assert_eq!(online.predict(&obs())?, other.predict(&obs())?);
        Ok(())
    }
}
