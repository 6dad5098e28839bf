//! # 仿真管线
//!
//! 串起整个求解流程：
//!
//! ```text
//! Topology → 坐标分配 → 链构建 → 方程装配 → 积分 → 结果提取
//! ```
//!
//! 同步、单线程执行；每个阶段只读取上一阶段的输出。

use log::{debug, info};

use super::coordinates::assign_coordinates;
use super::dynamics::EquationsOfMotion;
use super::energy::total_energy;
use super::error::{Result, SimulationError, SimulationFailure};
use super::integrator::{integrate, CancelToken};
use super::kinematics::build_chain;
use super::model::Topology;
use super::trajectory::{extract, Trajectory};

/// 初始状态
#[derive(Debug, Clone, PartialEq)]
pub struct InitialState {
    pub q: Vec<f64>,
    pub u: Vec<f64>,
}

/// 一次仿真运行
///
/// 持有自己的拓扑拷贝，多个运行可以并发执行而不共享任何状态。
#[derive(Debug, Clone)]
pub struct Simulation {
    topology: Topology,
    initial: Option<InitialState>,
}

impl Simulation {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            initial: None,
        }
    }

    /// 指定初始状态；默认全零（静止、沿参考方向伸直）
    pub fn with_initial_state(mut self, q: Vec<f64>, u: Vec<f64>) -> Self {
        self.initial = Some(InitialState { q, u });
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// 初始状态向量 [q; u]
    fn initial_state(&self, dof: usize) -> Result<Vec<f64>> {
        let Some(initial) = &self.initial else {
            return Ok(vec![0.0; 2 * dof]);
        };

        if initial.q.len() != dof || initial.u.len() != dof {
            return Err(SimulationError::InvalidParameter(format!(
                "initial state needs {dof} coordinates and {dof} speeds, got {} and {}",
                initial.q.len(),
                initial.u.len()
            )));
        }
        if !initial.q.iter().chain(&initial.u).all(|v| v.is_finite()) {
            return Err(SimulationError::InvalidParameter(
                "initial state must be finite".to_string(),
            ));
        }

        Ok(initial.q.iter().chain(&initial.u).copied().collect())
    }

    /// 校验并装配运动方程
    pub fn assemble(&self) -> Result<EquationsOfMotion> {
        self.topology.validate()?;
        let coords = assign_coordinates(&self.topology)?;
        let chain = build_chain(&self.topology, &coords)?;
        let y0 = self.initial_state(coords.len())?;
        let (q0, _) = coords.split_state(&y0);
        let q0 = q0.to_vec();
        EquationsOfMotion::assemble(&self.topology, coords, chain, &q0)
    }

    pub fn run(&self) -> std::result::Result<Trajectory, SimulationFailure> {
        self.run_with_cancel(&CancelToken::never())
    }

    /// 运行仿真
    ///
    /// 成功时返回完整轨迹；失败时返回错误以及失败前的部分轨迹（装配失败没有部分轨迹）。
    pub fn run_with_cancel(
        &self,
        cancel: &CancelToken,
    ) -> std::result::Result<Trajectory, SimulationFailure> {
        let settings = *self.topology.settings();
        let eom = self.assemble()?;
        let y0 = self.initial_state(eom.dof())?;

        info!(
            "simulating {} joints: h = {}, T = {}, {} samples, {:?}",
            eom.dof(),
            settings.time_step,
            settings.duration,
            settings.sample_count(),
            settings.method
        );

        let coords = eom.coordinates();
        let samples = integrate(&eom, &y0, &settings, cancel).map_err(|failure| {
            SimulationFailure {
                error: failure.error,
                partial: Some(extract(coords, &failure.samples)),
            }
        })?;

        if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
            let (q0, u0) = coords.split_state(&first.state);
            let (q1, u1) = coords.split_state(&last.state);
            let e0 = total_energy(&eom, q0, u0);
            let e1 = total_energy(&eom, q1, u1);
            debug!("energy {e0:.6} J → {e1:.6} J (drift {:.3e})", e1 - e0);
        }

        let trajectory = extract(coords, &samples);
        info!("simulation finished: {} samples", trajectory.len());
        Ok(trajectory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demos::hinge_chain::create_hinge_chain;

    #[test]
    fn test_initial_state_length_checked() {
        let topology = create_hinge_chain(2, 1.0, 1.0).unwrap();
        let err = Simulation::new(topology)
            .with_initial_state(vec![0.1], vec![0.0, 0.0])
            .run()
            .unwrap_err();

        assert!(matches!(err.error, SimulationError::InvalidParameter(_)));
        assert!(err.partial.is_none());
    }

    #[test]
    fn test_cancelled_run_returns_partial() {
        let topology = create_hinge_chain(2, 1.0, 1.0).unwrap();
        let token = CancelToken::new();
        token.cancel();

        let failure = Simulation::new(topology)
            .run_with_cancel(&token)
            .unwrap_err();

        assert!(matches!(failure.error, SimulationError::Cancelled { .. }));
        let partial = failure.partial.unwrap();
        assert_eq!(partial.len(), 1);
        assert_eq!(partial.joints.len(), 2);
    }
}
