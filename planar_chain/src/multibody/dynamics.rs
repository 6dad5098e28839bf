//! # 动力学模块
//!
//! 把串联链的运动学、质量属性和外加载荷装配成一阶常微分方程：
//!
//! ```text
//! q̇ = u
//! M(q) u̇ = Q(q, u)
//! ```
//!
//! 采用 Kane 方法的约化方式：刚体 k 对广义速度 r（r ≤ k）的偏运动是绕关节 r
//! 的单位转动，质量矩阵和广义力都是偏运动与惯性/外力的点积之和。
//! 没有符号代数，全部是显式的递推和闭式求和。

use bevy::math::DVec2;
use log::debug;

use super::coordinates::CoordinateMap;
use super::error::{Result, SimulationError};
use super::integrator::OdeSystem;
use super::kinematics::{forward_kinematics, ChainKinematics, ChainModel};
use super::model::{JointKind, Topology};
use super::planar_algebra::{inertia_mul_motion, PlanarForce, PlanarMotion};
use super::subtree_com::compute_subtree_com;
use super::velocity::compute_velocities;
use super::DOWN;

/// Cholesky 主元相对容差（相对于最大对角元）
const PIVOT_TOLERANCE: f64 = 1e-12;

/// 装配好的运动方程
///
/// 持有链模型、坐标映射以及按规范下标排列的外加力矩和阻尼，
/// 可以直接作为 [`OdeSystem`] 交给积分器。
#[derive(Debug, Clone)]
pub struct EquationsOfMotion {
    chain: ChainModel,
    coords: CoordinateMap,
    /// 作用在连杆 k 上的常值力矩（载荷 + 关节自身力矩）
    applied_torques: Vec<f64>,
    damping: Vec<f64>,
    /// 重力加速度大小，方向沿 `DOWN`
    gravity: f64,
}

impl EquationsOfMotion {
    /// 装配运动方程
    ///
    /// ## 错误
    /// - 存在非 Hinge 关节：[`SimulationError::UnsupportedJointKind`]
    /// - 载荷引用的关节不在关节列表中：[`SimulationError::TopologyMismatch`]
    /// - 初始构型下质量矩阵奇异：[`SimulationError::UnderdeterminedSystem`]
    pub fn assemble(
        topology: &Topology,
        coords: CoordinateMap,
        chain: ChainModel,
        initial_q: &[f64],
    ) -> Result<Self> {
        if let Some(joint) = topology
            .joints()
            .iter()
            .find(|joint| joint.kind != JointKind::Hinge)
        {
            return Err(SimulationError::UnsupportedJointKind {
                joint: joint.id,
                kind: joint.kind,
            });
        }

        let mut applied_torques: Vec<f64> = topology.joints().iter().map(|j| j.torque).collect();
        let damping: Vec<f64> = topology.joints().iter().map(|j| j.damping).collect();

        // 载荷按关节标识匹配
        for load in topology.loads() {
            let index = coords.index_of(load.joint).ok_or_else(|| {
                SimulationError::TopologyMismatch(format!(
                    "load references {}, which is not in the joint list",
                    load.joint
                ))
            })?;
            applied_torques[index] += load.torque;
        }

        let eom = Self {
            chain,
            coords,
            applied_torques,
            damping,
            gravity: topology.settings().gravity,
        };

        // 初始构型下质量矩阵必须可分解
        let mass_matrix = eom.mass_matrix(initial_q);
        cholesky(&mass_matrix, 0.0)?;

        debug!(
            "assembled {} dof chain: total mass {:.4} kg, applied torques {:?}, M(q0) diagonal {:?}",
            eom.dof(),
            eom.chain.total_mass(),
            eom.applied_torques,
            (0..eom.dof()).map(|i| mass_matrix[i][i]).collect::<Vec<_>>()
        );

        Ok(eom)
    }

    pub fn dof(&self) -> usize {
        self.coords.len()
    }

    pub fn chain(&self) -> &ChainModel {
        &self.chain
    }

    pub fn coordinates(&self) -> &CoordinateMap {
        &self.coords
    }

    pub fn gravity(&self) -> f64 {
        self.gravity
    }

    /// 前向运动学 + 速度传播
    pub fn kinematics(&self, q: &[f64], u: &[f64]) -> ChainKinematics {
        let mut kin = forward_kinematics(&self.chain, q);
        compute_velocities(&self.chain, &mut kin, u);
        kin
    }

    /// 计算质量矩阵 M(q)
    ///
    /// ## 公式
    ///
    /// ```text
    /// M[r][s] = Σ_{k ≥ max(r,s)} V_kʳ · (I_k V_kˢ)
    /// V_kʳ    = [1, ẑ × (c_k − p_r)]
    /// ```
    ///
    /// ## 性质
    /// - 对称: M[r][s] = M[s][r]
    /// - 正定: 每节连杆的转动惯量 > 0 即可保证
    /// - 配置相关: M = M(q)
    pub fn mass_matrix(&self, q: &[f64]) -> Vec<Vec<f64>> {
        let kin = forward_kinematics(&self.chain, q);
        self.mass_matrix_from(&kin)
    }

    fn mass_matrix_from(&self, kin: &ChainKinematics) -> Vec<Vec<f64>> {
        let n = self.dof();
        let mut m = vec![vec![0.0; n]; n];

        for (k, link) in self.chain.links.iter().enumerate() {
            let com = kin.bodies[k].com;
            let partials: Vec<PlanarMotion> = kin.points[..=k]
                .iter()
                .map(|joint| PlanarMotion::rotation_about(joint.position, com))
                .collect();

            for (s, partial_s) in partials.iter().enumerate() {
                let momentum = inertia_mul_motion(link.mass, link.inertia, partial_s);
                for (r, partial_r) in partials.iter().enumerate().take(s + 1) {
                    let m_rs = partial_r.dot(&momentum);
                    m[r][s] += m_rs;
                    if r != s {
                        m[s][r] += m_rs;
                    }
                }
            }
        }

        m
    }

    /// 计算广义力 Q(q, u)
    pub fn generalized_forces(&self, q: &[f64], u: &[f64]) -> Vec<f64> {
        let kin = self.kinematics(q, u);
        self.generalized_forces_from(&kin, u)
    }

    /// ## 组成
    ///
    /// ```text
    /// Q_r = (C_r − p_r) × (M_r g)                      重力，经子树质心
    ///     + Σ_{k ≥ r} V_kʳ · (τ_k − I_k A_k)           外加力矩与惯性偏置
    ///     − c_r u_r                                    关节阻尼
    /// ```
    ///
    /// A_k = [0, a_bias] 是广义加速度为零时质心的加速度（科里奥利/离心项）。
    /// 平面内没有陀螺力矩。
    fn generalized_forces_from(&self, kin: &ChainKinematics, u: &[f64]) -> Vec<f64> {
        let n = self.dof();
        let mut qfrc = vec![0.0; n];

        // ===== 1. 重力 =====
        let g = self.gravity * DOWN;
        for (r, subtree) in compute_subtree_com(&self.chain, kin).iter().enumerate() {
            let partial = PlanarMotion::rotation_about(kin.points[r].position, subtree.com);
            qfrc[r] += partial.dot(&PlanarForce::new(0.0, subtree.mass * g));
        }

        // ===== 2. 外加力矩 + 惯性偏置 =====
        // 载荷力矩作用在连杆 k 的坐标系上，对所有 r ≤ k 的偏角速度都为 1
        for (k, link) in self.chain.links.iter().enumerate() {
            let body = &kin.bodies[k];
            let bias = PlanarMotion::new(0.0, body.bias_acceleration);
            let wrench = PlanarForce::new(self.applied_torques[k], DVec2::ZERO)
                - inertia_mul_motion(link.mass, link.inertia, &bias);

            for (r, joint) in kin.points[..=k].iter().enumerate() {
                qfrc[r] += PlanarMotion::rotation_about(joint.position, body.com).dot(&wrench);
            }
        }

        // ===== 3. 阻尼 =====
        for ((q, c), ur) in qfrc.iter_mut().zip(&self.damping).zip(u) {
            *q -= c * ur;
        }

        qfrc
    }

    /// 计算广义加速度：u̇ = M⁻¹ Q
    pub fn accelerations(&self, q: &[f64], u: &[f64]) -> Result<Vec<f64>> {
        self.accelerations_at(q, u, 0.0)
    }

    fn accelerations_at(&self, q: &[f64], u: &[f64], time: f64) -> Result<Vec<f64>> {
        let kin = self.kinematics(q, u);
        let mass_matrix = self.mass_matrix_from(&kin);
        let qfrc = self.generalized_forces_from(&kin, u);

        let factor = cholesky(&mass_matrix, time)?;
        Ok(cholesky_solve(&factor, &qfrc))
    }
}

impl OdeSystem for EquationsOfMotion {
    fn dof(&self) -> usize {
        self.coords.len()
    }

    /// 方程右端：y = [q; u] → [q̇; u̇]
    fn derivative(&self, t: f64, y: &[f64], dydt: &mut [f64]) -> Result<()> {
        if !y.iter().all(|v| v.is_finite()) {
            return Err(SimulationError::IntegrationDiverged { time: t, step: 0 });
        }

        let (q, u) = self.coords.split_state(y);
        let (qdot, udot) = dydt.split_at_mut(self.dof());

        self.coords.kinematic_differential(u, qdot);
        udot.copy_from_slice(&self.accelerations_at(q, u, t)?);
        Ok(())
    }

    fn kinematic_differential(&self, u: &[f64], qdot: &mut [f64]) {
        self.coords.kinematic_differential(u, qdot);
    }
}

/// Cholesky 分解 M = L Lᵀ
///
/// 主元不大于 `PIVOT_TOLERANCE × max(diag)`（或为 NaN）时视为奇异。
fn cholesky(m: &[Vec<f64>], time: f64) -> Result<Vec<Vec<f64>>> {
    let n = m.len();
    let scale = (0..n).map(|i| m[i][i].abs()).fold(0.0, f64::max);
    let tolerance = PIVOT_TOLERANCE * scale.max(f64::MIN_POSITIVE);

    let mut l = vec![vec![0.0; n]; n];
    for j in 0..n {
        let pivot = m[j][j] - (0..j).map(|k| l[j][k] * l[j][k]).sum::<f64>();
        if !(pivot > tolerance) {
            return Err(SimulationError::UnderdeterminedSystem { pivot, time });
        }
        let diag = pivot.sqrt();
        l[j][j] = diag;

        for i in (j + 1)..n {
            let sum = m[i][j] - (0..j).map(|k| l[i][k] * l[j][k]).sum::<f64>();
            l[i][j] = sum / diag;
        }
    }

    Ok(l)
}

/// 用 Cholesky 因子求解 L Lᵀ x = b
fn cholesky_solve(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();

    // 前代: L y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let sum = b[i] - (0..i).map(|k| l[i][k] * y[k]).sum::<f64>();
        y[i] = sum / l[i][i];
    }

    // 回代: Lᵀ x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum = y[i] - ((i + 1)..n).map(|k| l[k][i] * x[k]).sum::<f64>();
        x[i] = sum / l[i][i];
    }

    x
}
