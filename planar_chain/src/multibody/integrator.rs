//! # 时间积分模块
//!
//! 在固定的采样时间点 0, h, 2h, … 上推进状态向量 y = [q; u]。
//!
//! ## 确定性
//! - 定步长，不做自适应
//! - 第 k 个采样点的时间直接取 k·h，不做累加
//! - 相同输入重复运行得到逐位相同的结果

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{trace, warn};

use super::error::{Result, SimulationError};
use super::model::{IntegrationMethod, SimulationSettings};

/// 二阶系统的一阶形式
///
/// 状态向量 y = [q; u]，长度为 2·dof。
pub trait OdeSystem {
    /// 广义坐标数量
    fn dof(&self) -> usize;

    /// 方程右端 dy/dt = f(t, y)
    fn derivative(&self, t: f64, y: &[f64], dydt: &mut [f64]) -> Result<()>;

    /// 运动学微分方程 q̇ = g(u)，默认 q̇ = u
    fn kinematic_differential(&self, u: &[f64], qdot: &mut [f64]) {
        qdot.copy_from_slice(u);
    }
}

/// 协作式取消
///
/// 每个积分子步检查一次；克隆共享同一个标志位，可以从其他线程取消。
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// 带标志位的令牌
    pub fn new() -> Self {
        Self {
            flag: Some(Arc::new(AtomicBool::new(false))),
            deadline: None,
        }
    }

    /// 永不取消
    pub fn never() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel(&self) {
        if let Some(flag) = &self.flag {
            flag.store(true, Ordering::Relaxed);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        let flagged = self
            .flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed));
        flagged || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

// 预先分配的采样点上限，更长的运行按需增长
const RESERVED_SAMPLES: usize = 4096;

/// 一个采样点
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub state: Vec<f64>,
}

/// 积分失败：错误 + 失败前的采样
#[derive(Debug, Clone)]
pub struct IntegrationFailure {
    pub error: SimulationError,
    pub samples: Vec<Sample>,
}

/// 积分中间量
struct Workspace {
    y0: Vec<f64>,
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
}

impl Workspace {
    fn new(dim: usize) -> Self {
        Self {
            y0: vec![0.0; dim],
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
        }
    }
}

/// 积分整个时间区间
///
/// 返回 floor(T/h) + 1 个采样点，第 k 个的时间是 k·h。
///
/// ## 失败
/// - 设置不合法（包括采样点数超过 [`MAX_SAMPLES`](super::model::MAX_SAMPLES)）：[`SimulationError::InvalidParameter`]
/// - 状态出现非有限值：[`SimulationError::IntegrationDiverged`]
/// - 取消（每个积分子步检查一次）：[`SimulationError::Cancelled`]
/// - 方程右端本身的错误（例如质量矩阵奇异）原样返回
///
/// 所有失败都附带失败前已经得到的采样。
pub fn integrate<S: OdeSystem>(
    system: &S,
    y0: &[f64],
    settings: &SimulationSettings,
    cancel: &CancelToken,
) -> std::result::Result<Vec<Sample>, IntegrationFailure> {
    if let Err(error) = settings.validate() {
        return Err(IntegrationFailure {
            error,
            samples: Vec::new(),
        });
    }

    let count = settings.sample_count();
    let substeps = settings.substeps;
    let dt = settings.time_step / substeps as f64;

    let mut samples = Vec::with_capacity(count.min(RESERVED_SAMPLES));
    samples.push(Sample {
        time: 0.0,
        state: y0.to_vec(),
    });

    let mut y = y0.to_vec();
    let mut work = Workspace::new(y.len());

    for k in 1..count {
        let t0 = settings.sample_time(k - 1);

        for s in 0..substeps {
            let t = t0 + s as f64 * dt;

            if cancel.is_cancelled() {
                warn!("integration cancelled at t = {t:.4}");
                return Err(IntegrationFailure {
                    error: SimulationError::Cancelled { time: t },
                    samples,
                });
            }
            let stepped = match settings.method {
                IntegrationMethod::RungeKutta4 => rk4_step(system, t, &mut y, dt, &mut work),
                IntegrationMethod::SemiImplicitEuler => {
                    semi_implicit_euler_step(system, t, &mut y, dt, &mut work)
                }
            };

            if let Err(error) = stepped {
                let error = match error {
                    SimulationError::IntegrationDiverged { time, .. } => {
                        SimulationError::IntegrationDiverged { time, step: k }
                    }
                    other => other,
                };
                warn!("integration stopped at t = {t:.4}: {error}");
                return Err(IntegrationFailure { error, samples });
            }
        }

        let time = settings.sample_time(k);
        if !y.iter().all(|v| v.is_finite()) {
            warn!("state became non-finite at t = {time:.4} (step {k})");
            return Err(IntegrationFailure {
                error: SimulationError::IntegrationDiverged { time, step: k },
                samples,
            });
        }

        trace!("t = {time:.4} y = {y:?}");
        samples.push(Sample {
            time,
            state: y.clone(),
        });
    }

    Ok(samples)
}

/// RK4 (Runge-Kutta 4阶) 单步
///
/// ```text
/// k₁ = f(t, y)
/// k₂ = f(t + h/2, y + h/2*k₁)
/// k₃ = f(t + h/2, y + h/2*k₂)
/// k₄ = f(t + h, y + h*k₃)
/// y_{n+1} = y_n + h/6*(k₁ + 2k₂ + 2k₃ + k₄)
/// ```
///
/// 局部截断误差 O(h⁵)，全局误差 O(h⁴)。
fn rk4_step<S: OdeSystem>(
    system: &S,
    t: f64,
    y: &mut [f64],
    dt: f64,
    work: &mut Workspace,
) -> Result<()> {
    work.y0.copy_from_slice(y);

    // ==================== Stage 1: k1 = f(t, y) ====================
    system.derivative(t, &work.y0, &mut work.k1)?;

    // =============== Stage 2: k2 = f(t + h/2, y + h/2*k1) ===============
    for i in 0..y.len() {
        y[i] = work.y0[i] + 0.5 * dt * work.k1[i];
    }
    system.derivative(t + 0.5 * dt, y, &mut work.k2)?;

    // =============== Stage 3: k3 = f(t + h/2, y + h/2*k2) ===============
    for i in 0..y.len() {
        y[i] = work.y0[i] + 0.5 * dt * work.k2[i];
    }
    system.derivative(t + 0.5 * dt, y, &mut work.k3)?;

    // ================ Stage 4: k4 = f(t + h, y + h*k3) ================
    for i in 0..y.len() {
        y[i] = work.y0[i] + dt * work.k3[i];
    }
    system.derivative(t + dt, y, &mut work.k4)?;

    // ========== Final update: y_next = y + h/6*(k1 + 2*k2 + 2*k3 + k4) ==========
    for i in 0..y.len() {
        y[i] = work.y0[i]
            + dt / 6.0 * (work.k1[i] + 2.0 * work.k2[i] + 2.0 * work.k3[i] + work.k4[i]);
    }

    Ok(())
}

/// 半隐式欧拉单步
///
/// ```text
/// u_{n+1} = u_n + h * u̇(q_n, u_n)
/// q_{n+1} = q_n + h * g(u_{n+1})
/// ```
///
/// 先更新速度，再用新速度更新位置。每步只需 1 次动力学计算，精度低于 RK4。
fn semi_implicit_euler_step<S: OdeSystem>(
    system: &S,
    t: f64,
    y: &mut [f64],
    dt: f64,
    work: &mut Workspace,
) -> Result<()> {
    let n = system.dof();
    system.derivative(t, y, &mut work.k1)?;

    let (q, u) = y.split_at_mut(n);
    for (ui, acc) in u.iter_mut().zip(&work.k1[n..]) {
        *ui += dt * acc;
    }

    let qdot = &mut work.k2[..n];
    system.kinematic_differential(u, qdot);
    for (qi, rate) in q.iter_mut().zip(qdot.iter()) {
        *qi += dt * rate;
    }

    Ok(())
}
