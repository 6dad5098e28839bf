//! # 错误类型
//!
//! 求解管线中所有可能的失败都以 `SimulationError` 的形式返回给调用方，
//! 不会被静默吞掉，也不会自动重试。

use thiserror::Error;

use super::model::{JointId, JointKind};
use super::trajectory::Trajectory;

/// 多体求解管线的错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// 没有任何关节，系统没有自由度
    #[error("topology has no joints: nothing to simulate")]
    EmptyTopology,

    /// 关节/刚体引用无法构成串联链
    #[error("topology is not a valid serial chain: {0}")]
    TopologyMismatch(String),

    /// 存在非 Hinge 关节
    #[error("joint {joint} has kind {kind}, only Hinge joints have dynamics")]
    UnsupportedJointKind { joint: JointId, kind: JointKind },

    /// 质量矩阵奇异（Cholesky 主元非正）
    #[error("mass matrix is singular at t = {time} (pivot {pivot:e})")]
    UnderdeterminedSystem { pivot: f64, time: f64 },

    /// 状态向量出现 NaN / inf
    #[error("integration diverged at t = {time} (step {step})")]
    IntegrationDiverged { time: f64, step: usize },

    /// 数值参数越界
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// 外部取消（标志位或截止时间）
    #[error("simulation cancelled at t = {time}")]
    Cancelled { time: f64 },
}

pub type Result<T> = std::result::Result<T, SimulationError>;

/// 一次仿真运行的失败结果
///
/// 除错误本身外，还携带失败前已经积分得到的部分轨迹（如果有）。
/// 装配阶段的失败没有部分轨迹。
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct SimulationFailure {
    #[source]
    pub error: SimulationError,
    pub partial: Option<Trajectory>,
}

impl From<SimulationError> for SimulationFailure {
    fn from(error: SimulationError) -> Self {
        Self {
            error,
            partial: None,
        }
    }
}
