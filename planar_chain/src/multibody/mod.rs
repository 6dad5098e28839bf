//! # Planar Multibody Framework
//!
//! 基于广义坐标的平面多体动力学求解框架，用于模拟由铰链串联起来的刚性连杆。
//!
//! ## 核心概念
//!
//! - **拓扑 (Topology)**: 刚体、关节、载荷及积分设置，按标识互相引用
//! - **广义坐标 (Generalized Coordinates)**: 每个铰链一个相对转角 qᵢ 和角速度 uᵢ
//! - **前向运动学 (Forward Kinematics)**: 从关节角度计算每个连杆的位置和姿态
//! - **运动方程 (Equations of Motion)**: M(q)·u̇ = Q(q, u, t)
//! - **时间积分 (Time Integration)**: 定步长推进 y = [q; u]
//!
//! ## 管线
//!
//! ```text
//! Topology → assign_coordinates → build_chain → EquationsOfMotion → integrate → Trajectory
//! ```
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use planar_chain::multibody::*;
//!
//! // 1. 创建模型
//! let mut builder = TopologyBuilder::new();
//! let link = builder.add_body(DVec2::ZERO, DVec2::NEG_Y, 1.0, 0.1);
//! builder.add_hinge(None, link);
//! builder.time_step(0.01).duration(1.0);
//!
//! // 2. 求解
//! let trajectory = Simulation::new(builder.build()?).run()?;
//! ```

pub mod coordinates;
pub mod dynamics;
pub mod energy;
pub mod error;
pub mod geometry;
pub mod integrator;
pub mod kinematics;
pub mod model;
pub mod planar_algebra;
pub mod simulation;
pub mod subtree_com;
pub mod trajectory;
pub mod velocity;

// Re-export commonly used types
pub use coordinates::{assign_coordinates, CoordinateMap, GeneralizedCoordinate};
pub use dynamics::EquationsOfMotion;
pub use energy::{kinetic_energy, potential_energy, total_energy};
pub use error::{SimulationError, SimulationFailure};
pub use geometry::rod_inertia;
pub use integrator::{integrate, CancelToken, OdeSystem, Sample};
pub use kinematics::{build_chain, forward_kinematics, joint_positions, ChainModel};
pub use model::{
    Body, BodyId, IntegrationMethod, Joint, JointId, JointKind, Load, SimulationSettings,
    Topology, TopologyBuilder,
};
pub use simulation::Simulation;
pub use trajectory::{extract, JointTrajectory, Trajectory};
pub use velocity::compute_velocities;

pub use bevy::math::DVec2;

/// Gravity constant (m/s^2)
/// 重力沿 -Y 方向
pub const GRAVITY: f64 = 9.81;

/// 参考方向：关节角为 0 时连杆沿 -Y 下垂
pub const DOWN: DVec2 = DVec2::NEG_Y;
