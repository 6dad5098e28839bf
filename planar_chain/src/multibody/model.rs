//! # 拓扑模型数据结构
//!
//! 描述一次仿真所需的全部输入：刚体、关节、载荷以及积分设置。
//!
//! ## 生命周期
//! - 由交互层（或场景文件）通过 [`TopologyBuilder`] 构造一次
//! - 交给求解管线后只读，不会在运行中被修改
//! - 并发运行多个仿真时，每个运行持有自己的一份拷贝（`Topology: Clone`）

use std::fmt;
use std::str::FromStr;

use bevy::math::DVec2;
use serde::{Deserialize, Serialize};

use super::error::{Result, SimulationError};
use super::GRAVITY;

/// 刚体标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub(crate) u32);

/// 关节标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JointId(pub(crate) u32);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "joint#{}", self.0)
    }
}

/// 刚体 (Body)
///
/// 平面内的一根连杆，由两个端点定义。
///
/// ## 不变量
/// - `center` 是两端点中点
/// - `length == ‖point2 − point1‖`
///
/// 端点只在构造时给定，因此字段私有，只提供读取接口。
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    id: BodyId,
    point1: DVec2,
    point2: DVec2,
    center: DVec2,
    length: f64,
    /// 质量 (kg)
    mass: f64,
    /// 绕质心、垂直于平面的转动惯量 (kg·m²)
    inertia: f64,
}

impl Body {
    fn new(id: BodyId, point1: DVec2, point2: DVec2, mass: f64, inertia: f64) -> Self {
        Self {
            id,
            point1,
            point2,
            center: (point1 + point2) * 0.5,
            length: point1.distance(point2),
            mass,
            inertia,
        }
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn point1(&self) -> DVec2 {
        self.point1
    }

    pub fn point2(&self) -> DVec2 {
        self.point2
    }

    pub fn center(&self) -> DVec2 {
        self.center
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    fn validate(&self) -> Result<()> {
        if !(self.point1.is_finite() && self.point2.is_finite()) {
            return Err(SimulationError::InvalidParameter(format!(
                "{}: endpoints must be finite",
                self.id
            )));
        }
        positive(self.mass, &format!("{} mass", self.id))?;
        positive(self.inertia, &format!("{} inertia", self.id))
    }
}

/// 关节类型
///
/// 只有 `Hinge` 在动力学核心中有定义；`Slider` 和 `Fixed` 可以出现在拓扑中，
/// 但装配方程时会返回 [`SimulationError::UnsupportedJointKind`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JointKind {
    #[default]
    Hinge,
    Slider,
    Fixed,
}

impl fmt::Display for JointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JointKind::Hinge => "Hinge",
            JointKind::Slider => "Slider",
            JointKind::Fixed => "Fixed",
        };
        f.write_str(name)
    }
}

impl FromStr for JointKind {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Hinge" => Ok(JointKind::Hinge),
            "Slider" => Ok(JointKind::Slider),
            "Fixed" => Ok(JointKind::Fixed),
            other => Err(SimulationError::InvalidParameter(format!(
                "unknown joint kind {other:?}"
            ))),
        }
    }
}

/// 关节 (Joint)
///
/// 连接两个刚体的铰链。
///
/// ## 拓扑结构
/// - `parent = None` 表示连接到固定的惯性锚点
/// - `child` 是被该关节带动的刚体
///
/// `position` 只是交互层显示的锚点提示，运动学构建器不会使用它：
/// 刚体间的实际偏移由连杆长度和链的顺序决定。
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub id: JointId,
    pub parent: Option<BodyId>,
    pub child: BodyId,
    pub position: DVec2,
    pub kind: JointKind,
    /// 关节自身携带的常值力矩 (N·m)
    pub torque: f64,
    /// 粘性阻尼系数 (N·m·s/rad)
    pub damping: f64,
}

/// 载荷 (Load)
///
/// 按标识引用一个关节，施加一个常值力矩。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Load {
    pub joint: JointId,
    pub torque: f64,
}

/// 积分方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntegrationMethod {
    /// 四阶龙格库塔
    #[default]
    RungeKutta4,
    /// 半隐式欧拉（先速度后位置）
    SemiImplicitEuler,
}

/// 一次运行最多的采样点数量
pub const MAX_SAMPLES: usize = 100_000_000;

/// 积分设置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// 采样时间步长 h (s)
    pub time_step: f64,
    /// 仿真时长 T (s)
    pub duration: f64,
    /// 重力加速度大小 (m/s²)，方向沿 -Y
    pub gravity: f64,
    pub method: IntegrationMethod,
    /// 每个采样间隔内的积分子步数
    pub substeps: usize,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            time_step: 0.01,
            duration: 10.0,
            gravity: GRAVITY,
            method: IntegrationMethod::RungeKutta4,
            substeps: 1,
        }
    }
}

impl SimulationSettings {
    pub fn validate(&self) -> Result<()> {
        positive(self.time_step, "time_step")?;
        positive(self.duration, "duration")?;
        if !self.gravity.is_finite() {
            return Err(SimulationError::InvalidParameter(format!(
                "gravity must be finite, got {}",
                self.gravity
            )));
        }
        if self.substeps == 0 {
            return Err(SimulationError::InvalidParameter(
                "substeps must be at least 1".to_string(),
            ));
        }

        let steps = self.step_count();
        if !(steps < MAX_SAMPLES as f64) {
            return Err(SimulationError::InvalidParameter(format!(
                "duration / time_step = {steps:e} steps, at most {} samples are supported",
                MAX_SAMPLES
            )));
        }
        Ok(())
    }

    /// floor(T/h)，在 f64 中计算
    ///
    /// 比值上留几个 ulp 的余量，使 0.3 / 0.1 这类情况得到 3 而不是 2。
    fn step_count(&self) -> f64 {
        let ratio = self.duration / self.time_step;
        (ratio * (1.0 + 8.0 * f64::EPSILON)).floor()
    }

    /// 采样点数量：floor(T/h) + 1，不超过 [`MAX_SAMPLES`]
    ///
    /// 只有通过 [`validate`](Self::validate) 的设置才保证结果准确。
    pub fn sample_count(&self) -> usize {
        let steps = self.step_count();
        if !(steps < MAX_SAMPLES as f64) {
            return MAX_SAMPLES;
        }
        steps as usize + 1
    }

    /// 第 k 个采样点的时间 k·h
    pub fn sample_time(&self, k: usize) -> f64 {
        k as f64 * self.time_step
    }
}

/// 拓扑 (Topology)
///
/// 有序的刚体、关节、载荷序列以及积分设置。刚体与关节的顺序就是串联链的顺序。
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    bodies: Vec<Body>,
    joints: Vec<Joint>,
    loads: Vec<Load>,
    settings: SimulationSettings,
}

impl Topology {
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.iter().find(|body| body.id == id)
    }

    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.iter().find(|joint| joint.id == id)
    }

    /// 重新校验所有数值字段
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        for body in &self.bodies {
            body.validate()?;
        }
        for joint in &self.joints {
            if !joint.position.is_finite() {
                return Err(SimulationError::InvalidParameter(format!(
                    "{}: position must be finite",
                    joint.id
                )));
            }
            finite(joint.torque, &format!("{} torque", joint.id))?;
            finite(joint.damping, &format!("{} damping", joint.id))?;
            if joint.damping < 0.0 {
                return Err(SimulationError::InvalidParameter(format!(
                    "{} damping must be non-negative, got {}",
                    joint.id, joint.damping
                )));
            }
        }
        for load in &self.loads {
            finite(load.torque, &format!("load on {} torque", load.joint))?;
        }
        Ok(())
    }
}

/// 拓扑构建器
///
/// 负责分配 [`BodyId`] / [`JointId`]，并在 `build` 时做数值校验。
/// 零关节的拓扑可以构建成功，由坐标分配阶段报告 `EmptyTopology`。
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    next_id: u32,
    bodies: Vec<Body>,
    joints: Vec<Joint>,
    loads: Vec<Load>,
    settings: SimulationSettings,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// 添加刚体
    ///
    /// # 返回
    /// 刚体的标识
    pub fn add_body(&mut self, point1: DVec2, point2: DVec2, mass: f64, inertia: f64) -> BodyId {
        let id = BodyId(self.next_id());
        self.bodies.push(Body::new(id, point1, point2, mass, inertia));
        id
    }

    /// 添加关节
    ///
    /// `position` 为 `None` 时取两个刚体中心的中点；
    /// 连接到锚点的关节取子体的 `point1`。
    pub fn add_joint(
        &mut self,
        parent: Option<BodyId>,
        child: BodyId,
        position: Option<DVec2>,
        kind: JointKind,
    ) -> JointId {
        let position = position.unwrap_or_else(|| self.default_joint_position(parent, child));
        let id = JointId(self.next_id());
        self.joints.push(Joint {
            id,
            parent,
            child,
            position,
            kind,
            torque: 0.0,
            damping: 0.0,
        });
        id
    }

    pub fn add_hinge(&mut self, parent: Option<BodyId>, child: BodyId) -> JointId {
        self.add_joint(parent, child, None, JointKind::Hinge)
    }

    fn default_joint_position(&self, parent: Option<BodyId>, child: BodyId) -> DVec2 {
        let find = |id: BodyId| self.bodies.iter().find(|body| body.id == id);
        match (parent.and_then(find), find(child)) {
            (Some(p), Some(c)) => (p.center + c.center) * 0.5,
            (None, Some(c)) => c.point1,
            _ => DVec2::ZERO,
        }
    }

    /// 设置关节自身的力矩；未知关节返回 `false`
    pub fn set_joint_torque(&mut self, joint: JointId, torque: f64) -> bool {
        self.joint_mut(joint).map(|j| j.torque = torque).is_some()
    }

    /// 设置关节阻尼；未知关节返回 `false`
    pub fn set_joint_damping(&mut self, joint: JointId, damping: f64) -> bool {
        self.joint_mut(joint).map(|j| j.damping = damping).is_some()
    }

    fn joint_mut(&mut self, id: JointId) -> Option<&mut Joint> {
        self.joints.iter_mut().find(|joint| joint.id == id)
    }

    pub fn add_load(&mut self, joint: JointId, torque: f64) {
        self.loads.push(Load { joint, torque });
    }

    pub fn settings(&mut self, settings: SimulationSettings) -> &mut Self {
        self.settings = settings;
        self
    }

    pub fn time_step(&mut self, time_step: f64) -> &mut Self {
        self.settings.time_step = time_step;
        self
    }

    pub fn duration(&mut self, duration: f64) -> &mut Self {
        self.settings.duration = duration;
        self
    }

    pub fn gravity(&mut self, gravity: f64) -> &mut Self {
        self.settings.gravity = gravity;
        self
    }

    pub fn build(self) -> Result<Topology> {
        let topology = Topology {
            bodies: self.bodies,
            joints: self.joints,
            loads: self.loads,
            settings: self.settings,
        };
        topology.validate()?;
        Ok(topology)
    }
}

fn finite(value: f64, what: &str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimulationError::InvalidParameter(format!(
            "{what} must be finite, got {value}"
        )))
    }
}

fn positive(value: f64, what: &str) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimulationError::InvalidParameter(format!(
            "{what} must be > 0, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_body_derived_fields() {
        let mut builder = TopologyBuilder::new();
        let id = builder.add_body(DVec2::new(0.0, 0.0), DVec2::new(3.0, 4.0), 1.0, 0.1);
        let topology = builder.build().unwrap();

        let body = topology.body(id).unwrap();
        assert_relative_eq!(body.length(), 5.0);
        assert_relative_eq!(body.center().x, 1.5);
        assert_relative_eq!(body.center().y, 2.0);
    }

    #[test]
    fn test_invalid_mass_rejected() {
        let mut builder = TopologyBuilder::new();
        builder.add_body(DVec2::ZERO, DVec2::X, 0.0, 0.1);
        let err = builder.build().unwrap_err();
        assert!(matches!(err, SimulationError::InvalidParameter(_)));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut builder = TopologyBuilder::new();
        builder.time_step(-0.01);
        assert!(matches!(
            builder.build(),
            Err(SimulationError::InvalidParameter(_))
        ));

        let mut builder = TopologyBuilder::new();
        builder.duration(f64::NAN);
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_too_many_samples_rejected() {
        let mut builder = TopologyBuilder::new();
        builder.time_step(1e-300).duration(1.0);
        assert!(matches!(
            builder.build(),
            Err(SimulationError::InvalidParameter(_))
        ));

        // 比值可以表示，但超过上限
        let settings = SimulationSettings {
            time_step: 1e-9,
            duration: 100.0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SimulationError::InvalidParameter(_))
        ));
        assert_eq!(settings.sample_count(), MAX_SAMPLES);

        // 恰好在上限以内
        let settings = SimulationSettings {
            time_step: 1.0,
            duration: (MAX_SAMPLES - 1) as f64,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
        assert_eq!(settings.sample_count(), MAX_SAMPLES);
    }

    #[test]
    fn test_empty_topology_builds() {
        // 空拓扑在构建阶段是合法的
        let topology = TopologyBuilder::new().build().unwrap();
        assert!(topology.joints().is_empty());
    }

    #[test]
    fn test_default_joint_position() {
        let mut builder = TopologyBuilder::new();
        let a = builder.add_body(DVec2::new(0.0, 0.0), DVec2::new(0.0, -1.0), 1.0, 0.1);
        let b = builder.add_body(DVec2::new(0.0, -1.0), DVec2::new(0.0, -2.0), 1.0, 0.1);
        let j0 = builder.add_hinge(None, a);
        let j1 = builder.add_hinge(Some(a), b);
        let topology = builder.build().unwrap();

        assert_eq!(topology.joint(j0).unwrap().position, DVec2::ZERO);
        assert_relative_eq!(topology.joint(j1).unwrap().position.y, -1.0);
    }

    #[test]
    fn test_sample_count() {
        let settings = SimulationSettings {
            time_step: 0.01,
            duration: 1.0,
            ..Default::default()
        };
        assert_eq!(settings.sample_count(), 101);

        let settings = SimulationSettings {
            time_step: 0.1,
            duration: 0.3,
            ..Default::default()
        };
        assert_eq!(settings.sample_count(), 4);

        let settings = SimulationSettings {
            time_step: 0.4,
            duration: 1.0,
            ..Default::default()
        };
        assert_eq!(settings.sample_count(), 3);
    }

    #[test]
    fn test_joint_kind_parse() {
        assert_eq!("Slider".parse::<JointKind>().unwrap(), JointKind::Slider);
        assert_eq!(JointKind::Fixed.to_string(), "Fixed");
        assert!("Ball".parse::<JointKind>().is_err());
    }
}
