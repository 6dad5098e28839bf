//! # Planar Chain
//!
//! 平面铰链链条的多体动力学求解器。
//!
//! ## 模块组织
//!
//! - `multibody`: 通用的平面多体动力学求解框架
//! - `scene`: JSON 场景文件的读取
//! - `demos`: 示例模型（包括 hinge_chain）

pub mod demos;
pub mod multibody;
pub mod scene;
