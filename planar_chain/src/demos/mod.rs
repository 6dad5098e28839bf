//! # 演示模型模块
//!
//! 包含使用多体框架搭建的示例模型

pub mod hinge_chain;

pub use hinge_chain::{create_hinge_chain, two_link_torque_scenario, LINK_LENGTH, NUM_LINKS};
