//! # Core Module / 核心模块
//!
//! The orchestration engine: configuration and matrix parsing, the device
//! session controller, the test driver, the archiver and the orchestrator that
//! sequences them.
//!
//! 编排引擎：配置和矩阵解析、设备会话控制器、测试驱动、归档器以及对它们进行排序的编排器。

pub mod archiver;
pub mod builder;
pub mod config;
pub mod driver;
pub mod error;
pub mod issues;
pub mod models;
pub mod orchestrator;
pub mod planner;
pub mod report;
pub mod scheme;
pub mod session;

// Re-exports
pub use config::{RunConfig, TestMatrix};
pub use error::{MatrixError, MatrixResult};
pub use orchestrator::{Orchestrator, Toolchain};
