//! # Execution Planner Module / 执行计划模块
//!
//! Turns a [`TestMatrix`] into the ordered list of work: device-major, so all
//! locales of one device run before the next device boots. Optional filters
//! restrict the run to a subset of devices or locales.
//!
//! 将 [`TestMatrix`] 转换为有序的工作列表：以设备为主序，
//! 因此一个设备的所有语言运行完后才会启动下一个设备。

use crate::core::config::{DeviceId, LocaleId, TestMatrix};
use crate::core::error::{MatrixError, MatrixResult};
use std::path::PathBuf;

/// All locales to run on one device.
/// 在单个设备上运行的所有语言。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePlan {
    pub device: DeviceId,
    pub locales: Vec<LocaleId>,
}

/// Represents the complete execution plan for a matrix run.
/// 表示矩阵运行的完整执行计划。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub devices: Vec<DevicePlan>,
    /// Combinations removed by the device/locale filters.
    /// 被设备/语言过滤器移除的组合数量。
    pub filtered_count: usize,
}

impl ExecutionPlan {
    /// The (device, locale) pairs in execution order.
    pub fn iterations(&self) -> impl Iterator<Item = (&DeviceId, &LocaleId)> {
        self.devices
            .iter()
            .flat_map(|plan| plan.locales.iter().map(move |locale| (&plan.device, locale)))
    }

    pub fn len(&self) -> usize {
        self.devices.iter().map(|d| d.locales.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Restricts a run to named devices and locales. Empty lists mean "all".
#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    pub devices: Vec<String>,
    pub locales: Vec<String>,
}

/// Creates the device-major plan for `matrix`.
///
/// A filter value that names nothing in the matrix is a configuration error,
/// since it almost always means a typo.
///
/// 为 `matrix` 创建以设备为主序的计划。过滤器中不存在于矩阵的值是配置错误。
pub fn plan_execution(matrix: &TestMatrix, filter: &PlanFilter) -> MatrixResult<ExecutionPlan> {
    for wanted in &filter.devices {
        if !matrix.devices.iter().any(|d| d.as_str() == wanted) {
            return Err(unknown_filter("device", wanted));
        }
    }
    for wanted in &filter.locales {
        if !matrix.locales.iter().any(|l| l.as_str() == wanted) {
            return Err(unknown_filter("language", wanted));
        }
    }

    let keep_device =
        |d: &DeviceId| filter.devices.is_empty() || filter.devices.iter().any(|w| w == d.as_str());
    let keep_locale =
        |l: &LocaleId| filter.locales.is_empty() || filter.locales.iter().any(|w| w == l.as_str());

    let locales: Vec<LocaleId> = matrix.locales.iter().filter(|l| keep_locale(l)).cloned().collect();
    let devices: Vec<DevicePlan> = matrix
        .devices
        .iter()
        .filter(|d| keep_device(d))
        .map(|device| DevicePlan {
            device: device.clone(),
            locales: locales.clone(),
        })
        .filter(|plan| !plan.locales.is_empty())
        .collect();

    let planned: usize = devices.iter().map(|d| d.locales.len()).sum();
    Ok(ExecutionPlan {
        devices,
        filtered_count: matrix.len() - planned,
    })
}

fn unknown_filter(kind: &str, value: &str) -> MatrixError {
    MatrixError::Config {
        path: PathBuf::from("<command line>"),
        line: 0,
        message: format!("{kind} '{value}' is not part of the matrix"),
    }
}
