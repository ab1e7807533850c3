//! Builder 模式实现
//!
//! 提供链式构造 [`Bus`] 实例的便捷方式：打开 serialport 后端并装配
//! 控制表。测试或自定义传输请直接使用 [`Bus::new`]。

use std::time::Duration;

use crate::bus::error::BusError;
use crate::bus::transactor::Bus;
use crate::registers::{ControlTable, Sts3215};
use crate::serial::port::{SerialPortAdapter, DEFAULT_BAUD_RATE};

/// 默认应答期限（毫秒）
///
/// 1 Mbps 下应答在 1ms 内到达；留出 USB 转串口适配器的延迟余量。
pub const DEFAULT_TIMEOUT_MS: u64 = 50;

/// Bus Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use feetech_sdk::bus::BusBuilder;
///
/// // 使用默认配置（STS3215 控制表，1 Mbps）
/// let bus = BusBuilder::new()
///     .port("/dev/ttyUSB0")
///     .build()
///     .unwrap();
///
/// // 自定义波特率与期限
/// let bus = BusBuilder::new()
///     .port("/dev/ttyACM0")
///     .baud_rate(500_000)
///     .timeout_ms(100)
///     .build()
///     .unwrap();
/// ```
pub struct BusBuilder {
    /// 串口设备路径（默认 "/dev/ttyUSB0"）
    port: Option<String>,
    /// 波特率（默认 1 Mbps）
    baud_rate: Option<u32>,
    /// 单事务应答期限（毫秒）
    timeout_ms: Option<u64>,
    /// 舵机型号控制表（默认 STS3215）
    table: Option<Box<dyn ControlTable>>,
}

impl BusBuilder {
    /// 创建新的 Builder
    pub fn new() -> Self {
        Self {
            port: None,
            baud_rate: None,
            timeout_ms: None,
            table: None,
        }
    }

    /// 设置串口设备路径（可选，默认 "/dev/ttyUSB0"）
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// 设置波特率（可选，默认 1 Mbps）
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    /// 设置单事务应答期限（可选，默认 50 ms）
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// 设置舵机型号控制表（可选，默认 STS3215）
    pub fn control_table(mut self, table: Box<dyn ControlTable>) -> Self {
        self.table = Some(table);
        self
    }

    /// 打开串口并构建 Bus 实例
    ///
    /// # Errors
    /// - `BusError::Serial`: 串口打开或配置失败
    pub fn build(self) -> Result<Bus<SerialPortAdapter>, BusError> {
        let path = self.port.as_deref().unwrap_or("/dev/ttyUSB0");
        let baud_rate = self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE);
        let adapter = SerialPortAdapter::open(path, baud_rate)?;

        let table = self.table.unwrap_or_else(|| Box::new(Sts3215::new()));
        let timeout = Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
        Ok(Bus::new(adapter, table, timeout))
    }
}

impl Default for BusBuilder {
    fn default() -> Self {
        Self::new()
    }
}
