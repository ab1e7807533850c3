//! 应答状态字节解码
//!
//! 每个应答帧的 STATUS 字节是一个位域，报告舵机自身的硬件状况：
//!
//! | Bit | 含义 |
//! |-----|------|
//! | 0 | 电压异常 |
//! | 1 | 传感器（编码器）异常 |
//! | 2 | 温度异常 |
//! | 3 | 电流异常 |
//! | 4 | 扭矩已使能（**不是故障**） |
//! | 5 | 过载 |
//! | 6-7 | 保留，忽略 |
//!
//! 舵机上报的故障位在本层只是数据，不会转成错误：是否视为致命
//! 由调用方决定。

use bilge::prelude::*;

/// 状态字节位域
///
/// bilge 默认使用 LSB first 位序，与协议要求一致（Bit 0 = 电压）。
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default)]
pub struct StatusBits {
    pub voltage: bool,
    pub sensor: bool,
    pub temperature: bool,
    pub current: bool,
    pub torque_enabled: bool,
    pub overload: bool,
    pub reserved: u2,
}

/// 故障位掩码：bit 0,1,2,3,5（bit 4 是扭矩标志，不算故障）
const FAULT_MASK: u8 = 0b0010_1111;

/// 舵机故障种类（按位序升序）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoFault {
    /// Bit 0: 电压异常
    Voltage,
    /// Bit 1: 传感器（编码器）异常
    Sensor,
    /// Bit 2: 温度异常
    Temperature,
    /// Bit 3: 电流异常
    Current,
    /// Bit 5: 过载
    Overload,
}

/// 判断状态字节是否含有任一故障位
pub fn has_fault(status: u8) -> bool {
    status & FAULT_MASK != 0
}

/// 解码后的舵机状态信息
///
/// 随每次成功事务一起返回（ping / write_await / reg_write / recovery /
/// reset），故障位与扭矩标志分离。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServoStatus {
    /// 应答舵机 ID
    pub id: u8,
    /// 原始状态字节
    pub raw: u8,
    /// 置位的故障，按位序升序排列，不含扭矩标志
    pub faults: Vec<ServoFault>,
    /// 扭矩是否使能（Bit 4）
    pub torque_enabled: bool,
}

impl ServoStatus {
    /// 从应答帧的 ID 与状态字节解码
    pub fn from_response(id: u8, raw: u8) -> Self {
        let bits = StatusBits::from(u8::new(raw));
        let mut faults = Vec::new();
        if bits.voltage() {
            faults.push(ServoFault::Voltage);
        }
        if bits.sensor() {
            faults.push(ServoFault::Sensor);
        }
        if bits.temperature() {
            faults.push(ServoFault::Temperature);
        }
        if bits.current() {
            faults.push(ServoFault::Current);
        }
        if bits.overload() {
            faults.push(ServoFault::Overload);
        }
        Self {
            id,
            raw,
            faults,
            torque_enabled: bits.torque_enabled(),
        }
    }

    /// 是否存在任一故障
    pub fn has_fault(&self) -> bool {
        !self.faults.is_empty()
    }
}
