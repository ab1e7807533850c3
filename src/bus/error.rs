//! 总线事务器错误类型定义

use crate::protocol::ProtocolError;
use crate::registers::RegistryError;
use crate::serial::SerialError;
use thiserror::Error;

/// 总线事务器错误类型
///
/// 事务器不做自动重试：单次尝试的失败按种类如实上报，重试策略由
/// 上层按操作幂等性自行组合（PING/READ 幂等，RECOVERY/RESET 不可
/// 盲目重试）。
#[derive(Error, Debug)]
pub enum BusError {
    /// 串口传输错误
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// 协议编解码错误（帧头/校验和/长度）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 控制表错误（未知寄存器/值类型不符）
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// 期限内没有收到完整应答帧
    #[error("No response before deadline")]
    NoResponse,

    /// SYNC_READ 中一个或多个舵机没有给出有效应答
    #[error("Partial sync read, no valid reply from servo(s) {missing:?}")]
    PartialRead { missing: Vec<u8> },

    /// 需要应答的操作不能使用广播 ID（0xFE 无舵机应答）
    #[error("Operation requires a reply and cannot target the broadcast ID")]
    BroadcastNotAllowed,
}
