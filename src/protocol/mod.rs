//! Feetech 协议层模块
//!
//! 负责线上字节与类型化结构之间的双向转换：
//! - [`codec`] - 小端整数与符号-幅值（sign-magnitude）整数编解码
//! - [`packet`] - 指令包构造、应答包解析、字节流重组
//! - [`status`] - 应答状态字节的位域解码
//!
//! 包格式（指令与应答同构，INSTR 位置换成 STATUS）：
//!
//! ```text
//! 0xFF 0xFF | ID | LEN | INSTR/STATUS | PARAM[0..n-1] | CHK
//! LEN = n + 2
//! CHK = (~(ID + LEN + INSTR + ΣPARAM)) & 0xFF
//! ```

pub mod codec;
pub mod packet;
pub mod status;

pub use packet::{extract_packet, Extracted, Instruction, ResponsePacket, BROADCAST_ID};
pub use status::{has_fault, ServoFault, ServoStatus};

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 帧头不是 0xFF 0xFF
    #[error("Invalid packet header")]
    InvalidHeader,

    /// 字节数不足以构成 LEN 声明的完整帧
    #[error("Incomplete packet: need {needed} bytes, got {available}")]
    IncompletePacket { needed: usize, available: usize },

    /// 校验和不匹配
    #[error("Invalid checksum: expected 0x{expected:02X}, got 0x{actual:02X}")]
    InvalidChecksum { expected: u8, actual: u8 },

    /// 数据长度与协议要求不符（如 sync_write 条目长度不等于声明长度）
    #[error("Invalid data length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// 参数超出单帧可编码的上限（LEN 是单字节）
    #[error("Packet payload too large: {0} bytes")]
    PayloadTooLarge(usize),
}
