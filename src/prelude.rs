//! Prelude - 常用类型的便捷导入
//!
//! 大多数用户应该使用这个模块来导入常用类型：
//!
//! ```rust
//! use feetech_sdk::prelude::*;
//! ```

// 总线层（推荐使用）
pub use crate::bus::{Bus, BusBuilder, BusState};

// 控制表层
pub use crate::registers::{ControlTable, Mode, RegisterValue, Sts3215};

// 协议层（常用类型）
pub use crate::protocol::{ServoFault, ServoStatus, BROADCAST_ID};

// 传输层（常用 Trait）
pub use crate::serial::{SerialAdapter, SerialPortAdapter};

// 错误类型
pub use crate::bus::BusError;
pub use crate::protocol::ProtocolError;
pub use crate::registers::RegistryError;
pub use crate::serial::SerialError;
