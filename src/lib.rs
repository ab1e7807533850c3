//! Feetech SDK - Feetech TTL 总线舵机 Rust SDK
//!
//! 面向 Feetech STS/SCS 系列总线舵机（参考型号 STS3215）的主机侧驱动，
//! 覆盖从字节级协议编解码到语义化总线事务的完整链路。
//!
//! # 架构层次
//!
//! - [`serial`] - 串口传输抽象（`SerialAdapter` trait + serialport 后端）
//! - [`protocol`] - 线上协议：整数编解码、指令/应答包构造与解析、流重组、状态字节
//! - [`registers`] - 控制表抽象：寄存器名 → (地址, 长度, 换算) 映射，用户单位编解码
//! - [`bus`] - 总线事务器：独占串口的半双工请求/应答状态机
//!
//! # 数据流
//!
//! ```text
//! 调用方                     registers             protocol              bus/serial
//! "读 3 号舵机当前位置" ──► 寄存器名解析 ──► READ 指令包构造 ──► 写串口、按期限分块收包
//!        ▲                                                                 │
//!        └──── 弧度值 ◄── 用户单位解码 ◄── 应答包解析/校验 ◄────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use feetech_sdk::prelude::*;
//!
//! let mut bus = BusBuilder::new()
//!     .port("/dev/ttyUSB0")
//!     .baud_rate(1_000_000)
//!     .build()
//!     .unwrap();
//!
//! bus.write(1, "torque_enable", true).unwrap();
//! bus.write(1, "goal_position", std::f64::consts::FRAC_PI_2).unwrap();
//! let pos = bus.read(1, "present_position").unwrap();
//! println!("present_position = {:?}", pos);
//! ```

pub mod bus;
pub mod prelude;
pub mod protocol;
pub mod registers;
pub mod serial;

// Re-export 核心类型（简化用户导入）
pub use bus::{Bus, BusBuilder, BusError, BusState};
pub use protocol::{ProtocolError, ServoFault, ServoStatus};
pub use registers::{ControlTable, Mode, RegisterValue, RegistryError, Sts3215};
pub use serial::{SerialAdapter, SerialError};

/// Crate 版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
