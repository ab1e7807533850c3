//! 总线事务器模块
//!
//! 总线事务器是 SDK 的核心业务逻辑层，负责：
//! - 独占传输句柄：一条总线对应一个事务器实例，操作严格串行
//! - 半双工请求/应答：写出指令帧后按期限分块读取、重组并解析应答
//! - 接收缓冲区跨事务保留：上一次超时留下的残帧在下一次读取中补齐，
//!   而不是破坏帧同步
//! - 对外 API：以寄存器名 + 用户单位表达的 ping / read / write /
//!   reg_write / action / sync_read / sync_write / recovery / reset
//!
//! 调用方视角是单线程协作式：同一实例同一时刻只有一个在途事务；
//! 需要共享时由调用方自行加互斥或经由 actor/mailbox 串行化。

mod builder;
mod error;
mod transactor;

pub use builder::BusBuilder;
pub use error::BusError;
pub use transactor::{Bus, BusState};
