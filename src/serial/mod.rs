//! 串口传输抽象层
//!
//! 提供统一的串口字节流接口抽象。总线事务器只依赖 [`SerialAdapter`] trait，
//! 因此可以在测试中用脚本化的 Mock 适配器替换真实硬件。
//!
//! Feetech 总线是半双工 TTL 串口：TX/RX 共用一根信号线，主机发出指令包后
//! 必须立即切换为接收方。适配层不理解包结构，只负责字节的有界写入和
//! 带超时的分块读取。

use std::time::Duration;
use thiserror::Error;

pub mod port;

pub use port::SerialPortAdapter;

/// 串口适配层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    /// IO 底层错误
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 设备相关错误（设备未找到、配置失败、权限不足等）
    #[error("Device Error: {0}")]
    Device(#[from] SerialDeviceError),

    /// 读取超时（非致命，事务器会在期限内继续重试读取）
    #[error("Read timeout")]
    Timeout,
}

/// 设备/后端错误的结构化分类（不绑定具体后端实现）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialDeviceErrorKind {
    Unknown,
    /// 设备未找到/不存在（热拔插或枚举不到）
    NotFound,
    /// 设备已断开
    NoDevice,
    /// 权限不足/被拒绝
    AccessDenied,
    /// 资源忙/被占用
    Busy,
    /// 不支持的波特率/配置
    UnsupportedConfig,
    /// 其他 IO/后端错误
    Backend,
}

/// 结构化设备错误：kind + message（保留人类可读信息，供日志/上层策略判断）
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct SerialDeviceError {
    pub kind: SerialDeviceErrorKind,
    pub message: String,
}

impl SerialDeviceError {
    pub fn new(kind: SerialDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 判断是否为致命错误
    ///
    /// 致命错误表示设备已不可用，需要重新打开或停止操作；
    /// 非致命错误可以重试。
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            SerialDeviceErrorKind::NoDevice
                | SerialDeviceErrorKind::AccessDenied
                | SerialDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for SerialDeviceError {
    fn from(message: String) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for SerialDeviceError {
    fn from(message: &str) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

/// 串口适配器 Trait
///
/// 语义：
/// - `write_all()`: 有界阻塞写入，一次写出完整指令帧
/// - `read_chunk()`: 阻塞读取，直到至少收到 1 字节或超时
///
/// 总线事务器在每个事务内反复调用 `read_chunk()`（短超时，约 10ms），
/// 把收到的字节追加到自己的接收缓冲区后交给流重组器处理。
pub trait SerialAdapter: Send {
    /// 写出一段完整字节（通常是一个指令帧）
    ///
    /// # 错误处理
    /// - 写入失败 → `SerialError::Io` 或 `SerialError::Device`
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// 读取最多 `buf.len()` 字节
    ///
    /// # 语义
    /// - 至少收到 1 字节即返回，不等待填满缓冲区
    /// - 超时内无数据 → `Err(SerialError::Timeout)`（可重试）
    ///
    /// # 返回
    /// - `Ok(n)`: 实际读到的字节数（调用方也应把 `Ok(0)` 视同超时）
    /// - `Err(SerialError::Timeout)`: 超时，无数据
    /// - `Err(e)`: 设备/IO 错误
    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SerialError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_device_error_is_fatal() {
        // 致命错误
        let fatal_errors = vec![
            SerialDeviceError::new(SerialDeviceErrorKind::NoDevice, "Device gone"),
            SerialDeviceError::new(SerialDeviceErrorKind::AccessDenied, "Access denied"),
            SerialDeviceError::new(SerialDeviceErrorKind::NotFound, "Device not found"),
        ];
        for error in fatal_errors {
            assert!(error.is_fatal(), "Error should be fatal: {:?}", error);
        }

        // 非致命错误
        let non_fatal_errors = vec![
            SerialDeviceError::new(SerialDeviceErrorKind::Busy, "Port busy"),
            SerialDeviceError::new(SerialDeviceErrorKind::UnsupportedConfig, "Bad baud rate"),
            SerialDeviceError::new(SerialDeviceErrorKind::Backend, "Backend error"),
            SerialDeviceError::new(SerialDeviceErrorKind::Unknown, "Unknown error"),
        ];
        for error in non_fatal_errors {
            assert!(!error.is_fatal(), "Error should not be fatal: {:?}", error);
        }
    }

    #[test]
    fn test_serial_error_display() {
        let err = SerialError::Timeout;
        assert!(err.to_string().to_lowercase().contains("timeout"));
    }

    #[test]
    fn test_serial_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "test");
        let err: SerialError = io_err.into();
        match err {
            SerialError::Io(_) => {}
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_serial_device_error_from_str() {
        let err: SerialDeviceError = "something odd".into();
        assert_eq!(err.kind, SerialDeviceErrorKind::Unknown);
        assert!(err.to_string().contains("something odd"));
    }

    // Mock 实现用于验证 trait 定义本身可被实现和调用
    struct MockSerialAdapter {
        rx: Vec<u8>,
        sent: Vec<u8>,
    }

    impl SerialAdapter for MockSerialAdapter {
        fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
            self.sent.extend_from_slice(bytes);
            Ok(())
        }

        fn read_chunk(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, SerialError> {
            if self.rx.is_empty() {
                return Err(SerialError::Timeout);
            }
            let n = buf.len().min(self.rx.len());
            buf[..n].copy_from_slice(&self.rx[..n]);
            self.rx.drain(..n);
            Ok(n)
        }
    }

    #[test]
    fn test_adapter_write_then_read() {
        let mut adapter = MockSerialAdapter {
            rx: vec![0xFF, 0xFF, 0x01],
            sent: Vec::new(),
        };

        adapter.write_all(&[0x01, 0x02]).unwrap();
        assert_eq!(adapter.sent, vec![0x01, 0x02]);

        let mut buf = [0u8; 2];
        let n = adapter.read_chunk(&mut buf, Duration::from_millis(10)).unwrap();
        assert_eq!(n, 2);
        assert_eq!(buf, [0xFF, 0xFF]);

        let n = adapter.read_chunk(&mut buf, Duration::from_millis(10)).unwrap();
        assert_eq!(n, 1);
        assert_eq!(buf[0], 0x01);

        // 数据耗尽后超时
        assert!(matches!(
            adapter.read_chunk(&mut buf, Duration::from_millis(10)),
            Err(SerialError::Timeout)
        ));
    }
}
