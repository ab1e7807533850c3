//! serialport 后端适配器
//!
//! 基于 `serialport` crate 的生产环境实现。Feetech 总线固定使用
//! 8 数据位、1 停止位、无校验、无流控（8-N-1），波特率在打开时配置，
//! 默认 1 Mbps。

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, StopBits};
use tracing::{debug, info};

use crate::serial::{SerialAdapter, SerialDeviceError, SerialDeviceErrorKind, SerialError};

/// 默认波特率（STS3215 出厂设置）
pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

/// 打开串口时的初始读超时，之后由每次 `read_chunk()` 动态调整
const INITIAL_TIMEOUT: Duration = Duration::from_millis(10);

/// serialport 后端串口适配器
///
/// 独占持有打开的串口句柄，Drop 时自动关闭（RAII，关闭恰好一次）。
pub struct SerialPortAdapter {
    port: Box<dyn serialport::SerialPort>,
    /// 当前生效的读超时，避免每次读取都执行 set_timeout 系统调用
    timeout: Duration,
    path: String,
}

impl SerialPortAdapter {
    /// 打开串口设备并配置为 8-N-1、无流控
    ///
    /// # 参数
    /// - `path`: 设备路径（Linux 常见为 "/dev/ttyUSB0" 或 "/dev/ttyACM0"）
    /// - `baud_rate`: 波特率（STS 系列默认 1_000_000）
    ///
    /// # 错误处理
    /// - 设备不存在 → `SerialError::Device`（kind = NoDevice）
    /// - 配置无效 → `SerialError::Device`（kind = UnsupportedConfig）
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, SerialError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(INITIAL_TIMEOUT)
            .open()
            .map_err(to_serial_error)?;

        info!(path, baud_rate, "serial port opened (8-N-1, no flow control)");

        Ok(Self {
            port,
            timeout: INITIAL_TIMEOUT,
            path: path.to_string(),
        })
    }

    /// 设备路径
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl SerialAdapter for SerialPortAdapter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.port.write_all(bytes)?;
        // 半双工总线：确保指令帧完全离开发送缓冲区后再开始收应答
        self.port.flush()?;
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SerialError> {
        if timeout != self.timeout {
            self.port.set_timeout(timeout).map_err(to_serial_error)?;
            self.timeout = timeout;
        }

        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Err(SerialError::Timeout)
            }
            Err(e) => Err(SerialError::Io(e)),
        }
    }
}

impl Drop for SerialPortAdapter {
    fn drop(&mut self) {
        debug!(path = %self.path, "serial port closed");
    }
}

/// 把 serialport 的错误映射到结构化的设备错误分类
fn to_serial_error(e: serialport::Error) -> SerialError {
    let kind = match e.kind {
        serialport::ErrorKind::NoDevice => SerialDeviceErrorKind::NoDevice,
        serialport::ErrorKind::InvalidInput => SerialDeviceErrorKind::UnsupportedConfig,
        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => SerialDeviceErrorKind::NotFound,
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            SerialDeviceErrorKind::AccessDenied
        }
        serialport::ErrorKind::Io(_) => SerialDeviceErrorKind::Backend,
        serialport::ErrorKind::Unknown => SerialDeviceErrorKind::Unknown,
    };
    SerialError::Device(SerialDeviceError::new(kind, e.description))
}
