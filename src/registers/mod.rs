//! 控制表抽象层
//!
//! 每个舵机型号有自己的控制表：寄存器名 → (地址, 字节长度, 语义换算)。
//! 本模块定义型号无关的能力集 [`ControlTable`]，以及用户单位（弧度、
//! 伏特、布尔、命名模式、波特率）与寄存器原始字节之间的编解码。
//!
//! 换算规则是一个封闭集合（[`Conversion`]），每个寄存器声明自己的
//! 换算方式；编解码逻辑由 trait 的默认方法统一实现，型号只需提供
//! 寄存器表和常量。

use std::collections::BTreeMap;

use thiserror::Error;

use crate::protocol::codec;

mod sts3215;

pub use sts3215::Sts3215;

/// 波特率封闭映射的默认值（原始值 0）
pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

/// 控制表注册层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// 寄存器名不在控制表中
    #[error("Unknown register: {0}")]
    UnknownRegister(String),

    /// 值的类型与寄存器换算方式不符
    #[error("Invalid value for register {register}: expected {expected}")]
    InvalidValue {
        register: String,
        expected: &'static str,
    },

    /// 字节数与寄存器声明的长度不符
    #[error("Invalid data length for register {register}: expected {expected}, got {actual}")]
    InvalidLength {
        register: String,
        expected: usize,
        actual: usize,
    },
}

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// 位置伺服模式
    #[default]
    Position = 0x00,
    /// 恒速（轮）模式
    Velocity = 0x01,
    /// 开环 PWM 模式
    Pwm = 0x02,
    /// 步进模式
    Step = 0x03,
    /// 未识别的原始值（冷启动时舵机可能返回异常字节）
    Unknown = 0xFF,
}

impl From<u8> for Mode {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Mode::Position,
            0x01 => Mode::Velocity,
            0x02 => Mode::Pwm,
            0x03 => Mode::Step,
            _ => Mode::Unknown,
        }
    }
}

/// 寄存器换算方式（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    /// 原始无符号整数
    None,
    /// 0 ↔ false，非 0 ↔ true
    Bool,
    /// 原始值 × f
    Scale(f64),
    /// 原始值 × (2π / steps_per_revolution)，双字节时符号位在 bit 15
    Position,
    /// 原始值 × speed_scale（无符号）
    Speed,
    /// 同 Speed，符号-幅值编码，符号位 bit 15
    SpeedSigned,
    /// 原始值 × 0.1（百分比），符号-幅值编码，符号位 bit 10（±1023）
    LoadSigned,
    /// 符号-幅值整数，符号位 bit 11（±2047），无比例换算
    PositionOffset,
    /// 运行模式枚举
    Mode,
    /// 波特率封闭映射
    BaudRate,
}

/// 寄存器定义：(地址, 字节长度, 换算方式)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterDef {
    /// 控制表内的字节偏移
    pub address: u8,
    /// 字节长度（1/2/4）
    pub len: u8,
    /// 换算方式
    pub conversion: Conversion,
}

/// 用户侧寄存器值
///
/// 读写接口统一使用这个带类型标签的值：换算方式决定具体变体
/// （位置/速度/负载 → `Float`，位置偏移 → `Int`，模式 → `Mode` 等）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegisterValue {
    Uint(u32),
    Int(i32),
    Float(f64),
    Bool(bool),
    Mode(Mode),
}

impl RegisterValue {
    /// 数值类变体转 f64（`Bool`/`Mode` 返回 None）
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RegisterValue::Uint(v) => Some(f64::from(*v)),
            RegisterValue::Int(v) => Some(f64::from(*v)),
            RegisterValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RegisterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_mode(&self) -> Option<Mode> {
        match self {
            RegisterValue::Mode(m) => Some(*m),
            _ => None,
        }
    }
}

impl From<f64> for RegisterValue {
    fn from(v: f64) -> Self {
        RegisterValue::Float(v)
    }
}

impl From<f32> for RegisterValue {
    fn from(v: f32) -> Self {
        RegisterValue::Float(f64::from(v))
    }
}

impl From<u32> for RegisterValue {
    fn from(v: u32) -> Self {
        RegisterValue::Uint(v)
    }
}

impl From<i32> for RegisterValue {
    fn from(v: i32) -> Self {
        RegisterValue::Int(v)
    }
}

impl From<bool> for RegisterValue {
    fn from(v: bool) -> Self {
        RegisterValue::Bool(v)
    }
}

impl From<Mode> for RegisterValue {
    fn from(v: Mode) -> Self {
        RegisterValue::Mode(v)
    }
}

/// 取数值变体的 f64 值，非数值类型报 `InvalidValue`
fn numeric(value: &RegisterValue, register: &str) -> Result<f64, RegistryError> {
    value.as_f64().ok_or_else(|| RegistryError::InvalidValue {
        register: register.to_string(),
        expected: "numeric value",
    })
}

/// 舵机型号能力集
///
/// 型号实现提供寄存器表与换算常量；注册层操作（查找、用户单位
/// 编解码、原始值编解码）由默认方法统一实现，可按型号覆盖。
pub trait ControlTable: Send + Sync {
    /// 型号名（如 "STS3215"）
    fn model_name(&self) -> &'static str;

    /// 每圈步数
    fn steps_per_revolution(&self) -> u32;

    /// 寄存器名 → 定义映射（键唯一，顺序无关）
    fn registers(&self) -> &BTreeMap<&'static str, RegisterDef>;

    /// 位置换算：弧度 / 步
    fn position_scale(&self) -> f64 {
        std::f64::consts::TAU / f64::from(self.steps_per_revolution())
    }

    /// 速度换算：弧度每秒 / 速度单位（STS 系列 1 单位 = 50 步/秒）
    fn speed_scale(&self) -> f64 {
        50.0 * self.position_scale()
    }

    /// 原始字节 → 运行模式（未识别值回退为 [`Mode::Unknown`]，不报错）
    fn raw_to_mode(&self, raw: u8) -> Mode {
        Mode::from(raw)
    }

    /// 运行模式 → 原始字节（保持全函数：`Unknown` 编码为 0）
    fn mode_to_raw(&self, mode: Mode) -> u8 {
        match mode {
            Mode::Position => 0x00,
            Mode::Velocity => 0x01,
            Mode::Pwm => 0x02,
            Mode::Step => 0x03,
            Mode::Unknown => 0x00,
        }
    }

    /// 原始字节 → 波特率（未识别值回退为默认 1 Mbps）
    fn raw_to_baud(&self, raw: u8) -> u32 {
        match raw {
            0 => 1_000_000,
            1 => 500_000,
            2 => 250_000,
            3 => 128_000,
            4 => 115_200,
            5 => 76_800,
            6 => 57_600,
            7 => 38_400,
            _ => DEFAULT_BAUD_RATE,
        }
    }

    /// 波特率 → 原始字节（映射外的值回退为 0，即默认 1 Mbps）
    fn baud_to_raw(&self, baud: u32) -> u8 {
        match baud {
            1_000_000 => 0,
            500_000 => 1,
            250_000 => 2,
            128_000 => 3,
            115_200 => 4,
            76_800 => 5,
            57_600 => 6,
            38_400 => 7,
            _ => 0,
        }
    }

    /// 按名查找寄存器定义
    fn lookup(&self, name: &str) -> Result<&RegisterDef, RegistryError> {
        self.registers()
            .get(name)
            .ok_or_else(|| RegistryError::UnknownRegister(name.to_string()))
    }

    /// 用户值 → 寄存器字节（按换算方式分派）
    ///
    /// 取整规则：四舍五入、远离零（与符号-幅值编码在正负方向对称）。
    /// 超出位宽的值按位宽截断，语义范围检查（角度限位等）由调用方负责。
    fn encode_user(&self, name: &str, value: &RegisterValue) -> Result<Vec<u8>, RegistryError> {
        let def = *self.lookup(name)?;
        let len = def.len as usize;
        let bytes = match def.conversion {
            Conversion::None => codec::encode_uint(numeric(value, name)?.round() as u32, len),
            Conversion::Bool => {
                let b = value.as_bool().ok_or_else(|| RegistryError::InvalidValue {
                    register: name.to_string(),
                    expected: "bool value",
                })?;
                codec::encode_uint(u32::from(b), len)
            }
            Conversion::Scale(f) => {
                codec::encode_uint((numeric(value, name)? / f).round() as u32, len)
            }
            Conversion::Position => {
                let steps = (numeric(value, name)? / self.position_scale()).round() as i32;
                codec::encode_sign_magnitude(steps, 15, len)
            }
            Conversion::Speed => {
                let units = (numeric(value, name)? / self.speed_scale()).round() as u32;
                codec::encode_uint(units, len)
            }
            Conversion::SpeedSigned => {
                let units = (numeric(value, name)? / self.speed_scale()).round() as i32;
                codec::encode_sign_magnitude(units, 15, len)
            }
            Conversion::LoadSigned => {
                let units = (numeric(value, name)? / 0.1).round() as i32;
                codec::encode_sign_magnitude(units, 10, len)
            }
            Conversion::PositionOffset => {
                codec::encode_sign_magnitude(numeric(value, name)?.round() as i32, 11, len)
            }
            Conversion::Mode => {
                let mode = value.as_mode().ok_or_else(|| RegistryError::InvalidValue {
                    register: name.to_string(),
                    expected: "mode value",
                })?;
                codec::encode_uint(u32::from(self.mode_to_raw(mode)), len)
            }
            Conversion::BaudRate => {
                let baud = numeric(value, name)?.round() as u32;
                codec::encode_uint(u32::from(self.baud_to_raw(baud)), len)
            }
        };
        Ok(bytes)
    }

    /// 原始整数 → 寄存器字节（小端编码，不做语义换算）
    fn encode_raw(&self, name: &str, value: u32) -> Result<Vec<u8>, RegistryError> {
        let def = self.lookup(name)?;
        Ok(codec::encode_uint(value, def.len as usize))
    }

    /// 寄存器字节 → 用户值（[`Self::encode_user`] 的逆操作）
    fn decode_user(&self, name: &str, bytes: &[u8]) -> Result<RegisterValue, RegistryError> {
        let def = *self.lookup(name)?;
        if bytes.len() != def.len as usize {
            return Err(RegistryError::InvalidLength {
                register: name.to_string(),
                expected: def.len as usize,
                actual: bytes.len(),
            });
        }
        let value = match def.conversion {
            Conversion::None => RegisterValue::Uint(codec::decode_uint(bytes)),
            Conversion::Bool => RegisterValue::Bool(codec::decode_uint(bytes) != 0),
            Conversion::Scale(f) => RegisterValue::Float(f64::from(codec::decode_uint(bytes)) * f),
            Conversion::Position => RegisterValue::Float(
                f64::from(codec::decode_sign_magnitude(bytes, 15)) * self.position_scale(),
            ),
            Conversion::Speed => {
                RegisterValue::Float(f64::from(codec::decode_uint(bytes)) * self.speed_scale())
            }
            Conversion::SpeedSigned => RegisterValue::Float(
                f64::from(codec::decode_sign_magnitude(bytes, 15)) * self.speed_scale(),
            ),
            Conversion::LoadSigned => {
                RegisterValue::Float(f64::from(codec::decode_sign_magnitude(bytes, 10)) * 0.1)
            }
            Conversion::PositionOffset => {
                RegisterValue::Int(codec::decode_sign_magnitude(bytes, 11))
            }
            Conversion::Mode => {
                RegisterValue::Mode(self.raw_to_mode(codec::decode_uint(bytes) as u8))
            }
            Conversion::BaudRate => {
                RegisterValue::Uint(self.raw_to_baud(codec::decode_uint(bytes) as u8))
            }
        };
        Ok(value)
    }

    /// 寄存器字节 → 原始无符号整数（小端，不做语义换算）
    fn decode_raw(&self, bytes: &[u8]) -> u32 {
        codec::decode_uint(bytes)
    }
}
