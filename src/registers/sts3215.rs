//! STS3215 参考控制表
//!
//! 磁编码 4096 步/圈，速度单位 50 步/秒，出厂波特率 1 Mbps。
//! 寄存器集中定义，避免地址"魔法数"散落在代码里。

use std::collections::BTreeMap;

use crate::registers::{ControlTable, Conversion, RegisterDef};

/// STS3215 寄存器表：(名称, 地址, 长度, 换算方式)
const REGISTERS: &[(&str, u8, u8, Conversion)] = &[
    ("firmware_version_main", 0, 1, Conversion::None),
    ("firmware_version_sub", 1, 1, Conversion::None),
    ("servo_version_main", 3, 1, Conversion::None),
    ("servo_version_sub", 4, 1, Conversion::None),
    ("id", 5, 1, Conversion::None),
    ("baud_rate", 6, 1, Conversion::BaudRate),
    ("return_delay", 7, 1, Conversion::None),
    ("status_return_level", 8, 1, Conversion::None),
    ("min_angle_limit", 9, 2, Conversion::Position),
    ("max_angle_limit", 11, 2, Conversion::Position),
    ("max_temperature", 13, 1, Conversion::None),
    ("max_input_voltage", 14, 1, Conversion::Scale(0.1)),
    ("min_input_voltage", 15, 1, Conversion::Scale(0.1)),
    ("max_torque", 16, 2, Conversion::Scale(0.001)),
    ("position_p_gain", 21, 1, Conversion::None),
    ("position_d_gain", 22, 1, Conversion::None),
    ("position_i_gain", 23, 1, Conversion::None),
    ("position_offset", 31, 2, Conversion::PositionOffset),
    ("mode", 33, 1, Conversion::Mode),
    ("torque_enable", 40, 1, Conversion::Bool),
    ("acceleration", 41, 1, Conversion::None),
    ("goal_position", 42, 2, Conversion::Position),
    ("goal_time", 44, 2, Conversion::None),
    ("goal_speed", 46, 2, Conversion::Speed),
    ("torque_limit", 48, 2, Conversion::Scale(0.001)),
    ("lock", 55, 1, Conversion::Bool),
    ("present_position", 56, 2, Conversion::Position),
    ("present_speed", 58, 2, Conversion::SpeedSigned),
    ("present_load", 60, 2, Conversion::LoadSigned),
    ("present_voltage", 62, 1, Conversion::Scale(0.1)),
    ("present_temperature", 63, 1, Conversion::None),
    ("hardware_error_status", 65, 1, Conversion::None),
    ("moving", 66, 1, Conversion::Bool),
    ("present_current", 69, 2, Conversion::None),
];

/// STS3215 控制表
pub struct Sts3215 {
    registers: BTreeMap<&'static str, RegisterDef>,
}

impl Sts3215 {
    pub fn new() -> Self {
        let registers = REGISTERS
            .iter()
            .map(|(name, address, len, conversion)| {
                (
                    *name,
                    RegisterDef {
                        address: *address,
                        len: *len,
                        conversion: *conversion,
                    },
                )
            })
            .collect();
        Self { registers }
    }
}

impl Default for Sts3215 {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlTable for Sts3215 {
    fn model_name(&self) -> &'static str {
        "STS3215"
    }

    fn steps_per_revolution(&self) -> u32 {
        4096
    }

    fn registers(&self) -> &BTreeMap<&'static str, RegisterDef> {
        &self.registers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_count_and_uniqueness() {
        let table = Sts3215::new();
        // 表内名称唯一（BTreeMap 去重后数量不变）
        assert_eq!(table.registers().len(), REGISTERS.len());
    }

    #[test]
    fn test_key_register_addresses() {
        let table = Sts3215::new();
        let cases = [
            ("id", 5, 1),
            ("baud_rate", 6, 1),
            ("position_offset", 31, 2),
            ("mode", 33, 1),
            ("torque_enable", 40, 1),
            ("goal_position", 42, 2),
            ("lock", 55, 1),
            ("present_position", 56, 2),
            ("present_speed", 58, 2),
            ("present_load", 60, 2),
            ("present_current", 69, 2),
        ];
        for (name, address, len) in cases {
            let def = table.lookup(name).unwrap();
            assert_eq!(def.address, address, "address mismatch for {}", name);
            assert_eq!(def.len, len, "length mismatch for {}", name);
        }
    }

    #[test]
    fn test_scales() {
        let table = Sts3215::new();
        assert_eq!(table.model_name(), "STS3215");
        assert_eq!(table.steps_per_revolution(), 4096);

        let expected_position = std::f64::consts::TAU / 4096.0;
        assert!((table.position_scale() - expected_position).abs() < 1e-12);
        assert!((table.speed_scale() - 50.0 * expected_position).abs() < 1e-12);
    }

    #[test]
    fn test_register_lengths_are_valid() {
        let table = Sts3215::new();
        for (name, def) in table.registers() {
            assert!(
                matches!(def.len, 1 | 2 | 4),
                "register {} has invalid length {}",
                name,
                def.len
            );
        }
    }
}
