//! 整数编解码工具函数
//!
//! 协议中所有多字节整数都是小端字节序（LSB 在前）。除常规无符号/补码
//! 整数外，Feetech 把有符号量（位置、速度、负载、位置偏移）编码为
//! **符号-幅值**（sign-magnitude）形式：指定位作为符号位，低位存无符号
//! 幅值，与补码不同。

/// 小端编码无符号整数为 `len` 字节（len ∈ {1, 2, 4}），高位截断
pub fn encode_uint(value: u32, len: usize) -> Vec<u8> {
    debug_assert!(matches!(len, 1 | 2 | 4), "register length must be 1/2/4");
    value.to_le_bytes()[..len.min(4)].to_vec()
}

/// 小端解码无符号整数（1/2/4 字节）
pub fn decode_uint(bytes: &[u8]) -> u32 {
    debug_assert!(bytes.len() <= 4, "register length must be <= 4");
    bytes
        .iter()
        .rev()
        .fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

/// 小端解码补码有符号整数（按字节数做 8/16/32 位符号扩展）
pub fn decode_int(bytes: &[u8]) -> i32 {
    let raw = decode_uint(bytes);
    match bytes.len() {
        1 => raw as u8 as i8 as i32,
        2 => raw as u16 as i16 as i32,
        _ => raw as i32,
    }
}

/// 符号-幅值编码：负值写为 `(1 << sign_bit) | |value|`，再小端编码
pub fn encode_sign_magnitude(value: i32, sign_bit: u32, len: usize) -> Vec<u8> {
    let raw = if value < 0 {
        (1u32 << sign_bit) | value.unsigned_abs()
    } else {
        value as u32
    };
    encode_uint(raw, len)
}

/// 符号-幅值解码：符号位置位则结果为 `-(raw & mask)`，否则 `raw & mask`
///
/// 符号位以上的位被忽略。
pub fn decode_sign_magnitude(bytes: &[u8], sign_bit: u32) -> i32 {
    let raw = decode_uint(bytes);
    let mask = (1u32 << sign_bit) - 1;
    let magnitude = (raw & mask) as i32;
    if raw & (1u32 << sign_bit) != 0 {
        -magnitude
    } else {
        magnitude
    }
}
