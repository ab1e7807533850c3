//! 指令包构造、应答包解析与字节流重组
//!
//! 使用 `bytes` 手动打包/解包，不依赖结构体内存布局：
//! - 不依赖编译器对齐规则
//! - 明确控制字节流格式
//!
//! 流重组器（[`extract_packet`]）只负责按帧头和 LEN 切帧，**不校验
//! 校验和**：校验是 [`ResponsePacket::parse`] 的职责。这样一个损坏的
//! 帧不会卡死重组器，丢弃与否由事务器决定。

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::protocol::ProtocolError;

/// 广播 ID：所有舵机接收，无舵机应答
pub const BROADCAST_ID: u8 = 0xFE;

/// 帧头 + ID + LEN + INSTR/STATUS + CHK 的固定开销
const FRAME_OVERHEAD: usize = 6;

/// 单帧参数上限（LEN 是单字节，LEN = 参数数 + 2）
const MAX_PARAMS: usize = 0xFF - 2;

/// Feetech 指令码
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    RegWrite = 0x04,
    Action = 0x05,
    Recovery = 0x06,
    Reset = 0x0A,
    SyncRead = 0x82,
    SyncWrite = 0x83,
}

/// 计算校验和：ID、LEN、INSTR/STATUS 与所有参数求和后按位取反
///
/// `body` 为帧中去掉两字节帧头和末尾 CHK 的部分。
pub fn checksum(body: &[u8]) -> u8 {
    !body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// 构造一个完整指令帧
fn build(id: u8, instruction: Instruction, params: &[u8]) -> Bytes {
    let len = (params.len() + 2) as u8;
    let mut buf = BytesMut::with_capacity(FRAME_OVERHEAD + params.len());
    buf.put_u8(0xFF);
    buf.put_u8(0xFF);
    buf.put_u8(id);
    buf.put_u8(len);
    buf.put_u8(instruction as u8);
    buf.put_slice(params);
    let chk = checksum(&buf[2..]);
    buf.put_u8(chk);
    buf.freeze()
}

/// PING 指令（无参数）
pub fn ping(id: u8) -> Bytes {
    build(id, Instruction::Ping, &[])
}

/// READ 指令：读取 `addr` 起的 `len` 字节
pub fn read(id: u8, addr: u8, len: u8) -> Bytes {
    build(id, Instruction::Read, &[addr, len])
}

/// WRITE 指令：向 `addr` 写入 `data`
pub fn write(id: u8, addr: u8, data: &[u8]) -> Bytes {
    let mut params = Vec::with_capacity(1 + data.len());
    params.push(addr);
    params.extend_from_slice(data);
    build(id, Instruction::Write, &params)
}

/// REG_WRITE 指令：与 WRITE 同构，写入暂存缓冲区，等 ACTION 统一生效
pub fn reg_write(id: u8, addr: u8, data: &[u8]) -> Bytes {
    let mut params = Vec::with_capacity(1 + data.len());
    params.push(addr);
    params.extend_from_slice(data);
    build(id, Instruction::RegWrite, &params)
}

/// ACTION 指令：广播触发所有暂存的 REG_WRITE
pub fn action() -> Bytes {
    build(BROADCAST_ID, Instruction::Action, &[])
}

/// RECOVERY 指令：恢复出厂参数
pub fn recovery(id: u8) -> Bytes {
    build(id, Instruction::Recovery, &[])
}

/// RESET 指令：复位舵机
pub fn reset(id: u8) -> Bytes {
    build(id, Instruction::Reset, &[])
}

/// SYNC_WRITE 指令（广播）
///
/// 参数布局：`<addr, L, id_1, data_1…, id_2, data_2…, …>`，
/// 每个 `data_i` 必须恰好 `data_len` 字节。
pub fn sync_write(
    addr: u8,
    data_len: u8,
    entries: &[(u8, Vec<u8>)],
) -> Result<Bytes, ProtocolError> {
    let mut params = Vec::with_capacity(2 + entries.len() * (1 + data_len as usize));
    params.push(addr);
    params.push(data_len);
    for (id, data) in entries {
        if data.len() != data_len as usize {
            return Err(ProtocolError::InvalidLength {
                expected: data_len as usize,
                actual: data.len(),
            });
        }
        params.push(*id);
        params.extend_from_slice(data);
    }
    if params.len() > MAX_PARAMS {
        return Err(ProtocolError::PayloadTooLarge(params.len()));
    }
    Ok(build(BROADCAST_ID, Instruction::SyncWrite, &params))
}

/// SYNC_READ 指令（广播）
///
/// 参数布局：`<addr, L, id_1, id_2, …>`，每个被点名的舵机各自应答一帧。
pub fn sync_read(addr: u8, data_len: u8, ids: &[u8]) -> Result<Bytes, ProtocolError> {
    let mut params = Vec::with_capacity(2 + ids.len());
    params.push(addr);
    params.push(data_len);
    params.extend_from_slice(ids);
    if params.len() > MAX_PARAMS {
        return Err(ProtocolError::PayloadTooLarge(params.len()));
    }
    Ok(build(BROADCAST_ID, Instruction::SyncRead, &params))
}

/// 解析后的应答包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePacket {
    /// 应答舵机 ID
    pub id: u8,
    /// 状态字节（位域见 [`crate::protocol::status`]）
    pub status: u8,
    /// 参数字节（READ/SYNC_READ 时为寄存器内容）
    pub params: Vec<u8>,
}

impl ResponsePacket {
    /// 解析一个完整应答帧
    ///
    /// # 错误处理
    /// - 帧头不是 FF FF → `InvalidHeader`
    /// - 字节数不足 LEN + 4 → `IncompletePacket`
    /// - 校验和不匹配 → `InvalidChecksum`
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < 2 || bytes[0] != 0xFF || bytes[1] != 0xFF {
            return Err(ProtocolError::InvalidHeader);
        }
        if bytes.len() < 4 {
            return Err(ProtocolError::IncompletePacket {
                needed: 4,
                available: bytes.len(),
            });
        }

        let len = bytes[3] as usize;
        // LEN 至少覆盖 STATUS + CHK
        if len < 2 {
            return Err(ProtocolError::InvalidLength {
                expected: 2,
                actual: len,
            });
        }
        let total = len + 4;
        if bytes.len() < total {
            return Err(ProtocolError::IncompletePacket {
                needed: total,
                available: bytes.len(),
            });
        }

        let expected = checksum(&bytes[2..total - 1]);
        let actual = bytes[total - 1];
        if expected != actual {
            return Err(ProtocolError::InvalidChecksum { expected, actual });
        }

        Ok(Self {
            id: bytes[2],
            status: bytes[4],
            params: bytes[5..total - 1].to_vec(),
        })
    }
}

/// 流重组结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// 切出一个完整帧，剩余字节留在缓冲区
    Complete(Bytes),
    /// 缓冲区中还没有完整帧（帧头对齐的前缀已保留）
    Incomplete,
}

/// 从接收缓冲区切出第一个完整帧
///
/// - 扫描第一个 `FF FF` 帧头，之前的字节视为总线噪声丢弃；
/// - 缓冲区末尾的孤立 `0xFF` 可能是下一个帧头的前半，予以保留；
/// - 帧头就位但字节数不足 `LEN + 4` 时返回 [`Extracted::Incomplete`]，
///   缓冲区保持帧头对齐，等待下一次读取补齐。
///
/// 不校验校验和。对任意有效帧与噪声的拼接反复调用不会丢失帧字节。
pub fn extract_packet(buf: &mut BytesMut) -> Extracted {
    // 定位帧头，丢弃之前的噪声
    let mut start = 0;
    while start + 1 < buf.len() {
        if buf[start] == 0xFF && buf[start + 1] == 0xFF {
            break;
        }
        start += 1;
    }

    if start + 1 >= buf.len() {
        // 没有完整帧头：只保留末尾可能的半个帧头
        let keep_last = buf.last() == Some(&0xFF);
        let discard = if keep_last { buf.len() - 1 } else { buf.len() };
        if discard > 0 {
            trace!(discarded = discard, "reframer: dropped garbage bytes");
            buf.advance(discard);
        }
        return Extracted::Incomplete;
    }

    if start > 0 {
        trace!(discarded = start, "reframer: dropped garbage before header");
        buf.advance(start);
    }

    // 帧头已对齐到缓冲区开头；LEN 在偏移 3
    if buf.len() < 4 {
        return Extracted::Incomplete;
    }
    let total = buf[3] as usize + 4;
    if buf.len() < total {
        return Extracted::Incomplete;
    }

    Extracted::Complete(buf.split_to(total).freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_ping() {
        assert_eq!(&ping(1)[..], &[0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB]);
        assert_eq!(&ping(5)[..], &[0xFF, 0xFF, 0x05, 0x02, 0x01, 0xF7]);
    }

    #[test]
    fn test_build_read() {
        assert_eq!(
            &read(1, 0x38, 2)[..],
            &[0xFF, 0xFF, 0x01, 0x04, 0x02, 0x38, 0x02, 0xBE]
        );
    }

    #[test]
    fn test_build_write() {
        assert_eq!(
            &write(1, 0x2A, &[0x00, 0x08])[..],
            &[0xFF, 0xFF, 0x01, 0x05, 0x03, 0x2A, 0x00, 0x08, 0xC4]
        );
    }

    #[test]
    fn test_build_reg_write_same_layout_as_write() {
        let w = write(1, 0x2A, &[0x00, 0x08]);
        let r = reg_write(1, 0x2A, &[0x00, 0x08]);
        // 仅指令码不同，长度与参数布局一致
        assert_eq!(w.len(), r.len());
        assert_eq!(r[4], Instruction::RegWrite as u8);
        assert_eq!(&w[5..w.len() - 1], &r[5..r.len() - 1]);
    }

    #[test]
    fn test_build_action() {
        assert_eq!(&action()[..], &[0xFF, 0xFF, 0xFE, 0x02, 0x05, 0xFA]);
    }

    #[test]
    fn test_build_recovery_and_reset() {
        let rec = recovery(3);
        assert_eq!(rec[4], 0x06);
        let rst = reset(3);
        assert_eq!(rst[4], 0x0A);
        // LEN 均为 2（无参数）
        assert_eq!(rec[3], 2);
        assert_eq!(rst[3], 2);
    }

    #[test]
    fn test_build_sync_write() {
        let frame =
            sync_write(0x2A, 2, &[(1, vec![0x00, 0x08]), (2, vec![0x10, 0x00])]).unwrap();
        // FF FF FE LEN 83 2A 02 01 00 08 02 10 00 CHK
        assert_eq!(frame[2], BROADCAST_ID);
        assert_eq!(frame[4], Instruction::SyncWrite as u8);
        assert_eq!(&frame[5..13], &[0x2A, 0x02, 0x01, 0x00, 0x08, 0x02, 0x10, 0x00]);
        assert_eq!(frame[3] as usize, frame.len() - 4);
    }

    #[test]
    fn test_sync_write_length_enforced() {
        let err = sync_write(0x2A, 2, &[(1, vec![0x00])]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidLength {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_build_sync_read() {
        let frame = sync_read(0x38, 2, &[1, 2, 3]).unwrap();
        assert_eq!(frame[2], BROADCAST_ID);
        assert_eq!(frame[4], Instruction::SyncRead as u8);
        assert_eq!(&frame[5..10], &[0x38, 0x02, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_checksum_invariant_for_all_builders() {
        let frames = vec![
            ping(1),
            read(1, 0x38, 2),
            write(1, 0x2A, &[0x00, 0x08]),
            reg_write(7, 0x29, &[0x20]),
            action(),
            recovery(3),
            reset(9),
            sync_write(0x2A, 2, &[(1, vec![0x00, 0x08])]).unwrap(),
            sync_read(0x38, 2, &[1, 2]).unwrap(),
        ];
        for frame in frames {
            let body = &frame[2..frame.len() - 1];
            assert_eq!(
                frame[frame.len() - 1],
                checksum(body),
                "checksum mismatch for frame {:02X?}",
                &frame[..]
            );
        }
    }

    #[test]
    fn test_parse_ping_reply() {
        let packet = ResponsePacket::parse(&[0xFF, 0xFF, 0x01, 0x02, 0x00, 0xFC]).unwrap();
        assert_eq!(
            packet,
            ResponsePacket {
                id: 1,
                status: 0,
                params: vec![]
            }
        );
    }

    #[test]
    fn test_parse_read_reply() {
        let packet =
            ResponsePacket::parse(&[0xFF, 0xFF, 0x01, 0x04, 0x00, 0x18, 0x05, 0xDD]).unwrap();
        assert_eq!(packet.id, 1);
        assert_eq!(packet.status, 0);
        assert_eq!(packet.params, vec![0x18, 0x05]);
        assert_eq!(crate::protocol::codec::decode_uint(&packet.params), 1304);
    }

    #[test]
    fn test_parse_invalid_header() {
        assert_eq!(
            ResponsePacket::parse(&[0x00, 0xFF, 0x01, 0x02, 0x00, 0xFC]),
            Err(ProtocolError::InvalidHeader)
        );
        assert_eq!(ResponsePacket::parse(&[0xFF]), Err(ProtocolError::InvalidHeader));
    }

    #[test]
    fn test_parse_incomplete() {
        assert_eq!(
            ResponsePacket::parse(&[0xFF, 0xFF, 0x01]),
            Err(ProtocolError::IncompletePacket {
                needed: 4,
                available: 3
            })
        );
        assert_eq!(
            ResponsePacket::parse(&[0xFF, 0xFF, 0x01, 0x04, 0x00, 0x18]),
            Err(ProtocolError::IncompletePacket {
                needed: 8,
                available: 6
            })
        );
    }

    #[test]
    fn test_parse_bad_checksum() {
        let err = ResponsePacket::parse(&[0xFF, 0xFF, 0x01, 0x02, 0x00, 0x00]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidChecksum {
                expected: 0xFC,
                actual: 0x00
            }
        );
    }

    #[test]
    fn test_extract_garbage_prefix() {
        let mut buf = BytesMut::from(&[0x00, 0x00, 0xFF, 0xFF, 0x01, 0x02, 0x00, 0xFC][..]);
        match extract_packet(&mut buf) {
            Extracted::Complete(frame) => {
                assert_eq!(&frame[..], &[0xFF, 0xFF, 0x01, 0x02, 0x00, 0xFC]);
            }
            other => panic!("Expected Complete, got {:?}", other),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_extract_incomplete_keeps_header_aligned() {
        let mut buf = BytesMut::from(&[0x13, 0xFF, 0xFF, 0x01, 0x04, 0x00][..]);
        assert_eq!(extract_packet(&mut buf), Extracted::Incomplete);
        // 噪声前缀被丢弃，帧头对齐保留
        assert_eq!(&buf[..], &[0xFF, 0xFF, 0x01, 0x04, 0x00]);
    }

    #[test]
    fn test_extract_preserves_trailing_lone_ff() {
        let mut buf = BytesMut::from(&[0x00, 0x13, 0xFF][..]);
        assert_eq!(extract_packet(&mut buf), Extracted::Incomplete);
        assert_eq!(&buf[..], &[0xFF]);
    }

    #[test]
    fn test_extract_discards_pure_garbage() {
        let mut buf = BytesMut::from(&[0x00, 0x13, 0x42][..]);
        assert_eq!(extract_packet(&mut buf), Extracted::Incomplete);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_extract_leaves_rest_for_next_call() {
        // 两帧连发 + 尾部噪声：逐帧切出，无字节丢失
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0xFF, 0xFF, 0x01, 0x02, 0x00, 0xFC]);
        buf.extend_from_slice(&[0xFF, 0xFF, 0x02, 0x02, 0x00, 0xFB]);
        buf.extend_from_slice(&[0x99]);

        match extract_packet(&mut buf) {
            Extracted::Complete(frame) => assert_eq!(frame[2], 0x01),
            other => panic!("Expected first frame, got {:?}", other),
        }
        match extract_packet(&mut buf) {
            Extracted::Complete(frame) => assert_eq!(frame[2], 0x02),
            other => panic!("Expected second frame, got {:?}", other),
        }
        assert_eq!(extract_packet(&mut buf), Extracted::Incomplete);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_extract_does_not_validate_checksum() {
        // 校验和错误的帧仍按 LEN 切出，交给 parse 拒绝
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0x01, 0x02, 0x00, 0x00][..]);
        match extract_packet(&mut buf) {
            Extracted::Complete(frame) => {
                assert!(ResponsePacket::parse(&frame).is_err());
            }
            other => panic!("Expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_byte_by_byte_feed() {
        // 模拟串口逐字节到达：每步都允许调用重组器
        let reply = [0xFF, 0xFF, 0x01, 0x04, 0x00, 0x18, 0x05, 0xDD];
        let mut buf = BytesMut::new();
        for (i, b) in reply.iter().enumerate() {
            buf.extend_from_slice(&[*b]);
            let result = extract_packet(&mut buf);
            if i < reply.len() - 1 {
                assert_eq!(result, Extracted::Incomplete, "premature frame at byte {}", i);
            } else {
                match result {
                    Extracted::Complete(frame) => assert_eq!(&frame[..], &reply[..]),
                    other => panic!("Expected Complete, got {:?}", other),
                }
            }
        }
    }
}
