//! 总线事务器实现
//!
//! 一个事务的完整生命周期（同步驱动，无后台任务）：
//!
//! ```text
//! Idle ──发送指令帧──► Sending ──► AwaitingResponse / Draining ──► Idle
//!                                   │ 分块读取（≤10ms/次）
//!                                   │ 追加接收缓冲区 → 流重组
//!                                   └ 期限到 → NoResponse
//! ```
//!
//! 半双工总线的两条铁律在这里落实：
//! - 单舵机 WRITE 一定会产生应答，即使调用方不关心结果也必须把应答
//!   读走（Draining），否则残留字节会破坏后续所有事务的帧同步；
//! - 接收缓冲区挂在事务器上而不是事务的栈上：超时事务留下的半帧
//!   在下一个事务的第一次重组中补齐，不会丢。

use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::{trace, warn};

use crate::bus::error::BusError;
use crate::protocol::packet::{self, Extracted, ResponsePacket, BROADCAST_ID};
use crate::protocol::{ProtocolError, ServoStatus};
use crate::registers::{ControlTable, RegisterValue};
use crate::serial::{SerialAdapter, SerialError};

/// 单次分块读取的超时上限，保证接收循环对期限的响应性
const CHUNK_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// 单次分块读取的缓冲区大小（应答帧最长 259 字节，一般远小于此）
const READ_CHUNK_SIZE: usize = 64;

/// 事务器状态（由公开操作同步驱动，无后台任务）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusState {
    /// 空闲，无在途事务
    #[default]
    Idle,
    /// 正在写出指令帧
    Sending,
    /// 等待应答帧（调用方需要结果）
    AwaitingResponse,
    /// 排空应答帧（调用方不关心结果，只为保持帧同步）
    Draining,
}

/// 总线事务器
///
/// 独占一个串口适配器和一张控制表；所有操作串行执行，同一实例
/// 同一时刻只有一个在途事务。适配器在 Drop 时随实例一起关闭
/// （RAII，恰好一次）。
pub struct Bus<S: SerialAdapter> {
    serial: S,
    table: Box<dyn ControlTable>,
    timeout: Duration,
    /// 未消费的接收字节，跨事务保留
    rx_buf: BytesMut,
    state: BusState,
}

impl<S: SerialAdapter> Bus<S> {
    /// 创建事务器
    ///
    /// # 参数
    /// - `serial`: 串口适配器（被独占持有）
    /// - `table`: 舵机型号控制表
    /// - `timeout`: 单事务应答期限
    pub fn new(serial: S, table: Box<dyn ControlTable>, timeout: Duration) -> Self {
        Self {
            serial,
            table,
            timeout,
            rx_buf: BytesMut::new(),
            state: BusState::Idle,
        }
    }

    /// 当前控制表
    pub fn control_table(&self) -> &dyn ControlTable {
        self.table.as_ref()
    }

    /// 当前状态（诊断用）
    pub fn state(&self) -> BusState {
        self.state
    }

    /// 底层适配器的可变引用（测试与诊断用）
    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    // ------------------------------------------------------------------
    // 公开操作
    // ------------------------------------------------------------------

    /// PING：确认舵机在线，返回其状态信息
    ///
    /// # 错误处理
    /// - 期限内无应答 → `BusError::NoResponse`
    pub fn ping(&mut self, id: u8) -> Result<ServoStatus, BusError> {
        reject_broadcast(id)?;
        self.send(&packet::ping(id))?;
        let resp = self.receive(BusState::AwaitingResponse)?;
        Ok(ServoStatus::from_response(resp.id, resp.status))
    }

    /// 读寄存器，返回用户单位值（弧度、伏特、布尔、模式等）
    pub fn read(&mut self, id: u8, name: &str) -> Result<RegisterValue, BusError> {
        let params = self.read_params(id, name)?;
        Ok(self.table.decode_user(name, &params)?)
    }

    /// 读寄存器，返回原始无符号整数（不做语义换算）
    pub fn read_raw(&mut self, id: u8, name: &str) -> Result<u32, BusError> {
        let params = self.read_params(id, name)?;
        Ok(self.table.decode_raw(&params))
    }

    /// 写寄存器（用户单位），不关心应答结果
    ///
    /// 半双工总线上单舵机 WRITE 仍会产生应答；本方法把应答读走后
    /// 静默丢弃解析出的状态，只为保持字节流对齐。传输/协议层错误
    /// 仍然如实上报。广播写（0xFE）没有应答，跳过排空。
    pub fn write(
        &mut self,
        id: u8,
        name: &str,
        value: impl Into<RegisterValue>,
    ) -> Result<(), BusError> {
        let data = self.table.encode_user(name, &value.into())?;
        let addr = self.table.lookup(name)?.address;
        self.write_bytes(id, addr, &data)
    }

    /// 写寄存器（用户单位），等待并返回舵机状态
    pub fn write_await(
        &mut self,
        id: u8,
        name: &str,
        value: impl Into<RegisterValue>,
    ) -> Result<ServoStatus, BusError> {
        reject_broadcast(id)?;
        let data = self.table.encode_user(name, &value.into())?;
        let addr = self.table.lookup(name)?.address;
        self.send(&packet::write(id, addr, &data))?;
        let resp = self.receive(BusState::AwaitingResponse)?;
        Ok(ServoStatus::from_response(resp.id, resp.status))
    }

    /// 写寄存器（原始整数），不关心应答结果
    pub fn write_raw(&mut self, id: u8, name: &str, value: u32) -> Result<(), BusError> {
        let data = self.table.encode_raw(name, value)?;
        let addr = self.table.lookup(name)?.address;
        self.write_bytes(id, addr, &data)
    }

    /// 写寄存器（原始整数），等待并返回舵机状态
    pub fn write_raw_await(
        &mut self,
        id: u8,
        name: &str,
        value: u32,
    ) -> Result<ServoStatus, BusError> {
        reject_broadcast(id)?;
        let data = self.table.encode_raw(name, value)?;
        let addr = self.table.lookup(name)?.address;
        self.send(&packet::write(id, addr, &data))?;
        let resp = self.receive(BusState::AwaitingResponse)?;
        Ok(ServoStatus::from_response(resp.id, resp.status))
    }

    /// REG_WRITE：写入舵机暂存缓冲区，等 [`Bus::action`] 统一生效
    pub fn reg_write(
        &mut self,
        id: u8,
        name: &str,
        value: impl Into<RegisterValue>,
    ) -> Result<ServoStatus, BusError> {
        reject_broadcast(id)?;
        let data = self.table.encode_user(name, &value.into())?;
        let addr = self.table.lookup(name)?.address;
        self.send(&packet::reg_write(id, addr, &data))?;
        let resp = self.receive(BusState::AwaitingResponse)?;
        Ok(ServoStatus::from_response(resp.id, resp.status))
    }

    /// ACTION：广播触发所有暂存的 REG_WRITE（无应答）
    pub fn action(&mut self) -> Result<(), BusError> {
        self.send(&packet::action())
    }

    /// SYNC_READ：一次广播读取多个舵机的同一寄存器（用户单位）
    ///
    /// 结果按 `ids` 的顺序排列。应答按 ID 与请求列表严格匹配，绝不
    /// 静默重排；任何一个舵机超时、校验和错误或 ID 不在请求列表中，
    /// 整个调用返回 [`BusError::PartialRead`] 并列出缺失的 ID。
    pub fn sync_read(&mut self, ids: &[u8], name: &str) -> Result<Vec<RegisterValue>, BusError> {
        let params_list = self.sync_read_params(ids, name)?;
        let mut values = Vec::with_capacity(params_list.len());
        for params in &params_list {
            values.push(self.table.decode_user(name, params)?);
        }
        Ok(values)
    }

    /// SYNC_READ 的原始整数版本
    pub fn sync_read_raw(&mut self, ids: &[u8], name: &str) -> Result<Vec<u32>, BusError> {
        let params_list = self.sync_read_params(ids, name)?;
        Ok(params_list.iter().map(|p| self.table.decode_raw(p)).collect())
    }

    /// SYNC_WRITE：一次广播写多个舵机的同一寄存器（用户单位，无应答）
    pub fn sync_write(
        &mut self,
        name: &str,
        entries: &[(u8, RegisterValue)],
    ) -> Result<(), BusError> {
        let def = *self.table.lookup(name)?;
        let mut encoded = Vec::with_capacity(entries.len());
        for (id, value) in entries {
            encoded.push((*id, self.table.encode_user(name, value)?));
        }
        let frame = packet::sync_write(def.address, def.len, &encoded)?;
        self.send(&frame)
    }

    /// SYNC_WRITE 的原始整数版本
    pub fn sync_write_raw(&mut self, name: &str, entries: &[(u8, u32)]) -> Result<(), BusError> {
        let def = *self.table.lookup(name)?;
        let mut encoded = Vec::with_capacity(entries.len());
        for (id, value) in entries {
            encoded.push((*id, self.table.encode_raw(name, *value)?));
        }
        let frame = packet::sync_write(def.address, def.len, &encoded)?;
        self.send(&frame)
    }

    /// RECOVERY：恢复出厂参数，返回舵机状态
    pub fn recovery(&mut self, id: u8) -> Result<ServoStatus, BusError> {
        reject_broadcast(id)?;
        self.send(&packet::recovery(id))?;
        let resp = self.receive(BusState::AwaitingResponse)?;
        Ok(ServoStatus::from_response(resp.id, resp.status))
    }

    /// RESET：复位舵机，返回舵机状态
    pub fn reset(&mut self, id: u8) -> Result<ServoStatus, BusError> {
        reject_broadcast(id)?;
        self.send(&packet::reset(id))?;
        let resp = self.receive(BusState::AwaitingResponse)?;
        Ok(ServoStatus::from_response(resp.id, resp.status))
    }

    // ------------------------------------------------------------------
    // 内部：事务原语
    // ------------------------------------------------------------------

    /// READ 事务，返回应答参数字节
    fn read_params(&mut self, id: u8, name: &str) -> Result<Vec<u8>, BusError> {
        reject_broadcast(id)?;
        let def = *self.table.lookup(name)?;
        self.send(&packet::read(id, def.address, def.len))?;
        let resp = self.receive(BusState::AwaitingResponse)?;
        Ok(resp.params)
    }

    /// 不等待结果的 WRITE 事务：应答被排空丢弃，帧同步得以保持
    fn write_bytes(&mut self, id: u8, addr: u8, data: &[u8]) -> Result<(), BusError> {
        self.send(&packet::write(id, addr, data))?;
        if id == BROADCAST_ID {
            // 广播无应答，无需排空
            return Ok(());
        }
        let resp = self.receive(BusState::Draining)?;
        trace!(id = resp.id, status = resp.status, "drained write reply");
        Ok(())
    }

    /// SYNC_READ 事务，返回按 `ids` 顺序排列的参数字节
    fn sync_read_params(&mut self, ids: &[u8], name: &str) -> Result<Vec<Vec<u8>>, BusError> {
        let def = *self.table.lookup(name)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let frame = packet::sync_read(def.address, def.len, ids)?;
        self.send(&frame)?;

        // 每个被点名的舵机应答一帧；按 ID 归桶后再按请求顺序取出。
        // 期限对每帧应答单独计算：慢舵机不吃掉后续舵机的时间预算。
        self.state = BusState::AwaitingResponse;
        let mut replies: Vec<(u8, Vec<u8>)> = Vec::with_capacity(ids.len());
        for _ in 0..ids.len() {
            match self.receive_until(Instant::now() + self.timeout) {
                Ok(resp) => {
                    if !ids.contains(&resp.id) {
                        warn!(id = resp.id, "sync_read: reply from unrequested servo");
                        break;
                    }
                    if replies.iter().any(|(id, _)| *id == resp.id) {
                        warn!(id = resp.id, "sync_read: duplicate reply");
                        break;
                    }
                    if resp.params.len() != def.len as usize {
                        warn!(
                            id = resp.id,
                            expected = def.len,
                            actual = resp.params.len(),
                            "sync_read: short reply"
                        );
                        break;
                    }
                    replies.push((resp.id, resp.params));
                }
                Err(BusError::NoResponse) => break,
                Err(BusError::Protocol(e)) => {
                    warn!(error = %e, "sync_read: malformed reply");
                    break;
                }
                Err(e) => {
                    // 传输层错误原样上报
                    self.state = BusState::Idle;
                    return Err(e);
                }
            }
        }
        self.state = BusState::Idle;

        let mut out = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match replies.iter().find(|(rid, _)| rid == id) {
                Some((_, params)) => out.push(params.clone()),
                None => missing.push(*id),
            }
        }
        if !missing.is_empty() {
            return Err(BusError::PartialRead { missing });
        }
        Ok(out)
    }

    /// 写出一个指令帧
    fn send(&mut self, frame: &[u8]) -> Result<(), BusError> {
        self.state = BusState::Sending;
        trace!(frame = %hex(frame), "TX");
        let result = self.serial.write_all(frame);
        self.state = BusState::Idle;
        result.map_err(BusError::from)
    }

    /// 接收一个应答帧（状态机包装）
    fn receive(&mut self, state: BusState) -> Result<ResponsePacket, BusError> {
        self.state = state;
        let result = self.receive_until(Instant::now() + self.timeout);
        self.state = BusState::Idle;
        result
    }

    /// 接收循环：分块读取 + 流重组，直到切出完整帧或到达期限
    ///
    /// 期限到达时返回 `NoResponse`；此时缓冲区里帧头对齐的残帧被
    /// 保留，可能在下一个事务的读取中补齐。
    fn receive_until(&mut self, deadline: Instant) -> Result<ResponsePacket, BusError> {
        loop {
            if let Extracted::Complete(frame) = packet::extract_packet(&mut self.rx_buf) {
                trace!(frame = %hex(&frame), "RX");
                return ResponsePacket::parse(&frame).map_err(|e| {
                    if let ProtocolError::InvalidChecksum { expected, actual } = e {
                        warn!(expected, actual, "response checksum mismatch");
                    }
                    BusError::from(e)
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(BusError::NoResponse);
            }
            let chunk_timeout = CHUNK_READ_TIMEOUT.min(deadline - now);

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            match self.serial.read_chunk(&mut chunk, chunk_timeout) {
                Ok(0) | Err(SerialError::Timeout) => continue,
                Ok(n) => self.rx_buf.extend_from_slice(&chunk[..n]),
                Err(e) => return Err(BusError::from(e)),
            }
        }
    }
}

/// 被应答的操作不允许广播 ID（0xFE 不会有任何舵机应答）
fn reject_broadcast(id: u8) -> Result<(), BusError> {
    if id == BROADCAST_ID {
        return Err(BusError::BroadcastNotAllowed);
    }
    Ok(())
}

/// 帧字节的十六进制显示（trace 日志用）
fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
