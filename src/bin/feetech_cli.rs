//! Feetech 总线操作工具
//!
//! 事务器之上的瘦客户端：总线扫描、在线确认、寄存器读写、ID 修改。
//! 日志级别通过 `RUST_LOG` 控制（如 `RUST_LOG=feetech_sdk=trace` 可以
//! 看到逐帧的 TX/RX 十六进制转储）。

use clap::{Parser, Subcommand};
use std::process;

use feetech_sdk::prelude::*;

/// Feetech 总线舵机操作工具
#[derive(Parser, Debug)]
#[command(name = "feetech-cli")]
#[command(about = "Feetech servo bus utility - scan/ping/read/write/set-id", long_about = None)]
struct Cli {
    /// 串口设备路径
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// 波特率（bps）
    #[arg(long, default_value = "1000000")]
    baud: u32,

    /// 单事务应答期限（毫秒）
    #[arg(long, default_value = "50")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 扫描 ID 区间，列出在线舵机
    Scan {
        /// 起始 ID
        #[arg(long, default_value = "1")]
        start: u8,
        /// 结束 ID（含）
        #[arg(long, default_value = "20")]
        end: u8,
    },
    /// 确认单个舵机在线并显示状态
    Ping {
        /// 舵机 ID
        id: u8,
    },
    /// 读寄存器
    Read {
        /// 舵机 ID
        id: u8,
        /// 寄存器名（见 `registers` 子命令）
        register: String,
        /// 显示原始整数而非用户单位
        #[arg(long)]
        raw: bool,
    },
    /// 写寄存器（数值寄存器；bool/mode 请配合 --raw 使用）
    Write {
        /// 舵机 ID
        id: u8,
        /// 寄存器名
        register: String,
        /// 待写入的值
        value: f64,
        /// 按原始整数写入，不做单位换算
        #[arg(long)]
        raw: bool,
    },
    /// 修改舵机 ID（解锁 EEPROM → 写 id → 重新上锁）
    SetId {
        /// 当前 ID
        id: u8,
        /// 新 ID（0-253）
        new_id: u8,
    },
    /// 列出当前控制表的全部寄存器
    Registers,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let bus = BusBuilder::new()
        .port(cli.port.as_str())
        .baud_rate(cli.baud)
        .timeout_ms(cli.timeout_ms)
        .build();
    let mut bus = match bus {
        Ok(bus) => bus,
        Err(e) => {
            eprintln!("Failed to open bus on {}: {}", cli.port, e);
            process::exit(1);
        }
    };

    if let Err(e) = run(&mut bus, cli.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(bus: &mut Bus<SerialPortAdapter>, command: Command) -> Result<(), BusError> {
    match command {
        Command::Scan { start, end } => scan(bus, start, end),
        Command::Ping { id } => {
            let status = bus.ping(id)?;
            print_status(&status);
            Ok(())
        }
        Command::Read { id, register, raw } => {
            if raw {
                let value = bus.read_raw(id, &register)?;
                println!("{} = {} (raw)", register, value);
            } else {
                let value = bus.read(id, &register)?;
                println!("{} = {:?}", register, value);
            }
            Ok(())
        }
        Command::Write {
            id,
            register,
            value,
            raw,
        } => {
            let status = if raw {
                bus.write_raw_await(id, &register, value as u32)?
            } else {
                bus.write_await(id, &register, value)?
            };
            print_status(&status);
            Ok(())
        }
        Command::SetId { id, new_id } => set_id(bus, id, new_id),
        Command::Registers => {
            let table = bus.control_table();
            println!("Model: {}", table.model_name());
            println!("{:<24} {:>6} {:>4}", "NAME", "ADDR", "LEN");
            for (name, def) in table.registers() {
                println!("{:<24} {:>6} {:>4}", name, def.address, def.len);
            }
            Ok(())
        }
    }
}

fn scan(bus: &mut Bus<SerialPortAdapter>, start: u8, end: u8) -> Result<(), BusError> {
    println!("Scanning IDs {}..={} ...", start, end);
    let mut found = 0usize;
    for id in start..=end {
        match bus.ping(id) {
            Ok(status) => {
                found += 1;
                let firmware = match (
                    bus.read_raw(id, "firmware_version_main"),
                    bus.read_raw(id, "firmware_version_sub"),
                ) {
                    (Ok(main), Ok(sub)) => format!("fw {}.{}", main, sub),
                    _ => "fw ?".to_string(),
                };
                println!(
                    "  ID {:3}: online, {}, torque {}, faults {:?}",
                    id,
                    firmware,
                    if status.torque_enabled { "on" } else { "off" },
                    status.faults
                );
            }
            Err(BusError::NoResponse) => {}
            Err(e) => return Err(e),
        }
    }
    println!("{} servo(s) found.", found);
    Ok(())
}

fn set_id(bus: &mut Bus<SerialPortAdapter>, id: u8, new_id: u8) -> Result<(), BusError> {
    // EEPROM 区默认上锁，需要先解锁
    bus.write(id, "lock", false)?;
    let result = bus.write(id, "id", new_id as f64);
    // 无论写 id 成败都尝试恢复锁（此时舵机已经使用新 ID）
    let lock_target = if result.is_ok() { new_id } else { id };
    let relock = bus.write(lock_target, "lock", true);
    result?;
    relock?;
    println!("Servo {} renamed to {}", id, new_id);
    Ok(())
}

fn print_status(status: &ServoStatus) {
    println!(
        "ID {}: status 0x{:02X}, torque {}, faults {:?}",
        status.id,
        status.raw,
        if status.torque_enabled { "on" } else { "off" },
        status.faults
    );
}
