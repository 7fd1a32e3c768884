// tools/comtap_cli/main.rs
//
// Command-line front end for the comtap serial bridge.
//
//   comtap_cli ports
//   comtap_cli monitor --port 3 --baud 9600 --code 0x0A
//
// In monitor mode every stdin line is sent using the transmit text syntax
// (e.g. `0x02 "AT" 13 10`). Ctrl-C closes the port.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use comtap_lib::io::serial::parse_send_input;
use comtap_lib::{
    init_file_logging, set_stderr_level, stop_file_logging, Bridge, BridgeConfig, DelimiterSetting,
    Frame, LogLevel, Parity, PortSetting, SessionEvent,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "comtap_cli", version, about = "Serial port monitor and sender")]
struct Cli {
    /// Config file (defaults to <config dir>/comtap/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mirror log output to a timestamped file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Only print warnings to stderr (the log file still gets everything)
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports present on this host
    Ports {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Open a port, print received frames and send stdin lines
    Monitor(MonitorArgs),
}

#[derive(Args)]
struct MonitorArgs {
    /// Port number (COM number, or trailing digits of the device path)
    #[arg(long)]
    port: u32,

    /// Explicit device name, overriding the number lookup
    #[arg(long)]
    name: Option<String>,

    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// none, odd or even (or N/O/E)
    #[arg(long, default_value = "none")]
    parity: Parity,

    #[arg(long, default_value_t = 1)]
    stop_bits: u8,

    #[arg(long, default_value_t = 8)]
    word_length: u8,

    /// Split frames after this byte (e.g. 0x0A)
    #[arg(long, value_parser = parse_code, conflicts_with = "interval")]
    code: Option<u8>,

    /// Split frames after this many milliseconds
    #[arg(long)]
    interval: Option<u32>,

    /// Print frames as JSON lines
    #[arg(long)]
    json: bool,
}

fn parse_code(s: &str) -> Result<u8, String> {
    match parse_send_input(s).map_err(|e| e.to_string())?.as_slice() {
        [byte] => Ok(*byte),
        _ => Err(format!("expected a single byte value, got {:?}", s)),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<BridgeConfig, String> {
    match path.or_else(BridgeConfig::default_path) {
        Some(path) => BridgeConfig::load(&path).map_err(|e| e.to_string()),
        None => Ok(BridgeConfig::default()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.quiet {
        set_stderr_level(LogLevel::Warn);
    }

    if let Some(dir) = &cli.log_dir {
        if let Err(e) = init_file_logging(dir) {
            eprintln!("{}", e);
        }
    }

    let result = match load_config(cli.config) {
        Ok(config) => {
            let bridge = Bridge::with_system_driver(config);
            match cli.command {
                Command::Ports { json } => list_ports(&bridge, json).await,
                Command::Monitor(args) => monitor(&bridge, args).await,
            }
        }
        Err(e) => Err(e),
    };

    stop_file_logging();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn list_ports(bridge: &Bridge, json: bool) -> Result<(), String> {
    let snapshot = bridge.enumerate_ports().await.map_err(|e| e.to_string())?;

    if json {
        let text = serde_json::to_string_pretty(&snapshot).map_err(|e| e.to_string())?;
        println!("{}", text);
        return Ok(());
    }

    if snapshot.is_empty() {
        println!("No serial ports found");
    }
    for port in &snapshot.ports {
        println!("{:>4}  {}", port.number, port.name);
    }
    Ok(())
}

async fn monitor(bridge: &Bridge, args: MonitorArgs) -> Result<(), String> {
    let setting = PortSetting {
        port_no: args.port,
        baud: args.baud,
        parity: args.parity,
        stop_bit: args.stop_bits,
        word_length: args.word_length,
        port_name: args.name,
    };

    let mut stream = bridge.open(setting).await.map_err(|e| e.to_string())?;

    let delimiter = match (args.code, args.interval) {
        (Some(code), _) => Some(DelimiterSetting::code(code)),
        (None, Some(ms)) => Some(DelimiterSetting::interval(ms)),
        (None, None) => None,
    };
    if let Some(delimiter) = delimiter {
        if let Err(e) = bridge.configure(delimiter) {
            bridge.close().await;
            return Err(e.to_string());
        }
    }

    eprintln!("Monitoring {} (Ctrl-C to quit)", bridge.port_name().unwrap_or_default());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut at_line_start = true;
    let mut outcome = Ok(());

    loop {
        tokio::select! {
            event = stream.recv() => match event {
                Some(SessionEvent::Frame(frame)) => print_frame(&frame, args.json, &mut at_line_start),
                Some(SessionEvent::Fault { reason }) => {
                    outcome = Err(format!("device fault: {}", reason));
                    break;
                }
                None => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(text)) => match bridge.send_text(&text).await {
                    Ok(result) if result.is_success() => {
                        eprintln!("TX {}", hex::encode_upper(&result.data));
                    }
                    Ok(result) => eprintln!("TX failed: {}", result.error_message),
                    Err(e) => {
                        outcome = Err(e.to_string());
                        break;
                    }
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    eprintln!("stdin: {}", e);
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    bridge.close().await;
    if !at_line_start && !args.json {
        println!();
    }
    outcome
}

/// Append frames continue the current output line; others start a new one
fn print_frame(frame: &Frame, json: bool, at_line_start: &mut bool) {
    if json {
        if let Ok(text) = serde_json::to_string(frame) {
            println!("{}", text);
        }
        return;
    }

    let mut stdout = std::io::stdout().lock();
    if !frame.append && !*at_line_start {
        let _ = writeln!(stdout);
    }
    let rendered: Vec<String> = frame.data.iter().map(|b| hex::encode_upper([*b])).collect();
    let separator = if frame.append && !*at_line_start { " " } else { "" };
    let _ = write!(stdout, "{}{}", separator, rendered.join(" "));
    let _ = stdout.flush();
    *at_line_start = false;
}
