use std::collections::HashSet;
use std::io;
use std::io::Write;
use std::sync::mpsc::{Receiver, Sender};
use tracing::{error, info};

const DUMP_MEMORY_COLUMNS: usize = 8;

#[derive(Debug, PartialEq)]
pub enum RunMode {
    FreeMode,
    StepByStepMode,
    BreakMode(BreakPoints),
}

#[derive(Debug, PartialEq, Clone)]
pub struct BreakPoints {
    pub execute: HashSet<u16>,
}

impl BreakPoints {
    pub fn new() -> Self {
        Self {
            execute: HashSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.execute.is_empty()
    }
}

impl Default for BreakPoints {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CpuRegisters {
    pub pc: u16,
    pub sp: u16,
    pub ex: u16,
    pub ia: u16,
    pub regs: [u16; 8],
    pub cycles: u64,
    pub error: &'static str,
}

impl CpuRegisters {
    pub fn dump(&self) -> String {
        let mut dump = String::new();
        dump.push_str(&format!(
            "PC={:04X} SP={:04X} EX={:04X} IA={:04X} cycles={} error={}\n",
            self.pc, self.sp, self.ex, self.ia, self.cycles, self.error
        ));
        static NAMES: [&str; 8] = ["A", "B", "C", "X", "Y", "Z", "I", "J"];
        for (name, value) in NAMES.iter().zip(self.regs.iter()) {
            dump.push_str(&format!("{}={:04X} ", name, value));
        }
        dump
    }
}

#[derive(Debug)]
pub enum DebuggerCommand {
    RunModeChanged(RunMode),
    Step,
    ReqCpuRegs,
    ReadMemory(u32, usize),
    Disassemble(u16, usize),
    WriteRegister(String, u16),
    SaveConfig(String),
    Log(String),
    Quit,
}

#[derive(Debug)]
pub enum DebuggerResponse {
    CpuState(String, CpuRegisters, usize),
    Memory(u32, Vec<u16>),
    Listing(Vec<String>),
    BreakAt(u16),
}

/*
  Console monitor. Runs on its own thread and talks to the emulation
  loop over two channels; the loop stays the only owner of the CPU and
  the monitor only ever sees snapshots built from the read surface.
*/
pub struct Debugger {
    receiver: Receiver<DebuggerResponse>,
    sender: Sender<DebuggerCommand>,
    break_points: BreakPoints,
}

impl Debugger {
    pub fn new(receiver: Receiver<DebuggerResponse>, sender: Sender<DebuggerCommand>) -> Self {
        Self {
            receiver,
            sender,
            break_points: BreakPoints::new(),
        }
    }

    pub fn execute(&mut self) {
        info!("Monitor ready, empty line steps, 'q' quits");
        loop {
            while let Ok(resp) = self.receiver.try_recv() {
                self.handle_response(resp, "r");
            }

            let mut input = String::new();
            print!(">");
            io::stdout().flush().unwrap();
            if io::stdin().read_line(&mut input).unwrap_or(0) == 0 {
                // stdin closed
                let _ = self.sender.send(DebuggerCommand::Quit);
                return;
            }
            let mut command_iter = input.trim().split_ascii_whitespace();
            let cmd = command_iter.next().unwrap_or("");

            match cmd {
                cmd @ ("" | "r") => {
                    self.sender.send(DebuggerCommand::Step).unwrap();
                    self.recv_and_handle(cmd);
                }
                cmd @ "regs" => {
                    self.sender.send(DebuggerCommand::ReqCpuRegs).unwrap();
                    self.recv_and_handle(cmd);
                }
                cmd @ "m" => {
                    let args = command_iter.collect::<Vec<&str>>();
                    if args.len() != 2 {
                        error!("Wrong number of arguments for 'm' command: expected <hex address> <length>");
                        continue;
                    }
                    let (Some(address), Some(length)) =
                        (parse_hex32(args[0]), args[1].parse::<usize>().ok())
                    else {
                        error!("Unparsable arguments for 'm' command");
                        continue;
                    };
                    self.sender
                        .send(DebuggerCommand::ReadMemory(address, self.adjust_mem_len(length)))
                        .unwrap();
                    self.recv_and_handle(cmd);
                }
                cmd @ "d" => {
                    let args = command_iter.collect::<Vec<&str>>();
                    if args.len() != 2 {
                        error!("Wrong number of arguments for 'd' command: expected <hex address> <count>");
                        continue;
                    }
                    let (Some(address), Some(count)) =
                        (parse_hex16(args[0]), args[1].parse::<usize>().ok())
                    else {
                        error!("Unparsable arguments for 'd' command");
                        continue;
                    };
                    self.sender
                        .send(DebuggerCommand::Disassemble(address, count))
                        .unwrap();
                    self.recv_and_handle(cmd);
                }
                "b" => {
                    let args = command_iter.collect::<Vec<&str>>();
                    if args.is_empty() {
                        info!("Break on execute:");
                        for (i, addr) in self.break_points.execute.iter().enumerate() {
                            info!("{:02}:{:04X}", i, addr);
                        }
                    } else if args.len() != 2 {
                        error!("Wrong number of arguments for 'b' command: expected <add/remove> <hex address>");
                    } else {
                        let Some(address) = parse_hex16(args[1]) else {
                            error!("Unparsable breakpoint address {}", args[1]);
                            continue;
                        };
                        match args[0] {
                            "add" | "a" => {
                                self.break_points.execute.insert(address);
                                info!("Add execute breakpoint at {:04X}", address);
                            }
                            "remove" | "r" => {
                                self.break_points.execute.remove(&address);
                                info!("Remove execute breakpoint at {:04X}", address);
                            }
                            other => error!("Unrecognized breakpoint action: {}", other),
                        }
                    }
                }
                "set" => {
                    let args = command_iter.collect::<Vec<&str>>();
                    if args.len() != 2 {
                        error!("Wrong number of arguments for 'set' command: expected <register> <hex value>");
                        continue;
                    }
                    let Some(value) = parse_hex16(args[1]) else {
                        error!("Unparsable value {} for 'set' command", args[1]);
                        continue;
                    };
                    self.sender
                        .send(DebuggerCommand::WriteRegister(args[0].to_lowercase(), value))
                        .unwrap();
                    self.recv_and_handle("regs");
                }
                "save" => {
                    let args = command_iter.collect::<Vec<&str>>();
                    if args.len() != 1 {
                        error!("Wrong number of arguments for 'save' command: expected <path>");
                    } else {
                        self.sender
                            .send(DebuggerCommand::SaveConfig(args[0].to_string()))
                            .unwrap();
                    }
                }
                "go" => {
                    if self.break_points.is_empty() {
                        self.sender
                            .send(DebuggerCommand::RunModeChanged(RunMode::FreeMode))
                            .unwrap();
                        info!("No breakpoints set, switching to Free Mode");
                    } else {
                        self.sender
                            .send(DebuggerCommand::RunModeChanged(RunMode::BreakMode(
                                self.break_points.clone(),
                            )))
                            .unwrap();
                        info!("Breakpoints set, switching to Break Mode");
                    }
                }
                "log" => {
                    let args = command_iter.collect::<Vec<&str>>();
                    if args.len() != 1 {
                        error!("Wrong number of arguments for 'log' command: expected <level>");
                    } else {
                        self.sender
                            .send(DebuggerCommand::Log(args[0].to_string()))
                            .unwrap();
                    }
                }
                "q" => {
                    self.sender.send(DebuggerCommand::Quit).unwrap();
                    return;
                }
                cmd => {
                    error!("Unrecognized command {cmd}")
                }
            }
        }
    }

    fn recv_and_handle(&mut self, cmd: &str) {
        match self.receiver.recv() {
            Ok(resp) => self.handle_response(resp, cmd),
            Err(_) => error!("Emulation loop is gone"),
        }
    }

    fn adjust_mem_len(&self, n: usize) -> usize {
        let rem = n % DUMP_MEMORY_COLUMNS;
        if rem == 0 { n } else { n + DUMP_MEMORY_COLUMNS - rem }
    }

    fn handle_response(&mut self, resp: DebuggerResponse, cmd: &str) {
        match resp {
            DebuggerResponse::BreakAt(address) => {
                info!("Break at {:04X}", address);
            }
            DebuggerResponse::CpuState(disassembled, regs, cycles) => {
                if cmd == "r" || cmd == "regs" || cmd == "" {
                    info!("CPU Registers [{}]:\n{}", cycles, regs.dump());
                }
                if cmd != "regs" {
                    info!("{}", disassembled);
                }
            }
            DebuggerResponse::Listing(lines) => {
                for line in lines {
                    info!("{}", line);
                }
            }
            DebuggerResponse::Memory(address, words) => {
                let mut buffer = String::new();
                let mut base_address = address;
                for (i, word) in words.iter().enumerate() {
                    buffer.push_str(&format!("{:04X} ", word));
                    if (i + 1) % DUMP_MEMORY_COLUMNS == 0 {
                        info!("{:05X} {}", base_address, buffer);
                        buffer.clear();
                        base_address = address + (i as u32) + 1;
                    }
                }
                if !buffer.is_empty() {
                    info!("{:05X} {}", base_address, buffer);
                }
            }
        }
    }
}

fn parse_hex16(text: &str) -> Option<u16> {
    u16::from_str_radix(text.trim_start_matches("0x"), 16).ok()
}

fn parse_hex32(text: &str) -> Option<u32> {
    u32::from_str_radix(text.trim_start_matches("0x"), 16).ok()
}
