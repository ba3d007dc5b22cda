use std::sync::mpsc;
use std::sync::mpsc::Sender;
use std::thread::spawn;
use tracing::{error, info};

use crate::core::config::Config;
use crate::core::cpu::disassembler::Disassembler;
use crate::core::cpu::{Cpu, CpuError, RW_EXCESS, RW_INTERRUPT_ADDRESS, RW_STACK_POINTER};
use crate::core::debugger::{
    BreakPoints, CpuRegisters, Debugger, DebuggerCommand, DebuggerResponse, RunMode,
};
use crate::core::devices::tty::ConsoleDevice;
use crate::core::memory::{MEM_FLAG_BREAK_EXECUTE, MEM_FLAG_NONE, ProgramImage};
use crate::log::Logger;

pub const EMU_NAME: &str = "r-dcpu16";
pub const EMU_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const EMU_BUILD_DATE_TIME: &str = build_time::build_time_local!("%Y-%m-%d %H:%M:%S");

// how often the free-running loop polls the monitor channel
const COMMAND_POLL_STEPS: u64 = 4096;

pub struct Emulator {
    cpu: Cpu,
    run_mode: RunMode,
    logger: Logger,
    config: Config,
    break_points: BreakPoints,
    last_cycles: usize,
    steps_since_poll: u64,
}

impl Emulator {
    pub fn new(config: &Config, logger: Logger) -> Self {
        info!("Building emulator ...");
        let mut cpu = Cpu::new();

        if config.console_device {
            cpu.attach_device(Box::new(ConsoleDevice::new()));
        }

        let mut break_points = BreakPoints::new();
        break_points.execute.extend(config.break_on_execute.iter());

        Self {
            cpu,
            run_mode: RunMode::StepByStepMode,
            logger,
            config: config.clone(),
            break_points,
            last_cycles: 0,
            steps_since_poll: 0,
        }
    }

    pub fn get_cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn get_cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn load_image(&mut self, image: &ProgramImage) {
        info!("Loading image of {} words, MD5: {}", image.len(), image.md5);
        self.cpu.load_program(&image.words);
        // loading clears the flags bytes, re-mark the breakpoints
        self.apply_break_points(&self.break_points.clone());
    }

    fn apply_break_points(&mut self, break_points: &BreakPoints) {
        for addr in self.break_points.execute.iter() {
            self.cpu.set_memory_flags(*addr, MEM_FLAG_NONE);
        }
        self.break_points = break_points.clone();
        for addr in self.break_points.execute.iter() {
            self.cpu.set_memory_flags(*addr, MEM_FLAG_BREAK_EXECUTE);
        }
    }

    /// Headless run: steps until a fault latches or the step limit is
    /// exhausted. Returns the number of executed steps.
    pub fn run(&mut self, max_steps: u64) -> u64 {
        let mut steps = 0u64;
        while steps < max_steps && self.cpu.get_error() == CpuError::None {
            self.cpu.step();
            steps += 1;
        }
        let error = self.cpu.get_error();
        if error != CpuError::None {
            error!(
                "Execution stopped after {} steps: {} at {:04X}",
                steps,
                error.name(),
                self.cpu.get_last_instruction().address
            );
        }
        info!(
            "Executed {} steps, {} cycles, PC={:04X}",
            steps,
            self.cpu.get_cycles(),
            self.cpu.get_pc()
        );
        steps
    }

    /// Interactive run under the console monitor.
    pub fn emulate(&mut self) {
        let (loop_tx, monitor_rx) = mpsc::channel::<DebuggerResponse>();
        let (monitor_tx, loop_rx) = mpsc::channel::<DebuggerCommand>();

        let mut monitor = Debugger::new(monitor_rx, monitor_tx);
        info!("Launching monitor ..");
        spawn(move || {
            monitor.execute();
        });

        self.run_mode = RunMode::StepByStepMode;

        loop {
            if matches!(self.run_mode, RunMode::StepByStepMode) {
                let Ok(cmd) = loop_rx.recv() else {
                    return;
                };
                match self.handle_command(cmd, &loop_tx) {
                    CommandOutcome::Step => {
                        self.last_cycles = self.cpu.step();
                        self.send_cpu_info(&loop_tx);
                    }
                    CommandOutcome::Handled => {}
                    CommandOutcome::Quit => return,
                }
                continue;
            }

            // free or break mode: run flat out, poll the monitor
            // channel every few thousand steps
            self.steps_since_poll += 1;
            if self.steps_since_poll >= COMMAND_POLL_STEPS {
                self.steps_since_poll = 0;
                while let Ok(cmd) = loop_rx.try_recv() {
                    match self.handle_command(cmd, &loop_tx) {
                        CommandOutcome::Quit => return,
                        CommandOutcome::Step => {
                            // a step request drops back to step mode
                            self.run_mode = RunMode::StepByStepMode;
                            self.send_cpu_info(&loop_tx);
                        }
                        CommandOutcome::Handled => {}
                    }
                }
                if matches!(self.run_mode, RunMode::StepByStepMode) {
                    continue;
                }
            }

            self.last_cycles = self.cpu.step();

            let pc = self.cpu.get_pc();
            if matches!(self.run_mode, RunMode::BreakMode(_))
                && self.cpu.memory_flags(pc) & MEM_FLAG_BREAK_EXECUTE != 0
            {
                info!("Break on execute at {:04X}", pc);
                loop_tx.send(DebuggerResponse::BreakAt(pc)).unwrap();
                self.run_mode = RunMode::StepByStepMode;
                self.send_cpu_info(&loop_tx);
            }

            if self.cpu.get_error() != CpuError::None {
                self.run_mode = RunMode::StepByStepMode;
                self.send_cpu_info(&loop_tx);
            }
        }
    }

    fn handle_command(
        &mut self,
        cmd: DebuggerCommand,
        loop_tx: &Sender<DebuggerResponse>,
    ) -> CommandOutcome {
        match cmd {
            DebuggerCommand::Step => CommandOutcome::Step,
            DebuggerCommand::Quit => CommandOutcome::Quit,
            DebuggerCommand::Log(level) => {
                self.logger.set_log_level(level.as_str());
                self.config.log_level = level;
                CommandOutcome::Handled
            }
            DebuggerCommand::RunModeChanged(mode) => {
                if let RunMode::BreakMode(ref break_points) = mode {
                    self.apply_break_points(&break_points.clone());
                }
                self.run_mode = mode;
                CommandOutcome::Handled
            }
            DebuggerCommand::ReqCpuRegs => {
                loop_tx.send(self.get_step_info()).unwrap();
                CommandOutcome::Handled
            }
            DebuggerCommand::ReadMemory(address, length) => {
                let mut words = Vec::with_capacity(length);
                for offset in 0..length {
                    words.push(self.cpu.read(address + offset as u32));
                }
                loop_tx
                    .send(DebuggerResponse::Memory(address, words))
                    .unwrap();
                CommandOutcome::Handled
            }
            DebuggerCommand::Disassemble(address, count) => {
                loop_tx
                    .send(DebuggerResponse::Listing(self.disassemble(address, count)))
                    .unwrap();
                CommandOutcome::Handled
            }
            DebuggerCommand::WriteRegister(name, value) => {
                self.write_register(name.as_str(), value);
                loop_tx.send(self.get_step_info()).unwrap();
                CommandOutcome::Handled
            }
            DebuggerCommand::SaveConfig(path) => {
                // persist the session's breakpoints and log level
                self.config.break_on_execute = self.break_points.execute.iter().copied().collect();
                self.config.break_on_execute.sort_unstable();
                match self.config.save_to_file(path.as_str()) {
                    Ok(()) => info!("Configuration saved to {}", path),
                    Err(e) => error!("Unable to save configuration to {}: {}", path, e),
                }
                CommandOutcome::Handled
            }
        }
    }

    fn write_register(&mut self, name: &str, value: u16) {
        match name {
            "pc" => self.cpu.set_pc(value),
            "sp" => self.cpu.write(RW_STACK_POINTER, value),
            "ex" => self.cpu.write(RW_EXCESS, value),
            "ia" => self.cpu.write(RW_INTERRUPT_ADDRESS, value),
            other => match register_index(other) {
                Some(index) => self.cpu.get_registers_mut()[index] = value,
                None => error!("Unknown register {}", other),
            },
        }
    }

    fn send_cpu_info(&mut self, loop_tx: &Sender<DebuggerResponse>) {
        loop_tx.send(self.get_step_info()).unwrap();
    }

    fn get_step_info(&self) -> DebuggerResponse {
        let listing = self.disassemble(self.cpu.get_pc(), 1);
        let disassembled = listing.into_iter().next().unwrap_or_default();
        let regs = CpuRegisters {
            pc: self.cpu.get_pc(),
            sp: self.cpu.get_sp(),
            ex: self.cpu.get_ex(),
            ia: self.cpu.get_ia(),
            regs: *self.cpu.get_registers(),
            cycles: self.cpu.get_cycles(),
            error: self.cpu.get_error().name(),
        };
        DebuggerResponse::CpuState(disassembled, regs, self.last_cycles)
    }

    /// Builds a listing of `count` instructions starting at `address`
    /// from a snapshot taken through the read surface, so the live CPU
    /// is never disturbed.
    fn disassemble(&self, address: u16, count: usize) -> Vec<String> {
        // three words per instruction is the encoding maximum
        let span = count.saturating_mul(3).min(debugger_snapshot_limit(address));
        let mut words = Vec::with_capacity(span);
        for offset in 0..span {
            words.push(self.cpu.read(address as u32 + offset as u32));
        }
        let mut disassembler = Disassembler::new();
        disassembler.disassemble(&words, address);
        disassembler
            .instructions()
            .iter()
            .take(count)
            .map(|i| i.formatted.clone())
            .collect()
    }
}

fn debugger_snapshot_limit(address: u16) -> usize {
    crate::core::memory::MEMORY_SIZE - address as usize
}

fn register_index(name: &str) -> Option<usize> {
    static NAMES: [&str; 8] = ["a", "b", "c", "x", "y", "z", "i", "j"];
    NAMES.iter().position(|n| *n == name)
}

enum CommandOutcome {
    Step,
    Handled,
    Quit,
}
