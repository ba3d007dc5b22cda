use std::mem;
use tracing::{error, info, warn};

use crate::core::cpu::instruction::{Instruction, InstructionData, OP_EXT, instruction_cycles};
use crate::core::cpu::operand::{Role, Target};
use crate::core::devices::{DEVICE_LIMIT, HardwareDevice};
use crate::core::interrupt::InterruptQueue;
use crate::core::memory::{MEMORY_SIZE, Memory};

pub mod disassembler;
pub mod instruction;
pub mod operand;

pub const NUM_REGISTERS: usize = 8;

pub const REG_A: usize = 0;
pub const REG_B: usize = 1;
pub const REG_C: usize = 2;
pub const REG_X: usize = 3;
pub const REG_Y: usize = 4;
pub const REG_Z: usize = 5;
pub const REG_I: usize = 6;
pub const REG_J: usize = 7;

/*
  Debug read/write surface. Addresses below 0x10000 are plain memory;
  the window above it overlays the register file and the special words
  so external hosts (debuggers, devices) can reach the whole machine
  state through one address space.

  0x00000..0x0FFFF   memory
  0x10000..0x10007   registers A..J
  0x10008..0x1000F   [register A..J]
  0x10010            PC
  0x10011            [PC]
  0x10012            SP
  0x10013            [SP]
  0x10014            EX
  0x10015            IA
*/
pub const RW_REGISTER_0: u32 = 0x10000;
pub const RW_REGISTER_7: u32 = 0x10007;
pub const RW_REGISTER_PTR_0: u32 = 0x10008;
pub const RW_REGISTER_PTR_7: u32 = 0x1000F;
pub const RW_PROGRAM_COUNTER: u32 = 0x10010;
pub const RW_PROGRAM_COUNTER_PTR: u32 = 0x10011;
pub const RW_STACK_POINTER: u32 = 0x10012;
pub const RW_STACK_POINTER_PTR: u32 = 0x10013;
pub const RW_EXCESS: u32 = 0x10014;
pub const RW_INTERRUPT_ADDRESS: u32 = 0x10015;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuError {
    #[default]
    None,
    StackOverflow,
    StackUnderflow,
    OpcodeInvalid,
    InterruptQueueFull,
}

impl CpuError {
    /// Stable numeric code, usable by hosts that persist or compare
    /// error states.
    pub fn id(&self) -> usize {
        use CpuError::*;
        match self {
            None => 0,
            StackOverflow => 1,
            StackUnderflow => 2,
            OpcodeInvalid => 3,
            InterruptQueueFull => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        use CpuError::*;
        match self {
            None => "NONE",
            StackOverflow => "STACK_OVERFLOW",
            StackUnderflow => "STACK_UNDERFLOW",
            OpcodeInvalid => "OPCODE_INVALID",
            InterruptQueueFull => "INTERRUPT_QUEUE_FULL",
        }
    }
}

type OperationResult = Result<(), CpuError>;

pub struct Cpu {
    op_functions: [fn(&mut Cpu, &InstructionData) -> OperationResult; 32],
    ext_op_functions: [fn(&mut Cpu, &InstructionData) -> OperationResult; 32],
    memory: Memory,
    regs: [u16; NUM_REGISTERS],
    pc: u16,
    // starts at 0, the first push pre-decrements to 0xFFFF
    sp: u16,
    ex: u16,
    ia: u16,
    clock: u64,
    error: CpuError,
    skip_next: bool,
    interrupts: InterruptQueue,
    devices: Vec<Box<dyn HardwareDevice>>,
    last_instruction: InstructionData,
}

impl Cpu {
    pub fn new() -> Self {
        let mut cpu = Cpu {
            op_functions: [Cpu::op_invalid; 32],
            ext_op_functions: [Cpu::op_invalid; 32],
            memory: Memory::new(),
            regs: [0; NUM_REGISTERS],
            pc: 0,
            sp: 0,
            ex: 0,
            ia: 0,
            clock: 0,
            error: CpuError::None,
            skip_next: false,
            interrupts: InterruptQueue::new(),
            devices: Vec::new(),
            last_instruction: InstructionData::default(),
        };

        cpu.init_op_functions();

        cpu
    }

    fn init_op_functions(&mut self) {
        use instruction::*;
        // assignment and block transfer
        self.op_functions[OP_SET as usize] = Cpu::op_set;
        self.op_functions[OP_STI as usize] = Cpu::op_set_index::<true>;
        self.op_functions[OP_STD as usize] = Cpu::op_set_index::<false>;
        // add / sub and their carry forms
        self.op_functions[OP_ADD as usize] = Cpu::op_add;
        self.op_functions[OP_SUB as usize] = Cpu::op_sub;
        self.op_functions[OP_ADX as usize] = Cpu::op_add_carry::<false>;
        self.op_functions[OP_SBX as usize] = Cpu::op_add_carry::<true>;
        // mul / div / mod
        self.op_functions[OP_MUL as usize] = Cpu::op_mul::<false>;
        self.op_functions[OP_MLI as usize] = Cpu::op_mul::<true>;
        self.op_functions[OP_DIV as usize] = Cpu::op_div::<false>;
        self.op_functions[OP_DVI as usize] = Cpu::op_div::<true>;
        self.op_functions[OP_MOD as usize] = Cpu::op_mod::<false>;
        self.op_functions[OP_MDI as usize] = Cpu::op_mod::<true>;
        // bitwise
        self.op_functions[OP_AND as usize] = Cpu::op_and;
        self.op_functions[OP_BOR as usize] = Cpu::op_bor;
        self.op_functions[OP_XOR as usize] = Cpu::op_xor;
        // shifts
        self.op_functions[OP_SHL as usize] = Cpu::op_shift::<true, false>;
        self.op_functions[OP_SHR as usize] = Cpu::op_shift::<false, false>;
        self.op_functions[OP_ASR as usize] = Cpu::op_shift::<false, true>;
        // conditionals
        self.op_functions[OP_IFB as usize] = Cpu::op_ifb;
        self.op_functions[OP_IFC as usize] = Cpu::op_ifc;
        self.op_functions[OP_IFE as usize] = Cpu::op_ife;
        self.op_functions[OP_IFN as usize] = Cpu::op_ifn;
        self.op_functions[OP_IFG as usize] = Cpu::op_ifg;
        self.op_functions[OP_IFA as usize] = Cpu::op_ifa;
        self.op_functions[OP_IFL as usize] = Cpu::op_ifl;
        self.op_functions[OP_IFU as usize] = Cpu::op_ifu;
        // extended
        self.ext_op_functions[EXT_JSR as usize] = Cpu::op_jsr;
        self.ext_op_functions[EXT_INT as usize] = Cpu::op_int;
        self.ext_op_functions[EXT_IAG as usize] = Cpu::op_iag;
        self.ext_op_functions[EXT_IAS as usize] = Cpu::op_ias;
        self.ext_op_functions[EXT_RFI as usize] = Cpu::op_rfi;
        self.ext_op_functions[EXT_IAQ as usize] = Cpu::op_iaq;
        self.ext_op_functions[EXT_HWN as usize] = Cpu::op_hwn;
        self.ext_op_functions[EXT_HWQ as usize] = Cpu::op_hwq;
        self.ext_op_functions[EXT_HWI as usize] = Cpu::op_hwi;
    }

    pub fn reset(&mut self) {
        self.pc = 0;
        self.sp = 0;
        self.ex = 0;
        self.ia = 0;
        self.clock = 0;
        self.error = CpuError::None;
        self.skip_next = false;
        self.regs.fill(0);
        self.memory.clear();
        self.interrupts.reset();
        self.last_instruction = InstructionData::default();
        // the device table is governed by attach/detach only
    }

    /// Resets the CPU and copies the image to address 0.
    pub fn load_program(&mut self, words: &[u16]) {
        if words.len() > MEMORY_SIZE {
            warn!(
                "Program image of {} words truncated to memory size",
                words.len()
            );
        }
        self.reset();
        self.memory.copy_image(words);
        info!("Loaded program of {} words", words.len().min(MEMORY_SIZE));
    }

    // ======================================================== accessors

    pub fn get_pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn get_sp(&self) -> u16 {
        self.sp
    }

    pub fn get_ex(&self) -> u16 {
        self.ex
    }

    pub fn get_ia(&self) -> u16 {
        self.ia
    }

    pub fn get_registers(&self) -> &[u16; NUM_REGISTERS] {
        &self.regs
    }

    pub fn get_registers_mut(&mut self) -> &mut [u16; NUM_REGISTERS] {
        &mut self.regs
    }

    pub fn get_cycles(&self) -> u64 {
        self.clock
    }

    pub fn get_error(&self) -> CpuError {
        self.error
    }

    pub fn get_last_instruction(&self) -> &InstructionData {
        &self.last_instruction
    }

    pub fn is_interrupt_queueing(&self) -> bool {
        self.interrupts.is_queueing()
    }

    pub fn pending_interrupts(&self) -> usize {
        self.interrupts.len()
    }

    pub fn memory_flags(&self, address: u16) -> u8 {
        self.memory.read_flags(address)
    }

    pub fn set_memory_flags(&mut self, address: u16, flags: u8) {
        self.memory.set_flags(address, flags);
    }

    fn set_error(&mut self, error: CpuError) {
        if self.error == CpuError::None {
            error!("Cpu fault {} at {:04X}", error.name(), self.pc);
            self.error = error;
        }
    }

    // ==================================================== device table

    /// Attaches a device and returns its bus index, the stable id used
    /// by HWQ/HWI. Returns None when the table is full.
    pub fn attach_device(&mut self, device: Box<dyn HardwareDevice>) -> Option<u16> {
        if self.devices.len() >= DEVICE_LIMIT {
            warn!("Device table is full, attach rejected");
            return None;
        }
        let index = self.devices.len() as u16;
        info!(
            "Attached device {:04X}: id={:08X} version={:04X} manufacturer={:08X}",
            index,
            device.hardware_id(),
            device.hardware_version(),
            device.manufacturer_id()
        );
        self.devices.push(device);
        Some(index)
    }

    pub fn detach_all_devices(&mut self) {
        self.devices.clear();
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    // ================================================= debug surface

    pub fn read(&self, address: u32) -> u16 {
        if address < MEMORY_SIZE as u32 {
            self.memory.read_word(address as u16)
        } else if (RW_REGISTER_0..=RW_REGISTER_7).contains(&address) {
            self.regs[(address - RW_REGISTER_0) as usize]
        } else if (RW_REGISTER_PTR_0..=RW_REGISTER_PTR_7).contains(&address) {
            self.memory
                .read_word(self.regs[(address - RW_REGISTER_PTR_0) as usize])
        } else {
            match address {
                RW_PROGRAM_COUNTER => self.pc,
                RW_PROGRAM_COUNTER_PTR => self.memory.read_word(self.pc),
                RW_STACK_POINTER => self.sp,
                RW_STACK_POINTER_PTR => self.memory.read_word(self.sp),
                RW_EXCESS => self.ex,
                RW_INTERRUPT_ADDRESS => self.ia,
                _ => 0,
            }
        }
    }

    pub fn write(&mut self, address: u32, value: u16) {
        if address < MEMORY_SIZE as u32 {
            self.memory.write_word(address as u16, value);
        } else if (RW_REGISTER_0..=RW_REGISTER_7).contains(&address) {
            self.regs[(address - RW_REGISTER_0) as usize] = value;
        } else if (RW_REGISTER_PTR_0..=RW_REGISTER_PTR_7).contains(&address) {
            self.memory
                .write_word(self.regs[(address - RW_REGISTER_PTR_0) as usize], value);
        } else {
            match address {
                RW_PROGRAM_COUNTER => self.pc = value,
                RW_PROGRAM_COUNTER_PTR => self.memory.write_word(self.pc, value),
                RW_STACK_POINTER => self.sp = value,
                RW_STACK_POINTER_PTR => self.memory.write_word(self.sp, value),
                RW_EXCESS => self.ex = value,
                RW_INTERRUPT_ADDRESS => self.ia = value,
                _ => {}
            }
        }
    }

    // ======================================================== stepping

    /// Executes one instruction and returns its cycle cost. The order
    /// of effects is fixed: pending interrupt delivery, fetch, operand
    /// decode, execute, cycle accumulation, skip-fetch. A latched
    /// error turns step() into a no-op until reset().
    pub fn step(&mut self) -> usize {
        if self.error != CpuError::None {
            return 0;
        }

        // one queued message is delivered per step once queueing is off
        if !self.interrupts.is_queueing()
            && let Some(message) = self.interrupts.dequeue()
        {
            self.begin_interrupt(message);
        }

        let data = self.fetch();
        self.skip_next = false;

        let result = if data.op != OP_EXT {
            let op_function = self.op_functions[data.op as usize];
            op_function(self, &data)
        } else if data.b_code != 0 {
            let op_function = self.ext_op_functions[data.b_code as usize];
            op_function(self, &data)
        } else {
            // double-extended form, reserved
            Err(CpuError::OpcodeInvalid)
        };

        if let Err(err) = result {
            self.set_error(err);
        }

        let mut cycles = data.cycles as usize;
        self.clock += data.cycles as u64;

        if self.skip_next {
            self.advance_past_instruction();
            self.clock += 1;
            cycles += 1;
        }

        self.last_instruction = data;
        cycles
    }

    /// Reads the word at PC, splits it and resolves the operands,
    /// advancing PC past every next-word the encoding consumes.
    /// Operand a is handled first, as the encoding requires.
    pub fn fetch(&mut self) -> InstructionData {
        let address = self.pc;
        let word = self.next_word();
        let instruction = Instruction(word);

        let mut data = InstructionData {
            instruction: word,
            address,
            op: instruction.op(),
            a_code: instruction.a(),
            b_code: instruction.b(),
            cycles: instruction_cycles(&instruction),
            ..InstructionData::default()
        };

        let (a, a_target) = self.decode_operand(data.a_code, Role::A);
        data.a = a;
        data.a_target = a_target;

        if data.op != OP_EXT {
            let (b, b_target) = self.decode_operand(data.b_code, Role::B);
            data.b = b;
            data.b_target = b_target;
        }

        data
    }

    #[inline(always)]
    fn next_word(&mut self) -> u16 {
        let word = self.memory.read_word(self.pc);
        self.pc = self.pc.wrapping_add(1);
        word
    }

    fn decode_operand(&mut self, code: u16, role: Role) -> (u16, Target) {
        match code {
            0x00..=0x07 => {
                let index = code as usize;
                (self.regs[index], Target::Register(index))
            }
            0x08..=0x0F => {
                let address = self.regs[code as usize % NUM_REGISTERS];
                (self.memory.read_word(address), Target::Memory(address))
            }
            0x10..=0x17 => {
                let offset = self.next_word();
                let address = self.regs[code as usize % NUM_REGISTERS].wrapping_add(offset);
                (self.memory.read_word(address), Target::Memory(address))
            }
            operand::OPERAND_PUSH_POP => match role {
                // POP reads [SP] then post-increments
                Role::A => {
                    let address = self.sp;
                    self.sp = self.sp.wrapping_add(1);
                    (self.memory.read_word(address), Target::Memory(address))
                }
                // PUSH pre-decrements then addresses [SP]
                Role::B => {
                    self.sp = self.sp.wrapping_sub(1);
                    (self.memory.read_word(self.sp), Target::Memory(self.sp))
                }
            },
            operand::OPERAND_PEEK => (self.memory.read_word(self.sp), Target::Memory(self.sp)),
            operand::OPERAND_PICK => {
                let offset = self.next_word();
                let address = self.sp.wrapping_add(offset);
                (self.memory.read_word(address), Target::Memory(address))
            }
            operand::OPERAND_SP => (self.sp, Target::Sp),
            operand::OPERAND_PC => (self.pc, Target::Pc),
            operand::OPERAND_EX => (self.ex, Target::Ex),
            operand::OPERAND_NEXT_WORD_PTR => {
                let address = self.next_word();
                (self.memory.read_word(address), Target::Memory(address))
            }
            operand::OPERAND_NEXT_WORD_LITERAL => (self.next_word(), Target::None),
            // embedded literals cover -1..30
            _ => (code.wrapping_sub(operand::OPERAND_LITERAL + 1), Target::None),
        }
    }

    #[inline(always)]
    fn store(&mut self, target: Target, value: u16) {
        match target {
            Target::None => {} // read-only operand, the write is dropped
            Target::Register(index) => self.regs[index] = value,
            Target::Memory(address) => self.memory.write_word(address, value),
            Target::Pc => self.pc = value,
            Target::Sp => self.sp = value,
            Target::Ex => self.ex = value,
        }
    }

    /// Moves PC past one full instruction encoding without executing
    /// anything, used by the skip path of a failed conditional. Shares
    /// the per-code word counts with the decoder but performs no reads
    /// of SP and no stack movement.
    fn advance_past_instruction(&mut self) {
        let instruction = Instruction(self.next_word());
        self.pc = self
            .pc
            .wrapping_add(operand::operand_words(instruction.a()));
        if instruction.op() != OP_EXT {
            self.pc = self
                .pc
                .wrapping_add(operand::operand_words(instruction.b()));
        }
    }

    // ====================================================== interrupts

    /// Software (INT) and external interrupt sources share this entry.
    /// With IA unset the interrupt is dropped; while queueing is
    /// enabled the message is parked in the queue, and an overflow
    /// latches INTERRUPT_QUEUE_FULL.
    pub fn trigger_interrupt(&mut self, message: u16) {
        if self.ia == 0 {
            return;
        }
        if self.interrupts.is_queueing() {
            if !self.interrupts.enqueue(message) {
                self.set_error(CpuError::InterruptQueueFull);
            }
        } else {
            self.begin_interrupt(message);
        }
    }

    fn begin_interrupt(&mut self, message: u16) {
        self.interrupts.set_queueing(true);
        self.push(self.pc);
        self.push(self.regs[REG_A]);
        self.pc = self.ia;
        self.regs[REG_A] = message;
    }

    #[inline(always)]
    fn push(&mut self, value: u16) {
        self.sp = self.sp.wrapping_sub(1);
        self.memory.write_word(self.sp, value);
    }

    #[inline(always)]
    fn pop(&mut self) -> u16 {
        let value = self.memory.read_word(self.sp);
        self.sp = self.sp.wrapping_add(1);
        value
    }

    // ================================================== basic opcodes

    fn op_invalid(&mut self, _data: &InstructionData) -> OperationResult {
        Err(CpuError::OpcodeInvalid)
    }

    fn op_set(&mut self, data: &InstructionData) -> OperationResult {
        self.store(data.b_target, data.a);
        Ok(())
    }

    /*
      STI/STD transfer like SET and then move both index registers,
      so memcpy-style loops need no explicit bookkeeping.
    */
    fn op_set_index<const INCREMENT: bool>(&mut self, data: &InstructionData) -> OperationResult {
        self.store(data.b_target, data.a);
        if INCREMENT {
            self.regs[REG_I] = self.regs[REG_I].wrapping_add(1);
            self.regs[REG_J] = self.regs[REG_J].wrapping_add(1);
        } else {
            self.regs[REG_I] = self.regs[REG_I].wrapping_sub(1);
            self.regs[REG_J] = self.regs[REG_J].wrapping_sub(1);
        }
        Ok(())
    }

    fn op_add(&mut self, data: &InstructionData) -> OperationResult {
        let sum = data.b as u32 + data.a as u32;
        self.store(data.b_target, sum as u16);
        self.ex = if sum > 0xFFFF { 0x0001 } else { 0x0000 };
        Ok(())
    }

    fn op_sub(&mut self, data: &InstructionData) -> OperationResult {
        let diff = data.b as i32 - data.a as i32;
        self.store(data.b_target, diff as u16);
        self.ex = if diff < 0 { 0xFFFF } else { 0x0000 };
        Ok(())
    }

    /*
      ADX/SBX fold EX into the operation so multi-word arithmetic can
      chain the carry/borrow through it.
    */
    fn op_add_carry<const SUBTRACT: bool>(&mut self, data: &InstructionData) -> OperationResult {
        if SUBTRACT {
            let diff = data.b as i32 - data.a as i32 + self.ex as i32;
            self.store(data.b_target, diff as u16);
            self.ex = if diff < 0 { 0xFFFF } else { 0x0000 };
        } else {
            let sum = data.b as u32 + data.a as u32 + self.ex as u32;
            self.store(data.b_target, sum as u16);
            self.ex = if sum > 0xFFFF { 0x0001 } else { 0x0000 };
        }
        Ok(())
    }

    fn op_mul<const SIGNED: bool>(&mut self, data: &InstructionData) -> OperationResult {
        let product = if SIGNED {
            (data.b as i16 as i32 * data.a as i16 as i32) as u32
        } else {
            data.b as u32 * data.a as u32
        };
        self.store(data.b_target, product as u16);
        self.ex = (product >> 16) as u16;
        Ok(())
    }

    /*
      Division by zero is not a fault: quotient and EX read as zero.
      The signed form truncates toward zero, and the wider intermediate
      keeps i16::MIN / -1 defined.
    */
    fn op_div<const SIGNED: bool>(&mut self, data: &InstructionData) -> OperationResult {
        if data.a == 0 {
            self.store(data.b_target, 0);
            self.ex = 0;
            return Ok(());
        }
        if SIGNED {
            let b = data.b as i16 as i32;
            let a = data.a as i16 as i32;
            self.store(data.b_target, (b / a) as u16);
            self.ex = ((b << 16) / a) as u16;
        } else {
            let b = data.b as u32;
            let a = data.a as u32;
            self.store(data.b_target, (b / a) as u16);
            self.ex = ((b << 16) / a) as u16;
        }
        Ok(())
    }

    fn op_mod<const SIGNED: bool>(&mut self, data: &InstructionData) -> OperationResult {
        let remainder = if data.a == 0 {
            0
        } else if SIGNED {
            (data.b as i16 as i32 % data.a as i16 as i32) as u16
        } else {
            data.b % data.a
        };
        self.store(data.b_target, remainder);
        Ok(())
    }

    #[inline(always)]
    fn op_bitwise<F>(&mut self, data: &InstructionData, f: F)
    where
        F: Fn(u16, u16) -> u16,
    {
        self.store(data.b_target, f(data.b, data.a));
    }

    fn op_and(&mut self, data: &InstructionData) -> OperationResult {
        self.op_bitwise(data, |b, a| b & a);
        Ok(())
    }

    fn op_bor(&mut self, data: &InstructionData) -> OperationResult {
        self.op_bitwise(data, |b, a| b | a);
        Ok(())
    }

    fn op_xor(&mut self, data: &InstructionData) -> OperationResult {
        self.op_bitwise(data, |b, a| b ^ a);
        Ok(())
    }

    /*
      Shifts run in a 64-bit intermediate so EX can capture the bits
      pushed past either end. Shift counts are clamped below the
      intermediate width; the arithmetic right shift additionally
      clamps the value shift to 15 so the sign fill is complete.
    */
    fn op_shift<const LEFT: bool, const ARITHMETIC: bool>(
        &mut self,
        data: &InstructionData,
    ) -> OperationResult {
        let shift = data.a as u32;
        if LEFT {
            let value = (data.b as u64) << shift.min(47);
            self.store(data.b_target, value as u16);
            self.ex = (value >> 16) as u16;
        } else if ARITHMETIC {
            let value = (data.b as i16) >> shift.min(15);
            self.store(data.b_target, value as u16);
            self.ex = (((data.b as i16 as i64) << 16) >> shift.min(47)) as u16;
        } else {
            self.store(data.b_target, ((data.b as u64) >> shift.min(63)) as u16);
            self.ex = (((data.b as u64) << 16) >> shift.min(63)) as u16;
        }
        Ok(())
    }

    #[inline(always)]
    fn op_conditional<F>(&mut self, data: &InstructionData, predicate: F)
    where
        F: Fn(u16, u16) -> bool,
    {
        // a failed predicate discards the next instruction
        self.skip_next = !predicate(data.b, data.a);
    }

    fn op_ifb(&mut self, data: &InstructionData) -> OperationResult {
        self.op_conditional(data, |b, a| (b & a) != 0);
        Ok(())
    }

    fn op_ifc(&mut self, data: &InstructionData) -> OperationResult {
        self.op_conditional(data, |b, a| (b & a) == 0);
        Ok(())
    }

    fn op_ife(&mut self, data: &InstructionData) -> OperationResult {
        self.op_conditional(data, |b, a| b == a);
        Ok(())
    }

    fn op_ifn(&mut self, data: &InstructionData) -> OperationResult {
        self.op_conditional(data, |b, a| b != a);
        Ok(())
    }

    fn op_ifg(&mut self, data: &InstructionData) -> OperationResult {
        self.op_conditional(data, |b, a| b > a);
        Ok(())
    }

    fn op_ifa(&mut self, data: &InstructionData) -> OperationResult {
        self.op_conditional(data, |b, a| (b as i16) > (a as i16));
        Ok(())
    }

    fn op_ifl(&mut self, data: &InstructionData) -> OperationResult {
        self.op_conditional(data, |b, a| b < a);
        Ok(())
    }

    fn op_ifu(&mut self, data: &InstructionData) -> OperationResult {
        self.op_conditional(data, |b, a| (b as i16) < (a as i16));
        Ok(())
    }

    // =============================================== extended opcodes

    fn op_jsr(&mut self, data: &InstructionData) -> OperationResult {
        // PC already points past the operand words, the return address
        self.push(self.pc);
        self.pc = data.a;
        Ok(())
    }

    fn op_int(&mut self, data: &InstructionData) -> OperationResult {
        self.trigger_interrupt(data.a);
        Ok(())
    }

    fn op_iag(&mut self, data: &InstructionData) -> OperationResult {
        self.store(data.a_target, self.ia);
        Ok(())
    }

    fn op_ias(&mut self, data: &InstructionData) -> OperationResult {
        self.ia = data.a;
        Ok(())
    }

    fn op_rfi(&mut self, _data: &InstructionData) -> OperationResult {
        self.interrupts.set_queueing(false);
        self.regs[REG_A] = self.pop();
        self.pc = self.pop();
        Ok(())
    }

    fn op_iaq(&mut self, data: &InstructionData) -> OperationResult {
        self.interrupts.set_queueing(data.a != 0);
        Ok(())
    }

    fn op_hwn(&mut self, data: &InstructionData) -> OperationResult {
        self.store(data.a_target, self.devices.len() as u16);
        Ok(())
    }

    /*
      HWQ publishes the device identity through A,B,C,X,Y:
        A,B = hardware id low/high
        C   = version
        X,Y = manufacturer id low/high
      An unattached index clears all five registers.
    */
    fn op_hwq(&mut self, data: &InstructionData) -> OperationResult {
        let index = data.a as usize;
        if index < self.devices.len() {
            let device = &self.devices[index];
            let hardware_id = device.hardware_id();
            let version = device.hardware_version();
            let manufacturer_id = device.manufacturer_id();
            self.regs[REG_A] = hardware_id as u16;
            self.regs[REG_B] = (hardware_id >> 16) as u16;
            self.regs[REG_C] = version;
            self.regs[REG_X] = manufacturer_id as u16;
            self.regs[REG_Y] = (manufacturer_id >> 16) as u16;
        } else {
            self.regs[REG_A] = 0;
            self.regs[REG_B] = 0;
            self.regs[REG_C] = 0;
            self.regs[REG_X] = 0;
            self.regs[REG_Y] = 0;
        }
        Ok(())
    }

    fn op_hwi(&mut self, data: &InstructionData) -> OperationResult {
        let index = data.a as usize;
        if index < self.devices.len() {
            // the table is detached while the device borrows the cpu
            let mut devices = mem::take(&mut self.devices);
            devices[index].interrupt(self);
            self.devices = devices;
        } else {
            warn!("HWI for unattached device index {}", index);
        }
        Ok(())
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
