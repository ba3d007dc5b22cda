use crate::core::cpu::Cpu;
use crate::core::cpu::instruction::{Instruction, InstructionData, OP_EXT, Opcode};
use crate::core::cpu::operand::{self, Role};

#[derive(Debug)]
pub struct Disassembled {
    pub address: u16,
    pub instruction: u16,
    pub opcode: Opcode,
    pub operands: String,
    pub formatted: String,
}

static REGISTER_NAMES: [&str; 8] = ["A", "B", "C", "X", "Y", "Z", "I", "J"];

pub fn register_name(code: u16) -> &'static str {
    REGISTER_NAMES[code as usize % REGISTER_NAMES.len()]
}

/*
  The disassembler drives the real fetch pipeline on a scratch CPU, so
  PC advancement and next-word consumption are exactly what execution
  would do; only the rendering below is its own. Operand strings follow
  the assembler forms: A, [A], [0x0010 + B], POP, PUSH, PEEK,
  PICK 0x0003, SP, PC, EX, [0x1234], 0x0042.
*/
pub struct Disassembler {
    cpu: Cpu,
    instructions: Vec<Disassembled>,
}

impl Disassembler {
    pub fn new() -> Self {
        Disassembler {
            cpu: Cpu::new(),
            instructions: Vec::new(),
        }
    }

    /// Decodes a whole image loaded at `base`. One record per
    /// instruction; decoding stops at the end of the image.
    pub fn disassemble(&mut self, words: &[u16], base: u16) {
        self.instructions.clear();
        // fill the scratch CPU through the write surface, a listing
        // should not log like a program load
        self.cpu.reset();
        for (address, word) in words.iter().enumerate().take(crate::core::memory::MEMORY_SIZE) {
            self.cpu.write(address as u32, *word);
        }

        while (self.cpu.get_pc() as usize) < words.len()
            && self.instructions.len() < words.len()
        {
            let data = self.cpu.fetch();
            self.instructions.push(render(&self.cpu, &data, base));
        }
    }

    pub fn instructions(&self) -> &[Disassembled] {
        &self.instructions
    }

    pub fn find_instruction_from_address(&self, address: u16) -> Option<&Disassembled> {
        self.instructions.iter().find(|i| i.address == address)
    }
}

impl Default for Disassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot listing of an image loaded at address 0.
pub fn disassemble_image(words: &[u16]) -> Vec<Disassembled> {
    let mut disassembler = Disassembler::new();
    disassembler.disassemble(words, 0);
    disassembler.instructions
}

fn render(cpu: &Cpu, data: &InstructionData, base: u16) -> Disassembled {
    let opcode = Opcode::from_instruction(&Instruction(data.instruction));

    // raw next-words sit right after the instruction word, a's first
    let mut next = data.address.wrapping_add(1);
    let mut a_word = None;
    if operand::operand_words(data.a_code) == 1 {
        a_word = Some(cpu.read(next as u32));
        next = next.wrapping_add(1);
    }
    let mut b_word = None;
    if data.op != OP_EXT && operand::operand_words(data.b_code) == 1 {
        b_word = Some(cpu.read(next as u32));
    }

    let operands = if opcode == Opcode::UNKNOWN {
        String::new()
    } else if data.op != OP_EXT {
        format!(
            "{}, {}",
            operand_string(data.b_code, Role::B, b_word),
            operand_string(data.a_code, Role::A, a_word)
        )
    } else {
        operand_string(data.a_code, Role::A, a_word)
    };

    let mnemonic = if opcode == Opcode::UNKNOWN {
        String::from("???")
    } else {
        format!("{:?}", opcode)
    };

    let address = base.wrapping_add(data.address);
    let formatted = format!(
        "0x{:04X} {:04X} {:<5}{}",
        address, data.instruction, mnemonic, operands
    );

    Disassembled {
        address,
        instruction: data.instruction,
        opcode,
        operands,
        formatted,
    }
}

fn operand_string(code: u16, role: Role, next_word: Option<u16>) -> String {
    let next_word = next_word.unwrap_or(0);
    match code {
        0x00..=0x07 => register_name(code).to_string(),
        0x08..=0x0F => format!("[{}]", register_name(code)),
        0x10..=0x17 => format!("[0x{:04X} + {}]", next_word, register_name(code)),
        operand::OPERAND_PUSH_POP => match role {
            Role::A => String::from("POP"),
            Role::B => String::from("PUSH"),
        },
        operand::OPERAND_PEEK => String::from("PEEK"),
        operand::OPERAND_PICK => format!("PICK 0x{:04X}", next_word),
        operand::OPERAND_SP => String::from("SP"),
        operand::OPERAND_PC => String::from("PC"),
        operand::OPERAND_EX => String::from("EX"),
        operand::OPERAND_NEXT_WORD_PTR => format!("[0x{:04X}]", next_word),
        operand::OPERAND_NEXT_WORD_LITERAL => format!("0x{:04X}", next_word),
        _ => format!("0x{:04X}", code.wrapping_sub(operand::OPERAND_LITERAL + 1)),
    }
}
