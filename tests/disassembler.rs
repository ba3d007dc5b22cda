//! Disassembler rendering and addressing. The listing must advance
//! through an image exactly like execution does.

use r_dcpu16::core::cpu::disassembler::{Disassembler, disassemble_image};
use r_dcpu16::core::cpu::instruction::Opcode;

#[test]
fn renders_a_literal_set() {
    let listing = disassemble_image(&[0x7C01, 0x0030]);
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].address, 0);
    assert_eq!(listing[0].opcode, Opcode::SET);
    assert_eq!(listing[0].operands, "A, 0x0030");
}

#[test]
fn renders_stack_operands_by_role() {
    // SET PUSH, 0xBEEF ; SET A, POP
    let listing = disassemble_image(&[0x7F01, 0xBEEF, 0x6001]);
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].operands, "PUSH, 0xBEEF");
    assert_eq!(listing[1].operands, "A, POP");
    assert_eq!(listing[1].address, 2, "addresses follow the word widths");
}

#[test]
fn renders_indexed_and_indirect_operands() {
    // SET [0x0010 + B], A
    let listing = disassemble_image(&[0x0221, 0x0010]);
    assert_eq!(listing[0].operands, "[0x0010 + B], A");

    // SET A, [0x1234]
    let listing = disassemble_image(&[0x7801, 0x1234]);
    assert_eq!(listing[0].operands, "A, [0x1234]");

    // SET C, [B]
    let listing = disassemble_image(&[0x2441]);
    assert_eq!(listing[0].operands, "C, [B]");
}

#[test]
fn renders_special_word_operands() {
    // SET A, SP / SET A, PC / SET A, EX / SET A, PEEK / SET A, PICK 3
    let listing = disassemble_image(&[0x6C01, 0x7001, 0x7401, 0x6401, 0x6801, 0x0003]);
    assert_eq!(listing[0].operands, "A, SP");
    assert_eq!(listing[1].operands, "A, PC");
    assert_eq!(listing[2].operands, "A, EX");
    assert_eq!(listing[3].operands, "A, PEEK");
    assert_eq!(listing[4].operands, "A, PICK 0x0003");
}

#[test]
fn renders_embedded_literals_as_words() {
    // SET A, 0xFFFF (literal -1) ; SET I, 30
    let listing = disassemble_image(&[0x8001, 0xFCC1]);
    assert_eq!(listing[0].operands, "A, 0xFFFF");
    assert_eq!(listing[1].operands, "I, 0x001E");
}

#[test]
fn extended_opcodes_show_one_operand() {
    let listing = disassemble_image(&[0x7C20, 0x0123]);
    assert_eq!(listing[0].opcode, Opcode::JSR);
    assert_eq!(listing[0].operands, "0x0123");
}

#[test]
fn unknown_encodings_are_flagged() {
    let listing = disassemble_image(&[0x0018]);
    assert_eq!(listing[0].opcode, Opcode::UNKNOWN);
    assert!(listing[0].formatted.contains("???"));
}

#[test]
fn formatted_line_carries_address_and_raw_word() {
    let listing = disassemble_image(&[0x7C01, 0x0030]);
    assert_eq!(listing[0].formatted, "0x0000 7C01 SET  A, 0x0030");
}

#[test]
fn base_address_offsets_the_listing() {
    let mut disassembler = Disassembler::new();
    disassembler.disassemble(&[0x7C01, 0x0030, 0x8401], 0x0200);
    assert_eq!(disassembler.instructions()[0].address, 0x0200);
    assert_eq!(disassembler.instructions()[1].address, 0x0202);
    assert!(
        disassembler
            .find_instruction_from_address(0x0202)
            .is_some()
    );
    assert!(
        disassembler
            .find_instruction_from_address(0x0201)
            .is_none(),
        "mid-instruction addresses do not resolve"
    );
}

#[test]
fn listing_walks_a_mixed_program() {
    // the fibonacci loop used by the program tests
    let listing = disassemble_image(&[0x8401, 0x8821, 0x0441, 0x0022, 0x0801, 0x8F81]);
    let rendered: Vec<&str> = listing.iter().map(|i| i.operands.as_str()).collect();
    assert_eq!(
        rendered,
        vec!["A, 0x0000", "B, 0x0001", "C, B", "B, A", "A, C", "PC, 0x0002"]
    );
}
