//! Interrupt subsystem: delivery, queueing, RFI round trips and the
//! queue-full fault.

use r_dcpu16::core::cpu::{Cpu, CpuError, RW_INTERRUPT_ADDRESS};

fn cpu_with(program: &[u16]) -> Cpu {
    let mut cpu = Cpu::new();
    cpu.load_program(program);
    cpu
}

#[test]
fn int_with_ia_unset_is_dropped() {
    // INT 5 ; SET B, 1
    let mut cpu = cpu_with(&[0x9900, 0x8821]);
    cpu.step();

    assert_eq!(cpu.get_registers()[0], 0, "A is untouched");
    assert_eq!(cpu.get_pc(), 1, "execution continues in sequence");
    assert_eq!(cpu.get_sp(), 0, "nothing was pushed");
    assert!(!cpu.is_interrupt_queueing());

    cpu.step();
    assert_eq!(cpu.get_registers()[1], 1);
}

#[test]
fn int_pushes_state_and_jumps_to_ia() {
    // IAS 0x0004 ; INT 5 ; SET B, 1 ; [4]: SET X, A ; RFI
    let mut cpu = cpu_with(&[0x7D40, 0x0004, 0x9900, 0x8821, 0x0061, 0x8560]);

    cpu.step(); // IAS
    assert_eq!(cpu.get_ia(), 4);

    cpu.step(); // INT 5
    assert_eq!(cpu.get_pc(), 4, "PC must jump to IA");
    assert_eq!(cpu.get_registers()[0], 5, "A carries the message");
    assert!(cpu.is_interrupt_queueing(), "delivery enables queueing");
    assert_eq!(cpu.get_sp(), 0xFFFE);
    assert_eq!(cpu.read(0xFFFE), 0, "saved A at [SP]");
    assert_eq!(cpu.read(0xFFFF), 3, "saved PC at [SP+1]");

    cpu.step(); // SET X, A
    assert_eq!(cpu.get_registers()[3], 5);

    cpu.step(); // RFI
    assert_eq!(cpu.get_pc(), 3, "RFI restores the interrupted PC");
    assert_eq!(cpu.get_registers()[0], 0, "RFI restores A");
    assert_eq!(cpu.get_sp(), 0, "the stack is balanced again");
    assert!(!cpu.is_interrupt_queueing(), "RFI re-enables delivery");

    cpu.step(); // SET B, 1
    assert_eq!(cpu.get_registers()[1], 1);
}

#[test]
fn iaq_parks_interrupts_until_released() {
    // IAS 0x0008 ; IAQ 1 ; INT 7 ; SET X, 1 ; IAQ 0 ; SET Y, 1 ; pad ; pad ; [8]: RFI
    let mut cpu = cpu_with(&[
        0x7D40, 0x0008, // IAS 0x0008
        0x8980, //         IAQ 1
        0xA100, //         INT 7
        0x8861, //         SET X, 1
        0x8580, //         IAQ 0
        0x8881, //         SET Y, 1
        0x0000, //         (pad)
        0x8560, // [8]:    RFI
    ]);

    cpu.step(); // IAS
    cpu.step(); // IAQ 1
    assert!(cpu.is_interrupt_queueing());

    cpu.step(); // INT 7: parked, not delivered
    assert_eq!(cpu.pending_interrupts(), 1);
    assert_eq!(cpu.get_pc(), 4, "no jump while queueing");

    cpu.step(); // SET X, 1 still runs normally
    assert_eq!(cpu.get_registers()[3], 1);
    assert_eq!(cpu.pending_interrupts(), 1);

    cpu.step(); // IAQ 0
    assert!(!cpu.is_interrupt_queueing());

    // delivery happens at the top of the next step, which then
    // executes the handler's RFI
    cpu.step();
    assert_eq!(cpu.pending_interrupts(), 0);
    assert_eq!(cpu.get_pc(), 6, "back at the interrupted address");
    assert_eq!(cpu.get_sp(), 0);

    cpu.step(); // SET Y, 1
    assert_eq!(cpu.get_registers()[4], 1);
}

#[test]
fn external_trigger_delivers_immediately() {
    let mut cpu = cpu_with(&[0x8401]);
    cpu.write(RW_INTERRUPT_ADDRESS, 0x0040);

    cpu.trigger_interrupt(0x00AB);
    assert_eq!(cpu.get_pc(), 0x0040);
    assert_eq!(cpu.get_registers()[0], 0x00AB);
    assert!(cpu.is_interrupt_queueing());
}

#[test]
fn queue_overflow_latches_a_fault() {
    // IAQ 1
    let mut cpu = cpu_with(&[0x8980]);
    cpu.write(RW_INTERRUPT_ADDRESS, 0x0040);
    cpu.step();
    assert!(cpu.is_interrupt_queueing());

    for message in 0..256 {
        cpu.trigger_interrupt(message);
        assert_eq!(cpu.get_error(), CpuError::None, "message {} fits", message);
    }
    assert_eq!(cpu.pending_interrupts(), 256);

    cpu.trigger_interrupt(0xDEAD);
    assert_eq!(cpu.get_error(), CpuError::InterruptQueueFull);
    assert_eq!(cpu.get_error().id(), 4);
    assert_eq!(cpu.step(), 0, "a faulted CPU refuses to step");
}

#[test]
fn iag_reads_ia_back() {
    // IAS 0x0123 ; IAG A
    let mut cpu = cpu_with(&[0x7D40, 0x0123, 0x0120]);
    cpu.step();
    cpu.step();
    assert_eq!(cpu.get_registers()[0], 0x0123);
}
