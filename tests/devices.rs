//! Device bus: attach/detach, HWN/HWQ identity queries and HWI
//! dispatch, including the device's right to touch CPU state through
//! the read/write surface.

use std::cell::RefCell;
use std::rc::Rc;

use r_dcpu16::core::cpu::{Cpu, CpuError, RW_REGISTER_0};
use r_dcpu16::core::devices::HardwareDevice;

struct TestDevice {
    hardware_id: u32,
    version: u16,
    manufacturer: u32,
    messages: Rc<RefCell<Vec<u16>>>,
}

impl TestDevice {
    fn new(hardware_id: u32, version: u16, manufacturer: u32) -> (Self, Rc<RefCell<Vec<u16>>>) {
        let messages = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                hardware_id,
                version,
                manufacturer,
                messages: messages.clone(),
            },
            messages,
        )
    }
}

impl HardwareDevice for TestDevice {
    fn hardware_id(&self) -> u32 {
        self.hardware_id
    }

    fn hardware_version(&self) -> u16 {
        self.version
    }

    fn manufacturer_id(&self) -> u32 {
        self.manufacturer
    }

    fn interrupt(&mut self, cpu: &mut Cpu) {
        // record B and leave a marker in guest memory
        let b = cpu.read(RW_REGISTER_0 + 1);
        self.messages.borrow_mut().push(b);
        cpu.write(0x2000, 0xCAFE);
    }
}

fn cpu_with(program: &[u16]) -> Cpu {
    let mut cpu = Cpu::new();
    cpu.load_program(program);
    cpu
}

#[test]
fn hwn_reports_the_device_count() {
    // HWN A
    let mut cpu = cpu_with(&[0x0200]);
    let (dev_a, _) = TestDevice::new(1, 1, 1);
    let (dev_b, _) = TestDevice::new(2, 1, 1);
    assert_eq!(cpu.attach_device(Box::new(dev_a)), Some(0));
    assert_eq!(cpu.attach_device(Box::new(dev_b)), Some(1));

    cpu.step();
    assert_eq!(cpu.get_registers()[0], 2);
    assert_eq!(cpu.get_cycles(), 2);
}

#[test]
fn hwq_publishes_the_identity_words() {
    // HWQ 0
    let mut cpu = cpu_with(&[0x8620]);
    let (device, _) = TestDevice::new(0x1234_5678, 0x0102, 0xAABB_CCDD);
    cpu.attach_device(Box::new(device));

    cpu.step();
    let regs = cpu.get_registers();
    assert_eq!(regs[0], 0x5678, "A = hardware id low");
    assert_eq!(regs[1], 0x1234, "B = hardware id high");
    assert_eq!(regs[2], 0x0102, "C = version");
    assert_eq!(regs[3], 0xCCDD, "X = manufacturer low");
    assert_eq!(regs[4], 0xAABB, "Y = manufacturer high");
    assert_eq!(cpu.get_cycles(), 4);
}

#[test]
fn hwq_out_of_range_clears_the_identity_registers() {
    // HWQ 5 with no devices attached, identity registers pre-soiled
    let mut cpu = cpu_with(&[0x9A20]);
    for i in 0..5u32 {
        cpu.write(RW_REGISTER_0 + i, 0x5A5A);
    }

    cpu.step();
    let regs = cpu.get_registers();
    for i in 0..5 {
        assert_eq!(regs[i], 0, "register {} must be cleared", i);
    }
    assert_eq!(cpu.get_error(), CpuError::None, "no fault for a bad index");
}

#[test]
fn hwi_invokes_the_device_with_cpu_access() {
    // SET B, 0x0077 ; HWI 0
    let mut cpu = cpu_with(&[0x7C21, 0x0077, 0x8640]);
    let (device, messages) = TestDevice::new(1, 1, 1);
    cpu.attach_device(Box::new(device));

    cpu.step();
    cpu.step();

    assert_eq!(messages.borrow().as_slice(), &[0x0077], "the device saw B");
    assert_eq!(cpu.read(0x2000), 0xCAFE, "the device wrote guest memory");
    assert_eq!(cpu.device_count(), 1, "the table is back after dispatch");
}

#[test]
fn hwi_out_of_range_is_a_no_op() {
    // HWI 0 with no devices
    let mut cpu = cpu_with(&[0x8640]);
    cpu.step();

    assert_eq!(cpu.get_error(), CpuError::None);
    assert_eq!(cpu.get_pc(), 1);
    assert_eq!(cpu.get_cycles(), 4);
}

#[test]
fn detach_all_empties_the_table() {
    let mut cpu = Cpu::new();
    let (device, _) = TestDevice::new(1, 1, 1);
    cpu.attach_device(Box::new(device));
    assert_eq!(cpu.device_count(), 1);

    cpu.detach_all_devices();
    assert_eq!(cpu.device_count(), 0);
}

#[test]
fn reset_keeps_the_device_table() {
    let mut cpu = Cpu::new();
    let (device, _) = TestDevice::new(1, 1, 1);
    cpu.attach_device(Box::new(device));

    cpu.reset();
    assert_eq!(cpu.device_count(), 1, "only detach_all clears the table");
}

#[test]
fn device_can_raise_an_interrupt() {
    struct RaisingDevice;
    impl HardwareDevice for RaisingDevice {
        fn hardware_id(&self) -> u32 {
            0xF00
        }
        fn hardware_version(&self) -> u16 {
            1
        }
        fn manufacturer_id(&self) -> u32 {
            0
        }
        fn interrupt(&mut self, cpu: &mut Cpu) {
            cpu.trigger_interrupt(0x0099);
        }
    }

    // IAS 0x0010 ; HWI 0
    let mut cpu = cpu_with(&[0x7D40, 0x0010, 0x8640]);
    cpu.attach_device(Box::new(RaisingDevice));

    cpu.step(); // IAS
    cpu.step(); // HWI, the device fires a software interrupt back

    assert_eq!(cpu.get_pc(), 0x0010);
    assert_eq!(cpu.get_registers()[0], 0x0099);
}
