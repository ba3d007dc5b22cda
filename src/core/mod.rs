pub mod config;
pub mod cpu;
pub mod debugger;
pub mod devices;
pub mod emu;
pub mod interrupt;
pub mod memory;

// nominal DCPU-16 clock rate, cycle counts are reported against it
// but never throttled
pub const CPU_CLOCK: usize = 100_000;
