//! ARM32 register banks and names.
//!
//! Core registers r0-r15 live in bank 0; the VFP/NEON register file is
//! exposed as three overlapping views (s0-s31, d0-d31, q0-q15) in banks 1-3.

use crate::core::register_file::{AsmReg, RegBank};

pub const BANK_GPR: RegBank = 0;
pub const BANK_SREG: RegBank = 1;
pub const BANK_DREG: RegBank = 2;
pub const BANK_QREG: RegBank = 3;

pub const fn gpr(id: u8) -> AsmReg {
    AsmReg::new(BANK_GPR, id)
}

pub const fn sreg(id: u8) -> AsmReg {
    AsmReg::new(BANK_SREG, id)
}

pub const fn dreg(id: u8) -> AsmReg {
    AsmReg::new(BANK_DREG, id)
}

pub const fn qreg(id: u8) -> AsmReg {
    AsmReg::new(BANK_QREG, id)
}

pub const R0: AsmReg = gpr(0);
pub const R1: AsmReg = gpr(1);
pub const R2: AsmReg = gpr(2);
pub const R3: AsmReg = gpr(3);
pub const R4: AsmReg = gpr(4);
pub const R5: AsmReg = gpr(5);
pub const R6: AsmReg = gpr(6);
pub const R7: AsmReg = gpr(7);
pub const R8: AsmReg = gpr(8);
pub const R9: AsmReg = gpr(9);
pub const R10: AsmReg = gpr(10);
/// Frame pointer.
pub const FP: AsmReg = gpr(11);
/// Intra-procedure scratch register.
pub const IP: AsmReg = gpr(12);
pub const SP: AsmReg = gpr(13);
pub const LR: AsmReg = gpr(14);
pub const PC: AsmReg = gpr(15);

const GPR_NAMES: [&str; 16] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "fp", "ip", "sp", "lr",
    "pc",
];

pub fn is_gpr(reg: AsmReg) -> bool {
    reg.bank == BANK_GPR && (reg.id as usize) < GPR_NAMES.len()
}

pub fn is_vfp(reg: AsmReg) -> bool {
    matches!(reg.bank, BANK_SREG | BANK_DREG | BANK_QREG)
}

/// Assembly name of a register.
pub fn reg_name(reg: AsmReg) -> String {
    match reg.bank {
        BANK_GPR => GPR_NAMES
            .get(reg.id as usize)
            .map(|name| (*name).to_string())
            .unwrap_or_else(|| format!("r?{}", reg.id)),
        BANK_SREG => format!("s{}", reg.id),
        BANK_DREG => format!("d{}", reg.id),
        BANK_QREG => format!("q{}", reg.id),
        _ => format!("?{}:{}", reg.bank, reg.id),
    }
}
