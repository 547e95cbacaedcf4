//! Register identifiers and register sets.
//!
//! Registers are identified by a bank and an index within the bank. The
//! register allocator writes these into variables in place; the instruction
//! model only reads them back for legality checks and emission. Register
//! lists (push/pop) are normalised through [`RegBitSet`], which iterates in
//! ascending register order as the A32 register-list encodings require.

/// Maximum number of register banks supported (core, S, D, Q).
pub const MAX_REGISTER_BANKS: usize = 4;

/// Type for register bank indices.
pub type RegBank = u8;

/// Type for register IDs within a bank.
pub type RegId = u8;

/// Combined register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AsmReg {
    pub bank: RegBank,
    pub id: RegId,
}

impl AsmReg {
    pub const fn new(bank: RegBank, id: RegId) -> Self {
        Self { bank, id }
    }
}

/// Bit set for efficiently tracking register sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegBitSet {
    /// Bit mask for each register bank.
    banks: [u64; MAX_REGISTER_BANKS],
}

impl RegBitSet {
    /// Create empty register set.
    pub fn new() -> Self {
        Self {
            banks: [0; MAX_REGISTER_BANKS],
        }
    }

    /// Check if register is set.
    pub fn contains(&self, reg: AsmReg) -> bool {
        if reg.bank as usize >= MAX_REGISTER_BANKS || reg.id >= 64 {
            return false;
        }
        (self.banks[reg.bank as usize] & (1u64 << reg.id)) != 0
    }

    /// Set a register. Returns false if it was already present.
    pub fn insert(&mut self, reg: AsmReg) -> bool {
        if reg.bank as usize >= MAX_REGISTER_BANKS || reg.id >= 64 {
            return false;
        }
        let was_set = self.contains(reg);
        self.banks[reg.bank as usize] |= 1u64 << reg.id;
        !was_set
    }

    /// Clear a register.
    pub fn clear(&mut self, reg: AsmReg) {
        if (reg.bank as usize) < MAX_REGISTER_BANKS && reg.id < 64 {
            self.banks[reg.bank as usize] &= !(1u64 << reg.id);
        }
    }

    /// Raw mask of one bank. For the core bank this is the A32 register-list
    /// field of push/pop.
    pub fn bank_mask(&self, bank: RegBank) -> u64 {
        self.banks.get(bank as usize).copied().unwrap_or(0)
    }

    /// Count number of set registers in bank.
    pub fn count_in_bank(&self, bank: RegBank) -> u32 {
        self.bank_mask(bank).count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.iter().all(|&mask| mask == 0)
    }

    /// Iterate over the set registers, lowest bank and index first.
    pub fn iter(&self) -> impl Iterator<Item = AsmReg> + '_ {
        self.banks.iter().enumerate().flat_map(|(bank, &mask)| {
            (0..64u8)
                .filter(move |id| mask & (1u64 << id) != 0)
                .map(move |id| AsmReg::new(bank as RegBank, id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_reports_duplicates() {
        let mut set = RegBitSet::new();
        assert!(set.insert(AsmReg::new(0, 4)));
        assert!(!set.insert(AsmReg::new(0, 4)));
        assert_eq!(set.count_in_bank(0), 1);
        set.clear(AsmReg::new(0, 4));
        assert!(set.is_empty());
    }

    #[test]
    fn test_iter_is_ascending() {
        let mut set = RegBitSet::new();
        set.insert(AsmReg::new(0, 14));
        set.insert(AsmReg::new(0, 4));
        set.insert(AsmReg::new(0, 5));
        let regs: Vec<_> = set.iter().map(|r| r.id).collect();
        assert_eq!(regs, vec![4, 5, 14]);
        assert_eq!(set.bank_mask(0), (1 << 4) | (1 << 5) | (1 << 14));
    }
}
