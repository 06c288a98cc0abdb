//! The mnemonic table: descriptors dispatching to a handful of addressing-mode encoder shapes.
//!
//! Base opcode bytes follow the real 6809 instruction set; the table's *shape* — one descriptor
//! per mnemonic carrying a base byte, optional page prefix, and a [`HandlerShape`] that a shared
//! encoder function interprets — mirrors the teacher's `consts.rs` `phf_map!` tables (compile
//! time perfect hashing instead of a runtime-built `HashMap`).

use phf::phf_map;

/// The six 6809 addressing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    /// `#value`
    Immediate,
    /// Direct page, 8-bit address.
    Direct,
    /// Indexed, with a register and optional offset/indirection.
    Indexed,
    /// 16-bit absolute address.
    Extended,
    /// No operand.
    Inherent,
    /// Signed PC-relative offset.
    Branch,
}

/// Index/stack/exchange registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// Accumulator A (8-bit).
    A,
    /// Accumulator B (8-bit).
    B,
    /// Combined D = A:B (16-bit).
    D,
    /// Direct-page register (8-bit).
    Dp,
    /// Condition-code register (8-bit).
    Cc,
    X,
    Y,
    U,
    S,
    Pc,
}

impl Register {
    /// Parse a register name (case-insensitive).
    pub fn parse(s: &str) -> Option<Register> {
        Some(match s.to_ascii_uppercase().as_str() {
            "A" => Register::A,
            "B" => Register::B,
            "D" => Register::D,
            "DP" => Register::Dp,
            "CC" => Register::Cc,
            "X" => Register::X,
            "Y" => Register::Y,
            "U" => Register::U,
            "S" => Register::S,
            "PC" => Register::Pc,
            _ => return None,
        })
    }

    /// Whether this register holds a 16-bit value (for EXG/TFR size-mismatch warnings).
    pub fn is_16bit(self) -> bool {
        matches!(self, Register::D | Register::X | Register::Y | Register::U | Register::S | Register::Pc)
    }

    /// The two-bit index-register field used in indexed postbytes (`X`/`Y`/`U`/`S` only).
    pub fn index_bits(self) -> Option<u8> {
        Some(match self {
            Register::X => 0b00,
            Register::Y => 0b01,
            Register::U => 0b10,
            Register::S => 0b11,
            _ => return None,
        })
    }

    /// The accumulator-offset postbyte base (`A,R` / `B,R` / `D,R` indexing).
    pub fn accum_offset_postbyte(self) -> Option<u8> {
        Some(match self {
            Register::A => 0x86,
            Register::B => 0x85,
            Register::D => 0x8B,
            _ => return None,
        })
    }

    /// EXG/TFR/PSH/PUL 4-bit register code.
    pub fn exg_code(self) -> u8 {
        match self {
            Register::D => 0x0,
            Register::X => 0x1,
            Register::Y => 0x2,
            Register::U => 0x3,
            Register::S => 0x4,
            Register::Pc => 0x5,
            Register::A => 0x8,
            Register::B => 0x9,
            Register::Cc => 0xA,
            Register::Dp => 0xB,
        }
    }

    /// PSH/PUL bitmask bit (register-list order is fixed by the architecture).
    pub fn push_pull_bit(self) -> u8 {
        match self {
            Register::Cc => 0x01,
            Register::A => 0x02,
            Register::B => 0x04,
            Register::Dp => 0x08,
            Register::X => 0x10,
            Register::Y => 0x20,
            Register::S | Register::U => 0x40,
            Register::Pc => 0x80,
            Register::D => 0x06,
        }
    }
}

/// The per-mnemonic dispatch shape; a shared encoder function (`crate::encode`) interprets each
/// shape identically for every mnemonic that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerShape {
    /// No operand; emit page byte (if any) then the base opcode.
    Inherent,
    /// Immediate/Direct/Indexed/Extended family: base is the immediate form.
    AccumOp {
        /// True when the immediate operand is 16 bits (D/X/Y/U/S-sized loads/compares).
        wide: bool,
    },
    /// Direct/Indexed/Extended only (no immediate): base is the direct-page form.
    DieOp,
    /// 8-bit signed PC-relative branch.
    ShortBranch,
    /// 16-bit PC-relative branch (`LBRA`/`LBSR` have no page prefix; the rest do).
    LongBranch,
    /// `JSR`/`BSR` subroutine call — `DieOp`-shaped for `JSR`, `ShortBranch`-shaped for `BSR`,
    /// `LongBranch`-shaped for `LBSR`; represented distinctly only because it participates in
    /// dead-code analysis differently (a call is not a dead-code boundary).
    Lea,
    /// `PSHS`/`PSHU`/`PULS`/`PULU`.
    PshPul,
    /// `EXG`/`TFR`.
    ExgTfr,
    /// `ANDCC`.
    AndCc,
    /// `ORCC`.
    OrCc,
    /// `CWAI` — like `ANDCC` followed by a wait-for-interrupt inherent opcode.
    Cwai,
}

/// Mnemonic descriptor.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeDescriptor {
    /// Canonical mnemonic text.
    pub mnemonic: &'static str,
    /// Short flag-summary string for listing output only (e.g. addressing modes supported).
    pub flags: &'static str,
    /// Dispatch shape.
    pub shape: HandlerShape,
    /// Base opcode byte (meaning depends on `shape`; see each variant).
    pub base: u8,
    /// Page-prefix byte, `0x10` or `0x11`, if this mnemonic requires one.
    pub page: Option<u8>,
    /// Cycle count, for `-e c` listing output.
    pub cycles: u8,
}

macro_rules! accum {
    ($mnem:literal, $base:literal, $wide:literal, $cycles:literal) => {
        OpcodeDescriptor {
            mnemonic: $mnem,
            flags: "IDXE",
            shape: HandlerShape::AccumOp { wide: $wide },
            base: $base,
            page: None,
            cycles: $cycles,
        }
    };
    ($mnem:literal, $page:literal, $base:literal, $wide:literal, $cycles:literal) => {
        OpcodeDescriptor {
            mnemonic: $mnem,
            flags: "IDXE",
            shape: HandlerShape::AccumOp { wide: $wide },
            base: $base,
            page: Some($page),
            cycles: $cycles,
        }
    };
}

macro_rules! die {
    ($mnem:literal, $base:literal, $cycles:literal) => {
        OpcodeDescriptor {
            mnemonic: $mnem,
            flags: "DXE",
            shape: HandlerShape::DieOp,
            base: $base,
            page: None,
            cycles: $cycles,
        }
    };
    ($mnem:literal, $page:literal, $base:literal, $cycles:literal) => {
        OpcodeDescriptor {
            mnemonic: $mnem,
            flags: "DXE",
            shape: HandlerShape::DieOp,
            base: $base,
            page: Some($page),
            cycles: $cycles,
        }
    };
}

macro_rules! inherent {
    ($mnem:literal, $base:literal, $cycles:literal) => {
        OpcodeDescriptor {
            mnemonic: $mnem,
            flags: "",
            shape: HandlerShape::Inherent,
            base: $base,
            page: None,
            cycles: $cycles,
        }
    };
    ($mnem:literal, $page:literal, $base:literal, $cycles:literal) => {
        OpcodeDescriptor {
            mnemonic: $mnem,
            flags: "",
            shape: HandlerShape::Inherent,
            base: $base,
            page: Some($page),
            cycles: $cycles,
        }
    };
}

macro_rules! sbranch {
    ($mnem:literal, $base:literal) => {
        OpcodeDescriptor {
            mnemonic: $mnem,
            flags: "B",
            shape: HandlerShape::ShortBranch,
            base: $base,
            page: None,
            cycles: 3,
        }
    };
}

macro_rules! lbranch {
    ($mnem:literal, $base:literal) => {
        OpcodeDescriptor {
            mnemonic: $mnem,
            flags: "B",
            shape: HandlerShape::LongBranch,
            base: $base,
            page: Some(0x10),
            cycles: 5,
        }
    };
    ($mnem:literal, $base:literal, noprefix) => {
        OpcodeDescriptor {
            mnemonic: $mnem,
            flags: "B",
            shape: HandlerShape::LongBranch,
            base: $base,
            page: None,
            cycles: 5,
        }
    };
}

/// The mnemonic → descriptor table, compile-time perfect-hashed like the teacher's
/// `MACHINE_NAMES` table.
pub static OPCODES: phf::Map<&'static str, OpcodeDescriptor> = phf_map! {
    // Inherent
    "NOP" => inherent!("NOP", 0x12, 2),
    "SYNC" => inherent!("SYNC", 0x13, 2),
    "DAA" => inherent!("DAA", 0x19, 2),
    "SEX" => inherent!("SEX", 0x1D, 2),
    "RTS" => inherent!("RTS", 0x39, 5),
    "ABX" => inherent!("ABX", 0x3A, 3),
    "RTI" => inherent!("RTI", 0x3B, 6),
    "MUL" => inherent!("MUL", 0x3D, 11),
    "SWI" => inherent!("SWI", 0x3F, 19),
    "SWI2" => inherent!("SWI2", 0x10, 0x3F, 20),
    "SWI3" => inherent!("SWI3", 0x11, 0x3F, 20),

    // Accumulator-inherent forms of the NEG/COM/LSR/ROR/ASR/ASL/ROL/DEC/INC/TST/CLR family
    // (distinct opcodes from the DXE-shaped memory forms below).
    "NEGA" => inherent!("NEGA", 0x40, 2),
    "COMA" => inherent!("COMA", 0x43, 2),
    "LSRA" => inherent!("LSRA", 0x44, 2),
    "RORA" => inherent!("RORA", 0x46, 2),
    "ASRA" => inherent!("ASRA", 0x47, 2),
    "ASLA" => inherent!("ASLA", 0x48, 2),
    "LSLA" => inherent!("LSLA", 0x48, 2),
    "ROLA" => inherent!("ROLA", 0x49, 2),
    "DECA" => inherent!("DECA", 0x4A, 2),
    "INCA" => inherent!("INCA", 0x4C, 2),
    "TSTA" => inherent!("TSTA", 0x4D, 2),
    "CLRA" => inherent!("CLRA", 0x4F, 2),

    "NEGB" => inherent!("NEGB", 0x50, 2),
    "COMB" => inherent!("COMB", 0x53, 2),
    "LSRB" => inherent!("LSRB", 0x54, 2),
    "RORB" => inherent!("RORB", 0x56, 2),
    "ASRB" => inherent!("ASRB", 0x57, 2),
    "ASLB" => inherent!("ASLB", 0x58, 2),
    "LSLB" => inherent!("LSLB", 0x58, 2),
    "ROLB" => inherent!("ROLB", 0x59, 2),
    "DECB" => inherent!("DECB", 0x5A, 2),
    "INCB" => inherent!("INCB", 0x5C, 2),
    "TSTB" => inherent!("TSTB", 0x5D, 2),
    "CLRB" => inherent!("CLRB", 0x5F, 2),

    // Accumulator family (immediate/direct/indexed/extended)
    "SUBA" => accum!("SUBA", 0x80, false, 2),
    "CMPA" => accum!("CMPA", 0x81, false, 2),
    "SBCA" => accum!("SBCA", 0x82, false, 2),
    "SUBD" => accum!("SUBD", 0x83, true, 4),
    "ANDA" => accum!("ANDA", 0x84, false, 2),
    "BITA" => accum!("BITA", 0x85, false, 2),
    "LDA" => accum!("LDA", 0x86, false, 2),
    "EORA" => accum!("EORA", 0x88, false, 2),
    "ADCA" => accum!("ADCA", 0x89, false, 2),
    "ORA" => accum!("ORA", 0x8A, false, 2),
    "ADDA" => accum!("ADDA", 0x8B, false, 2),
    "CMPX" => accum!("CMPX", 0x8C, true, 4),
    "LDX" => accum!("LDX", 0x8E, true, 3),

    "SUBB" => accum!("SUBB", 0xC0, false, 2),
    "CMPB" => accum!("CMPB", 0xC1, false, 2),
    "SBCB" => accum!("SBCB", 0xC2, false, 2),
    "ADDD" => accum!("ADDD", 0xC3, true, 4),
    "ANDB" => accum!("ANDB", 0xC4, false, 2),
    "BITB" => accum!("BITB", 0xC5, false, 2),
    "LDB" => accum!("LDB", 0xC6, false, 2),
    "EORB" => accum!("EORB", 0xC8, false, 2),
    "ADCB" => accum!("ADCB", 0xC9, false, 2),
    "ORB" => accum!("ORB", 0xCA, false, 2),
    "ADDB" => accum!("ADDB", 0xCB, false, 2),
    "LDD" => accum!("LDD", 0xCC, true, 3),
    "LDU" => accum!("LDU", 0xCE, true, 3),

    "CMPY" => accum!("CMPY", 0x10, 0x8C, true, 5),
    "LDY" => accum!("LDY", 0x10, 0x8E, true, 4),
    "LDS" => accum!("LDS", 0x10, 0xCE, true, 4),
    "CMPU" => accum!("CMPU", 0x11, 0x83, true, 5),
    "CMPS" => accum!("CMPS", 0x11, 0x8C, true, 5),

    // Direct/Indexed/Extended only (no immediate)
    "NEG" => die!("NEG", 0x00, 6),
    "COM" => die!("COM", 0x03, 6),
    "LSR" => die!("LSR", 0x04, 6),
    "ROR" => die!("ROR", 0x06, 6),
    "ASR" => die!("ASR", 0x07, 6),
    "ASL" => die!("ASL", 0x08, 6),
    "LSL" => die!("LSL", 0x08, 6),
    "ROL" => die!("ROL", 0x09, 6),
    "DEC" => die!("DEC", 0x0A, 6),
    "INC" => die!("INC", 0x0C, 6),
    "TST" => die!("TST", 0x0D, 6),
    "JMP" => die!("JMP", 0x0E, 3),
    "CLR" => die!("CLR", 0x0F, 6),
    "STA" => die!("STA", 0x97, 4),
    "STB" => die!("STB", 0xD7, 4),
    "STX" => die!("STX", 0x9F, 5),
    "STD" => die!("STD", 0xDD, 5),
    "STU" => die!("STU", 0xDF, 5),
    "JSR" => die!("JSR", 0x9D, 7),
    "STY" => die!("STY", 0x10, 0x9F, 6),
    "STS" => die!("STS", 0x10, 0xDF, 6),

    // Short branches
    "BRA" => sbranch!("BRA", 0x20),
    "BRN" => sbranch!("BRN", 0x21),
    "BHI" => sbranch!("BHI", 0x22),
    "BLS" => sbranch!("BLS", 0x23),
    "BCC" => sbranch!("BCC", 0x24),
    "BHS" => sbranch!("BHS", 0x24),
    "BCS" => sbranch!("BCS", 0x25),
    "BLO" => sbranch!("BLO", 0x25),
    "BNE" => sbranch!("BNE", 0x26),
    "BEQ" => sbranch!("BEQ", 0x27),
    "BVC" => sbranch!("BVC", 0x28),
    "BVS" => sbranch!("BVS", 0x29),
    "BPL" => sbranch!("BPL", 0x2A),
    "BMI" => sbranch!("BMI", 0x2B),
    "BGE" => sbranch!("BGE", 0x2C),
    "BLT" => sbranch!("BLT", 0x2D),
    "BGT" => sbranch!("BGT", 0x2E),
    "BLE" => sbranch!("BLE", 0x2F),
    "BSR" => sbranch!("BSR", 0x8D),

    // Long branches
    "LBRA" => lbranch!("LBRA", 0x16, noprefix),
    "LBSR" => lbranch!("LBSR", 0x17, noprefix),
    "LBRN" => lbranch!("LBRN", 0x21),
    "LBHI" => lbranch!("LBHI", 0x22),
    "LBLS" => lbranch!("LBLS", 0x23),
    "LBCC" => lbranch!("LBCC", 0x24),
    "LBHS" => lbranch!("LBHS", 0x24),
    "LBCS" => lbranch!("LBCS", 0x25),
    "LBLO" => lbranch!("LBLO", 0x25),
    "LBNE" => lbranch!("LBNE", 0x26),
    "LBEQ" => lbranch!("LBEQ", 0x27),
    "LBVC" => lbranch!("LBVC", 0x28),
    "LBVS" => lbranch!("LBVS", 0x29),
    "LBPL" => lbranch!("LBPL", 0x2A),
    "LBMI" => lbranch!("LBMI", 0x2B),
    "LBGE" => lbranch!("LBGE", 0x2C),
    "LBLT" => lbranch!("LBLT", 0x2D),
    "LBGT" => lbranch!("LBGT", 0x2E),
    "LBLE" => lbranch!("LBLE", 0x2F),

    // LEA / stack / register-pair
    "LEAX" => OpcodeDescriptor { mnemonic: "LEAX", flags: "X", shape: HandlerShape::Lea, base: 0x30, page: None, cycles: 4 },
    "LEAY" => OpcodeDescriptor { mnemonic: "LEAY", flags: "X", shape: HandlerShape::Lea, base: 0x31, page: None, cycles: 4 },
    "LEAS" => OpcodeDescriptor { mnemonic: "LEAS", flags: "X", shape: HandlerShape::Lea, base: 0x32, page: None, cycles: 4 },
    "LEAU" => OpcodeDescriptor { mnemonic: "LEAU", flags: "X", shape: HandlerShape::Lea, base: 0x33, page: None, cycles: 4 },

    "PSHS" => OpcodeDescriptor { mnemonic: "PSHS", flags: "", shape: HandlerShape::PshPul, base: 0x34, page: None, cycles: 5 },
    "PULS" => OpcodeDescriptor { mnemonic: "PULS", flags: "", shape: HandlerShape::PshPul, base: 0x35, page: None, cycles: 5 },
    "PSHU" => OpcodeDescriptor { mnemonic: "PSHU", flags: "", shape: HandlerShape::PshPul, base: 0x36, page: None, cycles: 5 },
    "PULU" => OpcodeDescriptor { mnemonic: "PULU", flags: "", shape: HandlerShape::PshPul, base: 0x37, page: None, cycles: 5 },

    "EXG" => OpcodeDescriptor { mnemonic: "EXG", flags: "", shape: HandlerShape::ExgTfr, base: 0x1E, page: None, cycles: 8 },
    "TFR" => OpcodeDescriptor { mnemonic: "TFR", flags: "", shape: HandlerShape::ExgTfr, base: 0x1F, page: None, cycles: 6 },

    "ANDCC" => OpcodeDescriptor { mnemonic: "ANDCC", flags: "", shape: HandlerShape::AndCc, base: 0x1C, page: None, cycles: 3 },
    "ORCC" => OpcodeDescriptor { mnemonic: "ORCC", flags: "", shape: HandlerShape::OrCc, base: 0x1A, page: None, cycles: 3 },
    "CWAI" => OpcodeDescriptor { mnemonic: "CWAI", flags: "", shape: HandlerShape::Cwai, base: 0x3C, page: None, cycles: 21 },
};

/// Look up a mnemonic, case-insensitively (the table itself is stored upper-case).
pub fn lookup(mnemonic: &str) -> Option<&'static OpcodeDescriptor> {
    OPCODES.get(mnemonic.to_ascii_uppercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accum_family_offsets_match_6809_isa() {
        let lda = lookup("LDA").unwrap();
        assert_eq!(lda.base, 0x86);
        let ldx = lookup("LDX").unwrap();
        assert_eq!(ldx.base, 0x8E);
    }

    #[test]
    fn die_family_present_for_stores_and_shifts() {
        assert_eq!(lookup("STA").unwrap().base, 0x97);
        assert_eq!(lookup("NEG").unwrap().base, 0x00);
        assert_eq!(lookup("JMP").unwrap().base, 0x0E);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(lookup("lda").is_some());
        assert!(lookup("Lda").is_some());
    }

    #[test]
    fn unknown_mnemonic_is_none() {
        assert!(lookup("FROBNICATE").is_none());
    }

    #[test]
    fn long_branches_without_prefix_are_lbra_lbsr_only() {
        assert_eq!(lookup("LBRA").unwrap().page, None);
        assert_eq!(lookup("LBEQ").unwrap().page, Some(0x10));
    }
}
