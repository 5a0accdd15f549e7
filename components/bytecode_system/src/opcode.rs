//! Bytecode opcodes and static instruction metadata.
//!
//! Every per-opcode attribute the dispatch loop consumes (inline-cache
//! entry counts, argument presence, jump classification, deoptimization
//! targets, constant usage) is generated from the single `define_opcodes!`
//! invocation below. Keeping one source of truth is what keeps the tables
//! in lockstep with the enumeration; nothing in this crate duplicates a
//! per-opcode attribute by hand.
//!
//! Numbering epoch: 0-31 are argument-less generic opcodes, 32-79 generic
//! opcodes with an argument, 80-127 specialized variants, 128 and up are
//! tier-2 guard micro-ops. The epoch is arbitrary but applied consistently;
//! renumbering requires touching only the table below.

/// How an opcode's argument is interpreted for control flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    /// Not a jump
    None,
    /// Argument is an offset relative to the next instruction
    Relative,
    /// Argument is an absolute instruction index
    Absolute,
}

/// Static metadata for one opcode
///
/// A flattened view of every attribute table, for callers that want the
/// whole row at once (disassemblers, mostly). The dispatch loop uses the
/// individual [`Opcode`] accessors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeDescriptor {
    /// The opcode's number in the current numbering epoch
    pub numeric_code: u8,
    /// Human-readable instruction name
    pub mnemonic: &'static str,
    /// Number of inline-cache entries following the instruction
    pub cache_entries: u8,
    /// Whether the instruction carries an argument
    pub has_argument: bool,
    /// Whether the argument is a relative jump offset
    pub is_relative_jump: bool,
    /// Whether the argument is an absolute jump target
    pub is_absolute_jump: bool,
    /// The generic opcode this opcode de-specializes to (itself if generic)
    pub deopt_target: Opcode,
    /// Whether the argument indexes the constant pool
    pub uses_constant_operand: bool,
}

macro_rules! opcode_flag_bit {
    (arg) => {
        1u8
    };
    (rel) => {
        2u8
    };
    (abs) => {
        4u8
    };
    (konst) => {
        8u8
    };
}

macro_rules! define_opcodes {
    ($(
        $name:ident = $code:literal, caches $caches:literal, [$($flag:ident)*], deopt $deopt:ident;
    )+) => {
        /// Bytecode opcodes for the runtime's instruction set
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                #[doc = concat!("Opcode ", stringify!($code))]
                $name = $code,
            )+
        }

        impl Opcode {
            /// Every defined opcode, in table order
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name),+];

            /// Look up an opcode by its numeric code
            ///
            /// Returns `None` for numbers outside the defined table.
            pub const fn from_byte(code: u8) -> Option<Opcode> {
                match code {
                    $($code => Some(Opcode::$name),)+
                    _ => None,
                }
            }

            /// Human-readable instruction name
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => stringify!($name),)+
                }
            }

            /// Number of inline-cache entries following this instruction
            ///
            /// The dispatch loop skips this many code units after executing
            /// the instruction.
            pub const fn cache_entries(self) -> u8 {
                match self {
                    $(Opcode::$name => $caches,)+
                }
            }

            /// The generic opcode this opcode falls back to when a
            /// specialization guard fails
            ///
            /// Generic opcodes map to themselves, so the mapping is
            /// idempotent over the whole table.
            pub const fn deopt(self) -> Opcode {
                match self {
                    $(Opcode::$name => Opcode::$deopt,)+
                }
            }

            const fn flag_bits(self) -> u8 {
                match self {
                    $(Opcode::$name => 0u8 $(| opcode_flag_bit!($flag))*,)+
                }
            }
        }
    };
}

define_opcodes! {
    // Argument-less generic opcodes
    Cache                  =   0, caches 0, [],          deopt Cache;
    Nop                    =   1, caches 0, [],          deopt Nop;
    PopTop                 =   2, caches 0, [],          deopt PopTop;
    PushNull               =   3, caches 0, [],          deopt PushNull;
    UnaryNegative          =   4, caches 0, [],          deopt UnaryNegative;
    UnaryNot               =   5, caches 0, [],          deopt UnaryNot;
    UnaryInvert            =   6, caches 0, [],          deopt UnaryInvert;
    BinarySubscr           =   7, caches 4, [],          deopt BinarySubscr;
    StoreSubscr            =   8, caches 1, [],          deopt StoreSubscr;
    DeleteSubscr           =   9, caches 0, [],          deopt DeleteSubscr;
    GetIter                =  10, caches 0, [],          deopt GetIter;
    GetLen                 =  11, caches 0, [],          deopt GetLen;
    ReturnValue            =  12, caches 0, [],          deopt ReturnValue;

    // Generic opcodes with an argument
    LoadConst              =  32, caches 0, [arg konst], deopt LoadConst;
    ReturnConst            =  33, caches 0, [arg konst], deopt ReturnConst;
    LoadFast               =  34, caches 0, [arg],       deopt LoadFast;
    StoreFast              =  35, caches 0, [arg],       deopt StoreFast;
    DeleteFast             =  36, caches 0, [arg],       deopt DeleteFast;
    LoadGlobal             =  37, caches 5, [arg],       deopt LoadGlobal;
    StoreGlobal            =  38, caches 0, [arg],       deopt StoreGlobal;
    DeleteGlobal           =  39, caches 0, [arg],       deopt DeleteGlobal;
    LoadAttr               =  40, caches 4, [arg],       deopt LoadAttr;
    StoreAttr              =  41, caches 4, [arg],       deopt StoreAttr;
    DeleteAttr             =  42, caches 0, [arg],       deopt DeleteAttr;
    BinaryOp               =  43, caches 1, [arg],       deopt BinaryOp;
    CompareOp              =  44, caches 2, [arg],       deopt CompareOp;
    Call                   =  45, caches 4, [arg],       deopt Call;
    UnpackSequence         =  46, caches 1, [arg],       deopt UnpackSequence;
    Swap                   =  47, caches 0, [arg],       deopt Swap;
    Copy                   =  48, caches 0, [arg],       deopt Copy;
    BuildList              =  49, caches 0, [arg],       deopt BuildList;
    BuildTuple             =  50, caches 0, [arg],       deopt BuildTuple;
    BuildMap               =  51, caches 0, [arg],       deopt BuildMap;
    JumpForward            =  52, caches 0, [arg rel],   deopt JumpForward;
    JumpBackward           =  53, caches 0, [arg rel],   deopt JumpBackward;
    ForIter                =  54, caches 0, [arg rel],   deopt ForIter;
    PopJumpIfFalse         =  55, caches 0, [arg abs],   deopt PopJumpIfFalse;
    PopJumpIfTrue          =  56, caches 0, [arg abs],   deopt PopJumpIfTrue;
    JumpIfFalseOrPop       =  57, caches 0, [arg abs],   deopt JumpIfFalseOrPop;
    JumpIfTrueOrPop        =  58, caches 0, [arg abs],   deopt JumpIfTrueOrPop;

    // Specialized variants (deopt to their generic family head)
    BinaryOpAddInt         =  80, caches 1, [arg],       deopt BinaryOp;
    BinaryOpAddFloat       =  81, caches 1, [arg],       deopt BinaryOp;
    BinaryOpAddStr         =  82, caches 1, [arg],       deopt BinaryOp;
    BinaryOpSubtractInt    =  83, caches 1, [arg],       deopt BinaryOp;
    BinaryOpSubtractFloat  =  84, caches 1, [arg],       deopt BinaryOp;
    BinaryOpMultiplyInt    =  85, caches 1, [arg],       deopt BinaryOp;
    BinaryOpMultiplyFloat  =  86, caches 1, [arg],       deopt BinaryOp;
    BinarySubscrListInt    =  87, caches 4, [],          deopt BinarySubscr;
    BinarySubscrDict       =  88, caches 4, [],          deopt BinarySubscr;
    BinarySubscrStrInt     =  89, caches 4, [],          deopt BinarySubscr;
    StoreSubscrListInt     =  90, caches 1, [],          deopt StoreSubscr;
    StoreSubscrDict        =  91, caches 1, [],          deopt StoreSubscr;
    CompareOpInt           =  92, caches 2, [arg],       deopt CompareOp;
    CompareOpFloat         =  93, caches 2, [arg],       deopt CompareOp;
    CompareOpStr           =  94, caches 2, [arg],       deopt CompareOp;
    LoadGlobalModule       =  95, caches 5, [arg],       deopt LoadGlobal;
    LoadGlobalBuiltin      =  96, caches 5, [arg],       deopt LoadGlobal;
    LoadAttrInstance       =  97, caches 4, [arg],       deopt LoadAttr;
    LoadAttrModule         =  98, caches 4, [arg],       deopt LoadAttr;
    StoreAttrInstance      =  99, caches 4, [arg],       deopt StoreAttr;
    CallPyExact            = 100, caches 4, [arg],       deopt Call;
    CallBuiltin            = 101, caches 4, [arg],       deopt Call;
    UnpackSequenceList     = 102, caches 1, [arg],       deopt UnpackSequence;
    UnpackSequenceTuple    = 103, caches 1, [arg],       deopt UnpackSequence;
    UnpackSequenceTwoTuple = 104, caches 1, [arg],       deopt UnpackSequence;

    // Tier-2 guard micro-ops (argument selects the checked stack slot)
    CheckInt               = 128, caches 0, [arg],       deopt CheckInt;
    CheckFloat             = 129, caches 0, [arg],       deopt CheckFloat;
    CheckStr               = 130, caches 0, [arg],       deopt CheckStr;
    CheckList              = 131, caches 0, [arg],       deopt CheckList;
    CheckNotNull           = 132, caches 0, [arg],       deopt CheckNotNull;
}

impl Opcode {
    /// Check whether the instruction carries an argument
    pub const fn has_arg(self) -> bool {
        self.flag_bits() & opcode_flag_bit!(arg) != 0
    }

    /// Check whether the argument indexes the constant pool
    pub const fn uses_constant(self) -> bool {
        self.flag_bits() & opcode_flag_bit!(konst) != 0
    }

    /// Classify the instruction's argument as a jump target
    pub const fn jump_kind(self) -> JumpKind {
        if self.flag_bits() & opcode_flag_bit!(rel) != 0 {
            JumpKind::Relative
        } else if self.flag_bits() & opcode_flag_bit!(abs) != 0 {
            JumpKind::Absolute
        } else {
            JumpKind::None
        }
    }

    /// Check whether this is a specialized variant of a generic opcode
    pub const fn is_specialized(self) -> bool {
        self as u8 != self.deopt() as u8
    }

    /// Assemble the full metadata row for this opcode
    pub const fn descriptor(self) -> OpcodeDescriptor {
        OpcodeDescriptor {
            numeric_code: self as u8,
            mnemonic: self.mnemonic(),
            cache_entries: self.cache_entries(),
            has_argument: self.has_arg(),
            is_relative_jump: matches!(self.jump_kind(), JumpKind::Relative),
            is_absolute_jump: matches!(self.jump_kind(), JumpKind::Absolute),
            deopt_target: self.deopt(),
            uses_constant_operand: self.uses_constant(),
        }
    }
}

/// Sub-operation selector carried in `BinaryOp`'s argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BinaryOpKind {
    /// `a + b`
    Add = 0,
    /// `a - b`
    Subtract = 1,
    /// `a * b`
    Multiply = 2,
    /// `a / b`
    TrueDivide = 3,
    /// `a // b`
    FloorDivide = 4,
    /// `a % b`
    Remainder = 5,
    /// `a ** b`
    Power = 6,
    /// `a << b`
    Lshift = 7,
    /// `a >> b`
    Rshift = 8,
    /// `a & b`
    And = 9,
    /// `a | b`
    Or = 10,
    /// `a ^ b`
    Xor = 11,
}

impl BinaryOpKind {
    /// Decode a `BinaryOp` argument
    pub const fn from_oparg(oparg: u32) -> Option<BinaryOpKind> {
        match oparg {
            0 => Some(BinaryOpKind::Add),
            1 => Some(BinaryOpKind::Subtract),
            2 => Some(BinaryOpKind::Multiply),
            3 => Some(BinaryOpKind::TrueDivide),
            4 => Some(BinaryOpKind::FloorDivide),
            5 => Some(BinaryOpKind::Remainder),
            6 => Some(BinaryOpKind::Power),
            7 => Some(BinaryOpKind::Lshift),
            8 => Some(BinaryOpKind::Rshift),
            9 => Some(BinaryOpKind::And),
            10 => Some(BinaryOpKind::Or),
            11 => Some(BinaryOpKind::Xor),
            _ => None,
        }
    }

    /// Encode as a `BinaryOp` argument
    pub const fn to_oparg(self) -> u32 {
        self as u32
    }
}
