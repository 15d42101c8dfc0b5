//! Bytecode opcodes for the Stratus VM
//!
//! All opcodes are a single byte, followed by fixed-size little-endian
//! operands as listed in [`Opcode::operands`].
//!
//! Opcodes are organized into categories:
//! - 0x00-0x0F: Stack manipulation & literals
//! - 0x10-0x17: Frames & local slots
//! - 0x18-0x2F: Typed field loads and stores
//! - 0x30-0x3F: Array elements
//! - 0x40-0x4F: Integer arithmetic
//! - 0x50-0x5F: Float arithmetic (f64, then f32)
//! - 0x60-0x6F: Comparison & logical
//! - 0x70-0x77: Numeric conversions
//! - 0x78-0x7F: Strings
//! - 0x80-0x87: Jumps
//! - 0x88-0x8F: Calls
//! - 0x90-0x9F: Allocation, unions & interfaces

/// Operand encoding following an opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    None,
    U8,
    U16,
    U32,
    /// Two u32 values
    U32U32,
    /// u64 address then u8 argument count
    U64U8,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl Operands {
    pub fn size(self) -> usize {
        match self {
            Operands::None => 0,
            Operands::U8 | Operands::I8 => 1,
            Operands::U16 | Operands::I16 => 2,
            Operands::U32 | Operands::I32 | Operands::F32 => 4,
            Operands::U32U32 | Operands::I64 | Operands::F64 => 8,
            Operands::U64U8 => 9,
        }
    }
}

macro_rules! opcodes {
    ($( $(#[$doc:meta])* $name:ident = $value:literal, $operands:ident; )*) => {
        /// Bytecode opcode enumeration
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $( $(#[$doc])* $name = $value, )*
        }

        impl Opcode {
            /// Decode an opcode byte
            pub fn from_u8(byte: u8) -> Option<Opcode> {
                match byte {
                    $( $value => Some(Opcode::$name), )*
                    _ => None,
                }
            }

            /// Mnemonic used by the disassembler
            pub fn name(self) -> &'static str {
                match self {
                    $( Opcode::$name => stringify!($name), )*
                }
            }

            pub fn operands(self) -> Operands {
                match self {
                    $( Opcode::$name => Operands::$operands, )*
                }
            }
        }
    };
}

opcodes! {
    // ===== Stack manipulation & literals =====
    Nop = 0x00, None;
    /// Discard the top value
    Pop = 0x01, None;
    Dup = 0x02, None;
    PushNull = 0x03, None;
    PushTrue = 0x04, None;
    PushFalse = 0x05, None;
    PushI8 = 0x06, I8;
    PushI16 = 0x07, I16;
    PushI32 = 0x08, I32;
    PushI64 = 0x09, I64;
    PushF32 = 0x0A, F32;
    PushF64 = 0x0B, F64;
    /// Push a constant-pool entry; strings are materialized on the heap
    PushConst = 0x0C, U32;

    // ===== Frames & locals =====
    /// Reserve the frame's local slots; first instruction of every function
    Frame = 0x10, U16;
    LoadLocal = 0x11, U16;
    StoreLocal = 0x12, U16;

    // ===== Fields: pop object, push value at byte offset =====
    LoadI8 = 0x18, U32;
    LoadI16 = 0x19, U32;
    LoadI32 = 0x1A, U32;
    LoadI64 = 0x1B, U32;
    LoadU8 = 0x1C, U32;
    LoadU16 = 0x1D, U32;
    LoadU32 = 0x1E, U32;
    LoadF32 = 0x1F, U32;
    LoadF64 = 0x20, U32;
    LoadBool = 0x21, U32;
    /// Load an object or array reference; no width dispatch
    LoadRef = 0x22, U32;

    // ===== Fields: pop value, pop object, store at byte offset =====
    Store8 = 0x28, U32;
    Store16 = 0x29, U32;
    Store32 = 0x2A, U32;
    Store64 = 0x2B, U32;
    StoreF32 = 0x2C, U32;
    StoreF64 = 0x2D, U32;
    StoreBool = 0x2E, U32;
    StoreRef = 0x2F, U32;

    // ===== Arrays =====
    /// Pop index, pop array, push element (operand: slot kind)
    LoadElem = 0x30, U8;
    /// Pop value, pop index, pop array (operand: slot kind)
    StoreElem = 0x31, U8;
    ArrayLen = 0x32, None;

    // ===== Integer arithmetic =====
    IAdd = 0x40, None;
    ISub = 0x41, None;
    IMul = 0x42, None;
    IDiv = 0x43, None;
    UDiv = 0x44, None;
    IRem = 0x45, None;
    URem = 0x46, None;
    INeg = 0x47, None;
    IAnd = 0x48, None;
    IOr = 0x49, None;
    IXor = 0x4A, None;
    IShl = 0x4B, None;
    /// Arithmetic shift right
    IShr = 0x4C, None;
    /// Logical shift right
    UShr = 0x4D, None;
    /// Bitwise complement
    INot = 0x4E, None;

    // ===== Float arithmetic =====
    F64Add = 0x50, None;
    F64Sub = 0x51, None;
    F64Mul = 0x52, None;
    F64Div = 0x53, None;
    F64Rem = 0x54, None;
    F64Neg = 0x55, None;
    /// f32 operations round their result to single precision
    F32Add = 0x58, None;
    F32Sub = 0x59, None;
    F32Mul = 0x5A, None;
    F32Div = 0x5B, None;
    F32Rem = 0x5C, None;
    F32Neg = 0x5D, None;

    // ===== Comparison & logical =====
    /// Value equality; references compare by identity
    Eq = 0x60, None;
    Ne = 0x61, None;
    ILt = 0x62, None;
    ILe = 0x63, None;
    IGt = 0x64, None;
    IGe = 0x65, None;
    ULt = 0x66, None;
    ULe = 0x67, None;
    UGt = 0x68, None;
    UGe = 0x69, None;
    FLt = 0x6A, None;
    FLe = 0x6B, None;
    FGt = 0x6C, None;
    FGe = 0x6D, None;
    Not = 0x6E, None;

    // ===== Conversions =====
    IntToF64 = 0x70, None;
    UIntToF64 = 0x71, None;
    IntToF32 = 0x72, None;
    UIntToF32 = 0x73, None;

    // ===== Strings =====
    StrConcat = 0x78, None;
    IntToStr = 0x79, None;
    UIntToStr = 0x7A, None;
    StrEq = 0x7B, None;
    StrNe = 0x7C, None;

    // ===== Jumps: operand is a constant index holding the target address =====
    Jump = 0x80, U32;
    JumpIfFalse = 0x81, U32;
    JumpIfTrue = 0x82, U32;

    // ===== Calls =====
    /// Call a function at an immediate address with `argc` arguments
    Call = 0x88, U64U8;
    /// Pop an address, then call it with `argc` arguments
    CallIndirect = 0x89, U8;
    Return = 0x8A, None;
    ReturnVoid = 0x8B, None;
    /// Call a foreign function by index into the chunk's foreign table
    NativeCall = 0x8C, U32;

    // ===== Allocation =====
    /// Allocate a zeroed object (operand: layout index)
    New = 0x90, U32;
    /// Pop a length, allocate a zeroed array (operand: layout index)
    Array = 0x91, U32;
    /// Pop a payload and box it (operands: union layout, tag)
    MakeUnion = 0x92, U32U32;
    /// Pop a union, push whether its tag equals the operand
    IsTag = 0x93, U32;
    /// Pop a union, push its payload read as the given slot kind
    UnionPayload = 0x94, U8;
    /// Allocate an interface object (operand: layout index)
    InterfaceNew = 0x95, U32;
    /// Pop two unions, push whether tags and payloads match
    /// (operands: union layout, bit mask of member tags holding strings)
    UnionEq = 0x96, U32U32;
}

impl Opcode {
    pub fn operand_size(self) -> usize {
        self.operands().size()
    }

    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::JumpIfFalse | Opcode::JumpIfTrue)
    }

    pub fn is_call(self) -> bool {
        matches!(self, Opcode::Call | Opcode::CallIndirect | Opcode::NativeCall)
    }

    pub fn is_allocation(self) -> bool {
        matches!(
            self,
            Opcode::New
                | Opcode::Array
                | Opcode::MakeUnion
                | Opcode::InterfaceNew
                | Opcode::StrConcat
                | Opcode::IntToStr
                | Opcode::UIntToStr
                | Opcode::PushConst
        )
    }

    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Return | Opcode::ReturnVoid)
    }
}
