//! Bytecode opcodes
//!
//! This module defines the instruction set used by the bytecode interpreter.
//! Operands follow the opcode byte: u16 indices are little-endian, jump
//! offsets are little-endian i16 relative to the end of the instruction.

/// Bytecode opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    // ========== Stack Operations ==========
    /// No operation
    Nop = 0x00,
    /// Pop the top value from the stack
    Pop = 0x01,
    /// Duplicate the top value on the stack
    Dup = 0x02,
    /// Swap the top two values on the stack
    Swap = 0x03,

    // ========== Constants ==========
    /// Load a constant from the constant pool
    /// Operands: constant_index (u16)
    Constant = 0x10,
    /// Push undefined
    Undefined = 0x11,
    /// Push null
    Null = 0x12,
    /// Push true
    True = 0x13,
    /// Push false
    False = 0x14,

    // ========== Bindings ==========
    /// Resolve an identifier and push its value
    /// Operands: name_index (u16)
    GetBinding = 0x20,
    /// Assign the top value to an identifier (value stays on the stack)
    /// Operands: name_index (u16)
    SetBinding = 0x21,
    /// Pop a value and initialize the identifier's binding with it
    /// Operands: name_index (u16)
    InitializeBinding = 0x22,
    /// Push `typeof identifier`, tolerating unresolvable names
    /// Operands: name_index (u16)
    TypeofBinding = 0x23,

    // ========== Properties ==========
    /// [object] -> [object.name]
    /// Operands: name_index (u16)
    GetProperty = 0x30,
    /// [object, value] -> [value]
    /// Operands: name_index (u16)
    SetProperty = 0x31,
    /// [object, value] -> [object], defining an own data property
    /// Operands: name_index (u16)
    DefineField = 0x32,
    /// [object, key] -> [object[key]]
    GetElement = 0x33,
    /// [object, key, value] -> [value]
    SetElement = 0x34,
    /// [object, key, value] -> [object], defining an own data property
    DefineElement = 0x35,

    // ========== Arithmetic ==========
    /// Add top two values
    Add = 0x40,
    /// Subtract top from second
    Sub = 0x41,
    /// Multiply top two values
    Mul = 0x42,
    /// Divide second by top
    Div = 0x43,
    /// Negate top value
    Neg = 0x46,

    // ========== Comparison ==========
    /// Strict equality (===)
    StrictEq = 0x62,
    /// Strict inequality (!==)
    StrictNe = 0x63,
    /// Less than
    Lt = 0x64,
    /// Less than or equal
    Le = 0x65,
    /// Greater than
    Gt = 0x66,
    /// Greater than or equal
    Ge = 0x67,

    // ========== Logical ==========
    /// Logical NOT
    Not = 0x70,

    // ========== Type Operations ==========
    /// Get type of value
    Typeof = 0x80,
    /// Replace top value with undefined
    Void = 0x81,

    // ========== Control Flow ==========
    /// Unconditional jump
    /// Operands: offset (i16)
    Jump = 0x90,
    /// Jump if top value is falsy (value stays on the stack)
    /// Operands: offset (i16)
    JumpIfFalse = 0x91,

    // ========== Functions ==========
    /// [callee, this, arguments_array] -> [result]
    Call = 0xA0,
    /// Return top value from the executable
    Return = 0xA1,
    /// [constructor, arguments_array] -> [object]
    New = 0xA2,
    /// Instantiate a function template as a closure over the running scope
    /// Operands: function_index (u16)
    NewClosure = 0xA3,
    /// Evaluate a class template; pops the superclass first when it has one
    /// Operands: class_index (u16)
    NewClass = 0xA4,
    /// [arguments_array] -> [this]
    SuperCall = 0xA5,

    // ========== Objects and Arrays ==========
    /// Push an empty array
    NewArray = 0xB0,
    /// [array, value] -> [array]
    AppendElement = 0xB1,
    /// [array, iterable] -> [array]
    AppendSpread = 0xB2,
    /// Push an empty ordinary object
    NewObject = 0xB3,
    /// Push the resolved `this`
    This = 0xB4,

    // ========== Scopes ==========
    /// Enter a block scope
    /// Operands: scope_index (u16)
    PushScope = 0xC0,
    /// Leave the innermost block scope
    PopScope = 0xC1,
    /// Copy a block-level function binding to the variable environment
    /// Operands: name_index (u16)
    AnnexBCopy = 0xC2,
    /// Pop into the script completion value
    SetCompletion = 0xC3,
    /// Push the script completion value
    GetCompletion = 0xC4,

    // ========== Destructuring ==========
    /// [iterable] -> [array of its values]
    IterableToArray = 0xC8,
    /// [array] -> [array.slice(start)]
    /// Operands: start (u16)
    ArraySlice = 0xC9,
    /// Throw a TypeError if the top value is null or undefined
    RequireObjectCoercible = 0xCA,

    // ========== Exceptions ==========
    /// Throw top value
    Throw = 0xD2,

    // ========== Generators ==========
    /// Suspend, producing the top value
    Yield = 0xF8,
}

impl Opcode {
    /// Convert a byte to an opcode
    pub fn from_u8(byte: u8) -> Option<Opcode> {
        match byte {
            0x00 => Some(Opcode::Nop),
            0x01 => Some(Opcode::Pop),
            0x02 => Some(Opcode::Dup),
            0x03 => Some(Opcode::Swap),

            0x10 => Some(Opcode::Constant),
            0x11 => Some(Opcode::Undefined),
            0x12 => Some(Opcode::Null),
            0x13 => Some(Opcode::True),
            0x14 => Some(Opcode::False),

            0x20 => Some(Opcode::GetBinding),
            0x21 => Some(Opcode::SetBinding),
            0x22 => Some(Opcode::InitializeBinding),
            0x23 => Some(Opcode::TypeofBinding),

            0x30 => Some(Opcode::GetProperty),
            0x31 => Some(Opcode::SetProperty),
            0x32 => Some(Opcode::DefineField),
            0x33 => Some(Opcode::GetElement),
            0x34 => Some(Opcode::SetElement),
            0x35 => Some(Opcode::DefineElement),

            0x40 => Some(Opcode::Add),
            0x41 => Some(Opcode::Sub),
            0x42 => Some(Opcode::Mul),
            0x43 => Some(Opcode::Div),
            0x46 => Some(Opcode::Neg),

            0x62 => Some(Opcode::StrictEq),
            0x63 => Some(Opcode::StrictNe),
            0x64 => Some(Opcode::Lt),
            0x65 => Some(Opcode::Le),
            0x66 => Some(Opcode::Gt),
            0x67 => Some(Opcode::Ge),

            0x70 => Some(Opcode::Not),

            0x80 => Some(Opcode::Typeof),
            0x81 => Some(Opcode::Void),

            0x90 => Some(Opcode::Jump),
            0x91 => Some(Opcode::JumpIfFalse),

            0xA0 => Some(Opcode::Call),
            0xA1 => Some(Opcode::Return),
            0xA2 => Some(Opcode::New),
            0xA3 => Some(Opcode::NewClosure),
            0xA4 => Some(Opcode::NewClass),
            0xA5 => Some(Opcode::SuperCall),

            0xB0 => Some(Opcode::NewArray),
            0xB1 => Some(Opcode::AppendElement),
            0xB2 => Some(Opcode::AppendSpread),
            0xB3 => Some(Opcode::NewObject),
            0xB4 => Some(Opcode::This),

            0xC0 => Some(Opcode::PushScope),
            0xC1 => Some(Opcode::PopScope),
            0xC2 => Some(Opcode::AnnexBCopy),
            0xC3 => Some(Opcode::SetCompletion),
            0xC4 => Some(Opcode::GetCompletion),

            0xC8 => Some(Opcode::IterableToArray),
            0xC9 => Some(Opcode::ArraySlice),
            0xCA => Some(Opcode::RequireObjectCoercible),

            0xD2 => Some(Opcode::Throw),

            0xF8 => Some(Opcode::Yield),

            _ => None,
        }
    }

    /// Get the size of this instruction including operands
    pub fn instruction_size(&self) -> usize {
        match self {
            // 2-byte operand
            Opcode::Constant
            | Opcode::GetBinding
            | Opcode::SetBinding
            | Opcode::InitializeBinding
            | Opcode::TypeofBinding
            | Opcode::GetProperty
            | Opcode::SetProperty
            | Opcode::DefineField
            | Opcode::Jump
            | Opcode::JumpIfFalse
            | Opcode::NewClosure
            | Opcode::NewClass
            | Opcode::PushScope
            | Opcode::AnnexBCopy
            | Opcode::ArraySlice => 3,

            // No operands
            _ => 1,
        }
    }

    /// Whether the operand is a relative jump offset
    pub fn is_jump(&self) -> bool {
        matches!(self, Opcode::Jump | Opcode::JumpIfFalse)
    }

    /// Whether control never falls through to the next instruction
    pub fn is_terminator(&self) -> bool {
        matches!(self, Opcode::Return | Opcode::Throw | Opcode::Jump)
    }
}
