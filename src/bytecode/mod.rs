//! Bytecode representation and instruction set
//!
//! Function bodies compile lazily into an [`Executable`] on their first call
//! under [`ExecutionStrategy::Bytecode`](crate::config::ExecutionStrategy).
//! Executables are stack-machine code that resolves identifiers through the
//! same environment records the tree-walking interpreter uses, so both
//! strategies share closures, hoisting and `this` resolution.

mod compiler;
mod opcode;
mod optimizer;

pub use compiler::Compiler;
pub use opcode::Opcode;
pub use optimizer::{Optimizer, OptimizerConfig};

use crate::ast::{BlockScope, ClassNode, FunctionNode};
use crate::runtime::Value;
use std::fmt;
use std::rc::Rc;

/// A nested function expression or declaration to instantiate at runtime
#[derive(Debug, Clone)]
pub struct FunctionTemplate {
    pub node: Rc<FunctionNode>,
    /// Name given by the surrounding binding for anonymous functions
    pub name: Option<String>,
}

/// A class to evaluate at runtime
#[derive(Debug, Clone)]
pub struct ClassTemplate {
    pub node: Rc<ClassNode>,
    /// Name given by the surrounding binding for anonymous classes
    pub binding_name: Option<String>,
}

/// A compiled function body or script
#[derive(Debug, Clone, Default)]
pub struct Executable {
    /// Function name, for dumps and diagnostics
    pub name: String,
    /// Bytecode instructions
    pub code: Vec<u8>,
    /// Constant pool
    pub constants: Vec<Value>,
    /// Identifier and property names
    pub names: Vec<String>,
    /// Nested functions
    pub functions: Vec<FunctionTemplate>,
    /// Nested classes
    pub classes: Vec<ClassTemplate>,
    /// Block scopes entered by `PushScope`
    pub scopes: Vec<BlockScope>,
    /// Is this a generator body?
    pub is_generator: bool,
}

impl Executable {
    /// Create a new empty executable
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Write an opcode
    pub fn write_opcode(&mut self, opcode: Opcode) {
        self.code.push(opcode as u8);
    }

    /// Write a little-endian u16 operand
    pub fn write_u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// Add a constant to the pool and return its index
    pub fn add_constant(&mut self, value: Value) -> u16 {
        for (i, existing) in self.constants.iter().enumerate() {
            if existing.strict_equals(&value) {
                return i as u16;
            }
        }
        self.constants.push(value);
        (self.constants.len() - 1) as u16
    }

    /// Add a name to the name table and return its index
    pub fn add_name(&mut self, name: &str) -> u16 {
        if let Some(i) = self.names.iter().position(|n| n == name) {
            return i as u16;
        }
        self.names.push(name.to_string());
        (self.names.len() - 1) as u16
    }

    /// Get a constant from the pool
    pub fn get_constant(&self, index: u16) -> Option<&Value> {
        self.constants.get(index as usize)
    }

    /// Get a name from the name table
    pub fn get_name(&self, index: u16) -> Option<&str> {
        self.names.get(index as usize).map(String::as_str)
    }

    /// Read the u16 operand at `offset`
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let bytes = self.code.get(offset..offset + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read the i16 operand at `offset`
    pub fn read_i16(&self, offset: usize) -> Option<i16> {
        self.read_u16(offset).map(|v| v as i16)
    }

    /// Disassemble the executable for debugging
    pub fn disassemble(&self) -> String {
        let mut output = format!("== {} ==\n", if self.name.is_empty() { "<anonymous>" } else { &self.name });
        let mut offset = 0;

        while offset < self.code.len() {
            let (instruction, new_offset) = self.disassemble_instruction(offset);
            output.push_str(&instruction);
            output.push('\n');
            offset = new_offset;
        }

        output
    }

    /// Disassemble a single instruction
    pub fn disassemble_instruction(&self, offset: usize) -> (String, usize) {
        match Opcode::from_u8(self.code[offset]) {
            Some(op) => {
                let operands = self.format_operands(op, offset + 1);
                let instruction = format!("{:04} {:18} {}", offset, format!("{:?}", op), operands);
                (instruction.trim_end().to_string(), offset + op.instruction_size())
            }
            None => (format!("{:04} UNKNOWN({})", offset, self.code[offset]), offset + 1),
        }
    }

    fn format_operands(&self, opcode: Opcode, offset: usize) -> String {
        if opcode.instruction_size() == 1 {
            return String::new();
        }
        let Some(index) = self.read_u16(offset) else {
            return "???".to_string();
        };
        match opcode {
            Opcode::Constant => match self.get_constant(index) {
                Some(constant) => format!("{} ({:?})", index, constant),
                None => format!("{}", index),
            },
            Opcode::Jump | Opcode::JumpIfFalse => {
                let jump = index as i16;
                let target = offset as i32 + 2 + jump as i32;
                format!("{} -> {}", jump, target)
            }
            Opcode::NewClosure => match self.functions.get(index as usize) {
                Some(template) => format!("{} ({})", index, display_name(&template.node.name)),
                None => format!("{}", index),
            },
            Opcode::NewClass => match self.classes.get(index as usize) {
                Some(template) => format!(
                    "{} ({})",
                    index,
                    display_name(template.node.name.as_deref().unwrap_or_default())
                ),
                None => format!("{}", index),
            },
            Opcode::PushScope | Opcode::ArraySlice => format!("{}", index),
            _ => match self.get_name(index) {
                Some(name) => format!("{} ({})", index, name),
                None => format!("{}", index),
            },
        }
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "<anonymous>"
    } else {
        name
    }
}

impl fmt::Display for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.disassemble())
    }
}
