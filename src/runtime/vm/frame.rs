//! Bytecode frames
//!
//! A [`Frame`] is the live state of one executable run; a [`FrameSnapshot`]
//! is that state detached from the interpreter so a generator can resume it
//! later. Snapshots hold only plain values and heap handles, so they can be
//! serialized and moved between owners freely.

use crate::bytecode::Executable;
use crate::error::{Error, Result};
use crate::gc::{Trace, Visitor};
use crate::runtime::Value;
use serde::{Deserialize, Serialize};

/// Detached interpreter state of a suspended executable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Instruction to resume at
    pub ip: usize,
    /// Operand stack at suspension
    pub stack: Vec<Value>,
    /// Script completion value
    pub completion: Value,
}

impl FrameSnapshot {
    /// Encode with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| Error::InternalError(format!("frame snapshot encoding failed: {}", e)))
    }

    /// Decode from bincode
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| Error::InternalError(format!("frame snapshot decoding failed: {}", e)))
    }
}

impl Trace for FrameSnapshot {
    fn trace(&self, visitor: &mut Visitor) {
        visitor.visit_values(&self.stack);
        visitor.visit_value(&self.completion);
    }
}

/// A running executable
pub(crate) struct Frame<'a> {
    pub executable: &'a Executable,
    pub ip: usize,
    pub stack: Vec<Value>,
    pub completion: Value,
}

impl<'a> Frame<'a> {
    /// Resume `executable` from a snapshot (the default snapshot starts at the top)
    pub fn resume(executable: &'a Executable, snapshot: FrameSnapshot) -> Self {
        Self {
            executable,
            ip: snapshot.ip,
            stack: snapshot.stack,
            completion: snapshot.completion,
        }
    }

    /// Detach the current state
    pub fn snapshot(self) -> FrameSnapshot {
        FrameSnapshot {
            ip: self.ip,
            stack: self.stack,
            completion: self.completion,
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.ip >= self.executable.code.len()
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        match self.executable.code.get(self.ip) {
            Some(byte) => {
                self.ip += 1;
                Ok(*byte)
            }
            None => Err(Error::InternalError(
                "Unexpected end of bytecode".to_string(),
            )),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b1 = self.read_u8()?;
        let b2 = self.read_u8()?;
        Ok(u16::from_le_bytes([b1, b2]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let b1 = self.read_u8()?;
        let b2 = self.read_u8()?;
        Ok(i16::from_le_bytes([b1, b2]))
    }

    /// Relative jump from the end of the current instruction
    pub fn jump(&mut self, offset: i16) -> Result<()> {
        let target = self.ip as isize + offset as isize;
        if target < 0 || target as usize > self.executable.code.len() {
            return Err(Error::InternalError(format!("Jump out of bounds: {}", target)));
        }
        self.ip = target as usize;
        Ok(())
    }

    pub fn read_name(&mut self) -> Result<String> {
        let index = self.read_u16()?;
        self.executable
            .get_name(index)
            .map(str::to_string)
            .ok_or_else(|| Error::InternalError(format!("Invalid name index {}", index)))
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| Error::InternalError("Stack underflow".to_string()))
    }

    pub fn peek(&self) -> Result<&Value> {
        self.stack
            .last()
            .ok_or_else(|| Error::InternalError("Stack underflow".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_bincode_round_trip() {
        let snapshot = FrameSnapshot {
            ip: 12,
            stack: vec![Value::Number(1.5), Value::from("x"), Value::Null],
            completion: Value::Boolean(true),
        };
        let bytes = snapshot.to_bytes().unwrap();
        assert_eq!(FrameSnapshot::from_bytes(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_corrupt_snapshot_is_an_internal_error() {
        assert!(matches!(
            FrameSnapshot::from_bytes(&[0xFF]),
            Err(Error::InternalError(_))
        ));
    }

    #[test]
    fn test_frame_stack_underflow() {
        let exe = Executable::new("empty");
        let mut frame = Frame::resume(&exe, FrameSnapshot::default());
        assert!(frame.is_at_end());
        assert!(matches!(frame.pop(), Err(Error::InternalError(_))));
        assert!(matches!(frame.read_u8(), Err(Error::InternalError(_))));
    }
}
