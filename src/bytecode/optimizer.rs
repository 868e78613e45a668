//! Bytecode optimization passes
//!
//! Passes rewrite instructions to `Nop` in place so every jump offset stays
//! valid. Each pass walks instruction boundaries and never rewrites code that
//! a jump lands inside of.

use super::{Executable, Opcode};
use crate::runtime::Value;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Configuration for the bytecode optimizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Enable constant folding
    pub constant_folding: bool,
    /// Enable dead code elimination
    pub dead_code_elimination: bool,
    /// Enable peephole optimizations
    pub peephole: bool,
    /// Enable jump threading
    pub jump_threading: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            constant_folding: true,
            dead_code_elimination: true,
            peephole: true,
            jump_threading: true,
        }
    }
}

impl OptimizerConfig {
    /// Every pass disabled
    pub fn disabled() -> Self {
        Self {
            constant_folding: false,
            dead_code_elimination: false,
            peephole: false,
            jump_threading: false,
        }
    }
}

/// Bytecode optimizer
#[derive(Debug, Default)]
pub struct Optimizer {
    config: OptimizerConfig,
}

/// A decoded instruction position
#[derive(Debug, Clone, Copy)]
struct Instruction {
    offset: usize,
    opcode: Opcode,
}

impl Optimizer {
    /// Create a new optimizer with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an optimizer with custom configuration
    pub fn with_config(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Optimize an executable
    pub fn optimize(&self, exe: &mut Executable) {
        let mut changed = true;
        let mut iterations = 0;
        const MAX_ITERATIONS: usize = 10;

        while changed && iterations < MAX_ITERATIONS {
            changed = false;
            iterations += 1;

            if self.config.constant_folding {
                changed |= self.constant_folding(exe);
            }

            if self.config.peephole {
                changed |= self.peephole_optimize(exe);
            }

            if self.config.dead_code_elimination {
                changed |= self.dead_code_elimination(exe);
            }

            if self.config.jump_threading {
                changed |= self.jump_threading(exe);
            }
        }
    }

    /// Constant folding: `Constant Constant BinaryOp` over numbers
    fn constant_folding(&self, exe: &mut Executable) -> bool {
        let mut changed = false;
        let instructions = decode(exe);
        let targets = jump_targets(exe, &instructions);

        for window in instructions.windows(3) {
            let [a, b, op] = [window[0], window[1], window[2]];
            if a.opcode != Opcode::Constant || b.opcode != Opcode::Constant {
                continue;
            }
            if targets.contains(&b.offset) || targets.contains(&op.offset) {
                continue;
            }
            // An earlier fold in this pass may have rewritten the pattern
            if exe.code[a.offset] != Opcode::Constant as u8 || exe.code[b.offset] != Opcode::Constant as u8 {
                continue;
            }
            let (Some(idx1), Some(idx2)) = (exe.read_u16(a.offset + 1), exe.read_u16(b.offset + 1)) else {
                continue;
            };
            let (Some(Value::Number(n1)), Some(Value::Number(n2))) =
                (exe.get_constant(idx1).cloned(), exe.get_constant(idx2).cloned())
            else {
                continue;
            };
            let result = match op.opcode {
                Opcode::Add => Value::Number(n1 + n2),
                Opcode::Sub => Value::Number(n1 - n2),
                Opcode::Mul => Value::Number(n1 * n2),
                Opcode::Div => Value::Number(n1 / n2),
                Opcode::Lt => Value::Boolean(n1 < n2),
                Opcode::Le => Value::Boolean(n1 <= n2),
                Opcode::Gt => Value::Boolean(n1 > n2),
                Opcode::Ge => Value::Boolean(n1 >= n2),
                Opcode::StrictEq => Value::Boolean(n1 == n2),
                Opcode::StrictNe => Value::Boolean(n1 != n2),
                _ => continue,
            };

            let new_idx = exe.add_constant(result);
            let bytes = new_idx.to_le_bytes();
            exe.code[a.offset + 1] = bytes[0];
            exe.code[a.offset + 2] = bytes[1];
            nop_out(exe, b.offset, op.offset + 1);
            changed = true;
        }

        changed
    }

    /// Peephole optimizations: simplify common patterns
    fn peephole_optimize(&self, exe: &mut Executable) -> bool {
        let mut changed = false;
        let instructions = decode(exe);
        let targets = jump_targets(exe, &instructions);
        let mut i = 0;

        while i < instructions.len() {
            let current = instructions[i];
            let next = instructions.get(i + 1).copied();
            let next_is_target = next.is_some_and(|n| targets.contains(&n.offset));

            match (current.opcode, next.map(|n| n.opcode)) {
                // Dup Pop, Constant Pop → nothing
                (Opcode::Dup | Opcode::Constant, Some(Opcode::Pop)) if !next_is_target => {
                    let end = next.map_or(current.offset, |n| n.offset + 1);
                    nop_out(exe, current.offset, end);
                    changed = true;
                    i += 2;
                    continue;
                }
                // Constant(number) Neg Neg → Constant(number)
                (Opcode::Constant, Some(Opcode::Neg)) => {
                    let is_number = exe
                        .read_u16(current.offset + 1)
                        .and_then(|idx| exe.get_constant(idx))
                        .is_some_and(|v| matches!(v, Value::Number(_)));
                    if let (Some(next), Some(third)) = (next, instructions.get(i + 2)) {
                        if is_number
                            && third.opcode == Opcode::Neg
                            && !next_is_target
                            && !targets.contains(&third.offset)
                        {
                            nop_out(exe, next.offset, third.offset + 1);
                            changed = true;
                            i += 3;
                            continue;
                        }
                    }
                }
                // Jump to next instruction → remove jump
                (Opcode::Jump, _) => {
                    if exe.read_i16(current.offset + 1) == Some(0) {
                        nop_out(exe, current.offset, current.offset + 3);
                        changed = true;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        changed
    }

    /// Dead code elimination: code after a terminator up to the next jump target
    fn dead_code_elimination(&self, exe: &mut Executable) -> bool {
        let mut changed = false;
        let instructions = decode(exe);
        let targets = jump_targets(exe, &instructions);
        let mut dead = false;

        for instruction in &instructions {
            if targets.contains(&instruction.offset) {
                dead = false;
            }
            if dead {
                if instruction.opcode != Opcode::Nop {
                    let end = instruction.offset + instruction.opcode.instruction_size();
                    nop_out(exe, instruction.offset, end);
                    changed = true;
                }
                continue;
            }
            if instruction.opcode.is_terminator() {
                dead = true;
            }
        }

        changed
    }

    /// Jump threading: a jump to an unconditional jump goes straight to its target
    fn jump_threading(&self, exe: &mut Executable) -> bool {
        let mut changed = false;
        let instructions = decode(exe);

        for instruction in instructions.iter().filter(|i| i.opcode.is_jump()) {
            let Some(target) = jump_target(exe, instruction.offset) else {
                continue;
            };
            if exe.code.get(target) != Some(&(Opcode::Jump as u8)) || target == instruction.offset {
                continue;
            }
            let Some(final_target) = jump_target(exe, target) else {
                continue;
            };
            if final_target == target {
                continue;
            }
            let new_offset = final_target as isize - (instruction.offset as isize + 3);
            if let Ok(new_offset) = i16::try_from(new_offset) {
                if exe.read_i16(instruction.offset + 1) != Some(new_offset) {
                    let bytes = new_offset.to_le_bytes();
                    exe.code[instruction.offset + 1] = bytes[0];
                    exe.code[instruction.offset + 2] = bytes[1];
                    changed = true;
                }
            }
        }

        changed
    }
}

/// Decode instruction boundaries
fn decode(exe: &Executable) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut offset = 0;
    while offset < exe.code.len() {
        match Opcode::from_u8(exe.code[offset]) {
            Some(opcode) => {
                instructions.push(Instruction { offset, opcode });
                offset += opcode.instruction_size();
            }
            None => offset += 1,
        }
    }
    instructions
}

fn jump_target(exe: &Executable, offset: usize) -> Option<usize> {
    let relative = exe.read_i16(offset + 1)?;
    usize::try_from(offset as isize + 3 + relative as isize).ok()
}

fn jump_targets(exe: &Executable, instructions: &[Instruction]) -> FxHashSet<usize> {
    instructions
        .iter()
        .filter(|i| i.opcode.is_jump())
        .filter_map(|i| jump_target(exe, i.offset))
        .collect()
}

fn nop_out(exe: &mut Executable, start: usize, end: usize) {
    for byte in &mut exe.code[start..end] {
        *byte = Opcode::Nop as u8;
    }
}
