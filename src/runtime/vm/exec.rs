//! Bytecode interpreter loop
//!
//! Executables run against the running execution context: identifiers go
//! through the same environment records the tree-walker uses, and calls
//! re-enter the ordinary invocation protocol.

use super::frame::{Frame, FrameSnapshot};
use super::VM;
use crate::ast::BinaryOperator;
use crate::bytecode::{Executable, Opcode};
use crate::error::{Error, Result};
use crate::runtime::class::static_field_keys;
use crate::runtime::environment::ReferenceBase;
use crate::runtime::value::{PropertyKey, Value};

/// How an executable run ended
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// The executable returned (or ran off its end)
    Return(Value),
    /// A generator body suspended at `yield`
    Yield(Value, FrameSnapshot),
}

fn binary_operator(opcode: Opcode) -> Option<BinaryOperator> {
    Some(match opcode {
        Opcode::Add => BinaryOperator::Add,
        Opcode::Sub => BinaryOperator::Sub,
        Opcode::Mul => BinaryOperator::Mul,
        Opcode::Div => BinaryOperator::Div,
        Opcode::StrictEq => BinaryOperator::StrictEq,
        Opcode::StrictNe => BinaryOperator::StrictNe,
        Opcode::Lt => BinaryOperator::Lt,
        Opcode::Le => BinaryOperator::LtEq,
        Opcode::Gt => BinaryOperator::Gt,
        Opcode::Ge => BinaryOperator::GtEq,
        _ => return None,
    })
}

impl VM {
    /// Run an executable from its first instruction
    pub fn run_executable(&mut self, executable: &Executable) -> Result<ExecutionResult> {
        self.resume_executable(executable, FrameSnapshot::default())
    }

    /// Run an executable from a saved frame
    pub fn resume_executable(
        &mut self,
        executable: &Executable,
        snapshot: FrameSnapshot,
    ) -> Result<ExecutionResult> {
        let mut frame = Frame::resume(executable, snapshot);

        while !frame.is_at_end() {
            let byte = frame.read_u8()?;
            let opcode = Opcode::from_u8(byte)
                .ok_or_else(|| Error::InternalError(format!("Unknown opcode: 0x{:02X}", byte)))?;

            match opcode {
                Opcode::Nop => {}
                Opcode::Pop => {
                    frame.pop()?;
                }
                Opcode::Dup => {
                    let value = frame.peek()?.clone();
                    frame.push(value);
                }
                Opcode::Swap => {
                    let a = frame.pop()?;
                    let b = frame.pop()?;
                    frame.push(a);
                    frame.push(b);
                }

                Opcode::Constant => {
                    let index = frame.read_u16()?;
                    let value = executable.get_constant(index).cloned().ok_or_else(|| {
                        Error::InternalError(format!("Invalid constant index {}", index))
                    })?;
                    frame.push(value);
                }
                Opcode::Undefined => frame.push(Value::Undefined),
                Opcode::Null => frame.push(Value::Null),
                Opcode::True => frame.push(Value::Boolean(true)),
                Opcode::False => frame.push(Value::Boolean(false)),

                Opcode::GetBinding => {
                    let name = frame.read_name()?;
                    let reference = self.resolve_reference(&name, None);
                    let value = self.get_reference_value(&reference)?;
                    frame.push(value);
                }
                Opcode::SetBinding => {
                    let name = frame.read_name()?;
                    let value = frame.peek()?.clone();
                    let reference = self.resolve_reference(&name, None);
                    self.put_value(&reference, value)?;
                }
                Opcode::InitializeBinding => {
                    let name = frame.read_name()?;
                    let value = frame.pop()?;
                    let reference = self.resolve_reference(&name, None);
                    self.initialize_referenced_binding(&reference, value)?;
                }
                Opcode::TypeofBinding => {
                    let name = frame.read_name()?;
                    let reference = self.resolve_reference(&name, None);
                    let type_name = match reference.base {
                        ReferenceBase::Unresolvable => "undefined",
                        ReferenceBase::Environment(_) => {
                            let value = self.get_reference_value(&reference)?;
                            self.type_of(&value)
                        }
                    };
                    frame.push(Value::from(type_name));
                }

                Opcode::GetProperty => {
                    let key = PropertyKey::from(frame.read_name()?);
                    let object = frame.pop()?;
                    let value = self.get_value_property(&object, &key)?;
                    frame.push(value);
                }
                Opcode::SetProperty => {
                    let key = PropertyKey::from(frame.read_name()?);
                    let value = frame.pop()?;
                    let object = frame.pop()?;
                    self.put_value_property(&object, key, value.clone())?;
                    frame.push(value);
                }
                Opcode::DefineField => {
                    let key = PropertyKey::from(frame.read_name()?);
                    let value = frame.pop()?;
                    let object = self.expect_object(frame.peek()?)?;
                    self.create_data_property_or_throw(object, key, value)?;
                }
                Opcode::GetElement => {
                    let key = frame.pop()?;
                    let object = frame.pop()?;
                    let key = self.to_property_key(&key)?;
                    let value = self.get_value_property(&object, &key)?;
                    frame.push(value);
                }
                Opcode::SetElement => {
                    let value = frame.pop()?;
                    let key = frame.pop()?;
                    let object = frame.pop()?;
                    let key = self.to_property_key(&key)?;
                    self.put_value_property(&object, key, value.clone())?;
                    frame.push(value);
                }
                Opcode::DefineElement => {
                    let value = frame.pop()?;
                    let key = frame.pop()?;
                    let key = self.to_property_key(&key)?;
                    let object = self.expect_object(frame.peek()?)?;
                    self.create_data_property_or_throw(object, key, value)?;
                }

                Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::StrictEq
                | Opcode::StrictNe
                | Opcode::Lt
                | Opcode::Le
                | Opcode::Gt
                | Opcode::Ge => {
                    let right = frame.pop()?;
                    let left = frame.pop()?;
                    let operator = binary_operator(opcode).ok_or_else(|| {
                        Error::InternalError(format!("{:?} is not a binary operator", opcode))
                    })?;
                    let result = self.apply_binary_operator(operator, &left, &right)?;
                    frame.push(result);
                }
                Opcode::Neg => {
                    let value = frame.pop()?;
                    let number = self.to_number_value(&value)?;
                    frame.push(Value::Number(-number));
                }
                Opcode::Not => {
                    let value = frame.pop()?;
                    frame.push(Value::Boolean(!value.to_boolean()));
                }
                Opcode::Typeof => {
                    let value = frame.pop()?;
                    frame.push(Value::from(self.type_of(&value)));
                }
                Opcode::Void => {
                    frame.pop()?;
                    frame.push(Value::Undefined);
                }

                Opcode::Jump => {
                    let offset = frame.read_i16()?;
                    frame.jump(offset)?;
                }
                Opcode::JumpIfFalse => {
                    let offset = frame.read_i16()?;
                    if !frame.peek()?.to_boolean() {
                        frame.jump(offset)?;
                    }
                }

                Opcode::Call => {
                    let arguments = frame.pop()?;
                    let this_value = frame.pop()?;
                    let callee = frame.pop()?;
                    let arguments = self.array_elements(&arguments)?;
                    let result = self.call(&callee, this_value, arguments)?;
                    frame.push(result);
                }
                Opcode::Return => {
                    let value = frame.pop()?;
                    return Ok(ExecutionResult::Return(value));
                }
                Opcode::New => {
                    let arguments = frame.pop()?;
                    let constructor = frame.pop()?;
                    let arguments = self.array_elements(&arguments)?;
                    let result = self.construct(&constructor, arguments, None)?;
                    frame.push(result);
                }
                Opcode::NewClosure => {
                    let index = frame.read_u16()?;
                    let template = executable.functions.get(index as usize).ok_or_else(|| {
                        Error::InternalError(format!("Invalid function index {}", index))
                    })?;
                    let closure =
                        self.instantiate_function_expression(&template.node, template.name.as_deref());
                    frame.push(closure);
                }
                Opcode::NewClass => {
                    let index = frame.read_u16()?;
                    let template = executable.classes.get(index as usize).ok_or_else(|| {
                        Error::InternalError(format!("Invalid class index {}", index))
                    })?;
                    let super_class = match template.node.super_class {
                        Some(_) => Some(frame.pop()?),
                        None => None,
                    };
                    let field_keys = static_field_keys(&template.node)?;
                    let constructor = self.class_definition_evaluation(
                        &template.node,
                        template.binding_name.as_deref(),
                        super_class,
                        field_keys,
                    )?;
                    frame.push(Value::Object(constructor));
                }
                Opcode::SuperCall => {
                    let arguments = frame.pop()?;
                    let arguments = self.array_elements(&arguments)?;
                    let this_value = self.super_call(arguments)?;
                    frame.push(this_value);
                }

                Opcode::NewArray => {
                    let array = self.create_array(Vec::new());
                    frame.push(Value::Object(array));
                }
                Opcode::AppendElement => {
                    let value = frame.pop()?;
                    let array = frame.peek()?.clone();
                    self.array_push(&array, value)?;
                }
                Opcode::AppendSpread => {
                    let iterable = frame.pop()?;
                    let array = frame.peek()?.clone();
                    for value in self.iterate_to_list(&iterable)? {
                        self.array_push(&array, value)?;
                    }
                }
                Opcode::NewObject => {
                    let object = self.ordinary_object();
                    frame.push(Value::Object(object));
                }
                Opcode::This => {
                    let this_value = self.resolve_this_binding()?;
                    frame.push(this_value);
                }

                Opcode::PushScope => {
                    let index = frame.read_u16()?;
                    let scope = executable.scopes.get(index as usize).ok_or_else(|| {
                        Error::InternalError(format!("Invalid scope index {}", index))
                    })?;
                    self.enter_block_scope(scope)?;
                }
                Opcode::PopScope => self.leave_block_scope()?,
                Opcode::AnnexBCopy => {
                    let name = frame.read_name()?;
                    self.annex_b_copy(&name)?;
                }
                Opcode::SetCompletion => {
                    frame.completion = frame.pop()?;
                }
                Opcode::GetCompletion => {
                    let completion = frame.completion.clone();
                    frame.push(completion);
                }

                Opcode::IterableToArray => {
                    let iterable = frame.pop()?;
                    let values = self.iterate_to_list(&iterable)?;
                    let array = self.create_array(values);
                    frame.push(Value::Object(array));
                }
                Opcode::ArraySlice => {
                    let start = frame.read_u16()? as usize;
                    let array = frame.pop()?;
                    let values = self.array_elements(&array)?;
                    let rest = self.create_array(values.into_iter().skip(start).collect());
                    frame.push(Value::Object(rest));
                }
                Opcode::RequireObjectCoercible => {
                    self.require_object_coercible(frame.peek()?)?;
                }

                Opcode::Throw => {
                    let value = frame.pop()?;
                    return Err(Error::Thrown(value));
                }

                Opcode::Yield => {
                    let value = frame.pop()?;
                    return Ok(ExecutionResult::Yield(value, frame.snapshot()));
                }
            }
        }

        Ok(ExecutionResult::Return(Value::Undefined))
    }
}
