//! Bytecode compiler
//!
//! This module compiles function bodies and scripts into [`Executable`]s.
//! Declarations are instantiated before the body runs, so the compiler only
//! emits code for the statements themselves: bindings are resolved by name
//! at run time through the environment chain.

use super::{ClassTemplate, Executable, FunctionTemplate, Opcode};
use crate::ast::*;
use crate::error::{Error, Result};
use crate::runtime::class::static_field_keys;
use crate::runtime::Value;
use std::rc::Rc;

/// Loop information for break/continue
#[derive(Debug, Clone)]
struct LoopInfo {
    start: usize,
    break_jumps: Vec<usize>,
    /// Block scopes open when the loop was entered
    depth: u32,
}

/// How a pattern stores the values it destructures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingMode {
    /// `let`/`const`/class bindings: InitializeBinding
    Initialize,
    /// `var` declarations: an ordinary assignment
    Assign,
}

/// Compiler state
pub struct Compiler {
    /// Executable being built
    executable: Executable,
    /// Loop stack
    loop_stack: Vec<LoopInfo>,
    /// Block scopes currently pushed
    scope_depth: u32,
    /// Expression statements record the completion value
    is_script: bool,
}

impl Compiler {
    fn new(name: &str, is_generator: bool) -> Self {
        let mut executable = Executable::new(name);
        executable.is_generator = is_generator;
        Self {
            executable,
            loop_stack: Vec::new(),
            scope_depth: 0,
            is_script: false,
        }
    }

    /// Compile a function body
    ///
    /// A concise body returns its expression. A block body returns
    /// `undefined` when control runs off its end.
    pub fn generate(node: &FunctionNode, is_generator: bool) -> Result<Executable> {
        let mut compiler = Self::new(&node.name, is_generator);
        match &node.body {
            FunctionBody::Expression(expression) => {
                compiler.compile_expr(expression)?;
            }
            FunctionBody::Block(statements) => {
                compiler.compile_statements(statements)?;
                compiler.emit(Opcode::Undefined);
            }
        }
        compiler.emit(Opcode::Return);
        Ok(compiler.executable)
    }

    /// Compile a script; the executable returns the completion value
    pub fn generate_script(script: &Script) -> Result<Executable> {
        let mut compiler = Self::new("<script>", false);
        compiler.is_script = true;
        compiler.compile_statements(&script.statements)?;
        compiler.emit(Opcode::GetCompletion);
        compiler.emit(Opcode::Return);
        Ok(compiler.executable)
    }

    // ========== Helpers ==========

    fn emit(&mut self, opcode: Opcode) {
        self.executable.write_opcode(opcode);
    }

    fn emit_u16(&mut self, value: u16) {
        self.executable.write_u16(value);
    }

    fn emit_with_name(&mut self, opcode: Opcode, name: &str) {
        let index = self.executable.add_name(name);
        self.emit(opcode);
        self.emit_u16(index);
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.executable.add_constant(value);
        self.emit(Opcode::Constant);
        self.emit_u16(index);
    }

    fn emit_jump(&mut self, opcode: Opcode) -> usize {
        self.emit(opcode);
        let jump_addr = self.executable.code.len();
        self.emit_u16(0xFFFF); // Placeholder
        jump_addr
    }

    fn patch_jump(&mut self, addr: usize) -> Result<()> {
        let offset = jump_offset(self.executable.code.len() as isize - addr as isize - 2)?;
        let bytes = offset.to_le_bytes();
        self.executable.code[addr] = bytes[0];
        self.executable.code[addr + 1] = bytes[1];
        Ok(())
    }

    fn emit_loop(&mut self, loop_start: usize) -> Result<()> {
        self.emit(Opcode::Jump);
        let offset = jump_offset(loop_start as isize - self.executable.code.len() as isize - 2)?;
        self.emit_u16(offset as u16);
        Ok(())
    }

    fn emit_pop_scopes(&mut self, down_to: u32) {
        for _ in down_to..self.scope_depth {
            self.emit(Opcode::PopScope);
        }
    }

    // ========== Statements ==========

    fn compile_statements(&mut self, statements: &[Statement]) -> Result<()> {
        for statement in statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Empty => {}
            Statement::Expression(expression) => {
                self.compile_expr(expression)?;
                if self.is_script {
                    self.emit(Opcode::SetCompletion);
                } else {
                    self.emit(Opcode::Pop);
                }
            }
            Statement::VariableDeclaration(declaration) => self.compile_variable_declaration(declaration)?,
            Statement::FunctionDeclaration(function) => {
                // Hoisted; a block-level declaration is copied out to the var scope
                if self.scope_depth > 0 {
                    self.emit_with_name(Opcode::AnnexBCopy, &function.name);
                }
            }
            Statement::ClassDeclaration(class) => {
                self.compile_class(class, None)?;
                match &class.name {
                    Some(name) => self.emit_with_name(Opcode::InitializeBinding, name),
                    None => self.emit(Opcode::Pop),
                }
            }
            Statement::Block(block) => self.compile_block(block)?,
            Statement::If(if_stmt) => self.compile_if(if_stmt)?,
            Statement::While(while_stmt) => self.compile_while(while_stmt)?,
            Statement::Break => {
                let depth = self
                    .loop_stack
                    .last()
                    .map(|info| info.depth)
                    .ok_or_else(|| Error::syntax_error("Illegal break statement"))?;
                self.emit_pop_scopes(depth);
                let jump = self.emit_jump(Opcode::Jump);
                if let Some(info) = self.loop_stack.last_mut() {
                    info.break_jumps.push(jump);
                }
            }
            Statement::Continue => {
                let (start, depth) = self
                    .loop_stack
                    .last()
                    .map(|info| (info.start, info.depth))
                    .ok_or_else(|| Error::syntax_error("Illegal continue statement: no surrounding iteration statement"))?;
                self.emit_pop_scopes(depth);
                self.emit_loop(start)?;
            }
            Statement::Return(argument) => {
                match argument {
                    Some(argument) => self.compile_expr(argument)?,
                    None => self.emit(Opcode::Undefined),
                }
                self.emit(Opcode::Return);
            }
            Statement::Throw(argument) => {
                self.compile_expr(argument)?;
                self.emit(Opcode::Throw);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> Result<()> {
        if block.scope.is_empty() {
            return self.compile_statements(&block.body);
        }
        let index = self.executable.scopes.len() as u16;
        self.executable.scopes.push(block.scope.clone());
        self.emit(Opcode::PushScope);
        self.emit_u16(index);
        self.scope_depth += 1;
        self.compile_statements(&block.body)?;
        self.scope_depth -= 1;
        self.emit(Opcode::PopScope);
        Ok(())
    }

    fn compile_if(&mut self, if_stmt: &IfStatement) -> Result<()> {
        self.compile_expr(&if_stmt.test)?;

        let then_jump = self.emit_jump(Opcode::JumpIfFalse);
        self.emit(Opcode::Pop);

        self.compile_statement(&if_stmt.consequent)?;

        let else_jump = self.emit_jump(Opcode::Jump);
        self.patch_jump(then_jump)?;
        self.emit(Opcode::Pop);
        if let Some(alternate) = &if_stmt.alternate {
            self.compile_statement(alternate)?;
        }
        self.patch_jump(else_jump)
    }

    fn compile_while(&mut self, while_stmt: &WhileStatement) -> Result<()> {
        let loop_start = self.executable.code.len();

        self.loop_stack.push(LoopInfo {
            start: loop_start,
            break_jumps: Vec::new(),
            depth: self.scope_depth,
        });

        self.compile_expr(&while_stmt.test)?;
        let exit_jump = self.emit_jump(Opcode::JumpIfFalse);
        self.emit(Opcode::Pop);

        self.compile_statement(&while_stmt.body)?;

        self.emit_loop(loop_start)?;

        self.patch_jump(exit_jump)?;
        self.emit(Opcode::Pop);

        // Breaks land after the condition has been popped
        if let Some(loop_info) = self.loop_stack.pop() {
            for jump in loop_info.break_jumps {
                self.patch_jump(jump)?;
            }
        }

        Ok(())
    }

    fn compile_variable_declaration(&mut self, declaration: &VariableDeclaration) -> Result<()> {
        let mode = match declaration.kind {
            VariableKind::Var => BindingMode::Assign,
            VariableKind::Let | VariableKind::Const => BindingMode::Initialize,
        };
        for declarator in &declaration.declarations {
            match (&declarator.init, &declarator.id) {
                (Some(init), Pattern::Identifier(name)) => self.compile_named(init, name)?,
                (Some(init), _) => self.compile_expr(init)?,
                // `var x;` leaves the hoisted binding alone
                (None, _) if mode == BindingMode::Assign => continue,
                (None, _) => self.emit(Opcode::Undefined),
            }
            self.compile_pattern(&declarator.id, mode)?;
        }
        Ok(())
    }

    // ========== Patterns ==========

    /// Destructure the value on top of the stack into `pattern`, consuming it
    fn compile_pattern(&mut self, pattern: &Pattern, mode: BindingMode) -> Result<()> {
        match pattern {
            Pattern::Identifier(name) => match mode {
                BindingMode::Initialize => self.emit_with_name(Opcode::InitializeBinding, name),
                BindingMode::Assign => {
                    self.emit_with_name(Opcode::SetBinding, name);
                    self.emit(Opcode::Pop);
                }
            },
            Pattern::Assignment(assignment) => {
                // value === undefined ? default : value
                self.emit(Opcode::Dup);
                self.emit(Opcode::Undefined);
                self.emit(Opcode::StrictEq);
                let keep_jump = self.emit_jump(Opcode::JumpIfFalse);
                self.emit(Opcode::Pop);
                self.emit(Opcode::Pop);
                match &assignment.left {
                    Pattern::Identifier(name) => self.compile_named(&assignment.right, name)?,
                    _ => self.compile_expr(&assignment.right)?,
                }
                let end_jump = self.emit_jump(Opcode::Jump);
                self.patch_jump(keep_jump)?;
                self.emit(Opcode::Pop);
                self.patch_jump(end_jump)?;
                self.compile_pattern(&assignment.left, mode)?;
            }
            Pattern::Array(array) => {
                self.emit(Opcode::IterableToArray);
                for (index, element) in array.elements.iter().enumerate() {
                    let Some(element) = element else { continue };
                    self.emit(Opcode::Dup);
                    self.emit_constant(Value::Number(index as f64));
                    self.emit(Opcode::GetElement);
                    self.compile_pattern(element, mode)?;
                }
                if let Some(rest) = &array.rest {
                    let start = u16::try_from(array.elements.len())
                        .map_err(|_| Error::syntax_error("Too many elements in array pattern"))?;
                    self.emit(Opcode::Dup);
                    self.emit(Opcode::ArraySlice);
                    self.emit_u16(start);
                    self.compile_pattern(rest, mode)?;
                }
                self.emit(Opcode::Pop);
            }
            Pattern::Object(object) => {
                if object.rest.is_some() {
                    return Err(Error::not_implemented("Object rest patterns in compiled code"));
                }
                self.emit(Opcode::RequireObjectCoercible);
                for property in &object.properties {
                    self.emit(Opcode::Dup);
                    match &property.key {
                        PropertyName::Identifier(name) => self.emit_with_name(Opcode::GetProperty, name),
                        PropertyName::Computed(key) => {
                            self.compile_expr(key)?;
                            self.emit(Opcode::GetElement);
                        }
                    }
                    self.compile_pattern(&property.value, mode)?;
                }
                self.emit(Opcode::Pop);
            }
        }
        Ok(())
    }

    // ========== Expressions ==========

    /// NamedEvaluation: anonymous functions and classes take `name`
    fn compile_named(&mut self, expression: &Expression, name: &str) -> Result<()> {
        match expression {
            Expression::Function(node) if node.name.is_empty() => {
                self.compile_closure(node, Some(name));
                Ok(())
            }
            Expression::Class(class) if class.name.is_none() => self.compile_class(class, Some(name)),
            expression => self.compile_expr(expression),
        }
    }

    fn compile_closure(&mut self, node: &Rc<FunctionNode>, name: Option<&str>) {
        let index = self.executable.functions.len() as u16;
        self.executable.functions.push(FunctionTemplate {
            node: node.clone(),
            name: name.map(str::to_string),
        });
        self.emit(Opcode::NewClosure);
        self.emit_u16(index);
    }

    fn compile_class(&mut self, class: &Rc<ClassNode>, binding_name: Option<&str>) -> Result<()> {
        static_field_keys(class)?;
        if let Some(heritage) = &class.super_class {
            self.compile_expr(heritage)?;
        }
        let index = self.executable.classes.len() as u16;
        self.executable.classes.push(ClassTemplate {
            node: class.clone(),
            binding_name: binding_name.map(str::to_string),
        });
        self.emit(Opcode::NewClass);
        self.emit_u16(index);
        Ok(())
    }

    fn compile_expr(&mut self, expression: &Expression) -> Result<()> {
        match expression {
            Expression::Literal(literal) => match literal {
                Literal::Undefined => self.emit(Opcode::Undefined),
                Literal::Null => self.emit(Opcode::Null),
                Literal::Boolean(true) => self.emit(Opcode::True),
                Literal::Boolean(false) => self.emit(Opcode::False),
                Literal::Number(n) => self.emit_constant(Value::Number(*n)),
                Literal::String(s) => self.emit_constant(Value::String(s.clone())),
            },
            Expression::Identifier(name) => self.emit_with_name(Opcode::GetBinding, name),
            Expression::This => self.emit(Opcode::This),
            Expression::Array(elements) => {
                self.emit(Opcode::NewArray);
                for element in elements {
                    self.compile_expr(element)?;
                    self.emit(Opcode::AppendElement);
                }
            }
            Expression::Object(properties) => {
                self.emit(Opcode::NewObject);
                for property in properties {
                    match &property.key {
                        PropertyName::Identifier(name) => {
                            self.compile_named(&property.value, name)?;
                            self.emit_with_name(Opcode::DefineField, name);
                        }
                        PropertyName::Computed(key) => {
                            self.compile_expr(key)?;
                            self.compile_expr(&property.value)?;
                            self.emit(Opcode::DefineElement);
                        }
                    }
                }
            }
            Expression::Function(node) => self.compile_closure(node, None),
            Expression::Class(class) => self.compile_class(class, None)?,
            Expression::Unary(operator, operand) => match (operator, operand.as_ref()) {
                (UnaryOperator::Typeof, Expression::Identifier(name)) => {
                    self.emit_with_name(Opcode::TypeofBinding, name)
                }
                (operator, operand) => {
                    self.compile_expr(operand)?;
                    self.emit(match operator {
                        UnaryOperator::Minus => Opcode::Neg,
                        UnaryOperator::Not => Opcode::Not,
                        UnaryOperator::Typeof => Opcode::Typeof,
                        UnaryOperator::Void => Opcode::Void,
                    });
                }
            },
            Expression::Binary(operator, left, right) => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit(match operator {
                    BinaryOperator::Add => Opcode::Add,
                    BinaryOperator::Sub => Opcode::Sub,
                    BinaryOperator::Mul => Opcode::Mul,
                    BinaryOperator::Div => Opcode::Div,
                    BinaryOperator::Lt => Opcode::Lt,
                    BinaryOperator::Gt => Opcode::Gt,
                    BinaryOperator::LtEq => Opcode::Le,
                    BinaryOperator::GtEq => Opcode::Ge,
                    BinaryOperator::StrictEq => Opcode::StrictEq,
                    BinaryOperator::StrictNe => Opcode::StrictNe,
                });
            }
            Expression::Assignment(assignment) => match &assignment.target {
                AssignmentTarget::Identifier(name) => {
                    self.compile_named(&assignment.value, name)?;
                    self.emit_with_name(Opcode::SetBinding, name);
                }
                AssignmentTarget::Member(member) => {
                    self.compile_expr(&member.object)?;
                    match &member.property {
                        MemberProperty::Named(name) => {
                            self.compile_expr(&assignment.value)?;
                            self.emit_with_name(Opcode::SetProperty, name);
                        }
                        MemberProperty::Computed(key) => {
                            self.compile_expr(key)?;
                            self.compile_expr(&assignment.value)?;
                            self.emit(Opcode::SetElement);
                        }
                    }
                }
            },
            Expression::Member(member) => {
                self.compile_expr(&member.object)?;
                self.compile_member_property(&member.property)?;
            }
            Expression::Call(call) => {
                match &call.callee {
                    Expression::Member(member) => {
                        // [obj] -> [obj, obj] -> [obj, f] -> [f, obj]
                        self.compile_expr(&member.object)?;
                        self.emit(Opcode::Dup);
                        self.compile_member_property(&member.property)?;
                        self.emit(Opcode::Swap);
                    }
                    callee => {
                        self.compile_expr(callee)?;
                        self.emit(Opcode::Undefined);
                    }
                }
                self.compile_arguments(&call.arguments)?;
                self.emit(Opcode::Call);
            }
            Expression::New(call) => {
                self.compile_expr(&call.callee)?;
                self.compile_arguments(&call.arguments)?;
                self.emit(Opcode::New);
            }
            Expression::SuperCall(arguments) => {
                self.compile_arguments(arguments)?;
                self.emit(Opcode::SuperCall);
            }
            Expression::Yield(argument) => {
                if !self.executable.is_generator {
                    return Err(Error::syntax_error("yield is only valid in generator functions"));
                }
                match argument {
                    Some(argument) => self.compile_expr(argument)?,
                    None => self.emit(Opcode::Undefined),
                }
                self.emit(Opcode::Yield);
            }
            Expression::Await(_) => return Err(Error::not_implemented("await in compiled code")),
        }
        Ok(())
    }

    fn compile_member_property(&mut self, property: &MemberProperty) -> Result<()> {
        match property {
            MemberProperty::Named(name) => self.emit_with_name(Opcode::GetProperty, name),
            MemberProperty::Computed(key) => {
                self.compile_expr(key)?;
                self.emit(Opcode::GetElement);
            }
        }
        Ok(())
    }

    /// Build the argument list as an array
    fn compile_arguments(&mut self, arguments: &[Argument]) -> Result<()> {
        self.emit(Opcode::NewArray);
        for argument in arguments {
            match argument {
                Argument::Expression(expression) => {
                    self.compile_expr(expression)?;
                    self.emit(Opcode::AppendElement);
                }
                Argument::Spread(expression) => {
                    self.compile_expr(expression)?;
                    self.emit(Opcode::AppendSpread);
                }
            }
        }
        Ok(())
    }
}

fn jump_offset(distance: isize) -> Result<i16> {
    i16::try_from(distance).map_err(|_| Error::InternalError(format!("Jump distance {} out of range", distance)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::*;

    fn compile(body: Vec<Statement>) -> Result<Executable> {
        Compiler::generate(&function("test", &[], body), false)
    }

    #[test]
    fn test_compile_binary() {
        let exe = compile(vec![ret(add_(num(1.0), num(2.0)))]).unwrap();
        let disasm = exe.disassemble();
        assert!(disasm.contains("Add"));
        assert!(disasm.contains("Return"));
    }

    #[test]
    fn test_compile_lexical_declaration() {
        let exe = compile(vec![let_("x", Some(num(10.0))), ret(ident("x"))]).unwrap();
        let disasm = exe.disassemble();
        assert!(disasm.contains("InitializeBinding"));
        assert!(disasm.contains("GetBinding"));
    }

    #[test]
    fn test_bare_var_emits_nothing() {
        let exe = compile(vec![var("x", None)]).unwrap();
        assert!(!exe.disassemble().contains("Binding"));
    }

    #[test]
    fn test_compile_if() {
        let exe = compile(vec![if_(bool_(true), expr(num(1.0)), Some(expr(num(2.0))))]).unwrap();
        assert!(exe.disassemble().contains("JumpIfFalse"));
    }

    #[test]
    fn test_compile_while() {
        let exe = compile(vec![while_(bool_(true), block(vec![break_()]))]).unwrap();
        assert!(exe.disassemble().contains("Jump"));
    }

    #[test]
    fn test_break_leaves_block_scopes() {
        let exe = compile(vec![while_(
            bool_(true),
            block(vec![let_("x", Some(num(1.0))), break_()]),
        )])
        .unwrap();
        assert_eq!(exe.scopes.len(), 1);
        // One PopScope for the break, one at the end of the block
        assert_eq!(exe.disassemble().matches("PopScope").count(), 2);
    }

    #[test]
    fn test_break_outside_loop_is_syntax_error() {
        let err = compile(vec![break_()]).unwrap_err();
        assert!(matches!(err.kind(), Some(crate::error::ErrorKind::SyntaxError)));
        assert!(compile(vec![continue_()]).is_err());
    }

    #[test]
    fn test_member_call_keeps_receiver() {
        let exe = compile(vec![expr(call(member(ident("o"), "m"), vec![num(1.0)]))]).unwrap();
        let disasm = exe.disassemble();
        assert!(disasm.contains("Dup"));
        assert!(disasm.contains("Swap"));
        assert!(disasm.contains("Call"));
    }

    #[test]
    fn test_named_closure_template() {
        let exe = compile(vec![let_("f", Some(func_expr(function("", &[], vec![]))))]).unwrap();
        assert_eq!(exe.functions.len(), 1);
        assert_eq!(exe.functions[0].name.as_deref(), Some("f"));
    }

    #[test]
    fn test_yield_requires_generator() {
        assert!(compile(vec![expr(yield_(None))]).is_err());
        let exe = Compiler::generate(&generator("g", &[], vec![expr(yield_(Some(num(1.0))))]), true).unwrap();
        assert!(exe.is_generator);
        assert!(exe.disassemble().contains("Yield"));
    }

    #[test]
    fn test_script_records_completion() {
        let exe = Compiler::generate_script(&Script::new(vec![expr(num(1.0))])).unwrap();
        let disasm = exe.disassemble();
        assert!(disasm.contains("SetCompletion"));
        assert!(disasm.contains("GetCompletion"));
    }

    #[test]
    fn test_destructuring_declaration() {
        let exe = compile(vec![Statement::VariableDeclaration(VariableDeclaration {
            kind: VariableKind::Let,
            declarations: vec![VariableDeclarator {
                id: array_pattern(&["a", "b"]),
                init: Some(array(vec![num(1.0), num(2.0)])),
            }],
        })])
        .unwrap();
        let disasm = exe.disassemble();
        assert!(disasm.contains("IterableToArray"));
        assert!(disasm.contains("GetElement"));
    }
}
