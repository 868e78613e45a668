//! Static scope analysis
//!
//! Computes, once per function node, the declaration facts that function
//! declaration instantiation needs: which names are lexically scoped, which
//! are var scoped, which function declarations get hoisted, and whether the
//! body can observe an `arguments` object or a direct `eval`.

use super::*;
use rustc_hash::FxHashSet;

/// A let/const/class binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalDeclaration {
    /// Bound name
    pub name: String,
    /// `const` declarations create immutable bindings
    pub is_constant: bool,
}

/// Declarations scoped to one statement list
#[derive(Debug, Clone, Default)]
pub struct BlockScope {
    /// let/const/class declarations
    pub lexical_declarations: Vec<LexicalDeclaration>,
    /// Function declarations instantiated on block entry
    pub functions: Vec<Rc<FunctionNode>>,
}

impl BlockScope {
    /// Collect the block-scoped declarations of a block's statement list
    pub fn collect(statements: &[Statement]) -> Self {
        let mut scope = BlockScope {
            lexical_declarations: lexically_scoped_declarations(statements),
            functions: Vec::new(),
        };
        for stmt in statements {
            if let Statement::FunctionDeclaration(function) = stmt {
                scope.functions.push(function.clone());
            }
        }
        scope
    }

    /// No bindings at all, so entering the block needs no environment
    pub fn is_empty(&self) -> bool {
        self.lexical_declarations.is_empty() && self.functions.is_empty()
    }
}

/// Scope facts about a function body
#[derive(Debug, Clone, Default)]
pub struct ScopeInfo {
    /// Top-level let/const/class declarations
    pub lexical_declarations: Vec<LexicalDeclaration>,
    /// VarDeclaredNames, deduplicated, in source order (includes top-level function names)
    pub var_names: Vec<String>,
    /// Top-level function declarations in source order
    pub function_declarations: Vec<Rc<FunctionNode>>,
    /// Names of block-level function declarations eligible for var hoisting in sloppy mode
    pub annex_b_candidates: Vec<String>,
    /// Any top-level lexical declaration exists
    pub has_lexical_declarations: bool,
    /// The parameters or body reference `arguments`
    pub might_need_arguments_object: bool,
    /// The parameters or body call `eval(...)` directly
    pub contains_direct_eval: bool,
}

impl ScopeInfo {
    /// Analyze a function's parameters and body
    pub fn analyze(parameters: &[FormalParameter], body: &FunctionBody) -> Self {
        let statements: &[Statement] = match body {
            FunctionBody::Block(statements) => statements,
            FunctionBody::Expression(_) => &[],
        };

        let lexical_declarations = lexically_scoped_declarations(statements);

        let mut function_declarations = Vec::new();
        let mut var_names = Vec::new();
        let mut seen = FxHashSet::default();
        for stmt in statements {
            if let Statement::FunctionDeclaration(function) = stmt {
                function_declarations.push(function.clone());
                if seen.insert(function.name.clone()) {
                    var_names.push(function.name.clone());
                }
            } else {
                collect_var_names(stmt, &mut var_names, &mut seen);
            }
        }

        let top_level_lexical: FxHashSet<&str> =
            lexical_declarations.iter().map(|d| d.name.as_str()).collect();
        let mut annex_b_candidates = Vec::new();
        for stmt in statements {
            collect_annex_b_candidates(stmt, &top_level_lexical, &mut annex_b_candidates);
        }

        let mut might_need_arguments_object = false;
        let mut contains_direct_eval = false;
        {
            let mut arguments_visitor = |expr: &Expression| match expr {
                Expression::Identifier(name) if name == "arguments" => {
                    might_need_arguments_object = true
                }
                Expression::Assignment(assign) => {
                    if matches!(&assign.target, AssignmentTarget::Identifier(n) if n == "arguments")
                    {
                        might_need_arguments_object = true;
                    }
                }
                _ => {}
            };
            visit_function_parts(parameters, body, true, &mut arguments_visitor);
        }
        {
            let mut eval_visitor = |expr: &Expression| {
                if let Expression::Call(call) = expr {
                    if matches!(&call.callee, Expression::Identifier(n) if n == "eval") {
                        contains_direct_eval = true;
                    }
                }
            };
            visit_function_parts(parameters, body, false, &mut eval_visitor);
        }

        Self {
            has_lexical_declarations: !lexical_declarations.is_empty(),
            lexical_declarations,
            var_names,
            function_declarations,
            annex_b_candidates,
            might_need_arguments_object,
            contains_direct_eval,
        }
    }
}

fn lexically_scoped_declarations(statements: &[Statement]) -> Vec<LexicalDeclaration> {
    let mut declarations = Vec::new();
    for stmt in statements {
        match stmt {
            Statement::VariableDeclaration(decl) if decl.kind != VariableKind::Var => {
                let is_constant = decl.kind == VariableKind::Const;
                for declarator in &decl.declarations {
                    for name in declarator.id.bound_names() {
                        declarations.push(LexicalDeclaration {
                            name: name.to_string(),
                            is_constant,
                        });
                    }
                }
            }
            Statement::ClassDeclaration(class) => {
                if let Some(name) = &class.name {
                    declarations.push(LexicalDeclaration {
                        name: name.clone(),
                        is_constant: false,
                    });
                }
            }
            _ => {}
        }
    }
    declarations
}

/// Collect var names from a statement; does not descend into nested functions
fn collect_var_names(stmt: &Statement, names: &mut Vec<String>, seen: &mut FxHashSet<String>) {
    match stmt {
        Statement::VariableDeclaration(decl) if decl.kind == VariableKind::Var => {
            for declarator in &decl.declarations {
                for name in declarator.id.bound_names() {
                    if seen.insert(name.to_string()) {
                        names.push(name.to_string());
                    }
                }
            }
        }
        Statement::Block(block) => {
            for s in &block.body {
                collect_var_names(s, names, seen);
            }
        }
        Statement::If(if_stmt) => {
            collect_var_names(&if_stmt.consequent, names, seen);
            if let Some(alt) = &if_stmt.alternate {
                collect_var_names(alt, names, seen);
            }
        }
        Statement::While(while_stmt) => collect_var_names(&while_stmt.body, names, seen),
        _ => {}
    }
}

fn collect_annex_b_candidates(
    stmt: &Statement,
    enclosing_lexical: &FxHashSet<&str>,
    candidates: &mut Vec<String>,
) {
    match stmt {
        Statement::Block(block) => {
            let mut visible: FxHashSet<&str> = enclosing_lexical.clone();
            visible.extend(block.scope.lexical_declarations.iter().map(|d| d.name.as_str()));
            for s in &block.body {
                if let Statement::FunctionDeclaration(function) = s {
                    if !visible.contains(function.name.as_str())
                        && !candidates.contains(&function.name)
                    {
                        candidates.push(function.name.clone());
                    }
                } else {
                    collect_annex_b_candidates(s, &visible, candidates);
                }
            }
        }
        Statement::If(if_stmt) => {
            collect_annex_b_candidates(&if_stmt.consequent, enclosing_lexical, candidates);
            if let Some(alt) = &if_stmt.alternate {
                collect_annex_b_candidates(alt, enclosing_lexical, candidates);
            }
        }
        Statement::While(while_stmt) => {
            collect_annex_b_candidates(&while_stmt.body, enclosing_lexical, candidates)
        }
        _ => {}
    }
}

fn visit_function_parts(
    parameters: &[FormalParameter],
    body: &FunctionBody,
    enter_arrows: bool,
    f: &mut dyn FnMut(&Expression),
) {
    for parameter in parameters {
        if let Some(default) = &parameter.default_value {
            visit_expression(default, enter_arrows, f);
        }
        if let ParameterBinding::Pattern(pattern) = &parameter.binding {
            visit_pattern(pattern, enter_arrows, f);
        }
    }
    match body {
        FunctionBody::Block(statements) => {
            for stmt in statements {
                visit_statement(stmt, enter_arrows, f);
            }
        }
        FunctionBody::Expression(expr) => visit_expression(expr, enter_arrows, f),
    }
}

fn visit_pattern(pattern: &Pattern, enter_arrows: bool, f: &mut dyn FnMut(&Expression)) {
    match pattern {
        Pattern::Identifier(_) => {}
        Pattern::Array(arr) => {
            for elem in arr.elements.iter().flatten() {
                visit_pattern(elem, enter_arrows, f);
            }
            if let Some(rest) = &arr.rest {
                visit_pattern(rest, enter_arrows, f);
            }
        }
        Pattern::Object(obj) => {
            for prop in &obj.properties {
                if let PropertyName::Computed(key) = &prop.key {
                    visit_expression(key, enter_arrows, f);
                }
                visit_pattern(&prop.value, enter_arrows, f);
            }
            if let Some(rest) = &obj.rest {
                visit_pattern(rest, enter_arrows, f);
            }
        }
        Pattern::Assignment(a) => {
            visit_pattern(&a.left, enter_arrows, f);
            visit_expression(&a.right, enter_arrows, f);
        }
    }
}

fn visit_class(class: &ClassNode, enter_arrows: bool, f: &mut dyn FnMut(&Expression)) {
    if let Some(super_class) = &class.super_class {
        visit_expression(super_class, enter_arrows, f);
    }
    for field in &class.fields {
        if let PropertyName::Computed(key) = &field.key {
            visit_expression(key, enter_arrows, f);
        }
    }
}

fn visit_statement(stmt: &Statement, enter_arrows: bool, f: &mut dyn FnMut(&Expression)) {
    match stmt {
        Statement::Empty
        | Statement::Break
        | Statement::Continue
        | Statement::FunctionDeclaration(_) => {}
        Statement::Expression(expr) | Statement::Throw(expr) => {
            visit_expression(expr, enter_arrows, f)
        }
        Statement::Return(expr) => {
            if let Some(expr) = expr {
                visit_expression(expr, enter_arrows, f);
            }
        }
        Statement::VariableDeclaration(decl) => {
            for declarator in &decl.declarations {
                visit_pattern(&declarator.id, enter_arrows, f);
                if let Some(init) = &declarator.init {
                    visit_expression(init, enter_arrows, f);
                }
            }
        }
        Statement::ClassDeclaration(class) => visit_class(class, enter_arrows, f),
        Statement::Block(block) => {
            for s in &block.body {
                visit_statement(s, enter_arrows, f);
            }
        }
        Statement::If(if_stmt) => {
            visit_expression(&if_stmt.test, enter_arrows, f);
            visit_statement(&if_stmt.consequent, enter_arrows, f);
            if let Some(alt) = &if_stmt.alternate {
                visit_statement(alt, enter_arrows, f);
            }
        }
        Statement::While(while_stmt) => {
            visit_expression(&while_stmt.test, enter_arrows, f);
            visit_statement(&while_stmt.body, enter_arrows, f);
        }
    }
}

fn visit_arguments(arguments: &[Argument], enter_arrows: bool, f: &mut dyn FnMut(&Expression)) {
    for argument in arguments {
        visit_expression(argument.expression(), enter_arrows, f);
    }
}

fn visit_expression(expr: &Expression, enter_arrows: bool, f: &mut dyn FnMut(&Expression)) {
    f(expr);
    match expr {
        Expression::Literal(_) | Expression::Identifier(_) | Expression::This => {}
        Expression::Array(elements) => {
            for e in elements {
                visit_expression(e, enter_arrows, f);
            }
        }
        Expression::Object(properties) => {
            for prop in properties {
                if let PropertyName::Computed(key) = &prop.key {
                    visit_expression(key, enter_arrows, f);
                }
                visit_expression(&prop.value, enter_arrows, f);
            }
        }
        Expression::Function(function) => {
            if function.is_arrow && enter_arrows {
                visit_function_parts(&function.parameters, &function.body, enter_arrows, f);
            }
        }
        Expression::Class(class) => visit_class(class, enter_arrows, f),
        Expression::Unary(_, operand) | Expression::Await(operand) => {
            visit_expression(operand, enter_arrows, f)
        }
        Expression::Binary(_, left, right) => {
            visit_expression(left, enter_arrows, f);
            visit_expression(right, enter_arrows, f);
        }
        Expression::Assignment(assign) => {
            if let AssignmentTarget::Member(member) = &assign.target {
                visit_member(member, enter_arrows, f);
            }
            visit_expression(&assign.value, enter_arrows, f);
        }
        Expression::Member(member) => visit_member(member, enter_arrows, f),
        Expression::Call(call) | Expression::New(call) => {
            visit_expression(&call.callee, enter_arrows, f);
            visit_arguments(&call.arguments, enter_arrows, f);
        }
        Expression::SuperCall(arguments) => visit_arguments(arguments, enter_arrows, f),
        Expression::Yield(argument) => {
            if let Some(argument) = argument {
                visit_expression(argument, enter_arrows, f);
            }
        }
    }
}

fn visit_member(member: &MemberExpression, enter_arrows: bool, f: &mut dyn FnMut(&Expression)) {
    visit_expression(&member.object, enter_arrows, f);
    if let MemberProperty::Computed(key) = &member.property {
        visit_expression(key, enter_arrows, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::*;

    #[test]
    fn test_var_names_include_functions_and_nested_vars() {
        let node = function(
            "f",
            &["a"],
            vec![
                var("x", Some(num(1.0))),
                function_declaration("g", &[], vec![var("inner", None)]),
                block(vec![var("y", None), var("x", None)]),
            ],
        );
        assert_eq!(node.scope.var_names, vec!["x", "g", "y"]);
        assert_eq!(node.scope.function_declarations.len(), 1);
        assert!(!node.scope.has_lexical_declarations);
    }

    #[test]
    fn test_lexical_declarations() {
        let node = function(
            "f",
            &[],
            vec![let_("a", None), const_("b", num(1.0)), class_declaration(class("C", None))],
        );
        let names: Vec<_> = node
            .scope
            .lexical_declarations
            .iter()
            .map(|d| (d.name.as_str(), d.is_constant))
            .collect();
        assert_eq!(names, vec![("a", false), ("b", true), ("C", false)]);
        assert!(node.scope.has_lexical_declarations);
    }

    #[test]
    fn test_arguments_detection_through_arrows_only() {
        let through_arrow = function(
            "f",
            &[],
            vec![ret(call(arrow(&[], expr_body(ident("arguments"))), vec![]))],
        );
        assert!(through_arrow.scope.might_need_arguments_object);

        let nested_function = function(
            "f",
            &[],
            vec![function_declaration("g", &[], vec![ret(ident("arguments"))])],
        );
        assert!(!nested_function.scope.might_need_arguments_object);
    }

    #[test]
    fn test_direct_eval_detection() {
        let node = function("f", &[], vec![expr(call(ident("eval"), vec![str_("1")]))]);
        assert!(node.scope.contains_direct_eval);
        let node = function("f", &[], vec![expr(call(ident("evaluate"), vec![]))]);
        assert!(!node.scope.contains_direct_eval);
    }

    #[test]
    fn test_annex_b_candidates_skip_lexically_shadowed() {
        let node = function(
            "f",
            &[],
            vec![
                block(vec![function_declaration("hoisted", &[], vec![])]),
                let_("shadowed", None),
                block(vec![function_declaration("shadowed", &[], vec![])]),
            ],
        );
        assert_eq!(node.scope.annex_b_candidates, vec!["hoisted"]);
    }

    #[test]
    fn test_block_scope_collect() {
        let scope = BlockScope::collect(&[
            let_("a", None),
            function_declaration("g", &[], vec![]),
            var("v", None),
        ]);
        assert_eq!(scope.lexical_declarations.len(), 1);
        assert_eq!(scope.functions.len(), 1);
        assert!(!scope.is_empty());
        assert!(BlockScope::collect(&[var("v", None)]).is_empty());
    }

    #[test]
    fn test_block_statement_carries_its_scope() {
        let statement = block(vec![const_("c", num(1.0)), function_declaration("h", &[], vec![])]);
        let Statement::Block(built) = statement else {
            unreachable!()
        };
        assert_eq!(built.scope.lexical_declarations[0].name, "c");
        assert!(built.scope.lexical_declarations[0].is_constant);
        assert_eq!(built.scope.functions[0].name, "h");
    }
}
