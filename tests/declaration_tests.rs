//! Integration tests for declaration instantiation and scoping

mod common;
use common::{run, run_both, run_with};
use invoke_js::ast::builder::*;
use invoke_js::ast::{FunctionKind, Pattern, Statement, VariableDeclaration, VariableDeclarator, VariableKind};
use invoke_js::{ErrorKind, ExecutionStrategy, Value};

fn destructure(kind: VariableKind, id: Pattern, init: invoke_js::ast::Expression) -> Statement {
    Statement::VariableDeclaration(VariableDeclaration {
        kind,
        declarations: vec![VariableDeclarator { id, init: Some(init) }],
    })
}

mod hoisting {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_function_declarations_are_callable_before_their_position() {
        let result = run_both(vec![
            function_declaration(
                "f",
                &[],
                vec![ret(call(ident("g"), vec![])), function_declaration("g", &[], vec![ret(num(3.0))])],
            ),
            expr(call(ident("f"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(3));
    }

    #[test]
    fn test_var_is_undefined_before_assignment() {
        let result = run_both(vec![
            function_declaration(
                "f",
                &[],
                vec![var("before", Some(typeof_(ident("x")))), var("x", Some(num(1.0))), ret(ident("before"))],
            ),
            expr(call(ident("f"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from("undefined"));
    }

    #[test]
    fn test_let_before_declaration_is_reference_error() {
        let err = run_both(vec![
            function_declaration("f", &[], vec![expr(ident("x")), let_("x", Some(num(1.0)))]),
            expr(call(ident("f"), vec![])),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ReferenceError));
    }

    #[test]
    fn test_bare_var_keeps_parameter_value() {
        let result = run_both(vec![
            function_declaration("f", &["a"], vec![var("a", None), ret(ident("a"))]),
            expr(call(ident("f"), vec![num(5.0)])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(5));
    }

    #[test]
    fn test_later_function_declaration_wins() {
        let result = run_both(vec![
            function_declaration("f", &[], vec![ret(num(1.0))]),
            function_declaration("f", &[], vec![ret(num(2.0))]),
            expr(call(ident("f"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(2));
    }
}

mod scoping {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_block_let_shadows_outer() {
        let result = run_both(vec![
            function_declaration(
                "f",
                &[],
                vec![
                    let_("x", Some(num(1.0))),
                    block(vec![let_("x", Some(num(2.0))), expr(assign("x", num(3.0)))]),
                    ret(ident("x")),
                ],
            ),
            expr(call(ident("f"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(1));
    }

    #[test]
    fn test_const_assignment_is_type_error() {
        let err = run_both(vec![const_("c", num(1.0)), expr(assign("c", num(2.0)))]).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TypeError));
    }

    #[test]
    fn test_block_function_visible_after_block_in_sloppy_code() {
        let result = run_both(vec![
            function_declaration(
                "f",
                &[],
                vec![
                    block(vec![function_declaration("inner", &[], vec![ret(num(7.0))])]),
                    ret(call(ident("inner"), vec![])),
                ],
            ),
            expr(call(ident("f"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(7));
    }

    #[test]
    fn test_block_function_stays_in_block_in_strict_code() {
        let node = function_with(
            "f",
            vec![],
            vec![
                expr(str_("use strict")),
                block(vec![function_declaration("inner", &[], vec![])]),
                ret(typeof_(ident("inner"))),
            ],
            FunctionKind::Regular,
            false,
        );
        let result = run_both(vec![Statement::FunctionDeclaration(node), expr(call(ident("f"), vec![]))]).unwrap();
        assert_eq!(result, Value::from("undefined"));
    }

    #[test]
    fn test_closure_in_loop_body_sees_its_own_binding() {
        // var fs = []; var i = 0; while (i < 3) { let j = i; fs[i] = () => j; i = i + 1; } fs[1]()
        let result = run_both(vec![
            var("fs", Some(array(vec![]))),
            var("i", Some(num(0.0))),
            while_(
                lt(ident("i"), num(3.0)),
                block(vec![
                    let_("j", Some(ident("i"))),
                    expr(assign_index(ident("fs"), ident("i"), arrow(&[], expr_body(ident("j"))))),
                    expr(assign("i", add_(ident("i"), num(1.0)))),
                ]),
            ),
            expr(call(index(ident("fs"), num(1.0)), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(1));
    }
}

mod parameters {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_parameter_under_tree_walk() {
        let node = function_with(
            "f",
            vec![param("a"), param_default("b", add_(ident("a"), num(1.0)))],
            vec![ret(ident("b"))],
            FunctionKind::Regular,
            false,
        );
        let result = run(vec![Statement::FunctionDeclaration(node), expr(call(ident("f"), vec![num(1.0)]))]).unwrap();
        assert_eq!(result, Value::from(2));
    }

    #[test]
    fn test_default_parameter_skipped_under_bytecode() {
        let node = function_with(
            "f",
            vec![param_default("b", num(1.0))],
            vec![ret(typeof_(ident("b")))],
            FunctionKind::Regular,
            false,
        );
        let result = run_with(
            ExecutionStrategy::Bytecode,
            vec![Statement::FunctionDeclaration(node), expr(call(ident("f"), vec![]))],
        )
        .unwrap();
        assert_eq!(result, Value::from("undefined"));
    }

    #[test]
    fn test_rest_parameter() {
        let node = function_with(
            "f",
            vec![param("a"), rest_param("rest")],
            vec![ret(member(ident("rest"), "length"))],
            FunctionKind::Regular,
            false,
        );
        let result = run_both(vec![
            Statement::FunctionDeclaration(node),
            expr(call(ident("f"), vec![num(1.0), num(2.0), num(3.0)])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(2));
    }

    #[test]
    fn test_destructuring_parameters() {
        let node = function_with(
            "f",
            vec![pattern_param(object_pattern(&["x", "y"])), pattern_param(array_pattern(&["z"]))],
            vec![ret(add_(add_(ident("x"), ident("y")), ident("z")))],
            FunctionKind::Regular,
            false,
        );
        let result = run_both(vec![
            Statement::FunctionDeclaration(node),
            expr(call(
                ident("f"),
                vec![object(vec![("x", num(1.0)), ("y", num(2.0))]), array(vec![num(3.0)])],
            )),
        ])
        .unwrap();
        assert_eq!(result, Value::from(6));
    }

    #[test]
    fn test_function_length_stops_at_first_default() {
        let node = function_with(
            "f",
            vec![param("a"), param_default("b", num(1.0)), param("c")],
            vec![],
            FunctionKind::Regular,
            false,
        );
        let result = run_both(vec![Statement::FunctionDeclaration(node), expr(member(ident("f"), "length"))]).unwrap();
        assert_eq!(result, Value::from(1));
    }
}

mod destructuring {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_array_and_object_declarations() {
        let result = run_both(vec![
            destructure(VariableKind::Let, array_pattern(&["a", "b"]), array(vec![num(1.0), num(2.0)])),
            destructure(VariableKind::Var, object_pattern(&["c"]), object(vec![("c", num(3.0))])),
            expr(add_(add_(ident("a"), ident("b")), ident("c"))),
        ])
        .unwrap();
        assert_eq!(result, Value::from(6));
    }

    #[test]
    fn test_object_pattern_on_null_is_type_error() {
        let err = run_both(vec![destructure(VariableKind::Let, object_pattern(&["a"]), null())]).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TypeError));
    }
}
