//! Integration tests for ordinary calls and constructs

mod common;
use common::{run, run_both, runtime};
use invoke_js::ast::builder::*;
use invoke_js::ast::{Script, Statement};
use invoke_js::{EngineConfig, ErrorKind, ExecutionStrategy, Runtime, Value};

mod calls {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_function_call_with_arguments() {
        let result = run_both(vec![
            function_declaration("add", &["a", "b"], vec![ret(add_(ident("a"), ident("b")))]),
            expr(call(ident("add"), vec![num(2.0), num(3.0)])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(5));
    }

    #[test]
    fn test_missing_arguments_are_undefined() {
        let result = run_both(vec![
            function_declaration("f", &["a", "b"], vec![ret(typeof_(ident("b")))]),
            expr(call(ident("f"), vec![num(1.0)])),
        ])
        .unwrap();
        assert_eq!(result, Value::from("undefined"));
    }

    #[test]
    fn test_sloppy_this_is_the_global_object() {
        let result = run_both(vec![
            function_declaration("f", &[], vec![ret(strict_eq(this(), ident("globalThis")))]),
            expr(call(ident("f"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(true));
    }

    #[test]
    fn test_strict_this_is_undefined() {
        let result = run_both(vec![
            Statement::FunctionDeclaration(strict_function("f", &[], vec![ret(typeof_(this()))])),
            expr(call(ident("f"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from("undefined"));
    }

    #[test]
    fn test_method_call_receiver() {
        let getter = function("", &[], vec![ret(member(this(), "v"))]);
        let result = run_both(vec![
            var("o", Some(object(vec![("v", num(7.0)), ("get", func_expr(getter))]))),
            expr(call(member(ident("o"), "get"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(7));
    }

    #[test]
    fn test_arrow_uses_enclosing_this() {
        let result = run_both(vec![
            function_declaration(
                "outer",
                &[],
                vec![
                    var("a", Some(arrow(&[], expr_body(member(this(), "tag"))))),
                    ret(call(ident("a"), vec![])),
                ],
            ),
            var("o", Some(object(vec![("tag", str_("x")), ("outer", ident("outer"))]))),
            expr(call(member(ident("o"), "outer"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from("x"));
    }

    #[test]
    fn test_closures_share_their_scope() {
        let counter = function(
            "",
            &[],
            vec![expr(assign("n", add_(ident("n"), num(1.0)))), ret(ident("n"))],
        );
        let result = run_both(vec![
            function_declaration("make", &[], vec![var("n", Some(num(0.0))), ret(func_expr(counter))]),
            var("c", Some(call(ident("make"), vec![]))),
            expr(call(ident("c"), vec![])),
            expr(call(ident("c"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(2));
    }

    #[test]
    fn test_recursion() {
        let result = run_both(vec![
            function_declaration(
                "fact",
                &["n"],
                vec![
                    if_(lt(ident("n"), num(2.0)), ret(num(1.0)), None),
                    ret(mul_(ident("n"), call(ident("fact"), vec![sub_(ident("n"), num(1.0))]))),
                ],
            ),
            expr(call(ident("fact"), vec![num(5.0)])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(120));
    }

    #[test]
    fn test_calling_a_non_function_is_type_error() {
        let err = run_both(vec![var("x", Some(num(1.0))), expr(call(ident("x"), vec![]))]).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TypeError));
    }

    #[test]
    fn test_unbounded_recursion_is_range_error() {
        for strategy in [ExecutionStrategy::TreeWalk, ExecutionStrategy::Bytecode] {
            let mut runtime = runtime(strategy);
            assert_eq!(runtime.config().max_call_depth, EngineConfig::default().max_call_depth);
            let script = Script::new(vec![
                function_declaration("f", &[], vec![ret(call(ident("f"), vec![]))]),
                expr(call(ident("f"), vec![])),
            ]);
            let err = runtime.run_script(&script).unwrap_err();
            assert_eq!(err.kind(), Some(ErrorKind::RangeError));
            assert!(err.to_string().contains("Maximum call stack size exceeded"));
            assert_eq!(runtime.vm().contexts.len(), 1);
        }
    }

    #[test]
    fn test_deep_recursion_below_the_limit_completes() {
        let depth = EngineConfig::default().max_call_depth - 8;
        let result = run_both(vec![
            function_declaration(
                "down",
                &["n"],
                vec![
                    if_(lt(ident("n"), num(1.0)), ret(num(0.0)), None),
                    ret(add_(num(1.0), call(ident("down"), vec![sub_(ident("n"), num(1.0))]))),
                ],
            ),
            expr(call(ident("down"), vec![num(depth as f64)])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(depth as f64));
    }

    #[test]
    fn test_recursion_limit_is_configurable() {
        let mut runtime = Runtime::with_config(EngineConfig::default().with_max_call_depth(4));
        let script = Script::new(vec![
            function_declaration("f", &["n"], vec![ret(call(ident("f"), vec![ident("n")]))]),
            expr(call(ident("f"), vec![num(0.0)])),
        ]);
        let err = runtime.run_script(&script).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::RangeError));
        assert_eq!(runtime.vm().contexts.len(), 1);
    }

    #[test]
    fn test_host_calls_script_function() {
        let mut runtime = runtime(ExecutionStrategy::TreeWalk);
        runtime
            .run_script(&Script::new(vec![function_declaration(
                "add",
                &["a", "b"],
                vec![ret(add_(ident("a"), ident("b")))],
            )]))
            .unwrap();
        let add = runtime.get_global("add").unwrap();
        let result = runtime.call(&add, Value::Undefined, vec![Value::from(40), Value::from(2)]);
        assert_eq!(result.unwrap(), Value::from(42));
    }

    #[test]
    fn test_script_calls_host_function() {
        let mut runtime = runtime(ExecutionStrategy::Bytecode);
        runtime
            .register_function("describe", |vm, this, args| {
                let kind = vm.type_of(this);
                Ok(Value::from(format!("{}:{}", kind, args.len())))
            })
            .unwrap();
        let result = runtime
            .run_script(&Script::new(vec![expr(call(ident("describe"), vec![num(1.0), num(2.0)]))]))
            .unwrap();
        assert_eq!(result, Value::from("undefined:2"));
    }
}

mod construct {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_binds_fresh_this() {
        let result = run_both(vec![
            function_declaration("P", &["x"], vec![expr(assign_member(this(), "x", ident("x")))]),
            var("p", Some(new_(ident("P"), vec![num(4.0)]))),
            expr(member(ident("p"), "x")),
        ])
        .unwrap();
        assert_eq!(result, Value::from(4));
    }

    #[test]
    fn test_returned_object_replaces_this() {
        let result = run_both(vec![
            function_declaration(
                "P",
                &[],
                vec![
                    expr(assign_member(this(), "a", num(1.0))),
                    ret(object(vec![("b", num(2.0))])),
                ],
            ),
            expr(member(new_(ident("P"), vec![]), "b")),
        ])
        .unwrap();
        assert_eq!(result, Value::from(2));
    }

    #[test]
    fn test_returned_primitive_is_ignored() {
        let result = run_both(vec![
            function_declaration(
                "P",
                &[],
                vec![expr(assign_member(this(), "a", num(1.0))), ret(num(5.0))],
            ),
            expr(member(new_(ident("P"), vec![]), "a")),
        ])
        .unwrap();
        assert_eq!(result, Value::from(1));
    }

    #[test]
    fn test_instances_inherit_from_prototype_property() {
        let greet = function("", &[], vec![ret(str_("hi"))]);
        let result = run_both(vec![
            function_declaration("P", &[], vec![]),
            expr(assign_member(member(ident("P"), "prototype"), "greet", func_expr(greet))),
            expr(call(member(new_(ident("P"), vec![]), "greet"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from("hi"));
    }

    #[test]
    fn test_arrow_is_not_a_constructor() {
        let err = run_both(vec![
            var("a", Some(arrow(&[], expr_body(num(1.0))))),
            expr(new_(ident("a"), vec![])),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TypeError));
    }

    #[test]
    fn test_host_construct() {
        let mut runtime = runtime(ExecutionStrategy::TreeWalk);
        runtime
            .run_script(&Script::new(vec![function_declaration(
                "Point",
                &["x"],
                vec![expr(assign_member(this(), "x", ident("x")))],
            )]))
            .unwrap();
        let point = runtime.get_global("Point").unwrap();
        let instance = runtime.construct(&point, vec![Value::from(3)]).unwrap();
        assert_eq!(runtime.get_property(&instance, "x").unwrap(), Value::from(3));
    }
}

mod arguments {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sloppy_arguments_alias_parameters() {
        let result = run_both(vec![
            function_declaration(
                "f",
                &["a"],
                vec![expr(assign_index(ident("arguments"), num(0.0), num(9.0))), ret(ident("a"))],
            ),
            expr(call(ident("f"), vec![num(1.0)])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(9));
    }

    #[test]
    fn test_strict_arguments_do_not_alias() {
        let result = run_both(vec![
            Statement::FunctionDeclaration(strict_function(
                "f",
                &["a"],
                vec![expr(assign("a", num(2.0))), ret(index(ident("arguments"), num(0.0)))],
            )),
            expr(call(ident("f"), vec![num(1.0)])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(1));
    }

    #[test]
    fn test_duplicate_parameters_bind_the_last_argument() {
        let duplicated = || function_declaration("f", &["a", "a"], vec![ret(ident("a"))]);
        let result = run_both(vec![duplicated(), expr(call(ident("f"), vec![num(1.0), num(2.0)]))]).unwrap();
        assert_eq!(result, Value::from(2));

        let length = run_both(vec![duplicated(), expr(member(ident("f"), "length"))]).unwrap();
        assert_eq!(length, Value::from(2));
    }

    #[test]
    fn test_duplicate_parameters_alias_the_last_argument_slot() {
        let result = run_both(vec![
            function_declaration(
                "g",
                &["a", "a"],
                vec![expr(assign("a", num(7.0))), ret(index(ident("arguments"), num(1.0)))],
            ),
            expr(call(ident("g"), vec![num(1.0), num(2.0)])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(7));
    }

    #[test]
    fn test_arguments_length_counts_actual_arguments() {
        let result = run_both(vec![
            function_declaration("f", &["a"], vec![ret(member(ident("arguments"), "length"))]),
            expr(call(ident("f"), vec![num(1.0), num(2.0), num(3.0)])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(3));
    }

    #[test]
    fn test_spread_arguments() {
        let result = run(vec![
            function_declaration(
                "sum",
                &["a", "b", "c"],
                vec![ret(add_(add_(ident("a"), ident("b")), ident("c")))],
            ),
            expr(call_with(
                ident("sum"),
                vec![spread(array(vec![num(1.0), num(2.0)])), invoke_js::ast::Argument::Expression(num(3.0))],
            )),
        ])
        .unwrap();
        assert_eq!(result, Value::from(6));
    }
}
