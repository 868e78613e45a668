//! Integration tests for classes

mod common;
use common::run_both;
use invoke_js::ast::builder::*;
use invoke_js::ast::ClassNode;
use invoke_js::{ErrorKind, Value};

fn base() -> ClassNode {
    class("A", None).with_constructor(&["x"], vec![expr(assign_member(this(), "x", ident("x")))])
}

mod classes {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_constructor_and_method() {
        let point = class("P", None)
            .with_constructor(&["x"], vec![expr(assign_member(this(), "x", ident("x")))])
            .with_method("get", &[], vec![ret(member(this(), "x"))]);
        let result = run_both(vec![
            class_declaration(point),
            expr(call(member(new_(ident("P"), vec![num(3.0)]), "get"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(3));
    }

    #[test]
    fn test_class_without_constructor() {
        let result = run_both(vec![
            class_declaration(class("Empty", None)),
            expr(typeof_(new_(ident("Empty"), vec![]))),
        ])
        .unwrap();
        assert_eq!(result, Value::from("object"));
    }

    #[test]
    fn test_calling_a_class_without_new_is_type_error() {
        let err = run_both(vec![class_declaration(class("C", None)), expr(call(ident("C"), vec![]))]).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TypeError));
        assert!(err.to_string().contains("class constructor cannot be invoked without new"));
    }

    #[test]
    fn test_static_method() {
        let maker = class("M", None).with_static_method("make", &[], vec![ret(num(42.0))]);
        let result = run_both(vec![
            class_declaration(maker),
            expr(call(member(ident("M"), "make"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from(42));
    }

    #[test]
    fn test_anonymous_class_takes_binding_name() {
        let result = run_both(vec![
            var("K", Some(class_expr(class("", None)))),
            expr(member(ident("K"), "name")),
        ])
        .unwrap();
        assert_eq!(result, Value::from("K"));
    }
}

mod fields {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fields_initialize_in_order_with_this() {
        let counter = class("C", None)
            .with_field("a", Some(num(1.0)))
            .with_field("b", Some(add_(member(this(), "a"), num(1.0))));
        let result = run_both(vec![
            class_declaration(counter),
            expr(member(new_(ident("C"), vec![]), "b")),
        ])
        .unwrap();
        assert_eq!(result, Value::from(2));
    }

    #[test]
    fn test_base_fields_exist_when_constructor_runs() {
        let class_node = class("C", None)
            .with_field("f", Some(num(1.0)))
            .with_constructor(&[], vec![expr(assign_member(this(), "seen", member(this(), "f")))]);
        let result = run_both(vec![
            class_declaration(class_node),
            expr(member(new_(ident("C"), vec![]), "seen")),
        ])
        .unwrap();
        assert_eq!(result, Value::from(1));
    }

    #[test]
    fn test_derived_fields_initialize_after_super() {
        let parent = class("A", None).with_constructor(&[], vec![expr(assign_member(this(), "seen", member(this(), "f")))]);
        let child = class("B", Some(ident("A"))).with_field("f", Some(num(1.0)));
        let result = run_both(vec![
            class_declaration(parent),
            class_declaration(child),
            var("b", Some(new_(ident("B"), vec![]))),
            expr(add_(typeof_(member(ident("b"), "seen")), member(ident("b"), "f"))),
        ])
        .unwrap();
        assert_eq!(result, Value::from("undefined1"));
    }
}

mod inheritance {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_super_call_binds_this() {
        let child = class("B", Some(ident("A"))).with_constructor(
            &["x"],
            vec![
                expr(super_call(vec![ident("x")])),
                expr(assign_member(this(), "y", num(2.0))),
            ],
        );
        let result = run_both(vec![
            class_declaration(base()),
            class_declaration(child),
            var("b", Some(new_(ident("B"), vec![num(1.0)]))),
            expr(add_(member(ident("b"), "x"), member(ident("b"), "y"))),
        ])
        .unwrap();
        assert_eq!(result, Value::from(3));
    }

    #[test]
    fn test_default_derived_constructor_forwards_arguments() {
        let result = run_both(vec![
            class_declaration(base()),
            class_declaration(class("B", Some(ident("A")))),
            expr(member(new_(ident("B"), vec![num(5.0)]), "x")),
        ])
        .unwrap();
        assert_eq!(result, Value::from(5));
    }

    #[test]
    fn test_methods_are_inherited() {
        let parent = class("A", None).with_method("hello", &[], vec![ret(str_("A"))]);
        let result = run_both(vec![
            class_declaration(parent),
            class_declaration(class("B", Some(ident("A")))),
            expr(call(member(new_(ident("B"), vec![]), "hello"), vec![])),
        ])
        .unwrap();
        assert_eq!(result, Value::from("A"));
    }

    #[test]
    fn test_missing_super_call_is_reference_error() {
        let child = class("B", Some(ident("A"))).with_constructor(&[], vec![]);
        let err = run_both(vec![
            class_declaration(base()),
            class_declaration(child),
            expr(new_(ident("B"), vec![])),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ReferenceError));
    }

    #[test]
    fn test_super_called_twice_is_reference_error() {
        let child = class("B", Some(ident("A"))).with_constructor(
            &[],
            vec![expr(super_call(vec![])), expr(super_call(vec![]))],
        );
        let err = run_both(vec![
            class_declaration(base()),
            class_declaration(child),
            expr(new_(ident("B"), vec![])),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ReferenceError));
    }

    #[test]
    fn test_extends_a_non_constructor_is_type_error() {
        let err = run_both(vec![class_declaration(class("B", Some(num(1.0))))]).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TypeError));
    }

    #[test]
    fn test_derived_constructor_returning_primitive_is_type_error() {
        let child = class("B", Some(ident("A")))
            .with_constructor(&[], vec![expr(super_call(vec![])), ret(num(1.0))]);
        let err = run_both(vec![
            class_declaration(base()),
            class_declaration(child),
            expr(new_(ident("B"), vec![])),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TypeError));
    }
}
