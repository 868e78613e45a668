//! Pattern AST node types for destructuring

use super::*;

/// A binding pattern (used in variable declarations and function parameters)
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Simple identifier binding
    Identifier(String),

    /// Array destructuring pattern [a, b, c]
    Array(ArrayPattern),

    /// Object destructuring pattern {a, b, c}
    Object(ObjectPattern),

    /// Assignment pattern with default value a = 1
    Assignment(Box<AssignmentPattern>),
}

impl Pattern {
    /// Get all bound identifiers in this pattern
    pub fn bound_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_bound_names(&mut names);
        names
    }

    fn collect_bound_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Pattern::Identifier(id) => names.push(id),
            Pattern::Array(arr) => {
                for elem in arr.elements.iter().flatten() {
                    elem.collect_bound_names(names);
                }
                if let Some(rest) = &arr.rest {
                    rest.collect_bound_names(names);
                }
            }
            Pattern::Object(obj) => {
                for prop in &obj.properties {
                    prop.value.collect_bound_names(names);
                }
                if let Some(rest) = &obj.rest {
                    rest.collect_bound_names(names);
                }
            }
            Pattern::Assignment(a) => {
                a.left.collect_bound_names(names);
            }
        }
    }

    /// Whether binding this pattern evaluates any expression
    /// (a default value or a computed key)
    pub fn contains_expression(&self) -> bool {
        match self {
            Pattern::Identifier(_) => false,
            Pattern::Array(arr) => {
                arr.elements.iter().flatten().any(Pattern::contains_expression)
                    || arr.rest.as_ref().is_some_and(|r| r.contains_expression())
            }
            Pattern::Object(obj) => {
                obj.properties.iter().any(|p| {
                    matches!(p.key, PropertyName::Computed(_)) || p.value.contains_expression()
                }) || obj.rest.as_ref().is_some_and(|r| r.contains_expression())
            }
            Pattern::Assignment(_) => true,
        }
    }
}

/// Array destructuring pattern
#[derive(Debug, Clone)]
pub struct ArrayPattern {
    /// Pattern elements (None for holes)
    pub elements: Vec<Option<Pattern>>,
    /// Rest element
    pub rest: Option<Box<Pattern>>,
}

/// Object destructuring pattern
#[derive(Debug, Clone)]
pub struct ObjectPattern {
    /// Pattern properties
    pub properties: Vec<ObjectPatternProperty>,
    /// Rest property {...rest}
    pub rest: Option<Box<Pattern>>,
}

/// Object pattern property {key: value} or shorthand {key}
#[derive(Debug, Clone)]
pub struct ObjectPatternProperty {
    /// Property key
    pub key: PropertyName,
    /// Value pattern
    pub value: Pattern,
}

/// Assignment pattern with default value
#[derive(Debug, Clone)]
pub struct AssignmentPattern {
    /// Left-hand side pattern
    pub left: Pattern,
    /// Default value expression
    pub right: Expression,
}
