//! Core type system for Nelmo.
//!
//! Types are plain values: the primitive singletons, curried function
//! types and list types. Besides structural equality there are two
//! weaker relations. `matches` lets every numeric primitive stand in for
//! `Number`, and `accepts` checks a call's arguments against a function
//! type.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    String,
    Bool,
    Int,
    Float,
    /// Any numeric value; `Int` and `Float` both match it.
    Number,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::String => "String",
            Primitive::Bool => "Bool",
            Primitive::Int => "Int",
            Primitive::Float => "Float",
            Primitive::Number => "Number",
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, Primitive::Int | Primitive::Float | Primitive::Number)
    }
}

/// Represents the static type of an expression.
///
/// Multi-argument functions are curried: `Int -> Int -> Int` is a
/// function from `Int` to a function from `Int` to `Int`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Primitive(Primitive),
    Function { input: Box<Type>, output: Box<Type> },
    List(Box<Type>),
}

impl Type {
    pub const STRING: Type = Type::Primitive(Primitive::String);
    pub const BOOL: Type = Type::Primitive(Primitive::Bool);
    pub const INT: Type = Type::Primitive(Primitive::Int);
    pub const FLOAT: Type = Type::Primitive(Primitive::Float);
    pub const NUMBER: Type = Type::Primitive(Primitive::Number);

    pub fn function(input: Type, output: Type) -> Type {
        Type::Function {
            input: Box::new(input),
            output: Box::new(output),
        }
    }

    pub fn list(element: Type) -> Type {
        Type::List(Box::new(element))
    }

    /// Maps a primitive type name to its type.
    pub fn from_string(name: &str) -> Option<Type> {
        let primitive = match name {
            "String" => Primitive::String,
            "Bool" => Primitive::Bool,
            "Int" => Primitive::Int,
            "Float" => Primitive::Float,
            "Number" => Primitive::Number,
            _ => return None,
        };
        Some(Type::Primitive(primitive))
    }

    pub fn input(&self) -> Option<&Type> {
        match self {
            Type::Function { input, .. } => Some(input),
            _ => None,
        }
    }

    pub fn output(&self) -> Option<&Type> {
        match self {
            Type::Function { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function { .. })
    }

    pub fn equals(&self, other: &Type) -> bool {
        self == other
    }

    /// Like `equals`, except that every numeric primitive matches `Number`.
    pub fn matches(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Primitive(primitive), Type::Primitive(Primitive::Number)) => {
                primitive.is_numeric()
            }
            _ => self.equals(other),
        }
    }

    /// Checks whether a function of this type can be applied to `argument`.
    ///
    /// Several arguments are passed as a function type chaining their
    /// types (`a1 -> a2 -> a3`), which is compared input by input against
    /// this type.
    pub fn accepts(&self, argument: &Type) -> bool {
        let Type::Function { input, output } = self else {
            return false;
        };

        match argument {
            Type::Function {
                input: argument_input,
                output: argument_output,
            } => input.equals(argument_input) && output.is_function() && output.accepts(argument_output),
            _ => input.equals(argument),
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.matches(&Type::NUMBER)
    }

    pub fn is_comparable(&self) -> bool {
        match self {
            Type::Primitive(primitive) => *primitive != Primitive::Bool,
            Type::List(_) => true,
            Type::Function { .. } => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(primitive) => f.write_str(primitive.name()),
            Type::Function { input, output } if input.is_function() => {
                write!(f, "({input}) -> {output}")
            }
            Type::Function { input, output } => write!(f, "{input} -> {output}"),
            Type::List(element) if matches!(**element, Type::Primitive(_)) => {
                write!(f, "List {element}")
            }
            Type::List(element) => write!(f, "List ({element})"),
        }
    }
}
