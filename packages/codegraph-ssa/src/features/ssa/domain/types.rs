//! SSA type lattice
//!
//! Deliberately coarse: every numeric kind is `Number`, and anything the
//! builders cannot infer is `Any`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::BlueprintId;

static NUMBER: Type = Type::Number;
static STRING: Type = Type::String;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Type {
    #[default]
    Any,
    Null,
    Undefined,
    Number,
    String,
    Bytes,
    Boolean,
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Chan(Box<Type>),
    Tuple(Vec<Type>),
    Function(Box<FunctionType>),
    /// Anonymous struct (named structs are blueprints)
    Struct(Vec<(String, Type)>),
    Interface,
    Blueprint(BlueprintId),
    Alias {
        name: String,
        inner: Box<Type>,
    },
}

/// Function signature
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub returns: Vec<Type>,
    pub variadic: bool,
}

impl FunctionType {
    pub fn new(params: Vec<Type>, returns: Vec<Type>) -> Self {
        Self {
            params,
            returns,
            variadic: false,
        }
    }

    /// Type produced by calling a function with this signature
    pub fn result_type(&self) -> Type {
        match self.returns.len() {
            0 => Type::Null,
            1 => self.returns[0].clone(),
            _ => Type::Tuple(self.returns.clone()),
        }
    }
}

impl Type {
    pub fn pointer(inner: Type) -> Self {
        Type::Pointer(Box::new(inner))
    }

    pub fn slice(inner: Type) -> Self {
        Type::Slice(Box::new(inner))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn function(sig: FunctionType) -> Self {
        Type::Function(Box::new(sig))
    }

    pub fn is_any(&self) -> bool {
        matches!(self.unalias(), Type::Any)
    }

    /// Strip alias layers
    pub fn unalias(&self) -> &Type {
        let mut ty = self;
        while let Type::Alias { inner, .. } = ty {
            ty = inner;
        }
        ty
    }

    /// Element type for containers (value type for maps)
    pub fn element(&self) -> Option<&Type> {
        match self.unalias() {
            Type::Pointer(t) | Type::Slice(t) | Type::Chan(t) | Type::Map(_, t) => Some(t),
            Type::Bytes => Some(&NUMBER),
            Type::String => Some(&STRING),
            _ => None,
        }
    }

    /// Key type for keyed containers
    pub fn key(&self) -> Option<&Type> {
        match self.unalias() {
            Type::Map(k, _) => Some(k),
            Type::Slice(_) | Type::Bytes | Type::String => Some(&NUMBER),
            _ => None,
        }
    }

    pub fn tuple_len(&self) -> Option<usize> {
        match self.unalias() {
            Type::Tuple(items) => Some(items.len()),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match self.unalias() {
            Type::Function(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn as_blueprint(&self) -> Option<BlueprintId> {
        match self.unalias() {
            Type::Blueprint(id) => Some(*id),
            Type::Pointer(inner) => inner.as_blueprint(),
            _ => None,
        }
    }

    /// Least upper bound used for phi typing
    pub fn join(&self, other: &Type) -> Type {
        if self == other {
            self.clone()
        } else if matches!(self, Type::Undefined) {
            other.clone()
        } else if matches!(other, Type::Undefined) {
            self.clone()
        } else {
            Type::Any
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::Null => write!(f, "null"),
            Type::Undefined => write!(f, "undefined"),
            Type::Number => write!(f, "number"),
            Type::String => write!(f, "string"),
            Type::Bytes => write!(f, "bytes"),
            Type::Boolean => write!(f, "boolean"),
            Type::Pointer(t) => write!(f, "*{}", t),
            Type::Slice(t) => write!(f, "[]{}", t),
            Type::Map(k, v) => write!(f, "map[{}]{}", k, v),
            Type::Chan(t) => write!(f, "chan {}", t),
            Type::Tuple(items) => {
                write!(f, "(")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
            Type::Function(sig) => {
                write!(f, "func(")?;
                for (i, t) in sig.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ") {}", sig.result_type())
            }
            Type::Struct(fields) => write!(f, "struct{{{} fields}}", fields.len()),
            Type::Interface => write!(f, "interface"),
            Type::Blueprint(id) => write!(f, "blueprint#{}", id.0),
            Type::Alias { name, .. } => write!(f, "{}", name),
        }
    }
}
