//! SSA values and instructions
//!
//! A `Value` is immutable once emitted; only its `ty` may be refined later.
//! Instructions are values that live in a block's instruction list.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{BlockId, BlueprintId, FunctionId, ValueId};
use super::types::Type;
use crate::shared::models::Span;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Nil,
}

impl Constant {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Constant::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Constant::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Constant::Int(v) => Some(*v as f64),
            Constant::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn type_of(&self) -> Type {
        match self {
            Constant::Int(_) | Constant::Float(_) => Type::Number,
            Constant::Bool(_) => Type::Boolean,
            Constant::Str(_) => Type::String,
            Constant::Nil => Type::Null,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Float(v) => write!(f, "{}", v),
            Constant::Bool(v) => write!(f, "{}", v),
            Constant::Str(s) => write!(f, "{:?}", s),
            Constant::Nil => write!(f, "nil"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Operators
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Integer division truncating toward zero (C, Go)
    Div,
    /// Always-float division (Python `/`)
    TrueDiv,
    /// Division rounding toward negative infinity (Python `//`)
    FloorDiv,
    /// Remainder with the sign of the dividend (C, Go)
    Mod,
    /// Remainder with the sign of the divisor (Python `%`)
    FloorMod,
    Pow,
    MatMul,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    AndNot,
    LogicAnd,
    LogicOr,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
    Is,
    IsNot,
    Send,
}

impl BinaryOp {
    /// Map an operator token shared by the C and Go grammars.
    ///
    /// Compound-assignment tokens (`+=`) are accepted too.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = match token.strip_suffix('=') {
            Some(t) if !matches!(token, "==" | "!=" | "<=" | ">=") => t,
            _ => token,
        };
        Some(match token {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "&^" => BinaryOp::AndNot,
            "&&" => BinaryOp::LogicAnd,
            "||" => BinaryOp::LogicOr,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::NotEq,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::LtEq,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::GtEq,
            _ => return None,
        })
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
                | BinaryOp::In
                | BinaryOp::NotIn
                | BinaryOp::Is
                | BinaryOp::IsNot
        )
    }

    pub fn result_type(self, lhs: &Type, rhs: &Type) -> Type {
        if self.is_comparison() || matches!(self, BinaryOp::LogicAnd | BinaryOp::LogicOr) {
            return Type::Boolean;
        }
        match (lhs.unalias(), rhs.unalias()) {
            (Type::String, Type::String) if self == BinaryOp::Add => Type::String,
            (Type::Number, Type::Number) => Type::Number,
            _ if self == BinaryOp::Send => Type::Null,
            _ => lhs.join(rhs),
        }
    }

    /// Fold two constants. `None` when the operation is not defined on them
    /// or the integer result does not fit in an `i64`.
    pub fn fold(self, lhs: &Constant, rhs: &Constant) -> Option<Constant> {
        use Constant::*;
        match (lhs, rhs) {
            (Int(a), Int(b)) => {
                let (a, b) = (*a, *b);
                Some(match self {
                    BinaryOp::Add => Int(a.checked_add(b)?),
                    BinaryOp::Sub => Int(a.checked_sub(b)?),
                    BinaryOp::Mul => Int(a.checked_mul(b)?),
                    BinaryOp::Div => Int(a.checked_div(b)?),
                    BinaryOp::TrueDiv if b != 0 => Float(a as f64 / b as f64),
                    BinaryOp::FloorDiv => Int(floor_div(a, b)?),
                    BinaryOp::Mod => Int(a.checked_rem(b)?),
                    BinaryOp::FloorMod => Int(floor_mod(a, b)?),
                    BinaryOp::Pow => Int(a.checked_pow(u32::try_from(b).ok()?)?),
                    BinaryOp::Shl if (0..64).contains(&b) => Int(a.wrapping_shl(b as u32)),
                    BinaryOp::Shr if (0..64).contains(&b) => Int(a.wrapping_shr(b as u32)),
                    BinaryOp::BitAnd => Int(a & b),
                    BinaryOp::BitOr => Int(a | b),
                    BinaryOp::BitXor => Int(a ^ b),
                    BinaryOp::AndNot => Int(a & !b),
                    BinaryOp::Eq | BinaryOp::Is => Bool(a == b),
                    BinaryOp::NotEq | BinaryOp::IsNot => Bool(a != b),
                    BinaryOp::Lt => Bool(a < b),
                    BinaryOp::LtEq => Bool(a <= b),
                    BinaryOp::Gt => Bool(a > b),
                    BinaryOp::GtEq => Bool(a >= b),
                    _ => return None,
                })
            }
            (Int(_) | Float(_), Int(_) | Float(_)) => {
                let (a, b) = (lhs.as_f64()?, rhs.as_f64()?);
                Some(match self {
                    BinaryOp::Add => Float(a + b),
                    BinaryOp::Sub => Float(a - b),
                    BinaryOp::Mul => Float(a * b),
                    BinaryOp::Div | BinaryOp::TrueDiv if b != 0.0 => Float(a / b),
                    BinaryOp::FloorDiv if b != 0.0 => Float((a / b).floor()),
                    BinaryOp::FloorMod if b != 0.0 => Float(a - b * (a / b).floor()),
                    BinaryOp::Eq => Bool(a == b),
                    BinaryOp::NotEq => Bool(a != b),
                    BinaryOp::Lt => Bool(a < b),
                    BinaryOp::LtEq => Bool(a <= b),
                    BinaryOp::Gt => Bool(a > b),
                    BinaryOp::GtEq => Bool(a >= b),
                    _ => return None,
                })
            }
            (Bool(a), Bool(b)) => Some(match self {
                BinaryOp::LogicAnd => Bool(*a && *b),
                BinaryOp::LogicOr => Bool(*a || *b),
                BinaryOp::Eq | BinaryOp::Is => Bool(a == b),
                BinaryOp::NotEq | BinaryOp::IsNot => Bool(a != b),
                _ => return None,
            }),
            (Str(a), Str(b)) => Some(match self {
                BinaryOp::Add => Str(format!("{}{}", a, b)),
                BinaryOp::Eq => Bool(a == b),
                BinaryOp::NotEq => Bool(a != b),
                BinaryOp::In => Bool(b.contains(a.as_str())),
                BinaryOp::NotIn => Bool(!b.contains(a.as_str())),
                _ => return None,
            }),
            (Nil, Nil) => match self {
                BinaryOp::Eq | BinaryOp::Is => Some(Bool(true)),
                BinaryOp::NotEq | BinaryOp::IsNot => Some(Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
    BitNot,
    Deref,
    AddrOf,
    Recv,
}

impl UnaryOp {
    /// Map a C/Go unary operator token. Go's unary `^` is bitwise complement.
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "+" => UnaryOp::Plus,
            "-" => UnaryOp::Neg,
            "!" | "not" => UnaryOp::Not,
            "~" | "^" => UnaryOp::BitNot,
            "*" => UnaryOp::Deref,
            "&" => UnaryOp::AddrOf,
            "<-" => UnaryOp::Recv,
            _ => return None,
        })
    }

    pub fn fold(self, operand: &Constant) -> Option<Constant> {
        match (self, operand) {
            (UnaryOp::Plus, Constant::Int(_) | Constant::Float(_)) => Some(operand.clone()),
            (UnaryOp::Neg, Constant::Int(v)) => v.checked_neg().map(Constant::Int),
            (UnaryOp::Neg, Constant::Float(v)) => Some(Constant::Float(-v)),
            (UnaryOp::Not, Constant::Bool(v)) => Some(Constant::Bool(!v)),
            (UnaryOp::BitNot, Constant::Int(v)) => Some(Constant::Int(!v)),
            _ => None,
        }
    }
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a.checked_rem(b)? != 0 && (a < 0) != (b < 0) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && (r < 0) != (b < 0) {
        Some(r + b)
    } else {
        Some(r)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Values
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueKind {
    Const(Constant),
    /// Read of a name with no reaching definition
    Undefined { name: String },
    Param { index: usize },
    /// Variable captured from an enclosing function
    FreeValue {
        name: String,
        captured: Option<ValueId>,
    },
    Function(FunctionId),
    ExternFunction { name: String },
    ExternLib { path: String },
    ClassObject(BlueprintId),
    BinOp {
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    UnOp { op: UnaryOp, operand: ValueId },
    Call {
        callee: ValueId,
        args: Vec<ValueId>,
        is_async: bool,
        unpack: bool,
    },
    Phi {
        variable: String,
        edges: Vec<(BlockId, ValueId)>,
    },
    /// Container / object construction
    Make { members: Vec<(ValueId, ValueId)> },
    Member { object: ValueId, key: ValueId },
    SetMember {
        object: ValueId,
        key: ValueId,
        value: ValueId,
    },
    /// Value of an out-parameter, or of a variable a closure wrote, after a call
    SideEffect {
        call: ValueId,
        index: usize,
        variable: String,
    },
    /// One step of iteration; members `ok`, `key`, `field`
    Next { iter: ValueId },
    TypeCast { value: ValueId },
    TypeValue,
    Slice {
        value: ValueId,
        low: Option<ValueId>,
        high: Option<ValueId>,
        max: Option<ValueId>,
    },
}

impl ValueKind {
    /// Values this one reads
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            ValueKind::FreeValue {
                captured: Some(v), ..
            } => vec![*v],
            ValueKind::BinOp { lhs, rhs, .. } => vec![*lhs, *rhs],
            ValueKind::UnOp { operand, .. } => vec![*operand],
            ValueKind::Call { callee, args, .. } => {
                let mut ops = vec![*callee];
                ops.extend(args.iter().copied());
                ops
            }
            ValueKind::Phi { edges, .. } => edges.iter().map(|(_, v)| *v).collect(),
            ValueKind::Make { members } => members.iter().flat_map(|(k, v)| [*k, *v]).collect(),
            ValueKind::Member { object, key } => vec![*object, *key],
            ValueKind::SetMember { object, key, value } => vec![*object, *key, *value],
            ValueKind::SideEffect { call, .. } => vec![*call],
            ValueKind::Next { iter } => vec![*iter],
            ValueKind::TypeCast { value } => vec![*value],
            ValueKind::Slice {
                value,
                low,
                high,
                max,
            } => {
                let mut ops = vec![*value];
                ops.extend([low, high, max].into_iter().flatten().copied());
                ops
            }
            _ => Vec::new(),
        }
    }

    /// Rewrite every use of `old` to `new`
    pub fn replace_operand(&mut self, old: ValueId, new: ValueId) {
        let swap = |v: &mut ValueId| {
            if *v == old {
                *v = new;
            }
        };
        match self {
            ValueKind::FreeValue {
                captured: Some(v), ..
            } => swap(v),
            ValueKind::BinOp { lhs, rhs, .. } => {
                swap(lhs);
                swap(rhs);
            }
            ValueKind::UnOp { operand, .. } => swap(operand),
            ValueKind::Call { callee, args, .. } => {
                swap(callee);
                args.iter_mut().for_each(swap);
            }
            ValueKind::Phi { edges, .. } => edges.iter_mut().for_each(|(_, v)| swap(v)),
            ValueKind::Make { members } => members.iter_mut().for_each(|(k, v)| {
                swap(k);
                swap(v);
            }),
            ValueKind::Member { object, key } => {
                swap(object);
                swap(key);
            }
            ValueKind::SetMember { object, key, value } => {
                swap(object);
                swap(key);
                swap(value);
            }
            ValueKind::SideEffect { call, .. } => swap(call),
            ValueKind::Next { iter } => swap(iter),
            ValueKind::TypeCast { value } => swap(value),
            ValueKind::Slice {
                value,
                low,
                high,
                max,
            } => {
                swap(value);
                for v in [low, high, max].into_iter().flatten() {
                    swap(v);
                }
            }
            _ => {}
        }
    }

    /// Short opcode name (for dumps and assertions)
    pub fn opcode(&self) -> &'static str {
        match self {
            ValueKind::Const(_) => "const",
            ValueKind::Undefined { .. } => "undefined",
            ValueKind::Param { .. } => "param",
            ValueKind::FreeValue { .. } => "freevalue",
            ValueKind::Function(_) => "function",
            ValueKind::ExternFunction { .. } => "extern-function",
            ValueKind::ExternLib { .. } => "extern-lib",
            ValueKind::ClassObject(_) => "class",
            ValueKind::BinOp { .. } => "binop",
            ValueKind::UnOp { .. } => "unop",
            ValueKind::Call { .. } => "call",
            ValueKind::Phi { .. } => "phi",
            ValueKind::Make { .. } => "make",
            ValueKind::Member { .. } => "member",
            ValueKind::SetMember { .. } => "set-member",
            ValueKind::SideEffect { .. } => "side-effect",
            ValueKind::Next { .. } => "next",
            ValueKind::TypeCast { .. } => "typecast",
            ValueKind::TypeValue => "type",
            ValueKind::Slice { .. } => "slice",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    pub id: ValueId,
    pub kind: ValueKind,
    pub ty: Type,
    pub function: FunctionId,
    /// Block holding the instruction; `None` for leaves (consts, params, ...)
    pub block: Option<BlockId>,
    pub span: Span,
    /// Source variables bound to this value
    pub variables: Vec<String>,
}

impl Value {
    pub fn as_const(&self) -> Option<&Constant> {
        match &self.kind {
            ValueKind::Const(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self.kind, ValueKind::Phi { .. })
    }

    pub fn is_call(&self) -> bool {
        matches!(self.kind, ValueKind::Call { .. })
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self.kind, ValueKind::Undefined { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_mapping() {
        assert_eq!(BinaryOp::from_token("+="), Some(BinaryOp::Add));
        assert_eq!(BinaryOp::from_token("<="), Some(BinaryOp::LtEq));
        assert_eq!(BinaryOp::from_token("=="), Some(BinaryOp::Eq));
        assert_eq!(BinaryOp::from_token("&^="), Some(BinaryOp::AndNot));
        assert_eq!(BinaryOp::from_token("<<="), Some(BinaryOp::Shl));
        assert_eq!(UnaryOp::from_token("^"), Some(UnaryOp::BitNot));
        assert_eq!(BinaryOp::from_token("=>"), None);
    }

    #[test]
    fn test_fold_arithmetic_and_comparison() {
        let two = Constant::Int(2);
        let five = Constant::Int(5);
        assert_eq!(BinaryOp::Add.fold(&two, &five), Some(Constant::Int(7)));
        assert_eq!(BinaryOp::Div.fold(&five, &two), Some(Constant::Int(2)));
        assert_eq!(BinaryOp::TrueDiv.fold(&five, &two), Some(Constant::Float(2.5)));
        assert_eq!(BinaryOp::Lt.fold(&two, &five), Some(Constant::Bool(true)));
        assert_eq!(BinaryOp::Div.fold(&five, &Constant::Int(0)), None);
        assert_eq!(UnaryOp::Neg.fold(&five), Some(Constant::Int(-5)));
    }

    #[test]
    fn test_floor_and_truncating_division_differ_on_signs() {
        let int = Constant::Int;
        assert_eq!(BinaryOp::Mod.fold(&int(-7), &int(2)), Some(int(-1)));
        assert_eq!(BinaryOp::FloorMod.fold(&int(-7), &int(2)), Some(int(1)));
        assert_eq!(BinaryOp::FloorMod.fold(&int(7), &int(-2)), Some(int(-1)));
        assert_eq!(BinaryOp::FloorMod.fold(&int(6), &int(-2)), Some(int(0)));
        assert_eq!(BinaryOp::Div.fold(&int(7), &int(-2)), Some(int(-3)));
        assert_eq!(BinaryOp::FloorDiv.fold(&int(7), &int(-2)), Some(int(-4)));
        assert_eq!(BinaryOp::FloorDiv.fold(&int(-7), &int(-2)), Some(int(3)));
        assert_eq!(BinaryOp::FloorDiv.fold(&int(-8), &int(2)), Some(int(-4)));
        assert_eq!(
            BinaryOp::FloorDiv.fold(&Constant::Float(-7.0), &int(2)),
            Some(Constant::Float(-4.0))
        );
    }

    #[test]
    fn test_fold_gives_up_on_overflow() {
        let int = Constant::Int;
        assert_eq!(BinaryOp::FloorDiv.fold(&int(i64::MIN), &int(-1)), None);
        assert_eq!(BinaryOp::FloorMod.fold(&int(i64::MIN), &int(-1)), None);
        assert_eq!(BinaryOp::Div.fold(&int(i64::MIN), &int(-1)), None);
        assert_eq!(BinaryOp::Add.fold(&int(i64::MAX), &int(1)), None);
        assert_eq!(BinaryOp::Pow.fold(&int(10), &int(40)), None);
        assert_eq!(BinaryOp::Pow.fold(&int(2), &int(-1)), None);
        assert_eq!(BinaryOp::FloorMod.fold(&int(1), &int(0)), None);
        assert_eq!(UnaryOp::Neg.fold(&int(i64::MIN)), None);
    }

    #[test]
    fn test_replace_operand() {
        let mut kind = ValueKind::BinOp {
            op: BinaryOp::Add,
            lhs: ValueId(1),
            rhs: ValueId(1),
        };
        kind.replace_operand(ValueId(1), ValueId(9));
        assert_eq!(kind.operands(), vec![ValueId(9), ValueId(9)]);
    }
}
