//! The program tree the external parser/checker hands to the compiler
//! (spec §6): top-level function definitions, each with an ordered
//! parameter list and a body expression tree drawn from `{Literal, Var,
//! Let, If, Call, AsyncCall, Await, Primitive, Import}`.

use hark_value::{Symbol, Value};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgramTree {
    pub functions: Vec<FunctionDef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: Symbol,
    pub params: Vec<Symbol>,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Value),
    Var(Symbol),
    Let { name: Symbol, value: Box<Expr>, body: Box<Expr> },
    If { cond: Box<Expr>, then_branch: Box<Expr>, else_branch: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    AsyncCall { callee: Box<Expr>, args: Vec<Expr> },
    Await(Box<Expr>),
    Primitive(Primitive),
    /// Registers `name` as a foreign binding resolving to
    /// `foreign_target`/`arity`, in scope for `body`.
    Import { name: Symbol, foreign_target: Symbol, arity: u8, body: Box<Expr> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    ListNew(Vec<Expr>),
    /// `(list, index)`.
    ListGet(Box<Expr>, Box<Expr>),
    RecordNew(Vec<(Symbol, Expr)>),
    /// `(record, key)`.
    RecordGet(Box<Expr>, Box<Expr>),
    Print(Box<Expr>),
}
