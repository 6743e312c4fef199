//! Translates a [`ProgramTree`] into a [`CodeModel`].
//!
//! Every function compiles to a contiguous instruction block ending in
//! `Return`. Expressions compile in a stack discipline: operands are
//! pushed in evaluation order and each operation consumes its operands and
//! pushes its result. Source evaluation order (left to right) is preserved
//! exactly, because `print` and foreign calls make side effects observable.
//!
//! The program tree's node kinds are a closed Rust enum
//! ([`Expr`](crate::Expr)); "rejecting unknown node kinds" (spec §6) is
//! therefore enforced at the type/deserialization boundary rather than by
//! a runtime check here — a tree containing a node outside `{Literal, Var,
//! Let, If, Call, AsyncCall, Await, Primitive, Import}` simply fails to
//! parse into an `Expr` in the first place.

use std::collections::{BTreeMap, HashMap, HashSet};

use hark_value::{CodeModel, FunctionMeta, Instruction, Symbol, Value};
use tracing::debug;

use crate::error::CompileError;
use crate::tree::{Expr, FunctionDef, Primitive, ProgramTree};

#[derive(Clone)]
enum BindingKind {
    Local,
    Foreign { arity: u8 },
}

struct Codegen {
    instructions: Vec<Instruction>,
    scopes: Vec<HashMap<Symbol, BindingKind>>,
}

impl Codegen {
    fn resolve(&self, name: &Symbol) -> Option<BindingKind> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).cloned())
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn emit(&mut self, instr: Instruction) -> usize {
        self.instructions.push(instr);
        self.instructions.len() - 1
    }

    fn patch_jump(&mut self, at: usize, target: usize) {
        let offset = target as isize - (at as isize + 1);
        match &mut self.instructions[at] {
            Instruction::Jump(o) | Instruction::JumpIfNot(o) => *o = offset,
            other => unreachable!("patch_jump on non-jump instruction {other:?}"),
        }
    }

    fn compile_expr(
        &mut self,
        expr: &Expr,
        top_level: &HashMap<Symbol, u8>,
    ) -> Result<(), CompileError> {
        match expr {
            Expr::Literal(v) => {
                self.emit(Instruction::PushL(v.clone()));
            }
            Expr::Var(name) => {
                self.emit(Instruction::PushV(name.clone()));
            }
            Expr::Let { name, value, body } => {
                self.compile_expr(value, top_level)?;
                self.emit(Instruction::Bind(name.clone()));
                self.push_scope();
                self.scopes.last_mut().unwrap().insert(name.clone(), BindingKind::Local);
                self.compile_expr(body, top_level)?;
                self.pop_scope();
            }
            Expr::If { cond, then_branch, else_branch } => {
                self.compile_expr(cond, top_level)?;
                let jif = self.emit(Instruction::JumpIfNot(0));
                self.compile_expr(then_branch, top_level)?;
                let jend = self.emit(Instruction::Jump(0));
                let else_start = self.instructions.len();
                self.compile_expr(else_branch, top_level)?;
                let end = self.instructions.len();
                self.patch_jump(jif, else_start);
                self.patch_jump(jend, end);
            }
            Expr::Call { callee, args } => {
                if let Expr::Var(name) = callee.as_ref() {
                    if let Some(BindingKind::Foreign { .. }) = self.resolve(name) {
                        self.emit(Instruction::PushV(name.clone()));
                        for arg in args {
                            self.compile_expr(arg, top_level)?;
                        }
                        self.emit(Instruction::CallF(args.len() as u8));
                        return Ok(());
                    }
                    if self.resolve(name).is_none() && !top_level.contains_key(name) {
                        return Err(CompileError::UndefinedFunction(name.clone()));
                    }
                }
                self.compile_expr(callee, top_level)?;
                for arg in args {
                    self.compile_expr(arg, top_level)?;
                }
                self.emit(Instruction::Call(args.len() as u8));
            }
            Expr::AsyncCall { callee, args } => {
                if let Expr::Var(name) = callee.as_ref() {
                    if let Some(BindingKind::Foreign { .. }) = self.resolve(name) {
                        return Err(CompileError::AsyncOfForeign(name.clone()));
                    }
                    if self.resolve(name).is_none() && !top_level.contains_key(name) {
                        return Err(CompileError::UndefinedFunction(name.clone()));
                    }
                }
                self.compile_expr(callee, top_level)?;
                for arg in args {
                    self.compile_expr(arg, top_level)?;
                }
                self.emit(Instruction::ACall(args.len() as u8));
            }
            Expr::Await(inner) => {
                self.compile_expr(inner, top_level)?;
                self.emit(Instruction::Wait);
            }
            Expr::Import { name, foreign_target, arity, body } => {
                self.emit(Instruction::PushL(Value::ForeignRef {
                    name: foreign_target.clone(),
                    arity: *arity,
                }));
                self.emit(Instruction::Bind(name.clone()));
                self.push_scope();
                self.scopes
                    .last_mut()
                    .unwrap()
                    .insert(name.clone(), BindingKind::Foreign { arity: *arity });
                self.compile_expr(body, top_level)?;
                self.pop_scope();
            }
            Expr::Primitive(p) => self.compile_primitive(p, top_level)?,
        }
        Ok(())
    }

    fn compile_primitive(
        &mut self,
        p: &Primitive,
        top_level: &HashMap<Symbol, u8>,
    ) -> Result<(), CompileError> {
        macro_rules! binop {
            ($a:expr, $b:expr, $op:expr) => {{
                self.compile_expr($a, top_level)?;
                self.compile_expr($b, top_level)?;
                self.emit($op);
            }};
        }
        match p {
            Primitive::Add(a, b) => binop!(a, b, Instruction::Add),
            Primitive::Sub(a, b) => binop!(a, b, Instruction::Sub),
            Primitive::Mul(a, b) => binop!(a, b, Instruction::Mul),
            Primitive::Div(a, b) => binop!(a, b, Instruction::Div),
            Primitive::Eq(a, b) => binop!(a, b, Instruction::Eq),
            Primitive::Lt(a, b) => binop!(a, b, Instruction::Lt),
            Primitive::Gt(a, b) => binop!(a, b, Instruction::Gt),
            Primitive::And(a, b) => binop!(a, b, Instruction::And),
            Primitive::Or(a, b) => binop!(a, b, Instruction::Or),
            Primitive::Neg(a) => {
                self.compile_expr(a, top_level)?;
                self.emit(Instruction::Neg);
            }
            Primitive::Not(a) => {
                self.compile_expr(a, top_level)?;
                self.emit(Instruction::Not);
            }
            Primitive::ListNew(items) => {
                for item in items {
                    self.compile_expr(item, top_level)?;
                }
                self.emit(Instruction::ListNew(items.len() as u8));
            }
            Primitive::ListGet(list, index) => {
                self.compile_expr(list, top_level)?;
                self.compile_expr(index, top_level)?;
                self.emit(Instruction::ListGet);
            }
            Primitive::RecordNew(fields) => {
                let mut seen = HashSet::new();
                for (key, _) in fields {
                    if !seen.insert(key.clone()) {
                        return Err(CompileError::DuplicateRecordKey(key.clone()));
                    }
                }
                for (key, value) in fields {
                    self.compile_expr(value, top_level)?;
                    self.emit(Instruction::PushL(Value::Symbol(key.clone())));
                }
                self.emit(Instruction::RecordNew(fields.len() as u8));
            }
            Primitive::RecordGet(record, key) => {
                self.compile_expr(record, top_level)?;
                self.compile_expr(key, top_level)?;
                self.emit(Instruction::RecordGet);
            }
            Primitive::Print(inner) => {
                self.compile_expr(inner, top_level)?;
                self.emit(Instruction::Print);
            }
        }
        Ok(())
    }
}

pub fn compile(tree: &ProgramTree) -> Result<CodeModel, CompileError> {
    let mut top_level: HashMap<Symbol, u8> = HashMap::new();
    for f in &tree.functions {
        if top_level.insert(f.name.clone(), f.params.len() as u8).is_some() {
            return Err(CompileError::DuplicateFunction(f.name.clone()));
        }
    }

    let mut cg = Codegen { instructions: Vec::new(), scopes: Vec::new() };
    let mut functions = BTreeMap::new();

    for FunctionDef { name, params, body } in &tree.functions {
        let entry = cg.instructions.len();
        debug!(function = %name, entry, "compiling function");

        cg.push_scope();
        {
            let scope = cg.scopes.last_mut().unwrap();
            for p in params {
                scope.insert(p.clone(), BindingKind::Local);
            }
        }
        cg.compile_expr(body, &top_level)?;
        cg.pop_scope();
        cg.emit(Instruction::Return);

        functions.insert(
            name.clone(),
            FunctionMeta { entry, arity: params.len() as u8, params: params.clone(), free_vars: Vec::new() },
        );
    }

    Ok(CodeModel::new(cg.instructions, functions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hark_value::Instruction as I;

    fn func(name: &str, params: &[&str], body: Expr) -> FunctionDef {
        FunctionDef {
            name: Symbol::new(name),
            params: params.iter().map(|p| Symbol::new(*p)).collect(),
            body,
        }
    }

    #[test]
    fn literal_arithmetic() {
        let tree = ProgramTree {
            functions: vec![func(
                "main",
                &[],
                Expr::Primitive(Primitive::Add(
                    Box::new(Expr::Literal(Value::Integer(1))),
                    Box::new(Expr::Literal(Value::Integer(2))),
                )),
            )],
        };
        let code = compile(&tree).unwrap();
        assert_eq!(
            code.instructions,
            vec![
                I::PushL(Value::Integer(1)),
                I::PushL(Value::Integer(2)),
                I::Add,
                I::Return,
            ]
        );
        assert_eq!(code.function(&Symbol::new("main")).unwrap().entry, 0);
    }

    #[test]
    fn let_binding_then_reference() {
        let tree = ProgramTree {
            functions: vec![func(
                "main",
                &[],
                Expr::Let {
                    name: Symbol::new("x"),
                    value: Box::new(Expr::Literal(Value::Integer(5))),
                    body: Box::new(Expr::Primitive(Primitive::Add(
                        Box::new(Expr::Var(Symbol::new("x"))),
                        Box::new(Expr::Literal(Value::Integer(1))),
                    ))),
                },
            )],
        };
        let code = compile(&tree).unwrap();
        assert_eq!(
            code.instructions,
            vec![
                I::PushL(Value::Integer(5)),
                I::Bind(Symbol::new("x")),
                I::PushV(Symbol::new("x")),
                I::PushL(Value::Integer(1)),
                I::Add,
                I::Return,
            ]
        );
    }

    #[test]
    fn if_compiles_to_patched_jumps() {
        let tree = ProgramTree {
            functions: vec![func(
                "main",
                &[],
                Expr::If {
                    cond: Box::new(Expr::Literal(Value::Boolean(true))),
                    then_branch: Box::new(Expr::Literal(Value::Integer(1))),
                    else_branch: Box::new(Expr::Literal(Value::Integer(2))),
                },
            )],
        };
        let code = compile(&tree).unwrap();
        // PushL(true); JumpIfNot(+2 -> else); PushL(1); Jump(+1 -> end); PushL(2); Return
        assert_eq!(code.instructions[1], I::JumpIfNot(2));
        assert_eq!(code.instructions[3], I::Jump(1));
    }

    #[test]
    fn async_of_foreign_is_rejected() {
        let tree = ProgramTree {
            functions: vec![func(
                "main",
                &[],
                Expr::Import {
                    name: Symbol::new("rs"),
                    foreign_target: Symbol::new("pysrc.main/random_sleep"),
                    arity: 2,
                    body: Box::new(Expr::AsyncCall {
                        callee: Box::new(Expr::Var(Symbol::new("rs"))),
                        args: vec![Expr::Literal(Value::Integer(1)), Expr::Literal(Value::Integer(2))],
                    }),
                },
            )],
        };
        let err = compile(&tree).unwrap_err();
        assert_eq!(err, CompileError::AsyncOfForeign(Symbol::new("rs")));
    }

    #[test]
    fn undefined_function_rejected() {
        let tree = ProgramTree {
            functions: vec![func(
                "main",
                &[],
                Expr::Call { callee: Box::new(Expr::Var(Symbol::new("nope"))), args: vec![] },
            )],
        };
        assert_eq!(compile(&tree).unwrap_err(), CompileError::UndefinedFunction(Symbol::new("nope")));
    }

    #[test]
    fn duplicate_record_key_rejected() {
        let tree = ProgramTree {
            functions: vec![func(
                "main",
                &[],
                Expr::Primitive(Primitive::RecordNew(vec![
                    (Symbol::new("a"), Expr::Literal(Value::Integer(1))),
                    (Symbol::new("a"), Expr::Literal(Value::Integer(2))),
                ])),
            )],
        };
        assert_eq!(compile(&tree).unwrap_err(), CompileError::DuplicateRecordKey(Symbol::new("a")));
    }
}
