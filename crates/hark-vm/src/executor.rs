//! Single-instruction dispatch (spec §4.3) and the per-lease stepping loop
//! (spec §4.5). A lease is stepped entirely on its own local `Thread`
//! snapshot; the only points this code reaches back into the controller
//! are `ACall` (spawning a new thread), `Wait` (reading whether a future
//! has resolved), and the terminal transitions (`Return` at the root frame,
//! or an error) that resolve the thread's own terminal future. None of
//! these touch the lease being stepped, so they are safe to perform
//! mid-step rather than deferred to `commit_step`.

use std::collections::BTreeMap;

use tracing::{trace, warn};

use hark_controller::{DataController, Lease, StepToken};
use hark_value::{
    as_error_marker, error_marker, CodeModel, HarkError, Instruction, Symbol, Thread, ThreadId,
    ThreadState, Value,
};
use hark_foreign::ForeignRegistry;

#[derive(Debug)]
pub enum StepOutcome {
    /// Step budget exhausted; the thread was committed back as `Ready`.
    BudgetExceeded,
    Suspended,
    Finished(Value),
    Errored(HarkError),
}

enum ControlFlow {
    Continue,
    Suspend(hark_value::FutureId),
    Finished(Value),
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, HarkError> {
    stack.pop().ok_or_else(|| HarkError::MalformedCode("operand stack underflow".into()))
}

fn expect_integer(v: Value) -> Result<i64, HarkError> {
    match v {
        Value::Integer(n) => Ok(n),
        other => Err(HarkError::type_mismatch("integer", other.type_name())),
    }
}

fn expect_boolean(v: Value) -> Result<bool, HarkError> {
    match v {
        Value::Boolean(b) => Ok(b),
        other => Err(HarkError::type_mismatch("boolean", other.type_name())),
    }
}

fn expect_symbol(v: Value) -> Result<Symbol, HarkError> {
    match v {
        Value::Symbol(s) => Ok(s),
        other => Err(HarkError::type_mismatch("symbol", other.type_name())),
    }
}

macro_rules! numeric_binop {
    ($a:expr, $b:expr, $int_op:expr, $float_op:expr) => {
        match ($a, $b) {
            (Value::Integer(a), Value::Integer(b)) => Value::Integer($int_op(a, b)),
            (Value::Float(a), Value::Float(b)) => Value::Float($float_op(a, b)),
            (a, b) => {
                return Err(HarkError::type_mismatch(
                    format!("matching numeric types, found {} and {}", a.type_name(), b.type_name()),
                    "mismatched operand types",
                ))
            }
        }
    };
}

macro_rules! ordering_binop {
    ($a:expr, $b:expr, $op:tt) => {
        match ($a, $b) {
            (Value::Integer(a), Value::Integer(b)) => Value::Boolean(a $op b),
            (Value::Float(a), Value::Float(b)) => Value::Boolean(a $op b),
            (a, b) => {
                return Err(HarkError::type_mismatch(
                    format!("matching ordered types, found {} and {}", a.type_name(), b.type_name()),
                    "mismatched operand types",
                ))
            }
        }
    };
}

async fn dispatch_one(
    controller: &dyn DataController,
    code: &CodeModel,
    foreign: &ForeignRegistry,
    thread: &mut Thread,
    instr: &Instruction,
) -> Result<ControlFlow, HarkError> {
    match instr {
        Instruction::PushV(name) => {
            if let Some(v) = thread.locals.get(name) {
                thread.operand_stack.push(v.clone());
            } else if let Some(meta) = code.function(name) {
                thread.operand_stack.push(Value::FunctionRef { name: name.clone(), arity: meta.arity });
            } else {
                return Err(HarkError::UnboundName(name.to_string()));
            }
        }
        Instruction::PushL(v) => thread.operand_stack.push(v.clone()),
        Instruction::Bind(name) => {
            let v = pop(&mut thread.operand_stack)?;
            thread.locals.insert(name.clone(), v);
        }
        Instruction::Pop => {
            pop(&mut thread.operand_stack)?;
        }
        Instruction::Jump(offset) => {
            thread.ip = (thread.ip as isize + offset) as usize;
        }
        Instruction::JumpIfNot(offset) => {
            let cond = pop(&mut thread.operand_stack)?;
            if !cond.is_truthy() {
                thread.ip = (thread.ip as isize + offset) as usize;
            }
        }
        Instruction::Call(n) => {
            let callee = pop(&mut thread.operand_stack)?;
            let (name, arity) = match callee {
                Value::FunctionRef { name, arity } => (name, arity),
                other => return Err(HarkError::type_mismatch("function", other.type_name())),
            };
            if arity != *n {
                return Err(HarkError::ArityMismatch { name: name.to_string(), expected: arity, got: *n });
            }
            let mut args = Vec::with_capacity(*n as usize);
            for _ in 0..*n {
                args.push(pop(&mut thread.operand_stack)?);
            }
            args.reverse();
            let meta = code
                .function(&name)
                .ok_or_else(|| HarkError::UndefinedFunction(name.to_string()))?
                .clone();
            let return_ip = thread.ip;
            thread.push_frame(return_ip);
            thread.locals = meta.params.iter().cloned().zip(args).collect();
            thread.ip = meta.entry;
            thread.function_name = name;
        }
        Instruction::CallF(n) => {
            let callee = pop(&mut thread.operand_stack)?;
            let (name, arity) = match callee {
                Value::ForeignRef { name, arity } => (name, arity),
                other => return Err(HarkError::type_mismatch("foreign function", other.type_name())),
            };
            if arity != *n {
                return Err(HarkError::ArityMismatch { name: name.to_string(), expected: arity, got: *n });
            }
            let mut args = Vec::with_capacity(*n as usize);
            for _ in 0..*n {
                args.push(pop(&mut thread.operand_stack)?);
            }
            args.reverse();
            let result = foreign.call(&name, &args)?;
            thread.operand_stack.push(result);
        }
        Instruction::ACall(n) => {
            let callee = pop(&mut thread.operand_stack)?;
            let (name, arity) = match callee {
                Value::FunctionRef { name, arity } => (name, arity),
                other => return Err(HarkError::type_mismatch("function", other.type_name())),
            };
            if arity != *n {
                return Err(HarkError::ArityMismatch { name: name.to_string(), expected: arity, got: *n });
            }
            let mut args = Vec::with_capacity(*n as usize);
            for _ in 0..*n {
                args.push(pop(&mut thread.operand_stack)?);
            }
            args.reverse();
            let meta = code
                .function(&name)
                .ok_or_else(|| HarkError::UndefinedFunction(name.to_string()))?
                .clone();
            let locals: BTreeMap<Symbol, Value> = meta.params.iter().cloned().zip(args).collect();
            let (_child_id, future_id) = controller.new_thread(name, locals).await?;
            thread.operand_stack.push(Value::FutureRef(future_id));
        }
        Instruction::Wait => {
            let awaited = pop(&mut thread.operand_stack)?;
            let future_id = match awaited {
                Value::FutureRef(id) => id,
                other => return Err(HarkError::type_mismatch("future", other.type_name())),
            };
            let future = controller
                .read_future(future_id)
                .await
                .ok_or_else(|| HarkError::ControllerUnavailable(format!("unknown future {future_id}")))?;
            if future.resolved {
                let value = future.value.expect("resolved future carries a value");
                if let Some(original) = as_error_marker(&value) {
                    return Err(original);
                }
                thread.operand_stack.push(value);
            } else {
                return Ok(ControlFlow::Suspend(future_id));
            }
        }
        Instruction::Return => {
            let value = pop(&mut thread.operand_stack)?;
            if thread.pop_frame().is_some() {
                thread.operand_stack.push(value);
            } else {
                return Ok(ControlFlow::Finished(value));
            }
        }
        Instruction::Add => {
            let b = pop(&mut thread.operand_stack)?;
            let a = pop(&mut thread.operand_stack)?;
            thread.operand_stack.push(numeric_binop!(a, b, |a, b| a + b, |a, b| a + b));
        }
        Instruction::Sub => {
            let b = pop(&mut thread.operand_stack)?;
            let a = pop(&mut thread.operand_stack)?;
            thread.operand_stack.push(numeric_binop!(a, b, |a, b| a - b, |a, b| a - b));
        }
        Instruction::Mul => {
            let b = pop(&mut thread.operand_stack)?;
            let a = pop(&mut thread.operand_stack)?;
            thread.operand_stack.push(numeric_binop!(a, b, |a, b| a * b, |a, b| a * b));
        }
        Instruction::Div => {
            let b = pop(&mut thread.operand_stack)?;
            let a = pop(&mut thread.operand_stack)?;
            match (a, b) {
                (Value::Integer(_), Value::Integer(0)) => return Err(HarkError::DivisionByZero),
                (Value::Float(_), Value::Float(b)) if b == 0.0 => return Err(HarkError::DivisionByZero),
                (Value::Integer(a), Value::Integer(b)) => thread.operand_stack.push(Value::Integer(a / b)),
                (Value::Float(a), Value::Float(b)) => thread.operand_stack.push(Value::Float(a / b)),
                (a, b) => {
                    return Err(HarkError::type_mismatch(
                        format!("matching numeric types, found {} and {}", a.type_name(), b.type_name()),
                        "mismatched operand types",
                    ))
                }
            }
        }
        Instruction::Neg => {
            let a = pop(&mut thread.operand_stack)?;
            let v = match a {
                Value::Integer(n) => Value::Integer(-n),
                Value::Float(n) => Value::Float(-n),
                other => return Err(HarkError::type_mismatch("integer or float", other.type_name())),
            };
            thread.operand_stack.push(v);
        }
        Instruction::Eq => {
            let b = pop(&mut thread.operand_stack)?;
            let a = pop(&mut thread.operand_stack)?;
            thread.operand_stack.push(Value::Boolean(a == b));
        }
        Instruction::Lt => {
            let b = pop(&mut thread.operand_stack)?;
            let a = pop(&mut thread.operand_stack)?;
            thread.operand_stack.push(ordering_binop!(a, b, <));
        }
        Instruction::Gt => {
            let b = pop(&mut thread.operand_stack)?;
            let a = pop(&mut thread.operand_stack)?;
            thread.operand_stack.push(ordering_binop!(a, b, >));
        }
        Instruction::And => {
            let b = pop(&mut thread.operand_stack)?;
            let a = pop(&mut thread.operand_stack)?;
            thread.operand_stack.push(Value::Boolean(expect_boolean(a)? && expect_boolean(b)?));
        }
        Instruction::Or => {
            let b = pop(&mut thread.operand_stack)?;
            let a = pop(&mut thread.operand_stack)?;
            thread.operand_stack.push(Value::Boolean(expect_boolean(a)? || expect_boolean(b)?));
        }
        Instruction::Not => {
            let a = pop(&mut thread.operand_stack)?;
            thread.operand_stack.push(Value::Boolean(!expect_boolean(a)?));
        }
        Instruction::ListNew(n) => {
            let mut items = Vec::with_capacity(*n as usize);
            for _ in 0..*n {
                items.push(pop(&mut thread.operand_stack)?);
            }
            items.reverse();
            thread.operand_stack.push(Value::List(items));
        }
        Instruction::ListGet => {
            let index = expect_integer(pop(&mut thread.operand_stack)?)?;
            let list = pop(&mut thread.operand_stack)?;
            let items = match list {
                Value::List(items) => items,
                other => return Err(HarkError::type_mismatch("list", other.type_name())),
            };
            let item = usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(|| {
                    HarkError::type_mismatch(
                        "index within list bounds",
                        format!("index {index} for list of length {}", items.len()),
                    )
                })?;
            thread.operand_stack.push(item);
        }
        Instruction::RecordNew(n) => {
            let mut fields = BTreeMap::new();
            for _ in 0..*n {
                let key = expect_symbol(pop(&mut thread.operand_stack)?)?;
                let value = pop(&mut thread.operand_stack)?;
                fields.insert(key, value);
            }
            thread.operand_stack.push(Value::Record(fields));
        }
        Instruction::RecordGet => {
            let key = expect_symbol(pop(&mut thread.operand_stack)?)?;
            let record = pop(&mut thread.operand_stack)?;
            let fields = match record {
                Value::Record(fields) => fields,
                other => return Err(HarkError::type_mismatch("record", other.type_name())),
            };
            let value = fields
                .get(&key)
                .cloned()
                .ok_or_else(|| HarkError::type_mismatch("record containing field", format!("missing field {key}")))?;
            thread.operand_stack.push(value);
        }
        Instruction::Print => {
            let value = pop(&mut thread.operand_stack)?;
            println!("{}", value.to_canonical_string());
            thread.operand_stack.push(value);
        }
    }
    Ok(ControlFlow::Continue)
}

/// Steps a leased thread for up to `budget` instructions, committing the
/// result back through `controller` before returning.
pub async fn run_lease(
    controller: &dyn DataController,
    code: &CodeModel,
    foreign: &ForeignRegistry,
    lease: Lease,
    budget: usize,
) -> Result<StepOutcome, HarkError> {
    let Lease { mut thread, token } = lease;
    let thread_id = thread.id;

    for _ in 0..budget {
        let instr = code
            .instruction_at(thread.ip)
            .cloned()
            .ok_or_else(|| HarkError::MalformedCode(format!("ip {} out of range", thread.ip)))?;
        thread.ip += 1;
        trace!(thread = ?thread_id, ip = thread.ip - 1, ?instr, "stepping");

        match dispatch_one(controller, code, foreign, &mut thread, &instr).await {
            Ok(ControlFlow::Continue) => continue,
            Ok(ControlFlow::Suspend(future_id)) => {
                thread.state = ThreadState::Waiting(future_id);
                return finish_suspend(controller, thread_id, token, thread, future_id).await;
            }
            Ok(ControlFlow::Finished(value)) => {
                return finish_terminal(controller, thread_id, token, thread, Ok(value)).await;
            }
            Err(err) => {
                return finish_terminal(controller, thread_id, token, thread, Err(err)).await;
            }
        }
    }

    controller.commit_step(thread_id, token, thread).await?;
    Ok(StepOutcome::BudgetExceeded)
}

async fn finish_suspend(
    controller: &dyn DataController,
    thread_id: ThreadId,
    token: StepToken,
    thread: Thread,
    future_id: hark_value::FutureId,
) -> Result<StepOutcome, HarkError> {
    controller.block(thread_id, token, thread, future_id).await?;
    Ok(StepOutcome::Suspended)
}

async fn finish_terminal(
    controller: &dyn DataController,
    thread_id: ThreadId,
    token: StepToken,
    mut thread: Thread,
    result: Result<Value, HarkError>,
) -> Result<StepOutcome, HarkError> {
    let terminal_future = thread.terminal_future;
    let (resolved_value, outcome) = match result {
        Ok(value) => {
            thread.state = ThreadState::Finished(value.clone());
            (value.clone(), StepOutcome::Finished(value))
        }
        Err(err) => {
            thread.state = ThreadState::Errored(err.clone());
            (error_marker(&err), StepOutcome::Errored(err))
        }
    };

    let woken = match controller.resolve(terminal_future, resolved_value).await {
        Ok(woken) => woken,
        Err(HarkError::DoubleResolve) => {
            warn!(thread = ?thread_id, "terminal future already resolved, skipping re-resolve");
            Vec::new()
        }
        Err(err) => return Err(err),
    };
    controller.commit_step(thread_id, token, thread).await?;
    if !woken.is_empty() {
        controller.wake(terminal_future, &woken).await?;
    }
    Ok(outcome)
}
