//! The Hark instruction set, thread executor and scheduler (spec §4.3,
//! §4.5, §4.6).

mod executor;
mod scheduler;

pub use executor::{run_lease, StepOutcome};
pub use hark_value::{as_error_marker, error_marker};
pub use scheduler::{run_to_completion, run_to_completion_distributed, RuntimeConfig};

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use hark_controller::{DataController, InMemoryController};
    use hark_foreign::ForeignRegistry;
    use hark_value::{CodeModel, FunctionMeta, Instruction as I, Symbol, ThreadState, Value};

    use super::*;

    fn seeded(instructions: Vec<I>, arity: u8, params: &[&str]) -> CodeModel {
        let mut functions = BTreeMap::new();
        functions.insert(
            Symbol::new("main"),
            FunctionMeta {
                entry: 0,
                arity,
                params: params.iter().map(|p| Symbol::new(*p)).collect(),
                free_vars: vec![],
            },
        );
        CodeModel::new(instructions, functions)
    }

    async fn run_main(code: CodeModel, args: Vec<Value>) -> Result<Value, hark_value::HarkError> {
        let controller: Arc<dyn DataController> = Arc::new(InMemoryController::new());
        controller.seed(code).await;
        let mut locals = BTreeMap::new();
        let meta_params: Vec<Symbol> =
            controller.get_code().await.unwrap().function(&Symbol::new("main")).unwrap().params.clone();
        for (p, a) in meta_params.into_iter().zip(args) {
            locals.insert(p, a);
        }
        let (thread_id, _future) = controller.new_thread(Symbol::new("main"), locals).await.unwrap();
        let foreign = Arc::new(ForeignRegistry::new());
        run_to_completion(controller, foreign, RuntimeConfig::default(), thread_id).await
    }

    #[tokio::test]
    async fn one_plus_two() {
        let code = seeded(
            vec![I::PushL(Value::Integer(1)), I::PushL(Value::Integer(2)), I::Add, I::Return],
            0,
            &[],
        );
        assert_eq!(run_main(code, vec![]).await.unwrap(), Value::Integer(3));
    }

    #[tokio::test]
    async fn let_binding_plus_one() {
        let code = seeded(
            vec![
                I::PushL(Value::Integer(5)),
                I::Bind(Symbol::new("x")),
                I::PushV(Symbol::new("x")),
                I::PushL(Value::Integer(1)),
                I::Add,
                I::Return,
            ],
            0,
            &[],
        );
        assert_eq!(run_main(code, vec![]).await.unwrap(), Value::Integer(6));
    }

    #[tokio::test]
    async fn call_identity_function() {
        // main() = a(41); a(x) = x + 1
        let mut functions = BTreeMap::new();
        functions.insert(
            Symbol::new("main"),
            FunctionMeta { entry: 0, arity: 0, params: vec![], free_vars: vec![] },
        );
        functions.insert(
            Symbol::new("a"),
            FunctionMeta { entry: 4, arity: 1, params: vec![Symbol::new("x")], free_vars: vec![] },
        );
        let code = CodeModel::new(
            vec![
                // main:
                I::PushV(Symbol::new("a")),
                I::PushL(Value::Integer(41)),
                I::Call(1),
                I::Return,
                // a:
                I::PushV(Symbol::new("x")),
                I::PushL(Value::Integer(1)),
                I::Add,
                I::Return,
            ],
            functions,
        );
        assert_eq!(run_main(code, vec![]).await.unwrap(), Value::Integer(42));
    }

    #[tokio::test]
    async fn async_call_then_await_returns_producer_value() {
        // main() = await b(); b() = 5050
        let mut functions = BTreeMap::new();
        functions.insert(
            Symbol::new("main"),
            FunctionMeta { entry: 0, arity: 0, params: vec![], free_vars: vec![] },
        );
        functions.insert(
            Symbol::new("b"),
            FunctionMeta { entry: 4, arity: 0, params: vec![], free_vars: vec![] },
        );
        let code = CodeModel::new(
            vec![
                // main:
                I::PushV(Symbol::new("b")),
                I::ACall(0),
                I::Wait,
                I::Return,
                // b:
                I::PushL(Value::Integer(5050)),
                I::Return,
            ],
            functions,
        );
        assert_eq!(run_main(code, vec![]).await.unwrap(), Value::Integer(5050));
    }

    #[tokio::test]
    async fn division_by_zero_errors_the_thread() {
        let code = seeded(
            vec![I::PushL(Value::Integer(1)), I::PushL(Value::Integer(0)), I::Div, I::Return],
            0,
            &[],
        );
        let err = run_main(code, vec![]).await.unwrap_err();
        assert_eq!(err, hark_value::HarkError::DivisionByZero);
    }

    #[tokio::test]
    async fn calling_a_non_function_value_is_type_mismatch() {
        let code = seeded(vec![I::PushL(Value::Integer(1)), I::Call(0), I::Return], 0, &[]);
        let err = run_main(code, vec![]).await.unwrap_err();
        assert!(matches!(err, hark_value::HarkError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn await_on_an_already_resolved_future_completes_without_suspending() {
        let controller: Arc<dyn DataController> = Arc::new(InMemoryController::new());
        let code = seeded(vec![I::PushL(Value::Integer(1)), I::Return], 0, &[]);
        controller.seed(code).await;
        let (_producer_id, future_id) =
            controller.new_thread(Symbol::new("main"), BTreeMap::new()).await.unwrap();
        controller.resolve(future_id, Value::Integer(7)).await.unwrap();

        // A second thread that immediately awaits the already-resolved future.
        let mut functions = BTreeMap::new();
        functions.insert(
            Symbol::new("main"),
            FunctionMeta { entry: 0, arity: 0, params: vec![], free_vars: vec![] },
        );
        let awaiter_code = CodeModel::new(vec![I::Wait, I::Return], functions);
        controller.seed(awaiter_code).await;
        let (thread_id, _) = controller.new_thread(Symbol::new("main"), BTreeMap::new()).await.unwrap();
        let mut thread = controller.read_thread(thread_id).await.unwrap();
        thread.operand_stack.push(Value::FutureRef(future_id));
        let lease = controller.lease_ready().await.unwrap();
        let foreign = ForeignRegistry::new();
        let code = controller.get_code().await.unwrap();
        let outcome = run_lease(
            controller.as_ref(),
            &code,
            &foreign,
            hark_controller::Lease { thread, token: lease.token },
            100,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, StepOutcome::Finished(Value::Integer(7))));
    }

    #[tokio::test]
    async fn record_and_list_roundtrip() {
        let code = seeded(
            vec![
                I::PushL(Value::Integer(1)),
                I::PushL(Value::Symbol(Symbol::new("x"))),
                I::RecordNew(1),
                I::PushL(Value::Symbol(Symbol::new("x"))),
                I::RecordGet,
                I::Return,
            ],
            0,
            &[],
        );
        assert_eq!(run_main(code, vec![]).await.unwrap(), Value::Integer(1));
    }

    #[tokio::test]
    async fn thread_state_matches_terminal_value_after_commit() {
        let controller: Arc<dyn DataController> = Arc::new(InMemoryController::new());
        let code = seeded(vec![I::PushL(Value::Integer(9)), I::Return], 0, &[]);
        controller.seed(code).await;
        let (thread_id, _) = controller.new_thread(Symbol::new("main"), BTreeMap::new()).await.unwrap();
        let foreign = Arc::new(ForeignRegistry::new());
        run_to_completion(controller.clone(), foreign, RuntimeConfig::default(), thread_id).await.unwrap();
        let thread = controller.read_thread(thread_id).await.unwrap();
        assert_eq!(thread.state, ThreadState::Finished(Value::Integer(9)));
    }
}
