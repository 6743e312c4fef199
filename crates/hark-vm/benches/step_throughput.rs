//! Benchmarks step throughput under a varying number of concurrent
//! async forks, grounding the "how fast does this interpret" ambient
//! concern (not a correctness property, just a sanity check that the
//! single-machine scheduler scales with worker count).

use std::collections::BTreeMap;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use hark_controller::{DataController, InMemoryController};
use hark_foreign::ForeignRegistry;
use hark_value::{CodeModel, FunctionMeta, Instruction as I, Symbol, Value};
use hark_vm::{run_to_completion, RuntimeConfig};

/// Builds `fn leaf(x){x+1} fn main(){ await leaf(0) + ... (fan_out times) }`,
/// i.e. `fan_out` concurrent forks each joined back into one sum.
fn fan_out_program(fan_out: usize) -> CodeModel {
    let mut functions = BTreeMap::new();
    functions.insert(
        Symbol::new("leaf"),
        FunctionMeta { entry: 0, arity: 1, params: vec![Symbol::new("x")], free_vars: vec![] },
    );
    let mut instructions =
        vec![I::PushV(Symbol::new("x")), I::PushL(Value::Integer(1)), I::Add, I::Return];

    let main_entry = instructions.len();
    functions.insert(
        Symbol::new("main"),
        FunctionMeta { entry: main_entry, arity: 0, params: vec![], free_vars: vec![] },
    );

    for i in 0..fan_out {
        instructions.push(I::PushV(Symbol::new("leaf")));
        instructions.push(I::PushL(Value::Integer(i as i64)));
        instructions.push(I::ACall(1));
        instructions.push(I::Bind(Symbol::new(format!("p{i}"))));
    }
    instructions.push(I::PushV(Symbol::new("p0")));
    instructions.push(I::Wait);
    for i in 1..fan_out {
        instructions.push(I::PushV(Symbol::new(&format!("p{i}"))));
        instructions.push(I::Wait);
        instructions.push(I::Add);
    }
    instructions.push(I::Return);

    CodeModel::new(instructions, functions)
}

fn bench_fan_out(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("fan_out_to_completion");
    for fan_out in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(fan_out), &fan_out, |b, &fan_out| {
            b.iter(|| {
                rt.block_on(async {
                    let controller: Arc<dyn DataController> = Arc::new(InMemoryController::new());
                    controller.seed(fan_out_program(fan_out)).await;
                    let (root, _future) =
                        controller.new_thread(Symbol::new("main"), BTreeMap::new()).await.unwrap();
                    let foreign = Arc::new(ForeignRegistry::new());
                    run_to_completion(controller, foreign, RuntimeConfig::default(), root).await.unwrap()
                })
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fan_out);
criterion_main!(benches);
