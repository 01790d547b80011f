// End-to-end tests: lex, parse, register, execute.

use std::time::{Duration, Instant};

use retrovm::config::RuntimeConfig;
use retrovm::interpreter::env::ExecutionEnvironment;
use retrovm::interpreter::errors::RuntimeFault;
use retrovm::interpreter::eval::Evaluator;
use retrovm::interpreter::loops::LoopExecution;
use retrovm::interpreter::stdlib;
use retrovm::memory::value::Value;
use retrovm::parser::ast::{AstNode, BinOp, UNBOUNDED_ITERATIONS};
use retrovm::parser::lexer::tokenize;
use retrovm::parser::parser::Parser;
use retrovm::types::TypeSystem;
use retrovm::verifier::{Finding, Verifier};

fn quiet_env() -> ExecutionEnvironment {
    // Threshold high enough that the background collector stays idle.
    ExecutionEnvironment::new(RuntimeConfig {
        gc_threshold: 100_000,
        ..RuntimeConfig::default()
    })
}

#[test]
fn parsed_class_method_executes_against_globals() {
    let source = r#"
        class Calc {
            int scale;
            int scaled() { base * scale_factor }
        }
    "#;

    let tokens = tokenize(source).expect("lexing failed");
    let program = Parser::new(tokens).parse_program().expect("parsing failed");
    assert_eq!(program.classes.len(), 1);

    let env = quiet_env();
    env.set_global_variable("base", Value::Int(6));
    env.set_global_variable("scale_factor", Value::Int(7));

    for method in program.classes[0].methods() {
        env.register_method(method.clone());
    }
    env.register_class(program.classes[0].clone());

    assert_eq!(env.execute_method("scaled", &[]), Ok(Value::Int(42)));
    assert_eq!(env.method_execution_times("scaled").len(), 1);
}

#[test]
fn loose_annotated_expression_evaluates_within_deadline() {
    let tokens = tokenize("@Deadline(ms=5000) (2 + 3) * 4").expect("lexing failed");
    let node = Parser::new(tokens).parse_annotated().expect("parsing failed");

    let env = quiet_env();
    let eval = Evaluator::new(&env);
    assert_eq!(eval.eval(&node), Ok(Value::Int(20)));
}

#[test]
fn loop_capped_at_five_iterations_yields_history_of_five() {
    let env = quiet_env();
    env.set_global_variable("running", Value::Bool(true));
    env.set_global_variable("reading", Value::Int(3));

    let node = AstNode::Loop {
        condition: Box::new(AstNode::Variable("running".to_string())),
        body: Box::new(AstNode::Binary {
            op: BinOp::Mul,
            left: Box::new(AstNode::Variable("reading".to_string())),
            right: Box::new(AstNode::Number(2)),
        }),
        max_iterations: 5,
        timeout_ms: 10_000,
    };

    let eval = Evaluator::new(&env);
    let result = eval.eval(&node).expect("loop failed");
    assert_eq!(result, Value::List(vec![Value::Int(6); 5]));
}

#[test]
fn rolling_back_to_an_iteration_keeps_entries_through_it() {
    let env = quiet_env();
    env.set_global_variable("running", Value::Bool(true));
    let eval = Evaluator::new(&env);

    let mut execution = LoopExecution::new(5, 10_000);
    execution
        .run(
            &eval,
            &AstNode::Variable("running".to_string()),
            &AstNode::Number(1),
        )
        .expect("loop failed");
    assert_eq!(execution.history().len(), 5);

    // Iterations 0 through 2 survive a rollback to iteration 2.
    execution.rollback_to_iteration(2);
    assert_eq!(execution.history().len(), 3);
}

#[test]
fn tight_deadline_around_long_loop_fails() {
    let env = quiet_env();
    env.set_global_variable("running", Value::Bool(true));

    // Enough iterations that the wall clock moves past a 1ms budget.
    let node = AstNode::Deadline {
        ms: 1,
        body: Box::new(AstNode::Loop {
            condition: Box::new(AstNode::Variable("running".to_string())),
            body: Box::new(AstNode::Number(1)),
            max_iterations: 100_000,
            timeout_ms: 60_000,
        }),
    };

    let eval = Evaluator::new(&env);
    match eval.eval(&node) {
        Err(RuntimeFault::DeadlineExceeded { limit_ms: 1, .. }) => {}
        other => panic!("expected deadline fault, got {:?}", other),
    }
}

#[test]
fn collection_frees_exactly_the_unreachable_objects() {
    let env = quiet_env();

    let kept = env.allocate_object(Value::Str("config".to_string()));
    env.set_global_variable("config", Value::Ref(kept));
    for i in 0..25 {
        env.allocate_object(Value::Int(i));
    }
    assert_eq!(env.heap_size(), 26);

    let freed = env.collect_now();
    assert_eq!(freed, 25);
    assert_eq!(env.heap_size(), 1);
    assert_eq!(env.get_object(kept), Some(Value::Str("config".to_string())));
}

#[test]
fn multiple_inheritance_is_flagged_but_still_executes() {
    let env = quiet_env();
    let types = TypeSystem::new(1024);

    let tokens = tokenize(
        r#"
        class Gadget extends Device {
            int ping() { 1 + 1 }
        }
    "#,
    )
    .expect("lexing failed");
    let mut program = Parser::new(tokens).parse_program().expect("parsing failed");

    // A second superclass assignment grows the chain past two entries.
    program.classes[0].set_superclass("Peripheral");

    let mut verifier = Verifier::default();
    verifier.verify_class(&program.classes[0], &types);
    assert!(verifier
        .findings()
        .iter()
        .any(|f| matches!(f, Finding::MultipleInheritance { chain_len: 3, .. })));

    // Findings are advisory; the program still runs.
    for method in program.classes[0].methods() {
        env.register_method(method.clone());
    }
    assert_eq!(env.execute_method("ping", &[]), Ok(Value::Int(2)));
}

#[test]
fn stdlib_sensor_to_actuator_pipeline() {
    let env = quiet_env();
    let mut types = TypeSystem::new(1024);
    stdlib::install(&env, &mut types).expect("stdlib install failed");

    let reading = env
        .execute_method("readSensor", &[Value::Str("temp0".to_string())])
        .expect("read failed");
    let clamped = env
        .execute_method("min", &[reading.clone(), Value::Int(50)])
        .expect("min failed");

    env.execute_method(
        "setActuator",
        &[Value::Str("fan0".to_string()), clamped.clone()],
    )
    .expect("set failed");

    assert_eq!(env.get_global_variable("actuator:fan0"), Some(clamped));
}

#[test]
fn device_class_methods_dispatch_through_their_class() {
    let env = quiet_env();
    let mut types = TypeSystem::new(1024);
    stdlib::install(&env, &mut types).expect("stdlib install failed");

    assert_eq!(
        env.execute_class_method("Device", "getStatus", &[]),
        Ok(Value::Int(0))
    );
    assert_eq!(env.method_execution_times("Device.getStatus").len(), 1);

    match env.execute_class_method("Thermostat", "read", &[]) {
        Err(RuntimeFault::ClassNotFound { .. }) => {}
        other => panic!("expected class-not-found, got {:?}", other),
    }
}

#[test]
fn memory_gate_trips_under_pressure_and_recovers_after_collection() {
    let env = ExecutionEnvironment::new(RuntimeConfig {
        max_heap_size: 20,
        gc_threshold: 100_000,
        ..RuntimeConfig::default()
    });

    for i in 0..19 {
        env.allocate_object(Value::Int(i));
    }
    assert!(matches!(
        env.verify_memory_usage(),
        Err(RuntimeFault::MemoryBudgetExceeded { used: 19, budget: 20 })
    ));

    // Nothing roots these objects, so a cycle clears the pressure.
    env.collect_now();
    assert!(env.verify_memory_usage().is_ok());
}

#[test]
fn background_collector_sweeps_once_occupancy_passes_threshold() {
    let env = ExecutionEnvironment::new(RuntimeConfig {
        gc_threshold: 100,
        gc_period: Duration::from_millis(10),
        ..RuntimeConfig::default()
    });

    let kept = env.allocate_object(Value::Str("root".to_string()));
    env.set_global_variable("root", Value::Ref(kept));
    for i in 0..1000 {
        env.allocate_object(Value::Int(i));
    }

    // The collector wakes every 10ms; give it a bounded window.
    let deadline = Instant::now() + Duration::from_secs(5);
    while env.heap_size() > 1 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(env.heap_size(), 1);
    assert_eq!(env.get_object(kept), Some(Value::Str("root".to_string())));
}

#[test]
fn off_heap_budget_comes_from_the_runtime_config() {
    let config = RuntimeConfig {
        max_off_heap_size: 256,
        ..RuntimeConfig::default()
    };
    let mut types = TypeSystem::from_config(&config);

    let handle = types.allocate_off_heap(200).expect("alloc failed");
    assert!(types.allocate_off_heap(100).is_err());
    types.free_off_heap(handle).expect("free failed");
    assert_eq!(types.off_heap_used(), 0);
}

#[test]
fn unbounded_loop_sentinel_relies_on_timeout() {
    let env = quiet_env();
    env.set_global_variable("running", Value::Bool(true));

    let node = AstNode::Loop {
        condition: Box::new(AstNode::Variable("running".to_string())),
        body: Box::new(AstNode::Number(1)),
        max_iterations: UNBOUNDED_ITERATIONS,
        timeout_ms: 20,
    };

    let eval = Evaluator::new(&env);
    match eval.eval(&node) {
        Err(RuntimeFault::LoopTimeout { timeout_ms: 20 }) => {}
        other => panic!("expected loop timeout, got {:?}", other),
    }
}
