//! Generator driver integration tests.
//!
//! Bodies are built with the public `BodyBuilder` and driven through the
//! public `Generator` API:
//! 1. Basic Iteration
//! 2. Close and Finalization
//! 3. Protocol Violations
//! 4. PEP 479

use prism_core::protocol::IterStep;
use prism_core::{ExceptionObject, ExceptionType, ExceptionTypeId, PrismError, Value};
use prism_generator::{
    BodyBuilder, Generator, GeneratorConfig, GeneratorFunction, GeneratorState, StmtNode, Target,
};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

// =============================================================================
// Test Helper Functions
// =============================================================================

type Log = Rc<RefCell<Vec<String>>>;

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// `log.append(entry)`
fn log_stmt(b: &BodyBuilder, log: &Log, entry: &str) -> StmtNode {
    let log = Rc::clone(log);
    let entry = entry.to_string();
    b.expr(b.native(move |_| {
        log.borrow_mut().push(entry.clone());
        Ok(Value::none())
    }))
}

fn function(b: BodyBuilder, root: StmtNode) -> GeneratorFunction {
    GeneratorFunction::with_config(b.finish(root), GeneratorConfig::for_testing()).unwrap()
}

fn start(b: BodyBuilder, root: StmtNode) -> Rc<Generator> {
    function(b, root).call(&[]).unwrap()
}

fn yielded(step: IterStep) -> Value {
    match step {
        IterStep::Yielded(value) => value,
        IterStep::Returned(value) => panic!("expected a yield, generator returned {value}"),
    }
}

/// `def g(): try: yield 1 finally: log.append('cleanup')`
fn cleanup_generator(log: &Log, config: GeneratorConfig) -> Rc<Generator> {
    let mut b = BodyBuilder::new("g");
    let y = b.yield_value(Some(b.constant(1)));
    let body = b.block(vec![b.expr(y)]);
    let finalbody = log_stmt(&b, log, "cleanup");
    let root = b.try_finally(body, finalbody);
    GeneratorFunction::with_config(b.finish(root), config)
        .unwrap()
        .call(&[])
        .unwrap()
}

// =============================================================================
// 1. Basic Iteration
// =============================================================================

#[test]
fn test_yield_yield_return() {
    let mut b = BodyBuilder::new("g");
    let one = b.yield_value(Some(b.constant(1)));
    let two = b.yield_value(Some(b.constant(2)));
    let root = b.block(vec![b.expr(one), b.expr(two), b.return_value(Some(b.constant(3)))]);
    let g = start(b, root);

    assert_eq!(g.resume().unwrap(), Value::int(1));
    assert_eq!(g.resume().unwrap(), Value::int(2));
    let err = g.resume().unwrap_err();
    let exc = err.exception().unwrap();
    assert!(exc.is_builtin(ExceptionTypeId::StopIteration));
    assert_eq!(exc.stop_value(), Value::int(3));
    assert_eq!(g.state(), GeneratorState::Completed);
}

#[test]
fn test_falling_off_the_end_returns_none() {
    let mut b = BodyBuilder::new("g");
    let y = b.yield_value(None);
    let root = b.block(vec![b.expr(y)]);
    let g = start(b, root);
    assert_eq!(g.next_step().unwrap(), IterStep::Yielded(Value::none()));
    assert_eq!(g.next_step().unwrap(), IterStep::Returned(Value::none()));
}

#[test]
fn test_send_values_into_yields() {
    // def g(): a = yield "first"; b = yield a; return b
    let mut b = BodyBuilder::new("g");
    let a = b.local("a");
    let second = b.local("b");
    let y1 = b.yield_value(Some(b.constant("first")));
    let y2 = b.yield_value(Some(b.load(a)));
    let root = b.block(vec![
        b.assign(Target::Local(a), y1),
        b.assign(Target::Local(second), y2),
        b.return_value(Some(b.load(second))),
    ]);
    let g = start(b, root);

    assert_eq!(yielded(g.send(Value::none()).unwrap()), Value::str("first"));
    assert_eq!(yielded(g.send(Value::int(10)).unwrap()), Value::int(10));
    assert_eq!(g.send(Value::int(20)).unwrap(), IterStep::Returned(Value::int(20)));
}

#[test]
fn test_parameters_bound_per_activation() {
    // def g(n): yield n; yield n
    let mut b = BodyBuilder::new("g");
    let n = b.param("n");
    let y1 = b.yield_value(Some(b.load(n)));
    let y2 = b.yield_value(Some(b.load(n)));
    let root = b.block(vec![b.expr(y1), b.expr(y2)]);
    let f = function(b, root);

    let first = f.call(&[Value::int(1)]).unwrap();
    let second = f.call(&[Value::int(2)]).unwrap();
    assert_eq!(yielded(first.next_step().unwrap()), Value::int(1));
    assert_eq!(yielded(second.next_step().unwrap()), Value::int(2));
    assert_eq!(yielded(second.next_step().unwrap()), Value::int(2));
    assert_eq!(yielded(first.next_step().unwrap()), Value::int(1));
    assert_eq!(first.local("n"), Some(Value::int(1)));
}

#[test]
fn test_throw_caught_by_body() {
    // def g():
    //     try: yield 1
    //     except KeyError: yield "caught"
    let mut b = BodyBuilder::new("g");
    let y1 = b.yield_value(Some(b.constant(1)));
    let y2 = b.yield_value(Some(b.constant("caught")));
    let body = b.expr(y1);
    let handler_body = b.expr(y2);
    let handler = b.except([ExceptionType::from(ExceptionTypeId::KeyError)], None, handler_body);
    let root = b.try_except(body, vec![handler], None);
    let g = start(b, root);

    g.next_step().unwrap();
    let exc = ExceptionObject::builtin(ExceptionTypeId::KeyError, "k");
    assert_eq!(yielded(g.throw(exc).unwrap()), Value::str("caught"));
    assert_eq!(g.next_step().unwrap(), IterStep::Returned(Value::none()));
}

#[test]
fn test_throw_uncaught_marks_errored() {
    let mut b = BodyBuilder::new("g");
    let y = b.yield_value(None);
    let root = b.block(vec![b.expr(y)]);
    let g = start(b, root);
    g.next_step().unwrap();

    let exc = ExceptionObject::builtin(ExceptionTypeId::ValueError, "bad");
    let err = g.throw(exc.clone()).unwrap_err();
    assert!(Rc::ptr_eq(err.exception().unwrap(), &exc));
    assert_eq!(g.state(), GeneratorState::Errored);
    assert_eq!(g.control_footprint(), Some(Default::default()));
}

// =============================================================================
// 2. Close and Finalization
// =============================================================================

#[test]
fn test_close_runs_finally_once() {
    let log = new_log();
    let g = cleanup_generator(&log, GeneratorConfig::for_testing());
    assert_eq!(yielded(g.next_step().unwrap()), Value::int(1));

    g.close().unwrap();
    assert_eq!(*log.borrow(), ["cleanup"]);
    assert_eq!(g.state(), GeneratorState::Completed);
    assert!(matches!(g.next_step(), Err(PrismError::GeneratorExhausted)));
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn test_close_unstarted_skips_body() {
    let log = new_log();
    let g = cleanup_generator(&log, GeneratorConfig::for_testing());
    g.close().unwrap();
    assert!(log.borrow().is_empty());
    assert_eq!(g.state(), GeneratorState::Completed);
}

#[test]
fn test_close_propagates_other_exception() {
    // def g():
    //     try: yield 1
    //     finally: raise ValueError
    let mut b = BodyBuilder::new("g");
    let y = b.yield_value(Some(b.constant(1)));
    let body = b.expr(y);
    let finalbody = b.raise(b.constant(ExceptionType::from(ExceptionTypeId::ValueError)), None);
    let root = b.try_finally(body, finalbody);
    let g = start(b, root);
    g.next_step().unwrap();

    let err = g.close().unwrap_err();
    let exc = err.exception().unwrap();
    assert!(exc.is_builtin(ExceptionTypeId::ValueError));
    assert!(exc.context().unwrap().is_builtin(ExceptionTypeId::GeneratorExit));
    assert_eq!(g.state(), GeneratorState::Errored);
}

#[test]
fn test_close_swallowed_by_return() {
    // def g():
    //     try: yield 1
    //     except GeneratorExit: return "bye"
    let mut b = BodyBuilder::new("g");
    let y = b.yield_value(Some(b.constant(1)));
    let body = b.expr(y);
    let handler_body = b.return_value(Some(b.constant("bye")));
    let handler = b.except(
        [ExceptionType::from(ExceptionTypeId::GeneratorExit)],
        None,
        handler_body,
    );
    let root = b.try_except(body, vec![handler], None);
    let g = start(b, root);
    g.next_step().unwrap();
    g.close().unwrap();
    assert_eq!(g.state(), GeneratorState::Completed);
}

#[test]
fn test_drop_finalizes_suspended_generator() {
    let log = new_log();
    let g = cleanup_generator(&log, GeneratorConfig::for_testing());
    g.next_step().unwrap();
    drop(g);
    assert_eq!(*log.borrow(), ["cleanup"]);
}

#[test]
fn test_drop_without_finalizer_leaves_cleanup_undone() {
    let log = new_log();
    let g = cleanup_generator(&log, GeneratorConfig::without_finalizer());
    g.next_step().unwrap();
    drop(g);
    assert!(log.borrow().is_empty());
}

#[test]
fn test_drop_unstarted_and_finished_generators_run_nothing() {
    let log = new_log();
    drop(cleanup_generator(&log, GeneratorConfig::for_testing()));
    let g = cleanup_generator(&log, GeneratorConfig::for_testing());
    while g.next_step().unwrap().is_yielded() {}
    assert_eq!(log.borrow().len(), 1);
    drop(g);
    assert_eq!(log.borrow().len(), 1);
}

// =============================================================================
// 3. Protocol Violations
// =============================================================================

#[test]
fn test_exhausted_generator_rejects_every_operation() {
    let mut b = BodyBuilder::new("g");
    let root = b.pass();
    let g = start(b, root);
    assert_eq!(g.next_step().unwrap(), IterStep::Returned(Value::none()));

    assert!(matches!(g.next_step(), Err(PrismError::GeneratorExhausted)));
    assert!(matches!(g.send(Value::none()), Err(PrismError::GeneratorExhausted)));
    let exc = ExceptionObject::builtin(ExceptionTypeId::KeyError, "k");
    assert!(matches!(g.throw(exc), Err(PrismError::GeneratorExhausted)));
    assert!(matches!(g.close(), Err(PrismError::GeneratorExhausted)));
    assert!(PrismError::GeneratorExhausted.is_misuse());
}

#[test]
fn test_cant_send_non_none_to_unstarted() {
    let mut b = BodyBuilder::new("g");
    let y = b.yield_value(None);
    let root = b.block(vec![b.expr(y)]);
    let g = start(b, root);
    let err = g.send(Value::int(1)).unwrap_err();
    assert!(matches!(err, PrismError::CantSendNonNone));
    assert!(err.is_misuse());
    assert_eq!(g.state(), GeneratorState::Created);
}

#[test]
fn test_resuming_itself_is_rejected() {
    // def g(): yield me.__next__()
    let me: Rc<RefCell<Weak<Generator>>> = Rc::new(RefCell::new(Weak::new()));
    let handle = Rc::clone(&me);
    let mut b = BodyBuilder::new("g");
    let call_self = b.native(move |_| {
        let generator = handle.borrow().upgrade();
        match generator {
            Some(generator) => generator.next_step().map(|_| Value::none()),
            None => Ok(Value::none()),
        }
    });
    let y = b.yield_value(Some(call_self));
    let root = b.block(vec![b.expr(y)]);
    let g = start(b, root);
    *me.borrow_mut() = Rc::downgrade(&g);

    let err = g.next_step().unwrap_err();
    assert!(matches!(err, PrismError::GeneratorRunning));
    assert_eq!(g.state(), GeneratorState::Errored);
}

#[test]
fn test_running_error_not_caught_by_bare_except() {
    // def g():
    //     try: me.__next__()
    //     except: yield "swallowed"
    let me: Rc<RefCell<Weak<Generator>>> = Rc::new(RefCell::new(Weak::new()));
    let handle = Rc::clone(&me);
    let mut b = BodyBuilder::new("g");
    let call_self = b.native(move |_| match handle.borrow().upgrade() {
        Some(generator) => generator.next_step().map(|_| Value::none()),
        None => Ok(Value::none()),
    });
    let body = b.expr(call_self);
    let y = b.yield_value(Some(b.constant("swallowed")));
    let handler = b.except(Vec::new(), None, b.expr(y));
    let root = b.try_except(body, vec![handler], None);
    let g = start(b, root);
    *me.borrow_mut() = Rc::downgrade(&g);

    assert!(matches!(g.next_step(), Err(PrismError::GeneratorRunning)));
}

#[test]
fn test_yield_during_close() {
    // def g():
    //     try: yield 1
    //     finally: yield 2
    let mut b = BodyBuilder::new("g");
    let y1 = b.yield_value(Some(b.constant(1)));
    let y2 = b.yield_value(Some(b.constant(2)));
    let body = b.expr(y1);
    let finalbody = b.block(vec![b.expr(y2)]);
    let root = b.try_finally(body, finalbody);
    let g = start(b, root);
    g.next_step().unwrap();

    let err = g.close().unwrap_err();
    assert!(matches!(err, PrismError::YieldDuringClose));
    assert_eq!(err.to_string(), "RuntimeError: generator ignored GeneratorExit");
    assert_eq!(g.state(), GeneratorState::Errored);
    assert!(matches!(g.next_step(), Err(PrismError::GeneratorExhausted)));
}

// =============================================================================
// 4. PEP 479
// =============================================================================

#[test]
fn test_stop_iteration_in_body_becomes_runtime_error() {
    // def g(): yield 1; raise StopIteration
    let mut b = BodyBuilder::new("g");
    let y = b.yield_value(Some(b.constant(1)));
    let raise = b.raise(b.constant(ExceptionType::from(ExceptionTypeId::StopIteration)), None);
    let root = b.block(vec![b.expr(y), raise]);
    let g = start(b, root);
    g.next_step().unwrap();

    let err = g.next_step().unwrap_err();
    let exc = err.exception().unwrap();
    assert!(exc.is_builtin(ExceptionTypeId::RuntimeError));
    assert_eq!(exc.message(), "generator raised StopIteration");
    assert!(exc.cause().unwrap().is_builtin(ExceptionTypeId::StopIteration));
    assert_eq!(g.state(), GeneratorState::Errored);
}

#[test]
fn test_stop_iteration_caught_inside_body_is_fine() {
    // def g():
    //     try: raise StopIteration
    //     except StopIteration: yield "ok"
    let mut b = BodyBuilder::new("g");
    let raise = b.raise(b.constant(ExceptionType::from(ExceptionTypeId::StopIteration)), None);
    let y = b.yield_value(Some(b.constant("ok")));
    let handler = b.except(
        [ExceptionType::from(ExceptionTypeId::StopIteration)],
        None,
        b.expr(y),
    );
    let root = b.try_except(raise, vec![handler], None);
    let g = start(b, root);
    assert_eq!(yielded(g.next_step().unwrap()), Value::str("ok"));
    assert_eq!(g.next_step().unwrap(), IterStep::Returned(Value::none()));
}

#[test]
fn test_trace_events_with_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
    let log = new_log();
    let g = cleanup_generator(&log, GeneratorConfig::default());
    g.next_step().unwrap();
    g.close().unwrap();
    assert_eq!(log.borrow().len(), 1);
}
