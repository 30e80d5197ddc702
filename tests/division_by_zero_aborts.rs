//! Scenario 6 (spec.md §8): a division by zero aborts the whole run with
//! no partial tree published.

use pathex::evaluator::SliceProvider;
use pathex::evaluator::EvalErrorKind;
use pathex::Error;

#[test]
fn division_by_zero_aborts_with_no_tree() {
    let program = "u8 x @ 0; u8 y = x / 0;";
    let mut provider = SliceProvider::new(vec![0x05]);

    let err = pathex::run(program, "divzero.pat", &[], &mut provider)
        .expect_err("division by zero must abort the run");

    let Error::Eval(eval_err) = err else {
        panic!("expected an evaluator error, got {err:?}");
    };
    assert_eq!(eval_err.kind, EvalErrorKind::DivisionByZero);
}
