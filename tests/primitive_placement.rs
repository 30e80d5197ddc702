//! Scenario 1 (spec.md §8): a single placed primitive reads its bytes
//! little-endian by default.

use pathex::evaluator::SliceProvider;
use pathex::pattern::PatternKind;

#[test]
fn places_a_u32_and_reads_it_little_endian() {
    let program = "u32 x @ 0x00;";
    let mut provider = SliceProvider::new(vec![0x01, 0x02, 0x03, 0x04]);

    let patterns = pathex::run(program, "primitive.pat", &[], &mut provider).unwrap();

    assert_eq!(patterns.len(), 1);
    let x = &patterns[0];
    assert_eq!(x.variable_name, "x");
    assert_eq!(x.offset, 0);
    assert_eq!(x.size, 4);
    assert_eq!(x.kind, PatternKind::Unsigned(0x04030201));
}
