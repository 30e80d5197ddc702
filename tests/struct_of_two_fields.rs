//! Scenario 2 (spec.md §8): struct members get contiguous, monotonically
//! increasing offsets.

use pathex::evaluator::SliceProvider;
use pathex::pattern::PatternKind;

#[test]
fn struct_members_are_placed_contiguously() {
    let program = "struct P { u16 a; u16 b; }; P p @ 0;";
    let mut provider = SliceProvider::new(vec![0xAA, 0xBB, 0xCC, 0xDD]);

    let patterns = pathex::run(program, "struct.pat", &[], &mut provider).unwrap();

    assert_eq!(patterns.len(), 1);
    let p = &patterns[0];
    assert_eq!(p.offset, 0);
    assert_eq!(p.size, 4);

    let PatternKind::Struct { members, .. } = &p.kind else {
        panic!("expected a struct pattern");
    };
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].variable_name, "a");
    assert_eq!(members[0].offset, 0);
    assert_eq!(members[0].kind, PatternKind::Unsigned(0xBBAA));
    assert_eq!(members[1].variable_name, "b");
    assert_eq!(members[1].offset, 2);
    assert_eq!(members[1].kind, PatternKind::Unsigned(0xDDCC));
}
