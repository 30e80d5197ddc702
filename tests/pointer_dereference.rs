//! Scenario 4 (spec.md §8): a pointer reads its storage bytes for the
//! target address, then instantiates its pointee there.

use pathex::evaluator::SliceProvider;
use pathex::pattern::PatternKind;

#[test]
fn pointer_dereferences_through_its_storage_address() {
    let program = "u16 v; u16 *p : u8 @ 0;";
    let mut provider = SliceProvider::new(vec![0x02, 0xAA, 0xBB]);

    let patterns = pathex::run(program, "pointer.pat", &[], &mut provider).unwrap();

    let p = patterns
        .iter()
        .find(|pat| pat.variable_name == "p")
        .expect("p was placed");

    let PatternKind::Pointer {
        pointee,
        pointed_at_address,
        ..
    } = &p.kind
    else {
        panic!("expected a pointer pattern");
    };

    assert_eq!(*pointed_at_address, 2);
    assert_eq!(pointee.offset, 2);
    assert_eq!(pointee.kind, PatternKind::Unsigned(0xBBAA));
}
