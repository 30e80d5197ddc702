//! Scenario 5 (spec.md §8): bitfield entries are packed MSB-first within
//! their backing bytes.

use pathex::evaluator::SliceProvider;
use pathex::pattern::PatternKind;

#[test]
fn bitfield_fields_pack_msb_first() {
    let program = "bitfield B { hi : 4; lo : 4; }; B b @ 0;";
    let mut provider = SliceProvider::new(vec![0xAB]);

    let patterns = pathex::run(program, "bitfield.pat", &[], &mut provider).unwrap();

    assert_eq!(patterns.len(), 1);
    let b = &patterns[0];
    assert_eq!(b.offset, 0);
    assert_eq!(b.size, 1);

    let PatternKind::Bitfield { fields } = &b.kind else {
        panic!("expected a bitfield pattern");
    };
    assert_eq!(fields.len(), 2);

    let hi = &fields[0];
    assert_eq!(hi.variable_name, "hi");
    let PatternKind::BitfieldField { value: hi_value, .. } = &hi.kind else {
        panic!("expected a bitfield field pattern");
    };
    assert_eq!(*hi_value, 0xA);

    let lo = &fields[1];
    assert_eq!(lo.variable_name, "lo");
    let PatternKind::BitfieldField { value: lo_value, .. } = &lo.kind else {
        panic!("expected a bitfield field pattern");
    };
    assert_eq!(*lo_value, 0xB);
}
