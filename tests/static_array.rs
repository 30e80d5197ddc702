//! Scenario 3 (spec.md §8): a fixed-size array of primitives becomes a
//! `StaticArray` pattern, addressable in O(1) via index arithmetic.

use pathex::evaluator::SliceProvider;
use pathex::pattern::PatternKind;

#[test]
fn static_array_of_u8_has_four_entries() {
    let program = "u8 xs[4] @ 0;";
    let mut provider = SliceProvider::new(vec![0x01, 0x02, 0x03, 0x04]);

    let patterns = pathex::run(program, "array.pat", &[], &mut provider).unwrap();

    assert_eq!(patterns.len(), 1);
    let xs = &patterns[0];
    assert_eq!(xs.size, 4);

    let PatternKind::StaticArray { template, entry_count } = &xs.kind else {
        panic!("expected a static array pattern");
    };
    assert_eq!(*entry_count, 4);
    assert_eq!(template.type_name, "u8");

    assert_eq!(template.size, 1);
    // in-bounds lookups resolve to the array itself (O(1) index arithmetic,
    // no per-entry pattern materialized); past the last entry resolves to
    // nothing.
    assert!(xs.get_pattern(3).is_some());
    assert!(xs.get_pattern(4).is_none());
}
