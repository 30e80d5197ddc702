//! RGBA pattern colors and the fallback palette used when no `color(...)`
//! attribute is present (SPEC_FULL §C "Pattern color defaults").

/// A small rotating palette, one color per hash bucket, so sibling struct
/// members render visibly distinct even without an explicit `color(...)`.
const DEFAULT_PALETTE: [u32; 8] = [
    0xB4_57_50_FF,
    0x50_84_B4_FF,
    0x50_B4_6A_FF,
    0xB4_A0_50_FF,
    0x8A_50_B4_FF,
    0x50_B4_AC_FF,
    0xB4_50_9E_FF,
    0x7A_B4_50_FF,
];

/// Pick a default color for a pattern named `type_name`, stable across runs.
pub fn default_color_for(type_name: &str) -> u32 {
    let hash = type_name
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    DEFAULT_PALETTE[(hash as usize) % DEFAULT_PALETTE.len()]
}

/// Parse a `"RRGGBB"` attribute value into an opaque RGBA color.
pub fn parse_rgb_hex(text: &str) -> Option<u32> {
    let text = text.trim_start_matches('#');
    if text.len() != 6 {
        return None;
    }
    let rgb = u32::from_str_radix(text, 16).ok()?;
    Some((rgb << 8) | 0xFF)
}
