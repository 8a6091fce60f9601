//! Alignment and size helpers shared by the arena

/// 1 KiB
pub const KIB: usize = 1024;

/// 1 MiB
pub const MIB: usize = 1024 * KIB;

/// Aligns a value up to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use imaging_memory::utils::align_up;
///
/// assert_eq!(align_up(7, 8), 8);
/// assert_eq!(align_up(8, 8), 8);
/// assert_eq!(align_up(9, 8), 16);
/// ```
#[inline]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Checks if a value is aligned to the given alignment
///
/// # Examples
/// ```
/// use imaging_memory::utils::is_aligned;
///
/// assert!(is_aligned(16, 8));
/// assert!(!is_aligned(17, 8));
/// ```
#[inline]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    value & (alignment - 1) == 0
}

/// Calculates padding needed to align a value
///
/// # Examples
/// ```
/// use imaging_memory::utils::padding_needed;
///
/// assert_eq!(padding_needed(7, 8), 1);
/// assert_eq!(padding_needed(8, 8), 0);
/// ```
#[inline]
pub const fn padding_needed(value: usize, alignment: usize) -> usize {
    align_up(value, alignment) - value
}

/// Formats a byte count with a binary unit, e.g. `2.00 MiB`
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes < KIB {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
