use crate::types::UNIT_SCALE;

/// Convert a micro-unit amount to display units without rounding.
pub fn micro_to_whole(micro: f64) -> f64 {
    micro / UNIT_SCALE as f64
}

/// Format a micro-unit amount in display units with full micro precision.
pub fn format_micro(micro: u64) -> String {
    format!("{}.{:06}", micro / UNIT_SCALE, micro % UNIT_SCALE)
}

/// Format a fractional micro-unit amount (e.g. projected rewards) in display
/// units. Values below one micro-unit keep their significant digits.
pub fn format_micro_f64(micro: f64) -> String {
    let whole = micro_to_whole(micro);
    if whole != 0.0 && whole.abs() < 1e-6 {
        format!("{whole:.6e}")
    } else {
        format!("{whole:.6}")
    }
}
