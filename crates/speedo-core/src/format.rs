//! Text rendering of speed readings.

pub const SPEED_UNIT: &str = "mph";

/// Format a speed with exactly one decimal digit.
///
/// Exact ties (`x.x5` with an exact binary value, like `30.25`) round half
/// away from zero; everything else rounds to the nearest tenth of the value
/// actually held. Negative zero and non-finite input render as `0.0`.
pub fn format_speed(speed: f64) -> String {
    if !speed.is_finite() {
        return "0.0".to_string();
    }

    let text = if is_tenths_tie(speed) {
        format!("{:.1}", (speed * 10.0).round() / 10.0)
    } else {
        format!("{speed:.1}")
    };

    match text.strip_prefix('-') {
        Some(magnitude) if magnitude.bytes().all(|b| b == b'0' || b == b'.') => {
            magnitude.to_string()
        }
        _ => text,
    }
}

// Only multiples of 0.25 can sit exactly halfway between two tenths.
fn is_tenths_tie(speed: f64) -> bool {
    let quarters = speed * 4.0;
    quarters.fract() == 0.0 && quarters % 2.0 != 0.0
}

/// The exact string shown on the readout, e.g. `"42.7 mph"`.
pub fn display_text(speed: f64) -> String {
    format!("{} {SPEED_UNIT}", format_speed(speed))
}
