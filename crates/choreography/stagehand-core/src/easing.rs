//! Easing curves mapping linear progress in [0,1] to shaped progress.
//!
//! - linear, easeIn (quadratic), easeOut (quadratic), easeInOut (cubic)
//! - arc: parabolic bump for projectile Y offset, paired with linear X progress

/// A pure easing curve.
pub type EasingFn = fn(f64) -> f64;

/// Identity.
#[inline]
pub fn linear(t: f64) -> f64 {
    t
}

/// Quadratic acceleration: t^2.
#[inline]
pub fn ease_in(t: f64) -> f64 {
    t * t
}

/// Quadratic deceleration: 1 - (1 - t)^2.
#[inline]
pub fn ease_out(t: f64) -> f64 {
    let inv = 1.0 - t;
    1.0 - inv * inv
}

/// Cubic in the first half, mirrored cubic in the second; passes through (0.5, 0.5).
#[inline]
pub fn ease_in_out(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - u * u * u / 2.0
    }
}

/// Parabolic bump 4t(1-t): 0 at both ends, 1 at the midpoint.
#[inline]
pub fn arc(t: f64) -> f64 {
    4.0 * t * (1.0 - t)
}

/// Built-in curves by canonical name.
pub const BUILTIN: &[(&str, EasingFn)] = &[
    ("linear", linear),
    ("easeIn", ease_in),
    ("easeOut", ease_out),
    ("easeInOut", ease_in_out),
    ("arc", arc),
];

/// Look up a curve by name. Accepts the canonical camelCase names and their
/// snake_case spellings. Unknown names yield `None`; the caller picks a fallback.
pub fn get_easing(name: &str) -> Option<EasingFn> {
    let canonical = canonical_name(name);
    BUILTIN
        .iter()
        .find_map(|(n, f)| if *n == canonical { Some(*f) } else { None })
}

fn canonical_name(name: &str) -> &str {
    match name {
        "ease_in" => "easeIn",
        "ease_out" => "easeOut",
        "ease_in_out" => "easeInOut",
        other => other,
    }
}

/// Whether `name` is a known curve that is monotonic on [0,1] and can drive
/// step progress. `arc` returns to 0 and is only meaningful as an offset.
pub fn is_progress_easing(name: &str) -> bool {
    get_easing(name).is_some() && canonical_name(name) != "arc"
}

/// Pick the progress curve for a step: `name` if usable, else `fallback`,
/// else `linear`. Returns the name actually applied alongside the curve.
pub fn resolve_easing<'a>(name: Option<&'a str>, fallback: &'a str) -> (&'a str, EasingFn) {
    if let Some(n) = name {
        match get_easing(n) {
            Some(f) if is_progress_easing(n) => return (n, f),
            Some(_) => log::warn!("easing '{n}' is not monotonic, using '{fallback}' for progress"),
            None => log::warn!("unknown easing '{n}', falling back to '{fallback}'"),
        }
    }
    match get_easing(fallback) {
        Some(f) if is_progress_easing(fallback) => (fallback, f),
        _ => ("linear", linear as EasingFn),
    }
}
