//! Whole-degree trigonometry backed by a compiled table.
//!
//! Everything that feeds simulation state goes through these functions
//! instead of the platform `sin`/`cos`/`atan2`, so peers running the same
//! inputs agree bit for bit. Angles are integer degrees.

/// Sine of 0..=90 degrees.
const SIN_TABLE: [f64; 91] = [
    0.0, 0.01745240643728351, 0.03489949670250097, 0.052335956242943835,
    0.0697564737441253, 0.08715574274765818, 0.10452846326765347, 0.12186934340514748,
    0.13917310096006544, 0.15643446504023087, 0.17364817766693036, 0.1908089953765448,
    0.20791169081775934, 0.224951054343865, 0.24192189559966773, 0.25881904510252074,
    0.27563735581699916, 0.2923717047227367, 0.30901699437494745, 0.32556815445715664,
    0.3420201433256687, 0.35836794954530027, 0.374606593415912, 0.39073112848927377,
    0.4067366430758002, 0.42261826174069944, 0.4383711467890774, 0.4539904997395468,
    0.46947156278589075, 0.484809620246337, 0.5, 0.5150380749100542,
    0.5299192642332049, 0.5446390350150271, 0.5591929034707468, 0.573576436351046,
    0.5877852522924731, 0.6018150231520483, 0.6156614753256583, 0.6293203910498375,
    0.6427876096865394, 0.6560590289905073, 0.6691306063588582, 0.6819983600624985,
    0.6946583704589973, 0.7071067811865476, 0.7193398003386512, 0.7313537016191705,
    0.7431448254773942, 0.754709580222772, 0.766044443118978, 0.7771459614569709,
    0.7880107536067219, 0.7986355100472928, 0.8090169943749475, 0.8191520442889918,
    0.8290375725550417, 0.838670567945424, 0.848048096156426, 0.8571673007021123,
    0.8660254037844386, 0.8746197071393959, 0.882947592858927, 0.8910065241883679,
    0.898794046299167, 0.9063077870366499, 0.9135454576426009, 0.9205048534524404,
    0.9271838545667874, 0.9335804264972017, 0.9396926207859084, 0.9455185755993168,
    0.9510565162951535, 0.9563047559630354, 0.9612616959383189, 0.9659258262890683,
    0.9702957262759965, 0.9743700647852352, 0.9781476007338057, 0.981627183447664,
    0.984807753012208, 0.9876883405951378, 0.9902680687415704, 0.992546151641322,
    0.9945218953682733, 0.9961946980917455, 0.9975640502598242, 0.9986295347545738,
    0.9993908270190958, 0.9998476951563913, 1.0,
];

/// Sine of an angle in whole degrees.
#[must_use]
pub fn sin_deg(deg: i32) -> f64 {
    let d = deg.rem_euclid(360) as usize;
    match d {
        0..=90 => SIN_TABLE[d],
        91..=180 => SIN_TABLE[180 - d],
        181..=270 => -SIN_TABLE[d - 180],
        _ => -SIN_TABLE[360 - d],
    }
}

/// Cosine of an angle in whole degrees.
#[must_use]
pub fn cos_deg(deg: i32) -> f64 {
    sin_deg(deg.rem_euclid(360) + 90)
}

/// Tangent of an angle in whole degrees. Returns infinity at +-90.
#[must_use]
pub fn tan_deg(deg: i32) -> f64 {
    sin_deg(deg) / cos_deg(deg)
}

/// Largest whole degree `d` in `0..=90` with `tan(d) <= y / x`, for `x, y >= 0`.
fn first_quadrant(y: f64, x: f64) -> i32 {
    if x == 0.0 {
        return 90;
    }
    let (mut lo, mut hi) = (0usize, 90usize);
    while lo < hi {
        let mid = (lo + hi + 1) / 2;
        if y * SIN_TABLE[90 - mid] >= x * SIN_TABLE[mid] {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo as i32
}

/// Angle of the vector `(x, y)` in whole degrees, normalised to `0..360`.
///
/// Follows the `atan2(y, x)` argument order. The zero vector maps to 0.
#[must_use]
pub fn atan2_deg(y: f64, x: f64) -> i32 {
    if x == 0.0 && y == 0.0 {
        return 0;
    }
    let a = first_quadrant(y.abs(), x.abs());
    let deg = match (x >= 0.0, y >= 0.0) {
        (true, true) => a,
        (false, true) => 180 - a,
        (false, false) => 180 + a,
        (true, false) => 360 - a,
    };
    deg.rem_euclid(360)
}

/// Same as [`atan2_deg`] but folded into `-179..=180`.
#[must_use]
pub fn atan2_deg_signed(y: f64, x: f64) -> i32 {
    let deg = atan2_deg(y, x);
    if deg > 180 {
        deg - 360
    } else {
        deg
    }
}

/// Compass bearing of a ground-plane offset, in `0..360`.
///
/// Zero points along +y and the angle grows towards +x.
#[must_use]
pub fn bearing_deg(dx: i32, dy: i32) -> i32 {
    atan2_deg(f64::from(dx), f64::from(dy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_table_endpoints() {
        assert_eq!(sin_deg(0), 0.0);
        assert_eq!(sin_deg(90), 1.0);
        assert_eq!(sin_deg(30), 0.5);
        assert_eq!(cos_deg(60), 0.5);
        assert_eq!(sin_deg(270), -1.0);
        assert_eq!(sin_deg(-90), -1.0);
        assert_eq!(cos_deg(180), -1.0);
    }

    #[test]
    fn test_atan2_axes() {
        assert_eq!(atan2_deg(0.0, 1.0), 0);
        assert_eq!(atan2_deg(1.0, 0.0), 90);
        assert_eq!(atan2_deg(0.0, -1.0), 180);
        assert_eq!(atan2_deg(-1.0, 0.0), 270);
        assert_eq!(atan2_deg(1.0, 1.0), 45);
        assert_eq!(atan2_deg(0.0, 0.0), 0);
    }

    #[test]
    fn test_signed_fold() {
        assert_eq!(atan2_deg_signed(-1.0, 0.0), -90);
        assert_eq!(atan2_deg_signed(1.0, 0.0), 90);
        assert_eq!(atan2_deg_signed(0.0, -1.0), 180);
    }

    #[test]
    fn test_bearing() {
        assert_eq!(bearing_deg(0, 100), 0);
        assert_eq!(bearing_deg(100, 0), 90);
        assert_eq!(bearing_deg(0, -100), 180);
        assert_eq!(bearing_deg(-100, 0), 270);
    }

    proptest! {
        #[test]
        fn prop_atan2_in_range(y in -10_000i32..10_000, x in -10_000i32..10_000) {
            let deg = atan2_deg(f64::from(y), f64::from(x));
            prop_assert!((0..360).contains(&deg));
        }

        #[test]
        fn prop_first_quadrant_brackets_angle(deg in 1i32..89) {
            // A vector built from the table lands on its own degree.
            let found = atan2_deg(sin_deg(deg), cos_deg(deg));
            prop_assert!(found == deg || found == deg - 1);
        }
    }
}
