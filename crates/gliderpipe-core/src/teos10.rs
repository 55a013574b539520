//! Seawater density chain for the oxygen unit conversion: PSS-78 practical
//! salinity, TEOS-10 reference salinity, and the 75-term specific volume
//! polynomial (Roquet et al. 2015). Conservative temperature is approximated
//! by potential temperature (Bryden 1973), which stays within 0.05 degC of
//! the exact value over glider envelopes.

/// Standard ocean reference salinity in g/kg (TEOS-10 SSO).
pub const STANDARD_OCEAN_SALINITY: f64 = 35.16504;

/// Conductivity of KCl-standard seawater at S=35, t=15 degC, p=0, in mS/cm.
const CONDUCTIVITY_35_15_0: f64 = 42.9140;

const PSS_A: [f64; 6] = [0.0080, -0.1692, 25.3851, 14.0941, -7.0261, 2.7081];
const PSS_B: [f64; 6] = [0.0005, -0.0056, -0.0066, -0.0375, 0.0636, -0.0144];
const PSS_K: f64 = 0.0162;

/// PSS-78 practical salinity from in-situ conductivity (mS/cm), temperature
/// (ITS-90 degC) and pressure (dbar). Returns `None` when the inputs cannot
/// produce a physical salinity.
pub fn practical_salinity(conductivity: f64, temperature: f64, pressure: f64) -> Option<f64> {
    if !conductivity.is_finite() || !temperature.is_finite() || !pressure.is_finite() {
        return None;
    }
    if conductivity <= 0.0 {
        return None;
    }

    let t = temperature;
    let r = conductivity / CONDUCTIVITY_35_15_0;

    let rt_t = 0.6766097
        + 2.00564e-2 * t
        + 1.104259e-4 * t * t
        - 6.9698e-7 * t * t * t
        + 1.0031e-9 * t * t * t * t;

    let rp = 1.0
        + pressure * (2.070e-5 + pressure * (-6.370e-10 + pressure * 3.989e-15))
            / (1.0 + 3.426e-2 * t + 4.464e-4 * t * t + (4.215e-1 - 3.107e-3 * t) * r);

    let rt = r / (rp * rt_t);
    if rt < 0.0 {
        return None;
    }

    let x = rt.sqrt();
    let mut sp = 0.0;
    let mut dsp = 0.0;
    let mut xk = 1.0;
    for i in 0..6 {
        sp += PSS_A[i] * xk;
        dsp += PSS_B[i] * xk;
        xk *= x;
    }
    let dt = t - 15.0;
    sp += dt / (1.0 + PSS_K * dt) * dsp;

    if sp.is_finite() && sp >= 0.0 {
        Some(sp)
    } else {
        None
    }
}

/// TEOS-10 reference salinity in g/kg from practical salinity. The regional
/// absolute salinity anomaly is below sensor accuracy and is not applied.
pub fn absolute_salinity(practical_salinity: f64) -> f64 {
    practical_salinity * STANDARD_OCEAN_SALINITY / 35.0
}

/// Potential temperature referenced to the surface, Bryden (1973) polynomial.
/// Salinity on the practical scale, pressure in dbar.
pub fn potential_temperature(salinity: f64, temperature: f64, pressure: f64) -> f64 {
    let t = temperature;
    let s = salinity - 35.0;
    // The polynomial is fitted with pressure in bars.
    let p = pressure * 0.1;

    t - p * (3.6504e-4 + 8.3198e-5 * t - 5.4065e-7 * t * t + 4.0274e-9 * t * t * t)
        - p * s * (1.7439e-5 - 2.9778e-7 * t)
        - p * p * (8.9309e-7 - 3.1628e-8 * t + 2.1987e-10 * t * t)
        + 4.1057e-9 * s * p * p
        - p * p * p * (-1.6056e-10 + 5.0484e-12 * t)
}

const SFAC: f64 = 0.0248826675584615;
const OFFSET: f64 = 5.971840214030754e-1;

// 75-term specific volume coefficients, Roquet et al. (2015).
const V000: f64 = 1.0769995862e-3;
const V001: f64 = -6.0799143809e-5;
const V002: f64 = 9.9856169219e-6;
const V003: f64 = -1.1309361437e-6;
const V004: f64 = 1.0531153080e-7;
const V005: f64 = -1.2647261286e-8;
const V006: f64 = 1.9613503930e-9;
const V010: f64 = -1.5649734675e-5;
const V011: f64 = 1.8505765429e-5;
const V012: f64 = -1.1736386731e-6;
const V013: f64 = -3.6527006553e-7;
const V014: f64 = 3.1454099902e-7;
const V020: f64 = 2.7762106484e-5;
const V021: f64 = -1.1716606853e-5;
const V022: f64 = 2.1305028740e-6;
const V023: f64 = 2.8695905159e-7;
const V030: f64 = -1.6521159259e-5;
const V031: f64 = 7.9279656173e-6;
const V032: f64 = -4.6132540037e-7;
const V040: f64 = 6.9111322702e-6;
const V041: f64 = -3.4102187482e-6;
const V042: f64 = -6.3352916514e-8;
const V050: f64 = -8.0539615540e-7;
const V051: f64 = 5.0736766814e-7;
const V060: f64 = 2.0543094268e-7;
const V100: f64 = -3.1038981976e-4;
const V101: f64 = 2.4262468747e-5;
const V102: f64 = -5.8484432984e-7;
const V103: f64 = 3.6310188515e-7;
const V104: f64 = -1.1654205854e-7;
const V110: f64 = 3.5009599764e-5;
const V111: f64 = -9.5677088156e-6;
const V112: f64 = -5.5699154557e-6;
const V113: f64 = -2.7295696237e-7;
const V120: f64 = -3.7435842344e-5;
const V121: f64 = -2.3678308361e-7;
const V122: f64 = 3.9137387080e-7;
const V130: f64 = 2.4141479483e-5;
const V131: f64 = -3.4558773655e-6;
const V132: f64 = 7.7618888092e-9;
const V140: f64 = -8.7595873154e-6;
const V141: f64 = 1.2956717783e-6;
const V150: f64 = -3.3052758900e-7;
const V200: f64 = 6.6928067038e-4;
const V201: f64 = -3.4792460974e-5;
const V202: f64 = -4.8122251597e-6;
const V203: f64 = 1.6746303780e-8;
const V210: f64 = -4.3592678561e-5;
const V211: f64 = 1.1100834765e-5;
const V212: f64 = 5.4620748834e-6;
const V220: f64 = 3.5907822760e-5;
const V221: f64 = 2.9283346295e-6;
const V222: f64 = -6.5731104067e-7;
const V230: f64 = -1.4353633048e-5;
const V231: f64 = 3.1655306078e-7;
const V240: f64 = 4.3703680598e-6;
const V300: f64 = -8.5047933937e-4;
const V301: f64 = 3.7470777305e-5;
const V302: f64 = 4.9263106998e-6;
const V310: f64 = 3.4532461828e-5;
const V311: f64 = -9.8447117844e-6;
const V312: f64 = -1.3544185627e-6;
const V320: f64 = -1.8698584187e-5;
const V321: f64 = -4.8826139200e-7;
const V330: f64 = 2.2863324556e-6;
const V400: f64 = 5.8086069943e-4;
const V401: f64 = -1.7322218612e-5;
const V402: f64 = -1.7811974727e-6;
const V410: f64 = -1.1959409788e-5;
const V411: f64 = 2.5909225260e-6;
const V420: f64 = 3.8595339244e-6;
const V500: f64 = -2.1092370507e-4;
const V501: f64 = 6.2741141523e-6;
const V510: f64 = 1.3864594581e-6;
const V600: f64 = 3.1932457305e-5;

/// Specific volume in m^3/kg from absolute salinity (g/kg), conservative
/// temperature (degC) and pressure (dbar).
pub fn specific_volume(
    absolute_salinity: f64,
    conservative_temperature: f64,
    pressure: f64,
) -> f64 {
    let xs = (SFAC * absolute_salinity + OFFSET).sqrt();
    let ys = conservative_temperature * 0.025;
    let z = pressure * 1.0e-4;

    let a0 = V000
        + xs * (V100 + xs * (V200 + xs * (V300 + xs * (V400 + xs * (V500 + xs * V600)))))
        + ys * (V010
            + xs * (V110 + xs * (V210 + xs * (V310 + xs * (V410 + xs * V510))))
            + ys * (V020
                + xs * (V120 + xs * (V220 + xs * (V320 + xs * V420)))
                + ys * (V030
                    + xs * (V130 + xs * (V230 + xs * V330))
                    + ys * (V040 + xs * (V140 + xs * V240) + ys * (V050 + xs * V150 + ys * V060)))));

    let a1 = V001
        + xs * (V101 + xs * (V201 + xs * (V301 + xs * (V401 + xs * V501))))
        + ys * (V011
            + xs * (V111 + xs * (V211 + xs * (V311 + xs * V411)))
            + ys * (V021
                + xs * (V121 + xs * (V221 + xs * V321))
                + ys * (V031 + xs * (V131 + xs * V231) + ys * (V041 + xs * V141 + ys * V051))));

    let a2 = V002
        + xs * (V102 + xs * (V202 + xs * (V302 + xs * V402)))
        + ys * (V012
            + xs * (V112 + xs * (V212 + xs * V312))
            + ys * (V022 + xs * (V122 + xs * V222) + ys * (V032 + xs * V132 + ys * V042)));

    let a3 = V003 + xs * (V103 + xs * V203) + ys * (V013 + xs * V113 + ys * V023);

    let a4 = V004 + xs * V104 + ys * V014;

    a0 + z * (a1 + z * (a2 + z * (a3 + z * (a4 + z * (V005 + z * V006)))))
}

/// In-situ density in kg/m^3.
pub fn density(absolute_salinity: f64, conservative_temperature: f64, pressure: f64) -> f64 {
    1.0 / specific_volume(absolute_salinity, conservative_temperature, pressure)
}

/// Full chain from raw sensor values: conductivity in mS/cm, temperature in
/// degC, pressure in dbar, to in-situ density in kg/m^3. `None` when any
/// input is missing its physical range.
pub fn density_from_sensors(conductivity: f64, temperature: f64, pressure: f64) -> Option<f64> {
    let sp = practical_salinity(conductivity, temperature, pressure)?;
    let sa = absolute_salinity(sp);
    let ct = potential_temperature(sp, temperature, pressure);
    let rho = density(sa, ct, pressure);
    if rho.is_finite() && rho > 0.0 {
        Some(rho)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn practical_salinity_reproduces_the_reference_point() {
        let sp = practical_salinity(CONDUCTIVITY_35_15_0, 15.0, 0.0).expect("salinity");
        assert!((sp - 35.0).abs() < 1e-6, "got {sp}");
    }

    #[test]
    fn practical_salinity_increases_with_conductivity() {
        let low = practical_salinity(38.0, 15.0, 0.0).expect("salinity");
        let high = practical_salinity(44.0, 15.0, 0.0).expect("salinity");
        assert!(high > low);
    }

    #[test]
    fn practical_salinity_rejects_unusable_inputs() {
        assert!(practical_salinity(f64::NAN, 15.0, 0.0).is_none());
        assert!(practical_salinity(-3.0, 15.0, 0.0).is_none());
    }

    #[test]
    fn potential_temperature_matches_the_unesco_check() {
        let theta = potential_temperature(35.0, 10.0, 1000.0);
        assert!((theta - 9.8797).abs() < 5e-3, "got {theta}");
    }

    #[test]
    fn standard_ocean_surface_density() {
        let rho = density(STANDARD_OCEAN_SALINITY, 0.0, 0.0);
        assert!((rho - 1028.106).abs() < 0.5, "got {rho}");
    }

    #[test]
    fn density_increases_with_pressure() {
        let surface = density(STANDARD_OCEAN_SALINITY, 2.0, 0.0);
        let deep = density(STANDARD_OCEAN_SALINITY, 2.0, 1000.0);
        assert!(deep > surface);
        assert!(deep < 1036.0, "got {deep}");
    }

    #[test]
    fn density_decreases_with_warming() {
        let cold = density(STANDARD_OCEAN_SALINITY, 4.0, 0.0);
        let warm = density(STANDARD_OCEAN_SALINITY, 20.0, 0.0);
        assert!(warm < cold);
    }

    #[test]
    fn tropical_surface_water_is_plausible() {
        let rho = density(34.7118, 28.8099, 10.0);
        assert!(rho > 1015.0 && rho < 1030.0, "got {rho}");
    }

    #[test]
    fn sensor_chain_produces_seawater_density() {
        let rho = density_from_sensors(40.0, 12.0, 50.0).expect("density");
        assert!(rho > 1020.0 && rho < 1032.0, "got {rho}");
        assert!(density_from_sensors(f64::NAN, 12.0, 50.0).is_none());
    }
}
