//! Parameter grids for the brute-force fits. Points are rounded to six decimals.

use once_cell::sync::Lazy;

pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![round6(start)],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| round6(start + step * i as f64)).collect()
        }
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

pub static ALPHAS: Lazy<Vec<f64>> = Lazy::new(|| linspace(0.01, 0.99, 25));

/// Dense below 4, sparse above.
pub static BETAS: Lazy<Vec<f64>> = Lazy::new(|| {
    let mut betas = linspace(0.3, 4.0, 16);
    betas.extend(linspace(5.0, 15.0, 6));
    betas
});

pub static PHIS: Lazy<Vec<f64>> = Lazy::new(|| linspace(0.05, 0.95, 15));
pub static RHOS_EWA: Lazy<Vec<f64>> = Lazy::new(|| linspace(0.10, 0.95, 12));
pub static RHOS_SENS: Lazy<Vec<f64>> = Lazy::new(|| linspace(0.01, 0.99, 25));
pub static RHOS_SENS_DU: Lazy<Vec<f64>> = Lazy::new(|| linspace(0.01, 0.99, 21));
pub static TAUS: Lazy<Vec<f64>> = Lazy::new(|| linspace(0.0, 5.0, 21));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_sizes_and_bounds() {
        assert_eq!(ALPHAS.len(), 25);
        assert_eq!(BETAS.len(), 22);
        assert_eq!(PHIS.len(), 15);
        assert_eq!(RHOS_EWA.len(), 12);
        assert_eq!(RHOS_SENS_DU.len(), 21);
        assert_eq!(TAUS.len(), 21);
        assert_eq!(ALPHAS[0], 0.01);
        assert_eq!(ALPHAS[24], 0.99);
        assert_eq!(BETAS[15], 4.0);
        assert_eq!(BETAS[16], 5.0);
        assert_eq!(BETAS[21], 15.0);
        assert_eq!(TAUS[1], 0.25);
    }

    #[test]
    fn points_are_rounded() {
        assert_eq!(ALPHAS[7], 0.295833);
        assert!(BETAS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn degenerate_lengths() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(0.3, 1.0, 1), vec![0.3]);
    }
}
