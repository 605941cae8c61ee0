//! This example demonstrates how polyplan can drive a Newton iteration.
//! Specifically, it shows how to:
//! 1. Describe a polynomial system with a parameter using `Polynomial::from_terms`
//! 2. Evaluate values and Jacobian in one pass per step with `evaluate_and_jacobian_with_into`
//! 3. Reuse the same buffers for every step so the loop does not allocate
//!
//! The system intersects a circle of radius r with a line:
//!     x^2 + y^2 - r^2 = 0
//!     x - y - 1       = 0
//! For r = 5 and a start near (3, 2) the iteration converges to (4, 3).
//!
//! Afterwards the parameter derivatives dF/dr at the root are printed, which is what a
//! continuation method would use to predict the root for a slightly different radius.

use polyplan::{Polynomial, PolynomialError, PolynomialSystem};

fn build_system() -> Result<PolynomialSystem<f64>, PolynomialError> {
    let circle = Polynomial::from_terms(
        2,
        1,
        vec![
            (1.0, vec![2, 0], vec![0]),
            (1.0, vec![0, 2], vec![0]),
            (-1.0, vec![0, 0], vec![2]),
        ],
    )?
    .with_names(vec!["x".into(), "y".into()], vec!["r".into()])?;

    let line = Polynomial::from_terms(
        2,
        1,
        vec![
            (1.0, vec![1, 0], vec![0]),
            (-1.0, vec![0, 1], vec![0]),
            (-1.0, vec![0, 0], vec![0]),
        ],
    )?
    .with_names(vec!["x".into(), "y".into()], vec!["r".into()])?;

    PolynomialSystem::new(vec![circle, line])
}

/// Solves the 2x2 system `j * dx = -f` with Cramer's rule.
fn newton_step(f: &[f64], j: &[Vec<f64>]) -> Option<[f64; 2]> {
    let det = j[0][0] * j[1][1] - j[0][1] * j[1][0];
    if det.abs() < 1e-14 {
        return None;
    }
    Some([
        -(f[0] * j[1][1] - f[1] * j[0][1]) / det,
        -(j[0][0] * f[1] - j[1][0] * f[0]) / det,
    ])
}

fn main() -> Result<(), PolynomialError> {
    let system = build_system()?;
    println!("{:?}", system);

    let p = [5.0];
    let mut x = [3.0, 2.0];
    let mut values = [0.0; 2];
    let mut jacobian = vec![vec![0.0; 2]; 2];

    for iteration in 0..20 {
        system.evaluate_and_jacobian_with_into(&mut values, &mut jacobian, &x, &p)?;
        let residual = values.iter().map(|v| v * v).sum::<f64>().sqrt();
        println!(
            "iteration {:>2}: x = ({:.12}, {:.12}), |F| = {:.3e}",
            iteration, x[0], x[1], residual
        );
        if residual < 1e-12 {
            break;
        }
        let Some(dx) = newton_step(&values, &jacobian) else {
            println!("singular Jacobian, stopping");
            break;
        };
        x[0] += dx[0];
        x[1] += dx[1];
    }

    let sensitivity = system.differentiate_parameters(&x, &p)?;
    println!("dF/dr at the root: {:?}", sensitivity);

    Ok(())
}
