use itertools::Itertools;
use ndarray::prelude::*;

/// Parity sign of a permutation given as the target positions of the
/// identity, computed from the inversion count.
pub fn parity(perm: &[usize]) -> f64 {
    let mut inversions = 0;
    for i in 0..perm.len() {
        for j in (i + 1)..perm.len() {
            if perm[i] > perm[j] {
                inversions += 1;
            }
        }
    }
    if inversions % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Signed sum over all axis permutations within each index group:
/// `A(group_1) A(group_2) ... X`. For a doubles residual the groups are
/// `[[0, 1], [2, 3]]` and the sum has four members; for same-spin triples
/// it has thirty-six. Axes outside the groups stay fixed.
pub fn antisymmetrize(x: ArrayViewD<f64>, groups: &[&[usize]]) -> ArrayD<f64> {
    let ndim = x.ndim();
    let group_perms: Vec<Vec<(Vec<usize>, f64)>> = groups
        .iter()
        .map(|group| {
            group
                .iter()
                .cloned()
                .permutations(group.len())
                .map(|p| {
                    // Parity relative to the group's own ordering.
                    let positions: Vec<usize> = p
                        .iter()
                        .map(|axis| group.iter().position(|g| g == axis).unwrap())
                        .collect();
                    (p, parity(&positions))
                })
                .collect()
        })
        .collect();

    let mut out: ArrayD<f64> = ArrayD::zeros(x.shape());
    for combo in group_perms.iter().multi_cartesian_product() {
        let mut axes: Vec<usize> = (0..ndim).collect();
        let mut sign = 1.0;
        for (group, (perm, s)) in groups.iter().zip(combo.iter()) {
            sign *= s;
            for (dst, src) in group.iter().zip(perm.iter()) {
                axes[*dst] = *src;
            }
        }
        let permuted = x.view().permuted_axes(axes.as_slice());
        out.zip_mut_with(&permuted, |o, &p| *o += sign * p);
    }
    out
}
