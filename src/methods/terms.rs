//! Generic evaluation of polynomial amplitude equations. A method is
//! defined by tables of [`Term`]s; everything else, the residual, the
//! correlation energy, the Jacobian-vector products for the excited-state
//! and left-hand solvers, falls out of the tables by the product rule.

use crate::hamiltonian::Hamiltonian;
use crate::methods::spinorbital::{combined_eri, combined_fock, Amplitudes};
use crate::operators::antisym::antisymmetrize;
use crate::system::Dimensions;
use ndarray::prelude::*;
use ndarray::Slice;
use ndarray_einsum_beta::{einsum, ArrayLike};

/// Hole/particle slices of the integral tensors. `F*` are one-body, the
/// rest are `<pq||rs>` slabs named by their index character.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Block {
    Foo,
    Fov,
    Fvo,
    Fvv,
    Oooo,
    Ooov,
    Oovo,
    Oovv,
    Ovoo,
    Ovov,
    Ovvo,
    Ovvv,
    Vovv,
    Vvoo,
    Vvvo,
    Vvvv,
}

/// The integral slabs a term table can reference, cut once per engine.
pub struct HamBlocks {
    foo: ArrayD<f64>,
    fov: ArrayD<f64>,
    fvo: ArrayD<f64>,
    fvv: ArrayD<f64>,
    oooo: ArrayD<f64>,
    ooov: ArrayD<f64>,
    oovo: ArrayD<f64>,
    oovv: ArrayD<f64>,
    ovoo: ArrayD<f64>,
    ovov: ArrayD<f64>,
    ovvo: ArrayD<f64>,
    ovvv: ArrayD<f64>,
    vovv: ArrayD<f64>,
    vvoo: ArrayD<f64>,
    vvvo: ArrayD<f64>,
    vvvv: ArrayD<f64>,
}

impl HamBlocks {
    pub fn new(h: &Hamiltonian) -> Self {
        let f = combined_fock(h);
        let v = combined_eri(h);
        HamBlocks::from_combined(h.dims, &f, &v)
    }

    pub fn from_combined(dims: Dimensions, f: &ArrayD<f64>, v: &ArrayD<f64>) -> Self {
        let no = dims.no();
        let o = Slice::from(..no);
        let u = Slice::from(no..);
        let f2 = f.view().into_dimensionality::<Ix2>().unwrap();
        let v4 = v.view().into_dimensionality::<Ix4>().unwrap();
        let cut2 = |p: Slice, q: Slice| {
            f2.slice_axis(Axis(0), p)
                .slice_axis(Axis(1), q)
                .to_owned()
                .into_dyn()
        };
        let cut4 = |p: Slice, q: Slice, r: Slice, s: Slice| {
            v4.slice_axis(Axis(0), p)
                .slice_axis(Axis(1), q)
                .slice_axis(Axis(2), r)
                .slice_axis(Axis(3), s)
                .to_owned()
                .into_dyn()
        };
        HamBlocks {
            foo: cut2(o, o),
            fov: cut2(o, u),
            fvo: cut2(u, o),
            fvv: cut2(u, u),
            oooo: cut4(o, o, o, o),
            ooov: cut4(o, o, o, u),
            oovo: cut4(o, o, u, o),
            oovv: cut4(o, o, u, u),
            ovoo: cut4(o, u, o, o),
            ovov: cut4(o, u, o, u),
            ovvo: cut4(o, u, u, o),
            ovvv: cut4(o, u, u, u),
            vovv: cut4(u, o, u, u),
            vvoo: cut4(u, u, o, o),
            vvvo: cut4(u, u, u, o),
            vvvv: cut4(u, u, u, u),
        }
    }

    pub fn get(&self, block: Block) -> &ArrayD<f64> {
        match block {
            Block::Foo => &self.foo,
            Block::Fov => &self.fov,
            Block::Fvo => &self.fvo,
            Block::Fvv => &self.fvv,
            Block::Oooo => &self.oooo,
            Block::Ooov => &self.ooov,
            Block::Oovo => &self.oovo,
            Block::Oovv => &self.oovv,
            Block::Ovoo => &self.ovoo,
            Block::Ovov => &self.ovov,
            Block::Ovvo => &self.ovvo,
            Block::Ovvv => &self.ovvv,
            Block::Vovv => &self.vovv,
            Block::Vvoo => &self.vvoo,
            Block::Vvvo => &self.vvvo,
            Block::Vvvv => &self.vvvv,
        }
    }
}

/// One contraction of the amplitude equations: an integral slab with its
/// subscripts, times zero or more amplitude factors given as (rank,
/// subscripts) pairs. Occupied subscripts draw from {i, j, k, m, n},
/// virtual ones from {a, b, c, e, f}. For output ranks two and above the
/// coefficients are the raw weights of the antisymmetrizer form
/// `A(sum of terms)`.
#[derive(Clone, Debug)]
pub struct Term {
    pub coeff: f64,
    pub block: Block,
    pub subs: &'static str,
    pub amps: &'static [(usize, &'static str)],
}

pub const fn term(
    coeff: f64,
    block: Block,
    subs: &'static str,
    amps: &'static [(usize, &'static str)],
) -> Term {
    Term {
        coeff,
        block,
        subs,
        amps,
    }
}

/// Output subscripts of a residual of the given rank.
fn out_subs(rank: usize) -> &'static str {
    match rank {
        1 => "ai",
        2 => "abij",
        3 => "abcijk",
        _ => panic!("unsupported excitation rank {}", rank),
    }
}

/// Particle and hole axis groups of an output rank, for antisymmetrization.
fn axis_groups(rank: usize) -> (&'static [usize], &'static [usize]) {
    match rank {
        2 => (&[0, 1], &[2, 3]),
        3 => (&[0, 1, 2], &[3, 4, 5]),
        _ => panic!("nothing to antisymmetrize at rank {}", rank),
    }
}

/// Inner-product weight per rank, compensating the redundancy of the full
/// antisymmetric storage: 1 / (k!)^2.
fn weight(rank: usize) -> f64 {
    match rank {
        1 => 1.0,
        2 => 1.0 / 4.0,
        3 => 1.0 / 36.0,
        _ => panic!("unsupported excitation rank {}", rank),
    }
}

/// Evaluates term tables against amplitudes in the combined layout.
pub struct TermEngine {
    pub dims: Dimensions,
    blocks: HamBlocks,
    energy_terms: Vec<Term>,
    residual_terms: Vec<Vec<Term>>,
    order: usize,
    active_singles: bool,
}

impl TermEngine {
    /// `residual_terms[k - 1]` holds the rank-k table. With
    /// `active_singles` off the rank-1 residual is pinned at zero, which
    /// freezes the singles at their initial value.
    pub fn new(
        h: &Hamiltonian,
        energy_terms: Vec<Term>,
        residual_terms: Vec<Vec<Term>>,
        active_singles: bool,
    ) -> Self {
        let order = residual_terms.len();
        TermEngine {
            dims: h.dims,
            blocks: HamBlocks::new(h),
            energy_terms,
            residual_terms,
            order,
            active_singles,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn contract(
        &self,
        t: &Term,
        amps: &Amplitudes,
        replace: Option<(usize, &ArrayD<f64>)>,
        out: &str,
    ) -> ArrayD<f64> {
        let mut subs: Vec<&str> = vec![t.subs];
        let mut operands: Vec<&ArrayD<f64>> = vec![self.blocks.get(t.block)];
        for (slot, &(rank, s)) in t.amps.iter().enumerate() {
            subs.push(s);
            operands.push(match replace {
                Some((j, r)) if j == slot => r,
                _ => amps.rank(rank),
            });
        }
        let spec = format!("{}->{}", subs.join(","), out);
        let refs: Vec<&dyn ArrayLike<f64>> =
            operands.iter().map(|x| *x as &dyn ArrayLike<f64>).collect();
        let result = einsum(&spec, &refs)
            .unwrap_or_else(|e| panic!("contraction '{}' failed: {}", spec, e));
        result.mapv(|x| t.coeff * x)
    }

    /// Residual of the amplitude equations, zero at a solution. Includes
    /// the diagonal Fock contributions, so a quasi-Newton sweep divides it
    /// by the bare energy denominators.
    pub fn residual(&self, t: &Amplitudes) -> Amplitudes {
        let mut out = Amplitudes::zeros(self.dims, self.order >= 3);
        for rank in 1..=self.order {
            if rank == 1 && !self.active_singles {
                continue;
            }
            let mut raw = out.rank(rank).clone();
            for term in &self.residual_terms[rank - 1] {
                raw += &self.contract(term, t, None, out_subs(rank));
            }
            *out.rank_mut(rank) = if rank == 1 {
                raw
            } else {
                let (particles, holes) = axis_groups(rank);
                antisymmetrize(raw.view(), &[particles, holes])
            };
        }
        out
    }

    /// Correlation energy at the given amplitudes.
    pub fn energy(&self, t: &Amplitudes) -> f64 {
        self.energy_terms
            .iter()
            .map(|term| self.contract(term, t, None, "").sum())
            .sum()
    }

    /// Jacobian-vector product of the residual: the directional derivative
    /// of [`residual`](Self::residual) at `t` along `r`, exact by the
    /// product rule. At converged amplitudes its eigenvalues are the
    /// excitation energies.
    pub fn sigma(&self, t: &Amplitudes, r: &Amplitudes) -> Amplitudes {
        let mut out = Amplitudes::zeros(self.dims, self.order >= 3);
        for rank in 1..=self.order {
            if rank == 1 && !self.active_singles {
                continue;
            }
            let mut raw = out.rank(rank).clone();
            for term in &self.residual_terms[rank - 1] {
                for (slot, &(amp_rank, _)) in term.amps.iter().enumerate() {
                    raw += &self.contract(term, t, Some((slot, r.rank(amp_rank))), out_subs(rank));
                }
            }
            *out.rank_mut(rank) = if rank == 1 {
                raw
            } else {
                let (particles, holes) = axis_groups(rank);
                antisymmetrize(raw.view(), &[particles, holes])
            };
        }
        out
    }

    /// Adjoint Jacobian-vector product restricted to antisymmetric
    /// tensors: for antisymmetric `l` and `r`,
    /// `weighted_dot(sigma_transpose(t, l), r) == weighted_dot(l, sigma(t, r))`.
    pub fn sigma_transpose(&self, t: &Amplitudes, l: &Amplitudes) -> Amplitudes {
        let mut gradient = Amplitudes::zeros(self.dims, self.order >= 3);
        for out_rank in 1..=self.order {
            if out_rank == 1 && !self.active_singles {
                continue;
            }
            for term in &self.residual_terms[out_rank - 1] {
                for (slot, &(amp_rank, amp_subs)) in term.amps.iter().enumerate() {
                    let g = self.adjoint_slot(term, t, slot, l.rank(out_rank), out_rank, amp_subs);
                    *gradient.rank_mut(amp_rank) += &g;
                }
            }
        }
        self.antisymmetrize_gradient(gradient)
    }

    /// Gradient of the energy with respect to the amplitudes, in the same
    /// antisymmetric convention as [`sigma_transpose`](Self::sigma_transpose):
    /// for antisymmetric `dt`, `d/de energy(t + e dt) == weighted_dot(eta, dt)`.
    pub fn eta(&self, t: &Amplitudes) -> Amplitudes {
        let mut gradient = Amplitudes::zeros(self.dims, self.order >= 3);
        for term in &self.energy_terms {
            for (slot, &(amp_rank, amp_subs)) in term.amps.iter().enumerate() {
                let mut subs: Vec<&str> = vec![term.subs];
                let mut operands: Vec<&ArrayD<f64>> = vec![self.blocks.get(term.block)];
                for (other, &(rank, s)) in term.amps.iter().enumerate() {
                    if other != slot {
                        subs.push(s);
                        operands.push(t.rank(rank));
                    }
                }
                let spec = format!("{}->{}", subs.join(","), amp_subs);
                let refs: Vec<&dyn ArrayLike<f64>> =
                    operands.iter().map(|x| *x as &dyn ArrayLike<f64>).collect();
                let g = einsum(&spec, &refs)
                    .unwrap_or_else(|e| panic!("contraction '{}' failed: {}", spec, e));
                gradient
                    .rank_mut(amp_rank)
                    .zip_mut_with(&g, |acc, &x| *acc += term.coeff * x);
            }
        }
        self.antisymmetrize_gradient(gradient)
    }

    fn adjoint_slot(
        &self,
        term: &Term,
        t: &Amplitudes,
        slot: usize,
        l: &ArrayD<f64>,
        out_rank: usize,
        amp_subs: &'static str,
    ) -> ArrayD<f64> {
        let mut subs: Vec<&str> = vec![term.subs];
        let mut operands: Vec<&ArrayD<f64>> = vec![self.blocks.get(term.block)];
        for (other, &(rank, s)) in term.amps.iter().enumerate() {
            if other != slot {
                subs.push(s);
                operands.push(t.rank(rank));
            }
        }
        subs.push(out_subs(out_rank));
        operands.push(l);
        let spec = format!("{}->{}", subs.join(","), amp_subs);
        let refs: Vec<&dyn ArrayLike<f64>> =
            operands.iter().map(|x| *x as &dyn ArrayLike<f64>).collect();
        let result = einsum(&spec, &refs)
            .unwrap_or_else(|e| panic!("contraction '{}' failed: {}", spec, e));
        result.mapv(|x| term.coeff * x)
    }

    fn antisymmetrize_gradient(&self, mut gradient: Amplitudes) -> Amplitudes {
        for rank in 2..=self.order {
            let (particles, holes) = axis_groups(rank);
            let a = antisymmetrize(gradient.rank(rank).view(), &[particles, holes]);
            *gradient.rank_mut(rank) = a;
        }
        gradient
    }

    /// Inner product compensating the storage redundancy of antisymmetric
    /// tensors, 1/(k!)^2 per rank.
    pub fn weighted_dot(&self, x: &Amplitudes, y: &Amplitudes) -> f64 {
        let mut acc = 0.0;
        for rank in 1..=self.order {
            let w = weight(rank);
            acc += w
                * x.rank(rank)
                    .iter()
                    .zip(y.rank(rank).iter())
                    .map(|(p, q)| p * q)
                    .sum::<f64>();
        }
        acc
    }
}
