use ndarray::prelude::*;

/// Spin channel of a single orbital index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Spin {
    Alpha,
    Beta,
}

/// Orbital counts of the correlated space. All per-spin orbital indices in
/// the program run occupied-first: `0..no` are holes, `no..no + nu` are
/// particles of that spin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub noa: usize,
    pub nob: usize,
    pub nua: usize,
    pub nub: usize,
}

impl Dimensions {
    pub fn new(noa: usize, nob: usize, nua: usize, nub: usize) -> Self {
        Dimensions { noa, nob, nua, nub }
    }

    /// Number of occupied spin orbitals.
    pub fn no(&self) -> usize {
        self.noa + self.nob
    }

    /// Number of unoccupied spin orbitals.
    pub fn nv(&self) -> usize {
        self.nua + self.nub
    }

    /// Total number of spin orbitals.
    pub fn n(&self) -> usize {
        self.no() + self.nv()
    }

    pub fn norb(&self, spin: Spin) -> usize {
        match spin {
            Spin::Alpha => self.noa + self.nua,
            Spin::Beta => self.nob + self.nub,
        }
    }

    pub fn nocc(&self, spin: Spin) -> usize {
        match spin {
            Spin::Alpha => self.noa,
            Spin::Beta => self.nob,
        }
    }

    pub fn nvir(&self, spin: Spin) -> usize {
        match spin {
            Spin::Alpha => self.nua,
            Spin::Beta => self.nub,
        }
    }

    /// Whether the reference is a closed shell, which is what licenses the
    /// spin-flip amplitude copying shortcuts.
    pub fn is_closed_shell(&self) -> bool {
        self.noa == self.nob && self.nua == self.nub
    }
}

/// Canonical orbital energies, one full-range (occupied-first) vector per
/// spin. These stay fixed for the whole session and back all
/// Moller-Plesset-type denominators, also after the integral container has
/// been replaced by its similarity-transformed version.
#[derive(Clone, Debug)]
pub struct OrbitalEnergies {
    pub a: Array1<f64>,
    pub b: Array1<f64>,
}

impl OrbitalEnergies {
    pub fn get(&self, spin: Spin) -> ArrayView1<f64> {
        match spin {
            Spin::Alpha => self.a.view(),
            Spin::Beta => self.b.view(),
        }
    }
}

/// Static description of the electronic system a driver instance works on.
#[derive(Clone, Debug)]
pub struct System {
    pub dims: Dimensions,
    /// Mean-field reference energy including the core/nuclear contribution.
    pub reference_energy: f64,
    pub orbital_energies: OrbitalEnergies,
}

impl System {
    pub fn new(dims: Dimensions, reference_energy: f64, orbital_energies: OrbitalEnergies) -> Self {
        System {
            dims,
            reference_energy,
            orbital_energies,
        }
    }
}
