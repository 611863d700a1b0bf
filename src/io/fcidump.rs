//! Reader for the FCIDUMP integral interchange format: a namelist header
//! with the orbital and electron counts followed by one labelled integral
//! per line. Indices are 1-based; two-electron values are chemist-notation
//! (ij|kl) and only one representative of each 8-fold symmetry class needs
//! to be present.

use crate::hamiltonian::Hamiltonian;
use crate::system::System;
use anyhow::{bail, Context, Result};
use ndarray::prelude::*;
use std::fs;
use std::path::Path;

pub fn read_fcidump<P: AsRef<Path>>(path: P) -> Result<(System, Hamiltonian)> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("could not read integral file '{}'", path.display()))?;
    parse_fcidump(&text).with_context(|| format!("malformed integral file '{}'", path.display()))
}

pub fn parse_fcidump(text: &str) -> Result<(System, Hamiltonian)> {
    let end = text
        .find("&END")
        .or_else(|| text.find("/"))
        .context("header is not terminated by &END")?;
    let header = &text[..end];
    let body = text[end..]
        .lines()
        .skip(1)
        .collect::<Vec<_>>();

    let norb = header_value(header, "NORB").context("header does not define NORB")?;
    let nelec = header_value(header, "NELEC").context("header does not define NELEC")?;
    if let Some(ms2) = header_value(header, "MS2") {
        if ms2 != 0 {
            bail!("only MS2 = 0 references are supported, got {}", ms2);
        }
    }
    if nelec % 2 != 0 || nelec > 2 * norb {
        bail!("{} electrons do not form a closed shell in {} orbitals", nelec, norb);
    }

    let mut core = 0.0;
    let mut oei: Array2<f64> = Array2::zeros((norb, norb));
    let mut tei: Array4<f64> = Array4::zeros((norb, norb, norb, norb));
    for line in body {
        if line.trim().is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let value: f64 = tokens
            .next()
            .unwrap()
            .parse()
            .with_context(|| format!("bad integral value in line '{}'", line))?;
        let mut index = [0usize; 4];
        for slot in index.iter_mut() {
            *slot = tokens
                .next()
                .with_context(|| format!("expected four indices in line '{}'", line))?
                .parse()
                .with_context(|| format!("bad orbital index in line '{}'", line))?;
        }
        if index.iter().any(|&p| p > norb) {
            bail!("orbital index out of range in line '{}'", line);
        }
        match index {
            [0, 0, 0, 0] => core = value,
            // Orbital energy records carry no information we keep.
            [_, 0, 0, 0] => {}
            [i, j, 0, 0] if i > 0 && j > 0 => {
                oei[[i - 1, j - 1]] = value;
                oei[[j - 1, i - 1]] = value;
            }
            [i, j, k, l] => {
                if i == 0 || j == 0 || k == 0 || l == 0 {
                    bail!("mixed zero and nonzero indices in line '{}'", line);
                }
                let (i, j, k, l) = (i - 1, j - 1, k - 1, l - 1);
                for &[p, q, r, s] in &[
                    [i, j, k, l],
                    [j, i, k, l],
                    [i, j, l, k],
                    [j, i, l, k],
                    [k, l, i, j],
                    [l, k, i, j],
                    [k, l, j, i],
                    [l, k, j, i],
                ] {
                    tei[[p, q, r, s]] = value;
                }
            }
        }
    }

    Ok(Hamiltonian::from_spatial(
        oei.view(),
        tei.view(),
        core,
        nelec,
    ))
}

/// Extract `KEY= value` from the namelist header, tolerating commas and
/// arbitrary spacing.
fn header_value(header: &str, key: &str) -> Option<usize> {
    let cleaned: String = header
        .chars()
        .map(|c| if c == '=' || c == ',' { ' ' } else { c })
        .collect();
    let mut tokens = cleaned.split_whitespace();
    while let Some(token) = tokens.next() {
        if token.eq_ignore_ascii_case(key) {
            return tokens.next().and_then(|v| v.parse().ok());
        }
    }
    None
}
