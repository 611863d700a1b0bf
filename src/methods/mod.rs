pub mod ccsd;
pub mod ccsdt1;
pub mod eom;
pub mod hbar;
pub mod spinorbital;
pub mod terms;

use std::error;
use std::fmt;
use std::str::FromStr;

/// Every calculation type the driver can dispatch. Ground-state solvers,
/// their companion left-hand solvers, and the excited-state solvers are
/// separate variants so the driver can check its state machine per kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Method {
    Ccd,
    Ccsd,
    Ccsdt1,
    Ccsdt1P,
    EomCcsd,
    EomCcsdt1P,
    LeftCcsd,
    LeftCcsdt1P,
}

impl Method {
    /// Highest excitation rank carried by the cluster operator.
    pub fn order(&self) -> usize {
        match self {
            Method::Ccd | Method::Ccsd | Method::EomCcsd | Method::LeftCcsd => 2,
            Method::Ccsdt1 | Method::Ccsdt1P | Method::EomCcsdt1P | Method::LeftCcsdt1P => 3,
        }
    }

    pub fn is_excited_state(&self) -> bool {
        matches!(self, Method::EomCcsd | Method::EomCcsdt1P)
    }

    pub fn is_left_hand(&self) -> bool {
        matches!(self, Method::LeftCcsd | Method::LeftCcsdt1P)
    }

    /// Whether the triples block lives on an explicit excitation list.
    pub fn uses_pspace(&self) -> bool {
        matches!(
            self,
            Method::Ccsdt1P | Method::EomCcsdt1P | Method::LeftCcsdt1P
        )
    }

    /// Whether the singles block participates in the ground-state update.
    pub fn has_singles(&self) -> bool {
        !matches!(self, Method::Ccd)
    }
}

impl FromStr for Method {
    type Err = MethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ccd" => Ok(Method::Ccd),
            "ccsd" => Ok(Method::Ccsd),
            "ccsdt-1" | "ccsdt1" => Ok(Method::Ccsdt1),
            "ccsdt-1(p)" | "ccsdt1_p" => Ok(Method::Ccsdt1P),
            "eomccsd" => Ok(Method::EomCcsd),
            "eomccsdt-1(p)" | "eomccsdt1_p" => Ok(Method::EomCcsdt1P),
            "left-ccsd" | "left_ccsd" => Ok(Method::LeftCcsd),
            "left-ccsdt-1(p)" | "left_ccsdt1_p" => Ok(Method::LeftCcsdt1P),
            other => Err(MethodError(other.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Ccd => "CCD",
            Method::Ccsd => "CCSD",
            Method::Ccsdt1 => "CCSDT-1",
            Method::Ccsdt1P => "CCSDT-1(P)",
            Method::EomCcsd => "EOM-CCSD",
            Method::EomCcsdt1P => "EOM-CCSDT-1(P)",
            Method::LeftCcsd => "left-CCSD",
            Method::LeftCcsdt1P => "left-CCSDT-1(P)",
        };
        write!(f, "{}", name)
    }
}

/// The requested method name does not dispatch to any implementation.
#[derive(Debug, PartialEq)]
pub struct MethodError(pub String);

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no implementation is registered for method '{}'", self.0)
    }
}

impl error::Error for MethodError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_dispatch_case_insensitively() {
        assert_eq!("CCSD".parse::<Method>().unwrap(), Method::Ccsd);
        assert_eq!("ccsdt-1(p)".parse::<Method>().unwrap(), Method::Ccsdt1P);
        assert_eq!("left_ccsd".parse::<Method>().unwrap(), Method::LeftCcsd);
        assert!("ccsdtq".parse::<Method>().is_err());
    }
}
