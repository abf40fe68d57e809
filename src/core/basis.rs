use crate::file::NmfError;

/// The quantum basis of an NMF file: the meaning of one time quantum.
#[repr(u16)]
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum QuantumBasis {
    /// 96 quanta per quarter note.
    Q96 = 0,
    /// 44,100 quanta per second.
    F44100 = 1,
    /// 48,000 quanta per second.
    F48000 = 2,
}

impl Default for QuantumBasis {
    fn default() -> Self {
        QuantumBasis::Q96
    }
}

impl QuantumBasis {
    pub(crate) fn from_u16(value: u16) -> Result<Self, NmfError> {
        match value {
            0 => Ok(QuantumBasis::Q96),
            1 => Ok(QuantumBasis::F44100),
            2 => Ok(QuantumBasis::F48000),
            _ => Err(NmfError::Basis),
        }
    }

    pub(crate) fn to_u16(self) -> u16 {
        self as u16
    }

    /// Returns `true` for the sample-per-quantum bases.
    pub fn is_fixed_rate(self) -> bool {
        matches!(self, QuantumBasis::F44100 | QuantumBasis::F48000)
    }

    /// The basis for a sampling rate of 44,100 or 48,000 Hz.
    pub fn for_rate(srate: i32) -> Option<Self> {
        match srate {
            44100 => Some(QuantumBasis::F44100),
            48000 => Some(QuantumBasis::F48000),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuantumBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuantumBasis::Q96 => write!(f, "96 quanta per quarter"),
            QuantumBasis::F44100 => write!(f, "44,100 quanta per second"),
            QuantumBasis::F48000 => write!(f, "48,000 quanta per second"),
        }
    }
}

#[test]
fn basis_round_trip_test() {
    for value in 0u16..=2 {
        let basis = QuantumBasis::from_u16(value).unwrap();
        assert_eq!(value, basis.to_u16());
    }
    assert!(QuantumBasis::from_u16(3).is_err());
    assert!(!QuantumBasis::Q96.is_fixed_rate());
    assert!(QuantumBasis::F48000.is_fixed_rate());
}
