//! The common spectrum record every codec reads into and writes from.
//!
//! A [`Spectrum`] is a pair of parallel arrays, the wave axis and the
//! amplitudes measured along it, plus free-form [`SampleData`] keyed by
//! name. Readers build spectra incrementally with [`Spectrum::push`] and
//! [`Spectrum::set`]; writers treat them as immutable values and check
//! [`Spectrum::validate`] before emitting anything.
use std::collections::HashSet;
use std::fmt::Display;

use thiserror::Error;

use crate::params::{SampleData, SampleValue};

/// The identifier given to spectra whose source names none
pub const DEFAULT_ID: &str = "noid";

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Spectrum {id:?} has {waves} wave numbers but {amplitudes} amplitudes")]
pub struct ArrayLengthMismatch {
    pub id: String,
    pub waves: usize,
    pub amplitudes: usize,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Spectrum {
    /// The sample identifier, unique within one batch
    pub id: String,
    /// The wave number or wavelength axis
    pub waves: Vec<f64>,
    /// The amplitude at each position of `waves`
    pub amplitudes: Vec<f64>,
    pub sample_data: SampleData,
}

impl Default for Spectrum {
    fn default() -> Self {
        Self::new(DEFAULT_ID)
    }
}

impl Spectrum {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            waves: Vec::new(),
            amplitudes: Vec::new(),
            sample_data: SampleData::new(),
        }
    }

    /// Build a spectrum from a pair of arrays, rejecting arrays of
    /// different lengths.
    pub fn from_arrays<S: Into<String>>(
        id: S,
        waves: Vec<f64>,
        amplitudes: Vec<f64>,
    ) -> Result<Self, ArrayLengthMismatch> {
        let mut this = Self::new(id);
        this.waves = waves;
        this.amplitudes = amplitudes;
        this.validate()?;
        Ok(this)
    }

    /// Append a single point to the spectrum
    pub fn push(&mut self, wave: f64, amplitude: f64) {
        self.waves.push(wave);
        self.amplitudes.push(amplitude);
    }

    /// Set a sample data value. An existing value under the same key is
    /// replaced.
    pub fn set<K: Into<String>, V: Into<SampleValue>>(&mut self, key: K, value: V) {
        self.sample_data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&SampleValue> {
        self.sample_data.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.sample_data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// Check that the wave and amplitude arrays have the same length
    pub fn validate(&self) -> Result<(), ArrayLengthMismatch> {
        if self.waves.len() != self.amplitudes.len() {
            Err(ArrayLengthMismatch {
                id: self.id.clone(),
                waves: self.waves.len(),
                amplitudes: self.amplitudes.len(),
            })
        } else {
            Ok(())
        }
    }

    /// Iterate over `(wave, amplitude)` pairs
    pub fn points(&self) -> impl DoubleEndedIterator<Item = (f64, f64)> + ExactSizeIterator + '_ {
        self.waves.iter().copied().zip(self.amplitudes.iter().copied())
    }

    /// Reverse the order of the points, keeping them paired
    pub fn reverse(&mut self) {
        self.waves.reverse();
        self.amplitudes.reverse();
    }
}

impl Display for Spectrum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: #points={}", self.id, self.len())
    }
}

/// Give repeated identifiers within one batch a numeric suffix, leaving the
/// first occurrence untouched: `a`, `a-2`, `a-3`.
pub fn make_ids_unique(spectra: &mut [Spectrum]) {
    let mut seen: HashSet<String> = HashSet::new();
    for spectrum in spectra.iter_mut() {
        if seen.insert(spectrum.id.clone()) {
            continue;
        }
        let mut n = 2;
        let mut candidate = format!("{}-{}", spectrum.id, n);
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{}-{}", spectrum.id, n);
        }
        seen.insert(candidate.clone());
        spectrum.id = candidate;
    }
}
