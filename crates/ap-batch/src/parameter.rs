//! Parameter identity of a case.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use ap_io::Section;
use serde::{Deserialize, Serialize};

use crate::error::{BatchError, BatchResult};

/// How a manifest's parameter list becomes a case's parameter value.
/// Chosen once per bulk load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterMode {
    /// First manifest parameter only.
    Scalar,
    /// Every manifest parameter in manifest order.
    #[default]
    Vector,
}

/// Equality is element-wise over [`ParameterValue::as_slice`], so a scalar
/// equals the one-element vector holding the same value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl ParameterValue {
    pub fn as_slice(&self) -> &[f64] {
        match self {
            ParameterValue::Scalar(v) => std::slice::from_ref(v),
            ParameterValue::Vector(v) => v,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ParameterValue::Scalar(v) => Some(*v),
            ParameterValue::Vector(v) if v.len() == 1 => Some(v[0]),
            ParameterValue::Vector(_) => None,
        }
    }

    /// Exact element-wise equality. A scalar matches a one-element vector.
    pub fn matches(&self, other: &ParameterValue) -> bool {
        self.as_slice() == other.as_slice()
    }

    /// Lexicographic total order used to sort aggregate query results.
    pub fn total_cmp(&self, other: &ParameterValue) -> Ordering {
        let (a, b) = (self.as_slice(), other.as_slice());
        a.iter()
            .zip(b)
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len()))
    }
}

impl PartialEq for ParameterValue {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Scalar(v)
    }
}

impl From<Vec<f64>> for ParameterValue {
    fn from(v: Vec<f64>) -> Self {
        ParameterValue::Vector(v)
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Scalar(v) => write!(f, "{v}"),
            ParameterValue::Vector(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Full float-valued parameter mapping used as the exact-match lookup key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamDict(BTreeMap<String, f64>);

impl ParamDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coerces every value to `f64`.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> BatchResult<Self> {
        let mut dict = BTreeMap::new();
        for (key, raw) in pairs {
            let value = parse_number(key, raw)?;
            dict.insert(key.to_string(), value);
        }
        Ok(Self(dict))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ParamDict {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// The `parameters` section of a manifest, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestParameters {
    pub names: Vec<String>,
    pub values: Vec<f64>,
    pub dict: ParamDict,
}

impl ManifestParameters {
    pub fn from_section(section: &Section) -> BatchResult<Self> {
        let mut names = Vec::with_capacity(section.len());
        let mut values = Vec::with_capacity(section.len());
        for (key, raw) in section.iter() {
            names.push(key.to_string());
            values.push(parse_number(key, raw)?);
        }
        let dict = names.iter().cloned().zip(values.iter().copied()).collect();
        Ok(Self { names, values, dict })
    }

    pub fn value(&self, mode: ParameterMode) -> BatchResult<ParameterValue> {
        match mode {
            ParameterMode::Scalar => self
                .values
                .first()
                .map(|&v| ParameterValue::Scalar(v))
                .ok_or_else(|| BatchError::malformed("manifest declares no parameters")),
            ParameterMode::Vector if self.values.is_empty() => {
                Err(BatchError::malformed("manifest declares no parameters"))
            }
            ParameterMode::Vector => Ok(ParameterValue::Vector(self.values.clone())),
        }
    }

    /// Second parameter, which by convention is the angle of attack.
    pub fn alpha(&self) -> Option<f64> {
        self.values.get(1).copied()
    }
}

fn parse_number(key: &str, raw: &str) -> BatchResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| BatchError::malformed(format!("parameter '{key}' is not numeric: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(entries: &[(&str, &str)]) -> Section {
        Section {
            name: "parameters".into(),
            entries: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn scalar_matches_single_element_vector() {
        let s = ParameterValue::Scalar(2.0);
        let v = ParameterValue::Vector(vec![2.0]);
        assert!(s.matches(&v));
        assert!(!s.matches(&ParameterValue::Vector(vec![2.0, 1.0])));
        assert_eq!(v.as_scalar(), Some(2.0));
        assert_eq!(s, v);
        assert_ne!(s, ParameterValue::Vector(vec![2.0, 1.0]));
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = ParameterValue::Vector(vec![1.0, 5.0]);
        let b = ParameterValue::Vector(vec![2.0, 0.0]);
        let c = ParameterValue::Vector(vec![1.0, 5.0, 0.0]);
        assert_eq!(a.total_cmp(&b), Ordering::Less);
        assert_eq!(b.total_cmp(&a), Ordering::Greater);
        assert_eq!(a.total_cmp(&c), Ordering::Less);
        assert_eq!(a.total_cmp(&a.clone()), Ordering::Equal);
    }

    #[test]
    fn manifest_parameters_keep_order() {
        let params =
            ManifestParameters::from_section(&section(&[("u_inf", "10"), ("alpha", "2.5")])).unwrap();
        assert_eq!(params.names, vec!["u_inf", "alpha"]);
        assert_eq!(params.alpha(), Some(2.5));
        assert_eq!(
            params.value(ParameterMode::Vector).unwrap(),
            ParameterValue::Vector(vec![10.0, 2.5])
        );
        assert_eq!(params.value(ParameterMode::Scalar).unwrap(), ParameterValue::Scalar(10.0));
        assert_eq!(params.dict.get("alpha"), Some(2.5));
    }

    #[test]
    fn non_numeric_parameter_rejected() {
        let err = ManifestParameters::from_section(&section(&[("mode", "fast")])).unwrap_err();
        assert!(matches!(err, BatchError::Malformed { .. }));
    }

    #[test]
    fn empty_parameters_have_no_value() {
        let params = ManifestParameters::from_section(&section(&[])).unwrap();
        assert!(params.value(ParameterMode::Vector).is_err());
        assert!(params.value(ParameterMode::Scalar).is_err());
    }

    #[test]
    fn display() {
        assert_eq!(ParameterValue::Vector(vec![1.0, 2.5]).to_string(), "[1, 2.5]");
        assert_eq!(ParameterValue::Scalar(3.0).to_string(), "3");
    }
}
