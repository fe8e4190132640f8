//! Ordered collection of cases for one system.

use std::collections::BTreeMap;
use std::ops::Index;

use ap_core::CaseId;
use tracing::warn;

use crate::case::Case;
use crate::error::{BatchError, BatchResult};
use crate::parameter::{ParamDict, ParameterValue};

/// Cases in insertion order. Ids are 1-based and follow insertion order.
#[derive(Debug, Clone, Default)]
pub struct SetOfCases {
    cases: Vec<Case>,
    parameter_values: Vec<ParameterValue>,
    database: BTreeMap<CaseId, ParamDict>,
}

impl SetOfCases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next id to `case` and records `param_dict` for exact
    /// parameter lookup. A missing dictionary is a configuration error and
    /// leaves the collection unchanged.
    pub fn add_case(
        &mut self,
        parameter_value: impl Into<ParameterValue>,
        mut case: Case,
        param_dict: Option<ParamDict>,
    ) -> BatchResult<CaseId> {
        let parameter_value = parameter_value.into();
        let Some(param_dict) = param_dict else {
            warn!(parameter = %parameter_value, "case added without a parameter dictionary");
            return Err(BatchError::MissingParamDict {
                parameter: parameter_value.to_string(),
            });
        };
        let id = CaseId::from_index(self.cases.len()).ok_or(BatchError::CaseIdOverflow {
            count: self.cases.len(),
        })?;
        case.set_case_id(id)?;

        self.cases.push(case);
        self.parameter_values.push(parameter_value);
        self.database.insert(id, param_dict);
        Ok(id)
    }

    pub fn n_cases(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Case at zero-based insertion position.
    pub fn get(&self, index: usize) -> Option<&Case> {
        self.cases.get(index)
    }

    pub fn by_id(&self, id: CaseId) -> Option<&Case> {
        self.cases.get(id.index())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Case> {
        self.cases.iter()
    }

    pub fn parameter_values(&self) -> &[ParameterValue] {
        &self.parameter_values
    }

    pub fn database(&self) -> &BTreeMap<CaseId, ParamDict> {
        &self.database
    }

    pub fn param_dict(&self, id: CaseId) -> Option<&ParamDict> {
        self.database.get(&id)
    }

    pub fn contains_parameter_value(&self, value: &ParameterValue) -> bool {
        self.parameter_values.iter().any(|v| v.matches(value))
    }

    /// Position of the first case whose parameter equals `value` exactly.
    pub fn find_parameter_index(&self, value: &ParameterValue) -> BatchResult<usize> {
        self.parameter_values
            .iter()
            .position(|v| v.matches(value))
            .ok_or_else(|| BatchError::not_found(format!("case with parameter value {value}")))
    }

    pub fn find_parameter_value(&self, value: impl Into<ParameterValue>) -> BatchResult<&Case> {
        let index = self.find_parameter_index(&value.into())?;
        Ok(&self.cases[index])
    }

    /// Id of the first case whose full parameter mapping equals `params`.
    pub fn find_param_id(&self, params: &ParamDict) -> BatchResult<CaseId> {
        self.database
            .iter()
            .find(|(_, dict)| *dict == params)
            .map(|(id, _)| *id)
            .ok_or_else(|| BatchError::not_found(format!("case with parameters {params:?}")))
    }

    pub fn find_param(&self, params: &ParamDict) -> BatchResult<&Case> {
        let id = self.find_param_id(params)?;
        self.by_id(id)
            .ok_or_else(|| BatchError::not_found(format!("case {id}")))
    }
}

impl Index<usize> for SetOfCases {
    type Output = Case;

    fn index(&self, index: usize) -> &Case {
        &self.cases[index]
    }
}

impl<'a> IntoIterator for &'a SetOfCases {
    type Item = &'a Case;
    type IntoIter = std::slice::Iter<'a, Case>;

    fn into_iter(self) -> Self::IntoIter {
        self.cases.iter()
    }
}
