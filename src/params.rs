// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module defines the tuning parameters of the solver along with their
//! default values. Parameters are loaded from a JSON file in which every field
//! is optional; missing fields keep their default.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SolverError};
use crate::common::{MOST_FRACTIONAL, MAX_TRIANGLE_CUTS, MAX_PENTAGON_CUTS, MAX_HEPTAGON_CUTS};

/// The tuning parameters of the bounding engine and of the search.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Parameters {
    /// Initial number of bundle iterations per outer round.
    pub init_bundle_iter: usize,
    /// Cap on the number of bundle iterations per outer round.
    pub max_bundle_iter: usize,
    /// Outer rounds before pentagonal cuts are enabled.
    pub triag_iter: usize,
    /// Additional outer rounds before heptagonal cuts are enabled.
    pub pent_iter: usize,
    /// Rounds with heptagonal cuts enabled, counted in the give-up test.
    pub hept_iter: usize,
    /// First give-up threshold on the outer-round count.
    pub max_outer_iter: usize,
    /// Extra rounds granted past `max_outer_iter` when they may still close
    /// the gap.
    pub extra_iter: usize,
    /// Minimum violation for a cut to enter the candidate list.
    pub violated_tri_ineq: f64,
    /// Cap on the triangle candidate list per separation pass.
    pub tri_ineq: usize,
    /// Enable adaptive sizing of the triangle candidate list.
    pub adjust_tri_ineq: bool,
    /// Cap on the pentagonal candidate list per separation pass.
    pub pent_ineq: usize,
    /// Cap on the heptagonal candidate list per separation pass.
    pub hepta_ineq: usize,
    /// Random subsets sampled per pentagonal separation pass.
    pub pent_trials: usize,
    /// Random subsets sampled per heptagonal separation pass.
    pub hepta_trials: usize,
    /// Separate pentagonal inequalities at all.
    pub include_pent: bool,
    /// Separate heptagonal inequalities at all.
    pub include_hepta: bool,
    /// Stop after bounding the root node.
    pub root: bool,
    /// Let workers skip cutting-plane work when the root gap evidence says a
    /// prune is out of reach.
    pub use_diff: bool,
    /// Wall-clock limit in seconds; 0 disables the limit.
    pub time_limit: u64,
    /// Branching rule: 0 = least fractional, 1 = most fractional.
    pub branching_strategy: u8,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            init_bundle_iter: 3,
            max_bundle_iter: 15,
            triag_iter: 5,
            pent_iter: 5,
            hept_iter: 5,
            max_outer_iter: 20,
            extra_iter: 10,
            violated_tri_ineq: 1e-3,
            tri_ineq: 5000,
            adjust_tri_ineq: true,
            pent_ineq: 5000,
            hepta_ineq: 5000,
            pent_trials: 60,
            hepta_trials: 50,
            include_pent: true,
            include_hepta: true,
            root: false,
            use_diff: true,
            time_limit: 0,
            branching_strategy: MOST_FRACTIONAL,
        }
    }
}

impl Parameters {
    /// Loads the parameters from a JSON file. Every field is optional.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let params: Parameters = serde_json::from_str(&text)
            .map_err(|e| SolverError::Input(format!("parameter file: {e}")))?;
        params.validate()?;
        Ok(params)
    }

    /// Rejects parameter combinations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.init_bundle_iter == 0 || self.max_bundle_iter < self.init_bundle_iter {
            return Err(SolverError::Input(
                "bundle iteration budget must satisfy 0 < init_bundle_iter <= max_bundle_iter"
                    .to_string(),
            ));
        }
        if self.max_outer_iter == 0 {
            return Err(SolverError::Input("max_outer_iter must be positive".to_string()));
        }
        if self.violated_tri_ineq <= 0.0 {
            return Err(SolverError::Input("violated_tri_ineq must be positive".to_string()));
        }
        if self.tri_ineq == 0 || self.tri_ineq > MAX_TRIANGLE_CUTS {
            return Err(SolverError::Input(format!(
                "tri_ineq must lie in 1..={MAX_TRIANGLE_CUTS}"
            )));
        }
        if self.pent_ineq > MAX_PENTAGON_CUTS || self.hepta_ineq > MAX_HEPTAGON_CUTS {
            return Err(SolverError::Input(
                "pent_ineq/hepta_ineq exceed the active-cut capacity".to_string(),
            ));
        }
        if self.branching_strategy > 1 {
            return Err(SolverError::Input(
                "branching_strategy must be 0 (least fractional) or 1 (most fractional)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_params {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Parameters::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults_elsewhere() {
        let p: Parameters = serde_json::from_str(r#"{"triag_iter": 7}"#).unwrap();
        assert_eq!(p.triag_iter, 7);
        assert_eq!(p.max_outer_iter, 20);
        assert!(p.include_pent);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let p: std::result::Result<Parameters, _> =
            serde_json::from_str(r#"{"no_such_knob": 1}"#);
        assert!(p.is_err());
    }

    #[test]
    fn zero_bundle_budget_is_rejected() {
        let mut p = Parameters::default();
        p.init_bundle_iter = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn oversized_candidate_list_is_rejected() {
        let mut p = Parameters::default();
        p.tri_ineq = MAX_TRIANGLE_CUTS + 1;
        assert!(p.validate().is_err());
    }
}
