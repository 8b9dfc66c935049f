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

//! This module defines the error kinds of the solver. Apart from time
//! exhaustion -- which is not an error but a stopped flag on the outcome --
//! every kind below is unrecoverable: the search tree cannot survive a partial
//! loss, so the whole job is torn down.

use thiserror::Error;

/// The ways a solve can fail.
#[derive(Debug, Error)]
pub enum SolverError {
    /// A malformed instance file or an invalid parameter value.
    #[error("invalid input: {0}")]
    Input(String),

    /// A numerical kernel broke down: a factorization reported that a matrix
    /// which must be positive definite is not, a linear system was singular,
    /// or the interior-point iteration produced non-finite values.
    #[error("numerical failure: {0}")]
    Numerical(String),

    /// The bundle or a cut list outgrew its compile-time capacity.
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// An I/O problem while reading an instance or a parameter file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used by every fallible operation of the crate.
pub type Result<T> = std::result::Result<T, SolverError>;
