//! Testing utilities: settings fixtures, deterministic envelope keys, sample
//! auction inputs, and recording mock clients for every backend trait.
