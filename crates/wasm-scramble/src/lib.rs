//! A structure-aware WebAssembly test case scrambler.
//!
//! `wasm-scramble` takes an existing Wasm module, decodes it against a
//! declarative schema of the binary format, perturbs one node of the decoded
//! tree, repairs every dependent length and count field, and re-serializes
//! the result. The output is a semantically-plausible but randomly perturbed
//! module whose container structure (section sizes, element counts, body
//! lengths) remains internally consistent even though its content may now be
//! invalid: exactly what a format-aware fuzzing loop wants to feed into a
//! Wasm parser, validator, or compiler.
//!
//! # Example
//!
//! ```
//! # fn main() -> wasm_scramble::Result<()> {
//! use wasm_scramble::WasmScramble;
//!
//! let input_wasm = wat::parse_str(
//!     r#"
//!     (module
//!       (func (export "answer") (result i32)
//!         i32.const 42))
//!     "#,
//! )
//! .unwrap();
//!
//! let mutated_wasm = WasmScramble::default().seed(42).run(&input_wasm)?;
//!
//! // Feed `mutated_wasm` into your tests...
//! # let _ = mutated_wasm;
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs)]

mod error;
pub mod module;
pub mod mutators;
pub mod schema;
pub mod select;
pub mod stats;
pub mod tree;

pub use error::{Error, ErrorKind, Result};
pub use select::TierStrategy;
pub use stats::Stats;

use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

use crate::module::ModuleValue;
use crate::select::TierPicker;
use crate::tree::{ParseTree, Tier};

/// A structure-aware Wasm module scrambler.
///
/// This is the main entry point into the crate. Configure the RNG seed and
/// the tier-selection strategy, then call [`run`][WasmScramble::run] once per
/// fuzz iteration. Per-iteration value and parse trees are rebuilt from the
/// input buffer every call; only the RNG, the selection policy's learned
/// statistics, and the iteration tallies persist across calls.
#[derive(Debug, Clone, Default)]
pub struct WasmScramble {
    seed: u64,
    strategy: TierStrategy,
    rng: Option<SmallRng>,
    picker: Option<TierPicker>,
    last_arm: Option<usize>,
    stats: Stats,
}

impl WasmScramble {
    /// Set the RNG seed.
    ///
    /// Given the same input and the same seed, a freshly seeded
    /// `WasmScramble` always generates the same output.
    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.seed = seed;
        self.rng = None;
        self
    }

    /// Select how a granularity tier is chosen on each iteration.
    pub fn tier_strategy(&mut self, strategy: TierStrategy) -> &mut Self {
        self.strategy = strategy;
        self.picker = None;
        self
    }

    /// Run one mutation iteration on the given input module.
    pub fn run(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.run_with_aux(input, None)
    }

    /// Run one mutation iteration, optionally supplying a second corpus
    /// sample as donor material for the element-splice operator.
    ///
    /// An auxiliary buffer that fails to decode is ignored; it is corpus
    /// material, not the input under test. A decode failure of `input`
    /// itself aborts the iteration with an error and leaves the engine
    /// usable for the next call.
    pub fn run_with_aux(&mut self, input: &[u8], aux: Option<&[u8]>) -> Result<Vec<u8>> {
        self.stats.record_iteration();
        let mut module = match ModuleValue::decode(input) {
            Ok(module) => module,
            Err(e) => {
                // No arm was pulled this iteration; a later reward must not
                // credit a stale one.
                self.last_arm = None;
                self.stats.record_failure(&e);
                return Err(e);
            }
        };
        let aux_module = aux.and_then(|buf| ModuleValue::decode(buf).ok());
        let tree = ParseTree::build(&module);

        let seed = self.seed;
        let rng = self
            .rng
            .get_or_insert_with(|| SmallRng::seed_from_u64(seed));
        let picker = self
            .picker
            .get_or_insert_with(|| TierPicker::new(&self.strategy, Tier::ALL.len()));

        let arm = picker.choose(Tier::ALL.len(), rng);
        self.last_arm = Some(arm);
        let tier = Tier::ALL[arm];

        if let Some(&index) = tree.bucket(tier).choose(rng) {
            let node = tree.node(index);
            log::trace!("tier {tier:?}: mutating {}", node.path);
            if let Err(e) = mutators::mutate_node(&mut module, node, rng, aux_module.as_ref()) {
                self.stats.record_failure(&e);
                return Err(e);
            }
        } else {
            // An empty tier passes the module through unmodified.
            log::trace!("tier {tier:?} is empty, nothing to mutate");
        }

        module.encode()
    }

    /// Credit the tier arm chosen by the most recent
    /// [`run`][WasmScramble::run] call with an external fitness signal in
    /// `[0, 1]`.
    ///
    /// This is the bandit feedback extension point; no fitness source is
    /// wired in-crate. Calls are ignored under non-adaptive strategies.
    pub fn report_reward(&mut self, reward: f64) {
        if let (Some(picker), Some(arm)) = (self.picker.as_mut(), self.last_arm) {
            picker.update(arm, reward.clamp(0.0, 1.0));
        }
    }

    /// Begin a trimming session. Trimming is not implemented; the reported
    /// step count is always zero.
    pub fn trim_init(&mut self, _input: &[u8]) -> u32 {
        0
    }

    /// Produce the next trimming candidate. Always `None`.
    pub fn trim_step(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Record the harness verdict for the last trimming candidate and
    /// return the next step index. Always zero.
    pub fn trim_report(&mut self, _success: bool) -> u32 {
        0
    }

    /// Iteration and failure tallies for this engine instance.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, 0x01, 0x01, 0x00,
    ];

    #[test]
    fn same_seed_same_output() {
        let first = WasmScramble::default().seed(7).run(MINIMAL).unwrap();
        let second = WasmScramble::default().seed(7).run(MINIMAL).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn decode_failure_is_reported_not_fatal() {
        let mut engine = WasmScramble::default();
        engine.seed(1);
        assert!(engine.run(&[0x00, 0x61]).is_err());
        assert_eq!(engine.stats().failures().values().sum::<u64>(), 1);

        // The engine survives a malformed iteration and keeps working.
        engine.run(MINIMAL).unwrap();
        assert_eq!(engine.stats().iterations(), 2);
    }

    #[test]
    fn rewards_only_apply_after_a_run() {
        let mut engine = WasmScramble::default();
        engine
            .seed(3)
            .tier_strategy(TierStrategy::Thompson { adaptive: true });
        engine.report_reward(1.0); // no arm chosen yet, ignored
        engine.run(MINIMAL).unwrap();
        engine.report_reward(1.0);
    }

    #[test]
    fn trim_hooks_are_stubs() {
        let mut engine = WasmScramble::default();
        assert_eq!(engine.trim_init(MINIMAL), 0);
        assert_eq!(engine.trim_step(), None);
        assert_eq!(engine.trim_report(true), 0);
    }
}
