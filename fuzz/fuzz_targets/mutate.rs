#![no_main]

use libfuzzer_sys::fuzz_target;
use wasm_scramble::module::ModuleValue;
use wasm_scramble::WasmScramble;

fuzz_target!(|input: (&[u8], u64)| {
    let _ = env_logger::try_init();

    let (wasm, seed) = input;
    log::debug!("seed = {seed}");

    let mut scramble = WasmScramble::default();
    scramble.seed(seed);

    let mutated = match scramble.run(wasm) {
        Ok(mutated) => mutated,
        Err(e) => {
            // Arbitrary input rarely parses as a module; the contract is
            // only that the engine reports the failure instead of crashing.
            log::debug!("failed to mutate: {e:?}");
            return;
        }
    };

    // Length bookkeeping is byte-exact for canonically encoded inputs
    // (minimal varints); a non-minimal input re-encodes shorter and the
    // consistency oracle below does not apply.
    let canonical = ModuleValue::decode(wasm)
        .and_then(|module| module.encode())
        .map(|bytes| bytes == wasm)
        .unwrap_or(false);
    if !canonical {
        return;
    }

    // Whatever was mutated, the container must stay self-consistent: the
    // output re-decodes in full and re-encodes byte-identically.
    let reparsed = ModuleValue::decode(&mutated).expect("mutated module must re-decode");
    assert_eq!(
        reparsed.encode().expect("re-decoded module must re-encode"),
        mutated,
    );
});
